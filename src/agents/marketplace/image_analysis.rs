//! Listing image analysis
//!
//! Image count is a cheap rule-based signal; when a screenshot is
//! available the vision model judges authenticity (stock photos,
//! watermarks, whether the actual product is shown). The structured
//! findings are kept in details for the holistic agent to read.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::agents::{Agent, AgentResult};
use crate::ai::{CapabilityProvider, ChatRequest, Model};
use crate::schemas::{AgentOutcome, Flag, MarketplaceRequest};
use std::sync::Arc;

const VISION_PROMPT: &str = "\
Analiza esta imagen de una publicación de marketplace.

1. ¿Las fotos parecen de stock/internet o tomadas por el vendedor?
2. ¿Hay marcas de agua o logos?
3. ¿Se ve el producto claramente? ¿En qué estado aparenta estar?
4. ¿El entorno/fondo es consistente (casa real vs estudio)?
5. Describe brevemente qué ves en la imagen del producto.

Responde en JSON con: \"is_stock_photo\" (bool), \"is_professional\" (bool), \
\"has_watermark\" (bool), \"background_consistent\" (bool), \
\"shows_actual_product\" (bool), \"confidence\" (0-100), \
\"concerns\" (lista en español), \"positive_signals\" (lista en español), \
\"product_description\" (texto en español), \"apparent_condition\" \
('nuevo', 'como nuevo', 'usado', 'muy usado' o 'dañado')";

const VISION_SYSTEM: &str = "\
Eres un experto analizando imágenes de productos en marketplace.
Tu trabajo es evaluar la autenticidad de las fotos y describir lo que ves.

En tu análisis incluye:
- Si las fotos parecen auténticas o de internet
- El estado aparente del producto (nuevo, usado, dañado)
- Cualquier detalle sospechoso o positivo que notes
- Una breve descripción de lo que muestra la imagen

Sé específico y útil para el comprador.";

#[derive(Debug, Clone, Deserialize)]
pub struct ImageFindings {
    #[serde(default)]
    pub is_stock_photo: bool,
    #[serde(default)]
    pub is_professional: bool,
    #[serde(default)]
    pub has_watermark: bool,
    #[serde(default = "default_true")]
    pub background_consistent: bool,
    #[serde(default = "default_true")]
    pub shows_actual_product: bool,
    #[serde(default = "default_confidence")]
    pub confidence: i64,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub positive_signals: Vec<String>,
    #[serde(default)]
    pub product_description: String,
    #[serde(default)]
    pub apparent_condition: String,
}

fn default_true() -> bool {
    true
}

fn default_confidence() -> i64 {
    50
}

pub struct ImageAnalysisAgent {
    provider: Arc<CapabilityProvider>,
}

impl ImageAnalysisAgent {
    pub fn new(provider: Arc<CapabilityProvider>) -> Self {
        Self { provider }
    }

    fn count_signal(image_count: i64, outcome: &mut AgentOutcome) {
        outcome
            .details
            .insert("image_count".to_string(), json!(image_count));

        let tier = if image_count == 0 {
            outcome.flags.push(Flag::warning("Publicación sin imágenes"));
            outcome.score_impact += 15;
            "none"
        } else if image_count == 1 {
            outcome.score_impact += 5;
            "minimal"
        } else if image_count >= 5 {
            outcome.flags.push(Flag::info(format!(
                "Múltiples imágenes disponibles ({})",
                image_count
            )));
            outcome.score_impact -= 5;
            "excellent"
        } else if image_count >= 3 {
            "good"
        } else {
            "adequate"
        };
        outcome
            .details
            .insert("image_quality_tier".to_string(), json!(tier));
    }

    fn apply_findings(findings: &ImageFindings, outcome: &mut AgentOutcome) {
        outcome.details.insert(
            "ai_analysis".to_string(),
            json!({
                "is_stock_photo": findings.is_stock_photo,
                "is_professional": findings.is_professional,
                "has_watermark": findings.has_watermark,
                "background_consistent": findings.background_consistent,
                "shows_actual_product": findings.shows_actual_product,
                "confidence": findings.confidence,
                "product_description": findings.product_description,
                "apparent_condition": findings.apparent_condition,
            }),
        );

        if findings.is_stock_photo {
            outcome.flags.push(Flag::critical(
                "🚨 Las imágenes parecen ser fotos de stock/internet",
            ));
            outcome.score_impact += 25;
        }
        if findings.has_watermark {
            outcome
                .flags
                .push(Flag::warning("⚠️ Las imágenes tienen marcas de agua"));
            outcome.score_impact += 15;
        }
        if findings.is_professional && !findings.shows_actual_product {
            outcome.flags.push(Flag::warning(
                "⚠️ Fotos muy profesionales para marketplace personal",
            ));
            outcome.score_impact += 10;
        }
        if !findings.background_consistent {
            outcome
                .flags
                .push(Flag::warning("⚠️ Fondo inconsistente en las imágenes"));
            outcome.score_impact += 10;
        }
        if !findings.shows_actual_product {
            outcome.flags.push(Flag::warning(
                "⚠️ No se muestra claramente el producto real",
            ));
            outcome.score_impact += 10;
        }

        for concern in &findings.concerns {
            outcome.flags.push(Flag::warning(concern.clone()));
        }
        for positive in &findings.positive_signals {
            outcome.flags.push(Flag::info(format!("✓ {}", positive)));
        }

        if findings.confidence >= 80 {
            outcome.flags.push(Flag::info("✓ Imágenes parecen auténticas"));
            outcome.score_impact -= 5;
        } else if findings.confidence < 40 {
            outcome
                .flags
                .push(Flag::warning("Baja confianza en autenticidad de imágenes"));
            outcome.score_impact += 10;
        }

        outcome.details.insert(
            "image_authenticity_confidence".to_string(),
            json!(findings.confidence),
        );
    }
}

#[async_trait]
impl Agent for ImageAnalysisAgent {
    type Request = MarketplaceRequest;

    fn name(&self) -> &'static str {
        "image_analysis"
    }

    async fn analyze(&self, request: &MarketplaceRequest) -> AgentResult<AgentOutcome> {
        let mut outcome = AgentOutcome::default();

        // Explicit scrape count wins, unless it is zero; an empty count with
        // collected images means the scraper missed the counter element
        let image_count = request
            .listing
            .as_ref()
            .and_then(|l| l.image_count)
            .filter(|&n| n > 0)
            .unwrap_or(request.listing_images.len() as i64);
        Self::count_signal(image_count, &mut outcome);

        let Some(screenshot) = &request.screenshot_base64 else {
            outcome
                .details
                .insert("screenshot_available".to_string(), json!(false));
            return Ok(outcome);
        };
        outcome
            .details
            .insert("screenshot_available".to_string(), json!(true));

        debug!(screenshot_len = screenshot.len(), "Running vision analysis");
        let chat = ChatRequest::new(VISION_PROMPT)
            .with_system(VISION_SYSTEM)
            .with_image(screenshot.clone())
            .with_model(Model::Reasoning)
            .with_max_tokens(800);

        if let Some(findings) = self.provider.complete_structured::<ImageFindings>(&chat).await {
            Self::apply_findings(&findings, &mut outcome);
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::{FlagType, ListingInfo};

    fn request(image_count: Option<i64>, images: usize) -> MarketplaceRequest {
        MarketplaceRequest {
            url: "https://facebook.com/marketplace/item/1".to_string(),
            platform: "facebook_marketplace".to_string(),
            screenshot_base64: None,
            html_content: None,
            listing: Some(ListingInfo {
                image_count,
                ..Default::default()
            }),
            seller: None,
            listing_images: vec!["img".to_string(); images],
        }
    }

    fn agent() -> ImageAnalysisAgent {
        ImageAnalysisAgent::new(Arc::new(CapabilityProvider::unconfigured()))
    }

    #[tokio::test]
    async fn test_no_images_warned() {
        let outcome = agent().run(&request(None, 0)).await;
        assert_eq!(outcome.score_impact, 15);
        assert_eq!(outcome.details["image_quality_tier"], json!("none"));
    }

    #[tokio::test]
    async fn test_explicit_count_overrides_list() {
        let outcome = agent().run(&request(Some(6), 1)).await;
        assert_eq!(outcome.score_impact, -5);
        assert_eq!(outcome.details["image_quality_tier"], json!("excellent"));
    }

    #[tokio::test]
    async fn test_zero_count_falls_back_to_image_list() {
        let outcome = agent().run(&request(Some(0), 5)).await;
        assert_eq!(outcome.score_impact, -5);
        assert_eq!(outcome.details["image_quality_tier"], json!("excellent"));
    }

    #[test]
    fn test_stock_photo_findings_escalate() {
        let findings = ImageFindings {
            is_stock_photo: true,
            is_professional: true,
            has_watermark: true,
            background_consistent: true,
            shows_actual_product: false,
            confidence: 30,
            concerns: vec!["Foto de catálogo".to_string()],
            positive_signals: Vec::new(),
            product_description: String::new(),
            apparent_condition: String::new(),
        };
        let mut outcome = AgentOutcome::default();
        ImageAnalysisAgent::apply_findings(&findings, &mut outcome);

        // 25 stock + 15 watermark + 10 professional + 10 not shown + 10 low confidence
        assert_eq!(outcome.score_impact, 70);
        assert!(outcome
            .flags
            .iter()
            .any(|f| f.severity == FlagType::Critical));
        assert!(outcome.flags.iter().any(|f| f.msg == "Foto de catálogo"));
    }

    #[test]
    fn test_confident_authentic_findings_credit() {
        let findings = ImageFindings {
            is_stock_photo: false,
            is_professional: false,
            has_watermark: false,
            background_consistent: true,
            shows_actual_product: true,
            confidence: 90,
            concerns: Vec::new(),
            positive_signals: vec!["Fotos tomadas en casa".to_string()],
            product_description: "Notebook sobre una mesa".to_string(),
            apparent_condition: "usado".to_string(),
        };
        let mut outcome = AgentOutcome::default();
        ImageAnalysisAgent::apply_findings(&findings, &mut outcome);

        assert_eq!(outcome.score_impact, -5);
        assert!(outcome.flags.iter().any(|f| f.msg == "✓ Fotos tomadas en casa"));
        assert_eq!(outcome.details["image_authenticity_confidence"], json!(90));
    }
}
