//! Holistic seller confidence verdict
//!
//! Phase-2 agent: reads everything the rule-based agents produced plus the
//! raw seller/listing data and asks the LLM for the authoritative score,
//! risk level and verdict. When the model is unavailable the fallback is a
//! neutral 50/"suspicious" with an explicit warning flag, so the endpoint
//! always answers.

use std::sync::Arc;

use chrono::{Datelike, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::ai::{CapabilityProvider, ChatRequest, Model};
use crate::schemas::{AgentOutcome, Flag, FlagType, MarketplaceRequest, RiskLevel};

use super::parse_join_year;

const SYSTEM_PROMPT: &str = "\
Eres un experto chileno en detectar estafas en marketplaces. Tu personalidad:

ESTILO:
- Eres directo y sin rodeos, pero explicativo
- Tienes un humor negro y eres ligeramente cínico
- Te preocupas genuinamente por proteger al comprador

TÍTULOS CREATIVOS (ejemplos):
- \"Huele a humo... y no es asado\"
- \"Este vendedor brilla más que el sol\"
- \"No le compraría ni chicle a este compadre\"
- \"Procede con ojo, puede ser trucho\"
- \"La firme, se ve legit\"

TU ANÁLISIS DEBE INCLUIR:
1. verdict_message: Explicación DETALLADA (4-5 oraciones) que DEBE mencionar:
   - Información del vendedor (antigüedad, calificaciones)
   - Análisis del precio (¿razonable o sospechoso?)
   - DESCRIPCIÓN DE LAS IMÁGENES: qué se ve, estado del producto, si parecen auténticas
   - Conclusión y recomendación

2. key_concerns: Lista preocupaciones específicas incluyendo sobre las imágenes si aplica
   (ej: \"Fotos parecen de catálogo\", \"Producto se ve muy usado para el precio\")

3. positive_signals: Lista señales positivas incluyendo sobre las imágenes
   (ej: \"Fotos reales tomadas en casa\", \"Se ve el producto desde varios ángulos\")

CRITERIOS DE SCORE:
- 80-100: Vendedor confiable, bajo riesgo (cuenta antigua, buenas reviews, precio razonable, fotos auténticas)
- 50-79: Sospechoso, proceder con precaución (algunos red flags pero no definitivos)
- 0-49: Alto riesgo de estafa (cuenta nueva, precio irreal, fotos de stock, señales claras de scam)

Responde en JSON con: \"confidence_score\" (0-100), \"risk_level\" \
('safe', 'suspicious' o 'dangerous'), \"verdict_title\" (español, máximo 10 \
palabras, creativo), \"verdict_message\" (español, 2-4 oraciones), \
\"key_concerns\" (lista en español), \"positive_signals\" (lista en español)";

#[derive(Debug, Clone, Deserialize)]
struct ConfidenceReport {
    confidence_score: i64,
    risk_level: String,
    verdict_title: String,
    verdict_message: String,
    #[serde(default)]
    key_concerns: Vec<String>,
    #[serde(default)]
    positive_signals: Vec<String>,
}

/// The authoritative phase-2 result. `score` replaces any rule-derived
/// number; the breakdown stays diagnostic.
#[derive(Debug, Clone)]
pub struct HolisticVerdict {
    pub outcome: AgentOutcome,
    pub score: i32,
    pub risk_level: Option<RiskLevel>,
}

pub struct SupplierConfidenceAgent {
    provider: Arc<CapabilityProvider>,
}

impl SupplierConfidenceAgent {
    pub fn new(provider: Arc<CapabilityProvider>) -> Self {
        Self { provider }
    }

    pub async fn assess(
        &self,
        request: &MarketplaceRequest,
        rule_flags: &[Flag],
        image_analysis: Option<&Value>,
    ) -> HolisticVerdict {
        let prompt = format!(
            "Analiza esta publicación de marketplace:\n\n\
             VENDEDOR:\n{}\n\n\
             PUBLICACIÓN:\n{}\n\n\
             ANÁLISIS DE IMÁGENES:\n{}\n\n\
             ALERTAS DETECTADAS:\n{}\n\n\
             Necesito que:\n\
             1. Evalúes la confiabilidad del vendedor (score 0-100)\n\
             2. Expliques EN DETALLE por qué es o no confiable, INCLUYENDO observaciones sobre las imágenes\n\
             3. Menciones las señales positivas y negativas específicas\n\
             4. Comentes sobre el estado del producto según las imágenes\n\
             5. Des un veredicto completo que integre TODO: vendedor, precio, descripción E IMÁGENES",
            seller_summary(request),
            listing_summary(request),
            image_summary(image_analysis),
            flags_summary(rule_flags),
        );

        let chat = ChatRequest::new(prompt)
            .with_system(SYSTEM_PROMPT)
            .with_model(Model::Reasoning)
            .with_max_tokens(1500);

        match self.provider.complete_structured::<ConfidenceReport>(&chat).await {
            Some(report) => {
                info!(score = report.confidence_score, "Holistic verdict ready");

                let mut outcome = AgentOutcome::default();
                for concern in &report.key_concerns {
                    outcome.flags.push(Flag::warning(concern.clone()));
                }
                for positive in &report.positive_signals {
                    outcome.flags.push(Flag::info(format!("✓ {}", positive)));
                }
                outcome.details.insert(
                    "confidence_score".to_string(),
                    json!(report.confidence_score),
                );
                outcome
                    .details
                    .insert("risk_level".to_string(), json!(report.risk_level));
                outcome
                    .details
                    .insert("key_concerns".to_string(), json!(report.key_concerns));
                outcome.details.insert(
                    "positive_signals".to_string(),
                    json!(report.positive_signals),
                );
                outcome
                    .details
                    .insert("analysis_method".to_string(), json!("llm"));
                outcome.verdict_title = Some(report.verdict_title);
                outcome.verdict_message = Some(report.verdict_message);

                HolisticVerdict {
                    outcome,
                    score: report.confidence_score as i32,
                    risk_level: RiskLevel::parse(&report.risk_level),
                }
            }
            None => {
                let mut outcome = AgentOutcome::default();
                outcome
                    .flags
                    .push(Flag::warning("No se pudo completar el análisis de IA"));
                outcome
                    .details
                    .insert("analysis_method".to_string(), json!("fallback"));
                outcome.verdict_title = Some("Análisis incompleto".to_string());
                outcome.verdict_message = Some(
                    "No pudimos analizar completamente esta publicación. Procede con precaución."
                        .to_string(),
                );

                HolisticVerdict {
                    outcome,
                    score: 50,
                    risk_level: Some(RiskLevel::Suspicious),
                }
            }
        }
    }
}

fn seller_summary(request: &MarketplaceRequest) -> String {
    let Some(seller) = &request.seller else {
        return "No se pudo obtener información del vendedor.".to_string();
    };

    let mut parts = Vec::new();
    if let Some(name) = &seller.name {
        parts.push(format!("- Nombre: {}", name));
    }
    if let Some(join_date) = &seller.join_date {
        parts.push(format!("- Fecha de ingreso: {}", join_date));
        if let Some(join_year) = parse_join_year(join_date) {
            let years = Utc::now().year() - join_year;
            parts.push(format!("- Años en la plataforma: {}", years));
        }
    }
    if let Some(location) = &seller.location {
        parts.push(format!("- Ubicación del vendedor: {}", location));
    }
    if let Some(listings) = &seller.listings_count {
        parts.push(format!("- Número de publicaciones: {}", listings));
    }
    if let Some(followers) = seller.followers_count {
        parts.push(format!("- Seguidores: {}", followers));
    }
    if let Some(ratings) = seller.ratings_count {
        parts.push(format!("- Número de calificaciones: {}", ratings));
    }
    if let Some(average) = seller.ratings_average {
        parts.push(format!("- Calificación promedio: {} estrellas", average));
    }
    if !seller.badges.is_empty() {
        parts.push(format!("- Insignias: {}", seller.badges.join(", ")));
    }
    if !seller.strengths.is_empty() {
        parts.push(format!("- Fortalezas: {}", seller.strengths.join(", ")));
    }
    if let Some(rate) = &seller.response_rate {
        parts.push(format!("- Tasa de respuesta: {}", rate));
    }

    if parts.is_empty() {
        "Información del vendedor no disponible.".to_string()
    } else {
        parts.join("\n")
    }
}

fn listing_summary(request: &MarketplaceRequest) -> String {
    let Some(listing) = &request.listing else {
        return "No se pudo obtener información de la publicación.".to_string();
    };

    let mut parts = Vec::new();
    if let Some(title) = &listing.title {
        parts.push(format!("- Título: {}", title));
    }
    if let Some(price) = &listing.price {
        parts.push(format!("- Precio: {}", price));
    }
    if let Some(description) = &listing.description {
        let desc: String = if description.chars().count() > 500 {
            format!("{}...", description.chars().take(500).collect::<String>())
        } else {
            description.clone()
        };
        parts.push(format!("- Descripción: {}", desc));
    }
    if let Some(condition) = &listing.condition {
        parts.push(format!("- Condición: {}", condition));
    }
    if let Some(location) = &listing.location {
        parts.push(format!("- Ubicación del artículo: {}", location));
    }
    if let Some(posted) = &listing.posted_date {
        parts.push(format!("- Fecha de publicación: {}", posted));
    }
    if let Some(count) = listing.image_count {
        parts.push(format!("- Número de imágenes: {}", count));
    }

    if parts.is_empty() {
        "Información de la publicación no disponible.".to_string()
    } else {
        parts.join("\n")
    }
}

fn flags_summary(flags: &[Flag]) -> String {
    if flags.is_empty() {
        return "No se detectaron banderas de alerta.".to_string();
    }

    let section = |severity: FlagType, header: &str| -> Option<String> {
        let msgs: Vec<String> = flags
            .iter()
            .filter(|f| f.severity == severity)
            .map(|f| format!("  - {}", f.msg))
            .collect();
        if msgs.is_empty() {
            None
        } else {
            Some(format!("{}:\n{}", header, msgs.join("\n")))
        }
    };

    [
        section(FlagType::Critical, "ALERTAS CRÍTICAS"),
        section(FlagType::Warning, "ADVERTENCIAS"),
        section(FlagType::Info, "INFORMACIÓN"),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join("\n\n")
}

fn image_summary(image_analysis: Option<&Value>) -> String {
    let Some(analysis) = image_analysis else {
        return "No se analizaron imágenes.".to_string();
    };

    let mut parts = Vec::new();
    if let Some(desc) = analysis.get("product_description").and_then(Value::as_str) {
        if !desc.is_empty() {
            parts.push(format!("- Descripción visual: {}", desc));
        }
    }
    if let Some(condition) = analysis.get("apparent_condition").and_then(Value::as_str) {
        if !condition.is_empty() {
            parts.push(format!("- Estado aparente: {}", condition));
        }
    }
    if let Some(stock) = analysis.get("is_stock_photo").and_then(Value::as_bool) {
        parts.push(format!(
            "- ¿Foto de stock/internet?: {}",
            if stock { "Sí ⚠️" } else { "No ✓" }
        ));
    }
    if let Some(watermark) = analysis.get("has_watermark").and_then(Value::as_bool) {
        parts.push(format!(
            "- ¿Tiene marca de agua?: {}",
            if watermark { "Sí ⚠️" } else { "No ✓" }
        ));
    }
    if let Some(shows) = analysis.get("shows_actual_product").and_then(Value::as_bool) {
        parts.push(format!(
            "- ¿Muestra producto real?: {}",
            if shows { "Sí ✓" } else { "No ⚠️" }
        ));
    }
    if let Some(confidence) = analysis.get("confidence").and_then(Value::as_i64) {
        parts.push(format!("- Confianza en autenticidad: {}%", confidence));
    }

    if parts.is_empty() {
        "No se analizaron imágenes.".to_string()
    } else {
        parts.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::{ListingInfo, SellerInfo};

    fn request() -> MarketplaceRequest {
        MarketplaceRequest {
            url: "https://facebook.com/marketplace/item/1".to_string(),
            platform: "facebook_marketplace".to_string(),
            screenshot_base64: None,
            html_content: None,
            listing: Some(ListingInfo {
                title: Some("iPhone 13".to_string()),
                price: Some("$400".to_string()),
                ..Default::default()
            }),
            seller: Some(SellerInfo {
                name: Some("María".to_string()),
                join_date: Some("Se unió en 2015".to_string()),
                ratings_count: Some(12),
                ..Default::default()
            }),
            listing_images: Vec::new(),
        }
    }

    #[test]
    fn test_flags_summary_groups_by_severity() {
        let flags = vec![
            Flag::info("dato"),
            Flag::critical("alerta grave"),
            Flag::warning("ojo con esto"),
        ];
        let summary = flags_summary(&flags);
        let critical_pos = summary.find("ALERTAS CRÍTICAS").unwrap();
        let warning_pos = summary.find("ADVERTENCIAS").unwrap();
        let info_pos = summary.find("INFORMACIÓN").unwrap();
        assert!(critical_pos < warning_pos);
        assert!(warning_pos < info_pos);
        assert!(summary.contains("  - alerta grave"));
    }

    #[test]
    fn test_seller_summary_includes_platform_years() {
        let summary = seller_summary(&request());
        assert!(summary.contains("- Nombre: María"));
        assert!(summary.contains("- Años en la plataforma:"));
        assert!(summary.contains("- Número de calificaciones: 12"));
    }

    #[test]
    fn test_image_summary_formats_findings() {
        let analysis = json!({
            "is_stock_photo": true,
            "has_watermark": false,
            "shows_actual_product": true,
            "confidence": 65,
            "product_description": "Teléfono sobre mesa",
            "apparent_condition": "usado",
        });
        let summary = image_summary(Some(&analysis));
        assert!(summary.contains("¿Foto de stock/internet?: Sí ⚠️"));
        assert!(summary.contains("Confianza en autenticidad: 65%"));

        assert_eq!(image_summary(None), "No se analizaron imágenes.");
    }

    #[tokio::test]
    async fn test_fallback_without_provider() {
        let agent = SupplierConfidenceAgent::new(Arc::new(CapabilityProvider::unconfigured()));
        let verdict = agent.assess(&request(), &[], None).await;

        assert_eq!(verdict.score, 50);
        assert_eq!(verdict.risk_level, Some(RiskLevel::Suspicious));
        assert_eq!(
            verdict.outcome.verdict_title.as_deref(),
            Some("Análisis incompleto")
        );
        assert_eq!(
            verdict.outcome.details["analysis_method"],
            json!("fallback")
        );
        assert_eq!(verdict.outcome.flags.len(), 1);
    }
}
