//! E-commerce security guard agent
//!
//! Runs one combined structured LLM call covering visual phishing, purchase
//! validation, iframe/CSRF risks and price plausibility, then maps the
//! judgments onto a fixed impact table. A failed call degrades every
//! judgment to safe and says so in a warning flag.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::{Agent, AgentResult};
use crate::ai::{CapabilityProvider, ChatRequest, Model};
use crate::extract::EvidenceExtractor;
use crate::schemas::{AgentOutcome, AnalysisRequest, Flag};

/// Impact when visual phishing is detected; alone enough to zero the score
const PHISHING_IMPACT: i32 = 100;
/// Iframe/CSRF impact when a purchase action is live on the page
const HTML_RISK_IMPACT_ACTIVE: i32 = 20;
/// Iframe/CSRF impact without a purchase action
const HTML_RISK_IMPACT_PASSIVE: i32 = 10;
/// Impact for a too-good-to-be-true price
const LOW_PRICE_IMPACT: i32 = 40;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisualSecurityCheck {
    #[serde(default)]
    pub phishing_detected: bool,
    #[serde(default)]
    pub phishing_reasoning: String,
    #[serde(default)]
    pub purchase_button_present: bool,
    #[serde(default)]
    pub purchase_reasoning: String,
}

/// Combined iframe and CSRF judgment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HtmlSecurityCheck {
    #[serde(default)]
    pub iframe_risk_detected: bool,
    #[serde(default)]
    pub iframe_reasoning: String,
    #[serde(default)]
    pub csrf_risk_detected: bool,
    #[serde(default)]
    pub csrf_reasoning: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceSecurityCheck {
    #[serde(default)]
    pub suspiciously_low_price: bool,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FullSecurityAnalysis {
    #[serde(default)]
    pub visual: VisualSecurityCheck,
    #[serde(default)]
    pub html: HtmlSecurityCheck,
    #[serde(default)]
    pub price: PriceSecurityCheck,
}

pub struct GuardAgent {
    provider: Arc<CapabilityProvider>,
    extractor: EvidenceExtractor,
}

impl GuardAgent {
    pub fn new(provider: Arc<CapabilityProvider>) -> Self {
        Self {
            provider,
            extractor: EvidenceExtractor::new(),
        }
    }

    /// Single combined security check (visual + HTML + price) in one LLM
    /// call to keep latency and API usage down.
    async fn check_full_security(
        &self,
        request: &AnalysisRequest,
        iframes: &str,
        forms: &str,
        price_context: &str,
    ) -> Option<FullSecurityAnalysis> {
        let mut prompt = format!("Analyze webpage hosted at '{}'.\n\n", request.url);

        if iframes.trim().is_empty() {
            prompt.push_str("=== IFRAMES ===\nNo iframes detected.\n\n");
        } else {
            prompt.push_str(&format!("=== IFRAMES ===\n{}\n\n", iframes));
        }

        if forms.trim().is_empty() {
            prompt.push_str("=== FORMS ===\nNo forms detected.\n\n");
        } else {
            prompt.push_str(&format!("=== FORMS ===\n{}\n\n", forms));
        }

        if price_context.trim().is_empty() {
            prompt.push_str("=== PRICE/PRODUCT CONTEXT ===\nNo price information detected.\n\n");
        } else {
            prompt.push_str(&format!(
                "=== PRICE/PRODUCT CONTEXT ===\n{}\n\n",
                price_context
            ));
        }

        prompt.push_str(
            "Perform a comprehensive security analysis covering:\n\
             1. Visual Phishing (Logo/Layout mimicry)\n\
             2. Purchase Validation (Visible 'Buy' buttons)\n\
             3. HTML Risks (Iframes/CSRF)\n\
             4. Price Logic (Too good to be true scams)\n\n\
             If no screenshot is provided, set visual fields to False/Safe.\n\n\
             Fields: {\"visual\": {\"phishing_detected\": bool, \"phishing_reasoning\": str, \
             \"purchase_button_present\": bool, \"purchase_reasoning\": str}, \
             \"html\": {\"iframe_risk_detected\": bool, \"iframe_reasoning\": str, \
             \"csrf_risk_detected\": bool, \"csrf_reasoning\": str}, \
             \"price\": {\"suspiciously_low_price\": bool, \"reasoning\": str}}",
        );

        let mut chat = ChatRequest::new(prompt)
            .with_system(
                "You are an elite e-commerce security expert. Perform a multi-modal analysis \
                 of this webpage. Analyze Visuals, HTML structure, and Pricing logic \
                 simultaneously to detect scams, phishing, or vulnerabilities.",
            )
            .with_model(Model::Reasoning);

        if let Some(screenshot) = &request.screenshot_base64 {
            chat = chat.with_image(screenshot.clone());
        }

        self.provider.complete_structured(&chat).await
    }
}

/// Map a (possibly missing) security analysis onto flags and score impact.
/// Severity of HTML risks escalates when a purchase action is live on the
/// page; the total is capped at 100.
fn outcome_from_analysis(analysis: Option<&FullSecurityAnalysis>) -> AgentOutcome {
    let visual = analysis.map(|a| &a.visual);
    let html = analysis.map(|a| &a.html);
    let price = analysis.map(|a| &a.price);

    let mut outcome = AgentOutcome::default();
    let mut score_impact = 0;

    let mut purchase_active = false;
    match visual {
        Some(v) => {
            if v.phishing_detected {
                outcome.flags.push(Flag::critical(format!(
                    "Posible Phishing detectado: {}",
                    v.phishing_reasoning
                )));
                score_impact += PHISHING_IMPACT;
            } else {
                outcome
                    .flags
                    .push(Flag::info("No se detectó phishing visual obvio."));
            }

            if v.purchase_button_present {
                purchase_active = true;
                outcome.flags.push(Flag::info("Botón de compra detectado."));
            } else {
                outcome
                    .flags
                    .push(Flag::warning("No se detectó botón de compra activo."));
            }
        }
        None => {
            outcome.flags.push(Flag::warning(
                "No se pudo realizar análisis visual (falta screenshot).",
            ));
        }
    }

    let html_impact = if purchase_active {
        HTML_RISK_IMPACT_ACTIVE
    } else {
        HTML_RISK_IMPACT_PASSIVE
    };
    let html_flag = |msg: String| {
        if purchase_active {
            Flag::critical(msg)
        } else {
            Flag::warning(msg)
        }
    };

    match html {
        Some(h) if h.iframe_risk_detected => {
            outcome
                .flags
                .push(html_flag(format!("Riesgo de Iframe: {}", h.iframe_reasoning)));
            score_impact += html_impact;
        }
        _ => outcome.flags.push(Flag::info("Iframes seguros o ausentes.")),
    }

    match html {
        Some(h) if h.csrf_risk_detected => {
            outcome.flags.push(html_flag(format!(
                "Falta protección Anti-CSRF: {}",
                h.csrf_reasoning
            )));
            score_impact += html_impact;
        }
        _ => outcome
            .flags
            .push(Flag::info("Formularios seguros o ausentes.")),
    }

    match price {
        Some(p) if p.suspiciously_low_price => {
            outcome.flags.push(Flag::critical(format!(
                "Precio sospechosamente bajo: {}",
                p.reasoning
            )));
            score_impact += LOW_PRICE_IMPACT;
        }
        Some(p) => {
            outcome
                .flags
                .push(Flag::info(format!("Análisis de precio: {}", p.reasoning)));
        }
        None => {}
    }

    outcome
        .details
        .insert("visual_analysis".to_string(), json!(visual));
    outcome
        .details
        .insert("html_security".to_string(), json!(html));
    outcome
        .details
        .insert("price_analysis".to_string(), json!(price));

    outcome.score_impact = score_impact.min(100);
    outcome
}

#[async_trait]
impl Agent for GuardAgent {
    type Request = AnalysisRequest;

    fn name(&self) -> &'static str {
        "ecommerce_guard"
    }

    async fn analyze(&self, request: &AnalysisRequest) -> AgentResult<AgentOutcome> {
        let evidence = self.extractor.extract(&request.html_content);

        let analysis = self
            .check_full_security(
                request,
                &evidence.iframes,
                &evidence.forms,
                &evidence.price_context,
            )
            .await;

        let outcome = outcome_from_analysis(analysis.as_ref());

        info!(
            flags = outcome.flags.len(),
            score_impact = outcome.score_impact,
            "Guard analysis complete"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::FlagType;

    fn analysis(
        phishing: bool,
        purchase: bool,
        iframe: bool,
        csrf: bool,
        low_price: bool,
    ) -> FullSecurityAnalysis {
        FullSecurityAnalysis {
            visual: VisualSecurityCheck {
                phishing_detected: phishing,
                phishing_reasoning: "mimics a known brand".to_string(),
                purchase_button_present: purchase,
                purchase_reasoning: String::new(),
            },
            html: HtmlSecurityCheck {
                iframe_risk_detected: iframe,
                iframe_reasoning: "unsandboxed iframe".to_string(),
                csrf_risk_detected: csrf,
                csrf_reasoning: "payment form without token".to_string(),
            },
            price: PriceSecurityCheck {
                suspiciously_low_price: low_price,
                reasoning: "90% below market".to_string(),
            },
        }
    }

    #[test]
    fn test_phishing_forces_full_impact() {
        let outcome = outcome_from_analysis(Some(&analysis(true, false, false, false, false)));
        assert_eq!(outcome.score_impact, 100);
        assert_eq!(outcome.flags[0].severity, FlagType::Critical);
        assert!(outcome.flags[0].msg.contains("Phishing"));
    }

    #[test]
    fn test_impact_capped_at_100() {
        // Phishing + both HTML risks + low price would sum past 100
        let outcome = outcome_from_analysis(Some(&analysis(true, true, true, true, true)));
        assert_eq!(outcome.score_impact, 100);
    }

    #[test]
    fn test_html_risk_severity_escalates_with_purchase_button() {
        let with_purchase = outcome_from_analysis(Some(&analysis(false, true, true, true, false)));
        assert_eq!(with_purchase.score_impact, 40);
        let iframe_flag = with_purchase
            .flags
            .iter()
            .find(|f| f.msg.contains("Iframe"))
            .unwrap();
        assert_eq!(iframe_flag.severity, FlagType::Critical);

        let without_purchase =
            outcome_from_analysis(Some(&analysis(false, false, true, true, false)));
        assert_eq!(without_purchase.score_impact, 20);
        let iframe_flag = without_purchase
            .flags
            .iter()
            .find(|f| f.msg.contains("Iframe"))
            .unwrap();
        assert_eq!(iframe_flag.severity, FlagType::Warning);
    }

    #[test]
    fn test_suspicious_price_adds_critical_flag() {
        let outcome = outcome_from_analysis(Some(&analysis(false, true, false, false, true)));
        assert_eq!(outcome.score_impact, 40);
        assert!(outcome
            .flags
            .iter()
            .any(|f| f.severity == FlagType::Critical && f.msg.contains("Precio")));
    }

    #[test]
    fn test_missing_analysis_degrades_to_safe() {
        let outcome = outcome_from_analysis(None);
        assert_eq!(outcome.score_impact, 0);
        assert_eq!(outcome.flags.len(), 3);
        assert_eq!(outcome.flags[0].severity, FlagType::Warning);
        assert_eq!(outcome.flags[1].msg, "Iframes seguros o ausentes.");
        assert_eq!(outcome.flags[2].msg, "Formularios seguros o ausentes.");
    }

    #[tokio::test]
    async fn test_unconfigured_provider_runs_without_throwing() {
        let agent = GuardAgent::new(Arc::new(CapabilityProvider::unconfigured()));
        let request = AnalysisRequest {
            url: "https://shop.example.cl".to_string(),
            html_content: "<html></html>".to_string(),
            screenshot_base64: None,
            title: None,
            meta_description: None,
            scripts: None,
            links: None,
            images: None,
            protocol: None,
        };
        let outcome = agent.run(&request).await;
        assert_eq!(outcome.score_impact, 0);
        assert!(!outcome.flags.is_empty());
    }
}
