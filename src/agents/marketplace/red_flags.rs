//! Common scam pattern detection
//!
//! Scans title and description for off-platform payment requests, contact
//! bypass attempts, embedded emails, stock scam phrasing, and checks the
//! listing/seller locations agree. Payment and contact categories flag at
//! most once each; scam phrases stack at low weight.

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;

use crate::agents::{Agent, AgentResult};
use crate::schemas::{AgentOutcome, Flag, MarketplaceRequest};

use super::parse_posted_days;

const PAYMENT_RED_FLAGS: &[(&str, &str)] = &[
    ("zelle", "Menciona Zelle (pago fuera de plataforma)"),
    ("venmo", "Menciona Venmo (pago fuera de plataforma)"),
    ("cashapp", "Menciona CashApp (pago fuera de plataforma)"),
    ("cash app", "Menciona Cash App (pago fuera de plataforma)"),
    ("wire transfer", "Solicita transferencia bancaria"),
    ("transferencia", "Solicita transferencia bancaria"),
    ("gift card", "Menciona tarjetas de regalo (común en estafas)"),
    ("tarjeta de regalo", "Menciona tarjetas de regalo (común en estafas)"),
    ("crypto", "Solicita pago en criptomonedas"),
    ("bitcoin", "Solicita pago en Bitcoin"),
];

const CONTACT_RED_FLAGS: &[(&str, &str)] = &[
    ("whatsapp", "Solicita contacto por WhatsApp (evita registro de FB)"),
    ("telegram", "Solicita contacto por Telegram"),
    ("text me", "Solicita contacto directo por texto"),
    ("call me", "Solicita llamada directa"),
    ("escríbeme al", "Solicita contacto fuera de Facebook"),
];

const SCAM_PHRASES: &[(&str, &str)] = &[
    ("serious buyers only", "Frase común en estafas: \"serious buyers only\""),
    ("solo compradores serios", "Frase común en estafas: \"solo compradores serios\""),
    ("no lowballers", "Frase defensiva común"),
    ("price is firm", "Precio no negociable puede indicar urgencia"),
    ("send deposit", "Solicita depósito por adelantado"),
    ("deposito", "Solicita depósito por adelantado"),
    ("shipping only", "Solo envío (no permite verificar en persona)"),
    ("solo envio", "Solo envío (no permite verificar en persona)"),
];

pub struct RedFlagsAgent {
    email_re: Regex,
}

impl RedFlagsAgent {
    pub fn new() -> Self {
        Self {
            email_re: Regex::new(r"\b[\w.-]+@[\w.-]+\.\w+\b").unwrap(),
        }
    }
}

impl Default for RedFlagsAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for RedFlagsAgent {
    type Request = MarketplaceRequest;

    fn name(&self) -> &'static str {
        "red_flags"
    }

    async fn analyze(&self, request: &MarketplaceRequest) -> AgentResult<AgentOutcome> {
        let mut outcome = AgentOutcome::default();

        let listing = request.listing.as_ref();
        let description = listing.and_then(|l| l.description.as_deref()).unwrap_or("");
        let title = listing.and_then(|l| l.title.as_deref()).unwrap_or("");
        let combined = format!("{} {}", title, description).to_lowercase();

        for (pattern, message) in PAYMENT_RED_FLAGS {
            if combined.contains(pattern) {
                outcome.flags.push(Flag::critical(*message));
                outcome.score_impact += 20;
                outcome
                    .details
                    .insert("payment_red_flag".to_string(), json!(pattern));
                break;
            }
        }

        for (pattern, message) in CONTACT_RED_FLAGS {
            if combined.contains(pattern) {
                outcome.flags.push(Flag::warning(*message));
                outcome.score_impact += 10;
                outcome
                    .details
                    .insert("contact_bypass".to_string(), json!(pattern));
                break;
            }
        }

        if self.email_re.is_match(&combined) {
            outcome.flags.push(Flag::warning("Email en la descripción"));
            outcome.score_impact += 5;
            outcome
                .details
                .insert("email_in_description".to_string(), json!(true));
        }

        for (pattern, message) in SCAM_PHRASES {
            if combined.contains(pattern) {
                outcome.flags.push(Flag::info(*message));
                outcome.score_impact += 3;
            }
        }

        // Listing claiming a different city than the seller profile
        if let (Some(listing_loc), Some(seller_loc)) = (
            listing.and_then(|l| l.location.as_deref()),
            request.seller.as_ref().and_then(|s| s.location.as_deref()),
        ) {
            if listing_loc.to_lowercase() != seller_loc.to_lowercase() {
                outcome.flags.push(Flag::warning(format!(
                    "Ubicación del artículo ({}) diferente al vendedor ({})",
                    listing_loc, seller_loc
                )));
                outcome.score_impact += 10;
                outcome
                    .details
                    .insert("location_mismatch".to_string(), json!(true));
            }
        }

        if let Some(posted) = listing.and_then(|l| l.posted_date.as_deref()) {
            if let Some(days) = parse_posted_days(posted) {
                outcome.details.insert("days_posted".to_string(), json!(days));
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::{FlagType, ListingInfo, SellerInfo};

    fn request(description: &str) -> MarketplaceRequest {
        MarketplaceRequest {
            url: "https://facebook.com/marketplace/item/1".to_string(),
            platform: "facebook_marketplace".to_string(),
            screenshot_base64: None,
            html_content: None,
            listing: Some(ListingInfo {
                title: Some("Bicicleta".to_string()),
                description: Some(description.to_string()),
                ..Default::default()
            }),
            seller: None,
            listing_images: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_payment_flag_fires_once() {
        let outcome = RedFlagsAgent::new()
            .run(&request("Acepto Zelle o Venmo, también bitcoin"))
            .await;
        let criticals = outcome
            .flags
            .iter()
            .filter(|f| f.severity == FlagType::Critical)
            .count();
        assert_eq!(criticals, 1);
        assert_eq!(outcome.score_impact, 20);
        assert_eq!(outcome.details["payment_red_flag"], json!("zelle"));
    }

    #[tokio::test]
    async fn test_scam_phrases_stack() {
        let outcome = RedFlagsAgent::new()
            .run(&request("Serious buyers only. No lowballers. Price is firm."))
            .await;
        assert_eq!(outcome.score_impact, 9);
        assert_eq!(outcome.flags.len(), 3);
    }

    #[tokio::test]
    async fn test_email_and_whatsapp_detected() {
        let outcome = RedFlagsAgent::new()
            .run(&request("Escríbeme a vendedor@mail.com o por whatsapp"))
            .await;
        assert_eq!(outcome.score_impact, 15);
        assert_eq!(outcome.details["email_in_description"], json!(true));
        assert_eq!(outcome.details["contact_bypass"], json!("whatsapp"));
    }

    #[tokio::test]
    async fn test_location_mismatch() {
        let mut req = request("Buen estado");
        if let Some(listing) = req.listing.as_mut() {
            listing.location = Some("Santiago".to_string());
        }
        req.seller = Some(SellerInfo {
            location: Some("Valparaíso".to_string()),
            ..Default::default()
        });
        let outcome = RedFlagsAgent::new().run(&req).await;
        assert_eq!(outcome.score_impact, 10);
        assert_eq!(outcome.details["location_mismatch"], json!(true));
    }

    #[tokio::test]
    async fn test_clean_listing_is_neutral() {
        let outcome = RedFlagsAgent::new()
            .run(&request("Bicicleta en buen estado, retiro en persona"))
            .await;
        assert_eq!(outcome.score_impact, 0);
        assert!(outcome.flags.is_empty());
    }
}
