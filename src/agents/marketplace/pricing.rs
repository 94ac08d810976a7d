//! Too-good-to-be-true pricing heuristics
//!
//! Quick keyword-level check: free items and high-value electronics at
//! throwaway prices. The market-range comparison lives in
//! `price_analysis`; this agent only needs the title.

use async_trait::async_trait;
use serde_json::json;

use crate::agents::{Agent, AgentResult};
use crate::schemas::{AgentOutcome, Flag, MarketplaceRequest};

use super::parse_price;

const HIGH_VALUE_KEYWORDS: &[&str] = &[
    "iphone",
    "macbook",
    "playstation",
    "ps5",
    "xbox",
    "nintendo",
    "laptop",
    "samsung",
    "gpu",
    "rtx",
];

const URGENCY_PATTERNS: &[&str] = &["urge", "urgente", "hoy", "today only", "must go", "moving"];

pub struct PricingAgent;

impl PricingAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PricingAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for PricingAgent {
    type Request = MarketplaceRequest;

    fn name(&self) -> &'static str {
        "pricing"
    }

    async fn analyze(&self, request: &MarketplaceRequest) -> AgentResult<AgentOutcome> {
        let mut outcome = AgentOutcome::default();

        let Some(listing) = &request.listing else {
            return Ok(outcome);
        };
        let Some(price_raw) = &listing.price else {
            return Ok(outcome);
        };

        let price = parse_price(price_raw);
        outcome.details.insert("price_raw".to_string(), json!(price_raw));

        let title_lower = listing.title.as_deref().unwrap_or("").to_lowercase();
        let description_lower = listing.description.as_deref().unwrap_or("").to_lowercase();

        if let Some(price) = price {
            outcome
                .details
                .insert("price_numeric".to_string(), json!(price));

            if price == 0.0 {
                outcome
                    .flags
                    .push(Flag::warning("Artículo gratis - verifica que no sea carnada"));
                outcome.score_impact += 10;
            }

            // High-value item at an impossible price; only the first keyword
            // match counts
            for keyword in HIGH_VALUE_KEYWORDS {
                if title_lower.contains(keyword) {
                    if price > 0.0 && price < 100.0 {
                        outcome.flags.push(Flag::critical(format!(
                            "Precio sospechosamente bajo para {}: {}",
                            keyword.to_uppercase(),
                            price_raw
                        )));
                        outcome.score_impact += 25;
                    } else if price > 0.0 && price < 300.0 {
                        outcome.flags.push(Flag::warning(format!(
                            "Precio muy bajo para {}: {}",
                            keyword.to_uppercase(),
                            price_raw
                        )));
                        outcome.score_impact += 10;
                    }
                    break;
                }
            }
        }

        // Urgency language is tracked but never flagged on its own
        for pattern in URGENCY_PATTERNS {
            if title_lower.contains(pattern) || description_lower.contains(pattern) {
                outcome.details.insert("has_urgency".to_string(), json!(true));
                break;
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::ListingInfo;

    fn request(listing: ListingInfo) -> MarketplaceRequest {
        MarketplaceRequest {
            url: "https://facebook.com/marketplace/item/1".to_string(),
            platform: "facebook_marketplace".to_string(),
            screenshot_base64: None,
            html_content: None,
            listing: Some(listing),
            seller: None,
            listing_images: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_cheap_iphone_is_critical() {
        let listing = ListingInfo {
            title: Some("iPhone 15 Pro Max nuevo".to_string()),
            price: Some("$50".to_string()),
            ..Default::default()
        };
        let outcome = PricingAgent::new().run(&request(listing)).await;
        assert_eq!(outcome.score_impact, 25);
        assert!(outcome.flags[0].msg.contains("IPHONE"));
    }

    #[tokio::test]
    async fn test_free_item_warned() {
        let listing = ListingInfo {
            title: Some("Sofá usado".to_string()),
            price: Some("Gratis".to_string()),
            ..Default::default()
        };
        let outcome = PricingAgent::new().run(&request(listing)).await;
        assert_eq!(outcome.score_impact, 10);
        assert!(outcome.flags[0].msg.contains("carnada"));
    }

    #[tokio::test]
    async fn test_urgency_tracked_without_flag() {
        let listing = ListingInfo {
            title: Some("Bicicleta, vendo URGENTE".to_string()),
            price: Some("$200".to_string()),
            ..Default::default()
        };
        let outcome = PricingAgent::new().run(&request(listing)).await;
        assert_eq!(outcome.details["has_urgency"], json!(true));
        assert!(outcome.flags.is_empty());
        assert_eq!(outcome.score_impact, 0);
    }

    #[tokio::test]
    async fn test_no_price_is_neutral() {
        let listing = ListingInfo {
            title: Some("iPhone 15".to_string()),
            ..Default::default()
        };
        let outcome = PricingAgent::new().run(&request(listing)).await;
        assert_eq!(outcome.score_impact, 0);
        assert!(outcome.flags.is_empty());
    }
}
