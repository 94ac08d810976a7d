//! Seller posting history
//!
//! First-time sellers are the highest-risk cohort for marketplace fraud;
//! a deep listing history earns credit.

use async_trait::async_trait;
use serde_json::json;

use crate::agents::{classify, Agent, AgentResult, Tier};
use crate::schemas::{AgentOutcome, Flag, FlagType, MarketplaceRequest};

use super::parse_listings_count;

const HISTORY_TIERS: &[Tier] = &[
    Tier::new(1.0, 25, Some(FlagType::Critical), "first_time"),
    Tier::new(3.0, 15, Some(FlagType::Warning), "beginner"),
    Tier::new(6.0, 5, Some(FlagType::Info), "novice"),
    Tier::new(21.0, 0, Some(FlagType::Info), "moderate"),
    Tier::new(51.0, -10, Some(FlagType::Info), "experienced"),
    Tier::new(f64::INFINITY, -15, Some(FlagType::Info), "power_seller"),
];

pub struct SellerHistoryAgent;

impl SellerHistoryAgent {
    pub fn new() -> Self {
        Self
    }

    fn history_flag(tier_label: &str, count: i64) -> String {
        match tier_label {
            "first_time" => "Primera publicación del vendedor (sin historial)".to_string(),
            "beginner" => format!("Vendedor con muy pocas publicaciones ({})", count),
            "novice" => format!("Vendedor con pocas publicaciones ({})", count),
            "moderate" => format!("Vendedor con historial moderado ({}+ publicaciones)", count),
            "experienced" => format!("Vendedor experimentado ({}+ publicaciones)", count),
            _ => format!("Vendedor muy activo ({}+ publicaciones)", count),
        }
    }
}

impl Default for SellerHistoryAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for SellerHistoryAgent {
    type Request = MarketplaceRequest;

    fn name(&self) -> &'static str {
        "seller_history"
    }

    async fn analyze(&self, request: &MarketplaceRequest) -> AgentResult<AgentOutcome> {
        let mut outcome = AgentOutcome::default();

        let Some(seller) = &request.seller else {
            return Ok(outcome);
        };

        let listings_count = seller.listings_count.as_deref().and_then(parse_listings_count);
        outcome
            .details
            .insert("listings_count_parsed".to_string(), json!(listings_count));

        if let Some(count) = listings_count {
            outcome
                .details
                .insert("has_listing_history".to_string(), json!(count > 0));

            if let Some(tier) = classify(count as f64, HISTORY_TIERS) {
                let msg = Self::history_flag(tier.label, count);
                match tier.severity {
                    Some(FlagType::Critical) => outcome.flags.push(Flag::critical(msg)),
                    Some(FlagType::Warning) => outcome.flags.push(Flag::warning(msg)),
                    _ => outcome.flags.push(Flag::info(msg)),
                }
                outcome.score_impact += tier.delta;
                outcome
                    .details
                    .insert("seller_experience".to_string(), json!(tier.label));
            }
        } else {
            outcome
                .details
                .insert("has_listing_history".to_string(), json!(null));

            // Legacy field fallback, used only when the profile count is absent
            if let Some(other) = seller.other_listings_count {
                outcome
                    .details
                    .insert("other_listings_count".to_string(), json!(other));
                if other == 0 {
                    outcome
                        .flags
                        .push(Flag::warning("Este es el único artículo del vendedor"));
                    outcome.score_impact += 10;
                }
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::SellerInfo;

    fn request(seller: Option<SellerInfo>) -> MarketplaceRequest {
        MarketplaceRequest {
            url: "https://facebook.com/marketplace/item/1".to_string(),
            platform: "facebook_marketplace".to_string(),
            screenshot_base64: None,
            html_content: None,
            listing: None,
            seller,
            listing_images: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_no_seller_is_neutral() {
        let outcome = SellerHistoryAgent::new().run(&request(None)).await;
        assert_eq!(outcome.score_impact, 0);
        assert!(outcome.flags.is_empty());
    }

    #[tokio::test]
    async fn test_first_listing_is_critical() {
        let seller = SellerInfo {
            listings_count: Some("0 publicaciones".to_string()),
            ..Default::default()
        };
        let outcome = SellerHistoryAgent::new().run(&request(Some(seller))).await;
        assert_eq!(outcome.score_impact, 25);
        assert_eq!(outcome.flags[0].severity, FlagType::Critical);
        assert_eq!(outcome.details["seller_experience"], json!("first_time"));
    }

    #[tokio::test]
    async fn test_power_seller_earns_credit() {
        let seller = SellerInfo {
            listings_count: Some("75+".to_string()),
            ..Default::default()
        };
        let outcome = SellerHistoryAgent::new().run(&request(Some(seller))).await;
        assert_eq!(outcome.score_impact, -15);
        assert_eq!(outcome.details["seller_experience"], json!("power_seller"));
    }

    #[tokio::test]
    async fn test_legacy_fallback_only_without_profile_count() {
        let seller = SellerInfo {
            other_listings_count: Some(0),
            ..Default::default()
        };
        let outcome = SellerHistoryAgent::new().run(&request(Some(seller))).await;
        assert_eq!(outcome.score_impact, 10);

        let seller = SellerInfo {
            listings_count: Some("12".to_string()),
            other_listings_count: Some(0),
            ..Default::default()
        };
        let outcome = SellerHistoryAgent::new().run(&request(Some(seller))).await;
        assert_eq!(outcome.score_impact, 0);
        assert_eq!(outcome.details["seller_experience"], json!("moderate"));
    }
}
