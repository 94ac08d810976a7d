//! Seller profile trust signals
//!
//! Account longevity drives most of the movement here, with ratings,
//! badges, followers and profile strengths granting credit. Credit is
//! floored at -30 so a polished profile cannot buy immunity from the
//! other agents.

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use regex::Regex;
use serde_json::json;

use crate::agents::{classify, Agent, AgentResult, Tier};
use crate::schemas::{AgentOutcome, Flag, FlagType, MarketplaceRequest};

use super::parse_join_year;

/// Impact assigned when no seller data could be scraped at all
const NO_SELLER_IMPACT: i32 = 15;
/// Impact when the profile exists but carries no join date
const NO_JOIN_DATE_IMPACT: i32 = 10;
/// Credit floor for this agent
const MIN_IMPACT: i32 = -30;

const LONGEVITY_TIERS: &[Tier] = &[
    Tier::new(1.0, 30, Some(FlagType::Critical), "very_new"),
    Tier::new(2.0, 15, Some(FlagType::Warning), "new"),
    Tier::new(3.0, 5, Some(FlagType::Info), "moderate"),
    Tier::new(5.0, 0, Some(FlagType::Info), "established"),
    Tier::new(10.0, -10, Some(FlagType::Info), "veteran"),
    Tier::new(f64::INFINITY, -15, Some(FlagType::Info), "senior"),
];

pub struct SellerTrustAgent {
    digits_re: Regex,
    strength_count_re: Regex,
}

impl SellerTrustAgent {
    pub fn new() -> Self {
        Self {
            digits_re: Regex::new(r"\d{4,}").unwrap(),
            strength_count_re: Regex::new(r"\((\d+)\)").unwrap(),
        }
    }

    fn longevity_flag(tier_label: &str, join_year: i32, age_years: i32) -> String {
        match tier_label {
            "very_new" => format!("🚨 Cuenta muy nueva (creada en {})", join_year),
            "new" => format!("⚠️ Cuenta relativamente nueva ({} año)", age_years),
            "moderate" => format!("Cuenta con {} años en Facebook", age_years),
            "established" => format!("Cuenta establecida ({} años en Facebook)", age_years),
            "veteran" => format!("✓ Cuenta veterana ({} años en Facebook)", age_years),
            _ => format!("⭐ Cuenta muy antigua ({}+ años en Facebook)", age_years),
        }
    }
}

impl Default for SellerTrustAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for SellerTrustAgent {
    type Request = MarketplaceRequest;

    fn name(&self) -> &'static str {
        "seller_trust"
    }

    async fn analyze(&self, request: &MarketplaceRequest) -> AgentResult<AgentOutcome> {
        let mut outcome = AgentOutcome::default();
        let mut score_impact = 0;

        let Some(seller) = &request.seller else {
            outcome.score_impact = NO_SELLER_IMPACT;
            return Ok(outcome);
        };

        // Account longevity
        let join_year = seller.join_date.as_deref().and_then(parse_join_year);
        if let Some(join_year) = join_year {
            let age_years = Utc::now().year() - join_year;
            outcome
                .details
                .insert("account_age_years".to_string(), json!(age_years));
            outcome.details.insert("join_year".to_string(), json!(join_year));

            if let Some(tier) = classify(age_years as f64, LONGEVITY_TIERS) {
                let msg = Self::longevity_flag(tier.label, join_year, age_years);
                match tier.severity {
                    Some(FlagType::Critical) => outcome.flags.push(Flag::critical(msg)),
                    Some(FlagType::Warning) => outcome.flags.push(Flag::warning(msg)),
                    _ => outcome.flags.push(Flag::info(msg)),
                }
                score_impact += tier.delta;
                outcome
                    .details
                    .insert("longevity_tier".to_string(), json!(tier.label));
            }
        } else {
            score_impact += NO_JOIN_DATE_IMPACT;
        }

        // Seller name
        if let Some(name) = &seller.name {
            outcome.details.insert("seller_name".to_string(), json!(name));
            if self.digits_re.is_match(name) {
                outcome
                    .flags
                    .push(Flag::warning("Nombre de perfil contiene muchos números"));
                score_impact += 5;
            }
        }

        // Response rate
        if let Some(rate) = &seller.response_rate {
            outcome.details.insert("response_rate".to_string(), json!(rate));
            let rate_lower = rate.to_lowercase();
            if rate_lower.contains("hour") || rate_lower.contains("minute") {
                outcome
                    .flags
                    .push(Flag::info(format!("Vendedor responde rápido: {}", rate)));
            }
        }

        // Other listings (legacy field)
        if let Some(other) = seller.other_listings_count {
            outcome
                .details
                .insert("other_listings_count".to_string(), json!(other));
            if other == 0 {
                outcome
                    .flags
                    .push(Flag::warning("Este es el único artículo del vendedor"));
                score_impact += 5;
            } else if other > 50 {
                outcome.flags.push(Flag::info(format!(
                    "Vendedor activo con {} publicaciones",
                    other
                )));
            }
        }

        // Listings count from profile investigation, e.g. "20+"
        if let Some(listings) = &seller.listings_count {
            outcome
                .details
                .insert("listings_count".to_string(), json!(listings));
            if let Some(count) = super::parse_listings_count(listings) {
                if count >= 10 {
                    outcome.flags.push(Flag::info(format!(
                        "Vendedor establecido con {} publicaciones",
                        listings
                    )));
                    score_impact -= 5;
                } else if count <= 2 {
                    outcome.flags.push(Flag::warning(format!(
                        "Vendedor con pocas publicaciones ({})",
                        listings
                    )));
                    score_impact += 5;
                }
            }
        }

        // Followers
        if let Some(followers) = seller.followers_count {
            outcome
                .details
                .insert("followers_count".to_string(), json!(followers));
            if followers >= 50 {
                outcome
                    .flags
                    .push(Flag::info(format!("Vendedor con {} seguidores", followers)));
                score_impact -= 5;
            } else if followers >= 10 {
                outcome
                    .flags
                    .push(Flag::info(format!("Vendedor con {} seguidores", followers)));
            }
        }

        // Ratings count, the strongest trust signal available
        if let Some(ratings) = seller.ratings_count {
            outcome
                .details
                .insert("ratings_count".to_string(), json!(ratings));
            if ratings >= 10 {
                outcome.flags.push(Flag::info(format!(
                    "Vendedor con {} calificaciones",
                    ratings
                )));
                score_impact -= 10;
            } else if ratings >= 5 {
                outcome.flags.push(Flag::info(format!(
                    "Vendedor con {} calificaciones",
                    ratings
                )));
                score_impact -= 5;
            } else if ratings == 0 {
                outcome.flags.push(Flag::warning("Vendedor sin calificaciones"));
                score_impact += 10;
            }
        }

        // Star average
        if let Some(average) = seller.ratings_average {
            outcome
                .details
                .insert("ratings_average".to_string(), json!(average));
            if average >= 4.5 {
                outcome.flags.push(Flag::info(format!(
                    "Excelente calificación: {:.1} estrellas ⭐",
                    average
                )));
                score_impact -= 10;
            } else if average >= 4.0 {
                outcome.flags.push(Flag::info(format!(
                    "Buena calificación: {:.1} estrellas",
                    average
                )));
                score_impact -= 5;
            } else if average < 3.0 {
                outcome.flags.push(Flag::critical(format!(
                    "Calificación baja: {:.1} estrellas",
                    average
                )));
                score_impact += 20;
            }
        }

        // Badges
        if !seller.badges.is_empty() {
            outcome
                .details
                .insert("badges".to_string(), json!(seller.badges));
            for badge in &seller.badges {
                let badge_lower = badge.to_lowercase();
                if badge_lower.contains("buena calificación") || badge_lower.contains("good rating")
                {
                    outcome
                        .flags
                        .push(Flag::info(format!("🏆 Insignia: {}", badge)));
                    score_impact -= 10;
                } else if badge_lower.contains("responde rápido")
                    || badge_lower.contains("responds quickly")
                {
                    outcome
                        .flags
                        .push(Flag::info(format!("⚡ Insignia: {}", badge)));
                    score_impact -= 5;
                } else if badge_lower.contains("destacado") || badge_lower.contains("top") {
                    outcome.flags.push(Flag::info("🌟 Vendedor destacado"));
                    score_impact -= 15;
                }
            }
        }

        // Strengths like "Comunicación (13)"
        if !seller.strengths.is_empty() {
            outcome
                .details
                .insert("strengths".to_string(), json!(seller.strengths));
            let total_positive: i64 = seller
                .strengths
                .iter()
                .filter_map(|s| {
                    self.strength_count_re
                        .captures(s)
                        .and_then(|c| c.get(1))
                        .and_then(|m| m.as_str().parse::<i64>().ok())
                })
                .sum();

            if total_positive >= 20 {
                outcome.flags.push(Flag::info(format!(
                    "Vendedor con {}+ reseñas positivas en aspectos clave",
                    total_positive
                )));
                score_impact -= 10;
            } else if total_positive >= 5 {
                let summary = seller
                    .strengths
                    .iter()
                    .take(3)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ");
                outcome
                    .flags
                    .push(Flag::info(format!("Fortalezas del vendedor: {}", summary)));
                score_impact -= 5;
            }
        }

        if seller.profile_screenshot.is_some() {
            outcome
                .details
                .insert("profile_investigated".to_string(), json!(true));
        }

        outcome.score_impact = score_impact.max(MIN_IMPACT);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::SellerInfo;

    fn request_with_seller(seller: SellerInfo) -> MarketplaceRequest {
        MarketplaceRequest {
            url: "https://facebook.com/marketplace/item/1".to_string(),
            platform: "facebook_marketplace".to_string(),
            screenshot_base64: None,
            html_content: None,
            listing: None,
            seller: Some(seller),
            listing_images: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_missing_seller_costs_fifteen_silently() {
        let request = MarketplaceRequest {
            seller: None,
            ..request_with_seller(SellerInfo::default())
        };
        let outcome = SellerTrustAgent::new().run(&request).await;
        assert_eq!(outcome.score_impact, 15);
        assert!(outcome.flags.is_empty());
    }

    #[tokio::test]
    async fn test_brand_new_account_is_critical() {
        let current_year = Utc::now().year();
        let seller = SellerInfo {
            join_date: Some(format!("Se unió en {}", current_year)),
            ..Default::default()
        };
        let outcome = SellerTrustAgent::new().run(&request_with_seller(seller)).await;
        assert_eq!(outcome.score_impact, 30);
        assert_eq!(outcome.flags[0].severity, FlagType::Critical);
        assert_eq!(outcome.details["longevity_tier"], json!("very_new"));
    }

    #[tokio::test]
    async fn test_credit_floored_at_minus_thirty() {
        let seller = SellerInfo {
            join_date: Some("Joined in 2005".to_string()),
            listings_count: Some("30+".to_string()),
            followers_count: Some(120),
            ratings_count: Some(40),
            ratings_average: Some(4.8),
            badges: vec!["Buena calificación".to_string(), "Vendedor destacado".to_string()],
            strengths: vec!["Comunicación (25)".to_string()],
            ..Default::default()
        };
        let outcome = SellerTrustAgent::new().run(&request_with_seller(seller)).await;
        assert_eq!(outcome.score_impact, -30);
    }

    #[tokio::test]
    async fn test_numeric_name_and_zero_ratings_flagged() {
        let seller = SellerInfo {
            name: Some("Juan12345".to_string()),
            ratings_count: Some(0),
            ..Default::default()
        };
        let outcome = SellerTrustAgent::new().run(&request_with_seller(seller)).await;
        // 10 (no join date) + 5 (digits in name) + 10 (no ratings)
        assert_eq!(outcome.score_impact, 25);
        assert!(outcome
            .flags
            .iter()
            .any(|f| f.msg.contains("números")));
        assert!(outcome
            .flags
            .iter()
            .any(|f| f.msg == "Vendedor sin calificaciones"));
    }
}
