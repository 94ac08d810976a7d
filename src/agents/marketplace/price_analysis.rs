//! Market-range price analysis
//!
//! Compares the asking price against a reference table of typical resale
//! ranges (approximate USD) for commonly-scammed products. Matching is
//! longest-key-first so "iphone 15 pro max" wins over "iphone 15".

use async_trait::async_trait;
use serde_json::json;

use crate::agents::{Agent, AgentResult};
use crate::schemas::{AgentOutcome, Flag, MarketplaceRequest};

use super::parse_price;

/// Typical resale ranges, approximate USD
const MARKET_PRICE_RANGES: &[(&str, f64, f64)] = &[
    // Phones
    ("iphone 15 pro max", 900.0, 1400.0),
    ("iphone 15 pro", 800.0, 1200.0),
    ("iphone 15", 600.0, 1000.0),
    ("iphone 14 pro max", 700.0, 1100.0),
    ("iphone 14 pro", 600.0, 1000.0),
    ("iphone 14", 500.0, 800.0),
    ("iphone 13", 400.0, 700.0),
    ("iphone 12", 300.0, 500.0),
    ("iphone 11", 200.0, 400.0),
    ("samsung galaxy s24", 600.0, 1000.0),
    ("samsung galaxy s23", 500.0, 900.0),
    ("samsung galaxy s22", 400.0, 700.0),
    // Computers
    ("macbook pro 16", 1500.0, 3500.0),
    ("macbook pro 14", 1200.0, 3000.0),
    ("macbook pro 13", 800.0, 2000.0),
    ("macbook air m2", 800.0, 1500.0),
    ("macbook air m1", 600.0, 1200.0),
    ("macbook air", 500.0, 1500.0),
    ("imac", 800.0, 2500.0),
    ("ipad pro", 500.0, 1500.0),
    ("ipad air", 400.0, 900.0),
    ("ipad", 250.0, 600.0),
    // Gaming
    ("ps5", 350.0, 600.0),
    ("playstation 5", 350.0, 600.0),
    ("xbox series x", 350.0, 550.0),
    ("xbox series s", 200.0, 350.0),
    ("nintendo switch oled", 280.0, 400.0),
    ("nintendo switch", 200.0, 350.0),
    ("steam deck", 350.0, 700.0),
    // Graphics cards
    ("rtx 4090", 1500.0, 2500.0),
    ("rtx 4080", 900.0, 1500.0),
    ("rtx 4070", 500.0, 800.0),
    ("rtx 3080", 400.0, 800.0),
    ("rtx 3070", 300.0, 600.0),
    ("rtx 3060", 200.0, 400.0),
    // Other
    ("airpods pro", 150.0, 280.0),
    ("airpods max", 350.0, 600.0),
    ("apple watch ultra", 500.0, 900.0),
    ("apple watch series 9", 300.0, 500.0),
    ("apple watch", 150.0, 500.0),
];

/// Find the most specific product match in the reference table
pub fn find_product_match(title: &str) -> Option<(&'static str, f64, f64)> {
    let title_lower = title.to_lowercase();
    let mut products: Vec<&(&str, f64, f64)> = MARKET_PRICE_RANGES.iter().collect();
    products.sort_by_key(|(name, _, _)| std::cmp::Reverse(name.len()));
    products
        .into_iter()
        .find(|(name, _, _)| title_lower.contains(name))
        .map(|&(name, min, max)| (name, min, max))
}

/// Thousands-grouped dollar amount, no decimals
fn fmt_usd(value: f64) -> String {
    let n = value.round() as i64;
    let digits = n.abs().to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if n < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

pub struct PriceAnalysisAgent;

impl PriceAnalysisAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PriceAnalysisAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for PriceAnalysisAgent {
    type Request = MarketplaceRequest;

    fn name(&self) -> &'static str {
        "price_analysis"
    }

    async fn analyze(&self, request: &MarketplaceRequest) -> AgentResult<AgentOutcome> {
        let mut outcome = AgentOutcome::default();

        let Some(listing) = &request.listing else {
            outcome
                .details
                .insert("price_analysis_available".to_string(), json!(false));
            return Ok(outcome);
        };
        let Some(price_raw) = &listing.price else {
            outcome
                .details
                .insert("price_analysis_available".to_string(), json!(false));
            return Ok(outcome);
        };

        let price = parse_price(price_raw);
        let title = listing.title.as_deref().unwrap_or("");

        outcome.details.insert("price_raw".to_string(), json!(price_raw));
        outcome
            .details
            .insert("price_numeric".to_string(), json!(price));
        outcome
            .details
            .insert("price_analysis_available".to_string(), json!(true));

        let Some(price) = price else {
            return Ok(outcome);
        };

        if let Some((product, min_market, max_market)) = find_product_match(title) {
            outcome
                .details
                .insert("matched_product".to_string(), json!(product));
            outcome
                .details
                .insert("market_price_min".to_string(), json!(min_market));
            outcome
                .details
                .insert("market_price_max".to_string(), json!(max_market));

            let mid_market = (min_market + max_market) / 2.0;
            let range = format!("${}-${}", fmt_usd(min_market), fmt_usd(max_market));

            let (tier, vs_market) = if price == 0.0 {
                outcome.flags.push(Flag::critical(format!(
                    "🚨 {} GRATIS - Muy probablemente estafa",
                    product.to_uppercase()
                )));
                outcome.score_impact += 35;
                ("scam", "free")
            } else if price < min_market * 0.3 {
                outcome.flags.push(Flag::critical(format!(
                    "🚨 Precio ridículamente bajo para {}: ${} (mercado: {})",
                    product,
                    fmt_usd(price),
                    range
                )));
                outcome.score_impact += 30;
                ("scam", "extreme_low")
            } else if price < min_market * 0.5 {
                outcome.flags.push(Flag::critical(format!(
                    "⚠️ Precio muy sospechoso para {}: ${} (mercado: {})",
                    product,
                    fmt_usd(price),
                    range
                )));
                outcome.score_impact += 20;
                ("very_suspicious", "very_low")
            } else if price < min_market * 0.7 {
                outcome.flags.push(Flag::warning(format!(
                    "Precio bajo para {}: ${} (mercado: {})",
                    product,
                    fmt_usd(price),
                    range
                )));
                outcome.score_impact += 10;
                ("suspicious", "low")
            } else if price <= max_market * 1.1 {
                outcome.flags.push(Flag::info(format!(
                    "✓ Precio razonable para {}: ${}",
                    product,
                    fmt_usd(price)
                )));
                outcome.score_impact -= 5;
                ("fair", "market_rate")
            } else {
                outcome.flags.push(Flag::info(format!(
                    "Precio por encima del mercado para {}: ${}",
                    product,
                    fmt_usd(price)
                )));
                ("high", "above_market")
            };

            outcome.details.insert("price_tier".to_string(), json!(tier));
            outcome
                .details
                .insert("price_vs_market".to_string(), json!(vs_market));

            if mid_market > 0.0 {
                let discount_pct = ((mid_market - price) / mid_market) * 100.0;
                outcome.details.insert(
                    "discount_from_market".to_string(),
                    json!((discount_pct * 10.0).round() / 10.0),
                );
            }
        } else {
            outcome
                .details
                .insert("matched_product".to_string(), json!(null));

            if price == 0.0 {
                outcome
                    .flags
                    .push(Flag::warning("Artículo gratis - verifica legitimidad"));
                outcome.score_impact += 10;
                outcome.details.insert("price_tier".to_string(), json!("free"));
            } else if price < 10.0 {
                outcome
                    .flags
                    .push(Flag::info("Precio muy bajo - verifica que sea real"));
                outcome.score_impact += 5;
                outcome
                    .details
                    .insert("price_tier".to_string(), json!("very_low"));
            } else {
                outcome
                    .details
                    .insert("price_tier".to_string(), json!("unknown"));
            }
        }

        if price > 0.0 {
            if price >= 100.0 && price % 100.0 == 0.0 && price < 1000.0 {
                outcome
                    .details
                    .insert("suspiciously_round".to_string(), json!(true));
            }

            if let Some(condition) = &listing.condition {
                let condition_lower = condition.to_lowercase();
                if condition_lower.contains("new") || condition_lower.contains("nuevo") {
                    outcome
                        .details
                        .insert("claimed_condition".to_string(), json!("new"));
                } else if condition_lower.contains("used") || condition_lower.contains("usado") {
                    outcome
                        .details
                        .insert("claimed_condition".to_string(), json!("used"));
                }
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::ListingInfo;

    fn request(title: &str, price: &str) -> MarketplaceRequest {
        MarketplaceRequest {
            url: "https://facebook.com/marketplace/item/1".to_string(),
            platform: "facebook_marketplace".to_string(),
            screenshot_base64: None,
            html_content: None,
            listing: Some(ListingInfo {
                title: Some(title.to_string()),
                price: Some(price.to_string()),
                ..Default::default()
            }),
            seller: None,
            listing_images: Vec::new(),
        }
    }

    #[test]
    fn test_longest_product_key_wins() {
        let (product, min, _) = find_product_match("Vendo iPhone 15 Pro Max 256GB").unwrap();
        assert_eq!(product, "iphone 15 pro max");
        assert_eq!(min, 900.0);

        let (product, _, _) = find_product_match("iphone 15 como nuevo").unwrap();
        assert_eq!(product, "iphone 15");
    }

    #[test]
    fn test_fmt_usd_groups_thousands() {
        assert_eq!(fmt_usd(1500.0), "1,500");
        assert_eq!(fmt_usd(250.0), "250");
        assert_eq!(fmt_usd(1234567.0), "1,234,567");
    }

    #[tokio::test]
    async fn test_tiers_escalate_as_price_drops() {
        let agent = PriceAnalysisAgent::new();

        // ps5 market range is 350-600
        let cases = [
            ("$100", 30, "scam"),           // < 30% of min
            ("$150", 20, "very_suspicious"), // < 50% of min
            ("$240", 10, "suspicious"),      // < 70% of min
            ("$500", -5, "fair"),            // within range
            ("$900", 0, "high"),             // above market
        ];
        for (price, expected_impact, expected_tier) in cases {
            let outcome = agent.run(&request("PS5 con dos controles", price)).await;
            assert_eq!(outcome.score_impact, expected_impact, "price {}", price);
            assert_eq!(outcome.details["price_tier"], json!(expected_tier));
        }
    }

    #[tokio::test]
    async fn test_free_matched_product_is_scam_tier() {
        let outcome = PriceAnalysisAgent::new()
            .run(&request("iPhone 14 Pro regalo", "Gratis"))
            .await;
        assert_eq!(outcome.score_impact, 35);
        assert_eq!(outcome.details["price_vs_market"], json!("free"));
        assert!(outcome.flags[0].msg.contains("GRATIS"));
    }

    #[tokio::test]
    async fn test_unmatched_product_generic_tiers() {
        let agent = PriceAnalysisAgent::new();

        let outcome = agent.run(&request("Mesa de comedor", "Gratis")).await;
        assert_eq!(outcome.score_impact, 10);
        assert_eq!(outcome.details["price_tier"], json!("free"));

        let outcome = agent.run(&request("Mesa de comedor", "$5")).await;
        assert_eq!(outcome.score_impact, 5);
        assert_eq!(outcome.details["price_tier"], json!("very_low"));

        let outcome = agent.run(&request("Mesa de comedor", "$120")).await;
        assert_eq!(outcome.score_impact, 0);
        assert_eq!(outcome.details["price_tier"], json!("unknown"));
    }
}
