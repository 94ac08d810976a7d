//! Marketplace listing analysis
//!
//! Seven phase-1 agents score scraped listing/seller data with fixed rule
//! tables, then the holistic agent reads everything (including the phase-1
//! flags) and produces the authoritative score and verdict. Scraped fields
//! arrive as free text in mixed English/Spanish, so the parsers here are
//! deliberately forgiving.

pub mod description_quality;
pub mod image_analysis;
pub mod price_analysis;
pub mod pricing;
pub mod red_flags;
pub mod seller_history;
pub mod seller_trust;
pub mod supplier_confidence;

pub use description_quality::DescriptionQualityAgent;
pub use image_analysis::ImageAnalysisAgent;
pub use price_analysis::PriceAnalysisAgent;
pub use pricing::PricingAgent;
pub use red_flags::RedFlagsAgent;
pub use seller_history::SellerHistoryAgent;
pub use seller_trust::SellerTrustAgent;
pub use supplier_confidence::{HolisticVerdict, SupplierConfidenceAgent};

use regex::Regex;

/// Extract a year from strings like "Joined in 2019", "Se unió en 2019"
pub fn parse_join_year(join_date: &str) -> Option<i32> {
    let re = Regex::new(r"(19|20)\d{2}").unwrap();
    re.find(join_date)?.as_str().parse().ok()
}

/// Extract days from strings like "Listed 2 days ago", "hace 3 semanas"
pub fn parse_posted_days(posted_date: &str) -> Option<i64> {
    let lower = posted_date.to_lowercase();

    if ["just now", "ahora", "recién"].iter().any(|t| lower.contains(t)) {
        return Some(0);
    }
    if ["hour", "minute", "hora", "minuto"].iter().any(|t| lower.contains(t)) {
        return Some(0);
    }
    if ["yesterday", "ayer"].iter().any(|t| lower.contains(t)) {
        return Some(1);
    }

    let capture_number = |pattern: &str| -> Option<i64> {
        Regex::new(pattern)
            .unwrap()
            .captures(&lower)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    };

    if let Some(days) = capture_number(r"(\d+)\s*(day|día|dias)") {
        return Some(days);
    }
    if let Some(weeks) = capture_number(r"(\d+)\s*(week|semana)") {
        return Some(weeks * 7);
    }
    if let Some(months) = capture_number(r"(\d+)\s*(month|mes)") {
        return Some(months * 30);
    }
    None
}

/// Extract a numeric price from strings like "$1,500", "90 000 $", "Gratis".
/// Free items parse to 0.0; unparseable strings (including ones with
/// multiple decimal points after cleanup) give `None`.
pub fn parse_price(price_str: &str) -> Option<f64> {
    let lower = price_str.to_lowercase();
    if lower.contains("free") || lower.contains("gratis") {
        return Some(0.0);
    }
    let cleaned: String = price_str
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned.parse().ok()
}

/// Extract a number from listings count strings like "20+", "5 publicaciones"
pub fn parse_listings_count(listings_str: &str) -> Option<i64> {
    let re = Regex::new(r"(\d+)").unwrap();
    re.captures(listings_str)?.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_join_year() {
        assert_eq!(parse_join_year("Joined in 2019"), Some(2019));
        assert_eq!(parse_join_year("Se unió en 2021"), Some(2021));
        assert_eq!(parse_join_year("Miembro desde 1999"), Some(1999));
        assert_eq!(parse_join_year("hace mucho"), None);
    }

    #[test]
    fn test_parse_posted_days() {
        assert_eq!(parse_posted_days("just now"), Some(0));
        assert_eq!(parse_posted_days("hace 2 horas"), Some(0));
        assert_eq!(parse_posted_days("yesterday"), Some(1));
        assert_eq!(parse_posted_days("Listed 5 days ago"), Some(5));
        assert_eq!(parse_posted_days("hace 3 semanas"), Some(21));
        assert_eq!(parse_posted_days("2 months ago"), Some(60));
        assert_eq!(parse_posted_days("quién sabe"), None);
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("$1,500"), Some(1500.0));
        assert_eq!(parse_price("90 000 $"), Some(90000.0));
        assert_eq!(parse_price("Gratis"), Some(0.0));
        assert_eq!(parse_price("Free!"), Some(0.0));
        assert_eq!(parse_price("$499.99"), Some(499.99));
        // Multiple dots survive cleanup and fail to parse
        assert_eq!(parse_price("$1.299.990"), None);
        assert_eq!(parse_price("precio a convenir"), None);
    }

    #[test]
    fn test_parse_listings_count() {
        assert_eq!(parse_listings_count("20+"), Some(20));
        assert_eq!(parse_listings_count("5 publicaciones"), Some(5));
        assert_eq!(parse_listings_count("ninguna"), None);
    }
}
