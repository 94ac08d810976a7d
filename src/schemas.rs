//! Wire schemas shared by the HTTP surface and the analysis agents
//! Request/response types plus the common `AgentOutcome` record

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Risk tier derived from the final clamped score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Suspicious,
    Dangerous,
}

impl RiskLevel {
    /// Fixed thresholds: >=80 safe, >=50 suspicious, else dangerous
    pub fn from_score(score: i32) -> Self {
        if score >= 80 {
            RiskLevel::Safe
        } else if score >= 50 {
            RiskLevel::Suspicious
        } else {
            RiskLevel::Dangerous
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "safe" => Some(RiskLevel::Safe),
            "suspicious" => Some(RiskLevel::Suspicious),
            "dangerous" => Some(RiskLevel::Dangerous),
            _ => None,
        }
    }
}

/// Flag severity - fixed enumeration, no other values permitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagType {
    Critical,
    Warning,
    Info,
}

/// A severity-tagged, human-readable observation surfaced to the end user.
/// Flags carry no score information; the authoritative score effect is the
/// producing agent's `score_impact`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flag {
    #[serde(rename = "type")]
    pub severity: FlagType,
    pub msg: String,
}

impl Flag {
    pub fn critical(msg: impl Into<String>) -> Self {
        Self { severity: FlagType::Critical, msg: msg.into() }
    }

    pub fn warning(msg: impl Into<String>) -> Self {
        Self { severity: FlagType::Warning, msg: msg.into() }
    }

    pub fn info(msg: impl Into<String>) -> Self {
        Self { severity: FlagType::Info, msg: msg.into() }
    }
}

/// Per-agent detail payload, namespaced by the producing agent
pub type Details = Map<String, Value>;

/// The one record every agent produces.
///
/// `score_impact` is "points to subtract from a starting 100"; negative
/// values are credit (positive trust signals). Bounding happens at
/// aggregation, not per agent. Flag insertion order is display order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentOutcome {
    pub flags: Vec<Flag>,
    pub score_impact: i32,
    pub details: Details,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict_message: Option<String>,
}

impl AgentOutcome {
    /// Neutral outcome used when an agent degrades: no flags, zero impact,
    /// the failure reason recorded in details only.
    pub fn degraded(reason: impl Into<String>) -> Self {
        let mut details = Details::new();
        details.insert("error".to_string(), Value::String(reason.into()));
        Self { details, ..Default::default() }
    }
}

// ============================================================================
// Generic e-commerce analysis
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkStats {
    pub total: i64,
    pub internal: i64,
    pub external: i64,
}

/// Page snapshot sent by the extension for a generic e-commerce site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub url: String,
    pub html_content: String,
    #[serde(default)]
    pub screenshot_base64: Option<String>,

    // Additional metadata from the extension
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "metaDescription")]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub scripts: Option<i64>,
    #[serde(default)]
    pub links: Option<LinkStats>,
    #[serde(default)]
    pub images: Option<i64>,
    #[serde(default)]
    pub protocol: Option<String>,
}

// ============================================================================
// Marketplace analysis
// ============================================================================

/// Seller profile data scraped from the marketplace. Every field is
/// optional: a partially-scraped page is the normal case and agents treat
/// missing fields as "skip this check".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SellerInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub join_date: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub response_rate: Option<String>,
    #[serde(default)]
    pub other_listings_count: Option<i64>,
    /// Free-text count from the profile, e.g. "20+"
    #[serde(default)]
    pub listings_count: Option<String>,
    #[serde(default)]
    pub followers_count: Option<i64>,
    #[serde(default)]
    pub ratings_count: Option<i64>,
    #[serde(default)]
    pub ratings_average: Option<f64>,
    #[serde(default)]
    pub badges: Vec<String>,
    /// e.g. "Comunicación (13)"
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub profile_screenshot: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingInfo {
    #[serde(default)]
    pub title: Option<String>,
    /// Kept as string to handle "Free", "$1,500", "90 000 $"
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// e.g. "Listed 2 days ago", "hace 3 semanas"
    #[serde(default)]
    pub posted_date: Option<String>,
    #[serde(default)]
    pub image_count: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceRequest {
    pub url: String,
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default)]
    pub screenshot_base64: Option<String>,
    #[serde(default)]
    pub html_content: Option<String>,
    #[serde(default)]
    pub listing: Option<ListingInfo>,
    #[serde(default)]
    pub seller: Option<SellerInfo>,
    #[serde(default)]
    pub listing_images: Vec<String>,
}

fn default_platform() -> String {
    "facebook_marketplace".to_string()
}

// ============================================================================
// Results
// ============================================================================

/// Diagnostic breakdown of the marketplace score by contributing factor.
///
/// Computed from phase-1 agent impacts only; the holistic agent's
/// authoritative score is produced independently and the two may disagree.
/// That divergence is documented behavior, surfaced as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub base_score: i32,
    pub seller_longevity: i32,
    pub post_history: i32,
    pub description_quality: i32,
    pub image_analysis: i32,
    pub price_analysis: i32,
    pub red_flags: i32,
    pub response_patterns: i32,
    pub ratings_impact: i32,
}

impl Default for ScoreBreakdown {
    fn default() -> Self {
        Self {
            base_score: 100,
            seller_longevity: 0,
            post_history: 0,
            description_quality: 0,
            image_analysis: 0,
            price_analysis: 0,
            red_flags: 0,
            response_patterns: 0,
            ratings_impact: 0,
        }
    }
}

impl ScoreBreakdown {
    /// Total of all components, clamped to [0, 100]
    pub fn total(&self) -> i32 {
        let total = self.base_score
            + self.seller_longevity
            + self.post_history
            + self.description_quality
            + self.image_analysis
            + self.price_analysis
            + self.red_flags
            + self.response_patterns
            + self.ratings_impact;
        total.clamp(0, 100)
    }
}

/// The single response shape both endpoints return
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub score: i32,
    pub risk_level: RiskLevel,
    pub verdict_title: String,
    pub verdict_message: String,
    pub flags: Vec<Flag>,
    pub details: Details,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_outputs: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_breakdown: Option<ScoreBreakdown>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_thresholds() {
        assert_eq!(RiskLevel::from_score(100), RiskLevel::Safe);
        assert_eq!(RiskLevel::from_score(80), RiskLevel::Safe);
        assert_eq!(RiskLevel::from_score(79), RiskLevel::Suspicious);
        assert_eq!(RiskLevel::from_score(50), RiskLevel::Suspicious);
        assert_eq!(RiskLevel::from_score(49), RiskLevel::Dangerous);
        assert_eq!(RiskLevel::from_score(0), RiskLevel::Dangerous);
    }

    #[test]
    fn test_flag_serializes_type_field() {
        let flag = Flag::critical("phishing");
        let json = serde_json::to_value(&flag).unwrap();
        assert_eq!(json["type"], "critical");
        assert_eq!(json["msg"], "phishing");
    }

    #[test]
    fn test_score_breakdown_clamps_total() {
        let breakdown = ScoreBreakdown {
            red_flags: -70,
            price_analysis: -60,
            ..Default::default()
        };
        assert_eq!(breakdown.total(), 0);

        let breakdown = ScoreBreakdown {
            seller_longevity: 25,
            ..Default::default()
        };
        assert_eq!(breakdown.total(), 100);
    }

    #[test]
    fn test_marketplace_request_defaults() {
        let req: MarketplaceRequest =
            serde_json::from_str(r#"{"url": "https://facebook.com/marketplace/item/1"}"#).unwrap();
        assert_eq!(req.platform, "facebook_marketplace");
        assert!(req.listing.is_none());
        assert!(req.seller.is_none());
        assert!(req.listing_images.is_empty());
    }
}
