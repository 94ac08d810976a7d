//! Listing description quality
//!
//! Short, shouty or vague descriptions cost points; specific details
//! (specs, model, warranty, receipt) earn credit. Also computes a 0-100
//! quality score for the details payload.

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use std::collections::HashSet;

use crate::agents::{Agent, AgentResult};
use crate::schemas::{AgentOutcome, Flag, MarketplaceRequest};

const VAGUE_PATTERNS: &[(&str, &str)] = &[
    (
        r"contacta?r?\s*(para|for)\s*(más|more|m[aá]s)\s*(info|información|details)",
        "Información vaga: \"contactar para más info\"",
    ),
    (r"pregunt[ae]r?\s*(por|for)", "Información vaga: \"preguntar por detalles\""),
    (r"no\s+preguntas?\s+tontas?", "Lenguaje hostil hacia compradores"),
    (r"solo\s+interesados?", "Filtro de compradores"),
];

const SPECIFICITY_PATTERNS: &[(&str, &str)] = &[
    (r"\b\d+\s*(gb|tb|inch|pulgadas?|cm|mm|kg|lb)\b", "specs"),
    (r"\b(modelo|model|serie|series)\s*:?\s*\w+", "model"),
    (r"\b(marca|brand)\s*:?\s*\w+", "brand"),
    (r"\b\d{4}\b", "year"),
    (r"\b(original|auténtico|genuine|authentic)\b", "authenticity"),
    (r"\b(garant[ií]a|warranty)\b", "warranty"),
    (r"\b(factura|receipt|invoice)\b", "receipt"),
];

pub struct DescriptionQualityAgent {
    punctuation_re: Regex,
    emoji_re: Regex,
    vague_res: Vec<(Regex, &'static str)>,
    specificity_res: Vec<(Regex, &'static str)>,
}

impl DescriptionQualityAgent {
    pub fn new() -> Self {
        Self {
            punctuation_re: Regex::new(r"[!?]{2,}").unwrap(),
            emoji_re: Regex::new(
                r"[\x{1F600}-\x{1F64F}\x{1F300}-\x{1F5FF}\x{1F680}-\x{1F6FF}]",
            )
            .unwrap(),
            vague_res: VAGUE_PATTERNS
                .iter()
                .map(|(pattern, msg)| (Regex::new(pattern).unwrap(), *msg))
                .collect(),
            specificity_res: SPECIFICITY_PATTERNS
                .iter()
                .map(|(pattern, label)| (Regex::new(pattern).unwrap(), *label))
                .collect(),
        }
    }
}

impl Default for DescriptionQualityAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for DescriptionQualityAgent {
    type Request = MarketplaceRequest;

    fn name(&self) -> &'static str {
        "description_quality"
    }

    async fn analyze(&self, request: &MarketplaceRequest) -> AgentResult<AgentOutcome> {
        let mut outcome = AgentOutcome::default();

        let listing = request.listing.as_ref();
        let description = listing.and_then(|l| l.description.as_deref()).unwrap_or("");
        let title = listing.and_then(|l| l.title.as_deref()).unwrap_or("");

        let desc_len = description.chars().count();
        outcome.details.insert(
            "has_description".to_string(),
            json!(!description.trim().is_empty()),
        );
        outcome
            .details
            .insert("description_length".to_string(), json!(desc_len));

        if description.trim().is_empty() {
            outcome.flags.push(Flag::warning("Publicación sin descripción"));
            outcome.score_impact = 15;
            outcome.details.insert("quality_score".to_string(), json!(0));
            return Ok(outcome);
        }

        let mut score_impact = 0;

        let length_rating = if desc_len < 20 {
            outcome.flags.push(Flag::warning(
                "Descripción muy corta (menos de 20 caracteres)",
            ));
            score_impact += 10;
            "very_short"
        } else if desc_len < 50 {
            score_impact += 5;
            "short"
        } else if desc_len >= 150 {
            score_impact -= 5;
            "detailed"
        } else {
            "adequate"
        };
        outcome
            .details
            .insert("length_rating".to_string(), json!(length_rating));

        // ALL CAPS shouting
        let upper_count = description.chars().filter(|c| c.is_uppercase()).count();
        let upper_ratio = upper_count as f64 / desc_len.max(1) as f64;
        outcome.details.insert(
            "uppercase_ratio".to_string(),
            json!((upper_ratio * 100.0).round() / 100.0),
        );
        if upper_ratio > 0.5 && desc_len > 20 {
            outcome
                .flags
                .push(Flag::warning("Descripción mayormente en MAYÚSCULAS"));
            score_impact += 5;
        }

        let punctuation_count = self.punctuation_re.find_iter(description).count();
        let emoji_count = self.emoji_re.find_iter(description).count();
        outcome
            .details
            .insert("excessive_punctuation".to_string(), json!(punctuation_count));
        outcome
            .details
            .insert("emoji_count".to_string(), json!(emoji_count));
        if punctuation_count > 3 {
            score_impact += 3;
        }

        let description_lower = description.to_lowercase();
        for (re, message) in &self.vague_res {
            if re.is_match(&description_lower) {
                outcome.flags.push(Flag::info(*message));
                score_impact += 2;
            }
        }

        let specific_details: Vec<&str> = self
            .specificity_res
            .iter()
            .filter(|(re, _)| re.is_match(&description_lower))
            .map(|(_, label)| *label)
            .collect();
        outcome
            .details
            .insert("specific_details".to_string(), json!(specific_details));
        outcome
            .details
            .insert("specificity_count".to_string(), json!(specific_details.len()));

        if specific_details.len() >= 3 {
            outcome.flags.push(Flag::info(format!(
                "Descripción con detalles específicos ({})",
                specific_details[..3].join(", ")
            )));
            score_impact -= 5;
        }

        // Title/description word overlap as a relevance proxy
        let title_lower = title.to_lowercase();
        let title_words: HashSet<&str> = title_lower.split_whitespace().collect();
        let desc_words: HashSet<&str> = description_lower.split_whitespace().collect();
        let common = title_words.intersection(&desc_words).count();
        let relevance = common as f64 / title_words.len().max(1) as f64;
        outcome.details.insert(
            "title_description_relevance".to_string(),
            json!((relevance * 100.0).round() / 100.0),
        );

        // Composite quality score for the details payload
        let mut quality_score = 50.0;
        quality_score += (desc_len as f64 / 5.0).min(20.0);
        quality_score += specific_details.len() as f64 * 5.0;
        quality_score -= score_impact as f64;
        let quality_score = quality_score.clamp(0.0, 100.0);
        outcome
            .details
            .insert("quality_score".to_string(), json!(quality_score.round() as i64));

        outcome.score_impact = score_impact;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::ListingInfo;

    fn request(title: &str, description: &str) -> MarketplaceRequest {
        MarketplaceRequest {
            url: "https://facebook.com/marketplace/item/1".to_string(),
            platform: "facebook_marketplace".to_string(),
            screenshot_base64: None,
            html_content: None,
            listing: Some(ListingInfo {
                title: Some(title.to_string()),
                description: Some(description.to_string()),
                ..Default::default()
            }),
            seller: None,
            listing_images: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_empty_description_short_circuits() {
        let outcome = DescriptionQualityAgent::new()
            .run(&request("iPhone", "   "))
            .await;
        assert_eq!(outcome.score_impact, 15);
        assert_eq!(outcome.details["quality_score"], json!(0));
        assert_eq!(outcome.flags.len(), 1);
    }

    #[tokio::test]
    async fn test_all_caps_flagged() {
        let outcome = DescriptionQualityAgent::new()
            .run(&request("TV", "VENDO TELE GRANDE CASI NUEVA APROVECHA YA"))
            .await;
        assert!(outcome
            .flags
            .iter()
            .any(|f| f.msg.contains("MAYÚSCULAS")));
    }

    #[tokio::test]
    async fn test_detailed_specific_description_earns_credit() {
        let description = "MacBook Air M1 del año 2021, modelo A2337, 256GB de almacenamiento. \
                           Producto original con garantía vigente y factura de compra. \
                           Batería al 92%, sin rayones, siempre con funda.";
        let outcome = DescriptionQualityAgent::new()
            .run(&request("MacBook Air M1", description))
            .await;
        // -5 detailed length, -5 specificity
        assert_eq!(outcome.score_impact, -10);
        assert!(outcome.details["specificity_count"].as_u64().unwrap() >= 3);
        assert_eq!(outcome.details["quality_score"], json!(100));
    }

    #[tokio::test]
    async fn test_vague_language_flagged() {
        let outcome = DescriptionQualityAgent::new()
            .run(&request("Bici", "Buena bici, contactar para más info, solo interesados"))
            .await;
        assert_eq!(
            outcome
                .flags
                .iter()
                .filter(|f| f.msg.starts_with("Información vaga") || f.msg == "Filtro de compradores")
                .count(),
            2
        );
    }
}
