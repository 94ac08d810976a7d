//! Online reputation agent
//!
//! Runs three reputation searches in parallel (business listing, Trustpilot,
//! general opinions), filters out results about same-name sites on other
//! TLDs, deduplicates by URL, and when enough reviews exist asks the LLM for
//! a sentiment summary. Positive reputation earns credit; negative costs
//! points, floored so the agent never improves a score below zero change.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::{extract_domain, Agent, AgentResult};
use crate::ai::{CapabilityProvider, ChatRequest};
use crate::schemas::{AgentOutcome, AnalysisRequest, Flag};
use crate::search::{SearchClient, SearchResponse};

/// TLD variants checked when filtering out same-name foreign sites
const OTHER_TLDS: &[&str] = &[
    ".com", ".net", ".org", ".es", ".mx", ".ar", ".co", ".us", ".uk",
];

#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub source: String,
    pub title: String,
    pub content: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ReviewSummary {
    #[serde(default)]
    summary: String,
    #[serde(default = "default_sentiment")]
    sentiment: i64,
    #[serde(default)]
    key_positives: Vec<String>,
    #[serde(default)]
    key_negatives: Vec<String>,
    #[serde(default = "default_trust")]
    trust_assessment: String,
}

fn default_sentiment() -> i64 {
    50
}

fn default_trust() -> String {
    "neutral".to_string()
}

impl Default for ReviewSummary {
    fn default() -> Self {
        Self {
            summary: String::new(),
            sentiment: default_sentiment(),
            key_positives: Vec::new(),
            key_negatives: Vec::new(),
            trust_assessment: default_trust(),
        }
    }
}

/// Business name heuristic: brand suffix from the page title, else the
/// domain's first label capitalized.
pub fn extract_business_name(url: &str, title: Option<&str>) -> String {
    let domain = extract_domain(url);
    let domain_name = domain.split('.').next().unwrap_or(&domain);

    if let Some(title) = title {
        let country_re =
            Regex::new(r"(?i)\s*(Chile|México|Argentina|España|Colombia|Online|Store|Shop|Tienda).*$")
                .unwrap();
        for sep in [" | ", " - ", " – ", " — "] {
            if title.contains(sep) {
                if let Some(brand) = title.split(sep).last() {
                    let brand = country_re.replace(brand.trim(), "").trim().to_string();
                    if brand.chars().count() > 2 {
                        return brand;
                    }
                }
            }
        }
    }

    let mut chars = domain_name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// True when the text talks about the same brand on a different TLD
/// (e.g. reviews for salomon.com while analyzing salomon.cl)
fn mentions_wrong_tld(text: &str, domain_base: &str, domain_tld: &str) -> bool {
    let lower = text.to_lowercase();
    OTHER_TLDS
        .iter()
        .filter(|tld| **tld != domain_tld)
        .any(|tld| lower.contains(&format!("{}{}", domain_base, tld)))
}

/// Dedupe by URL (case-insensitive); Trustpilot first so it wins
/// collisions, then the business listing, then general results
pub fn dedupe_reviews(
    trustpilot: Vec<Review>,
    listing: Vec<Review>,
    general: Vec<Review>,
) -> Vec<Review> {
    let mut seen_urls = HashSet::new();
    let mut all_reviews = Vec::new();
    for review in trustpilot.into_iter().chain(listing).chain(general) {
        if seen_urls.insert(review.url.to_lowercase()) {
            all_reviews.push(review);
        }
    }
    all_reviews
}

pub struct ReviewsAgent {
    provider: Arc<CapabilityProvider>,
    search: Option<Arc<SearchClient>>,
    rating_re: Regex,
}

impl ReviewsAgent {
    pub fn new(provider: Arc<CapabilityProvider>, search: Option<Arc<SearchClient>>) -> Self {
        Self {
            provider,
            search,
            rating_re: Regex::new(r"(?i)(\d[.,]\d)\s*(out of 5|/5|stars|estrellas|-star)")
                .unwrap(),
        }
    }

    fn process_business_listing(
        &self,
        response: &SearchResponse,
        domain_base: &str,
        domain_tld: &str,
    ) -> (Option<serde_json::Value>, Vec<Review>) {
        let business_info = response.answer.as_ref().map(|answer| {
            json!({
                "found": true,
                "summary": truncate(answer, 500),
            })
        });

        let mut reviews = Vec::new();
        for result in &response.results {
            if mentions_wrong_tld(&result.content, domain_base, domain_tld) {
                continue;
            }

            // Skip help/support pages; we want actual reviews
            let url_lower = result.url.to_lowercase();
            if url_lower.contains("support.google.com") || url_lower.contains("help.google.com") {
                continue;
            }

            if result.content.len() <= 50 {
                continue;
            }

            let source = if url_lower.contains("trustpilot.com") {
                "Trustpilot"
            } else if url_lower.contains("google.com/maps") {
                "Google Maps"
            } else {
                "Google"
            };

            reviews.push(Review {
                source: source.to_string(),
                title: if result.title.is_empty() {
                    "Google Review".to_string()
                } else {
                    truncate(&result.title, 100)
                },
                content: truncate(&result.content, 300),
                url: result.url.clone(),
            });
        }
        (business_info, reviews)
    }

    fn process_trustpilot(
        &self,
        response: &SearchResponse,
        domain: &str,
        domain_base: &str,
        domain_tld: &str,
    ) -> (Vec<Review>, Option<String>, Option<String>) {
        let mut reviews = Vec::new();
        let mut rating = None;
        let mut page_url: Option<String> = None;
        let domain_lower = domain.to_lowercase();

        for result in &response.results {
            let url_lower = result.url.to_lowercase();
            if !url_lower.contains("trustpilot.com") {
                continue;
            }

            let url_has_exact_domain = url_lower.contains(&domain_lower);
            let text = format!("{} {}", result.content, result.title).to_lowercase();

            let mut wrong_domain = false;
            for tld in OTHER_TLDS {
                if *tld == domain_tld {
                    continue;
                }
                let foreign = format!("{}{}", domain_base, tld);
                if url_lower.contains(&foreign) && !url_has_exact_domain {
                    wrong_domain = true;
                    break;
                }
                if (text.contains(&format!("reviews of {}", foreign))
                    || url_lower.contains(&format!("review/{}", foreign)))
                    && !url_has_exact_domain
                {
                    wrong_domain = true;
                    break;
                }
            }
            if wrong_domain {
                continue;
            }

            if url_has_exact_domain || text.contains(&domain_lower) {
                if page_url.is_none() || url_has_exact_domain {
                    page_url = Some(result.url.clone());
                }

                if rating.is_none() {
                    if let Some(caps) = self.rating_re.captures(&result.content) {
                        if let Some(m) = caps.get(1) {
                            rating = Some(m.as_str().replace(',', "."));
                        }
                    }
                }

                if result.content.len() > 50 {
                    reviews.push(Review {
                        source: "Trustpilot".to_string(),
                        title: if result.title.is_empty() {
                            "Trustpilot Review".to_string()
                        } else {
                            truncate(&result.title, 100)
                        },
                        content: truncate(&result.content, 300),
                        url: result.url.clone(),
                    });
                }
            }
        }
        (reviews, rating, page_url)
    }

    fn process_general(
        &self,
        response: &SearchResponse,
        domain: &str,
        domain_base: &str,
        domain_tld: &str,
    ) -> Vec<Review> {
        let mut reviews = Vec::new();
        let domain_lower = domain.to_lowercase();

        for result in &response.results {
            let url_lower = result.url.to_lowercase();
            // Trustpilot results already handled by the dedicated search
            if url_lower.contains("trustpilot.com") {
                continue;
            }

            let text = format!("{} {}", result.content, result.title).to_lowercase();
            let wrong_domain = OTHER_TLDS
                .iter()
                .filter(|tld| **tld != domain_tld)
                .any(|tld| {
                    text.contains(&format!("{}{}", domain_base, tld))
                        && !text.contains(&domain_lower)
                });
            if wrong_domain {
                continue;
            }

            let source = if url_lower.contains("google") {
                "Google"
            } else if url_lower.contains("facebook") {
                "Facebook"
            } else if url_lower.contains("yelp") {
                "Yelp"
            } else if url_lower.contains("reddit") {
                "Reddit"
            } else {
                "Web"
            };

            if result.content.len() > 50 {
                reviews.push(Review {
                    source: source.to_string(),
                    title: if result.title.is_empty() {
                        "Review".to_string()
                    } else {
                        truncate(&result.title, 100)
                    },
                    content: truncate(&result.content, 300),
                    url: result.url.clone(),
                });
            }
        }
        reviews
    }

    async fn summarize(&self, reviews: &[Review], business_name: &str, domain: &str) -> ReviewSummary {
        let reviews_text = reviews
            .iter()
            .take(10)
            .map(|r| format!("[{}] {}: {}", r.source, r.title, r.content))
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = format!(
            "Analiza las siguientes reseñas y opiniones sobre \"{}\" ({}):\n\n{}\n\n\
             Proporciona un JSON con:\n\
             1. \"summary\": Un resumen conciso (2-3 oraciones) de la reputación general del negocio basado en las reseñas\n\
             2. \"sentiment\": Un score de 0-100 donde 0=muy negativo, 50=neutral, 100=muy positivo\n\
             3. \"key_positives\": Lista de hasta 3 aspectos positivos mencionados\n\
             4. \"key_negatives\": Lista de hasta 3 aspectos negativos o preocupaciones mencionadas\n\
             5. \"trust_assessment\": \"trustworthy\", \"neutral\", o \"suspicious\" basado en las reseñas",
            business_name, domain, reviews_text
        );

        let chat = ChatRequest::new(prompt).with_system(
            "Eres un analista de reputación de negocios. Analiza reseñas objetivamente.",
        );

        self.provider
            .complete_structured::<ReviewSummary>(&chat)
            .await
            .unwrap_or_default()
    }
}

#[async_trait]
impl Agent for ReviewsAgent {
    type Request = AnalysisRequest;

    fn name(&self) -> &'static str {
        "reviews"
    }

    async fn analyze(&self, request: &AnalysisRequest) -> AgentResult<AgentOutcome> {
        let Some(search) = &self.search else {
            let mut outcome = AgentOutcome::default();
            outcome.flags.push(Flag::info(
                "Review search skipped (TAVILY_API_KEY not configured)",
            ));
            outcome
                .details
                .insert("reviews_checked".to_string(), json!(false));
            outcome
                .details
                .insert("reason".to_string(), json!("API key not configured"));
            return Ok(outcome);
        };

        let domain = extract_domain(&request.url);
        let business_name = extract_business_name(&request.url, request.title.as_deref());
        let domain_base = domain.split('.').next().unwrap_or(&domain).to_string();
        let domain_tld = domain
            .rsplit('.')
            .next()
            .map(|tld| format!(".{}", tld))
            .unwrap_or_default();

        let listing_query = format!(
            "site:google.com/maps \"{}\" OR \"{}\" reviews",
            business_name, domain
        );
        let trustpilot_query = format!("site:trustpilot.com \"{}\"", domain);
        let general_query = format!(
            "\"{}\" opiniones reseñas experiencia compra -\"{}.com\"",
            domain, domain_base
        );

        let (listing_response, trustpilot_response, general_response) = futures::join!(
            search.search_or_empty(&listing_query, 5),
            search.search_or_empty(&trustpilot_query, 5),
            search.search_or_empty(&general_query, 5),
        );

        let (business_info, listing_reviews) =
            self.process_business_listing(&listing_response, &domain_base, &domain_tld);
        let (trustpilot_reviews, trustpilot_rating, trustpilot_url) =
            self.process_trustpilot(&trustpilot_response, &domain, &domain_base, &domain_tld);
        let general_reviews =
            self.process_general(&general_response, &domain, &domain_base, &domain_tld);

        let all_reviews = dedupe_reviews(trustpilot_reviews, listing_reviews, general_reviews);

        // Summarize only with enough material for a meaningful read
        let summary = if all_reviews.len() >= 3 {
            Some(self.summarize(&all_reviews, &business_name, &domain).await)
        } else {
            None
        };
        let sentiment = summary.as_ref().map(|s| s.sentiment).unwrap_or(50);
        let trust_assessment = summary
            .as_ref()
            .map(|s| s.trust_assessment.clone())
            .unwrap_or_else(default_trust);

        let mut outcome = AgentOutcome::default();
        let mut score_impact = 0;

        if sentiment >= 70 {
            outcome.flags.push(Flag::info(format!(
                "Reputación positiva en línea (puntuación: {}/100)",
                sentiment
            )));
            score_impact -= 5;
        } else if sentiment <= 30 {
            outcome.flags.push(Flag::warning(format!(
                "Reputación negativa en línea (puntuación: {}/100)",
                sentiment
            )));
            score_impact += 10;
        }

        if let Some(rating) = &trustpilot_rating {
            if let Ok(rating_value) = rating.parse::<f64>() {
                if rating_value >= 4.0 {
                    outcome
                        .flags
                        .push(Flag::info(format!("Trustpilot: {}/5 estrellas", rating)));
                } else if rating_value < 2.5 {
                    outcome.flags.push(Flag::warning(format!(
                        "Trustpilot: {}/5 estrellas (bajo)",
                        rating
                    )));
                }
            }
        }

        match trust_assessment.as_str() {
            "suspicious" => outcome
                .flags
                .push(Flag::warning("Las reseñas sugieren precaución con este sitio")),
            "trustworthy" => outcome
                .flags
                .push(Flag::info("Las reseñas sugieren que es un sitio confiable")),
            _ => {}
        }

        if all_reviews.is_empty() {
            outcome.flags.push(Flag::warning(
                "No se encontraron reseñas en línea para este negocio",
            ));
        } else {
            let mut sources = Vec::new();
            for review in &all_reviews {
                if !sources.contains(&review.source) {
                    sources.push(review.source.clone());
                }
            }
            outcome.flags.push(Flag::info(format!(
                "Se encontraron {} reseñas de {}",
                all_reviews.len(),
                sources.join(", ")
            )));
        }

        // Reputation can only cost points at the aggregate level
        outcome.score_impact = score_impact.max(0);

        let display_reviews: Vec<&Review> = all_reviews.iter().take(5).collect();
        outcome
            .details
            .insert("reviews_checked".to_string(), json!(true));
        outcome
            .details
            .insert("business_name".to_string(), json!(business_name));
        outcome.details.insert("domain".to_string(), json!(domain));
        outcome
            .details
            .insert("google_business".to_string(), json!(business_info));
        outcome
            .details
            .insert("trustpilot_rating".to_string(), json!(trustpilot_rating));
        outcome
            .details
            .insert("trustpilot_url".to_string(), json!(trustpilot_url));
        outcome.details.insert(
            "review_summary".to_string(),
            json!(summary.as_ref().map(|s| s.summary.clone())),
        );
        outcome
            .details
            .insert("sentiment_score".to_string(), json!(sentiment));
        outcome
            .details
            .insert("trust_assessment".to_string(), json!(trust_assessment));
        outcome.details.insert(
            "key_positives".to_string(),
            json!(summary.as_ref().map(|s| s.key_positives.clone()).unwrap_or_default()),
        );
        outcome.details.insert(
            "key_negatives".to_string(),
            json!(summary.as_ref().map(|s| s.key_negatives.clone()).unwrap_or_default()),
        );
        outcome
            .details
            .insert("reviews_count".to_string(), json!(all_reviews.len()));
        outcome
            .details
            .insert("reviews".to_string(), json!(display_reviews));

        info!(
            reviews = all_reviews.len(),
            score_impact = outcome.score_impact,
            "Reviews analysis complete"
        );

        Ok(outcome)
    }
}
