//! Competitor price discovery
//!
//! Searches shopping results for the product being viewed, extracts prices
//! from competitor stores (LLM first, regex fallback), and reports where
//! the same product sells for less. Informational only: this agent never
//! moves the score, it just gives the user something to compare against.

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
use crate::search::{SearchClient, SearchHit};

/// How many competitor candidates get the full extraction treatment
const MAX_CANDIDATES: usize = 5;
/// Prices below this (CLP) are treated as installment/noise artifacts
const MIN_PLAUSIBLE_PRICE: f64 = 50_000.0;

#[derive(Debug, Clone, Deserialize)]
struct ExtractedPrice {
    current_price: Option<f64>,
    #[serde(default = "default_currency")]
    currency: String,
    #[serde(default)]
    is_installment: bool,
    #[serde(default)]
    confidence: i64,
}

fn default_currency() -> String {
    "CLP".to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct CompetitorPrice {
    pub store: String,
    pub price: f64,
    pub currency: String,
    pub url: String,
    pub confidence: i64,
    pub method: &'static str,
}

/// Product name heuristic: everything before the first title separator
pub fn extract_product_name(title: &str) -> String {
    for sep in [" | ", " - ", " – ", " — "] {
        if let Some((product, _)) = title.split_once(sep) {
            return product.trim().to_string();
        }
    }
    title.trim().to_string()
}

pub struct PriceComparisonAgent {
    provider: Arc<CapabilityProvider>,
    search: Option<Arc<SearchClient>>,
    price_re: Regex,
    price_hint_re: Regex,
}

impl PriceComparisonAgent {
    pub fn new(provider: Arc<CapabilityProvider>, search: Option<Arc<SearchClient>>) -> Self {
        Self {
            provider,
            search,
            price_re: Regex::new(r"[\$|CLP]\s?(\d{1,3}(?:[.,]\d{3})+)").unwrap(),
            price_hint_re: Regex::new(r"[\$|CLP]\s?\d").unwrap(),
        }
    }

    /// Regex fallback: smallest plausible full price mentioned in the text
    fn regex_price(&self, text: &str) -> Option<f64> {
        self.price_re
            .captures_iter(text)
            .filter_map(|c| {
                let raw = c.get(1)?.as_str().replace(['.', ','], "");
                raw.parse::<f64>().ok()
            })
            .filter(|p| *p >= MIN_PLAUSIBLE_PRICE)
            .fold(None, |min, p| match min {
                Some(m) if m <= p => Some(m),
                _ => Some(p),
            })
    }

    async fn extract_competitor_price(
        &self,
        product_name: &str,
        store: String,
        url: String,
        content: &str,
    ) -> Option<CompetitorPrice> {
        let prompt = format!(
            "Extrae el precio de venta actual de \"{}\" del siguiente texto de la tienda {}:\n\n\
             {}\n\n\
             Reglas:\n\
             - Ignora precios en cuotas (ej: \"12 cuotas de $50.000\"). Solo el precio total.\n\
             - Ignora precios tachados o \"antes\". Solo el precio vigente.\n\
             - Los precios chilenos usan punto como separador de miles ($1.299.990).\n\n\
             Responde en JSON con:\n\
             \"current_price\": precio como número (null si no hay precio claro),\n\
             \"currency\": código de moneda (normalmente \"CLP\"),\n\
             \"is_installment\": true si el único precio visible es una cuota,\n\
             \"confidence\": 0-100 qué tan seguro estás de la extracción",
            product_name, store, content
        );

        let chat = ChatRequest::new(prompt)
            .with_system("Eres un extractor de precios de tiendas en línea chilenas.");

        if let Some(extracted) = self.provider.complete_structured::<ExtractedPrice>(&chat).await {
            if let Some(price) = extracted.current_price {
                if extracted.confidence >= 50 && !extracted.is_installment {
                    return Some(CompetitorPrice {
                        store,
                        price,
                        currency: extracted.currency,
                        url,
                        confidence: extracted.confidence,
                        method: "llm",
                    });
                }
            }
        }

        self.regex_price(content).map(|price| CompetitorPrice {
            store,
            price,
            currency: default_currency(),
            url,
            confidence: 30,
            method: "regex",
        })
    }

    /// Own-page price: smallest plausible full price in the listing HTML
    fn own_price(&self, html: &str) -> Option<f64> {
        self.regex_price(html)
    }

    /// Pick candidates worth an extraction call: one per store, never the
    /// page's own domain, and only results with price-looking content
    fn select_candidates(
        &self,
        results: &[SearchHit],
        own_domain: &str,
    ) -> Vec<(String, String, String)> {
        let mut seen_domains = HashSet::new();
        let mut candidates = Vec::new();
        for result in results {
            let domain = extract_domain(&result.url).to_lowercase();
            if domain.contains(own_domain) || own_domain.contains(&domain) {
                continue;
            }
            if !seen_domains.insert(domain.clone()) {
                continue;
            }
            if !self.price_hint_re.is_match(&result.content) {
                continue;
            }
            candidates.push((domain, result.url.clone(), result.content.clone()));
            if candidates.len() >= MAX_CANDIDATES {
                break;
            }
        }
        candidates
    }
}

#[async_trait]
impl Agent for PriceComparisonAgent {
    type Request = AnalysisRequest;

    fn name(&self) -> &'static str {
        "price_comparison"
    }

    async fn analyze(&self, request: &AnalysisRequest) -> AgentResult<AgentOutcome> {
        let mut outcome = AgentOutcome::default();

        let Some(search) = &self.search else {
            outcome.flags.push(Flag::info(
                "Price comparison skipped (TAVILY_API_KEY not configured)",
            ));
            outcome
                .details
                .insert("price_comparison_checked".to_string(), json!(false));
            return Ok(outcome);
        };

        let Some(title) = request.title.as_deref().filter(|t| !t.trim().is_empty()) else {
            outcome
                .details
                .insert("price_comparison_checked".to_string(), json!(false));
            outcome
                .details
                .insert("reason".to_string(), json!("No product title available"));
            return Ok(outcome);
        };

        let product_name = extract_product_name(title);
        let own_domain = extract_domain(&request.url).to_lowercase();
        let query = format!("comprar \"{}\" precio Chile", product_name);
        let response = search.search_or_empty(&query, 20).await;

        let candidates = self.select_candidates(&response.results, &own_domain);

        let extractions = candidates.into_iter().map(|(store, url, content)| {
            let product_name = product_name.clone();
            async move {
                self.extract_competitor_price(&product_name, store, url, &content)
                    .await
            }
        });
        let competitor_prices: Vec<CompetitorPrice> = futures::future::join_all(extractions)
            .await
            .into_iter()
            .flatten()
            .collect();

        if !competitor_prices.is_empty() {
            outcome.flags.push(Flag::info(format!(
                "💡 Encontramos este producto en otras {} tiendas. ¡Compara precios!",
                competitor_prices.len()
            )));
        }

        // Position the page's own price against the field
        let own_price = self.own_price(&request.html_content);
        let mut price_verdict = None;
        if let (Some(own), false) = (own_price, competitor_prices.is_empty()) {
            let min_price = competitor_prices
                .iter()
                .map(|c| c.price)
                .fold(f64::INFINITY, f64::min);
            let mean_price = competitor_prices.iter().map(|c| c.price).sum::<f64>()
                / competitor_prices.len() as f64;

            let verdict = if own <= min_price * 1.05 {
                "good"
            } else if own <= mean_price * 1.10 {
                "average"
            } else {
                "high"
            };
            if verdict == "high" {
                if let Some(cheapest) = competitor_prices
                    .iter()
                    .min_by(|a, b| a.price.total_cmp(&b.price))
                {
                    outcome.flags.push(Flag::warning(format!(
                        "Este producto está más barato en {} (${:.0})",
                        cheapest.store, cheapest.price
                    )));
                }
            }
            price_verdict = Some(verdict);
        }

        outcome
            .details
            .insert("price_comparison_checked".to_string(), json!(true));
        outcome
            .details
            .insert("product_name".to_string(), json!(product_name));
        outcome
            .details
            .insert("stores_found".to_string(), json!(competitor_prices.len()));
        outcome
            .details
            .insert("competitor_prices".to_string(), json!(competitor_prices));
        outcome
            .details
            .insert("own_price".to_string(), json!(own_price));
        outcome
            .details
            .insert("price_verdict".to_string(), json!(price_verdict));

        info!(
            stores = competitor_prices.len(),
            product = %product_name,
            "Price comparison complete"
        );

        // Comparison is advisory; it never moves the score
        outcome.score_impact = 0;
        Ok(outcome)
    }
}
