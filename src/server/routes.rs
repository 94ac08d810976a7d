//! Analysis endpoints
//!
//! Aggregation rules live here. The generic profile computes the score
//! from agent impacts; the marketplace profile delegates the final score
//! to the holistic agent and keeps the rule-derived breakdown as a
//! diagnostic alongside it.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::agents::Agent;
use crate::schemas::{
    AgentOutcome, AnalysisRequest, AnalysisResult, Details, MarketplaceRequest, RiskLevel,
    ScoreBreakdown,
};
use crate::server::AppState;

fn default_verdict_title(risk_level: RiskLevel) -> &'static str {
    match risk_level {
        RiskLevel::Safe => "Todo limpio, procede a gastar tu dinero.",
        RiskLevel::Suspicious => "Huele a humo... mira estos detalles.",
        RiskLevel::Dangerous => "¡FUEGO! Saca tu tarjeta de aquí.",
    }
}

/// Merge detail maps; later outcomes override earlier keys
fn merge_details(outcomes: &[&AgentOutcome]) -> Details {
    let mut merged = Details::new();
    for outcome in outcomes {
        for (key, value) in &outcome.details {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Health check reporting API key configuration status
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let configured = |present: bool| {
        if present {
            "✓ configured"
        } else {
            "✗ missing"
        }
    };

    Json(json!({
        "status": "ok",
        "service": "CartGuard API",
        "config": {
            "ANTHROPIC_API_KEY": configured(state.credentials.has_llm()),
            "TAVILY_API_KEY": configured(state.credentials.has_search()),
        }
    }))
}

/// Analyze a generic e-commerce page
pub async fn analyze_page(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalysisRequest>,
) -> Json<AnalysisResult> {
    info!(url = %request.url, "Analyzing e-commerce page");

    let (guard_res, reviews_res, price_res) = tokio::join!(
        state.guard.run(&request),
        state.reviews.run(&request),
        state.price_comparison.run(&request),
    );

    // Price comparison is advisory and never moves the score
    let final_score = (100 - guard_res.score_impact - reviews_res.score_impact).clamp(0, 100);
    let risk_level = RiskLevel::from_score(final_score);

    let verdict_title = guard_res
        .verdict_title
        .clone()
        .unwrap_or_else(|| default_verdict_title(risk_level).to_string());
    let verdict_message = guard_res
        .verdict_message
        .clone()
        .unwrap_or_else(|| "Revise los detalles a continuación.".to_string());

    let mut flags = Vec::new();
    flags.extend(guard_res.flags.iter().cloned());
    flags.extend(reviews_res.flags.iter().cloned());
    flags.extend(price_res.flags.iter().cloned());

    let details = merge_details(&[&guard_res, &reviews_res, &price_res]);

    let mut agent_outputs = Map::new();
    agent_outputs.insert("ecommerce_guard".to_string(), json!(guard_res));
    agent_outputs.insert("reviews".to_string(), json!(reviews_res));
    agent_outputs.insert("price_comparison".to_string(), json!(price_res));

    Json(AnalysisResult {
        score: final_score,
        risk_level,
        verdict_title,
        verdict_message,
        flags,
        details,
        agent_outputs: Some(agent_outputs),
        score_breakdown: None,
    })
}

/// Analyze a marketplace listing
pub async fn analyze_marketplace(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MarketplaceRequest>,
) -> Json<AnalysisResult> {
    info!(url = %request.url, platform = %request.platform, "Analyzing marketplace listing");

    // Phase 1: rule-based agents in parallel
    let (
        seller_res,
        history_res,
        pricing_res,
        price_analysis_res,
        image_res,
        red_flags_res,
        description_res,
    ) = tokio::join!(
        state.seller_trust.run(&request),
        state.seller_history.run(&request),
        state.pricing.run(&request),
        state.price_analysis.run(&request),
        state.image_analysis.run(&request),
        state.red_flags.run(&request),
        state.description_quality.run(&request),
    );

    let mut rule_based_flags = Vec::new();
    rule_based_flags.extend(seller_res.flags.iter().cloned());
    rule_based_flags.extend(history_res.flags.iter().cloned());
    rule_based_flags.extend(pricing_res.flags.iter().cloned());
    rule_based_flags.extend(price_analysis_res.flags.iter().cloned());
    rule_based_flags.extend(image_res.flags.iter().cloned());
    rule_based_flags.extend(red_flags_res.flags.iter().cloned());
    rule_based_flags.extend(description_res.flags.iter().cloned());

    // Impacts are subtracted from 100, so the breakdown negates them
    let score_breakdown = ScoreBreakdown {
        base_score: 100,
        seller_longevity: -seller_res.score_impact,
        post_history: -history_res.score_impact,
        description_quality: -description_res.score_impact,
        image_analysis: -image_res.score_impact,
        price_analysis: -(pricing_res.score_impact + price_analysis_res.score_impact),
        red_flags: -red_flags_res.score_impact,
        response_patterns: 0,
        ratings_impact: 0,
    };

    // Phase 2: holistic verdict owns the final score
    let image_analysis_details = image_res.details.get("ai_analysis").cloned();
    let verdict = state
        .supplier_confidence
        .assess(&request, &rule_based_flags, image_analysis_details.as_ref())
        .await;

    let final_score = verdict.score.clamp(0, 100);
    let risk_level = verdict
        .risk_level
        .unwrap_or_else(|| RiskLevel::from_score(final_score));

    let mut flags = rule_based_flags;
    flags.extend(verdict.outcome.flags.iter().cloned());

    let mut details = Details::new();
    details.insert("platform".to_string(), json!(request.platform));
    details.insert("seller".to_string(), json!(seller_res.details));
    details.insert("seller_history".to_string(), json!(history_res.details));
    details.insert("pricing".to_string(), json!(pricing_res.details));
    details.insert(
        "price_analysis".to_string(),
        json!(price_analysis_res.details),
    );
    details.insert("description".to_string(), json!(description_res.details));
    details.insert("images".to_string(), json!(image_res.details));
    details.insert("red_flags".to_string(), json!(red_flags_res.details));
    details.insert("ai_analysis".to_string(), json!(verdict.outcome.details));

    let mut agent_outputs = Map::new();
    agent_outputs.insert("seller_trust".to_string(), json!(seller_res));
    agent_outputs.insert("seller_history".to_string(), json!(history_res));
    agent_outputs.insert("pricing".to_string(), json!(pricing_res));
    agent_outputs.insert("price_analysis".to_string(), json!(price_analysis_res));
    agent_outputs.insert("description_quality".to_string(), json!(description_res));
    agent_outputs.insert("image_analysis".to_string(), json!(image_res));
    agent_outputs.insert("red_flags".to_string(), json!(red_flags_res));
    agent_outputs.insert("supplier_confidence".to_string(), json!(verdict.outcome));

    let verdict_title = verdict
        .outcome
        .verdict_title
        .clone()
        .unwrap_or_else(|| "Análisis completado".to_string());
    let verdict_message = verdict
        .outcome
        .verdict_message
        .clone()
        .unwrap_or_else(|| "Revisa las banderas de alerta arriba.".to_string());

    Json(AnalysisResult {
        score: final_score,
        risk_level,
        verdict_title,
        verdict_message,
        flags,
        details,
        agent_outputs: Some(agent_outputs),
        score_breakdown: Some(score_breakdown),
    })
}
