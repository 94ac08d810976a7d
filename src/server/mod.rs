//! CartGuard HTTP server
//!
//! Thin axum surface over the analysis agents. Two POST endpoints mirror
//! the two analysis profiles (generic e-commerce page, marketplace
//! listing) and the root endpoint reports key configuration for quick
//! extension-side diagnostics.

pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tracing::{info, warn};

use crate::agents::guard::GuardAgent;
use crate::agents::marketplace::{
    DescriptionQualityAgent, ImageAnalysisAgent, PriceAnalysisAgent, PricingAgent, RedFlagsAgent,
    SellerHistoryAgent, SellerTrustAgent, SupplierConfidenceAgent,
};
use crate::agents::price_comparison::PriceComparisonAgent;
use crate::agents::reviews::ReviewsAgent;
use crate::ai::CapabilityProvider;
use crate::config::{Credentials, ServerConfig};
use crate::search::SearchClient;
use crate::server::routes::{analyze_marketplace, analyze_page, health};

/// Everything the handlers need, shared across requests
pub struct AppState {
    pub credentials: Credentials,
    pub guard: GuardAgent,
    pub reviews: ReviewsAgent,
    pub price_comparison: PriceComparisonAgent,
    pub seller_trust: SellerTrustAgent,
    pub seller_history: SellerHistoryAgent,
    pub pricing: PricingAgent,
    pub price_analysis: PriceAnalysisAgent,
    pub image_analysis: ImageAnalysisAgent,
    pub red_flags: RedFlagsAgent,
    pub description_quality: DescriptionQualityAgent,
    pub supplier_confidence: SupplierConfidenceAgent,
}

impl AppState {
    pub fn new(credentials: Credentials) -> Self {
        let provider = Arc::new(CapabilityProvider::new(&credentials));

        let search = credentials
            .tavily_api_key
            .as_deref()
            .and_then(|key| match SearchClient::new(key) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    warn!("Failed to build search client: {}", e);
                    None
                }
            });

        Self {
            guard: GuardAgent::new(provider.clone()),
            reviews: ReviewsAgent::new(provider.clone(), search.clone()),
            price_comparison: PriceComparisonAgent::new(provider.clone(), search),
            seller_trust: SellerTrustAgent::new(),
            seller_history: SellerHistoryAgent::new(),
            pricing: PricingAgent::new(),
            price_analysis: PriceAnalysisAgent::new(),
            image_analysis: ImageAnalysisAgent::new(provider.clone()),
            red_flags: RedFlagsAgent::new(),
            description_quality: DescriptionQualityAgent::new(),
            supplier_confidence: SupplierConfidenceAgent::new(provider),
            credentials,
        }
    }
}

/// CartGuard server instance
pub struct CartGuardServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl CartGuardServer {
    pub fn new(config: ServerConfig, credentials: Credentials) -> Self {
        let state = Arc::new(AppState::new(credentials));
        Self { config, state }
    }

    /// Start the HTTP server
    pub async fn start(&self) -> anyhow::Result<()> {
        let addr: SocketAddr = self
            .config
            .bind_addr()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid address: {}", e))?;

        info!("Starting CartGuard server on {}", addr);

        let app = self.build_router();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind: {}", e))?;

        info!("CartGuard server listening on {}", addr);
        info!("Analysis endpoints: POST /analyze, POST /analyze/marketplace");

        axum::serve(listener, app)
            .await
            .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

        Ok(())
    }

    /// Build the axum router
    pub fn build_router(&self) -> Router {
        // Browser extensions call from arbitrary page origins
        let cors = if self.config.enable_cors {
            tower_http::cors::CorsLayer::permissive()
        } else {
            tower_http::cors::CorsLayer::new()
        };

        Router::new()
            .route("/", get(health))
            .route("/analyze", post(analyze_page))
            .route("/analyze/marketplace", post(analyze_marketplace))
            .with_state(self.state.clone())
            .layer(cors)
    }
}
