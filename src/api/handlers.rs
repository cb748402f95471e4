use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    config::FeatureFlags,
    error::{AppError, AppResult},
    models::{
        FeedbackRequest, Interaction, RecommendationRequest, RecommendationResponse, Review,
        ReviewAnalysis, ReviewRequest,
    },
    services::{ArmId, ArmScore, LinUcb},
};

use super::AppState;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub context: Vec<f64>,
    pub candidates: Vec<ArmId>,
}

#[derive(Debug, Serialize)]
pub struct SelectResponse {
    pub arm: ArmId,
    pub score: ArmScore,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub arm: ArmId,
    pub context: Vec<f64>,
    pub reward: f64,
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub arm: ArmId,
    /// Observations folded into the arm so far
    pub updates: u64,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct BanditSummary {
    pub arms: usize,
    pub dimension: usize,
    pub alpha: f64,
}

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub features: FeatureFlags,
    pub bandit: Option<BanditSummary>,
    pub scorers: Vec<&'static str>,
    pub context_dim: usize,
    pub redis: bool,
    pub database: bool,
}

fn require_bandit(state: &AppState) -> AppResult<&LinUcb> {
    state
        .bandit()
        .map(|bandit| bandit.as_ref())
        .ok_or_else(|| AppError::NotFound("Contextual bandit is disabled".to_string()))
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Which capabilities this process was started with
pub async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let config = &state.config;
    Json(ConfigResponse {
        features: config.features.clone(),
        bandit: state.bandit().map(|bandit| BanditSummary {
            arms: bandit.arm_count(),
            dimension: bandit.dimension(),
            alpha: bandit.alpha(),
        }),
        scorers: state
            .recommender
            .scorer_kinds()
            .into_iter()
            .map(|kind| kind.as_str())
            .collect(),
        context_dim: state.recommender.contexts().dimension(),
        redis: config.enable_redis,
        database: config.database_url.is_some(),
    })
}

/// Runs a raw LinUCB selection over caller-supplied arms
pub async fn select_arm(
    State(state): State<AppState>,
    Json(request): Json<SelectRequest>,
) -> AppResult<Json<SelectResponse>> {
    let bandit = require_bandit(&state)?;
    let arm = bandit.select(&request.context, &request.candidates)?;
    let score = bandit.score(&request.context, arm)?;

    tracing::debug!(arm, candidates = request.candidates.len(), "Raw bandit selection");
    Ok(Json(SelectResponse { arm, score }))
}

/// Folds a caller-supplied reward into one arm
pub async fn update_arm(
    State(state): State<AppState>,
    Json(request): Json<UpdateRequest>,
) -> AppResult<Json<UpdateResponse>> {
    let bandit = require_bandit(&state)?;
    bandit.update(request.arm, &request.context, request.reward)?;
    let updates = bandit
        .stats(request.arm)
        .map(|stats| stats.updates())
        .unwrap_or_default();

    Ok(Json(UpdateResponse {
        arm: request.arm,
        updates,
    }))
}

pub async fn recommend(
    State(state): State<AppState>,
    Json(request): Json<RecommendationRequest>,
) -> AppResult<Json<RecommendationResponse>> {
    let response = state.recommender.recommend(&request).await?;
    Ok(Json(response))
}

/// Records how the user reacted to a recommendation
pub async fn feedback(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> AppResult<(StatusCode, Json<Interaction>)> {
    let interaction = state.recommender.feedback(request).await?;
    Ok((StatusCode::CREATED, Json(interaction)))
}

pub async fn analyze_review(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Json<ReviewAnalysis> {
    Json(state.reviews.analyze(&request.text))
}

/// Stores a review and refreshes its movie's rating
pub async fn create_review(
    State(state): State<AppState>,
    Json(request): Json<ReviewRequest>,
) -> AppResult<(StatusCode, Json<Review>)> {
    let review = state.reviews.submit(request).await?;
    Ok((StatusCode::CREATED, Json(review)))
}
