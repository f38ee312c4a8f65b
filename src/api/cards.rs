use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{request_id::RequestId, state::AppState};
use crate::error::{ApiError, AppError};
use crate::models::{Card, CardToken, CardTokenView, NewCard};

/// Body of the requests that only identify a card
#[derive(Debug, Deserialize)]
pub struct CardNumberRequest {
    pub card_number: String,
}

fn decode<T>(payload: Result<Json<T>, JsonRejection>, request_id: &str) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::new(AppError::BadRequest(e.body_text()), request_id))
}

fn require(value: &str, field: &str, request_id: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::new(
            AppError::BadRequest(format!("{} is required", field)),
            request_id,
        ));
    }
    Ok(())
}

async fn add_card(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    payload: Result<Json<NewCard>, JsonRejection>,
) -> Result<Json<Card>, ApiError> {
    let card = decode(payload, &request_id)?;
    require(&card.card_number, "card_number", &request_id)?;
    require(&card.account_id, "account_id", &request_id)?;

    let ctx = state.request_context(request_id);
    let card = state
        .service
        .add_card(&ctx, card)
        .await
        .map_err(|e| ApiError::new(e, &ctx.request_id))?;

    Ok(Json(card))
}

async fn get_card(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    Path(card_number): Path<String>,
) -> Result<Json<Card>, ApiError> {
    require(&card_number, "card_number", &request_id)?;

    let ctx = state.request_context(request_id);
    let card = state
        .service
        .get_card(&ctx, &card_number)
        .await
        .map_err(|e| ApiError::new(e, &ctx.request_id))?;

    Ok(Json(card))
}

async fn update_card(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    payload: Result<Json<CardNumberRequest>, JsonRejection>,
) -> Result<Json<Card>, ApiError> {
    let request = decode(payload, &request_id)?;
    require(&request.card_number, "card_number", &request_id)?;

    let ctx = state.request_context(request_id);
    let card = state
        .service
        .update_card(&ctx, &request.card_number)
        .await
        .map_err(|e| ApiError::new(e, &ctx.request_id))?;

    Ok(Json(card))
}

async fn create_card_token(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    payload: Result<Json<CardNumberRequest>, JsonRejection>,
) -> Result<Json<CardToken>, ApiError> {
    let request = decode(payload, &request_id)?;
    require(&request.card_number, "card_number", &request_id)?;

    let ctx = state.request_context(request_id);
    let token = state
        .service
        .create_card_token(&ctx, &request.card_number)
        .await
        .map_err(|e| ApiError::new(e, &ctx.request_id))?;

    Ok(Json(token))
}

async fn get_card_token(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    Path(token): Path<String>,
) -> Result<Json<Vec<CardTokenView>>, ApiError> {
    require(&token, "token", &request_id)?;

    let ctx = state.request_context(request_id);
    let tokens = state
        .service
        .get_card_token(&ctx, &token)
        .await
        .map_err(|e| ApiError::new(e, &ctx.request_id))?;

    Ok(Json(tokens))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/card", post(add_card))
        .route("/card/:id", get(get_card))
        .route("/atc", post(update_card))
        .route("/cardToken", post(create_card_token))
        .route("/cardToken/:id", get(get_card_token))
}
