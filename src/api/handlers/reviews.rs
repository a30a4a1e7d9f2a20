use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{CreateReviewRequest, Review, UpdateReviewRequest},
    error::{AppError, Result},
};

#[derive(Debug, Serialize)]
pub struct ReviewResponseDto {
    pub comment: String,
    pub responded_at: String,
}

#[derive(Debug, Serialize)]
pub struct ReviewDto {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub car_owner_id: Uuid,
    pub garage_id: Uuid,
    pub rating: i64,
    pub title: Option<String>,
    pub comment: String,
    pub category_ratings: Option<BTreeMap<String, i64>>,
    pub response: Option<ReviewResponseDto>,
    pub helpful_count: usize,
    pub is_verified: bool,
    pub created_at: String,
}

impl From<Review> for ReviewDto {
    fn from(review: Review) -> Self {
        Self {
            id: review.id,
            booking_id: review.booking_id,
            car_owner_id: review.car_owner_id,
            garage_id: review.garage_id,
            rating: review.rating,
            title: review.title,
            comment: review.comment,
            category_ratings: review.category_ratings,
            response: review.response.map(|r| ReviewResponseDto {
                comment: r.comment,
                responded_at: r.responded_at.to_rfc3339(),
            }),
            helpful_count: review.helpful_votes.len(),
            is_verified: review.is_verified,
            created_at: review.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewDto {
    pub booking_id: Uuid,
    pub garage_id: Uuid,
    #[validate(range(min = 1, max = 5))]
    pub rating: i64,
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub comment: String,
    pub category_ratings: Option<BTreeMap<String, i64>>,
}

pub async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(dto): Json<CreateReviewDto>,
) -> Result<(StatusCode, Json<ReviewDto>)> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let review = state.service_context.review_service
        .create(&current.user, CreateReviewRequest {
            booking_id: dto.booking_id,
            garage_id: dto.garage_id,
            rating: dto.rating,
            title: dto.title,
            comment: dto.comment,
            category_ratings: dto.category_ratings,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(review.into())))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Public: a garage's reviews.
pub async fn list_by_garage(
    State(state): State<AppState>,
    Path(garage_id): Path<Uuid>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ReviewDto>>> {
    let reviews = state.service_context.review_repo
        .list_by_garage(garage_id, params.limit, params.offset)
        .await?;

    Ok(Json(reviews.into_iter().map(Into::into).collect()))
}

pub async fn mine(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<ReviewDto>>> {
    let reviews = state.service_context.review_repo
        .list_by_car_owner(current.user.id)
        .await?;

    Ok(Json(reviews.into_iter().map(Into::into).collect()))
}

pub async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(update): Json<UpdateReviewRequest>,
) -> Result<Json<ReviewDto>> {
    let review = state.service_context.review_service
        .update(&current.user, id, update)
        .await?;

    Ok(Json(review.into()))
}

pub async fn delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.service_context.review_service
        .soft_delete(&current.user, id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ResponseRequest {
    pub comment: String,
}

pub async fn respond(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ResponseRequest>,
) -> Result<(StatusCode, Json<ReviewDto>)> {
    let review = state.service_context.review_service
        .respond(&current.user, id, req.comment)
        .await?;

    Ok((StatusCode::CREATED, Json(review.into())))
}

pub async fn update_response(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ResponseRequest>,
) -> Result<Json<ReviewDto>> {
    let review = state.service_context.review_service
        .update_response(&current.user, id, req.comment)
        .await?;

    Ok(Json(review.into()))
}

pub async fn withdraw_response(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ReviewDto>> {
    let review = state.service_context.review_service
        .withdraw_response(&current.user, id)
        .await?;

    Ok(Json(review.into()))
}

pub async fn toggle_helpful(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ReviewDto>> {
    let review = state.service_context.review_service
        .toggle_helpful(&current.user, id)
        .await?;

    Ok(Json(review.into()))
}
