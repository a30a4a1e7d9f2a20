use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::{
    domain::{Review, ReviewResponse},
    error::{AppError, Result},
    repository::ReviewRepository,
};

#[derive(FromRow)]
pub(crate) struct ReviewRow {
    id: String,
    booking_id: String,
    car_owner_id: String,
    garage_id: String,
    rating: i64,
    title: Option<String>,
    comment: String,
    category_ratings: Option<String>,
    response_comment: Option<String>,
    responded_at: Option<NaiveDateTime>,
    responded_by: Option<String>,
    helpful_votes: String,
    is_verified: i32,
    is_deleted: i32,
    deleted_at: Option<NaiveDateTime>,
    deleted_by: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub(crate) const REVIEW_COLUMNS: &str =
    "id, booking_id, car_owner_id, garage_id, rating, title, comment, \
     category_ratings, response_comment, responded_at, responded_by, \
     helpful_votes, is_verified, is_deleted, deleted_at, deleted_by, \
     created_at, updated_at";

pub(crate) fn row_to_review(row: ReviewRow) -> Result<Review> {
    let category_ratings: Option<BTreeMap<String, i64>> = row
        .category_ratings
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| AppError::Database(format!("Invalid category ratings: {}", e)))?;

    let helpful_votes: Vec<Uuid> = serde_json::from_str(&row.helpful_votes)
        .map_err(|e| AppError::Database(format!("Invalid helpful votes: {}", e)))?;

    let response = match (row.response_comment, row.responded_at, row.responded_by) {
        (Some(comment), Some(at), Some(by)) => Some(ReviewResponse {
            comment,
            responded_at: DateTime::from_naive_utc_and_offset(at, Utc),
            responded_by: parse_uuid(&by)?,
        }),
        _ => None,
    };

    Ok(Review {
        id: parse_uuid(&row.id)?,
        booking_id: parse_uuid(&row.booking_id)?,
        car_owner_id: parse_uuid(&row.car_owner_id)?,
        garage_id: parse_uuid(&row.garage_id)?,
        rating: row.rating,
        title: row.title,
        comment: row.comment,
        category_ratings,
        response,
        helpful_votes,
        is_verified: row.is_verified != 0,
        is_deleted: row.is_deleted != 0,
        deleted_at: row.deleted_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
        deleted_by: row.deleted_by.as_deref().map(parse_uuid).transpose()?,
        created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
    })
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
}

pub struct SqliteReviewRepository {
    pool: SqlitePool,
}

impl SqliteReviewRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReviewRepository for SqliteReviewRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Review>> {
        let row = sqlx::query_as::<_, ReviewRow>(
            &format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = ? AND is_deleted = 0")
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(row_to_review(r)?)),
            None => Ok(None)
        }
    }

    async fn find_by_booking(&self, booking_id: Uuid) -> Result<Option<Review>> {
        let row = sqlx::query_as::<_, ReviewRow>(
            &format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE booking_id = ? AND is_deleted = 0")
        )
        .bind(booking_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(row_to_review(r)?)),
            None => Ok(None)
        }
    }

    async fn list_by_garage(&self, garage_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Review>> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            &format!(
                "SELECT {REVIEW_COLUMNS} FROM reviews \
                 WHERE garage_id = ? AND is_deleted = 0 \
                 ORDER BY created_at DESC LIMIT ? OFFSET ?"
            )
        )
        .bind(garage_id.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(row_to_review).collect()
    }

    async fn list_by_car_owner(&self, car_owner_id: Uuid) -> Result<Vec<Review>> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            &format!(
                "SELECT {REVIEW_COLUMNS} FROM reviews \
                 WHERE car_owner_id = ? AND is_deleted = 0 \
                 ORDER BY created_at DESC"
            )
        )
        .bind(car_owner_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(row_to_review).collect()
    }
}
