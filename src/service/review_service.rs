use chrono::{Duration, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    auth::authorize_owner,
    domain::{BookingStatus, CreateReviewRequest, Review, UpdateReviewRequest, User},
    error::{AppError, Result},
    repository::review_repository::{row_to_review, ReviewRow, REVIEW_COLUMNS},
    service::booking_service::load_booking,
};

const EDIT_WINDOW_DAYS: i64 = 30;

/// The review gate: one review per booking, only after the booking reached
/// an eligible state, with the garage rating aggregates maintained in the
/// same transaction.
pub struct ReviewService {
    pool: SqlitePool,
}

impl ReviewService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, actor: &User, request: CreateReviewRequest) -> Result<Review> {
        validate_rating(request.rating)?;
        if let Some(categories) = &request.category_ratings {
            for rating in categories.values() {
                validate_rating(*rating)?;
            }
        }
        if request.comment.trim().is_empty() {
            return Err(AppError::Validation("Review comment is required".to_string()));
        }

        let mut tx = self.pool.begin().await.map_err(|e| AppError::Database(e.to_string()))?;

        let booking = load_booking(&mut *tx, request.booking_id).await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        if booking.car_owner_id != actor.id {
            return Err(AppError::Forbidden);
        }
        if !matches!(booking.status, BookingStatus::Completed | BookingStatus::Approved) {
            return Err(AppError::Validation(
                "Booking must be approved or completed before it can be reviewed".to_string(),
            ));
        }
        if booking.garage_id != request.garage_id {
            return Err(AppError::Validation(
                "Garage does not match the booking".to_string(),
            ));
        }

        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM reviews WHERE booking_id = ? AND is_deleted = 0"
        )
        .bind(request.booking_id.to_string())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if existing > 0 {
            return Err(AppError::Conflict("Booking already has a review".to_string()));
        }

        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();
        let category_ratings = request
            .category_ratings
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| AppError::Internal(e.to_string()))?;
        // Verified means the reviewer's work was actually carried out.
        let is_verified = booking.status == BookingStatus::Completed;

        sqlx::query(
            r#"
            INSERT INTO reviews (
                id, booking_id, car_owner_id, garage_id, rating, title,
                comment, category_ratings, helpful_votes, is_verified,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, '[]', ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(request.booking_id.to_string())
        .bind(actor.id.to_string())
        .bind(request.garage_id.to_string())
        .bind(request.rating)
        .bind(&request.title)
        .bind(&request.comment)
        .bind(&category_ratings)
        .bind(is_verified as i32)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if crate::error::is_unique_violation(&e) {
                AppError::Conflict("Booking already has a review".to_string())
            } else {
                AppError::Database(e.to_string())
            }
        })?;

        sqlx::query(
            r#"
            UPDATE garages SET
                average_rating = (average_rating * total_reviews + ?) / (total_reviews + 1),
                total_reviews = total_reviews + 1,
                updated_at = ?
            WHERE id = ?
            "#
        )
        .bind(request.rating as f64)
        .bind(now)
        .bind(request.garage_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let review = load_review(&mut *tx, id).await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created review".to_string()))?;

        tx.commit().await.map_err(|e| AppError::Database(e.to_string()))?;

        Ok(review)
    }

    pub async fn update(&self, actor: &User, review_id: Uuid, update: UpdateReviewRequest) -> Result<Review> {
        if let Some(rating) = update.rating {
            validate_rating(rating)?;
        }

        let mut tx = self.pool.begin().await.map_err(|e| AppError::Database(e.to_string()))?;

        let review = load_review(&mut *tx, review_id).await?
            .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;

        authorize_owner(actor, &review)?;

        if !actor.is_admin() && Utc::now() - review.created_at > Duration::days(EDIT_WINDOW_DAYS) {
            return Err(AppError::Validation(format!(
                "Reviews can only be edited within {} days of creation",
                EDIT_WINDOW_DAYS
            )));
        }

        let rating = update.rating.unwrap_or(review.rating);
        let title = update.title.or(review.title.clone());
        let comment = update.comment.unwrap_or_else(|| review.comment.clone());
        let category_ratings = update
            .category_ratings
            .as_ref()
            .or(review.category_ratings.as_ref())
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            UPDATE reviews
            SET rating = ?, title = ?, comment = ?, category_ratings = ?, updated_at = ?
            WHERE id = ?
            "#
        )
        .bind(rating)
        .bind(&title)
        .bind(&comment)
        .bind(&category_ratings)
        .bind(now)
        .bind(review_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if rating != review.rating {
            sqlx::query(
                r#"
                UPDATE garages SET
                    average_rating = CASE WHEN total_reviews > 0
                        THEN average_rating + (? - ?) * 1.0 / total_reviews
                        ELSE 0 END,
                    updated_at = ?
                WHERE id = ?
                "#
            )
            .bind(rating as f64)
            .bind(review.rating as f64)
            .bind(now)
            .bind(review.garage_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        }

        let updated = load_review(&mut *tx, review_id).await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated review".to_string()))?;

        tx.commit().await.map_err(|e| AppError::Database(e.to_string()))?;

        Ok(updated)
    }

    /// Attaches the garage's one-and-only reply to a review.
    pub async fn respond(&self, actor: &User, review_id: Uuid, comment: String) -> Result<Review> {
        if comment.trim().is_empty() {
            return Err(AppError::Validation("Response comment is required".to_string()));
        }

        let mut tx = self.pool.begin().await.map_err(|e| AppError::Database(e.to_string()))?;

        let review = load_review(&mut *tx, review_id).await?
            .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;

        authorize_garage_side(&mut *tx, actor, review.garage_id).await?;

        if review.response.is_some() {
            return Err(AppError::Conflict("Garage has already responded to this review".to_string()));
        }

        let now = Utc::now().naive_utc();
        sqlx::query(
            r#"
            UPDATE reviews
            SET response_comment = ?, responded_at = ?, responded_by = ?, updated_at = ?
            WHERE id = ?
            "#
        )
        .bind(&comment)
        .bind(now)
        .bind(actor.id.to_string())
        .bind(now)
        .bind(review_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let updated = load_review(&mut *tx, review_id).await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated review".to_string()))?;

        tx.commit().await.map_err(|e| AppError::Database(e.to_string()))?;

        Ok(updated)
    }

    pub async fn update_response(&self, actor: &User, review_id: Uuid, comment: String) -> Result<Review> {
        if comment.trim().is_empty() {
            return Err(AppError::Validation("Response comment is required".to_string()));
        }

        let mut tx = self.pool.begin().await.map_err(|e| AppError::Database(e.to_string()))?;

        let review = load_review(&mut *tx, review_id).await?
            .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;

        authorize_garage_side(&mut *tx, actor, review.garage_id).await?;

        if review.response.is_none() {
            return Err(AppError::NotFound("Review has no response".to_string()));
        }

        let now = Utc::now().naive_utc();
        sqlx::query("UPDATE reviews SET response_comment = ?, updated_at = ? WHERE id = ?")
            .bind(&comment)
            .bind(now)
            .bind(review_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let updated = load_review(&mut *tx, review_id).await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated review".to_string()))?;

        tx.commit().await.map_err(|e| AppError::Database(e.to_string()))?;

        Ok(updated)
    }

    pub async fn withdraw_response(&self, actor: &User, review_id: Uuid) -> Result<Review> {
        let mut tx = self.pool.begin().await.map_err(|e| AppError::Database(e.to_string()))?;

        let review = load_review(&mut *tx, review_id).await?
            .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;

        authorize_garage_side(&mut *tx, actor, review.garage_id).await?;

        if review.response.is_none() {
            return Err(AppError::NotFound("Review has no response".to_string()));
        }

        let now = Utc::now().naive_utc();
        sqlx::query(
            r#"
            UPDATE reviews
            SET response_comment = NULL, responded_at = NULL, responded_by = NULL, updated_at = ?
            WHERE id = ?
            "#
        )
        .bind(now)
        .bind(review_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let updated = load_review(&mut *tx, review_id).await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated review".to_string()))?;

        tx.commit().await.map_err(|e| AppError::Database(e.to_string()))?;

        Ok(updated)
    }

    /// Toggles the caller's helpful vote on a review.
    pub async fn toggle_helpful(&self, actor: &User, review_id: Uuid) -> Result<Review> {
        let mut tx = self.pool.begin().await.map_err(|e| AppError::Database(e.to_string()))?;

        let mut review = load_review(&mut *tx, review_id).await?
            .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;

        if let Some(pos) = review.helpful_votes.iter().position(|id| *id == actor.id) {
            review.helpful_votes.remove(pos);
        } else {
            review.helpful_votes.push(actor.id);
        }

        let votes = serde_json::to_string(&review.helpful_votes)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let now = Utc::now().naive_utc();

        sqlx::query("UPDATE reviews SET helpful_votes = ?, updated_at = ? WHERE id = ?")
            .bind(&votes)
            .bind(now)
            .bind(review_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let updated = load_review(&mut *tx, review_id).await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated review".to_string()))?;

        tx.commit().await.map_err(|e| AppError::Database(e.to_string()))?;

        Ok(updated)
    }

    /// Soft-deletes the review and backs its rating out of the garage
    /// aggregates.
    pub async fn soft_delete(&self, actor: &User, review_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| AppError::Database(e.to_string()))?;

        let review = load_review(&mut *tx, review_id).await?
            .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;

        authorize_owner(actor, &review)?;

        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            UPDATE reviews
            SET is_deleted = 1, deleted_at = ?, deleted_by = ?, updated_at = ?
            WHERE id = ?
            "#
        )
        .bind(now)
        .bind(actor.id.to_string())
        .bind(now)
        .bind(review_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            UPDATE garages SET
                average_rating = CASE WHEN total_reviews > 1
                    THEN (average_rating * total_reviews - ?) / (total_reviews - 1)
                    ELSE 0 END,
                total_reviews = MAX(total_reviews - 1, 0),
                updated_at = ?
            WHERE id = ?
            "#
        )
        .bind(review.rating as f64)
        .bind(now)
        .bind(review.garage_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        tx.commit().await.map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }
}

fn validate_rating(rating: i64) -> Result<()> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::Validation("Rating must be between 1 and 5".to_string()));
    }
    Ok(())
}

async fn load_review(tx: &mut SqliteConnection, id: Uuid) -> Result<Option<Review>> {
    let row = sqlx::query_as::<_, ReviewRow>(
        &format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = ? AND is_deleted = 0")
    )
    .bind(id.to_string())
    .fetch_optional(tx)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    match row {
        Some(r) => Ok(Some(row_to_review(r)?)),
        None => Ok(None),
    }
}

/// Garage-side authorization: the garage's owner or an admin.
async fn authorize_garage_side(
    tx: &mut SqliteConnection,
    actor: &User,
    garage_id: Uuid,
) -> Result<()> {
    if actor.is_admin() {
        return Ok(());
    }

    let owner_id = sqlx::query_scalar::<_, String>("SELECT owner_id FROM garages WHERE id = ?")
        .bind(garage_id.to_string())
        .fetch_one(tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    if owner_id != actor.id.to_string() {
        return Err(AppError::Forbidden);
    }

    Ok(())
}
