use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::Owned;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub car_owner_id: Uuid,
    pub garage_id: Uuid,
    pub rating: i64,
    pub title: Option<String>,
    pub comment: String,
    pub category_ratings: Option<BTreeMap<String, i64>>,
    pub response: Option<ReviewResponse>,
    pub helpful_votes: Vec<Uuid>,
    pub is_verified: bool,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The garage side's single reply to a review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub comment: String,
    pub responded_at: DateTime<Utc>,
    pub responded_by: Uuid,
}

impl Owned for Review {
    fn owner_id(&self) -> Option<Uuid> {
        Some(self.car_owner_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReviewRequest {
    pub booking_id: Uuid,
    pub garage_id: Uuid,
    pub rating: i64,
    pub title: Option<String>,
    pub comment: String,
    pub category_ratings: Option<BTreeMap<String, i64>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateReviewRequest {
    pub rating: Option<i64>,
    pub title: Option<String>,
    pub comment: Option<String>,
    pub category_ratings: Option<BTreeMap<String, i64>>,
}
