use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single offering in a garage's catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub garage_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: ServiceCategory,
    pub price_cents: i64,
    pub duration_minutes: i64,
    pub is_available: bool,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    Maintenance,
    Repair,
    Diagnostic,
    Bodywork,
    Tires,
    Electrical,
    Detailing,
    Inspection,
}

impl ServiceCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceCategory::Maintenance => "maintenance",
            ServiceCategory::Repair => "repair",
            ServiceCategory::Diagnostic => "diagnostic",
            ServiceCategory::Bodywork => "bodywork",
            ServiceCategory::Tires => "tires",
            ServiceCategory::Electrical => "electrical",
            ServiceCategory::Detailing => "detailing",
            ServiceCategory::Inspection => "inspection",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "maintenance" => Some(ServiceCategory::Maintenance),
            "repair" => Some(ServiceCategory::Repair),
            "diagnostic" => Some(ServiceCategory::Diagnostic),
            "bodywork" => Some(ServiceCategory::Bodywork),
            "tires" => Some(ServiceCategory::Tires),
            "electrical" => Some(ServiceCategory::Electrical),
            "detailing" => Some(ServiceCategory::Detailing),
            "inspection" => Some(ServiceCategory::Inspection),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub description: Option<String>,
    pub category: ServiceCategory,
    pub price_cents: i64,
    pub duration_minutes: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateServiceRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<ServiceCategory>,
    pub price_cents: Option<i64>,
    pub duration_minutes: Option<i64>,
    pub is_available: Option<bool>,
}
