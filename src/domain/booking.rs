use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{minutes_of_day, Owned};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub car_owner_id: Uuid,
    pub garage_id: Uuid,
    pub service_id: Uuid,
    pub date: NaiveDate,
    pub time_slot: TimeSlot,
    pub status: BookingStatus,
    pub vehicle: VehicleInfo,
    pub notes: Option<String>,
    pub attachments: Vec<String>,
    pub is_paid: bool,
    pub payment_id: Option<Uuid>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeSlot {
    pub start: String,
    pub end: String,
}

impl TimeSlot {
    /// Parses both endpoints, requiring start < end. Returns minutes since
    /// midnight for each.
    pub fn as_minutes(&self) -> Option<(u32, u32)> {
        let start = minutes_of_day(&self.start)?;
        let end = minutes_of_day(&self.end)?;
        if start < end {
            Some((start, end))
        } else {
            None
        }
    }

    pub fn duration_minutes(&self) -> Option<u32> {
        self.as_minutes().map(|(start, end)| end - start)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleInfo {
    pub make: String,
    pub model: String,
    pub year: Option<i64>,
    pub license_plate: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Approved,
    Rejected,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    /// The transition table. Terminal states have no outgoing edges.
    pub fn can_transition_to(self, target: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, target),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Approved, InProgress)
                | (Approved, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        use BookingStatus::*;
        matches!(self, Completed | Cancelled | Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Approved => "approved",
            BookingStatus::Rejected => "rejected",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "approved" => Some(BookingStatus::Approved),
            "rejected" => Some(BookingStatus::Rejected),
            "in_progress" => Some(BookingStatus::InProgress),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    /// Default history reason when the caller doesn't supply one.
    pub fn default_reason(self) -> String {
        match self {
            BookingStatus::Pending => "Booking created".to_string(),
            BookingStatus::Approved => "Booking approved".to_string(),
            BookingStatus::Rejected => "Booking rejected".to_string(),
            BookingStatus::InProgress => "Work started".to_string(),
            BookingStatus::Completed => "Work completed".to_string(),
            BookingStatus::Cancelled => "Booking cancelled".to_string(),
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub status: BookingStatus,
    pub changed_by: Uuid,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl Owned for Booking {
    fn owner_id(&self) -> Option<Uuid> {
        Some(self.car_owner_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    pub garage_id: Uuid,
    pub service_id: Uuid,
    pub date: NaiveDate,
    pub time_slot: TimeSlot,
    pub vehicle: VehicleInfo,
    pub notes: Option<String>,
}

/// Outcome of an availability query.
#[derive(Debug, Clone, Serialize)]
pub struct Availability {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Availability {
    pub fn open() -> Self {
        Self { available: true, reason: None }
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        Self { available: false, reason: Some(reason.into()) }
    }
}

/// Per-status booking counts for a garage or for the whole platform.
#[derive(Debug, Clone, Serialize, Default)]
pub struct BookingStatistics {
    pub total: i64,
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub cancelled: i64,
}

#[cfg(test)]
mod tests {
    use super::BookingStatus::*;

    #[test]
    fn transition_table_matches_lifecycle() {
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Approved.can_transition_to(InProgress));
        assert!(Approved.can_transition_to(Cancelled));
        assert!(InProgress.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Cancelled));

        // No skipping ahead, no leaving terminal states.
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(InProgress));
        assert!(!Approved.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Rejected.can_transition_to(Approved));
    }

    #[test]
    fn terminal_states() {
        assert!(Completed.is_terminal());
        assert!(Cancelled.is_terminal());
        assert!(Rejected.is_terminal());
        assert!(!Pending.is_terminal());
        assert!(!Approved.is_terminal());
        assert!(!InProgress.is_terminal());
    }

    #[test]
    fn slot_duration() {
        use super::TimeSlot;
        let slot = TimeSlot { start: "09:00".to_string(), end: "10:30".to_string() };
        assert_eq!(slot.duration_minutes(), Some(90));

        let inverted = TimeSlot { start: "10:00".to_string(), end: "09:00".to_string() };
        assert_eq!(inverted.as_minutes(), None);
    }
}
