use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Owned;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Garage {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub address: String,
    pub city: Option<String>,
    pub longitude: f64,
    pub latitude: f64,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub business_hours: BusinessHours,
    pub status: GarageStatus,
    pub is_verified: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub stats: GarageStats,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GarageStatus {
    Pending,
    Active,
    Suspended,
}

impl GarageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GarageStatus::Pending => "pending",
            GarageStatus::Active => "active",
            GarageStatus::Suspended => "suspended",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(GarageStatus::Pending),
            "active" => Some(GarageStatus::Active),
            "suspended" => Some(GarageStatus::Suspended),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GarageStats {
    pub total_bookings: i64,
    pub completed_bookings: i64,
    pub average_rating: f64,
    pub total_reviews: i64,
}

/// Opening hours for one weekday. Times are zero-padded "HH:MM" strings;
/// `closed` wins over whatever times are present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayHours {
    pub open: String,
    pub close: String,
    #[serde(default)]
    pub closed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessHours {
    pub monday: DayHours,
    pub tuesday: DayHours,
    pub wednesday: DayHours,
    pub thursday: DayHours,
    pub friday: DayHours,
    pub saturday: DayHours,
    pub sunday: DayHours,
}

impl BusinessHours {
    pub fn for_weekday(&self, weekday: Weekday) -> &DayHours {
        match weekday {
            Weekday::Mon => &self.monday,
            Weekday::Tue => &self.tuesday,
            Weekday::Wed => &self.wednesday,
            Weekday::Thu => &self.thursday,
            Weekday::Fri => &self.friday,
            Weekday::Sat => &self.saturday,
            Weekday::Sun => &self.sunday,
        }
    }

    /// Validates every open/close string parses as HH:MM and that open
    /// precedes close on days that aren't closed.
    pub fn validate(&self) -> Result<(), String> {
        for day in [
            &self.monday, &self.tuesday, &self.wednesday, &self.thursday,
            &self.friday, &self.saturday, &self.sunday,
        ] {
            if day.closed {
                continue;
            }
            let open = minutes_of_day(&day.open)
                .ok_or_else(|| format!("invalid opening time '{}'", day.open))?;
            let close = minutes_of_day(&day.close)
                .ok_or_else(|| format!("invalid closing time '{}'", day.close))?;
            if open >= close {
                return Err(format!("opening time {} is not before closing time {}", day.open, day.close));
            }
        }
        Ok(())
    }
}

impl Default for BusinessHours {
    fn default() -> Self {
        let weekday = DayHours {
            open: "09:00".to_string(),
            close: "18:00".to_string(),
            closed: false,
        };
        let sunday = DayHours {
            open: "00:00".to_string(),
            close: "00:00".to_string(),
            closed: true,
        };
        Self {
            monday: weekday.clone(),
            tuesday: weekday.clone(),
            wednesday: weekday.clone(),
            thursday: weekday.clone(),
            friday: weekday.clone(),
            saturday: weekday,
            sunday,
        }
    }
}

/// Parses a zero-padded "HH:MM" string into minutes since midnight.
/// Returns None for anything malformed or out of range.
pub fn minutes_of_day(s: &str) -> Option<u32> {
    let (h, m) = s.split_once(':')?;
    if h.len() != 2 || m.len() != 2 {
        return None;
    }
    let hours: u32 = h.parse().ok()?;
    let minutes: u32 = m.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(hours * 60 + minutes)
}

impl Garage {
    pub fn is_active(&self) -> bool {
        self.status == GarageStatus::Active
    }
}

impl Owned for Garage {
    fn owner_id(&self) -> Option<Uuid> {
        Some(self.owner_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateGarageRequest {
    pub name: String,
    pub description: Option<String>,
    pub address: String,
    pub city: Option<String>,
    pub longitude: f64,
    pub latitude: f64,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub business_hours: Option<BusinessHours>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateGarageRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub business_hours: Option<BusinessHours>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minutes_of_day_parses_valid_times() {
        assert_eq!(minutes_of_day("00:00"), Some(0));
        assert_eq!(minutes_of_day("09:30"), Some(570));
        assert_eq!(minutes_of_day("23:59"), Some(1439));
    }

    #[test]
    fn minutes_of_day_rejects_malformed_times() {
        assert_eq!(minutes_of_day("9:00"), None);
        assert_eq!(minutes_of_day("24:00"), None);
        assert_eq!(minutes_of_day("12:60"), None);
        assert_eq!(minutes_of_day("noon"), None);
        assert_eq!(minutes_of_day(""), None);
    }

    #[test]
    fn business_hours_validation_catches_inverted_days() {
        let mut hours = BusinessHours::default();
        hours.tuesday.open = "19:00".to_string();
        hours.tuesday.close = "09:00".to_string();
        assert!(hours.validate().is_err());

        // A closed day skips the time check entirely.
        hours.tuesday.closed = true;
        assert!(hours.validate().is_ok());
    }
}
