use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Active,
    Ongoing,
    Completed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Active => "active",
            EventStatus::Ongoing => "ongoing",
            EventStatus::Completed => "completed",
        }
    }
}

/// An event row. The number of tickets sold is never stored here; see
/// [`crate::reservation::capacity`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub location: String,
    pub capacity: i32,
    pub price: Decimal,
    pub status: EventStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub location: String,
    pub capacity: i32,
    pub price: Decimal,
    #[serde(default)]
    pub status: EventStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Payload for replacing the mutable fields of an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventChanges {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub location: String,
    pub capacity: i32,
    pub price: Decimal,
    pub status: EventStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl NewEvent {
    pub fn into_event(self, created_by: Uuid, now: DateTime<Utc>) -> Event {
        Event {
            id: Uuid::new_v4(),
            name: self.name,
            description: self.description,
            location: self.location,
            capacity: self.capacity,
            price: self.price,
            status: self.status,
            start_date: self.start_date,
            end_date: self.end_date,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Event {
    pub fn apply(&mut self, changes: EventChanges, now: DateTime<Utc>) {
        self.name = changes.name;
        self.description = changes.description;
        self.location = changes.location;
        self.capacity = changes.capacity;
        self.price = changes.price;
        self.status = changes.status;
        self.start_date = changes.start_date;
        self.end_date = changes.end_date;
        self.updated_at = now;
    }
}
