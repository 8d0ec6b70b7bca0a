use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::event::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Purchased,
    Cancelled,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Purchased => "purchased",
            TicketStatus::Cancelled => "cancelled",
        }
    }
}

/// A ticket row. Tickets exist only once a purchase has committed and are
/// never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub status: TicketStatus,
    pub booking_code: String,
    pub price: Decimal,
    pub purchase_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A ticket about to be inserted by a purchase transaction.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub booking_code: String,
    pub price: Decimal,
    pub purchase_date: DateTime<Utc>,
}

impl NewTicket {
    pub fn for_event(event: &Event, user_id: Uuid, booking_code: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id: event.id,
            user_id,
            booking_code,
            price: event.price,
            purchase_date: now,
        }
    }

    pub fn into_ticket(self) -> Ticket {
        Ticket {
            id: self.id,
            event_id: self.event_id,
            user_id: self.user_id,
            status: TicketStatus::Purchased,
            booking_code: self.booking_code,
            price: self.price,
            purchase_date: self.purchase_date,
            created_at: self.purchase_date,
            updated_at: self.purchase_date,
        }
    }
}
