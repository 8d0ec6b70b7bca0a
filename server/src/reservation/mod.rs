//! Ticket inventory reservation engine.
//!
//! Every admission decision runs inside one store transaction that holds the
//! exclusive lock on the event row: lock, recount purchased tickets, decide,
//! insert, commit. Cancellation locks only the ticket row; it can only lower
//! the sold count.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::store::{StoreError, StoreTransaction};

pub mod booking_code;
pub mod capacity;
pub mod catalog;
pub mod coordinator;
pub mod guard;
pub mod lifecycle;
pub mod requester;


pub use booking_code::{BookingCodeGenerator, RandomBookingCodes};
pub use capacity::Availability;
pub use catalog::EventCatalog;
pub use coordinator::ReservationCoordinator;
pub use lifecycle::CancelRefusal;
pub use requester::{Requester, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    Internal,
}

#[derive(Debug, Error)]
pub enum ReservationError {
    #[error("{0}")]
    Validation(String),

    #[error("event {0} not found")]
    EventNotFound(Uuid),

    #[error("ticket {0} not found")]
    TicketNotFound(Uuid),

    #[error("event {event_id} is sold out ({capacity} tickets)")]
    CapacityExceeded { event_id: Uuid, capacity: i32 },

    #[error("ticket {ticket_id} cannot be cancelled: {reason}")]
    NotCancellable {
        ticket_id: Uuid,
        reason: CancelRefusal,
    },

    #[error("event {0} can no longer be modified")]
    EventNotModifiable(Uuid),

    #[error("capacity {requested} is below the {sold} tickets already sold")]
    CapacityBelowSold { requested: i32, sold: i64 },

    #[error("event {event_id} has {sold} tickets sold and cannot be deleted")]
    EventHasSoldTickets { event_id: Uuid, sold: i64 },

    #[error("event {0} has ticket history and cannot be deleted")]
    EventHasTicketHistory(Uuid),

    #[error("an event named '{0}' already exists")]
    DuplicateEvent(String),

    #[error("no unique booking code after {0} attempts")]
    BookingCodeExhausted(u32),

    #[error("{0} did not complete before its deadline")]
    DeadlineExceeded(&'static str),

    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    #[error("inconsistent state: {0}")]
    Internal(String),
}

impl ReservationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReservationError::Validation(_) => ErrorKind::Validation,
            ReservationError::EventNotFound(_) | ReservationError::TicketNotFound(_) => {
                ErrorKind::NotFound
            }
            ReservationError::CapacityExceeded { .. }
            | ReservationError::NotCancellable { .. }
            | ReservationError::EventNotModifiable(_)
            | ReservationError::CapacityBelowSold { .. }
            | ReservationError::EventHasSoldTickets { .. }
            | ReservationError::EventHasTicketHistory(_)
            | ReservationError::DuplicateEvent(_) => ErrorKind::Conflict,
            ReservationError::BookingCodeExhausted(_)
            | ReservationError::DeadlineExceeded(_)
            | ReservationError::Store(_)
            | ReservationError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Tunables for the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationSettings {
    /// Purchase attempts before a booking-code collision becomes fatal.
    pub max_code_attempts: u32,
    /// Deadline for one purchase or cancellation, retries included.
    pub operation_timeout: Duration,
}

impl Default for ReservationSettings {
    fn default() -> Self {
        Self {
            max_code_attempts: 5,
            operation_timeout: Duration::from_secs(5),
        }
    }
}

/// Commits on success, rolls back on any error. The transaction is consumed
/// on every path, which releases its row locks.
pub(crate) async fn settle<T, V>(
    tx: T,
    result: Result<V, ReservationError>,
) -> Result<V, ReservationError>
where
    T: StoreTransaction,
{
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}

pub(crate) fn require_id(id: Uuid, what: &str) -> Result<(), ReservationError> {
    if id.is_nil() {
        return Err(ReservationError::Validation(format!("{what} must not be nil")));
    }
    Ok(())
}
