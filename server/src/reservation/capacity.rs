//! Sold counts are always derived by counting `purchased` tickets. Nothing
//! caches or increments them.

use serde::Serialize;
use uuid::Uuid;

use crate::models::{Event, TicketStatus};
use crate::store::{StoreResult, StoreTransaction, TicketStore};

/// Sold count as seen by the given transaction. Admission decisions must use
/// this after the event row is locked.
pub async fn sold_count<T: StoreTransaction>(tx: &mut T, event_id: Uuid) -> StoreResult<i64> {
    tx.count_tickets(event_id, TicketStatus::Purchased).await
}

pub fn has_capacity_for(event: &Event, sold: i64, requested: i64) -> bool {
    i64::from(event.capacity) >= sold + requested
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub event_id: Uuid,
    pub capacity: i32,
    pub tickets_sold: i64,
    pub remaining: i64,
}

impl Availability {
    pub fn of(event: &Event, sold: i64) -> Self {
        Self {
            event_id: event.id,
            capacity: event.capacity,
            tickets_sold: sold,
            remaining: (i64::from(event.capacity) - sold).max(0),
        }
    }
}

/// Best-effort view read outside any transaction; may be stale by the time
/// it is displayed.
pub async fn availability<S: TicketStore>(
    store: &S,
    event_id: Uuid,
) -> StoreResult<Option<Availability>> {
    let Some(event) = store.find_event(event_id).await? else {
        return Ok(None);
    };
    let sold = store.count_tickets(event_id, TicketStatus::Purchased).await?;
    Ok(Some(Availability::of(&event, sold)))
}
