//! In-memory store with real blocking row locks.
//!
//! Each locked row is a `tokio::sync::Mutex` whose owned guard lives inside the
//! transaction, so a second transaction locking the same row waits until the
//! first one commits, rolls back, or is dropped. Writes are buffered in the
//! transaction and become visible to others only at commit.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};
use uuid::Uuid;

use crate::models::{Event, NewTicket, Ticket, TicketStatus};
use crate::store::{StoreError, StoreResult, StoreTransaction, TicketStore};

const BOOKING_CODE_CONSTRAINT: &str = "tickets_booking_code_key";
const EVENT_NAME_CONSTRAINT: &str = "events_name_key";
const TICKET_EVENT_CONSTRAINT: &str = "tickets_event_id_fkey";

/// Operations that can be made to fail once, for exercising rollback paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    InsertTicket,
    Commit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKey {
    Event(Uuid),
    Ticket(Uuid),
}

#[derive(Default)]
struct Tables {
    events: HashMap<Uuid, Event>,
    tickets: HashMap<Uuid, Ticket>,
    booking_codes: HashSet<String>,
}

impl Tables {
    fn event_referenced(&self, event_id: Uuid) -> bool {
        self.tickets.values().any(|ticket| ticket.event_id == event_id)
    }

    fn event_name_taken(&self, name: &str, except: Uuid) -> bool {
        self.events
            .values()
            .any(|event| event.id != except && event.name == name)
    }
}

#[derive(Default)]
struct Shared {
    tables: Mutex<Tables>,
    row_locks: Mutex<HashMap<RowKey, Arc<RowLock<()>>>>,
    faults: Mutex<Vec<FaultPoint>>,
}

impl Shared {
    fn row_lock(&self, key: RowKey) -> Arc<RowLock<()>> {
        self.row_locks.lock().entry(key).or_default().clone()
    }

    /// Drops the map entry once no transaction holds or awaits the lock.
    fn forget_idle(&self, key: RowKey) {
        let mut locks = self.row_locks.lock();
        if locks
            .get(&key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&key);
        }
    }

    fn trip(&self, point: FaultPoint) -> StoreResult<()> {
        let mut faults = self.faults.lock();
        match faults.iter().position(|armed| *armed == point) {
            Some(index) => {
                faults.remove(index);
                Err(StoreError::Unavailable(format!("injected fault at {point:?}")))
            }
            None => Ok(()),
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a one-shot failure at the given operation.
    pub fn fail_next(&self, point: FaultPoint) {
        self.shared.faults.lock().push(point);
    }

    #[cfg(test)]
    fn tracked_row_locks(&self) -> usize {
        self.shared.row_locks.lock().len()
    }

    /// Committed tickets of an event.
    pub fn tickets_for_event(&self, event_id: Uuid) -> Vec<Ticket> {
        self.shared
            .tables
            .lock()
            .tickets
            .values()
            .filter(|ticket| ticket.event_id == event_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TicketStore for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> StoreResult<InMemoryTransaction> {
        Ok(InMemoryTransaction {
            shared: Arc::clone(&self.shared),
            locks: HeldLocks {
                shared: Arc::clone(&self.shared),
                guards: HashMap::new(),
            },
            ticket_writes: HashMap::new(),
            inserted: HashSet::new(),
            event_writes: HashMap::new(),
            event_deletes: HashSet::new(),
        })
    }

    async fn find_event(&self, event_id: Uuid) -> StoreResult<Option<Event>> {
        Ok(self.shared.tables.lock().events.get(&event_id).cloned())
    }

    async fn count_tickets(&self, event_id: Uuid, status: TicketStatus) -> StoreResult<i64> {
        let tables = self.shared.tables.lock();
        let count = tables
            .tickets
            .values()
            .filter(|ticket| ticket.event_id == event_id && ticket.status == status)
            .count();
        Ok(count as i64)
    }

    async fn insert_event(&self, event: &Event) -> StoreResult<Event> {
        let mut tables = self.shared.tables.lock();
        if tables.events.contains_key(&event.id) || tables.event_name_taken(&event.name, event.id)
        {
            return Err(StoreError::UniqueViolation {
                constraint: EVENT_NAME_CONSTRAINT.to_string(),
            });
        }
        tables.events.insert(event.id, event.clone());
        Ok(event.clone())
    }
}

/// Row locks owned by one transaction, released together when it ends.
struct HeldLocks {
    shared: Arc<Shared>,
    guards: HashMap<RowKey, OwnedMutexGuard<()>>,
}

impl Drop for HeldLocks {
    fn drop(&mut self) {
        for (key, guard) in self.guards.drain() {
            drop(guard);
            self.shared.forget_idle(key);
        }
    }
}

pub struct InMemoryTransaction {
    shared: Arc<Shared>,
    locks: HeldLocks,
    ticket_writes: HashMap<Uuid, Ticket>,
    inserted: HashSet<Uuid>,
    event_writes: HashMap<Uuid, Event>,
    event_deletes: HashSet<Uuid>,
}

impl InMemoryTransaction {
    async fn acquire(&mut self, key: RowKey) {
        if self.locks.guards.contains_key(&key) {
            return;
        }
        let lock = self.shared.row_lock(key);
        let guard = lock.lock_owned().await;
        self.locks.guards.insert(key, guard);
    }

    fn read_event(&self, event_id: Uuid) -> Option<Event> {
        if self.event_deletes.contains(&event_id) {
            return None;
        }
        if let Some(event) = self.event_writes.get(&event_id) {
            return Some(event.clone());
        }
        self.shared.tables.lock().events.get(&event_id).cloned()
    }

    fn read_ticket(&self, ticket_id: Uuid) -> Option<Ticket> {
        if let Some(ticket) = self.ticket_writes.get(&ticket_id) {
            return Some(ticket.clone());
        }
        self.shared.tables.lock().tickets.get(&ticket_id).cloned()
    }

    fn count_visible(&self, event_id: Uuid, status: TicketStatus) -> usize {
        let matches = |ticket: &Ticket| ticket.event_id == event_id && ticket.status == status;
        let tables = self.shared.tables.lock();
        let committed = tables
            .tickets
            .values()
            .filter(|ticket| !self.ticket_writes.contains_key(&ticket.id))
            .filter(|ticket| matches(*ticket))
            .count();
        let pending = self
            .ticket_writes
            .values()
            .filter(|ticket| matches(*ticket))
            .count();
        committed + pending
    }

    fn booking_code_pending(&self, code: &str) -> bool {
        self.inserted
            .iter()
            .filter_map(|id| self.ticket_writes.get(id))
            .any(|ticket| ticket.booking_code == code)
    }

    fn apply(self) -> StoreResult<()> {
        let mut tables = self.shared.tables.lock();

        for id in &self.inserted {
            if let Some(ticket) = self.ticket_writes.get(id) {
                if tables.booking_codes.contains(&ticket.booking_code) {
                    return Err(StoreError::UniqueViolation {
                        constraint: BOOKING_CODE_CONSTRAINT.to_string(),
                    });
                }
            }
        }
        for event_id in &self.event_deletes {
            if tables.event_referenced(*event_id) {
                return Err(StoreError::ForeignKeyViolation {
                    constraint: TICKET_EVENT_CONSTRAINT.to_string(),
                });
            }
        }
        for event in self.event_writes.values() {
            if tables.event_name_taken(&event.name, event.id) {
                return Err(StoreError::UniqueViolation {
                    constraint: EVENT_NAME_CONSTRAINT.to_string(),
                });
            }
        }

        for (id, ticket) in self.ticket_writes {
            if self.inserted.contains(&id) {
                tables.booking_codes.insert(ticket.booking_code.clone());
            }
            tables.tickets.insert(id, ticket);
        }
        for (id, event) in self.event_writes {
            tables.events.insert(id, event);
        }
        for id in &self.event_deletes {
            tables.events.remove(id);
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn lock_event_for_update(&mut self, event_id: Uuid) -> StoreResult<Option<Event>> {
        if self.read_event(event_id).is_none() {
            return Ok(None);
        }
        self.acquire(RowKey::Event(event_id)).await;
        Ok(self.read_event(event_id))
    }

    async fn find_event(&mut self, event_id: Uuid) -> StoreResult<Option<Event>> {
        Ok(self.read_event(event_id))
    }

    async fn count_tickets(&mut self, event_id: Uuid, status: TicketStatus) -> StoreResult<i64> {
        Ok(self.count_visible(event_id, status) as i64)
    }

    async fn insert_ticket(&mut self, ticket: &NewTicket) -> StoreResult<Ticket> {
        self.shared.trip(FaultPoint::InsertTicket)?;

        if self.read_event(ticket.event_id).is_none() {
            return Err(StoreError::NotFound);
        }
        let taken = self
            .shared
            .tables
            .lock()
            .booking_codes
            .contains(&ticket.booking_code);
        if taken || self.booking_code_pending(&ticket.booking_code) {
            return Err(StoreError::UniqueViolation {
                constraint: BOOKING_CODE_CONSTRAINT.to_string(),
            });
        }

        let row = ticket.clone().into_ticket();
        self.inserted.insert(row.id);
        self.ticket_writes.insert(row.id, row.clone());
        Ok(row)
    }

    async fn lock_ticket_for_update(&mut self, ticket_id: Uuid) -> StoreResult<Option<Ticket>> {
        if self.read_ticket(ticket_id).is_none() {
            return Ok(None);
        }
        self.acquire(RowKey::Ticket(ticket_id)).await;
        Ok(self.read_ticket(ticket_id))
    }

    async fn update_ticket_status(
        &mut self,
        ticket_id: Uuid,
        status: TicketStatus,
    ) -> StoreResult<Ticket> {
        let mut ticket = self.read_ticket(ticket_id).ok_or(StoreError::NotFound)?;
        ticket.status = status;
        ticket.updated_at = Utc::now();
        self.ticket_writes.insert(ticket_id, ticket.clone());
        Ok(ticket)
    }

    async fn update_event(&mut self, event: &Event) -> StoreResult<Event> {
        if self.read_event(event.id).is_none() {
            return Err(StoreError::NotFound);
        }
        self.event_writes.insert(event.id, event.clone());
        Ok(event.clone())
    }

    async fn delete_event(&mut self, event_id: Uuid) -> StoreResult<()> {
        if self.read_event(event_id).is_none() {
            return Err(StoreError::NotFound);
        }
        let pending_reference = self
            .ticket_writes
            .values()
            .any(|ticket| ticket.event_id == event_id);
        if pending_reference || self.shared.tables.lock().event_referenced(event_id) {
            return Err(StoreError::ForeignKeyViolation {
                constraint: TICKET_EVENT_CONSTRAINT.to_string(),
            });
        }
        self.event_writes.remove(&event_id);
        self.event_deletes.insert(event_id);
        Ok(())
    }

    async fn commit(self) -> StoreResult<()> {
        self.shared.trip(FaultPoint::Commit)?;
        self.apply()
    }

    async fn rollback(self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use std::time::Duration as StdDuration;

    use crate::models::{EventStatus, NewEvent};

    async fn store_with_event(capacity: i32) -> (InMemoryStore, Event) {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let event = NewEvent {
            name: format!("memory-{}", Uuid::new_v4()),
            description: None,
            location: "Room 1".to_string(),
            capacity,
            price: Decimal::new(1000, 2),
            status: EventStatus::Active,
            start_date: now + Duration::days(1),
            end_date: now + Duration::days(2),
        }
        .into_event(Uuid::new_v4(), now);
        let event = store.insert_event(&event).await.unwrap();
        (store, event)
    }

    fn new_ticket(event: &Event, code: &str) -> NewTicket {
        NewTicket::for_event(event, Uuid::new_v4(), code.to_string(), Utc::now())
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_invisible_to_others() {
        let (store, event) = store_with_event(5).await;

        let mut tx = store.begin().await.unwrap();
        tx.insert_ticket(&new_ticket(&event, "A-1")).await.unwrap();
        assert_eq!(tx.count_tickets(event.id, TicketStatus::Purchased).await.unwrap(), 1);
        assert_eq!(
            store.count_tickets(event.id, TicketStatus::Purchased).await.unwrap(),
            0
        );

        tx.commit().await.unwrap();
        assert_eq!(
            store.count_tickets(event.id, TicketStatus::Purchased).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes_and_releases_lock() {
        let (store, event) = store_with_event(5).await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.lock_event_for_update(event.id).await.unwrap().unwrap();
            tx.insert_ticket(&new_ticket(&event, "A-1")).await.unwrap();
        }

        let mut tx = store.begin().await.unwrap();
        let locked = tokio::time::timeout(
            StdDuration::from_secs(1),
            tx.lock_event_for_update(event.id),
        )
        .await
        .expect("lock should be free after drop")
        .unwrap();
        assert!(locked.is_some());
        assert_eq!(tx.count_tickets(event.id, TicketStatus::Purchased).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_event_lock_blocks_second_locker() {
        let (store, event) = store_with_event(5).await;

        let mut first = store.begin().await.unwrap();
        first.lock_event_for_update(event.id).await.unwrap();

        let mut second = store.begin().await.unwrap();
        let blocked = tokio::time::timeout(
            StdDuration::from_millis(50),
            second.lock_event_for_update(event.id),
        )
        .await;
        assert!(blocked.is_err());

        first.rollback().await.unwrap();
        let acquired = tokio::time::timeout(
            StdDuration::from_secs(1),
            second.lock_event_for_update(event.id),
        )
        .await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn test_missing_event_does_not_block() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        assert!(tx.lock_event_for_update(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_booking_code_is_rejected() {
        let (store, event) = store_with_event(5).await;

        let mut tx = store.begin().await.unwrap();
        tx.insert_ticket(&new_ticket(&event, "DUP")).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let err = tx.insert_ticket(&new_ticket(&event, "DUP")).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_booking_code_detected_at_commit() {
        let (store, event) = store_with_event(5).await;

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.insert_ticket(&new_ticket(&event, "RACE")).await.unwrap();
        second.insert_ticket(&new_ticket(&event, "RACE")).await.unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { .. }));
        assert_eq!(store.tickets_for_event(event.id).len(), 1);
    }

    #[tokio::test]
    async fn test_released_row_locks_are_forgotten() {
        let (store, event) = store_with_event(5).await;

        let mut tx = store.begin().await.unwrap();
        tx.lock_event_for_update(event.id).await.unwrap();
        let ticket = tx.insert_ticket(&new_ticket(&event, "A-1")).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.tracked_row_locks(), 0);

        let mut tx = store.begin().await.unwrap();
        tx.lock_ticket_for_update(ticket.id).await.unwrap();
        assert_eq!(store.tracked_row_locks(), 1);
        tx.rollback().await.unwrap();
        assert_eq!(store.tracked_row_locks(), 0);
    }

    #[tokio::test]
    async fn test_lock_with_waiter_survives_release() {
        let (store, event) = store_with_event(5).await;

        let mut first = store.begin().await.unwrap();
        first.lock_event_for_update(event.id).await.unwrap();

        let waiter_store = store.clone();
        let event_id = event.id;
        let waiter = tokio::spawn(async move {
            let mut second = waiter_store.begin().await.unwrap();
            second.lock_event_for_update(event_id).await.unwrap();
            second
        });
        tokio::time::sleep(StdDuration::from_millis(20)).await;

        first.rollback().await.unwrap();
        let second = waiter.await.unwrap();
        assert_eq!(store.tracked_row_locks(), 1);

        drop(second);
        assert_eq!(store.tracked_row_locks(), 0);
    }

    #[tokio::test]
    async fn test_delete_event_refused_while_tickets_reference_it() {
        let (store, event) = store_with_event(5).await;

        let mut tx = store.begin().await.unwrap();
        tx.insert_ticket(&new_ticket(&event, "A-1")).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let err = tx.delete_event(event.id).await.unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation { .. }));
    }

    #[tokio::test]
    async fn test_delete_event_applies_at_commit() {
        let (store, event) = store_with_event(5).await;

        let mut tx = store.begin().await.unwrap();
        tx.delete_event(event.id).await.unwrap();
        assert!(tx.find_event(event.id).await.unwrap().is_none());
        assert!(store.find_event(event.id).await.unwrap().is_some());

        tx.commit().await.unwrap();
        assert!(store.find_event(event.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_injected_fault_fires_once() {
        let (store, event) = store_with_event(5).await;
        store.fail_next(FaultPoint::InsertTicket);

        let mut tx = store.begin().await.unwrap();
        let err = tx.insert_ticket(&new_ticket(&event, "A-1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(tx.insert_ticket(&new_ticket(&event, "A-1")).await.is_ok());
    }
}
