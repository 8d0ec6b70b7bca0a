//! Persistence collaborator used by the reservation engine.
//!
//! A [`StoreTransaction`] owns every row lock it acquires. Locks are released
//! when the transaction commits, rolls back, or is dropped; dropping an
//! uncommitted transaction discards its writes.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Event, NewTicket, Ticket, TicketStatus};

pub mod memory;
pub mod postgres;

pub use memory::{FaultPoint, InMemoryStore, InMemoryTransaction};
pub use postgres::{PgStore, PgTransaction};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("foreign key violated: {constraint}")]
    ForeignKeyViolation { constraint: String },

    #[error("record not found")]
    NotFound,

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait TicketStore: Send + Sync + 'static {
    type Tx: StoreTransaction;

    async fn begin(&self) -> StoreResult<Self::Tx>;

    /// Unlocked read, suitable for display only.
    async fn find_event(&self, event_id: Uuid) -> StoreResult<Option<Event>>;

    /// Unlocked count, suitable for display only.
    async fn count_tickets(&self, event_id: Uuid, status: TicketStatus) -> StoreResult<i64>;

    async fn insert_event(&self, event: &Event) -> StoreResult<Event>;
}

#[async_trait]
pub trait StoreTransaction: Send + Sized {
    /// Blocking exclusive read of an event row, held until the transaction ends.
    async fn lock_event_for_update(&mut self, event_id: Uuid) -> StoreResult<Option<Event>>;

    async fn find_event(&mut self, event_id: Uuid) -> StoreResult<Option<Event>>;

    async fn count_tickets(&mut self, event_id: Uuid, status: TicketStatus) -> StoreResult<i64>;

    /// Fails with [`StoreError::UniqueViolation`] when the booking code is taken.
    async fn insert_ticket(&mut self, ticket: &NewTicket) -> StoreResult<Ticket>;

    async fn lock_ticket_for_update(&mut self, ticket_id: Uuid) -> StoreResult<Option<Ticket>>;

    async fn update_ticket_status(
        &mut self,
        ticket_id: Uuid,
        status: TicketStatus,
    ) -> StoreResult<Ticket>;

    async fn update_event(&mut self, event: &Event) -> StoreResult<Event>;

    /// Fails with [`StoreError::ForeignKeyViolation`] while tickets reference
    /// the event.
    async fn delete_event(&mut self, event_id: Uuid) -> StoreResult<()>;

    async fn commit(self) -> StoreResult<()>;

    async fn rollback(self) -> StoreResult<()>;
}
