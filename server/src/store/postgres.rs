use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::models::{Event, NewTicket, Ticket, TicketStatus};
use crate::store::{StoreError, StoreResult, StoreTransaction, TicketStore};

const EVENT_COLUMNS: &str = "id, name, description, location, capacity, price, status, \
     start_date, end_date, created_by, created_at, updated_at";

const TICKET_COLUMNS: &str = "id, event_id, user_id, status, booking_code, price, \
     purchase_date, created_at, updated_at";

/// PostgreSQL-backed store. Row locks are `SELECT ... FOR UPDATE`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

fn map_write_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let constraint = db_err.constraint().unwrap_or("unknown").to_string();
        if db_err.is_unique_violation() {
            return StoreError::UniqueViolation { constraint };
        }
        if db_err.is_foreign_key_violation() {
            return StoreError::ForeignKeyViolation { constraint };
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl TicketStore for PgStore {
    type Tx = PgTransaction;

    async fn begin(&self) -> StoreResult<PgTransaction> {
        let tx = self.pool.begin().await?;
        Ok(PgTransaction { tx })
    }

    async fn find_event(&self, event_id: Uuid) -> StoreResult<Option<Event>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1");
        let event = sqlx::query_as::<_, Event>(&sql)
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }

    async fn count_tickets(&self, event_id: Uuid, status: TicketStatus) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM tickets WHERE event_id = $1 AND status = $2",
        )
        .bind(event_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn insert_event(&self, event: &Event) -> StoreResult<Event> {
        let sql = format!(
            "INSERT INTO events ({EVENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {EVENT_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, Event>(&sql)
            .bind(event.id)
            .bind(&event.name)
            .bind(&event.description)
            .bind(&event.location)
            .bind(event.capacity)
            .bind(event.price)
            .bind(event.status)
            .bind(event.start_date)
            .bind(event.end_date)
            .bind(event.created_by)
            .bind(event.created_at)
            .bind(event.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_error)?;
        Ok(inserted)
    }
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn lock_event_for_update(&mut self, event_id: Uuid) -> StoreResult<Option<Event>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1 FOR UPDATE");
        let event = sqlx::query_as::<_, Event>(&sql)
            .bind(event_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(event)
    }

    async fn find_event(&mut self, event_id: Uuid) -> StoreResult<Option<Event>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1");
        let event = sqlx::query_as::<_, Event>(&sql)
            .bind(event_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(event)
    }

    async fn count_tickets(&mut self, event_id: Uuid, status: TicketStatus) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM tickets WHERE event_id = $1 AND status = $2",
        )
        .bind(event_id)
        .bind(status)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn insert_ticket(&mut self, ticket: &NewTicket) -> StoreResult<Ticket> {
        let sql = format!(
            "INSERT INTO tickets (id, event_id, user_id, status, booking_code, price, purchase_date) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {TICKET_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, Ticket>(&sql)
            .bind(ticket.id)
            .bind(ticket.event_id)
            .bind(ticket.user_id)
            .bind(TicketStatus::Purchased)
            .bind(&ticket.booking_code)
            .bind(ticket.price)
            .bind(ticket.purchase_date)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_write_error)?;
        Ok(inserted)
    }

    async fn lock_ticket_for_update(&mut self, ticket_id: Uuid) -> StoreResult<Option<Ticket>> {
        let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1 FOR UPDATE");
        let ticket = sqlx::query_as::<_, Ticket>(&sql)
            .bind(ticket_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(ticket)
    }

    async fn update_ticket_status(
        &mut self,
        ticket_id: Uuid,
        status: TicketStatus,
    ) -> StoreResult<Ticket> {
        let sql = format!(
            "UPDATE tickets SET status = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING {TICKET_COLUMNS}"
        );
        sqlx::query_as::<_, Ticket>(&sql)
            .bind(ticket_id)
            .bind(status)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn update_event(&mut self, event: &Event) -> StoreResult<Event> {
        let sql = format!(
            "UPDATE events SET name = $2, description = $3, location = $4, capacity = $5, \
             price = $6, status = $7, start_date = $8, end_date = $9, updated_at = $10 \
             WHERE id = $1 RETURNING {EVENT_COLUMNS}"
        );
        sqlx::query_as::<_, Event>(&sql)
            .bind(event.id)
            .bind(&event.name)
            .bind(&event.description)
            .bind(&event.location)
            .bind(event.capacity)
            .bind(event.price)
            .bind(event.status)
            .bind(event.start_date)
            .bind(event.end_date)
            .bind(event.updated_at)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_write_error)?
            .ok_or(StoreError::NotFound)
    }

    async fn delete_event(&mut self, event_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(event_id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_write_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await.map_err(map_write_error)
    }

    async fn rollback(self) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
