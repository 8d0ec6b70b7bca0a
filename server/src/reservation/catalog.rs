//! Administrative event writes. Updates take the same event-row lock as
//! purchases, so capacity can never be lowered beneath a concurrent sale.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::{Event, EventChanges, NewEvent};
use crate::reservation::{capacity, guard, require_id, settle, Availability, ReservationError};
use crate::store::{StoreError, StoreTransaction, TicketStore};

pub struct EventCatalog<S: TicketStore> {
    store: S,
}

struct EventFields<'a> {
    name: &'a str,
    location: &'a str,
    capacity: i32,
    price: Decimal,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
}

fn validate(fields: EventFields<'_>) -> Result<(), ReservationError> {
    if fields.name.trim().is_empty() {
        return Err(ReservationError::Validation("name is required".to_string()));
    }
    if fields.location.trim().is_empty() {
        return Err(ReservationError::Validation("location is required".to_string()));
    }
    if fields.capacity < 1 {
        return Err(ReservationError::Validation(
            "capacity must be at least 1".to_string(),
        ));
    }
    if fields.price.is_sign_negative() {
        return Err(ReservationError::Validation(
            "price must not be negative".to_string(),
        ));
    }
    if fields.end_date <= fields.start_date {
        return Err(ReservationError::Validation(
            "end_date must be after start_date".to_string(),
        ));
    }
    Ok(())
}

fn duplicate_name(err: ReservationError, name: &str) -> ReservationError {
    match err {
        ReservationError::Store(StoreError::UniqueViolation { .. }) => {
            ReservationError::DuplicateEvent(name.to_string())
        }
        other => other,
    }
}

impl<S: TicketStore> EventCatalog<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(skip(self, new_event), fields(name = %new_event.name))]
    pub async fn create_event(
        &self,
        new_event: NewEvent,
        created_by: Uuid,
    ) -> Result<Event, ReservationError> {
        validate(EventFields {
            name: &new_event.name,
            location: &new_event.location,
            capacity: new_event.capacity,
            price: new_event.price,
            start_date: new_event.start_date,
            end_date: new_event.end_date,
        })?;
        require_id(created_by, "creator id")?;

        let name = new_event.name.clone();
        let event = new_event.into_event(created_by, Utc::now());
        let event = self
            .store
            .insert_event(&event)
            .await
            .map_err(|err| duplicate_name(err.into(), &name))?;

        info!(event_id = %event.id, capacity = event.capacity, "Event created");
        Ok(event)
    }

    #[instrument(skip(self, changes))]
    pub async fn update_event(
        &self,
        event_id: Uuid,
        changes: EventChanges,
    ) -> Result<Event, ReservationError> {
        require_id(event_id, "event id")?;
        validate(EventFields {
            name: &changes.name,
            location: &changes.location,
            capacity: changes.capacity,
            price: changes.price,
            start_date: changes.start_date,
            end_date: changes.end_date,
        })?;

        let name = changes.name.clone();
        let mut tx = self.store.begin().await?;
        let result = Self::update_in(&mut tx, event_id, changes).await;
        let event = settle(tx, result)
            .await
            .map_err(|err| duplicate_name(err, &name))?;

        info!(capacity = event.capacity, status = event.status.as_str(), "Event updated");
        Ok(event)
    }

    /// Deletes an event nobody holds a ticket for. Takes the event-row lock so
    /// a concurrent purchase either lands first and blocks the delete, or
    /// finds the event gone.
    #[instrument(skip(self))]
    pub async fn delete_event(&self, event_id: Uuid) -> Result<(), ReservationError> {
        require_id(event_id, "event id")?;

        let mut tx = self.store.begin().await?;
        let result = Self::delete_in(&mut tx, event_id).await;
        settle(tx, result).await.map_err(|err| match err {
            ReservationError::Store(StoreError::ForeignKeyViolation { .. }) => {
                ReservationError::EventHasTicketHistory(event_id)
            }
            other => other,
        })?;

        info!("Event deleted");
        Ok(())
    }

    pub async fn availability(&self, event_id: Uuid) -> Result<Availability, ReservationError> {
        capacity::availability(&self.store, event_id)
            .await?
            .ok_or(ReservationError::EventNotFound(event_id))
    }

    /// Capacity, dates and price stay editable after the first sale while the
    /// event is modifiable. The "immutable once any ticket is sold" rule is
    /// enforced as: capacity never drops below the purchased count observed
    /// under the event lock.
    async fn update_in(
        tx: &mut S::Tx,
        event_id: Uuid,
        changes: EventChanges,
    ) -> Result<Event, ReservationError> {
        let mut event = tx
            .lock_event_for_update(event_id)
            .await?
            .ok_or(ReservationError::EventNotFound(event_id))?;

        if !guard::can_be_modified(&event) {
            return Err(ReservationError::EventNotModifiable(event_id));
        }

        let sold = capacity::sold_count(tx, event_id).await?;
        if i64::from(changes.capacity) < sold {
            return Err(ReservationError::CapacityBelowSold {
                requested: changes.capacity,
                sold,
            });
        }

        event.apply(changes, Utc::now());
        Ok(tx.update_event(&event).await?)
    }

    async fn delete_in(tx: &mut S::Tx, event_id: Uuid) -> Result<(), ReservationError> {
        tx.lock_event_for_update(event_id)
            .await?
            .ok_or(ReservationError::EventNotFound(event_id))?;

        let sold = capacity::sold_count(tx, event_id).await?;
        if sold > 0 {
            return Err(ReservationError::EventHasSoldTickets { event_id, sold });
        }

        match tx.delete_event(event_id).await {
            Err(StoreError::NotFound) => Err(ReservationError::EventNotFound(event_id)),
            other => Ok(other?),
        }
    }
}
