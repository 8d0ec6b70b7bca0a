use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::models::{NewTicket, Ticket};
use crate::reservation::booking_code::BookingCodeGenerator;
use crate::reservation::{
    capacity, lifecycle, require_id, settle, Requester, ReservationError, ReservationSettings,
};
use crate::store::{StoreError, StoreTransaction, TicketStore};

/// Runs purchases and cancellations, each as one store transaction.
pub struct ReservationCoordinator<S: TicketStore> {
    store: S,
    codes: Arc<dyn BookingCodeGenerator>,
    settings: ReservationSettings,
}

impl<S: TicketStore> ReservationCoordinator<S> {
    pub fn new(
        store: S,
        codes: Arc<dyn BookingCodeGenerator>,
        settings: ReservationSettings,
    ) -> Self {
        Self {
            store,
            codes,
            settings,
        }
    }

    /// Buys one ticket for `user_id`. A booking-code collision rolls the whole
    /// transaction back and starts over with a fresh code.
    #[instrument(skip(self))]
    pub async fn purchase(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Ticket, ReservationError> {
        require_id(event_id, "event id")?;
        require_id(user_id, "user id")?;

        let attempts = self.settings.max_code_attempts.max(1);
        let ticket = self
            .with_deadline("purchase", async {
                for attempt in 1..=attempts {
                    match self.purchase_once(event_id, user_id).await {
                        Err(ReservationError::Store(StoreError::UniqueViolation { constraint })) => {
                            warn!(attempt, %constraint, "Booking code collision, retrying");
                        }
                        outcome => return outcome,
                    }
                }
                Err(ReservationError::BookingCodeExhausted(attempts))
            })
            .await?;

        info!(
            ticket_id = %ticket.id,
            booking_code = %ticket.booking_code,
            "Ticket purchased"
        );
        Ok(ticket)
    }

    /// Cancels a purchased ticket before its event starts. Tickets owned by
    /// someone else are reported as missing unless the requester is an admin.
    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        ticket_id: Uuid,
        requester: Requester,
    ) -> Result<Ticket, ReservationError> {
        require_id(ticket_id, "ticket id")?;

        let ticket = self
            .with_deadline("cancel", async {
                let mut tx = self.store.begin().await?;
                let result = Self::cancel_in(&mut tx, ticket_id, requester).await;
                settle(tx, result).await
            })
            .await?;

        info!(event_id = %ticket.event_id, "Ticket cancelled");
        Ok(ticket)
    }

    async fn purchase_once(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Ticket, ReservationError> {
        let mut tx = self.store.begin().await?;
        let result = self.admit(&mut tx, event_id, user_id).await;
        settle(tx, result).await
    }

    async fn admit(
        &self,
        tx: &mut S::Tx,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Ticket, ReservationError> {
        let event = tx
            .lock_event_for_update(event_id)
            .await?
            .ok_or(ReservationError::EventNotFound(event_id))?;

        let sold = capacity::sold_count(tx, event_id).await?;
        if !capacity::has_capacity_for(&event, sold, 1) {
            debug!(sold, capacity = event.capacity, "Purchase rejected, event is full");
            return Err(ReservationError::CapacityExceeded {
                event_id,
                capacity: event.capacity,
            });
        }

        let new_ticket = NewTicket::for_event(&event, user_id, self.codes.generate(), Utc::now());
        let ticket = tx.insert_ticket(&new_ticket).await?;
        Ok(ticket)
    }

    async fn cancel_in(
        tx: &mut S::Tx,
        ticket_id: Uuid,
        requester: Requester,
    ) -> Result<Ticket, ReservationError> {
        let ticket = tx
            .lock_ticket_for_update(ticket_id)
            .await?
            .filter(|ticket| requester.may_cancel(ticket))
            .ok_or(ReservationError::TicketNotFound(ticket_id))?;

        let event = tx.find_event(ticket.event_id).await?.ok_or_else(|| {
            ReservationError::Internal(format!(
                "ticket {ticket_id} references missing event {}",
                ticket.event_id
            ))
        })?;

        let next = lifecycle::check_cancellable(&ticket, &event, Utc::now())
            .map_err(|reason| ReservationError::NotCancellable { ticket_id, reason })?;

        let updated = tx.update_ticket_status(ticket_id, next).await?;
        Ok(updated)
    }

    /// Dropping the timed-out future drops its transaction, which rolls it back.
    async fn with_deadline<T, F>(
        &self,
        operation: &'static str,
        work: F,
    ) -> Result<T, ReservationError>
    where
        F: Future<Output = Result<T, ReservationError>>,
    {
        match tokio::time::timeout(self.settings.operation_timeout, work).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(operation, "Deadline exceeded, transaction abandoned");
                Err(ReservationError::DeadlineExceeded(operation))
            }
        }
    }
}
