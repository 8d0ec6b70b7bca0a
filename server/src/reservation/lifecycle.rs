//! Ticket lifecycle.
//!
//! `purchased` is entered only by inserting a ticket in a purchase
//! transaction; `cancelled` is terminal. Freed capacity is resold through a
//! new ticket, never by reviving a cancelled one.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::models::{Event, Ticket, TicketStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketTransition {
    Cancel,
}

const TRANSITIONS: &[(TicketStatus, TicketTransition, TicketStatus)] = &[(
    TicketStatus::Purchased,
    TicketTransition::Cancel,
    TicketStatus::Cancelled,
)];

/// Looks up the target state; `None` means the transition is not allowed.
pub fn transition(from: TicketStatus, via: TicketTransition) -> Option<TicketStatus> {
    TRANSITIONS
        .iter()
        .find(|(source, edge, _)| *source == from && *edge == via)
        .map(|(_, _, target)| *target)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelRefusal {
    NotPurchased(TicketStatus),
    EventStarted,
}

impl fmt::Display for CancelRefusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelRefusal::NotPurchased(status) => write!(f, "ticket is {}", status.as_str()),
            CancelRefusal::EventStarted => write!(f, "event has already started"),
        }
    }
}

/// Guard for cancellation: the ticket is purchased and `now` is strictly
/// before the event start.
pub fn check_cancellable(
    ticket: &Ticket,
    event: &Event,
    now: DateTime<Utc>,
) -> Result<TicketStatus, CancelRefusal> {
    let next = transition(ticket.status, TicketTransition::Cancel)
        .ok_or(CancelRefusal::NotPurchased(ticket.status))?;
    if now >= event.start_date {
        return Err(CancelRefusal::EventStarted);
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use crate::models::{EventStatus, NewEvent, NewTicket};

    fn event_starting_at(start: DateTime<Utc>) -> Event {
        NewEvent {
            name: "Lifecycle".to_string(),
            description: None,
            location: "Arena".to_string(),
            capacity: 10,
            price: Decimal::new(500, 2),
            status: EventStatus::Active,
            start_date: start,
            end_date: start + Duration::hours(2),
        }
        .into_event(Uuid::new_v4(), Utc::now())
    }

    fn ticket_for(event: &Event) -> Ticket {
        NewTicket::for_event(event, Uuid::new_v4(), "TKT-LIFE".to_string(), Utc::now())
            .into_ticket()
    }

    #[test]
    fn test_cancel_is_the_only_edge_out_of_purchased() {
        assert_eq!(
            transition(TicketStatus::Purchased, TicketTransition::Cancel),
            Some(TicketStatus::Cancelled)
        );
    }

    #[test]
    fn test_cancelled_is_terminal() {
        assert_eq!(
            transition(TicketStatus::Cancelled, TicketTransition::Cancel),
            None
        );
    }

    #[test]
    fn test_cancellable_before_start() {
        let now = Utc::now();
        let event = event_starting_at(now + Duration::hours(1));
        let ticket = ticket_for(&event);

        assert_eq!(
            check_cancellable(&ticket, &event, now),
            Ok(TicketStatus::Cancelled)
        );
    }

    #[test]
    fn test_not_cancellable_at_or_after_start() {
        let now = Utc::now();
        let event = event_starting_at(now);
        let ticket = ticket_for(&event);

        assert_eq!(
            check_cancellable(&ticket, &event, now),
            Err(CancelRefusal::EventStarted)
        );
        assert_eq!(
            check_cancellable(&ticket, &event, now + Duration::minutes(5)),
            Err(CancelRefusal::EventStarted)
        );
    }

    #[test]
    fn test_already_cancelled_ticket_is_refused() {
        let now = Utc::now();
        let event = event_starting_at(now + Duration::days(1));
        let mut ticket = ticket_for(&event);
        ticket.status = TicketStatus::Cancelled;

        assert_eq!(
            check_cancellable(&ticket, &event, now),
            Err(CancelRefusal::NotPurchased(TicketStatus::Cancelled))
        );
    }
}
