pub mod event;
pub mod ticket;

pub use event::{Event, EventChanges, EventStatus, NewEvent};
pub use ticket::{NewTicket, Ticket, TicketStatus};
