use crate::models::{Event, EventStatus};

/// Events that are ongoing or completed are frozen. Callers must hold the
/// event row lock when acting on the answer.
pub fn can_be_modified(event: &Event) -> bool {
    !matches!(event.status, EventStatus::Completed | EventStatus::Ongoing)
}
