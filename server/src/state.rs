use std::sync::Arc;

use crate::reservation::{
    BookingCodeGenerator, EventCatalog, ReservationCoordinator, ReservationSettings,
};
use crate::store::TicketStore;

/// Shared handler state; both services sit on the same store.
pub struct AppState<S: TicketStore> {
    pub coordinator: Arc<ReservationCoordinator<S>>,
    pub catalog: Arc<EventCatalog<S>>,
}

impl<S: TicketStore + Clone> AppState<S> {
    pub fn new(
        store: S,
        codes: Arc<dyn BookingCodeGenerator>,
        settings: ReservationSettings,
    ) -> Self {
        Self {
            coordinator: Arc::new(ReservationCoordinator::new(store.clone(), codes, settings)),
            catalog: Arc::new(EventCatalog::new(store)),
        }
    }
}

impl<S: TicketStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
            catalog: Arc::clone(&self.catalog),
        }
    }
}
