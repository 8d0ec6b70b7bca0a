use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::create_cors_layer;
use crate::handlers::{
    cancel_ticket, create_event, delete_event, event_availability, health_check, purchase_ticket,
    update_event,
};
use crate::state::AppState;
use crate::store::TicketStore;

pub fn create_routes<S: TicketStore>(state: AppState<S>, cors_origins: Option<&str>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/events", post(create_event::<S>))
        .route(
            "/events/:id",
            put(update_event::<S>).delete(delete_event::<S>),
        )
        .route("/events/:id/availability", get(event_availability::<S>))
        .route("/events/:id/tickets", post(purchase_ticket::<S>))
        .route("/tickets/:id/cancel", post(cancel_ticket::<S>))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(create_cors_layer(cors_origins))
}
