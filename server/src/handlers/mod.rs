use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{EventChanges, NewEvent};
use crate::reservation::Requester;
use crate::state::AppState;
use crate::store::TicketStore;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

pub mod identity;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "ticketing-api",
    };

    success(payload, "Health check successful")
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::ValidationError(format!("Invalid {what} '{raw}'")))
}

fn require_admin(requester: &Requester) -> Result<(), AppError> {
    if requester.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Admin role required".to_string()))
    }
}

pub async fn create_event<S: TicketStore>(
    State(state): State<AppState<S>>,
    requester: Requester,
    Json(payload): Json<NewEvent>,
) -> Result<Response, AppError> {
    require_admin(&requester)?;
    let event = state
        .catalog
        .create_event(payload, requester.user_id)
        .await?;
    Ok(created(event, "Event created successfully"))
}

pub async fn update_event<S: TicketStore>(
    State(state): State<AppState<S>>,
    requester: Requester,
    Path(event_id): Path<String>,
    Json(payload): Json<EventChanges>,
) -> Result<Response, AppError> {
    require_admin(&requester)?;
    let event_id = parse_id(&event_id, "event id")?;
    let event = state.catalog.update_event(event_id, payload).await?;
    Ok(success(event, "Event updated successfully"))
}

pub async fn delete_event<S: TicketStore>(
    State(state): State<AppState<S>>,
    requester: Requester,
    Path(event_id): Path<String>,
) -> Result<Response, AppError> {
    require_admin(&requester)?;
    let event_id = parse_id(&event_id, "event id")?;
    state.catalog.delete_event(event_id).await?;
    Ok(success(event_id, "Event deleted successfully"))
}

pub async fn event_availability<S: TicketStore>(
    State(state): State<AppState<S>>,
    Path(event_id): Path<String>,
) -> Result<Response, AppError> {
    let event_id = parse_id(&event_id, "event id")?;
    let availability = state.catalog.availability(event_id).await?;
    Ok(success(availability, "Availability retrieved successfully"))
}

pub async fn purchase_ticket<S: TicketStore>(
    State(state): State<AppState<S>>,
    requester: Requester,
    Path(event_id): Path<String>,
) -> Result<Response, AppError> {
    let event_id = parse_id(&event_id, "event id")?;
    let ticket = state
        .coordinator
        .purchase(event_id, requester.user_id)
        .await?;
    Ok(created(ticket, "Ticket purchased successfully"))
}

pub async fn cancel_ticket<S: TicketStore>(
    State(state): State<AppState<S>>,
    requester: Requester,
    Path(ticket_id): Path<String>,
) -> Result<Response, AppError> {
    let ticket_id = parse_id(&ticket_id, "ticket id")?;
    let ticket = state.coordinator.cancel(ticket_id, requester).await?;
    Ok(success(ticket, "Ticket cancelled successfully"))
}
