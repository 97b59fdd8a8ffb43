//! Caregiver scheduling endpoints.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{AckResponse, ApiContext, AuthContext};
use crate::models::{Booking, BookingStatus, TimeSlot};
use crate::scheduling::{BookingRequest, RosterStats, SlotAvailability, SlotOccupancy};
use crate::store::RecordId;

/// Wire view of one booking row.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    pub id: RecordId,
    pub caregiver_id: RecordId,
    pub patient_id: RecordId,
    pub date: NaiveDate,
    pub slot: TimeSlot,
    pub status: BookingStatus,
    pub session_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
}

impl BookingView {
    fn from_row(id: RecordId, booking: Booking) -> Self {
        Self {
            id,
            caregiver_id: booking.caregiver_id,
            patient_id: booking.patient_id,
            date: booking.date,
            slot: booking.slot,
            status: booking.status,
            session_type: booking.session_type,
            notes: booking.notes,
            rating: booking.rating,
        }
    }
}

fn parse_slot(label: &str) -> Result<TimeSlot, ApiError> {
    label
        .parse()
        .map_err(|e: crate::models::InvalidEnum| ApiError::BadRequest(e.to_string()))
}

// ─── Booking admission and transitions ───

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub caregiver_id: RecordId,
    pub patient_id: RecordId,
    pub date: NaiveDate,
    pub slot: String,
    pub session_type: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingResponse {
    pub success: bool,
    pub booking_id: RecordId,
}

/// `POST /api/schedule/bookings` — book a caregiver slot.
///
/// The booking staff member is the authenticated caller, never taken
/// from the body.
pub async fn create_booking(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<Json<CreateBookingResponse>, ApiError> {
    let slot = parse_slot(&request.slot)?;
    let booking_id = ctx.core.scheduler.book(BookingRequest {
        caregiver_id: request.caregiver_id,
        patient_id: request.patient_id,
        staff_id: caller.user_id,
        date: request.date,
        slot,
        session_type: request.session_type,
        notes: request.notes,
    })?;
    Ok(Json(CreateBookingResponse {
        success: true,
        booking_id,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelBookingRequest {
    pub reason: String,
}

/// `POST /api/schedule/bookings/:id/cancel` — cancel a scheduled
/// booking and free its slot.
pub async fn cancel_booking(
    State(ctx): State<ApiContext>,
    Path(booking_id): Path<RecordId>,
    Json(request): Json<CancelBookingRequest>,
) -> Result<Json<AckResponse>, ApiError> {
    ctx.core.scheduler.cancel(booking_id, &request.reason)?;
    Ok(Json(AckResponse { success: true }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingStatusRequest {
    pub status: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub rating: Option<u8>,
}

/// `POST /api/schedule/bookings/:id/status` — transition a booking.
pub async fn set_booking_status(
    State(ctx): State<ApiContext>,
    Path(booking_id): Path<RecordId>,
    Json(request): Json<BookingStatusRequest>,
) -> Result<Json<AckResponse>, ApiError> {
    let status: BookingStatus = request
        .status
        .parse()
        .map_err(|e: crate::models::InvalidEnum| ApiError::BadRequest(e.to_string()))?;
    ctx.core
        .scheduler
        .set_status(booking_id, status, request.notes, request.rating)?;
    Ok(Json(AckResponse { success: true }))
}

// ─── Schedule queries ───

#[derive(Deserialize)]
pub struct OccupancyQuery {
    pub date: NaiveDate,
    pub slot: String,
}

/// `GET /api/schedule/occupancy?date=&slot=` — practice-wide busy/free
/// picture for one slot.
pub async fn occupancy(
    State(ctx): State<ApiContext>,
    Query(query): Query<OccupancyQuery>,
) -> Result<Json<SlotOccupancy>, ApiError> {
    let slot = parse_slot(&query.slot)?;
    Ok(Json(ctx.core.scheduler.slot_occupancy(query.date, slot)))
}

/// `GET /api/schedule/stats` — caregiver roster counts, lifetime
/// session total, and mean rating.
pub async fn roster_stats(
    State(ctx): State<ApiContext>,
) -> Result<Json<RosterStats>, ApiError> {
    Ok(Json(ctx.core.scheduler.roster_stats()))
}

#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub caregiver_id: RecordId,
    pub date: NaiveDate,
    pub slots: Vec<SlotAvailability>,
}

/// `GET /api/schedule/caregivers/:id/availability?date=` — one
/// caregiver's day grid.
pub async fn caregiver_availability(
    State(ctx): State<ApiContext>,
    Path(caregiver_id): Path<RecordId>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let slots = ctx
        .core
        .scheduler
        .caregiver_availability(caregiver_id, query.date)?;
    Ok(Json(AvailabilityResponse {
        caregiver_id,
        date: query.date,
        slots,
    }))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub caregiver_id: RecordId,
    pub sessions: Vec<BookingView>,
}

/// `GET /api/schedule/caregivers/:id/history?limit=` — recent bookings,
/// newest first, terminal rows included.
pub async fn caregiver_history(
    State(ctx): State<ApiContext>,
    Path(caregiver_id): Path<RecordId>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let sessions = ctx
        .core
        .scheduler
        .session_history(caregiver_id, query.limit)?
        .into_iter()
        .map(|(id, booking)| BookingView::from_row(id, booking))
        .collect();
    Ok(Json(HistoryResponse {
        caregiver_id,
        sessions,
    }))
}
