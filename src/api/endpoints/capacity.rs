//! Specialist capacity endpoints.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{AckResponse, ApiContext, AuthContext};
use crate::capacity::{AssignmentRequest, CapacityError};
use crate::models::{AssignmentStatus, CapacityAssignment, Specialist};
use crate::store::RecordId;

/// Wire view of one specialist.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialistView {
    pub id: RecordId,
    pub name: String,
    pub specialties: Vec<String>,
    pub available: bool,
    pub max_load: u32,
    pub current_load: u32,
    pub has_capacity: bool,
}

impl SpecialistView {
    fn from_row(id: RecordId, specialist: Specialist) -> Self {
        let has_capacity = specialist.has_capacity();
        Self {
            id,
            name: specialist.name,
            specialties: specialist.specialties,
            available: specialist.available,
            max_load: specialist.max_load,
            current_load: specialist.current_load,
            has_capacity,
        }
    }
}

/// Wire view of one assignment row.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentView {
    pub id: RecordId,
    pub patient_id: RecordId,
    pub specialist_id: RecordId,
    pub assigned_on: NaiveDate,
    pub status: AssignmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl AssignmentView {
    fn from_row(id: RecordId, assignment: CapacityAssignment) -> Self {
        Self {
            id,
            patient_id: assignment.patient_id,
            specialist_id: assignment.specialist_id,
            assigned_on: assignment.assigned_on,
            status: assignment.status,
            plan: assignment.plan,
            notes: assignment.notes,
        }
    }
}

// ─── Specialist queries ───

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialistsQuery {
    /// When true, only specialists that can take a new patient.
    #[serde(default)]
    pub available_only: bool,
}

#[derive(Serialize)]
pub struct SpecialistsResponse {
    pub specialists: Vec<SpecialistView>,
}

/// `GET /api/capacity/specialists?availableOnly=` — the specialist
/// roster, sorted by name.
pub async fn list_specialists(
    State(ctx): State<ApiContext>,
    Query(query): Query<SpecialistsQuery>,
) -> Result<Json<SpecialistsResponse>, ApiError> {
    let rows = if query.available_only {
        ctx.core.allocator.available_specialists()
    } else {
        ctx.core.allocator.all_specialists()
    };
    Ok(Json(SpecialistsResponse {
        specialists: rows
            .into_iter()
            .map(|(id, s)| SpecialistView::from_row(id, s))
            .collect(),
    }))
}

#[derive(Deserialize)]
pub struct AssignmentsQuery {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Serialize)]
pub struct AssignmentsResponse {
    pub assignments: Vec<AssignmentView>,
}

/// `GET /api/capacity/specialists/:id/assignments?status=` — one
/// specialist's assignments, newest first.
pub async fn list_assignments(
    State(ctx): State<ApiContext>,
    Path(specialist_id): Path<RecordId>,
    Query(query): Query<AssignmentsQuery>,
) -> Result<Json<AssignmentsResponse>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<AssignmentStatus>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let rows = ctx.core.allocator.assignments_for(specialist_id, status)?;
    Ok(Json(AssignmentsResponse {
        assignments: rows
            .into_iter()
            .map(|(id, a)| AssignmentView::from_row(id, a))
            .collect(),
    }))
}

// ─── Assignment admission and transitions ───

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssignmentRequest {
    pub patient_id: RecordId,
    pub specialist_id: RecordId,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssignmentResponse {
    pub success: bool,
    pub assignment_id: RecordId,
}

/// `POST /api/capacity/assignments` — attach a patient to a
/// specialist's active load.
pub async fn create_assignment(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthContext>,
    Json(request): Json<CreateAssignmentRequest>,
) -> Result<Json<CreateAssignmentResponse>, ApiError> {
    let assignment_id = ctx.core.allocator.assign(AssignmentRequest {
        patient_id: request.patient_id,
        specialist_id: request.specialist_id,
        staff_id: caller.user_id,
        notes: request.notes,
    })?;
    Ok(Json(CreateAssignmentResponse {
        success: true,
        assignment_id,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentStatusRequest {
    pub status: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// `POST /api/capacity/assignments/:id/status` — transition an
/// assignment; closing it releases one unit of the specialist's load.
pub async fn set_assignment_status(
    State(ctx): State<ApiContext>,
    Path(assignment_id): Path<RecordId>,
    Json(request): Json<AssignmentStatusRequest>,
) -> Result<Json<AckResponse>, ApiError> {
    let status: AssignmentStatus = request
        .status
        .parse()
        .map_err(|e: crate::models::InvalidEnum| ApiError::BadRequest(e.to_string()))?;
    ctx.core
        .allocator
        .update_status(assignment_id, status, request.notes)?;
    Ok(Json(AckResponse { success: true }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPlanRequest {
    /// Plan text to attach. When absent the plan collaborator generates
    /// one from the patient's summary.
    #[serde(default)]
    pub plan: Option<String>,
}

#[derive(Serialize)]
pub struct SetPlanResponse {
    pub success: bool,
    pub plan: String,
}

/// `POST /api/capacity/assignments/:id/plan` — attach care-plan text,
/// generating it when none is supplied. Leaves the status untouched.
pub async fn set_plan(
    State(ctx): State<ApiContext>,
    Path(assignment_id): Path<RecordId>,
    Json(request): Json<SetPlanRequest>,
) -> Result<Json<SetPlanResponse>, ApiError> {
    let plan = match request.plan {
        Some(plan) if !plan.trim().is_empty() => plan,
        _ => {
            let summary = ctx.core.allocator.patient_summary(assignment_id)?;
            ctx.core
                .plan_generator
                .generate(&summary)
                .map_err(|e| ApiError::from(CapacityError::PlanGeneration(e)))?
        }
    };
    ctx.core.allocator.set_plan(assignment_id, plan.clone())?;
    Ok(Json(SetPlanResponse {
        success: true,
        plan,
    }))
}
