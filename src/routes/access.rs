use actix_web::{get, post, web, HttpResponse, Responder};
use chrono::Utc;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::{
    core::{jwt_auth::JwtMiddleware, AppError, AppErrorType, AppSuccessResponse},
    db::{access, principals},
    models::access::{
        GrantAccessPayload, RelationshipStatus, RequestAccessPayload, RespondAccessPayload,
        RevokeAccessPayload,
    },
    models::principals::PrincipalRole,
};

fn require_role(auth: &JwtMiddleware, role: PrincipalRole) -> Result<(), AppError> {
    if auth.role != role {
        return Err(AppError {
            message: Some(format!("This operation is only available to {}s", role)),
            cause: None,
            error_type: AppErrorType::ForbiddenError,
        });
    }
    Ok(())
}

fn validation_error(e: impl ToString) -> AppError {
    AppError {
        message: Some(e.to_string()),
        cause: None,
        error_type: AppErrorType::PayloadValidationError,
    }
}

/// Hospital asks a patient for read access. Re-requesting after a rejection
/// overwrites the old row (upsert), so the operation is idempotent per pair.
#[instrument(name = "Request Access", skip(pool, auth))]
#[post("/request")]
pub async fn request_access(
    pool: web::Data<PgPool>,
    auth: JwtMiddleware,
    payload: web::Json<RequestAccessPayload>,
) -> Result<impl Responder, AppError> {
    require_role(&auth, PrincipalRole::Hospital)?;
    payload.validate().map_err(validation_error)?;

    if principals::fetch_by_id(pool.get_ref(), PrincipalRole::Patient, payload.patient_id)
        .await?
        .is_none()
    {
        return Err(AppError::not_found("Patient not found"));
    }

    let permission = access::request_access(
        pool.get_ref(),
        auth.principal_id,
        payload.patient_id,
        payload.expiry_days,
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to create access request: {:?}", e);
        e
    })?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        message: "Access request submitted".to_string(),
        data: Some(permission),
        pagination: None,
    }))
}

/// Patient grants a hospital access directly, skipping the pending state.
#[instrument(name = "Grant Access", skip(pool, auth))]
#[post("/grant")]
pub async fn grant_access(
    pool: web::Data<PgPool>,
    auth: JwtMiddleware,
    payload: web::Json<GrantAccessPayload>,
) -> Result<impl Responder, AppError> {
    require_role(&auth, PrincipalRole::Patient)?;
    payload.validate().map_err(validation_error)?;

    if principals::fetch_by_id(pool.get_ref(), PrincipalRole::Hospital, payload.hospital_id)
        .await?
        .is_none()
    {
        return Err(AppError::not_found("Hospital not found"));
    }

    let permission = access::grant_access(
        pool.get_ref(),
        auth.principal_id,
        payload.hospital_id,
        payload.expiry_days,
    )
    .await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        message: "Access granted".to_string(),
        data: Some(permission),
        pagination: None,
    }))
}

/// Patient answers a pending request. Responding to an already-resolved
/// request comes back as a 409, the other responder won.
#[instrument(name = "Respond To Access Request", skip(pool, auth))]
#[post("/respond")]
pub async fn respond_access(
    pool: web::Data<PgPool>,
    auth: JwtMiddleware,
    payload: web::Json<RespondAccessPayload>,
) -> Result<impl Responder, AppError> {
    require_role(&auth, PrincipalRole::Patient)?;

    let permission = access::respond_to_request(
        pool.get_ref(),
        auth.principal_id,
        payload.hospital_id,
        payload.approve,
    )
    .await?;

    let message = if payload.approve {
        "Access request approved"
    } else {
        "Access request rejected"
    };

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        message: message.to_string(),
        data: Some(permission),
        pagination: None,
    }))
}

#[instrument(name = "Revoke Access", skip(pool, auth))]
#[post("/revoke")]
pub async fn revoke_access(
    pool: web::Data<PgPool>,
    auth: JwtMiddleware,
    payload: web::Json<RevokeAccessPayload>,
) -> Result<impl Responder, AppError> {
    require_role(&auth, PrincipalRole::Patient)?;

    let permission =
        access::revoke_access(pool.get_ref(), auth.principal_id, payload.hospital_id).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        message: "Access revoked".to_string(),
        data: Some(permission),
        pagination: None,
    }))
}

#[instrument(name = "Get Pending Requests", skip(pool, auth))]
#[get("/pending")]
pub async fn get_pending_requests(
    pool: web::Data<PgPool>,
    auth: JwtMiddleware,
) -> Result<impl Responder, AppError> {
    require_role(&auth, PrincipalRole::Patient)?;

    let requests = access::fetch_pending_for_patient(pool.get_ref(), auth.principal_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch pending requests: {:?}", e);
            e
        })?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        message: "Pending requests retrieved successfully".to_string(),
        data: Some(requests),
        pagination: None,
    }))
}

/// Approved relationships for the caller: a patient sees which hospitals can
/// read their records, a hospital sees its patient roster. Expired rows are
/// included with their expiry so callers can surface it; the gate still
/// denies them.
#[instrument(name = "Get Approved Access", skip(pool, auth))]
#[get("/approved")]
pub async fn get_approved_access(
    pool: web::Data<PgPool>,
    auth: JwtMiddleware,
) -> Result<impl Responder, AppError> {
    match auth.role {
        PrincipalRole::Patient => {
            let grants =
                access::fetch_approved_for_patient(pool.get_ref(), auth.principal_id).await?;
            Ok(HttpResponse::Ok().json(AppSuccessResponse {
                success: true,
                message: "Approved access retrieved successfully".to_string(),
                data: Some(grants),
                pagination: None,
            }))
        }
        PrincipalRole::Hospital => {
            let roster =
                access::fetch_approved_for_hospital(pool.get_ref(), auth.principal_id).await?;
            Ok(HttpResponse::Ok().json(AppSuccessResponse {
                success: true,
                message: "Patient roster retrieved successfully".to_string(),
                data: Some(roster),
                pagination: None,
            }))
        }
    }
}

/// Status of the relationship between the caller and one counterpart.
/// `status: null` means no relationship exists yet, which is a valid answer.
#[instrument(name = "Get Relationship Status", skip(pool, auth))]
#[get("/status/{counterpart_id}")]
pub async fn get_relationship_status(
    pool: web::Data<PgPool>,
    auth: JwtMiddleware,
    counterpart_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let counterpart_id = counterpart_id.into_inner();

    let (patient_id, hospital_id) = match auth.role {
        PrincipalRole::Patient => (auth.principal_id, counterpart_id),
        PrincipalRole::Hospital => (counterpart_id, auth.principal_id),
    };

    let row = access::status_for(pool.get_ref(), patient_id, hospital_id).await?;

    let status = match row {
        Some(permission) => RelationshipStatus {
            active: access::is_permission_active(
                permission.status,
                permission.expires_at,
                Utc::now(),
            ),
            status: Some(permission.status),
            requested_at: Some(permission.requested_at),
            expires_at: permission.expires_at,
        },
        None => RelationshipStatus {
            status: None,
            requested_at: None,
            expires_at: None,
            active: false,
        },
    };

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        message: "Relationship status retrieved successfully".to_string(),
        data: Some(status),
        pagination: None,
    }))
}
