use actix_multipart::Multipart;
use actix_web::{delete, get, post, web, HttpResponse, Responder};
use futures_util::TryStreamExt;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    core::{jwt_auth::JwtMiddleware, AppError, AppErrorType, AppSuccessResponse, BlobStore},
    db::{access, records},
    models::pagination::{PaginationMeta, PaginationQuery},
    models::principals::PrincipalRole,
    models::records::DownloadLink,
};

const MAX_FILE_SIZE: usize = 50 * 1024 * 1024; // 50MB

fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Owner passes on identity alone; a hospital must hold an active permission.
async fn ensure_record_access(
    pool: &PgPool,
    auth: &JwtMiddleware,
    patient_id: Uuid,
) -> Result<(), AppError> {
    match auth.role {
        PrincipalRole::Patient => {
            if auth.principal_id != patient_id {
                return Err(AppError {
                    message: Some("You can only access your own records".to_string()),
                    cause: None,
                    error_type: AppErrorType::ForbiddenError,
                });
            }
        }
        PrincipalRole::Hospital => {
            let has_access =
                access::hospital_has_active_access(pool, patient_id, auth.principal_id).await?;
            if !has_access {
                return Err(AppError {
                    message: Some(
                        "You don't have an active permission for this patient's records"
                            .to_string(),
                    ),
                    cause: None,
                    error_type: AppErrorType::ForbiddenError,
                });
            }
        }
    }
    Ok(())
}

#[instrument(name = "Upload Record", skip(pool, blob_store, auth, payload))]
#[post("/{patient_id}/upload")]
pub async fn upload_record(
    pool: web::Data<PgPool>,
    blob_store: web::Data<BlobStore>,
    auth: JwtMiddleware,
    patient_id: web::Path<Uuid>,
    mut payload: Multipart,
) -> Result<impl Responder, AppError> {
    let patient_id = patient_id.into_inner();

    ensure_record_access(pool.get_ref(), &auth, patient_id).await?;

    let mut title = String::new();
    let mut record_type = String::new();
    let mut notes: Option<String> = None;
    let mut file_data: Option<(String, Vec<u8>)> = None;

    while let Some(mut field) = payload.try_next().await.map_err(|e| {
        tracing::error!("Failed to read multipart field: {:?}", e);
        AppError {
            message: Some("Invalid file upload format".to_string()),
            cause: Some(e.to_string()),
            error_type: AppErrorType::PayloadValidationError,
        }
    })? {
        let content_disposition = field.content_disposition();
        let field_name = content_disposition.get_name().unwrap_or("").to_string();
        let original_file_name = content_disposition
            .get_filename()
            .map(|name| name.to_string());

        let mut data = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(|e| AppError {
            message: Some(format!("Failed to read {} field", field_name)),
            cause: Some(e.to_string()),
            error_type: AppErrorType::PayloadValidationError,
        })? {
            if data.len() + chunk.len() > MAX_FILE_SIZE {
                return Err(AppError {
                    message: Some("File exceeds the 50MB upload limit".to_string()),
                    cause: None,
                    error_type: AppErrorType::PayloadValidationError,
                });
            }
            data.extend_from_slice(&chunk);
        }

        match field_name.as_str() {
            "title" => {
                title = String::from_utf8(data).map_err(|e| AppError {
                    message: Some("Invalid title encoding".to_string()),
                    cause: Some(e.to_string()),
                    error_type: AppErrorType::PayloadValidationError,
                })?;
            }
            "record_type" => {
                record_type = String::from_utf8(data).map_err(|e| AppError {
                    message: Some("Invalid record_type encoding".to_string()),
                    cause: Some(e.to_string()),
                    error_type: AppErrorType::PayloadValidationError,
                })?;
            }
            "notes" => {
                notes = Some(String::from_utf8(data).map_err(|e| AppError {
                    message: Some("Invalid notes encoding".to_string()),
                    cause: Some(e.to_string()),
                    error_type: AppErrorType::PayloadValidationError,
                })?);
            }
            "file" => {
                let original = original_file_name.unwrap_or_else(|| "record.bin".to_string());
                file_data = Some((original, data));
            }
            _ => {}
        }
    }

    if title.is_empty() || record_type.is_empty() {
        return Err(AppError {
            message: Some("title and record_type are required".to_string()),
            cause: None,
            error_type: AppErrorType::PayloadValidationError,
        });
    }

    let (original_file_name, bytes) = file_data.ok_or_else(|| AppError {
        message: Some("No file was provided".to_string()),
        cause: None,
        error_type: AppErrorType::PayloadValidationError,
    })?;

    let stored_file_name = format!(
        "{}_{}",
        Uuid::new_v4(),
        sanitize_file_name(&original_file_name)
    );

    blob_store.upload(&patient_id.to_string(), &stored_file_name, &bytes)?;

    let record = records::insert_record(
        pool.get_ref(),
        records::NewRecord {
            patient_id,
            uploaded_by: auth.principal_id,
            uploader_role: auth.role,
            title: &title,
            record_type: &record_type,
            notes: notes.as_deref(),
            file_name: &stored_file_name,
            original_file_name: &original_file_name,
            size_bytes: bytes.len() as i64,
        },
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to insert record metadata: {:?}", e);
        e
    })?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        message: "Record uploaded successfully".to_string(),
        data: Some(record),
        pagination: None,
    }))
}

#[instrument(name = "Get My Records", skip(pool, auth, pagination))]
#[get("/mine")]
pub async fn get_my_records(
    pool: web::Data<PgPool>,
    auth: JwtMiddleware,
    pagination: web::Query<PaginationQuery>,
) -> Result<impl Responder, AppError> {
    if auth.role != PrincipalRole::Patient {
        return Err(AppError::forbidden_error(
            "This operation is only available to patients",
        ));
    }

    let mut pagination = pagination.into_inner();
    pagination.validate();

    let (data, total_items) =
        records::fetch_records_for_patient(pool.get_ref(), auth.principal_id, &pagination).await?;

    let pagination_meta = PaginationMeta::new(pagination.page, pagination.per_page, total_items);

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        message: "Records retrieved successfully".to_string(),
        data: Some(data),
        pagination: Some(pagination_meta),
    }))
}

#[instrument(name = "Get Patient Records", skip(pool, auth, pagination))]
#[get("/patient/{patient_id}")]
pub async fn get_patient_records(
    pool: web::Data<PgPool>,
    auth: JwtMiddleware,
    patient_id: web::Path<Uuid>,
    pagination: web::Query<PaginationQuery>,
) -> Result<impl Responder, AppError> {
    let patient_id = patient_id.into_inner();

    ensure_record_access(pool.get_ref(), &auth, patient_id).await?;

    let mut pagination = pagination.into_inner();
    pagination.validate();

    let (data, total_items) =
        records::fetch_records_for_patient(pool.get_ref(), patient_id, &pagination).await?;

    let pagination_meta = PaginationMeta::new(pagination.page, pagination.per_page, total_items);

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        message: "Records retrieved successfully".to_string(),
        data: Some(data),
        pagination: Some(pagination_meta),
    }))
}

/// Issue a time-limited download URL for one record. The URL is a capability
/// token: a later revoke does not invalidate it before its expiry.
#[instrument(name = "Get Download Link", skip(pool, blob_store, auth))]
#[get("/{record_id}/download")]
pub async fn get_download_link(
    pool: web::Data<PgPool>,
    blob_store: web::Data<BlobStore>,
    auth: JwtMiddleware,
    record_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let record_id = record_id.into_inner();

    let record = records::fetch_record(pool.get_ref(), record_id)
        .await?
        .ok_or_else(|| AppError::not_found("Record not found"))?;

    ensure_record_access(pool.get_ref(), &auth, record.patient_id).await?;

    let (url, expires_at_unix) =
        blob_store.create_signed_url(&record.patient_id.to_string(), &record.file_name);

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        message: "Download link issued".to_string(),
        data: Some(DownloadLink {
            url,
            expires_at_unix,
        }),
        pagination: None,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SignedUrlQuery {
    pub expires: i64,
    pub sig: String,
}

/// Serves a blob against its signed URL. No bearer token and no permission
/// re-check here: the signature is the whole authorization.
#[instrument(name = "Fetch Blob", skip(blob_store, query))]
#[get("/blob/{patient_id}/{file_name}")]
pub async fn fetch_blob(
    blob_store: web::Data<BlobStore>,
    path: web::Path<(Uuid, String)>,
    query: web::Query<SignedUrlQuery>,
) -> Result<impl Responder, AppError> {
    let (patient_id, file_name) = path.into_inner();

    if !blob_store.verify_signed_url(
        &patient_id.to_string(),
        &file_name,
        query.expires,
        &query.sig,
    ) {
        return Err(AppError {
            message: Some("Download link is invalid or has expired".to_string()),
            cause: None,
            error_type: AppErrorType::ForbiddenError,
        });
    }

    let bytes = blob_store.read(&patient_id.to_string(), &file_name)?;

    Ok(HttpResponse::Ok()
        .content_type("application/octet-stream")
        .body(bytes))
}

/// Delete a record's metadata and blob. A failed blob removal is logged and
/// tolerated; the metadata row goes away regardless, possibly orphaning the
/// blob on disk.
#[instrument(name = "Delete Record", skip(pool, blob_store, auth))]
#[delete("/{record_id}")]
pub async fn delete_record(
    pool: web::Data<PgPool>,
    blob_store: web::Data<BlobStore>,
    auth: JwtMiddleware,
    record_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let record_id = record_id.into_inner();

    let record = records::fetch_record(pool.get_ref(), record_id)
        .await?
        .ok_or_else(|| AppError::not_found("Record not found"))?;

    if auth.role != PrincipalRole::Patient || auth.principal_id != record.patient_id {
        return Err(AppError {
            message: Some("Only the owning patient can delete a record".to_string()),
            cause: None,
            error_type: AppErrorType::ForbiddenError,
        });
    }

    if let Err(e) = blob_store.remove(&record.patient_id.to_string(), &record.file_name) {
        tracing::warn!(
            "Failed to remove blob {}/{}: {:?}, continuing with metadata deletion",
            record.patient_id,
            record.file_name,
            e
        );
    }

    records::delete_record(pool.get_ref(), record_id).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        message: "Record deleted successfully".to_string(),
        data: Some(()),
        pagination: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_sanitized_to_a_safe_charset() {
        assert_eq!(sanitize_file_name("blood test (v2).pdf"), "blood_test__v2_.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_file_name("scan-01_final.PDF"), "scan-01_final.PDF");
    }
}
