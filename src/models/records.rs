use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Metadata row in `tbl_patient_records`. The blob itself lives in the blob
/// store at `{patient_id}/{file_name}`.
#[derive(Debug, sqlx::FromRow, Serialize)]
pub struct PatientRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub uploaded_by: Uuid,
    pub uploader_role: String,
    pub title: String,
    pub record_type: String,
    pub notes: Option<String>,
    pub file_name: String,
    pub original_file_name: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct DownloadLink {
    pub url: String,
    pub expires_at_unix: i64,
}
