use crate::core::AppError;
use crate::models::pagination::PaginationQuery;
use crate::models::principals::PrincipalRole;
use crate::models::records::PatientRecord;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

const RECORD_COLUMNS: &str = "id, patient_id, uploaded_by, uploader_role, title, record_type, \
                              notes, file_name, original_file_name, size_bytes, created_at";

pub struct NewRecord<'a> {
    pub patient_id: Uuid,
    pub uploaded_by: Uuid,
    pub uploader_role: PrincipalRole,
    pub title: &'a str,
    pub record_type: &'a str,
    pub notes: Option<&'a str>,
    pub file_name: &'a str,
    pub original_file_name: &'a str,
    pub size_bytes: i64,
}

pub async fn insert_record(
    pool: &PgPool,
    record: NewRecord<'_>,
) -> Result<PatientRecord, AppError> {
    let sql = format!(
        r#"
        INSERT INTO tbl_patient_records ({columns})
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {columns}
        "#,
        columns = RECORD_COLUMNS
    );

    sqlx::query_as::<_, PatientRecord>(&sql)
        .bind(Uuid::new_v4())
        .bind(record.patient_id)
        .bind(record.uploaded_by)
        .bind(record.uploader_role.as_str())
        .bind(record.title)
        .bind(record.record_type)
        .bind(record.notes)
        .bind(record.file_name)
        .bind(record.original_file_name)
        .bind(record.size_bytes)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
        .map_err(AppError::db_error)
}

pub async fn fetch_records_for_patient(
    pool: &PgPool,
    patient_id: Uuid,
    pagination: &PaginationQuery,
) -> Result<(Vec<PatientRecord>, i64), AppError> {
    let sql = format!(
        r#"
        SELECT {columns}
        FROM tbl_patient_records
        WHERE patient_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
        columns = RECORD_COLUMNS
    );

    let records = sqlx::query_as::<_, PatientRecord>(&sql)
        .bind(patient_id)
        .bind(pagination.per_page)
        .bind(pagination.offset())
        .fetch_all(pool)
        .await
        .map_err(AppError::db_error)?;

    let total_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM tbl_patient_records WHERE patient_id = $1")
            .bind(patient_id)
            .fetch_one(pool)
            .await
            .map_err(AppError::db_error)?;

    Ok((records, total_count))
}

pub async fn fetch_record(
    pool: &PgPool,
    record_id: Uuid,
) -> Result<Option<PatientRecord>, AppError> {
    let sql = format!(
        "SELECT {columns} FROM tbl_patient_records WHERE id = $1",
        columns = RECORD_COLUMNS
    );

    sqlx::query_as::<_, PatientRecord>(&sql)
        .bind(record_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::db_error)
}

pub async fn delete_record(pool: &PgPool, record_id: Uuid) -> Result<(), AppError> {
    sqlx::query("DELETE FROM tbl_patient_records WHERE id = $1")
        .bind(record_id)
        .execute(pool)
        .await
        .map_err(AppError::db_error)?;

    Ok(())
}
