use crate::core::AppError;
use crate::models::principals::{PrincipalRole, PrincipalRow};
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

fn table_for(role: PrincipalRole) -> &'static str {
    match role {
        PrincipalRole::Patient => "tbl_patients",
        PrincipalRole::Hospital => "tbl_hospitals",
    }
}

pub async fn insert_principal(
    pool: &PgPool,
    role: PrincipalRole,
    id: Uuid,
    name: &str,
    email: &str,
    password_hash: &str,
) -> Result<PrincipalRow, AppError> {
    let sql = format!(
        r#"
        INSERT INTO {table} (id, name, email, password, created_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, name, email, password, created_at
        "#,
        table = table_for(role)
    );

    sqlx::query_as::<_, PrincipalRow>(&sql)
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
        .map_err(AppError::db_error)
}

pub async fn fetch_by_email(
    pool: &PgPool,
    role: PrincipalRole,
    email: &str,
) -> Result<Option<PrincipalRow>, AppError> {
    let sql = format!(
        "SELECT id, name, email, password, created_at FROM {table} WHERE email = $1",
        table = table_for(role)
    );

    sqlx::query_as::<_, PrincipalRow>(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(AppError::db_error)
}

pub async fn fetch_by_id(
    pool: &PgPool,
    role: PrincipalRole,
    id: Uuid,
) -> Result<Option<PrincipalRow>, AppError> {
    let sql = format!(
        "SELECT id, name, email, password, created_at FROM {table} WHERE id = $1",
        table = table_for(role)
    );

    sqlx::query_as::<_, PrincipalRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::db_error)
}

pub async fn email_exists(
    pool: &PgPool,
    role: PrincipalRole,
    email: &str,
) -> Result<bool, AppError> {
    let sql = format!(
        "SELECT COUNT(*) FROM {table} WHERE email = $1",
        table = table_for(role)
    );

    let count: i64 = sqlx::query_scalar(&sql)
        .bind(email)
        .fetch_one(pool)
        .await
        .map_err(AppError::db_error)?;

    Ok(count > 0)
}
