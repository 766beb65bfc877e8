use crate::core::AppError;
use crate::models::access::{
    AccessPermission, AccessStatus, HospitalRosterView, PatientGrantView, PendingRequestView,
};
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

const PERMISSION_COLUMNS: &str =
    "id, patient_id, hospital_id, status, requested_at, created_at, expires_at";

pub fn expiry_from_days(now: DateTime<Utc>, expiry_days: Option<i64>) -> Option<DateTime<Utc>> {
    expiry_days.map(|days| now + Duration::days(days))
}

/// The single enforcement predicate consulted by every hospital-side read
/// path: approved, and either open-ended or not yet past its expiry.
pub fn is_permission_active(
    status: AccessStatus,
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    status == AccessStatus::Approved && expires_at.map_or(true, |expiry| expiry > now)
}

/// Hospital asks for access. Upsert keeps at most one row per pair and makes
/// re-requesting after a rejection overwrite the old outcome.
pub async fn request_access(
    pool: &PgPool,
    hospital_id: Uuid,
    patient_id: Uuid,
    expiry_days: Option<i64>,
) -> Result<AccessPermission, AppError> {
    let now = Utc::now();
    let expires_at = expiry_from_days(now, expiry_days);

    let sql = format!(
        r#"
        INSERT INTO tbl_access_permissions ({columns})
        VALUES ($1, $2, $3, 'pending', $4, $4, $5)
        ON CONFLICT (patient_id, hospital_id)
        DO UPDATE SET status = 'pending',
                      requested_at = EXCLUDED.requested_at,
                      created_at = EXCLUDED.created_at,
                      expires_at = EXCLUDED.expires_at
        RETURNING {columns}
        "#,
        columns = PERMISSION_COLUMNS
    );

    sqlx::query_as::<_, AccessPermission>(&sql)
        .bind(Uuid::new_v4())
        .bind(patient_id)
        .bind(hospital_id)
        .bind(now)
        .bind(expires_at)
        .fetch_one(pool)
        .await
        .map_err(AppError::db_error)
}

/// Patient grants access directly, skipping the pending state.
pub async fn grant_access(
    pool: &PgPool,
    patient_id: Uuid,
    hospital_id: Uuid,
    expiry_days: Option<i64>,
) -> Result<AccessPermission, AppError> {
    let now = Utc::now();
    let expires_at = expiry_from_days(now, expiry_days);

    let sql = format!(
        r#"
        INSERT INTO tbl_access_permissions ({columns})
        VALUES ($1, $2, $3, 'approved', $4, $4, $5)
        ON CONFLICT (patient_id, hospital_id)
        DO UPDATE SET status = 'approved',
                      created_at = EXCLUDED.created_at,
                      expires_at = EXCLUDED.expires_at
        RETURNING {columns}
        "#,
        columns = PERMISSION_COLUMNS
    );

    sqlx::query_as::<_, AccessPermission>(&sql)
        .bind(Uuid::new_v4())
        .bind(patient_id)
        .bind(hospital_id)
        .bind(now)
        .bind(expires_at)
        .fetch_one(pool)
        .await
        .map_err(AppError::db_error)
}

/// Target state for a patient's answer to a pending request.
fn respond_target(approve: bool) -> AccessStatus {
    if approve {
        AccessStatus::Approved
    } else {
        AccessStatus::Rejected
    }
}

/// Revocation lands on the rejected terminal state whatever the row held
/// before; revoked and rejected are indistinguishable afterwards.
fn revoke_target() -> AccessStatus {
    AccessStatus::Rejected
}

/// Outcome of the pending-only conditional update: zero matched rows means
/// the request was already resolved (or never existed), so the caller's
/// answer is a no-op conflict, not a transition.
fn require_pending_matched(
    row: Option<AccessPermission>,
) -> Result<AccessPermission, AppError> {
    row.ok_or_else(|| AppError::conflict("No pending request to respond to"))
}

/// Patient answers a pending request. The update is conditioned on the row
/// still being pending; losing a race to another responder (or responding to
/// an already-resolved request) matches zero rows and surfaces as a conflict.
pub async fn respond_to_request(
    pool: &PgPool,
    patient_id: Uuid,
    hospital_id: Uuid,
    approve: bool,
) -> Result<AccessPermission, AppError> {
    let sql = format!(
        r#"
        UPDATE tbl_access_permissions
        SET status = $1, created_at = $2
        WHERE patient_id = $3 AND hospital_id = $4 AND status = 'pending'
        RETURNING {columns}
        "#,
        columns = PERMISSION_COLUMNS
    );

    let row = sqlx::query_as::<_, AccessPermission>(&sql)
        .bind(respond_target(approve))
        .bind(Utc::now())
        .bind(patient_id)
        .bind(hospital_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::db_error)?;

    require_pending_matched(row)
}

/// Patient withdraws access, valid from any state. The row is kept, never
/// deleted.
pub async fn revoke_access(
    pool: &PgPool,
    patient_id: Uuid,
    hospital_id: Uuid,
) -> Result<AccessPermission, AppError> {
    let sql = format!(
        r#"
        UPDATE tbl_access_permissions
        SET status = $1
        WHERE patient_id = $2 AND hospital_id = $3
        RETURNING {columns}
        "#,
        columns = PERMISSION_COLUMNS
    );

    let row = sqlx::query_as::<_, AccessPermission>(&sql)
        .bind(revoke_target())
        .bind(patient_id)
        .bind(hospital_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::db_error)?;

    row.ok_or_else(|| AppError::not_found("No access relationship to revoke"))
}

pub async fn fetch_pending_for_patient(
    pool: &PgPool,
    patient_id: Uuid,
) -> Result<Vec<PendingRequestView>, AppError> {
    sqlx::query_as::<_, PendingRequestView>(
        r#"
        SELECT a.id, a.hospital_id, h.name AS hospital_name, h.email AS hospital_email,
               a.requested_at, a.expires_at
        FROM tbl_access_permissions a
        JOIN tbl_hospitals h ON a.hospital_id = h.id
        WHERE a.patient_id = $1 AND a.status = 'pending'
        ORDER BY a.requested_at DESC
        "#,
    )
    .bind(patient_id)
    .fetch_all(pool)
    .await
    .map_err(AppError::db_error)
}

/// The patient's "who can see my data" view. Expired rows are still listed,
/// carrying their expires_at; the gate is where expiry turns into denial.
pub async fn fetch_approved_for_patient(
    pool: &PgPool,
    patient_id: Uuid,
) -> Result<Vec<PatientGrantView>, AppError> {
    sqlx::query_as::<_, PatientGrantView>(
        r#"
        SELECT a.id, a.hospital_id, h.name AS hospital_name, h.email AS hospital_email,
               a.created_at, a.expires_at
        FROM tbl_access_permissions a
        JOIN tbl_hospitals h ON a.hospital_id = h.id
        WHERE a.patient_id = $1 AND a.status = 'approved'
        ORDER BY a.created_at DESC
        "#,
    )
    .bind(patient_id)
    .fetch_all(pool)
    .await
    .map_err(AppError::db_error)
}

pub async fn fetch_approved_for_hospital(
    pool: &PgPool,
    hospital_id: Uuid,
) -> Result<Vec<HospitalRosterView>, AppError> {
    sqlx::query_as::<_, HospitalRosterView>(
        r#"
        SELECT a.id, a.patient_id, p.name AS patient_name, p.email AS patient_email,
               a.created_at, a.expires_at
        FROM tbl_access_permissions a
        JOIN tbl_patients p ON a.patient_id = p.id
        WHERE a.hospital_id = $1 AND a.status = 'approved'
        ORDER BY a.created_at DESC
        "#,
    )
    .bind(hospital_id)
    .fetch_all(pool)
    .await
    .map_err(AppError::db_error)
}

/// Single-pair lookup. `None` means "no relationship yet" and is a valid
/// answer, not an error.
pub async fn status_for(
    pool: &PgPool,
    patient_id: Uuid,
    hospital_id: Uuid,
) -> Result<Option<AccessPermission>, AppError> {
    let sql = format!(
        "SELECT {columns} FROM tbl_access_permissions WHERE patient_id = $1 AND hospital_id = $2",
        columns = PERMISSION_COLUMNS
    );

    sqlx::query_as::<_, AccessPermission>(&sql)
        .bind(patient_id)
        .bind(hospital_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::db_error)
}

/// The record-visibility gate for hospital callers.
pub async fn hospital_has_active_access(
    pool: &PgPool,
    patient_id: Uuid,
    hospital_id: Uuid,
) -> Result<bool, AppError> {
    let row = status_for(pool, patient_id, hospital_id).await?;
    Ok(row.map_or(false, |permission| {
        is_permission_active(permission.status, permission.expires_at, Utc::now())
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AppErrorType;
    use claim::{assert_err, assert_none, assert_ok, assert_some};
    use quickcheck_macros::quickcheck;

    fn status_from(n: u8) -> AccessStatus {
        match n % 3 {
            0 => AccessStatus::Pending,
            1 => AccessStatus::Approved,
            _ => AccessStatus::Rejected,
        }
    }

    fn permission_with(status: AccessStatus) -> AccessPermission {
        let now = Utc::now();
        AccessPermission {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            hospital_id: Uuid::new_v4(),
            status,
            requested_at: now,
            created_at: now,
            expires_at: None,
        }
    }

    #[test]
    fn open_ended_approval_is_active() {
        let now = Utc::now();
        assert!(is_permission_active(AccessStatus::Approved, None, now));
    }

    #[test]
    fn approval_expiring_in_the_future_is_active() {
        let now = Utc::now();
        let expiry = Some(now + Duration::days(30));
        assert!(is_permission_active(AccessStatus::Approved, expiry, now));
    }

    #[test]
    fn expired_approval_is_denied_at_the_gate() {
        let now = Utc::now();
        assert!(!is_permission_active(
            AccessStatus::Approved,
            Some(now - Duration::seconds(1)),
            now
        ));
        // boundary: expiry exactly now is already expired
        assert!(!is_permission_active(AccessStatus::Approved, Some(now), now));
    }

    #[test]
    fn pending_and_rejected_are_never_active() {
        let now = Utc::now();
        for status in [AccessStatus::Pending, AccessStatus::Rejected] {
            assert!(!is_permission_active(status, None, now));
            assert!(!is_permission_active(status, Some(now + Duration::days(7)), now));
        }
    }

    #[quickcheck]
    fn only_approved_rows_can_ever_be_active(status_seed: u8, offset_secs: i32) -> bool {
        let now = Utc::now();
        let status = status_from(status_seed);
        let expiry = Some(now + Duration::seconds(offset_secs as i64));
        let active = is_permission_active(status, expiry, now);

        status == AccessStatus::Approved || !active
    }

    #[quickcheck]
    fn approved_is_active_iff_expiry_is_strictly_future(offset_secs: i32) -> bool {
        let now = Utc::now();
        let expiry = Some(now + Duration::seconds(offset_secs as i64));
        is_permission_active(AccessStatus::Approved, expiry, now) == (offset_secs > 0)
    }

    #[test]
    fn respond_maps_the_approval_flag_to_its_target_state() {
        assert_eq!(respond_target(true), AccessStatus::Approved);
        assert_eq!(respond_target(false), AccessStatus::Rejected);
    }

    #[test]
    fn responding_when_no_pending_row_matched_is_a_conflict_no_op() {
        let err = assert_err!(require_pending_matched(None));
        assert_eq!(err.error_type, AppErrorType::ConflictError);
    }

    #[test]
    fn a_matched_pending_row_passes_through_unchanged() {
        let transitioned = permission_with(AccessStatus::Approved);
        let id = transitioned.id;

        let out = assert_ok!(require_pending_matched(Some(transitioned)));
        assert_eq!(out.id, id);
        assert_eq!(out.status, AccessStatus::Approved);
    }

    #[test]
    fn revoke_always_lands_on_a_non_approved_terminal_state() {
        assert_eq!(revoke_target(), AccessStatus::Rejected);
        assert_ne!(revoke_target(), AccessStatus::Approved);
        // a revoked row never passes the gate again
        assert!(!is_permission_active(revoke_target(), None, Utc::now()));
    }

    #[test]
    fn thirty_day_expiry_lands_thirty_days_out() {
        let now = Utc::now();
        let expiry = expiry_from_days(now, Some(30));
        assert_some!(expiry);
        assert_eq!(expiry.unwrap() - now, Duration::days(30));
    }

    #[test]
    fn no_expiry_days_means_open_ended() {
        assert_none!(expiry_from_days(Utc::now(), None));
    }
}
