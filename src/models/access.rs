use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Tri-state consent status. "Never requested" is the absence of a row, never
/// a status value; a revoked grant lands back on `Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "access_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccessStatus {
    Pending,
    Approved,
    Rejected,
}

impl AccessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// One row per (patient, hospital) pair in `tbl_access_permissions`.
#[derive(Debug, sqlx::FromRow, Serialize)]
pub struct AccessPermission {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub hospital_id: Uuid,
    pub status: AccessStatus,
    pub requested_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Pending request as the patient sees it, joined with the hospital profile.
#[derive(Debug, sqlx::FromRow, Serialize)]
pub struct PendingRequestView {
    pub id: Uuid,
    pub hospital_id: Uuid,
    pub hospital_name: String,
    pub hospital_email: String,
    pub requested_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Approved grant as the patient sees it: "who can see my data".
#[derive(Debug, sqlx::FromRow, Serialize)]
pub struct PatientGrantView {
    pub id: Uuid,
    pub hospital_id: Uuid,
    pub hospital_name: String,
    pub hospital_email: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// The hospital's patient roster, joined with the patient profile.
#[derive(Debug, sqlx::FromRow, Serialize)]
pub struct HospitalRosterView {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub patient_email: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Single-pair status lookup. Absence of a row is a valid answer ("no
/// relationship yet"), reported as `status: null`, not as an error.
#[derive(Debug, Serialize)]
pub struct RelationshipStatus {
    pub status: Option<AccessStatus>,
    pub requested_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
}

#[derive(Debug, Validate, Deserialize)]
pub struct RequestAccessPayload {
    pub patient_id: Uuid,
    #[validate(range(min = 1, max = 3650, message = "expiry_days must be between 1 and 3650"))]
    pub expiry_days: Option<i64>,
}

#[derive(Debug, Validate, Deserialize)]
pub struct GrantAccessPayload {
    pub hospital_id: Uuid,
    #[validate(range(min = 1, max = 3650, message = "expiry_days must be between 1 and 3650"))]
    pub expiry_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RespondAccessPayload {
    pub hospital_id: Uuid,
    pub approve: bool,
}

#[derive(Debug, Deserialize)]
pub struct RevokeAccessPayload {
    pub hospital_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;
    use claim::{assert_err, assert_ok};

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&AccessStatus::Pending).unwrap(),
            "\"pending\""
        );
        assert_eq!(
            serde_json::to_string(&AccessStatus::Approved).unwrap(),
            "\"approved\""
        );
        assert_eq!(
            serde_json::to_string(&AccessStatus::Rejected).unwrap(),
            "\"rejected\""
        );
    }

    #[test]
    fn expiry_days_bounds_are_enforced() {
        let ok = RequestAccessPayload {
            patient_id: Uuid::new_v4(),
            expiry_days: Some(30),
        };
        assert_ok!(ok.validate());

        let zero = RequestAccessPayload {
            patient_id: Uuid::new_v4(),
            expiry_days: Some(0),
        };
        assert_err!(zero.validate());

        let too_far = GrantAccessPayload {
            hospital_id: Uuid::new_v4(),
            expiry_days: Some(4000),
        };
        assert_err!(too_far.validate());
    }

    #[test]
    fn missing_expiry_days_is_valid() {
        let open_ended = GrantAccessPayload {
            hospital_id: Uuid::new_v4(),
            expiry_days: None,
        };
        assert_ok!(open_ended.validate());
    }
}
