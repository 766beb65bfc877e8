use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// An authenticated principal is either a patient or a hospital. The role
/// travels in the JWT claims and decides which profile table backs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalRole {
    Patient,
    Hospital,
}

impl PrincipalRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Hospital => "hospital",
        }
    }
}

impl fmt::Display for PrincipalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PrincipalRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "patient" => Ok(Self::Patient),
            "hospital" => Ok(Self::Hospital),
            other => Err(format!(
                "{} is not a supported role. Use either `patient` or `hospital`",
                other
            )),
        }
    }
}

/// Row shape shared by `tbl_patients` and `tbl_hospitals`.
#[derive(Debug, sqlx::FromRow)]
pub struct PrincipalRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: PrincipalRole,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn from_row(row: PrincipalRow, role: PrincipalRole) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            role,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claim::{assert_err, assert_ok};

    #[test]
    fn role_round_trips_through_its_string_form() {
        for role in [PrincipalRole::Patient, PrincipalRole::Hospital] {
            assert_eq!(role.as_str().parse::<PrincipalRole>().unwrap(), role);
        }
    }

    #[test]
    fn role_parse_is_case_insensitive() {
        assert_ok!("Hospital".parse::<PrincipalRole>());
        assert_ok!("PATIENT".parse::<PrincipalRole>());
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert_err!("admin".parse::<PrincipalRole>());
    }
}
