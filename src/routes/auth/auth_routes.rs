use crate::core::AppErrorType::{AuthError, PayloadValidationError};
use crate::core::{jwt_auth, AppError, AppSuccessResponse};
use crate::db::principals;
use crate::models::principals::{PrincipalRole, Profile};
use actix_web::{get, post, web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::core::jwt_auth::{JwtClaims, JwtMiddleware};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct RegisterPayload {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(
        length(min = 1, message = "Password is required"),
        length(min = 8, message = "Password must be at least 8 characters")
    )]
    pub password: String,
    pub role: String,
}

#[derive(Validate, Serialize, Deserialize, Debug)]
pub struct LoginPayload {
    #[validate(email(message = "A valid email is required"))]
    email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    password: String,
    role: String,
}

#[tracing::instrument(name = "Register Principal", skip(payload, db_pool))]
#[post("register")]
pub async fn register(
    payload: web::Json<RegisterPayload>,
    db_pool: web::Data<PgPool>,
) -> Result<impl Responder, AppError> {
    match &payload.validate() {
        Ok(_) => (),
        Err(e) => {
            return Err(AppError {
                message: Some(e.to_string()),
                cause: None,
                error_type: PayloadValidationError,
            })
        }
    }

    let role: PrincipalRole = payload.role.parse().map_err(|e: String| AppError {
        message: Some(e),
        cause: None,
        error_type: PayloadValidationError,
    })?;

    if principals::email_exists(&db_pool, role, &payload.email).await? {
        return Err(AppError::conflict("An account with this email already exists"));
    }

    let salt = SaltString::generate(&mut OsRng);

    let hashed_password = Argon2::default()
        .hash_password(payload.password.as_bytes(), &salt)
        .map_err(|_| AppError {
            message: Some("can not hash password".to_string()),
            cause: None,
            error_type: AuthError,
        })?;

    let row = principals::insert_principal(
        &db_pool,
        role,
        Uuid::new_v4(),
        &payload.name,
        &payload.email,
        &hashed_password.to_string(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        message: "Account created successfully".to_string(),
        data: Some(Profile::from_row(row, role)),
        pagination: None,
    }))
}

#[post("login")]
async fn login(
    request: web::Json<LoginPayload>,
    db_pool: web::Data<PgPool>,
) -> Result<impl Responder, AppError> {
    match &request.validate() {
        Ok(_) => (),
        Err(e) => {
            return Err(AppError {
                message: Some(e.to_string()),
                cause: None,
                error_type: PayloadValidationError,
            })
        }
    }

    let role: PrincipalRole = request.role.parse().map_err(|e: String| AppError {
        message: Some(e),
        cause: None,
        error_type: PayloadValidationError,
    })?;

    let query = principals::fetch_by_email(&db_pool, role, &request.email).await?;

    if let Some(principal) = query {
        let hash = PasswordHash::new(&principal.password).map_err(|e| {
            tracing::error!("Failed to parse stored password hash: {:?}", e);
            AppError {
                message: Some("Invalid email or password".to_string()),
                cause: None,
                error_type: AuthError,
            }
        })?;
        let is_valid = Argon2::default()
            .verify_password(request.password.as_bytes(), &hash)
            .map_or(false, |_| true);

        if !is_valid {
            return Err(AppError {
                message: Some("Invalid email or password".to_string()),
                cause: None,
                error_type: AuthError,
            });
        }

        let exp = (chrono::Local::now()
            + chrono::Duration::seconds(jwt_auth::token_lifetime_seconds()))
        .timestamp() as usize;

        let claims = JwtClaims {
            sub: principal.id.to_string(),
            email: principal.email,
            role: role.as_str().to_string(),
            exp,
        };

        let token = jwt_auth::generate_jwt_token(&claims)?;

        return Ok(HttpResponse::Ok().json(json!({
            "token": token,
            "role": claims.role,
            "expire_at": claims.exp,
        })));
    }

    Err(AppError {
        message: Some("Invalid email or password".to_string()),
        cause: None,
        error_type: AuthError,
    })
}

/// Resolve the authenticated principal to its profile row. A valid token with
/// no matching row provisions one from the claims instead of erroring, so a
/// principal created elsewhere heals on first read.
#[tracing::instrument(name = "Get Profile", skip(db_pool))]
#[get("profile")]
pub async fn get_profile(
    db_pool: web::Data<PgPool>,
    auth: JwtMiddleware,
) -> Result<impl Responder, AppError> {
    let row = match principals::fetch_by_id(&db_pool, auth.role, auth.principal_id).await? {
        Some(row) => row,
        None => {
            tracing::info!(
                "No profile row for principal {}, provisioning from token claims",
                auth.principal_id
            );
            let fallback_name = auth
                .claims
                .email
                .split('@')
                .next()
                .unwrap_or("unknown")
                .to_string();
            principals::insert_principal(
                &db_pool,
                auth.role,
                auth.principal_id,
                &fallback_name,
                &auth.claims.email,
                "",
            )
            .await?
        }
    };

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        message: "Profile retrieved successfully".to_string(),
        data: Some(Profile::from_row(row, auth.role)),
        pagination: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use claim::{assert_err, assert_ok};
    use fake::faker::internet::en::SafeEmail;
    use fake::Fake;

    #[test]
    fn register_payload_requires_valid_email_and_password_length() {
        let valid = RegisterPayload {
            name: "St Mary Hospital".to_string(),
            email: SafeEmail().fake(),
            password: "correct-horse-battery".to_string(),
            role: "hospital".to_string(),
        };
        assert_ok!(valid.validate());

        let bad_email = RegisterPayload {
            email: "not-an-email".to_string(),
            ..valid.clone()
        };
        assert_err!(bad_email.validate());

        let short_password = RegisterPayload {
            password: "short".to_string(),
            ..valid
        };
        assert_err!(short_password.validate());
    }

    #[test]
    fn login_payload_rejects_malformed_email_and_empty_password() {
        let valid = LoginPayload {
            email: SafeEmail().fake(),
            password: "correct-horse-battery".to_string(),
            role: "patient".to_string(),
        };
        assert_ok!(valid.validate());

        let bad_email = LoginPayload {
            email: "not-an-email".to_string(),
            password: "correct-horse-battery".to_string(),
            role: "patient".to_string(),
        };
        assert_err!(bad_email.validate());

        let empty_password = LoginPayload {
            email: SafeEmail().fake(),
            password: String::new(),
            role: "patient".to_string(),
        };
        assert_err!(empty_password.validate());
    }
}
