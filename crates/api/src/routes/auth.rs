//! Password reset handlers.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Deserialize;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::ClientContext;
use crate::middleware::metrics::{
    record_account_email, record_rate_limit_rejection, record_token_verification,
};
use crate::routes::portal::{attribute, outcome, MessageResponse};
use domain::models::{ActionType, SecurityEventType, TokenType};
use shared::password::{hash_password, validate_password_strength};
use shared::validation::{message_of, validate_email};

/// Same answer whether or not the account exists.
pub const FORGOT_PASSWORD_MESSAGE: &str = "If an account exists with this email address, you will receive password reset instructions shortly.";

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Request a password reset link.
///
/// POST /api/v1/auth/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    ClientContext(session): ClientContext,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let email = validate_email(&request.email).map_err(|e| ApiError::Validation(message_of(&e)))?;

    let decision = state
        .rate_limiter
        .check_action(&session.ip_address, ActionType::ResetRequest, None)
        .await;
    if !decision.allowed {
        record_rate_limit_rejection(ActionType::ResetRequest.as_str());
        state
            .security
            .log_for_session(&session, SecurityEventType::RateLimited, Some(&decision.message))
            .await;
        return Err(ApiError::RateLimited(decision.message));
    }

    match state.users.find_active_by_email(&email).await {
        Ok(Some(user)) => {
            let sent = state
                .mailer
                .send_password_reset_email(&user.email, user.id)
                .await;
            record_account_email("password_reset", sent);

            let session = session.with_user(user.id);
            state
                .security
                .log_for_session(
                    &session,
                    SecurityEventType::ResetRequested,
                    Some("Password reset requested"),
                )
                .await;
        }
        Ok(None) => {
            tracing::debug!(ip_address = %session.ip_address, "Reset requested for unknown email");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to look up portal user for password reset");
        }
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: FORGOT_PASSWORD_MESSAGE.to_string(),
        }),
    ))
}

/// Redeem a reset token and set a new password.
///
/// POST /api/v1/auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    ClientContext(session): ClientContext,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if request.new_password != request.confirm_password {
        return Err(ApiError::Validation("Passwords do not match".to_string()));
    }
    // Both run before the token is consumed so a failure here does not burn it.
    validate_password_strength(&request.new_password)?;
    let password_hash = hash_password(&request.new_password)?;

    let user_id = match state
        .verification
        .verify_token(&request.token, TokenType::PasswordReset)
        .await
    {
        Ok(user_id) => user_id,
        Err(rejection) => {
            record_token_verification(TokenType::PasswordReset.as_str(), outcome(&rejection));
            let owner = state
                .verification
                .token_owner(&request.token, TokenType::PasswordReset)
                .await;
            let details = format!("Password reset failed: {}", rejection);
            state
                .security
                .log_for_session(
                    &attribute(session, owner),
                    SecurityEventType::VerifyFailed,
                    Some(&details),
                )
                .await;
            return Err(rejection.into());
        }
    };
    record_token_verification(TokenType::PasswordReset.as_str(), "valid");

    let updated = state
        .users
        .set_password_hash(user_id, &password_hash, Utc::now())
        .await?;
    if !updated {
        return Err(ApiError::NotFound("Portal user not found".to_string()));
    }

    let session = session.with_user(user_id);
    state
        .security
        .log_for_session(
            &session,
            SecurityEventType::PasswordReset,
            Some("Password reset completed"),
        )
        .await;

    Ok(Json(MessageResponse {
        message: "Password reset successfully".to_string(),
    }))
}
