//! Customer portal account handlers: registration, login and email verification.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::ClientContext;
use crate::middleware::metrics::{
    record_account_email, record_login, record_rate_limit_rejection, record_token_verification,
};
use chrono::Utc;
use domain::models::{ActionType, SecurityEventType, SessionContext, TokenRejection, TokenType};
use domain::stores::StoreError;
use shared::password::{hash_password, validate_password_strength, verify_password};
use shared::validation::{message_of, validate_email};

const ALREADY_REGISTERED: &str = "This email is already registered. Please login instead.";

pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Same answer whether or not an unverified account exists.
pub const VERIFICATION_REQUEST_MESSAGE: &str =
    "If an unverified account exists with this email address, a new verification link has been sent.";

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct VerifyEmailResponse {
    pub verified: bool,
    pub portal_user_id: i64,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SendVerificationRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct LoginResponse {
    pub portal_user_id: i64,
    pub email_verified: bool,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RegisterResponse {
    pub portal_user_id: i64,
    pub verification_sent: bool,
    pub message: String,
}

/// Create a portal account and send its verification email.
///
/// POST /api/v1/portal/register
pub async fn register(
    State(state): State<AppState>,
    ClientContext(session): ClientContext,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let email = validate_email(&request.email).map_err(|e| ApiError::Validation(message_of(&e)))?;
    if request.password != request.confirm_password {
        return Err(ApiError::Validation("Passwords do not match".to_string()));
    }
    validate_password_strength(&request.password)?;

    let decision = state
        .rate_limiter
        .check_action(&session.ip_address, ActionType::Registration, None)
        .await;
    if !decision.allowed {
        record_rate_limit_rejection(ActionType::Registration.as_str());
        state
            .security
            .log_for_session(&session, SecurityEventType::RateLimited, Some(&decision.message))
            .await;
        return Err(ApiError::RateLimited(decision.message));
    }

    if state.users.find_active_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict(ALREADY_REGISTERED.to_string()));
    }

    let password_hash = hash_password(&request.password)?;
    // A concurrent registration or a closed account can still hold the address.
    let user = match state
        .users
        .create(&email, Some(&password_hash), Utc::now())
        .await
    {
        Ok(user) => user,
        Err(StoreError::Conflict(_)) => {
            return Err(ApiError::Conflict(ALREADY_REGISTERED.to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    let session = session.with_user(user.id);
    state
        .security
        .log_for_session(&session, SecurityEventType::RegistrationSuccess, None)
        .await;

    let verification_sent = state
        .mailer
        .send_verification_email(&user.email, user.id)
        .await;
    record_account_email("verification", verification_sent);
    if verification_sent {
        state
            .security
            .log_for_session(&session, SecurityEventType::VerificationSent, None)
            .await;
    }

    let message = if verification_sent {
        "Registration successful. Check your email to verify your account."
    } else {
        "Registration successful. Request a new verification email to verify your account."
    };

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            portal_user_id: user.id,
            verification_sent,
            message: message.to_string(),
        }),
    ))
}

/// Check credentials for a portal account. No session is issued here.
///
/// POST /api/v1/portal/login
pub async fn login(
    State(state): State<AppState>,
    ClientContext(session): ClientContext,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = validate_email(&request.email).map_err(|e| ApiError::Validation(message_of(&e)))?;
    if request.password.is_empty() {
        return Err(ApiError::Validation(
            "Please enter both email and password".to_string(),
        ));
    }

    let decision = state
        .rate_limiter
        .check_action(&session.ip_address, ActionType::LoginAttempt, None)
        .await;
    if !decision.allowed {
        record_rate_limit_rejection(ActionType::LoginAttempt.as_str());
        state
            .security
            .log_for_session(&session, SecurityEventType::RateLimited, Some(&decision.message))
            .await;
        return Err(ApiError::RateLimited(decision.message));
    }

    let user = state.users.find_active_by_email(&email).await?;
    let session = attribute(session, user.as_ref().map(|u| u.id));
    reject_if_suspicious(&state, &session).await?;

    let user = match user {
        Some(user) if password_matches(&request.password, user.password_hash.as_deref()) => user,
        _ => {
            record_login(false);
            state
                .security
                .log_for_session(&session, SecurityEventType::LoginFailed, Some(INVALID_CREDENTIALS))
                .await;
            return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }
    };

    record_login(true);
    state
        .security
        .log_for_session(&session, SecurityEventType::LoginSuccess, None)
        .await;

    Ok(Json(LoginResponse {
        portal_user_id: user.id,
        email_verified: user.email_verified,
        message: "Login successful".to_string(),
    }))
}

fn password_matches(password: &str, stored_hash: Option<&str>) -> bool {
    let Some(stored_hash) = stored_hash else {
        return false;
    };
    verify_password(password, stored_hash).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Stored password hash could not be checked");
        false
    })
}

/// Resend the verification link for an unverified account.
///
/// POST /api/v1/portal/verification
pub async fn send_verification(
    State(state): State<AppState>,
    ClientContext(session): ClientContext,
    Json(request): Json<SendVerificationRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let email = validate_email(&request.email).map_err(|e| ApiError::Validation(message_of(&e)))?;

    let decision = state
        .rate_limiter
        .check_action(&session.ip_address, ActionType::VerificationRequest, None)
        .await;
    if !decision.allowed {
        record_rate_limit_rejection(ActionType::VerificationRequest.as_str());
        state
            .security
            .log_for_session(&session, SecurityEventType::RateLimited, Some(&decision.message))
            .await;
        return Err(ApiError::RateLimited(decision.message));
    }

    match state.users.find_active_by_email(&email).await {
        Ok(Some(user)) if !user.email_verified => {
            let sent = state
                .mailer
                .send_verification_email(&user.email, user.id)
                .await;
            record_account_email("verification", sent);
            if sent {
                let session = session.with_user(user.id);
                state
                    .security
                    .log_for_session(&session, SecurityEventType::VerificationSent, None)
                    .await;
            }
        }
        Ok(Some(user)) => {
            tracing::debug!(portal_user_id = user.id, "Verification requested for verified email");
        }
        Ok(None) => {
            tracing::debug!(ip_address = %session.ip_address, "Verification requested for unknown email");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to look up portal user for verification");
        }
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: VERIFICATION_REQUEST_MESSAGE.to_string(),
        }),
    ))
}

/// Redeem an email verification token.
///
/// POST /api/v1/portal/verify-email
pub async fn verify_email(
    State(state): State<AppState>,
    ClientContext(session): ClientContext,
    Json(request): Json<VerifyEmailRequest>,
) -> Result<Json<VerifyEmailResponse>, ApiError> {
    let owner = state
        .verification
        .token_owner(&request.token, TokenType::EmailVerification)
        .await;
    let session = attribute(session, owner);
    reject_if_suspicious(&state, &session).await?;

    let user_id = match state
        .verification
        .verify_token(&request.token, TokenType::EmailVerification)
        .await
    {
        Ok(user_id) => user_id,
        Err(rejection) => {
            record_token_verification(TokenType::EmailVerification.as_str(), outcome(&rejection));
            let details = format!("Email verification failed: {}", rejection);
            state
                .security
                .log_for_session(&session, SecurityEventType::VerifyFailed, Some(&details))
                .await;
            return Err(rejection.into());
        }
    };
    record_token_verification(TokenType::EmailVerification.as_str(), "valid");

    if !state.verification.mark_email_verified(user_id).await {
        return Err(ApiError::Internal(format!(
            "token consumed but email flag not set for portal user {}",
            user_id
        )));
    }

    let session = session.with_user(user_id);
    state
        .security
        .log_for_session(
            &session,
            SecurityEventType::EmailVerified,
            Some("Email verified successfully"),
        )
        .await;

    Ok(Json(VerifyEmailResponse {
        verified: true,
        portal_user_id: user_id,
        message: "Email verified successfully".to_string(),
    }))
}

pub(crate) fn attribute(session: SessionContext, portal_user_id: Option<i64>) -> SessionContext {
    match portal_user_id {
        Some(id) => session.with_user(id),
        None => session,
    }
}

/// 429 (and a `RATE_LIMITED` event) when the client or user looks suspicious.
pub(crate) async fn reject_if_suspicious(
    state: &AppState,
    session: &SessionContext,
) -> Result<(), ApiError> {
    let report = state
        .security
        .check_suspicious_activity(
            &session.ip_address,
            &session.user_agent,
            session.portal_user_id,
        )
        .await;
    if report.is_suspicious {
        state
            .security
            .log_for_session(session, SecurityEventType::RateLimited, Some(&report.reason))
            .await;
        return Err(ApiError::RateLimited(report.reason));
    }
    Ok(())
}

pub(crate) fn outcome(rejection: &TokenRejection) -> &'static str {
    match rejection {
        TokenRejection::Invalid => "invalid",
        TokenRejection::Expired => "expired",
        TokenRejection::EmailAlreadyVerified => "already_verified",
        TokenRejection::AlreadyUsed => "already_used",
        TokenRejection::Unavailable => "error",
    }
}
