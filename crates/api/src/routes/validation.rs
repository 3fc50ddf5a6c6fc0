//! Form validation handlers used by the portal and settings pages.

use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::ClientContext;
use crate::middleware::metrics::record_rate_limit_rejection;
use domain::models::{ActionType, BusinessForm, CustomerForm};
use shared::validation::{
    message_of, validate_business_hours, validate_service_date, DEFAULT_MAX_BOOKING_DAYS,
    DEFAULT_MIN_BOOKING_DAYS,
};

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ValidationResponse {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl From<Vec<String>> for ValidationResponse {
    fn from(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Booking submitted from the customer portal.
#[derive(Debug, Deserialize)]
pub struct BookingRequest {
    pub customer: CustomerForm,
    #[serde(default)]
    pub service_date: String,
    #[serde(default)]
    pub service_time: String,
}

/// POST /api/v1/portal/validate/customer
pub async fn validate_customer(Json(form): Json<CustomerForm>) -> Json<ValidationResponse> {
    Json(form.validation_messages().into())
}

/// POST /api/v1/portal/validate/business
pub async fn validate_business(Json(form): Json<BusinessForm>) -> Json<ValidationResponse> {
    Json(form.validation_messages().into())
}

/// Validates a booking: customer details, service date window and opening
/// hours. Counts as a booking attempt for rate limiting.
///
/// POST /api/v1/portal/validate/booking
pub async fn validate_booking(
    State(state): State<AppState>,
    ClientContext(session): ClientContext,
    Json(request): Json<BookingRequest>,
) -> Result<Json<ValidationResponse>, ApiError> {
    let decision = state
        .rate_limiter
        .check_action(&session.ip_address, ActionType::BookingAttempt, None)
        .await;
    if !decision.allowed {
        record_rate_limit_rejection(ActionType::BookingAttempt.as_str());
        return Err(ApiError::RateLimited(decision.message));
    }

    let mut errors = request.customer.validation_messages();

    let today = Utc::now().date_naive();
    match validate_service_date(
        &request.service_date,
        DEFAULT_MIN_BOOKING_DAYS,
        DEFAULT_MAX_BOOKING_DAYS,
        today,
    ) {
        Ok(date) => {
            if let Err(e) = validate_business_hours(&request.service_time, date) {
                errors.push(message_of(&e));
            }
        }
        Err(e) => errors.push(message_of(&e)),
    }

    Ok(Json(errors.into()))
}
