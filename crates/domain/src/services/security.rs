//! Security event log and abuse heuristics.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, warn};

use crate::models::security_event::{
    failed_attempt_window, rapid_request_window, SuspicionReason, FAILED_ATTEMPT_THRESHOLD,
    RAPID_REQUEST_THRESHOLD,
};
use crate::models::{NewSecurityEvent, SecurityEventType, SessionContext, SuspicionReport};
use crate::stores::{SecurityEventStore, StoreError};

pub struct SecurityMonitor {
    store: Arc<dyn SecurityEventStore>,
}

impl SecurityMonitor {
    pub fn new(store: Arc<dyn SecurityEventStore>) -> Self {
        Self { store }
    }

    /// Appends an event to the log. Returns false when it could not be written.
    pub async fn log_security_event(
        &self,
        portal_user_id: Option<i64>,
        event_type: SecurityEventType,
        ip_address: &str,
        user_agent: &str,
        details: Option<&str>,
    ) -> bool {
        let mut event = NewSecurityEvent::new(event_type, portal_user_id, ip_address, user_agent);
        event.details = details.map(str::to_string);
        self.record(&event, Utc::now()).await
    }

    /// Logs an event for the client and user carried by a session context.
    pub async fn log_for_session(
        &self,
        session: &SessionContext,
        event_type: SecurityEventType,
        details: Option<&str>,
    ) -> bool {
        self.log_security_event(
            session.portal_user_id,
            event_type,
            &session.ip_address,
            &session.user_agent,
            details,
        )
        .await
    }

    pub async fn record(&self, event: &NewSecurityEvent, at: DateTime<Utc>) -> bool {
        match self.store.append(event, at).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    event_type = %event.event_type,
                    ip_address = %event.ip_address,
                    error = %e,
                    "Failed to log security event"
                );
                false
            }
        }
    }

    /// Runs the abuse heuristics. Fails closed when the log cannot be read.
    pub async fn check_suspicious_activity(
        &self,
        ip_address: &str,
        user_agent: &str,
        portal_user_id: Option<i64>,
    ) -> SuspicionReport {
        self.check_suspicious_activity_at(ip_address, user_agent, portal_user_id, Utc::now())
            .await
    }

    pub async fn check_suspicious_activity_at(
        &self,
        ip_address: &str,
        user_agent: &str,
        portal_user_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> SuspicionReport {
        match self.collect_reasons(ip_address, portal_user_id, now).await {
            Ok(reasons) => {
                let report = SuspicionReport::from_reasons(&reasons);
                if report.is_suspicious {
                    warn!(
                        ip_address = %ip_address,
                        user_agent = %user_agent,
                        portal_user_id = ?portal_user_id,
                        reason = %report.reason,
                        "Suspicious activity detected"
                    );
                }
                report
            }
            Err(e) => {
                error!(ip_address = %ip_address, error = %e, "Security check failed");
                SuspicionReport::check_failed()
            }
        }
    }

    async fn collect_reasons(
        &self,
        ip_address: &str,
        portal_user_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Vec<SuspicionReason>, StoreError> {
        let mut reasons = Vec::new();

        let recent = self
            .store
            .count_from_ip_since(ip_address, now - rapid_request_window())
            .await?;
        if recent > RAPID_REQUEST_THRESHOLD {
            reasons.push(SuspicionReason::RapidRequests);
        }

        if let Some(user_id) = portal_user_id {
            let failures = self
                .store
                .count_failures_for_user_since(user_id, now - failed_attempt_window())
                .await?;
            if failures > FAILED_ATTEMPT_THRESHOLD {
                reasons.push(SuspicionReason::MultipleFailedAttempts);
            }
        }

        Ok(reasons)
    }
}
