//! Explicit per-request context passed to portal operations.

use serde::{Deserialize, Serialize};

pub const UNKNOWN: &str = "unknown";
pub const DEFAULT_SETTINGS_PAGE: &str = "business";

/// Request context. Only the recognized keys are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct SessionContext {
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub show_settings: bool,
    #[serde(default = "default_settings_page")]
    pub settings_page: String,
    #[serde(default)]
    pub portal_user_id: Option<i64>,
    #[serde(default = "unknown")]
    pub ip_address: String,
    #[serde(default = "unknown")]
    pub user_agent: String,
}

fn default_settings_page() -> String {
    DEFAULT_SETTINGS_PAGE.to_string()
}

fn unknown() -> String {
    UNKNOWN.to_string()
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            page: None,
            show_settings: false,
            settings_page: default_settings_page(),
            portal_user_id: None,
            ip_address: unknown(),
            user_agent: unknown(),
        }
    }
}

impl SessionContext {
    /// Context for an anonymous request from the given client.
    pub fn for_client(ip_address: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            ip_address: ip_address.unwrap_or_else(unknown),
            user_agent: user_agent.unwrap_or_else(unknown),
            ..Default::default()
        }
    }

    pub fn with_user(mut self, portal_user_id: i64) -> Self {
        self.portal_user_id = Some(portal_user_id);
        self
    }
}
