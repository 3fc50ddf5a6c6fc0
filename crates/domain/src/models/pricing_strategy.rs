//! Pricing strategy domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// Name and description of the strategy provisioned when none is active.
pub const DEFAULT_STRATEGY_NAME: &str = "Fixed Price";
pub const DEFAULT_STRATEGY_DESCRIPTION: &str =
    "Default fixed pricing strategy - service prices are set and do not change";

/// How a final price is derived from the cost components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyType {
    /// Base price, plus materials when the rules include them.
    #[serde(rename = "Fixed Price")]
    FixedPrice,
    /// Base price plus labor hours, plus materials when included.
    #[serde(rename = "Cost + Labor")]
    CostPlusLabor,
}

impl StrategyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyType::FixedPrice => "Fixed Price",
            StrategyType::CostPlusLabor => "Cost + Labor",
        }
    }
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Fixed Price" => Ok(StrategyType::FixedPrice),
            "Cost + Labor" => Ok(StrategyType::CostPlusLabor),
            other => Err(format!("Unknown strategy type: {}", other)),
        }
    }
}

/// Option flags attached to a strategy (stored as JSON).
///
/// Unknown keys are preserved so older rows keep round-tripping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_materials: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl StrategyRules {
    /// Whether material cost is added to the total. Absent means yes.
    pub fn include_materials(&self) -> bool {
        self.include_materials.unwrap_or(true)
    }
}

/// A stored pricing strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PricingStrategy {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub strategy_type: StrategyType,
    pub rules: StrategyRules,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Strategy data to insert as the new active strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPricingStrategy {
    pub name: String,
    pub strategy_type: StrategyType,
    pub rules: StrategyRules,
}

impl NewPricingStrategy {
    /// The fixed-price strategy provisioned when nothing is active.
    pub fn default_fixed_price() -> Self {
        Self {
            name: DEFAULT_STRATEGY_NAME.to_string(),
            strategy_type: StrategyType::FixedPrice,
            rules: StrategyRules {
                include_materials: Some(false),
                description: Some(DEFAULT_STRATEGY_DESCRIPTION.to_string()),
                extra: serde_json::Map::new(),
            },
        }
    }
}

/// Request to save a strategy from the settings form.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct SaveStrategyRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub strategy_type: StrategyType,
    #[serde(default = "default_include_materials")]
    pub include_materials: bool,
}

fn default_include_materials() -> bool {
    true
}

impl From<&SaveStrategyRequest> for NewPricingStrategy {
    fn from(request: &SaveStrategyRequest) -> Self {
        let name = request
            .name
            .clone()
            .unwrap_or_else(|| format!("{} Strategy", request.strategy_type));

        Self {
            name,
            strategy_type: request.strategy_type,
            rules: StrategyRules {
                include_materials: Some(request.include_materials),
                description: None,
                extra: serde_json::Map::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_type_serde_names() {
        assert_eq!(
            serde_json::to_string(&StrategyType::FixedPrice).unwrap(),
            "\"Fixed Price\""
        );
        let parsed: StrategyType = serde_json::from_str("\"Cost + Labor\"").unwrap();
        assert_eq!(parsed, StrategyType::CostPlusLabor);
    }

    #[test]
    fn test_strategy_type_from_str() {
        assert_eq!(
            "Fixed Price".parse::<StrategyType>().unwrap(),
            StrategyType::FixedPrice
        );
        assert!("Variable".parse::<StrategyType>().is_err());
    }

    #[test]
    fn test_rules_include_materials_defaults_to_true() {
        let rules: StrategyRules = serde_json::from_str("{}").unwrap();
        assert!(rules.include_materials());

        let rules: StrategyRules =
            serde_json::from_str(r#"{"include_materials": false}"#).unwrap();
        assert!(!rules.include_materials());
    }

    #[test]
    fn test_rules_preserve_unknown_keys() {
        let rules: StrategyRules =
            serde_json::from_str(r#"{"include_materials": true, "markup_value": 20}"#).unwrap();
        assert_eq!(rules.extra.get("markup_value"), Some(&serde_json::json!(20)));

        let json = serde_json::to_value(&rules).unwrap();
        assert_eq!(json["markup_value"], 20);
    }

    #[test]
    fn test_default_fixed_price_excludes_materials() {
        let strategy = NewPricingStrategy::default_fixed_price();
        assert_eq!(strategy.strategy_type, StrategyType::FixedPrice);
        assert!(!strategy.rules.include_materials());
        assert_eq!(strategy.name, "Fixed Price");
    }

    #[test]
    fn test_save_request_default_name() {
        let request: SaveStrategyRequest =
            serde_json::from_str(r#"{"type": "Cost + Labor"}"#).unwrap();
        assert!(request.include_materials);

        let strategy = NewPricingStrategy::from(&request);
        assert_eq!(strategy.name, "Cost + Labor Strategy");
        assert_eq!(strategy.rules.include_materials, Some(true));
    }

    #[test]
    fn test_save_request_validation() {
        let request = SaveStrategyRequest {
            name: Some(String::new()),
            strategy_type: StrategyType::FixedPrice,
            include_materials: false,
        };
        assert!(request.validate().is_err());
    }
}
