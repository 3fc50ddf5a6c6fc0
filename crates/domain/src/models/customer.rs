//! Customer and business form payloads and whole-form validation.

use serde::{Deserialize, Serialize};
use shared::validation::{
    message_of, validate_email, validate_phone, validate_state, validate_website,
    validate_zip_code,
};

/// Customer details submitted from the booking or admin form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CustomerForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub street_address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
}

/// Business profile submitted from the settings form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BusinessForm {
    #[serde(default)]
    pub business_name: String,
    #[serde(default)]
    pub street_address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub email_address: String,
    #[serde(default)]
    pub website: Option<String>,
}

type FieldCheck = fn(&str) -> Option<String>;

fn check_phone(value: &str) -> Option<String> {
    validate_phone(value).err().map(|e| message_of(&e))
}

fn check_email(value: &str) -> Option<String> {
    validate_email(value).err().map(|e| message_of(&e))
}

fn check_state(value: &str) -> Option<String> {
    validate_state(value).err().map(|e| message_of(&e))
}

fn check_zip(value: &str) -> Option<String> {
    validate_zip_code(value).err().map(|e| message_of(&e))
}

/// Collects one message per failing required field, in field order.
fn required_messages(fields: &[(&str, &str, Option<FieldCheck>)]) -> Vec<String> {
    let mut messages = Vec::new();
    for &(label, value, check) in fields {
        if value.trim().is_empty() {
            messages.push(format!("{} is required", label));
            continue;
        }
        if let Some(message) = check.and_then(|c| c(value)) {
            messages.push(message);
        }
    }
    messages
}

impl CustomerForm {
    /// Field-specific error messages; empty when the form is valid.
    pub fn validation_messages(&self) -> Vec<String> {
        let fields: [(&str, &str, Option<FieldCheck>); 7] = [
            ("First Name", self.first_name.as_str(), None),
            ("Last Name", self.last_name.as_str(), None),
            ("Phone Number", self.phone_number.as_str(), Some(check_phone)),
            ("Street Address", self.street_address.as_str(), None),
            ("City", self.city.as_str(), None),
            ("State", self.state.as_str(), Some(check_state)),
            ("ZIP Code", self.zip_code.as_str(), Some(check_zip)),
        ];
        let mut messages = required_messages(&fields);

        if let Some(email) = self.email_address.as_deref().filter(|e| !e.trim().is_empty()) {
            messages.extend(check_email(email));
        }
        messages
    }

    pub fn is_valid(&self) -> bool {
        self.validation_messages().is_empty()
    }
}

impl BusinessForm {
    /// Field-specific error messages; empty when the form is valid.
    pub fn validation_messages(&self) -> Vec<String> {
        let fields: [(&str, &str, Option<FieldCheck>); 7] = [
            ("Business Name", self.business_name.as_str(), None),
            ("Street Address", self.street_address.as_str(), None),
            ("City", self.city.as_str(), None),
            ("State", self.state.as_str(), Some(check_state)),
            ("ZIP Code", self.zip_code.as_str(), Some(check_zip)),
            ("Phone Number", self.phone_number.as_str(), Some(check_phone)),
            ("Email Address", self.email_address.as_str(), Some(check_email)),
        ];
        let mut messages = required_messages(&fields);

        if let Some(website) = self.website.as_deref().filter(|w| !w.trim().is_empty()) {
            if let Err(e) = validate_website(website) {
                messages.push(message_of(&e));
            }
        }
        messages
    }

    pub fn is_valid(&self) -> bool {
        self.validation_messages().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_customer() -> CustomerForm {
        CustomerForm {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            phone_number: "555-123-4567".to_string(),
            email_address: Some("jane@example.com".to_string()),
            street_address: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            state: "il".to_string(),
            zip_code: "62701".to_string(),
        }
    }

    #[test]
    fn test_valid_customer() {
        assert!(valid_customer().is_valid());
    }

    #[test]
    fn test_customer_required_fields() {
        let messages = CustomerForm::default().validation_messages();
        assert_eq!(
            messages,
            vec![
                "First Name is required",
                "Last Name is required",
                "Phone Number is required",
                "Street Address is required",
                "City is required",
                "State is required",
                "ZIP Code is required",
            ]
        );
    }

    #[test]
    fn test_customer_field_formats() {
        let form = CustomerForm {
            phone_number: "12345".to_string(),
            zip_code: "1234".to_string(),
            state: "XX".to_string(),
            email_address: Some("not-an-email".to_string()),
            ..valid_customer()
        };
        assert_eq!(
            form.validation_messages(),
            vec![
                "Invalid phone number format",
                "Invalid state code",
                "Invalid ZIP code format",
                "Invalid email format",
            ]
        );
    }

    #[test]
    fn test_customer_email_optional() {
        let form = CustomerForm {
            email_address: None,
            ..valid_customer()
        };
        assert!(form.is_valid());
    }

    #[test]
    fn test_business_website_scheme() {
        let form = BusinessForm {
            business_name: "EZ Lawn".to_string(),
            street_address: "2 Oak Ave".to_string(),
            city: "Austin".to_string(),
            state: "TX".to_string(),
            zip_code: "78701-1234".to_string(),
            phone_number: "(512) 555-0100".to_string(),
            email_address: "office@ezlawn.example".to_string(),
            website: Some("ezlawn.example".to_string()),
        };
        assert_eq!(
            form.validation_messages(),
            vec!["Website must begin with http:// or https://"]
        );

        let form = BusinessForm {
            website: Some("https://ezlawn.example".to_string()),
            ..form
        };
        assert!(form.is_valid());
    }

    #[test]
    fn test_business_email_required() {
        let form = BusinessForm::default();
        assert!(form
            .validation_messages()
            .contains(&"Email Address is required".to_string()));
    }
}
