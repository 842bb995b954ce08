use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::models::{User, VerificationType};

/// Maximum age of a utility bill before it is considered stale.
const UTILITY_BILL_MAX_AGE_DAYS: i64 = 90;

const ACCEPTED_DOCUMENT_TYPES: [&str; 4] =
    ["passport", "driver_license", "national_id", "residence_permit"];

const ACCEPTED_BILL_TYPES: [&str; 5] = ["electricity", "water", "gas", "internet", "phone"];

// Outcome of running one method handler over a submission
#[derive(Debug, Clone)]
pub struct HandlerOutcome {
    pub accepted: bool,
    pub reason: String,
}

impl HandlerOutcome {
    pub fn accept(reason: impl Into<String>) -> Self {
        HandlerOutcome {
            accepted: true,
            reason: reason.into(),
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        HandlerOutcome {
            accepted: false,
            reason: reason.into(),
        }
    }
}

// One pure validator per verification method. Handlers never touch the
// store; persistence of the outcome belongs to the orchestrator.
pub trait MethodHandler: Send + Sync {
    fn handle(&self, user: &User, data: &serde_json::Value) -> HandlerOutcome;
}

// Lookup table of handler implementations. Adding a method is a
// registration, not a new branch at every call site.
pub struct HandlerRegistry {
    handlers: HashMap<VerificationType, Box<dyn MethodHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        HandlerRegistry {
            handlers: HashMap::new(),
        }
    }

    /// Registry populated with the built-in document and contact handlers.
    /// Bank-account and payment-method verification go through the provider
    /// scorers instead.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(VerificationType::PrepaidCard, Box::new(PrepaidCardHandler));
        registry.register(VerificationType::GovernmentId, Box::new(GovernmentIdHandler));
        registry.register(VerificationType::UtilityBill, Box::new(UtilityBillHandler));
        registry.register(VerificationType::PhoneNumber, Box::new(PhoneNumberHandler));
        registry
    }

    pub fn register(&mut self, verification_type: VerificationType, handler: Box<dyn MethodHandler>) {
        self.handlers.insert(verification_type, handler);
    }

    pub fn get(&self, verification_type: VerificationType) -> Option<&dyn MethodHandler> {
        self.handlers.get(&verification_type).map(|h| h.as_ref())
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn str_field<'a>(data: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    data.get(key).and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// `MM/YY` with a real month.
fn valid_expiry(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 5 || bytes[2] != b'/' {
        return false;
    }
    let (month, year) = (&s[..2], &s[3..]);
    if !all_digits(month) || !all_digits(year) {
        return false;
    }
    matches!(month.parse::<u32>(), Ok(m) if (1..=12).contains(&m))
}

/// E.164-like: leading `+`, then 8 to 15 digits, no leading zero.
fn valid_phone_number(s: &str) -> bool {
    let Some(digits) = s.strip_prefix('+') else {
        return false;
    };
    (8..=15).contains(&digits.len()) && all_digits(digits) && !digits.starts_with('0')
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates.
fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

// Prepaid/card verification: format validation only in this tier, no
// actual charge is attempted.
pub struct PrepaidCardHandler;

impl MethodHandler for PrepaidCardHandler {
    fn handle(&self, _user: &User, data: &serde_json::Value) -> HandlerOutcome {
        let Some(card_number) = str_field(data, "card_number") else {
            return HandlerOutcome::reject("card number is required");
        };
        let Some(expiry) = str_field(data, "expiry") else {
            return HandlerOutcome::reject("card expiry is required");
        };
        let Some(cvv) = str_field(data, "cvv") else {
            return HandlerOutcome::reject("card CVV is required");
        };

        if !all_digits(card_number) || !(13..=19).contains(&card_number.len()) {
            return HandlerOutcome::reject("card number must be 13-19 digits");
        }
        if !valid_expiry(expiry) {
            return HandlerOutcome::reject("card expiry must be in MM/YY format");
        }
        if !all_digits(cvv) || !(3..=4).contains(&cvv.len()) {
            return HandlerOutcome::reject("card CVV must be 3-4 digits");
        }

        HandlerOutcome::accept("card details passed format validation")
    }
}

// Government ID verification
pub struct GovernmentIdHandler;

impl MethodHandler for GovernmentIdHandler {
    fn handle(&self, _user: &User, data: &serde_json::Value) -> HandlerOutcome {
        let Some(document_type) = str_field(data, "document_type") else {
            return HandlerOutcome::reject("document type is required");
        };
        if str_field(data, "document_number").is_none() {
            return HandlerOutcome::reject("document number is required");
        }
        if str_field(data, "expiry_date").is_none() {
            return HandlerOutcome::reject("document expiry date is required");
        }

        if !ACCEPTED_DOCUMENT_TYPES.contains(&document_type) {
            return HandlerOutcome::reject(format!(
                "unsupported document type: {}",
                document_type
            ));
        }

        HandlerOutcome::accept("government ID accepted")
    }
}

// Utility bill verification with a 90-day freshness requirement
pub struct UtilityBillHandler;

impl MethodHandler for UtilityBillHandler {
    fn handle(&self, _user: &User, data: &serde_json::Value) -> HandlerOutcome {
        let Some(bill_type) = str_field(data, "bill_type") else {
            return HandlerOutcome::reject("bill type is required");
        };
        let Some(issue_date_raw) = str_field(data, "issue_date") else {
            return HandlerOutcome::reject("bill issue date is required");
        };
        if str_field(data, "address").is_none() {
            return HandlerOutcome::reject("bill address is required");
        }

        if !ACCEPTED_BILL_TYPES.contains(&bill_type) {
            return HandlerOutcome::reject(format!("unsupported bill type: {}", bill_type));
        }

        let Some(issue_date) = parse_date(issue_date_raw) else {
            return HandlerOutcome::reject("bill issue date is not a valid date");
        };

        if issue_date < Utc::now() - Duration::days(UTILITY_BILL_MAX_AGE_DAYS) {
            return HandlerOutcome::reject(format!(
                "bill is too old: issued more than {} days ago",
                UTILITY_BILL_MAX_AGE_DAYS
            ));
        }

        HandlerOutcome::accept("utility bill accepted")
    }
}

// Phone verification: accepts only on exact one-time code match against
// the challenge the caller issued.
pub struct PhoneNumberHandler;

impl MethodHandler for PhoneNumberHandler {
    fn handle(&self, _user: &User, data: &serde_json::Value) -> HandlerOutcome {
        let Some(phone_number) = str_field(data, "phone_number") else {
            return HandlerOutcome::reject("phone number is required");
        };
        let Some(code) = str_field(data, "code") else {
            return HandlerOutcome::reject("verification code is required");
        };
        let Some(expected_code) = str_field(data, "expected_code") else {
            return HandlerOutcome::reject("no verification code was issued for this number");
        };

        if !valid_phone_number(phone_number) {
            return HandlerOutcome::reject("phone number must be in E.164 format");
        }
        if code != expected_code {
            return HandlerOutcome::reject("verification code does not match");
        }

        HandlerOutcome::accept("phone number verified")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user() -> User {
        User::new()
    }

    #[test]
    fn test_prepaid_card_accepts_valid_details() {
        let outcome = PrepaidCardHandler.handle(
            &user(),
            &json!({"card_number": "4111111111111111", "expiry": "09/27", "cvv": "123"}),
        );
        assert!(outcome.accepted);
    }

    #[test]
    fn test_prepaid_card_rejects_missing_and_malformed_fields() {
        let cases = [
            json!({"expiry": "09/27", "cvv": "123"}),
            json!({"card_number": "4111111111111111", "cvv": "123"}),
            json!({"card_number": "4111111111111111", "expiry": "09/27"}),
            json!({"card_number": "411abc", "expiry": "09/27", "cvv": "123"}),
            json!({"card_number": "41111111", "expiry": "09/27", "cvv": "123"}),
            json!({"card_number": "4111111111111111", "expiry": "13/27", "cvv": "123"}),
            json!({"card_number": "4111111111111111", "expiry": "2027-09", "cvv": "123"}),
            json!({"card_number": "4111111111111111", "expiry": "09/27", "cvv": "12"}),
            json!({"card_number": "4111111111111111", "expiry": "09/27", "cvv": "12345"}),
        ];
        for data in &cases {
            let outcome = PrepaidCardHandler.handle(&user(), data);
            assert!(!outcome.accepted, "expected rejection for {}", data);
        }
    }

    #[test]
    fn test_government_id_validates_document_type() {
        let accepted = GovernmentIdHandler.handle(
            &user(),
            &json!({"document_type": "passport", "document_number": "X1234567", "expiry_date": "2030-01-01"}),
        );
        assert!(accepted.accepted);

        let rejected = GovernmentIdHandler.handle(
            &user(),
            &json!({"document_type": "library_card", "document_number": "X1234567", "expiry_date": "2030-01-01"}),
        );
        assert!(!rejected.accepted);

        let missing = GovernmentIdHandler.handle(
            &user(),
            &json!({"document_type": "passport", "expiry_date": "2030-01-01"}),
        );
        assert!(!missing.accepted);
    }

    #[test]
    fn test_utility_bill_freshness() {
        let recent = (Utc::now() - Duration::days(10)).to_rfc3339();
        let outcome = UtilityBillHandler.handle(
            &user(),
            &json!({"bill_type": "electricity", "issue_date": recent, "address": "1 Main St"}),
        );
        assert!(outcome.accepted);

        let stale = (Utc::now() - Duration::days(100)).to_rfc3339();
        let outcome = UtilityBillHandler.handle(
            &user(),
            &json!({"bill_type": "electricity", "issue_date": stale, "address": "1 Main St"}),
        );
        assert!(!outcome.accepted);
        assert!(outcome.reason.contains("too old"));
    }

    #[test]
    fn test_utility_bill_rejects_unknown_type() {
        let recent = (Utc::now() - Duration::days(5)).to_rfc3339();
        let outcome = UtilityBillHandler.handle(
            &user(),
            &json!({"bill_type": "cable", "issue_date": recent, "address": "1 Main St"}),
        );
        assert!(!outcome.accepted);
    }

    #[test]
    fn test_phone_requires_exact_code_match() {
        let accepted = PhoneNumberHandler.handle(
            &user(),
            &json!({"phone_number": "+14155551234", "code": "482913", "expected_code": "482913"}),
        );
        assert!(accepted.accepted);

        let wrong_code = PhoneNumberHandler.handle(
            &user(),
            &json!({"phone_number": "+14155551234", "code": "000000", "expected_code": "482913"}),
        );
        assert!(!wrong_code.accepted);

        let bad_number = PhoneNumberHandler.handle(
            &user(),
            &json!({"phone_number": "4155551234", "code": "482913", "expected_code": "482913"}),
        );
        assert!(!bad_number.accepted);
    }

    #[test]
    fn test_registry_dispatch() {
        let registry = HandlerRegistry::with_defaults();
        assert!(registry.get(VerificationType::PhoneNumber).is_some());
        assert!(registry.get(VerificationType::UtilityBill).is_some());
        // Provider-backed methods have no local handler
        assert!(registry.get(VerificationType::BankAccount).is_none());
        assert!(registry.get(VerificationType::PaymentMethod).is_none());
    }
}
