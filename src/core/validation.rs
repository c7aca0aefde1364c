//! Client-side field validation
//!
//! Runs synchronously before any write reaches the database. All problems
//! found in one record are reported together.

use std::fmt;
use std::sync::OnceLock;

use miette::Diagnostic;
use regex::Regex;
use rust_decimal::Decimal;
use thiserror::Error;

/// Message for money or quantity arithmetic that leaves the decimal range
pub const AMOUNT_TOO_LARGE: &str = "amount too large";

/// A single invalid field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every validation failure found in a record
#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
#[error("invalid input: {}", .errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
#[diagnostic(code(garage::validation), help("fix the listed fields and try again"))]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError {
                field,
                message: message.into(),
            }],
        }
    }

    /// Whether a specific field failed
    pub fn has(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

/// Records that can check their own fields
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationErrors>;
}

/// Accumulates field errors
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    /// Value must be present and not blank
    pub fn required(mut self, field: &'static str, value: &str) -> Self {
        if value.trim().is_empty() {
            self.push(field, "is required");
        }
        self
    }

    /// Optional e-mail must be well formed when present
    pub fn email(mut self, field: &'static str, value: Option<&str>) -> Self {
        if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
            if !is_valid_email(v) {
                self.push(field, format!("'{}' is not a valid e-mail address", v));
            }
        }
        self
    }

    /// Optional CPF must have valid check digits when present
    pub fn cpf(mut self, field: &'static str, value: Option<&str>) -> Self {
        if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
            if !is_valid_cpf(v) {
                self.push(field, format!("'{}' is not a valid CPF", v));
            }
        }
        self
    }

    /// License plate in the old or Mercosul format
    pub fn plate(mut self, field: &'static str, value: &str) -> Self {
        if value.trim().is_empty() {
            self.push(field, "is required");
        } else if !is_valid_plate(value) {
            self.push(field, format!("'{}' is not a valid license plate", value));
        }
        self
    }

    pub fn non_negative(mut self, field: &'static str, value: Decimal) -> Self {
        if value.is_sign_negative() && !value.is_zero() {
            self.push(field, "must not be negative");
        }
        self
    }

    pub fn positive(mut self, field: &'static str, value: Decimal) -> Self {
        if value <= Decimal::ZERO {
            self.push(field, "must be greater than zero");
        }
        self
    }

    /// Optional model year within 1900..=max_year
    pub fn year(mut self, field: &'static str, value: Option<i32>, max_year: i32) -> Self {
        if let Some(year) = value {
            if !(1900..=max_year).contains(&year) {
                self.push(field, format!("must be between 1900 and {}", max_year));
            }
        }
        self
    }

    /// Arbitrary rule
    pub fn check(mut self, ok: bool, field: &'static str, message: &str) -> Self {
        if !ok {
            self.push(field, message);
        }
        self
    }

    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors {
                errors: self.errors,
            })
        }
    }
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap())
}

fn plate_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z]{3}[0-9][A-Z0-9][0-9]{2}$").unwrap())
}

pub fn is_valid_email(value: &str) -> bool {
    email_regex().is_match(value.trim())
}

/// Upper-case a plate and drop hyphens and spaces ("abc-1234" -> "ABC1234");
/// any other punctuation is kept so the format check rejects it
pub fn normalize_plate(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

pub fn is_valid_plate(value: &str) -> bool {
    plate_regex().is_match(&normalize_plate(value))
}

/// Keep only the digits of a CPF ("529.982.247-25" -> "52998224725")
pub fn normalize_cpf(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Check length, repeated digits and both check digits
pub fn is_valid_cpf(value: &str) -> bool {
    if value
        .chars()
        .any(|c| !(c.is_ascii_digit() || c == '.' || c == '-' || c == ' '))
    {
        return false;
    }

    let digits: Vec<u32> = normalize_cpf(value)
        .chars()
        .filter_map(|c| c.to_digit(10))
        .collect();
    if digits.len() != 11 || digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    let check = |len: usize| -> u32 {
        let sum: u32 = digits[..len]
            .iter()
            .enumerate()
            .map(|(i, d)| d * (len as u32 + 1 - i as u32))
            .sum();
        let rest = (sum * 10) % 11;
        if rest == 10 {
            0
        } else {
            rest
        }
    };

    check(9) == digits[9] && check(10) == digits[10]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpf_validation() {
        assert!(is_valid_cpf("529.982.247-25"));
        assert!(is_valid_cpf("52998224725"));
        assert!(!is_valid_cpf("529.982.247-24"));
        assert!(!is_valid_cpf("111.111.111-11"));
        assert!(!is_valid_cpf("1234"));
        assert!(!is_valid_cpf("529a982b247c25"));
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("ana@oficina.com.br"));
        assert!(!is_valid_email("ana@oficina"));
        assert!(!is_valid_email("ana oficina@x.com"));
    }

    #[test]
    fn test_plate_formats() {
        assert!(is_valid_plate("ABC-1234"));
        assert!(is_valid_plate("abc1d23"));
        assert!(!is_valid_plate("AB12345"));
        assert_eq!(normalize_plate("abc-1d23"), "ABC1D23");
        assert!(is_valid_plate("abc 1234"));
        assert!(!is_valid_plate("A!B@C#1234"));
        assert!(!is_valid_plate("ABC.1234"));
        assert!(!is_valid_plate("ABC_1D23"));
    }

    #[test]
    fn test_validator_collects_all_errors() {
        let err = Validator::new()
            .required("name", "  ")
            .email("email", Some("nope"))
            .cpf("cpf", Some("000.000.000-00"))
            .finish()
            .unwrap_err();
        assert_eq!(err.errors.len(), 3);
        assert!(err.has("name"));
        assert!(err.has("email"));
        assert!(err.has("cpf"));
    }

    #[test]
    fn test_optional_fields_may_be_blank() {
        assert!(Validator::new()
            .required("name", "Ana")
            .email("email", Some(""))
            .cpf("cpf", None)
            .finish()
            .is_ok());
    }

    #[test]
    fn test_numeric_rules() {
        let err = Validator::new()
            .non_negative("price", Decimal::new(-1, 0))
            .positive("quantity", Decimal::ZERO)
            .year("year", Some(1850), 2030)
            .finish()
            .unwrap_err();
        assert_eq!(err.errors.len(), 3);
    }
}
