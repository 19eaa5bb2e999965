//! Quote requests: the public form, its validation rules and the status
//! lifecycle staff move a request through.

pub mod store;

use chrono::NaiveDate;
use regex::Regex;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

use crate::db::models::NewQuoteRequest;

pub const MIN_NAME_CHARS: usize = 2;
pub const MIN_PHONE_DIGITS: usize = 8;
pub const MAX_PHONE_DIGITS: usize = 15;
pub const MAX_MESSAGE_CHARS: usize = 2000;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Wedding,
    Corporate,
    Festival,
    Private,
    Other,
}

impl EventType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "wedding" | "boda" => Some(EventType::Wedding),
            "corporate" | "company" => Some(EventType::Corporate),
            "festival" | "public" => Some(EventType::Festival),
            "private" | "party" | "birthday" => Some(EventType::Private),
            "other" => Some(EventType::Other),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Wedding => "wedding",
            EventType::Corporate => "corporate",
            EventType::Festival => "festival",
            EventType::Private => "private",
            EventType::Other => "other",
        }
    }
}

/// Where a quote request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStatus {
    New,
    Contacted,
    Quoted,
    Confirmed,
    Cancelled,
}

impl QuoteStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "new" => Some(QuoteStatus::New),
            "contacted" => Some(QuoteStatus::Contacted),
            "quoted" => Some(QuoteStatus::Quoted),
            "confirmed" => Some(QuoteStatus::Confirmed),
            "cancelled" | "canceled" => Some(QuoteStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::New => "new",
            QuoteStatus::Contacted => "contacted",
            QuoteStatus::Quoted => "quoted",
            QuoteStatus::Confirmed => "confirmed",
            QuoteStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QuoteStatus::Confirmed | QuoteStatus::Cancelled)
    }

    fn rank(&self) -> u8 {
        match self {
            QuoteStatus::New => 0,
            QuoteStatus::Contacted => 1,
            QuoteStatus::Quoted => 2,
            QuoteStatus::Confirmed | QuoteStatus::Cancelled => 3,
        }
    }

    /// Forward moves only; any open request may be cancelled; closed
    /// requests never change.
    pub fn can_move_to(&self, next: QuoteStatus) -> bool {
        if self.is_terminal() || *self == next {
            return false;
        }
        next == QuoteStatus::Cancelled || next.rank() > self.rank()
    }
}

macro_rules! sql_text_enum {
    ($ty:ty, $what:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let s = value.as_str()?;
                <$ty>::parse(s)
                    .ok_or_else(|| FromSqlError::Other(format!("unknown {}: {s}", $what).into()))
            }
        }
    };
}

sql_text_enum!(EventType, "event type");
sql_text_enum!(QuoteStatus, "quote status");

/// One failed validation rule.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("name must be at least 2 characters")]
    NameTooShort,

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("phone must have 8-15 digits")]
    InvalidPhone,

    #[error("invalid event date (expected YYYY-MM-DD): {0}")]
    InvalidDate(String),

    #[error("event date {0} is in the past")]
    DateInPast(NaiveDate),

    #[error("unknown event type: {0} (expected wedding, corporate, festival, private or other)")]
    UnknownEventType(String),

    #[error("location is required")]
    MissingLocation,

    #[error("guest count must be positive")]
    InvalidGuestCount,

    #[error("budget cannot be negative")]
    NegativeBudget,

    #[error("message is {len} characters, the limit is 2000")]
    MessageTooLong { len: usize },
}

/// Every rule a form failed, reported together.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl std::error::Error for ValidationErrors {}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "quote request is invalid:")?;
        for e in &self.0 {
            write!(f, "\n  - {e}")?;
        }
        Ok(())
    }
}

impl ValidationErrors {
    pub fn contains(&self, e: &ValidationError) -> bool {
        self.0.contains(e)
    }
}

/// Raw quote form input, as typed by the visitor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub event_date: String,
    pub event_type: String,
    pub location: String,
    pub guest_count: Option<i64>,
    pub budget: Option<f64>,
    pub interest: Option<String>,
    pub message: String,
}

impl QuoteForm {
    /// Check every rule against `today` and build the request to store.
    pub fn validate(&self, today: NaiveDate) -> Result<NewQuoteRequest, ValidationErrors> {
        let mut errors = Vec::new();

        let name = self.name.trim();
        if name.chars().count() < MIN_NAME_CHARS {
            errors.push(ValidationError::NameTooShort);
        }

        let email = self.email.trim();
        if !EMAIL_RE.is_match(email) {
            errors.push(ValidationError::InvalidEmail(email.to_string()));
        }

        let digits = self.phone.chars().filter(|c| c.is_ascii_digit()).count();
        if !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits) {
            errors.push(ValidationError::InvalidPhone);
        }

        let date_str = self.event_date.trim();
        match NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
            Ok(d) if d < today => errors.push(ValidationError::DateInPast(d)),
            Ok(_) => {}
            Err(_) => errors.push(ValidationError::InvalidDate(date_str.to_string())),
        }

        let event_type = EventType::parse(&self.event_type);
        if event_type.is_none() {
            errors.push(ValidationError::UnknownEventType(self.event_type.trim().to_string()));
        }

        let location = self.location.trim();
        if location.is_empty() {
            errors.push(ValidationError::MissingLocation);
        }

        if self.guest_count.is_some_and(|n| n <= 0) {
            errors.push(ValidationError::InvalidGuestCount);
        }

        if self.budget.is_some_and(|b| b < 0.0) {
            errors.push(ValidationError::NegativeBudget);
        }

        let message = self.message.trim();
        let len = message.chars().count();
        if len > MAX_MESSAGE_CHARS {
            errors.push(ValidationError::MessageTooLong { len });
        }

        match event_type {
            Some(event_type) if errors.is_empty() => Ok(NewQuoteRequest {
                id: uuid::Uuid::new_v4().to_string(),
                name: name.to_string(),
                email: email.to_lowercase(),
                phone: self.phone.trim().to_string(),
                event_date: date_str.to_string(),
                event_type,
                location: location.to_string(),
                guest_count: self.guest_count,
                budget: self.budget,
                interest: self
                    .interest
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
                message: message.to_string(),
            }),
            _ => Err(ValidationErrors(errors)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    }

    fn form() -> QuoteForm {
        QuoteForm {
            name: "Lucía Pérez".into(),
            email: "Lucia@Example.com ".into(),
            phone: "+34 600 123 456".into(),
            event_date: "2026-07-15".into(),
            event_type: "Wedding".into(),
            location: "Valencia".into(),
            guest_count: Some(150),
            budget: Some(3500.0),
            interest: Some("  ".into()),
            message: "Ten-minute show over the lake.".into(),
        }
    }

    #[test]
    fn valid_form_is_normalised() {
        let req = form().validate(today()).unwrap();
        assert_eq!(req.email, "lucia@example.com");
        assert_eq!(req.event_type, EventType::Wedding);
        assert_eq!(req.interest, None);
        assert!(!req.id.is_empty());
    }

    #[test]
    fn event_today_is_allowed() {
        let mut f = form();
        f.event_date = "2026-06-01".into();
        assert!(f.validate(today()).is_ok());
    }

    #[test]
    fn all_failures_are_reported_together() {
        let f = QuoteForm {
            name: "A".into(),
            email: "not-an-email".into(),
            phone: "123".into(),
            event_date: "2026-05-31".into(),
            event_type: "rave".into(),
            location: " ".into(),
            guest_count: Some(0),
            budget: Some(-1.0),
            interest: None,
            message: "x".repeat(MAX_MESSAGE_CHARS + 1),
        };
        let errs = f.validate(today()).unwrap_err();
        assert_eq!(errs.0.len(), 9);
        assert!(errs.contains(&ValidationError::NameTooShort));
        assert!(errs.contains(&ValidationError::DateInPast(
            NaiveDate::from_ymd_opt(2026, 5, 31).unwrap()
        )));
        assert!(errs.contains(&ValidationError::MessageTooLong {
            len: MAX_MESSAGE_CHARS + 1
        }));
        assert!(errs.to_string().starts_with("quote request is invalid:"));
    }

    #[test]
    fn unparseable_date_is_reported() {
        let mut f = form();
        f.event_date = "15/07/2026".into();
        let errs = f.validate(today()).unwrap_err();
        assert_eq!(errs.0, vec![ValidationError::InvalidDate("15/07/2026".into())]);
    }

    #[test]
    fn status_lifecycle() {
        use QuoteStatus::*;
        assert!(New.can_move_to(Contacted));
        assert!(New.can_move_to(Quoted));
        assert!(Quoted.can_move_to(Confirmed));
        assert!(Contacted.can_move_to(Cancelled));
        assert!(!Contacted.can_move_to(New));
        assert!(!Confirmed.can_move_to(Cancelled));
        assert!(!Cancelled.can_move_to(New));
        assert!(!New.can_move_to(New));
    }

    #[test]
    fn parse_accepts_aliases() {
        assert_eq!(EventType::parse("Boda"), Some(EventType::Wedding));
        assert_eq!(QuoteStatus::parse("canceled"), Some(QuoteStatus::Cancelled));
        assert_eq!(QuoteStatus::parse("lost"), None);
    }
}
