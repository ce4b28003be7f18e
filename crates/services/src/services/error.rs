use chrono::NaiveDate;
use db::{ConnectionTrait, DbErr, models::user::User};
use policy::DenyReason;
use thiserror::Error;

use super::image::ImageError;

/// Failure of an operation on the project hierarchy or notification feed.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Forbidden(#[from] DenyReason),
    #[error("{0} not found.")]
    NotFound(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Image(#[from] ImageError),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// Checks a required, length-limited text field.
pub(crate) fn require_text(field: &str, value: &str, max_len: usize) -> Result<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::validation(format!("The {field} field is required.")));
    }
    if trimmed.chars().count() > max_len {
        return Err(ServiceError::validation(format!(
            "The {field} field must not be greater than {max_len} characters."
        )));
    }
    Ok(())
}

/// Rejects an end date that is not strictly after the start date.
pub(crate) fn require_date_order(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<()> {
    match (start, end) {
        (Some(start), Some(end)) if end <= start => Err(ServiceError::validation(
            "The end date field must be a date after start date.",
        )),
        _ => Ok(()),
    }
}

/// Rejects an end date before the start date; a single-day range is fine.
pub(crate) fn require_date_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<()> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(ServiceError::validation(
            "The end date field must be a date after or equal to start date.",
        )),
        _ => Ok(()),
    }
}

/// Checks that every referenced user id exists.
pub(crate) async fn require_users<C: ConnectionTrait>(
    db: &C,
    field: &str,
    user_ids: &[i64],
) -> Result<()> {
    let mut wanted = user_ids.to_vec();
    wanted.sort_unstable();
    wanted.dedup();
    let found = User::find_by_ids(db, &wanted).await?;
    if found.len() != wanted.len() {
        return Err(ServiceError::validation(format!(
            "The selected {field} is invalid."
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_and_date_rules() {
        assert!(require_text("name", "Apollo", 255).is_ok());
        assert!(matches!(
            require_text("name", "   ", 255),
            Err(ServiceError::Validation(msg)) if msg == "The name field is required."
        ));
        assert!(require_text("tag", &"x".repeat(101), 100).is_err());

        let day = |d| NaiveDate::from_ymd_opt(2025, 1, d).unwrap();
        assert!(require_date_order(Some(day(1)), Some(day(2))).is_ok());
        assert!(require_date_order(Some(day(2)), Some(day(2))).is_err());
        assert!(require_date_order(None, Some(day(2))).is_ok());

        assert!(require_date_range(Some(day(2)), Some(day(2))).is_ok());
        assert!(require_date_range(Some(day(3)), Some(day(2))).is_err());
    }
}
