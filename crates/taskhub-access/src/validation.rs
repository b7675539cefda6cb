//! Field-level validation of incoming requests.

use chrono::{Months, NaiveDate};
use taskhub_core::error::TaskhubResult;
use taskhub_core::models::task::{CreateTask, Task, UpdateTask};
use taskhub_core::models::user::CreateUser;

use crate::error::AccessError;

pub const TITLE_MAX: usize = 200;
pub const TASK_DESCRIPTION_MAX: usize = 2000;
pub const GROUP_NAME_MAX: usize = 200;
pub const GROUP_DESCRIPTION_MAX: usize = 1000;
pub const FIRST_NAME_MAX: usize = 100;
pub const LAST_NAME_MAX: usize = 200;

fn required(field: &'static str, value: &str, max: usize) -> TaskhubResult<()> {
    if value.trim().is_empty() {
        return Err(AccessError::invalid(field, "is required").into());
    }
    bounded(field, value, max)
}

fn bounded(field: &'static str, value: &str, max: usize) -> TaskhubResult<()> {
    if value.chars().count() > max {
        let message = format!("must be at most {max} characters");
        return Err(AccessError::invalid(field, message).into());
    }
    Ok(())
}

fn optional(field: &'static str, value: Option<&str>, max: usize) -> TaskhubResult<()> {
    value.map_or(Ok(()), |v| bounded(field, v, max))
}

/// A due date must lie between `today` and `horizon_months` from today.
pub fn due_date(date: NaiveDate, today: NaiveDate, horizon_months: u32) -> TaskhubResult<()> {
    if date < today {
        return Err(AccessError::invalid("due_date", "cannot be in the past").into());
    }
    let limit = today
        .checked_add_months(Months::new(horizon_months))
        .unwrap_or(NaiveDate::MAX);
    if date > limit {
        return Err(AccessError::invalid(
            "due_date",
            format!("cannot be more than {horizon_months} months ahead"),
        )
        .into());
    }
    Ok(())
}

pub fn new_task(input: &CreateTask, today: NaiveDate, horizon_months: u32) -> TaskhubResult<()> {
    required("title", &input.title, TITLE_MAX)?;
    optional("description", input.description.as_deref(), TASK_DESCRIPTION_MAX)?;
    if let Some(date) = input.due_date {
        due_date(date, today, horizon_months)?;
    }
    Ok(())
}

/// Validate a projected change-set against the task it applies to. The
/// due date is only checked when it actually changes, so an existing
/// date that has since passed does not block unrelated edits.
pub fn task_changes(
    current: &Task,
    changes: &UpdateTask,
    today: NaiveDate,
    horizon_months: u32,
) -> TaskhubResult<()> {
    if let Some(title) = &changes.title {
        required("title", title, TITLE_MAX)?;
    }
    if let Some(description) = &changes.description {
        optional("description", description.as_deref(), TASK_DESCRIPTION_MAX)?;
    }
    if let Some(Some(date)) = changes.due_date {
        if current.due_date != Some(date) {
            due_date(date, today, horizon_months)?;
        }
    }
    Ok(())
}

pub fn group_name(name: &str) -> TaskhubResult<()> {
    required("name", name, GROUP_NAME_MAX)
}

pub fn group_description(description: Option<&str>) -> TaskhubResult<()> {
    optional("description", description, GROUP_DESCRIPTION_MAX)
}

/// Phone numbers: 7 to 20 characters of digits, spaces, `-`, `(` and
/// `)`, an optional leading `+`, and at least 7 digits.
pub fn phone(value: &str) -> TaskhubResult<()> {
    let len = value.chars().count();
    let body = value.strip_prefix('+').unwrap_or(value);
    let allowed = body
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')'));
    let digits = body.chars().filter(char::is_ascii_digit).count();

    if !(7..=20).contains(&len) || !allowed || digits < 7 {
        return Err(AccessError::invalid("phone", "is not a valid phone number").into());
    }
    Ok(())
}

pub fn new_user(input: &CreateUser, today: NaiveDate) -> TaskhubResult<()> {
    if !input.email.contains('@') {
        return Err(AccessError::invalid("email", "is not a valid email address").into());
    }
    required("first_name", &input.first_name, FIRST_NAME_MAX)?;
    required("last_name", &input.last_name, LAST_NAME_MAX)?;
    if let Some(number) = &input.phone {
        phone(number)?;
    }
    if let Some(born) = input.date_of_birth {
        if born > today {
            let err = AccessError::invalid("date_of_birth", "cannot be in the future");
            return Err(err.into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use taskhub_core::TaskhubError;
    use uuid::Uuid;

    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    fn is_invalid(result: TaskhubResult<()>) -> bool {
        matches!(result, Err(TaskhubError::InvalidInput { .. }))
    }

    #[test]
    fn due_date_window() {
        assert!(due_date(today(), today(), 12).is_ok());
        assert!(due_date(NaiveDate::from_ymd_opt(2027, 3, 10).unwrap(), today(), 12).is_ok());
        assert!(is_invalid(due_date(
            NaiveDate::from_ymd_opt(2026, 3, 9).unwrap(),
            today(),
            12
        )));
        assert!(is_invalid(due_date(
            NaiveDate::from_ymd_opt(2027, 3, 11).unwrap(),
            today(),
            12
        )));
    }

    #[test]
    fn task_title_is_required_and_bounded() {
        let mut input = CreateTask {
            title: "   ".into(),
            description: None,
            status: None,
            priority: None,
            due_date: None,
            group_id: Uuid::new_v4(),
            assigned_user_id: None,
        };
        assert!(is_invalid(new_task(&input, today(), 12)));

        input.title = "x".repeat(TITLE_MAX + 1);
        assert!(is_invalid(new_task(&input, today(), 12)));

        input.title = "x".repeat(TITLE_MAX);
        assert!(new_task(&input, today(), 12).is_ok());

        input.description = Some("d".repeat(TASK_DESCRIPTION_MAX + 1));
        assert!(is_invalid(new_task(&input, today(), 12)));
    }

    #[test]
    fn unchanged_past_due_date_does_not_block_updates() {
        let past = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let task = Task {
            id: Uuid::new_v4(),
            title: "Old".into(),
            description: None,
            status: Default::default(),
            priority: Default::default(),
            created_at: chrono::Utc::now(),
            updated_at: None,
            due_date: Some(past),
            group_id: Uuid::new_v4(),
            assigned_user_id: None,
            created_by_id: Uuid::new_v4(),
            version: 1,
        };
        let resubmitted = UpdateTask {
            title: Some("New".into()),
            due_date: Some(Some(past)),
            ..Default::default()
        };
        assert!(task_changes(&task, &resubmitted, today(), 12).is_ok());

        let moved = UpdateTask {
            due_date: Some(NaiveDate::from_ymd_opt(2025, 2, 1)),
            ..Default::default()
        };
        assert!(is_invalid(task_changes(&task, &moved, today(), 12)));
    }

    #[test]
    fn phone_formats() {
        for ok in ["+1 (555) 010-0199", "5550100", "020 7946 0958"] {
            assert!(phone(ok).is_ok(), "{ok} should be accepted");
        }
        for bad in ["12345", "555-CALL-NOW", "++15550100", "+1 (555) 010-0199-0000-1"] {
            assert!(is_invalid(phone(bad)), "{bad} should be rejected");
        }
    }

    #[test]
    fn user_fields() {
        let mut input = CreateUser {
            email: "ann@example.com".into(),
            first_name: "Ann".into(),
            last_name: "Lee".into(),
            phone: None,
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1),
            roles: BTreeSet::new(),
        };
        assert!(new_user(&input, today()).is_ok());

        input.date_of_birth = NaiveDate::from_ymd_opt(2030, 1, 1);
        assert!(is_invalid(new_user(&input, today())));

        input.date_of_birth = None;
        input.email = "not-an-email".into();
        assert!(is_invalid(new_user(&input, today())));
    }
}
