use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationErrors;

/// Maximum title length, counted in characters.
pub const TITLE_MAX_CHARS: usize = 255;

/// Post entity - a stored blog post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated title/body pair, ready to be written to a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostInput {
    title: String,
    body: String,
}

impl PostInput {
    /// Validate raw field values.
    ///
    /// Both fields are required and must contain something other than
    /// whitespace. The title may hold at most [`TITLE_MAX_CHARS`] characters.
    /// Values are kept exactly as supplied.
    pub fn new(title: Option<String>, body: Option<String>) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let title = required("title", title, &mut errors);
        if let Some(title) = &title
            && title.chars().count() > TITLE_MAX_CHARS
        {
            errors.add(
                "title",
                format!("The title field must not be greater than {TITLE_MAX_CHARS} characters."),
            );
        }
        let body = required("body", body, &mut errors);

        match (title, body) {
            (Some(title), Some(body)) if errors.is_empty() => Ok(Self { title, body }),
            _ => Err(errors),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn into_parts(self) -> (String, String) {
        (self.title, self.body)
    }
}

fn required(field: &str, value: Option<String>, errors: &mut ValidationErrors) -> Option<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Some(v),
        _ => {
            errors.add(field, format!("The {field} field is required."));
            None
        }
    }
}

/// An unvalidated record read from an import file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRow {
    /// 1-based line in the source sheet, header included.
    pub line: usize,
    pub title: Option<String>,
    pub body: Option<String>,
}

impl PostRow {
    pub fn validate(self) -> Result<PostInput, ValidationErrors> {
        PostInput::new(self.title, self.body)
    }
}

/// Timestamp for a write, at the microsecond resolution storage keeps.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Next `updated_at` for a record last touched at `previous`.
///
/// Always strictly later than `previous`, even when the clock has not moved.
pub fn touched_at(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(title: &str, body: &str) -> Result<PostInput, ValidationErrors> {
        PostInput::new(Some(title.to_string()), Some(body.to_string()))
    }

    #[test]
    fn test_title_length_boundary() {
        assert!(input(&"a".repeat(255), "body").is_ok());

        let errors = input(&"a".repeat(256), "body").unwrap_err();
        assert_eq!(
            errors.get("title"),
            Some(&["The title field must not be greater than 255 characters.".to_string()][..])
        );
    }

    #[test]
    fn test_title_length_counts_characters() {
        assert!(input(&"é".repeat(255), "body").is_ok());
    }

    #[test]
    fn test_missing_and_blank_fields() {
        let errors = PostInput::new(None, Some("   ".to_string())).unwrap_err();
        assert!(errors.get("title").is_some());
        assert!(errors.get("body").is_some());
    }

    #[test]
    fn test_values_are_kept_verbatim() {
        let input = input("  Hello ", "World\n").unwrap();
        assert_eq!(input.title(), "  Hello ");
        assert_eq!(input.body(), "World\n");
    }

    #[test]
    fn test_touched_at_strictly_increases() {
        let future = now() + Duration::seconds(60);
        assert!(touched_at(future) > future);

        let past = now() - Duration::seconds(60);
        assert!(touched_at(past) > past);
    }
}
