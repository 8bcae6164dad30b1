use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub user_id: String,
}

/// A note that has not been saved yet. Both fields are required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
}

/// Partial note update. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl NoteDraft {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require("title", &self.title)?;
        require("content", &self.content)
    }

    /// Turn the draft into a note owned by `user_id`, with a fresh id.
    pub fn into_note(self, user_id: &str) -> Result<Note, ValidationError> {
        self.validate()?;
        Ok(Note {
            id: Uuid::new_v4().to_string(),
            title: self.title,
            content: self.content,
            created_at: Utc::now(),
            user_id: user_id.to_string(),
        })
    }
}

impl NotePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            require("title", title)?;
        }
        if let Some(content) = &self.content {
            require("content", content)?;
        }
        Ok(())
    }
}

impl Note {
    /// Copy of this note with `patch` applied.
    pub fn patched(&self, patch: &NotePatch) -> Note {
        let mut note = self.clone();
        if let Some(title) = &patch.title {
            note.title = title.clone();
        }
        if let Some(content) = &patch.content {
            note.content = content.clone();
        }
        note
    }

    /// First line of the content, for list views.
    pub fn preview(&self, max_chars: usize) -> String {
        let first = self.content.lines().next().unwrap_or_default();
        if first.chars().count() > max_chars {
            let cut: String = first.chars().take(max_chars).collect();
            format!("{cut}...")
        } else {
            first.to_string()
        }
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::Empty { field })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_needs_title_and_content() {
        assert_eq!(
            NoteDraft::new("", "body").validate(),
            Err(ValidationError::Empty { field: "title" })
        );
        assert_eq!(
            NoteDraft::new("Title", "  ").validate(),
            Err(ValidationError::Empty { field: "content" })
        );
        assert!(NoteDraft::new("Title", "body").validate().is_ok());
    }

    #[test]
    fn into_note_assigns_owner_and_id() {
        let a = NoteDraft::new("A", "x").into_note("user-1").unwrap();
        let b = NoteDraft::new("B", "y").into_note("user-1").unwrap();
        assert_eq!(a.user_id, "user-1");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn patch_only_touches_given_fields() {
        let note = NoteDraft::new("Old", "body").into_note("u").unwrap();
        let patched = note.patched(&NotePatch {
            title: Some("New".into()),
            content: None,
        });
        assert_eq!(patched.title, "New");
        assert_eq!(patched.content, "body");
        assert_eq!(patched.id, note.id);
    }

    #[test]
    fn preview_truncates_first_line() {
        let note = NoteDraft::new("T", "a long first line\nsecond")
            .into_note("u")
            .unwrap();
        assert_eq!(note.preview(6), "a long...");
        assert_eq!(note.preview(100), "a long first line");
    }
}
