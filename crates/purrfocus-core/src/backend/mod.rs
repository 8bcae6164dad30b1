//! Record store contract and its implementations.
//!
//! - [`LocalBackend`]: SQLite file in the data directory, with local accounts
//! - [`HostedBackend`]: Supabase-compatible REST backend
//!
//! Both implement [`RecordStore`] and [`crate::auth::IdentityProvider`].

pub mod hosted;
pub mod local;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::habits::HabitLogEntry;
use crate::notes::{Note, NotePatch};

pub use hosted::{HostedBackend, HostedSession};
pub use local::LocalBackend;

/// Create/read/update/delete for notes and append/read for habit logs, all
/// scoped by the owning user id.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert_note(&self, note: &Note) -> Result<Note, StoreError>;

    /// Returns the stored note after the update.
    async fn update_note(
        &self,
        user_id: &str,
        id: &str,
        patch: &NotePatch,
    ) -> Result<Note, StoreError>;

    async fn delete_note(&self, user_id: &str, id: &str) -> Result<(), StoreError>;

    async fn list_notes(&self, user_id: &str) -> Result<Vec<Note>, StoreError>;

    async fn append_habit_log(
        &self,
        user_id: &str,
        entry: &HabitLogEntry,
    ) -> Result<(), StoreError>;

    async fn list_habit_logs(&self, user_id: &str) -> Result<Vec<HabitLogEntry>, StoreError>;
}

#[async_trait]
impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    async fn insert_note(&self, note: &Note) -> Result<Note, StoreError> {
        (**self).insert_note(note).await
    }

    async fn update_note(
        &self,
        user_id: &str,
        id: &str,
        patch: &NotePatch,
    ) -> Result<Note, StoreError> {
        (**self).update_note(user_id, id, patch).await
    }

    async fn delete_note(&self, user_id: &str, id: &str) -> Result<(), StoreError> {
        (**self).delete_note(user_id, id).await
    }

    async fn list_notes(&self, user_id: &str) -> Result<Vec<Note>, StoreError> {
        (**self).list_notes(user_id).await
    }

    async fn append_habit_log(
        &self,
        user_id: &str,
        entry: &HabitLogEntry,
    ) -> Result<(), StoreError> {
        (**self).append_habit_log(user_id, entry).await
    }

    async fn list_habit_logs(&self, user_id: &str) -> Result<Vec<HabitLogEntry>, StoreError> {
        (**self).list_habit_logs(user_id).await
    }
}
