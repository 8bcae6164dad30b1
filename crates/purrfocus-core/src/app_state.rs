//! Application state shared by every screen.
//!
//! Holds the signed-in user, the user's notes and habit logs, the timer
//! engine and the companion. Store-backed mutations are two-phase: the
//! candidate is sent to the [`RecordStore`] first and only committed to local
//! state when the store reports success. A failed write leaves local state
//! untouched, is logged, and is returned to the caller.
//!
//! Timer commands return the engine's events after applying their effects:
//! a completed work session feeds the companion and appends a habit log,
//! a confirmed quit costs the companion health.

use chrono::NaiveDate;

use crate::auth::{IdentityProvider, User};
use crate::backend::RecordStore;
use crate::companion::{CompanionEvent, CompanionState, DEFAULT_COMPANION_NAME};
use crate::error::{CoreError, Result, StoreError};
use crate::events::Event;
use crate::habits::{HabitLogEntry, HabitSummary};
use crate::notes::{Note, NoteDraft, NotePatch};
use crate::routes::{guard, AuthStatus, Navigation, Route};
use crate::timer::{Settings, SettingsPatch, TimerEngine};

pub struct AppState {
    store: Box<dyn RecordStore>,
    identity: Box<dyn IdentityProvider>,
    user: Option<User>,
    /// True until the first session lookup finishes.
    loading: bool,
    notes: Vec<Note>,
    habit_logs: Vec<HabitLogEntry>,
    companion: CompanionState,
    timer: TimerEngine,
}

impl AppState {
    pub fn new(store: Box<dyn RecordStore>, identity: Box<dyn IdentityProvider>) -> Self {
        Self {
            store,
            identity,
            user: None,
            loading: true,
            notes: Vec::new(),
            habit_logs: Vec::new(),
            companion: CompanionState::new(DEFAULT_COMPANION_NAME),
            timer: TimerEngine::default(),
        }
    }

    /// Resume a timer saved by a previous run.
    pub fn with_timer(mut self, timer: TimerEngine) -> Self {
        self.timer = timer;
        self
    }

    pub fn with_companion(mut self, companion: CompanionState) -> Self {
        self.companion = companion;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn note(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub fn habit_logs(&self) -> &[HabitLogEntry] {
        &self.habit_logs
    }

    pub fn habit_summary(&self, today: NaiveDate) -> HabitSummary {
        HabitSummary::build(&self.habit_logs, today)
    }

    pub fn settings(&self) -> Settings {
        *self.timer.settings()
    }

    pub fn companion(&self) -> &CompanionState {
        &self.companion
    }

    pub fn timer(&self) -> &TimerEngine {
        &self.timer
    }

    pub fn auth_status(&self) -> AuthStatus<'_> {
        AuthStatus {
            loading: self.loading,
            user: self.user.as_ref(),
        }
    }

    /// Route guard decision for `route` given the current session.
    pub fn navigate(&self, route: Route) -> Navigation {
        guard(route, self.auth_status())
    }

    fn require_user(&self) -> Result<String> {
        self.user
            .as_ref()
            .map(|u| u.id.clone())
            .ok_or(CoreError::NotSignedIn)
    }

    // ── Session ──────────────────────────────────────────────────────

    /// Look up the existing session and load its records.
    pub async fn init_session(&mut self) -> Result<Option<User>> {
        let result = self.identity.get_session().await;
        self.loading = false;
        let user = result?;
        tracing::debug!(
            provider = self.identity.name(),
            signed_in = user.is_some(),
            "session restored"
        );
        self.apply_session(user.clone()).await?;
        Ok(user)
    }

    /// Adopt a session reported by the provider. Signing out clears the
    /// user's records; a new user gets theirs loaded.
    pub async fn apply_session(&mut self, user: Option<User>) -> Result<()> {
        let changed = self.user.as_ref().map(|u| &u.id) != user.as_ref().map(|u| &u.id);
        self.user = user;
        self.loading = false;
        if !changed {
            return Ok(());
        }
        self.notes.clear();
        self.habit_logs.clear();
        if self.user.is_some() {
            self.refresh().await?;
        }
        Ok(())
    }

    /// Reload notes and habit logs from the store. Both lists are replaced
    /// together or not at all.
    pub async fn refresh(&mut self) -> Result<()> {
        let user_id = self.require_user()?;
        let fetched = async {
            let notes = self.store.list_notes(&user_id).await?;
            let logs = self.store.list_habit_logs(&user_id).await?;
            Ok::<_, StoreError>((notes, logs))
        }
        .await;

        match fetched {
            Ok((notes, logs)) => {
                self.notes = notes;
                self.habit_logs = logs;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "refresh failed, keeping cached records");
                Err(e.into())
            }
        }
    }

    pub async fn sign_up(&mut self, email: &str, password: &str) -> Result<User> {
        let user = self.identity.sign_up(email, password).await?;
        self.after_sign_in(user.clone()).await;
        Ok(user)
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<User> {
        let user = self.identity.sign_in(email, password).await?;
        self.after_sign_in(user.clone()).await;
        Ok(user)
    }

    async fn after_sign_in(&mut self, user: User) {
        tracing::info!(provider = self.identity.name(), user_id = %user.id, "session started");
        // The sign-in itself succeeded; a failed record load only leaves the
        // lists empty.
        if let Err(e) = self.apply_session(Some(user)).await {
            tracing::warn!(error = %e, "could not load records after sign-in");
        }
    }

    pub async fn sign_out(&mut self) -> Result<()> {
        self.identity.sign_out().await?;
        self.user = None;
        self.notes.clear();
        self.habit_logs.clear();
        Ok(())
    }

    // ── Notes ────────────────────────────────────────────────────────

    pub async fn add_note(&mut self, draft: NoteDraft) -> Result<Note> {
        let user_id = self.require_user()?;
        let candidate = draft.into_note(&user_id)?;
        match self.store.insert_note(&candidate).await {
            Ok(stored) => {
                self.notes.push(stored.clone());
                Ok(stored)
            }
            Err(e) => Err(discard("insert note", e)),
        }
    }

    pub async fn update_note(&mut self, id: &str, patch: &NotePatch) -> Result<Note> {
        let user_id = self.require_user()?;
        patch.validate()?;
        match self.store.update_note(&user_id, id, patch).await {
            Ok(stored) => {
                match self.notes.iter_mut().find(|n| n.id == id) {
                    Some(note) => *note = stored.clone(),
                    None => self.notes.push(stored.clone()),
                }
                Ok(stored)
            }
            Err(e) => Err(discard("update note", e)),
        }
    }

    pub async fn delete_note(&mut self, id: &str) -> Result<()> {
        let user_id = self.require_user()?;
        match self.store.delete_note(&user_id, id).await {
            Ok(()) => {
                self.notes.retain(|n| n.id != id);
                Ok(())
            }
            Err(e) => Err(discard("delete note", e)),
        }
    }

    // ── Habits ───────────────────────────────────────────────────────

    pub async fn add_habit_log(&mut self, entry: HabitLogEntry) -> Result<()> {
        let user_id = self.require_user()?;
        match self.store.append_habit_log(&user_id, &entry).await {
            Ok(()) => {
                self.habit_logs.push(entry);
                Ok(())
            }
            Err(e) => Err(discard("append habit log", e)),
        }
    }

    // ── Settings & companion ─────────────────────────────────────────

    /// Merge `patch` into the settings. A countdown that has begun keeps its
    /// length; new durations apply from the next phase.
    pub fn update_settings(&mut self, patch: &SettingsPatch) -> Result<Settings> {
        let next = self.timer.settings().patched(patch)?;
        self.timer.set_settings(next);
        Ok(next)
    }

    pub fn update_companion(&mut self, event: CompanionEvent) -> &CompanionState {
        self.companion.apply(event);
        &self.companion
    }

    /// Adopt a new companion. Allowed whether or not the current one is alive.
    pub fn reset_companion(&mut self, name: &str) -> &CompanionState {
        let name = match name.trim() {
            "" => DEFAULT_COMPANION_NAME,
            trimmed => trimmed,
        };
        tracing::info!(name, "companion adopted");
        self.update_companion(CompanionEvent::Reset(name.to_string()))
    }

    // ── Timer ────────────────────────────────────────────────────────

    fn ensure_companion_alive(&self) -> Result<()> {
        if self.companion.is_alive {
            Ok(())
        } else {
            Err(CoreError::CompanionLost {
                name: self.companion.name.clone(),
            })
        }
    }

    pub fn start_timer(&mut self) -> Result<Option<Event>> {
        self.ensure_companion_alive()?;
        Ok(self.timer.start())
    }

    pub fn pause_timer(&mut self) -> Option<Event> {
        self.timer.pause()
    }

    /// Play/pause. Pausing is always allowed; starting needs a live companion.
    pub fn toggle_timer(&mut self) -> Result<Option<Event>> {
        if !self.timer.is_running() {
            self.ensure_companion_alive()?;
        }
        Ok(self.timer.toggle())
    }

    pub async fn tick_timer(&mut self) -> Vec<Event> {
        let events = self.timer.tick();
        self.consume(events).await
    }

    /// Catch up `secs` elapsed seconds, stopping at the next phase boundary.
    pub async fn advance_timer(&mut self, secs: u64) -> Vec<Event> {
        let events = self.timer.advance_by(secs);
        self.consume(events).await
    }

    pub fn quit_timer(&mut self) -> Event {
        self.timer.quit()
    }

    /// Abandon the session the quit prompt asked about. Without a pending
    /// prompt nothing happens and the companion is spared.
    pub fn confirm_quit(&mut self) -> Vec<Event> {
        let events = self.timer.confirm_quit();
        for event in &events {
            self.companion_effect(event);
        }
        events
    }

    pub fn cancel_quit(&mut self) -> Option<Event> {
        self.timer.cancel_quit()
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn companion_effect(&mut self, event: &Event) {
        match event {
            Event::WorkSessionCompleted { .. } => {
                self.companion.apply(CompanionEvent::SessionCompleted);
            }
            Event::SessionAbandoned { .. } => {
                self.companion.apply(CompanionEvent::Abandoned);
                if !self.companion.is_alive {
                    tracing::info!(name = %self.companion.name, "companion lost");
                }
            }
            _ => {}
        }
    }

    /// Apply the effects of engine events. Store failures are appended as
    /// `SyncFailed` so the transition itself always goes through.
    async fn consume(&mut self, events: Vec<Event>) -> Vec<Event> {
        let mut out = Vec::with_capacity(events.len());
        for event in events {
            self.companion_effect(&event);
            let sync_failure = match &event {
                Event::WorkSessionCompleted {
                    focus_minutes, at, ..
                } => {
                    let entry = HabitLogEntry::for_session(at.date_naive(), *focus_minutes);
                    self.add_habit_log(entry)
                        .await
                        .err()
                        .map(|e| Event::SyncFailed {
                            operation: "append habit log".to_string(),
                            message: e.to_string(),
                            at: *at,
                        })
                }
                _ => None,
            };
            out.push(event);
            out.extend(sync_failure);
        }
        out
    }
}

fn discard(operation: &str, error: StoreError) -> CoreError {
    tracing::warn!(operation, error = %error, "store write failed, local state unchanged");
    CoreError::Store(error)
}
