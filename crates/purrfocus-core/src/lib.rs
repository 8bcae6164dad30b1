//! # Purrfocus Core Library
//!
//! This library provides the core logic for purrfocus, a Pomodoro timer with
//! a companion cat whose health follows your focus discipline. All operations
//! are exposed through the `purrfocus` CLI binary, which is a thin layer over
//! this crate.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A tick-driven state machine; the caller invokes `tick()`
//!   once per second while it runs (see [`focus::run_focus_loop`])
//! - **Companion**: A pure reducer over session completions and abandonments
//! - **App State**: The signed-in user, their notes and habit logs, the timer
//!   and the companion, with two-phase writes to the record store
//! - **Backends**: Local SQLite or a hosted Supabase-compatible service, both
//!   implementing [`RecordStore`] and [`IdentityProvider`]
//! - **Storage**: TOML configuration and the local SQLite database
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Focus-session state machine
//! - [`CompanionState`]: Companion health reducer
//! - [`AppState`]: Explicit application state
//! - [`Config`]: Application configuration management

pub mod app_state;
pub mod auth;
pub mod backend;
pub mod companion;
pub mod error;
pub mod events;
pub mod focus;
pub mod habits;
pub mod notes;
pub mod quotes;
pub mod routes;
pub mod storage;
pub mod timer;

pub use app_state::AppState;
pub use auth::{IdentityProvider, User};
pub use backend::{HostedBackend, LocalBackend, RecordStore};
pub use companion::{CompanionEvent, CompanionState, Mood};
pub use error::{AuthError, ConfigError, CoreError, DatabaseError, StoreError, ValidationError};
pub use events::Event;
pub use focus::{run_focus_loop, FocusInput, FocusUpdate};
pub use habits::{DailyFocus, HabitLogEntry, HabitSummary};
pub use notes::{Note, NoteDraft, NotePatch};
pub use routes::{Navigation, Route};
pub use storage::{Config, Database};
pub use timer::{Phase, Settings, SettingsPatch, TimerEngine};
