pub mod auth;
pub mod companion;
pub mod config;
pub mod habits;
pub mod notes;
pub mod timer;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use purrfocus_core::auth::keyring_store;
use purrfocus_core::storage::{BackendKind, Config, Database};
use purrfocus_core::{
    AppState, CompanionState, ConfigError, Event, HostedBackend, LocalBackend, Navigation, Route,
    TimerEngine,
};

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

const ENGINE_KEY: &str = "timer_engine";
const COMPANION_KEY: &str = "companion";
/// Wall-clock instant up to which a running timer has been ticked.
const ANCHOR_KEY: &str = "timer_anchor";
/// Route the user was sent away from by the auth guard.
const REDIRECT_KEY: &str = "auth_redirect";
const ACCESS_TOKEN_KEY: &str = "hosted_access_token";
const REFRESH_TOKEN_KEY: &str = "hosted_refresh_token";
/// Heartbeat of the `timer run` process that owns the timer.
const OWNER_KEY: &str = "timer_owner";
/// A claim whose heartbeat is older than this is considered abandoned.
const OWNER_TTL_SECS: i64 = 5;

/// Everything a command needs: configuration, the local key-value store and
/// the application state with its backend.
pub struct Context {
    pub config: Config,
    pub app: AppState,
    db: Database,
    hosted: Option<Arc<HostedBackend>>,
    anchor: Option<DateTime<Utc>>,
    /// Another process is running the timer in the foreground.
    timer_busy: bool,
    /// Events produced while catching up on time elapsed since the last run.
    pub catch_up: Vec<Event>,
}

impl Context {
    pub async fn open() -> CliResult<Self> {
        let config = Config::load()?;
        let settings = config.settings()?;
        let db = Database::open()?;

        let timer_busy = owner_is_live(&db)?;
        let mut timer = load_json::<TimerEngine>(&db, ENGINE_KEY)?
            .map(TimerEngine::repaired)
            .unwrap_or_else(|| TimerEngine::new(settings));
        if !timer_busy {
            timer.set_settings(settings);
        }
        let companion = load_json::<CompanionState>(&db, COMPANION_KEY)?
            .map(CompanionState::repaired)
            .unwrap_or_else(|| CompanionState::new(config.companion.default_name.clone()));

        let (app, hosted) = match config.backend.kind {
            BackendKind::Local => {
                let backend = Arc::new(LocalBackend::open()?);
                let app = AppState::new(Box::new(backend.clone()), Box::new(backend));
                (app, None)
            }
            BackendKind::Hosted => {
                let url = config
                    .backend
                    .url
                    .as_deref()
                    .ok_or_else(|| ConfigError::MissingKey("backend.url".into()))?;
                let anon_key = config
                    .backend
                    .anon_key
                    .as_deref()
                    .ok_or_else(|| ConfigError::MissingKey("backend.anon_key".into()))?;
                let backend = Arc::new(HostedBackend::new(url, anon_key)?);
                restore_hosted(&backend).await;
                let app = AppState::new(Box::new(backend.clone()), Box::new(backend.clone()));
                (app, Some(backend))
            }
        };

        let mut ctx = Self {
            config,
            app: app.with_timer(timer).with_companion(companion),
            db,
            hosted,
            anchor: None,
            timer_busy,
            catch_up: Vec::new(),
        };
        ctx.app.init_session().await?;
        if !ctx.timer_busy {
            ctx.catch_up().await?;
        }
        Ok(ctx)
    }

    /// Apply the seconds that passed since the previous invocation to a
    /// running timer. Skipped while a foreground run owns the timer.
    async fn catch_up(&mut self) -> CliResult {
        let Some(raw) = self.db.kv_get(ANCHOR_KEY)? else {
            return Ok(());
        };
        let anchor = DateTime::parse_from_rfc3339(&raw)?.with_timezone(&Utc);
        if !self.app.timer().is_running() {
            return Ok(());
        }
        let elapsed = (Utc::now() - anchor).num_seconds().max(0);
        self.catch_up = self.app.advance_timer(elapsed as u64).await;
        self.anchor = Some(anchor + Duration::seconds(elapsed));
        Ok(())
    }

    /// The timer was ticked live up to now.
    pub fn reset_anchor(&mut self) {
        self.anchor = None;
    }

    /// Refuse to change the timer or companion while `timer run` owns them.
    pub fn ensure_timer_free(&self) -> CliResult {
        if self.timer_busy {
            return Err("the timer is running in another terminal; \
                        control it from that `purrfocus timer run` session"
                .into());
        }
        Ok(())
    }

    /// Check the auth guard for `route`. A redirect is remembered so that
    /// signing in can send the user back.
    pub fn require(&self, route: Route) -> CliResult {
        match self.app.navigate(route) {
            Navigation::Render { .. } => Ok(()),
            Navigation::Redirect { from, .. } => {
                self.db.kv_set(REDIRECT_KEY, from.path())?;
                Err(format!("{from} requires an account; sign in with `purrfocus auth sign-in`").into())
            }
            Navigation::Pending => Err("session is still loading".into()),
        }
    }

    /// Consume the remembered redirect, if any.
    pub fn take_redirect(&self) -> CliResult<Option<Route>> {
        let route = self
            .db
            .kv_get(REDIRECT_KEY)?
            .and_then(|raw| raw.parse::<Route>().ok());
        self.db.kv_delete(REDIRECT_KEY)?;
        Ok(route)
    }

    /// Persist the timer, the companion and (for the hosted backend) the
    /// session tokens. The timer and companion are left alone while another
    /// process owns them.
    pub fn save(&mut self) -> CliResult {
        if !self.timer_busy {
            if !self.app.timer().is_running() {
                self.anchor = None;
            }
            let anchor = self.anchor.unwrap_or_else(Utc::now);
            persist_timer(&self.db, &self.app, anchor)?;
        }

        if let Some(hosted) = &self.hosted {
            match hosted.session() {
                Some(session) => {
                    keyring_store::set(ACCESS_TOKEN_KEY, &session.access_token)?;
                    match &session.refresh_token {
                        Some(token) => keyring_store::set(REFRESH_TOKEN_KEY, token)?,
                        None => keyring_store::delete(REFRESH_TOKEN_KEY)?,
                    }
                }
                None => {
                    keyring_store::delete(ACCESS_TOKEN_KEY)?;
                    keyring_store::delete(REFRESH_TOKEN_KEY)?;
                }
            }
        }
        Ok(())
    }
}

/// Ownership of the timer held by a foreground `timer run`.
pub struct TimerClaim<'a> {
    db: &'a Database,
}

impl<'a> TimerClaim<'a> {
    /// Start heartbeating in `db`. Check [`Context::ensure_timer_free`]
    /// first.
    pub fn new(db: &'a Database) -> CliResult<Self> {
        let claim = Self { db };
        claim.heartbeat()?;
        Ok(claim)
    }

    pub fn heartbeat(&self) -> CliResult {
        self.db.kv_set(OWNER_KEY, &Utc::now().to_rfc3339())?;
        Ok(())
    }

    /// Write the live timer and companion so other invocations read them
    /// as they are now.
    pub fn persist(&self, app: &AppState) -> CliResult {
        persist_timer(self.db, app, Utc::now())
    }

    pub fn release(self) -> CliResult {
        self.db.kv_delete(OWNER_KEY)?;
        Ok(())
    }
}

fn owner_is_live(db: &Database) -> CliResult<bool> {
    let Some(raw) = db.kv_get(OWNER_KEY)? else {
        return Ok(false);
    };
    let Ok(beat) = DateTime::parse_from_rfc3339(&raw) else {
        return Ok(false);
    };
    let age = Utc::now() - beat.with_timezone(&Utc);
    Ok(age < Duration::seconds(OWNER_TTL_SECS))
}

/// Store the engine and companion. A running timer records `anchor` as the
/// instant it was ticked up to.
fn persist_timer(db: &Database, app: &AppState, anchor: DateTime<Utc>) -> CliResult {
    db.kv_set(ENGINE_KEY, &serde_json::to_string(app.timer())?)?;
    db.kv_set(COMPANION_KEY, &serde_json::to_string(app.companion())?)?;
    if app.timer().is_running() {
        db.kv_set(ANCHOR_KEY, &anchor.to_rfc3339())?;
    } else {
        db.kv_delete(ANCHOR_KEY)?;
    }
    Ok(())
}

async fn restore_hosted(backend: &HostedBackend) {
    let token = match keyring_store::get(ACCESS_TOKEN_KEY) {
        Ok(Some(token)) => token,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(error = %e, "keyring unavailable, starting signed out");
            return;
        }
    };
    let refresh = keyring_store::get(REFRESH_TOKEN_KEY).ok().flatten();
    if let Err(e) = backend.restore(&token, refresh).await {
        tracing::warn!(error = %e, "could not restore hosted session");
    }
}

fn load_json<T: serde::de::DeserializeOwned>(db: &Database, key: &str) -> CliResult<Option<T>> {
    match db.kv_get(key)? {
        Some(json) => match serde_json::from_str(&json) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding unreadable saved state");
                Ok(None)
            }
        },
        None => Ok(None),
    }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
