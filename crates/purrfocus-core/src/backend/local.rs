//! Local backend -- accounts and records in the SQLite database.
//!
//! Passwords are stored as a PBKDF2-HMAC-SHA256 digest with a random
//! per-account salt; the round count is kept next to the digest. The signed-in user id is remembered in the kv table so
//! the session survives process restarts.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use hmac::Hmac;
use rand::Rng;
use sha2::Sha256;
use tokio::sync::watch;
use uuid::Uuid;

use super::RecordStore;
use crate::auth::{check_password, normalize_email, IdentityProvider, SessionBroadcast, User};
use crate::error::{AuthError, DatabaseError, StoreError};
use crate::habits::HabitLogEntry;
use crate::notes::{Note, NotePatch};
use crate::storage::{Account, Database};

type HmacSha256 = Hmac<Sha256>;

const HASH_SCHEME: &str = "pbkdf2-sha256";
const PBKDF2_ROUNDS: u32 = 100_000;
const DIGEST_LEN: usize = 32;

const SESSION_KEY: &str = "session_user_id";

pub struct LocalBackend {
    db: Mutex<Database>,
    session: SessionBroadcast,
}

impl LocalBackend {
    /// Wrap `db`, restoring a previously signed-in user.
    pub fn new(db: Database) -> Result<Self, DatabaseError> {
        let user = match db.kv_get(SESSION_KEY)? {
            Some(id) => db.find_account(&id)?.map(|a| User {
                id: a.id,
                email: a.email,
            }),
            None => None,
        };
        Ok(Self {
            db: Mutex::new(db),
            session: SessionBroadcast::new(user),
        })
    }

    /// Open the database in the data directory.
    pub fn open() -> Result<Self, DatabaseError> {
        Self::new(Database::open()?)
    }

    pub fn open_memory() -> Result<Self, DatabaseError> {
        Self::new(Database::open_memory()?)
    }

    fn with_db<T>(
        &self,
        f: impl FnOnce(&Database) -> Result<T, rusqlite::Error>,
    ) -> Result<T, rusqlite::Error> {
        let db = self.db.lock().unwrap_or_else(PoisonError::into_inner);
        f(&db)
    }

    fn remember(&self, user: &User) -> Result<(), AuthError> {
        self.with_db(|db| db.kv_set(SESSION_KEY, &user.id))?;
        self.session.set(Some(user.clone()));
        Ok(())
    }
}

fn password_digest(salt: &str, password: &str, rounds: u32) -> Result<[u8; DIGEST_LEN], AuthError> {
    let mut digest = [0u8; DIGEST_LEN];
    pbkdf2::pbkdf2::<HmacSha256>(password.as_bytes(), salt.as_bytes(), rounds, &mut digest)
        .map_err(|e| AuthError::Storage(e.to_string()))?;
    Ok(digest)
}

fn hash_password(password: &str) -> Result<(String, String), AuthError> {
    let salt = hex::encode(rand::thread_rng().gen::<[u8; 16]>());
    let digest = password_digest(&salt, password, PBKDF2_ROUNDS)?;
    let hash = format!("{HASH_SCHEME}${PBKDF2_ROUNDS}${}", hex::encode(digest));
    Ok((salt, hash))
}

fn verify_password(account: &Account, password: &str) -> bool {
    let mut parts = account.password_hash.splitn(3, '$');
    let (Some(HASH_SCHEME), Some(rounds), Some(expected)) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    let (Ok(rounds), Ok(expected)) = (rounds.parse::<u32>(), hex::decode(expected)) else {
        return false;
    };
    if rounds == 0 || expected.len() != DIGEST_LEN {
        return false;
    }
    match password_digest(&account.salt, password, rounds) {
        Ok(actual) => constant_time_eq(&actual, &expected),
        Err(_) => false,
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[async_trait]
impl IdentityProvider for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = normalize_email(email)?;
        check_password(password)?;

        if self.with_db(|db| db.find_account_by_email(&email))?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let (salt, password_hash) = hash_password(password)?;
        let account = Account {
            id: Uuid::new_v4().to_string(),
            email,
            password_hash,
            salt,
            created_at: Utc::now(),
        };
        self.with_db(|db| db.insert_account(&account))?;

        let user = User {
            id: account.id,
            email: account.email,
        };
        self.remember(&user)?;
        tracing::info!(user_id = %user.id, "local account created");
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = normalize_email(email).map_err(|_| AuthError::InvalidCredentials)?;
        let account = self
            .with_db(|db| db.find_account_by_email(&email))?
            .filter(|account| verify_password(account, password))
            .ok_or(AuthError::InvalidCredentials)?;

        let user = User {
            id: account.id,
            email: account.email,
        };
        self.remember(&user)?;
        tracing::info!(user_id = %user.id, "signed in");
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.with_db(|db| db.kv_delete(SESSION_KEY))?;
        self.session.set(None);
        tracing::info!("signed out");
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<User>, AuthError> {
        Ok(self.session.current())
    }

    fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.session.subscribe()
    }
}

#[async_trait]
impl RecordStore for LocalBackend {
    async fn insert_note(&self, note: &Note) -> Result<Note, StoreError> {
        self.with_db(|db| db.insert_note(note))?;
        Ok(note.clone())
    }

    async fn update_note(
        &self,
        user_id: &str,
        id: &str,
        patch: &NotePatch,
    ) -> Result<Note, StoreError> {
        self.with_db(|db| db.update_note(user_id, id, patch))?
            .ok_or_else(|| StoreError::NotFound {
                kind: "note",
                id: id.to_string(),
            })
    }

    async fn delete_note(&self, user_id: &str, id: &str) -> Result<(), StoreError> {
        if self.with_db(|db| db.delete_note(user_id, id))? {
            Ok(())
        } else {
            Err(StoreError::NotFound {
                kind: "note",
                id: id.to_string(),
            })
        }
    }

    async fn list_notes(&self, user_id: &str) -> Result<Vec<Note>, StoreError> {
        Ok(self.with_db(|db| db.list_notes(user_id))?)
    }

    async fn append_habit_log(
        &self,
        user_id: &str,
        entry: &HabitLogEntry,
    ) -> Result<(), StoreError> {
        self.with_db(|db| db.append_habit_log(user_id, entry))?;
        Ok(())
    }

    async fn list_habit_logs(&self, user_id: &str) -> Result<Vec<HabitLogEntry>, StoreError> {
        Ok(self.with_db(|db| db.list_habit_logs(user_id))?)
    }
}
