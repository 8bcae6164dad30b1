//! Identity provider contract.
//!
//! Providers own the signed-in session and publish every change on a
//! `watch` channel, so front ends can react to sign-in/sign-out without
//! polling.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::AuthError;

/// Minimum password length accepted on sign-up.
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Short identifier for logs (e.g. "local", "hosted").
    fn name(&self) -> &str;

    async fn sign_up(&self, email: &str, password: &str) -> Result<User, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// The currently signed-in user, if any.
    async fn get_session(&self) -> Result<Option<User>, AuthError>;

    /// Session-change notifications. The receiver starts at the current
    /// session.
    fn subscribe(&self) -> watch::Receiver<Option<User>>;
}

#[async_trait]
impl<T: IdentityProvider + ?Sized> IdentityProvider for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<User, AuthError> {
        (**self).sign_up(email, password).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError> {
        (**self).sign_in(email, password).await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        (**self).sign_out().await
    }

    async fn get_session(&self) -> Result<Option<User>, AuthError> {
        (**self).get_session().await
    }

    fn subscribe(&self) -> watch::Receiver<Option<User>> {
        (**self).subscribe()
    }
}

/// Shared session cell used by provider implementations.
#[derive(Debug)]
pub struct SessionBroadcast {
    tx: watch::Sender<Option<User>>,
}

impl Default for SessionBroadcast {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SessionBroadcast {
    pub fn new(initial: Option<User>) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn current(&self) -> Option<User> {
        self.tx.borrow().clone()
    }

    /// Publish a new session. Subscribers are only woken on actual change.
    pub fn set(&self, user: Option<User>) {
        self.tx.send_if_modified(|current| {
            if *current == user {
                false
            } else {
                *current = user;
                true
            }
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.tx.subscribe()
    }
}

/// Normalise and check an email address.
pub fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    let (local, domain) = email.split_once('@').ok_or(AuthError::InvalidEmail)?;
    let domain_ok = domain
        .split_once('.')
        .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty());
    if local.is_empty() || !domain_ok || email.contains(char::is_whitespace) {
        return Err(AuthError::InvalidEmail);
    }
    Ok(email)
}

pub fn check_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword {
            min_len: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Thin wrapper around the OS keyring for credential storage.
pub mod keyring_store {
    const SERVICE: &str = "purrfocus";

    pub fn get(key: &str) -> Result<Option<String>, keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.get_password() {
            Ok(pw) => Ok(Some(pw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn set(key: &str, value: &str) -> Result<(), keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        entry.set_password(value)
    }

    pub fn delete(key: &str) -> Result<(), keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
