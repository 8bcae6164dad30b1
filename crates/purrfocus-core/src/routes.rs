//! Navigation targets and the authentication guard.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::auth::User;
use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Auth,
    #[default]
    Timer,
    Notes,
    Habits,
}

impl Route {
    pub const ALL: [Route; 4] = [Route::Auth, Route::Timer, Route::Notes, Route::Habits];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Auth => "/auth",
            Route::Timer => "/",
            Route::Notes => "/notes",
            Route::Habits => "/habits",
        }
    }

    pub fn requires_auth(&self) -> bool {
        !matches!(self, Route::Auth)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for Route {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let path = s.trim();
        let path = if path.len() > 1 {
            path.trim_end_matches('/')
        } else {
            path
        };
        Route::ALL
            .into_iter()
            .find(|r| r.path() == path)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "route".into(),
                message: format!("unknown path '{s}'"),
            })
    }
}

/// What the guard knows about the session.
#[derive(Debug, Clone, Copy)]
pub struct AuthStatus<'a> {
    /// The initial session lookup has not finished yet.
    pub loading: bool,
    pub user: Option<&'a User>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Navigation {
    /// Session still loading; show a spinner.
    Pending,
    Render { route: Route },
    /// Send to `to`, remembering where the user wanted to go.
    Redirect { to: Route, from: Route },
}

/// Decide what to show for `requested`.
pub fn guard(requested: Route, status: AuthStatus<'_>) -> Navigation {
    if !requested.requires_auth() {
        return Navigation::Render { route: requested };
    }
    if status.loading {
        return Navigation::Pending;
    }
    match status.user {
        Some(_) => Navigation::Render { route: requested },
        None => Navigation::Redirect {
            to: Route::Auth,
            from: requested,
        },
    }
}

/// Where to go after a successful sign-in.
pub fn post_login_target(from: Option<Route>) -> Route {
    match from {
        Some(route) if route.requires_auth() => route,
        _ => Route::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: "u1".into(),
            email: "u1@example.com".into(),
        }
    }

    #[test]
    fn paths_roundtrip() {
        for route in Route::ALL {
            assert_eq!(route.path().parse::<Route>().unwrap(), route);
        }
        assert_eq!("/notes/".parse::<Route>().unwrap(), Route::Notes);
        assert!("/settings".parse::<Route>().is_err());
    }

    #[test]
    fn unauthenticated_access_redirects_with_origin() {
        let nav = guard(
            Route::Habits,
            AuthStatus {
                loading: false,
                user: None,
            },
        );
        assert_eq!(
            nav,
            Navigation::Redirect {
                to: Route::Auth,
                from: Route::Habits
            }
        );
    }

    #[test]
    fn loading_session_is_pending() {
        let nav = guard(
            Route::Timer,
            AuthStatus {
                loading: true,
                user: None,
            },
        );
        assert_eq!(nav, Navigation::Pending);
    }

    #[test]
    fn auth_page_is_always_open() {
        let nav = guard(
            Route::Auth,
            AuthStatus {
                loading: true,
                user: None,
            },
        );
        assert_eq!(nav, Navigation::Render { route: Route::Auth });
    }

    #[test]
    fn signed_in_user_sees_page() {
        let u = user();
        let nav = guard(
            Route::Notes,
            AuthStatus {
                loading: false,
                user: Some(&u),
            },
        );
        assert_eq!(nav, Navigation::Render { route: Route::Notes });
    }

    #[test]
    fn post_login_defaults_to_timer() {
        assert_eq!(post_login_target(None), Route::Timer);
        assert_eq!(post_login_target(Some(Route::Auth)), Route::Timer);
        assert_eq!(post_login_target(Some(Route::Notes)), Route::Notes);
    }
}
