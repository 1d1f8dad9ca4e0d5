//! Route guarding on session presence.

use std::sync::Mutex;

use fetchbox_store::Session;
use smol_str::SmolStr;
use tracing::debug;

/// Authentication state of the route guard.
///
/// Driven solely by session presence: a valid session moves the guard to
/// `Authenticated`, sign-out or expiry detection moves it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    /// No valid session is known.
    #[default]
    Unauthenticated,
    /// A valid session was observed on the last guarded navigation.
    Authenticated,
}

impl AuthState {
    /// Returns the state as a string slice.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            AuthState::Unauthenticated => "unauthenticated",
            AuthState::Authenticated => "authenticated",
        }
    }
}

/// Outcome of a navigation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Render the requested route.
    Allow,
    /// Redirect to the contained login entry point.
    ///
    /// The original destination is not preserved; carrying it belongs to
    /// the router, not the guard.
    Redirect(SmolStr),
}

/// Gate for navigations into authenticated areas.
///
/// The guard does not own the session - it reads it lazily through the
/// lookup passed to [`RouteGuard::decide`], and only for guarded paths.
/// Navigations to public paths never touch the session at all.
///
/// # Example
///
/// ```
/// use fetchbox::guard::{RouteDecision, RouteGuard};
///
/// let guard = RouteGuard::new("/login").guard_prefix("/agence");
///
/// // Public path: allowed without consulting the session.
/// assert_eq!(guard.decide("/", || unreachable!()), RouteDecision::Allow);
///
/// // Guarded path without a session: redirected.
/// assert_eq!(
///     guard.decide("/agence/dashboard", || None),
///     RouteDecision::Redirect("/login".into()),
/// );
/// ```
#[derive(Debug)]
pub struct RouteGuard {
    login_path: SmolStr,
    guarded_prefixes: Vec<SmolStr>,
    state: Mutex<AuthState>,
}

impl RouteGuard {
    /// Creates a guard redirecting unauthenticated navigations to
    /// `login_path`. No path is guarded until [`guard_prefix`] is called.
    ///
    /// [`guard_prefix`]: RouteGuard::guard_prefix
    pub fn new(login_path: impl Into<SmolStr>) -> Self {
        RouteGuard {
            login_path: login_path.into(),
            guarded_prefixes: Vec::new(),
            state: Mutex::new(AuthState::Unauthenticated),
        }
    }

    /// Adds a path prefix requiring a session.
    pub fn guard_prefix(mut self, prefix: impl Into<SmolStr>) -> Self {
        self.guarded_prefixes.push(prefix.into());
        self
    }

    /// Returns the login entry point.
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Returns the current authentication state.
    pub fn state(&self) -> AuthState {
        *self.state.lock().expect("guard state lock poisoned")
    }

    /// Returns true when `path` requires a session.
    pub fn is_guarded(&self, path: &str) -> bool {
        self.guarded_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Decides whether a navigation to `path` renders or redirects.
    ///
    /// `session` is invoked at most once, and only when `path` is guarded.
    pub fn decide<F>(&self, path: &str, session: F) -> RouteDecision
    where
        F: FnOnce() -> Option<Session>,
    {
        if !self.is_guarded(path) {
            return RouteDecision::Allow;
        }
        match session() {
            Some(session) if !session.is_expired() => {
                self.transition(AuthState::Authenticated);
                RouteDecision::Allow
            }
            _ => {
                self.transition(AuthState::Unauthenticated);
                debug!(path, "redirecting unauthenticated navigation");
                RouteDecision::Redirect(self.login_path.clone())
            }
        }
    }

    /// Records a sign-out or externally detected session expiry.
    pub fn session_lost(&self) {
        self.transition(AuthState::Unauthenticated);
    }

    fn transition(&self, next: AuthState) {
        let mut state = self.state.lock().expect("guard state lock poisoned");
        if *state != next {
            debug!(from = state.as_str(), to = next.as_str(), "auth transition");
            *state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn guard() -> RouteGuard {
        RouteGuard::new("/login").guard_prefix("/agence")
    }

    #[test]
    fn public_path_never_consults_session() {
        let guard = guard();
        let decision = guard.decide("/", || panic!("session lookup on public path"));
        assert_eq!(decision, RouteDecision::Allow);
        assert_eq!(guard.state(), AuthState::Unauthenticated);
    }

    #[test]
    fn guarded_path_without_session_redirects() {
        let guard = guard();
        let decision = guard.decide("/agence/dashboard", || None);
        assert_eq!(decision, RouteDecision::Redirect("/login".into()));
        assert_eq!(guard.state(), AuthState::Unauthenticated);
    }

    #[test]
    fn guarded_path_with_session_allows() {
        let guard = guard();
        let session = Session::new("token", Some(Utc::now() + Duration::hours(1)));
        let decision = guard.decide("/agence/dashboard", || Some(session));
        assert_eq!(decision, RouteDecision::Allow);
        assert_eq!(guard.state(), AuthState::Authenticated);
    }

    #[test]
    fn expired_session_counts_as_absent() {
        let guard = guard();
        let session = Session::new("token", Some(Utc::now() - Duration::minutes(1)));
        let decision = guard.decide("/agence/dashboard", || Some(session));
        assert_eq!(decision, RouteDecision::Redirect("/login".into()));
    }

    #[test]
    fn sign_out_reverses_the_state() {
        let guard = guard();
        let session = Session::new("token", None);
        guard.decide("/agence/dashboard", || Some(session));
        assert_eq!(guard.state(), AuthState::Authenticated);

        guard.session_lost();
        assert_eq!(guard.state(), AuthState::Unauthenticated);
    }
}
