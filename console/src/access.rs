//! Permission-tiered route guards.
//!
//! Two gates compose: the presence gate needs a resolved session, the
//! approval gate needs a loaded profile above `locked`. Settings skips the
//! approval gate so locked users can still manage their own profile.

use std::fmt;
use std::sync::Arc;

use clan_common::Permission;

use crate::auth::{AuthState, SessionManager};
use crate::profile::{ProfileState, ProfileStore};

/// Console views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Dashboard,
    Recruits,
    Ranks,
    Settings,
    /// Shown to locked users while they await approval.
    Pending,
}

impl Route {
    pub const ALL: [Route; 6] = [
        Route::Login,
        Route::Dashboard,
        Route::Recruits,
        Route::Ranks,
        Route::Settings,
        Route::Pending,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Dashboard => "/",
            Route::Recruits => "/recruits",
            Route::Ranks => "/ranks",
            Route::Settings => "/settings",
            Route::Pending => "/locked",
        }
    }

    pub fn from_path(path: &str) -> Option<Route> {
        Route::ALL.into_iter().find(|r| r.path() == path)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Outcome of a guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// State is not known yet; render nothing.
    Suspend,
    Redirect(Route),
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow => f.write_str("allow"),
            Decision::Suspend => f.write_str("suspend"),
            Decision::Redirect(route) => write!(f, "redirect {}", route),
        }
    }
}

pub fn presence_gate(auth: &AuthState) -> Decision {
    if auth.is_authenticating {
        Decision::Suspend
    } else if auth.session.is_none() {
        Decision::Redirect(Route::Login)
    } else {
        Decision::Allow
    }
}

pub fn approval_gate(profile: &ProfileState) -> Decision {
    match (&profile.profile, profile.is_loading) {
        (_, true) | (None, _) => Decision::Suspend,
        (Some(p), false) if p.permission == Permission::Locked => Decision::Redirect(Route::Pending),
        (Some(_), false) => Decision::Allow,
    }
}

/// Decide what happens when `route` is requested.
pub fn decide(route: Route, auth: &AuthState, profile: &ProfileState) -> Decision {
    match route {
        Route::Login => match presence_gate(auth) {
            Decision::Allow => Decision::Redirect(Route::Dashboard),
            Decision::Redirect(_) => Decision::Allow,
            Decision::Suspend => Decision::Suspend,
        },
        Route::Settings => presence_gate(auth),
        Route::Pending => match presence_gate(auth) {
            Decision::Allow => match approval_gate(profile) {
                Decision::Redirect(_) => Decision::Allow,
                Decision::Allow => Decision::Redirect(Route::Dashboard),
                Decision::Suspend => Decision::Suspend,
            },
            other => other,
        },
        Route::Dashboard | Route::Recruits | Route::Ranks => match presence_gate(auth) {
            Decision::Allow => approval_gate(profile),
            other => other,
        },
    }
}

/// Route guard over the live session and profile.
pub struct AccessGate {
    sessions: Arc<SessionManager>,
    profiles: Arc<ProfileStore>,
}

impl AccessGate {
    pub fn new(sessions: Arc<SessionManager>, profiles: Arc<ProfileStore>) -> Self {
        Self { sessions, profiles }
    }

    pub fn check(&self, route: Route) -> Decision {
        decide(route, &self.sessions.snapshot(), &self.profiles.current_state())
    }

    /// Whether the administration surface may be shown.
    pub fn can_administer(&self) -> bool {
        self.sessions.session().is_some()
            && self
                .profiles
                .acting_profile()
                .is_some_and(|p| p.permission.is_owner())
    }
}
