pub mod access;
pub mod admin;
pub mod auth;
pub mod config;
pub mod console;
pub mod error;
pub mod logging;
pub mod notify;
pub mod profile;
pub mod roster;
pub mod store;
pub mod test_util;

pub use access::{AccessGate, Decision, Route};
pub use admin::{AdminPanel, AdminState, AdminTab, FilePreferenceStore, MemoryPreferenceStore, PreferenceStore};
pub use auth::{AuthState, GoTrueProvider, IdentityProvider, SessionManager};
pub use config::Config;
pub use console::Console;
pub use error::{Error, Result};
pub use notify::{Notifier, TracingNotifier};
pub use profile::{ProfileState, ProfileStore, RefreshCooldown};
pub use roster::{Roster, RosterState};
pub use store::{DataStore, PostgrestStore};
