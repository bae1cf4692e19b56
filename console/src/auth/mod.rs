//! Authentication: identity provider seam, GoTrue client and session lifecycle.

mod gotrue;
mod provider;
mod session;

pub use gotrue::GoTrueProvider;
pub use provider::{IdentityProvider, SessionChannel, SessionSubscription};
pub use session::{AuthState, SessionManager};
