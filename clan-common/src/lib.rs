//! Clan Console Common Types
//!
//! Shared types used by the console core and its data-store adapters.

pub mod permission;
pub mod profile;
pub mod roster;
pub mod session;

pub use permission::{Permission, UnknownPermission};
pub use profile::{Profile, ProfileSummary, PROFILE_COLUMNS};
pub use roster::{Recruit, RECRUIT_COLUMNS};
pub use session::{Session, SessionEvent, SessionEventKind, SessionUser};
