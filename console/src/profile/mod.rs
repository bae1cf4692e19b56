mod cooldown;
mod store;

pub use cooldown::RefreshCooldown;
pub use store::{
    resolve_avatar_url, resolve_display_name, ProfileState, ProfileStore, PLACEHOLDER_AVATAR_URL,
    UNKNOWN_USER,
};
