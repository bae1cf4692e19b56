mod panel;
mod preferences;

pub use panel::{
    permission_change_guard, AdminPanel, AdminState, AdminTab, PermissionOption, RowControls,
    SETTINGS_TAB_KEY,
};
pub use preferences::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore};
