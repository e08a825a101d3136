use serde::Deserialize;

/// Remote method names and session behavior.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub open_method: String,
    pub set_method: String,
    /// Carries `commit`, `extend` and `retract`.
    pub dispatch_method: String,
    pub diff_method: String,
    pub reload_method: String,
    pub close_method: String,
    pub remove_method: String,
    /// Select the tab owning an attribute that failed a remote check.
    pub auto_select_error_tab: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            open_method: "openObject".to_string(),
            set_method: "setObjectProperty".to_string(),
            dispatch_method: "dispatchObjectMethod".to_string(),
            diff_method: "diffObject".to_string(),
            reload_method: "reloadObject".to_string(),
            close_method: "closeObject".to_string(),
            remove_method: "removeObject".to_string(),
            auto_select_error_tab: true,
        }
    }
}
