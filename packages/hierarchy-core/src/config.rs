#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const DEFAULT_ROOT_NAME: &str = "root";

/// Engine-level settings. Connection parameters belong to the individual backends.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HierarchyConfig {
    /// Name of the node created by [`crate::HierarchyEngine::ensure_root`].
    pub root_name: String,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            root_name: DEFAULT_ROOT_NAME.to_string(),
        }
    }
}

impl HierarchyConfig {
    pub fn with_root_name(root_name: impl Into<String>) -> Self {
        Self {
            root_name: root_name.into(),
        }
    }

    #[cfg(feature = "serde")]
    pub fn from_json_str(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(|e| crate::Error::Config(e.to_string()))
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        assert_eq!(HierarchyConfig::from_json_str("{}").unwrap(), HierarchyConfig::default());
        let cfg = HierarchyConfig::from_json_str(r#"{"root_name":"catalog"}"#).unwrap();
        assert_eq!(cfg.root_name, "catalog");
    }
}
