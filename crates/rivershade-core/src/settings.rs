// ABOUTME: Extension settings read from the host store with legacy alias fallback.
// ABOUTME: Resolves riverShade.* first, then focusColorToggle.*, then built-in defaults.

use crate::host::{ConfigStore, ConfigTarget};
use crate::mapper::Toggles;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PRIMARY_NAMESPACE: &str = "riverShade";
pub const LEGACY_NAMESPACE: &str = "focusColorToggle";

/// Which scopes an install writes to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateTarget {
    #[default]
    Global,
    Workspace,
    Both,
}

impl UpdateTarget {
    /// Parse a setting value. Anything unrecognized means global.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "workspace" => UpdateTarget::Workspace,
            "both" => UpdateTarget::Both,
            _ => UpdateTarget::Global,
        }
    }

    pub fn targets(&self) -> Vec<ConfigTarget> {
        match self {
            UpdateTarget::Global => vec![ConfigTarget::Global],
            UpdateTarget::Workspace => vec![ConfigTarget::Workspace],
            UpdateTarget::Both => vec![ConfigTarget::Global, ConfigTarget::Workspace],
        }
    }
}

/// How the host launched the extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionMode {
    #[default]
    Production,
    Development,
    Test,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionSettings {
    pub enabled: bool,
    pub color_scheme: String,
    #[serde(flatten)]
    pub toggles: Toggles,
    pub update_target: UpdateTarget,
    pub require_confirmation: bool,
}

impl Default for ExtensionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            color_scheme: "default".to_string(),
            toggles: Toggles::all(),
            update_target: UpdateTarget::Global,
            require_confirmation: true,
        }
    }
}

impl ExtensionSettings {
    /// Read every setting, falling back per key.
    pub async fn load(store: &dyn ConfigStore) -> Self {
        let defaults = Self::default();

        let enabled = read_bool(store, "enabled").await.unwrap_or(defaults.enabled);
        let color_scheme = read_string(store, "colorScheme")
            .await
            .unwrap_or(defaults.color_scheme);
        let toggles = Toggles {
            title_bar: read_bool(store, "toggleTitleBar")
                .await
                .unwrap_or(defaults.toggles.title_bar),
            activity_bar: read_bool(store, "toggleActivityBar")
                .await
                .unwrap_or(defaults.toggles.activity_bar),
            status_bar: read_bool(store, "toggleStatusBar")
                .await
                .unwrap_or(defaults.toggles.status_bar),
        };
        let update_target = read_string(store, "updateTarget")
            .await
            .map(|v| UpdateTarget::parse(&v))
            .unwrap_or(defaults.update_target);
        let require_confirmation = read_bool(store, "requireConfirmation")
            .await
            .unwrap_or(defaults.require_confirmation);

        Self {
            enabled,
            color_scheme,
            toggles,
            update_target,
            require_confirmation,
        }
    }
}

async fn read(store: &dyn ConfigStore, name: &str) -> Option<Value> {
    for namespace in [PRIMARY_NAMESPACE, LEGACY_NAMESPACE] {
        if let Some(value) = store.get(&format!("{namespace}.{name}")).await {
            if !value.is_null() {
                return Some(value);
            }
        }
    }
    None
}

async fn read_bool(store: &dyn ConfigStore, name: &str) -> Option<bool> {
    read(store, name).await.and_then(|v| v.as_bool())
}

async fn read_string(store: &dyn ConfigStore, name: &str) -> Option<String> {
    read(store, name)
        .await
        .and_then(|v| v.as_str().map(str::to_string))
        .filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryConfigStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_defaults_when_unset() {
        let store = MemoryConfigStore::new();
        assert_eq!(
            ExtensionSettings::load(&store).await,
            ExtensionSettings::default()
        );
    }

    #[tokio::test]
    async fn test_primary_namespace_wins_over_legacy() {
        let store = MemoryConfigStore::new();
        store.seed(
            "focusColorToggle.colorScheme",
            &ConfigTarget::Global,
            json!("legacy"),
        );
        assert_eq!(ExtensionSettings::load(&store).await.color_scheme, "legacy");

        store.seed("riverShade.colorScheme", &ConfigTarget::Global, json!("fluent-purple"));
        assert_eq!(
            ExtensionSettings::load(&store).await.color_scheme,
            "fluent-purple"
        );
    }

    #[tokio::test]
    async fn test_toggles_and_target() {
        let store = MemoryConfigStore::new();
        store.seed("riverShade.toggleStatusBar", &ConfigTarget::Global, json!(false));
        store.seed(
            "focusColorToggle.updateTarget",
            &ConfigTarget::Workspace,
            json!("both"),
        );
        let settings = ExtensionSettings::load(&store).await;
        assert!(settings.toggles.title_bar);
        assert!(!settings.toggles.status_bar);
        assert_eq!(settings.update_target, UpdateTarget::Both);
    }

    #[tokio::test]
    async fn test_wrong_type_falls_back() {
        let store = MemoryConfigStore::new();
        store.seed("riverShade.enabled", &ConfigTarget::Global, json!("yes"));
        store.seed("focusColorToggle.enabled", &ConfigTarget::Global, json!(false));
        // The primary value is present but unusable, so the default applies.
        assert!(ExtensionSettings::load(&store).await.enabled);
    }

    #[test]
    fn test_update_target_parse() {
        assert_eq!(UpdateTarget::parse("workspace"), UpdateTarget::Workspace);
        assert_eq!(UpdateTarget::parse(" BOTH "), UpdateTarget::Both);
        assert_eq!(UpdateTarget::parse("everywhere"), UpdateTarget::Global);
        assert_eq!(
            UpdateTarget::Both.targets(),
            vec![ConfigTarget::Global, ConfigTarget::Workspace]
        );
    }

    #[test]
    fn test_settings_serialize_camel_case() {
        let value = serde_json::to_value(ExtensionSettings::default()).unwrap();
        assert_eq!(value["colorScheme"], "default");
        assert_eq!(value["toggleTitleBar"], true);
        assert_eq!(value["updateTarget"], "global");
    }
}
