// ABOUTME: Per-scope read/merge/write of workbench.colorCustomizations with snapshot and restore.
// ABOUTME: Also owns the removal primitive that strips only keys this extension writes.

use crate::error::{Result, RiverShadeError};
use crate::host::{ConfigStore, ConfigTarget};
use crate::mapper::{ColorKeyMap, ALLOWED_KEYS};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

pub const COLOR_CUSTOMIZATIONS_KEY: &str = "workbench.colorCustomizations";

/// Key prefixes removed even when not in the exact owned set, to catch keys left by older versions.
pub const OWNED_PREFIXES: &[&str] = &["titleBar.", "activityBar.", "statusBar."];

/// Value captured per scope. `None` means the scope held nothing.
pub type Snapshot = BTreeMap<ConfigTarget, Option<Value>>;

/// Sub-block key for a theme, e.g. `[Default Dark Modern]`.
pub fn theme_block_key(theme: &str) -> String {
    format!("[{theme}]")
}

fn is_theme_block(key: &str) -> bool {
    key.len() >= 2 && key.starts_with('[') && key.ends_with(']')
}

/// The set of color keys removal may delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnedKeys {
    exact: BTreeSet<String>,
    prefixes: Vec<String>,
}

impl OwnedKeys {
    pub fn new<I, S>(exact: I, prefixes: &[&str]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exact: exact.into_iter().map(Into::into).collect(),
            prefixes: prefixes.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// `keys` plus the whole allow-list and the legacy family prefixes.
    pub fn for_scheme<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut owned = Self::new(keys, OWNED_PREFIXES);
        owned
            .exact
            .extend(ALLOWED_KEYS.iter().map(|k| k.to_string()));
        owned
    }

    pub fn owns(&self, key: &str) -> bool {
        self.exact.contains(key) || self.prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }

    /// True when `value` holds an owned key at top level or inside any theme sub-block.
    pub fn contains_owned(&self, value: &Value) -> bool {
        let Some(map) = value.as_object() else {
            return false;
        };
        map.iter().any(|(key, nested)| {
            if is_theme_block(key) {
                nested
                    .as_object()
                    .is_some_and(|block| block.keys().any(|k| self.owns(k)))
            } else {
                self.owns(key)
            }
        })
    }
}

/// Remove owned keys from `map` and from each theme sub-block.
///
/// A sub-block emptied by the removal is dropped; sub-blocks that held no
/// owned keys are kept as they were. Returns `None` when nothing is left.
pub fn strip_owned_keys(map: &Map<String, Value>, owned: &OwnedKeys) -> Option<Map<String, Value>> {
    let mut out = Map::new();
    for (key, value) in map {
        if is_theme_block(key) {
            if let Some(block) = value.as_object() {
                if !block.keys().any(|k| owned.owns(k)) {
                    out.insert(key.clone(), value.clone());
                    continue;
                }
                let kept: Map<String, Value> = block
                    .iter()
                    .filter(|(k, _)| !owned.owns(k))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                if !kept.is_empty() {
                    out.insert(key.clone(), Value::Object(kept));
                }
                continue;
            }
        }
        if !owned.owns(key) {
            out.insert(key.clone(), value.clone());
        }
    }
    (!out.is_empty()).then_some(out)
}

fn merge_patch(target: &mut Map<String, Value>, patch: &ColorKeyMap) {
    for (key, value) in patch {
        target.insert(key.clone(), Value::String(value.clone()));
    }
}

/// Reads and writes `workbench.colorCustomizations` one scope at a time.
#[derive(Clone)]
pub struct ConfigWriter {
    store: Arc<dyn ConfigStore>,
}

impl ConfigWriter {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    /// The value held at exactly `target`, ignoring other scopes.
    pub async fn inspect_base_for_target(&self, target: &ConfigTarget) -> Result<Option<Value>> {
        let inspection = self.store.inspect(COLOR_CUSTOMIZATIONS_KEY).await?;
        Ok(inspection.value_for(target).cloned())
    }

    /// Merge `patch` over the value at `target` and write it back.
    ///
    /// With a theme name, the patch is also merged into that theme's
    /// sub-block. Other sub-blocks and unrelated keys are left alone.
    pub async fn write_to_target(
        &self,
        target: &ConfigTarget,
        patch: &ColorKeyMap,
        theme: Option<&str>,
    ) -> Result<()> {
        let current = self.inspect_base_for_target(target).await?;
        let mut merged = current
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default();
        merge_patch(&mut merged, patch);

        if let Some(theme) = theme.filter(|t| !t.is_empty()) {
            let block_key = theme_block_key(theme);
            let mut block = merged
                .get(&block_key)
                .and_then(|v| v.as_object().cloned())
                .unwrap_or_default();
            merge_patch(&mut block, patch);
            merged.insert(block_key, Value::Object(block));
        }

        let value = (!merged.is_empty()).then_some(Value::Object(merged));
        debug!(%target, keys = patch.len(), ?theme, "writing color customizations");
        self.store
            .update(COLOR_CUSTOMIZATIONS_KEY, value, target)
            .await
    }

    /// Clone the current value at each target.
    pub async fn snapshot_targets(&self, targets: &[ConfigTarget]) -> Result<Snapshot> {
        let inspection = self.store.inspect(COLOR_CUSTOMIZATIONS_KEY).await?;
        Ok(targets
            .iter()
            .map(|target| (target.clone(), inspection.value_for(target).cloned()))
            .collect())
    }

    /// Write every captured value back. Every scope is attempted; the last failure is returned.
    pub async fn restore_targets(&self, snapshot: &Snapshot) -> Result<()> {
        let mut last_error: Option<RiverShadeError> = None;
        for (target, value) in snapshot {
            if let Err(e) = self
                .store
                .update(COLOR_CUSTOMIZATIONS_KEY, value.clone(), target)
                .await
            {
                warn!(%target, error = %e, "restore failed");
                last_error = Some(e);
            }
        }
        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Strip owned keys at `target`. Returns false when the scope held none and nothing was written.
    pub async fn remove_from_target(&self, target: &ConfigTarget, owned: &OwnedKeys) -> Result<bool> {
        let current = self.inspect_base_for_target(target).await?;
        let Some(value) = current.filter(|v| owned.contains_owned(v)) else {
            return Ok(false);
        };
        let stripped = value
            .as_object()
            .and_then(|map| strip_owned_keys(map, owned))
            .map(Value::Object);
        debug!(%target, delete = stripped.is_none(), "removing owned color keys");
        self.store
            .update(COLOR_CUSTOMIZATIONS_KEY, stripped, target)
            .await?;
        Ok(true)
    }
}
