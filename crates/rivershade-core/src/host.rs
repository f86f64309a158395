// ABOUTME: Traits for the editor host collaborators: scoped settings, extension state, notifications, theme.
// ABOUTME: Also ships an in-memory host used by tests and embedders.

use crate::error::{Result, RiverShadeError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, error, info};

/// Settings key holding the user's active color theme.
pub const COLOR_THEME_KEY: &str = "workbench.colorTheme";

/// A configuration scope that can hold its own value for a key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfigTarget {
    Global,
    Workspace,
    /// A folder of a multi-root workspace, identified by its uri.
    WorkspaceFolder(String),
}

impl fmt::Display for ConfigTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigTarget::Global => write!(f, "global"),
            ConfigTarget::Workspace => write!(f, "workspace"),
            ConfigTarget::WorkspaceFolder(uri) => write!(f, "folder {uri}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceFolder {
    pub name: String,
    pub uri: String,
}

impl WorkspaceFolder {
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri: uri.into(),
        }
    }

    pub fn target(&self) -> ConfigTarget {
        ConfigTarget::WorkspaceFolder(self.uri.clone())
    }
}

/// Per-scope values of one settings key. Absent means the scope holds nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inspection {
    pub global_value: Option<Value>,
    pub workspace_value: Option<Value>,
    /// Folder uri to that folder's value.
    #[serde(default)]
    pub workspace_folder_values: BTreeMap<String, Value>,
}

impl Inspection {
    pub fn value_for(&self, target: &ConfigTarget) -> Option<&Value> {
        match target {
            ConfigTarget::Global => self.global_value.as_ref(),
            ConfigTarget::Workspace => self.workspace_value.as_ref(),
            ConfigTarget::WorkspaceFolder(uri) => self.workspace_folder_values.get(uri),
        }
    }

    /// Every scope that currently holds a value.
    pub fn scopes(&self) -> Vec<(ConfigTarget, &Value)> {
        let mut out = Vec::new();
        if let Some(value) = &self.global_value {
            out.push((ConfigTarget::Global, value));
        }
        if let Some(value) = &self.workspace_value {
            out.push((ConfigTarget::Workspace, value));
        }
        for (uri, value) in &self.workspace_folder_values {
            out.push((ConfigTarget::WorkspaceFolder(uri.clone()), value));
        }
        out
    }

    /// The effective value: first folder, then workspace, then global.
    pub fn effective(&self) -> Option<&Value> {
        self.workspace_folder_values
            .values()
            .next()
            .or(self.workspace_value.as_ref())
            .or(self.global_value.as_ref())
    }
}

/// The host's scoped settings store.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read every scope's value for `key`. Failing here means configuration cannot be read at all.
    async fn inspect(&self, key: &str) -> Result<Inspection>;

    /// Merged value for `key`. Unreadable configuration reads as absent.
    async fn get(&self, key: &str) -> Option<Value> {
        self.inspect(key).await.ok()?.effective().cloned()
    }

    /// Folders open in the current workspace.
    fn workspace_folders(&self) -> Vec<WorkspaceFolder>;

    /// Write `value` at `target`. `None` deletes the setting at that scope.
    async fn update(&self, key: &str, value: Option<Value>, target: &ConfigTarget) -> Result<()>;
}

/// Host-managed key/value state that outlives a session.
#[async_trait]
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    /// `None` deletes the record.
    async fn update(&self, key: &str, value: Option<Value>) -> Result<()>;
}

/// User-facing messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
    /// Modal confirmation. True only when the user picked `accept_label`.
    async fn confirm(&self, prompt: &str, accept_label: &str) -> bool;
}

#[async_trait]
pub trait ThemeResolver: Send + Sync {
    async fn active_theme_name(&self) -> Option<String>;
}

/// Resolves the theme from `workbench.colorTheme`, falling back to a runtime label.
pub struct SettingsThemeResolver {
    store: Arc<dyn ConfigStore>,
    runtime_label: Option<String>,
}

impl SettingsThemeResolver {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            runtime_label: None,
        }
    }

    pub fn with_runtime_label(mut self, label: impl Into<String>) -> Self {
        self.runtime_label = Some(label.into());
        self
    }
}

#[async_trait]
impl ThemeResolver for SettingsThemeResolver {
    async fn active_theme_name(&self) -> Option<String> {
        let configured = self
            .store
            .get(COLOR_THEME_KEY)
            .await
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|name| !name.trim().is_empty());
        configured.or_else(|| self.runtime_label.clone())
    }
}

/// Settings store held in memory.
///
/// Folder-scoped writes of selected keys can be rejected the way editors
/// refuse window-scoped settings at folder level, and individual keys can be
/// made read-only to exercise failure paths.
#[derive(Default)]
pub struct MemoryConfigStore {
    values: RwLock<BTreeMap<String, Inspection>>,
    folders: RwLock<Vec<WorkspaceFolder>>,
    folder_scope_rejected: RwLock<BTreeSet<String>>,
    read_only_keys: RwLock<BTreeSet<String>>,
    unreadable: RwLock<bool>,
    write_delay: RwLock<Option<Duration>>,
    writes: AtomicUsize,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_folders(self, folders: Vec<WorkspaceFolder>) -> Self {
        if let Ok(mut guard) = self.folders.write() {
            *guard = folders;
        }
        self
    }

    /// Reject folder-scope writes of `key` with the host's folder-scope message.
    pub fn reject_folder_scope(self, key: &str) -> Self {
        if let Ok(mut guard) = self.folder_scope_rejected.write() {
            guard.insert(key.to_string());
        }
        self
    }

    /// Make every write of `key` fail.
    pub fn set_read_only(&self, key: &str, read_only: bool) {
        if let Ok(mut guard) = self.read_only_keys.write() {
            if read_only {
                guard.insert(key.to_string());
            } else {
                guard.remove(key);
            }
        }
    }

    /// Make `inspect` fail for every key.
    pub fn set_unreadable(&self, unreadable: bool) {
        if let Ok(mut guard) = self.unreadable.write() {
            *guard = unreadable;
        }
    }

    /// Sleep before each write lands, so concurrent callers can overlap.
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        if let Ok(mut guard) = self.write_delay.write() {
            *guard = delay;
        }
    }

    /// Seed a value without counting it as a write.
    pub fn seed(&self, key: &str, target: &ConfigTarget, value: Value) {
        self.store(key, Some(value), target);
    }

    pub fn value(&self, key: &str, target: &ConfigTarget) -> Option<Value> {
        self.values
            .read()
            .ok()?
            .get(key)
            .and_then(|inspection| inspection.value_for(target).cloned())
    }

    /// Number of successful `update` calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn store(&self, key: &str, value: Option<Value>, target: &ConfigTarget) {
        let Ok(mut values) = self.values.write() else {
            return;
        };
        let entry = values.entry(key.to_string()).or_default();
        match target {
            ConfigTarget::Global => entry.global_value = value,
            ConfigTarget::Workspace => entry.workspace_value = value,
            ConfigTarget::WorkspaceFolder(uri) => match value {
                Some(value) => {
                    entry.workspace_folder_values.insert(uri.clone(), value);
                }
                None => {
                    entry.workspace_folder_values.remove(uri);
                }
            },
        }
    }

    fn is_flag_set(set: &RwLock<BTreeSet<String>>, key: &str) -> bool {
        set.read().map(|guard| guard.contains(key)).unwrap_or(false)
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn inspect(&self, key: &str) -> Result<Inspection> {
        if self.unreadable.read().map(|g| *g).unwrap_or(false) {
            return Err(RiverShadeError::ConfigRead(format!(
                "settings unavailable while reading {key}"
            )));
        }
        let values = self
            .values
            .read()
            .map_err(|e| RiverShadeError::ConfigRead(e.to_string()))?;
        Ok(values.get(key).cloned().unwrap_or_default())
    }

    fn workspace_folders(&self) -> Vec<WorkspaceFolder> {
        self.folders
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    async fn update(&self, key: &str, value: Option<Value>, target: &ConfigTarget) -> Result<()> {
        let delay = self.write_delay.read().ok().and_then(|guard| *guard);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if Self::is_flag_set(&self.read_only_keys, key) {
            return Err(RiverShadeError::ScopeWriteRejected {
                target: target.clone(),
                reason: format!("{key} is read-only"),
            });
        }
        if matches!(target, ConfigTarget::WorkspaceFolder(_))
            && Self::is_flag_set(&self.folder_scope_rejected, key)
        {
            return Err(RiverShadeError::ScopeWriteRejected {
                target: target.clone(),
                reason: format!(
                    "Unable to write to Folder Settings because {key} does not support the folder resource scope."
                ),
            });
        }

        debug!(key, %target, delete = value.is_none(), "memory store write");
        self.store(key, value, target);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Extension state held in memory.
#[derive(Default)]
pub struct MemoryStateStore {
    values: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.read().ok()?.get(key).cloned()
    }

    async fn update(&self, key: &str, value: Option<Value>) -> Result<()> {
        let mut values = self
            .values
            .write()
            .map_err(|e| RiverShadeError::State(e.to_string()))?;
        match value {
            Some(value) => values.insert(key.to_string(), value),
            None => values.remove(key),
        };
        Ok(())
    }
}

/// A message shown through a [`Notifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
    Confirm(String),
}

/// Notifier that logs every message and keeps a copy for inspection.
pub struct LogNotifier {
    notices: Mutex<Vec<Notice>>,
    accept: bool,
}

impl LogNotifier {
    /// `accept` is the answer given to every confirmation prompt.
    pub fn new(accept: bool) -> Self {
        Self {
            notices: Mutex::new(Vec::new()),
            accept,
        }
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, notice: Notice) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice);
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    fn info(&self, message: &str) {
        info!("{message}");
        self.push(Notice::Info(message.to_string()));
    }

    fn error(&self, message: &str) {
        error!("{message}");
        self.push(Notice::Error(message.to_string()));
    }

    async fn confirm(&self, prompt: &str, accept_label: &str) -> bool {
        info!(accept_label, accepted = self.accept, "{prompt}");
        self.push(Notice::Confirm(prompt.to_string()));
        self.accept
    }
}
