// ABOUTME: File-backed host: settings.json per scope and a JSON state file.
// ABOUTME: Settings files are read as JSONC (comments, trailing commas) and written back as plain JSON.

use crate::error::CliError;
use async_trait::async_trait;
use rivershade_core::host::{Inspection, StateStore, WorkspaceFolder};
use rivershade_core::{ConfigStore, ConfigTarget, Result, RiverShadeError};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tokio::sync::Mutex;
use tracing::debug;

/// `<root>/.vscode/settings.json`
pub fn scoped_settings_path(root: &Path) -> PathBuf {
    root.join(".vscode").join("settings.json")
}

fn folder_uri(root: &Path) -> String {
    format!("file://{}", root.display())
}

fn folder_name(root: &Path) -> String {
    root.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string())
}

async fn read_object(path: &Path) -> std::result::Result<Option<Map<String, Value>>, CliError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(CliError::SettingsRead {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        }
    };
    if content.trim().is_empty() {
        return Ok(Some(Map::new()));
    }
    match json5::from_str::<Value>(&content) {
        Ok(Value::Object(map)) => Ok(Some(map)),
        Ok(_) => Err(CliError::SettingsRead {
            path: path.to_path_buf(),
            reason: "top-level value is not an object".to_string(),
        }),
        Err(e) => Err(CliError::SettingsRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

async fn read_key(path: &Path, key: &str) -> Result<Option<Value>> {
    read_object(path)
        .await
        .map(|map| map.and_then(|mut map| map.remove(key)))
        .map_err(|e| RiverShadeError::ConfigRead(e.to_string()))
}

async fn write_object(path: &Path, map: &Map<String, Value>) -> std::result::Result<(), CliError> {
    let err = |reason: String| CliError::SettingsWrite {
        path: path.to_path_buf(),
        reason,
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| err(e.to_string()))?;
    }
    let mut body = serde_json::to_string_pretty(map).map_err(|e| err(e.to_string()))?;
    body.push('\n');
    tokio::fs::write(path, body)
        .await
        .map_err(|e| err(e.to_string()))
}

/// Settings store over the user, workspace and folder `settings.json` files.
pub struct FileConfigStore {
    user: PathBuf,
    workspace: Option<PathBuf>,
    folders: Vec<(WorkspaceFolder, PathBuf)>,
    write_lock: Mutex<()>,
}

impl FileConfigStore {
    pub fn new(user: PathBuf, workspace_root: Option<&Path>, folder_roots: &[PathBuf]) -> Self {
        let folders = folder_roots
            .iter()
            .map(|root| {
                (
                    WorkspaceFolder::new(folder_name(root), folder_uri(root)),
                    scoped_settings_path(root),
                )
            })
            .collect();
        Self {
            user,
            workspace: workspace_root.map(scoped_settings_path),
            folders,
            write_lock: Mutex::new(()),
        }
    }

    fn path_for(&self, target: &ConfigTarget) -> Result<PathBuf> {
        match target {
            ConfigTarget::Global => Ok(self.user.clone()),
            ConfigTarget::Workspace => {
                self.workspace
                    .clone()
                    .ok_or_else(|| RiverShadeError::ScopeWriteRejected {
                        target: target.clone(),
                        reason: "no workspace is open".to_string(),
                    })
            }
            ConfigTarget::WorkspaceFolder(uri) => self
                .folders
                .iter()
                .find(|(folder, _)| &folder.uri == uri)
                .map(|(_, path)| path.clone())
                .ok_or_else(|| RiverShadeError::ScopeWriteRejected {
                    target: target.clone(),
                    reason: format!("unknown workspace folder {uri}"),
                }),
        }
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn inspect(&self, key: &str) -> Result<Inspection> {
        let mut inspection = Inspection {
            global_value: read_key(&self.user, key).await?,
            ..Default::default()
        };
        if let Some(path) = &self.workspace {
            inspection.workspace_value = read_key(path, key).await?;
        }
        for (folder, path) in &self.folders {
            if let Some(value) = read_key(path, key).await? {
                inspection
                    .workspace_folder_values
                    .insert(folder.uri.clone(), value);
            }
        }
        Ok(inspection)
    }

    fn workspace_folders(&self) -> Vec<WorkspaceFolder> {
        self.folders.iter().map(|(folder, _)| folder.clone()).collect()
    }

    async fn update(&self, key: &str, value: Option<Value>, target: &ConfigTarget) -> Result<()> {
        let path = self.path_for(target)?;
        let rejected = |e: CliError| RiverShadeError::ScopeWriteRejected {
            target: target.clone(),
            reason: e.to_string(),
        };

        let _guard = self.write_lock.lock().await;
        let existing = read_object(&path).await.map_err(rejected)?;
        if existing.is_none() && value.is_none() {
            return Ok(());
        }
        let mut map = existing.unwrap_or_default();
        match value {
            Some(value) => {
                map.insert(key.to_string(), value);
            }
            None => {
                map.remove(key);
            }
        }
        debug!(path = %path.display(), key, "writing settings file");
        write_object(&path, &map).await.map_err(rejected)
    }
}

/// Extension state persisted as one JSON object.
pub struct FileStateStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, Value>>,
    write_lock: Mutex<()>,
}

impl FileStateStore {
    pub async fn open(path: PathBuf) -> std::result::Result<Self, CliError> {
        let values = read_object(&path)
            .await?
            .unwrap_or_default()
            .into_iter()
            .collect();
        Ok(Self {
            path,
            values: RwLock::new(values),
            write_lock: Mutex::new(()),
        })
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.read().ok()?.get(key).cloned()
    }

    async fn update(&self, key: &str, value: Option<Value>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let snapshot: Map<String, Value> = {
            let mut values = self
                .values
                .write()
                .map_err(|e| RiverShadeError::State(e.to_string()))?;
            match value {
                Some(value) => values.insert(key.to_string(), value),
                None => values.remove(key),
            };
            values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };
        write_object(&self.path, &snapshot)
            .await
            .map_err(|e| RiverShadeError::State(e.to_string()))
    }
}
