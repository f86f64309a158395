// ABOUTME: ApplyEngine: install, remove, apply, toggle and diagnose under one single-flight guard.
// ABOUTME: Removal strips only owned keys, restores window.titleBarStyle, then verifies within a deadline.

use crate::error::{Result, RiverShadeError};
use crate::guard::{OperationGuard, OperationPermit, OperationState};
use crate::host::{ConfigStore, ConfigTarget, Notifier, SettingsThemeResolver, StateStore, ThemeResolver};
use crate::mapper::{ColorKeyMap, Toggles};
use crate::scheduler::DEFAULT_PREVIEW_DELAY;
use crate::scheme::ColorSchemeStore;
use crate::session::PreviewSession;
use crate::settings::{ExtensionMode, ExtensionSettings};
use crate::writer::{theme_block_key, ConfigWriter, OwnedKeys, COLOR_CUSTOMIZATIONS_KEY};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const TITLE_BAR_STYLE_KEY: &str = "window.titleBarStyle";
pub const PREV_TITLE_BAR_STYLE_STATE: &str = "rivershade.prevTitleBarStyle";
pub const FIRST_INSTALL_STATE: &str = "rivershade.firstInstall";

const FOLDER_SCOPE_GUIDANCE: &str = "workbench.colorCustomizations does not support folder scope here. Remove the color keys by editing .vscode/settings.json in the folder";

/// The host collaborators the engine is wired to.
#[derive(Clone)]
pub struct Host {
    pub config: Arc<dyn ConfigStore>,
    pub state: Arc<dyn StateStore>,
    pub notifier: Arc<dyn Notifier>,
    pub theme: Arc<dyn ThemeResolver>,
}

impl Host {
    pub fn new(
        config: Arc<dyn ConfigStore>,
        state: Arc<dyn StateStore>,
        notifier: Arc<dyn Notifier>,
        theme: Arc<dyn ThemeResolver>,
    ) -> Self {
        Self {
            config,
            state,
            notifier,
            theme,
        }
    }

    /// Resolve the theme from the same settings store.
    pub fn with_settings_theme(
        config: Arc<dyn ConfigStore>,
        state: Arc<dyn StateStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let theme = Arc::new(SettingsThemeResolver::new(config.clone()));
        Self::new(config, state, notifier, theme)
    }
}

/// Bounds of the post-removal verification loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(300),
            max_wait: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Colors were written. `failed` scopes rejected the write; `missing` keys did not persist.
    Applied {
        failed: Vec<ConfigTarget>,
        missing: Vec<String>,
    },
    /// The user refused the confirmation prompt.
    Declined,
    /// Another operation held the guard.
    Aborted,
    /// `riverShade.enabled` is false.
    Disabled,
    /// Nothing to do in the current mode or state.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NothingToRemove,
    Aborted,
    /// Verification timed out with these scopes still holding owned keys.
    Incomplete { remaining: Vec<ConfigTarget> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveReport {
    pub outcome: RemoveOutcome,
    /// User guidance for scopes the host would not let us clear.
    pub guidance: Vec<String>,
    /// Scopes whose removal write failed for another reason.
    pub failed: Vec<ConfigTarget>,
}

impl RemoveReport {
    fn outcome(outcome: RemoveOutcome) -> Self {
        Self {
            outcome,
            guidance: Vec::new(),
            failed: Vec::new(),
        }
    }
}

/// Snapshot of the engine's view of the world, for bug reports.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub version: String,
    pub mode: ExtensionMode,
    pub theme: Option<String>,
    pub timestamp: String,
    pub scheme: String,
    pub settings: ExtensionSettings,
    pub operation: OperationState,
    pub title_bar_style: Option<Value>,
}

#[derive(Clone)]
pub struct ApplyEngine {
    host: Host,
    writer: ConfigWriter,
    schemes: ColorSchemeStore,
    guard: OperationGuard,
    retry: RetryPolicy,
    mode: ExtensionMode,
    preview_delay: Duration,
    title_bar_notice_shown: Arc<AtomicBool>,
}

impl ApplyEngine {
    pub fn new(host: Host) -> Self {
        let writer = ConfigWriter::new(host.config.clone());
        Self {
            host,
            writer,
            schemes: ColorSchemeStore::new(),
            guard: OperationGuard::new(),
            retry: RetryPolicy::default(),
            mode: ExtensionMode::Production,
            preview_delay: DEFAULT_PREVIEW_DELAY,
            title_bar_notice_shown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_schemes(mut self, schemes: ColorSchemeStore) -> Self {
        self.schemes = schemes;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_mode(mut self, mode: ExtensionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_preview_delay(mut self, delay: Duration) -> Self {
        self.preview_delay = delay;
        self
    }

    pub fn guard(&self) -> &OperationGuard {
        &self.guard
    }

    pub fn writer(&self) -> &ConfigWriter {
        &self.writer
    }

    pub fn schemes(&self) -> &ColorSchemeStore {
        &self.schemes
    }

    pub async fn settings(&self) -> ExtensionSettings {
        ExtensionSettings::load(self.host.config.as_ref()).await
    }

    /// Colors of the configured scheme under the configured toggles.
    pub async fn resolved_colors(&self) -> ColorKeyMap {
        let settings = self.settings().await;
        self.colors_for(&settings, &settings.toggles)
    }

    fn colors_for(&self, settings: &ExtensionSettings, toggles: &Toggles) -> ColorKeyMap {
        let name = ColorSchemeStore::scheme_name(settings);
        self.schemes.resolve_colors(&name, toggles)
    }

    fn reserve(&self, operation: &str) -> Option<OperationPermit> {
        match self.guard.try_reserve(operation) {
            Ok(permit) => Some(permit),
            Err(e) => {
                info!(operation, "{e}");
                None
            }
        }
    }

    /// Install the configured scheme into the configured scopes.
    pub async fn install_colors(&self) -> Result<ApplyOutcome> {
        info!("installColors invoked");
        let Some(permit) = self.reserve("installColors") else {
            return Ok(ApplyOutcome::Aborted);
        };

        let settings = self.settings().await;
        if !self
            .request_permission(&settings, "RiverShade: install color customizations?")
            .await
        {
            info!("installColors declined");
            return Ok(ApplyOutcome::Declined);
        }

        let colors = self.colors_for(&settings, &settings.toggles);
        let outcome = self.apply_reserved(&permit, &settings, &colors).await?;
        self.host
            .notifier
            .info("RiverShade: color customizations installed.");
        Ok(outcome)
    }

    /// Write `colors` through the shared single-flight path.
    pub async fn apply_colors(&self, colors: &ColorKeyMap) -> Result<ApplyOutcome> {
        let Some(permit) = self.reserve("applyColors") else {
            return Ok(ApplyOutcome::Aborted);
        };
        let settings = self.settings().await;
        self.apply_reserved(&permit, &settings, colors).await
    }

    /// Re-apply the configured scheme on user request.
    pub async fn toggle(&self) -> Result<ApplyOutcome> {
        let settings = self.settings().await;
        if !settings.enabled {
            self.host
                .notifier
                .info("RiverShade is disabled (riverShade.enabled is false).");
            return Ok(ApplyOutcome::Disabled);
        }
        let Some(permit) = self.reserve("toggle") else {
            return Ok(ApplyOutcome::Aborted);
        };
        let colors = self.colors_for(&settings, &settings.toggles);
        let outcome = self.apply_reserved(&permit, &settings, &colors).await?;
        self.host.notifier.info("RiverShade: colors applied.");
        Ok(outcome)
    }

    /// One-time auto-apply on first activation. Never runs in development mode.
    pub async fn activate(&self) -> Result<ApplyOutcome> {
        if self.mode == ExtensionMode::Development {
            debug!("auto-apply skipped in development mode");
            return Ok(ApplyOutcome::Skipped);
        }
        let first_install = self
            .host
            .state
            .get(FIRST_INSTALL_STATE)
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        if !first_install {
            return Ok(ApplyOutcome::Skipped);
        }

        let settings = self.settings().await;
        if !settings.enabled {
            return Ok(ApplyOutcome::Disabled);
        }
        let Some(permit) = self.reserve("activate") else {
            return Ok(ApplyOutcome::Aborted);
        };
        let colors = self.colors_for(&settings, &settings.toggles);
        let outcome = self.apply_reserved(&permit, &settings, &colors).await?;
        if let Err(e) = self
            .host
            .state
            .update(FIRST_INSTALL_STATE, Some(Value::Bool(false)))
            .await
        {
            warn!(error = %e, "failed to record first install");
        }
        info!("first-install colors applied");
        Ok(outcome)
    }

    /// Re-apply after the window gains or loses focus. Dropped while busy or disabled.
    pub async fn on_window_focus_changed(&self, focused: bool) -> ApplyOutcome {
        debug!(focused, "window focus changed");
        self.reapply("focusChanged").await
    }

    /// Re-apply after the color theme changes, so the new theme's sub-block is populated.
    pub async fn on_theme_changed(&self) -> ApplyOutcome {
        debug!("color theme changed");
        self.reapply("themeChanged").await
    }

    async fn reapply(&self, operation: &str) -> ApplyOutcome {
        let settings = self.settings().await;
        if !settings.enabled {
            return ApplyOutcome::Disabled;
        }
        let Some(permit) = self.reserve(operation) else {
            return ApplyOutcome::Aborted;
        };
        let colors = self.colors_for(&settings, &settings.toggles);
        match self.apply_reserved(&permit, &settings, &colors).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(operation, error = %e, "re-apply failed");
                ApplyOutcome::Skipped
            }
        }
    }

    async fn request_permission(&self, settings: &ExtensionSettings, prompt: &str) -> bool {
        if !settings.require_confirmation || self.mode == ExtensionMode::Test {
            return true;
        }
        self.host.notifier.confirm(prompt, "Yes").await
    }

    async fn apply_reserved(
        &self,
        permit: &OperationPermit,
        settings: &ExtensionSettings,
        colors: &ColorKeyMap,
    ) -> Result<ApplyOutcome> {
        permit.enter(OperationState::Applying);
        let targets = settings.update_target.targets();

        // Setup read: an unreadable configuration rejects the whole operation.
        self.host.config.inspect(COLOR_CUSTOMIZATIONS_KEY).await?;
        let theme = self.host.theme.active_theme_name().await;
        debug!(keys = colors.len(), ?theme, "applying colors");

        let results = join_all(
            targets
                .iter()
                .map(|target| self.writer.write_to_target(target, colors, theme.as_deref())),
        )
        .await;

        let mut written = Vec::new();
        let mut failed = Vec::new();
        for (target, result) in targets.into_iter().zip(results) {
            match result {
                Ok(()) => written.push(target),
                Err(e) => {
                    warn!(%target, error = %e, "color write failed");
                    self.host
                        .notifier
                        .error(&format!("RiverShade: could not write colors to {target}: {e}"));
                    failed.push(target);
                }
            }
        }

        if !written.is_empty() {
            self.ensure_custom_title_bar(colors).await;
        }
        let missing = self
            .missing_after_write(&written, colors, theme.as_deref())
            .await;
        Ok(ApplyOutcome::Applied { failed, missing })
    }

    /// Title bar colors only show with the custom title bar, so switch to it and remember the old style.
    async fn ensure_custom_title_bar(&self, colors: &ColorKeyMap) {
        if !colors.keys().any(|k| k.starts_with("titleBar.")) {
            return;
        }
        let current = self.host.config.get(TITLE_BAR_STYLE_KEY).await;
        if current.as_ref().and_then(Value::as_str) == Some("custom") {
            return;
        }

        let had_record = self.host.state.get(PREV_TITLE_BAR_STYLE_STATE).is_some();
        if !had_record {
            let previous = current.clone().unwrap_or(Value::Null);
            if let Err(e) = self
                .host
                .state
                .update(PREV_TITLE_BAR_STYLE_STATE, Some(previous))
                .await
            {
                warn!(error = %e, "failed to record previous titleBarStyle");
            }
        }

        let result = self
            .host
            .config
            .update(
                TITLE_BAR_STYLE_KEY,
                Some(Value::String("custom".to_string())),
                &ConfigTarget::Global,
            )
            .await;
        match result {
            Ok(()) => info!(previous = ?current, "window.titleBarStyle set to custom"),
            Err(e) => {
                warn!(error = %e, "failed to set window.titleBarStyle");
                if !had_record {
                    if let Err(e) = self.host.state.update(PREV_TITLE_BAR_STYLE_STATE, None).await {
                        warn!(error = %e, "failed to drop titleBarStyle record");
                    }
                }
                if !self.title_bar_notice_shown.swap(true, Ordering::SeqCst) {
                    self.host.notifier.info(
                        "RiverShade: to recolor the title bar set \"window.titleBarStyle\": \"custom\" in Settings",
                    );
                }
            }
        }
    }

    async fn missing_after_write(
        &self,
        written: &[ConfigTarget],
        colors: &ColorKeyMap,
        theme: Option<&str>,
    ) -> Vec<String> {
        let inspection = match self.host.config.inspect(COLOR_CUSTOMIZATIONS_KEY).await {
            Ok(inspection) => inspection,
            Err(e) => {
                warn!(error = %e, "post-write verification failed");
                return Vec::new();
            }
        };

        let mut missing = BTreeSet::new();
        for target in written {
            let persisted = inspection.value_for(target);
            let has = |block: Option<&Value>, key: &str| {
                block
                    .and_then(Value::as_object)
                    .is_some_and(|map| map.contains_key(key))
            };
            let block = theme.and_then(|t| persisted.and_then(|v| v.get(theme_block_key(t))));
            for key in colors.keys() {
                let top_ok = has(persisted, key);
                let block_ok = theme.is_none() || has(block, key);
                if !(top_ok && block_ok) {
                    missing.insert(key.clone());
                }
            }
            if missing.is_empty() {
                debug!(%target, "all requested keys persisted");
            } else {
                warn!(%target, missing = ?missing, "keys requested but not persisted");
            }
        }
        missing.into_iter().collect()
    }

    /// Remove every owned color key from global, workspace and folder scopes.
    pub async fn remove_colors(&self) -> Result<RemoveReport> {
        info!("removeColors invoked");
        let Some(permit) = self.reserve("removeColors") else {
            return Ok(RemoveReport::outcome(RemoveOutcome::Aborted));
        };
        permit.enter(OperationState::Removing);

        let settings = self.settings().await;
        let owned = OwnedKeys::for_scheme(self.colors_for(&settings, &Toggles::all()).into_keys());

        let inspection = self.host.config.inspect(COLOR_CUSTOMIZATIONS_KEY).await?;
        let mut targets = vec![ConfigTarget::Global, ConfigTarget::Workspace];
        targets.extend(
            self.host
                .config
                .workspace_folders()
                .iter()
                .map(|folder| folder.target()),
        );
        let dirty: Vec<ConfigTarget> = targets
            .into_iter()
            .filter(|target| {
                inspection
                    .value_for(target)
                    .is_some_and(|value| owned.contains_owned(value))
            })
            .collect();

        if dirty.is_empty() {
            info!("no colors to remove in any scope");
            // Colors may have been cleared elsewhere while the title bar switch stuck.
            self.restore_title_bar_style().await;
            self.host.notifier.info("RiverShade: no colors to remove.");
            return Ok(RemoveReport::outcome(RemoveOutcome::NothingToRemove));
        }

        let results = join_all(
            dirty
                .iter()
                .map(|target| self.writer.remove_from_target(target, &owned)),
        )
        .await;

        let mut report = RemoveReport::outcome(RemoveOutcome::Removed);
        let mut unremovable = BTreeSet::new();
        for (target, result) in dirty.iter().zip(results) {
            match result {
                Ok(_) => debug!(%target, "removed owned colors"),
                Err(e) if e.is_folder_scope_unsupported() => {
                    let folder = match target {
                        ConfigTarget::WorkspaceFolder(uri) => uri.as_str(),
                        _ => "",
                    };
                    let line = format!("{FOLDER_SCOPE_GUIDANCE} {folder}.");
                    info!("{line}");
                    report.guidance.push(line);
                    unremovable.insert(target.clone());
                }
                Err(e) => {
                    warn!(%target, error = %e, "color removal failed");
                    report.failed.push(target.clone());
                }
            }
        }

        self.restore_title_bar_style().await;
        self.host.notifier.info("RiverShade: colors removed.");

        report.outcome = self.verify_removal(&owned, &unremovable).await;
        if let RemoveOutcome::Incomplete { remaining } = &report.outcome {
            let err = RiverShadeError::VerificationTimeout {
                remaining: remaining.clone(),
            };
            self.host.notifier.error(&format!("RiverShade: {err}"));
        }
        Ok(report)
    }

    async fn restore_title_bar_style(&self) {
        let Some(previous) = self.host.state.get(PREV_TITLE_BAR_STYLE_STATE) else {
            return;
        };
        let value = (!previous.is_null()).then_some(previous);
        if let Err(e) = self
            .host
            .config
            .update(TITLE_BAR_STYLE_KEY, value.clone(), &ConfigTarget::Global)
            .await
        {
            warn!(error = %e, "failed to restore previous titleBarStyle");
        } else {
            info!(restored = ?value, "window.titleBarStyle restored");
        }
        if let Err(e) = self.host.state.update(PREV_TITLE_BAR_STYLE_STATE, None).await {
            warn!(error = %e, "failed to clear titleBarStyle record");
        }
    }

    /// Re-inspect until no scope holds owned keys, re-stripping stragglers, bounded by the retry policy.
    async fn verify_removal(
        &self,
        owned: &OwnedKeys,
        unremovable: &BTreeSet<ConfigTarget>,
    ) -> RemoveOutcome {
        let deadline = Instant::now() + self.retry.max_wait;
        let mut attempt = 0u32;
        loop {
            let remaining: Vec<ConfigTarget> =
                match self.host.config.inspect(COLOR_CUSTOMIZATIONS_KEY).await {
                    Ok(inspection) => inspection
                        .scopes()
                        .into_iter()
                        .filter(|(target, value)| {
                            !unremovable.contains(target) && owned.contains_owned(value)
                        })
                        .map(|(target, _)| target)
                        .collect(),
                    Err(e) => {
                        warn!(error = %e, "verification inspect failed");
                        return RemoveOutcome::Incomplete {
                            remaining: Vec::new(),
                        };
                    }
                };

            if remaining.is_empty() {
                info!(attempt, "removal verified");
                return RemoveOutcome::Removed;
            }
            if Instant::now() >= deadline {
                warn!(remaining = ?remaining, "removal verification timed out");
                return RemoveOutcome::Incomplete { remaining };
            }

            attempt += 1;
            debug!(attempt, remaining = ?remaining, "retrying removal");
            let retries = join_all(
                remaining
                    .iter()
                    .map(|target| self.writer.remove_from_target(target, owned)),
            )
            .await;
            for (target, result) in remaining.iter().zip(retries) {
                if let Err(e) = result {
                    debug!(%target, error = %e, "retry removal failed");
                }
            }
            tokio::time::sleep(self.retry.interval).await;
        }
    }

    /// Collect version, mode, theme and settings, and log them as pretty JSON.
    pub async fn diagnose(&self) -> Diagnostics {
        let settings = self.settings().await;
        let diagnostics = Diagnostics {
            version: env!("CARGO_PKG_VERSION").to_string(),
            mode: self.mode,
            theme: self.host.theme.active_theme_name().await,
            timestamp: chrono::Utc::now().to_rfc3339(),
            scheme: ColorSchemeStore::scheme_name(&settings),
            settings,
            operation: self.guard.state(),
            title_bar_style: self.host.config.get(TITLE_BAR_STYLE_KEY).await,
        };
        match serde_json::to_string_pretty(&diagnostics) {
            Ok(json) => info!("diagnostics:\n{json}"),
            Err(e) => warn!(error = %e, "failed to serialize diagnostics"),
        }
        diagnostics
    }

    /// Start a live preview session over the configured scopes.
    pub async fn open_preview(&self) -> Result<PreviewSession> {
        let settings = self.settings().await;
        let theme = self.host.theme.active_theme_name().await;
        PreviewSession::start(
            self.writer.clone(),
            self.guard.clone(),
            settings.update_target.targets(),
            theme,
            settings.toggles,
            self.preview_delay,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{LogNotifier, MemoryConfigStore, MemoryStateStore, Notice};
    use serde_json::json;

    struct Fixture {
        config: Arc<MemoryConfigStore>,
        state: Arc<MemoryStateStore>,
        notifier: Arc<LogNotifier>,
        engine: ApplyEngine,
    }

    fn fixture(config: MemoryConfigStore) -> Fixture {
        let config = Arc::new(config);
        let state = Arc::new(MemoryStateStore::new());
        let notifier = Arc::new(LogNotifier::new(true));
        let host = Host::with_settings_theme(config.clone(), state.clone(), notifier.clone());
        Fixture {
            config,
            state,
            notifier,
            engine: ApplyEngine::new(host),
        }
    }

    fn global(f: &Fixture) -> Option<Value> {
        f.config.value(COLOR_CUSTOMIZATIONS_KEY, &ConfigTarget::Global)
    }

    #[tokio::test]
    async fn test_install_writes_default_scheme_to_global() {
        let f = fixture(MemoryConfigStore::new());
        let outcome = f.engine.install_colors().await.unwrap();
        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                failed: vec![],
                missing: vec![]
            }
        );
        let value = global(&f).unwrap();
        assert_eq!(value["titleBar.activeBackground"], "#49124b");
        assert_eq!(value["activityBar.background"], "#49124b");
        assert_eq!(value["statusBar.background"], "#49124b");
        assert_eq!(
            f.config.value(COLOR_CUSTOMIZATIONS_KEY, &ConfigTarget::Workspace),
            None
        );
        assert!(!f.engine.guard().is_busy());
    }

    #[tokio::test]
    async fn test_install_sets_custom_title_bar_and_records_previous() {
        let f = fixture(MemoryConfigStore::new());
        f.config
            .seed(TITLE_BAR_STYLE_KEY, &ConfigTarget::Global, json!("native"));
        f.engine.install_colors().await.unwrap();
        assert_eq!(
            f.config.value(TITLE_BAR_STYLE_KEY, &ConfigTarget::Global),
            Some(json!("custom"))
        );
        assert_eq!(
            f.state.get(PREV_TITLE_BAR_STYLE_STATE),
            Some(json!("native"))
        );
    }

    #[tokio::test]
    async fn test_unset_title_bar_style_recorded_as_null() {
        let f = fixture(MemoryConfigStore::new());
        f.engine.install_colors().await.unwrap();
        assert_eq!(f.state.get(PREV_TITLE_BAR_STYLE_STATE), Some(Value::Null));

        f.engine.remove_colors().await.unwrap();
        assert_eq!(f.config.value(TITLE_BAR_STYLE_KEY, &ConfigTarget::Global), None);
        assert_eq!(f.state.get(PREV_TITLE_BAR_STYLE_STATE), None);
    }

    #[tokio::test]
    async fn test_title_bar_style_failure_notifies_once() {
        let f = fixture(MemoryConfigStore::new());
        f.config.set_read_only(TITLE_BAR_STYLE_KEY, true);
        f.engine.install_colors().await.unwrap();
        f.engine.install_colors().await.unwrap();

        let notices = f
            .notifier
            .notices()
            .into_iter()
            .filter(|n| matches!(n, Notice::Info(m) if m.contains("titleBarStyle")))
            .count();
        assert_eq!(notices, 1);
        assert_eq!(f.state.get(PREV_TITLE_BAR_STYLE_STATE), None);
    }

    #[tokio::test]
    async fn test_failed_install_leaves_title_bar_style_alone() {
        let f = fixture(MemoryConfigStore::new());
        f.config
            .seed(TITLE_BAR_STYLE_KEY, &ConfigTarget::Global, json!("native"));
        f.config.set_read_only(COLOR_CUSTOMIZATIONS_KEY, true);

        let outcome = f.engine.install_colors().await.unwrap();
        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                failed: vec![ConfigTarget::Global],
                missing: vec![],
            }
        );
        assert_eq!(
            f.config.value(TITLE_BAR_STYLE_KEY, &ConfigTarget::Global),
            Some(json!("native"))
        );
        assert_eq!(f.state.get(PREV_TITLE_BAR_STYLE_STATE), None);
    }

    #[tokio::test]
    async fn test_remove_restores_title_bar_when_colors_already_gone() {
        let f = fixture(MemoryConfigStore::new());
        f.config
            .seed(TITLE_BAR_STYLE_KEY, &ConfigTarget::Global, json!("native"));
        f.engine.install_colors().await.unwrap();

        // Colors cleared by another writer; the title bar switch remains.
        f.config
            .update(COLOR_CUSTOMIZATIONS_KEY, None, &ConfigTarget::Global)
            .await
            .unwrap();

        let report = f.engine.remove_colors().await.unwrap();
        assert_eq!(report.outcome, RemoveOutcome::NothingToRemove);
        assert_eq!(
            f.config.value(TITLE_BAR_STYLE_KEY, &ConfigTarget::Global),
            Some(json!("native"))
        );
        assert_eq!(f.state.get(PREV_TITLE_BAR_STYLE_STATE), None);
    }

    #[tokio::test]
    async fn test_nothing_to_remove_without_record_writes_nothing() {
        let f = fixture(MemoryConfigStore::new());
        let report = f.engine.remove_colors().await.unwrap();
        assert_eq!(report.outcome, RemoveOutcome::NothingToRemove);
        assert_eq!(f.config.write_count(), 0);
    }

    #[tokio::test]
    async fn test_confirmation_declined() {
        let config = Arc::new(MemoryConfigStore::new());
        let host = Host::with_settings_theme(
            config.clone(),
            Arc::new(MemoryStateStore::new()),
            Arc::new(LogNotifier::new(false)),
        );
        let engine = ApplyEngine::new(host);
        assert_eq!(engine.install_colors().await.unwrap(), ApplyOutcome::Declined);
        assert_eq!(config.write_count(), 0);
        assert!(!engine.guard().is_busy());

        let engine = engine.with_mode(ExtensionMode::Test);
        assert!(matches!(
            engine.install_colors().await.unwrap(),
            ApplyOutcome::Applied { .. }
        ));
    }

    #[tokio::test]
    async fn test_unreadable_config_rejects_install() {
        let f = fixture(MemoryConfigStore::new());
        f.config.set_unreadable(true);
        let err = f.engine.install_colors().await.unwrap_err();
        assert!(matches!(err, RiverShadeError::ConfigRead(_)));
        assert!(!f.engine.guard().is_busy());
    }

    #[tokio::test]
    async fn test_theme_block_written_when_theme_known() {
        let f = fixture(MemoryConfigStore::new());
        f.config.seed(
            crate::host::COLOR_THEME_KEY,
            &ConfigTarget::Global,
            json!("Monokai"),
        );
        f.engine.install_colors().await.unwrap();
        let value = global(&f).unwrap();
        assert_eq!(value["[Monokai]"]["titleBar.activeBackground"], "#49124b");
    }

    #[tokio::test]
    async fn test_toggle_refuses_when_disabled() {
        let f = fixture(MemoryConfigStore::new());
        f.config
            .seed("riverShade.enabled", &ConfigTarget::Global, json!(false));
        assert_eq!(f.engine.toggle().await.unwrap(), ApplyOutcome::Disabled);
        assert_eq!(global(&f), None);
        assert_eq!(f.engine.on_theme_changed().await, ApplyOutcome::Disabled);
    }

    #[tokio::test]
    async fn test_activate_applies_once() {
        let f = fixture(MemoryConfigStore::new());
        assert!(matches!(
            f.engine.activate().await.unwrap(),
            ApplyOutcome::Applied { .. }
        ));
        assert_eq!(f.state.get(FIRST_INSTALL_STATE), Some(json!(false)));
        assert_eq!(f.engine.activate().await.unwrap(), ApplyOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_activate_skipped_in_development() {
        let f = fixture(MemoryConfigStore::new());
        let engine = f.engine.clone().with_mode(ExtensionMode::Development);
        assert_eq!(engine.activate().await.unwrap(), ApplyOutcome::Skipped);
        assert_eq!(global(&f), None);
    }

    #[tokio::test]
    async fn test_events_dropped_while_busy() {
        let f = fixture(MemoryConfigStore::new());
        let _permit = f.engine.guard().try_reserve("removeColors").unwrap();
        assert_eq!(
            f.engine.on_window_focus_changed(true).await,
            ApplyOutcome::Aborted
        );
        assert_eq!(f.engine.install_colors().await.unwrap(), ApplyOutcome::Aborted);
        assert_eq!(
            f.engine.remove_colors().await.unwrap().outcome,
            RemoveOutcome::Aborted
        );
        assert_eq!(f.config.write_count(), 0);
    }

    #[tokio::test]
    async fn test_diagnose_reports_state() {
        let f = fixture(MemoryConfigStore::new());
        let diagnostics = f.engine.diagnose().await;
        assert_eq!(diagnostics.scheme, "default");
        assert_eq!(diagnostics.operation, OperationState::Idle);
        assert_eq!(diagnostics.mode, ExtensionMode::Production);
        let json = serde_json::to_value(&diagnostics).unwrap();
        assert!(json.get("titleBarStyle").is_some());
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }
}
