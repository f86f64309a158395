// ABOUTME: Live preview session: snapshot, debounced previews, then apply or restore.
// ABOUTME: The scheduler is always disposed before restoring so no late preview lands on restored settings.

use crate::error::{Result, RiverShadeError};
use crate::guard::{OperationGuard, OperationState};
use crate::host::ConfigTarget;
use crate::mapper::{map_palette_to_colors, ColorKeyMap, Toggles};
use crate::palette::Palette;
use crate::scheduler::{PreviewScheduler, PreviewSink};
use crate::writer::{ConfigWriter, Snapshot, COLOR_CUSTOMIZATIONS_KEY};
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Writes preview patches to a fixed set of scopes.
pub struct WriterPreviewSink {
    writer: ConfigWriter,
    targets: Vec<ConfigTarget>,
    theme: Option<String>,
}

impl WriterPreviewSink {
    pub fn new(writer: ConfigWriter, targets: Vec<ConfigTarget>, theme: Option<String>) -> Self {
        Self {
            writer,
            targets,
            theme,
        }
    }
}

#[async_trait]
impl PreviewSink for WriterPreviewSink {
    async fn write_preview(&self, patch: &ColorKeyMap) -> Result<()> {
        write_all(&self.writer, &self.targets, patch, self.theme.as_deref()).await
    }
}

/// Write `patch` to every target concurrently. Each scope is attempted; the last failure is returned.
pub(crate) async fn write_all(
    writer: &ConfigWriter,
    targets: &[ConfigTarget],
    patch: &ColorKeyMap,
    theme: Option<&str>,
) -> Result<()> {
    let results = join_all(
        targets
            .iter()
            .map(|target| writer.write_to_target(target, patch, theme)),
    )
    .await;

    let mut last_error = None;
    for (target, result) in targets.iter().zip(results) {
        if let Err(e) = result {
            warn!(%target, error = %e, "color write failed");
            last_error = Some(e);
        }
    }
    last_error.map_or(Ok(()), Err)
}

pub struct PreviewSession {
    writer: ConfigWriter,
    guard: OperationGuard,
    targets: Vec<ConfigTarget>,
    theme: Option<String>,
    toggles: Toggles,
    snapshot: Snapshot,
    scheduler: PreviewScheduler,
    persisted: bool,
    closed: bool,
}

impl PreviewSession {
    /// Snapshot `targets` and set up the preview scheduler.
    pub async fn start(
        writer: ConfigWriter,
        guard: OperationGuard,
        targets: Vec<ConfigTarget>,
        theme: Option<String>,
        toggles: Toggles,
        delay: Duration,
    ) -> Result<Self> {
        let snapshot = writer.snapshot_targets(&targets).await?;
        let sink = Arc::new(WriterPreviewSink::new(
            writer.clone(),
            targets.clone(),
            theme.clone(),
        ));
        debug!(targets = targets.len(), ?theme, "preview session started");
        Ok(Self {
            writer,
            guard,
            targets,
            theme,
            toggles,
            snapshot,
            scheduler: PreviewScheduler::new(sink, delay),
            persisted: false,
            closed: false,
        })
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Map `palette` and schedule it as a preview. Returns the mapped keys.
    pub fn preview(&self, palette: &Palette) -> ColorKeyMap {
        let colors = map_palette_to_colors(palette, &self.toggles);
        if !self.closed && !colors.is_empty() {
            self.scheduler.schedule(colors.clone());
        }
        colors
    }

    /// Write `palette`'s mapping for good and end the session.
    pub async fn apply(&mut self, palette: &Palette) -> Result<ColorKeyMap> {
        if self.closed {
            return Err(RiverShadeError::State("preview session closed".to_string()));
        }
        let permit = self.guard.try_reserve("previewApply")?;
        permit.enter(OperationState::Applying);

        self.scheduler.dispose().await;
        let colors = map_palette_to_colors(palette, &self.toggles);
        write_all(&self.writer, &self.targets, &colors, self.theme.as_deref()).await?;

        self.persisted = true;
        self.closed = true;
        info!(keys = colors.len(), "preview applied");
        Ok(colors)
    }

    /// Discard previews and restore the settings captured at start.
    pub async fn cancel(&mut self) -> Result<()> {
        self.close().await
    }

    /// End the session. Restores the snapshot unless it was applied.
    pub async fn dispose(&mut self) -> Result<()> {
        self.close().await
    }

    /// Current merged `workbench.colorCustomizations`, or an empty object.
    pub async fn sync(&self) -> Value {
        self.writer
            .store()
            .get(COLOR_CUSTOMIZATIONS_KEY)
            .await
            .unwrap_or_else(|| Value::Object(Default::default()))
    }

    async fn close(&mut self) -> Result<()> {
        self.scheduler.dispose().await;
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.persisted {
            return Ok(());
        }
        debug!("restoring pre-preview settings");
        self.writer.restore_targets(&self.snapshot).await
    }
}
