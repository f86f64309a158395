// ABOUTME: Core library for rivershade - color math, palette mapping, settings writes
// ABOUTME: Host-agnostic: the editor is reached through the traits in `host`

pub mod color;
pub mod engine;
pub mod error;
pub mod guard;
pub mod host;
pub mod mapper;
pub mod palette;
pub mod scheduler;
pub mod scheme;
pub mod session;
pub mod settings;
pub mod writer;

pub use color::{blend, hex_to_rgb, lighten, rgb_to_hex, saturate, Oklch, PerceptualVariants, Rgb};
pub use engine::{ApplyEngine, ApplyOutcome, Diagnostics, Host, RemoveOutcome, RemoveReport, RetryPolicy};
pub use error::{Result, RiverShadeError};
pub use guard::{OperationGuard, OperationState};
pub use host::{ConfigStore, ConfigTarget, Inspection, Notifier, StateStore, ThemeResolver, WorkspaceFolder};
pub use mapper::{map_palette_to_colors, ColorKeyMap, Toggles, ALLOWED_KEYS};
pub use palette::{normalize_color, Neutrals, Palette};
pub use scheduler::{PreviewScheduler, PreviewSink};
pub use scheme::{ColorSchemeStore, SchemeDefinition};
pub use session::PreviewSession;
pub use settings::{ExtensionMode, ExtensionSettings, UpdateTarget};
pub use writer::{ConfigWriter, OwnedKeys, Snapshot, COLOR_CUSTOMIZATIONS_KEY};
