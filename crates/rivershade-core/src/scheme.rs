// ABOUTME: Named color schemes: bundled JSON definitions plus an optional user directory.
// ABOUTME: A scheme is either a flat color key map or a palette that goes through the mapper.

use crate::error::{Result, RiverShadeError};
use crate::mapper::{map_palette_to_colors, ColorKeyMap, Toggles};
use crate::palette::Palette;
use crate::settings::ExtensionSettings;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_SCHEME: &str = "default";

const BUNDLED: &[(&str, &str)] = &[
    ("default", include_str!("../colors/default.json")),
    ("fluent-purple", include_str!("../colors/fluent-purple.json")),
];

const TITLE_BAR_KEYS: &[&str] = &[
    "titleBar.activeBackground",
    "titleBar.activeForeground",
    "quickInputTitle.background",
    "quickInputTitle.foreground",
    "peekViewTitle.background",
    "peekViewTitleLabel.foreground",
    "editorWidget.background",
    "titleBar.inactiveBackground",
    "titleBar.inactiveForeground",
    "quickInputTitle.inactiveBackground",
    "quickInputTitle.inactiveForeground",
    "peekViewTitle.inactiveBackground",
    "peekViewTitleLabel.inactiveForeground",
    "editorWidget.inactiveBackground",
];

const ACTIVITY_BAR_KEYS: &[&str] = &["activityBar.background", "activityBar.foreground"];

const STATUS_BAR_KEYS: &[&str] = &[
    "statusBar.background",
    "statusBar.foreground",
    "statusBar.noFolderBackground",
];

const PALETTE_TOKENS: &[&str] = &["themePrimary", "themeSecondary", "themeTertiary"];

/// Parsed scheme file.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemeDefinition {
    Flat(ColorKeyMap),
    Palette(Palette),
}

impl SchemeDefinition {
    /// Parse a scheme file body. Palette-shaped when any theme token is present.
    pub fn parse(json: &str) -> Result<Self> {
        let object: Map<String, Value> =
            serde_json::from_str(json).map_err(|e| RiverShadeError::Scheme(e.to_string()))?;

        if PALETTE_TOKENS.iter().any(|t| object.contains_key(*t)) {
            let palette: Palette = serde_json::from_value(Value::Object(object))
                .map_err(|e| RiverShadeError::Scheme(e.to_string()))?;
            return Ok(SchemeDefinition::Palette(palette));
        }

        let flat = object
            .into_iter()
            .filter_map(|(key, value)| value.as_str().map(|s| (key, s.to_string())))
            .collect();
        Ok(SchemeDefinition::Flat(flat))
    }

    /// Color keys this scheme contributes under `toggles`.
    pub fn colors(&self, toggles: &Toggles) -> ColorKeyMap {
        match self {
            SchemeDefinition::Palette(palette) => map_palette_to_colors(palette, toggles),
            SchemeDefinition::Flat(payload) => {
                let mut families: Vec<&[&str]> = Vec::new();
                if toggles.title_bar {
                    families.push(TITLE_BAR_KEYS);
                }
                if toggles.activity_bar {
                    families.push(ACTIVITY_BAR_KEYS);
                }
                if toggles.status_bar {
                    families.push(STATUS_BAR_KEYS);
                }
                families
                    .into_iter()
                    .flatten()
                    .filter_map(|key| payload.get(*key).map(|v| (key.to_string(), v.clone())))
                    .collect()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemeSource {
    Bundled,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemeInfo {
    pub name: String,
    pub source: SchemeSource,
}

/// Loads schemes by name. The user directory, when set, is searched first.
#[derive(Debug, Clone, Default)]
pub struct ColorSchemeStore {
    user_dir: Option<PathBuf>,
}

impl ColorSchemeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.user_dir = Some(dir.into());
        self
    }

    pub fn user_dir(&self) -> Option<&Path> {
        self.user_dir.as_deref()
    }

    /// Load `name` strictly: missing or unparsable is an error.
    pub fn load(&self, name: &str) -> Result<SchemeDefinition> {
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(RiverShadeError::Scheme(format!("invalid scheme name: {name}")));
        }

        if let Some(dir) = &self.user_dir {
            let path = dir.join(format!("{name}.json"));
            if path.is_file() {
                let body = std::fs::read_to_string(&path).map_err(|e| {
                    RiverShadeError::Scheme(format!("{}: {e}", path.display()))
                })?;
                debug!(path = %path.display(), "loading user scheme");
                return SchemeDefinition::parse(&body);
            }
        }

        BUNDLED
            .iter()
            .find(|(bundled, _)| *bundled == name)
            .ok_or_else(|| RiverShadeError::Scheme(format!("unknown scheme: {name}")))
            .and_then(|(_, body)| SchemeDefinition::parse(body))
    }

    /// Load `name`, falling back to the default scheme.
    pub fn resolve(&self, name: &str) -> SchemeDefinition {
        match self.load(name) {
            Ok(scheme) => scheme,
            Err(e) => {
                if name != DEFAULT_SCHEME {
                    warn!(scheme = name, error = %e, "falling back to default scheme");
                }
                self.load(DEFAULT_SCHEME).unwrap_or_else(|e| {
                    warn!(error = %e, "default scheme unavailable");
                    SchemeDefinition::Flat(ColorKeyMap::new())
                })
            }
        }
    }

    pub fn resolve_colors(&self, name: &str, toggles: &Toggles) -> ColorKeyMap {
        self.resolve(name).colors(toggles)
    }

    /// The alias-resolved scheme name from settings.
    pub fn scheme_name(settings: &ExtensionSettings) -> String {
        let name = settings.color_scheme.trim();
        if name.is_empty() {
            DEFAULT_SCHEME.to_string()
        } else {
            name.to_string()
        }
    }

    /// Every loadable scheme name. User schemes shadow bundled ones.
    pub fn available(&self) -> Vec<SchemeInfo> {
        let mut out: Vec<SchemeInfo> = Vec::new();

        if let Some(dir) = &self.user_dir {
            if let Ok(entries) = std::fs::read_dir(dir) {
                let mut names: Vec<String> = entries
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.path())
                    .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
                    .filter_map(|path| path.file_stem()?.to_str().map(str::to_string))
                    .collect();
                names.sort();
                out.extend(names.into_iter().map(|name| SchemeInfo {
                    name,
                    source: SchemeSource::User,
                }));
            }
        }

        for (name, _) in BUNDLED {
            if !out.iter().any(|info| info.name == *name) {
                out.push(SchemeInfo {
                    name: name.to_string(),
                    source: SchemeSource::Bundled,
                });
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_bundled_schemes_parse() {
        let store = ColorSchemeStore::new();
        assert!(matches!(
            store.load("default").unwrap(),
            SchemeDefinition::Flat(_)
        ));
        assert!(matches!(
            store.load("fluent-purple").unwrap(),
            SchemeDefinition::Palette(_)
        ));
    }

    #[test]
    fn test_default_scheme_colors() {
        let colors = ColorSchemeStore::new().resolve_colors("default", &Toggles::all());
        assert_eq!(colors["titleBar.activeBackground"], "#49124b");
        assert_eq!(colors["activityBar.background"], "#49124b");
        assert_eq!(colors["statusBar.background"], "#49124b");
        assert_eq!(colors["statusBar.noFolderBackground"], "#0f0f0f");
    }

    #[test]
    fn test_flat_scheme_respects_toggles() {
        let toggles = Toggles {
            title_bar: false,
            activity_bar: true,
            status_bar: false,
        };
        let colors = ColorSchemeStore::new().resolve_colors("default", &toggles);
        assert_eq!(
            colors.keys().cloned().collect::<Vec<_>>(),
            vec!["activityBar.background", "activityBar.foreground"]
        );
    }

    #[test]
    fn test_unknown_scheme_falls_back_to_default() {
        let store = ColorSchemeStore::new();
        assert!(store.load("missing").is_err());
        assert_eq!(
            store.resolve_colors("missing", &Toggles::all()),
            store.resolve_colors("default", &Toggles::all())
        );
    }

    #[test]
    fn test_rejects_path_like_names() {
        let store = ColorSchemeStore::new();
        assert!(store.load("../etc/passwd").is_err());
        assert!(store.load("a/b").is_err());
    }

    #[test]
    fn test_user_dir_shadows_bundled() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("default.json"),
            r##"{"titleBar.activeBackground": "#123456", "unrelated": 5}"##,
        )
        .unwrap();
        fs::write(dir.path().join("ocean.json"), r##"{"themePrimary": "#0077be"}"##).unwrap();
        fs::write(dir.path().join("broken.json"), "{not json").unwrap();

        let store = ColorSchemeStore::new().with_user_dir(dir.path());
        let colors = store.resolve_colors("default", &Toggles::all());
        assert_eq!(colors["titleBar.activeBackground"], "#123456");
        assert!(!colors.contains_key("unrelated"));

        let ocean = store.resolve_colors("ocean", &Toggles::all());
        assert_eq!(ocean["statusBar.background"], "#0077be");

        // Unparsable user scheme falls back to the user's default.
        assert_eq!(
            store.resolve_colors("broken", &Toggles::all())["titleBar.activeBackground"],
            "#123456"
        );

        let names: Vec<_> = store.available().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["broken", "default", "ocean", "fluent-purple"]);
    }

    #[test]
    fn test_scheme_name_defaults_when_blank() {
        let mut settings = ExtensionSettings::default();
        settings.color_scheme = "  ".to_string();
        assert_eq!(ColorSchemeStore::scheme_name(&settings), "default");
        settings.color_scheme = "fluent-purple".to_string();
        assert_eq!(ColorSchemeStore::scheme_name(&settings), "fluent-purple");
    }
}
