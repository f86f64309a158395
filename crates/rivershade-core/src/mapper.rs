// ABOUTME: Maps a palette onto the allow-listed workbench color keys.
// ABOUTME: Borders are blended toward the inactive background; toggles gate whole key families.

use crate::color::{adjust_lightness, blend, LIGHTNESS_STEP};
use crate::palette::Palette;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Editor color key to hex color. Ordered so identical input serializes identically.
pub type ColorKeyMap = BTreeMap<String, String>;

/// Foreground used when the palette carries no neutral foreground token.
pub const DEFAULT_FOREGROUND: &str = "#ffffff";

/// Inactive background used when the palette carries no neutral background token.
pub const DEFAULT_INACTIVE_BACKGROUND: &str = "#0f0f0f";

/// How far borders are pulled toward the inactive background.
pub const BORDER_BLEND: f64 = 0.8;

/// Every key this extension may write to `workbench.colorCustomizations`.
pub const ALLOWED_KEYS: &[&str] = &[
    "titleBar.activeBackground",
    "titleBar.activeForeground",
    "titleBar.inactiveBackground",
    "titleBar.inactiveForeground",
    "titleBar.border",
    "quickInputTitle.background",
    "quickInputTitle.foreground",
    "quickInputTitle.inactiveBackground",
    "quickInputTitle.inactiveForeground",
    "peekViewTitle.background",
    "peekViewTitle.inactiveBackground",
    "peekViewTitleLabel.foreground",
    "peekViewTitleLabel.inactiveForeground",
    "editorWidget.background",
    "editorWidget.inactiveBackground",
    "activityBar.background",
    "activityBar.foreground",
    "activityBar.border",
    "activityBar.dropBorder",
    "statusBar.background",
    "statusBar.foreground",
    "statusBar.noFolderBackground",
    "statusBar.border",
    "sideBar.border",
    "panel.border",
    "editorGroup.border",
    "sash.hoverBorder",
    "panel.dropBorder",
    "list.dropBackground",
    "sideBar.dropBackground",
    "rivershade.baseColor",
    "rivershade.darkVariant",
    "rivershade.lightVariant",
];

const BORDER_KEYS: &[&str] = &[
    "titleBar.border",
    "activityBar.border",
    "panel.border",
    "sideBar.border",
    "statusBar.border",
    "editorGroup.border",
];

const ACCENT_KEYS: &[&str] = &[
    "sash.hoverBorder",
    "panel.dropBorder",
    "activityBar.dropBorder",
    "list.dropBackground",
    "sideBar.dropBackground",
];

/// Which chrome families the user wants recolored. All default to on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Toggles {
    #[serde(rename = "toggleTitleBar")]
    pub title_bar: bool,
    #[serde(rename = "toggleActivityBar")]
    pub activity_bar: bool,
    #[serde(rename = "toggleStatusBar")]
    pub status_bar: bool,
}

impl Default for Toggles {
    fn default() -> Self {
        Self::all()
    }
}

impl Toggles {
    pub fn all() -> Self {
        Self {
            title_bar: true,
            activity_bar: true,
            status_bar: true,
        }
    }

    /// True when the key's family is enabled. Keys outside the three families are never gated.
    pub fn allows(&self, key: &str) -> bool {
        match KeyFamily::of(key) {
            KeyFamily::TitleBar => self.title_bar,
            KeyFamily::ActivityBar => self.activity_bar,
            KeyFamily::StatusBar => self.status_bar,
            KeyFamily::Chrome => true,
        }
    }
}

/// Gating family of a color key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    TitleBar,
    ActivityBar,
    StatusBar,
    Chrome,
}

impl KeyFamily {
    pub fn of(key: &str) -> Self {
        if key.starts_with("titleBar.")
            || key.starts_with("quickInputTitle.")
            || key.starts_with("peekViewTitle")
            || key.starts_with("editorWidget.")
        {
            KeyFamily::TitleBar
        } else if key.starts_with("activityBar.") {
            KeyFamily::ActivityBar
        } else if key.starts_with("statusBar.") {
            KeyFamily::StatusBar
        } else {
            KeyFamily::Chrome
        }
    }
}

/// True when `key` is on the allow-list.
pub fn is_allowed_key(key: &str) -> bool {
    ALLOWED_KEYS.contains(&key)
}

/// Keep only allow-listed keys. Anything else is dropped silently.
pub fn filter_allowed_keys(mapping: ColorKeyMap) -> ColorKeyMap {
    mapping
        .into_iter()
        .filter(|(key, _)| is_allowed_key(key))
        .collect()
}

/// Derive the full chrome color set from a palette.
///
/// Tokens missing from the palette simply leave their keys out. The result
/// contains only allow-listed keys from enabled families.
pub fn map_palette_to_colors(palette: &Palette, toggles: &Toggles) -> ColorKeyMap {
    let palette = palette.normalized();
    if !palette.is_valid() {
        return ColorKeyMap::new();
    }
    let primary = palette.theme_primary.as_deref();
    let secondary = palette.theme_secondary.as_deref();
    let tertiary = palette.theme_tertiary.as_deref();

    let foreground = palette
        .neutrals
        .neutral_primary
        .as_deref()
        .unwrap_or(DEFAULT_FOREGROUND);
    let inactive_foreground = palette
        .neutrals
        .neutral_secondary
        .as_deref()
        .unwrap_or(foreground);
    let inactive_background = palette
        .neutrals
        .neutral_lighter
        .as_deref()
        .unwrap_or(DEFAULT_INACTIVE_BACKGROUND);

    let mut out = ColorKeyMap::new();
    let mut set = |key: &str, value: Option<&str>| {
        if let Some(value) = value {
            out.insert(key.to_string(), value.to_string());
        }
    };

    for key in [
        "titleBar.activeBackground",
        "quickInputTitle.background",
        "peekViewTitle.background",
        "editorWidget.background",
        "statusBar.background",
    ] {
        set(key, primary);
    }
    set("activityBar.background", secondary.or(primary));

    for key in [
        "titleBar.activeForeground",
        "quickInputTitle.foreground",
        "peekViewTitleLabel.foreground",
        "activityBar.foreground",
        "statusBar.foreground",
    ] {
        set(key, Some(foreground));
    }
    for key in [
        "titleBar.inactiveForeground",
        "quickInputTitle.inactiveForeground",
        "peekViewTitleLabel.inactiveForeground",
    ] {
        set(key, Some(inactive_foreground));
    }
    for key in [
        "titleBar.inactiveBackground",
        "quickInputTitle.inactiveBackground",
        "peekViewTitle.inactiveBackground",
        "editorWidget.inactiveBackground",
        "statusBar.noFolderBackground",
    ] {
        set(key, Some(inactive_background));
    }

    let border_source = secondary.or(tertiary).or(primary);
    let border = border_source.map(|source| blend(source, inactive_background, BORDER_BLEND));
    for key in BORDER_KEYS {
        set(key, border.as_deref());
    }

    let accent = tertiary.or(secondary).or(primary);
    for key in ACCENT_KEYS {
        set(key, accent);
    }

    set("rivershade.baseColor", primary);
    let dark = secondary
        .map(str::to_string)
        .or_else(|| primary.map(|p| adjust_lightness(p, -LIGHTNESS_STEP)));
    set("rivershade.darkVariant", dark.as_deref());
    let light = tertiary
        .map(str::to_string)
        .or_else(|| primary.map(|p| adjust_lightness(p, LIGHTNESS_STEP)));
    set("rivershade.lightVariant", light.as_deref());

    filter_allowed_keys(out)
        .into_iter()
        .filter(|(key, _)| toggles.allows(key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::Neutrals;

    fn full_palette() -> Palette {
        Palette::new(Some("#7A4CCF"), Some("#5b2fa6"), Some("#9B63E6"))
    }

    #[test]
    fn test_primary_only_palette() {
        let out = map_palette_to_colors(&Palette::from_primary("#49124b"), &Toggles::all());
        assert_eq!(out["titleBar.activeBackground"], "#49124b");
        assert_eq!(out["activityBar.background"], "#49124b");
        assert_eq!(out["statusBar.background"], "#49124b");
        assert_eq!(out["titleBar.activeForeground"], DEFAULT_FOREGROUND);
        assert_eq!(out["titleBar.inactiveBackground"], DEFAULT_INACTIVE_BACKGROUND);
        assert_eq!(out["sash.hoverBorder"], "#49124b");
    }

    #[test]
    fn test_secondary_drives_activity_bar_and_borders() {
        let out = map_palette_to_colors(&full_palette(), &Toggles::all());
        assert_eq!(out["activityBar.background"], "#5b2fa6");
        let expected = blend("#5b2fa6", DEFAULT_INACTIVE_BACKGROUND, BORDER_BLEND);
        for key in BORDER_KEYS {
            assert_eq!(out[*key], expected, "{key}");
        }
        assert_ne!(expected, "#5b2fa6");
    }

    #[test]
    fn test_accents_use_tertiary_unblended() {
        let out = map_palette_to_colors(&full_palette(), &Toggles::all());
        for key in ACCENT_KEYS {
            assert_eq!(out[*key], "#9b63e6", "{key}");
        }

        let no_tertiary = Palette::new(Some("#7a4ccf"), Some("#5b2fa6"), None);
        let out = map_palette_to_colors(&no_tertiary, &Toggles::all());
        assert_eq!(out["sash.hoverBorder"], "#5b2fa6");
    }

    #[test]
    fn test_neutral_tokens_override_defaults() {
        let palette = full_palette().with_neutrals(Neutrals {
            neutral_primary: Some("#E6E1F1".to_string()),
            neutral_secondary: Some("#cfc6e6".to_string()),
            neutral_lighter: Some("#34283a".to_string()),
        });
        let out = map_palette_to_colors(&palette, &Toggles::all());
        assert_eq!(out["titleBar.activeForeground"], "#e6e1f1");
        assert_eq!(out["titleBar.inactiveForeground"], "#cfc6e6");
        assert_eq!(out["titleBar.inactiveBackground"], "#34283a");
        assert_eq!(
            out["panel.border"],
            blend("#5b2fa6", "#34283a", BORDER_BLEND)
        );
    }

    #[test]
    fn test_output_is_subset_of_allow_list() {
        let palettes = [
            Palette::default(),
            Palette::from_primary("#0f8"),
            full_palette(),
            Palette::new(None, None, Some("#abc")),
        ];
        for palette in palettes {
            for key in map_palette_to_colors(&palette, &Toggles::all()).keys() {
                assert!(is_allowed_key(key), "{key} not allowed");
            }
        }
    }

    #[test]
    fn test_empty_palette_maps_no_theme_keys() {
        let out = map_palette_to_colors(&Palette::default(), &Toggles::all());
        assert!(out.is_empty());

        let neutrals_only = Palette::new(Some("  "), None, None).with_neutrals(Neutrals {
            neutral_primary: Some("#eeeeee".to_string()),
            ..Default::default()
        });
        assert!(map_palette_to_colors(&neutrals_only, &Toggles::all()).is_empty());
    }

    #[test]
    fn test_toggles_omit_disabled_families() {
        let toggles = Toggles {
            title_bar: false,
            activity_bar: true,
            status_bar: false,
        };
        let out = map_palette_to_colors(&full_palette(), &toggles);
        assert!(out.keys().all(|k| !k.starts_with("titleBar.")));
        assert!(out.keys().all(|k| !k.starts_with("statusBar.")));
        assert!(!out.contains_key("editorWidget.background"));
        assert!(!out.contains_key("peekViewTitleLabel.foreground"));
        assert!(out.contains_key("activityBar.background"));
        assert!(out.contains_key("panel.border"));
    }

    #[test]
    fn test_mapping_is_deterministic_and_normalization_invariant() {
        let raw = Palette::new(Some("#7A4CCF"), Some("5B2FA6"), Some("#9b63e6"));
        let once = raw.normalized();
        let twice = once.normalized();
        let a = map_palette_to_colors(&once, &Toggles::all());
        let b = map_palette_to_colors(&twice, &Toggles::all());
        let c = map_palette_to_colors(&raw, &Toggles::all());
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_filter_allowed_keys_drops_unknown() {
        let mut mapping = ColorKeyMap::new();
        mapping.insert("titleBar.activeBackground".to_string(), "#fff".to_string());
        mapping.insert("unrelated.key".to_string(), "#000".to_string());
        let out = filter_allowed_keys(mapping);
        assert_eq!(out.len(), 1);
        assert_eq!(out["titleBar.activeBackground"], "#fff");
    }

    #[test]
    fn test_key_families() {
        assert_eq!(KeyFamily::of("peekViewTitleLabel.foreground"), KeyFamily::TitleBar);
        assert_eq!(KeyFamily::of("activityBar.dropBorder"), KeyFamily::ActivityBar);
        assert_eq!(KeyFamily::of("statusBar.border"), KeyFamily::StatusBar);
        assert_eq!(KeyFamily::of("sash.hoverBorder"), KeyFamily::Chrome);
    }

    #[test]
    fn test_toggles_deserialize_with_defaults() {
        let toggles: Toggles = serde_json::from_str(r#"{"toggleStatusBar": false}"#).unwrap();
        assert!(toggles.title_bar);
        assert!(toggles.activity_bar);
        assert!(!toggles.status_bar);
    }
}
