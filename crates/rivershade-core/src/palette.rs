// ABOUTME: Palette model holding the three theme tokens plus optional neutral tokens.
// ABOUTME: Normalizes hex tokens to canonical #rrggbb and validates that a palette is usable.

use serde::{Deserialize, Serialize};

/// Optional Fluent-style neutral tokens used for foregrounds and inactive surfaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Neutrals {
    /// Active foreground (text on the primary surfaces).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neutral_primary: Option<String>,
    /// Inactive foreground.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neutral_secondary: Option<String>,
    /// Inactive background.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neutral_lighter: Option<String>,
}

/// A small user palette. Only the derived color keys are ever persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Palette {
    pub theme_primary: Option<String>,
    pub theme_secondary: Option<String>,
    pub theme_tertiary: Option<String>,
    #[serde(flatten)]
    pub neutrals: Neutrals,
}

/// Canonicalize a color token.
///
/// Empty input gives `None`. A 3- or 6-digit hex (any case, optional `#`)
/// becomes lowercase `#rrggbb`. Anything else passes through trimmed so
/// that newer color syntaxes survive untouched.
pub fn normalize_color(color: Option<&str>) -> Option<String> {
    let trimmed = color?.trim();
    if trimmed.is_empty() {
        return None;
    }

    let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
    let is_hex = matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit());
    if !is_hex {
        return Some(trimmed.to_string());
    }

    let lower = digits.to_ascii_lowercase();
    let expanded = if lower.len() == 3 {
        lower.chars().flat_map(|c| [c, c]).collect()
    } else {
        lower
    };
    Some(format!("#{expanded}"))
}

fn normalize_field(field: &mut Option<String>) {
    *field = normalize_color(field.as_deref());
}

impl Palette {
    pub fn new(
        theme_primary: Option<&str>,
        theme_secondary: Option<&str>,
        theme_tertiary: Option<&str>,
    ) -> Self {
        Self {
            theme_primary: theme_primary.map(str::to_string),
            theme_secondary: theme_secondary.map(str::to_string),
            theme_tertiary: theme_tertiary.map(str::to_string),
            neutrals: Neutrals::default(),
        }
    }

    /// A palette with only a primary token.
    pub fn from_primary(primary: &str) -> Self {
        Self::new(Some(primary), None, None)
    }

    pub fn with_neutrals(mut self, neutrals: Neutrals) -> Self {
        self.neutrals = neutrals;
        self
    }

    /// Normalize every token in place. Idempotent.
    pub fn normalize(&mut self) -> &mut Self {
        normalize_field(&mut self.theme_primary);
        normalize_field(&mut self.theme_secondary);
        normalize_field(&mut self.theme_tertiary);
        normalize_field(&mut self.neutrals.neutral_primary);
        normalize_field(&mut self.neutrals.neutral_secondary);
        normalize_field(&mut self.neutrals.neutral_lighter);
        self
    }

    /// Normalized copy, leaving `self` untouched.
    pub fn normalized(&self) -> Self {
        let mut copy = self.clone();
        copy.normalize();
        copy
    }

    /// True when at least one theme token is set after normalization.
    pub fn is_valid(&self) -> bool {
        let normalized = self.normalized();
        normalized.theme_primary.is_some()
            || normalized.theme_secondary.is_some()
            || normalized.theme_tertiary.is_some()
    }

    /// Look up a bundled preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        Self::presets()
            .into_iter()
            .find(|(preset, _)| *preset == name)
            .map(|(_, palette)| palette)
    }

    /// Bundled presets, tuned for dark themes.
    pub fn presets() -> Vec<(&'static str, Self)> {
        vec![(
            "fluent-purple",
            Self::new(Some("#7A4CCF"), Some("#5B2FA6"), Some("#9B63E6")).with_neutrals(Neutrals {
                neutral_primary: Some("#E6E1F1".to_string()),
                neutral_secondary: Some("#CFC6E6".to_string()),
                neutral_lighter: Some("#34283A".to_string()),
            }),
        )]
    }
}
