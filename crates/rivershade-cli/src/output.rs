// ABOUTME: Plain-text rendering of command results.
// ABOUTME: Kept free of I/O so the formats can be tested.

use rivershade_core::scheme::{SchemeInfo, SchemeSource};
use rivershade_core::{ApplyOutcome, ColorKeyMap, ConfigTarget, PerceptualVariants, RemoveOutcome, RemoveReport};

fn join_targets(targets: &[ConfigTarget]) -> String {
    targets
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Lines worth telling the user after an apply, beyond the engine's own notices.
pub fn apply_summary(outcome: &ApplyOutcome) -> Vec<String> {
    match outcome {
        ApplyOutcome::Applied { failed, missing } => {
            let mut lines = Vec::new();
            if !failed.is_empty() {
                lines.push(format!("Could not write colors to: {}", join_targets(failed)));
            }
            if !missing.is_empty() {
                lines.push(format!("Keys not persisted: {}", missing.join(", ")));
            }
            lines
        }
        ApplyOutcome::Declined => vec!["Nothing was changed.".to_string()],
        ApplyOutcome::Aborted => {
            vec!["Another RiverShade operation is in progress. Try again shortly.".to_string()]
        }
        ApplyOutcome::Disabled | ApplyOutcome::Skipped => Vec::new(),
    }
}

pub fn remove_summary(report: &RemoveReport) -> Vec<String> {
    let mut lines = report.guidance.clone();
    if !report.failed.is_empty() {
        lines.push(format!(
            "Could not clear colors from: {}",
            join_targets(&report.failed)
        ));
    }
    if report.outcome == RemoveOutcome::Aborted {
        lines.push("Another RiverShade operation is in progress. Try again shortly.".to_string());
    }
    lines
}

pub fn render_variants(variants: &PerceptualVariants) -> String {
    [
        ("base", &variants.base),
        ("light", &variants.light),
        ("lighter", &variants.lighter),
        ("dark", &variants.dark),
        ("darker", &variants.darker),
        ("saturated", &variants.saturated),
        ("desaturated", &variants.desaturated),
    ]
    .iter()
    .map(|(label, hex)| format!("{label:<13}{hex}"))
    .collect::<Vec<_>>()
    .join("\n")
}

pub fn render_schemes(schemes: &[SchemeInfo]) -> String {
    schemes
        .iter()
        .map(|info| {
            let source = match info.source {
                SchemeSource::Bundled => "bundled",
                SchemeSource::User => "user",
            };
            format!("{:<15}{}", info.name, source)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_colors(colors: &ColorKeyMap) -> String {
    let width = colors.keys().map(String::len).max().unwrap_or(0) + 2;
    colors
        .iter()
        .map(|(key, value)| format!("{key:<width$}{value}"))
        .collect::<Vec<_>>()
        .join("\n")
}
