// ABOUTME: Entry point for the rivershade command.
// ABOUTME: Wires the file-backed host into the engine and dispatches install, remove, preview and friends.

mod config;
mod error;
mod notifier;
mod output;
mod store;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use config::{Config, Overrides};
use dialoguer::theme::ColorfulTheme;
use notifier::ConsoleNotifier;
use rivershade_core::{
    normalize_color, ApplyEngine, ColorSchemeStore, ConfigStore, Host, Palette,
    PerceptualVariants,
};
use std::path::PathBuf;
use std::sync::Arc;
use store::{FileConfigStore, FileStateStore};
use tracing::info;

#[derive(Parser)]
#[command(name = "rivershade")]
#[command(about = "Tint the editor's title, activity and status bars")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.config/rivershade/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// User settings.json
    #[arg(long, global = true)]
    user_settings: Option<PathBuf>,

    /// Workspace root; its settings live in .vscode/settings.json
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    /// Workspace folder root (repeatable)
    #[arg(long = "folder", global = true)]
    folders: Vec<PathBuf>,

    /// Extension state file
    #[arg(long = "state", global = true)]
    state_file: Option<PathBuf>,

    /// Directory of user color schemes
    #[arg(long, global = true)]
    schemes_dir: Option<PathBuf>,

    /// Answer yes to every prompt
    #[arg(short, long, global = true)]
    yes: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the configured color scheme into settings
    Install,

    /// Remove RiverShade colors from every scope
    Remove,

    /// Re-apply the configured scheme
    Toggle,

    /// Print the engine's view of settings and state
    Diagnose,

    /// Preview a palette live, then keep or revert it
    Preview {
        /// Primary theme color
        #[arg(long)]
        primary: Option<String>,

        /// Secondary theme color
        #[arg(long)]
        secondary: Option<String>,

        /// Tertiary theme color
        #[arg(long)]
        tertiary: Option<String>,

        /// Bundled palette preset (e.g. fluent-purple)
        #[arg(long, conflicts_with_all = ["primary", "secondary", "tertiary"])]
        preset: Option<String>,
    },

    /// Print perceptual variants of a color
    Palette {
        /// Hex color (#rgb or #rrggbb)
        color: String,
    },

    /// List bundled and user color schemes
    Schemes,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            config: self.config.clone(),
            user_settings: self.user_settings.clone(),
            workspace: self.workspace.clone(),
            folders: self.folders.clone(),
            state_file: self.state_file.clone(),
            schemes_dir: self.schemes_dir.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The preview prompt owns the terminal; keep its trace out of the way.
    if matches!(cli.command, Commands::Preview { .. }) {
        rivershade_log::init_file("preview");
    } else {
        rivershade_log::init_verbose(cli.verbose);
    }

    let config = Config::load(&cli.overrides()).context("Failed to load config")?;

    match &cli.command {
        Commands::Install => run_install(&cli, &config).await,
        Commands::Remove => run_remove(&cli, &config).await,
        Commands::Toggle => run_toggle(&cli, &config).await,
        Commands::Diagnose => run_diagnose(&cli, &config).await,
        Commands::Preview {
            primary,
            secondary,
            tertiary,
            preset,
        } => {
            let palette = match preset {
                Some(name) => Palette::preset(name)
                    .with_context(|| format!("Unknown palette preset '{name}'"))?,
                None => Palette::new(primary.as_deref(), secondary.as_deref(), tertiary.as_deref()),
            };
            run_preview(&cli, &config, palette).await
        }
        Commands::Palette { color } => run_palette(color),
        Commands::Schemes => run_schemes(&config),
    }
}

fn scheme_store(config: &Config) -> Result<ColorSchemeStore> {
    Ok(ColorSchemeStore::new().with_user_dir(config.schemes_path()?))
}

async fn build_engine(cli: &Cli, config: &Config) -> Result<ApplyEngine> {
    let settings: Arc<dyn ConfigStore> = Arc::new(FileConfigStore::new(
        config.user_settings_path()?,
        config.paths.workspace.as_deref(),
        &config.paths.folders,
    ));
    let state = FileStateStore::open(config.state_path()?)
        .await
        .context("Failed to open state file")?;
    let host = Host::with_settings_theme(
        settings,
        Arc::new(state),
        Arc::new(ConsoleNotifier::new(cli.yes)),
    );

    Ok(ApplyEngine::new(host)
        .with_schemes(scheme_store(config)?)
        .with_retry_policy(config.retry_policy())
        .with_preview_delay(config.preview_delay()))
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{line}");
    }
}

async fn run_install(cli: &Cli, config: &Config) -> Result<()> {
    let engine = build_engine(cli, config).await?;
    let outcome = engine
        .install_colors()
        .await
        .context("Failed to install colors")?;
    print_lines(output::apply_summary(&outcome));
    Ok(())
}

async fn run_remove(cli: &Cli, config: &Config) -> Result<()> {
    let engine = build_engine(cli, config).await?;
    let report = engine
        .remove_colors()
        .await
        .context("Failed to remove colors")?;
    print_lines(output::remove_summary(&report));
    Ok(())
}

async fn run_toggle(cli: &Cli, config: &Config) -> Result<()> {
    let engine = build_engine(cli, config).await?;
    let outcome = engine.toggle().await.context("Failed to apply colors")?;
    print_lines(output::apply_summary(&outcome));
    Ok(())
}

async fn run_diagnose(cli: &Cli, config: &Config) -> Result<()> {
    let engine = build_engine(cli, config).await?;
    let diagnostics = engine.diagnose().await;
    println!("{}", serde_json::to_string_pretty(&diagnostics)?);
    Ok(())
}

async fn run_preview(cli: &Cli, config: &Config, palette: Palette) -> Result<()> {
    if !palette.is_valid() {
        bail!("A preview needs at least one valid color: --primary, --secondary, --tertiary or --preset");
    }

    let engine = build_engine(cli, config).await?;
    let mut session = engine
        .open_preview()
        .await
        .context("Failed to start preview")?;

    let colors = session.preview(&palette);
    tokio::time::sleep(config.preview_delay() * 2).await;
    println!("{}", output::render_colors(&colors));
    println!();

    let keep = if cli.yes { Ok(true) } else { ask_keep().await };

    match keep {
        Ok(true) => {
            session.apply(&palette).await.context("Failed to keep preview")?;
            info!(keys = colors.len(), "preview kept");
            println!("Preview kept.");
        }
        Ok(false) => {
            session.cancel().await.context("Failed to revert preview")?;
            println!("Preview reverted.");
        }
        Err(e) => {
            session.cancel().await.context("Failed to revert preview")?;
            return Err(e);
        }
    }

    let current = session.sync().await;
    tracing::debug!(colors = %current, "settings after preview");
    Ok(())
}

async fn ask_keep() -> Result<bool> {
    let choice = tokio::task::spawn_blocking(|| {
        dialoguer::Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Keep these colors?")
            .items(&["Keep", "Revert"])
            .default(0)
            .interact()
    })
    .await??;
    Ok(choice == 0)
}

/// Variants of `color`, accepting the short `#rgb` form.
fn palette_variants(color: &str) -> rivershade_core::Result<PerceptualVariants> {
    let normalized = normalize_color(Some(color)).unwrap_or_default();
    PerceptualVariants::from_base(&normalized)
}

fn run_palette(color: &str) -> Result<()> {
    let variants = palette_variants(color)?;
    println!("{}", output::render_variants(&variants));
    Ok(())
}

fn run_schemes(config: &Config) -> Result<()> {
    println!("{}", output::render_schemes(&scheme_store(config)?.available()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_accepts_short_hex() {
        let short = palette_variants("#0f8").unwrap();
        assert_eq!(short.base, "#00ff88");
        assert_eq!(short, palette_variants("00FF88").unwrap());
    }

    #[test]
    fn test_palette_rejects_non_hex() {
        assert!(palette_variants("teal").is_err());
        assert!(palette_variants("").is_err());
    }
}
