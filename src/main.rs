//! Relman - release manifests, change detection and chart bumping.
//!
//! Each subcommand is one CI step. Machine-readable output goes to stdout,
//! logs go to stderr.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use relman::core::{ApplicationRecord, Config};
use relman::detect::{decode_shell_arg, detect_changes, ReleaseValues};
use relman::manifest::{diff_releases, read_manifest, ManifestWriter};
use relman::ChartUpdater;

/// Release manifests, change detection and chart bumping for multi-app deployments
#[derive(Parser)]
#[command(name = "relman")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to .relman.toml, then ~/.config/relman/config.toml)
    #[arg(short, long, global = true, env = "RELMAN_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect which applications changed in this run
    Detect {
        /// Read application values from a dotenv file (environment wins)
        #[arg(long)]
        env_file: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = DetectFormat::Shell)]
        format: DetectFormat,
    },

    /// Write the release manifest and its latest alias
    Manifest {
        /// Release identifier (defaults to the configured release variable)
        #[arg(short, long)]
        release: Option<String>,

        /// Workspace root containing the application directories
        #[arg(long)]
        root: Option<PathBuf>,

        /// Directory receiving the manifests
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Apply changed application versions to the deployment chart
    Chart {
        /// Record list printed by `relman detect`
        records: String,

        /// Release identifier written to appVersion (defaults to the configured release variable)
        #[arg(short, long)]
        release: Option<String>,

        /// Path to values.yaml
        #[arg(long)]
        values: Option<PathBuf>,

        /// Path to Chart.yaml
        #[arg(long)]
        chart: Option<PathBuf>,

        /// Show the planned edits without writing
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show the deployments that change between two release manifests
    Diff {
        /// Manifest of the running release
        old: PathBuf,

        /// Manifest of the target release
        new: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = DiffFormat::Text)]
        format: DiffFormat,
    },

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Output format of `relman detect`.
#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DetectFormat {
    /// Two shell-safe words: changed list and record list
    Shell,
    /// One pretty JSON object
    Json,
}

/// Output format of `relman diff`.
#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DiffFormat {
    /// One line per deployment
    Text,
    /// The full diff as pretty JSON
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose { EnvFilter::new("debug") } else { EnvFilter::new("warn") };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Detect { env_file, format } => {
            let config = load_config(cli.config.as_deref())?;
            cmd_detect(&config, env_file.as_deref(), format)?;
        }
        Commands::Manifest { release, root, output_dir } => {
            let config = load_config(cli.config.as_deref())?;
            cmd_manifest(&config, release, root, output_dir)?;
        }
        Commands::Chart { records, release, values, chart, dry_run } => {
            let config = load_config(cli.config.as_deref())?;
            cmd_chart(&config, &records, release, values, chart, dry_run)?;
        }
        Commands::Diff { old, new, format } => {
            let config = load_config(cli.config.as_deref())?;
            cmd_diff(&config, &old, &new, format)?;
        }
        Commands::Config { path } => {
            cmd_config(cli.config.as_deref(), path)?;
        }
        Commands::Completions { shell } => {
            cmd_completions(shell);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Config::load().context("Failed to load config"),
    }
}

/// Resolve the release identifier from the flag or the configured variable.
fn resolve_release(config: &Config, flag: Option<String>) -> Result<String> {
    if let Some(release) = flag.filter(|r| !r.trim().is_empty()) {
        return Ok(release);
    }

    std::env::var(&config.general.release_env)
        .ok()
        .filter(|r| !r.trim().is_empty())
        .with_context(|| {
            format!("No release identifier: pass --release or set {}", config.general.release_env)
        })
}

/// Detect changed applications.
fn cmd_detect(config: &Config, env_file: Option<&Path>, format: DetectFormat) -> Result<()> {
    let apps = config.applications();
    let values = match env_file {
        Some(path) => ReleaseValues::from_env_file(path, &apps)?,
        None => ReleaseValues::from_env(&apps),
    };

    let changes = detect_changes(&apps, &values, &config.general.sentinel)?;
    tracing::info!(changed = changes.changed.len(), total = apps.len(), "Detected changes");

    match format {
        DetectFormat::Shell => println!("{}", changes.to_shell_line()?),
        DetectFormat::Json => println!("{}", serde_json::to_string_pretty(&changes)?),
    }

    Ok(())
}

/// Write the release manifest.
fn cmd_manifest(
    config: &Config,
    release: Option<String>,
    root: Option<PathBuf>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let release = resolve_release(config, release)?;
    let root = root.unwrap_or_else(|| config.manifest_root());
    let output_dir = output_dir.unwrap_or_else(|| config.manifest_output_dir());

    let writer = ManifestWriter::new(root, output_dir)
        .with_latest_name(&config.manifest.latest_name)
        .with_version_file(&config.manifest.version_file);
    let paths = writer.run(&config.apps.dirs, &release)?;

    println!("{}", paths.stamped.display());
    println!("{}", paths.latest.display());
    Ok(())
}

/// Update the deployment chart.
fn cmd_chart(
    config: &Config,
    records: &str,
    release: Option<String>,
    values: Option<PathBuf>,
    chart: Option<PathBuf>,
    dry_run: bool,
) -> Result<()> {
    let release = resolve_release(config, release)?;
    let records: Vec<ApplicationRecord> =
        decode_shell_arg(records).context("Failed to parse record list")?;

    let mut updater = ChartUpdater::from_config(config);
    if let Some(values) = values {
        updater = updater.with_values_path(values);
    }
    if let Some(chart) = chart {
        updater = updater.with_chart_path(chart);
    }

    if dry_run {
        let update = updater.plan(&records, &release)?;
        for edit in update.tag_edits() {
            println!("{}: {} = {}", updater.values_path().display(), edit.dotted_path(), edit.value);
        }
        for application in update.skipped() {
            println!("skip {application} (exempt)");
        }
        println!(
            "{}: version = {} (was {}), appVersion = {}",
            updater.chart_path().display(),
            update.descriptor.version,
            update.descriptor.previous,
            update.descriptor.app_version
        );
        return Ok(());
    }

    let update = updater.run(&records, &release)?;
    println!("{}", update.descriptor.version);
    Ok(())
}

/// Compare two release manifests.
fn cmd_diff(config: &Config, old: &Path, new: &Path, format: DiffFormat) -> Result<()> {
    let old = read_manifest(old)?;
    let new = read_manifest(new)?;
    let diff = diff_releases(&old, &new, &config.deploy);

    match format {
        DiffFormat::Json => {
            let json = serde_json::to_string_pretty(&diff)?;
            println!("{json}");
        }
        DiffFormat::Text => {
            for update in &diff.updates {
                println!("{} -> {}", update.deployment_name, update.image);
            }
            if let Some(tag) = &diff.api_server_tag {
                println!("api servers -> {tag}");
            }
            if diff.is_empty() {
                println!("No changes between {} and {}", old.release, new.release);
            }
        }
    }

    Ok(())
}

/// Show configuration.
fn cmd_config(explicit: Option<&Path>, show_path: bool) -> Result<()> {
    if show_path {
        match explicit.map(Path::to_path_buf).or_else(Config::active_path) {
            Some(path) => println!("{}", path.display()),
            None => println!("(defaults)"),
        }
        return Ok(());
    }

    let config = load_config(explicit)?;
    let toml = toml::to_string_pretty(&config)?;
    println!("{toml}");

    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "relman", &mut io::stdout());
}
