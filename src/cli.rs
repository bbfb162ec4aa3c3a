use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::LoaderConfig;
use crate::site::SiteConfig;
use crate::startup::{LoadStatus, LoadingSession, ResourceStatus, SessionReport};

/// startgate - gate application start-up behind its loading resources
#[derive(Parser)]
#[command(name = "startgate")]
#[command(about = "Load startup resources with smoothed progress and a watchdog")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register the site's startup resources and load them
    Run(RunArgs),
    /// Write a loader configuration file with default values
    InitConfig(InitConfigArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Site configuration document (TOML or JSON)
    pub site: PathBuf,

    /// Loader configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory relative resource URLs resolve against (defaults to the site file's directory)
    #[arg(long)]
    pub asset_root: Option<PathBuf>,

    /// Override the watchdog ceiling in milliseconds
    #[arg(long)]
    pub watchdog_ms: Option<u64>,

    /// Print the final summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Do not draw the progress bar
    #[arg(long)]
    pub quiet: bool,
}

#[derive(Args)]
pub struct InitConfigArgs {
    /// Destination (defaults to the user configuration directory)
    pub path: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

pub struct CliHandler;

impl CliHandler {
    pub fn new() -> Self {
        Self
    }

    pub async fn handle_command(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Run(args) => self.handle_run(args).await,
            Commands::InitConfig(args) => self.handle_init_config(args).await,
        }
    }

    async fn handle_run(&self, args: RunArgs) -> Result<()> {
        let config = self.resolve_config(&args).await?;
        let site = SiteConfig::load(&args.site).await?;
        tracing::info!("Starting '{}'", site.title_or_default());

        let session = LoadingSession::with_signals(config, None, None);
        session.register_startup_resources(&site).await;

        let bar = (!args.quiet).then(create_progress_bar);
        let renderer = bar.clone().map(|bar| tokio::spawn(render_progress(bar, session_views(&session))));

        let report = session.start().await;

        if let Some(renderer) = renderer {
            renderer.abort();
        }
        if let Some(bar) = bar {
            bar.set_position(1000);
            bar.finish_with_message("ready");
        }

        if args.json {
            println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
        } else {
            print_summary(&report);
        }

        Ok(())
    }

    async fn handle_init_config(&self, args: InitConfigArgs) -> Result<()> {
        let path = match args.path {
            Some(path) => path,
            None => LoaderConfig::default_path().context("No user configuration directory available")?,
        };

        if path.exists() && !args.force {
            println!("⚠️  {} already exists, use --force to overwrite", path.display());
            return Ok(());
        }

        LoaderConfig::default().save_to_file(&path).await?;
        println!("✅ Wrote default loader configuration to {}", path.display());
        Ok(())
    }

    async fn resolve_config(&self, args: &RunArgs) -> Result<LoaderConfig> {
        let mut config = match args.config.clone().or_else(LoaderConfig::default_path) {
            Some(path) => LoaderConfig::load_from_file(&path).await?,
            None => LoaderConfig::default(),
        };

        if let Some(root) = &args.asset_root {
            config.asset_root = Some(root.clone());
        } else if config.asset_root.is_none() {
            config.asset_root = args.site.parent().map(Path::to_path_buf);
        }

        // The config resource re-fetches the document we were given
        if let Some(name) = args.site.file_name().and_then(|name| name.to_str()) {
            config.site_config_url = name.to_string();
        }

        if let Some(watchdog_ms) = args.watchdog_ms {
            config.watchdog_ms = watchdog_ms;
        }

        config.validate()?;
        Ok(config)
    }
}

impl Default for CliHandler {
    fn default() -> Self {
        Self::new()
    }
}

type Views = (
    tokio::sync::watch::Receiver<crate::startup::PresenterView>,
    tokio::sync::watch::Receiver<LoadStatus>,
);

fn session_views(session: &LoadingSession) -> Views {
    (session.presenter().subscribe(), session.loader().subscribe())
}

fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(1000);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Loading...");
    pb
}

async fn render_progress(bar: ProgressBar, (mut views, status): Views) {
    loop {
        let view = *views.borrow_and_update();
        let loaded = status.borrow().loaded;
        let total = status.borrow().total;

        bar.set_position((view.percent * 1000.0).round() as u64);
        bar.set_message(format!("{}/{} resources", loaded, total));

        if view.ready || views.changed().await.is_err() {
            break;
        }
    }
}

fn print_summary(report: &SessionReport) {
    let status = &report.status;
    println!(
        "{} {}/{} resources settled in {:?}",
        if report.forced { "⏰" } else { "✅" },
        status.loaded,
        status.total,
        report.elapsed
    );

    for resource in &status.resources {
        let timing = resource
            .duration()
            .map(|duration| format!(" ({:?})", duration))
            .unwrap_or_default();
        match (&resource.status, &resource.failure) {
            (ResourceStatus::Error, Some(failure)) => {
                println!("  {} {}{}: {}", resource.status.status_icon(), resource.id, timing, failure)
            }
            _ => println!("  {} {}{}", resource.status.status_icon(), resource.id, timing),
        }
    }
}

pub fn report_json(report: &SessionReport) -> serde_json::Value {
    let status = &report.status;
    let resources: Vec<serde_json::Value> = status
        .resources
        .iter()
        .map(|resource| {
            json!({
                "id": resource.id,
                "url": resource.url,
                "kind": resource.kind,
                "status": resource.status,
                "duration_ms": resource.duration().map(|d| d.as_millis() as u64),
                "size": resource.size_hint,
                "error": resource.failure.as_ref().map(|e| e.to_string()),
            })
        })
        .collect();

    json!({
        "forced": report.forced,
        "elapsed_ms": report.elapsed.as_millis() as u64,
        "loaded": status.loaded,
        "total": status.total,
        "progress": status.progress,
        "is_loading": status.is_loading,
        "is_complete": status.is_complete,
        "resources": resources,
    })
}
