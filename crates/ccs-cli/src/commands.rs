use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use ccs_client::{Invoker, ReqwestTransport};
use ccs_sync::{LayoutSet, SyncEngine, SyncReport};
use ccs_types::ArtifactKind;
use colored::Colorize;
use tracing::debug;

use crate::cli::*;
use crate::config::{resolve, FileConfig, Settings};

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let file = FileConfig::load(&cli.config)?;
    let settings = resolve(&cli, file, &cwd)?;
    debug!(instance = %settings.client.instance, root = %settings.sync.root.display(), "settings resolved");
    let format = cli.format;

    match cli.command {
        Command::Locales => cmd_locales(&settings, format).await,
        Command::Operations(args) => cmd_operations(&settings, args, format).await,
        Command::Grab(args) => {
            let engine = engine(settings).await?;
            let report = if let Some(kind) = args.kind {
                engine.grab_kind(&ArtifactKind::new(kind)?).await?
            } else if let Some(path) = args.path {
                engine.grab_path(&cwd.join(path)).await?
            } else {
                engine.grab_all().await?
            };
            finish("grab", &report, format)
        }
        Command::Put(args) => {
            let engine = engine(settings).await?;
            let paths: Vec<PathBuf> = args.paths.iter().map(|p| cwd.join(p)).collect();
            let report = engine.put_paths(&paths).await?;
            finish("put", &report, format)
        }
        Command::PutAll => {
            let engine = engine(settings).await?;
            let report = engine.put_all().await?;
            finish("put", &report, format)
        }
        Command::Delete(args) => {
            let engine = engine(settings).await?;
            let report = engine.delete_tree(&cwd.join(args.path)).await?;
            finish("delete", &report, format)
        }
    }
}

async fn connect(settings: &Settings) -> anyhow::Result<Invoker> {
    let transport = Arc::new(ReqwestTransport::new()?);
    let invoker = Invoker::connect(&settings.client, transport)
        .await
        .with_context(|| format!("cannot connect to {}", settings.client.instance))?;
    Ok(invoker)
}

async fn engine(settings: Settings) -> anyhow::Result<SyncEngine> {
    if settings.kinds.is_empty() {
        bail!("no artifact kinds configured; add [[kinds]] entries to the config file");
    }
    let invoker = connect(&settings).await?;
    let layouts = LayoutSet::from_configs(settings.kinds)?;
    Ok(SyncEngine::new(Arc::new(invoker), settings.sync, layouts))
}

async fn cmd_locales(settings: &Settings, format: OutputFormat) -> anyhow::Result<()> {
    let invoker = connect(settings).await?;
    let catalog = invoker.locale_catalog().await?;
    let working: Vec<&str> = invoker.locales().map(|s| s.names()).unwrap_or_default();

    if format == OutputFormat::Json {
        let items: Vec<_> = catalog
            .locales
            .iter()
            .map(|l| {
                serde_json::json!({
                    "name": l.name,
                    "aliases": l.aliases,
                    "default": l.name == catalog.default_locale,
                    "working": working.contains(&l.name.as_str()),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    for locale in &catalog.locales {
        let marker = if working.contains(&locale.name.as_str()) { "*".green().bold() } else { " ".normal() };
        let default = if locale.name == catalog.default_locale { " (default)".dimmed() } else { "".normal() };
        let aliases = if locale.aliases.is_empty() {
            String::new()
        } else {
            format!("  aka {}", locale.aliases.join(", "))
        };
        println!("{marker} {}{default}{}", locale.name.bold(), aliases.dimmed());
    }
    Ok(())
}

async fn cmd_operations(settings: &Settings, args: OperationsArgs, format: OutputFormat) -> anyhow::Result<()> {
    let invoker = connect(settings).await?;
    let registry = invoker.registry();

    if !args.probe.is_empty() {
        let mut missing = 0;
        for name in &args.probe {
            if invoker.supports(&[name.as_str()]) {
                println!("{} {}", "✓".green(), name);
            } else {
                println!("{} {}", "✗".red(), name);
                missing += 1;
            }
        }
        if missing > 0 {
            bail!("{missing} operation(s) not supported by this server");
        }
        return Ok(());
    }

    if format == OutputFormat::Json {
        let ops: Vec<_> = registry
            .names()
            .into_iter()
            .filter_map(|name| registry.get(name))
            .map(|d| {
                serde_json::json!({
                    "name": d.name,
                    "method": d.method.as_str(),
                    "url": d.url_template,
                    "optimistic_lock": d.optimistic_lock,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&ops)?);
        return Ok(());
    }

    println!(
        "Server {} ({} operations)",
        invoker.server_version().unwrap_or("unknown version").bold(),
        registry.len()
    );
    for name in registry.names() {
        if let Some(d) = registry.get(name) {
            let lock = if d.optimistic_lock { " [etag]".yellow() } else { "".normal() };
            println!("  {:<6} {} {}{lock}", d.method.as_str().cyan(), name, d.url_template.dimmed());
        }
    }
    Ok(())
}

fn finish(action: &str, report: &SyncReport, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print_report(action, report);
    }
    if !report.is_clean() {
        bail!("{} item(s) failed", report.failed());
    }
    Ok(())
}

fn print_report(action: &str, report: &SyncReport) {
    let mark = if report.is_clean() { "✓".green().bold() } else { "!".red().bold() };
    println!("{mark} {action} complete");
    let counts = [
        ("written", report.written),
        ("up to date", report.skipped_current),
        ("not found", report.skipped_not_found),
        ("updated", report.updated),
        ("created", report.created),
        ("no metadata", report.skipped_no_metadata),
        ("deleted", report.deleted),
    ];
    for (label, n) in counts.into_iter().filter(|(_, n)| *n > 0) {
        println!("  {label}: {}", n.to_string().bold());
    }
    for failure in &report.failures {
        println!("  {} {}: {}", "failed".red(), failure.item, failure.error);
    }
}
