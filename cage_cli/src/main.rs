mod cli;
mod devices;
mod error_fmt;
mod logging;

use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cage_config::{Config, load_calibration_csv};
use cage_core::error::CageError;
use cage_core::{AnimalRegistry, Cage, CageConfig, FileRecorder, RunOutcome};
use clap::Parser;
use eyre::WrapErr;
use serde_json::json;

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{EXIT_REBOOT, exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    let code = match real_main(&cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "fatal");
            print_error(&e);
            exit_code_for_error(&e)
        }
    };
    std::process::exit(code);
}

fn print_error(e: &eyre::Report) {
    if JSON_MODE.get().copied().unwrap_or(false) {
        eprintln!("{}", format_error_json(e));
    } else {
        eprintln!("{}", humanize(e));
    }
}

fn real_main(cli: &Cli) -> eyre::Result<i32> {
    let cfg = load_config(&cli.config)?;
    logging::init(cli, &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), "config loaded");

    match &cli.cmd {
        Commands::Run { duration_ms } => run_cage(cli, &cfg, duration_ms.map(Duration::from_millis)),
        Commands::SelfCheck => self_check(cli, &cfg).map(|()| 0),
        Commands::Status => status(cli, &cfg).map(|()| 0),
    }
}

fn load_config(path: &Path) -> eyre::Result<Config> {
    let text = fs::read_to_string(path)
        .map_err(|e| CageError::Config(format!("read {}: {e}", path.display())))?;
    let cfg: Config = toml::from_str(&text)
        .map_err(|e| CageError::Config(format!("parse {}: {e}", path.display())))?;
    cfg.validate()
        .map_err(|e| CageError::Config(e.to_string()))?;
    Ok(cfg)
}

/// Scale gain: persisted `[calibration]` first, then the CSV given on the command line.
fn resolve_gain(cfg: &Config, csv: Option<&Path>) -> eyre::Result<Option<f32>> {
    if let Some(c) = cfg.calibration {
        return Ok(Some(c.gain_g_per_count));
    }
    match csv {
        Some(path) => {
            let cal = load_calibration_csv(path)?;
            tracing::info!(gain_g_per_count = cal.gain_g_per_count, "calibration loaded from CSV");
            Ok(Some(cal.gain_g_per_count))
        }
        None => Ok(None),
    }
}

fn build_cage(cli: &Cli, cfg: &Config) -> eyre::Result<Cage> {
    let gain = resolve_gain(cfg, cli.calibration.as_deref())?;
    let dev = devices::open(cfg, gain)?;
    let registry = AnimalRegistry::open(&cfg.paths.registry)?;
    let recorder = FileRecorder::new(&cfg.paths.data_dir, &cfg.paths.tare_log);
    let cage = Cage::builder()
        .with_presence(dev.presence)
        .with_reader(dev.reader)
        .with_scale(dev.scale)
        .with_touch(dev.touch)
        .with_water(dev.water)
        .with_drug(dev.drug)
        .with_store(registry)
        .with_recorder(recorder)
        .with_config(CageConfig::from(cfg))
        .build()?;
    Ok(cage)
}

fn run_cage(cli: &Cli, cfg: &Config, limit: Option<Duration>) -> eyre::Result<i32> {
    let mut cage = build_cage(cli, cfg)?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed))
            .wrap_err("install Ctrl-C handler")?;
    }

    let report = cage_core::run(&mut cage, &stop, limit);
    let outcome = report.outcome;
    let name = match outcome {
        RunOutcome::Stopped => "stopped",
        RunOutcome::RebootRequested => "reboot_requested",
    };
    if cli.json {
        println!(
            "{}",
            json!({ "outcome": name, "unknown_tags": cage.unknown_tag_count() })
        );
    } else {
        println!("cage {name} (unknown tags: {})", cage.unknown_tag_count());
    }

    match (outcome, report.shutdown_error) {
        (RunOutcome::Stopped, None) => Ok(0),
        (RunOutcome::Stopped, Some(e)) => Err(e),
        (RunOutcome::RebootRequested, shutdown_error) => {
            if let Some(e) = shutdown_error {
                print_error(&e);
            }
            if let Err(e) = reboot(&cfg.reboot.command) {
                tracing::error!(error = %e, "reboot command failed");
            }
            Ok(EXIT_REBOOT)
        }
    }
}

fn reboot(argv: &[String]) -> eyre::Result<()> {
    let Some((prog, args)) = argv.split_first() else {
        tracing::warn!("reboot requested; reboot.command is empty, leaving restart to the supervisor");
        return Ok(());
    };
    tracing::warn!(command = ?argv, "rebooting");
    let status = Command::new(prog)
        .args(args)
        .status()
        .wrap_err_with(|| format!("run reboot command {prog}"))?;
    if !status.success() {
        eyre::bail!("reboot command exited with {status}");
    }
    Ok(())
}

fn self_check(cli: &Cli, cfg: &Config) -> eyre::Result<()> {
    let gain = resolve_gain(cfg, cli.calibration.as_deref())?;
    let _devices = devices::open(cfg, gain)?;
    let registry = AnimalRegistry::open(&cfg.paths.registry)?;
    let animals = registry.records()?.len();
    fs::create_dir_all(&cfg.paths.data_dir).wrap_err_with(|| {
        format!("create data directory {}", cfg.paths.data_dir.display())
    })?;

    if cli.json {
        println!("{}", json!({ "status": "ok", "animals": animals }));
    } else {
        println!("self-check ok: {animals} animal(s) registered");
    }
    Ok(())
}

fn status(cli: &Cli, cfg: &Config) -> eyre::Result<()> {
    let registry = AnimalRegistry::open(&cfg.paths.registry)?;
    let rows = registry.records()?;
    if cli.json {
        for r in &rows {
            println!(
                "{}",
                json!({
                    "tag": r.tag.0,
                    "name": r.name,
                    "treatment": r.treatment.to_string(),
                    "day_index": r.day_index,
                    "last_seen_day": r.last_seen_day,
                    "water_drops_today": r.water_drops_today,
                    "drug_drops_today": r.drug_drops_today,
                    "required_drug_drops_today": r.required_drug_drops_today,
                    "reference_weight_g": r.reference_weight_g,
                })
            );
        }
    } else {
        println!("TAG\tNAME\tTREATMENT\tDAY\tWATER\tDRUG\tREQUIRED\tWEIGHT_G");
        for r in &rows {
            println!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.1}",
                r.tag,
                r.name,
                r.treatment,
                r.day_index,
                r.water_drops_today,
                r.drug_drops_today,
                r.required_drug_drops_today,
                r.reference_weight_g
            );
        }
    }
    Ok(())
}
