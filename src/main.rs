use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::Receiver;
use hardsub::app::{RunSummary, discover_videos, run_with_system_tools};
use hardsub::cli::{Cli, is_confirmed};
use hardsub::config::Config;
use hardsub::pipeline::telemetry::{Level, StageMessage, Telemetry};
use owo_colors::OwoColorize;
use std::io::{BufRead, IsTerminal, Write};
use std::thread::{self, JoinHandle};

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(cli.log_level().to_string()),
    )
    .target(env_logger::Target::Stderr)
    .init();
    log::info!("hardsub {}", hardsub::version_string());

    let config = load_config(&cli)?;

    if cli.needs_confirmation(std::io::stdin().is_terminal()) && !confirm_start(&cli)? {
        eprintln!("Aborting...");
        std::process::exit(1);
    }

    // With -v the telemetry is already mirrored through the logger.
    let (telemetry, monitor) = if cli.quiet || cli.verbose > 0 {
        (Telemetry::disabled(), None)
    } else {
        let (telemetry, messages) = Telemetry::channel(config.telemetry.buffer);
        (telemetry, Some(spawn_monitor(messages)))
    };

    if !cli.quiet {
        eprintln!(
            "Extracting subtitles from {} into {}...",
            cli.input.display(),
            cli.output.display()
        );
    }

    let result = run_with_system_tools(&config, &cli.input, &cli.output, telemetry);

    if let Some(monitor) = monitor
        && monitor.join().is_err()
    {
        log::warn!("Progress monitor panicked");
    }

    let summary = result.context("subtitle extraction failed")?;

    if !cli.quiet {
        print_summary(&summary);
    }

    if summary.has_invariant_violation() {
        eprintln!(
            "{} internal consistency check failed, subtitles may be incomplete",
            "error:".red().bold()
        );
        std::process::exit(1);
    }

    Ok(())
}

/// Load configuration from file, environment and command line.
///
/// Priority order (last wins):
/// 1. Built-in defaults
/// 2. Config file (--config, else ~/.config/hardsub/config.toml if present)
/// 3. Environment variable overrides
/// 4. Command-line flags
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::resolve(cli.config.as_deref()).context("failed to load configuration")?;
    cli.apply_overrides(&mut config);
    Ok(config)
}

/// Lists the videos about to be processed and asks the user to go ahead.
fn confirm_start(cli: &Cli) -> Result<bool> {
    let videos = discover_videos(&cli.input)?;
    eprintln!("About to extract subtitles from {} video(s):", videos.len());
    for video in &videos {
        eprintln!("  - {}", video.display());
    }
    eprint!("Proceed? (y/n): ");
    std::io::stderr().flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(is_confirmed(&answer))
}

/// Prints stage completions and problems while the pipeline runs.
fn spawn_monitor(messages: Receiver<StageMessage>) -> JoinHandle<()> {
    thread::spawn(move || {
        for message in messages {
            match message.level {
                Level::Debug => {}
                Level::Info => eprintln!("  {} {}", message.stage.dimmed(), message.text),
                Level::Warning => eprintln!("  {} {}", message.stage.yellow(), message.text),
                Level::Error => eprintln!("  {} {}", message.stage.red(), message.text),
            }
        }
    })
}

fn print_summary(summary: &RunSummary) {
    let stages: Vec<String> = summary.stages.iter().map(|s| s.to_string()).collect();
    eprintln!(
        "Processed {} video(s) with {} in {:.1}s",
        summary.videos.len(),
        stages.join(" → "),
        summary.elapsed.as_secs_f64()
    );

    for file in &summary.files {
        eprintln!("  {} {}", "wrote".green(), file.display());
    }

    let without_subtitles = summary.videos.len().saturating_sub(summary.files.len());
    if without_subtitles > 0 {
        eprintln!(
            "  {} {} video(s) produced no subtitles",
            "note:".yellow(),
            without_subtitles
        );
    }

    if !summary.failures.is_empty() {
        eprintln!(
            "{} {} stage failure(s), some frames were skipped:",
            "warning:".yellow().bold(),
            summary.failures.len()
        );
        for failure in &summary.failures {
            eprintln!("  {}", failure);
        }
    }

    eprintln!("{} subtitle(s) written", summary.entries.bold());
}
