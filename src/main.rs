mod cli;
mod config;
mod logging;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use cli::{ApplyArgs, Cli, Command};
use config::Settings;
use lv2file_engine::{ApplyJob, ProcessOptions};
use tracing::error;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("error");
            error!("{e:#}");
            return ExitCode::FAILURE;
        }
    };
    logging::init(logging::effective_level(
        &settings.log_level,
        cli.verbose,
        cli.quiet,
    ));
    match run(cli.command, &settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn apply_job(args: ApplyArgs, settings: &Settings) -> ApplyJob {
    ApplyJob {
        input: args.input,
        output: args.output,
        connections: args.connections,
        controls: args.controls,
        preset: args.preset,
        options: ProcessOptions {
            block_size: args.blocksize.unwrap_or(settings.block_size),
            check_clipping: settings.check_clipping && !args.ignore_clipping,
        },
        mixdown: settings.mixdown || args.mixdown,
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn run(command: Command, settings: &Settings) -> Result<()> {
    use lv2file_engine::plugins::lv2::Lv2World;
    use lv2file_engine::{PluginFactory, apply};
    use tracing::info;

    let world = Lv2World::load();
    match command {
        Command::List => {
            for plugin in world.plugins() {
                println!("{}\t{}\t{}", plugin.index, plugin.uri, plugin.name);
            }
        }
        Command::Ports { plugin } => {
            let plugin = world.plugin(&plugin)?;
            let layout = plugin.ports();
            println!("Input ports:");
            for port in layout.audio_inputs() {
                println!("{}: {}", port.symbol, port.name);
            }
            println!("Controls:");
            for port in layout.control_inputs() {
                println!("{}: {}", port.symbol, port.name);
            }
        }
        Command::Presets { plugin } => {
            let plugin = world.plugin(&plugin)?;
            for label in plugin.preset_labels() {
                println!("Preset: {label}");
            }
        }
        Command::Apply(args) => {
            let plugin = world.plugin(&args.plugin)?;
            let job = apply_job(args, settings);
            info!("Applying {} to {}", plugin.name(), job.input.display());
            let summary = apply(&plugin, &job)?;
            info!(
                "Wrote {} frames on {} channels to {}",
                summary.run.frames,
                summary.output_channels,
                job.output.display()
            );
        }
    }
    Ok(())
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
fn run(_command: Command, _settings: &Settings) -> Result<()> {
    anyhow::bail!("LV2 hosting is not available on this platform")
}
