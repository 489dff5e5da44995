use std::path::PathBuf;

use crate::controls::{ControlAssignment, ControlValues, parse_assignments};
use crate::error::{Error, Result};
use crate::plugins::PluginFactory;
use crate::routing::{self, RoutingRule, RoutingSource, parse_rules};
use crate::runner::{BlockRunner, ProcessOptions, RunSummary};
use crate::sndfile::{FrameReader, FrameWriter, InputFile, WavFrameWriter};
use tracing::{info, warn};

/// One invocation of a plugin over one file.
#[derive(Debug, Clone, Default)]
pub struct ApplyJob {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Routing arguments, `channel:port[.instance]` lists.
    pub connections: Vec<String>,
    /// Control arguments, `symbol:value` lists.
    pub controls: Vec<String>,
    pub preset: Option<String>,
    pub options: ProcessOptions,
    pub mixdown: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplySummary {
    pub instances: usize,
    pub output_channels: usize,
    pub routing: RoutingSource,
    pub unknown_ports: Vec<String>,
    pub unknown_controls: Vec<String>,
    pub missing_preset: Option<String>,
    pub run: RunSummary,
}

/// Applies `plugin` to the sound file `job.input`, writing `job.output` in
/// the input's sample format.
pub fn apply(plugin: &dyn PluginFactory, job: &ApplyJob) -> Result<ApplySummary> {
    let arguments = Arguments::parse(job)?;
    let (summary, _) = match InputFile::open(&job.input)? {
        InputFile::Wav(mut reader) => {
            let like = reader.spec();
            run_parsed(plugin, job, arguments, &mut reader, |channels| {
                WavFrameWriter::create(&job.output, channels, like)
            })?
        }
        InputFile::Decoded(mut reader) => {
            let like = reader.output_spec();
            run_parsed(plugin, job, arguments, &mut reader, |channels| {
                WavFrameWriter::create(&job.output, channels, like)
            })?
        }
    };
    Ok(summary)
}

/// Routing rules and control assignments, checked before any file is touched.
struct Arguments {
    rules: Vec<RoutingRule>,
    assignments: Vec<ControlAssignment>,
}

impl Arguments {
    fn parse(job: &ApplyJob) -> Result<Self> {
        if job.options.block_size == 0 {
            return Err(Error::InvalidBlockSize);
        }
        Ok(Self {
            rules: parse_rules(&job.connections)?,
            assignments: parse_assignments(&job.controls)?,
        })
    }
}

/// Runs the whole pipeline against an already opened input.
///
/// `open_output` is called with the output channel count only once every
/// instance exists, so no output is created when setup fails. The finished
/// writer is handed back alongside the summary.
pub fn process<R, W, F>(
    plugin: &dyn PluginFactory,
    job: &ApplyJob,
    reader: &mut R,
    open_output: F,
) -> Result<(ApplySummary, W)>
where
    R: FrameReader,
    W: FrameWriter,
    F: FnOnce(usize) -> Result<W>,
{
    let arguments = Arguments::parse(job)?;
    run_parsed(plugin, job, arguments, reader, open_output)
}

fn run_parsed<R, W, F>(
    plugin: &dyn PluginFactory,
    job: &ApplyJob,
    Arguments { rules, assignments }: Arguments,
    reader: &mut R,
    open_output: F,
) -> Result<(ApplySummary, W)>
where
    R: FrameReader,
    W: FrameWriter,
    F: FnOnce(usize) -> Result<W>,
{
    let layout = plugin.ports();

    if layout.audio_output_count() == 0 {
        return Err(Error::UnsupportedPort {
            port: plugin.uri().to_string(),
            reason: "plugin has no audio outputs",
        });
    }

    let channels = reader.channels();
    let routing = routing::resolve(&rules, &layout.audio_input_symbols(), channels, job.mixdown)?;

    let mut controls = ControlValues::from_layout(layout);
    let mut missing_preset = None;
    if let Some(label) = &job.preset {
        match plugin.preset_values(label) {
            Some(values) => {
                info!("Loading preset {label}");
                controls.apply(values.iter().map(|(symbol, value)| (symbol.as_str(), *value)));
            }
            None => {
                warn!("Preset {label} not found");
                missing_preset = Some(label.clone());
            }
        }
    }
    let unknown_controls = controls.apply_assignments(&assignments);

    if let Some(port) = layout.latency_port() {
        warn!(
            "Plugin reports latency on port {}; output is not compensated",
            port.symbol
        );
    }

    let sample_rate = f64::from(reader.sample_rate());
    let instances = (0..routing.instances())
        .map(|_| plugin.instantiate(sample_rate, job.options.block_size))
        .collect::<Result<Vec<_>>>()?;
    let mut runner = BlockRunner::new(
        instances,
        layout,
        &routing.matrix,
        controls.values(),
        job.options,
    )?;

    let output_channels = runner.output_channels();
    let mut writer = open_output(output_channels)?;
    let run = runner.run(reader, &mut writer)?;
    drop(runner);
    writer.finish()?;

    Ok((
        ApplySummary {
            instances: routing.instances(),
            output_channels,
            routing: routing.source,
            unknown_ports: routing.unknown_ports,
            unknown_controls,
            missing_preset,
            run,
        },
        writer,
    ))
}
