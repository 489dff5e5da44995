use crate::audio::{ClipDetector, InstanceBuffers, Mixer, interleave};
use crate::error::{Error, Result};
use crate::plugins::{PluginInstance, PortLayout};
use crate::routing::ConnectionMatrix;
use crate::sndfile::{FrameReader, FrameWriter};
use tracing::{debug, info};

pub const DEFAULT_BLOCK_SIZE: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOptions {
    pub block_size: usize,
    pub check_clipping: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            check_clipping: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub blocks: u64,
    pub frames: u64,
    pub first_clipped_block: Option<u64>,
}

/// Drives a set of connected, active instances over a whole input file.
///
/// Instances are deactivated when the runner is dropped.
pub(crate) struct BlockRunner {
    // Dropped before `buffers`, which the instances point into.
    instances: Vec<Box<dyn PluginInstance>>,
    buffers: InstanceBuffers,
    mixer: Mixer,
    channels: usize,
    options: ProcessOptions,
}

impl BlockRunner {
    pub(crate) fn new(
        mut instances: Vec<Box<dyn PluginInstance>>,
        layout: &PortLayout,
        matrix: &ConnectionMatrix,
        controls: &[f32],
        options: ProcessOptions,
    ) -> Result<Self> {
        if options.block_size == 0 {
            return Err(Error::InvalidBlockSize);
        }
        for (what, expected, actual) in [
            ("instances", matrix.instances(), instances.len()),
            ("audio inputs", matrix.ports(), layout.audio_input_count()),
            ("control values", layout.control_input_count(), controls.len()),
        ] {
            if expected != actual {
                return Err(Error::ShapeMismatch {
                    what,
                    expected,
                    actual,
                });
            }
        }

        let mut buffers = InstanceBuffers::new(
            instances.len(),
            layout.audio_input_count(),
            layout.audio_output_count(),
            controls,
            layout.control_output_count(),
            options.block_size,
        );
        for (n, instance) in instances.iter_mut().enumerate() {
            // SAFETY: every buffer below is allocated once, sized for its port
            // and owned by the runner, which outlives the instances.
            unsafe {
                for (port, info) in layout.audio_inputs().enumerate() {
                    instance.connect_port(info.index, buffers.input_mut(n, port).as_mut_ptr());
                }
                for (port, info) in layout.audio_outputs().enumerate() {
                    instance.connect_port(info.index, buffers.output_mut(n, port).as_mut_ptr());
                }
                let controls = buffers.controls_mut(n).as_mut_ptr();
                for (port, info) in layout.control_inputs().enumerate() {
                    instance.connect_port(info.index, controls.add(port));
                }
                let control_outputs = buffers.control_outputs_mut(n).as_mut_ptr();
                for (port, info) in layout.control_outputs().enumerate() {
                    instance.connect_port(info.index, control_outputs.add(port));
                }
            }
        }
        for instance in &mut instances {
            instance.activate();
        }
        debug!("Activated {} plugin instances", instances.len());
        Ok(Self {
            instances,
            buffers,
            mixer: Mixer::new(matrix),
            channels: matrix.channels(),
            options,
        })
    }

    pub(crate) fn output_channels(&self) -> usize {
        self.buffers.instances() * self.buffers.outputs()
    }

    pub(crate) fn run(
        &mut self,
        reader: &mut dyn FrameReader,
        writer: &mut dyn FrameWriter,
    ) -> Result<RunSummary> {
        let channels = self.channels;
        let width = self.output_channels();
        for (stream, expected, actual) in [
            ("input", channels, reader.channels()),
            ("output", width, writer.channels()),
        ] {
            if expected != actual {
                return Err(Error::ChannelCountMismatch {
                    stream,
                    expected,
                    actual,
                });
            }
        }
        let block_size = self.options.block_size;
        let mut input = vec![0.0_f32; block_size * channels];
        let mut output = vec![0.0_f32; block_size * width];
        let mut clip = ClipDetector::new();
        let mut summary = RunSummary::default();

        loop {
            let frames = reader.read_frames(&mut input)?;
            if frames == 0 {
                break;
            }
            self.mixer.mix(&input, frames, &mut self.buffers);
            for (n, instance) in self.instances.iter_mut().enumerate() {
                instance.prepare_block();
                instance.run(frames);
                let served = instance.run_deferred_work();
                if served > 0 {
                    debug!("Instance {n} served {served} worker requests");
                }
            }
            let block = &mut output[..frames * width];
            interleave(&self.buffers, frames, block);
            if self.options.check_clipping {
                clip.scan(summary.blocks, block);
            }
            writer.write_frames(block)?;
            summary.blocks += 1;
            summary.frames += frames as u64;
        }
        summary.first_clipped_block = clip.first_clipped_block();
        info!(
            "Processed {} frames in {} blocks",
            summary.frames, summary.blocks
        );
        Ok(summary)
    }
}

impl Drop for BlockRunner {
    fn drop(&mut self) {
        for instance in &mut self.instances {
            instance.deactivate();
        }
    }
}
