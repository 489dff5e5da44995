use super::InstanceBuffers;
use tracing::warn;

/// Writes every instance's outputs as one interleaved block.
///
/// Output channel `instance * outputs + port`, so all of instance 0's
/// channels come before instance 1's.
pub fn interleave(buffers: &InstanceBuffers, frames: usize, out: &mut [f32]) {
    let width = buffers.instances() * buffers.outputs();
    debug_assert!(out.len() >= frames * width);
    for instance in 0..buffers.instances() {
        for port in 0..buffers.outputs() {
            let channel = instance * buffers.outputs() + port;
            for (frame, sample) in buffers.output(instance, port)[..frames].iter().enumerate() {
                out[frame * width + channel] = *sample;
            }
        }
    }
}

/// Clamps samples to [-1, 1] and warns the first time that happens in a run.
#[derive(Debug, Default)]
pub struct ClipDetector {
    first_clipped_block: Option<u64>,
}

impl ClipDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true only for the block that raised the warning.
    pub fn scan(&mut self, block: u64, samples: &mut [f32]) -> bool {
        let mut clipped = false;
        for sample in samples.iter_mut() {
            if *sample > 1.0 {
                *sample = 1.0;
                clipped = true;
            } else if *sample < -1.0 {
                *sample = -1.0;
                clipped = true;
            }
        }
        if !clipped || self.first_clipped_block.is_some() {
            return false;
        }
        self.first_clipped_block = Some(block);
        warn!(
            "Clipping output. Try changing parameters of the plugin to lower the output volume, \
             or if that's not possible, try lowering the volume of the input before processing."
        );
        true
    }

    pub fn clipped(&self) -> bool {
        self.first_clipped_block.is_some()
    }

    pub fn first_clipped_block(&self) -> Option<u64> {
        self.first_clipped_block
    }
}
