use super::InstanceBuffers;
use crate::routing::ConnectionMatrix;

/// Averages the channels routed to each (instance, port) into that port.
#[derive(Debug, Clone)]
pub struct Mixer {
    channels: usize,
    ports: usize,
    sources: Vec<Vec<usize>>,
}

impl Mixer {
    pub fn new(matrix: &ConnectionMatrix) -> Self {
        let mut sources = Vec::with_capacity(matrix.instances() * matrix.ports());
        for instance in 0..matrix.instances() {
            for port in 0..matrix.ports() {
                sources.push(matrix.sources(instance, port).collect());
            }
        }
        Self {
            channels: matrix.channels(),
            ports: matrix.ports(),
            sources,
        }
    }

    /// Fills every input port from `frames` interleaved frames. Samples past
    /// `frames` are zeroed so a short final block never replays stale audio.
    pub fn mix(&self, interleaved: &[f32], frames: usize, buffers: &mut InstanceBuffers) {
        debug_assert!(interleaved.len() >= frames * self.channels);
        debug_assert!(frames <= buffers.block_size());
        for (slot, sources) in self.sources.iter().enumerate() {
            let (instance, port) = (slot / self.ports, slot % self.ports);
            let target = buffers.input_mut(instance, port);
            let (active, tail) = target.split_at_mut(frames);
            tail.fill(0.0);
            if sources.is_empty() {
                active.fill(0.0);
                continue;
            }
            let count = sources.len() as f32;
            for (frame, sample) in active.iter_mut().enumerate() {
                let row = &interleaved[frame * self.channels..(frame + 1) * self.channels];
                let sum: f32 = sources.iter().map(|&channel| row[channel]).sum();
                *sample = sum / count;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn buffers(matrix: &ConnectionMatrix, block_size: usize) -> InstanceBuffers {
        InstanceBuffers::new(matrix.instances(), matrix.ports(), 1, &[], 0, block_size)
    }

    #[test]
    fn single_source_copies_samples() {
        let mut matrix = ConnectionMatrix::new(1, 2, 2).unwrap();
        matrix.connect(0, 0, 0);
        matrix.connect(0, 1, 1);
        let mixer = Mixer::new(&matrix);
        let mut bufs = buffers(&matrix, 3);
        let input = [0.1, -0.1, 0.2, -0.2, 0.3, -0.3];
        mixer.mix(&input, 3, &mut bufs);
        assert_eq!(bufs.input(0, 0), &[0.1, 0.2, 0.3]);
        assert_eq!(bufs.input(0, 1), &[-0.1, -0.2, -0.3]);
    }

    #[test]
    fn downmix_is_the_mean() {
        let mut matrix = ConnectionMatrix::new(1, 1, 4).unwrap();
        for channel in 0..4 {
            matrix.connect(0, 0, channel);
        }
        let mixer = Mixer::new(&matrix);
        let mut bufs = buffers(&matrix, 2);
        let input = [1.0, 0.0, 0.5, 0.5, -1.0, -1.0, 1.0, 0.2];
        mixer.mix(&input, 2, &mut bufs);
        assert_relative_eq!(bufs.input(0, 0)[0], 0.5);
        assert_relative_eq!(bufs.input(0, 0)[1], -0.2);
    }

    #[test]
    fn unconnected_port_is_silent() {
        let matrix = ConnectionMatrix::new(2, 1, 2).unwrap();
        let mixer = Mixer::new(&matrix);
        let mut bufs = buffers(&matrix, 4);
        bufs.input_mut(1, 0).fill(7.0);
        mixer.mix(&[1.0; 8], 4, &mut bufs);
        for instance in 0..2 {
            assert!(bufs.input(instance, 0).iter().all(|s| *s == 0.0));
        }
    }

    #[test]
    fn order_of_connections_does_not_change_the_mix() {
        let input = [0.11, 0.73, -0.29, 0.41, 0.05, -0.66];
        let mut forward = ConnectionMatrix::new(1, 1, 3).unwrap();
        for channel in [0, 1, 2] {
            forward.connect(0, 0, channel);
        }
        let mut backward = ConnectionMatrix::new(1, 1, 3).unwrap();
        for channel in [2, 1, 0] {
            backward.connect(0, 0, channel);
        }
        let mut a = buffers(&forward, 2);
        let mut b = buffers(&backward, 2);
        Mixer::new(&forward).mix(&input, 2, &mut a);
        Mixer::new(&backward).mix(&input, 2, &mut b);
        assert_eq!(a.input(0, 0), b.input(0, 0));
    }

    #[test]
    fn instances_mix_independently() {
        let mut matrix = ConnectionMatrix::new(2, 1, 2).unwrap();
        matrix.connect(0, 0, 0);
        matrix.connect(1, 0, 0);
        matrix.connect(1, 0, 1);
        let mixer = Mixer::new(&matrix);
        let mut bufs = buffers(&matrix, 1);
        mixer.mix(&[0.8, 0.2], 1, &mut bufs);
        assert_relative_eq!(bufs.input(0, 0)[0], 0.8);
        assert_relative_eq!(bufs.input(1, 0)[0], 0.5);
    }

    #[test]
    fn short_block_zeroes_the_tail() {
        let mut matrix = ConnectionMatrix::new(1, 1, 1).unwrap();
        matrix.connect(0, 0, 0);
        let mixer = Mixer::new(&matrix);
        let mut bufs = buffers(&matrix, 4);
        mixer.mix(&[0.5; 4], 4, &mut bufs);
        mixer.mix(&[0.25, 0.25], 2, &mut bufs);
        assert_eq!(bufs.input(0, 0), &[0.25, 0.25, 0.0, 0.0]);
    }
}
