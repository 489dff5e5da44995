/// Port memory for every instance, allocated once per run.
///
/// Each kind lives in one contiguous allocation indexed instance-major, so
/// pointers handed to plugins stay put for the whole run.
#[derive(Debug)]
pub struct InstanceBuffers {
    block_size: usize,
    instances: usize,
    inputs: usize,
    outputs: usize,
    controls: usize,
    control_outputs: usize,
    audio_in: Vec<f32>,
    audio_out: Vec<f32>,
    control_in: Vec<f32>,
    control_out: Vec<f32>,
}

impl InstanceBuffers {
    pub fn new(
        instances: usize,
        inputs: usize,
        outputs: usize,
        controls: &[f32],
        control_outputs: usize,
        block_size: usize,
    ) -> Self {
        let control_in = (0..instances)
            .flat_map(|_| controls.iter().copied())
            .collect();
        Self {
            block_size,
            instances,
            inputs,
            outputs,
            controls: controls.len(),
            control_outputs,
            audio_in: vec![0.0; instances * inputs * block_size],
            audio_out: vec![0.0; instances * outputs * block_size],
            control_in,
            control_out: vec![0.0; instances * control_outputs],
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn instances(&self) -> usize {
        self.instances
    }

    pub fn inputs(&self) -> usize {
        self.inputs
    }

    pub fn outputs(&self) -> usize {
        self.outputs
    }

    fn audio_range(&self, instance: usize, port: usize, ports: usize) -> std::ops::Range<usize> {
        assert!(instance < self.instances && port < ports);
        let start = (instance * ports + port) * self.block_size;
        start..start + self.block_size
    }

    pub fn input(&self, instance: usize, port: usize) -> &[f32] {
        let range = self.audio_range(instance, port, self.inputs);
        &self.audio_in[range]
    }

    pub fn input_mut(&mut self, instance: usize, port: usize) -> &mut [f32] {
        let range = self.audio_range(instance, port, self.inputs);
        &mut self.audio_in[range]
    }

    pub fn output(&self, instance: usize, port: usize) -> &[f32] {
        let range = self.audio_range(instance, port, self.outputs);
        &self.audio_out[range]
    }

    pub fn output_mut(&mut self, instance: usize, port: usize) -> &mut [f32] {
        let range = self.audio_range(instance, port, self.outputs);
        &mut self.audio_out[range]
    }

    pub fn controls_mut(&mut self, instance: usize) -> &mut [f32] {
        assert!(instance < self.instances);
        let start = instance * self.controls;
        &mut self.control_in[start..start + self.controls]
    }

    pub fn control_outputs_mut(&mut self, instance: usize) -> &mut [f32] {
        assert!(instance < self.instances);
        let start = instance * self.control_outputs;
        &mut self.control_out[start..start + self.control_outputs]
    }
}
