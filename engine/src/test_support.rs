//! In-memory doubles for plugins and sound files.

use std::{cell::RefCell, rc::Rc};

use crate::error::Result;
use crate::plugins::{PluginFactory, PluginInstance, PortInfo, PortKind, PortLayout};
use crate::sndfile::{FrameReader, FrameWriter};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Activate(usize),
    Deactivate(usize),
    Run(usize, usize),
    Work(usize),
}

pub type EventLog = Rc<RefCell<Vec<Event>>>;

/// Plugin with `inputs` audio inputs, `outputs` audio outputs and one `gain`
/// control. Output `n` is input `n % inputs` times gain, plus `offset`.
pub struct GainPlugin {
    layout: PortLayout,
    pub log: EventLog,
    pub presets: Vec<(String, Vec<(String, f32)>)>,
    pub offset: f32,
    pub deferred_work: usize,
    created: RefCell<usize>,
}

impl GainPlugin {
    pub fn new(inputs: usize, outputs: usize) -> Self {
        let mut ports = vec![];
        for i in 0..inputs {
            ports.push(PortInfo::new(ports.len(), &format!("in_{i}"), PortKind::AudioInput));
        }
        for i in 0..outputs {
            ports.push(PortInfo::new(ports.len(), &format!("out_{i}"), PortKind::AudioOutput));
        }
        let mut gain = PortInfo::new(ports.len(), "gain", PortKind::ControlInput);
        gain.default = Some(1.0);
        ports.push(gain);
        ports.push(PortInfo::new(ports.len(), "level", PortKind::ControlOutput));
        Self {
            layout: PortLayout::new(ports),
            log: EventLog::default(),
            presets: vec![],
            offset: 0.0,
            deferred_work: 0,
            created: RefCell::new(0),
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.log.borrow().clone()
    }
}

impl PluginFactory for GainPlugin {
    fn uri(&self) -> &str {
        "urn:lv2file:test:gain"
    }

    fn ports(&self) -> &PortLayout {
        &self.layout
    }

    fn instantiate(&self, _sample_rate: f64, _block_size: usize) -> Result<Box<dyn PluginInstance>> {
        let mut created = self.created.borrow_mut();
        let id = *created;
        *created += 1;
        Ok(Box::new(GainInstance {
            id,
            inputs: self.layout.audio_inputs().map(|p| p.index).collect(),
            outputs: self.layout.audio_outputs().map(|p| p.index).collect(),
            ports: vec![std::ptr::null_mut(); self.layout.ports().len()],
            gain_port: self.layout.control_inputs().map(|p| p.index).next().unwrap_or(0),
            level_port: self.layout.control_outputs().map(|p| p.index).next().unwrap_or(0),
            offset: self.offset,
            deferred_work: self.deferred_work,
            active: false,
            log: self.log.clone(),
        }))
    }

    fn preset_values(&self, label: &str) -> Option<Vec<(String, f32)>> {
        self.presets
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, values)| values.clone())
    }
}

struct GainInstance {
    id: usize,
    inputs: Vec<usize>,
    outputs: Vec<usize>,
    ports: Vec<*mut f32>,
    gain_port: usize,
    level_port: usize,
    offset: f32,
    deferred_work: usize,
    active: bool,
    log: EventLog,
}

impl PluginInstance for GainInstance {
    fn activate(&mut self) {
        self.active = true;
        self.log.borrow_mut().push(Event::Activate(self.id));
    }

    fn deactivate(&mut self) {
        if self.active {
            self.active = false;
            self.log.borrow_mut().push(Event::Deactivate(self.id));
        }
    }

    unsafe fn connect_port(&mut self, port_index: usize, data: *mut f32) {
        self.ports[port_index] = data;
    }

    fn run(&mut self, frames: usize) {
        assert!(self.active, "run before activate");
        self.log.borrow_mut().push(Event::Run(self.id, frames));
        // SAFETY: the host connected every port to live buffers of at least
        // `frames` samples.
        unsafe {
            let gain = *self.ports[self.gain_port];
            let mut peak = 0.0_f32;
            for (n, &output) in self.outputs.iter().enumerate() {
                let out = self.ports[output];
                let input = if self.inputs.is_empty() {
                    None
                } else {
                    Some(self.ports[self.inputs[n % self.inputs.len()]])
                };
                for frame in 0..frames {
                    let sample = input.map_or(0.0, |i| *i.add(frame)) * gain + self.offset;
                    peak = peak.max(sample.abs());
                    *out.add(frame) = sample;
                }
            }
            *self.ports[self.level_port] = peak;
        }
    }

    fn run_deferred_work(&mut self) -> usize {
        if self.deferred_work > 0 {
            self.log.borrow_mut().push(Event::Work(self.id));
        }
        self.deferred_work
    }
}

pub struct MemoryReader {
    channels: usize,
    sample_rate: u32,
    samples: Vec<f32>,
    position: usize,
}

impl MemoryReader {
    pub fn new(channels: usize, samples: Vec<f32>) -> Self {
        Self {
            channels,
            sample_rate: 48_000,
            samples,
            position: 0,
        }
    }
}

impl FrameReader for MemoryReader {
    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read_frames(&mut self, buffer: &mut [f32]) -> Result<usize> {
        let available = self.samples.len() - self.position;
        let count = available.min(buffer.len()) / self.channels * self.channels;
        buffer[..count].copy_from_slice(&self.samples[self.position..self.position + count]);
        self.position += count;
        Ok(count / self.channels)
    }
}

#[derive(Debug, Default)]
pub struct MemoryWriter {
    pub channels: usize,
    pub samples: Vec<f32>,
    pub writes: Vec<usize>,
    pub finished: bool,
}

impl MemoryWriter {
    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            ..Self::default()
        }
    }
}

impl FrameWriter for MemoryWriter {
    fn channels(&self) -> usize {
        self.channels
    }

    fn write_frames(&mut self, samples: &[f32]) -> Result<()> {
        assert!(!self.finished);
        self.writes.push(samples.len() / self.channels.max(1));
        self.samples.extend_from_slice(samples);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}
