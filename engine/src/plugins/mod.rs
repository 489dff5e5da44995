#[cfg(all(unix, not(target_os = "macos")))]
pub mod lv2;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    AudioInput,
    AudioOutput,
    ControlInput,
    ControlOutput,
    AtomInput,
    AtomOutput,
    /// Optional port of a kind the host does not drive; left unconnected.
    Unconnected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortInfo {
    /// Index in the plugin's own port numbering.
    pub index: usize,
    pub symbol: String,
    pub name: String,
    pub kind: PortKind,
    pub default: Option<f32>,
    pub min: Option<f32>,
    pub max: Option<f32>,
    pub free_wheeling: bool,
    pub reports_latency: bool,
}

impl PortInfo {
    pub fn new(index: usize, symbol: &str, kind: PortKind) -> Self {
        Self {
            index,
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            kind,
            default: None,
            min: None,
            max: None,
            free_wheeling: false,
            reports_latency: false,
        }
    }
}

/// Ports of a plugin grouped by class, each class densely indexed from zero.
#[derive(Debug, Clone, Default)]
pub struct PortLayout {
    ports: Vec<PortInfo>,
    audio_inputs: Vec<usize>,
    audio_outputs: Vec<usize>,
    control_inputs: Vec<usize>,
    control_outputs: Vec<usize>,
}

impl PortLayout {
    pub fn new(ports: Vec<PortInfo>) -> Self {
        let mut layout = Self::default();
        for (position, port) in ports.iter().enumerate() {
            match port.kind {
                PortKind::AudioInput => layout.audio_inputs.push(position),
                PortKind::AudioOutput => layout.audio_outputs.push(position),
                PortKind::ControlInput => layout.control_inputs.push(position),
                PortKind::ControlOutput => layout.control_outputs.push(position),
                PortKind::AtomInput | PortKind::AtomOutput | PortKind::Unconnected => {}
            }
        }
        layout.ports = ports;
        layout
    }

    pub fn ports(&self) -> &[PortInfo] {
        &self.ports
    }

    pub fn audio_inputs(&self) -> impl Iterator<Item = &PortInfo> {
        self.audio_inputs.iter().map(|&i| &self.ports[i])
    }

    pub fn audio_outputs(&self) -> impl Iterator<Item = &PortInfo> {
        self.audio_outputs.iter().map(|&i| &self.ports[i])
    }

    pub fn control_inputs(&self) -> impl Iterator<Item = &PortInfo> {
        self.control_inputs.iter().map(|&i| &self.ports[i])
    }

    pub fn control_outputs(&self) -> impl Iterator<Item = &PortInfo> {
        self.control_outputs.iter().map(|&i| &self.ports[i])
    }

    pub fn audio_input_count(&self) -> usize {
        self.audio_inputs.len()
    }

    pub fn audio_output_count(&self) -> usize {
        self.audio_outputs.len()
    }

    pub fn control_input_count(&self) -> usize {
        self.control_inputs.len()
    }

    pub fn control_output_count(&self) -> usize {
        self.control_outputs.len()
    }

    pub fn audio_input_symbols(&self) -> Vec<&str> {
        self.audio_inputs().map(|port| port.symbol.as_str()).collect()
    }

    pub fn latency_port(&self) -> Option<&PortInfo> {
        self.control_outputs().find(|port| port.reports_latency)
    }
}

/// One running copy of a plugin.
///
/// Mirrors the native port-connection protocol: the host binds every port to
/// memory it owns, then asks for one block at a time.
pub trait PluginInstance {
    fn activate(&mut self);

    /// Must be idempotent; also called on teardown after a failed run.
    fn deactivate(&mut self);

    /// Binds a port (plugin numbering) to `data`.
    ///
    /// # Safety
    /// `data` must point to memory valid for as many `f32` values as the port
    /// needs (one for control ports, the block size for audio ports), and must
    /// stay valid and unmoved until the port is rebound or the instance is
    /// dropped.
    unsafe fn connect_port(&mut self, port_index: usize, data: *mut f32);

    /// Resets per-block event sequence headers.
    fn prepare_block(&mut self) {}

    fn run(&mut self, frames: usize);

    /// Executes work requested during the last `run` and delivers the
    /// responses. Returns how many requests were served.
    fn run_deferred_work(&mut self) -> usize {
        0
    }
}

/// A loaded plugin that can produce instances.
pub trait PluginFactory {
    fn uri(&self) -> &str;

    fn ports(&self) -> &PortLayout;

    fn instantiate(&self, sample_rate: f64, block_size: usize) -> Result<Box<dyn PluginInstance>>;

    /// Control input values stored under a preset label, by port symbol.
    fn preset_values(&self, _label: &str) -> Option<Vec<(String, f32)>> {
        None
    }
}
