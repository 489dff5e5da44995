mod features;
mod instance;

pub use instance::Lv2Instance;

use std::rc::Rc;

use super::{PluginFactory, PluginInstance, PortInfo, PortKind, PortLayout};
use crate::error::{Error, Result};
use crate::urid::UridMap;
use features::HostFeatures;
use lilv::{World, node::Node, plugin::Plugin};
use tracing::{debug, info};

pub(crate) mod uris {
    pub const LV2_INPUT_PORT: &str = "http://lv2plug.in/ns/lv2core#InputPort";
    pub const LV2_OUTPUT_PORT: &str = "http://lv2plug.in/ns/lv2core#OutputPort";
    pub const LV2_AUDIO_PORT: &str = "http://lv2plug.in/ns/lv2core#AudioPort";
    pub const LV2_CONTROL_PORT: &str = "http://lv2plug.in/ns/lv2core#ControlPort";
    pub const LV2_CONNECTION_OPTIONAL: &str = "http://lv2plug.in/ns/lv2core#connectionOptional";
    pub const LV2_FREE_WHEELING: &str = "http://lv2plug.in/ns/lv2core#freeWheeling";
    pub const LV2_REPORTS_LATENCY: &str = "http://lv2plug.in/ns/lv2core#reportsLatency";
    pub const LV2_PORT: &str = "http://lv2plug.in/ns/lv2core#port";
    pub const LV2_SYMBOL: &str = "http://lv2plug.in/ns/lv2core#symbol";
    pub const ATOM_ATOM_PORT: &str = "http://lv2plug.in/ns/ext/atom#AtomPort";
    pub const ATOM_SEQUENCE: &str = "http://lv2plug.in/ns/ext/atom#Sequence";
    pub const ATOM_CHUNK: &str = "http://lv2plug.in/ns/ext/atom#Chunk";
    pub const ATOM_INT: &str = "http://lv2plug.in/ns/ext/atom#Int";
    pub const URID_MAP: &str = "http://lv2plug.in/ns/ext/urid#map";
    pub const URID_UNMAP: &str = "http://lv2plug.in/ns/ext/urid#unmap";
    pub const OPTIONS_OPTIONS: &str = "http://lv2plug.in/ns/ext/options#options";
    pub const BUF_SIZE_BOUNDED_BLOCK_LENGTH: &str =
        "http://lv2plug.in/ns/ext/buf-size#boundedBlockLength";
    pub const BUF_SIZE_MIN_BLOCK_LENGTH: &str = "http://lv2plug.in/ns/ext/buf-size#minBlockLength";
    pub const BUF_SIZE_MAX_BLOCK_LENGTH: &str = "http://lv2plug.in/ns/ext/buf-size#maxBlockLength";
    pub const BUF_SIZE_NOMINAL_BLOCK_LENGTH: &str =
        "http://lv2plug.in/ns/ext/buf-size#nominalBlockLength";
    pub const BUF_SIZE_SEQUENCE_SIZE: &str = "http://lv2plug.in/ns/ext/buf-size#sequenceSize";
    pub const WORKER_SCHEDULE: &str = "http://lv2plug.in/ns/ext/worker#schedule";
    pub const WORKER_INTERFACE: &str = "http://lv2plug.in/ns/ext/worker#interface";
    pub const PRESETS_PRESET: &str = "http://lv2plug.in/ns/ext/presets#Preset";
    pub const PRESETS_VALUE: &str = "http://lv2plug.in/ns/ext/presets#value";
    pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lv2PluginInfo {
    /// 1-based position in the listing; accepted wherever a plugin is named.
    pub index: usize,
    pub uri: String,
    pub name: String,
}

/// Every LV2 plugin installed on the system.
pub struct Lv2World {
    world: World,
}

impl Lv2World {
    pub fn load() -> Self {
        let world = World::new();
        world.load_all();
        Self { world }
    }

    pub fn plugins(&self) -> Vec<Lv2PluginInfo> {
        self.world
            .plugins()
            .iter()
            .filter(|plugin| plugin.verify())
            .filter_map(|plugin| {
                let uri = plugin.uri().as_uri()?.to_string();
                let name = plugin.name().as_str().unwrap_or(&uri).to_string();
                Some((uri, name))
            })
            .enumerate()
            .map(|(position, (uri, name))| Lv2PluginInfo {
                index: position + 1,
                uri,
                name,
            })
            .collect()
    }

    /// Looks a plugin up by listing index or by URI.
    pub fn plugin(&self, name: &str) -> Result<Lv2Plugin<'_>> {
        let plugin = match name.parse::<usize>() {
            Ok(index) => self
                .plugins()
                .into_iter()
                .find(|info| info.index == index)
                .and_then(|info| self.plugin_by_uri(&info.uri)),
            Err(_) => self.plugin_by_uri(name),
        };
        let plugin = plugin.ok_or_else(|| Error::PluginNotFound(name.to_string()))?;
        Lv2Plugin::new(self, plugin)
    }

    fn plugin_by_uri(&self, uri: &str) -> Option<Plugin> {
        let node = self.world.new_uri(uri);
        self.world.plugins().plugin(&node).filter(|plugin| plugin.verify())
    }

    fn first_string(&self, subject: &Node, predicate: &Node) -> Option<String> {
        self.world
            .find_nodes(Some(subject), predicate, None)
            .iter()
            .find_map(|node| node.as_str().map(str::to_string))
    }

    fn first_number(&self, subject: &Node, predicate: &Node) -> Option<f32> {
        self.world
            .find_nodes(Some(subject), predicate, None)
            .iter()
            .find_map(|node| node.as_float().or_else(|| node.as_int().map(|v| v as f32)))
    }
}

/// A verified plugin, ready to be instantiated any number of times.
pub struct Lv2Plugin<'w> {
    world: &'w Lv2World,
    plugin: Plugin,
    uri: String,
    name: String,
    layout: PortLayout,
    atom_ports: Vec<(usize, bool)>,
    has_worker: bool,
    urids: Rc<UridMap>,
}

impl<'w> Lv2Plugin<'w> {
    fn new(world: &'w Lv2World, plugin: Plugin) -> Result<Self> {
        let uri = plugin.uri().as_uri().unwrap_or_default().to_string();
        let name = plugin.name().as_str().unwrap_or(&uri).to_string();
        let ports = classify_ports(&world.world, &plugin)?;
        let atom_ports = ports
            .iter()
            .filter_map(|port| match port.kind {
                PortKind::AtomInput => Some((port.index, false)),
                PortKind::AtomOutput => Some((port.index, true)),
                _ => None,
            })
            .collect();
        let w = &world.world;
        let has_worker = plugin.has_feature(&w.new_uri(uris::WORKER_SCHEDULE))
            && plugin.has_extension_data(&w.new_uri(uris::WORKER_INTERFACE));
        debug!("Loaded plugin {uri} (worker: {has_worker})");
        Ok(Self {
            world,
            plugin,
            uri,
            name,
            layout: PortLayout::new(ports),
            atom_ports,
            has_worker,
            urids: Rc::new(UridMap::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_worker(&self) -> bool {
        self.has_worker
    }

    /// Preset nodes with their labels.
    fn presets(&self) -> Vec<(Node, String)> {
        let w = &self.world.world;
        let label = w.new_uri(uris::RDFS_LABEL);
        let Some(presets) = self.plugin.related(Some(&w.new_uri(uris::PRESETS_PRESET))) else {
            return vec![];
        };
        presets
            .iter()
            .filter_map(|preset| {
                let _ = w.load_resource(&preset);
                let title = self.world.first_string(&preset, &label)?;
                Some((preset, title))
            })
            .collect()
    }

    pub fn preset_labels(&self) -> Vec<String> {
        self.presets().into_iter().map(|(_, label)| label).collect()
    }

    fn required_features(&self) -> Vec<String> {
        self.plugin
            .required_features()
            .iter()
            .filter_map(|feature| {
                feature
                    .as_uri()
                    .map(str::to_string)
                    .or_else(|| feature.as_str().map(str::to_string))
            })
            .collect()
    }
}

impl PluginFactory for Lv2Plugin<'_> {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn ports(&self) -> &PortLayout {
        &self.layout
    }

    fn instantiate(&self, sample_rate: f64, block_size: usize) -> Result<Box<dyn PluginInstance>> {
        let features = HostFeatures::new(self.urids.clone(), block_size, self.has_worker);
        let instance = unsafe { self.plugin.instantiate(sample_rate, features.refs()) };
        let Some(instance) = instance else {
            let missing: Vec<String> = self
                .required_features()
                .into_iter()
                .filter(|uri| !features.provides(uri))
                .collect();
            let reason = if missing.is_empty() {
                "plugin refused to instantiate".to_string()
            } else {
                format!("unsupported required features: {}", missing.join(", "))
            };
            return Err(Error::InstanceCreationFailed {
                plugin: self.uri.clone(),
                reason,
            });
        };
        Ok(Box::new(Lv2Instance::new(
            instance,
            &self.atom_ports,
            self.urids.map(uris::ATOM_SEQUENCE),
            self.urids.map(uris::ATOM_CHUNK),
            self.has_worker,
            features,
        )))
    }

    fn preset_values(&self, label: &str) -> Option<Vec<(String, f32)>> {
        let (preset, _) = self.presets().into_iter().find(|(_, title)| title == label)?;
        let w = &self.world.world;
        let port = w.new_uri(uris::LV2_PORT);
        let symbol = w.new_uri(uris::LV2_SYMBOL);
        let value = w.new_uri(uris::PRESETS_VALUE);
        let values = w
            .find_nodes(Some(&preset), &port, None)
            .iter()
            .filter_map(|entry| {
                Some((
                    self.world.first_string(&entry, &symbol)?,
                    self.world.first_number(&entry, &value)?,
                ))
            })
            .collect::<Vec<_>>();
        info!("Preset {label} sets {} ports", values.len());
        Some(values)
    }
}

fn classify_ports(world: &World, plugin: &Plugin) -> Result<Vec<PortInfo>> {
    let input = world.new_uri(uris::LV2_INPUT_PORT);
    let output = world.new_uri(uris::LV2_OUTPUT_PORT);
    let audio = world.new_uri(uris::LV2_AUDIO_PORT);
    let control = world.new_uri(uris::LV2_CONTROL_PORT);
    let atom = world.new_uri(uris::ATOM_ATOM_PORT);
    let optional = world.new_uri(uris::LV2_CONNECTION_OPTIONAL);
    let free_wheeling = world.new_uri(uris::LV2_FREE_WHEELING);
    let reports_latency = world.new_uri(uris::LV2_REPORTS_LATENCY);

    let mut ports = vec![];
    for port in plugin.iter_ports() {
        let index = port.index();
        let symbol = port
            .symbol()
            .and_then(|node| node.as_str().map(str::to_string))
            .unwrap_or_else(|| format!("port{index}"));
        let is_input = port.is_a(&input);
        let is_output = port.is_a(&output);
        let unsupported = |reason| Error::UnsupportedPort {
            port: symbol.clone(),
            reason,
        };
        let kind = if port.is_a(&audio) {
            match (is_input, is_output) {
                (true, _) => PortKind::AudioInput,
                (_, true) => PortKind::AudioOutput,
                _ => return Err(unsupported("audio port is neither input nor output")),
            }
        } else if port.is_a(&control) {
            match (is_input, is_output) {
                (true, _) => PortKind::ControlInput,
                (_, true) => PortKind::ControlOutput,
                _ => return Err(unsupported("control port is neither input nor output")),
            }
        } else if port.is_a(&atom) {
            if is_input {
                PortKind::AtomInput
            } else {
                PortKind::AtomOutput
            }
        } else if port.has_property(&optional) {
            PortKind::Unconnected
        } else {
            return Err(unsupported("required port of an unknown type"));
        };

        let mut info = PortInfo::new(index, &symbol, kind);
        if let Some(name) = port.name().and_then(|node| node.as_str().map(str::to_string)) {
            info.name = name;
        }
        if kind == PortKind::ControlInput {
            let range = port.range();
            info.default = range.default.and_then(|node| node.as_float());
            info.min = range.minimum.and_then(|node| node.as_float());
            info.max = range.maximum.and_then(|node| node.as_float());
            info.free_wheeling = port.has_property(&free_wheeling);
        }
        if kind == PortKind::ControlOutput {
            info.reports_latency = port.has_property(&reports_latency);
        }
        ports.push(info);
    }
    Ok(ports)
}
