mod default;
mod parse;

pub use default::DefaultPolicy;
pub use parse::{MAX_INSTANCES, RoutingRule, parse_rules};

use crate::error::{Error, Result};
use tracing::{info, warn};

/// Which channels feed which input port of which instance.
///
/// Stored flat, instance-major, then port, then channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionMatrix {
    instances: usize,
    ports: usize,
    channels: usize,
    cells: Vec<bool>,
}

impl ConnectionMatrix {
    pub fn new(instances: usize, ports: usize, channels: usize) -> Result<Self> {
        let cells = instances
            .checked_mul(ports)
            .and_then(|n| n.checked_mul(channels))
            .ok_or(Error::RoutingTooLarge {
                instances,
                ports,
                channels,
            })?;
        Ok(Self {
            instances,
            ports,
            channels,
            cells: vec![false; cells],
        })
    }

    pub fn instances(&self) -> usize {
        self.instances
    }

    pub fn ports(&self) -> usize {
        self.ports
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    fn cell(&self, instance: usize, port: usize, channel: usize) -> usize {
        assert!(
            instance < self.instances && port < self.ports && channel < self.channels,
            "connection ({instance}, {port}, {channel}) outside {}x{}x{}",
            self.instances,
            self.ports,
            self.channels
        );
        (instance * self.ports + port) * self.channels + channel
    }

    pub fn connect(&mut self, instance: usize, port: usize, channel: usize) {
        let cell = self.cell(instance, port, channel);
        self.cells[cell] = true;
    }

    pub fn is_connected(&self, instance: usize, port: usize, channel: usize) -> bool {
        self.cells[self.cell(instance, port, channel)]
    }

    /// Channels feeding one port, ascending.
    pub fn sources(&self, instance: usize, port: usize) -> impl Iterator<Item = usize> + '_ {
        assert!(
            instance < self.instances && port < self.ports,
            "port ({instance}, {port}) outside {}x{}",
            self.instances,
            self.ports
        );
        let start = (instance * self.ports + port) * self.channels;
        self.cells[start..start + self.channels]
            .iter()
            .enumerate()
            .filter_map(|(channel, connected)| connected.then_some(channel))
    }

    pub fn connection_count(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingSource {
    Explicit,
    Default(DefaultPolicy),
}

#[derive(Debug, Clone)]
pub struct Routing {
    pub matrix: ConnectionMatrix,
    pub source: RoutingSource,
    /// Port symbols named by rules that match no audio input.
    pub unknown_ports: Vec<String>,
}

impl Routing {
    pub fn instances(&self) -> usize {
        self.matrix.instances()
    }
}

/// Highest instance referenced by the rules, or `None` without rules.
pub fn instance_count(rules: &[RoutingRule]) -> Option<usize> {
    rules.iter().map(|rule| rule.instance).max()
}

/// Builds the connection matrix from explicit rules, falling back to the
/// default policy when there are none.
pub fn resolve<S: AsRef<str>>(
    rules: &[RoutingRule],
    input_ports: &[S],
    channels: usize,
    mixdown: bool,
) -> Result<Routing> {
    let Some(instances) = instance_count(rules) else {
        let policy = DefaultPolicy::choose(channels, input_ports.len(), mixdown)?;
        let matrix = policy.build(channels, input_ports.len())?;
        info!("Running {} instances of the plugin", matrix.instances());
        if policy == DefaultPolicy::Truncate {
            warn!("{}", policy.describe());
        } else {
            info!("{}", policy.describe());
        }
        return Ok(Routing {
            matrix,
            source: RoutingSource::Default(policy),
            unknown_ports: vec![],
        });
    };

    info!("Running {instances} instances of the plugin");
    let mut matrix = ConnectionMatrix::new(instances, input_ports.len(), channels)?;
    let mut unknown_ports = vec![];
    for rule in rules {
        if rule.channel == 0 || rule.channel > channels {
            return Err(Error::ChannelOutOfRange {
                channel: rule.channel,
                channels,
            });
        }
        match input_ports
            .iter()
            .position(|symbol| symbol.as_ref() == rule.port)
        {
            Some(port) => matrix.connect(rule.instance - 1, port, rule.channel - 1),
            None => {
                warn!("Port with symbol {} does not exist", rule.port);
                unknown_ports.push(rule.port.clone());
            }
        }
    }
    info!("Only making user specified connections");
    Ok(Routing {
        matrix,
        source: RoutingSource::Explicit,
        unknown_ports,
    })
}
