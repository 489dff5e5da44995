use super::ConnectionMatrix;
use crate::error::{Error, Result};

/// Routing used when no connections were given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultPolicy {
    /// As many channels as ports, mapped by ordering.
    Ordered,
    /// All channels averaged into the single port of one instance.
    Downmix,
    /// One instance per channel on a single-port plugin.
    PerChannel,
    /// First channels mapped by ordering, the rest ignored.
    Truncate,
}

impl DefaultPolicy {
    /// Checks run in this order; ambiguous ratios depend on it.
    pub fn choose(channels: usize, ports: usize, mixdown: bool) -> Result<Self> {
        if ports == channels {
            Ok(Self::Ordered)
        } else if ports == 1 && mixdown {
            Ok(Self::Downmix)
        } else if ports == 1 {
            Ok(Self::PerChannel)
        } else if channels > ports {
            Ok(Self::Truncate)
        } else {
            Err(Error::InsufficientChannels { channels, ports })
        }
    }

    pub fn instance_count(self, channels: usize) -> usize {
        match self {
            Self::PerChannel => channels,
            Self::Ordered | Self::Downmix | Self::Truncate => 1,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::Ordered => "Mapping audio channels to plugin ports based on ordering",
            Self::Downmix => "Down mixing all channels to a single plugin input",
            Self::PerChannel => "Running an instance of the plugin per channel",
            Self::Truncate => "Extra channels ignored when mapping channels to plugin ports",
        }
    }

    pub fn build(self, channels: usize, ports: usize) -> Result<ConnectionMatrix> {
        let mut matrix = ConnectionMatrix::new(self.instance_count(channels), ports, channels)?;
        match self {
            Self::Ordered | Self::Truncate => {
                for port in 0..ports {
                    matrix.connect(0, port, port);
                }
            }
            Self::Downmix => {
                for channel in 0..channels {
                    matrix.connect(0, 0, channel);
                }
            }
            Self::PerChannel => {
                for channel in 0..channels {
                    matrix.connect(channel, 0, channel);
                }
            }
        }
        Ok(matrix)
    }
}
