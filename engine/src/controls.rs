use crate::error::{Error, Result};
use crate::plugins::PortLayout;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ControlAssignment {
    pub symbol: String,
    pub value: f32,
}

/// Parses `symbol:value[,symbol:value]*` arguments.
pub fn parse_assignments<S: AsRef<str>>(arguments: &[S]) -> Result<Vec<ControlAssignment>> {
    let mut assignments = vec![];
    for argument in arguments {
        for pair in argument.as_ref().split(',') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let malformed = |reason| Error::MalformedControlValue {
                pair: pair.to_string(),
                reason,
            };
            let Some((symbol, value)) = pair.split_once(':') else {
                return Err(malformed("expected colon between port and value"));
            };
            let symbol = symbol.trim();
            if symbol.is_empty() {
                return Err(malformed("missing port symbol"));
            }
            let value = value
                .trim()
                .parse::<f32>()
                .map_err(|_| malformed("value is not a number"))?;
            assignments.push(ControlAssignment {
                symbol: symbol.to_string(),
                value,
            });
        }
    }
    Ok(assignments)
}

/// Initial value of a control port without a user or preset value.
pub fn starting_value(default: Option<f32>, min: Option<f32>, max: Option<f32>) -> f32 {
    match (default, min, max) {
        (Some(default), _, _) => default,
        (None, None, None) => 0.0,
        (None, None, Some(max)) => max.min(0.0),
        (None, Some(min), None) => min.max(0.0),
        (None, Some(min), Some(max)) => (min + max) / 2.0,
    }
}

/// Values of every control input port, in layout order.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlValues {
    symbols: Vec<String>,
    values: Vec<f32>,
}

impl ControlValues {
    /// Declared defaults, with the free-wheeling port (if any) switched on.
    pub fn from_layout(layout: &PortLayout) -> Self {
        let mut symbols = vec![];
        let mut values = vec![];
        for port in layout.control_inputs() {
            let value = if port.free_wheeling {
                1.0
            } else {
                starting_value(port.default, port.min, port.max)
            };
            symbols.push(port.symbol.clone());
            values.push(value);
        }
        Self { symbols, values }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn get(&self, symbol: &str) -> Option<f32> {
        self.position(symbol).map(|i| self.values[i])
    }

    fn position(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    /// Applies assignments in order; returns the symbols that matched no port.
    pub fn apply<'a, I>(&mut self, assignments: I) -> Vec<String>
    where
        I: IntoIterator<Item = (&'a str, f32)>,
    {
        let mut unknown = vec![];
        for (symbol, value) in assignments {
            match self.position(symbol) {
                Some(i) => {
                    debug!("Setting control port {symbol} to {value}");
                    self.values[i] = value;
                }
                None => {
                    warn!("Port with symbol {symbol} does not exist");
                    unknown.push(symbol.to_string());
                }
            }
        }
        unknown
    }

    pub fn apply_assignments(&mut self, assignments: &[ControlAssignment]) -> Vec<String> {
        self.apply(assignments.iter().map(|a| (a.symbol.as_str(), a.value)))
    }
}
