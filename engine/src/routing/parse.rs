use crate::error::{Error, Result};

/// Highest instance number a rule may name.
pub const MAX_INSTANCES: usize = 1024;

/// One `channel:port[.instance]` assignment, indices as written (1-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingRule {
    pub channel: usize,
    pub port: String,
    pub instance: usize,
}

/// Parses every connection argument into rules.
///
/// Each argument holds comma separated rules. The instance suffix may also be
/// written in front of the port (`channel:instance.port`); port symbols never
/// start with a digit, so the two spellings cannot be confused. Port text is
/// kept as written and matched against the plugin later.
pub fn parse_rules<S: AsRef<str>>(arguments: &[S]) -> Result<Vec<RoutingRule>> {
    let mut rules = vec![];
    for argument in arguments {
        for text in argument.as_ref().split(',') {
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            rules.push(parse_rule(text)?);
        }
    }
    Ok(rules)
}

fn parse_rule(text: &str) -> Result<RoutingRule> {
    let malformed = |reason| Error::MalformedRoutingRule {
        rule: text.to_string(),
        reason,
    };

    let Some((channel, target)) = text.split_once(':') else {
        return Err(malformed("expected colon between channel and port"));
    };
    let channel = channel
        .trim()
        .parse::<usize>()
        .map_err(|_| malformed("channel is not a number"))?;

    let (port, instance) = match target.split_once('.') {
        None => (target, "1"),
        Some((port, instance)) if is_number(instance) => (port, instance),
        Some((instance, port)) if is_number(instance) => (port, instance),
        Some(_) => return Err(malformed("instance is not a number")),
    };
    let instance = instance
        .parse::<usize>()
        .map_err(|_| malformed("instance out of range"))?;
    if instance == 0 {
        return Err(malformed("instances are numbered from 1"));
    }
    if instance > MAX_INSTANCES {
        return Err(malformed("instance out of range"));
    }

    Ok(RoutingRule {
        channel,
        port: port.to_string(),
        instance,
    })
}

fn is_number(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}
