use tracing_subscriber::{EnvFilter, fmt};

/// Level name after `-v`/`-q` adjustments, starting from the configured one.
pub fn effective_level(configured: &str, verbose: u8, quiet: u8) -> &'static str {
    const LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];
    let base = LEVELS
        .iter()
        .position(|level| level.eq_ignore_ascii_case(configured.trim()))
        .unwrap_or(3) as i32;
    let shifted = (base + i32::from(verbose) - i32::from(quiet)).clamp(0, 5);
    LEVELS[shifted as usize]
}

/// Diagnostics go to stderr; `RUST_LOG` wins over `level`.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}
