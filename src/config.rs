use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use lv2file_engine::DEFAULT_BLOCK_SIZE;
use serde::Deserialize;

pub const CONFIG_ENV: &str = "LV2FILE_CONFIG";
pub const MIXDOWN_ENV: &str = "LV2FILE_MIXDOWN";
pub const IGNORE_CLIPPING_ENV: &str = "LV2FILE_IGNORE_CLIPPING";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub block_size: usize,
    pub mixdown: bool,
    pub check_clipping: bool,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            mixdown: false,
            check_clipping: true,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// File settings (explicit path, else `$LV2FILE_CONFIG`, else defaults)
    /// with the environment flags applied on top.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
        let mut settings = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        settings.apply_env(env_flag);
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Flags only ever switch a behaviour on; an unset flag leaves the file
    /// value alone.
    fn apply_env(&mut self, flag: impl Fn(&str) -> bool) {
        if flag(MIXDOWN_ENV) {
            self.mixdown = true;
        }
        if flag(IGNORE_CLIPPING_ENV) {
            self.check_clipping = false;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            bail!("block_size must be at least 1");
        }
        Ok(())
    }
}

pub fn env_flag(key: &str) -> bool {
    std::env::var(key).ok().is_some_and(|v| parse_flag(&v))
}

fn parse_flag(value: &str) -> bool {
    let s = value.trim().to_ascii_lowercase();
    s == "1" || s == "true" || s == "yes" || s == "on"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_without_a_file() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.block_size, 512);
        assert!(settings.check_clipping);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let settings = Settings::from_toml("block_size = 64\nmixdown = true\n").unwrap();
        assert_eq!(settings.block_size, 64);
        assert!(settings.mixdown);
        assert!(settings.check_clipping);
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Settings::from_toml("blocksize = 64").is_err());
    }

    #[test]
    fn zero_block_size_is_invalid() {
        let settings = Settings::from_toml("block_size = 0").unwrap();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn env_flags_switch_behaviour_on() {
        let mut settings = Settings::default();
        settings.apply_env(|key| key == MIXDOWN_ENV || key == IGNORE_CLIPPING_ENV);
        assert!(settings.mixdown);
        assert!(!settings.check_clipping);

        let mut settings = Settings::default();
        settings.apply_env(|_| false);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn flag_spellings() {
        for on in ["1", "true", "YES", " on "] {
            assert!(parse_flag(on), "{on}");
        }
        for off in ["0", "false", "", "maybe"] {
            assert!(!parse_flag(off), "{off}");
        }
    }

    #[test]
    fn explicit_file_is_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_level = \"debug\"").unwrap();
        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::from_file(&dir.path().join("absent.toml")).is_err());
    }
}
