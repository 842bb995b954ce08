use anyhow::{Context, Result};
use std::env;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

/// Engine configuration. Provider API keys are optional: an absent key
/// leaves that provider unconfigured and the aggregator skips it.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub provider_timeout_secs: u64,
    pub banking_api_key: Option<String>,
    pub processor_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: "info".to_string(),
            provider_timeout_secs: 10,
            banking_api_key: None,
            processor_api_key: None,
        }
    }
}

impl Config {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}

/// Load configuration: defaults, then an optional `KEY=VALUE` file named
/// by `TRUST_ENGINE_CONFIG`, then environment variable overrides.
pub fn load_config() -> Result<Config> {
    dotenv::dotenv().ok();

    let mut config = Config::default();

    if let Ok(path) = env::var("TRUST_ENGINE_CONFIG") {
        load_from_file(&mut config, Path::new(&path))?;
    }

    load_from_env(&mut config);

    Ok(config)
}

/// Apply environment variable overrides
fn load_from_env(config: &mut Config) {
    if let Ok(level) = env::var("LOG_LEVEL") {
        config.log_level = level;
    }

    if let Ok(secs) = env::var("PROVIDER_TIMEOUT_SECS") {
        if let Ok(secs) = secs.parse() {
            config.provider_timeout_secs = secs;
        }
    }

    if let Ok(key) = env::var("BANKING_API_KEY") {
        config.banking_api_key = Some(key);
    }

    if let Ok(key) = env::var("PROCESSOR_API_KEY") {
        config.processor_api_key = Some(key);
    }
}

/// Load configuration from a file
fn load_from_file(config: &mut Config, path: &Path) -> Result<()> {
    let file = File::open(path).context("Failed to open configuration file")?;
    let reader = BufReader::new(file);

    for line in reader.lines() {
        let line = line.context("Failed to read line from configuration file")?;
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(index) = line.find('=') {
            let key = line[..index].trim();
            let value = line[index + 1..].trim();

            match key {
                "LOG_LEVEL" => config.log_level = value.to_string(),
                "PROVIDER_TIMEOUT_SECS" => {
                    if let Ok(secs) = value.parse() {
                        config.provider_timeout_secs = secs;
                    }
                }
                "BANKING_API_KEY" => config.banking_api_key = Some(value.to_string()),
                "PROCESSOR_API_KEY" => config.processor_api_key = Some(value.to_string()),
                _ => {}
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_leave_providers_unconfigured() {
        let config = Config::default();
        assert!(config.banking_api_key.is_none());
        assert!(config.processor_api_key.is_none());
        assert_eq!(config.provider_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_file_overlay() {
        let dir = env::temp_dir();
        let path = dir.join(format!("trust_engine_config_{}", std::process::id()));
        let mut file = File::create(&path).unwrap();
        writeln!(file, "# engine settings").unwrap();
        writeln!(file, "PROVIDER_TIMEOUT_SECS = 3").unwrap();
        writeln!(file, "BANKING_API_KEY = bank-key-123").unwrap();

        let mut config = Config::default();
        load_from_file(&mut config, &path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.provider_timeout_secs, 3);
        assert_eq!(config.banking_api_key.as_deref(), Some("bank-key-123"));
        assert!(config.processor_api_key.is_none());
    }
}
