// Engine configuration
// The engine takes these as plain values; only the binaries read the environment.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_EXECUTE_URL: &str = "https://emkc.org/api/v2/piston/execute";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

/// Settings for the remote compile-and-run service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub endpoint: String,
    /// Language identifier understood by the service
    pub language: String,
    /// "*" asks the service for its latest version
    pub version: String,
    pub file_name: String,
    /// How long the compiling and running phases stay visible
    pub phase_delay_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_EXECUTE_URL.to_string(),
            language: "kotlin".to_string(),
            version: "*".to_string(),
            file_name: "Main.kt".to_string(),
            phase_delay_ms: 600,
        }
    }
}

impl RemoteConfig {
    pub fn phase_delay(&self) -> Duration {
        Duration::from_millis(self.phase_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Upper bound on timer callbacks fired during one evaluation
    pub max_timer_callbacks: u32,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_timer_callbacks: 100_000,
        }
    }
}

impl EngineConfig {
    /// Build a config from `DOJO_*` environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("DOJO_EXECUTE_URL") {
            config.remote.endpoint = url;
        }
        if let Some(delay) = parse_var(&lookup, "DOJO_PHASE_DELAY_MS") {
            config.remote.phase_delay_ms = delay;
        }
        if let Some(limit) = parse_var(&lookup, "DOJO_MAX_TIMER_CALLBACKS") {
            config.sandbox.max_timer_callbacks = limit;
        }

        config
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = key, value = %raw, "Ignoring unparseable setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.remote.version, "*");
        assert_eq!(config.remote.file_name, "Main.kt");
        assert_eq!(config.remote.phase_delay(), Duration::from_millis(600));
        assert_eq!(config.sandbox.max_timer_callbacks, 100_000);
    }

    #[test]
    fn test_overrides_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("DOJO_EXECUTE_URL", "http://localhost:2000/api/v2/execute"),
            ("DOJO_PHASE_DELAY_MS", "0"),
            ("DOJO_MAX_TIMER_CALLBACKS", "not-a-number"),
        ]);

        let config = EngineConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.remote.endpoint, "http://localhost:2000/api/v2/execute");
        assert_eq!(config.remote.phase_delay_ms, 0);
        assert_eq!(config.sandbox.max_timer_callbacks, 100_000);
    }
}
