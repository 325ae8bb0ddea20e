//! Registry configuration

use std::path::PathBuf;

use proven_append_log::StreamConfig;
use serde::{Deserialize, Serialize};

/// Prefix every stream path starts with unless configured otherwise.
pub const DEFAULT_PREFIX: &str = "/2/";

/// Configuration for a file-backed streams store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamsStoreConfig {
    /// Directory holding one log file per stream key
    pub dir: PathBuf,
    /// Path prefix that marks a node path as a stream (default: "/2/")
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Settings applied to every stream opened by the store
    #[serde(default)]
    pub stream: StreamConfig,
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

impl StreamsStoreConfig {
    /// Create a new configuration with the given directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: default_prefix(),
            stream: StreamConfig::default(),
        }
    }

    /// Use a different path prefix
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Use the given per-stream settings
    #[must_use]
    pub fn with_stream_config(mut self, stream: StreamConfig) -> Self {
        self.stream = stream;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_with_defaults() {
        let config: StreamsStoreConfig =
            serde_json::from_str(r#"{"dir":"/var/lib/streams"}"#).unwrap();

        assert_eq!(config, StreamsStoreConfig::new("/var/lib/streams"));
        assert_eq!(config.prefix, "/2/");
        assert!(!config.stream.sync_writes);
    }

    #[test]
    fn test_deserialize_overrides() {
        let config: StreamsStoreConfig = serde_json::from_str(
            r#"{"dir":"data","prefix":"/streams/","stream":{"sync_writes":true}}"#,
        )
        .unwrap();

        assert_eq!(
            config,
            StreamsStoreConfig::new("data")
                .with_prefix("/streams/")
                .with_stream_config(StreamConfig::new().with_sync_writes(true))
        );
    }
}
