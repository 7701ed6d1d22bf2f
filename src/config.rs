//! Configuration for seglog
//!
//! Segment thresholds and the starting offset of a brand-new log.

/// Default store and index rollover threshold (bytes)
pub const DEFAULT_MAX_BYTES: u64 = 1024;

/// Main configuration for a log instance
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Per-segment limits
    pub segment: SegmentConfig,
}

/// Segment configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentConfig {
    /// Roll over once the store file reaches this many bytes
    pub max_store_bytes: u64,

    /// Roll over once the index reaches this many bytes.
    /// Also the pre-allocated (mapped) size of every index file.
    pub max_index_bytes: u64,

    /// First offset assigned in an empty log
    pub initial_offset: u64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            max_store_bytes: DEFAULT_MAX_BYTES,
            max_index_bytes: DEFAULT_MAX_BYTES,
            initial_offset: 0,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Replace unset (zero) thresholds with the defaults
    pub fn with_defaults(mut self) -> Self {
        if self.segment.max_store_bytes == 0 {
            self.segment.max_store_bytes = DEFAULT_MAX_BYTES;
        }
        if self.segment.max_index_bytes == 0 {
            self.segment.max_index_bytes = DEFAULT_MAX_BYTES;
        }
        self
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the store rollover threshold (in bytes)
    pub fn max_store_bytes(mut self, bytes: u64) -> Self {
        self.config.segment.max_store_bytes = bytes;
        self
    }

    /// Set the index rollover threshold and capacity (in bytes)
    pub fn max_index_bytes(mut self, bytes: u64) -> Self {
        self.config.segment.max_index_bytes = bytes;
        self
    }

    /// Set the offset assigned to the first record of a new log
    pub fn initial_offset(mut self, offset: u64) -> Self {
        self.config.segment.initial_offset = offset;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
