//! Configuration for the tiered store (spec §6.4).

use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub hot_limit: usize,
    pub warm_limit: usize,
    pub access_threshold: u32,
    pub decay_interval_ms: u64,
    pub cold_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            hot_limit: 1_000,
            warm_limit: 10_000,
            access_threshold: 10,
            decay_interval_ms: 60_000,
            cold_path: PathBuf::from("./vsm-cold-store"),
        }
    }
}

pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: StoreConfig::default(),
        }
    }

    pub fn hot_limit(mut self, n: usize) -> Self {
        self.config.hot_limit = n;
        self
    }

    pub fn warm_limit(mut self, n: usize) -> Self {
        self.config.warm_limit = n;
        self
    }

    pub fn access_threshold(mut self, n: u32) -> Self {
        self.config.access_threshold = n;
        self
    }

    pub fn decay_interval_ms(mut self, ms: u64) -> Self {
        self.config.decay_interval_ms = ms;
        self
    }

    pub fn cold_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cold_path = path.into();
        self
    }

    pub fn build(self) -> StoreConfig {
        self.config
    }
}

impl Default for StoreConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
