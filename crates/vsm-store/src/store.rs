//! Three-level tiered store: hot (in-memory map), warm (on-host indexed
//! table), cold (on-disk). Writes always land in hot; reads promote
//! up-tier once an entry's access count crosses `access_threshold`;
//! oversized tiers demote their least-accessed entry down one tier
//! (spec §4.2).

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::cold::ColdTier;
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tier {
    Hot,
    Warm,
    Cold,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct StoreStats {
    pub hot_count: usize,
    pub warm_count: usize,
    pub cold_count: usize,
}

pub struct TieredStore {
    config: StoreConfig,
    hot: BTreeMap<String, Vec<u8>>,
    warm: BTreeMap<String, Vec<u8>>,
    cold: ColdTier,
    access: HashMap<String, u32>,
}

impl TieredStore {
    pub fn open(config: StoreConfig) -> Result<Self> {
        let cold = ColdTier::open(&config.cold_path)?;
        Ok(Self {
            config,
            hot: BTreeMap::new(),
            warm: BTreeMap::new(),
            cold,
            access: HashMap::new(),
        })
    }

    pub fn tier_of(&self, key: &str) -> Option<Tier> {
        if self.hot.contains_key(key) {
            Some(Tier::Hot)
        } else if self.warm.contains_key(key) {
            Some(Tier::Warm)
        } else if self.cold.contains(key) {
            Some(Tier::Cold)
        } else {
            None
        }
    }

    /// Writes always land in hot.
    pub fn put(&mut self, key: impl Into<String>, value: Vec<u8>) -> Result<()> {
        let key = key.into();
        self.warm.remove(&key);
        self.cold.delete(&key)?;
        self.hot.insert(key.clone(), value);
        self.enforce_hot_limit()
    }

    /// `get(k) -> v | not_found`. Every call increments `k`'s access
    /// counter; crossing `access_threshold` promotes the entry up one
    /// tier, and promotion cascades if the new tier's count already
    /// clears its own threshold too.
    pub fn get(&mut self, key: &str) -> Result<Vec<u8>> {
        let value = match self.tier_of(key) {
            Some(Tier::Hot) => self.hot.get(key).cloned().unwrap(),
            Some(Tier::Warm) => self.warm.get(key).cloned().unwrap(),
            Some(Tier::Cold) => self.cold.get(key).unwrap(),
            None => return Err(StoreError::NotFound(key.to_string())),
        };

        let counter = self.access.entry(key.to_string()).or_insert(0);
        *counter += 1;

        self.promote_while_above_threshold(key)?;
        Ok(value)
    }

    pub fn delete(&mut self, key: &str) -> Result<()> {
        self.hot.remove(key);
        self.warm.remove(key);
        self.cold.delete(key)?;
        self.access.remove(key);
        Ok(())
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .hot
            .keys()
            .chain(self.warm.keys())
            .cloned()
            .chain(self.cold.keys())
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            hot_count: self.hot.len(),
            warm_count: self.warm.len(),
            cold_count: self.cold.len(),
        }
    }

    /// Access counters decay by 1 per decay interval; zero counters are
    /// dropped. Callers drive the interval (e.g. a `tokio::time::interval`
    /// in the owning facade) — this method applies exactly one tick.
    pub fn tick_decay(&mut self) {
        self.access.retain(|_, count| {
            *count = count.saturating_sub(1);
            *count > 0
        });
    }

    fn promote_while_above_threshold(&mut self, key: &str) -> Result<()> {
        loop {
            let count = *self.access.get(key).unwrap_or(&0);
            if count < self.config.access_threshold {
                break;
            }
            match self.tier_of(key) {
                Some(Tier::Cold) => {
                    let value = self.cold.get(key).expect("tier_of said cold");
                    self.cold.delete(key)?;
                    self.warm.insert(key.to_string(), value);
                    debug!(key, "promoted cold -> warm");
                    self.enforce_warm_limit()?;
                }
                Some(Tier::Warm) => {
                    let value = self.warm.remove(key).expect("tier_of said warm");
                    self.hot.insert(key.to_string(), value);
                    debug!(key, "promoted warm -> hot");
                    self.enforce_hot_limit()?;
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn enforce_hot_limit(&mut self) -> Result<()> {
        while self.hot.len() > self.config.hot_limit {
            let victim = least_accessed(&self.hot, &self.access);
            if let Some(victim) = victim {
                let value = self.hot.remove(&victim).expect("victim came from hot");
                self.warm.insert(victim.clone(), value);
                debug!(key = %victim, "demoted hot -> warm");
                self.enforce_warm_limit()?;
            } else {
                break;
            }
        }
        Ok(())
    }

    fn enforce_warm_limit(&mut self) -> Result<()> {
        while self.warm.len() > self.config.warm_limit {
            let victim = least_accessed(&self.warm, &self.access);
            if let Some(victim) = victim {
                let value = self.warm.remove(&victim).expect("victim came from warm");
                self.cold.put(&victim, value)?;
                debug!(key = %victim, "demoted warm -> cold");
            } else {
                break;
            }
        }
        Ok(())
    }
}

fn least_accessed(tier: &BTreeMap<String, Vec<u8>>, access: &HashMap<String, u32>) -> Option<String> {
    tier.keys()
        .min_by_key(|k| (access.get(*k).copied().unwrap_or(0), (*k).clone()))
        .cloned()
}
