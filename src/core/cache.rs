// Last accepted configuration, replaced wholesale and never moved backwards.
use crate::core::config::Configuration;

#[derive(Debug, Default)]
pub struct ConfigCache {
    current: Configuration,
}

/// Outcome of offering a decoded configuration to the cache.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Accept {
    /// Version strictly advanced.
    Advanced { from: u64, to: u64 },
    /// Same version as the cached config; replaced anyway.
    Unchanged,
    /// Older than the cached config; cache untouched.
    Regressed { cached: u64, offered: u64 },
}

impl ConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &Configuration {
        &self.current
    }

    pub fn version(&self) -> u64 {
        self.current.version()
    }

    pub fn offer(&mut self, config: Configuration) -> Accept {
        let cached = self.version();
        let offered = config.version();
        if offered < cached {
            return Accept::Regressed { cached, offered };
        }
        self.current = config;
        if offered > cached {
            Accept::Advanced {
                from: cached,
                to: offered,
            }
        } else {
            Accept::Unchanged
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Accept, ConfigCache};
    use crate::core::config::sample;

    #[test]
    fn starts_empty_at_version_zero() {
        let cache = ConfigCache::new();
        assert_eq!(cache.version(), 0);
        assert!(cache.current().servers.is_empty());
    }

    #[test]
    fn newer_config_replaces_wholesale() {
        let mut cache = ConfigCache::new();
        assert_eq!(cache.offer(sample(5)), Accept::Advanced { from: 0, to: 5 });
        assert_eq!(cache.current(), &sample(5));
    }

    #[test]
    fn same_version_is_replaced_without_advancing() {
        let mut cache = ConfigCache::new();
        cache.offer(sample(5));
        let mut same = sample(5);
        same.flags = 1;
        assert_eq!(cache.offer(same), Accept::Unchanged);
        assert_eq!(cache.current().flags, 1);
        assert_eq!(cache.version(), 5);
    }

    #[test]
    fn older_config_is_refused() {
        let mut cache = ConfigCache::new();
        cache.offer(sample(7));
        assert_eq!(
            cache.offer(sample(4)),
            Accept::Regressed {
                cached: 7,
                offered: 4
            }
        );
        assert_eq!(cache.version(), 7);
    }
}
