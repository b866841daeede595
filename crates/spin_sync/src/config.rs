//! Run-time tuning for the spinning primitives.
//!
//! The only knob is how many failed attempts a spinning thread makes before it yields to the scheduler.  The default
//! is [crate::backoff::DEFAULT_YIELD_TICKS].  It may be overridden for the whole process by setting
//! `SPIN_SYNC_YIELD_TICKS` before the first primitive which consults the global configuration is built; primitives
//! built with an explicit tick count ignore it.
use std::num::NonZeroUsize;

use once_cell::sync::OnceCell;

use crate::backoff::DEFAULT_YIELD_TICKS;
use crate::error::{ConfigError, Result};

/// Name of the environment variable read by [SpinConfig::from_env].
pub const YIELD_TICKS_VAR: &str = "SPIN_SYNC_YIELD_TICKS";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SpinConfig {
    yield_ticks: NonZeroUsize,
}

impl Default for SpinConfig {
    fn default() -> Self {
        Self {
            yield_ticks: DEFAULT_YIELD_TICKS,
        }
    }
}

impl SpinConfig {
    pub fn new(yield_ticks: NonZeroUsize) -> Self {
        Self { yield_ticks }
    }

    /// How many failed attempts before a spinning thread yields.
    pub fn yield_ticks(&self) -> NonZeroUsize {
        self.yield_ticks
    }

    /// Read the configuration from the process environment.  Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [SpinConfig::from_env], but reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut ret = Self::default();

        if let Some(raw) = lookup(YIELD_TICKS_VAR) {
            ret.yield_ticks = parse_nonzero(YIELD_TICKS_VAR, raw)?;
        }

        Ok(ret)
    }

    /// The process-wide configuration, resolved from the environment on first use.
    ///
    /// A malformed environment is logged and replaced with the defaults rather than failing every lock constructor in
    /// the process.
    pub fn global() -> &'static SpinConfig {
        static GLOBAL: OnceCell<SpinConfig> = OnceCell::new();

        GLOBAL.get_or_init(|| match Self::from_env() {
            Ok(c) => {
                log::debug!("Resolved spin configuration: {:?}", c);
                c
            }
            Err(e) => {
                log::warn!("Ignoring spin configuration from the environment: {}", e);
                Self::default()
            }
        })
    }
}

fn parse_nonzero(variable: &'static str, raw: String) -> Result<NonZeroUsize> {
    let value = raw
        .trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::NotANumber {
            variable,
            value: raw.clone().into(),
        })?;
    NonZeroUsize::new(value).ok_or(ConfigError::Zero { variable })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(
        pairs: &'static [(&'static str, &'static str)],
    ) -> impl Fn(&str) -> Option<String> {
        move |name: &str| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn unset_means_default() {
        let got = SpinConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(got, SpinConfig::default());
        assert_eq!(got.yield_ticks(), DEFAULT_YIELD_TICKS);
    }

    #[test]
    fn reads_tick_count() {
        let got = SpinConfig::from_lookup(lookup_from(&[(YIELD_TICKS_VAR, " 64 ")])).unwrap();
        assert_eq!(got.yield_ticks().get(), 64);
    }

    #[test]
    fn rejects_zero() {
        let got = SpinConfig::from_lookup(lookup_from(&[(YIELD_TICKS_VAR, "0")]));
        assert_eq!(
            got,
            Err(ConfigError::Zero {
                variable: YIELD_TICKS_VAR
            })
        );
    }

    #[test]
    fn rejects_garbage() {
        let err = SpinConfig::from_lookup(lookup_from(&[(YIELD_TICKS_VAR, "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::NotANumber { .. }));
        assert!(err.to_string().contains("lots"));
    }
}
