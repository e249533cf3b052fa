//! Ideal-range store: the per-parameter [min, max] bands the controller
//! steers toward. Readers take a snapshot; writers replace whole pairs
//! atomically. A pair with `min > max` is rejected without side effect.

use std::sync::RwLock;

use anyhow::{bail, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub min: f64,
    pub max: f64,
}

impl Band {
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if min > max {
            bail!("invalid range: min {min} exceeds max {max}");
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Snapshot of all three bands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranges {
    pub temp: Band,
    pub ph: Band,
    pub ec: Band,
}

impl Default for Ranges {
    // Lettuce defaults.
    fn default() -> Self {
        Self {
            temp: Band {
                min: 18.0,
                max: 24.0,
            },
            ph: Band { min: 5.5, max: 6.5 },
            ec: Band {
                min: 560.0,
                max: 840.0,
            },
        }
    }
}

pub struct IdealRanges {
    inner: RwLock<Ranges>,
}

impl IdealRanges {
    pub fn new() -> Self {
        Self::with(Ranges::default())
    }

    pub fn with(ranges: Ranges) -> Self {
        Self {
            inner: RwLock::new(ranges),
        }
    }

    pub fn snapshot(&self) -> Ranges {
        *self.inner.read().unwrap()
    }

    pub fn set_temp(&self, min: f64, max: f64) -> Result<()> {
        let band = Band::new(min, max)?;
        self.inner.write().unwrap().temp = band;
        Ok(())
    }

    pub fn set_ph(&self, min: f64, max: f64) -> Result<()> {
        let band = Band::new(min, max)?;
        self.inner.write().unwrap().ph = band;
        Ok(())
    }

    pub fn set_ec(&self, min: f64, max: f64) -> Result<()> {
        let band = Band::new(min, max)?;
        self.inner.write().unwrap().ec = band;
        Ok(())
    }
}

impl Default for IdealRanges {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_the_lettuce_bands() {
        let ranges = IdealRanges::new().snapshot();
        assert_eq!(ranges.temp, Band { min: 18.0, max: 24.0 });
        assert_eq!(ranges.ph, Band { min: 5.5, max: 6.5 });
        assert_eq!(ranges.ec, Band { min: 560.0, max: 840.0 });
    }

    #[test]
    fn invalid_pair_is_rejected_without_side_effect() {
        let store = IdealRanges::new();
        assert!(store.set_ph(7.0, 6.0).is_err());
        assert_eq!(store.snapshot().ph, Band { min: 5.5, max: 6.5 });

        store.set_ph(5.8, 6.2).unwrap();
        assert_eq!(store.snapshot().ph, Band { min: 5.8, max: 6.2 });
    }

    #[test]
    fn min_may_equal_max() {
        let store = IdealRanges::new();
        store.set_temp(20.0, 20.0).unwrap();
        assert!(store.snapshot().temp.contains(20.0));
        assert!(!store.snapshot().temp.contains(20.1));
    }
}
