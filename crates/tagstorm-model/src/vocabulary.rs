use rand::Rng;

use crate::{
    DEFAULT_COUNTERS, DEFAULT_DEVICES, DEFAULT_LOCATIONS, ModelError, ModelResult,
    TaggedIncrement,
};

/// Fixed label vocabularies the load generator draws from.
///
/// Built once at startup and shared read-only between all units of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    locations: Vec<String>,
    devices: Vec<String>,
    counters: Vec<String>,
}

impl Vocabulary {
    /// Generate `city{i}`, `version{i}` and `counter{i}` sequences of the given sizes.
    ///
    /// Every dimension must contain at least one entry, otherwise a draw would be impossible.
    pub fn generate(locations: usize, devices: usize, counters: usize) -> ModelResult<Self> {
        if locations == 0 {
            return Err(ModelError::EmptyDimension("locations"));
        }
        if devices == 0 {
            return Err(ModelError::EmptyDimension("devices"));
        }
        if counters == 0 {
            return Err(ModelError::EmptyDimension("counters"));
        }

        Ok(Self {
            locations: numbered("city", locations),
            devices: numbered("version", devices),
            counters: numbered("counter", counters),
        })
    }

    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    pub fn devices(&self) -> &[String] {
        &self.devices
    }

    pub fn counters(&self) -> &[String] {
        &self.counters
    }

    /// Draw one event uniformly at random from each dimension.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> TaggedIncrement<'_> {
        TaggedIncrement {
            city: pick(&self.locations, rng),
            device: pick(&self.devices, rng),
            counter: pick(&self.counters, rng),
        }
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            locations: numbered("city", DEFAULT_LOCATIONS),
            devices: numbered("version", DEFAULT_DEVICES),
            counters: numbered("counter", DEFAULT_COUNTERS),
        }
    }
}

fn numbered(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{prefix}{i}")).collect()
}

// Dimensions are non-empty by construction.
fn pick<'a, R: Rng>(values: &'a [String], rng: &mut R) -> &'a str {
    &values[rng.gen_range(0..values.len())]
}
