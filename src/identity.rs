use tracing::debug;

use crate::config::IdentityConfig;
use crate::error::Result;
use crate::fingerprint::{CompareMethod, Fingerprint};
use crate::registry::VehicleRegistry;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub id: u32,
    pub similarity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Identity {
    Existing(Match),
    /// First sighting, the caller owes a snapshot
    New(u32),
}

impl Identity {
    #[inline]
    pub fn id(&self) -> u32 {
        match self {
            Identity::Existing(m) => m.id,
            Identity::New(id) => *id,
        }
    }

    #[inline]
    pub fn is_new(&self) -> bool {
        matches!(self, Identity::New(_))
    }
}

/// Appearance-only re-identification over the registry's lookback window
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    threshold: f32,
    method: CompareMethod,
}

impl IdentityResolver {
    pub fn new(threshold: f32, method: CompareMethod) -> Self {
        Self { threshold, method }
    }

    pub fn from_config(config: &IdentityConfig) -> Self {
        Self::new(config.similarity_threshold, config.method)
    }

    /// Best match among the most recent vehicles, strictly above the threshold.
    ///
    /// Candidates are scanned most-recent-first and only a strictly better
    /// score replaces the current best, so on ties the most recently
    /// created-or-updated vehicle wins.
    pub fn resolve(
        &self,
        registry: &VehicleRegistry,
        fingerprint: &Fingerprint,
    ) -> Result<Option<Match>> {
        let mut best: Option<Match> = None;

        for track in registry.recent() {
            let similarity = fingerprint.similarity(&track.fingerprint, self.method)?;

            if best.map_or(!similarity.is_nan(), |b| similarity > b.similarity) {
                best = Some(Match {
                    id: track.id,
                    similarity,
                });
            }
        }

        Ok(best.filter(|m| m.similarity > self.threshold))
    }

    #[inline]
    pub fn register_new(&self, registry: &mut VehicleRegistry, fingerprint: Fingerprint) -> u32 {
        registry.create(fingerprint)
    }

    /// Resolves and commits: a match overwrites the stored fingerprint, a miss allocates a new id
    pub fn identify(
        &self,
        registry: &mut VehicleRegistry,
        fingerprint: Fingerprint,
    ) -> Result<Identity> {
        match self.resolve(registry, &fingerprint)? {
            Some(m) => {
                registry.update(m.id, fingerprint)?;
                debug!(id = m.id, similarity = m.similarity, "vehicle matched");

                Ok(Identity::Existing(m))
            }
            None => {
                let id = self.register_new(registry, fingerprint);
                debug!(id, "new vehicle");

                Ok(Identity::New(id))
            }
        }
    }
}
