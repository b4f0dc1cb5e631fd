//! Resolution plan cache.
//!
//! Keyed by the (writer, reader) fingerprint pair.  Entries are populated
//! lazily and never evicted.  Plans are built outside the lock: two threads
//! racing on the same new pair may both build one, and the first insert
//! wins.  Both plans are identical, so the loser is simply dropped.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::debug;

use super::ResolutionPlan;
use crate::error::Result;
use crate::schema::{Fingerprint, Schema};

type PlanKey = (Fingerprint, Fingerprint);

#[derive(Debug, Clone, Default)]
pub struct PlanCache {
    plans: Arc<RwLock<HashMap<PlanKey, Arc<ResolutionPlan>>>>,
}

impl PlanCache {
    pub fn new() -> Self { Self::default() }

    /// The process-wide cache used by readers that are not handed one.
    pub fn global() -> &'static PlanCache {
        static GLOBAL: OnceLock<PlanCache> = OnceLock::new();
        GLOBAL.get_or_init(PlanCache::new)
    }

    pub fn get_or_build(&self, writer: &Arc<Schema>, reader: &Arc<Schema>) -> Result<Arc<ResolutionPlan>> {
        let key = (writer.fingerprint(), reader.fingerprint());
        if let Some(plan) = self.plans.read().get(&key) {
            return Ok(Arc::clone(plan));
        }

        debug!(
            writer = %hex::encode(&key.0[..8]),
            reader = %hex::encode(&key.1[..8]),
            "resolution plan cache miss"
        );
        let plan = Arc::new(ResolutionPlan::new(Arc::clone(writer), Arc::clone(reader))?);
        Ok(Arc::clone(self.plans.write().entry(key).or_insert(plan)))
    }

    pub fn len(&self) -> usize { self.plans.read().len() }

    pub fn is_empty(&self) -> bool { self.plans.read().is_empty() }
}
