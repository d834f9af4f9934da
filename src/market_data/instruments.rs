// Maps venue (market, asset) pairs to instrument ids
use ahash::AHashMap;

use crate::engine::types::{Instrument, InstrumentId};

pub trait InstrumentResolver: Send + Sync {
    fn resolve(&self, market: &str, asset: &str) -> Option<InstrumentId>;
    fn find(&self, instrument_id: &InstrumentId) -> Option<Instrument>;
    fn all(&self) -> Vec<Instrument>;
}

/// Resolver over a fixed instrument list loaded at startup.
#[derive(Debug, Default)]
pub struct StaticInstrumentResolver {
    by_venue: AHashMap<(String, String), InstrumentId>,
    by_id: AHashMap<InstrumentId, Instrument>,
    order: Vec<InstrumentId>,
}

impl StaticInstrumentResolver {
    pub fn new(instruments: impl IntoIterator<Item = Instrument>) -> Self {
        let mut resolver = Self::default();
        for instrument in instruments {
            resolver.insert(instrument);
        }
        resolver
    }

    pub fn insert(&mut self, instrument: Instrument) {
        let id = instrument.id.clone();
        self.by_venue
            .insert((instrument.market.clone(), instrument.asset.clone()), id.clone());
        if self.by_id.insert(id.clone(), instrument).is_none() {
            self.order.push(id);
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl InstrumentResolver for StaticInstrumentResolver {
    fn resolve(&self, market: &str, asset: &str) -> Option<InstrumentId> {
        self.by_venue
            .get(&(market.to_string(), asset.to_string()))
            .cloned()
    }

    fn find(&self, instrument_id: &InstrumentId) -> Option<Instrument> {
        self.by_id.get(instrument_id).cloned()
    }

    fn all(&self) -> Vec<Instrument> {
        self.order
            .iter()
            .filter_map(|id| self.by_id.get(id).cloned())
            .collect()
    }
}
