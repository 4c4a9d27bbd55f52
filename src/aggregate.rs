use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use crate::domain::{AttributionPolicy, CanonicalId, EntityId, RawMapping, ResolutionRecord};
use crate::extract::EntityIndex;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResolutionTable {
    entries: BTreeMap<EntityId, BTreeSet<CanonicalId>>,
}

impl ResolutionTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, entity_id: &EntityId) -> Option<&BTreeSet<CanonicalId>> {
        self.entries.get(entity_id)
    }

    pub fn contains(&self, entity_id: &EntityId) -> bool {
        self.entries.contains_key(entity_id)
    }

    pub fn records(&self) -> impl Iterator<Item = ResolutionRecord> + '_ {
        self.entries
            .iter()
            .map(|(entity_id, canonical_ids)| ResolutionRecord {
                entity_id: entity_id.clone(),
                canonical_ids: canonical_ids.clone(),
            })
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&EntityId, &CanonicalId)> {
        self.entries
            .iter()
            .flat_map(|(entity_id, ids)| ids.iter().map(move |id| (entity_id, id)))
    }

    fn insert(&mut self, entity_id: EntityId, canonical_id: CanonicalId) {
        self.entries.entry(entity_id).or_default().insert(canonical_id);
    }
}

impl FromIterator<ResolutionRecord> for ResolutionTable {
    fn from_iter<I: IntoIterator<Item = ResolutionRecord>>(records: I) -> Self {
        let mut table = ResolutionTable::default();
        for record in records {
            for canonical_id in record.canonical_ids {
                table.insert(record.entity_id.clone(), canonical_id);
            }
        }
        table
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolutionAggregator {
    policy: AttributionPolicy,
}

impl ResolutionAggregator {
    pub fn new(policy: AttributionPolicy) -> Self {
        Self { policy }
    }

    pub fn aggregate(&self, mappings: &[RawMapping], index: &EntityIndex) -> ResolutionTable {
        let unique: BTreeSet<&RawMapping> = mappings.iter().collect();
        let mut table = ResolutionTable::default();

        for mapping in unique {
            let owners = index.owners(&mapping.accession);
            let chosen: Vec<&EntityId> = match self.policy {
                AttributionPolicy::AllOwners => owners,
                AttributionPolicy::LastMatch => owners.last().copied().into_iter().collect(),
            };
            if chosen.is_empty() {
                debug!(accession = %mapping.accession, "mapping for unknown accession");
                continue;
            }
            for entity_id in chosen {
                table.insert(entity_id.clone(), mapping.canonical_id.clone());
            }
        }
        table
    }
}
