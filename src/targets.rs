use serde::Serialize;

use crate::aggregate::ResolutionTable;
use crate::domain::{CanonicalId, EntityId};
use crate::error::ResolveError;
use crate::extract::{AccessionExtractor, TargetBlock};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetInfo {
    pub ttd_target_id: EntityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uniprotkb: Option<Vec<CanonicalId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bioclass: Option<String>,
}

impl TargetInfo {
    pub fn from_block(block: &TargetBlock, table: &ResolutionTable) -> Self {
        Self {
            ttd_target_id: block.entity_id.clone(),
            uniprotkb: table
                .get(&block.entity_id)
                .map(|ids| ids.iter().cloned().collect()),
            target_type: block.field("TARGTYPE").map(str::to_lowercase),
            bioclass: block.field("BIOCLASS").map(str::to_string),
        }
    }

    pub fn curie(&self) -> String {
        match self.uniprotkb.as_ref().and_then(|ids| ids.first()) {
            Some(id) => format!("UniProtKB:{id}"),
            None => format!("ttd_target_id:{}", self.ttd_target_id),
        }
    }
}

pub fn target_infos(
    extractor: &AccessionExtractor,
    table: &ResolutionTable,
) -> Result<Vec<TargetInfo>, ResolveError> {
    extractor
        .blocks()?
        .map(|block| block.map(|block| TargetInfo::from_block(&block, table)))
        .collect()
}
