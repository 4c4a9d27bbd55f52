use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::domain::{Accession, EntityId};
use crate::error::ResolveError;

const ENTITY_FIELD: &str = "TARGETID";
const ACCESSION_FIELD: &str = "UNIPROID";

static ACCESSION_DELIMITERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[;/-]").expect("static pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetBlock {
    pub entity_id: EntityId,
    pub fields: Vec<(String, String)>,
}

impl TargetBlock {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name.contains(key))
            .map(|(_, value)| value.as_str())
    }

    pub fn accessions(&self) -> Vec<Accession> {
        let mut accessions = Vec::new();
        for (name, value) in &self.fields {
            if name.contains(ACCESSION_FIELD) {
                for accession in normalize_accessions(value) {
                    if !accessions.contains(&accession) {
                        accessions.push(accession);
                    }
                }
            }
        }
        accessions
    }
}

pub struct TargetBlocks<R: BufRead> {
    lines: Lines<R>,
    line_no: usize,
    header_rows: usize,
    current: Option<TargetBlock>,
    done: bool,
}

impl<R: BufRead> TargetBlocks<R> {
    pub fn new(reader: R, header_rows: usize) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            header_rows,
            current: None,
            done: false,
        }
    }

    fn next_line(&mut self) -> Option<Result<String, ResolveError>> {
        loop {
            let line = self.lines.next()?;
            self.line_no += 1;
            if self.line_no <= self.header_rows {
                if let Err(err) = line {
                    return Some(Err(ResolveError::Filesystem(err.to_string())));
                }
                continue;
            }
            return Some(line.map_err(|err| ResolveError::Filesystem(err.to_string())));
        }
    }
}

impl<R: BufRead> Iterator for TargetBlocks<R> {
    type Item = Result<TargetBlock, ResolveError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let line = match self.next_line() {
                Some(Ok(line)) => line,
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err));
                }
                None => {
                    self.done = true;
                    return self.current.take().map(Ok);
                }
            };

            let columns: Vec<&str> = line.trim_end_matches('\r').splitn(3, '\t').collect();
            if columns.iter().all(|column| column.trim().is_empty()) {
                if let Some(block) = self.current.take() {
                    return Some(Ok(block));
                }
                continue;
            }
            if columns.len() < 3 {
                self.done = true;
                return Some(Err(ResolveError::MalformedRow {
                    line: self.line_no,
                    message: format!(
                        "expected 3 tab-separated columns, found {}",
                        columns.len()
                    ),
                }));
            }

            let key = columns[1].trim();
            let value = columns[2].trim();
            if key.starts_with(ENTITY_FIELD) {
                let entity_id = match value.parse::<EntityId>() {
                    Ok(id) => id,
                    Err(_) => {
                        self.done = true;
                        return Some(Err(ResolveError::MalformedRow {
                            line: self.line_no,
                            message: "empty target id".to_string(),
                        }));
                    }
                };
                let finished = self.current.replace(TargetBlock {
                    entity_id,
                    fields: Vec::new(),
                });
                if let Some(block) = finished {
                    return Some(Ok(block));
                }
                continue;
            }

            match self.current.as_mut() {
                Some(block) => block.fields.push((key.to_string(), value.to_string())),
                None => tracing::debug!(line = self.line_no, "row outside of a target block"),
            }
        }
    }
}

// Splits a raw accession field into individual accessions.
// A parenthesis keeps only the text before it. Otherwise `;`, `/` and `-`
// all act as delimiters.
pub fn normalize_accessions(raw: &str) -> Vec<Accession> {
    if let Some((head, _)) = raw.split_once('(') {
        return head.parse::<Accession>().into_iter().collect();
    }
    if ACCESSION_DELIMITERS.is_match(raw) {
        return ACCESSION_DELIMITERS
            .split(raw)
            .filter_map(|part| part.parse::<Accession>().ok())
            .collect();
    }
    raw.parse::<Accession>().into_iter().collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityAccessions {
    pub entity_id: EntityId,
    pub accessions: Vec<Accession>,
}

pub struct AccessionExtractor {
    path: PathBuf,
    header_rows: usize,
}

impl AccessionExtractor {
    pub fn open(path: impl Into<PathBuf>, header_rows: usize) -> Result<Self, ResolveError> {
        let path = path.into();
        if !path.is_file() {
            return Err(ResolveError::SourceNotFound(path));
        }
        Ok(Self { path, header_rows })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn blocks(&self) -> Result<TargetBlocks<BufReader<File>>, ResolveError> {
        let file = File::open(&self.path).map_err(|err| {
            ResolveError::Filesystem(format!("open {}: {err}", self.path.display()))
        })?;
        Ok(TargetBlocks::new(BufReader::new(file), self.header_rows))
    }

    pub fn entities(
        &self,
    ) -> Result<impl Iterator<Item = Result<EntityAccessions, ResolveError>>, ResolveError> {
        Ok(self.blocks()?.filter_map(|block| match block {
            Ok(block) => {
                let accessions = block.accessions();
                (!accessions.is_empty()).then(|| {
                    Ok(EntityAccessions {
                        entity_id: block.entity_id,
                        accessions,
                    })
                })
            }
            Err(err) => Some(Err(err)),
        }))
    }

    pub fn index(&self) -> Result<EntityIndex, ResolveError> {
        EntityIndex::from_entities(self.entities()?)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EntityIndex {
    entities: Vec<EntityAccessions>,
    positions: HashMap<EntityId, usize>,
    owners: HashMap<Accession, Vec<usize>>,
}

impl EntityIndex {
    pub fn from_entities<I>(entities: I) -> Result<Self, ResolveError>
    where
        I: IntoIterator<Item = Result<EntityAccessions, ResolveError>>,
    {
        let mut index = EntityIndex::default();
        for entity in entities {
            index.insert(entity?);
        }
        Ok(index)
    }

    pub fn insert(&mut self, entity: EntityAccessions) {
        let position = match self.positions.get(&entity.entity_id) {
            Some(&position) => position,
            None => {
                let position = self.entities.len();
                self.positions.insert(entity.entity_id.clone(), position);
                self.entities.push(EntityAccessions {
                    entity_id: entity.entity_id,
                    accessions: Vec::new(),
                });
                position
            }
        };
        for accession in entity.accessions {
            let slot = &mut self.entities[position];
            if slot.accessions.contains(&accession) {
                continue;
            }
            slot.accessions.push(accession.clone());
            self.owners.entry(accession).or_default().push(position);
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities(&self) -> &[EntityAccessions] {
        &self.entities
    }

    pub fn unique_accessions(&self) -> BTreeSet<Accession> {
        self.owners.keys().cloned().collect()
    }

    pub fn owners(&self, accession: &Accession) -> Vec<&EntityId> {
        self.owners
            .get(accession)
            .map(|positions| {
                positions
                    .iter()
                    .map(|&position| &self.entities[position].entity_id)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use assert_matches::assert_matches;

    use super::*;

    fn accs(values: &[&str]) -> Vec<Accession> {
        values.iter().map(|value| value.parse().unwrap()).collect()
    }

    #[test]
    fn normalize_scalar() {
        assert_eq!(normalize_accessions(" EGFR_HUMAN "), accs(&["EGFR_HUMAN"]));
    }

    #[test]
    fn normalize_delimited() {
        assert_eq!(
            normalize_accessions("ERBB2_HUMAN; EGFR_HUMAN"),
            accs(&["ERBB2_HUMAN", "EGFR_HUMAN"])
        );
        assert_eq!(
            normalize_accessions("A4_HUMAN/APOE_HUMAN-TAU_HUMAN"),
            accs(&["A4_HUMAN", "APOE_HUMAN", "TAU_HUMAN"])
        );
        assert_eq!(normalize_accessions("P1;;P2;"), accs(&["P1", "P2"]));
    }

    #[test]
    fn normalize_parenthesis_keeps_prefix() {
        assert_eq!(
            normalize_accessions("GBRA1_HUMAN (alpha-1 subunit)"),
            accs(&["GBRA1_HUMAN"])
        );
        assert!(normalize_accessions("(unknown)").is_empty());
    }

    #[test]
    fn blocks_skip_header_and_split_on_blank_rows() {
        let text = "header one\nheader two\n\
                    T1\tTARGETID\tT1\nT1\tUNIPROID\tP1;P2\nT1\tTARGTYPE\tSuccessful target\n\
                    \t\t\t\t\n\
                    T2\tTARGETID\tT2\nT2\tUNIPROID\tP3\n";
        let blocks = TargetBlocks::new(Cursor::new(text), 2)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].entity_id.as_str(), "T1");
        assert_eq!(blocks[0].accessions(), accs(&["P1", "P2"]));
        assert_eq!(blocks[0].field("TARGTYPE"), Some("Successful target"));
        assert_eq!(blocks[1].accessions(), accs(&["P3"]));
    }

    #[test]
    fn consecutive_target_rows_start_new_blocks() {
        let text = "T1\tTARGETID\tT1\nT2\tTARGETID\tT2\nT2\tUNIPROID\tP9\n";
        let blocks = TargetBlocks::new(Cursor::new(text), 0)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].accessions().is_empty());
    }

    #[test]
    fn short_row_is_malformed() {
        let text = "T1\tTARGETID\tT1\nbroken\n";
        let err = TargetBlocks::new(Cursor::new(text), 0)
            .collect::<Result<Vec<_>, _>>()
            .unwrap_err();
        assert_matches!(err, ResolveError::MalformedRow { line: 2, .. });
    }

    #[test]
    fn index_tracks_every_owner() {
        let entities = vec![
            Ok(EntityAccessions {
                entity_id: "T1".parse().unwrap(),
                accessions: accs(&["P1", "P2"]),
            }),
            Ok(EntityAccessions {
                entity_id: "T2".parse().unwrap(),
                accessions: accs(&["P2"]),
            }),
        ];
        let index = EntityIndex::from_entities(entities).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.unique_accessions().len(), 2);
        let owners: Vec<&str> = index
            .owners(&"P2".parse().unwrap())
            .into_iter()
            .map(|id| id.as_str())
            .collect();
        assert_eq!(owners, vec!["T1", "T2"]);
        assert!(index.owners(&"P9".parse().unwrap()).is_empty());
    }
}
