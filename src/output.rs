use std::fs;
use std::io::{self, BufRead, BufReader, Write};

use camino::Utf8Path;
use serde::Serialize;

use crate::aggregate::ResolutionTable;
use crate::domain::{CanonicalId, EntityId, ResolutionRecord};
use crate::error::ResolveError;
use crate::pipeline::{ProgressEvent, ProgressSink, ResolutionReport};
use crate::targets::TargetInfo;

const TSV_HEADER: &str = "entity_id\tcanonical_id";

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &ResolutionReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_targets(targets: &[TargetInfo]) -> io::Result<()> {
        Self::print_json(&targets)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => tracing::info!(
                elapsed_ms = elapsed.as_millis() as u64,
                "{}",
                event.message
            ),
            None => tracing::info!("{}", event.message),
        }
    }
}

pub fn write_table_tsv(table: &ResolutionTable, dest: &Utf8Path) -> Result<(), ResolveError> {
    let parent = match dest.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| ResolveError::Filesystem(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix("ttd-resolve-table")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| ResolveError::Filesystem(err.to_string()))?;

    writeln!(temp, "{TSV_HEADER}").map_err(|err| ResolveError::Filesystem(err.to_string()))?;
    for (entity_id, canonical_id) in table.pairs() {
        writeln!(temp, "{entity_id}\t{canonical_id}")
            .map_err(|err| ResolveError::Filesystem(err.to_string()))?;
    }
    temp.flush().map_err(|err| ResolveError::Filesystem(err.to_string()))?;
    temp.persist(dest.as_std_path())
        .map_err(|err| ResolveError::Filesystem(err.to_string()))?;
    Ok(())
}

pub fn read_table_tsv(path: &Utf8Path) -> Result<ResolutionTable, ResolveError> {
    let file = fs::File::open(path.as_std_path())
        .map_err(|_| ResolveError::SourceNotFound(path.as_std_path().to_path_buf()))?;
    let mut records = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|err| ResolveError::Filesystem(err.to_string()))?;
        if number == 0 && line == TSV_HEADER {
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        let (entity, canonical) = line.split_once('\t').ok_or_else(|| {
            ResolveError::MalformedRow {
                line: number + 1,
                message: "expected entity_id<TAB>canonical_id".to_string(),
            }
        })?;
        let entity_id: EntityId = entity.parse()?;
        let canonical_id: CanonicalId = canonical.parse()?;
        records.push(ResolutionRecord {
            entity_id,
            canonical_ids: [canonical_id].into_iter().collect(),
        });
    }
    Ok(records.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;

    #[test]
    fn tsv_round_trip_preserves_sets() {
        let temp = tempfile::tempdir().unwrap();
        let dest = Utf8PathBuf::from_path_buf(temp.path().join("out/table.tsv")).unwrap();
        let table: ResolutionTable = [
            ResolutionRecord {
                entity_id: "T2".parse().unwrap(),
                canonical_ids: ["K3".parse().unwrap()].into_iter().collect(),
            },
            ResolutionRecord {
                entity_id: "T1".parse().unwrap(),
                canonical_ids: ["K2".parse().unwrap(), "K1".parse().unwrap()]
                    .into_iter()
                    .collect(),
            },
        ]
        .into_iter()
        .collect();

        write_table_tsv(&table, &dest).unwrap();
        let text = fs::read_to_string(dest.as_std_path()).unwrap();
        assert_eq!(text, "entity_id\tcanonical_id\nT1\tK1\nT1\tK2\nT2\tK3\n");
        assert_eq!(read_table_tsv(&dest).unwrap(), table);
    }
}
