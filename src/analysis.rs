use std::collections::BTreeMap;

use crate::error::{PackerError, Result};
use crate::formats;
use crate::model::{ContainerModel, ImageKind, Vendor};
use crate::scanner::{self, ScanHit};
use crate::validate::validate;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct KindStats {
    pub count: usize,
    pub bytes: u64,
}

#[derive(Debug, Default)]
pub struct Summary {
    pub entry_count: usize,
    pub payload_bytes: u64,
    pub per_kind: BTreeMap<ImageKind, KindStats>,
    /// Share of the file covered by entry payloads, in percent.
    pub coverage: f64,
}

pub struct Analysis {
    pub hits: Vec<ScanHit>,
    pub containers: Vec<ContainerModel>,
    /// Containers whose marker was found but that failed to decode or validate.
    pub failures: Vec<(Vendor, PackerError)>,
    pub summary: Summary,
}

impl Analysis {
    pub fn recognized(&self) -> bool {
        !self.containers.is_empty()
    }
}

/// Failures of individual containers are collected, not returned; only a
/// broken signature catalog aborts the analysis.
pub fn analyze(data: &[u8]) -> Result<Analysis> {
    let hits = scanner::scan(data, scanner::CATALOG)?;
    log::debug!("{} signature hits", hits.len());

    let mut containers = Vec::new();
    let mut failures = Vec::new();

    for format in formats::get_registry() {
        match (format.decode_func)(data) {
            Ok(models) => {
                for model in models {
                    match validate(&model) {
                        Ok(()) => containers.push(model),
                        Err(e) => {
                            log::warn!("{} container at {:#x} rejected: {}", format.vendor, model.base(), e);
                            failures.push((format.vendor, e));
                        }
                    }
                }
            }
            Err(PackerError::NotRecognized) => log::debug!("{}: not recognized", format.name),
            Err(e) => {
                log::warn!("{}: {}", format.name, e);
                failures.push((format.vendor, e));
            }
        }
    }
    containers.sort_by_key(|m| m.base());

    let summary = summarize(&containers, data.len());
    Ok(Analysis { hits, containers, failures, summary })
}

fn summarize(containers: &[ContainerModel], file_size: usize) -> Summary {
    let mut summary = Summary::default();

    for model in containers {
        summary.entry_count += model.entries.len();
        summary.payload_bytes += model.payload_size();
    }
    for entry in containers.iter().flat_map(|m| &m.entries) {
        let stats = summary.per_kind.entry(entry.kind).or_default();
        stats.count += 1;
        stats.bytes += entry.size;
    }

    if file_size > 0 {
        summary.coverage = summary.payload_bytes as f64 * 100.0 / file_size as f64;
    }
    summary
}
