use std::collections::BTreeMap;
use std::fmt;

use crate::error::{PackerError, Result};
use crate::formats::{self, Format};
use crate::model::{ContainerModel, ImageKind};
use crate::validate::validate;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntryRef {
    Index(u32),
    Name(String),
}

impl fmt::Display for EntryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryRef::Index(i) => write!(f, "#{}", i),
            EntryRef::Name(n) => f.write_str(n),
        }
    }
}

pub type Replacements = BTreeMap<EntryRef, Vec<u8>>;

#[derive(Debug, Clone, Copy, Default)]
pub struct Limits {
    /// Upper bound for any rebuilt container, in bytes.
    pub max_size: Option<u64>,
}

pub struct Rebuilt {
    pub model: ContainerModel,
    pub bytes: Vec<u8>,
}

fn resolve(format: &Format, model: &ContainerModel, reference: &EntryRef) -> Result<u32> {
    let found = match reference {
        EntryRef::Index(i) => model.entry(*i),
        EntryRef::Name(name) => model.entries.iter().find(|e| &format.entry_name(e) == name),
    };
    found.map(|e| e.index).ok_or_else(|| PackerError::UnknownEntryReference(reference.to_string()))
}

/// Rebuild one container. Every replacement reference is resolved before any
/// bytes are produced.
pub fn rebuild(model: &ContainerModel, replacements: &Replacements, limits: &Limits) -> Result<Rebuilt> {
    let format = formats::format_for(model.vendor);

    let mut by_index: BTreeMap<u32, &[u8]> = BTreeMap::new();
    for (reference, payload) in replacements {
        let index = resolve(&format, model, reference)?;
        if by_index.insert(index, payload.as_slice()).is_some() {
            return Err(PackerError::UnknownEntryReference(format!("{} (entry {} already replaced)", reference, index)));
        }
    }

    let mut rebuilt = model.clone();
    for entry in &mut rebuilt.entries {
        let Some(payload) = by_index.get(&entry.index) else { continue };

        let kind = ImageKind::classify(payload);
        if format.strict_kind && kind != entry.kind {
            return Err(PackerError::KindMismatch { index: entry.index, expected: entry.kind.label(), found: kind.label() });
        }
        if payload.len() as u64 > format.max_entry_size {
            return Err(PackerError::SizeLimitExceeded {
                index: Some(entry.index),
                size: payload.len() as u64,
                limit: format.max_entry_size,
            });
        }

        if payload.len() as u64 != entry.size {
            log::info!("{} entry {}: {} -> {} bytes ({:+})", model.vendor, entry.index, entry.size, payload.len(),
                       payload.len() as i64 - entry.size as i64);
        }
        entry.trailer = (format.realign_func)(entry, payload.len());
        entry.kind = kind;
        entry.payload = payload.to_vec();
    }

    rebuilt.relayout();
    if let Some(limit) = limits.max_size {
        if rebuilt.total_size > limit {
            return Err(PackerError::SizeLimitExceeded { index: None, size: rebuilt.total_size, limit });
        }
    }
    validate(&rebuilt)?;

    let bytes = (format.encode_func)(&rebuilt)?;
    if bytes.len() as u64 != rebuilt.total_size {
        return Err(PackerError::inconsistent(None, crate::error::Check::Bounds));
    }
    Ok(Rebuilt { model: rebuilt, bytes })
}

/// Rebuild every container of `data` and splice the results into the
/// untouched bytes around them. `replacements[i]` applies to `containers[i]`;
/// missing slots mean "no changes".
pub fn repack_image(data: &[u8], containers: &[ContainerModel], replacements: &[Replacements], limits: &Limits) -> Result<Vec<u8>> {
    let mut order: Vec<usize> = (0..containers.len()).collect();
    order.sort_by_key(|&i| containers[i].base());

    let empty = Replacements::new();
    let mut out = Vec::with_capacity(data.len());
    let mut cursor = 0usize;

    for i in order {
        let model = &containers[i];
        let (base, end) = (model.base() as usize, model.end() as usize);
        if base < cursor || end > data.len() {
            return Err(PackerError::inconsistent(None, crate::error::Check::Overlap));
        }

        let rebuilt = rebuild(model, replacements.get(i).unwrap_or(&empty), limits)?;
        log::info!("{} container at {:#x}: {} entries, {} -> {} bytes", model.vendor, out.len() + (base - cursor),
                   rebuilt.model.header.entry_count, model.total_size, rebuilt.model.total_size);
        out.extend_from_slice(&data[cursor..base]);
        out.extend_from_slice(&rebuilt.bytes);
        cursor = end;
    }

    out.extend_from_slice(&data[cursor..]);
    Ok(out)
}
