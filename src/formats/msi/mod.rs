pub mod include;

use memchr::memmem::Finder;

use crate::error::{PackerError, Result};
use crate::formats::{Format, TreeNaming};
use crate::model::{ContainerHeader, ContainerModel, Entry, ImageKind, Vendor};
use crate::utils::common;
use include::*;

pub fn format() -> Format {
    Format {
        name: "msi_packer",
        vendor: Vendor::Msi,
        signature: MSI_MARKER,
        decode_func: decode_msi,
        encode_func: encode_msi,
        realign_func: realign_msi,
        record_check_func: is_msi_record,
        max_entry_size: u32::MAX as u64,
        strict_kind: false,
        extractable: false,
        tree: TreeNaming { dir_prefix: "MSI_pack", first_number: 0, file_name_func: msi_file_name },
    }
}

/// The MSI section holds one run of `$MsI$` records; it decodes to a single container.
pub fn decode_msi(data: &[u8]) -> Result<Vec<ContainerModel>> {
    let finder = Finder::new(MSI_MARKER);
    let mut entries: Vec<Entry> = Vec::new();
    let mut base: Option<usize> = None;
    let mut prev_end = 0;
    let mut markers = 0;
    let mut position = 0;

    while let Some(pos) = finder.find(&data[position..]).map(|p| p + position) {
        markers += 1;
        if common::slice_at(data, pos, RECORD_SIZE).is_none() {
            return Err(PackerError::MalformedHeader {
                vendor: "MSI",
                offset: pos as u64,
                reason: format!("{} bytes left for a {}-byte record", data.len() - pos, RECORD_SIZE),
            });
        }

        let record: ImageRecord = common::read_le_at(data, pos)?;
        let payload_start = pos + RECORD_SIZE;
        let payload = match common::slice_at(data, payload_start, record.image_size as usize) {
            Some(p) => p,
            None => {
                log::warn!("MSI record at {:#x} declares {} bytes past end of buffer, skipping", pos, record.image_size);
                position = pos + 1;
                continue;
            }
        };

        // bytes between two records belong to the previous entry
        if let Some(prev) = entries.last_mut() {
            prev.trailer = data[prev_end..pos].to_vec();
        }
        let base = *base.get_or_insert(pos);

        log::debug!("MSI entry {} at {:#x}: number {}, layer {:#04x}, {} bytes",
                    entries.len(), pos, record.image_number, record.layer, record.image_size);
        entries.push(Entry {
            index: entries.len() as u32,
            offset: (payload_start - base) as u64,
            size: payload.len() as u64,
            kind: ImageKind::classify(payload),
            record: data[pos..payload_start].to_vec(),
            payload: payload.to_vec(),
            trailer: Vec::new(),
        });

        prev_end = payload_start + payload.len();
        position = prev_end;
    }

    let base = match base {
        Some(b) => b,
        None if markers > 0 => {
            return Err(PackerError::MalformedHeader {
                vendor: "MSI",
                offset: finder.find(data).unwrap_or(0) as u64,
                reason: "no record fits inside the buffer".to_string(),
            })
        }
        None => return Err(PackerError::NotRecognized),
    };

    Ok(vec![ContainerModel {
        vendor: Vendor::Msi,
        header: ContainerHeader {
            base: base as u64,
            signature: MSI_MARKER.to_vec(),
            raw: Vec::new(),
            entry_count: entries.len() as u32,
        },
        entries,
        total_size: (prev_end - base) as u64,
    }])
}

/// Sector/layer/number/reserved bytes are kept; only the size field changes.
pub fn encode_msi(model: &ContainerModel) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(model.total_size as usize);
    out.extend_from_slice(&model.header.raw);

    for entry in &model.entries {
        let mut record: ImageRecord = common::read_le_at(&entry.record, 0)?;
        record.image_size = u32::try_from(entry.payload.len()).map_err(|_| PackerError::SizeLimitExceeded {
            index: Some(entry.index),
            size: entry.payload.len() as u64,
            limit: u32::MAX as u64,
        })?;

        out.extend_from_slice(&common::to_le_bytes(&record)?);
        out.extend_from_slice(&entry.payload);
        out.extend_from_slice(&entry.trailer);
    }

    Ok(out)
}

/// Inter-record gaps are carried over unchanged.
pub fn realign_msi(entry: &Entry, _new_len: usize) -> Vec<u8> {
    entry.trailer.clone()
}

fn is_msi_record(entry: &Entry) -> bool {
    entry.record.len() == RECORD_SIZE && entry.record.starts_with(MSI_MARKER)
}

fn msi_file_name(model: &ContainerModel, entry: &Entry) -> String {
    format!("image_nr{}_off0x{:X}.{}", entry.index, model.base() + entry.record_offset(), entry.kind.extension())
}
