pub mod include;

use memchr::memmem::Finder;

use crate::error::{PackerError, Result};
use crate::formats::{Format, TreeNaming};
use crate::model::{ContainerHeader, ContainerModel, Entry, ImageKind, Vendor};
use crate::utils::common;
use include::*;

pub fn format() -> Format {
    Format {
        name: "asus_packer",
        vendor: Vendor::Asus,
        signature: &PACKAGE_MARKER,
        decode_func: decode_asus,
        encode_func: encode_asus,
        realign_func: realign_asus,
        record_check_func: is_asus_record,
        max_entry_size: u32::MAX as u64,
        strict_kind: true,
        extractable: true,
        tree: TreeNaming { dir_prefix: "asus_pack", first_number: 1, file_name_func: asus_file_name },
    }
}

/// Decode every ASUS package in `data`, in file order.
pub fn decode_asus(data: &[u8]) -> Result<Vec<ContainerModel>> {
    let finder = Finder::new(&PACKAGE_MARKER);
    let mut packages = Vec::new();
    let mut position = 0;

    while let Some(found) = finder.find(&data[position..]).map(|p| p + position) {
        let package = decode_package(data, found)?;
        log::debug!("ASUS package {} at {:#x}: {} entries, {} bytes",
                    packages.len() + 1, found, package.entries.len(), package.total_size);
        position = package.end() as usize;
        packages.push(package);
    }

    if packages.is_empty() {
        return Err(PackerError::NotRecognized);
    }
    Ok(packages)
}

fn decode_package(data: &[u8], base: usize) -> Result<ContainerModel> {
    let header: PackageHeader = common::read_le_at(data, base)?;
    let table_start = base + header.header_size as usize;
    if table_start < base + HEADER_SIZE {
        return Err(malformed(base, format!("header size {:#x} is shorter than the header", header.header_size)));
    }

    let mut entries: Vec<Entry> = Vec::new();
    let mut head = table_start;

    loop {
        // table ends where the size/offset pair is missing or zero
        let (size, data_offset) = match (common::u32_le_at(data, head), common::u32_le_at(data, head + 4)) {
            (Some(s), Some(o)) => (s, o),
            _ => break,
        };
        if size == 0 || data_offset == 0 {
            break;
        }
        if common::slice_at(data, head, RECORD_SIZE).is_none() {
            return Err(malformed(head, format!("entry record {} truncated", entries.len() + 1)));
        }

        let record: EntryRecord = common::read_le_at(data, head)?;
        if !record.is_entry() {
            log::debug!("ASUS table at {:#x} ends at {:#x}: record does not carry the entry tag", base, head);
            break;
        }

        let payload_start = head + RECORD_SIZE;
        let payload = match common::slice_at(data, payload_start, record.image_size as usize) {
            Some(p) => p,
            None => {
                log::warn!("ASUS entry at {:#x} declares {} bytes past end of buffer, table ends here", head, record.image_size);
                break;
            }
        };
        let payload_end = payload_start + payload.len();
        let trailer_end = (payload_end + padding_for(payload.len())).min(data.len());

        entries.push(Entry {
            index: entries.len() as u32,
            offset: (payload_start - base) as u64,
            size: payload.len() as u64,
            kind: ImageKind::classify(payload),
            record: data[head..payload_start].to_vec(),
            payload: payload.to_vec(),
            trailer: data[payload_end..trailer_end].to_vec(),
        });

        head = trailer_end;
    }

    Ok(ContainerModel {
        vendor: Vendor::Asus,
        header: ContainerHeader {
            base: base as u64,
            signature: PACKAGE_MARKER.to_vec(),
            raw: data[base..table_start].to_vec(),
            entry_count: entries.len() as u32,
        },
        entries,
        total_size: (head - base) as u64,
    })
}

/// Header bytes and record attributes are copied; only the size fields are rewritten.
pub fn encode_asus(model: &ContainerModel) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(model.total_size as usize);
    out.extend_from_slice(&model.header.raw);

    for entry in &model.entries {
        let mut record: EntryRecord = common::read_le_at(&entry.record, 0)?;
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

/// Original alignment bytes are kept while the padding length stays the same.
pub fn realign_asus(entry: &Entry, new_len: usize) -> Vec<u8> {
    if padding_for(new_len) == padding_for(entry.payload.len()) {
        entry.trailer.clone()
    } else {
        vec![0u8; padding_for(new_len)]
    }
}

fn is_asus_record(entry: &Entry) -> bool {
    match common::read_le_at::<EntryRecord>(&entry.record, 0) {
        Ok(record) => record.data_offset == RECORD_SIZE as u32 && record.tag == RECORD_TAG,
        Err(_) => false,
    }
}

fn asus_file_name(model: &ContainerModel, entry: &Entry) -> String {
    format!("image_nr{}_off0x{:08x}.{}", entry.index + 1, model.base() + entry.offset, entry.kind.extension())
}

fn malformed(offset: usize, reason: String) -> PackerError {
    PackerError::MalformedHeader { vendor: "ASUS", offset: offset as u64, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn decodes_interleaved_table() {
        let images = [fixtures::bmp(10), fixtures::png(8), fixtures::jpeg(5)];
        let package = fixtures::asus_package(&images);
        let mut data = vec![0xAAu8; 0x40];
        data.extend_from_slice(&package);
        data.extend_from_slice(&[0u8; 16]);

        let models = decode_asus(&data).unwrap();
        assert_eq!(models.len(), 1);
        let model = &models[0];
        assert_eq!(model.base(), 0x40);
        assert_eq!(model.header.entry_count, 3);
        assert_eq!(model.total_size, package.len() as u64);

        let kinds: Vec<ImageKind> = model.entries.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![ImageKind::Bmp, ImageKind::Png, ImageKind::Jpeg]);

        // 32 header + 32 record
        assert_eq!(model.entries[0].offset, 64);
        assert_eq!(model.entries[0].trailer.len(), 2);
        // 64 + 10 + 2 pad + 32 record
        assert_eq!(model.entries[1].offset, 108);
        assert_eq!(model.entries[1].trailer.len(), 0);
        assert_eq!(model.entries[2].payload, images[2]);
    }

    #[test]
    fn encode_reproduces_original_bytes() {
        let mut package = fixtures::asus_package(&[fixtures::bmp(7), fixtures::gif(9)]);
        // non-zero alignment bytes and vendor attributes must survive
        package[32 + 8] = 0x5A;
        let pad_at = 32 + 32 + 7;
        package[pad_at] = 0xEE;

        let model = &decode_asus(&package).unwrap()[0];
        assert_eq!(model.entries[0].trailer, vec![0xEE]);
        assert_eq!(encode_asus(model).unwrap(), package);
    }

    #[test]
    fn finds_several_packages() {
        let mut data = fixtures::asus_package(&[fixtures::bmp(4)]);
        data.extend_from_slice(&[0u8; 8]);
        data.extend_from_slice(b"filler bytes");
        let second_at = data.len();
        data.extend_from_slice(&fixtures::asus_package(&[fixtures::png(12), fixtures::bmp(3)]));

        let models = decode_asus(&data).unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[1].base(), second_at as u64);
        assert_eq!(models[1].entries.len(), 2);
        assert!(models[0].end() <= models[1].base());
    }

    #[test]
    fn missing_marker_is_not_recognized() {
        let err = decode_asus(&[0u8; 256]).unwrap_err();
        assert!(matches!(err, PackerError::NotRecognized));
    }

    #[test]
    fn truncated_record_is_malformed() {
        let mut data = PACKAGE_MARKER.to_vec();
        data.extend_from_slice(&16u32.to_le_bytes());
        data.extend_from_slice(&0x20u32.to_le_bytes());
        data.extend_from_slice(&[0xFF, 0xFF, 0x0A, 0x00]);

        let err = decode_asus(&data).unwrap_err();
        assert!(matches!(err, PackerError::MalformedHeader { vendor: "ASUS", offset: 32, .. }));
    }

    #[test]
    fn payload_overrun_ends_table() {
        let mut data = fixtures::asus_package(&[fixtures::bmp(8)]);
        let mut record = fixtures::asus_record(4096, fixtures::ASUS_ATTRIBUTES);
        data.append(&mut record);
        data.extend_from_slice(b"BM short");

        let model = &decode_asus(&data).unwrap()[0];
        assert_eq!(model.entries.len(), 1);
    }

    #[test]
    fn realign_keeps_or_resets_padding() {
        let package = fixtures::asus_package(&[fixtures::bmp(5)]);
        let model = &decode_asus(&package).unwrap()[0];
        let entry = &model.entries[0];
        assert_eq!(entry.trailer.len(), 3);
        assert_eq!(realign_asus(entry, 9), entry.trailer);
        assert_eq!(realign_asus(entry, 8), Vec::<u8>::new());
        assert_eq!(realign_asus(entry, 6), vec![0, 0]);
    }
}
