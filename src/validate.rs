use crate::error::{Check, PackerError, Result};
use crate::formats;
use crate::model::ContainerModel;

pub fn validate(model: &ContainerModel) -> Result<()> {
    let format = formats::format_for(model.vendor);

    if model.header.signature != format.signature || !header_carries_marker(model, format.signature) {
        return Err(PackerError::inconsistent(None, Check::Signature));
    }
    if let Some(entry) = model.entries.iter().find(|e| !(format.record_check_func)(e)) {
        return Err(PackerError::inconsistent(Some(entry.index), Check::Signature));
    }

    if model.header.entry_count as usize != model.entries.len() {
        return Err(PackerError::inconsistent(None, Check::EntryCount));
    }

    let mut prev_end = model.header.raw.len() as u64;
    for entry in &model.entries {
        if entry.offset < prev_end {
            return Err(PackerError::inconsistent(Some(entry.index), Check::Overlap));
        }
        prev_end = entry.end();
    }

    for entry in &model.entries {
        if entry.end() > model.total_size || entry.size != entry.payload.len() as u64 {
            return Err(PackerError::inconsistent(Some(entry.index), Check::Bounds));
        }
    }

    Ok(())
}

// ASUS keeps its marker as the fixed header, MSI repeats it in every record
fn header_carries_marker(model: &ContainerModel, marker: &[u8]) -> bool {
    model.header.raw.is_empty() || model.header.raw.starts_with(marker)
}
