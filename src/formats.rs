use crate::error::Result;
use crate::model::{ContainerModel, Entry, Vendor};

/// Schema table for one packer vendor. Dispatch is by `Vendor` tag; the
/// function pointers are the vendor's decode/encode capability pair plus the
/// few vendor rules the repack engine needs.
pub struct Format {
    pub name: &'static str,
    pub vendor: Vendor,
    pub signature: &'static [u8],
    pub decode_func: fn(&[u8]) -> Result<Vec<ContainerModel>>,
    pub encode_func: fn(&ContainerModel) -> Result<Vec<u8>>,
    /// Trailer bytes for `entry` once its payload becomes `new_len` bytes long.
    pub realign_func: fn(&Entry, usize) -> Vec<u8>,
    /// Whether an entry's table record still carries the vendor marker/tag.
    pub record_check_func: fn(&Entry) -> bool,
    /// Largest payload the size field of a record can describe.
    pub max_entry_size: u64,
    /// Replacement payloads must keep the original image kind.
    pub strict_kind: bool,
    pub extractable: bool,
    pub tree: TreeNaming,
}

pub struct TreeNaming {
    pub dir_prefix: &'static str,
    /// Number used in file names for entry index 0.
    pub first_number: u32,
    pub file_name_func: fn(&ContainerModel, &Entry) -> String,
}

impl Format {
    pub fn entry_number(&self, entry: &Entry) -> u32 {
        entry.index + self.tree.first_number
    }

    pub fn entry_name(&self, entry: &Entry) -> String {
        format!("image_nr{}", self.entry_number(entry))
    }

    pub fn pack_dir_name(&self, package_no: usize) -> String {
        format!("{}_{}", self.tree.dir_prefix, package_no)
    }
}

pub mod asus;
pub mod msi;

pub fn get_registry() -> Vec<Format> {
    vec![
        crate::formats::asus::format(),
        crate::formats::msi::format(),
    ]
}

pub fn format_for(vendor: Vendor) -> Format {
    match vendor {
        Vendor::Asus => crate::formats::asus::format(),
        Vendor::Msi => crate::formats::msi::format(),
    }
}

/// Decode and validate every container any registered format recognizes,
/// sorted by position. Fails with `NotRecognized` when no format matches.
pub fn decode_all(data: &[u8]) -> Result<Vec<ContainerModel>> {
    let mut containers = Vec::new();

    for format in get_registry() {
        match (format.decode_func)(data) {
            Ok(models) => {
                for model in models {
                    crate::validate::validate(&model)?;
                    containers.push(model);
                }
            }
            Err(crate::error::PackerError::NotRecognized) => log::debug!("{}: not recognized", format.name),
            Err(e) => return Err(e),
        }
    }

    if containers.is_empty() {
        return Err(crate::error::PackerError::NotRecognized);
    }
    containers.sort_by_key(|m| m.base());
    Ok(containers)
}
