use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{PackerError, Result};
use crate::formats::{self, Format};
use crate::model::{ContainerModel, Vendor};
use crate::repack::{EntryRef, Replacements};

/// Entry number `<N>` of a tree file name, `None` if the name does not follow the pattern.
pub fn parse_entry_file_name(name: &str) -> Option<u32> {
    let rest = name.strip_prefix("image_nr")?;
    let (number, rest) = rest.split_once("_off0x")?;
    let (offset, ext) = rest.split_once('.')?;

    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if offset.is_empty() || !offset.bytes().all(|b| b.is_ascii_hexdigit()) || ext.is_empty() {
        return None;
    }
    number.parse().ok()
}

/// Package number of every container within its vendor, 1-based, in file order.
fn package_numbers(containers: &[ContainerModel]) -> Vec<usize> {
    let mut seen: Vec<(Vendor, usize)> = Vec::new();
    containers
        .iter()
        .map(|model| match seen.iter_mut().find(|(v, _)| *v == model.vendor) {
            Some((_, n)) => {
                *n += 1;
                *n
            }
            None => {
                seen.push((model.vendor, 1));
                1
            }
        })
        .collect()
}

fn find_pack_dir(entries_dir: &Path, format: &Format, package_no: usize, vendor_total: usize) -> Result<Option<PathBuf>> {
    let exact = entries_dir.join(format.pack_dir_name(package_no));
    if exact.is_dir() {
        return Ok(Some(exact));
    }
    // a lone MSI section may come from a differently numbered extraction
    if format.vendor == Vendor::Msi && vendor_total == 1 {
        let mut candidates: Vec<PathBuf> = fs::read_dir(entries_dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir() && e.file_name().to_string_lossy().starts_with(format.tree.dir_prefix))
            .map(|e| e.path())
            .collect();
        candidates.sort();
        return Ok(candidates.into_iter().next());
    }
    Ok(None)
}

/// Read replacement payloads for every container from `entries_dir`.
/// `result[i]` belongs to `containers[i]` and only holds entries whose file
/// content differs from the decoded payload.
pub fn load_replacements(entries_dir: &Path, containers: &[ContainerModel]) -> Result<Vec<Replacements>> {
    let numbers = package_numbers(containers);
    let mut all = Vec::with_capacity(containers.len());

    for (model, &package_no) in containers.iter().zip(&numbers) {
        let format = formats::format_for(model.vendor);
        let vendor_total = containers.iter().filter(|m| m.vendor == model.vendor).count();
        let mut replacements = Replacements::new();

        let dir = match find_pack_dir(entries_dir, &format, package_no, vendor_total)? {
            Some(d) => d,
            None => {
                log::warn!("No {} directory for {} container {}, keeping original entries",
                           format.pack_dir_name(package_no), model.vendor, package_no);
                all.push(replacements);
                continue;
            }
        };

        let mut files: Vec<(u32, PathBuf)> = Vec::new();
        for dir_entry in fs::read_dir(&dir)? {
            let path = dir_entry?.path();
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            match parse_entry_file_name(&name) {
                Some(number) if path.is_file() => files.push((number, path)),
                _ => log::debug!("Ignoring {}", path.display()),
            }
        }
        files.sort();

        for pair in files.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(PackerError::UnknownEntryReference(format!("{} (duplicate of {})",
                                                                      pair[1].1.display(), pair[0].1.display())));
            }
        }

        for (number, path) in files {
            let entry = number
                .checked_sub(format.tree.first_number)
                .and_then(|index| model.entry(index))
                .ok_or_else(|| PackerError::UnknownEntryReference(path.display().to_string()))?;

            let data = fs::read(&path)?;
            if data != entry.payload {
                log::info!("{}: changed ({} -> {} bytes)", path.display(), entry.size, data.len());
                replacements.insert(EntryRef::Name(format.entry_name(entry)), data);
            }
        }

        log::info!("{} container {}: {} of {} entries changed",
                   model.vendor, package_no, replacements.len(), model.entries.len());
        all.push(replacements);
    }

    Ok(all)
}

/// Write the entry tree of every extractable container. Returns the number of files written.
pub fn write_tree(output_dir: &Path, containers: &[ContainerModel]) -> Result<usize> {
    let numbers = package_numbers(containers);
    let mut written = 0;

    for (model, &package_no) in containers.iter().zip(&numbers) {
        let format = formats::format_for(model.vendor);
        if !format.extractable {
            println!("{} container {}: extraction not supported, skipping", model.vendor, package_no);
            continue;
        }

        let pack_dir = output_dir.join(format.pack_dir_name(package_no));
        fs::create_dir_all(&pack_dir)?;

        for entry in &model.entries {
            let file_name = (format.tree.file_name_func)(model, entry);
            let output_path = pack_dir.join(&file_name);

            let mut out_file = OpenOptions::new().write(true).create(true).truncate(true).open(&output_path)?;
            out_file.write_all(&entry.payload)?;

            println!("- {}/{}, Size: {}", format.pack_dir_name(package_no), file_name, entry.size);
            written += 1;
        }
    }

    Ok(written)
}
