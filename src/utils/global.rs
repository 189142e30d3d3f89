use std::{fs::{self, OpenOptions}, io::Write};

use crate::AppContext;
use crate::formats::Format;
use crate::model::ContainerModel;

/// With `dump_records` set, save the raw header and every entry record of a container.
pub fn opt_dump_records(app_ctx: &AppContext, format: &Format, model: &ContainerModel, package_no: usize) -> Result<(), Box<dyn std::error::Error>> {
    if !app_ctx.has_option("dump_records") {
        return Ok(())
    }

    let pack_name = format.pack_dir_name(package_no);
    fs::create_dir_all(&app_ctx.output_dir)?;

    if !model.header.raw.is_empty() {
        save(app_ctx, &model.header.raw, &format!("{}_header", pack_name))?;
    }
    for entry in &model.entries {
        save(app_ctx, &entry.record, &format!("{}_{}_record", pack_name, format.entry_name(entry)))?;
    }

    Ok(())
}

fn save(app_ctx: &AppContext, data: &[u8], name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let filename = format!("_{}.bin", name);
    let output_path = app_ctx.output_dir.join(&filename);

    let mut out_file = OpenOptions::new().write(true).create(true).truncate(true).open(output_path)?;
    out_file.write_all(data)?;

    println!("[i] Saved {} to {}", name, filename);
    Ok(())
}
