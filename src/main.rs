mod analysis;
mod error;
mod formats;
mod model;
mod repack;
mod scanner;
mod tree;
mod utils;
mod validate;

#[cfg(test)]
mod fixtures;

use clap::{Parser, Subcommand};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::PackerError;
use crate::model::Vendor;
use crate::repack::{EntryRef, Limits};
use crate::utils::common;
use crate::utils::global::opt_dump_records;

#[derive(Parser, Debug)]
#[command(name = "biospacker", version, about = "ASUS/MSI BIOS packer analyzer and repacker")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Extra option, repeatable: max_size=<bytes>, dump_records, force
    #[arg(short = 'o', long = "option", global = true)]
    options: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List signature hits and decoded packer containers
    Analyze { input: PathBuf },
    /// Write the entries of every ASUS package into <output_dir>
    Extract { input: PathBuf, output_dir: PathBuf },
    /// Rebuild the containers of <input> from an edited entry tree
    Repack { input: PathBuf, entries_dir: PathBuf, output: Option<PathBuf> },
}

pub struct AppContext {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub options: Vec<String>,
}

impl AppContext {
    pub fn has_option(&self, name: &str) -> bool {
        self.options.iter().any(|e| e == name)
    }

    pub fn option_value(&self, name: &str) -> Option<&str> {
        self.options.iter().find_map(|e| e.strip_prefix(name)?.strip_prefix('='))
    }

    pub fn limits(&self) -> Result<Limits, Box<dyn std::error::Error>> {
        let max_size = match self.option_value("max_size") {
            Some(value) => Some(parse_number(value).ok_or_else(|| format!("Invalid max_size value: {}", value))?),
            None => None,
        };
        Ok(Limits { max_size })
    }

    /// `entry=<ref>=<file>` options. `<ref>` is a table index or an entry name such as `image_nr3`.
    pub fn entry_overrides(&self) -> Result<Vec<(EntryRef, PathBuf)>, Box<dyn std::error::Error>> {
        self.options
            .iter()
            .filter_map(|e| e.strip_prefix("entry="))
            .map(|value| -> Result<(EntryRef, PathBuf), Box<dyn std::error::Error>> {
                let (reference, file) = value.split_once('=').ok_or_else(|| format!("Invalid entry option: {}", value))?;
                let reference = match reference.parse::<u32>() {
                    Ok(index) => EntryRef::Index(index),
                    Err(_) => EntryRef::Name(reference.to_string()),
                };
                Ok((reference, PathBuf::from(file)))
            })
            .collect()
    }
}

fn parse_number(s: &str) -> Option<u64> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    println!("biospacker BIOS packer tool");
    let args = Args::parse();

    let (input, output_dir) = match &args.command {
        Command::Analyze { input } => (input.clone(), PathBuf::new()),
        Command::Extract { input, output_dir } => (input.clone(), output_dir.clone()),
        Command::Repack { input, entries_dir, .. } => (input.clone(), entries_dir.clone()),
    };
    println!("Input file: {}", input.display());
    let app_ctx = AppContext { input, output_dir, options: args.options };

    let result = match &args.command {
        Command::Analyze { .. } => run_analyze(&app_ctx),
        Command::Extract { .. } => run_extract(&app_ctx),
        Command::Repack { output, .. } => run_repack(&app_ctx, output.as_deref()),
    };

    if let Err(err) = result {
        match err.downcast_ref::<PackerError>() {
            Some(packer_err) => println!("\nFailed ({}): {}", packer_err.kind(), packer_err),
            None => println!("\nFailed: {}", err),
        }
        std::process::exit(1);
    }
}

fn run_analyze(app_ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(&app_ctx.input)?;
    let analysis = analysis::analyze(&data)?;

    println!("\nSignatures ({}):", analysis.hits.len());
    for hit in &analysis.hits {
        println!("0x{:08X}  {:<12} {} [{}]", hit.offset, hit.signature.tag, hit.signature.label,
                 common::hex_preview(hit.signature.pattern, 8));
    }

    for model in &analysis.containers {
        let format = formats::format_for(model.vendor);
        println!("\n{} container at 0x{:X}, {} entries, size 0x{:X}",
                 model.vendor, model.base(), model.header.entry_count, model.total_size);
        for entry in &model.entries {
            println!("- {} at 0x{:X}, Size: {}, Type: {}, Data: {}", format.entry_name(entry),
                     model.base() + entry.offset, entry.size, entry.kind.label(), common::hex_preview(&entry.payload, 8));
        }
    }

    for (vendor, err) in &analysis.failures {
        println!("\n{} container failed ({}): {}", vendor, err.kind(), err);
    }

    if !analysis.recognized() {
        println!("\nNo packer container recognized.");
        return Ok(());
    }

    let summary = &analysis.summary;
    println!("\nSummary: {} entries, {} payload bytes, {:.2}% of file", summary.entry_count, summary.payload_bytes, summary.coverage);
    for (kind, stats) in &summary.per_kind {
        println!("- {}: {} entries, {} bytes", kind.label(), stats.count, stats.bytes);
    }

    Ok(())
}

fn run_extract(app_ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
    println!("Output folder: {}", app_ctx.output_dir.display());
    let data = fs::read(&app_ctx.input)?;
    let containers = formats::decode_all(&data)?;

    let mut package_no = 0;
    for model in containers.iter().filter(|m| m.vendor == Vendor::Asus) {
        package_no += 1;
        let format = formats::format_for(model.vendor);
        opt_dump_records(app_ctx, &format, model, package_no)?;
    }

    let written = tree::write_tree(&app_ctx.output_dir, &containers)?;
    println!("\nExtraction finished! Saved {} files.", written);
    Ok(())
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    input.with_file_name(format!("{}_repacked.bin", stem))
}

// written to a sibling temp file, then renamed over `path`
fn write_output(path: &Path, data: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path)?;
    Ok(())
}

fn run_repack(app_ctx: &AppContext, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Entries folder: {}", app_ctx.output_dir.display());
    let limits = app_ctx.limits()?;
    let data = fs::read(&app_ctx.input)?;

    let containers = formats::decode_all(&data)?;
    let mut replacements = tree::load_replacements(&app_ctx.output_dir, &containers)?;

    let overrides = app_ctx.entry_overrides()?;
    if !overrides.is_empty() {
        if containers.len() != 1 {
            return Err(format!("entry= options need exactly one container, found {}", containers.len()).into());
        }
        for (reference, file) in overrides {
            println!("- {} <- {}", reference, file.display());
            replacements[0].insert(reference, fs::read(&file)?);
        }
    }
    let changed: usize = replacements.iter().map(|r| r.len()).sum();

    if changed == 0 && !app_ctx.has_option("force") {
        println!("\nNo entries changed, nothing to repack.");
        return Ok(());
    }

    let rebuilt = repack::repack_image(&data, &containers, &replacements, &limits)?;

    let output_path = output.map(Path::to_path_buf).unwrap_or_else(|| default_output(&app_ctx.input));
    write_output(&output_path, &rebuilt)?;

    println!("\n{} entries replaced, size {} -> {} bytes", changed, data.len(), rebuilt.len());
    println!("Saved to {}", output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(options: &[&str]) -> AppContext {
        AppContext {
            input: PathBuf::from("bios.cap"),
            output_dir: PathBuf::new(),
            options: options.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn max_size_accepts_hex_and_decimal() {
        assert_eq!(ctx(&["max_size=0x1000"]).limits().unwrap().max_size, Some(0x1000));
        assert_eq!(ctx(&["force", "max_size=2048"]).limits().unwrap().max_size, Some(2048));
        assert_eq!(ctx(&[]).limits().unwrap().max_size, None);
        assert!(ctx(&["max_size=big"]).limits().is_err());
    }

    #[test]
    fn option_flags() {
        let app_ctx = ctx(&["dump_records"]);
        assert!(app_ctx.has_option("dump_records"));
        assert!(!app_ctx.has_option("force"));
        assert_eq!(app_ctx.option_value("dump_records"), None);
    }

    #[test]
    fn entry_overrides_by_index_and_name() {
        let app_ctx = ctx(&["entry=2=logo.bmp", "force", "entry=image_nr3=/tmp/splash.jpg"]);
        let overrides = app_ctx.entry_overrides().unwrap();
        assert_eq!(overrides, vec![
            (EntryRef::Index(2), PathBuf::from("logo.bmp")),
            (EntryRef::Name("image_nr3".to_string()), PathBuf::from("/tmp/splash.jpg")),
        ]);
        assert!(ctx(&["entry=missing_file"]).entry_overrides().is_err());
    }

    #[test]
    fn output_replaces_existing_file_in_one_step() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bios_repacked.bin");
        fs::write(&path, b"old image with more bytes").unwrap();

        write_output(&path, b"new image").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new image");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn output_in_missing_directory_fails_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_such_dir").join("out.bin");
        assert!(write_output(&path, b"data").is_err());
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn repacked_name_sits_next_to_input() {
        assert_eq!(default_output(Path::new("/tmp/fw/E7C75AMS.1C0")), PathBuf::from("/tmp/fw/E7C75AMS_repacked.bin"));
    }
}
