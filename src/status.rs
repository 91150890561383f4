//! Upload folder status listing.

use anyhow::Result;
use walkdir::WalkDir;

use crate::config::Config;
use crate::loader::ParserRegistry;

/// List the upload folder contents with supported/unsupported
/// classification per the registered extensions.
pub fn show_status(config: &Config, registry: &ParserRegistry) -> Result<()> {
    let dir = &config.storage.upload_dir;

    println!("upload folder: {}", dir.display());
    println!("registered formats: {}", registry.extensions().join(", "));

    if !dir.exists() {
        println!("(folder does not exist yet; nothing uploaded)");
        return Ok(());
    }

    let mut entries: Vec<_> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .collect();
    entries.sort_by_key(|e| e.file_name().to_os_string());

    if entries.is_empty() {
        println!("(empty)");
        return Ok(());
    }

    println!("{:<32} {:<8} STATUS", "FILE", "FORMAT");
    let mut supported = 0usize;
    for entry in &entries {
        let name = entry.file_name().to_string_lossy();
        let extension = entry
            .path()
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let status = if registry.supports(&extension) {
            supported += 1;
            "supported"
        } else {
            "will be skipped"
        };
        println!("{:<32} {:<8} {}", name, extension, status);
    }
    println!("{} file(s), {} supported", entries.len(), supported);

    Ok(())
}
