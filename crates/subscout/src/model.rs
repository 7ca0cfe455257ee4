use crate::Result;
use serde_json::to_string_pretty;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

// region:        --- Exporting utils

pub fn ensure_dir(dir: &Path) -> Result<bool> {
    if dir.is_dir() {
        Ok(false)
    } else {
        fs::create_dir_all(dir)?;
        Ok(true)
    }
}

pub fn export_to_txt(subdomains: &[String], path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    for subdomain in subdomains {
        writeln!(file, "{}", subdomain)?;
    }
    Ok(())
}

pub fn export_to_json(subdomains: &[String], path: &Path) -> Result<()> {
    let json = to_string_pretty(subdomains)?;
    let mut file = File::create(path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

// endregion:     --- Exporting utils
