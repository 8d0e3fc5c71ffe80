//! YAML persistence for target schemas and mapping plans.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub fn load_from_path<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("Opening YAML file {path:?}"))?;
    from_str(&raw).with_context(|| format!("Parsing YAML file {path:?}"))
}

pub fn from_str<T: DeserializeOwned>(raw: &str) -> Result<T> {
    Ok(serde_yaml::from_str(raw)?)
}

pub fn save_to_path<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let serialized = to_string(data)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Creating directory {parent:?}"))?;
    }
    let mut file = File::create(path).with_context(|| format!("Creating YAML file {path:?}"))?;
    file.write_all(serialized.as_bytes())?;
    file.flush()?;
    Ok(())
}

pub fn to_string<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_yaml::to_string(value)?)
}
