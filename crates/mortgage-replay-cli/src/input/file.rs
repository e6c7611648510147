use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Plan file encodings, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlanFormat {
    Json,
    Yaml,
}

impl PlanFormat {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                PlanFormat::Yaml
            }
            _ => PlanFormat::Json,
        }
    }
}

/// Read a plan file (JSON, or YAML for `.yaml`/`.yml`) into a typed struct.
pub fn read_plan<T: DeserializeOwned>(path: &str) -> Result<T, Box<dyn std::error::Error>> {
    let canonical = resolve_path(path)?;
    let contents = fs::read_to_string(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;

    let value: T = match PlanFormat::for_path(&canonical) {
        PlanFormat::Json => serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e))?,
        PlanFormat::Yaml => serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e))?,
    };
    Ok(value)
}

/// Overwrite an existing plan file, keeping its encoding.
pub fn write_plan<T: Serialize>(path: &str, plan: &T) -> Result<(), Box<dyn std::error::Error>> {
    let canonical = resolve_path(path)?;
    let contents = match PlanFormat::for_path(&canonical) {
        PlanFormat::Json => serde_json::to_string_pretty(plan)? + "\n",
        PlanFormat::Yaml => serde_yaml::to_string(plan)?,
    };
    fs::write(&canonical, contents)
        .map_err(|e| format!("Failed to write '{}': {}", canonical.display(), e))?;
    Ok(())
}

/// Resolve the path against the working directory and require a regular file.
fn resolve_path(path: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let p = Path::new(path);
    let canonical = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()?.join(p)
    };

    if !canonical.exists() {
        return Err(format!("File not found: {}", canonical.display()).into());
    }

    if !canonical.is_file() {
        return Err(format!("Not a file: {}", canonical.display()).into());
    }

    Ok(canonical)
}
