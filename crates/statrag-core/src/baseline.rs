use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{DocumentInput, BASELINE_PREFIX};

/// Loads the read-only baseline corpus shipped with the system.
///
/// `*.json` files hold one `DocumentInput` or an array of them. `*.txt` files
/// become one document each: title from the file stem, library from the
/// parent directory (`misc` at the root). Ids get the `base:` prefix when it
/// is missing. Files are visited in sorted path order.
pub fn load_baseline_dir(root: &Path) -> Result<Vec<DocumentInput>> {
    if !root.is_dir() { return Err(Error::NotFound(format!("baseline directory {}", root.display()))); }
    let mut docs = Vec::new();
    for path in list_files(root) {
        let loaded = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => read_json(&path)?,
            Some("txt") => vec![read_txt(&path, root)?],
            _ => continue,
        };
        for input in &loaded {
            input.validate().map_err(|e| Error::Validation(format!("{}: {e}", path.display())))?;
        }
        docs.extend(loaded);
    }
    into_baseline(docs)
}

/// Prefixes ids with `base:` where missing, validates, and rejects duplicates.
pub fn into_baseline(inputs: Vec<DocumentInput>) -> Result<Vec<DocumentInput>> {
    let mut seen = HashSet::new();
    inputs
        .into_iter()
        .map(|mut input| {
            if !input.doc_id.starts_with(BASELINE_PREFIX) { input.doc_id = format!("{BASELINE_PREFIX}{}", input.doc_id); }
            input.validate()?;
            if !seen.insert(input.doc_id.clone()) { return Err(Error::DuplicateId(input.doc_id)); }
            Ok(input)
        })
        .collect()
}

fn read_json(path: &Path) -> Result<Vec<DocumentInput>> {
    let raw = fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    Ok(if value.is_array() { serde_json::from_value(value)? } else { vec![serde_json::from_value(value)?] })
}

fn read_txt(path: &Path, root: &Path) -> Result<DocumentInput> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => String::from_utf8_lossy(&fs::read(path)?).to_string(),
    };
    let stem = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    let library = library_from_path(path, root);
    Ok(DocumentInput::new(format!("{library}/{stem}"), stem.replace(['-', '_'], " "), library, content))
}

fn library_from_path(file_path: &Path, root: &Path) -> String {
    let relative_path = file_path.strip_prefix(root).unwrap_or(file_path);
    relative_path
        .parent()
        .and_then(|p| p.to_str())
        .filter(|p| !p.is_empty())
        .map_or_else(|| "misc".to_string(), |p| p.replace('\\', "/"))
}

fn list_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    files
}
