//! Creative manifest files
//!
//! A manifest is JSON: either a bare array of creatives or an object
//! with a `creatives` key, in the same shape the library serializes.

use ap_core::types::Creative;
use serde::Deserialize;

#[derive(Deserialize)]
struct Manifest {
    creatives: Vec<Creative>,
}

pub fn load_creatives(path: &str) -> Result<Vec<Creative>, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    parse_creatives(&content).map_err(|e| format!("Invalid manifest '{}': {}", path, e))
}

fn parse_creatives(content: &str) -> Result<Vec<Creative>, serde_json::Error> {
    if let Ok(list) = serde_json::from_str::<Vec<Creative>>(content) {
        return Ok(list);
    }
    serde_json::from_str::<Manifest>(content).map(|m| m.creatives)
}
