// Serialization utilities for note list persistence (JSON)

use crate::error::Result;
use crate::project::validation::notes_from_value;
use crate::sequencer::note::{Note, NoteList};
use std::path::Path;

/// Serialize a note list to pretty-printed JSON
pub fn notes_to_json(notes: &[Note]) -> Result<String> {
    Ok(serde_json::to_string_pretty(notes)?)
}

/// Parse and validate a JSON note list
pub fn notes_from_json(json_data: &str) -> Result<NoteList> {
    let value: serde_json::Value = serde_json::from_str(json_data)?;
    Ok(notes_from_value(&value)?)
}

/// Write a note list to `path`, creating parent directories as needed
pub fn save_notes(path: &Path, notes: &[Note]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, notes_to_json(notes)?)?;
    tracing::info!(path = %path.display(), notes = notes.len(), "notes saved");
    Ok(())
}

/// Read and validate a note list from `path`
pub fn load_notes(path: &Path) -> Result<NoteList> {
    let data = std::fs::read_to_string(path)?;
    let notes = notes_from_json(&data)?;
    tracing::info!(path = %path.display(), notes = notes.len(), "notes loaded");
    Ok(notes)
}
