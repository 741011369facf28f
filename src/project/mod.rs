// Note list persistence: flat JSON array of notes

pub mod serialization;
pub mod validation;

pub use serialization::{load_notes, notes_from_json, notes_to_json, save_notes};
pub use validation::notes_from_value;
