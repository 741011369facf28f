// Note list validation - field-level checks on untyped JSON

use crate::error::{FieldProblem, NoteListError};
use crate::sequencer::note::{Note, NoteList, check_note_list};
use serde_json::{Map, Value};

/// Build a note list from parsed JSON, rejecting anything that breaks the
/// note list invariant
///
/// Checks run entry by entry (presence, type, range of each field), then
/// ordering and same-pitch overlap across the whole list. The first problem
/// found is reported with its entry index and field name.
pub fn notes_from_value(value: &Value) -> Result<NoteList, NoteListError> {
    let entries = value.as_array().ok_or(NoteListError::NotAList)?;

    let notes = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| note_from_entry(index, entry))
        .collect::<Result<NoteList, _>>()?;

    check_note_list(&notes)?;
    Ok(notes)
}

fn note_from_entry(index: usize, entry: &Value) -> Result<Note, NoteListError> {
    let object = entry
        .as_object()
        .ok_or_else(|| NoteListError::field(index, "entry", FieldProblem::NotAnObject))?;

    let start = time_field(index, object, "start")?;
    let end = time_field(index, object, "end")?;
    let pitch = midi_field(index, object, "note")?;
    let velocity = midi_field(index, object, "velocity")?;

    if end <= start {
        return Err(NoteListError::field(
            index,
            "end",
            FieldProblem::EndNotAfterStart,
        ));
    }

    Ok(Note::new(pitch, velocity, start, end))
}

fn number(
    index: usize,
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<f64, NoteListError> {
    let value = object
        .get(field)
        .ok_or_else(|| NoteListError::field(index, field, FieldProblem::Missing))?;
    value
        .as_f64()
        .filter(|n| n.is_finite())
        .ok_or_else(|| NoteListError::field(index, field, FieldProblem::NotANumber))
}

/// Non-negative millisecond value
fn time_field(
    index: usize,
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<f64, NoteListError> {
    let ms = number(index, object, field)?;
    if ms < 0.0 {
        return Err(NoteListError::field(index, field, FieldProblem::Negative));
    }
    Ok(ms)
}

/// Integer 0-127 (pitch or velocity)
fn midi_field(
    index: usize,
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<u8, NoteListError> {
    let n = number(index, object, field)?;
    if n.fract() != 0.0 || !(0.0..=127.0).contains(&n) {
        return Err(NoteListError::field(index, field, FieldProblem::OutOfRange));
    }
    Ok(n as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn problem(value: Value) -> NoteListError {
        notes_from_value(&value).unwrap_err()
    }

    #[test]
    fn test_valid_list() {
        let notes = notes_from_value(&json!([
            {"start": 0, "end": 120.5, "note": 60, "velocity": 100},
            {"start": 10, "end": 20, "note": 64.0, "velocity": 0}
        ]))
        .unwrap();

        assert_eq!(
            notes,
            vec![Note::new(60, 100, 0.0, 120.5), Note::new(64, 0, 10.0, 20.0)]
        );
        assert!(notes_from_value(&json!([])).unwrap().is_empty());
    }

    #[test]
    fn test_not_a_list() {
        assert_eq!(problem(json!({"start": 0})), NoteListError::NotAList);
    }

    #[test]
    fn test_field_problems_name_index_and_field() {
        assert_eq!(
            problem(json!([{"start": 0, "end": 1, "note": 60, "velocity": 1}, 5])),
            NoteListError::field(1, "entry", FieldProblem::NotAnObject)
        );
        assert_eq!(
            problem(json!([{"end": 1, "note": 60, "velocity": 1}])),
            NoteListError::field(0, "start", FieldProblem::Missing)
        );
        assert_eq!(
            problem(json!([{"start": "0", "end": 1, "note": 60, "velocity": 1}])),
            NoteListError::field(0, "start", FieldProblem::NotANumber)
        );
        assert_eq!(
            problem(json!([{"start": -5, "end": 1, "note": 60, "velocity": 1}])),
            NoteListError::field(0, "start", FieldProblem::Negative)
        );
        assert_eq!(
            problem(json!([{"start": 0, "end": 1, "note": 128, "velocity": 1}])),
            NoteListError::field(0, "note", FieldProblem::OutOfRange)
        );
        assert_eq!(
            problem(json!([{"start": 0, "end": 1, "note": 60, "velocity": 1.5}])),
            NoteListError::field(0, "velocity", FieldProblem::OutOfRange)
        );
        assert_eq!(
            problem(json!([{"start": 5, "end": 5, "note": 60, "velocity": 1}])),
            NoteListError::field(0, "end", FieldProblem::EndNotAfterStart)
        );
    }

    #[test]
    fn test_order_and_overlap() {
        assert_eq!(
            problem(json!([
                {"start": 50, "end": 60, "note": 60, "velocity": 1},
                {"start": 10, "end": 20, "note": 61, "velocity": 1}
            ])),
            NoteListError::field(1, "start", FieldProblem::OutOfOrder)
        );
        assert_eq!(
            problem(json!([
                {"start": 0, "end": 100, "note": 60, "velocity": 1},
                {"start": 100, "end": 200, "note": 60, "velocity": 1}
            ])),
            NoteListError::field(1, "start", FieldProblem::Overlaps { other: 0 })
        );
    }
}
