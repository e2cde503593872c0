use crate::types::NoteData;

/// Sort notes by `(line, hour)` ascending. Stable, so notes sharing both keep
/// their insertion order.
pub fn sort_notes(notes: &mut [NoteData]) {
    notes.sort_by(|a, b| a.line.cmp(&b.line).then_with(|| a.hour.cmp(&b.hour)));
}

/// Append a note and restore ordering.
pub fn insert_note(notes: &mut Vec<NoteData>, note: NoteData) {
    notes.push(note);
    sort_notes(notes);
}

/// Remove the note with `id`. Returns true if it existed.
pub fn remove_note(notes: &mut Vec<NoteData>, id: &str) -> bool {
    let before = notes.len();
    notes.retain(|n| n.id != id);
    notes.len() != before
}

/// Replace the note carrying `updated.id`. Returns false if no note has it.
pub fn replace_note(notes: &mut [NoteData], updated: NoteData) -> bool {
    match notes.iter_mut().find(|n| n.id == updated.id) {
        Some(slot) => {
            *slot = updated;
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_line_hour_order() {
        let mut notes = Vec::new();
        insert_note(&mut notes, NoteData::new("1", "14:00", "late"));
        insert_note(&mut notes, NoteData::new("1", "09:00", "early"));
        insert_note(&mut notes, NoteData::new("10", "07:00", "other line"));
        insert_note(&mut notes, NoteData::new("2", "07:00", "second line"));

        let order: Vec<(&str, &str)> = notes
            .iter()
            .map(|n| (n.line.as_str(), n.hour.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![("1", "09:00"), ("1", "14:00"), ("2", "07:00"), ("10", "07:00")]
        );
    }

    #[test]
    fn test_identical_notes_are_distinct_by_id() {
        let mut notes = vec![NoteData::new("1", "09:00", "same"), NoteData::new("1", "09:00", "same")];
        let second_id = notes[1].id.clone();

        let mut updated = notes[1].clone();
        updated.text = "edited".to_string();
        assert!(replace_note(&mut notes, updated));

        assert_eq!(notes[0].text, "same");
        assert_eq!(notes[1].text, "edited");
        assert!(remove_note(&mut notes, &second_id));
        assert_eq!(notes.len(), 1);
    }

    #[test]
    fn test_replace_unknown_id() {
        let mut notes = vec![NoteData::new("1", "09:00", "a")];
        let stranger = NoteData::new("1", "09:00", "b");
        assert!(!replace_note(&mut notes, stranger));
    }
}
