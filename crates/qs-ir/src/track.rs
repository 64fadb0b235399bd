//! Track and row types for per-channel sequences.

/// Highest playable note (8 octaves of 12 semitones).
pub const MAX_NOTE: u8 = 96;

/// Raw note value reserved for note-off.
pub const NOTE_OFF: u8 = 255;

/// Maximum number of rows in a track.
pub const MAX_TRACK_LENGTH: usize = 32;

/// A note event in a track row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Note {
    /// No event
    #[default]
    None,
    /// Note on with chromatic pitch (1-96)
    On(u8),
    /// Gate release
    Off,
}

impl Note {
    /// Decode a raw row byte. Values outside the playable range decode as `None`.
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            NOTE_OFF => Note::Off,
            1..=MAX_NOTE => Note::On(raw),
            _ => Note::None,
        }
    }

    /// Encode as a raw row byte.
    pub const fn to_raw(self) -> u8 {
        match self {
            Note::None => 0,
            Note::On(n) => n,
            Note::Off => NOTE_OFF,
        }
    }
}

/// A single step of a track.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Row {
    /// Instrument number (0 = none, 1-48 = instrument index + 1)
    pub instrument: u8,
    /// Effect number (0 = none, 1-48 = effect index + 1)
    pub effect: u8,
    /// Note event
    pub note: Note,
}

impl Row {
    /// Create an empty row.
    pub const fn empty() -> Self {
        Self { instrument: 0, effect: 0, note: Note::None }
    }

    pub const fn new(instrument: u8, effect: u8, note: Note) -> Self {
        Self { instrument, effect, note }
    }

    /// Returns true if the row triggers nothing.
    pub fn is_empty(&self) -> bool {
        self.instrument == 0 && self.effect == 0 && self.note == Note::None
    }
}

/// One bar of music for one voice.
///
/// Always stores `MAX_TRACK_LENGTH` rows; the song's track length decides
/// how many of them are played.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Track {
    pub rows: [Row; MAX_TRACK_LENGTH],
}

impl Default for Track {
    fn default() -> Self {
        Self::new()
    }
}

impl Track {
    pub const fn new() -> Self {
        Self { rows: [Row::empty(); MAX_TRACK_LENGTH] }
    }

    /// Get a row, or `None` past the end.
    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn row_mut(&mut self, index: usize) -> Option<&mut Row> {
        self.rows.get_mut(index)
    }

    /// Returns true if no row triggers anything.
    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(Row::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_note_decoding() {
        assert_eq!(Note::from_raw(0), Note::None);
        assert_eq!(Note::from_raw(1), Note::On(1));
        assert_eq!(Note::from_raw(96), Note::On(96));
        assert_eq!(Note::from_raw(97), Note::None);
        assert_eq!(Note::from_raw(255), Note::Off);
        assert_eq!(Note::Off.to_raw(), 255);
        assert_eq!(Note::On(37).to_raw(), 37);
    }

    #[test]
    fn track_row_access() {
        let mut track = Track::new();
        assert!(track.is_empty());
        track.row_mut(10).unwrap().note = Note::On(49);

        assert_eq!(track.row(10).unwrap().note, Note::On(49));
        assert_eq!(track.row(11).unwrap().note, Note::None);
        assert!(track.row(MAX_TRACK_LENGTH).is_none());
        assert!(!track.is_empty());
    }
}
