//! Loopable per-tick micro-programs.
//!
//! Instruments, filters and effects all carry a short list of rows that the
//! engine steps through once per tick. When the cursor runs off the end it
//! resumes at the loop point.

use arrayvec::{ArrayVec, CapacityError};

/// An ordered, loopable list of program rows with a fixed capacity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Program<T, const N: usize> {
    rows: ArrayVec<T, N>,
    loop_point: u8,
}

impl<T, const N: usize> Default for Program<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Program<T, N> {
    /// Maximum number of rows.
    pub const CAPACITY: usize = N;

    /// Create an empty program.
    pub const fn new() -> Self {
        Self { rows: ArrayVec::new_const(), loop_point: 0 }
    }

    /// Create a program from rows and a loop point.
    ///
    /// Rows beyond capacity are dropped; the loop point is clamped.
    pub fn from_rows(rows: impl IntoIterator<Item = T>, loop_point: u8) -> Self {
        let mut program = Self::new();
        for row in rows.into_iter().take(N) {
            program.rows.push(row);
        }
        program.set_loop_point(loop_point);
        program
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row index to resume at when the end is reached.
    pub fn loop_point(&self) -> u8 {
        self.loop_point
    }

    /// Set the loop point, clamped below the program length.
    pub fn set_loop_point(&mut self, loop_point: u8) {
        self.loop_point = loop_point;
        self.clamp_loop_point();
    }

    /// Append a row.
    pub fn push(&mut self, row: T) -> Result<(), CapacityError<T>> {
        self.rows.try_push(row)
    }

    /// Remove the last row.
    pub fn pop(&mut self) -> Option<T> {
        let row = self.rows.pop();
        self.clamp_loop_point();
        row
    }

    /// Resolve a cursor to the row index that should execute.
    ///
    /// A cursor past the end resumes at the loop point; a loop point that is
    /// itself out of range falls back to the last row. Returns `None` for an
    /// empty program.
    pub fn resolve(&self, cursor: usize) -> Option<usize> {
        let len = self.rows.len();
        if len == 0 {
            return None;
        }
        if cursor < len {
            Some(cursor)
        } else {
            Some((self.loop_point as usize).min(len - 1))
        }
    }

    fn clamp_loop_point(&mut self) {
        let max = self.rows.len().saturating_sub(1);
        if self.loop_point as usize > max {
            self.loop_point = max as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_program_resolves_nothing() {
        let program: Program<u8, 4> = Program::new();
        assert_eq!(program.resolve(0), None);
        assert_eq!(program.resolve(7), None);
    }

    #[test]
    fn cursor_past_end_resumes_at_loop_point() {
        let program: Program<u8, 8> = Program::from_rows([1, 2, 3, 4], 2);
        assert_eq!(program.resolve(0), Some(0));
        assert_eq!(program.resolve(3), Some(3));
        assert_eq!(program.resolve(4), Some(2));
        assert_eq!(program.resolve(200), Some(2));
    }

    #[test]
    fn loop_point_is_clamped_to_length() {
        let program: Program<u8, 8> = Program::from_rows([1, 2], 9);
        assert_eq!(program.loop_point(), 1);
    }

    #[test]
    fn pop_keeps_loop_point_in_range() {
        let mut program: Program<u8, 8> = Program::from_rows([1, 2, 3], 2);
        program.pop();
        assert_eq!(program.loop_point(), 1);
        program.pop();
        program.pop();
        assert_eq!(program.loop_point(), 0);
        assert!(program.is_empty());
    }

    #[test]
    fn push_fails_at_capacity() {
        let mut program: Program<u8, 2> = Program::new();
        assert!(program.push(1).is_ok());
        assert!(program.push(2).is_ok());
        assert!(program.push(3).is_err());
        assert_eq!(program.len(), Program::<u8, 2>::CAPACITY);
    }
}
