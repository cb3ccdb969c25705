//! crates/curriculum_core/src/ordering.rs
//!
//! Sequence helpers used by drag-and-drop: reposition an element inside one
//! sequence, move it between two sequences, and renumber positions afterwards.
//! Each function leaves its inputs untouched when it returns an error.

use crate::domain::{Item, Section};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderingError {
    #[error("index {index} is out of bounds for a sequence of length {len}")]
    InvalidIndex { index: usize, len: usize },
}

/// Anything carrying a 1-based position number.
pub trait Sequenced {
    fn set_seq_no(&mut self, seq_no: u32);
}

impl Sequenced for Section {
    fn set_seq_no(&mut self, seq_no: u32) {
        self.seq_no = seq_no;
    }
}

impl Sequenced for Item {
    fn set_seq_no(&mut self, seq_no: u32) {
        match self {
            Item::Lecture(l) => l.seq_no = seq_no,
            Item::Quiz(q) => q.seq_no = seq_no,
            Item::Assignment(a) => a.seq_no = seq_no,
        }
    }
}

fn check(index: usize, len: usize) -> Result<(), OrderingError> {
    if index < len {
        Ok(())
    } else {
        Err(OrderingError::InvalidIndex { index, len })
    }
}

/// Moves the element at `from` so that it ends up at `to`.
pub fn reorder<T>(sequence: &mut Vec<T>, from: usize, to: usize) -> Result<(), OrderingError> {
    check(from, sequence.len())?;
    check(to, sequence.len())?;
    let element = sequence.remove(from);
    sequence.insert(to, element);
    Ok(())
}

/// Removes the element at `from` in `source` and inserts it at `to` in
/// `destination`. `to` may equal `destination.len()` to append.
pub fn move_between<T>(
    source: &mut Vec<T>,
    destination: &mut Vec<T>,
    from: usize,
    to: usize,
) -> Result<(), OrderingError> {
    check(from, source.len())?;
    check(to, destination.len() + 1)?;
    let element = source.remove(from);
    destination.insert(to, element);
    Ok(())
}

/// Sets every element's sequence number to its 1-based position.
pub fn renumber<T: Sequenced>(sequence: &mut [T]) {
    for (index, element) in sequence.iter_mut().enumerate() {
        element.set_seq_no(index as u32 + 1);
    }
}
