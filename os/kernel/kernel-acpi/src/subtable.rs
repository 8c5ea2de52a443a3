//! # Subtable iteration
//!
//! Several ACPI tables (MADT, SRAT, ...) end in a stream of variable-length
//! records, each starting with a one-byte type and a one-byte length that
//! covers the whole record. [`Subtables`] walks such a stream without copying
//! it. A record that is empty or runs past the table end stops the walk with
//! an error, since the next record position would be unknown.

use crate::{SubtableFault, TableError};
use core::iter::FusedIterator;

/// Size of the type/length prefix every subtable starts with.
pub const SUBTABLE_HEADER_SIZE: usize = 2;

/// A single record inside a table, borrowed from the table bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RawSubtable<'a> {
    offset: usize,
    bytes: &'a [u8],
}

impl<'a> RawSubtable<'a> {
    /// Record type tag.
    #[must_use]
    pub const fn kind(&self) -> u8 {
        self.bytes[0]
    }

    /// Declared record length, prefix included.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Never true for records produced by [`Subtables`].
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Byte offset of the record from the start of the table.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// The whole record, prefix included.
    #[must_use]
    pub const fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub(crate) const fn fault(&self, reason: SubtableFault) -> TableError {
        TableError::MalformedSubtable {
            offset: self.offset,
            reason,
        }
    }
}

/// Forward walk over the records following a table's fixed header.
///
/// Yields `Err` at most once and then ends.
#[derive(Debug)]
pub struct Subtables<'a> {
    table: &'a [u8],
    cursor: usize,
    done: bool,
}

/// Walk the records of `table` that start `header_size` bytes in.
///
/// `table` must span exactly the declared table length. A `header_size`
/// beyond the end yields no records.
#[must_use]
pub const fn subtables(table: &[u8], header_size: usize) -> Subtables<'_> {
    Subtables {
        table,
        cursor: header_size,
        done: header_size >= table.len(),
    }
}

impl<'a> Subtables<'a> {
    fn fail(&mut self, reason: SubtableFault) -> Option<Result<RawSubtable<'a>, TableError>> {
        self.done = true;
        Some(Err(TableError::MalformedSubtable {
            offset: self.cursor,
            reason,
        }))
    }
}

impl<'a> Iterator for Subtables<'a> {
    type Item = Result<RawSubtable<'a>, TableError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let remaining = self.table.len() - self.cursor;
        if remaining < SUBTABLE_HEADER_SIZE {
            return self.fail(SubtableFault::TruncatedHeader);
        }

        let length = usize::from(self.table[self.cursor + 1]);
        if length < SUBTABLE_HEADER_SIZE {
            return self.fail(SubtableFault::TooShort { length });
        }
        if length > remaining {
            return self.fail(SubtableFault::Overrun { length });
        }

        let record = RawSubtable {
            offset: self.cursor,
            bytes: &self.table[self.cursor..self.cursor + length],
        };
        self.cursor += length;
        self.done = self.cursor == self.table.len();
        Some(Ok(record))
    }
}

impl FusedIterator for Subtables<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_to_exact_end() {
        let table = [0xAA, 0xBB, 7, 2, 9, 4, 1, 2];
        let kinds: Vec<_> = subtables(&table, 2)
            .map(|r| r.map(|s| (s.kind(), s.offset(), s.len())))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(kinds, vec![(7, 2, 2), (9, 4, 4)]);
    }

    #[test]
    fn empty_body_yields_nothing() {
        assert_eq!(subtables(&[1, 2, 3], 3).count(), 0);
        assert_eq!(subtables(&[1, 2, 3], 8).count(), 0);
    }

    #[test]
    fn zero_length_record_stops_the_walk() {
        let table = [0, 0, 1, 2, 5, 0, 1, 2];
        let mut it = subtables(&table, 2);
        assert!(it.next().unwrap().is_ok());
        assert_eq!(
            it.next(),
            Some(Err(TableError::MalformedSubtable {
                offset: 4,
                reason: SubtableFault::TooShort { length: 0 }
            }))
        );
        assert_eq!(it.next(), None);
    }

    #[test]
    fn one_byte_record_stops_the_walk() {
        // The declared length would otherwise be read as the next type.
        let table = [0, 0, 0x20, 1, 12, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let mut it = subtables(&table, 2);
        assert_eq!(
            it.next(),
            Some(Err(TableError::MalformedSubtable {
                offset: 2,
                reason: SubtableFault::TooShort { length: 1 }
            }))
        );
        assert_eq!(it.next(), None);
    }

    #[test]
    fn overrunning_record_is_rejected() {
        let table = [0, 0, 1, 8, 0, 0];
        let mut it = subtables(&table, 2);
        assert_eq!(
            it.next(),
            Some(Err(TableError::MalformedSubtable {
                offset: 2,
                reason: SubtableFault::Overrun { length: 8 }
            }))
        );
        assert_eq!(it.next(), None);
    }

    #[test]
    fn dangling_byte_is_a_truncated_header() {
        let table = [0, 0, 1, 2, 3];
        let results: Vec<_> = subtables(&table, 2).collect();
        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[1],
            Err(TableError::MalformedSubtable {
                offset: 4,
                reason: SubtableFault::TruncatedHeader
            })
        ));
    }
}
