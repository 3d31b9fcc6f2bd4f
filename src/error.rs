//! Module containing the Error enum for errors that can occur in this crate.


use std::io;

use thiserror::Error;


/// Error enum for errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O operation failed, most often reading the Brainfuck source.
    /// End of input is not an error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The output region is too small for the generated code.
    #[error("The output region is too small for the generated code.")]
    OutOfOutputSpace,
    /// A `]` without a matching `[`, or a `[` that is never closed.
    #[error("Unmatched '{bracket}' at line {line}, column {column}.")]
    MismatchedBrackets {
        bracket: char,
        line: usize,
        column: usize,
    },
    /// Cell width other than 1, 2 or 4 bytes.
    #[error("Invalid cell size {0}, expected 1, 2 or 4.")]
    InvalidCellWidth(u8),
    /// End-of-input policy that is neither an integer nor `unchanged`.
    #[error("Invalid EOF code '{0}', expected an integer or 'unchanged'.")]
    InvalidEofPolicy(String),
    /// Address that does not fit into the 32-bit address space.
    #[error("Invalid address '{0}', expected a 32-bit decimal or 0x-prefixed hexadecimal number.")]
    InvalidAddress(String),
    /// The current platform can not execute 32-bit x86 code.
    #[error("The current platform is not supported.")]
    UnsupportedPlatform,
}

impl Error {
    /// Whether this error is one of the bracket mismatch errors.
    pub fn is_mismatched_brackets(&self) -> bool {
        matches!(self, Error::MismatchedBrackets { .. })
    }
}



#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let error = Error::MismatchedBrackets { bracket: ']', line: 3, column: 7 };
        assert_eq!(error.to_string(), "Unmatched ']' at line 3, column 7.");
        assert!(error.is_mismatched_brackets());
        assert_eq!(Error::InvalidCellWidth(3).to_string(), "Invalid cell size 3, expected 1, 2 or 4.");
        assert!(!Error::OutOfOutputSpace.is_mismatched_brackets());
    }

    #[test]
    fn test_from_io() {
        let error: Error = io::Error::new(io::ErrorKind::Other, "broken pipe").into();
        assert!(matches!(error, Error::Io(_)));
        assert_eq!(error.to_string(), "I/O error: broken pipe");
    }
}
