//! The Brainfuck to x86 compiler.



use std::io::{BufReader, Read};

use crate::code::{Coalescer, Position, Token};
use crate::encode::{encode, epilog, prolog};
use crate::error::Error;
use crate::state::CompilationState;



/// Compile Brainfuck code from `source` into the output region of `state`.
///
/// The generated code is a complete `extern "C" fn()` for 32-bit x86.
/// After an error the contents of the output region are not valid code.
/// # Arguments
/// * `source` - The Brainfuck code. Characters other than the 8 commands are comments.
/// * `state` - The compilation context holding the output region and settings.
/// # Returns
/// * `usize` - The number of bytes of generated code, if [Ok].
/// * [Error] - The encountered error, if [Err].
/// # Errors
/// * `Error::Io` - Reading `source` failed.
/// * `Error::OutOfOutputSpace` - The generated code does not fit into the output region.
/// * `Error::MismatchedBrackets` - A `]` without a `[`, or a `[` that is never closed.
/// # Example
/// ```
/// use bfjit::{compile, CompilationState};
///
/// let mut code = [0_u8; 64];
/// let mut state = CompilationState::new(&mut code, 0x1000);
/// let len = compile("+".as_bytes(), &mut state).unwrap();
///
/// assert_eq!(len, 16);
/// // inc byte [ebx]
/// assert_eq!(&code[9..11], &[0xFE, 0x03]);
/// ```
pub fn compile<R: Read>(source: R, state: &mut CompilationState<'_>) -> Result<usize, Error> {
    prolog(state);

    let mut coalescer = Coalescer::default();
    let mut position = Position::default();

    for byte in BufReader::new(source).bytes() {
        if state.failed() {
            return Err(Error::OutOfOutputSpace);
        }
        let byte = byte?;

        if let Some(token) = Token::from_byte(byte) {
            match token.op() {
                // loops and I/O end the pending run first
                Some(op) => {
                    if let Some(merged) = coalescer.flush() {
                        encode(merged, state, position)?;
                    }
                    encode(op, state, position)?;
                },
                None => {
                    if let Some(merged) = coalescer.push(token) {
                        encode(merged, state, position)?;
                    }
                },
            }
        }
        position.advance(byte);
    }

    if let Some(merged) = coalescer.flush() {
        encode(merged, state, position)?;
    }

    if let Some(open) = state.loops.first_unclosed() {
        return Err(Error::MismatchedBrackets {
            bracket: '[',
            line: open.position.line,
            column: open.position.column,
        });
    }

    epilog(state);

    if state.failed() {
        Err(Error::OutOfOutputSpace)
    } else {
        Ok(state.offset())
    }
}



#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::state::{CellWidth, EofPolicy, HostRoutines};

    const PROLOG: [u8; 9] = [0x53, 0x83, 0xEC, 0x04, 0xBB, 0x00, 0x00, 0x00, 0x00];
    const EPILOG: [u8; 5] = [0x83, 0xC4, 0x04, 0x5B, 0xC3];

    fn compile_code(code: &str, width: CellWidth) -> Result<Vec<u8>, Error> {
        let mut buffer = vec![0_u8; 0x10000];
        let mut state = CompilationState::new(&mut buffer, 0).with_cell_width(width);
        let len = compile(code.as_bytes(), &mut state)?;
        assert_eq!(len, state.code().len());
        Ok(state.code().to_vec())
    }

    /// The code between prolog and epilog.
    fn body(code: &str, width: CellWidth) -> Vec<u8> {
        let code = compile_code(code, width).unwrap();
        assert_eq!(&code[..PROLOG.len()], &PROLOG);
        assert_eq!(&code[code.len() - EPILOG.len()..], &EPILOG);
        code[PROLOG.len()..code.len() - EPILOG.len()].to_vec()
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }
    }

    #[test]
    fn test_single_increment() {
        let code = compile_code("+", CellWidth::Byte).unwrap();
        assert_eq!(code, vec![
            0x53, 0x83, 0xEC, 0x04, 0xBB, 0x00, 0x00, 0x00, 0x00,
            0xFE, 0x03,
            0x83, 0xC4, 0x04, 0x5B, 0xC3,
        ]);
        assert_eq!(compile_code("+", CellWidth::Byte).unwrap(), code);
    }

    #[test]
    fn test_empty_program() {
        assert!(body("", CellWidth::Byte).is_empty());
        assert!(body("just a comment", CellWidth::Dword).is_empty());
        assert!(body("+-<>", CellWidth::Byte).is_empty());
    }

    #[test]
    fn test_runs_become_one_instruction() {
        assert_eq!(body("+++", CellWidth::Byte), vec![0x80, 0x03, 0x03]);
        assert_eq!(body("---", CellWidth::Word), vec![0x66, 0x81, 0x2B, 0x03, 0x00]);
        assert_eq!(body(&">".repeat(200), CellWidth::Byte), vec![0x81, 0xC3, 0xC8, 0x00, 0x00, 0x00]);
        assert_eq!(body(&"<".repeat(127), CellWidth::Byte), vec![0x83, 0xEB, 0x7F]);
        assert_eq!(body("+++>>-", CellWidth::Byte), vec![0x80, 0x03, 0x03, 0x83, 0xC3, 0x02, 0xFE, 0x0B]);
    }

    #[test]
    fn test_clear_loop() {
        assert_eq!(body("[-]", CellWidth::Byte), vec![
            0xE9, 0x02, 0x00, 0x00, 0x00,
            0xFE, 0x0B,
            0x80, 0x3B, 0x00,
            0x0F, 0x85, 0xF5, 0xFF, 0xFF, 0xFF,
        ]);
    }

    #[test]
    fn test_backpatched_targets() {
        let code = compile_code("++[>+++[-<+>]<-]>.", CellWidth::Byte).unwrap();
        let mut jumps = Vec::new();
        for i in 0..code.len() - 4 {
            let stored = i32::from_le_bytes([code[i + 1], code[i + 2], code[i + 3], code[i + 4]]);
            if code[i] == 0xE9 {
                jumps.push((i + 1, stored));
            }
        }
        assert_eq!(jumps.len(), 2);
        for (slot, stored) in jumps {
            // the forward jump lands on a compare of the current cell
            let target = (slot as i64 + 4 + stored as i64) as usize;
            assert_eq!(&code[target..target + 3], &[0x80, 0x3B, 0x00]);
            // and the backward jump after it goes to the start of the body
            let back = i32::from_le_bytes([code[target + 5], code[target + 6], code[target + 7], code[target + 8]]);
            assert_eq!(&code[target + 3..target + 5], &[0x0F, 0x85]);
            assert_eq!(target as i64 + 9 + back as i64, slot as i64 + 4);
        }
    }

    #[test]
    fn test_mismatched_brackets() {
        assert!(matches!(
            compile_code("]", CellWidth::Byte),
            Err(Error::MismatchedBrackets { bracket: ']', line: 1, column: 1 })
        ));
        assert!(matches!(
            compile_code("[", CellWidth::Byte),
            Err(Error::MismatchedBrackets { bracket: '[', line: 1, column: 1 })
        ));
        assert!(matches!(
            compile_code("+\n [[]\n+", CellWidth::Byte),
            Err(Error::MismatchedBrackets { bracket: '[', line: 2, column: 2 })
        ));
        assert!(matches!(
            compile_code("[]\n+]", CellWidth::Word),
            Err(Error::MismatchedBrackets { bracket: ']', line: 2, column: 2 })
        ));
    }

    #[test]
    fn test_out_of_space() {
        let mut buffer = [0xAA_u8; 4];
        let mut state = CompilationState::new(&mut buffer[..3], 0);
        assert!(matches!(compile("+".as_bytes(), &mut state), Err(Error::OutOfOutputSpace)));
        assert_eq!(buffer[3], 0xAA);

        let mut buffer = [0_u8; 0];
        let mut state = CompilationState::new(&mut buffer, 0);
        assert!(matches!(compile("".as_bytes(), &mut state), Err(Error::OutOfOutputSpace)));
    }

    #[test]
    fn test_out_of_space_in_body() {
        let mut buffer = [0xAA_u8; 40];
        let mut state = CompilationState::new(&mut buffer[..20], 0);
        let result = compile("+.+.+.+.".as_bytes(), &mut state);
        assert!(matches!(result, Err(Error::OutOfOutputSpace)));
        assert!(state.offset() <= 20);
        assert!(buffer[20..].iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn test_exact_fit() {
        let mut buffer = [0_u8; 16];
        let mut state = CompilationState::new(&mut buffer, 0);
        assert_eq!(compile("+".as_bytes(), &mut state).unwrap(), 16);

        let mut buffer = [0_u8; 15];
        let mut state = CompilationState::new(&mut buffer, 0);
        assert!(matches!(compile("+".as_bytes(), &mut state), Err(Error::OutOfOutputSpace)));
    }

    #[test]
    fn test_io_error() {
        let mut buffer = [0_u8; 64];
        let mut state = CompilationState::new(&mut buffer, 0);
        assert!(matches!(compile(FailingReader, &mut state), Err(Error::Io(_))));
    }

    #[test]
    fn test_io_uses_host_routines() {
        let mut buffer = [0_u8; 64];
        let routines = HostRoutines { output_byte: 0x0804_9000, input_byte: 0x0804_9100 };
        let mut state = CompilationState::new(&mut buffer, 0x0900_0000)
            .with_routines(routines)
            .with_load_address(0x0804_8000)
            .with_eof_policy(EofPolicy::Unchanged);
        let len = compile(",.".as_bytes(), &mut state).unwrap();
        let code = state.code();
        assert_eq!(code.len(), len);

        // , starts right after the prolog, its call field at 15
        let input = u32::from_le_bytes([code[15], code[16], code[17], code[18]]);
        assert_eq!(0x0804_8000_u32 + 19 + input, 0x0804_9100);
        // cmp eax, -1; je +2; mov [ebx], al
        assert_eq!(&code[22..29], &[0x83, 0xF8, 0xFF, 0x74, 0x02, 0x88, 0x03]);
        // . follows: movzx, push, call field at 34
        assert_eq!(&code[29..33], &[0x0F, 0xB6, 0x03, 0x50]);
        let output = u32::from_le_bytes([code[34], code[35], code[36], code[37]]);
        assert_eq!(0x0804_8000_u32 + 38 + output, 0x0804_9000);
    }
}
