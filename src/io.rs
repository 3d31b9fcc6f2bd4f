//! Host routines the generated code calls for `.` and `,`.


use std::io::{self, Read, Write};
use std::slice;

use crate::state::HostRoutines;


/// Write the low byte of `value` to the standard output.
/// # Arguments
/// * `value` - The cell value, zero-extended by the generated code.
pub extern "C" fn output_byte(value: i32) {
    // nowhere to report a failure to from inside the generated code
    let _ = write_byte(&mut io::stdout().lock(), value);
}

/// Read a single byte from the standard input.
/// # Arguments
/// * `eof` - The value to return once the input is exhausted.
/// # Returns
/// * The byte read, or `eof`.
pub extern "C" fn input_byte(eof: i32) -> i32 {
    let _ = io::stdout().flush();  // flush the output buffer before reading input
    read_byte(&mut io::stdin().lock(), eof)
}

/// Addresses of [output_byte] and [input_byte] in this process.
///
/// Only meaningful on a host with 32-bit pointers.
pub fn native_routines() -> HostRoutines {
    HostRoutines {
        output_byte: output_byte as *const () as usize as u32,
        input_byte: input_byte as *const () as usize as u32,
    }
}

/// Read one byte from `reader`, returning `eof` at the end of the input or on an error.
pub fn read_byte<R: Read>(reader: &mut R, eof: i32) -> i32 {
    let mut byte = 0;
    loop {
        match reader.read(slice::from_mut(&mut byte)) {
            Ok(0) => return eof,
            Ok(_) => return i32::from(byte),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => return eof,
        }
    }
}

/// Write the low byte of `value` to `writer`.
pub fn write_byte<W: Write>(writer: &mut W, value: i32) -> io::Result<()> {
    writer.write_all(&[value as u8])
}
