//! Configuration and mutable context of a single compilation.


use std::str::FromStr;

use crate::error::Error;
use crate::loops::LoopStack;
use crate::sink::OutputSink;


/// Size of one memory cell of the compiled program.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum CellWidth {
    /// 8-bit cells.
    #[default]
    Byte,
    /// 16-bit cells.
    Word,
    /// 32-bit cells.
    Dword,
}

impl CellWidth {
    /// Number of bytes in one cell.
    pub fn bytes(self) -> u32 {
        match self {
            CellWidth::Byte => 1,
            CellWidth::Word => 2,
            CellWidth::Dword => 4,
        }
    }
}

impl TryFrom<u8> for CellWidth {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(CellWidth::Byte),
            2 => Ok(CellWidth::Word),
            4 => Ok(CellWidth::Dword),
            _ => Err(Error::InvalidCellWidth(value)),
        }
    }
}


/// What a `,` does once the input is exhausted.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EofPolicy {
    /// Store the given code into the cell.
    Sentinel(i32),
    /// Leave the cell as it is.
    Unchanged,
}

impl EofPolicy {
    /// The value passed to the host input routine.
    pub fn sentinel(self) -> i32 {
        match self {
            EofPolicy::Sentinel(code) => code,
            EofPolicy::Unchanged => -1,
        }
    }
}

impl Default for EofPolicy {
    fn default() -> Self {
        EofPolicy::Sentinel(0)
    }
}

impl FromStr for EofPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unchanged") {
            return Ok(EofPolicy::Unchanged);
        }
        s.parse()
            .map(EofPolicy::Sentinel)
            .map_err(|_| Error::InvalidEofPolicy(s.to_owned()))
    }
}


/// Addresses of the host routines called by the generated code,
/// in the address space the code runs in.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct HostRoutines {
    /// `extern "C" fn(value: i32)`
    pub output_byte: u32,
    /// `extern "C" fn(eof: i32) -> i32`
    pub input_byte: u32,
}


/// Everything a compilation reads and writes.
///
/// Created by the caller around the output region, configured with the
/// `with_*` methods and then handed to [compile](crate::compile::compile).
/// # Example
/// ```
/// use bfjit::{CellWidth, CompilationState, EofPolicy};
///
/// let mut code = [0_u8; 256];
/// let state = CompilationState::new(&mut code, 0x0040_0000)
///     .with_cell_width(CellWidth::Word)
///     .with_eof_policy(EofPolicy::Unchanged);
///
/// assert_eq!(state.offset(), 0);
/// assert_eq!(state.capacity(), 256);
/// ```
#[derive(Debug)]
pub struct CompilationState<'a> {
    pub(crate) sink: OutputSink<'a>,
    pub(crate) loops: LoopStack,
    heap: u32,
    cell_width: CellWidth,
    eof_policy: EofPolicy,
    routines: HostRoutines,
    load_address: u32,
}

impl<'a> CompilationState<'a> {
    /// Create a state writing into `output`, with the cell pointer starting at `heap`.
    pub fn new(output: &'a mut [u8], heap: u32) -> Self {
        Self {
            sink: OutputSink::new(output),
            loops: LoopStack::default(),
            heap,
            cell_width: CellWidth::default(),
            eof_policy: EofPolicy::default(),
            routines: HostRoutines::default(),
            load_address: 0,
        }
    }

    pub fn with_cell_width(mut self, cell_width: CellWidth) -> Self {
        self.cell_width = cell_width;
        self
    }

    pub fn with_eof_policy(mut self, eof_policy: EofPolicy) -> Self {
        self.eof_policy = eof_policy;
        self
    }

    pub fn with_routines(mut self, routines: HostRoutines) -> Self {
        self.routines = routines;
        self
    }

    /// Address the start of the output region will have when the code runs.
    pub fn with_load_address(mut self, load_address: u32) -> Self {
        self.load_address = load_address;
        self
    }

    pub fn heap(&self) -> u32 {
        self.heap
    }

    pub fn cell_width(&self) -> CellWidth {
        self.cell_width
    }

    pub fn eof_policy(&self) -> EofPolicy {
        self.eof_policy
    }

    pub fn routines(&self) -> HostRoutines {
        self.routines
    }

    pub fn load_address(&self) -> u32 {
        self.load_address
    }

    /// Number of bytes generated so far.
    pub fn offset(&self) -> usize {
        self.sink.offset()
    }

    pub fn capacity(&self) -> usize {
        self.sink.capacity()
    }

    /// Whether the output region has overflowed.
    pub fn failed(&self) -> bool {
        self.sink.failed()
    }

    /// The generated machine code.
    pub fn code(&self) -> &[u8] {
        self.sink.code()
    }
}
