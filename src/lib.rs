//! Brainfuck compiler producing 32-bit x86 machine code.
//!
//! The code is written straight into a caller-supplied memory region and
//! forms an `extern "C" fn()` that works on a caller-supplied heap.
//! Mapping the region executable and calling it is left to the caller.

pub mod code;
pub mod compile;
pub mod encode;
pub mod error;
pub mod io;
pub mod loops;
pub mod sink;
pub mod state;



#[doc(inline)]
pub use compile::*;

#[doc(inline)]
pub use error::*;

#[doc(inline)]
pub use state::*;
