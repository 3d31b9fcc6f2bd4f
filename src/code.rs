//! Tokenization and run-length merging of code.


use crate::encode::Op;


#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Token {
    Add(i32),     // +/- (+ represented as +1, - represented as -1)
    Mov(i32),     // </> (< represented as -1, > represented as +1)
    Input,        // ,
    Output,       // .
    OpenBr,       // [
    CloseBr,      // ]
}

impl Token {
    /// Classify a source byte. Anything that is not a command is a comment.
    pub fn from_byte(byte: u8) -> Option<Token> {
        match byte {
            b'+' => Some(Token::Add(1)),
            b'-' => Some(Token::Add(-1)),
            b'<' => Some(Token::Mov(-1)),
            b'>' => Some(Token::Mov(1)),
            b',' => Some(Token::Input),
            b'.' => Some(Token::Output),
            b'[' => Some(Token::OpenBr),
            b']' => Some(Token::CloseBr),
            _ => None,
        }
    }

    /// The operation for tokens that never take part in merging.
    pub fn op(self) -> Option<Op> {
        match self {
            Token::Input => Some(Op::Input),
            Token::Output => Some(Op::Output),
            Token::OpenBr => Some(Op::OpenLoop),
            Token::CloseBr => Some(Op::CloseLoop),
            Token::Add(_) | Token::Mov(_) => None,
        }
    }
}


/// Line and column of a character in the source, both starting at 1.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Move past `byte`.
    pub fn advance(&mut self, byte: u8) {
        if byte == b'\n' {
            self.line += 1;
            self.column = 1;
        } else if byte & 0xC0 != 0x80 {
            // UTF-8 continuation bytes belong to the previous character
            self.column += 1;
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new(1, 1)
    }
}


#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Class {
    Value,
    Pointer,
}


/// Merges runs of `+`/`-` and `<`/`>` into single operations.
///
/// Only one run is pending at a time. A token of the other class,
/// or a call to [flush](Coalescer::flush), ends it.
#[derive(Debug, Default)]
pub struct Coalescer {
    pending: Option<Class>,
    count: i32,
}

impl Coalescer {
    /// Feed an adjustment token.
    /// # Returns
    /// * The merged operation of the previous run, if this token ended it.
    pub fn push(&mut self, token: Token) -> Option<Op> {
        let (class, delta) = match token {
            Token::Add(n) => (Class::Value, n),
            Token::Mov(n) => (Class::Pointer, n),
            _ => return self.flush(),
        };

        if self.pending == Some(class) {
            self.count = self.count.wrapping_add(delta);
            None
        } else {
            let flushed = self.flush();
            self.pending = Some(class);
            self.count = delta;
            flushed
        }
    }

    /// End the pending run.
    /// # Returns
    /// * The merged operation, or [None] if the run cancelled out.
    pub fn flush(&mut self) -> Option<Op> {
        let class = self.pending.take()?;
        let count = std::mem::take(&mut self.count);
        let magnitude = count.unsigned_abs();

        match (class, count.is_positive()) {
            _ if magnitude == 0 => None,
            (Class::Value, true) => Some(Op::Add(magnitude)),
            (Class::Value, false) => Some(Op::Sub(magnitude)),
            (Class::Pointer, true) => Some(Op::Right(magnitude)),
            (Class::Pointer, false) => Some(Op::Left(magnitude)),
        }
    }
}
