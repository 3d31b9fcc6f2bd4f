//! Pairing of loop brackets.



use crate::code::Position;



/// A `[` whose jump slot still waits for its `]`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OpenLoop {
    /// Offset of the reserved 4-byte displacement field.
    pub slot: usize,
    /// Where the `[` is in the source.
    pub position: Position,
}


/// Stack of unresolved loop slots, innermost on top.
#[derive(Debug, Default)]
pub struct LoopStack {
    loops: Vec<OpenLoop>,
}

impl LoopStack {
    /// Record a reserved slot and return its offset.
    pub fn open(&mut self, slot: usize, position: Position) -> usize {
        self.loops.push(OpenLoop { slot, position });
        slot
    }

    /// Take the innermost open loop, if there is one.
    pub fn close(&mut self) -> Option<OpenLoop> {
        self.loops.pop()
    }

    pub fn is_balanced(&self) -> bool {
        self.loops.is_empty()
    }

    /// The outermost loop that was never closed.
    pub fn first_unclosed(&self) -> Option<&OpenLoop> {
        self.loops.first()
    }

    pub fn depth(&self) -> usize {
        self.loops.len()
    }
}
