//! Encoding of single operations into 32-bit x86 machine code.
//!
//! Register use of the generated code:
//! * `ebx` - pointer to the current cell (callee-saved, so it survives the host calls)
//! * `eax` - scratch, argument and return value of the host calls
//!
//! Host routines follow cdecl: arguments on the stack, result in `eax`,
//! caller pops the arguments. The prolog reserves 4 bytes so that `esp`
//! is 16-byte aligned at every call.



use crate::code::Position;
use crate::error::Error;
use crate::sink::OutputSink;
use crate::state::{CellWidth, CompilationState, EofPolicy};



/// One operation after run-length merging.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Op {
    Add(u32),     // add n to the current cell
    Sub(u32),     // subtract n from the current cell
    Right(u32),   // move n cells right
    Left(u32),    // move n cells left
    Output,
    Input,
    OpenLoop,
    CloseLoop,
}


// ModRM operands
const EBX_INDIRECT: u8 = 0b00_000_011;   // [ebx]
const EBX_DIRECT: u8 = 0b11_000_011;     // ebx
const ESP_DIRECT: u8 = 0b11_000_100;     // esp
const EAX_DIRECT: u8 = 0b11_000_000;     // eax

// opcode extensions (the reg field of ModRM)
const EXT_ADD: u8 = 0 << 3;
const EXT_INC: u8 = 0 << 3;
const EXT_DEC: u8 = 1 << 3;
const EXT_SUB: u8 = 5 << 3;
const EXT_CMP: u8 = 7 << 3;

const OPERAND_SIZE_PREFIX: u8 = 0x66;

const PUSH_EBX: u8 = 0x53;
const POP_EBX: u8 = 0x5B;
const PUSH_EAX: u8 = 0x50;
const MOV_EBX_IMM32: u8 = 0xBB;
const INC_EBX: u8 = 0x43;
const DEC_EBX: u8 = 0x4B;
const PUSH_IMM32: u8 = 0x68;
const CALL_REL32: u8 = 0xE8;
const JMP_REL32: u8 = 0xE9;
const JE_REL8: u8 = 0x74;
const JNZ_REL32: [u8; 2] = [0x0F, 0x85];
const RET: u8 = 0xC3;

// group 1 arithmetic (add/sub/cmp r/m, imm)
const ALU_RM8_IMM8: u8 = 0x80;
const ALU_RM_IMM: u8 = 0x81;
const ALU_RM_IMM8: u8 = 0x83;

// group 4/5 (inc/dec r/m)
const INC_DEC_RM8: u8 = 0xFE;
const INC_DEC_RM: u8 = 0xFF;

// bytes the stack is kept aligned by, and freed again after each call
const FRAME_PADDING: u8 = 4;
const CALL_ARGS_SIZE: u8 = 4;



/// Emit the function entry: save `ebx`, align the stack and point `ebx` at the heap.
pub fn prolog(state: &mut CompilationState<'_>) {
    let heap = state.heap();
    let sink = &mut state.sink;
    sink.put(&[PUSH_EBX]);
    sink.put(&[ALU_RM_IMM8, EXT_SUB | ESP_DIRECT, FRAME_PADDING]);   // sub esp, 4
    sink.put(&[MOV_EBX_IMM32]);
    sink.put_u32(heap);
}

/// Emit the function exit, undoing [prolog].
pub fn epilog(state: &mut CompilationState<'_>) {
    let sink = &mut state.sink;
    sink.put(&[ALU_RM_IMM8, EXT_ADD | ESP_DIRECT, FRAME_PADDING]);   // add esp, 4
    sink.put(&[POP_EBX, RET]);
}

/// Append the machine code of `op` to the output region.
/// # Arguments
/// * `op` - The operation to encode.
/// * `state` - The compilation receiving the code.
/// * `position` - Where the operation comes from in the source (used for loop errors).
/// # Errors
/// * `Error::MismatchedBrackets` - If `op` closes a loop that was never opened.
pub fn encode(op: Op, state: &mut CompilationState<'_>, position: Position) -> Result<(), Error> {
    let width = state.cell_width();
    match op {
        Op::Add(n) => adjust_value(&mut state.sink, width, n, true),
        Op::Sub(n) => adjust_value(&mut state.sink, width, n, false),
        Op::Right(n) => adjust_pointer(&mut state.sink, width, n, true),
        Op::Left(n) => adjust_pointer(&mut state.sink, width, n, false),
        Op::Output => output(state),
        Op::Input => input(state),
        Op::OpenLoop => open_loop(state, position),
        Op::CloseLoop => close_loop(state, position)?,
    }
    Ok(())
}

/// Prefix needed to give an instruction the operand size of a cell.
fn size_prefix(sink: &mut OutputSink<'_>, width: CellWidth) {
    if width == CellWidth::Word {
        sink.put(&[OPERAND_SIZE_PREFIX]);
    }
}

fn adjust_value(sink: &mut OutputSink<'_>, width: CellWidth, n: u32, increment: bool) {
    size_prefix(sink, width);
    if n == 1 {
        // inc/dec [ebx]
        let opcode = if width == CellWidth::Byte { INC_DEC_RM8 } else { INC_DEC_RM };
        let ext = if increment { EXT_INC } else { EXT_DEC };
        sink.put(&[opcode, ext | EBX_INDIRECT]);
    } else {
        // add/sub [ebx], imm
        let opcode = if width == CellWidth::Byte { ALU_RM8_IMM8 } else { ALU_RM_IMM };
        let ext = if increment { EXT_ADD } else { EXT_SUB };
        sink.put(&[opcode, ext | EBX_INDIRECT]);
        sink.put_imm(width, n);
    }
}

fn adjust_pointer(sink: &mut OutputSink<'_>, width: CellWidth, n: u32, increment: bool) {
    let displacement = n.wrapping_mul(width.bytes());
    let ext = if increment { EXT_ADD } else { EXT_SUB };

    if displacement == 1 {
        sink.put(&[if increment { INC_EBX } else { DEC_EBX }]);
    } else if displacement <= 0x7F {
        // sign-extended imm8 is enough
        sink.put(&[ALU_RM_IMM8, ext | EBX_DIRECT, displacement as u8]);
    } else {
        sink.put(&[ALU_RM_IMM, ext | EBX_DIRECT]);
        sink.put_u32(displacement);
    }
}

fn output(state: &mut CompilationState<'_>) {
    let load_address = state.load_address();
    let routine = state.routines().output_byte;
    let width = state.cell_width();
    let sink = &mut state.sink;

    match width {
        CellWidth::Byte => sink.put(&[0x0F, 0xB6, EBX_INDIRECT]),   // movzx eax, byte [ebx]
        CellWidth::Word => sink.put(&[0x0F, 0xB7, EBX_INDIRECT]),   // movzx eax, word [ebx]
        CellWidth::Dword => sink.put(&[0x8B, EBX_INDIRECT]),        // mov eax, [ebx]
    }
    sink.put(&[PUSH_EAX]);
    call(sink, load_address, routine);
}

fn input(state: &mut CompilationState<'_>) {
    let load_address = state.load_address();
    let routine = state.routines().input_byte;
    let eof_policy = state.eof_policy();
    let width = state.cell_width();
    let sink = &mut state.sink;

    sink.put(&[PUSH_IMM32]);
    sink.put_u32(eof_policy.sentinel() as u32);
    call(sink, load_address, routine);

    let store: &[u8] = match width {
        CellWidth::Byte => &[0x88, EBX_INDIRECT],                        // mov [ebx], al
        CellWidth::Word => &[OPERAND_SIZE_PREFIX, 0x89, EBX_INDIRECT],   // mov [ebx], ax
        CellWidth::Dword => &[0x89, EBX_INDIRECT],                       // mov [ebx], eax
    };
    if eof_policy == EofPolicy::Unchanged {
        // cmp eax, -1
        // je past the store
        sink.put(&[ALU_RM_IMM8, EXT_CMP | EAX_DIRECT, 0xFF]);
        sink.put(&[JE_REL8, store.len() as u8]);
    }
    sink.put(store);
}

/// `call routine` followed by popping the single argument.
fn call(sink: &mut OutputSink<'_>, load_address: u32, routine: u32) {
    sink.put(&[CALL_REL32]);
    sink.put_call_target(load_address, routine);
    sink.put(&[ALU_RM_IMM8, EXT_ADD | ESP_DIRECT, CALL_ARGS_SIZE]);   // add esp, 4
}

fn open_loop(state: &mut CompilationState<'_>, position: Position) {
    // jump to the test at the end of the loop, patched by close_loop
    state.sink.put(&[JMP_REL32]);
    state.loops.open(state.sink.offset(), position);
    state.sink.put_u32(0);
}

fn close_loop(state: &mut CompilationState<'_>, position: Position) -> Result<(), Error> {
    let open = state.loops.close().ok_or(Error::MismatchedBrackets {
        bracket: ']',
        line: position.line,
        column: position.column,
    })?;
    let width = state.cell_width();
    let sink = &mut state.sink;

    sink.put_relative_at(open.slot, sink.offset());

    // cmp [ebx], 0
    size_prefix(sink, width);
    let opcode = if width == CellWidth::Byte { ALU_RM8_IMM8 } else { ALU_RM_IMM8 };
    sink.put(&[opcode, EXT_CMP | EBX_INDIRECT, 0]);

    // jnz to the start of the body
    sink.put(&JNZ_REL32);
    sink.put_relative(open.slot + 4);
    Ok(())
}
