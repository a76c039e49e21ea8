//! Brainfuck virtual machine.
//!
//! Source text is pre-compiled into an internal instruction stream: each word
//! packs an opcode byte with a signed 16-bit argument, runs of identical
//! `+ - < >` characters collapse into one word carrying the run length, and
//! bracket pairs resolve into matched jump targets at compile time. A halt
//! word is appended after the last instruction.

use thiserror::Error;

use crate::channel::Channels;
use crate::delta::{Delta, DeltaBuilder, Location};
use crate::machine::Machine;

pub const MEMORY_SIZE: usize = 30_000;
pub const REGISTER_COUNT: usize = 2;
pub const PROGRAM_COUNTER: usize = 0;
pub const DATA_POINTER: usize = 1;

pub type Result<T> = std::result::Result<T, CompileError>;

/// Structural program errors caught before anything becomes runnable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("unmatched ']' at source offset {0}")]
    UnmatchedClose(usize),
    #[error("unmatched '[' at source offset {0}")]
    UnmatchedOpen(usize),
}

/// Opcodes of the compiled stream. Discriminants match the source characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Op {
    MoveRight = b'>',
    MoveLeft = b'<',
    Increment = b'+',
    Decrement = b'-',
    Output = b'.',
    Input = b',',
    JumpIfZero = b'[',
    JumpIfNonzero = b']',
    Halt = b'H',
}

impl Op {
    fn from_byte(byte: u8) -> Option<Op> {
        match byte {
            b'>' => Some(Op::MoveRight),
            b'<' => Some(Op::MoveLeft),
            b'+' => Some(Op::Increment),
            b'-' => Some(Op::Decrement),
            b'.' => Some(Op::Output),
            b',' => Some(Op::Input),
            b'[' => Some(Op::JumpIfZero),
            b']' => Some(Op::JumpIfNonzero),
            b'H' => Some(Op::Halt),
            _ => None,
        }
    }
}

/// Packs an opcode and its argument into one instruction word.
pub const fn pack_instruction(opcode: Op, argument: i16) -> u32 {
    ((opcode as u32) << 16) | (argument as u16 as u32)
}

fn unpack_instruction(instruction: u32) -> (Option<Op>, i16) {
    let opcode = Op::from_byte((instruction >> 16) as u8);
    let argument = (instruction & 0xFFFF) as u16 as i16;
    (opcode, argument)
}

const HALT_WORD: u32 = pack_instruction(Op::Halt, 0);

/// Returns the first index at or after `start` holding a different byte.
fn scan_run(bytes: &[u8], start: usize) -> usize {
    let target = bytes[start];
    let mut end = start;
    while end < bytes.len() && bytes[end] == target {
        end += 1;
    }
    end
}

pub struct Brainfuck {
    memory: Vec<u8>,
    registers: [u32; REGISTER_COUNT],
    halted: bool,
    program: Vec<u32>,
    channels: Channels,
}

impl Brainfuck {
    pub fn new(channels: Channels) -> Self {
        Self {
            memory: vec![0; MEMORY_SIZE],
            registers: [0; REGISTER_COUNT],
            halted: false,
            program: Vec::new(),
            channels,
        }
    }

    /// Compiles `source` and installs the result as the machine's program.
    ///
    /// A bracket mismatch rejects the whole program; the previously loaded
    /// program stays in place.
    pub fn load_program(&mut self, source: &str) -> Result<()> {
        let bytes = source.as_bytes();
        let mut program = Vec::with_capacity(bytes.len() + 1);
        // (program index, source offset) of each still-open '['.
        let mut open_brackets: Vec<(usize, usize)> = Vec::new();

        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                byte @ (b'>' | b'<' | b'+' | b'-' | b'.' | b',') => {
                    let end = scan_run(bytes, i);
                    let mut argument = (end - i) as i32;
                    if byte == b'+' || byte == b'-' {
                        argument %= 256;
                    }
                    let opcode = Op::from_byte(byte).expect("run opcode");
                    program.push(pack_instruction(opcode, argument as i16));
                    i = end;
                }
                b'[' => {
                    open_brackets.push((program.len(), i));
                    program.push(HALT_WORD); // patched when the ']' arrives
                    i += 1;
                }
                b']' => {
                    let (open_index, _) = open_brackets
                        .pop()
                        .ok_or(CompileError::UnmatchedClose(i))?;
                    program.push(pack_instruction(Op::JumpIfNonzero, open_index as i16));
                    program[open_index] =
                        pack_instruction(Op::JumpIfZero, (program.len() - 1) as i16);
                    i += 1;
                }
                _ => i += 1, // every other character is a comment
            }
        }

        if let Some(&(_, offset)) = open_brackets.first() {
            return Err(CompileError::UnmatchedOpen(offset));
        }

        program.push(HALT_WORD);
        self.program = program;
        Ok(())
    }

    pub fn program(&self) -> &[u32] {
        &self.program
    }
}

impl Default for Brainfuck {
    fn default() -> Self {
        Self::new(Channels::stdio())
    }
}

impl Machine for Brainfuck {
    fn name(&self) -> &'static str {
        "Brainfuck Virtual Machine"
    }

    fn read_register(&self, index: usize) -> u32 {
        self.registers[index]
    }

    fn write_register(&mut self, index: usize, value: u32) {
        self.registers[index] = value;
    }

    fn read_memory(&self, address: usize) -> u32 {
        u32::from(self.memory[address % MEMORY_SIZE])
    }

    fn write_memory(&mut self, address: usize, value: u32) {
        self.memory[address % MEMORY_SIZE] = value as u8;
    }

    fn channels(&mut self) -> &mut Channels {
        &mut self.channels
    }

    fn is_halted(&self) -> bool {
        self.halted
    }

    fn halt(&mut self) {
        self.halted = true;
    }

    fn unhalt(&mut self) {
        self.halted = false;
    }

    fn reset(&mut self) {
        self.memory = vec![0; MEMORY_SIZE];
        self.registers = [0; REGISTER_COUNT];
        self.halted = false;
        self.program.clear();
    }

    fn current_instruction(&self) -> u32 {
        let pc = self.registers[PROGRAM_COUNTER] as usize;
        self.program.get(pc).copied().unwrap_or(HALT_WORD)
    }

    fn decode(&self, instruction: u32) -> Delta {
        if self.halted {
            return Delta::empty();
        }

        let (opcode, raw_argument) = unpack_instruction(instruction);
        let mut argument = i32::from(raw_argument);
        let pc = self.registers[PROGRAM_COUNTER];
        let mut new_pc = pc + 1;
        let data_ptr = self.registers[DATA_POINTER] as usize;
        let mut new_data_ptr = data_ptr;
        let cell = self.memory[data_ptr % MEMORY_SIZE];

        let mut builder = DeltaBuilder::new();
        match opcode {
            Some(direction @ (Op::MoveLeft | Op::MoveRight)) => {
                if direction == Op::MoveLeft {
                    argument = -argument;
                }
                new_data_ptr = (data_ptr as i64 + i64::from(argument))
                    .rem_euclid(MEMORY_SIZE as i64) as usize;
            }
            Some(change @ (Op::Decrement | Op::Increment)) => {
                if change == Op::Decrement {
                    argument = -argument;
                }
                let value = (i32::from(cell) + argument).rem_euclid(256) as u8;
                builder.write_memory(data_ptr, u32::from(cell), u32::from(value));
            }
            Some(Op::JumpIfZero) => {
                if cell == 0 {
                    new_pc = argument as u32;
                }
            }
            Some(Op::JumpIfNonzero) => {
                if cell != 0 {
                    new_pc = argument as u32;
                }
            }
            Some(Op::Input) => {
                for _ in 0..argument {
                    builder.input(Location::Memory(data_ptr));
                }
            }
            Some(Op::Output) => {
                for _ in 0..argument {
                    builder.output(u32::from(cell));
                }
            }
            Some(Op::Halt) => {
                builder.halt();
            }
            None => {}
        }

        builder.write_register(PROGRAM_COUNTER, pc, new_pc);
        builder.write_register(DATA_POINTER, data_ptr as u32, new_data_ptr as u32);
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiled(source: &str) -> Vec<u32> {
        let mut machine = Brainfuck::new(Channels::from_parts(
            std::io::empty(),
            std::io::sink(),
        ));
        machine.load_program(source).expect("compile");
        machine.program().to_vec()
    }

    #[test]
    fn runs_collapse_into_one_word() {
        let program = compiled("+++>>--");
        assert_eq!(program.len(), 4); // three runs plus the halt word
        assert_eq!(program[0], pack_instruction(Op::Increment, 3));
        assert_eq!(program[1], pack_instruction(Op::MoveRight, 2));
        assert_eq!(program[2], pack_instruction(Op::Decrement, 2));
        assert_eq!(program[3], pack_instruction(Op::Halt, 0));
    }

    #[test]
    fn value_run_length_wraps_modulo_256() {
        let program = compiled(&"+".repeat(259));
        assert_eq!(program[0], pack_instruction(Op::Increment, 3));
    }

    #[test]
    fn brackets_resolve_to_matched_targets() {
        let program = compiled("+[-]");
        assert_eq!(program[1], pack_instruction(Op::JumpIfZero, 3));
        assert_eq!(program[3], pack_instruction(Op::JumpIfNonzero, 1));
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(compiled("a + b").len(), 2);
    }

    #[test]
    fn unmatched_close_bracket_is_rejected() {
        let mut machine = Brainfuck::new(Channels::from_parts(
            std::io::empty(),
            std::io::sink(),
        ));
        assert_eq!(
            machine.load_program("+]"),
            Err(CompileError::UnmatchedClose(1))
        );
        assert!(machine.program().is_empty());
    }

    #[test]
    fn unmatched_open_bracket_is_rejected() {
        let mut machine = Brainfuck::new(Channels::from_parts(
            std::io::empty(),
            std::io::sink(),
        ));
        assert_eq!(
            machine.load_program("+[[-]"),
            Err(CompileError::UnmatchedOpen(1))
        );
    }

    #[test]
    fn pointer_moves_wrap_around_memory() {
        // Moving left from cell 0 lands on the last cell.
        let machine = Brainfuck::new(Channels::from_parts(
            std::io::empty(),
            std::io::sink(),
        ));
        let delta = machine.decode(pack_instruction(Op::MoveLeft, 1));
        assert!(delta.actions().iter().any(|action| matches!(
            action,
            crate::delta::MicroAction::WriteRegister {
                index: DATA_POINTER,
                new,
                ..
            } if *new == (MEMORY_SIZE - 1) as u32
        )));
    }
}
