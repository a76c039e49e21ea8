//! Malbolge virtual machine.
//!
//! Words are ten-trit ternary values in 0..=59,048. The executed instruction
//! is decoded self-referentially: the effective opcode is
//! `(pc + memory[pc]) mod 94`. After every cycle the executed cell is
//! rewritten through a fixed 94-entry substitution table, no-ops included.
//! That self-modification is the machine's defining property and is never
//! skipped.

use crate::channel::Channels;
use crate::delta::{Delta, DeltaBuilder, Location};
use crate::machine::Machine;

/// 3^10 addressable words.
pub const MEMORY_SIZE: usize = 59_049;
pub const TRIT_COUNT: usize = 10;
pub const REGISTER_COUNT: usize = 3;
pub const PROGRAM_COUNTER: usize = 0;
pub const ACCUMULATOR: usize = 1;
pub const DATA_POINTER: usize = 2;

pub const OP_JUMP: u32 = 4;
pub const OP_OUTPUT: u32 = 5;
pub const OP_INPUT: u32 = 23;
pub const OP_ROTATE: u32 = 39;
pub const OP_MOVE_DATA: u32 = 40;
pub const OP_CRAZY: u32 = 62;
pub const OP_NOP: u32 = 68;
pub const OP_HALT: u32 = 81;

const POW9: u32 = 19_683;

const ENCRYPTION_TABLE: &[u8; 94] =
    b"9m<.TVac`uY*MK'X~xDl}REokN:#?G\"i@5z]&gqtyfr$(we4{WP)H-Zn,[%\\3dL+Q;>U!pJS72FhOA1CB6v^=I_0/8|jsb";

/// The substitution applied to every executed cell.
pub fn encrypt(value: u32) -> u32 {
    u32::from(ENCRYPTION_TABLE[(value % 94) as usize])
}

/// The ten trits of `value`, least significant first.
pub fn to_ternary(value: u32) -> [u8; TRIT_COUNT] {
    let mut trits = [0u8; TRIT_COUNT];
    let mut rest = value;
    for trit in trits.iter_mut() {
        *trit = (rest % 3) as u8;
        rest /= 3;
    }
    trits
}

/// Rotates the ten-trit representation one position to the right.
pub fn ternary_rotate(value: u32) -> u32 {
    POW9 * (value % 3) + value / 3
}

/// Malbolge's "crazy" operation: a fixed 3x3 table applied trit by trit.
pub fn crazy(a: u32, b: u32) -> u32 {
    const TABLE: [[u32; 3]; 3] = [[1, 0, 0], [1, 0, 2], [2, 2, 1]];
    let a_trits = to_ternary(a);
    let b_trits = to_ternary(b);
    let mut result = 0;
    let mut weight = 1;
    for i in 0..TRIT_COUNT {
        result += TABLE[a_trits[i] as usize][b_trits[i] as usize] * weight;
        weight *= 3;
    }
    result
}

pub struct Malbolge {
    memory: Vec<u32>,
    registers: [u32; REGISTER_COUNT],
    halted: bool,
    channels: Channels,
}

impl Malbolge {
    pub fn new(channels: Channels) -> Self {
        Self {
            memory: vec![0; MEMORY_SIZE],
            registers: [0; REGISTER_COUNT],
            halted: false,
            channels,
        }
    }

    /// Resets the machine and loads `source`, skipping whitespace, then seeds
    /// the rest of memory with the crazy fold of each cell's two
    /// predecessors.
    pub fn load_program(&mut self, source: &str) {
        self.reset();
        let mut index = 0;
        for ch in source.chars() {
            if ch.is_ascii_whitespace() {
                continue;
            }
            if index >= MEMORY_SIZE {
                break;
            }
            self.memory[index] = (ch as u32) % MEMORY_SIZE as u32;
            index += 1;
        }
        for i in index..MEMORY_SIZE {
            let a = if i >= 2 { self.memory[i - 2] } else { 0 };
            let b = if i >= 1 { self.memory[i - 1] } else { 0 };
            self.memory[i] = crazy(a, b);
        }
    }
}

impl Default for Malbolge {
    fn default() -> Self {
        Self::new(Channels::stdio())
    }
}

impl Machine for Malbolge {
    fn name(&self) -> &'static str {
        "Malbolge Virtual Machine"
    }

    fn read_register(&self, index: usize) -> u32 {
        self.registers[index]
    }

    fn write_register(&mut self, index: usize, value: u32) {
        self.registers[index] = value;
    }

    fn read_memory(&self, address: usize) -> u32 {
        self.memory[address % MEMORY_SIZE]
    }

    fn write_memory(&mut self, address: usize, value: u32) {
        self.memory[address % MEMORY_SIZE] = value;
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
    }

    fn current_instruction(&self) -> u32 {
        self.memory[self.registers[PROGRAM_COUNTER] as usize % MEMORY_SIZE]
    }

    /// Carriage returns arrive as line feeds; a spent input stream halts the
    /// machine, playing the role of the EOF sentinel.
    fn input(&mut self, location: Location) {
        match self.channels.read_byte() {
            Some(b'\r') => self.write_location(location, u32::from(b'\n')),
            Some(byte) => self.write_location(location, u32::from(byte)),
            None => self.halt(),
        }
    }

    fn decode(&self, instruction: u32) -> Delta {
        if self.halted {
            return Delta::empty();
        }

        let pc = self.registers[PROGRAM_COUNTER] as usize % MEMORY_SIZE;
        let data_ptr = self.registers[DATA_POINTER] as usize % MEMORY_SIZE;
        let accumulator = self.registers[ACCUMULATOR];
        let data = self.memory[data_ptr];
        let opcode = (instruction as usize + pc) % 94;

        let mut new_pc = (pc + 1) % MEMORY_SIZE;
        let mut new_data_ptr = (data_ptr + 1) % MEMORY_SIZE;
        let mut encrypt_target = pc;
        // The memory write made by the opcode itself, if any; the rewrite
        // below must observe it when the two addresses alias.
        let mut stored: Option<(usize, u32)> = None;

        let mut builder = DeltaBuilder::new();
        match opcode as u32 {
            OP_JUMP => {
                // The cell at the jump target is the one rewritten, and
                // execution resumes just past it.
                let target = data as usize % MEMORY_SIZE;
                encrypt_target = target;
                new_pc = (target + 1) % MEMORY_SIZE;
            }
            OP_OUTPUT => {
                builder.output(accumulator);
            }
            OP_INPUT => {
                builder.input(Location::Register(ACCUMULATOR));
            }
            OP_ROTATE => {
                let rotated = ternary_rotate(data);
                builder.write_memory(data_ptr, data, rotated);
                builder.write_register(ACCUMULATOR, accumulator, rotated);
                stored = Some((data_ptr, rotated));
            }
            OP_MOVE_DATA => {
                new_data_ptr = (data as usize + 1) % MEMORY_SIZE;
            }
            OP_CRAZY => {
                let result = crazy(data, accumulator);
                builder.write_memory(data_ptr, data, result);
                builder.write_register(ACCUMULATOR, accumulator, result);
                stored = Some((data_ptr, result));
            }
            OP_HALT => {
                builder.halt();
            }
            _ => {} // no-op, but the executed cell is still rewritten
        }

        builder.write_register(DATA_POINTER, data_ptr as u32, new_data_ptr as u32);
        builder.write_register(PROGRAM_COUNTER, pc as u32, new_pc as u32);

        let before = match stored {
            Some((address, value)) if address == encrypt_target => value,
            _ => self.memory[encrypt_target],
        };
        builder.write_memory(encrypt_target, before, encrypt(before));

        builder.build()
    }
}
