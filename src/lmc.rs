//! Little Man Computer.
//!
//! One hundred memory cells holding values 0-999, an accumulator, and a flag
//! register carrying the negative and halt bits. An instruction word is
//! `opcode * 100 + argument`. Arithmetic runs in one of two selectable modes:
//! overflow wraps into 0-999 and raises the negative flag, saturation clamps
//! at the bounds and leaves the flag alone.

use serde::{Deserialize, Serialize};

use crate::channel::Channels;
use crate::delta::{Delta, DeltaBuilder, Location};
use crate::machine::Machine;

pub const MEMORY_SIZE: usize = 100;
pub const REGISTER_COUNT: usize = 3;
pub const PROGRAM_COUNTER: usize = 0;
pub const ACCUMULATOR: usize = 1;
pub const FLAGS: usize = 2;

pub const MAX_VALUE: u32 = 999;
pub const MIN_VALUE: u32 = 0;

pub const HLT: u16 = 0;
pub const ADD: u16 = 1;
pub const SUB: u16 = 2;
pub const STA: u16 = 3;
pub const LDA: u16 = 5;
pub const BRA: u16 = 6;
pub const BRZ: u16 = 7;
pub const BRP: u16 = 8;
pub const IO: u16 = 9;

pub const IO_ARG_IN: u16 = 1;
pub const IO_ARG_OUT: u16 = 2;

pub const NEGATIVE_FLAG: u32 = 0x01;
pub const HALT_FLAG: u32 = 0x02;

/// Arithmetic overflow policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MathMode {
    #[default]
    Overflow,
    Saturation,
}

pub const fn pack_instruction(opcode: u16, argument: u16) -> u16 {
    opcode * 100 + argument
}

pub struct Lmc {
    memory: Vec<u16>,
    registers: [u16; REGISTER_COUNT],
    math_mode: MathMode,
    channels: Channels,
}

impl Lmc {
    pub fn new(channels: Channels) -> Self {
        Self {
            memory: vec![0; MEMORY_SIZE],
            registers: [0; REGISTER_COUNT],
            math_mode: MathMode::Overflow,
            channels,
        }
    }

    pub fn math_mode(&self) -> MathMode {
        self.math_mode
    }

    pub fn set_math_mode(&mut self, math_mode: MathMode) {
        self.math_mode = math_mode;
    }

    /// Copies `program` into memory from address 0, zero-filling the rest.
    pub fn load_program(&mut self, program: &[u16]) {
        for (address, cell) in self.memory.iter_mut().enumerate() {
            *cell = program.get(address).copied().unwrap_or(0);
        }
    }
}

impl Default for Lmc {
    fn default() -> Self {
        Self::new(Channels::stdio())
    }
}

impl Machine for Lmc {
    fn name(&self) -> &'static str {
        "Little Man Computer"
    }

    fn read_register(&self, index: usize) -> u32 {
        u32::from(self.registers[index])
    }

    fn write_register(&mut self, index: usize, value: u32) {
        self.registers[index] = value as u16;
    }

    fn read_memory(&self, address: usize) -> u32 {
        u32::from(self.memory[address % MEMORY_SIZE])
    }

    fn write_memory(&mut self, address: usize, value: u32) {
        self.memory[address % MEMORY_SIZE] = value as u16;
    }

    fn channels(&mut self) -> &mut Channels {
        &mut self.channels
    }

    fn is_halted(&self) -> bool {
        u32::from(self.registers[FLAGS]) & HALT_FLAG != 0
    }

    fn halt(&mut self) {
        self.registers[FLAGS] |= HALT_FLAG as u16;
    }

    fn unhalt(&mut self) {
        self.registers[FLAGS] &= !(HALT_FLAG as u16);
    }

    fn reset(&mut self) {
        self.memory = vec![0; MEMORY_SIZE];
        self.registers = [0; REGISTER_COUNT];
    }

    fn current_instruction(&self) -> u32 {
        u32::from(self.memory[self.registers[PROGRAM_COUNTER] as usize % MEMORY_SIZE])
    }

    fn decode(&self, instruction: u32) -> Delta {
        if self.is_halted() {
            return Delta::empty();
        }

        let opcode = (instruction / 100) as u16;
        let argument = (instruction % 100) as usize;
        let accumulator = u32::from(self.registers[ACCUMULATOR]);
        let pc = u32::from(self.registers[PROGRAM_COUNTER]);
        let flags = u32::from(self.registers[FLAGS]);
        let operand = u32::from(self.memory[argument]);

        let mut new_pc = pc + 1;
        let mut do_halt = false;
        if new_pc >= MEMORY_SIZE as u32 {
            // The counter pins at the last valid address and the machine
            // stops.
            do_halt = true;
            new_pc = (MEMORY_SIZE - 1) as u32;
        }
        let mut new_accumulator = accumulator;
        // The flag register is rebuilt from scratch every instruction.
        let mut new_flags = 0;

        let mut builder = DeltaBuilder::new();
        match opcode {
            HLT => do_halt = true,
            ADD => {
                if accumulator + operand <= MAX_VALUE {
                    new_accumulator = accumulator + operand;
                } else if self.math_mode == MathMode::Overflow {
                    new_accumulator = (accumulator + operand) % (MAX_VALUE + 1);
                    new_flags |= NEGATIVE_FLAG;
                } else {
                    new_accumulator = MAX_VALUE;
                }
            }
            SUB => {
                if accumulator >= operand {
                    new_accumulator = accumulator - operand;
                } else if self.math_mode == MathMode::Overflow {
                    new_accumulator = (accumulator as i64 - operand as i64)
                        .rem_euclid(i64::from(MAX_VALUE) + 1)
                        as u32;
                    new_flags |= NEGATIVE_FLAG;
                } else {
                    new_accumulator = MIN_VALUE;
                }
            }
            STA => {
                builder.write_memory(argument, operand, accumulator);
            }
            LDA => {
                builder.write_register(ACCUMULATOR, accumulator, operand);
            }
            BRA => new_pc = argument as u32,
            BRZ => {
                if accumulator == 0 {
                    new_pc = argument as u32;
                }
            }
            BRP => {
                // Only meaningful in overflow mode, where it tests the
                // negative flag left by the previous instruction.
                if self.math_mode == MathMode::Overflow && flags & NEGATIVE_FLAG != 0 {
                    new_pc = argument as u32;
                }
            }
            IO => {
                if argument == IO_ARG_IN as usize {
                    builder.input(Location::Register(ACCUMULATOR));
                } else {
                    builder.output(accumulator);
                }
            }
            _ => {}
        }

        builder.write_register(PROGRAM_COUNTER, pc, new_pc);
        builder.write_register(ACCUMULATOR, accumulator, new_accumulator);
        builder.write_register(FLAGS, flags, new_flags);
        if do_halt {
            builder.halt();
        }
        builder.build()
    }
}
