//! Mano machine.
//!
//! 4096 sixteen-bit words. An instruction word is one indirect bit, three
//! opcode bits and a twelve-bit address, except that opcode 7 selects a fixed
//! table of zero-address register-reference and I/O micro-instructions
//! matched against the whole word.

use crate::channel::Channels;
use crate::delta::{Delta, DeltaBuilder, Location};
use crate::machine::Machine;

pub const MEMORY_SIZE: usize = 4096;
pub const REGISTER_COUNT: usize = 3;
pub const PROGRAM_COUNTER: usize = 0;
pub const ACCUMULATOR: usize = 1;
pub const FLAGS: usize = 2;

pub const CARRY_FLAG: u32 = 0x01;
pub const INTERRUPT_ENABLE_FLAG: u32 = 0x02;

// Register-reference and I/O micro-instructions.
pub const CLA: u16 = 0b0111_0011_0010_0000;
pub const CLE: u16 = 0b0111_0001_1001_0000;
pub const CMA: u16 = 0b0111_0000_1100_1000;
pub const CME: u16 = 0b0111_0000_0110_0100;
pub const CIR: u16 = 0b0111_0000_0101_0000;
pub const CIL: u16 = 0b0111_0000_0010_1000;
pub const INC: u16 = 0b0111_0000_0001_0100;
pub const SPA: u16 = 0b0111_0000_0000_1010;
pub const SNA: u16 = 0b0111_0000_0000_1000;
pub const SZA: u16 = 0b0111_0000_0000_0100;
pub const SZE: u16 = 0b0111_0000_0000_0010;
pub const HLT: u16 = 0b0111_0000_0000_0001;
pub const INP: u16 = 0b1111_0011_0010_0000;
pub const OUT: u16 = 0b1111_0001_1001_0000;

// Memory-referencing opcodes, already shifted into place.
pub const AND: u16 = 0 << 12;
pub const ADD: u16 = 1 << 12;
pub const LDA: u16 = 2 << 12;
pub const STA: u16 = 3 << 12;
pub const BUN: u16 = 4 << 12;
pub const BSA: u16 = 5 << 12;
pub const ISZ: u16 = 6 << 12;
pub const INDIRECT: u16 = 1 << 15;

const OPCODE_MASK: u16 = 0b111 << 12;
const ADDRESS_MASK: u16 = 0x0FFF;
const WORD_MASK: u32 = 0xFFFF;

pub struct Mano {
    memory: Vec<u16>,
    registers: [u16; REGISTER_COUNT],
    halted: bool,
    channels: Channels,
}

impl Mano {
    pub fn new(channels: Channels) -> Self {
        Self {
            memory: vec![0; MEMORY_SIZE],
            registers: [0; REGISTER_COUNT],
            halted: false,
            channels,
        }
    }

    /// Copies `program` into memory from address 0, zero-filling the rest.
    pub fn load_program(&mut self, program: &[u16]) {
        for (address, cell) in self.memory.iter_mut().enumerate() {
            *cell = program.get(address).copied().unwrap_or(0);
        }
    }

    pub fn has_carry(&self) -> bool {
        u32::from(self.registers[FLAGS]) & CARRY_FLAG != 0
    }
}

impl Default for Mano {
    fn default() -> Self {
        Self::new(Channels::stdio())
    }
}

impl Machine for Mano {
    fn name(&self) -> &'static str {
        "Mano Machine"
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
        u32::from(self.memory[self.registers[PROGRAM_COUNTER] as usize % MEMORY_SIZE])
    }

    fn decode(&self, instruction: u32) -> Delta {
        if self.halted {
            return Delta::empty();
        }

        let instruction = instruction as u16;
        let accumulator = u32::from(self.registers[ACCUMULATOR]);
        let flags = u32::from(self.registers[FLAGS]);
        let pc = u32::from(self.registers[PROGRAM_COUNTER]);
        let carry = flags & CARRY_FLAG;

        let mut new_pc = pc + 1;
        let mut new_accumulator = accumulator;
        let mut new_flags = flags;

        let mut builder = DeltaBuilder::new();
        if instruction & OPCODE_MASK == OPCODE_MASK {
            match instruction {
                CLA => new_accumulator = 0,
                CLE => new_flags &= !CARRY_FLAG,
                CMA => new_accumulator = !accumulator & WORD_MASK,
                CME => new_flags ^= CARRY_FLAG,
                CIR => {
                    new_accumulator = (accumulator >> 1) | (carry << 15);
                    new_flags = (flags & !CARRY_FLAG) | (accumulator & 1);
                }
                CIL => {
                    new_accumulator = ((accumulator << 1) | carry) & WORD_MASK;
                    new_flags = (flags & !CARRY_FLAG) | (accumulator >> 15);
                }
                INC => new_accumulator = (accumulator + 1) & WORD_MASK,
                SPA => {
                    if accumulator & 0x8000 == 0 {
                        new_pc += 1;
                    }
                }
                SNA => {
                    if accumulator & 0x8000 != 0 {
                        new_pc += 1;
                    }
                }
                SZA => {
                    if accumulator == 0 {
                        new_pc += 1;
                    }
                }
                SZE => {
                    if carry == 0 {
                        new_pc += 1;
                    }
                }
                HLT => {
                    builder.halt();
                }
                INP => {
                    builder.input(Location::Register(ACCUMULATOR));
                }
                OUT => {
                    builder.output(accumulator);
                }
                _ => {}
            }
        } else {
            let mut address = usize::from(instruction & ADDRESS_MASK);
            if instruction & INDIRECT != 0 {
                address = usize::from(self.memory[address]) % MEMORY_SIZE;
            }
            let operand = u32::from(self.memory[address]);
            match instruction & OPCODE_MASK {
                AND => new_accumulator = accumulator & operand,
                ADD => {
                    let sum = accumulator + operand;
                    if sum > WORD_MASK {
                        new_flags |= CARRY_FLAG;
                    }
                    new_accumulator = sum & WORD_MASK;
                }
                LDA => new_accumulator = operand,
                STA => {
                    builder.write_memory(address, operand, accumulator);
                }
                BUN => new_pc = address as u32,
                BSA => {
                    // The return address lands at the target, then execution
                    // transfers there.
                    builder.write_memory(address, operand, new_pc & WORD_MASK);
                    new_pc = address as u32;
                }
                ISZ => {
                    let incremented = (operand + 1) & WORD_MASK;
                    builder.write_memory(address, operand, incremented);
                    if incremented == 0 {
                        new_pc += 1;
                    }
                }
                _ => {}
            }
        }

        builder.write_register(PROGRAM_COUNTER, pc, new_pc % MEMORY_SIZE as u32);
        builder.write_register(ACCUMULATOR, accumulator, new_accumulator & WORD_MASK);
        builder.write_register(FLAGS, flags, new_flags);
        builder.build()
    }
}
