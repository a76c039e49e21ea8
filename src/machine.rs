//! The capability contract every simulated machine implements.

use crate::channel::Channels;
use crate::delta::{Delta, Location};

/// A primitive von Neumann machine: a register file, a memory array, an I/O
/// channel pair and a halted flag.
///
/// Each implementation owns its own representation sized for its domain
/// (byte cells for Brainfuck, three-digit words for the LMC, ten-trit words
/// for Malbolge, 16-bit words for the Mano machine); the trait only fixes the
/// capability set. `decode` is a pure function of the current state: it
/// performs no side effects itself, every effect lives inside the returned
/// [`Delta`] and only happens on `apply`.
pub trait Machine {
    /// Human-readable machine name.
    fn name(&self) -> &'static str;

    fn read_register(&self, index: usize) -> u32;

    fn write_register(&mut self, index: usize, value: u32);

    fn read_memory(&self, address: usize) -> u32;

    fn write_memory(&mut self, address: usize, value: u32);

    /// The machine's I/O channel pair.
    fn channels(&mut self) -> &mut Channels;

    fn is_halted(&self) -> bool;

    fn halt(&mut self);

    fn unhalt(&mut self);

    /// Clears registers, memory and the halted flag back to the variant's
    /// zero state.
    fn reset(&mut self);

    /// The raw instruction word at the program counter.
    fn current_instruction(&self) -> u32;

    /// Decodes one raw instruction word against the current state.
    ///
    /// Must return the empty delta when the machine is already halted.
    fn decode(&self, instruction: u32) -> Delta;

    fn read_location(&self, location: Location) -> u32 {
        match location {
            Location::Register(index) => self.read_register(index),
            Location::Memory(address) => self.read_memory(address),
        }
    }

    fn write_location(&mut self, location: Location, value: u32) {
        match location {
            Location::Register(index) => self.write_register(index, value),
            Location::Memory(address) => self.write_memory(address, value),
        }
    }

    /// Writes one byte to the output channel. A failed write halts the
    /// machine.
    fn output(&mut self, value: u32) {
        if self.channels().write_byte(value as u8).is_err() {
            self.halt();
        }
    }

    /// Reads one byte from the input channel into `location`, halting on
    /// stream exhaustion.
    fn input(&mut self, location: Location) {
        match self.channels().read_byte() {
            Some(byte) => self.write_location(location, u32::from(byte)),
            None => self.halt(),
        }
    }
}
