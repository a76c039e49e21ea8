//! Reversible state transactions.
//!
//! Decoding one instruction yields a [`Delta`]: the ordered list of register
//! writes, memory writes, I/O transfers and halt transitions that instruction
//! causes. A delta applies its actions in recorded order and unapplies them
//! in reverse order, so interdependent writes within one instruction undo
//! cleanly. Writes capture their old value at build time, which means a delta
//! never has to consult the machine to reverse itself.

use serde::{Deserialize, Serialize};

use crate::machine::Machine;

/// A tagged reference to a register slot or a memory cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    Register(usize),
    Memory(usize),
}

/// One reversible step inside a [`Delta`].
///
/// `Output` and `Input` reverse to nothing: bytes cannot be un-printed, and
/// re-applying an `Input` reads the *next* byte of the stream rather than the
/// one consumed the first time around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MicroAction {
    WriteRegister { index: usize, old: u32, new: u32 },
    WriteMemory { address: usize, old: u32, new: u32 },
    Output { value: u32 },
    Input { location: Location },
    Halt,
}

impl MicroAction {
    fn apply(&self, machine: &mut dyn Machine) {
        match *self {
            MicroAction::WriteRegister { index, new, .. } => machine.write_register(index, new),
            MicroAction::WriteMemory { address, new, .. } => machine.write_memory(address, new),
            MicroAction::Output { value } => machine.output(value),
            MicroAction::Input { location } => machine.input(location),
            MicroAction::Halt => machine.halt(),
        }
    }

    fn unapply(&self, machine: &mut dyn Machine) {
        match *self {
            MicroAction::WriteRegister { index, old, .. } => machine.write_register(index, old),
            MicroAction::WriteMemory { address, old, .. } => machine.write_memory(address, old),
            MicroAction::Output { .. } | MicroAction::Input { .. } => {}
            MicroAction::Halt => machine.unhalt(),
        }
    }
}

/// An immutable transaction produced by [`Machine::decode`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    actions: Vec<MicroAction>,
}

impl Delta {
    /// The transaction that changes nothing. Decoding on a halted machine
    /// returns this.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn actions(&self) -> &[MicroAction] {
        &self.actions
    }

    /// Executes every action's forward effect in recorded order.
    pub fn apply(&self, machine: &mut dyn Machine) {
        for action in &self.actions {
            action.apply(machine);
        }
    }

    /// Executes every action's reverse effect in reverse (LIFO) order.
    pub fn unapply(&self, machine: &mut dyn Machine) {
        for action in self.actions.iter().rev() {
            action.unapply(machine);
        }
    }
}

/// Append-only accumulator for the actions of one instruction.
///
/// Register and memory writes where the old and new value coincide are
/// dropped, so the built delta reverses exactly the effectual changes.
#[derive(Debug, Default)]
pub struct DeltaBuilder {
    actions: Vec<MicroAction>,
}

impl DeltaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_register(&mut self, index: usize, old: u32, new: u32) -> &mut Self {
        if old != new {
            self.actions.push(MicroAction::WriteRegister { index, old, new });
        }
        self
    }

    pub fn write_memory(&mut self, address: usize, old: u32, new: u32) -> &mut Self {
        if old != new {
            self.actions.push(MicroAction::WriteMemory { address, old, new });
        }
        self
    }

    pub fn write_location(&mut self, location: Location, old: u32, new: u32) -> &mut Self {
        match location {
            Location::Register(index) => self.write_register(index, old, new),
            Location::Memory(address) => self.write_memory(address, old, new),
        }
    }

    pub fn output(&mut self, value: u32) -> &mut Self {
        self.actions.push(MicroAction::Output { value });
        self
    }

    pub fn input(&mut self, location: Location) -> &mut Self {
        self.actions.push(MicroAction::Input { location });
        self
    }

    pub fn halt(&mut self) -> &mut Self {
        self.actions.push(MicroAction::Halt);
        self
    }

    pub fn build(self) -> Delta {
        Delta {
            actions: self.actions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channels;

    struct TestMachine {
        registers: [u32; 2],
        memory: [u32; 8],
        halted: bool,
        channels: Channels,
    }

    impl TestMachine {
        fn new() -> Self {
            Self {
                registers: [0; 2],
                memory: [0; 8],
                halted: false,
                channels: Channels::from_parts(std::io::empty(), std::io::sink()),
            }
        }
    }

    impl Machine for TestMachine {
        fn name(&self) -> &'static str {
            "Test Machine"
        }

        fn read_register(&self, index: usize) -> u32 {
            self.registers[index]
        }

        fn write_register(&mut self, index: usize, value: u32) {
            self.registers[index] = value;
        }

        fn read_memory(&self, address: usize) -> u32 {
            self.memory[address]
        }

        fn write_memory(&mut self, address: usize, value: u32) {
            self.memory[address] = value;
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
            *self = Self::new();
        }

        fn current_instruction(&self) -> u32 {
            0
        }

        fn decode(&self, _instruction: u32) -> Delta {
            Delta::empty()
        }
    }

    #[test]
    fn noop_writes_are_omitted() {
        let mut builder = DeltaBuilder::new();
        builder.write_register(0, 7, 7);
        builder.write_memory(3, 1, 1);
        assert!(builder.build().is_empty());
    }

    #[test]
    fn apply_then_unapply_restores_state() {
        let mut machine = TestMachine::new();
        machine.memory[2] = 10;

        let mut builder = DeltaBuilder::new();
        builder.write_memory(2, 10, 20);
        builder.write_register(1, 0, 5);
        builder.halt();
        let delta = builder.build();

        delta.apply(&mut machine);
        assert_eq!(machine.memory[2], 20);
        assert_eq!(machine.registers[1], 5);
        assert!(machine.halted);

        delta.unapply(&mut machine);
        assert_eq!(machine.memory[2], 10);
        assert_eq!(machine.registers[1], 0);
        assert!(!machine.halted);
    }

    #[test]
    fn unapply_reverses_in_lifo_order() {
        // Two writes to the same cell: undoing must land on the first old
        // value, not the intermediate one.
        let mut machine = TestMachine::new();
        machine.memory[0] = 1;

        let mut builder = DeltaBuilder::new();
        builder.write_memory(0, 1, 2);
        builder.write_memory(0, 2, 3);
        let delta = builder.build();

        delta.apply(&mut machine);
        assert_eq!(machine.memory[0], 3);
        delta.unapply(&mut machine);
        assert_eq!(machine.memory[0], 1);
    }

    #[test]
    fn delta_can_be_replayed() {
        let mut machine = TestMachine::new();
        let mut builder = DeltaBuilder::new();
        builder.write_register(0, 0, 9);
        let delta = builder.build();

        delta.apply(&mut machine);
        delta.unapply(&mut machine);
        delta.apply(&mut machine);
        assert_eq!(machine.registers[0], 9);
    }
}
