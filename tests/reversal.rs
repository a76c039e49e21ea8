//! The reversibility contract: unapplying the deltas of a run, newest first,
//! restores every register and memory cell. The exception is I/O, whose
//! actions reverse to nothing.

use machines_core::{lmc, mano, Channels, Delta, Lmc, Machine, Mano, SharedSink};
use proptest::prelude::*;
use std::io::{empty, sink, Cursor};

fn snapshot(machine: &dyn Machine, registers: usize, memory: usize) -> (Vec<u32>, Vec<u32>) {
    (
        (0..registers).map(|i| machine.read_register(i)).collect(),
        (0..memory).map(|a| machine.read_memory(a)).collect(),
    )
}

fn run_and_unwind(machine: &mut dyn Machine, steps: usize) -> Vec<Delta> {
    let mut deltas = Vec::new();
    for _ in 0..steps {
        if machine.is_halted() {
            break;
        }
        let delta = machine.decode(machine.current_instruction());
        delta.apply(machine);
        deltas.push(delta);
    }
    deltas
}

proptest! {
    // Words below 900 cover every LMC opcode except IO, so the run is free
    // of one-directional actions.
    #[test]
    fn lmc_runs_unwind_exactly(
        words in proptest::collection::vec(0u16..900, 1..100),
        steps in 1usize..60,
    ) {
        let mut machine = Lmc::new(Channels::from_parts(empty(), sink()));
        machine.load_program(&words);
        let before = snapshot(&machine, lmc::REGISTER_COUNT, lmc::MEMORY_SIZE);

        let deltas = run_and_unwind(&mut machine, steps);
        for delta in deltas.iter().rev() {
            delta.unapply(&mut machine);
        }

        prop_assert_eq!(
            snapshot(&machine, lmc::REGISTER_COUNT, lmc::MEMORY_SIZE),
            before
        );
    }

    #[test]
    fn mano_runs_unwind_exactly(
        words in proptest::collection::vec(
            any::<u16>().prop_filter("I/O words are one-directional", |word| {
                *word != mano::INP && *word != mano::OUT
            }),
            1..200,
        ),
        steps in 1usize..60,
    ) {
        let mut machine = Mano::new(Channels::from_parts(empty(), sink()));
        machine.load_program(&words);
        let before = snapshot(&machine, mano::REGISTER_COUNT, mano::MEMORY_SIZE);

        let deltas = run_and_unwind(&mut machine, steps);
        for delta in deltas.iter().rev() {
            delta.unapply(&mut machine);
        }

        prop_assert_eq!(
            snapshot(&machine, mano::REGISTER_COUNT, mano::MEMORY_SIZE),
            before
        );
    }
}

#[test]
fn undo_after_input_is_lossy() {
    let mut machine = Lmc::new(Channels::from_parts(Cursor::new(&b"AB"[..]), sink()));
    machine.load_program(&[lmc::pack_instruction(lmc::IO, lmc::IO_ARG_IN)]);

    let delta = machine.decode(machine.current_instruction());
    delta.apply(&mut machine);
    assert_eq!(machine.read_register(lmc::ACCUMULATOR), u32::from(b'A'));

    // Undo rewinds the program counter but cannot push the byte back into
    // the stream: the accumulator keeps what it read.
    delta.unapply(&mut machine);
    assert_eq!(machine.read_register(lmc::ACCUMULATOR), u32::from(b'A'));
    assert_eq!(machine.read_register(lmc::PROGRAM_COUNTER), 0);

    // Redo reads the *next* byte, not the same one.
    delta.apply(&mut machine);
    assert_eq!(machine.read_register(lmc::ACCUMULATOR), u32::from(b'B'));
}

#[test]
fn undo_does_not_unprint_output() {
    let output = SharedSink::new();
    let mut machine = Lmc::new(Channels::from_parts(empty(), output.clone()));
    machine.write_register(lmc::ACCUMULATOR, u32::from(b'Z'));
    machine.load_program(&[lmc::pack_instruction(lmc::IO, lmc::IO_ARG_OUT)]);

    let delta = machine.decode(machine.current_instruction());
    delta.apply(&mut machine);
    delta.unapply(&mut machine);

    assert_eq!(output.contents(), b"Z");
}
