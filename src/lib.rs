//! Reversible simulators for small von Neumann machines.
//!
//! Four instruction sets (Brainfuck, the Little Man Computer, Malbolge and
//! the Mano machine) sit behind one execution contract: a machine decodes its
//! current instruction into a [`Delta`], an ordered transaction of reversible
//! micro-actions. Applying the delta steps the machine forward; unapplying it
//! replays the undo log and steps the machine back. The only one-directional
//! effects are I/O, which cannot be taken back once a byte has crossed a
//! channel.

pub mod brainfuck;
pub mod channel;
pub mod delta;
pub mod image;
pub mod lmc;
pub mod machine;
pub mod malbolge;
pub mod mano;
pub mod runner;

pub use brainfuck::Brainfuck;
pub use channel::{Channels, SharedSink};
pub use delta::{Delta, DeltaBuilder, Location, MicroAction};
pub use image::WordImage;
pub use lmc::{Lmc, MathMode};
pub use machine::Machine;
pub use malbolge::Malbolge;
pub use mano::Mano;
pub use runner::{run_until_halt, step, RunOutcome, NEVER_GIVE_UP};
