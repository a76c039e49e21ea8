use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use machines_core::{
    brainfuck, lmc, malbolge, mano, run_until_halt, Brainfuck, Channels, Lmc, Machine, Malbolge,
    Mano, MathMode, RunOutcome,
};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum MachineKind {
    Brainfuck,
    Lmc,
    Malbolge,
    Mano,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum MathModeArg {
    Overflow,
    Saturation,
}

impl From<MathModeArg> for MathMode {
    fn from(arg: MathModeArg) -> Self {
        match arg {
            MathModeArg::Overflow => MathMode::Overflow,
            MathModeArg::Saturation => MathMode::Saturation,
        }
    }
}

/// Run a program on one of the simulated machines.
///
/// Brainfuck and Malbolge programs are source text; LMC and Mano programs are
/// whitespace-separated decimal memory words. Machine output goes to stdout.
#[derive(Parser, Debug)]
#[command(name = "machines-run", version)]
struct Args {
    /// Which machine to run the program on.
    #[arg(value_enum)]
    machine: MachineKind,

    /// Path to the program file.
    program: PathBuf,

    /// Cycle budget; 0 runs until the machine halts.
    #[arg(long, default_value_t = 0)]
    budget: u64,

    /// Arithmetic mode for the LMC.
    #[arg(long, value_enum, default_value = "overflow")]
    math_mode: MathModeArg,

    /// Dump a JSON state summary to stderr after the run.
    #[arg(long)]
    dump_state: bool,
}

#[derive(Serialize)]
struct StateSummary<'a> {
    machine: &'a str,
    outcome: RunOutcome,
    halted: bool,
    registers: Vec<u32>,
}

fn parse_words(source: &str) -> Result<Vec<u16>> {
    source
        .split_whitespace()
        .map(|token| {
            token
                .parse::<u16>()
                .with_context(|| format!("invalid memory word {token:?}"))
        })
        .collect()
}

fn finish(
    machine: &mut dyn Machine,
    register_count: usize,
    outcome: RunOutcome,
    args: &Args,
) -> Result<ExitCode> {
    machine.channels().flush();
    if args.dump_state {
        let summary = StateSummary {
            machine: machine.name(),
            outcome,
            halted: machine.is_halted(),
            registers: (0..register_count)
                .map(|index| machine.read_register(index))
                .collect(),
        };
        eprintln!("{}", serde_json::to_string(&summary)?);
    }
    if outcome.completed() {
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("machine did not halt within {} cycles", args.budget);
        Ok(ExitCode::from(1))
    }
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let source = fs::read_to_string(&args.program)
        .with_context(|| format!("reading {}", args.program.display()))?;
    let channels = Channels::stdio();

    match args.machine {
        MachineKind::Brainfuck => {
            let mut machine = Brainfuck::new(channels);
            machine.load_program(&source)?;
            let outcome = run_until_halt(&mut machine, args.budget);
            finish(&mut machine, brainfuck::REGISTER_COUNT, outcome, &args)
        }
        MachineKind::Lmc => {
            let mut machine = Lmc::new(channels);
            machine.set_math_mode(args.math_mode.into());
            machine.load_program(&parse_words(&source)?);
            let outcome = run_until_halt(&mut machine, args.budget);
            finish(&mut machine, lmc::REGISTER_COUNT, outcome, &args)
        }
        MachineKind::Malbolge => {
            let mut machine = Malbolge::new(channels);
            machine.load_program(&source);
            let outcome = run_until_halt(&mut machine, args.budget);
            finish(&mut machine, malbolge::REGISTER_COUNT, outcome, &args)
        }
        MachineKind::Mano => {
            let mut machine = Mano::new(channels);
            machine.load_program(&parse_words(&source)?);
            let outcome = run_until_halt(&mut machine, args.budget);
            finish(&mut machine, mano::REGISTER_COUNT, outcome, &args)
        }
    }
}
