use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::{event, Level};
use tracing_subscriber::prelude::*;

use base::image;
use base::prelude::*;
use cpu::{CycleStatus, JumpzPolarity, MachineConfig, System};

mod echo;

use echo::ConsoleEcho;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum VariantArg {
    Base,
    Extended,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum JumpzArg {
    Zero,
    Nonzero,
}

#[derive(Debug, Parser)]
#[command(about = "Simulate the bit-serial machine", version)]
struct Args {
    /// Program image, loaded into RAM from address zero.
    image: PathBuf,

    /// Treat the image as a hex text dump instead of little-endian
    /// binary.
    #[arg(long)]
    hex: bool,

    /// Machine word width in bits.
    #[arg(long, default_value_t = 16)]
    width: u8,

    /// Instruction set variant.
    #[arg(long, value_enum, default_value_t = VariantArg::Base)]
    variant: VariantArg,

    /// Which accumulator state makes JUMPZ take its jump.
    #[arg(long = "jumpz-taken-when", value_enum, default_value_t = JumpzArg::Zero)]
    jumpz: JumpzArg,

    /// Give up if the program has not halted after this many clock
    /// cycles.
    #[arg(long, default_value_t = 1_000_000_000)]
    max_cycles: u64,

    /// Queue these bytes on the console input port before starting.
    #[arg(long = "type", value_name = "TEXT")]
    type_text: Option<String>,

    /// On a fault, also print the latched fault as JSON.
    #[arg(long)]
    dump_on_fault: bool,
}

/// Step the machine to completion, relaying console output as it
/// appears.
fn run(system: &mut System, echo: &mut ConsoleEcho, max_cycles: u64) -> CycleStatus {
    let mut status = CycleStatus::Running;
    for _ in 0..max_cycles {
        status = system.step();
        let bytes = system.console().take_output();
        if !bytes.is_empty() {
            echo.write_bytes(&bytes);
        }
        if status != CycleStatus::Running {
            break;
        }
    }
    status
}

fn run_simulator() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();

    // See the tracing_subscriber::fmt documentation for how to select
    // which trace messages get printed (RUST_LOG et al).
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))?;
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    let width = WordWidth::new(args.width)?;
    let variant = match args.variant {
        VariantArg::Base => IsaVariant::Base,
        VariantArg::Extended => IsaVariant::Extended,
    };
    let jumpz = match args.jumpz {
        JumpzArg::Zero => JumpzPolarity::TakenWhenZero,
        JumpzArg::Nonzero => JumpzPolarity::TakenWhenNonzero,
    };
    let config = MachineConfig::new(width, variant, jumpz)?;

    let file = File::open(&args.image)
        .map_err(|e| format!("{}: {}", args.image.display(), e))?;
    let words = if args.hex {
        image::read_text(BufReader::new(file), width)?
    } else {
        image::read_binary(BufReader::new(file), width)?
    };
    event!(
        Level::INFO,
        "loaded {} words from {}",
        words.len(),
        args.image.display()
    );

    let mut system = System::new(config, &words)?;
    if let Some(text) = &args.type_text {
        system.console().queue_input(text.as_bytes());
    }
    // Piped stdin feeds the console input port too.
    if !atty::is(atty::Stream::Stdin) {
        let mut pending = Vec::new();
        io::stdin().read_to_end(&mut pending)?;
        if !pending.is_empty() {
            system.console().queue_input(&pending);
        }
    }

    let mut echo = ConsoleEcho::new();
    let status = run(&mut system, &mut echo, args.max_cycles);
    echo.disconnect();

    match status {
        CycleStatus::Halted => {
            event!(
                Level::INFO,
                "halted after {} cycles",
                system.cpu().total_cycles()
            );
            Ok(ExitCode::SUCCESS)
        }
        CycleStatus::Faulted => {
            if let Some(fault) = system.fault() {
                event!(Level::ERROR, "execution stopped: {}", fault);
                if args.dump_on_fault {
                    println!("{}", serde_json::to_string_pretty(fault)?);
                }
            }
            Ok(ExitCode::from(1))
        }
        CycleStatus::Running => {
            event!(
                Level::WARN,
                "gave up after {} cycles without reaching HALT",
                args.max_cycles
            );
            Ok(ExitCode::from(1))
        }
    }
}

fn main() -> ExitCode {
    match run_simulator() {
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::from(2)
        }
        Ok(code) => code,
    }
}
