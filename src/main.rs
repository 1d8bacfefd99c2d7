use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use log::{debug, info, LevelFilter};
use simple_logger::SimpleLogger;

use rv32i_sim::hex;
use rv32i_sim::processor::{decode, StdProcessor};
use rv32i_sim::program::{Format, Program};

#[derive(Parser, Debug)]
#[command(name = "rv32i-sim", version, about = "RV32I instruction set simulator")]
struct Cli {
    /// More output per occurrence (debug, trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute a program and print the register file after every instruction
    Run {
        /// Disassembly dump or hex pair file
        file: PathBuf,

        /// Input format (`dump` or `hex`), picked from the file extension by default
        #[arg(short, long)]
        format: Option<Format>,

        /// Fail instead of running more than this many instructions
        #[arg(long)]
        max_steps: Option<usize>,
    },
    /// Convert every `*.dump` file below a directory into a `*.hex` file
    Hex {
        /// Directory to search
        directory: PathBuf,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling

    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    SimpleLogger::new()
        .with_level(level)
        .init()
        .map_err(|err| eyre!("Failed to initialize logging: {}", err))?; // logging

    match cli.command {
        Commands::Run {
            file,
            format,
            max_steps,
        } => {
            let program = match format {
                Some(format) => Program::from_file_with_format(&file, format)?,
                None => Program::from_file(&file)?,
            };
            info!(
                "Loaded {} instruction(s), entry point 0x{:08x}",
                program.len(),
                program.entry()
            );
            for (address, word) in program.iter() {
                debug!("0x{:08x}: {:08x}  {}", address, word, decode(word));
            }

            let mut cpu = StdProcessor::new(program.entry());
            cpu.execute_until_halt(&program, max_steps)?;
        }
        Commands::Hex { directory } => {
            let converted = hex::convert_all(&directory)?;
            info!("Converted {} file(s)", converted.len());
        }
    }

    Ok(())
}
