//! Assembly Construction Compiler Driver
//!
//! Builds the bundled sample programs, prints their listings and runs them on
//! the reference machine.

use acc_backend::samples::{self, Sample, SAMPLES};
use acc_backend::Program;
use acc_codegen::Machine;
use acc_common::LoweringOptions;
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

type DriverResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Upper bound on executed instructions for `acc run`.
const STEP_LIMIT: usize = 1_000_000;

#[derive(Parser)]
#[command(name = "acc")]
#[command(about = "Assembly Construction Compiler")]
#[command(version = "0.1.0")]
struct Cli {
    /// Log lowering decisions (allocation, spills, optimizer passes)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the bundled sample programs
    List,

    /// Build a sample and print or save its listing
    Build {
        /// Sample name, see `acc list`
        sample: String,

        /// Output file for the listing
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Listing format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,

        /// Lowering options as JSON
        #[arg(long)]
        options: Option<PathBuf>,
    },

    /// Build a sample and execute it on the reference machine
    Run {
        /// Sample name, see `acc list`
        sample: String,

        /// Lowering options as JSON
        #[arg(long)]
        options: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

/// `warn` unless the environment says otherwise; `--verbose` forces `debug`.
fn logger(verbose: bool, env: env_logger::Env<'_>) -> env_logger::Builder {
    let mut logger = env_logger::Builder::from_env(env.default_filter_or("warn"));
    if verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger
}

fn main() {
    let cli = Cli::parse();

    logger(cli.verbose, env_logger::Env::default()).init();

    let result = match cli.command {
        Commands::List => {
            print!("{}", list_samples());
            Ok(())
        }
        Commands::Build { sample, output, format, options } => {
            build_command(&sample, output.as_deref(), format, options.as_deref())
        }
        Commands::Run { sample, options } => run_command(&sample, options.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn list_samples() -> String {
    let width = SAMPLES.iter().map(|sample| sample.name.len()).max().unwrap_or(0);
    SAMPLES
        .iter()
        .map(|sample| format!("{:width$}  {}\n", sample.name, sample.description))
        .collect()
}

fn load_options(path: Option<&Path>) -> DriverResult<LoweringOptions> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            let options: LoweringOptions = serde_json::from_str(&text)?;
            options.validate()?;
            Ok(options)
        }
        None => Ok(LoweringOptions::default()),
    }
}

fn find_sample(name: &str) -> DriverResult<&'static Sample> {
    samples::find(name)
        .ok_or_else(|| format!("Unknown sample '{}'; available: {}", name, samples::names().join(", ")).into())
}

fn build_sample(name: &str, options: Option<&Path>) -> DriverResult<Program> {
    let sample = find_sample(name)?;
    let options = load_options(options)?;
    info!("Building sample '{}'", sample.name);
    Ok(sample.build(options)?)
}

fn render(program: &Program, format: Format) -> DriverResult<String> {
    match format {
        Format::Text => Ok(program.render()?),
        Format::Json => Ok(serde_json::to_string_pretty(&program.listing()?)?),
    }
}

fn build_command(name: &str, output: Option<&Path>, format: Format, options: Option<&Path>) -> DriverResult<()> {
    let program = build_sample(name, options)?;
    let text = render(&program, format)?;

    match output {
        Some(path) => {
            fs::write(path, format!("{}\n", text))?;
            println!("Listing written to: {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn execute(program: &Program) -> DriverResult<Machine> {
    let asm = program.to_asm()?;
    let mut machine = Machine::new(program.builder().options().memory_cells);
    machine.run(&asm, STEP_LIMIT)?;
    info!("Executed {} instructions", machine.steps());
    Ok(machine)
}

fn machine_report(machine: &Machine) -> String {
    let mut report = String::from("Registers:\n");
    for (index, value) in machine.registers.iter().enumerate() {
        report.push_str(&format!("  R{:<2} = {}\n", index, value));
    }
    let cells: Vec<(usize, i32)> = machine
        .memory
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, value)| *value != 0)
        .collect();
    if !cells.is_empty() {
        report.push_str("Memory:\n");
        for (address, value) in cells {
            report.push_str(&format!("  [{:>3}] = {}\n", address, value));
        }
    }
    report
}

fn run_command(name: &str, options: Option<&Path>) -> DriverResult<()> {
    let program = build_sample(name, options)?;
    println!("{}\n", program.render()?);
    let machine = execute(&program)?;
    print!("{}", machine_report(&machine));
    Ok(())
}
