// milac: Mila compiler front end

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser as _;
use crossterm::style::Stylize;
use log::{info, LevelFilter};

use mila::diagnostics::CompileError;
use mila::runtime::{Console, ExecLimits, Machine};

#[derive(clap::Parser)]
#[command(name = "milac", version, about = "Compile Mila programs to basic-block IR")]
struct Args {
    /// Source file, or `-` for standard input
    input: PathBuf,

    /// Print the program back from its syntax tree
    #[arg(short, long)]
    print: bool,

    /// Dump the generated IR
    #[arg(short, long)]
    dump: bool,

    /// Run the generated program
    #[arg(short, long)]
    run: bool,

    /// Write the IR dump to a file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Integers for `readln` when running
    #[arg(long = "input", value_name = "N", num_args = 1.., allow_negative_numbers = true)]
    input_values: Vec<i32>,

    /// More logging; repeat for more detail
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(status) => status,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn read_source(path: &PathBuf) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("reading stdin")?;
        return Ok(buffer);
    }
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn run(args: &Args) -> Result<ExitCode> {
    let source = read_source(&args.input)?;

    if args.print {
        match mila::parse(&source) {
            Ok(unit) => print!("{}", unit),
            Err(err) => return Ok(report(&err, &source)),
        }
    }

    let name = args
        .input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| *stem != "-")
        .unwrap_or("mila");
    let module = match mila::compile_named(&source, name) {
        Ok(module) => module,
        Err(err) => return Ok(report(&err, &source)),
    };
    info!(
        "compiled {} functions and {} globals",
        module.functions.len(),
        module.globals.len()
    );

    if args.dump {
        print!("{}", module);
    }
    if let Some(path) = &args.output {
        fs::write(path, module.to_string())
            .with_context(|| format!("writing {}", path.display()))?;
    }

    if args.run {
        let console = Console::with_input(args.input_values.iter().copied());
        let mut machine = Machine::new(&module, ExecLimits::default(), console);
        let result = machine.run();
        print!("{}", machine.console().output());
        let status = result.context("running program")?;
        info!("main returned {} after {} steps", status, machine.steps());
        return Ok(ExitCode::from(status as u8));
    }

    Ok(ExitCode::SUCCESS)
}

fn report(err: &CompileError, source: &str) -> ExitCode {
    let rendered = err.render(source);
    let mut lines = rendered.lines();
    if let Some(first) = lines.next() {
        eprintln!("{}", first.red().bold());
    }
    for line in lines {
        eprintln!("{}", line.dim());
    }
    ExitCode::FAILURE
}
