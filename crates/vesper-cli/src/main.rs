mod repl;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};

use repl::run_repl;
use vesper_core::{disassemble_program, CompilerPipeline, HeapAllocator, SourceMap, Vm};

const EXIT_COMPILE_ERROR: u8 = 65;
const EXIT_RUNTIME_ERROR: u8 = 70;
const EXIT_IO_ERROR: u8 = 74;

#[derive(Parser)]
#[command(name = "vesper")]
#[command(version, about = "The Vesper language", long_about = None)]
struct VesperCli {
    /// Script to run; starts a REPL when omitted.
    path: Option<String>,

    #[arg(short, long, action = ArgAction::SetTrue, help = "Trace VM execution")]
    debug: bool,

    #[arg(short = 'm', long, action = ArgAction::SetTrue, help = "Dump compiled bytecode before execution")]
    disassemble: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Stderr)
        .init();

    let cli = VesperCli::parse();

    match cli.path {
        Some(path) => run_script(&path, cli.debug, cli.disassemble),
        None => {
            run_repl(cli.debug);
            ExitCode::SUCCESS
        }
    }
}

fn run_script(filename: &str, debug_mode: bool, dump_bytecode: bool) -> ExitCode {
    let path = PathBuf::from(filename);

    let source = match std::fs::read_to_string(&path) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("Unable to read '{}': {}", path.display(), error);
            return ExitCode::from(EXIT_IO_ERROR);
        }
    };

    let source_map = SourceMap::from_source(filename, source);
    let mut allocator = HeapAllocator::new();

    let program = match CompilerPipeline::new(source_map, &mut allocator).run() {
        Ok(program) => program,
        Err(errors) => {
            for error in errors.all() {
                eprintln!("{}", error);
            }
            return ExitCode::from(EXIT_COMPILE_ERROR);
        }
    };

    if dump_bytecode {
        disassemble_program(&allocator);
    }

    match Vm::new(allocator).set_debug(debug_mode).interpret(program) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{}", error);
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}
