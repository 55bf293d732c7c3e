use std::io::{self, Write};

use vesper_core::{CompilerPipeline, HeapAllocator, SourceMap, Vm};

pub fn run_repl(debug: bool) {
    println!("Vesper REPL - Type 'exit' to quit");

    let allocator = HeapAllocator::new();
    let mut vm = Vm::new(allocator).set_debug(debug);

    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            break;
        }

        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) => break,
            Ok(_) => {
                let input = input.trim();
                if input == "exit" {
                    break;
                }
                if !input.is_empty() {
                    execute_repl_line(input, &mut vm);
                }
            }
            Err(error) => {
                eprintln!("Error reading input: {}", error);
                break;
            }
        }
    }
}

fn execute_repl_line(source: &str, vm: &mut Vm) {
    let source_map = SourceMap::new(source.to_string());

    let program = match CompilerPipeline::new(source_map, &mut vm.alloc).run() {
        Ok(program) => program,
        Err(errors) => {
            for error in errors.all() {
                eprintln!("{}", error);
            }
            return;
        }
    };

    if let Err(error) = vm.interpret(program) {
        eprintln!("{}", error);
    }
}
