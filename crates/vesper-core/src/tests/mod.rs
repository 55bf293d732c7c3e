pub mod tokenizing;
pub mod vm_class_tests;
pub mod vm_closure_tests;
pub mod vm_tests;

use crate::{
    CompilerPipeline, HeapAllocator, SourceMap, VesperCompilerError, VesperRuntimeError, Vm,
};

pub fn compile_source(source: &str) -> Result<(Vm, crate::VesperProgram), Vec<VesperCompilerError>> {
    let source_map = SourceMap::new(source.to_string());
    let mut allocator = HeapAllocator::new();

    match CompilerPipeline::new(source_map, &mut allocator).run() {
        Ok(program) => Ok((Vm::new(allocator), program)),
        Err(errors) => Err(errors.into_errors()),
    }
}

pub fn run_source(source: &str) -> Result<Vm, VesperRuntimeError> {
    let (mut vm, program) = match compile_source(source) {
        Ok(compiled) => compiled,
        Err(errors) => {
            for error in &errors {
                eprintln!("{}", error);
            }
            panic!("Unexpected compile errors.");
        }
    };

    vm.interpret(program)?;
    Ok(vm)
}

pub fn assert_runs(source: &str) -> Vm {
    match run_source(source) {
        Ok(vm) => vm,
        Err(error) => panic!("{}", error),
    }
}

pub fn assert_compile_error(source: &str, expected_message: &str) {
    match compile_source(source) {
        Ok(_) => panic!(
            "Expected compile error '{}' but compilation succeeded.",
            expected_message
        ),
        Err(errors) => {
            let error_text = errors
                .iter()
                .map(|e| e.message.clone())
                .collect::<Vec<String>>()
                .join("\n");
            assert!(
                error_text.contains(expected_message),
                "Expected error message '{}' but got: {}",
                expected_message,
                error_text
            );
        }
    }
}

pub fn assert_runtime_error(source: &str, expected_message: &str) {
    match run_source(source) {
        Ok(_) => panic!(
            "Expected runtime error '{}' but execution succeeded.",
            expected_message
        ),
        Err(error) => {
            assert!(
                error.message.contains(expected_message),
                "Expected error message '{}' but got: {}",
                expected_message,
                error.message
            );
        }
    }
}
