mod backend;
mod debug;
mod error;
mod frontend;
pub mod memory;

pub use backend::chunk::{Chunk, OpCode, SourceLocation};
pub use backend::compiler::{Compiler, CompilerPipeline, VesperProgram, FRAME_MAX, STACK_MAX};
pub use backend::object::{
    BoundMethodObject, ClassObject, ClosureObject, FunctionObject, InstanceObject, NativeFn,
    NativeFunctionObject, UpvalueObject, UpvalueState,
};
pub use backend::value::Value;
pub use backend::vm::{RuntimeResult, Vm};
pub use debug::{disassemble_chunk, disassemble_instruction, disassemble_program};
pub use error::{
    ErrorReporter, NativeFunctionError, Trace, VesperCompilerError, VesperErrorKind,
    VesperPipelineError, VesperRuntimeError,
};
pub use frontend::source::{SourceMap, SourceSpan};
pub use frontend::tokenizer::{Token, TokenType, Tokenizer};
pub use memory::{
    BoundMethodHandle, ClassHandle, ClosureHandle, FunctionHandle, HeapAllocator, InstanceHandle,
    NativeFunctionHandle, StringHandle, StringInterner, Table, UpvalueHandle,
};

#[cfg(test)]
pub mod tests;
