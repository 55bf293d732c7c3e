mod alloc;
mod string_interner;
mod table;

pub use alloc::{
    BoundMethodHandle, ClassHandle, ClosureHandle, FunctionHandle, HeapAllocator, InstanceHandle,
    NativeFunctionHandle, UpvalueHandle,
};
pub use string_interner::{fnv1a, StringHandle, StringInterner};
pub use table::Table;
