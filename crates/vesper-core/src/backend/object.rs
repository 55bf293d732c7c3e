use crate::{
    backend::chunk::Chunk,
    error::NativeFunctionError,
    memory::{ClassHandle, ClosureHandle, FunctionHandle, HeapAllocator, StringHandle, Table, UpvalueHandle},
    Value,
};

/// A compiled function. Immutable once the compiler finishes it.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionObject {
    pub arity: usize,
    pub name: StringHandle,
    pub chunk: Chunk,
    pub upvalue_count: usize,
    pub is_marked: bool,
}

impl FunctionObject {
    pub fn new(name: StringHandle, arity: usize) -> Self {
        Self {
            name,
            arity,
            chunk: Chunk::new(),
            upvalue_count: 0,
            is_marked: false,
        }
    }
}

/// A runtime instantiation of a function together with its captured
/// variables. The upvalue vector is sized at creation and filled by the
/// `Closure` instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosureObject {
    pub function: FunctionHandle,
    pub upvalues: Vec<UpvalueHandle>,
    pub is_marked: bool,
}

impl ClosureObject {
    pub fn new(function: FunctionHandle, upvalue_count: usize) -> Self {
        Self {
            function,
            upvalues: Vec::with_capacity(upvalue_count),
            is_marked: false,
        }
    }
}

/// A captured variable. Open while the owning stack slot is live, closed
/// (holding its own copy) once that slot is popped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpvalueState {
    Open(usize),
    Closed(Value),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpvalueObject {
    pub state: UpvalueState,
    pub is_marked: bool,
}

impl UpvalueObject {
    pub fn open(slot: usize) -> Self {
        Self {
            state: UpvalueState::Open(slot),
            is_marked: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassObject {
    pub name: StringHandle,
    pub methods: Table,
    pub is_marked: bool,
}

impl ClassObject {
    pub fn new(name: StringHandle) -> Self {
        Self {
            name,
            methods: Table::new(),
            is_marked: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InstanceObject {
    pub class: ClassHandle,
    pub fields: Table,
    pub is_marked: bool,
}

impl InstanceObject {
    pub fn new(class: ClassHandle) -> Self {
        Self {
            class,
            fields: Table::new(),
            is_marked: false,
        }
    }
}

/// A method value extracted from an instance: the receiver travels with
/// the closure so a later call can re-install it in slot zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundMethodObject {
    pub receiver: Value,
    pub method: ClosureHandle,
    pub is_marked: bool,
}

impl BoundMethodObject {
    pub fn new(receiver: Value, method: ClosureHandle) -> Self {
        Self {
            receiver,
            method,
            is_marked: false,
        }
    }
}

pub type NativeFn =
    fn(args: &[Value], allocator: &mut HeapAllocator) -> Result<Value, NativeFunctionError>;

#[derive(Debug, Clone)]
pub struct NativeFunctionObject {
    pub name: StringHandle,
    pub arity: usize,
    pub function: NativeFn,
}
