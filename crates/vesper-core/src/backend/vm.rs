use std::collections::VecDeque;

use crate::{
    backend::chunk::{OpCode, SourceLocation},
    backend::compiler::{VesperProgram, FRAME_MAX, STACK_MAX},
    backend::object::{
        BoundMethodObject, ClassObject, ClosureObject, InstanceObject, NativeFunctionObject,
        UpvalueObject, UpvalueState,
    },
    backend::vesper_std::{
        vesper_assert, vesper_assert_eq, vesper_clock, vesper_to_string, vesper_typeof,
    },
    debug::disassemble_instruction,
    error::{Trace, VesperRuntimeError},
    memory::{
        ClassHandle, ClosureHandle, FunctionHandle, HeapAllocator, NativeFunctionHandle,
        StringHandle, Table, UpvalueHandle,
    },
    NativeFn, Value,
};

pub type RuntimeResult<T> = Result<T, VesperRuntimeError>;

macro_rules! push_value {
    ($vm:expr, $value:expr) => {
        if $vm.stack_top >= STACK_MAX {
            Err(VesperRuntimeError::new(
                "Stack overflow.".to_string(),
                $vm.get_previous_loc(),
            ))
        } else {
            $vm.stack[$vm.stack_top] = $value;
            $vm.stack_top += 1;
            Ok(())
        }
    };
}

macro_rules! pop_value {
    ($vm:expr) => {{
        debug_assert!($vm.stack_top > 0, "Stack underflow: unexpected empty stack.");
        $vm.stack_top -= 1;
        $vm.stack[$vm.stack_top]
    }};
}

macro_rules! peek_value {
    ($vm:expr, $distance:expr) => {
        if $vm.stack_top > $distance {
            $vm.stack[$vm.stack_top - 1 - $distance]
        } else {
            Value::Nil
        }
    };
}

#[derive(Debug, Clone, Copy)]
struct CallFrame {
    closure: ClosureHandle,
    function: FunctionHandle,
    ip: usize,
    value_slot: usize,
}

/// The interpreter: a value stack, a frame stack, the globals table, the
/// open-upvalue list, and the heap. Collection is triggered from
/// `with_gc_check` before any allocating opcode runs.
#[derive(Debug)]
pub struct Vm {
    is_debug: bool,
    is_gc_enabled: bool,
    stack_top: usize,
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    globals: Table,
    /// Sorted by decreasing stack slot; closing at a threshold removes
    /// exactly a prefix.
    open_upvalues: Vec<(usize, UpvalueHandle)>,
    init_handle: StringHandle,
    program_handle: Option<FunctionHandle>,
    pub alloc: HeapAllocator,
}

impl Vm {
    pub fn new(mut alloc: HeapAllocator) -> Self {
        let init_handle = alloc.strings.intern("init");

        let vm = Self {
            is_debug: false,
            is_gc_enabled: true,
            stack_top: 0,
            stack: vec![Value::Nil; STACK_MAX],
            frames: Vec::with_capacity(FRAME_MAX),
            globals: Table::new(),
            open_upvalues: Vec::with_capacity(8),
            init_handle,
            program_handle: None,
            alloc,
        };

        vm.add_native_function("clock", 0, vesper_clock)
            .add_native_function("assert", 2, vesper_assert)
            .add_native_function("assert_eq", 3, vesper_assert_eq)
            .add_native_function("to_string", 1, vesper_to_string)
            .add_native_function("typeof", 1, vesper_typeof)
    }

    pub fn set_debug(mut self, is_debug: bool) -> Self {
        self.is_debug = is_debug;
        self
    }

    pub fn set_gc_status(mut self, is_enabled: bool) -> Self {
        self.is_gc_enabled = is_enabled;
        self
    }

    pub fn add_native_function(mut self, name: &str, arity: usize, function: NativeFn) -> Self {
        let name_handle = self.alloc.strings.intern(name);
        let handle = self.alloc.allocate_native_function(NativeFunctionObject {
            name: name_handle,
            arity,
            function,
        });

        let hash = self.alloc.strings.hash(name_handle);
        self.globals
            .insert(hash, name_handle, Value::NativeFunction(handle));

        self
    }

    pub fn globals(&self) -> &Table {
        &self.globals
    }

    /// Test and embedding convenience: look up a global by source name.
    pub fn get_global(&mut self, name: &str) -> Option<Value> {
        let handle = self.alloc.strings.intern(name);
        let hash = self.alloc.strings.hash(handle);
        self.globals.get(hash, handle)
    }

    pub fn interpret(&mut self, program: VesperProgram) -> RuntimeResult<()> {
        let function_handle = program.into_handle();
        self.program_handle = Some(function_handle);

        let closure_handle = self
            .alloc
            .allocate_closure(ClosureObject::new(function_handle, 0));
        push_value!(self, Value::Closure(closure_handle))?;
        self.call(closure_handle, 0)?;

        match self.run() {
            Ok(_) => Ok(()),
            Err(error) => {
                let error = error.with_stack_trace(self.get_stack_trace());
                self.reset_stack();
                Err(error)
            }
        }
    }

    fn run(&mut self) -> RuntimeResult<Value> {
        loop {
            if self.is_debug {
                self.debug_print();
            }

            let opcode: OpCode = self.read_byte().into();

            match opcode {
                OpCode::Constant => {
                    let constant = self.read_constant();
                    push_value!(self, constant)?;
                }
                OpCode::Nil => {
                    push_value!(self, Value::Nil)?;
                }
                OpCode::True => {
                    push_value!(self, Value::Boolean(true))?;
                }
                OpCode::False => {
                    push_value!(self, Value::Boolean(false))?;
                }
                OpCode::Pop => {
                    pop_value!(self);
                }
                OpCode::GetLocal => {
                    let slot = self.read_byte() as usize;
                    let absolute_slot = self.current_frame().value_slot + slot;
                    let value = self.stack[absolute_slot];
                    push_value!(self, value)?;
                }
                OpCode::SetLocal => {
                    let slot = self.read_byte() as usize;
                    let value = peek_value!(self, 0);
                    let absolute_slot = self.current_frame().value_slot + slot;
                    self.stack[absolute_slot] = value;
                }
                OpCode::GetGlobal => {
                    let name = self.read_string();
                    let hash = self.alloc.strings.hash(name);
                    match self.globals.get(hash, name) {
                        Some(value) => push_value!(self, value)?,
                        None => return Err(self.undefined_variable_error(name)),
                    }
                }
                OpCode::DefineGlobal => {
                    let name = self.read_string();
                    let hash = self.alloc.strings.hash(name);
                    // Install before popping so a collection triggered by
                    // table growth still sees the value rooted.
                    let value = peek_value!(self, 0);
                    self.globals.insert(hash, name, value);
                    pop_value!(self);
                }
                OpCode::SetGlobal => {
                    let name = self.read_string();
                    let hash = self.alloc.strings.hash(name);
                    let value = peek_value!(self, 0);
                    if !self.globals.replace(hash, name, value) {
                        return Err(self.undefined_variable_error(name));
                    }
                }
                OpCode::GetUpvalue => {
                    let index = self.read_byte() as usize;
                    let closure = self.current_frame().closure;
                    let upvalue_handle = self.alloc.get_closure(closure).upvalues[index];
                    let value = match self.alloc.get_upvalue(upvalue_handle).state {
                        UpvalueState::Open(slot) => self.stack[slot],
                        UpvalueState::Closed(value) => value,
                    };
                    push_value!(self, value)?;
                }
                OpCode::SetUpvalue => {
                    let index = self.read_byte() as usize;
                    let value = peek_value!(self, 0);
                    let closure = self.current_frame().closure;
                    let upvalue_handle = self.alloc.get_closure(closure).upvalues[index];
                    match self.alloc.get_upvalue(upvalue_handle).state {
                        UpvalueState::Open(slot) => self.stack[slot] = value,
                        UpvalueState::Closed(_) => {
                            self.alloc.get_upvalue_mut(upvalue_handle).state =
                                UpvalueState::Closed(value);
                        }
                    }
                }
                OpCode::GetProperty => {
                    let name = self.read_string();
                    match peek_value!(self, 0) {
                        Value::Instance(instance_handle) => {
                            let hash = self.alloc.strings.hash(name);
                            let field = self
                                .alloc
                                .get_instance(instance_handle)
                                .fields
                                .get(hash, name);

                            if let Some(field) = field {
                                self.stack[self.stack_top - 1] = field;
                            } else {
                                let class = self.alloc.get_instance(instance_handle).class;
                                self.bind_method(class, name)?;
                            }
                        }
                        _ => {
                            return Err(self
                                .runtime_error("Only instances have properties.".to_string()));
                        }
                    }
                }
                OpCode::SetProperty => {
                    let name = self.read_string();
                    match peek_value!(self, 1) {
                        Value::Instance(instance_handle) => {
                            let hash = self.alloc.strings.hash(name);
                            let value = pop_value!(self);
                            pop_value!(self);
                            self.alloc
                                .get_instance_mut(instance_handle)
                                .fields
                                .insert(hash, name, value);
                            push_value!(self, value)?;
                        }
                        _ => {
                            return Err(
                                self.runtime_error("Only instances have fields.".to_string())
                            );
                        }
                    }
                }
                OpCode::GetSuper => {
                    let name = self.read_string();
                    match pop_value!(self).as_class() {
                        Some(superclass) => self.bind_method(superclass, name)?,
                        None => {
                            return Err(
                                self.runtime_error("Superclass must be a class.".to_string())
                            );
                        }
                    }
                }
                OpCode::Equal => {
                    let b = pop_value!(self);
                    let a = pop_value!(self);
                    push_value!(self, Value::Boolean(a == b))?;
                }
                OpCode::Greater => {
                    self.binary_operation(|a, b| Value::Boolean(a > b))?;
                }
                OpCode::Less => {
                    self.binary_operation(|a, b| Value::Boolean(a < b))?;
                }
                OpCode::Add => {
                    let b = peek_value!(self, 0);
                    let a = peek_value!(self, 1);
                    match (a, b) {
                        (Value::Number(x), Value::Number(y)) => {
                            pop_value!(self);
                            pop_value!(self);
                            push_value!(self, Value::Number(x + y))?;
                        }
                        (Value::String(left), Value::String(right)) => {
                            // Operands stay on the stack until after the
                            // allocation so a collection cannot free them.
                            let result =
                                self.with_gc_check(|alloc| alloc.strings.concat(left, right));
                            pop_value!(self);
                            pop_value!(self);
                            push_value!(self, Value::String(result))?;
                        }
                        _ => {
                            return Err(self.runtime_error(
                                "Operands must be two numbers or two strings.".to_string(),
                            ));
                        }
                    }
                }
                OpCode::Subtract => {
                    self.binary_operation(|a, b| Value::Number(a - b))?;
                }
                OpCode::Multiply => {
                    self.binary_operation(|a, b| Value::Number(a * b))?;
                }
                OpCode::Divide => {
                    self.binary_operation(|a, b| Value::Number(a / b))?;
                }
                OpCode::Not => {
                    let value = pop_value!(self);
                    push_value!(self, Value::Boolean(!value.is_truthy()))?;
                }
                OpCode::Negate => {
                    if let Some(number) = peek_value!(self, 0).as_number() {
                        self.stack[self.stack_top - 1] = Value::Number(-number);
                    } else {
                        return Err(self.runtime_error("Operand must be a number.".to_string()));
                    }
                }
                OpCode::Print => {
                    let value = pop_value!(self);
                    println!("{}", value.to_display_string(&self.alloc));
                }
                OpCode::Jump => {
                    let offset = self.read_short();
                    self.current_frame_mut().ip += offset;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_short();
                    if !peek_value!(self, 0).is_truthy() {
                        self.current_frame_mut().ip += offset;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_short();
                    self.current_frame_mut().ip -= offset;
                }
                OpCode::Call => {
                    let arg_count = self.read_byte() as usize;
                    let callee = peek_value!(self, arg_count);
                    self.call_value(callee, arg_count)?;
                }
                OpCode::Invoke => {
                    let name = self.read_string();
                    let arg_count = self.read_byte() as usize;
                    self.invoke(name, arg_count)?;
                }
                OpCode::SuperInvoke => {
                    let name = self.read_string();
                    let arg_count = self.read_byte() as usize;
                    match pop_value!(self).as_class() {
                        Some(superclass) => self.invoke_from_class(superclass, name, arg_count)?,
                        None => {
                            return Err(
                                self.runtime_error("Superclass must be a class.".to_string())
                            );
                        }
                    }
                }
                OpCode::Closure => {
                    let constant = self.read_constant();
                    self.create_closure(constant)?;
                }
                OpCode::CloseUpvalue => {
                    self.close_upvalues(self.stack_top - 1);
                    pop_value!(self);
                }
                OpCode::Return => {
                    let result = pop_value!(self);
                    let value_slot = self.current_frame().value_slot;

                    self.close_upvalues(value_slot);
                    self.frames.pop();

                    if self.frames.is_empty() {
                        self.stack_top = 0;
                        return Ok(result);
                    }

                    self.stack_top = value_slot;
                    push_value!(self, result)?;
                }
                OpCode::Class => {
                    let name = self.read_string();
                    let handle =
                        self.with_gc_check(|alloc| alloc.allocate_class(ClassObject::new(name)));
                    push_value!(self, Value::Class(handle))?;
                }
                OpCode::Inherit => {
                    let superclass = peek_value!(self, 1);
                    match (superclass.as_class(), peek_value!(self, 0).as_class()) {
                        (Some(superclass_handle), Some(subclass_handle)) => {
                            let methods = self.alloc.get_class(superclass_handle).methods.clone();
                            self.alloc
                                .get_class_mut(subclass_handle)
                                .methods
                                .add_all(&methods);
                            pop_value!(self);
                        }
                        _ => {
                            return Err(
                                self.runtime_error("Superclass must be a class.".to_string())
                            );
                        }
                    }
                }
                OpCode::Method => {
                    let name = self.read_string();
                    self.define_method(name)?;
                }
            }
        }
    }

    // ---- frame and chunk access ----

    fn current_frame(&self) -> &CallFrame {
        debug_assert!(!self.frames.is_empty(), "No active frame");
        &self.frames[self.frames.len() - 1]
    }

    fn current_frame_mut(&mut self) -> &mut CallFrame {
        let index = self.frames.len() - 1;
        &mut self.frames[index]
    }

    fn read_byte(&mut self) -> u8 {
        let index = self.frames.len() - 1;
        let frame = self.frames[index];
        let byte = self.alloc.get_function(frame.function).chunk.code[frame.ip];
        self.frames[index].ip += 1;
        byte
    }

    fn read_short(&mut self) -> usize {
        let high_byte = self.read_byte() as usize;
        let low_byte = self.read_byte() as usize;
        (high_byte << 8) | low_byte
    }

    fn read_constant(&mut self) -> Value {
        let index = self.read_byte() as usize;
        let frame = *self.current_frame();
        self.alloc.get_function(frame.function).chunk.constants[index]
    }

    fn read_string(&mut self) -> StringHandle {
        match self.read_constant() {
            Value::String(handle) => handle,
            _ => panic!("Expected string constant"),
        }
    }

    fn get_loc_at(&self, index: usize) -> SourceLocation {
        if self.frames.is_empty() {
            return SourceLocation::default();
        }
        let frame = self.current_frame();
        self.alloc
            .get_function(frame.function)
            .chunk
            .locs
            .get(index)
            .copied()
            .unwrap_or_default()
    }

    fn get_previous_loc(&self) -> SourceLocation {
        if self.frames.is_empty() || self.current_frame().ip == 0 {
            SourceLocation::default()
        } else {
            self.get_loc_at(self.current_frame().ip - 1)
        }
    }

    fn runtime_error(&self, message: String) -> VesperRuntimeError {
        VesperRuntimeError::new(message, self.get_previous_loc())
    }

    fn undefined_variable_error(&self, name: StringHandle) -> VesperRuntimeError {
        self.runtime_error(format!(
            "Undefined variable '{}'.",
            self.alloc.strings.get_string(name)
        ))
    }

    // ---- calls ----

    fn binary_operation<F>(&mut self, op: F) -> RuntimeResult<()>
    where
        F: FnOnce(f64, f64) -> Value,
    {
        let b = pop_value!(self);
        let a = pop_value!(self);

        match (a.as_number(), b.as_number()) {
            (Some(a), Some(b)) => {
                let value = op(a, b);
                push_value!(self, value)?;
                Ok(())
            }
            _ => Err(self.runtime_error("Operands must be numbers.".to_string())),
        }
    }

    fn call_value(&mut self, callee: Value, arg_count: usize) -> RuntimeResult<()> {
        match callee {
            Value::Closure(handle) => self.call(handle, arg_count),
            Value::NativeFunction(handle) => self.call_native(handle, arg_count),
            Value::Class(handle) => self.call_class(handle, arg_count),
            Value::BoundMethod(handle) => {
                let bound = *self.alloc.get_bound_method(handle);
                self.stack[self.stack_top - arg_count - 1] = bound.receiver;
                self.call(bound.method, arg_count)
            }
            _ => Err(self.runtime_error("Can only call functions and classes.".to_string())),
        }
    }

    fn call(&mut self, handle: ClosureHandle, arg_count: usize) -> RuntimeResult<()> {
        let function_handle = self.alloc.get_closure(handle).function;
        let arity = self.alloc.get_function(function_handle).arity;

        if arg_count != arity {
            return Err(self.runtime_error(format!(
                "Expected {} arguments but got {}.",
                arity, arg_count
            )));
        }

        if self.frames.len() == FRAME_MAX {
            return Err(self.runtime_error("Stack overflow.".to_string()));
        }

        self.frames.push(CallFrame {
            closure: handle,
            function: function_handle,
            ip: 0,
            value_slot: self.stack_top - arg_count - 1,
        });

        Ok(())
    }

    fn call_class(&mut self, handle: ClassHandle, arg_count: usize) -> RuntimeResult<()> {
        let instance =
            self.with_gc_check(|alloc| alloc.allocate_instance(InstanceObject::new(handle)));
        self.stack[self.stack_top - arg_count - 1] = Value::Instance(instance);

        let init_hash = self.alloc.strings.hash(self.init_handle);
        let initializer = self
            .alloc
            .get_class(handle)
            .methods
            .get(init_hash, self.init_handle)
            .and_then(|value| value.as_closure());

        if let Some(initializer) = initializer {
            self.call(initializer, arg_count)
        } else if arg_count != 0 {
            Err(self.runtime_error(format!("Expected 0 arguments but got {}.", arg_count)))
        } else {
            Ok(())
        }
    }

    fn call_native(&mut self, handle: NativeFunctionHandle, arg_count: usize) -> RuntimeResult<()> {
        let native = self.alloc.get_native_function(handle).clone();

        if arg_count != native.arity {
            return Err(self.runtime_error(format!(
                "Expected {} arguments but got {}.",
                native.arity, arg_count
            )));
        }

        let args_start = self.stack_top - arg_count;
        let result = (native.function)(&self.stack[args_start..self.stack_top], &mut self.alloc)
            .map_err(|error| error.into_runtime_error(self.get_previous_loc()))?;

        self.stack_top = args_start - 1;
        push_value!(self, result)?;

        Ok(())
    }

    fn invoke(&mut self, name: StringHandle, arg_count: usize) -> RuntimeResult<()> {
        let receiver = peek_value!(self, arg_count);

        match receiver {
            Value::Instance(instance_handle) => {
                // Fields shadow methods, so a callable field wins.
                let hash = self.alloc.strings.hash(name);
                let field = self
                    .alloc
                    .get_instance(instance_handle)
                    .fields
                    .get(hash, name);

                if let Some(field) = field {
                    self.stack[self.stack_top - arg_count - 1] = field;
                    return self.call_value(field, arg_count);
                }

                let class = self.alloc.get_instance(instance_handle).class;
                self.invoke_from_class(class, name, arg_count)
            }
            _ => Err(self.runtime_error("Only instances have methods.".to_string())),
        }
    }

    fn invoke_from_class(
        &mut self,
        class: ClassHandle,
        name: StringHandle,
        arg_count: usize,
    ) -> RuntimeResult<()> {
        let hash = self.alloc.strings.hash(name);
        let method = self
            .alloc
            .get_class(class)
            .methods
            .get(hash, name)
            .and_then(|value| value.as_closure());

        match method {
            Some(method) => self.call(method, arg_count),
            None => Err(self.undefined_property_error(name)),
        }
    }

    fn bind_method(&mut self, class: ClassHandle, name: StringHandle) -> RuntimeResult<()> {
        let hash = self.alloc.strings.hash(name);
        let method = self
            .alloc
            .get_class(class)
            .methods
            .get(hash, name)
            .and_then(|value| value.as_closure());

        match method {
            Some(method) => {
                let receiver = peek_value!(self, 0);
                let handle = self.with_gc_check(|alloc| {
                    alloc.allocate_bound_method(BoundMethodObject::new(receiver, method))
                });
                pop_value!(self);
                push_value!(self, Value::BoundMethod(handle))?;
                Ok(())
            }
            None => Err(self.undefined_property_error(name)),
        }
    }

    fn undefined_property_error(&self, name: StringHandle) -> VesperRuntimeError {
        self.runtime_error(format!(
            "Undefined property '{}'.",
            self.alloc.strings.get_string(name)
        ))
    }

    fn define_method(&mut self, name: StringHandle) -> RuntimeResult<()> {
        if let Some(method) = peek_value!(self, 0).as_closure() {
            if let Some(class_handle) = peek_value!(self, 1).as_class() {
                let hash = self.alloc.strings.hash(name);
                self.alloc
                    .get_class_mut(class_handle)
                    .methods
                    .insert(hash, name, Value::Closure(method));
                pop_value!(self);
            }
        }

        Ok(())
    }

    // ---- closures and upvalues ----

    fn create_closure(&mut self, constant: Value) -> RuntimeResult<()> {
        let function_handle = match constant {
            Value::Function(handle) => handle,
            _ => return Err(self.runtime_error("Expected function.".to_string())),
        };

        let upvalue_count = self.alloc.get_function(function_handle).upvalue_count;
        let closure_handle = self.with_gc_check(|alloc| {
            alloc.allocate_closure(ClosureObject::new(function_handle, upvalue_count))
        });
        push_value!(self, Value::Closure(closure_handle))?;

        for _ in 0..upvalue_count {
            let is_local = self.read_byte() != 0;
            let index = self.read_byte() as usize;

            let upvalue_handle = if is_local {
                let slot = self.current_frame().value_slot + index;
                self.capture_upvalue(slot)
            } else {
                let current_closure = self.current_frame().closure;
                self.alloc.get_closure(current_closure).upvalues[index]
            };

            self.alloc
                .get_closure_mut(closure_handle)
                .upvalues
                .push(upvalue_handle);
        }

        Ok(())
    }

    /// Reuses the open upvalue for `slot` if one exists, keeping the
    /// list sorted by decreasing slot.
    fn capture_upvalue(&mut self, slot: usize) -> UpvalueHandle {
        let mut insert_at = self.open_upvalues.len();

        for (i, &(open_slot, handle)) in self.open_upvalues.iter().enumerate() {
            if open_slot == slot {
                return handle;
            }
            if open_slot < slot {
                insert_at = i;
                break;
            }
        }

        let handle = self.alloc.allocate_upvalue(UpvalueObject::open(slot));
        self.open_upvalues.insert(insert_at, (slot, handle));
        handle
    }

    /// Closes every open upvalue at or above `threshold`: the prefix of
    /// the list, since it is sorted by decreasing slot.
    fn close_upvalues(&mut self, threshold: usize) {
        while let Some(&(slot, handle)) = self.open_upvalues.first() {
            if slot < threshold {
                break;
            }

            let value = self.stack[slot];
            self.alloc.get_upvalue_mut(handle).state = UpvalueState::Closed(value);
            self.open_upvalues.remove(0);
        }
    }

    // ---- garbage collection ----

    fn with_gc_check<T>(&mut self, op: impl FnOnce(&mut HeapAllocator) -> T) -> T {
        if self.is_gc_enabled && self.alloc.should_collect_garbage() {
            self.collect_garbage();
        }
        op(&mut self.alloc)
    }

    fn gather_roots(&self) -> VecDeque<Value> {
        let capacity = self.stack_top + self.frames.len() + self.globals.len() * 2 + 2;
        let mut roots = VecDeque::with_capacity(capacity);

        roots.extend(self.stack[..self.stack_top].iter().copied());

        for frame in &self.frames {
            roots.push_back(Value::Closure(frame.closure));
        }

        for (key, _, value) in self.globals.iter() {
            roots.push_back(Value::String(key));
            roots.push_back(value);
        }

        roots.push_back(Value::String(self.init_handle));
        if let Some(program) = self.program_handle {
            roots.push_back(Value::Function(program));
        }

        roots
    }

    pub fn collect_garbage(&mut self) {
        let mut roots = self.gather_roots();
        for &(_, handle) in &self.open_upvalues {
            self.alloc.mark_upvalue_root(handle, &mut roots);
        }
        self.alloc.collect_garbage(roots);
    }

    // ---- diagnostics ----

    fn reset_stack(&mut self) {
        self.stack_top = 0;
        self.frames.clear();
        self.open_upvalues.clear();
    }

    fn get_stack_trace(&self) -> Vec<Trace> {
        let mut traces = Vec::new();

        for frame in self.frames.iter().rev() {
            let function = self.alloc.get_function(frame.function);
            let name = self.alloc.strings.get_string(function.name);
            let loc = if frame.ip > 0 {
                function
                    .chunk
                    .locs
                    .get(frame.ip - 1)
                    .copied()
                    .unwrap_or_default()
            } else {
                SourceLocation::default()
            };

            traces.push(Trace::new(name, loc));
        }

        traces
    }

    fn debug_print(&self) {
        print!("          ");
        for i in 0..self.stack_top {
            print!("[ {} ] ", self.stack[i].to_display_string(&self.alloc));
        }
        println!();

        let frame = self.current_frame();
        disassemble_instruction(
            &self.alloc.get_function(frame.function).chunk,
            &self.alloc,
            frame.ip,
        );
    }
}
