use std::collections::VecDeque;

use generational_arena::{Arena, Index};

use crate::{
    backend::object::{
        BoundMethodObject, ClassObject, ClosureObject, FunctionObject, InstanceObject,
        NativeFunctionObject, UpvalueObject, UpvalueState,
    },
    memory::StringInterner,
    Value,
};

pub type FunctionHandle = Index;
pub type ClosureHandle = Index;
pub type UpvalueHandle = Index;
pub type ClassHandle = Index;
pub type InstanceHandle = Index;
pub type BoundMethodHandle = Index;
pub type NativeFunctionHandle = u32;

const GC_HEAP_GROW_FACTOR: usize = 2;
const INITIAL_GC_THRESHOLD: usize = 1024 * 1024;

/// Owns every heap object. Each object kind lives in its own typed
/// arena; the stable arena indices are the handles values carry. The
/// collector marks from a gray worklist of values and sweeps each arena,
/// treating the intern table as weak.
#[derive(Debug, Clone)]
pub struct HeapAllocator {
    pub strings: StringInterner,
    functions: Arena<FunctionObject>,
    closures: Arena<ClosureObject>,
    upvalues: Arena<UpvalueObject>,
    classes: Arena<ClassObject>,
    instances: Arena<InstanceObject>,
    bound_methods: Arena<BoundMethodObject>,
    native_functions: Vec<NativeFunctionObject>,
    bytes_until_gc: usize,
}

impl HeapAllocator {
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    pub fn with_capacity(initial_capacity: usize) -> Self {
        Self {
            strings: StringInterner::with_capacity(initial_capacity),
            functions: Arena::with_capacity(initial_capacity),
            closures: Arena::with_capacity(initial_capacity),
            upvalues: Arena::with_capacity(initial_capacity),
            classes: Arena::with_capacity(initial_capacity),
            instances: Arena::with_capacity(initial_capacity),
            bound_methods: Arena::with_capacity(initial_capacity),
            native_functions: Vec::new(),
            bytes_until_gc: INITIAL_GC_THRESHOLD,
        }
    }

    pub fn set_bytes_until_gc(mut self, bytes: usize) -> Self {
        self.bytes_until_gc = bytes;
        self
    }

    pub fn allocate_function(&mut self, function: FunctionObject) -> FunctionHandle {
        self.functions.insert(function)
    }

    pub fn get_function(&self, handle: FunctionHandle) -> &FunctionObject {
        &self.functions[handle]
    }

    pub fn allocate_closure(&mut self, closure: ClosureObject) -> ClosureHandle {
        self.closures.insert(closure)
    }

    pub fn get_closure(&self, handle: ClosureHandle) -> &ClosureObject {
        &self.closures[handle]
    }

    pub fn get_closure_mut(&mut self, handle: ClosureHandle) -> &mut ClosureObject {
        &mut self.closures[handle]
    }

    pub fn allocate_upvalue(&mut self, upvalue: UpvalueObject) -> UpvalueHandle {
        self.upvalues.insert(upvalue)
    }

    pub fn get_upvalue(&self, handle: UpvalueHandle) -> &UpvalueObject {
        &self.upvalues[handle]
    }

    pub fn get_upvalue_mut(&mut self, handle: UpvalueHandle) -> &mut UpvalueObject {
        &mut self.upvalues[handle]
    }

    pub fn allocate_class(&mut self, class: ClassObject) -> ClassHandle {
        self.classes.insert(class)
    }

    pub fn get_class(&self, handle: ClassHandle) -> &ClassObject {
        &self.classes[handle]
    }

    pub fn get_class_mut(&mut self, handle: ClassHandle) -> &mut ClassObject {
        &mut self.classes[handle]
    }

    pub fn allocate_instance(&mut self, instance: InstanceObject) -> InstanceHandle {
        self.instances.insert(instance)
    }

    pub fn get_instance(&self, handle: InstanceHandle) -> &InstanceObject {
        &self.instances[handle]
    }

    pub fn get_instance_mut(&mut self, handle: InstanceHandle) -> &mut InstanceObject {
        &mut self.instances[handle]
    }

    pub fn allocate_bound_method(&mut self, bound: BoundMethodObject) -> BoundMethodHandle {
        self.bound_methods.insert(bound)
    }

    pub fn get_bound_method(&self, handle: BoundMethodHandle) -> &BoundMethodObject {
        &self.bound_methods[handle]
    }

    pub fn allocate_native_function(
        &mut self,
        function: NativeFunctionObject,
    ) -> NativeFunctionHandle {
        self.native_functions.push(function);
        (self.native_functions.len() - 1) as NativeFunctionHandle
    }

    pub fn get_native_function(&self, handle: NativeFunctionHandle) -> &NativeFunctionObject {
        &self.native_functions[handle as usize]
    }

    pub fn iter_functions(&self) -> impl Iterator<Item = (FunctionHandle, &FunctionObject)> {
        self.functions.iter()
    }

    pub fn should_collect_garbage(&self) -> bool {
        self.total_allocated_bytes() > self.bytes_until_gc
    }

    pub fn total_allocated_bytes(&self) -> usize {
        let table_bytes: usize = self
            .classes
            .iter()
            .map(|(_, class)| class.methods.get_allocated_bytes())
            .chain(
                self.instances
                    .iter()
                    .map(|(_, instance)| instance.fields.get_allocated_bytes()),
            )
            .sum();

        self.strings.get_allocated_bytes()
            + self.functions.len() * std::mem::size_of::<FunctionObject>()
            + self.closures.len() * std::mem::size_of::<ClosureObject>()
            + self.upvalues.len() * std::mem::size_of::<UpvalueObject>()
            + self.classes.len() * std::mem::size_of::<ClassObject>()
            + self.instances.len() * std::mem::size_of::<InstanceObject>()
            + self.bound_methods.len() * std::mem::size_of::<BoundMethodObject>()
            + table_bytes
    }

    pub fn object_count(&self) -> usize {
        self.strings.len()
            + self.functions.len()
            + self.closures.len()
            + self.upvalues.len()
            + self.classes.len()
            + self.instances.len()
            + self.bound_methods.len()
    }

    /// Marks an upvalue that is rooted directly (the VM's open-upvalue
    /// list holds handles, not values). Open upvalues point into the
    /// stack, which is rooted separately; closed ones carry their value.
    pub fn mark_upvalue_root(&mut self, handle: UpvalueHandle, gray: &mut VecDeque<Value>) {
        if let Some(upvalue) = self.upvalues.get_mut(handle) {
            if !upvalue.is_marked {
                upvalue.is_marked = true;
                if let UpvalueState::Closed(value) = upvalue.state {
                    gray.push_back(value);
                }
            }
        }
    }

    pub fn collect_garbage(&mut self, mut roots: VecDeque<Value>) {
        log::debug!("-- gc begin ({} bytes)", self.total_allocated_bytes());

        // Native registrations live for the whole process; keep their
        // name strings regardless of what the globals table holds.
        for native in &self.native_functions {
            self.strings.mark(native.name);
        }

        self.trace_references(&mut roots);

        self.strings.sweep();
        self.upvalues.retain(|_, upvalue| {
            let keep = upvalue.is_marked;
            upvalue.is_marked = false;
            keep
        });
        self.closures.retain(|_, closure| {
            let keep = closure.is_marked;
            closure.is_marked = false;
            keep
        });
        self.functions.retain(|_, function| {
            let keep = function.is_marked;
            function.is_marked = false;
            keep
        });
        self.classes.retain(|_, class| {
            let keep = class.is_marked;
            class.is_marked = false;
            keep
        });
        self.instances.retain(|_, instance| {
            let keep = instance.is_marked;
            instance.is_marked = false;
            keep
        });
        self.bound_methods.retain(|_, bound| {
            let keep = bound.is_marked;
            bound.is_marked = false;
            keep
        });

        let live_bytes = self.total_allocated_bytes();
        self.bytes_until_gc = live_bytes * GC_HEAP_GROW_FACTOR;

        log::debug!(
            "-- gc end ({} bytes live, next collection at {})",
            live_bytes,
            self.bytes_until_gc
        );
    }

    fn trace_references(&mut self, gray: &mut VecDeque<Value>) {
        while let Some(value) = gray.pop_front() {
            match value {
                Value::String(handle) => self.strings.mark(handle),
                Value::NativeFunction(handle) => {
                    let name = self.native_functions[handle as usize].name;
                    self.strings.mark(name);
                }
                Value::Function(handle) => {
                    if let Some(function) = self.functions.get_mut(handle) {
                        if !function.is_marked {
                            function.is_marked = true;
                            gray.push_back(Value::String(function.name));
                            gray.extend(function.chunk.constants.iter().copied());
                        }
                    }
                }
                Value::Closure(handle) => {
                    if let Some(closure) = self.closures.get_mut(handle) {
                        if !closure.is_marked {
                            closure.is_marked = true;
                            gray.push_back(Value::Function(closure.function));
                            let upvalues = closure.upvalues.clone();
                            for upvalue_handle in upvalues {
                                self.mark_upvalue_root(upvalue_handle, gray);
                            }
                        }
                    }
                }
                Value::Class(handle) => {
                    if let Some(class) = self.classes.get_mut(handle) {
                        if !class.is_marked {
                            class.is_marked = true;
                            gray.push_back(Value::String(class.name));
                            for (key, _, method) in class.methods.iter() {
                                gray.push_back(Value::String(key));
                                gray.push_back(method);
                            }
                        }
                    }
                }
                Value::Instance(handle) => {
                    if let Some(instance) = self.instances.get_mut(handle) {
                        if !instance.is_marked {
                            instance.is_marked = true;
                            gray.push_back(Value::Class(instance.class));
                            for (key, _, field) in instance.fields.iter() {
                                gray.push_back(Value::String(key));
                                gray.push_back(field);
                            }
                        }
                    }
                }
                Value::BoundMethod(handle) => {
                    if let Some(bound) = self.bound_methods.get_mut(handle) {
                        if !bound.is_marked {
                            bound.is_marked = true;
                            gray.push_back(bound.receiver);
                            gray.push_back(Value::Closure(bound.method));
                        }
                    }
                }
                Value::Nil | Value::Boolean(_) | Value::Number(_) => {}
            }
        }
    }
}
