use std::time::Instant;

use once_cell::sync::Lazy;

use crate::{error::NativeFunctionError, memory::HeapAllocator, Value};

static CLOCK_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Seconds elapsed since the process first consulted the clock.
pub fn vesper_clock(
    _args: &[Value],
    _allocator: &mut HeapAllocator,
) -> Result<Value, NativeFunctionError> {
    Ok(Value::Number(CLOCK_EPOCH.elapsed().as_secs_f64()))
}

pub fn vesper_assert(
    args: &[Value],
    allocator: &mut HeapAllocator,
) -> Result<Value, NativeFunctionError> {
    if args[0].is_truthy() {
        Ok(Value::Nil)
    } else {
        Err(NativeFunctionError(format!(
            "Assertion failed: {}",
            args[1].to_display_string(allocator)
        )))
    }
}

pub fn vesper_assert_eq(
    args: &[Value],
    allocator: &mut HeapAllocator,
) -> Result<Value, NativeFunctionError> {
    if args[0] == args[1] {
        Ok(Value::Nil)
    } else {
        Err(NativeFunctionError(format!(
            "Assertion failed: {} (expected {} but got {})",
            args[2].to_display_string(allocator),
            args[1].to_display_string(allocator),
            args[0].to_display_string(allocator)
        )))
    }
}

pub fn vesper_to_string(
    args: &[Value],
    allocator: &mut HeapAllocator,
) -> Result<Value, NativeFunctionError> {
    let rendered = args[0].to_display_string(allocator);
    let handle = allocator.strings.intern(&rendered);
    Ok(Value::String(handle))
}

pub fn vesper_typeof(
    args: &[Value],
    allocator: &mut HeapAllocator,
) -> Result<Value, NativeFunctionError> {
    let handle = allocator.strings.intern(args[0].to_type_string());
    Ok(Value::String(handle))
}
