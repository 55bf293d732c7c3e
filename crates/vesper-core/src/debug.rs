use crate::{
    backend::chunk::{Chunk, OpCode},
    memory::HeapAllocator,
    Value,
};

pub fn disassemble_chunk(chunk: &Chunk, allocator: &HeapAllocator, name: &str) {
    println!("== {} ==", name);

    let mut offset = 0;

    while offset < chunk.code.len() {
        offset = disassemble_instruction(chunk, allocator, offset);
    }
}

pub fn disassemble_instruction(chunk: &Chunk, allocator: &HeapAllocator, offset: usize) -> usize {
    print!("{:04} ", offset);

    if offset > 0 && chunk.locs[offset].line == chunk.locs[offset - 1].line {
        print!("   | ");
    } else {
        print!("{:04} ", chunk.locs[offset].line);
    }

    let opcode = OpCode::from(chunk.code[offset]);

    match opcode {
        OpCode::Constant => constant_instruction("OP_CONSTANT", chunk, allocator, offset),
        OpCode::Nil => simple_instruction("OP_NIL", offset),
        OpCode::True => simple_instruction("OP_TRUE", offset),
        OpCode::False => simple_instruction("OP_FALSE", offset),
        OpCode::Pop => simple_instruction("OP_POP", offset),
        OpCode::GetLocal => byte_instruction("OP_GET_LOCAL", chunk, offset),
        OpCode::SetLocal => byte_instruction("OP_SET_LOCAL", chunk, offset),
        OpCode::GetGlobal => constant_instruction("OP_GET_GLOBAL", chunk, allocator, offset),
        OpCode::DefineGlobal => constant_instruction("OP_DEFINE_GLOBAL", chunk, allocator, offset),
        OpCode::SetGlobal => constant_instruction("OP_SET_GLOBAL", chunk, allocator, offset),
        OpCode::GetUpvalue => byte_instruction("OP_GET_UPVALUE", chunk, offset),
        OpCode::SetUpvalue => byte_instruction("OP_SET_UPVALUE", chunk, offset),
        OpCode::GetProperty => constant_instruction("OP_GET_PROPERTY", chunk, allocator, offset),
        OpCode::SetProperty => constant_instruction("OP_SET_PROPERTY", chunk, allocator, offset),
        OpCode::GetSuper => constant_instruction("OP_GET_SUPER", chunk, allocator, offset),
        OpCode::Equal => simple_instruction("OP_EQUAL", offset),
        OpCode::Greater => simple_instruction("OP_GREATER", offset),
        OpCode::Less => simple_instruction("OP_LESS", offset),
        OpCode::Add => simple_instruction("OP_ADD", offset),
        OpCode::Subtract => simple_instruction("OP_SUBTRACT", offset),
        OpCode::Multiply => simple_instruction("OP_MULTIPLY", offset),
        OpCode::Divide => simple_instruction("OP_DIVIDE", offset),
        OpCode::Not => simple_instruction("OP_NOT", offset),
        OpCode::Negate => simple_instruction("OP_NEGATE", offset),
        OpCode::Print => simple_instruction("OP_PRINT", offset),
        OpCode::Jump => jump_instruction("OP_JUMP", 1, chunk, offset),
        OpCode::JumpIfFalse => jump_instruction("OP_JUMP_IF_FALSE", 1, chunk, offset),
        OpCode::Loop => jump_instruction("OP_LOOP", -1, chunk, offset),
        OpCode::Call => byte_instruction("OP_CALL", chunk, offset),
        OpCode::Invoke => invoke_instruction("OP_INVOKE", chunk, allocator, offset),
        OpCode::SuperInvoke => invoke_instruction("OP_SUPER_INVOKE", chunk, allocator, offset),
        OpCode::Closure => closure_instruction(chunk, allocator, offset),
        OpCode::CloseUpvalue => simple_instruction("OP_CLOSE_UPVALUE", offset),
        OpCode::Return => simple_instruction("OP_RETURN", offset),
        OpCode::Class => constant_instruction("OP_CLASS", chunk, allocator, offset),
        OpCode::Inherit => simple_instruction("OP_INHERIT", offset),
        OpCode::Method => constant_instruction("OP_METHOD", chunk, allocator, offset),
    }
}

fn simple_instruction(name: &str, offset: usize) -> usize {
    println!("{}", name);
    offset + 1
}

fn byte_instruction(name: &str, chunk: &Chunk, offset: usize) -> usize {
    let slot = chunk.code[offset + 1];
    println!("{:<16} {:4}", name, slot);
    offset + 2
}

fn constant_instruction(
    name: &str,
    chunk: &Chunk,
    allocator: &HeapAllocator,
    offset: usize,
) -> usize {
    let constant = chunk.code[offset + 1] as usize;
    let value = chunk
        .constants
        .get(constant)
        .copied()
        .unwrap_or_default()
        .to_display_string(allocator);
    println!("{:<16} {:4} '{}'", name, constant, value);
    offset + 2
}

fn jump_instruction(name: &str, sign: i32, chunk: &Chunk, offset: usize) -> usize {
    let jump = ((chunk.code[offset + 1] as u16) << 8) | (chunk.code[offset + 2] as u16);
    let target = offset as i32 + 3 + sign * (jump as i32);
    println!("{:<16} {:4} -> {}", name, offset, target);
    offset + 3
}

fn invoke_instruction(
    name: &str,
    chunk: &Chunk,
    allocator: &HeapAllocator,
    offset: usize,
) -> usize {
    let constant = chunk.code[offset + 1];
    let arg_count = chunk.code[offset + 2];
    let value = chunk
        .constants
        .get(constant as usize)
        .copied()
        .unwrap_or_default()
        .to_display_string(allocator);
    println!("{:<16} ({} args) {:4} '{}'", name, arg_count, constant, value);
    offset + 3
}

fn closure_instruction(chunk: &Chunk, allocator: &HeapAllocator, offset: usize) -> usize {
    let mut offset = offset + 1;
    let constant = chunk.code[offset];
    offset += 1;

    let value = chunk.constants[constant as usize];
    println!(
        "{:<16} {:4} '{}'",
        "OP_CLOSURE",
        constant,
        value.to_display_string(allocator)
    );

    if let Value::Function(handle) = value {
        let function = allocator.get_function(handle);
        for _ in 0..function.upvalue_count {
            let is_local = chunk.code[offset];
            let index = chunk.code[offset + 1];
            offset += 2;

            println!(
                "{:04}      |                     {} {}",
                offset - 2,
                if is_local != 0 { "local" } else { "upvalue" },
                index
            );
        }
    }

    offset
}

pub fn disassemble_program(allocator: &HeapAllocator) {
    println!("=== PROGRAM DISASSEMBLY ===");
    println!();

    for (_, function) in allocator.iter_functions() {
        let name = allocator.strings.get_string(function.name);
        println!("fn {} (arity {}):", name, function.arity);
        disassemble_chunk(&function.chunk, allocator, name);
        println!();
    }
}
