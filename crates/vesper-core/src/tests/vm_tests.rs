use crate::{
    tests::{assert_runs, assert_runtime_error, compile_source, run_source},
    Value,
};

#[test]
fn arithmetic_precedence() {
    assert_runs(r#"assert_eq(1 + 2 * 3, 7, "precedence");"#);
    assert_runs(r#"assert_eq((1 + 2) * 3, 9, "grouping");"#);
    assert_runs(r#"assert_eq(10 - 4 / 2, 8, "division binds tighter");"#);
    assert_runs(r#"assert_eq(-3 * -2, 6, "unary minus");"#);
}

#[test]
fn comparison_and_equality() {
    assert_runs(
        r#"
        assert(1 < 2, "less");
        assert(2 > 1, "greater");
        assert(1 <= 1, "less equal");
        assert(2 >= 2, "greater equal");
        assert(1 == 1, "number equality");
        assert(1 != 2, "number inequality");
        assert(nil == nil, "nil equality");
        assert(true != false, "boolean inequality");
        assert(!(1 == "1"), "no cross-type equality");
    "#,
    );
}

#[test]
fn string_concatenation_interns_results() {
    assert_runs(
        r#"
        var a = "st";
        var b = "r";
        assert_eq(a + b + "ing", "string", "concatenation");
    "#,
    );
}

#[test]
fn truthiness() {
    assert_runs(
        r#"
        assert(!nil, "nil is falsy");
        assert(!false, "false is falsy");
        assert(0, "zero is truthy");
        assert("", "empty string is truthy");
    "#,
    );
}

#[test]
fn print_statement_runs() {
    assert_runs(r#"print 1 + 2 * 3;"#);
    assert_runs(r#"print "string"; print nil; print true;"#);
}

#[test]
fn global_variables() {
    let mut vm = assert_runs(
        r#"
        var answer = 42;
        var answer_copy = answer;
        answer = answer + 1;
    "#,
    );

    assert_eq!(vm.get_global("answer"), Some(Value::Number(43.0)));
    assert_eq!(vm.get_global("answer_copy"), Some(Value::Number(42.0)));
}

#[test]
fn redefining_a_global_overwrites_it() {
    let mut vm = assert_runs(
        r#"
        var x = 1;
        var x = "replaced";
    "#,
    );

    let value = vm.get_global("x").expect("x should exist");
    let rendered = value.to_display_string(&vm.alloc);
    assert_eq!(rendered, "replaced");
}

#[test]
fn undefined_global_reads_are_errors() {
    assert_runtime_error("print missing;", "Undefined variable 'missing'.");
}

#[test]
fn assigning_an_undefined_global_is_an_error_without_side_effect() {
    let (mut vm, program) = compile_source("missing = 1;").expect("should compile");
    let error = vm.interpret(program).expect_err("should fail");

    assert!(error.message.contains("Undefined variable 'missing'."));
    assert_eq!(vm.get_global("missing"), None);
}

#[test]
fn local_scoping_and_shadowing() {
    assert_runs(
        r#"
        var x = "global";
        {
            var x = "outer";
            {
                var x = "inner";
                assert_eq(x, "inner", "innermost shadow");
            }
            assert_eq(x, "outer", "outer shadow");
        }
        assert_eq(x, "global", "global untouched");
    "#,
    );
}

#[test]
fn if_else_branches() {
    assert_runs(
        r#"
        var result = "none";
        if (1 < 2) { result = "then"; } else { result = "else"; }
        assert_eq(result, "then", "then branch");
        if (1 > 2) { result = "then"; } else { result = "else"; }
        assert_eq(result, "else", "else branch");
    "#,
    );
}

#[test]
fn logical_operators_short_circuit() {
    assert_runs(
        r#"
        assert_eq(nil and explode(), nil, "and keeps falsy left");
        assert_eq(false or "right", "right", "or falls through");
        assert_eq(1 and 2, 2, "and yields right when truthy");
        assert_eq("left" or explode(), "left", "or keeps truthy left");
    "#,
    );
}

#[test]
fn while_loops() {
    assert_runs(
        r#"
        var sum = 0;
        var i = 0;
        while (i < 10) {
            sum = sum + i;
            i = i + 1;
        }
        assert_eq(sum, 45, "while sum");
    "#,
    );
}

#[test]
fn for_loops() {
    assert_runs(
        r#"
        var sum = 0;
        for (var i = 0; i < 10; i = i + 1) {
            sum = sum + i;
        }
        assert_eq(sum, 45, "for sum");
    "#,
    );
}

#[test]
fn for_loop_clauses_are_optional() {
    assert_runs(
        r#"
        var i = 0;
        for (; i < 3;) { i = i + 1; }
        assert_eq(i, 3, "no initializer or increment");
    "#,
    );
}

#[test]
fn functions_and_returns() {
    assert_runs(
        r#"
        fun add(a, b) { return a + b; }
        fun nothing() {}
        assert_eq(add(2, 3), 5, "return value");
        assert_eq(nothing(), nil, "implicit return");
    "#,
    );
}

#[test]
fn recursion() {
    assert_runs(
        r#"
        fun fib(n) {
            if (n < 2) return n;
            return fib(n - 1) + fib(n - 2);
        }
        assert_eq(fib(10), 55, "fibonacci");
    "#,
    );
}

#[test]
fn arity_mismatch_is_an_error() {
    assert_runtime_error(
        "fun f(a, b) {} f(1);",
        "Expected 2 arguments but got 1.",
    );
}

#[test]
fn calling_a_non_callable_is_an_error() {
    assert_runtime_error("var x = 1; x();", "Can only call functions and classes.");
    assert_runtime_error("\"text\"();", "Can only call functions and classes.");
}

#[test]
fn deep_recursion_overflows_the_frame_stack() {
    assert_runtime_error("fun f() { f(); } f();", "Stack overflow.");
}

#[test]
fn negating_a_non_number_is_an_error() {
    assert_runtime_error("-\"text\";", "Operand must be a number.");
}

#[test]
fn adding_mixed_types_is_an_error() {
    assert_runtime_error(
        "1 + \"one\";",
        "Operands must be two numbers or two strings.",
    );
}

#[test]
fn comparing_non_numbers_is_an_error() {
    assert_runtime_error("\"a\" < \"b\";", "Operands must be numbers.");
}

#[test]
fn runtime_errors_carry_a_stack_trace() {
    let error = run_source(
        r#"
        fun inner() { return -"boom"; }
        fun outer() { return inner(); }
        outer();
    "#,
    )
    .expect_err("should fail");

    assert!(error.message.contains("Operand must be a number."));
    assert!(error.stack_trace.len() >= 3, "trace: {:?}", error.stack_trace);

    let rendered = error.to_string();
    let inner_at = rendered.find("in inner").expect("inner frame");
    let script_at = rendered.find("in (script)").expect("script frame");
    assert!(inner_at < script_at, "innermost frame should come first");
}

#[test]
fn native_functions() {
    assert_runs(
        r#"
        assert_eq(typeof(1), "number", "typeof number");
        assert_eq(typeof("s"), "string", "typeof string");
        assert_eq(typeof(nil), "nil", "typeof nil");
        assert_eq(typeof(typeof), "function", "typeof native");
        assert_eq(to_string(7), "7", "numbers are trimmed");
        assert_eq(to_string(3.25), "3.25", "fractions keep digits");
        assert(typeof(clock()) == "number", "clock yields a number");
    "#,
    );
}

#[test]
fn native_arity_is_checked() {
    assert_runtime_error("clock(1);", "Expected 0 arguments but got 1.");
}

#[test]
fn statements_leave_the_stack_neutral() {
    // A long statement sequence would corrupt later slots if any
    // statement leaked values; the final assertions still see a
    // consistent world.
    assert_runs(
        r#"
        var a = 1;
        a + 2 * 3 - 4;
        !a;
        "side" + "effect";
        if (a) { a = a + 1; }
        while (a < 10) { a = a + 1; }
        for (var i = 0; i < 3; i = i + 1) { a = a + i; }
        assert_eq(a, 13, "statements are stack neutral");
    "#,
    );
}
