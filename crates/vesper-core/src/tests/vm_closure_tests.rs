use crate::tests::assert_runs;

#[test]
fn closures_capture_and_mutate_enclosing_locals() {
    assert_runs(
        r#"
        fun mk() {
            var x = 1;
            fun g() {
                x = x + 1;
                return x;
            }
            return g;
        }
        var f = mk();
        assert_eq(f(), 2, "first call");
        assert_eq(f(), 3, "state persists across calls");
    "#,
    );
}

#[test]
fn two_closures_share_one_upvalue() {
    assert_runs(
        r#"
        var set;
        var get;
        {
            var x = "initial";
            fun setter() { x = "updated"; }
            fun getter() { return x; }
            set = setter;
            get = getter;
        }
        assert_eq(get(), "initial", "closed value visible");
        set();
        assert_eq(get(), "updated", "closures share the variable");
    "#,
    );
}

#[test]
fn open_upvalues_observe_the_stack_slot() {
    assert_runs(
        r#"
        var observed;
        fun outer() {
            var x = 1;
            fun peek() { return x; }
            x = 2;
            observed = peek();
        }
        outer();
        assert_eq(observed, 2, "open upvalue reads through to the slot");
    "#,
    );
}

#[test]
fn closing_freezes_the_last_seen_value() {
    assert_runs(
        r#"
        var first;
        var second;
        fun capture_in_loop() {
            for (var i = 0; i < 2; i = i + 1) {
                var value = i;
                fun snapshot() { return value; }
                if (i == 0) { first = snapshot; } else { second = snapshot; }
            }
        }
        capture_in_loop();
        assert_eq(first(), 0, "first iteration's value");
        assert_eq(second(), 1, "second iteration's value");
    "#,
    );
}

#[test]
fn nested_closures_capture_through_intermediates() {
    assert_runs(
        r#"
        fun level1(a) {
            fun level2(b) {
                fun level3(c) {
                    return a + b + c;
                }
                return level3;
            }
            return level2;
        }
        assert_eq(level1(2)(3)(4), 9, "captures across two levels");
    "#,
    );
}

#[test]
fn sibling_closures_get_distinct_upvalue_indices() {
    assert_runs(
        r#"
        fun make() {
            var a = 10;
            var b = 20;
            fun sum() { return a + b; }
            fun diff() { return b - a; }
            a = 11;
            return sum() + diff();
        }
        assert_eq(make(), 40, "both variables resolved correctly");
    "#,
    );
}

#[test]
fn upvalue_assignment_after_close() {
    assert_runs(
        r#"
        fun counter() {
            var count = 0;
            fun increment() {
                count = count + 1;
                return count;
            }
            return increment;
        }
        var a = counter();
        var b = counter();
        a(); a(); a();
        b();
        assert_eq(a(), 4, "counters are independent");
        assert_eq(b(), 2, "second counter unaffected");
    "#,
    );
}

#[test]
fn block_exit_closes_only_its_own_locals() {
    assert_runs(
        r#"
        var captured;
        fun outer() {
            var kept = "kept";
            {
                var inner = "inner";
                fun grab() { return inner + "/" + kept; }
                captured = grab;
            }
            return kept;
        }
        outer();
        assert_eq(captured(), "inner/kept", "both captures survive");
    "#,
    );
}
