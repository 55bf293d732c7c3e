use crate::tests::{assert_runs, assert_runtime_error};

#[test]
fn classes_instantiate_and_hold_fields() {
    assert_runs(
        r#"
        class Box {}
        var box = Box();
        box.contents = "treasure";
        assert_eq(box.contents, "treasure", "field read");
        assert_eq(typeof(box), "instance", "instances have their own type");
        assert_eq(typeof(Box), "class", "classes have their own type");
    "#,
    );
}

#[test]
fn methods_bind_this() {
    assert_runs(
        r#"
        class Counter {
            bump() {
                this.count = this.count + 1;
                return this.count;
            }
        }
        var counter = Counter();
        counter.count = 0;
        assert_eq(counter.bump(), 1, "first bump");
        assert_eq(counter.bump(), 2, "second bump");
    "#,
    );
}

#[test]
fn initializers_run_and_return_the_instance() {
    assert_runs(
        r#"
        class Point {
            init(x, y) {
                this.x = x;
                this.y = y;
            }
            sum() { return this.x + this.y; }
        }
        var p = Point(3, 4);
        assert_eq(p.sum(), 7, "init stored fields");
        assert_eq(typeof(Point(0, 0)), "instance", "init returns the instance");
    "#,
    );
}

#[test]
fn initializer_with_bare_return_still_yields_the_instance() {
    assert_runs(
        r#"
        class Early {
            init(flag) {
                if (flag) return;
                this.reached = true;
            }
        }
        assert_eq(typeof(Early(true)), "instance", "bare return yields instance");
        assert(Early(false).reached, "fall-through path runs");
    "#,
    );
}

#[test]
fn init_arity_is_enforced() {
    assert_runtime_error(
        "class C { init(x) {} } C();",
        "Expected 1 arguments but got 0.",
    );
    assert_runtime_error("class D {} D(1);", "Expected 0 arguments but got 1.");
}

#[test]
fn bound_methods_are_first_class() {
    assert_runs(
        r#"
        class Greeter {
            init(name) { this.name = name; }
            greet() { return "hello " + this.name; }
        }
        var method = Greeter("world").greet;
        assert_eq(method(), "hello world", "receiver travels with the method");
    "#,
    );
}

#[test]
fn fields_shadow_methods() {
    assert_runs(
        r#"
        class Shadow {
            speak() { return "method"; }
        }
        fun replacement() { return "field"; }
        var s = Shadow();
        assert_eq(s.speak(), "method", "method before shadowing");
        s.speak = replacement;
        assert_eq(s.speak(), "field", "field wins after shadowing");
    "#,
    );
}

#[test]
fn undefined_properties_are_errors() {
    assert_runtime_error(
        "class C {} C().missing;",
        "Undefined property 'missing'.",
    );
    assert_runtime_error(
        "class C {} C().missing();",
        "Undefined property 'missing'.",
    );
}

#[test]
fn property_access_requires_instances() {
    assert_runtime_error("1 .x;", "Only instances have properties.");
    assert_runtime_error("\"s\".x = 1;", "Only instances have fields.");
    assert_runtime_error("true.m();", "Only instances have methods.");
}

#[test]
fn single_inheritance_copies_methods_down() {
    assert_runs(
        r#"
        class A {
            greet() { return "hi"; }
        }
        class B < A {}
        assert_eq(B().greet(), "hi", "inherited method");
    "#,
    );
}

#[test]
fn subclasses_override_inherited_methods() {
    assert_runs(
        r#"
        class Animal {
            speak() { return "..."; }
        }
        class Dog < Animal {
            speak() { return "woof"; }
        }
        assert_eq(Dog().speak(), "woof", "override wins");
        assert_eq(Animal().speak(), "...", "superclass unchanged");
    "#,
    );
}

#[test]
fn super_calls_resolve_on_the_superclass() {
    assert_runs(
        r#"
        class Base {
            describe() { return "base"; }
        }
        class Derived < Base {
            describe() { return super.describe() + "+derived"; }
        }
        assert_eq(Derived().describe(), "base+derived", "super invoke");
    "#,
    );
}

#[test]
fn super_methods_can_be_bound() {
    assert_runs(
        r#"
        class Base {
            name() { return "base"; }
        }
        class Derived < Base {
            grab() {
                var bound = super.name;
                return bound();
            }
        }
        assert_eq(Derived().grab(), "base", "super method as a value");
    "#,
    );
}

#[test]
fn super_skips_the_overriding_method() {
    assert_runs(
        r#"
        class A {
            method() { return "A"; }
        }
        class B < A {
            method() { return "B"; }
            test() { return super.method(); }
        }
        class C < B {}
        assert_eq(C().test(), "A", "super binds statically to A");
    "#,
    );
}

#[test]
fn inheriting_from_a_non_class_is_an_error() {
    assert_runtime_error(
        "var NotAClass = 1; class Sub < NotAClass {}",
        "Superclass must be a class.",
    );
}

#[test]
fn inherited_initializers_run_for_subclasses() {
    assert_runs(
        r#"
        class Base {
            init(x) { this.x = x; }
        }
        class Sub < Base {}
        assert_eq(Sub(9).x, 9, "inherited init");
    "#,
    );
}

#[test]
fn methods_close_over_class_scope() {
    assert_runs(
        r#"
        fun make_class(tag) {
            class Tagged {
                tag() { return tag; }
            }
            return Tagged;
        }
        var T = make_class("label");
        assert_eq(T().tag(), "label", "method captures enclosing local");
    "#,
    );
}
