use std::fs;

use bryony::{
    diagnostics::{BryonyError, ErrorKind},
    runtime::Runtime,
    value::Value,
};
use tempfile::tempdir;

fn eval(source: &str) -> Value {
    let mut runtime = Runtime::new(".", false);
    let module = runtime.scratch_module("<test>");
    runtime
        .eval_in(module, source, "<test>")
        .expect("evaluation should succeed")
}

fn eval_error(source: &str) -> BryonyError {
    let mut runtime = Runtime::new(".", false);
    let module = runtime.scratch_module("<test>");
    match runtime.eval_in(module, source, "<test>") {
        Ok(value) => panic!("expected error, received value {value}"),
        Err(err) => err,
    }
}

fn error_kind(source: &str) -> ErrorKind {
    eval_error(source).kind().expect("diagnostic error")
}

fn expect_int(value: &Value) -> i64 {
    match value {
        Value::Int(n) => *n,
        _ => panic!("expected Int, found {}", value.type_name()),
    }
}

fn expect_float(value: &Value) -> f64 {
    match value {
        Value::Float(f) => *f,
        _ => panic!("expected Float, found {}", value.type_name()),
    }
}

fn expect_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        _ => panic!("expected Bool, found {}", value.type_name()),
    }
}

fn expect_str(value: &Value) -> String {
    match value {
        Value::Str(s) => s.to_string(),
        _ => panic!("expected Str, found {}", value.type_name()),
    }
}

#[test]
fn evaluates_basic_arithmetic() {
    let value = eval("1 + 2 * 3;");
    assert_eq!(expect_int(&value), 7);
}

#[test]
fn division_is_always_float() {
    assert_eq!(expect_float(&eval("7 / 2;")), 3.5);
    assert_eq!(expect_float(&eval("4 / 2;")), 2.0);
}

#[test]
fn modulo_is_floored() {
    assert_eq!(expect_int(&eval("7 % 2;")), 1);
    assert_eq!(expect_int(&eval("-7 % 2;")), 1);
    assert_eq!(expect_int(&eval("7 % -2;")), -1);
}

#[test]
fn modulo_requires_ints() {
    assert_eq!(error_kind("7.0 % 2;"), ErrorKind::Type);
}

#[test]
fn division_and_modulo_by_zero() {
    assert_eq!(error_kind("1 / 0;"), ErrorKind::Range);
    assert_eq!(error_kind("1.5 / 0;"), ErrorKind::Range);
    assert_eq!(error_kind("1 % 0;"), ErrorKind::Range);
}

#[test]
fn plus_concatenates_when_either_side_is_string() {
    assert_eq!(expect_str(&eval(r#""a" + 1;"#)), "a1");
    assert_eq!(expect_str(&eval(r#"1 + "a";"#)), "1a");
    assert_eq!(expect_str(&eval(r#""x" + null;"#)), "xnull");
}

#[test]
fn floats_always_display_a_decimal_point() {
    assert_eq!(expect_str(&eval("str(4 / 2);")), "2.0");
    assert_eq!(expect_str(&eval("str(2.5);")), "2.5");
}

#[test]
fn comparisons_cover_numbers_and_strings() {
    assert!(expect_bool(&eval("1 < 2.5;")));
    assert!(expect_bool(&eval(r#""apple" < "banana";"#)));
    assert_eq!(error_kind(r#"1 < "a";"#), ErrorKind::Type);
}

#[test]
fn equality_is_structural() {
    assert!(expect_bool(&eval("1 == 1.0;")));
    assert!(!expect_bool(&eval("true == 1;")));
    assert!(expect_bool(&eval("[1, [2]] == [1, [2]];")));
    assert!(expect_bool(&eval(r#"{"a": 1} == {"a": 1};"#)));
    assert!(!expect_bool(&eval(r#"{"a": 1} == {"a": 2};"#)));
    assert!(expect_bool(&eval(r#"1 != "1";"#)));
}

#[test]
fn truthiness_of_empty_values() {
    assert!(expect_bool(&eval("!0;")));
    assert!(expect_bool(&eval("!0.0;")));
    assert!(expect_bool(&eval(r#"!"";"#)));
    assert!(expect_bool(&eval("![];")));
    assert!(expect_bool(&eval("!{};")));
    assert!(expect_bool(&eval("!null;")));
    assert!(expect_bool(&eval("!false;")));
    assert!(!expect_bool(&eval("!1;")));
    assert!(!expect_bool(&eval(r#"!"0";"#)));
    assert!(!expect_bool(&eval("![0];")));
}

#[test]
fn logic_operators_return_operands() {
    assert_eq!(expect_str(&eval(r#"0 or "fallback";"#)), "fallback");
    assert_eq!(expect_int(&eval("1 and 2;")), 2);
    // The right side must not be evaluated when short-circuiting.
    assert_eq!(expect_int(&eval("0 and missing();")), 0);
    assert_eq!(expect_int(&eval("3 or missing();")), 3);
}

#[test]
fn unary_operators() {
    assert_eq!(expect_int(&eval("-(2 + 3);")), -5);
    assert_eq!(expect_float(&eval("-1.5;")), -1.5);
    assert_eq!(error_kind(r#"-"a";"#), ErrorKind::Type);
}

#[test]
fn functions_update_module_level_bindings() {
    let value = eval(
        r#"
        let count = 0;
        fn bump() {
            count = count + 1;
        }
        bump();
        bump();
        count;
        "#,
    );
    assert_eq!(expect_int(&value), 2);
}

#[test]
fn function_locals_shadow_module_bindings() {
    let value = eval(
        r#"
        let x = 1;
        fn f() {
            let x = 10;
            x = 20;
            return x;
        }
        f() + x;
        "#,
    );
    assert_eq!(expect_int(&value), 21);
}

#[test]
fn functions_may_call_later_definitions() {
    let value = eval(
        r#"
        fn first() {
            return second() + 1;
        }
        fn second() {
            return 4;
        }
        first();
        "#,
    );
    assert_eq!(expect_int(&value), 5);
}

#[test]
fn recursion_works_and_runaway_recursion_is_caught() {
    let value = eval(
        r#"
        fn fact(n) {
            if n <= 1 {
                return 1;
            }
            return n * fact(n - 1);
        }
        fact(10);
        "#,
    );
    assert_eq!(expect_int(&value), 3_628_800);

    // Recursion well below the limit must still run to completion.
    let deep = eval(
        r#"
        fn down(n) {
            if n == 0 {
                return 0;
            }
            return down(n - 1);
        }
        down(50);
        "#,
    );
    assert_eq!(expect_int(&deep), 0);

    let err = eval_error(
        r#"
        fn spin() {
            return spin();
        }
        spin();
        "#,
    );
    assert_eq!(err.kind(), Some(ErrorKind::Range));
    assert!(err.to_string().contains("Recursion depth"));
}

#[test]
fn for_range_iterates_exclusive_end() {
    let value = eval(
        r#"
        let total = 0;
        for i in range(0, 5) {
            total = total + i;
        }
        total;
        "#,
    );
    assert_eq!(expect_int(&value), 10);
}

#[test]
fn break_and_continue_in_loops() {
    let value = eval(
        r#"
        let total = 0;
        for i in range(0, 10) {
            if i == 3 {
                continue;
            }
            if i == 6 {
                break;
            }
            total = total + i;
        }
        total;
        "#,
    );
    assert_eq!(expect_int(&value), 0 + 1 + 2 + 4 + 5);
}

#[test]
fn while_loop_with_break() {
    let value = eval(
        r#"
        let n = 0;
        while true {
            n = n + 1;
            if n == 7 {
                break;
            }
        }
        n;
        "#,
    );
    assert_eq!(expect_int(&value), 7);
}

#[test]
fn loop_control_outside_a_loop_is_an_error() {
    assert_eq!(error_kind("break;"), ErrorKind::Range);
    assert_eq!(error_kind("continue;"), ErrorKind::Range);
    assert_eq!(error_kind("return 1;"), ErrorKind::Range);
}

#[test]
fn list_reads_past_the_end_yield_null() {
    assert!(expect_bool(&eval("[1, 2][5] == null;")));
    assert!(expect_bool(&eval("[1, 2][-1] == null;")));
    assert_eq!(expect_int(&eval("[1, 2][1];")), 2);
}

#[test]
fn list_writes_past_the_end_are_errors() {
    let err = eval_error(
        r#"
        let xs = [1, 2];
        xs[5] = 9;
        "#,
    );
    assert_eq!(err.kind(), Some(ErrorKind::Range));
}

#[test]
fn lists_share_storage_through_aliases() {
    let value = eval(
        r#"
        let a = [1, 2];
        let b = a;
        push(b, 3);
        len(a);
        "#,
    );
    assert_eq!(expect_int(&value), 3);
}

#[test]
fn maps_insert_on_write_and_null_on_missing() {
    let value = eval(
        r#"
        let m = {"a": 1};
        m["b"] = 2;
        m["b"];
        "#,
    );
    assert_eq!(expect_int(&value), 2);
    assert!(expect_bool(&eval(r#"{"a": 1}["zzz"] == null;"#)));
    assert_eq!(error_kind(r#"{"a": 1}[true];"#), ErrorKind::Type);
}

#[test]
fn map_keys_preserve_insertion_order() {
    let value = eval(
        r#"
        let m = {"b": 1, "a": 2};
        m["c"] = 3;
        let out = "";
        for i in range(0, len(m)) {
            out = out + keys(m)[i];
        }
        out;
        "#,
    );
    assert_eq!(expect_str(&value), "bac");
}

#[test]
fn has_and_pop_builtins() {
    assert!(expect_bool(&eval(r#"has({"a": 1}, "a");"#)));
    assert!(!expect_bool(&eval(r#"has({"a": 1}, "b");"#)));
    assert!(!expect_bool(&eval(r#"has({"a": 1}, 1);"#)));
    assert!(expect_bool(&eval("pop([]) == null;")));
    assert_eq!(expect_int(&eval("pop([1, 2, 3]);")), 3);
}

#[test]
fn num_parses_ints_and_floats() {
    assert_eq!(expect_int(&eval(r#"num("42");"#)), 42);
    assert_eq!(expect_float(&eval(r#"num("2.5");"#)), 2.5);
    assert_eq!(expect_float(&eval(r#"num("1e3");"#)), 1000.0);
    assert_eq!(error_kind(r#"num("forty");"#), ErrorKind::Type);
    assert_eq!(error_kind(r#"num("99999999999999999999");"#), ErrorKind::Type);
    assert_eq!(error_kind(r#"num("1.2.3");"#), ErrorKind::Type);
}

#[test]
fn min_max_clamp_return_original_operands() {
    assert_eq!(expect_int(&eval("min(1, 2.5);")), 1);
    assert_eq!(expect_float(&eval("max(1, 2.5);")), 2.5);
    // Equal operands resolve to the second one.
    assert_eq!(expect_str(&eval("str(min(1, 1.0));")), "1.0");
    assert_eq!(expect_int(&eval("max(2.0, 2);")), 2);
    assert_eq!(expect_int(&eval("clamp(5, 0, 10);")), 5);
    assert_eq!(expect_int(&eval("clamp(-3, 0, 10);")), 0);
    assert_eq!(expect_int(&eval("clamp(99, 0, 10);")), 10);
    assert_eq!(expect_int(&eval("floor(2.9);")), 2);
    assert_eq!(expect_int(&eval("abs(-4);")), 4);
}

#[test]
fn rng_is_deterministic_per_seed() {
    let value = eval(
        r#"
        rng_seed(42);
        let a = rng_int(1, 1000);
        let b = rng_int(1, 1000);
        rng_seed(42);
        let c = rng_int(1, 1000);
        let d = rng_int(1, 1000);
        a == c and b == d;
        "#,
    );
    assert!(expect_bool(&value));
}

#[test]
fn rng_int_is_inclusive_and_rejects_empty_ranges() {
    let value = eval(
        r#"
        rng_seed(7);
        let ok = true;
        for i in range(0, 200) {
            let n = rng_int(1, 3);
            if n < 1 or n > 3 {
                ok = false;
            }
        }
        ok;
        "#,
    );
    assert!(expect_bool(&value));
    assert_eq!(error_kind("rng_int(5, 1);"), ErrorKind::Range);
}

#[test]
fn rng_float_stays_in_unit_interval() {
    let value = eval(
        r#"
        rng_seed(3);
        let ok = true;
        for i in range(0, 200) {
            let f = rng_float();
            if f < 0.0 or f >= 1.0 {
                ok = false;
            }
        }
        ok;
        "#,
    );
    assert!(expect_bool(&value));
}

#[test]
fn rng_choice_handles_empty_and_non_lists() {
    assert!(expect_bool(&eval("rng_choice([]) == null;")));
    assert!(expect_bool(&eval("rng_choice(5) == null;")));
    assert_eq!(expect_int(&eval("rng_choice([9]);")), 9);
}

#[test]
fn emit_event_feeds_the_host_sink() {
    let mut runtime = Runtime::new(".", false);
    let module = runtime.scratch_module("<test>");
    runtime
        .eval_in(
            module,
            r#"
            emit_event("battle", {"attacker": "red", "losses": 3});
            emit_event("tick", 1);
            "#,
            "<test>",
        )
        .expect("evaluation should succeed");
    let events = runtime.drain_events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].tag, "battle");
    assert_eq!(events[1].tag, "tick");
    assert_eq!(expect_int(&events[1].payload), 1);
    assert!(runtime.drain_events().is_empty());
}

#[test]
fn host_can_call_script_functions() {
    let mut runtime = Runtime::new(".", false);
    let module = runtime.scratch_module("<test>");
    runtime
        .eval_in(
            module,
            r#"
            fn add(a, b) {
                return a + b;
            }
            "#,
            "<test>",
        )
        .expect("evaluation should succeed");
    let value = runtime
        .call(module, "add", vec![Value::Int(2), Value::Int(3)])
        .expect("call should succeed");
    assert_eq!(expect_int(&value), 5);

    let err = runtime
        .call(module, "nope", vec![])
        .expect_err("missing function");
    assert_eq!(err.kind(), Some(ErrorKind::Name));
}

#[test]
fn host_reseed_reproduces_sequences() {
    let mut runtime = Runtime::new(".", false);
    let module = runtime.scratch_module("<test>");
    runtime.reseed(99);
    let first = runtime
        .eval_in(module, "rng_int(0, 1000000);", "<test>")
        .expect("evaluation should succeed");
    runtime.reseed(99);
    let second = runtime
        .eval_in(module, "rng_int(0, 1000000);", "<test>")
        .expect("evaluation should succeed");
    assert!(first.equals(&second));
}

#[test]
fn undefined_variable_is_a_name_error() {
    assert_eq!(error_kind("ghost;"), ErrorKind::Name);
}

#[test]
fn calling_a_non_function_is_a_type_error() {
    assert_eq!(
        error_kind(
            r#"
            let x = 1;
            x();
            "#
        ),
        ErrorKind::Type
    );
}

#[test]
fn arity_mismatches_are_errors() {
    let err = eval_error(
        r#"
        fn f(a) {
            return a;
        }
        f();
        "#,
    );
    assert_eq!(err.kind(), Some(ErrorKind::Range));
    assert_eq!(error_kind("len();"), ErrorKind::Range);
}

#[test]
fn lexer_rejects_unknown_escapes_and_characters() {
    assert_eq!(error_kind(r#"let s = "\q";"#), ErrorKind::Lex);
    assert_eq!(error_kind("let x = 1 $ 2;"), ErrorKind::Lex);
}

#[test]
fn string_escapes_decode() {
    assert_eq!(expect_int(&eval(r#"len("a\nb");"#)), 3);
    assert_eq!(expect_str(&eval(r#""say \"hi\"";"#)), "say \"hi\"");
    assert_eq!(expect_int(&eval(r#"len("\\");"#)), 1);
}

#[test]
fn trailing_dot_is_not_a_float() {
    // `1.` lexes as the integer 1 followed by a stray dot, which no
    // grammar production accepts.
    assert_eq!(error_kind("let x = 1.;"), ErrorKind::Parse);
    assert_eq!(expect_float(&eval("1.5;")), 1.5);
}

#[test]
fn overflowing_int_literal_is_a_lex_error() {
    // One past i64::MAX must not quietly collapse to another value.
    let err = eval_error("9223372036854775808;");
    assert_eq!(err.kind(), Some(ErrorKind::Lex));
    assert!(err.to_string().contains("out of range"));
    assert_eq!(expect_int(&eval("9223372036854775807;")), i64::MAX);
}

#[test]
fn comments_run_to_end_of_line() {
    let value = eval(
        r#"
        # leading comment
        let x = 1; # trailing comment
        x + 1;
        "#,
    );
    assert_eq!(expect_int(&value), 2);
}

#[test]
fn diagnostics_carry_file_line_and_column() {
    let err = eval_error("let x = ;");
    let text = err.to_string();
    assert!(text.contains("<test>:1:9"), "unexpected rendering: {text}");
}

#[test]
fn modules_execute_once_despite_repeat_imports() {
    let dir = tempdir().expect("create temp dir");
    fs::write(
        dir.path().join("lib.bry"),
        r#"
        emit_event("loaded", "lib");
        let shared = 5;
        "#,
    )
    .expect("write lib");
    fs::write(
        dir.path().join("main.bry"),
        r#"
        import "lib.bry";
        import "lib.bry";
        let result = shared + 1;
        "#,
    )
    .expect("write main");

    let mut runtime = Runtime::new(dir.path(), false);
    let module = runtime.load_module("main.bry").expect("load main");
    assert_eq!(runtime.drain_events().len(), 1);
    let result = runtime.lookup(module, "result").expect("result binding");
    assert_eq!(expect_int(&result), 6);
}

#[test]
fn import_merge_keeps_first_definition() {
    let dir = tempdir().expect("create temp dir");
    fs::write(
        dir.path().join("lib.bry"),
        r#"
        let x = 99;
        let y = 7;
        "#,
    )
    .expect("write lib");
    fs::write(
        dir.path().join("main.bry"),
        r#"
        let x = 1;
        import "lib.bry";
        "#,
    )
    .expect("write main");

    let mut runtime = Runtime::new(dir.path(), false);
    let module = runtime.load_module("main.bry").expect("load main");
    assert_eq!(expect_int(&runtime.lookup(module, "x").expect("x")), 1);
    assert_eq!(expect_int(&runtime.lookup(module, "y").expect("y")), 7);
}

#[test]
fn cyclic_imports_observe_partial_namespaces() {
    let dir = tempdir().expect("create temp dir");
    fs::write(
        dir.path().join("a.bry"),
        r#"
        let marker_a = 1;
        import "b.bry";
        "#,
    )
    .expect("write a");
    fs::write(
        dir.path().join("b.bry"),
        r#"
        import "a.bry";
        let marker_b = marker_a + 1;
        "#,
    )
    .expect("write b");

    let mut runtime = Runtime::new(dir.path(), false);
    let module = runtime.load_module("a.bry").expect("load a");
    assert_eq!(
        expect_int(&runtime.lookup(module, "marker_b").expect("marker_b")),
        2
    );
}

#[test]
fn missing_module_is_a_module_error() {
    let dir = tempdir().expect("create temp dir");
    let mut runtime = Runtime::new(dir.path(), false);
    let err = runtime.load_module("ghost.bry").expect_err("missing file");
    assert_eq!(err.kind(), Some(ErrorKind::Module));
}

#[test]
fn normalized_paths_share_a_cache_entry() {
    let dir = tempdir().expect("create temp dir");
    fs::write(dir.path().join("lib.bry"), r#"emit_event("loaded", 1);"#)
        .expect("write lib");
    fs::write(
        dir.path().join("main.bry"),
        r#"
        import "lib.bry";
        import "./lib.bry";
        "#,
    )
    .expect("write main");

    let mut runtime = Runtime::new(dir.path(), false);
    runtime.load_module("main.bry").expect("load main");
    assert_eq!(runtime.drain_events().len(), 1);
}
