use std::io::{self, Write};

use letlox::Lox;

/// An output stream that rejects every write.
struct FailingWriter;

impl Write for FailingWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Other, "disk full"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn run(source: &str) -> (String, String, Lox<Vec<u8>, Vec<u8>>) {
    let mut lox = Lox::new(Vec::new(), Vec::new());
    lox.run(source);
    let out = String::from_utf8(lox.output().clone()).unwrap();
    let err = String::from_utf8(lox.diagnostics().clone()).unwrap();
    (out, err, lox)
}

/// Runs a program expected to succeed and returns its output.
fn output_of(source: &str) -> String {
    let (out, err, _) = run(source);
    assert_eq!(err, "", "unexpected diagnostics for {:?}", source);
    out
}

#[test]
fn test_number_printing_strips_integral_fraction() {
    assert_eq!(output_of("print 6.0; print 6.5; print 10 / 4; print -0.5;"), "6\n6.5\n2.5\n-0.5\n");
}

#[test]
fn test_print_stringification() {
    assert_eq!(
        output_of("print nil; print true; print \"hi\"; fun f() {} print f; print clock;"),
        "nil\ntrue\nhi\n<fn f>\n<native fn>\n"
    );
}

#[test]
fn test_equality_across_types() {
    assert_eq!(
        output_of(
            "print 1 == \"1\"; print 1 != \"1\"; print nil == false; print nil == nil; \
             print \"a\" == \"a\"; print 2 == 2.0;"
        ),
        "false\ntrue\nfalse\ntrue\ntrue\ntrue\n"
    );
}

#[test]
fn test_functions_compare_by_identity() {
    assert_eq!(
        output_of("fun f() {} fun g() {} let h = f; print f == h; print f == g;"),
        "true\nfalse\n"
    );
}

#[test]
fn test_truthiness() {
    assert_eq!(
        output_of("print !nil; print !false; print !0; print !\"\"; if (0) print \"zero is truthy\";"),
        "true\ntrue\nfalse\nfalse\nzero is truthy\n"
    );
}

#[test]
fn test_arithmetic_and_concatenation() {
    assert_eq!(
        output_of("print 1 + 2 * 3; print (1 + 2) * 3; print \"ab\" + \"cd\"; print 7 - 10;"),
        "7\n9\nabcd\n-3\n"
    );
}

#[test]
fn test_division_by_zero_follows_ieee() {
    assert_eq!(output_of("print 1 / 0 > 0; print -1 / 0 < 0;"), "true\ntrue\n");
}

#[test]
fn test_short_circuit_skips_right_operand() {
    assert_eq!(
        output_of(
            "print false and undefinedThing(); print true or undefinedThing(); \
             print nil or \"right\"; print 1 and 2;"
        ),
        "false\ntrue\nright\n2\n"
    );
}

#[test]
fn test_block_shadowing() {
    let source = r#"
        let x = "global";
        { let x = "local"; print x; }
        print x;
    "#;

    assert_eq!(output_of(source), "local\nglobal\n");
}

#[test]
fn test_closure_counter_shares_binding() {
    let source = r#"
        fun makeCounter() {
          let i = 0;
          fun counter() { i = i + 1; print i; }
          return counter;
        }
        let c = makeCounter();
        c(); c();
        let d = makeCounter();
        d();
    "#;

    assert_eq!(output_of(source), "1\n2\n1\n");
}

#[test]
fn test_for_loop() {
    assert_eq!(output_of("for (let i = 0; i < 3; i = i + 1) print i;"), "0\n1\n2\n");
}

#[test]
fn test_for_loop_variable_is_scoped() {
    let (out, err, _) = run("for (let i = 0; i < 1; i = i + 1) {} print i;");

    assert_eq!(out, "");
    assert_eq!(err, "[line 1] Runtime error: Undefined variable 'i'.\n");
}

#[test]
fn test_while_and_if_else() {
    let source = r#"
        let n = 0;
        while (n < 4) {
          if (n == 2) print "two"; else print n;
          n = n + 1;
        }
    "#;

    assert_eq!(output_of(source), "0\n1\ntwo\n3\n");
}

#[test]
fn test_recursion_and_return() {
    let source = r#"
        fun fib(n) {
          if (n < 2) return n;
          return fib(n - 1) + fib(n - 2);
        }
        print fib(10);
        fun nothing() { return; }
        print nothing();
        fun implicit() {}
        print implicit();
    "#;

    assert_eq!(output_of(source), "55\nnil\nnil\n");
}

#[test]
fn test_return_unwinds_nested_blocks_and_restores_scope() {
    let source = r#"
        let x = "outer";
        fun find() {
          let x = "inner";
          while (true) {
            { return x; }
          }
        }
        print find();
        print x;
    "#;

    assert_eq!(output_of(source), "inner\nouter\n");
}

#[test]
fn test_assignment_returns_value() {
    assert_eq!(output_of("let a; let b; a = b = 3; print a; print b;"), "3\n3\n");
}

#[test]
fn test_clock_returns_seconds() {
    assert_eq!(output_of("let t = clock(); print t > 1000000000;"), "true\n");
}

#[test]
fn test_arity_mismatch_halts_execution() {
    let source = "fun f() { return 1; }\nprint \"before\";\nf(1);\nprint \"after\";";
    let (out, err, lox) = run(source);

    assert_eq!(out, "before\n");
    assert_eq!(err, "[line 3] Runtime error: Expected 0 arguments but got 1.\n");
    assert!(lox.had_runtime_error());
    assert!(!lox.had_error());
}

#[test]
fn test_operand_type_errors() {
    let cases = [
        ("print -\"a\";", "Operand must be a number."),
        ("print 1 - \"a\";", "Operands must be a number."),
        ("print \"a\" < 1;", "Operands must be a number."),
        ("print nil * 2;", "Operands must be a number."),
        ("print 1 + \"a\";", "Operands must be a number."),
        ("print \"a\" + nil;", "Operands must be a number."),
        ("\"not a function\"();", "Can only call functions and classes."),
        ("print missing;", "Undefined variable 'missing'."),
        ("missing = 1;", "Undefined variable 'missing'."),
    ];

    for (source, message) in cases {
        let (out, err, lox) = run(source);

        assert_eq!(out, "", "{}", source);
        assert_eq!(err, format!("[line 1] Runtime error: {}\n", message), "{}", source);
        assert!(lox.had_runtime_error(), "{}", source);
    }
}

#[test]
fn test_syntax_error_suppresses_all_output() {
    let (out, err, lox) = run("print 1;\nprint ;");

    assert_eq!(out, "");
    assert_eq!(err, "[line 2] Error at ';': Expect expression.\n");
    assert!(lox.had_error());
}

#[test]
fn test_state_persists_across_runs() {
    let mut lox = Lox::new(Vec::new(), Vec::new());

    lox.run("let count = 1; fun bump() { count = count + 1; }");
    lox.run("print count +;");
    assert!(lox.had_error());
    lox.reset_error();

    lox.run("bump(); print count;");

    assert!(!lox.had_error());
    assert_eq!(String::from_utf8(lox.output().clone()).unwrap(), "2\n");
}

#[test]
fn test_runtime_error_inside_block_restores_globals() {
    let mut lox = Lox::new(Vec::new(), Vec::new());

    lox.run("let a = \"global\"; { let a = \"local\"; print a; nope(); }");
    lox.run("print a;");

    assert_eq!(
        String::from_utf8(lox.output().clone()).unwrap(),
        "local\nglobal\n"
    );
}

#[test]
fn test_print_write_failure_is_a_runtime_error() {
    let mut lox = Lox::new(FailingWriter, Vec::new());

    lox.run("print 1;\nprint 2;");

    let err = String::from_utf8(lox.diagnostics().clone()).unwrap();
    assert_eq!(err.lines().count(), 1, "execution stops at the first failed write");
    assert!(err.contains("disk full"));
    assert!(lox.had_runtime_error());
    assert!(!lox.had_error());
}
