use letlox::ast::{Expr, Stmt};
use letlox::ast_printer::AstPrinter;
use letlox::diagnostics::Reporter;
use letlox::parser::Parser;
use letlox::scanner::Scanner;

/// Parses `source`, returning the statements and the diagnostics text.
fn parse(source: &str) -> (Vec<Stmt>, String) {
    let mut reporter = Reporter::new(Vec::new());
    let tokens = Scanner::new(source).scan_tokens(&mut reporter);
    let statements = Parser::new(tokens).parse(&mut reporter);
    let errors = String::from_utf8(reporter.writer().clone()).unwrap();
    (statements, errors)
}

fn printed(source: &str) -> Vec<String> {
    let (statements, errors) = parse(source);
    assert_eq!(errors, "", "unexpected diagnostics");
    statements.iter().map(AstPrinter::print_stmt).collect()
}

#[test]
fn test_precedence_and_associativity() {
    assert_eq!(
        printed("print 1 + 2 * 3 - 4 / -5;"),
        vec!["(print (- (+ 1.0 (* 2.0 3.0)) (/ 4.0 (- 5.0))))"]
    );
    assert_eq!(
        printed("a == b < c or d and !e;"),
        vec!["(; (or (== a (< b c)) (and d (! e))))"]
    );
}

#[test]
fn test_assignment_is_right_associative() {
    assert_eq!(printed("a = b = 1;"), vec!["(; (= a (= b 1.0)))"]);
}

#[test]
fn test_calls_and_grouping() {
    assert_eq!(
        printed("f(1)(\"x\", (2));"),
        vec!["(; (call (call f 1.0) x (group 2.0)))"]
    );
}

#[test]
fn test_declarations() {
    assert_eq!(
        printed("let a; let b = 2; fun add(x, y) { return x + y; }"),
        vec![
            "(let a)",
            "(let b 2.0)",
            "(fun add (x y) (return (+ x y)))",
        ]
    );
}

#[test]
fn test_if_else_and_while() {
    assert_eq!(
        printed("if (a) print 1; else { print 2; } while (b) b = false;"),
        vec![
            "(if a (print 1.0) (block (print 2.0)))",
            "(while b (; (= b false)))",
        ]
    );
}

#[test]
fn test_for_desugars_to_while() {
    assert_eq!(
        printed("for (let i = 0; i < 3; i = i + 1) print i;"),
        vec!["(block (let i 0.0) (while (< i 3.0) (block (print i) (; (= i (+ i 1.0))))))"]
    );

    // No clauses: no wrapping block, condition defaults to `true`.
    assert_eq!(printed("for (;;) print 1;"), vec!["(while true (print 1.0))"]);
}

#[test]
fn test_invalid_assignment_target() {
    let (statements, errors) = parse("1 + 2 = 3; print 4;");

    assert_eq!(errors, "[line 1] Error at '=': Invalid assignment target.\n");
    assert_eq!(statements.len(), 1);
    assert!(matches!(statements[0], Stmt::Print(_)));
}

#[test]
fn test_missing_expression_at_end() {
    let (statements, errors) = parse("print");

    assert!(statements.is_empty());
    assert_eq!(errors, "[line 1] Error at end: Expect expression.\n");
}

#[test]
fn test_recovery_reports_every_bad_statement() {
    let source = "let = 1;\nprint 2;\nprint (3;\nlet ok = 4;";
    let (statements, errors) = parse(source);

    let lines: Vec<&str> = errors.lines().collect();
    assert_eq!(
        lines,
        vec![
            "[line 1] Error at '=': Expect variable name.",
            "[line 3] Error at ';': Expect ')' after expression.",
        ]
    );

    let rendered: Vec<String> = statements.iter().map(AstPrinter::print_stmt).collect();
    assert_eq!(rendered, vec!["(print 2.0)", "(let ok 4.0)"]);
}

#[test]
fn test_error_inside_block_is_reported_once() {
    let (statements, errors) = parse("{ print ; print 1; }");

    assert_eq!(errors, "[line 1] Error at ';': Expect expression.\n");

    let rendered: Vec<String> = statements.iter().map(AstPrinter::print_stmt).collect();
    assert_eq!(rendered, vec!["(block (print 1.0))"]);
}

#[test]
fn test_error_inside_function_body_keeps_later_errors() {
    let source = "fun f() {\n  let = 1;\n  print 2;\n}\nprint (3;";
    let (statements, errors) = parse(source);

    let lines: Vec<&str> = errors.lines().collect();
    assert_eq!(
        lines,
        vec![
            "[line 2] Error at '=': Expect variable name.",
            "[line 5] Error at ';': Expect ')' after expression.",
        ]
    );

    let rendered: Vec<String> = statements.iter().map(AstPrinter::print_stmt).collect();
    assert_eq!(rendered, vec!["(fun f () (print 2.0))"]);
}

#[test]
fn test_errors_in_nested_blocks_are_reported_in_order() {
    let (_, errors) = parse("{ { let = 1; } print ; }\nprint 3;");

    let lines: Vec<&str> = errors.lines().collect();
    assert_eq!(
        lines,
        vec![
            "[line 1] Error at '=': Expect variable name.",
            "[line 1] Error at ';': Expect expression.",
        ]
    );
}

#[test]
fn test_argument_limit_is_reported_without_aborting() {
    let args: Vec<String> = (0..256).map(|i| i.to_string()).collect();
    let source = format!("f({});", args.join(", "));
    let (statements, errors) = parse(&source);

    assert_eq!(errors.lines().count(), 1);
    assert!(errors.contains("Can't have more than 255 arguments."));

    match &statements[0] {
        Stmt::Expression(Expr::Call { arguments, .. }) => assert_eq!(arguments.len(), 256),
        other => panic!("expected a call, got {:?}", other),
    }
}

#[test]
fn test_parameter_limit_is_reported() {
    let params: Vec<String> = (0..256).map(|i| format!("p{}", i)).collect();
    let source = format!("fun f({}) {{}}", params.join(", "));
    let (_, errors) = parse(&source);

    assert!(errors.contains("Error at 'p255': Can't have more than 255 parameters."));
}

#[test]
fn test_variable_nodes_get_distinct_ids() {
    let (statements, _) = parse("a; a;");

    let ids: Vec<_> = statements
        .iter()
        .map(|stmt| match stmt {
            Stmt::Expression(Expr::Variable { id, .. }) => *id,
            other => panic!("expected a variable, got {:?}", other),
        })
        .collect();

    assert_ne!(ids[0], ids[1]);
}
