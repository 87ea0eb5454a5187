//! One interpreter session: scanner → parser → resolver → interpreter, with a
//! shared diagnostic sink.  Global state survives across [`Lox::run`] calls,
//! which is what the REPL relies on.

use std::io::Write;

use log::{debug, info};

use crate::diagnostics::Reporter;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;

pub struct Lox<W: Write, E: Write> {
    interpreter: Interpreter<W>,
    reporter: Reporter<E>,
}

impl<W: Write, E: Write> Lox<W, E> {
    /// `out` receives `print` output, `err` receives diagnostics.
    pub fn new(out: W, err: E) -> Self {
        Self {
            interpreter: Interpreter::new(out),
            reporter: Reporter::new(err),
        }
    }

    /// Runs `source` to completion.  Nothing executes if any lexical, syntax
    /// or resolution error was reported.
    pub fn run(&mut self, source: &str) {
        let tokens = Scanner::new(source).scan_tokens(&mut self.reporter);

        let mut parser = Parser::new(tokens);
        let statements = parser.parse(&mut self.reporter);

        if self.reporter.had_error() {
            info!("Static errors found; skipping resolution");
            return;
        }

        Resolver::new(&mut self.interpreter, &mut self.reporter).resolve(&statements);

        if self.reporter.had_error() {
            info!("Resolution errors found; skipping execution");
            return;
        }

        if let Err(e) = self.interpreter.interpret(&statements) {
            debug!("Runtime debug: {}", e);
            self.reporter.report(&e);
        }
    }

    pub fn had_error(&self) -> bool {
        self.reporter.had_error()
    }

    pub fn had_runtime_error(&self) -> bool {
        self.reporter.had_runtime_error()
    }

    /// Clears the static-error latch between REPL lines.
    pub fn reset_error(&mut self) {
        self.reporter.reset();
    }

    pub fn output(&self) -> &W {
        self.interpreter.output()
    }

    pub fn diagnostics(&self) -> &E {
        self.reporter.writer()
    }
}
