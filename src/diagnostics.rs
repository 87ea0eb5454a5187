//! The diagnostic sink shared by every stage of the pipeline.
//!
//! Static errors (lexical, syntax, resolution) latch `had_error`; runtime
//! errors, including failed writes of `print` output, latch
//! `had_runtime_error`.  The two latches drive the process exit
//! code, and the REPL clears only the first one between lines.

use std::io::Write;

use log::{debug, warn};

use crate::error::LoxError;
use crate::token::Token;

/// Formats diagnostics onto an error stream and remembers whether any were
/// emitted.
#[derive(Debug)]
pub struct Reporter<E: Write> {
    err: E,
    had_error: bool,
    had_runtime_error: bool,
}

impl<E: Write> Reporter<E> {
    pub fn new(err: E) -> Self {
        Self {
            err,
            had_error: false,
            had_runtime_error: false,
        }
    }

    /// Writes `error` as one line and latches the matching flag.
    pub fn report(&mut self, error: &LoxError) {
        debug!("Reporting diagnostic: {:?}", error);

        if let Err(e) = writeln!(self.err, "{}", error) {
            warn!("Could not write diagnostic: {}", e);
        }

        match error {
            LoxError::Runtime(_) | LoxError::Io(_) => self.had_runtime_error = true,
            _ => self.had_error = true,
        }
    }

    /// Reports a line-anchored error with no token context.
    pub fn error(&mut self, line: usize, message: &str) {
        self.report(&LoxError::lex(line, message));
    }

    /// Reports an error anchored at `token` (`at end` for EOF).
    pub fn error_at(&mut self, token: &Token, message: &str) {
        self.report(&LoxError::parse(token, message));
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    /// Clears the static-error latch.  The runtime latch is sticky.
    pub fn reset(&mut self) {
        self.had_error = false;
    }

    pub fn writer(&self) -> &E {
        &self.err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeError;
    use crate::token::TokenType;

    fn written(reporter: &Reporter<Vec<u8>>) -> String {
        String::from_utf8(reporter.writer().clone()).unwrap()
    }

    #[test]
    fn test_error_without_token() {
        let mut reporter = Reporter::new(Vec::new());

        reporter.error(3, "msg");

        assert_eq!(written(&reporter), "[line 3] Error: msg\n");
        assert!(reporter.had_error());
        assert!(!reporter.had_runtime_error());
    }

    #[test]
    fn test_error_at_end_of_input() {
        let mut reporter = Reporter::new(Vec::new());

        reporter.error_at(&Token::new(TokenType::EOF, "", 7), "Expect expression.");

        assert_eq!(written(&reporter), "[line 7] Error at end: Expect expression.\n");
    }

    #[test]
    fn test_error_at_token_quotes_lexeme() {
        let mut reporter = Reporter::new(Vec::new());

        reporter.error_at(&Token::new(TokenType::IDENTIFIER, "x", 2), "Bad.");

        assert_eq!(written(&reporter), "[line 2] Error at 'x': Bad.\n");
    }

    #[test]
    fn test_reset_clears_only_static_latch() {
        let mut reporter = Reporter::new(Vec::new());
        let token = Token::new(TokenType::IDENTIFIER, "f", 1);

        reporter.error(1, "static");
        reporter.report(&RuntimeError::new(&token, "runtime").into());
        assert!(reporter.had_error());
        assert!(reporter.had_runtime_error());

        reporter.reset();

        assert!(!reporter.had_error());
        assert!(reporter.had_runtime_error());
        assert_eq!(
            written(&reporter),
            "[line 1] Error: static\n[line 1] Runtime error: runtime\n"
        );
    }

    #[test]
    fn test_io_failure_latches_runtime_flag() {
        let mut reporter = Reporter::new(Vec::new());

        reporter.report(&std::io::Error::new(std::io::ErrorKind::Other, "disk full").into());

        assert!(reporter.had_runtime_error());
        assert!(!reporter.had_error());
        assert_eq!(written(&reporter), "disk full\n");
    }
}
