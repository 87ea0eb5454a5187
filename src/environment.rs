use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::error::RuntimeError;
use crate::token::Token;
use crate::value::Value;

/// Shared handle to a scope.  Blocks, calls and closures all hold one, so a
/// scope lives as long as its longest holder.
pub type Env = Rc<RefCell<Environment>>;

#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Env>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Env) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Wraps `self` in a shareable handle.
    pub fn into_env(self) -> Env {
        Rc::new(RefCell::new(self))
    }

    /// Binds `name` in this scope, shadowing any outer binding.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        if let Some(value) = self.values.get(&name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(undefined(name))
        }
    }

    pub fn assign(&mut self, name: &Token, value: Value) -> Result<(), RuntimeError> {
        if let Some(slot) = self.values.get_mut(&name.lexeme) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(undefined(name))
        }
    }
}

/// Walks `distance` parents up from `env`.  `None` if the chain is shorter,
/// which the resolver rules out for well-formed programs.
fn ancestor(env: &Env, distance: usize) -> Option<Env> {
    let mut current: Env = Rc::clone(env);

    for _ in 0..distance {
        let parent: Env = current.borrow().enclosing.clone()?;
        current = parent;
    }

    Some(current)
}

/// Reads `name` from exactly `distance` scopes up.
pub fn get_at(env: &Env, distance: usize, name: &Token) -> Result<Value, RuntimeError> {
    debug!("get_at '{}' distance {}", name.lexeme, distance);

    let scope: Env = ancestor(env, distance).ok_or_else(|| undefined(name))?;
    let value = scope.borrow().values.get(&name.lexeme).cloned();

    value.ok_or_else(|| undefined(name))
}

/// Writes `name` exactly `distance` scopes up.
pub fn assign_at(env: &Env, distance: usize, name: &Token, value: Value) -> Result<(), RuntimeError> {
    debug!("assign_at '{}' distance {}", name.lexeme, distance);

    let scope: Env = ancestor(env, distance).ok_or_else(|| undefined(name))?;
    let mut scope = scope.borrow_mut();

    match scope.values.get_mut(&name.lexeme) {
        Some(slot) => {
            *slot = value;
            Ok(())
        }
        None => Err(undefined(name)),
    }
}

fn undefined(name: &Token) -> RuntimeError {
    RuntimeError::new(name, format!("Undefined variable '{}'.", name.lexeme))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    fn ident(name: &str) -> Token {
        Token::new(TokenType::IDENTIFIER, name, 1)
    }

    #[test]
    fn lookup_walks_outward() {
        let globals: Env = Environment::new().into_env();
        globals.borrow_mut().define("a", Value::Number(1.0));

        let inner: Env = Environment::with_enclosing(Rc::clone(&globals)).into_env();

        assert_eq!(inner.borrow().get(&ident("a")), Ok(Value::Number(1.0)));
        assert!(inner.borrow().get(&ident("b")).is_err());
    }

    #[test]
    fn define_shadows_outer_binding() {
        let globals: Env = Environment::new().into_env();
        globals.borrow_mut().define("a", Value::Number(1.0));

        let inner: Env = Environment::with_enclosing(Rc::clone(&globals)).into_env();
        inner.borrow_mut().define("a", Value::Number(2.0));

        assert_eq!(inner.borrow().get(&ident("a")), Ok(Value::Number(2.0)));
        assert_eq!(globals.borrow().get(&ident("a")), Ok(Value::Number(1.0)));
    }

    #[test]
    fn assign_updates_defining_scope() {
        let globals: Env = Environment::new().into_env();
        globals.borrow_mut().define("a", Value::Nil);

        let inner: Env = Environment::with_enclosing(Rc::clone(&globals)).into_env();
        inner
            .borrow_mut()
            .assign(&ident("a"), Value::Bool(true))
            .unwrap();

        assert_eq!(globals.borrow().get(&ident("a")), Ok(Value::Bool(true)));

        let err = inner
            .borrow_mut()
            .assign(&ident("missing"), Value::Nil)
            .unwrap_err();
        assert_eq!(err.message, "Undefined variable 'missing'.");
    }

    #[test]
    fn distance_lookups_skip_shadowing_scopes() {
        let globals: Env = Environment::new().into_env();
        globals.borrow_mut().define("a", Value::String("outer".into()));

        let middle: Env = Environment::with_enclosing(Rc::clone(&globals)).into_env();
        let inner: Env = Environment::with_enclosing(Rc::clone(&middle)).into_env();
        inner.borrow_mut().define("a", Value::String("inner".into()));

        assert_eq!(
            get_at(&inner, 2, &ident("a")),
            Ok(Value::String("outer".into()))
        );
        assert_eq!(
            get_at(&inner, 0, &ident("a")),
            Ok(Value::String("inner".into()))
        );

        assign_at(&inner, 2, &ident("a"), Value::Number(3.0)).unwrap();
        assert_eq!(globals.borrow().get(&ident("a")), Ok(Value::Number(3.0)));
        assert!(get_at(&inner, 5, &ident("a")).is_err());
    }
}
