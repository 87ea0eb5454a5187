use std::collections::HashMap;
use std::io::{self, Write};
use std::mem;
use std::rc::Rc;
use std::time::{SystemTime, SystemTimeError, UNIX_EPOCH};

use log::{debug, info, warn};
use thiserror::Error;

use crate::ast::{Expr, ExprId, FunctionDecl, LiteralValue, Stmt};
use crate::environment::{self, Env, Environment};
use crate::error::{LoxError, RuntimeError};
use crate::token::{Token, TokenType};
use crate::value::{LoxFunction, NativeFunction, Value};

/// Why statement execution stopped early.
#[derive(Error, Debug)]
pub enum InterpretError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// A `return` unwinding to the nearest call frame.  Not an error.
    #[error("Return signal with value: {0}")]
    Return(Value),

    /// The `print` output stream failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Convenient alias for interpreter results.
pub type IResult<T> = Result<T, InterpretError>;

/// Tree-walking evaluator.  `print` output goes to `out`.
pub struct Interpreter<W: Write> {
    globals: Env,
    environment: Env,

    /// Hop distances recorded by the resolver; absent ⇒ global.
    locals: HashMap<ExprId, usize>,

    out: W,
}

impl<W: Write> Interpreter<W> {
    /// Creates a new Interpreter and defines native functions such as `clock`.
    pub fn new(out: W) -> Self {
        info!("Initializing Interpreter");

        let globals: Env = Environment::new().into_env();

        debug!("Defining native function 'clock'");

        globals.borrow_mut().define(
            "clock",
            Value::NativeFunction(Rc::new(NativeFunction {
                name: "clock",
                arity: 0,
                func: clock,
            })),
        );

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            out,
        }
    }

    /// Records that the variable node `id` binds `depth` scopes out.
    pub fn resolve(&mut self, id: ExprId, depth: usize) {
        self.locals.insert(id, depth);
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Interprets a list of statements (a "program").  The first runtime
    /// error stops execution; earlier effects remain.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), LoxError> {
        debug!("Interpreting {} statements", statements.len());

        for stmt in statements {
            match self.execute(stmt) {
                Ok(()) => {}
                Err(InterpretError::Runtime(e)) => return Err(e.into()),
                Err(InterpretError::Io(e)) => return Err(e.into()),
                Err(InterpretError::Return(value)) => {
                    // The resolver rejects top-level `return`.
                    warn!("Top-level return of {} ignored", value);
                    break;
                }
            }
        }

        self.out.flush()?;

        info!("Interpretation completed successfully");
        Ok(())
    }

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &Stmt) -> IResult<()> {
        match stmt {
            Stmt::Function(decl) => {
                debug!("Defining function '{}'", decl.name.lexeme);

                // Capture the current environment as the closure.
                let function = Value::Function(Rc::new(LoxFunction {
                    declaration: Rc::clone(decl),
                    closure: Rc::clone(&self.environment),
                }));

                self.environment
                    .borrow_mut()
                    .define(&decl.name.lexeme, function);

                Ok(())
            }

            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(())
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                writeln!(self.out, "{}", value)?;
                debug!("Printed value: {}", value);
                Ok(())
            }

            Stmt::Let { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Variable '{}' defined with value: {}", name.lexeme, value);

                self.environment.borrow_mut().define(&name.lexeme, value);
                Ok(())
            }

            Stmt::Block(statements) => {
                let env: Env = Environment::with_enclosing(Rc::clone(&self.environment)).into_env();
                self.execute_block(statements, env)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)?;
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)?;
                }
                Ok(())
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    self.execute(body)?;
                }
                Ok(())
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(e) => self.evaluate(e)?,
                    None => Value::Nil,
                };
                debug!("Returning value: {}", value);
                Err(InterpretError::Return(value))
            }
        }
    }

    /// Runs `statements` with `env` as the current scope, restoring the
    /// previous scope on every exit path.
    pub fn execute_block(&mut self, statements: &[Stmt], env: Env) -> IResult<()> {
        debug!("Entering block with {} statements", statements.len());

        let previous: Env = mem::replace(&mut self.environment, env);

        let result = statements.iter().try_for_each(|stmt| self.execute(stmt));

        self.environment = previous;

        result
    }

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> IResult<Value> {
        let value = match expr {
            Expr::Literal(lit) => match lit {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            },

            Expr::Grouping(inner) => self.evaluate(inner)?,

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right)?,

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right)?,

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_val = self.evaluate(left)?;

                let short_circuit: bool = if operator.token_type == TokenType::OR {
                    left_val.is_truthy()
                } else {
                    !left_val.is_truthy()
                };

                if short_circuit {
                    left_val
                } else {
                    self.evaluate(right)?
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name)?,

            Expr::Assign { id, name, value } => {
                let val = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => {
                        environment::assign_at(&self.environment, distance, name, val.clone())?
                    }
                    None => self.globals.borrow_mut().assign(name, val.clone())?,
                }

                val
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_val = self.evaluate(callee)?;

                let mut arg_values = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    arg_values.push(self.evaluate(arg)?);
                }

                self.invoke_callable(&callee_val, paren, arg_values)?
            }
        };

        Ok(value)
    }

    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value, RuntimeError> {
        match self.locals.get(&id) {
            Some(&distance) => environment::get_at(&self.environment, distance, name),
            None => self.globals.borrow().get(name),
        }
    }

    fn evaluate_unary(&mut self, op: &Token, expr: &Expr) -> IResult<Value> {
        let right_val = self.evaluate(expr)?;

        match op.token_type {
            TokenType::MINUS => match right_val {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(RuntimeError::new(op, "Operand must be a number.").into()),
            },
            TokenType::BANG => Ok(Value::Bool(!right_val.is_truthy())),
            _ => Err(RuntimeError::new(op, "Invalid unary operator.").into()),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, op: &Token, right: &Expr) -> IResult<Value> {
        let left_val = self.evaluate(left)?;
        let right_val = self.evaluate(right)?;

        debug!("Binary '{}' on {} and {}", op.lexeme, left_val, right_val);

        let result = match op.token_type {
            TokenType::PLUS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
                (Value::String(a), Value::String(b)) => Value::String(a + &b),
                _ => return Err(RuntimeError::new(op, "Operands must be a number.").into()),
            },

            TokenType::MINUS => {
                let (a, b) = number_operands(op, &left_val, &right_val)?;
                Value::Number(a - b)
            }

            TokenType::STAR => {
                let (a, b) = number_operands(op, &left_val, &right_val)?;
                Value::Number(a * b)
            }

            // IEEE semantics: x / 0 is ±inf or NaN.
            TokenType::SLASH => {
                let (a, b) = number_operands(op, &left_val, &right_val)?;
                Value::Number(a / b)
            }

            TokenType::GREATER => {
                let (a, b) = number_operands(op, &left_val, &right_val)?;
                Value::Bool(a > b)
            }

            TokenType::GREATER_EQUAL => {
                let (a, b) = number_operands(op, &left_val, &right_val)?;
                Value::Bool(a >= b)
            }

            TokenType::LESS => {
                let (a, b) = number_operands(op, &left_val, &right_val)?;
                Value::Bool(a < b)
            }

            TokenType::LESS_EQUAL => {
                let (a, b) = number_operands(op, &left_val, &right_val)?;
                Value::Bool(a <= b)
            }

            TokenType::EQUAL_EQUAL => Value::Bool(left_val == right_val),

            TokenType::BANG_EQUAL => Value::Bool(left_val != right_val),

            _ => return Err(RuntimeError::new(op, "Invalid binary operator.").into()),
        };

        Ok(result)
    }

    /// Invokes a callable (native or user-defined function).
    fn invoke_callable(
        &mut self,
        callee_val: &Value,
        paren: &Token,
        arg_values: Vec<Value>,
    ) -> IResult<Value> {
        match callee_val {
            Value::NativeFunction(native) => {
                check_arity(paren, native.arity, arg_values.len())?;

                debug!("Calling native function '{}'", native.name);

                let result =
                    (native.func)(&arg_values).map_err(|msg| RuntimeError::new(paren, msg))?;
                Ok(result)
            }

            Value::Function(function) => {
                check_arity(paren, function.arity(), arg_values.len())?;

                debug!("Calling user-defined function '{}'", function.name());

                self.call_function(&function.declaration, &function.closure, arg_values)
            }

            _ => Err(RuntimeError::new(paren, "Can only call functions and classes.").into()),
        }
    }

    /// Runs a function body in a fresh scope chained to its closure, not to
    /// the caller's scope.
    fn call_function(
        &mut self,
        declaration: &FunctionDecl,
        closure: &Env,
        arg_values: Vec<Value>,
    ) -> IResult<Value> {
        let mut frame = Environment::with_enclosing(Rc::clone(closure));

        for (param, arg_val) in declaration.params.iter().zip(arg_values) {
            frame.define(&param.lexeme, arg_val);
        }

        match self.execute_block(&declaration.body, frame.into_env()) {
            Ok(()) => Ok(Value::Nil),
            Err(InterpretError::Return(val)) => {
                debug!("Function '{}' returned: {}", declaration.name.lexeme, val);
                Ok(val)
            }
            Err(e) => Err(e),
        }
    }
}

fn check_arity(paren: &Token, expected: usize, got: usize) -> Result<(), RuntimeError> {
    if expected != got {
        return Err(RuntimeError::new(
            paren,
            format!("Expected {} arguments but got {}.", expected, got),
        ));
    }

    Ok(())
}

fn number_operands(op: &Token, left: &Value, right: &Value) -> Result<(f64, f64), RuntimeError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(RuntimeError::new(op, "Operands must be a number.")),
    }
}

/// Native `clock()`: wall-clock seconds since the Unix epoch.
fn clock(_args: &[Value]) -> Result<Value, String> {
    let timestamp: f64 = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e: SystemTimeError| format!("Clock error: {}", e))?
        .as_secs_f64();

    Ok(Value::Number(timestamp))
}
