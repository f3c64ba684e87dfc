use std::collections::BTreeMap;

use super::builtins::call_builtin;
use super::ir::{Expression, Literal, ProgramIr, Stmt, StmtKind};
use super::{ScriptError, Value};
use crate::graph::Graph;

/// Default cap on nested user function calls.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 200;

/// State visible to a [`StepHook`] after a statement completes.
#[derive(Debug)]
pub struct StepContext<'a> {
    /// Line of the completed statement.
    pub line: u32,
    /// Bindings of the frame the statement ran in.
    pub bindings: &'a BTreeMap<String, Value>,
    /// Graph after the statement.
    pub graph: &'a Graph,
}

/// Instrumentation hook invoked once per completed statement.
pub trait StepHook {
    /// Error type surfaced by the hook.
    type Error;

    /// Observe one completed statement.
    fn on_step(&mut self, step: &StepContext<'_>) -> Result<(), Self::Error>;
}

/// Errors surfaced while executing a program.
#[derive(Debug)]
pub enum RunError<E> {
    /// The hook failed; execution stops.
    Hook(E),
    /// The script itself failed.
    Script(ScriptError),
}

impl<E> From<ScriptError> for RunError<E> {
    fn from(err: ScriptError) -> Self {
        RunError::Script(err)
    }
}

enum Flow {
    Normal,
    Break,
    Return(Value),
}

/// Tree-walking interpreter executing one program against one graph.
pub struct Interpreter<'a, H> {
    program: &'a ProgramIr,
    graph: &'a mut Graph,
    hook: &'a mut H,
    frames: Vec<BTreeMap<String, Value>>,
    max_call_depth: usize,
}

impl<'a, H: StepHook> Interpreter<'a, H> {
    /// Create an interpreter with an empty global frame.
    pub fn new(program: &'a ProgramIr, graph: &'a mut Graph, hook: &'a mut H) -> Self {
        Self {
            program,
            graph,
            hook,
            frames: vec![BTreeMap::new()],
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }

    /// Override the call depth cap.
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Run the program to completion.
    pub fn run(&mut self) -> Result<(), RunError<H::Error>> {
        let program = self.program;
        self.exec_block(&program.body)?;
        Ok(())
    }

    /// Global bindings after (or during) execution.
    pub fn globals(&self) -> &BTreeMap<String, Value> {
        &self.frames[0]
    }

    fn exec_block(&mut self, stmts: &'a [Stmt]) -> Result<Flow, RunError<H::Error>> {
        for stmt in stmts {
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &'a Stmt) -> Result<Flow, RunError<H::Error>> {
        let line = stmt.line;
        let flow = match &stmt.kind {
            StmtKind::Define { name, value } => {
                let value = self.eval(value, line)?;
                self.current_frame().insert(name.clone(), value);
                Flow::Normal
            }
            StmtKind::Assign { name, value } => {
                let value = self.eval(value, line)?;
                let slot = self.lookup_mut(name).ok_or_else(|| ScriptError::Runtime {
                    message: format!("cannot assign to undefined variable `{}`", name),
                    line,
                })?;
                *slot = value;
                Flow::Normal
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval(condition, line)?.truthy() {
                    self.exec_block(then_branch)?
                } else {
                    self.exec_block(else_branch)?
                }
            }
            StmtKind::While { condition, body } => {
                let mut flow = Flow::Normal;
                while self.eval(condition, line)?.truthy() {
                    match self.exec_block(body)? {
                        Flow::Normal => {}
                        Flow::Break => break,
                        ret @ Flow::Return(_) => {
                            flow = ret;
                            break;
                        }
                    }
                }
                flow
            }
            StmtKind::For {
                variable,
                iterable,
                body,
            } => {
                let items = iterate(self.eval(iterable, line)?, line)?;
                let mut flow = Flow::Normal;
                for item in items {
                    self.current_frame().insert(variable.clone(), item);
                    match self.exec_block(body)? {
                        Flow::Normal => {}
                        Flow::Break => break,
                        ret @ Flow::Return(_) => {
                            flow = ret;
                            break;
                        }
                    }
                }
                flow
            }
            StmtKind::Block(stmts) => self.exec_block(stmts)?,
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, line)?,
                    None => Value::Nil,
                };
                Flow::Return(value)
            }
            StmtKind::Break => Flow::Break,
            StmtKind::Raise(message) => {
                let message = self.eval(message, line)?;
                return Err(RunError::Script(ScriptError::Raised {
                    message: message.to_string(),
                    line,
                }));
            }
            StmtKind::Expr(expr) => {
                self.eval(expr, line)?;
                Flow::Normal
            }
        };

        self.step(line)?;
        Ok(flow)
    }

    fn step(&mut self, line: u32) -> Result<(), RunError<H::Error>> {
        let Some(bindings) = self.frames.last() else {
            return Ok(());
        };
        let context = StepContext {
            line,
            bindings,
            graph: self.graph,
        };
        self.hook.on_step(&context).map_err(RunError::Hook)
    }

    fn eval(&mut self, expr: &'a Expression, line: u32) -> Result<Value, RunError<H::Error>> {
        match expr {
            Expression::Literal(literal) => Ok(match literal {
                Literal::Nil => Value::Nil,
                Literal::Boolean(flag) => Value::Boolean(*flag),
                Literal::Integer(num) => Value::Integer(*num),
                Literal::Float(num) => Value::Float(*num),
                Literal::String(text) => Value::String(text.clone()),
            }),
            Expression::Variable(name) => self.lookup(name).cloned().ok_or_else(|| {
                RunError::Script(ScriptError::Runtime {
                    message: format!("undefined variable `{}`", name),
                    line,
                })
            }),
            Expression::Builtin { builtin, args } => {
                let values = self.eval_all(args, line)?;
                call_builtin(*builtin, values, self.graph)
                    .map_err(|message| RunError::Script(ScriptError::Runtime { message, line }))
            }
            Expression::Call { function, args } => {
                let values = self.eval_all(args, line)?;
                self.call(*function, values, line)
            }
            Expression::And(operands) => {
                let mut last = Value::Boolean(true);
                for operand in operands {
                    last = self.eval(operand, line)?;
                    if !last.truthy() {
                        break;
                    }
                }
                Ok(last)
            }
            Expression::Or(operands) => {
                let mut last = Value::Boolean(false);
                for operand in operands {
                    last = self.eval(operand, line)?;
                    if last.truthy() {
                        break;
                    }
                }
                Ok(last)
            }
            Expression::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval(condition, line)?.truthy() {
                    self.eval(then_branch, line)
                } else if let Some(other) = else_branch {
                    self.eval(other, line)
                } else {
                    Ok(Value::Nil)
                }
            }
        }
    }

    fn eval_all(&mut self, exprs: &'a [Expression], line: u32) -> Result<Vec<Value>, RunError<H::Error>> {
        exprs.iter().map(|expr| self.eval(expr, line)).collect()
    }

    fn call(&mut self, index: usize, args: Vec<Value>, line: u32) -> Result<Value, RunError<H::Error>> {
        let program = self.program;
        let function = program.functions.get(index).ok_or_else(|| ScriptError::Runtime {
            message: format!("unknown function #{}", index),
            line,
        })?;
        if self.frames.len() > self.max_call_depth {
            return Err(RunError::Script(ScriptError::CallDepth {
                limit: self.max_call_depth,
                line,
            }));
        }

        let frame: BTreeMap<String, Value> = function.params.iter().cloned().zip(args).collect();
        self.frames.push(frame);
        let result = self.exec_block(&function.body);
        self.frames.pop();

        match result? {
            Flow::Return(value) => Ok(value),
            Flow::Normal | Flow::Break => Ok(Value::Nil),
        }
    }

    fn current_frame(&mut self) -> &mut BTreeMap<String, Value> {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.frames
            .last()
            .and_then(|frame| frame.get(name))
            .or_else(|| self.frames.first().and_then(|frame| frame.get(name)))
    }

    fn lookup_mut(&mut self, name: &str) -> Option<&mut Value> {
        let last = self.frames.len() - 1;
        if self.frames[last].contains_key(name) {
            return self.frames[last].get_mut(name);
        }
        self.frames[0].get_mut(name)
    }
}

fn iterate(value: Value, line: u32) -> Result<Vec<Value>, ScriptError> {
    match value {
        Value::List(items) => Ok(items),
        Value::String(text) => Ok(text.chars().map(|ch| Value::String(ch.to_string())).collect()),
        Value::Map(entries) => Ok(entries.into_keys().map(Value::String).collect()),
        other => Err(ScriptError::Runtime {
            message: format!("cannot iterate over {}", other.type_name()),
            line,
        }),
    }
}
