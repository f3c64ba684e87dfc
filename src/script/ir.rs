use serde::{Deserialize, Serialize};

use super::builtins::Builtin;

/// Literal values embedded in the IR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// `nil`
    Nil,
    /// Boolean literal.
    Boolean(bool),
    /// Integer literal.
    Integer(i64),
    /// Float literal.
    Float(f64),
    /// String literal.
    String(String),
}

/// Fully validated script ready for execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramIr {
    /// Top-level statements, executed in order.
    pub body: Vec<Stmt>,
    /// Function definitions, hoisted; calls refer to them by index.
    pub functions: Vec<Function>,
}

/// User-defined function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    /// Function name.
    pub name: String,
    /// Parameter names, bound in a fresh frame per call.
    pub params: Vec<String>,
    /// Body statements.
    pub body: Vec<Stmt>,
    /// Line of the `defn` form.
    pub line: u32,
}

/// A statement and the source line it starts on. Each completed statement is
/// one observable step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    /// 1-based source line.
    pub line: u32,
    /// Statement kind.
    pub kind: StmtKind,
}

/// Statement kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    /// Bind a name in the current frame.
    Define {
        /// Bound name.
        name: String,
        /// Initial value.
        value: Expression,
    },
    /// Rebind an existing name (current frame first, then globals).
    Assign {
        /// Target name.
        name: String,
        /// New value.
        value: Expression,
    },
    /// Conditional.
    If {
        /// Condition.
        condition: Expression,
        /// Taken when the condition is truthy.
        then_branch: Vec<Stmt>,
        /// Taken otherwise.
        else_branch: Vec<Stmt>,
    },
    /// Loop while the condition is truthy.
    While {
        /// Condition, evaluated before every iteration.
        condition: Expression,
        /// Loop body.
        body: Vec<Stmt>,
    },
    /// Iterate a list, string or map keys.
    For {
        /// Loop variable.
        variable: String,
        /// Iterated value.
        iterable: Expression,
        /// Loop body.
        body: Vec<Stmt>,
    },
    /// Statement sequence.
    Block(Vec<Stmt>),
    /// Return from the enclosing function.
    Return(Option<Expression>),
    /// Leave the innermost loop.
    Break,
    /// Raise a user error.
    Raise(Expression),
    /// Evaluate for side effects.
    Expr(Expression),
}

/// Expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// Constant.
    Literal(Literal),
    /// Variable reference.
    Variable(String),
    /// Builtin call.
    Builtin {
        /// Builtin identifier.
        builtin: Builtin,
        /// Argument expressions.
        args: Vec<Expression>,
    },
    /// User function call.
    Call {
        /// Index into `ProgramIr::functions`.
        function: usize,
        /// Argument expressions.
        args: Vec<Expression>,
    },
    /// Short-circuit conjunction; yields the deciding operand.
    And(Vec<Expression>),
    /// Short-circuit disjunction; yields the deciding operand.
    Or(Vec<Expression>),
    /// Conditional expression.
    If {
        /// Condition.
        condition: Box<Expression>,
        /// Value when truthy.
        then_branch: Box<Expression>,
        /// Value otherwise (`nil` when absent).
        else_branch: Option<Box<Expression>>,
    },
}
