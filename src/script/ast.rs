use serde::{Deserialize, Serialize};

/// Generic S-expression nodes of the graph script language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Expr {
    /// A bare symbol.
    Symbol(String),
    /// String literal.
    String(String),
    /// Signed integer literal.
    Integer(i64),
    /// Floating-point literal.
    Float(f64),
    /// Boolean literal.
    Boolean(bool),
    /// The `nil` literal.
    Nil,
    /// Nested list.
    List(Vec<Form>),
}

/// An expression together with the source line it starts on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Form {
    /// Parsed expression.
    pub expr: Expr,
    /// 1-based source line.
    pub line: u32,
}

impl Form {
    /// Head symbol of a list form, if any.
    pub fn head(&self) -> Option<&str> {
        match &self.expr {
            Expr::List(items) => match items.first().map(|form| &form.expr) {
                Some(Expr::Symbol(sym)) => Some(sym.as_str()),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Parsed program: the top-level forms plus the original source text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    /// Parsed top-level forms.
    pub forms: Vec<Form>,
    /// Original source text, retained for error reporting.
    pub source: String,
}

impl Program {
    /// Construct a program from parsed forms.
    pub fn new(source: impl Into<String>, forms: Vec<Form>) -> Self {
        Self {
            source: source.into(),
            forms,
        }
    }
}
