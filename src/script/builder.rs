use std::collections::HashMap;

use super::builtins::Builtin;
use super::ir::{Expression, Function, Literal, ProgramIr, Stmt, StmtKind};
use super::{Expr, Form, Program, Result, ScriptError};

const SPECIAL_FORMS: &[&str] = &[
    "define", "set!", "if", "while", "for", "begin", "defn", "return", "break", "raise", "and",
    "or",
];

/// Build a typed IR from a parsed program.
///
/// Top-level `defn` forms are hoisted so functions can call each other
/// regardless of definition order.
pub fn build_ir(program: &Program) -> Result<ProgramIr> {
    let mut builder = Builder::default();
    for form in &program.forms {
        if form.head() == Some("defn") {
            builder.declare(form)?;
        }
    }

    let mut body = Vec::new();
    for form in &program.forms {
        if form.head() == Some("defn") {
            builder.define(form)?;
        } else {
            body.push(builder.stmt(form, Scope::default())?);
        }
    }

    Ok(ProgramIr {
        body,
        functions: builder.functions,
    })
}

#[derive(Debug, Clone, Copy, Default)]
struct Scope {
    in_function: bool,
    in_loop: bool,
}

#[derive(Default)]
struct Builder {
    functions: Vec<Function>,
    index: HashMap<String, usize>,
}

impl Builder {
    fn declare(&mut self, form: &Form) -> Result<()> {
        let items = list_items(form);
        if items.len() < 3 {
            return Err(validation(form.line, "defn requires a name and a parameter list"));
        }
        let name = binding_name(&items[1])?;
        if self.index.contains_key(&name) {
            return Err(validation(
                form.line,
                format!("function `{}` is defined twice", name),
            ));
        }
        let Expr::List(raw_params) = &items[2].expr else {
            return Err(validation(items[2].line, "defn parameters must be a list"));
        };
        let mut params = Vec::with_capacity(raw_params.len());
        for param in raw_params {
            let param_name = binding_name(param)?;
            if params.contains(&param_name) {
                return Err(validation(
                    param.line,
                    format!("duplicate parameter `{}`", param_name),
                ));
            }
            params.push(param_name);
        }

        self.index.insert(name.clone(), self.functions.len());
        self.functions.push(Function {
            name,
            params,
            body: Vec::new(),
            line: form.line,
        });
        Ok(())
    }

    fn define(&mut self, form: &Form) -> Result<()> {
        let items = list_items(form);
        let name = binding_name(&items[1])?;
        let scope = Scope {
            in_function: true,
            in_loop: false,
        };
        let body = self.block(&items[3..], scope)?;
        let index = self.index.get(&name).copied().ok_or_else(|| {
            validation(form.line, format!("function `{}` was not declared", name))
        })?;
        self.functions[index].body = body;
        Ok(())
    }

    fn block(&self, forms: &[Form], scope: Scope) -> Result<Vec<Stmt>> {
        forms.iter().map(|form| self.stmt(form, scope)).collect()
    }

    fn stmt(&self, form: &Form, scope: Scope) -> Result<Stmt> {
        let line = form.line;
        let items = list_items(form);
        let kind = match form.head() {
            Some("define") | Some("set!") => {
                expect_len(form, 3, "(define|set! name value)")?;
                let name = binding_name(&items[1])?;
                let value = self.expr(&items[2])?;
                if form.head() == Some("define") {
                    StmtKind::Define { name, value }
                } else {
                    StmtKind::Assign { name, value }
                }
            }
            Some("if") => {
                if !(3..=4).contains(&items.len()) {
                    return Err(validation(line, "if expects a condition, a branch and an optional else branch"));
                }
                StmtKind::If {
                    condition: self.expr(&items[1])?,
                    then_branch: vec![self.stmt(&items[2], scope)?],
                    else_branch: match items.get(3) {
                        Some(other) => vec![self.stmt(other, scope)?],
                        None => Vec::new(),
                    },
                }
            }
            Some("while") => {
                if items.len() < 2 {
                    return Err(validation(line, "while requires a condition"));
                }
                StmtKind::While {
                    condition: self.expr(&items[1])?,
                    body: self.block(&items[2..], Scope { in_loop: true, ..scope })?,
                }
            }
            Some("for") => {
                if items.len() < 3 {
                    return Err(validation(line, "for requires a variable and an iterable"));
                }
                StmtKind::For {
                    variable: binding_name(&items[1])?,
                    iterable: self.expr(&items[2])?,
                    body: self.block(&items[3..], Scope { in_loop: true, ..scope })?,
                }
            }
            Some("begin") => StmtKind::Block(self.block(&items[1..], scope)?),
            Some("defn") => return Err(validation(line, "defn is only allowed at top level")),
            Some("return") => {
                if !scope.in_function {
                    return Err(validation(line, "return outside of a function"));
                }
                match items.len() {
                    1 => StmtKind::Return(None),
                    2 => StmtKind::Return(Some(self.expr(&items[1])?)),
                    _ => return Err(validation(line, "return takes at most one value")),
                }
            }
            Some("break") => {
                if !scope.in_loop {
                    return Err(validation(line, "break outside of a loop"));
                }
                expect_len(form, 1, "(break)")?;
                StmtKind::Break
            }
            Some("raise") => {
                expect_len(form, 2, "(raise message)")?;
                StmtKind::Raise(self.expr(&items[1])?)
            }
            _ => StmtKind::Expr(self.expr(form)?),
        };
        Ok(Stmt { line, kind })
    }

    fn expr(&self, form: &Form) -> Result<Expression> {
        let line = form.line;
        let items = match &form.expr {
            Expr::Nil => return Ok(Expression::Literal(Literal::Nil)),
            Expr::Boolean(flag) => return Ok(Expression::Literal(Literal::Boolean(*flag))),
            Expr::Integer(num) => return Ok(Expression::Literal(Literal::Integer(*num))),
            Expr::Float(num) => return Ok(Expression::Literal(Literal::Float(*num))),
            Expr::String(text) => return Ok(Expression::Literal(Literal::String(text.clone()))),
            Expr::Symbol(sym) => {
                if is_reserved(sym) {
                    return Err(validation(
                        line,
                        format!("`{}` cannot be used as a value", sym),
                    ));
                }
                return Ok(Expression::Variable(sym.clone()));
            }
            Expr::List(items) => items,
        };

        let Some(head) = form.head() else {
            return Err(validation(line, "call head must be a symbol"));
        };
        let args = &items[1..];
        match head {
            "and" | "or" => {
                if args.is_empty() {
                    return Err(validation(line, format!("{} requires an operand", head)));
                }
                let operands = self.exprs(args)?;
                Ok(if head == "and" {
                    Expression::And(operands)
                } else {
                    Expression::Or(operands)
                })
            }
            "if" => {
                if !(2..=3).contains(&args.len()) {
                    return Err(validation(line, "if expects a condition, a value and an optional else value"));
                }
                Ok(Expression::If {
                    condition: Box::new(self.expr(&args[0])?),
                    then_branch: Box::new(self.expr(&args[1])?),
                    else_branch: match args.get(2) {
                        Some(other) => Some(Box::new(self.expr(other)?)),
                        None => None,
                    },
                })
            }
            special if SPECIAL_FORMS.contains(&special) => Err(validation(
                line,
                format!("`{}` is a statement and cannot be used as a value", special),
            )),
            name => {
                if let Some(builtin) = Builtin::from_name(name) {
                    let arity = builtin.arity();
                    if !arity.accepts(args.len()) {
                        return Err(validation(
                            line,
                            format!(
                                "`{}` takes {} arguments, got {}",
                                name,
                                arity.describe(),
                                args.len()
                            ),
                        ));
                    }
                    return Ok(Expression::Builtin {
                        builtin,
                        args: self.exprs(args)?,
                    });
                }
                let function = self
                    .index
                    .get(name)
                    .copied()
                    .ok_or_else(|| validation(line, format!("unknown function `{}`", name)))?;
                let expected = self.functions[function].params.len();
                if expected != args.len() {
                    return Err(validation(
                        line,
                        format!(
                            "`{}` takes {} arguments, got {}",
                            name,
                            expected,
                            args.len()
                        ),
                    ));
                }
                Ok(Expression::Call {
                    function,
                    args: self.exprs(args)?,
                })
            }
        }
    }

    fn exprs(&self, forms: &[Form]) -> Result<Vec<Expression>> {
        forms.iter().map(|form| self.expr(form)).collect()
    }
}

fn is_reserved(name: &str) -> bool {
    SPECIAL_FORMS.contains(&name) || Builtin::from_name(name).is_some()
}

fn list_items(form: &Form) -> &[Form] {
    match &form.expr {
        Expr::List(items) => items,
        _ => &[],
    }
}

fn binding_name(form: &Form) -> Result<String> {
    match &form.expr {
        Expr::Symbol(sym) if !is_reserved(sym) => Ok(sym.clone()),
        Expr::Symbol(sym) => Err(validation(
            form.line,
            format!("`{}` is reserved and cannot be rebound", sym),
        )),
        _ => Err(validation(form.line, "expected a name")),
    }
}

fn expect_len(form: &Form, len: usize, shape: &str) -> Result<()> {
    if list_items(form).len() == len {
        Ok(())
    } else {
        Err(validation(form.line, format!("expected {}", shape)))
    }
}

fn validation(line: u32, message: impl Into<String>) -> ScriptError {
    ScriptError::Validation {
        message: message.into(),
        line,
    }
}
