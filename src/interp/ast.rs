//! Abstract syntax tree for the script language

use std::rc::Rc;

/// A statement
#[derive(Clone, Debug)]
pub enum Stmt {
    /// Expression evaluated for its effect
    Expr(Expr),
    /// `name = value`
    Assign {
        name: String,
        value: Expr,
    },
    /// `target[index] = value`
    AssignIndex {
        target: Expr,
        index: Expr,
        value: Expr,
        line: usize,
    },
    /// `if cond { } else if cond { } else { }`, desugared so the else block
    /// of a chained `else if` holds a single nested `If`
    If {
        cond: Expr,
        then_block: Vec<Stmt>,
        else_block: Option<Vec<Stmt>>,
    },
    /// `while cond { }`
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    /// `for var in iterable { }`
    For {
        var: String,
        iterable: Expr,
        body: Vec<Stmt>,
        line: usize,
    },
    /// `fn name(params) { }`
    FnDef {
        name: String,
        params: Vec<String>,
        body: Rc<Vec<Stmt>>,
    },
    /// `return` / `return expr`
    Return {
        value: Option<Expr>,
        line: usize,
    },
    /// `break`
    Break {
        line: usize,
    },
    /// `continue`
    Continue {
        line: usize,
    },
}

/// An expression
#[derive(Clone, Debug)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Nil,
    /// Variable reference
    Var {
        name: String,
        line: usize,
    },
    /// `[a, b, c]`
    List {
        items: Vec<Expr>,
        line: usize,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        line: usize,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        line: usize,
    },
    /// `callee(args)`
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        line: usize,
    },
    /// `target[index]`
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
        line: usize,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}
