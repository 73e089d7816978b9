//! Runtime values for the script language

use crate::interp::ast::Stmt;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Nesting bound for display and equality so cyclic lists terminate
const MAX_NEST: usize = 32;

/// A user-defined function
#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub body: Rc<Vec<Stmt>>,
}

/// A runtime value. Lists have reference semantics: clones share storage.
#[derive(Clone, Debug)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(Rc<String>),
    Bool(bool),
    Nil,
    List(Rc<RefCell<Vec<Value>>>),
    Function(Rc<Function>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(Rc::new(s.into()))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bool(_) => "bool",
            Value::Nil => "nil",
            Value::List(_) => "list",
            Value::Function(_) => "function",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Function(_) => true,
        }
    }

    pub fn equals(&self, other: &Value) -> bool {
        eq_at(self, other, 0)
    }
}

fn eq_at(a: &Value, b: &Value, depth: usize) -> bool {
    if depth > MAX_NEST {
        return false;
    }
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => *x as f64 == *y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Nil, Value::Nil) => true,
        (Value::List(x), Value::List(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let xs = x.borrow();
            let ys = y.borrow();
            xs.len() == ys.len() && xs.iter().zip(ys.iter()).all(|(a, b)| eq_at(a, b, depth + 1))
        }
        (Value::Function(x), Value::Function(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_nested(self, f, 0)
    }
}

/// Render `value` into any writer, bounding cycle-induced list recursion.
/// Shared by `Display` and the evaluator's budgeted render paths.
pub(crate) fn write_nested<W: fmt::Write>(value: &Value, out: &mut W, depth: usize) -> fmt::Result {
    if depth > MAX_NEST {
        return out.write_str("[...]");
    }
    match value {
        Value::Int(i) => write!(out, "{}", i),
        Value::Float(x) => write!(out, "{}", x),
        Value::Str(s) => out.write_str(s),
        Value::Bool(b) => write!(out, "{}", b),
        Value::Nil => out.write_str("nil"),
        Value::List(items) => {
            out.write_str("[")?;
            for (i, item) in items.borrow().iter().enumerate() {
                if i > 0 {
                    out.write_str(", ")?;
                }
                write_nested(item, out, depth + 1)?;
            }
            out.write_str("]")
        }
        Value::Function(func) => write!(out, "<fn {}>", func.name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(!Value::str("").is_truthy());
        assert!(!Value::list(vec![]).is_truthy());
        assert!(Value::Int(-1).is_truthy());
        assert!(Value::str("x").is_truthy());
        assert!(Value::list(vec![Value::Nil]).is_truthy());
    }

    #[test]
    fn test_numeric_equality_promotes() {
        assert!(Value::Int(1).equals(&Value::Float(1.0)));
        assert!(Value::Float(2.5).equals(&Value::Float(2.5)));
        assert!(!Value::Int(1).equals(&Value::Int(2)));
        assert!(!Value::Int(1).equals(&Value::str("1")));
    }

    #[test]
    fn test_list_equality_is_deep() {
        let a = Value::list(vec![Value::Int(1), Value::str("x")]);
        let b = Value::list(vec![Value::Int(1), Value::str("x")]);
        let c = Value::list(vec![Value::Int(1)]);
        assert!(a.equals(&b));
        assert!(!a.equals(&c));
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::str("hi").to_string(), "hi");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Nil.to_string(), "nil");
        let list = Value::list(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(list.to_string(), "[1, 2]");
    }

    #[test]
    fn test_cyclic_list_display_terminates() {
        let inner = Rc::new(RefCell::new(vec![Value::Int(1)]));
        let list = Value::List(inner.clone());
        inner.borrow_mut().push(Value::List(inner.clone()));
        // Must not recurse forever.
        let rendered = list.to_string();
        assert!(rendered.contains("[...]"));
    }
}
