//! Tree-walking evaluator
//!
//! Walks the parsed program with a two-level scope model (innermost function
//! frame over globals), a per-call output sink, and a shared cancel token
//! polled on statement and loop boundaries so evaluation stops promptly once
//! the deadline passes.

use crate::interp::ast::{BinaryOp, Expr, Stmt, UnaryOp};
use crate::interp::value::{write_nested, Function, Value};
use crate::interp::{CancelToken, ScriptError};
use std::collections::{HashMap, VecDeque};
use std::fmt::{self, Write as _};
use std::rc::Rc;

/// Bound on user-function call depth
const MAX_CALL_DEPTH: usize = 64;

/// Bound on elements a list or range may hold
const MAX_COLLECTION_LEN: usize = 1_000_000;

/// Limits applied to one evaluation
#[derive(Debug, Clone)]
pub struct InterpLimits {
    /// Cap on bytes the script may print
    pub max_output_bytes: usize,
    /// Cap on bytes a single string value may reach
    pub max_str_bytes: usize,
}

impl Default for InterpLimits {
    fn default() -> Self {
        InterpLimits {
            max_output_bytes: 8 * 1024 * 1024,
            max_str_bytes: 8 * 1024 * 1024,
        }
    }
}

/// Control flow escaping a statement
enum Flow {
    Normal,
    Break(usize),
    Continue(usize),
    Return(Value),
}

/// One evaluation over a fresh, empty top-level scope
pub struct Interpreter<'a> {
    globals: HashMap<String, Value>,
    frames: Vec<HashMap<String, Value>>,
    sink: &'a mut String,
    stdin_lines: VecDeque<String>,
    cancel: &'a CancelToken,
    limits: &'a InterpLimits,
    call_depth: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        sink: &'a mut String,
        stdin_data: Option<&str>,
        cancel: &'a CancelToken,
        limits: &'a InterpLimits,
    ) -> Self {
        let stdin_lines = stdin_data
            .map(|data| data.lines().map(str::to_string).collect())
            .unwrap_or_default();

        Interpreter {
            globals: HashMap::new(),
            frames: Vec::new(),
            sink,
            stdin_lines,
            cancel,
            limits,
            call_depth: 0,
        }
    }

    /// Execute a whole program
    pub fn run(&mut self, program: &[Stmt]) -> Result<(), ScriptError> {
        match self.exec_block(program)? {
            Flow::Normal => Ok(()),
            Flow::Break(line) | Flow::Continue(line) => Err(ScriptError::runtime(
                line,
                "'break' or 'continue' outside a loop",
            )),
            Flow::Return(_) => Ok(()),
        }
    }

    fn exec_block(&mut self, stmts: &[Stmt]) -> Result<Flow, ScriptError> {
        for stmt in stmts {
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Flow, ScriptError> {
        self.check_deadline()?;

        match stmt {
            Stmt::Expr(expr) => {
                self.eval_expr(expr)?;
                Ok(Flow::Normal)
            }
            Stmt::Assign { name, value } => {
                let value = self.eval_expr(value)?;
                self.set_var(name, value);
                Ok(Flow::Normal)
            }
            Stmt::AssignIndex {
                target,
                index,
                value,
                line,
            } => {
                let target = self.eval_expr(target)?;
                let index = self.eval_expr(index)?;
                let value = self.eval_expr(value)?;
                self.assign_index(target, index, value, *line)?;
                Ok(Flow::Normal)
            }
            Stmt::If {
                cond,
                then_block,
                else_block,
            } => {
                if self.eval_expr(cond)?.is_truthy() {
                    self.exec_block(then_block)
                } else if let Some(else_block) = else_block {
                    self.exec_block(else_block)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { cond, body } => {
                loop {
                    self.check_deadline()?;
                    if !self.eval_expr(cond)?.is_truthy() {
                        break;
                    }
                    match self.exec_block(body)? {
                        Flow::Normal | Flow::Continue(_) => {}
                        Flow::Break(_) => break,
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                var,
                iterable,
                body,
                line,
            } => {
                let items = self.iterable_items(iterable, *line)?;
                for item in items {
                    self.check_deadline()?;
                    self.set_var(var, item);
                    match self.exec_block(body)? {
                        Flow::Normal | Flow::Continue(_) => {}
                        Flow::Break(_) => break,
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::FnDef { name, params, body } => {
                let function = Value::Function(Rc::new(Function {
                    name: name.clone(),
                    params: params.clone(),
                    body: body.clone(),
                }));
                self.set_var(name, function);
                Ok(Flow::Normal)
            }
            Stmt::Return { value, line: _ } => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr)?,
                    None => Value::Nil,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Break { line } => Ok(Flow::Break(*line)),
            Stmt::Continue { line } => Ok(Flow::Continue(*line)),
        }
    }

    /// Snapshot of the values a `for` loop walks
    fn iterable_items(&mut self, iterable: &Expr, line: usize) -> Result<Vec<Value>, ScriptError> {
        match self.eval_expr(iterable)? {
            Value::List(items) => Ok(items.borrow().clone()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::str(c.to_string())).collect()),
            other => Err(ScriptError::runtime(
                line,
                format!("'{}' is not iterable", other.type_name()),
            )),
        }
    }

    fn assign_index(
        &mut self,
        target: Value,
        index: Value,
        value: Value,
        line: usize,
    ) -> Result<(), ScriptError> {
        match target {
            Value::List(items) => {
                let mut items = items.borrow_mut();
                let len = items.len();
                let i = normalize_index(&index, len, line)?;
                items[i] = value;
                Ok(())
            }
            Value::Str(_) => Err(ScriptError::runtime(line, "cannot assign into a string")),
            other => Err(ScriptError::runtime(
                line,
                format!("'{}' does not support index assignment", other.type_name()),
            )),
        }
    }

    fn eval_expr(&mut self, expr: &Expr) -> Result<Value, ScriptError> {
        match expr {
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::Float(f) => Ok(Value::Float(*f)),
            Expr::Str(s) => Ok(Value::str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Nil => Ok(Value::Nil),
            Expr::Var { name, line } => match self.lookup(name) {
                Some(value) => Ok(value),
                None => Err(ScriptError::runtime(
                    *line,
                    format!("undefined variable: '{}'", name),
                )),
            },
            Expr::List { items, .. } => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(item)?);
                }
                Ok(Value::list(values))
            }
            Expr::Unary { op, operand, line } => {
                let operand = self.eval_expr(operand)?;
                self.apply_unary(*op, operand, *line)
            }
            Expr::Binary {
                op,
                left,
                right,
                line,
            } => match op {
                // `and`/`or` short-circuit and yield the deciding operand.
                BinaryOp::And => {
                    let left = self.eval_expr(left)?;
                    if left.is_truthy() {
                        self.eval_expr(right)
                    } else {
                        Ok(left)
                    }
                }
                BinaryOp::Or => {
                    let left = self.eval_expr(left)?;
                    if left.is_truthy() {
                        Ok(left)
                    } else {
                        self.eval_expr(right)
                    }
                }
                _ => {
                    let left = self.eval_expr(left)?;
                    let right = self.eval_expr(right)?;
                    self.apply_binary(*op, left, right, *line)
                }
            },
            Expr::Call { callee, args, line } => {
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(self.eval_expr(arg)?);
                }

                // A bare unbound name resolves to a builtin; user bindings
                // shadow builtins, and unknown names fall out of
                // `call_builtin` as undefined.
                if let Expr::Var { name, .. } = callee.as_ref() {
                    if self.lookup(name).is_none() {
                        return self.call_builtin(name, arg_values, *line);
                    }
                }

                match self.eval_expr(callee)? {
                    Value::Function(function) => self.call_function(&function, arg_values, *line),
                    other => Err(ScriptError::runtime(
                        *line,
                        format!("'{}' is not callable", other.type_name()),
                    )),
                }
            }
            Expr::Index {
                target,
                index,
                line,
            } => {
                let target = self.eval_expr(target)?;
                let index = self.eval_expr(index)?;
                self.eval_index(target, index, *line)
            }
        }
    }

    fn eval_index(&self, target: Value, index: Value, line: usize) -> Result<Value, ScriptError> {
        match target {
            Value::List(items) => {
                let items = items.borrow();
                let i = normalize_index(&index, items.len(), line)?;
                Ok(items[i].clone())
            }
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                let i = normalize_index(&index, chars.len(), line)?;
                Ok(Value::str(chars[i].to_string()))
            }
            other => Err(ScriptError::runtime(
                line,
                format!("'{}' is not indexable", other.type_name()),
            )),
        }
    }

    fn call_function(
        &mut self,
        function: &Rc<Function>,
        args: Vec<Value>,
        line: usize,
    ) -> Result<Value, ScriptError> {
        self.check_deadline()?;

        if args.len() != function.params.len() {
            return Err(ScriptError::runtime(
                line,
                format!(
                    "fn '{}' expects {} arguments, got {}",
                    function.name,
                    function.params.len(),
                    args.len()
                ),
            ));
        }
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(ScriptError::runtime(line, "maximum call depth exceeded"));
        }

        let frame: HashMap<String, Value> =
            function.params.iter().cloned().zip(args).collect();
        self.frames.push(frame);
        self.call_depth += 1;

        let result = self.exec_block(&function.body);

        self.call_depth -= 1;
        self.frames.pop();

        match result? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nil),
            Flow::Break(l) | Flow::Continue(l) => Err(ScriptError::runtime(
                l,
                "'break' or 'continue' outside a loop",
            )),
        }
    }

    fn call_builtin(
        &mut self,
        name: &str,
        args: Vec<Value>,
        line: usize,
    ) -> Result<Value, ScriptError> {
        match name {
            "print" => {
                // Rendering happens directly into the sink against the
                // remaining output budget, so a huge value never builds an
                // intermediate string larger than the cap.
                let budget = self.limits.max_output_bytes.saturating_sub(self.sink.len());
                let mut writer = BoundedWriter::new(&mut *self.sink, budget, self.cancel);
                let mut wrote = Ok(());
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        wrote = wrote.and_then(|()| writer.write_str(" "));
                    }
                    wrote = wrote.and_then(|()| write_nested(arg, &mut writer, 0));
                }
                wrote = wrote.and_then(|()| writer.write_char('\n'));
                match wrote {
                    Ok(()) => Ok(Value::Nil),
                    Err(_) => match writer.halt {
                        Some(RenderHalt::Deadline) => Err(ScriptError::timeout()),
                        _ => Err(ScriptError::runtime(line, "output limit exceeded")),
                    },
                }
            }
            "len" => {
                let [value] = fixed_args::<1>(name, args, line)?;
                match value {
                    Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
                    Value::List(items) => Ok(Value::Int(items.borrow().len() as i64)),
                    other => Err(ScriptError::runtime(
                        line,
                        format!("len() does not accept '{}'", other.type_name()),
                    )),
                }
            }
            "str" => {
                let [value] = fixed_args::<1>(name, args, line)?;
                let mut rendered = String::new();
                let mut writer =
                    BoundedWriter::new(&mut rendered, self.limits.max_str_bytes, self.cancel);
                if write_nested(&value, &mut writer, 0).is_err() {
                    return match writer.halt {
                        Some(RenderHalt::Deadline) => Err(ScriptError::timeout()),
                        _ => Err(ScriptError::runtime(line, "string too large")),
                    };
                }
                Ok(Value::str(rendered))
            }
            "int" => {
                let [value] = fixed_args::<1>(name, args, line)?;
                match value {
                    Value::Int(i) => Ok(Value::Int(i)),
                    Value::Float(f) => {
                        if f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                            Ok(Value::Int(f as i64))
                        } else {
                            Err(ScriptError::runtime(line, "float out of integer range"))
                        }
                    }
                    Value::Bool(b) => Ok(Value::Int(b as i64)),
                    Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
                        // The offending value can be arbitrarily large; clip
                        // what the message echoes back.
                        let shown: String = s.chars().take(64).collect();
                        ScriptError::runtime(
                            line,
                            format!("invalid literal for int(): '{}'", shown),
                        )
                    }),
                    other => Err(ScriptError::runtime(
                        line,
                        format!("int() does not accept '{}'", other.type_name()),
                    )),
                }
            }
            "abs" => {
                let [value] = fixed_args::<1>(name, args, line)?;
                match value {
                    Value::Int(i) => i.checked_abs().map(Value::Int).ok_or_else(|| {
                        ScriptError::runtime(line, "integer overflow in abs()")
                    }),
                    Value::Float(f) => Ok(Value::Float(f.abs())),
                    other => Err(ScriptError::runtime(
                        line,
                        format!("abs() does not accept '{}'", other.type_name()),
                    )),
                }
            }
            "range" => {
                let (start, end) = match args.len() {
                    1 => (0, int_arg(name, &args[0], line)?),
                    2 => (
                        int_arg(name, &args[0], line)?,
                        int_arg(name, &args[1], line)?,
                    ),
                    n => {
                        return Err(ScriptError::runtime(
                            line,
                            format!("range() expects 1 or 2 arguments, got {}", n),
                        ))
                    }
                };
                let span = end.saturating_sub(start).max(0) as usize;
                if span > MAX_COLLECTION_LEN {
                    return Err(ScriptError::runtime(line, "range too large"));
                }
                Ok(Value::list((start..end).map(Value::Int).collect()))
            }
            "push" => {
                let [target, value] = fixed_args::<2>(name, args, line)?;
                match target {
                    Value::List(items) => {
                        let mut items = items.borrow_mut();
                        if items.len() >= MAX_COLLECTION_LEN {
                            return Err(ScriptError::runtime(line, "list too large"));
                        }
                        items.push(value);
                        Ok(Value::Nil)
                    }
                    other => Err(ScriptError::runtime(
                        line,
                        format!("push() does not accept '{}'", other.type_name()),
                    )),
                }
            }
            "input" => {
                if !args.is_empty() {
                    return Err(ScriptError::runtime(
                        line,
                        format!("input() expects 0 arguments, got {}", args.len()),
                    ));
                }
                match self.stdin_lines.pop_front() {
                    Some(text) => Ok(Value::str(text)),
                    None => Ok(Value::Nil),
                }
            }
            _ => Err(ScriptError::runtime(
                line,
                format!("undefined function: '{}'", name),
            )),
        }
    }

    fn apply_unary(&self, op: UnaryOp, operand: Value, line: usize) -> Result<Value, ScriptError> {
        match op {
            UnaryOp::Neg => match operand {
                Value::Int(i) => i
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| ScriptError::runtime(line, "integer overflow")),
                Value::Float(f) => Ok(Value::Float(-f)),
                other => Err(ScriptError::runtime(
                    line,
                    format!("cannot negate '{}'", other.type_name()),
                )),
            },
            UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
        }
    }

    fn apply_binary(
        &self,
        op: BinaryOp,
        left: Value,
        right: Value,
        line: usize,
    ) -> Result<Value, ScriptError> {
        match op {
            BinaryOp::Add => match (left, right) {
                (Value::Int(a), Value::Int(b)) => a
                    .checked_add(b)
                    .map(Value::Int)
                    .ok_or_else(|| ScriptError::runtime(line, "integer overflow")),
                (Value::Str(a), Value::Str(b)) => {
                    if a.len() + b.len() > self.limits.max_str_bytes {
                        return Err(ScriptError::runtime(line, "string too large"));
                    }
                    let mut joined = String::with_capacity(a.len() + b.len());
                    joined.push_str(&a);
                    joined.push_str(&b);
                    Ok(Value::str(joined))
                }
                (Value::List(a), Value::List(b)) => {
                    let a = a.borrow();
                    let b = b.borrow();
                    if a.len() + b.len() > MAX_COLLECTION_LEN {
                        return Err(ScriptError::runtime(line, "list too large"));
                    }
                    let mut joined = Vec::with_capacity(a.len() + b.len());
                    joined.extend(a.iter().cloned());
                    joined.extend(b.iter().cloned());
                    Ok(Value::list(joined))
                }
                (a, b) => match promote(&a, &b) {
                    Some((x, y)) => Ok(Value::Float(x + y)),
                    None => Err(type_error(op, &a, &b, line)),
                },
            },
            BinaryOp::Sub => self.arith(op, left, right, line, i64::checked_sub, |a, b| a - b),
            BinaryOp::Mul => self.arith(op, left, right, line, i64::checked_mul, |a, b| a * b),
            // Division always yields a float, like the other dynamic
            // languages users arrive from. A zero divisor of either type is
            // an error; -0.0 compares equal to 0.0, so both signs are caught.
            BinaryOp::Div => match promote(&left, &right) {
                Some((_, b)) if b == 0.0 => Err(ScriptError::runtime(line, "division by zero")),
                Some((a, b)) => Ok(Value::Float(a / b)),
                None => Err(type_error(op, &left, &right, line)),
            },
            BinaryOp::Mod => match (&left, &right) {
                (Value::Int(_), Value::Int(0)) => {
                    Err(ScriptError::runtime(line, "modulo by zero"))
                }
                // checked_rem_euclid rejects i64::MIN % -1, which overflows.
                (Value::Int(a), Value::Int(b)) => a
                    .checked_rem_euclid(*b)
                    .map(Value::Int)
                    .ok_or_else(|| ScriptError::runtime(line, "integer overflow")),
                _ => match promote(&left, &right) {
                    Some((_, b)) if b == 0.0 => {
                        Err(ScriptError::runtime(line, "modulo by zero"))
                    }
                    Some((a, b)) => Ok(Value::Float(a % b)),
                    None => Err(type_error(op, &left, &right, line)),
                },
            },
            BinaryOp::Eq => Ok(Value::Bool(left.equals(&right))),
            BinaryOp::Ne => Ok(Value::Bool(!left.equals(&right))),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let ordering = match (&left, &right) {
                    (Value::Str(a), Value::Str(b)) => a.cmp(b),
                    _ => match promote(&left, &right) {
                        Some((a, b)) => match a.partial_cmp(&b) {
                            Some(ordering) => ordering,
                            None => {
                                return Err(ScriptError::runtime(
                                    line,
                                    "values are not comparable",
                                ))
                            }
                        },
                        None => return Err(type_error(op, &left, &right, line)),
                    },
                };
                let result = match op {
                    BinaryOp::Lt => ordering.is_lt(),
                    BinaryOp::Le => ordering.is_le(),
                    BinaryOp::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                };
                Ok(Value::Bool(result))
            }
            BinaryOp::And | BinaryOp::Or => unreachable!("short-circuit ops handled in eval_expr"),
        }
    }

    /// Shared path for `-` and `*`: checked on ints, promoting on floats.
    fn arith(
        &self,
        op: BinaryOp,
        left: Value,
        right: Value,
        line: usize,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Result<Value, ScriptError> {
        match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => int_op(*a, *b)
                .map(Value::Int)
                .ok_or_else(|| ScriptError::runtime(line, "integer overflow")),
            _ => match promote(&left, &right) {
                Some((a, b)) => Ok(Value::Float(float_op(a, b))),
                None => Err(type_error(op, &left, &right, line)),
            },
        }
    }

    fn check_deadline(&self) -> Result<(), ScriptError> {
        if self.cancel.expired() {
            Err(ScriptError::timeout())
        } else {
            Ok(())
        }
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(frame) = self.frames.last() {
            if let Some(value) = frame.get(name) {
                return Some(value.clone());
            }
        }
        self.globals.get(name).cloned()
    }

    fn set_var(&mut self, name: &str, value: Value) {
        match self.frames.last_mut() {
            Some(frame) => {
                frame.insert(name.to_string(), value);
            }
            None => {
                self.globals.insert(name.to_string(), value);
            }
        }
    }
}

/// Writes between deadline polls while rendering
const RENDER_POLL_STRIDE: usize = 1024;

/// Why a bounded render stopped early
enum RenderHalt {
    Budget,
    Deadline,
}

/// `fmt::Write` adapter that refuses writes past a byte budget and polls the
/// cancel token, keeping render work proportional to the budget rather than
/// to the size of the value.
struct BoundedWriter<'a, W: fmt::Write> {
    out: &'a mut W,
    remaining: usize,
    cancel: &'a CancelToken,
    writes: usize,
    halt: Option<RenderHalt>,
}

impl<'a, W: fmt::Write> BoundedWriter<'a, W> {
    fn new(out: &'a mut W, budget: usize, cancel: &'a CancelToken) -> Self {
        BoundedWriter {
            out,
            remaining: budget,
            cancel,
            writes: 0,
            halt: None,
        }
    }
}

impl<W: fmt::Write> fmt::Write for BoundedWriter<'_, W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.writes += 1;
        if self.writes % RENDER_POLL_STRIDE == 0 && self.cancel.expired() {
            self.halt = Some(RenderHalt::Deadline);
            return Err(fmt::Error);
        }
        if s.len() > self.remaining {
            self.halt = Some(RenderHalt::Budget);
            return Err(fmt::Error);
        }
        self.remaining -= s.len();
        self.out.write_str(s)
    }
}

/// Numeric promotion to f64 when either side is a float
fn promote(left: &Value, right: &Value) -> Option<(f64, f64)> {
    let as_f64 = |v: &Value| match v {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    };
    Some((as_f64(left)?, as_f64(right)?))
}

fn type_error(op: BinaryOp, left: &Value, right: &Value, line: usize) -> ScriptError {
    ScriptError::runtime(
        line,
        format!(
            "unsupported operand types for '{}': {} and {}",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ),
    )
}

fn int_arg(builtin: &str, value: &Value, line: usize) -> Result<i64, ScriptError> {
    match value {
        Value::Int(i) => Ok(*i),
        other => Err(ScriptError::runtime(
            line,
            format!("{}() expects an int, got '{}'", builtin, other.type_name()),
        )),
    }
}

fn fixed_args<const N: usize>(
    builtin: &str,
    args: Vec<Value>,
    line: usize,
) -> Result<[Value; N], ScriptError> {
    let got = args.len();
    args.try_into().map_err(|_| {
        ScriptError::runtime(
            line,
            format!("{}() expects {} arguments, got {}", builtin, N, got),
        )
    })
}

/// Python-style index normalization: negatives count from the end.
fn normalize_index(index: &Value, len: usize, line: usize) -> Result<usize, ScriptError> {
    let i = match index {
        Value::Int(i) => *i,
        other => {
            return Err(ScriptError::runtime(
                line,
                format!("index must be an int, got '{}'", other.type_name()),
            ))
        }
    };
    let adjusted = if i < 0 { i + len as i64 } else { i };
    if adjusted < 0 || adjusted as usize >= len {
        return Err(ScriptError::runtime(
            line,
            format!("index {} out of range for length {}", i, len),
        ));
    }
    Ok(adjusted as usize)
}
