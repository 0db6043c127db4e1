//! Tree-walking interpreter for binding programs
//!
//! One `Interp` exists per call. It owns the per-call scope, the trigger
//! buffer, and the fuel counter; all three are discarded when the call ends.
//! Fuel is charged once per AST node visited, so a runaway script fails with
//! `TimedOut` instead of hanging the caller.

use super::scope::CallScope;
use super::Evaluation;
use crate::error::EvalError;
use crate::parser::{BinaryOp, Expr, LValue, PathSeg, Program, Stmt, UnaryOp};
use crate::triggers::TriggerAction;
use crate::values::{ScriptGlobals, Val};
use std::collections::HashMap;

/// Reserved name of the trigger-collection intrinsic; cannot be shadowed
pub const TRIGGER_INTRINSIC: &str = "trigger";

pub struct Interp<'a> {
    scope: CallScope<'a>,
    triggers: Vec<TriggerAction>,
    fuel: u64,
    budget: u64,
}

impl<'a> Interp<'a> {
    pub fn new(
        libraries: &'a HashMap<String, Val>,
        context: &ScriptGlobals,
        callback_data: Option<&Val>,
        budget: u64,
    ) -> Self {
        Interp {
            scope: CallScope::new(libraries, context, callback_data),
            triggers: Vec::new(),
            fuel: budget,
            budget,
        }
    }

    /// Run a program to completion, consuming the interpreter.
    ///
    /// The result value is the value of the final statement when it is an
    /// expression statement, null otherwise. On error the trigger buffer is
    /// dropped with the rest of the per-call state (all-or-nothing).
    pub fn run(mut self, program: &Program) -> Result<Evaluation, EvalError> {
        let mut value = Val::Null;
        for stmt in &program.body {
            value = self.exec_stmt(stmt)?;
        }
        Ok(Evaluation {
            value,
            triggers: self.triggers,
        })
    }

    fn charge(&mut self) -> Result<(), EvalError> {
        if self.fuel == 0 {
            return Err(EvalError::TimedOut {
                budget: self.budget,
            });
        }
        self.fuel -= 1;
        Ok(())
    }

    /* ===================== Statements ===================== */

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Val, EvalError> {
        self.charge()?;
        match stmt {
            Stmt::Let { name, init } => {
                let value = self.eval_expr(init)?;
                self.scope.declare(name, value);
                Ok(Val::Null)
            }

            Stmt::Assign { target, expr } => {
                let value = self.eval_expr(expr)?;
                self.assign_target(target, value)?;
                Ok(Val::Null)
            }

            Stmt::Expr { expr } => self.eval_expr(expr),
        }
    }

    fn assign_target(&mut self, target: &LValue, value: Val) -> Result<(), EvalError> {
        if target.path.is_empty() {
            self.scope.assign(&target.base, value);
            return Ok(());
        }

        // Evaluate index expressions before borrowing the target mutably
        let mut keys = Vec::with_capacity(target.path.len());
        for seg in &target.path {
            keys.push(match seg {
                PathSeg::Member { property } => PathKey::Member(property.clone()),
                PathSeg::Index { index } => match self.eval_expr(index)? {
                    Val::Num(n) => PathKey::Index(n),
                    Val::Str(s) => PathKey::Member(s),
                    other => {
                        return Err(EvalError::runtime(format!(
                            "cannot index with a {}",
                            other.type_name()
                        )))
                    }
                },
            });
        }

        let base = target.base.clone();
        let mut current = self.scope.resolve_mut(&base).ok_or_else(|| {
            EvalError::runtime(format!("{} is not defined", base))
        })?;

        let (last, walk) = keys.split_last().unwrap();
        for key in walk {
            current = place(current, key)?;
        }
        *place(current, last)? = value;
        Ok(())
    }

    /* ===================== Expressions ===================== */

    fn eval_expr(&mut self, expr: &Expr) -> Result<Val, EvalError> {
        self.charge()?;
        match expr {
            Expr::LitNull => Ok(Val::Null),
            Expr::LitBool { v } => Ok(Val::Bool(*v)),
            Expr::LitNum { v } => Ok(Val::Num(*v)),
            Expr::LitStr { v } => Ok(Val::Str(v.clone())),

            Expr::List { items } => {
                let values = items
                    .iter()
                    .map(|item| self.eval_expr(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Val::List(values))
            }

            Expr::Map { entries } => {
                let mut map = HashMap::with_capacity(entries.len());
                for entry in entries {
                    let value = self.eval_expr(&entry.value)?;
                    map.insert(entry.key.clone(), value);
                }
                Ok(Val::Obj(map))
            }

            Expr::Ident { name } => self
                .scope
                .lookup(name)
                .ok_or_else(|| EvalError::runtime(format!("{} is not defined", name))),

            Expr::Member { object, property } => {
                let object = self.eval_expr(object)?;
                self.member(object, property)
            }

            Expr::Index { object, index } => {
                let object = self.eval_expr(object)?;
                let index = self.eval_expr(index)?;
                self.index(object, index)
            }

            Expr::Call { callee, args } => self.eval_call(callee, args),

            Expr::Unary { op, operand } => {
                let operand = self.eval_expr(operand)?;
                match op {
                    UnaryOp::Not => Ok(Val::Bool(!operand.is_truthy())),
                    UnaryOp::Neg => match operand {
                        Val::Num(n) => Ok(Val::Num(-n)),
                        other => Err(EvalError::runtime(format!(
                            "cannot negate a {}",
                            other.type_name()
                        ))),
                    },
                }
            }

            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right),

            Expr::Ternary {
                test,
                then_e,
                else_e,
            } => {
                if self.eval_expr(test)?.is_truthy() {
                    self.eval_expr(then_e)
                } else {
                    self.eval_expr(else_e)
                }
            }
        }
    }

    fn eval_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Val, EvalError> {
        // Short-circuit forms never evaluate the right side eagerly
        match op {
            BinaryOp::And => {
                let l = self.eval_expr(left)?;
                if !l.is_truthy() {
                    return Ok(Val::Bool(false));
                }
                let r = self.eval_expr(right)?;
                return Ok(Val::Bool(r.is_truthy()));
            }
            BinaryOp::Or => {
                let l = self.eval_expr(left)?;
                if l.is_truthy() {
                    return Ok(Val::Bool(true));
                }
                let r = self.eval_expr(right)?;
                return Ok(Val::Bool(r.is_truthy()));
            }
            _ => {}
        }

        let l = self.eval_expr(left)?;
        let r = self.eval_expr(right)?;

        match op {
            BinaryOp::Add => match (&l, &r) {
                (Val::Str(_), _) | (_, Val::Str(_)) => Ok(Val::Str(format!("{}{}", l, r))),
                (Val::Num(a), Val::Num(b)) => Ok(Val::Num(a + b)),
                (Val::List(a), Val::List(b)) => {
                    let mut out = a.clone();
                    out.extend(b.iter().cloned());
                    Ok(Val::List(out))
                }
                _ => Err(EvalError::runtime(format!(
                    "cannot add {} and {}",
                    l.type_name(),
                    r.type_name()
                ))),
            },

            BinaryOp::Sub => numeric(op_symbol(op), &l, &r).map(|(a, b)| Val::Num(a - b)),
            BinaryOp::Mul => numeric(op_symbol(op), &l, &r).map(|(a, b)| Val::Num(a * b)),
            BinaryOp::Div => {
                let (a, b) = numeric(op_symbol(op), &l, &r)?;
                if b == 0.0 {
                    return Err(EvalError::runtime("division by zero"));
                }
                Ok(Val::Num(a / b))
            }
            BinaryOp::Mod => {
                let (a, b) = numeric(op_symbol(op), &l, &r)?;
                if b == 0.0 {
                    return Err(EvalError::runtime("division by zero"));
                }
                Ok(Val::Num(a % b))
            }

            BinaryOp::Eq => Ok(Val::Bool(l == r)),
            BinaryOp::Ne => Ok(Val::Bool(l != r)),

            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let ordering = match (&l, &r) {
                    (Val::Num(a), Val::Num(b)) => a.partial_cmp(b),
                    (Val::Str(a), Val::Str(b)) => Some(a.cmp(b)),
                    _ => {
                        return Err(EvalError::runtime(format!(
                            "cannot compare {} and {}",
                            l.type_name(),
                            r.type_name()
                        )))
                    }
                };
                let Some(ordering) = ordering else {
                    return Ok(Val::Bool(false));
                };
                Ok(Val::Bool(match op {
                    BinaryOp::Lt => ordering.is_lt(),
                    BinaryOp::Le => ordering.is_le(),
                    BinaryOp::Gt => ordering.is_gt(),
                    BinaryOp::Ge => ordering.is_ge(),
                    _ => unreachable!(),
                }))
            }

            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr]) -> Result<Val, EvalError> {
        // The trigger intrinsic is resolved before any scope lookup
        if let Expr::Ident { name } = callee {
            if name == TRIGGER_INTRINSIC {
                return self.collect_trigger(args);
            }
        }

        let callee_val = self.eval_expr(callee)?;
        let arg_vals = args
            .iter()
            .map(|arg| self.eval_expr(arg))
            .collect::<Result<Vec<_>, _>>()?;

        match callee_val {
            Val::Native(native) => native.call(&arg_vals),
            other => Err(EvalError::runtime(format!(
                "{} is not a function",
                describe_callee(callee, &other)
            ))),
        }
    }

    /// `trigger(kind, payload?)`: buffer a deferred action, evaluate to null
    fn collect_trigger(&mut self, args: &[Expr]) -> Result<Val, EvalError> {
        if args.is_empty() {
            return Err(EvalError::runtime("trigger() requires an action kind"));
        }
        let kind = match self.eval_expr(&args[0])? {
            Val::Str(s) => s,
            other => {
                return Err(EvalError::runtime(format!(
                    "trigger() kind must be a string, got {}",
                    other.type_name()
                )))
            }
        };
        let payload = match args.get(1) {
            Some(expr) => self.eval_expr(expr)?.to_json(),
            None => serde_json::Value::Null,
        };
        self.triggers.push(TriggerAction::new(kind, payload));
        Ok(Val::Null)
    }

    fn member(&self, object: Val, property: &str) -> Result<Val, EvalError> {
        match object {
            Val::Obj(map) => Ok(map.get(property).cloned().unwrap_or(Val::Null)),
            Val::List(items) => match property {
                "length" => Ok(Val::Num(items.len() as f64)),
                _ => Ok(Val::Null),
            },
            Val::Str(s) => match property {
                "length" => Ok(Val::Num(s.chars().count() as f64)),
                _ => Ok(Val::Null),
            },
            other => Err(EvalError::runtime(format!(
                "cannot read property '{}' of {}",
                property,
                other.type_name()
            ))),
        }
    }

    fn index(&self, object: Val, index: Val) -> Result<Val, EvalError> {
        match (object, index) {
            (Val::List(items), Val::Num(n)) => {
                if n < 0.0 || n.fract() != 0.0 {
                    return Ok(Val::Null);
                }
                Ok(items.get(n as usize).cloned().unwrap_or(Val::Null))
            }
            (Val::Obj(map), Val::Str(key)) => Ok(map.get(&key).cloned().unwrap_or(Val::Null)),
            (Val::Str(s), Val::Num(n)) => {
                if n < 0.0 || n.fract() != 0.0 {
                    return Ok(Val::Null);
                }
                Ok(s
                    .chars()
                    .nth(n as usize)
                    .map(|c| Val::Str(c.to_string()))
                    .unwrap_or(Val::Null))
            }
            (object, index) => Err(EvalError::runtime(format!(
                "cannot index {} with a {}",
                object.type_name(),
                index.type_name()
            ))),
        }
    }
}

/* ===================== Helpers ===================== */

enum PathKey {
    Member(String),
    Index(f64),
}

/// Mutable slot at `key` inside `value`, for path assignment
fn place<'v>(value: &'v mut Val, key: &PathKey) -> Result<&'v mut Val, EvalError> {
    match (value, key) {
        (Val::Obj(map), PathKey::Member(property)) => {
            Ok(map.entry(property.clone()).or_insert(Val::Null))
        }
        (Val::List(items), PathKey::Index(n)) => {
            let len = items.len();
            if *n < 0.0 || n.fract() != 0.0 || *n as usize >= len {
                return Err(EvalError::runtime(format!(
                    "index {} out of bounds for list of length {}",
                    n, len
                )));
            }
            Ok(&mut items[*n as usize])
        }
        (value, PathKey::Member(property)) => Err(EvalError::runtime(format!(
            "cannot set property '{}' of {}",
            property,
            value.type_name()
        ))),
        (value, PathKey::Index(_)) => Err(EvalError::runtime(format!(
            "cannot index-assign into a {}",
            value.type_name()
        ))),
    }
}

fn numeric(op: &str, l: &Val, r: &Val) -> Result<(f64, f64), EvalError> {
    match (l, r) {
        (Val::Num(a), Val::Num(b)) => Ok((*a, *b)),
        _ => Err(EvalError::runtime(format!(
            "operator '{}' requires numbers, got {} and {}",
            op,
            l.type_name(),
            r.type_name()
        ))),
    }
}

fn op_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::Eq => "==",
        BinaryOp::Ne => "!=",
        BinaryOp::And => "&&",
        BinaryOp::Or => "||",
    }
}

fn describe_callee(callee: &Expr, value: &Val) -> String {
    match callee {
        Expr::Ident { name } => name.clone(),
        Expr::Member { property, .. } => property.clone(),
        _ => value.type_name().to_string(),
    }
}
