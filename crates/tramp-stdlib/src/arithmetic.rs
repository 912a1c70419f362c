use tramp_core::{check_arity, EvalContext, TrampError, Value};

use crate::register_fn;

/// Running total of a numeric fold. Stays exact until a float shows up.
#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn from_value(v: &Value) -> Result<Num, TrampError> {
        match v {
            Value::Int(n) => Ok(Num::Int(*n)),
            Value::Float(f) => Ok(Num::Float(*f)),
            _ => Err(TrampError::conversion(v, "number")),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(f) => f,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Num::Int(n) => Value::Int(n),
            Num::Float(f) => Value::Float(f),
        }
    }

    fn combine(
        self,
        other: Num,
        op: &str,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Result<Num, TrampError> {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => int_op(a, b)
                .map(Num::Int)
                .ok_or_else(|| TrampError::eval(format!("Integer overflow in {op}."))),
            (a, b) => Ok(Num::Float(float_op(a.as_f64(), b.as_f64()))),
        }
    }
}

fn fold(
    args: &[Value],
    op: &str,
    init: Num,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, TrampError> {
    let mut total = init;
    for arg in args {
        total = total.combine(Num::from_value(arg)?, op, int_op, float_op)?;
    }
    Ok(total.into_value())
}

fn divide(a: Num, b: Num) -> Result<Num, TrampError> {
    match (a, b) {
        (Num::Int(_), Num::Int(0)) => Err(TrampError::eval("Division by zero.")),
        (Num::Int(x), Num::Int(y)) if x.checked_rem(y) == Some(0) => x
            .checked_div(y)
            .map(Num::Int)
            .ok_or_else(|| TrampError::eval("Integer overflow in /.")),
        (x, y) => Ok(Num::Float(x.as_f64() / y.as_f64())),
    }
}

pub fn register(ctx: &EvalContext) {
    register_fn(ctx, "+", |args| {
        fold(args, "+", Num::Int(0), i64::checked_add, |a, b| a + b)
    });

    register_fn(ctx, "*", |args| {
        fold(args, "*", Num::Int(1), i64::checked_mul, |a, b| a * b)
    });

    register_fn(ctx, "-", |args| {
        check_arity!(args, "-", 1..);
        let first = Num::from_value(&args[0])?;
        if args.len() == 1 {
            return Num::Int(0)
                .combine(first, "-", i64::checked_sub, |a, b| a - b)
                .map(Num::into_value);
        }
        let mut total = first;
        for arg in &args[1..] {
            total = total.combine(Num::from_value(arg)?, "-", i64::checked_sub, |a, b| a - b)?;
        }
        Ok(total.into_value())
    });

    register_fn(ctx, "/", |args| {
        check_arity!(args, "/", 1..);
        let first = Num::from_value(&args[0])?;
        if args.len() == 1 {
            return Ok(Value::Float(1.0 / first.as_f64()));
        }
        let mut total = first;
        for arg in &args[1..] {
            total = divide(total, Num::from_value(arg)?)?;
        }
        Ok(total.into_value())
    });
}
