use tramp_core::{check_arity, EvalContext, TrampError, Value};

use crate::register_fn;

fn to_f64(v: &Value) -> Result<f64, TrampError> {
    match v {
        Value::Int(n) => Ok(*n as f64),
        Value::Float(f) => Ok(*f),
        _ => Err(TrampError::conversion(v, "number")),
    }
}

/// Chain a numeric comparison across adjacent arguments. Every argument is
/// type-checked even after the chain has failed.
fn num_cmp(args: &[Value], cmp: fn(f64, f64) -> bool) -> Result<Value, TrampError> {
    let nums = args.iter().map(to_f64).collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Bool(nums.windows(2).all(|w| cmp(w[0], w[1]))))
}

pub fn register(ctx: &EvalContext) {
    register_fn(ctx, "=", |args| num_cmp(args, |a, b| a == b));
    register_fn(ctx, "<", |args| num_cmp(args, |a, b| a < b));
    register_fn(ctx, "<=", |args| num_cmp(args, |a, b| a <= b));
    register_fn(ctx, ">", |args| num_cmp(args, |a, b| a > b));
    register_fn(ctx, ">=", |args| num_cmp(args, |a, b| a >= b));

    register_fn(ctx, "eq?", |args| {
        Ok(Value::Bool(args.windows(2).all(|w| w[0].is_eq(&w[1]))))
    });

    register_fn(ctx, "equal?", |args| {
        Ok(Value::Bool(args.windows(2).all(|w| w[0] == w[1])))
    });

    register_fn(ctx, "not", |args| {
        check_arity!(args, "not", 1);
        Ok(Value::Bool(!args[0].is_truthy()))
    });
}
