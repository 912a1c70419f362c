use tramp_core::{check_arity, EvalContext, Value};

use crate::register_fn;

fn register_pred(ctx: &EvalContext, name: &'static str, pred: fn(&Value) -> bool) {
    register_fn(ctx, name, move |args| {
        check_arity!(args, name, 1);
        Ok(Value::Bool(pred(&args[0])))
    });
}

pub fn register(ctx: &EvalContext) {
    register_pred(ctx, "boolean?", |v| matches!(v, Value::Bool(_)));
    register_pred(ctx, "num?", |v| matches!(v, Value::Int(_) | Value::Float(_)));
    register_pred(ctx, "number?", |v| matches!(v, Value::Int(_) | Value::Float(_)));
    register_pred(ctx, "integer?", |v| matches!(v, Value::Int(_)));
    register_pred(ctx, "string?", |v| matches!(v, Value::Str(_)));
    register_pred(ctx, "symbol?", |v| matches!(v, Value::Symbol(_)));
    register_pred(ctx, "procedure?", |v| matches!(v, Value::Procedure(_)));
    register_pred(ctx, "pair?", |v| matches!(v, Value::Pair(_)));
    register_pred(ctx, "list?", Value::is_list);
    register_pred(ctx, "null?", Value::is_nil);
}
