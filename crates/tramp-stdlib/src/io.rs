use tramp_core::{check_arity, eval_source_callback, EvalContext, TrampError, Value};

use crate::{expect_str, register_fn, register_fn_ctx};

pub fn register(ctx: &EvalContext) {
    register_fn_ctx(ctx, "display", |ctx, args, _stack| {
        check_arity!(args, "display", 1);
        ctx.output.display(&args[0].display_string())?;
        Ok(Value::Unspecified)
    });

    register_fn_ctx(ctx, "write", |ctx, args, _stack| {
        check_arity!(args, "write", 1);
        ctx.output.display(&args[0].to_string())?;
        Ok(Value::Unspecified)
    });

    register_fn_ctx(ctx, "newline", |ctx, args, _stack| {
        check_arity!(args, "newline", 0);
        ctx.output.newline()?;
        Ok(Value::Unspecified)
    });

    register_fn(ctx, "error", |args| {
        check_arity!(args, "error", 1..);
        let message = args
            .iter()
            .map(Value::display_string)
            .collect::<Vec<_>>()
            .join(" ");
        Err(TrampError::User(message))
    });

    register_fn_ctx(ctx, "load", |ctx, args, _stack| {
        check_arity!(args, "load", 1);
        let path = expect_str(&args[0])?;
        tracing::debug!(path, "load");
        let mut input = ctx.files.open_read(path)?;
        eval_source_callback(ctx, &mut *input, path)
    });
}
