mod arithmetic;
mod comparison;
mod io;
mod list;
mod predicates;
mod string;

use tramp_core::{CallStack, EvalContext, NativeFn, SourceLocation, TrampError, Value};

/// Install every primitive procedure into the context's global environment.
pub fn register_stdlib(ctx: &EvalContext) {
    arithmetic::register(ctx);
    comparison::register(ctx);
    predicates::register(ctx);
    list::register(ctx);
    string::register(ctx);
    io::register(ctx);
    tracing::debug!(
        bindings = ctx.global_env.local_names().len(),
        "registered primitives"
    );
}

fn register_fn(
    ctx: &EvalContext,
    name: &str,
    f: impl Fn(&[Value]) -> Result<Value, TrampError> + 'static,
) {
    ctx.define_global(name, Value::native(NativeFn::simple(name, f)));
}

fn register_fn_ctx(
    ctx: &EvalContext,
    name: &str,
    f: impl Fn(&EvalContext, &[Value], &CallStack) -> Result<Value, TrampError> + 'static,
) {
    ctx.define_global(name, Value::native(NativeFn::with_ctx(name, f)));
}

/// Frame recorded while a native procedure calls back into Scheme code.
fn native_frame(stack: &CallStack, name: &str) -> CallStack {
    stack.push(format!("#<procedure {name}>"), SourceLocation::native())
}

fn expect_int(value: &Value) -> Result<i64, TrampError> {
    value
        .as_int()
        .ok_or_else(|| TrampError::wrong_type(value, "integer"))
}

fn expect_str(value: &Value) -> Result<&str, TrampError> {
    value
        .as_str()
        .ok_or_else(|| TrampError::wrong_type(value, "string"))
}
