use tramp_core::{
    call_callback, check_arity, CallStack, EvalContext, Procedure, TrampError, Value,
};

use crate::{expect_int, native_frame, register_fn, register_fn_ctx};

fn expect_procedure(v: &Value) -> Result<&Procedure, TrampError> {
    v.as_procedure()
        .ok_or_else(|| TrampError::wrong_type(v, "procedure"))
}

fn map(ctx: &EvalContext, args: &[Value], stack: &CallStack) -> Result<Value, TrampError> {
    check_arity!(args, "map", 2..);
    let proc = expect_procedure(&args[0])?;
    let lists = args[1..]
        .iter()
        .map(Value::expect_list)
        .collect::<Result<Vec<_>, _>>()?;
    let count = lists[0].len();
    if lists[1..].iter().any(|l| l.len() != count) {
        return Err(TrampError::eval(
            "List arguments to map must all be the same size.",
        ));
    }
    let frame = native_frame(stack, "map");
    let mut result = Vec::with_capacity(count);
    for i in 0..count {
        let call_args: Vec<Value> = lists.iter().map(|l| l[i].clone()).collect();
        result.push(call_callback(ctx, proc, &call_args, &frame)?);
    }
    Ok(Value::list(result))
}

fn apply(ctx: &EvalContext, args: &[Value], stack: &CallStack) -> Result<Value, TrampError> {
    check_arity!(args, "apply", 2..);
    let proc = expect_procedure(&args[0])?;
    let (last, leading) = args[1..]
        .split_last()
        .ok_or_else(|| TrampError::arity("apply", "2+", args.len()))?;
    let mut call_args = leading.to_vec();
    call_args.extend(last.expect_list()?);
    call_callback(ctx, proc, &call_args, &native_frame(stack, "apply"))
}

fn append(args: &[Value]) -> Result<Value, TrampError> {
    let Some((last, init)) = args.split_last() else {
        return Ok(Value::Nil);
    };
    let mut items = Vec::new();
    for arg in init {
        match arg {
            Value::Nil => {}
            Value::Pair(p) if p.is_list() => {
                items.extend(p.cells().map(|c| (c.head().clone(), c.location().cloned())));
            }
            other => return Err(TrampError::wrong_type(other, "list")),
        }
    }
    Ok(Value::list_with_locations(items, last.clone()))
}

fn range(args: &[Value]) -> Result<Value, TrampError> {
    check_arity!(args, "range", 1..=3);
    let nums = args.iter().map(expect_int).collect::<Result<Vec<_>, _>>()?;
    let (start, end, step) = match nums.as_slice() {
        [end] => (0, *end, 1),
        [start, end] => (*start, *end, 1),
        [start, end, step] => (*start, *end, *step),
        _ => return Err(TrampError::arity("range", "1-3", args.len())),
    };
    if (start < end && step <= 0) || (start > end && step >= 0) {
        return Err(TrampError::eval("Step must make the sequence end."));
    }
    let mut items = Vec::new();
    let mut i = start;
    while (step > 0 && i < end) || (step < 0 && i > end) {
        items.push(Value::Int(i));
        match i.checked_add(step) {
            Some(next) => i = next,
            None => break,
        }
    }
    Ok(Value::list(items))
}

pub fn register(ctx: &EvalContext) {
    register_fn(ctx, "list", |args| Ok(Value::list(args.to_vec())));

    register_fn(ctx, "cons", |args| {
        check_arity!(args, "cons", 2);
        Ok(Value::cons(args[0].clone(), args[1].clone()))
    });

    register_fn(ctx, "car", |args| {
        check_arity!(args, "car", 1);
        match &args[0] {
            Value::Pair(p) => Ok(p.head().clone()),
            other => Err(TrampError::wrong_type(other, "pair")),
        }
    });

    register_fn(ctx, "cdr", |args| {
        check_arity!(args, "cdr", 1);
        match &args[0] {
            Value::Pair(p) => Ok(p.tail().clone()),
            other => Err(TrampError::wrong_type(other, "pair")),
        }
    });

    register_fn(ctx, "append", append);

    register_fn(ctx, "reverse", |args| {
        check_arity!(args, "reverse", 1);
        let mut items = args[0].expect_list()?;
        items.reverse();
        Ok(Value::list(items))
    });

    register_fn(ctx, "length", |args| {
        check_arity!(args, "length", 1);
        let len = args[0]
            .list_len()
            .ok_or_else(|| TrampError::wrong_type(&args[0], "list"))?;
        Ok(Value::Int(len as i64))
    });

    register_fn(ctx, "list-ref", |args| {
        check_arity!(args, "list-ref", 2);
        let items = args[0].expect_list()?;
        let index = expect_int(&args[1])?;
        usize::try_from(index)
            .ok()
            .and_then(|i| items.get(i).cloned())
            .ok_or_else(|| {
                TrampError::eval(format!(
                    "List index {index} out of range of list size {}.",
                    items.len()
                ))
            })
    });

    register_fn(ctx, "range", range);
    register_fn_ctx(ctx, "map", map);
    register_fn_ctx(ctx, "apply", apply);
}

#[cfg(test)]
mod tests {
    use crate::testing::{call, context};
    use tramp_core::{NativeFn, TrampError, Value};

    fn ints(xs: &[i64]) -> Value {
        Value::list(xs.iter().map(|n| Value::Int(*n)).collect())
    }

    #[test]
    fn test_cons_car_cdr() {
        let ctx = context();
        let pair = call(&ctx, "cons", &[Value::Int(1), Value::Int(2)]).unwrap();
        assert_eq!(pair.to_string(), "(1 . 2)");
        assert_eq!(call(&ctx, "car", &[pair.clone()]).unwrap(), Value::Int(1));
        assert_eq!(call(&ctx, "cdr", &[pair]).unwrap(), Value::Int(2));
        let err = call(&ctx, "car", &[Value::Nil]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Value `()' has incorrect type null (expected pair)."
        );
    }

    #[test]
    fn test_append() {
        let ctx = context();
        assert_eq!(call(&ctx, "append", &[]).unwrap(), Value::Nil);
        assert_eq!(
            call(&ctx, "append", &[ints(&[1, 2]), ints(&[3]), Value::Nil, ints(&[4])]).unwrap(),
            ints(&[1, 2, 3, 4])
        );
        // The last argument becomes the tail unchanged.
        let tail = ints(&[9]);
        let joined = call(&ctx, "append", &[ints(&[1]), tail.clone()]).unwrap();
        let rest = joined.as_pair().unwrap().tail();
        assert!(rest.is_eq(&tail));
        assert_eq!(
            call(&ctx, "append", &[ints(&[1]), Value::Int(2)]).unwrap().to_string(),
            "(1 . 2)"
        );
        assert!(call(&ctx, "append", &[Value::Int(1), Value::Nil]).is_err());
    }

    #[test]
    fn test_reverse_length_list_ref() {
        let ctx = context();
        assert_eq!(
            call(&ctx, "reverse", &[ints(&[1, 2, 3])]).unwrap(),
            ints(&[3, 2, 1])
        );
        assert_eq!(call(&ctx, "length", &[Value::Nil]).unwrap(), Value::Int(0));
        assert_eq!(call(&ctx, "length", &[ints(&[1, 2])]).unwrap(), Value::Int(2));
        assert!(call(&ctx, "length", &[Value::cons(Value::Int(1), Value::Int(2))]).is_err());
        assert_eq!(
            call(&ctx, "list-ref", &[ints(&[5, 6]), Value::Int(1)]).unwrap(),
            Value::Int(6)
        );
        let err = call(&ctx, "list-ref", &[ints(&[5, 6]), Value::Int(2)]).unwrap_err();
        assert_eq!(err.to_string(), "List index 2 out of range of list size 2.");
        assert!(call(&ctx, "list-ref", &[ints(&[5]), Value::Int(-1)]).is_err());
    }

    #[test]
    fn test_range() {
        let ctx = context();
        assert_eq!(call(&ctx, "range", &[Value::Int(3)]).unwrap(), ints(&[0, 1, 2]));
        assert_eq!(
            call(&ctx, "range", &[Value::Int(2), Value::Int(5)]).unwrap(),
            ints(&[2, 3, 4])
        );
        assert_eq!(
            call(&ctx, "range", &[Value::Int(5), Value::Int(0), Value::Int(-2)]).unwrap(),
            ints(&[5, 3, 1])
        );
        assert_eq!(
            call(&ctx, "range", &[Value::Int(0), Value::Int(0)]).unwrap(),
            Value::Nil
        );
        let err = call(&ctx, "range", &[Value::Int(0), Value::Int(5), Value::Int(0)]).unwrap_err();
        assert_eq!(err.to_string(), "Step must make the sequence end.");
        assert!(call(&ctx, "range", &[]).is_err());
    }

    #[test]
    fn test_map_with_native() {
        let ctx = context();
        let plus = ctx.global_env.get(&ctx.intern("+")).unwrap();
        assert_eq!(
            call(&ctx, "map", &[plus.clone(), ints(&[1, 2]), ints(&[10, 20])]).unwrap(),
            ints(&[11, 22])
        );
        assert_eq!(
            call(&ctx, "map", &[plus.clone(), Value::Nil]).unwrap(),
            Value::Nil
        );
        let err = call(&ctx, "map", &[plus, ints(&[1]), ints(&[1, 2])]).unwrap_err();
        assert!(err.to_string().contains("same size"));
    }

    #[test]
    fn test_map_pushes_native_frame() {
        let ctx = context();
        let depth = Value::native(NativeFn::with_ctx("depth", |_ctx, _args, stack| {
            Ok(Value::Int(stack.depth() as i64))
        }));
        ctx.define_global("depth", depth.clone());
        let result = call(&ctx, "map", &[depth, ints(&[1])]).unwrap();
        assert_eq!(result, ints(&[1]));
    }

    #[test]
    fn test_apply() {
        let ctx = context();
        let plus = ctx.global_env.get(&ctx.intern("+")).unwrap();
        assert_eq!(
            call(&ctx, "apply", &[plus.clone(), ints(&[1, 2, 3])]).unwrap(),
            Value::Int(6)
        );
        assert_eq!(
            call(&ctx, "apply", &[plus.clone(), Value::Int(10), ints(&[1])]).unwrap(),
            Value::Int(11)
        );
        let err = call(&ctx, "apply", &[plus, Value::Int(1)]).unwrap_err();
        assert!(matches!(err, TrampError::WrongType { .. }));
        assert!(call(&ctx, "apply", &[Value::Int(1), Value::Nil]).is_err());
    }
}
