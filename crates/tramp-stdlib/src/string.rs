use tramp_core::{check_arity, EvalContext, TrampError, Value};

use crate::{expect_int, expect_str, register_fn};

fn radix_arg(args: &[Value]) -> Result<u32, TrampError> {
    let Some(arg) = args.get(1) else {
        return Ok(10);
    };
    let radix = expect_int(arg)?;
    match u32::try_from(radix) {
        Ok(r @ 2..=36) => Ok(r),
        _ => Err(TrampError::eval(format!(
            "Radix must be between 2 and 36, got {radix}."
        ))),
    }
}

fn format_radix(n: i64, radix: u32) -> String {
    if radix == 10 {
        return n.to_string();
    }
    let mut magnitude = n.unsigned_abs();
    let mut digits = Vec::new();
    loop {
        let d = (magnitude % u64::from(radix)) as u32;
        digits.push(std::char::from_digit(d, radix).unwrap_or('?'));
        magnitude /= u64::from(radix);
        if magnitude == 0 {
            break;
        }
    }
    if n < 0 {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

fn string_to_number(args: &[Value]) -> Result<Value, TrampError> {
    check_arity!(args, "string->number", 1..=2);
    let text = expect_str(&args[0])?;
    let radix = radix_arg(args)?;
    if let Ok(n) = i64::from_str_radix(text.trim(), radix) {
        return Ok(Value::Int(n));
    }
    if radix == 10 {
        if let Ok(f) = text.trim().parse::<f64>() {
            return Ok(Value::Float(f));
        }
    }
    Err(TrampError::conversion(&args[0], "number"))
}

fn number_to_string(args: &[Value]) -> Result<Value, TrampError> {
    check_arity!(args, "number->string", 1..=2);
    let radix = radix_arg(args)?;
    let text = match &args[0] {
        Value::Int(n) => format_radix(*n, radix),
        Value::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            format_radix(*f as i64, radix)
        }
        Value::Float(f) if radix == 10 => f.to_string(),
        Value::Float(_) => {
            return Err(TrampError::eval(
                "Converting fractional value to a non-base 10 string not implemented.",
            ))
        }
        other => return Err(TrampError::conversion(other, "number")),
    };
    Ok(Value::string(&text))
}

pub fn register(ctx: &EvalContext) {
    register_fn(ctx, "string-length", |args| {
        check_arity!(args, "string-length", 1);
        Ok(Value::Int(expect_str(&args[0])?.chars().count() as i64))
    });

    register_fn(ctx, "string-append", |args| {
        let mut out = String::new();
        for arg in args {
            out.push_str(expect_str(arg)?);
        }
        Ok(Value::string(&out))
    });

    register_fn(ctx, "string->number", string_to_number);
    register_fn(ctx, "number->string", number_to_string);
}

#[cfg(test)]
mod tests {
    use super::format_radix;
    use crate::testing::{call, context};
    use tramp_core::Value;

    #[test]
    fn test_string_length_counts_chars() {
        let ctx = context();
        assert_eq!(
            call(&ctx, "string-length", &[Value::string("héllo")]).unwrap(),
            Value::Int(5)
        );
        assert!(call(&ctx, "string-length", &[Value::Int(1)]).is_err());
    }

    #[test]
    fn test_string_append() {
        let ctx = context();
        assert_eq!(call(&ctx, "string-append", &[]).unwrap(), Value::string(""));
        assert_eq!(
            call(&ctx, "string-append", &[Value::string("ab"), Value::string("cd")]).unwrap(),
            Value::string("abcd")
        );
    }

    #[test]
    fn test_string_to_number() {
        let ctx = context();
        assert_eq!(
            call(&ctx, "string->number", &[Value::string("42")]).unwrap(),
            Value::Int(42)
        );
        assert_eq!(
            call(&ctx, "string->number", &[Value::string("ff"), Value::Int(16)]).unwrap(),
            Value::Int(255)
        );
        assert_eq!(
            call(&ctx, "string->number", &[Value::string("2.5")]).unwrap(),
            Value::Float(2.5)
        );
        assert!(call(&ctx, "string->number", &[Value::string("abc")]).is_err());
        assert!(call(&ctx, "string->number", &[Value::string("1"), Value::Int(1)]).is_err());
    }

    #[test]
    fn test_number_to_string() {
        let ctx = context();
        assert_eq!(
            call(&ctx, "number->string", &[Value::Int(255), Value::Int(16)]).unwrap(),
            Value::string("ff")
        );
        assert_eq!(
            call(&ctx, "number->string", &[Value::Float(3.0)]).unwrap(),
            Value::string("3")
        );
        assert_eq!(
            call(&ctx, "number->string", &[Value::Float(0.5)]).unwrap(),
            Value::string("0.5")
        );
        assert!(call(&ctx, "number->string", &[Value::Float(0.5), Value::Int(2)]).is_err());
    }

    #[test]
    fn test_format_radix() {
        assert_eq!(format_radix(0, 2), "0");
        assert_eq!(format_radix(-10, 2), "-1010");
        assert_eq!(format_radix(35, 36), "z");
        assert_eq!(format_radix(i64::MIN, 16), "-8000000000000000");
    }
}
