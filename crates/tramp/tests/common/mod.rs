#![allow(dead_code)]

use tramp::{BufferPort, Interpreter, TrampError, Value};

/// Evaluate in a fresh interpreter whose output is discarded.
pub fn eval(input: &str) -> Value {
    let interp = quiet();
    interp
        .eval_str(input)
        .unwrap_or_else(|e| panic!("failed to eval `{input}`: {e}"))
}

pub fn eval_to_string(input: &str) -> String {
    eval(input).to_string()
}

/// Evaluate in a fresh interpreter, expecting an error.
pub fn eval_err(input: &str) -> TrampError {
    let interp = quiet();
    match interp.eval_str(input) {
        Ok(val) => panic!("expected error for `{input}`, got {val}"),
        Err(e) => e,
    }
}

pub fn quiet() -> Interpreter {
    Interpreter::builder().with_output(tramp::NullPort).build()
}

/// Interpreter whose output is captured in the returned port.
pub fn buffered() -> (Interpreter, BufferPort) {
    let port = BufferPort::new();
    let interp = Interpreter::builder().with_output(port.clone()).build();
    (interp, port)
}
