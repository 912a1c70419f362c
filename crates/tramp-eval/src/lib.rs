mod eval;
mod expand;
mod special_forms;

pub use eval::{
    apply_procedure, bind_parameters, eval_reader, eval_str, evaluate, EvalResult, Trampoline,
    TOP_LEVEL,
};
pub use expand::expand;

use tramp_core::{set_call_callback, set_eval_source_callback, EvalContext};

/// Hook the evaluator into `ctx` so natives can call procedures and load
/// source through it.
pub fn install(ctx: &EvalContext) {
    set_call_callback(ctx, eval::apply_procedure);
    set_eval_source_callback(ctx, eval::eval_source);
}
