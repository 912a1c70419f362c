pub mod context;
pub mod env;
pub mod error;
pub mod port;
pub mod symbol;
pub mod value;

pub use context::{
    call_callback, eval_source_callback, set_call_callback, set_eval_source_callback, CallFn,
    EvalContext, EvalSourceFn,
};
pub use env::Env;
pub use error::{CallFrame, CallStack, Result, SourceLocation, TrampError};
pub use port::{BufferPort, DisabledFiles, FileAccessor, NullPort, OutputPort, ReadOnlyFiles, StdoutPort};
pub use symbol::{CaseSensitivity, Interner, Keywords, Symbol};
pub use value::{Closure, NativeFn, Pair, PairIter, Procedure, Value};
