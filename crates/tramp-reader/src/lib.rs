pub mod lexer;
mod reader;

pub use reader::{read_one, read_str, Reader};
