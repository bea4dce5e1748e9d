//! Java source front end: pest grammar, tree builder and printer.

pub mod parser;
pub mod printer;

pub use parser::{parse_compilation_unit, parse_method_signature, parse_statements};
pub use printer::Printer;
