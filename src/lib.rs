pub mod types;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod expand;
pub mod search;
pub mod redirect;
pub mod launch;
pub mod job;
pub mod builtin;
pub mod global;
pub mod eval;
