pub mod environment;
pub mod error;
pub mod expr;
pub mod interpreter;
pub mod resolver;
pub mod stmt;
pub mod token;
pub mod value;
