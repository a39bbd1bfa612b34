//! Environment resolution: `.env` loading, interpreter discovery and
//! `${VAR}` expansion.

pub mod dotenv;
pub mod interpreter;
pub mod resolver;

pub use dotenv::load_dotenv;
pub use interpreter::{InterpreterSpec, InterpreterStrategy, DEFAULT_INTERPRETER_VAR};
pub use resolver::{expand_value, Env, EnvResolver};
