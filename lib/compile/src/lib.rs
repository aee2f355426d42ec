//! SQL front end: tokens, diagnostics and the statement tree the dispatcher runs.

pub mod ast;
pub mod diagnostics;
pub mod lexer;
pub mod parser;

pub use ast::{Assignment, JoinClause, Projection, Statement, TableName};
pub use diagnostics::{render_plain, report_error, CompileError, LocatableError, SyntaxError};
pub use parser::parse_statement;
