//! Script parser.
//!
//! Scripts are parsed with the `sqlparser` crate (PostgreSQL dialect) and
//! converted into the interpreter's own, much smaller AST. Anything the
//! interpreter cannot run is rejected here with `ScriptError::Unsupported`,
//! so execution never sees a statement it does not understand.
//!
//! # Supported statements
//!
//! - `CREATE TABLE name AS <query>` and `CREATE TABLE name (col TYPE, ...)`
//! - `SELECT ... [INTO name] ...`, bare queries bind to `result`
//! - `INSERT INTO name [(cols)] VALUES ... | <query>`
//! - `UPDATE name SET ... [WHERE ...]`
//! - `DELETE FROM name [WHERE ...]`
//! - `DROP TABLE [IF EXISTS] name, ...`
//!
//! # Usage
//!
//! ```
//! use tabula_script::parser::{Parser, Statement};
//!
//! let statements = Parser::parse("CREATE TABLE out AS SELECT * FROM t").unwrap();
//! assert!(matches!(statements[0], Statement::CreateTableAs { .. }));
//! ```

use sqlparser::ast as sql_ast;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser as SqlParser;
use sqlparser::tokenizer::Token;

use crate::error::{ScriptError, ScriptResult};

mod expr;
mod statement;

pub use expr::*;
pub use statement::*;

/// Script parser.
///
/// Uses the PostgreSQL dialect.
pub struct Parser;

impl Parser {
    /// Parses a script into a list of statements.
    pub fn parse(sql: &str) -> ScriptResult<Vec<Statement>> {
        if sql.trim().is_empty() {
            return Err(ScriptError::EmptyScript);
        }

        let dialect = PostgreSqlDialect {};
        let ast = SqlParser::parse_sql(&dialect, sql)?;

        if ast.is_empty() {
            return Err(ScriptError::EmptyScript);
        }

        ast.into_iter().map(Statement::from_sql_ast).collect()
    }

    /// Parses a single expression, such as a row filter.
    pub fn parse_expr(sql: &str) -> ScriptResult<Expr> {
        if sql.trim().is_empty() {
            return Err(ScriptError::InvalidArgument("empty expression".to_string()));
        }

        let dialect = PostgreSqlDialect {};
        let mut parser = SqlParser::new(&dialect).try_with_sql(sql)?;
        let expr = parser.parse_expr()?;
        parser.expect_token(&Token::EOF)?;
        Expr::from_sql_ast(expr)
    }
}

/// Renders a possibly-qualified object name as a single binding name.
pub(crate) fn object_name(name: &sql_ast::ObjectName) -> String {
    name.0
        .iter()
        .map(|ident| ident.value.clone())
        .collect::<Vec<_>>()
        .join(".")
}
