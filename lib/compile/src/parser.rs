//! Recursive-descent parser from SQL text to a [`Statement`].
//!
//! Grammar (keywords are case-insensitive, a trailing `;` is optional):
//!
//! ```text
//! CREATE DATABASE d
//! DROP DATABASE d
//! CREATE TABLE d.t (c TYPE [PRIMARY KEY] [UNIQUE] [REFERENCES t2(c2)], ...)
//! DROP TABLE d.t
//! CREATE [UNIQUE] INDEX i ON d.t (c1, c2, ...)
//! DROP INDEX i ON d.t
//! INSERT INTO d.t (c1, ...) VALUES (v1, ...)
//! DELETE FROM d.t [WHERE cond AND ...]
//! UPDATE d.t SET c = v, ... [WHERE cond AND ...]
//! SELECT * | c1, t.c2, ... FROM d.t [JOIN t2 ON t.a = t2.b ...] [WHERE cond AND ...]
//! SHOW DATABASES
//! SHOW TABLES d
//! ```

use crate::{
    ast::{Assignment, JoinClause, Projection, Statement, TableName},
    diagnostics::{CompileError, LocatableError, LocatableResult, Span, Spanned, SyntaxError, TypeError},
    lexer::{tokenize, TokenKind},
};
use catalog::Column;
use ty::{Condition, DataTypeKind, Operator, Row, Value};

/// Parses exactly one statement.
pub fn parse_statement(source: &str) -> LocatableResult<Statement> {
    let statement = Parser::new(source)?.parse()?;
    tracing::trace!(kind = statement.kind(), "parsed statement");
    Ok(statement)
}

pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Spanned<TokenKind>>,
    position: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> LocatableResult<Self> {
        Ok(Self {
            source,
            tokens: tokenize(source)?,
            position: 0,
        })
    }

    pub fn parse(mut self) -> LocatableResult<Statement> {
        if self.tokens.iter().all(|(token, _)| *token == TokenKind::Semi) {
            return Err(self.error(SyntaxError::EmptyStatement, 0..self.source.len()));
        }

        let statement = self.statement()?;
        self.eat(&TokenKind::Semi);

        if let Some((token, span)) = self.tokens.get(self.position) {
            return Err(self.error(
                SyntaxError::UnexpectedToken {
                    token: token.to_string(),
                    expected: vec!["end of statement".to_string()],
                },
                span.clone(),
            ));
        }
        Ok(statement)
    }

    // ----- token helpers -----------------------------------------------------

    fn error(&self, error: impl Into<CompileError>, span: Span) -> LocatableError {
        (error.into(), span)
    }

    fn eof_span(&self) -> Span {
        self.source.len()..self.source.len()
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.position).map(|(token, _)| token)
    }

    fn next(&mut self, expected: &[&str]) -> LocatableResult<Spanned<TokenKind>> {
        match self.tokens.get(self.position) {
            Some(spanned) => {
                self.position += 1;
                Ok(spanned.clone())
            }
            None => Err(self.error(
                SyntaxError::UnexpectedEOF {
                    expected: expected.iter().map(|s| s.to_string()).collect(),
                },
                self.eof_span(),
            )),
        }
    }

    fn unexpected(&self, token: &TokenKind, span: Span, expected: &[&str]) -> LocatableError {
        self.error(
            SyntaxError::UnexpectedToken {
                token: token.to_string(),
                expected: expected.iter().map(|s| s.to_string()).collect(),
            },
            span,
        )
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == Some(kind) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> LocatableResult<Span> {
        let description = kind.to_string();
        let (token, span) = self.next(&[&description])?;
        if token == kind {
            Ok(span)
        } else {
            Err(self.unexpected(&token, span, &[&description]))
        }
    }

    fn ident(&mut self) -> LocatableResult<String> {
        self.spanned_ident().map(|(name, _)| name)
    }

    fn spanned_ident(&mut self) -> LocatableResult<Spanned<String>> {
        match self.next(&["identifier"])? {
            (TokenKind::Ident(name), span) => Ok((name, span)),
            (token, span) => Err(self.unexpected(&token, span, &["identifier"])),
        }
    }

    /// `d.t`
    fn table_name(&mut self) -> LocatableResult<TableName> {
        let database = self.ident()?;
        self.expect(TokenKind::Dot)?;
        let table = self.ident()?;
        Ok(TableName::new(database, table))
    }

    /// `c` or `t.c`
    fn column_ref(&mut self) -> LocatableResult<String> {
        let first = self.ident()?;
        if self.eat(&TokenKind::Dot) {
            let second = self.ident()?;
            Ok(format!("{}.{}", first, second))
        } else {
            Ok(first)
        }
    }

    fn comma_separated<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> LocatableResult<T>,
    ) -> LocatableResult<Vec<T>> {
        let mut items = vec![item(self)?];
        while self.eat(&TokenKind::Comma) {
            items.push(item(self)?);
        }
        Ok(items)
    }

    fn parenthesized<T>(
        &mut self,
        item: impl FnMut(&mut Self) -> LocatableResult<T>,
    ) -> LocatableResult<Spanned<Vec<T>>> {
        let open = self.expect(TokenKind::LParen)?;
        let items = self.comma_separated(item)?;
        let close = self.expect(TokenKind::RParen)?;
        Ok((items, open.start..close.end))
    }

    fn literal(&mut self) -> LocatableResult<Value> {
        const EXPECTED: &[&str] = &["number", "string", "TRUE", "FALSE", "NULL"];
        match self.next(EXPECTED)? {
            (TokenKind::Integer(i), _) => Ok(Value::Integer(i)),
            (TokenKind::Float(f), _) => Ok(Value::Float(f)),
            (TokenKind::String(s), _) => Ok(Value::Text(s)),
            (TokenKind::True, _) => Ok(Value::Boolean(true)),
            (TokenKind::False, _) => Ok(Value::Boolean(false)),
            (TokenKind::Null, _) => Ok(Value::Null),
            (token, span) => Err(self.unexpected(&token, span, EXPECTED)),
        }
    }

    fn operator(&mut self) -> LocatableResult<Operator> {
        const EXPECTED: &[&str] = &["=", "!=", "<", "<=", ">", ">="];
        match self.next(EXPECTED)? {
            (TokenKind::Eq, _) => Ok(Operator::Eq),
            (TokenKind::NotEq, _) => Ok(Operator::NotEq),
            (TokenKind::Lt, _) => Ok(Operator::Lt),
            (TokenKind::LtEq, _) => Ok(Operator::LtEq),
            (TokenKind::Gt, _) => Ok(Operator::Gt),
            (TokenKind::GtEq, _) => Ok(Operator::GtEq),
            (token, span) => Err(self.unexpected(&token, span, EXPECTED)),
        }
    }

    fn condition(&mut self) -> LocatableResult<Condition> {
        let column = self.column_ref()?;
        let operator = self.operator()?;
        let value = self.literal()?;
        Ok(Condition::new(column, operator, value))
    }

    fn where_clause(&mut self) -> LocatableResult<Vec<Condition>> {
        let mut conditions = Vec::new();
        if self.eat(&TokenKind::Where) {
            conditions.push(self.condition()?);
            while self.eat(&TokenKind::And) {
                conditions.push(self.condition()?);
            }
        }
        Ok(conditions)
    }

    // ----- statements --------------------------------------------------------

    fn statement(&mut self) -> LocatableResult<Statement> {
        const EXPECTED: &[&str] = &["CREATE", "DROP", "INSERT", "DELETE", "UPDATE", "SELECT", "SHOW"];
        let (token, span) = self.next(EXPECTED)?;
        match token {
            TokenKind::Create => self.create(),
            TokenKind::Drop => self.drop(),
            TokenKind::Insert => self.insert(),
            TokenKind::Delete => {
                self.expect(TokenKind::From)?;
                let table = self.table_name()?;
                let conditions = self.where_clause()?;
                Ok(Statement::Delete { table, conditions })
            }
            TokenKind::Update => self.update(),
            TokenKind::Select => self.select(),
            TokenKind::Show => self.show(),
            token => Err(self.unexpected(&token, span, EXPECTED)),
        }
    }

    fn create(&mut self) -> LocatableResult<Statement> {
        const EXPECTED: &[&str] = &["DATABASE", "TABLE", "INDEX", "UNIQUE"];
        match self.next(EXPECTED)? {
            (TokenKind::Database, _) => Ok(Statement::CreateDatabase { name: self.ident()? }),
            (TokenKind::Table, _) => self.create_table(),
            (TokenKind::Index, _) => self.create_index(false),
            (TokenKind::Unique, _) => {
                self.expect(TokenKind::Index)?;
                self.create_index(true)
            }
            (token, span) => Err(self.unexpected(&token, span, EXPECTED)),
        }
    }

    fn drop(&mut self) -> LocatableResult<Statement> {
        const EXPECTED: &[&str] = &["DATABASE", "TABLE", "INDEX"];
        match self.next(EXPECTED)? {
            (TokenKind::Database, _) => Ok(Statement::DropDatabase { name: self.ident()? }),
            (TokenKind::Table, _) => Ok(Statement::DropTable {
                name: self.table_name()?,
            }),
            (TokenKind::Index, _) => {
                let name = self.ident()?;
                self.expect(TokenKind::On)?;
                let table = self.table_name()?;
                Ok(Statement::DropIndex { table, name })
            }
            (token, span) => Err(self.unexpected(&token, span, EXPECTED)),
        }
    }

    fn create_table(&mut self) -> LocatableResult<Statement> {
        let name = self.table_name()?;
        let (columns, _) = self.parenthesized(Self::column_def)?;
        Ok(Statement::CreateTable { name, columns })
    }

    /// `name TYPE[(n)] [PRIMARY KEY] [UNIQUE] [REFERENCES t(c)]`
    fn column_def(&mut self) -> LocatableResult<Column> {
        let name = self.ident()?;
        let (type_name, type_span) = self.spanned_ident()?;
        let data_type: DataTypeKind = type_name.parse().map_err(|_| {
            self.error(
                TypeError::UnknownDataType {
                    name: type_name.clone(),
                },
                type_span,
            )
        })?;
        if self.eat(&TokenKind::LParen) {
            match self.next(&["length"])? {
                (TokenKind::Integer(_), _) => {}
                (token, span) => return Err(self.unexpected(&token, span, &["length"])),
            }
            self.expect(TokenKind::RParen)?;
        }

        let mut column = Column::new(name, data_type);
        loop {
            match self.peek() {
                Some(TokenKind::Primary) => {
                    self.position += 1;
                    self.expect(TokenKind::Key)?;
                    column = column.primary_key();
                }
                Some(TokenKind::Unique) => {
                    self.position += 1;
                    column = column.unique();
                }
                Some(TokenKind::References) => {
                    self.position += 1;
                    let table = self.ident()?;
                    self.expect(TokenKind::LParen)?;
                    let target = self.ident()?;
                    self.expect(TokenKind::RParen)?;
                    column = column.references(table, target);
                }
                _ => break,
            }
        }
        Ok(column)
    }

    fn create_index(&mut self, unique: bool) -> LocatableResult<Statement> {
        let name = self.ident()?;
        self.expect(TokenKind::On)?;
        let table = self.table_name()?;
        let (columns, _) = self.parenthesized(Self::ident)?;
        Ok(Statement::CreateIndex {
            table,
            name,
            columns,
            unique,
        })
    }

    fn insert(&mut self) -> LocatableResult<Statement> {
        self.expect(TokenKind::Into)?;
        let table = self.table_name()?;
        let (columns, columns_span) = self.parenthesized(Self::spanned_ident)?;
        self.expect(TokenKind::Values)?;
        let (values, values_span) = self.parenthesized(Self::literal)?;

        if columns.len() != values.len() {
            return Err(self.error(
                SyntaxError::ValueCountMismatch {
                    columns: columns.len(),
                    values: values.len(),
                },
                columns_span.start..values_span.end,
            ));
        }

        let mut row = Row::with_capacity(columns.len());
        for ((column, span), value) in columns.into_iter().zip(values) {
            if row.contains(&column) {
                return Err(self.error(SyntaxError::DuplicateColumn(column), span));
            }
            row.insert(column, value);
        }
        Ok(Statement::Insert { table, row })
    }

    fn update(&mut self) -> LocatableResult<Statement> {
        let table = self.table_name()?;
        self.expect(TokenKind::Set)?;
        let assignments = self.comma_separated(|parser| {
            let column = parser.ident()?;
            parser.expect(TokenKind::Eq)?;
            let value = parser.literal()?;
            Ok(Assignment { column, value })
        })?;
        let conditions = self.where_clause()?;
        Ok(Statement::Update {
            table,
            assignments,
            conditions,
        })
    }

    fn select(&mut self) -> LocatableResult<Statement> {
        let projection = if self.eat(&TokenKind::Star) {
            Projection::All
        } else {
            Projection::Columns(self.comma_separated(Self::column_ref)?)
        };
        self.expect(TokenKind::From)?;
        let table = self.table_name()?;

        let mut joins = Vec::new();
        while self.eat(&TokenKind::Join) {
            let mut right = self.ident()?;
            if self.eat(&TokenKind::Dot) {
                // `JOIN d.t2` names a table in the same database.
                right = self.ident()?;
            }
            self.expect(TokenKind::On)?;
            let (left_table, left_column) = self.qualified_column()?;
            self.expect(TokenKind::Eq)?;
            let (right_table, right_column) = self.qualified_column()?;

            let clause = JoinClause::new(left_table, left_column, right_table, right_column);
            joins.push(if clause.left_table == right {
                clause.reversed()
            } else {
                clause
            });
        }

        let conditions = self.where_clause()?;
        Ok(Statement::Select {
            table,
            projection,
            joins,
            conditions,
        })
    }

    /// `t.c`, as required on either side of a join condition.
    fn qualified_column(&mut self) -> LocatableResult<(String, String)> {
        let table = self.ident()?;
        self.expect(TokenKind::Dot)?;
        let column = self.ident()?;
        Ok((table, column))
    }

    fn show(&mut self) -> LocatableResult<Statement> {
        const EXPECTED: &[&str] = &["DATABASES", "TABLES"];
        match self.next(EXPECTED)? {
            (TokenKind::Databases, _) => Ok(Statement::ShowDatabases),
            (TokenKind::Tables, _) => Ok(Statement::ShowTables {
                database: self.ident()?,
            }),
            (token, span) => Err(self.unexpected(&token, span, EXPECTED)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions_sorted::assert_eq;
    use ty::row;

    fn parse(sql: &str) -> Statement {
        parse_statement(sql).unwrap()
    }

    fn syntax_error(sql: &str) -> SyntaxError {
        match parse_statement(sql).unwrap_err() {
            (CompileError::SyntaxError(err), _) => err,
            (other, _) => panic!("expected a syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_database_statements() {
        assert_eq!(
            parse("CREATE DATABASE d1;"),
            Statement::CreateDatabase { name: "d1".into() }
        );
        assert_eq!(
            parse("drop database d1"),
            Statement::DropDatabase { name: "d1".into() }
        );
        assert_eq!(parse("SHOW DATABASES"), Statement::ShowDatabases);
        assert_eq!(
            parse("show tables d1"),
            Statement::ShowTables {
                database: "d1".into()
            }
        );
    }

    #[test]
    fn test_create_table() {
        let statement = parse(
            "CREATE TABLE d1.users (id INT PRIMARY KEY, email VARCHAR(64) UNIQUE, \
             team_id INTEGER REFERENCES teams(id), active BOOL)",
        );

        assert_eq!(
            statement,
            Statement::CreateTable {
                name: TableName::new("d1", "users"),
                columns: vec![
                    Column::new("id", DataTypeKind::Integer).primary_key(),
                    Column::new("email", DataTypeKind::Text).unique(),
                    Column::new("team_id", DataTypeKind::Integer).references("teams", "id"),
                    Column::new("active", DataTypeKind::Boolean),
                ],
            }
        );
    }

    #[test]
    fn test_unknown_type() {
        let (err, span) = parse_statement("CREATE TABLE d.t (id GEOMETRY)").unwrap_err();
        assert_eq!(
            err,
            CompileError::TypeError(TypeError::UnknownDataType {
                name: "GEOMETRY".into()
            })
        );
        assert_eq!(span, 21..29);
    }

    #[test]
    fn test_index_statements() {
        assert_eq!(
            parse("CREATE UNIQUE INDEX by_pair ON d1.t (a, b)"),
            Statement::CreateIndex {
                table: TableName::new("d1", "t"),
                name: "by_pair".into(),
                columns: vec!["a".into(), "b".into()],
                unique: true,
            }
        );
        assert_eq!(
            parse("DROP INDEX by_pair ON d1.t"),
            Statement::DropIndex {
                table: TableName::new("d1", "t"),
                name: "by_pair".into(),
            }
        );
    }

    #[test]
    fn test_insert() {
        assert_eq!(
            parse("INSERT INTO d1.t1 (id, name, score, ok, note) VALUES (1, 'it''s', -2.5, TRUE, NULL)"),
            Statement::Insert {
                table: TableName::new("d1", "t1"),
                row: row! {
                    "id" => 1,
                    "name" => "it's",
                    "score" => -2.5,
                    "ok" => true,
                    "note" => Value::Null,
                },
            }
        );
    }

    #[test]
    fn test_insert_shape_errors() {
        assert_eq!(
            syntax_error("INSERT INTO d.t (a, b) VALUES (1)"),
            SyntaxError::ValueCountMismatch {
                columns: 2,
                values: 1
            }
        );
        assert_eq!(
            syntax_error("INSERT INTO d.t (a, a) VALUES (1, 2)"),
            SyntaxError::DuplicateColumn("a".into())
        );
    }

    #[test]
    fn test_delete_and_update() {
        assert_eq!(
            parse("DELETE FROM d1.t1 WHERE id >= 2 AND name <> 'x'"),
            Statement::Delete {
                table: TableName::new("d1", "t1"),
                conditions: vec![
                    Condition::new("id", Operator::GtEq, Value::Integer(2)),
                    Condition::new("name", Operator::NotEq, Value::Text("x".into())),
                ],
            }
        );
        assert_eq!(
            parse("UPDATE d1.t1 SET name = 'b', score = 1 WHERE id = 1"),
            Statement::Update {
                table: TableName::new("d1", "t1"),
                assignments: vec![
                    Assignment {
                        column: "name".into(),
                        value: Value::Text("b".into())
                    },
                    Assignment {
                        column: "score".into(),
                        value: Value::Integer(1)
                    },
                ],
                conditions: vec![Condition::eq("id", Value::Integer(1))],
            }
        );
    }

    #[test]
    fn test_select_with_joins() {
        assert_eq!(
            parse(
                "SELECT users.id, teams.name FROM d1.users \
                 JOIN teams ON users.team_id = teams.id \
                 JOIN d1.orgs ON orgs.id = teams.org_id \
                 WHERE teams.name = 'core'"
            ),
            Statement::Select {
                table: TableName::new("d1", "users"),
                projection: Projection::Columns(vec!["users.id".into(), "teams.name".into()]),
                joins: vec![
                    JoinClause::new("users", "team_id", "teams", "id"),
                    JoinClause::new("teams", "org_id", "orgs", "id"),
                ],
                conditions: vec![Condition::eq("teams.name", Value::Text("core".into()))],
            }
        );
    }

    #[test]
    fn test_select_star() {
        assert_eq!(
            parse("select * from d1.t1"),
            Statement::Select {
                table: TableName::new("d1", "t1"),
                projection: Projection::All,
                joins: vec![],
                conditions: vec![],
            }
        );
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(syntax_error(""), SyntaxError::EmptyStatement);
        assert_eq!(syntax_error(" ; "), SyntaxError::EmptyStatement);
        assert!(matches!(
            syntax_error("SELECT * FROM"),
            SyntaxError::UnexpectedEOF { .. }
        ));
        assert!(matches!(
            syntax_error("SELECT * FROM t1"),
            SyntaxError::UnexpectedEOF { .. }
        ));
        assert!(matches!(
            syntax_error("FETCH everything"),
            SyntaxError::UnexpectedToken { .. }
        ));
        assert!(matches!(
            syntax_error("SHOW DATABASES extra"),
            SyntaxError::UnexpectedToken { .. }
        ));
        assert_eq!(
            syntax_error("SELECT 'oops"),
            SyntaxError::UnterminatedString
        );
    }
}
