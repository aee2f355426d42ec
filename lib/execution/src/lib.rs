//! # Query Executor
//!
//! Filters, joins and projections evaluated in application code over rows decoded
//! by the [`RecordManager`]. Reads take shared locks on every table involved for
//! the whole statement; updates compose record-level operations under a single
//! set of locks.
//!
//! Joins are indexed nested loops applied pairwise in declared order. Columns of
//! the base table keep their plain names; columns of every joined table are named
//! `table.column`.

mod join;
mod project;

pub use join::indexed_join;
pub use project::{project, ResultSet, CELL_WIDTH};

use catalog::{CatalogError, TableSchema};
use compile::{Assignment, JoinClause, Projection};
use std::sync::Arc;
use storage::{record::check_condition_columns, RecordError, RecordManager};
use thiserror::Error;
use tracing::{debug, info, instrument};
use ty::{matches_all, Condition, Row};

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid join: {0}")]
    InvalidJoin(String),
    #[error("projection is undefined over an empty result")]
    UndefinedProjection,
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

pub type Result<T> = std::result::Result<T, QueryError>;

/// One join step: the accumulated rows are matched against `inner_table` on
/// `outer_table.outer_column = inner_table.inner_column`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct JoinStep {
    outer_table: String,
    outer_column: String,
    inner_table: String,
    inner_column: String,
}

#[derive(Debug)]
pub struct QueryExecutor {
    records: Arc<RecordManager>,
}

impl QueryExecutor {
    pub fn new(records: Arc<RecordManager>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &Arc<RecordManager> {
        &self.records
    }

    /// Full scan of `table`, keeping the rows that satisfy every condition.
    #[instrument(skip(self, conditions))]
    pub fn scan(&self, db: &str, table: &str, conditions: &[Condition]) -> Result<Vec<Row>> {
        let schema = self.records.catalog().get_table(db, table)?;
        check_condition_columns(&schema, conditions)?;

        let rows = self.records.scan_rows(db, table)?;
        Ok(rows
            .into_iter()
            .filter(|row| matches_all(conditions, row))
            .collect())
    }

    /// Rows of `table` joined with every table of `joins`, filtered.
    ///
    /// A qualified condition (`t.c`) applies to table `t`; an unqualified one
    /// applies to every involved table that has the column. Filters run on each
    /// table's rows before joining, so an outer row whose matches were all
    /// filtered out is kept without inner columns.
    #[instrument(skip(self, joins, conditions))]
    pub fn select(
        &self,
        db: &str,
        table: &str,
        joins: &[JoinClause],
        conditions: &[Condition],
    ) -> Result<Vec<Row>> {
        let steps = plan_joins(table, joins)?;
        let tables: Vec<&str> = std::iter::once(table)
            .chain(steps.iter().map(|step| step.inner_table.as_str()))
            .collect();

        let locks = self
            .records
            .locks()
            .acquire(db, std::iter::empty::<&str>(), &tables);

        let catalog = self.records.catalog();
        let schemas = tables
            .iter()
            .map(|name| catalog.get_table(db, name))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for (step, inner) in steps.iter().zip(&schemas[1..]) {
            let outer = schemas
                .iter()
                .find(|schema| schema.name() == &step.outer_table)
                .ok_or_else(|| QueryError::NotFound(format!("table `{}`", step.outer_table)))?;
            require_column(outer, &step.outer_column)?;
            require_column(inner, &step.inner_column)?;
        }
        let filters = route_conditions(&schemas, conditions)?;

        let mut rows: Vec<Row> = self
            .records
            .read_rows(&locks, db, table)?
            .into_iter()
            .filter(|row| matches_all(&filters[0], row))
            .collect();

        for (position, step) in steps.iter().enumerate() {
            let inner: Vec<Row> = self
                .records
                .read_rows(&locks, db, &step.inner_table)?
                .into_iter()
                .filter(|row| matches_all(&filters[position + 1], row))
                .collect();

            let outer_column = if step.outer_table == table {
                step.outer_column.clone()
            } else {
                format!("{}.{}", step.outer_table, step.outer_column)
            };
            rows = indexed_join(
                rows,
                &inner,
                &step.inner_table,
                &outer_column,
                &step.inner_column,
            );
            debug!("Joined `{}`: {} row(s)", step.inner_table, rows.len());
        }
        Ok(rows)
    }

    /// [`Self::select`] followed by [`project`]. Projected names are resolved
    /// against the row naming: `table.c` becomes `c` for the base table, and an
    /// unqualified column missing from the base table resolves to the first
    /// joined table that has it.
    pub fn query(
        &self,
        db: &str,
        table: &str,
        projection: &Projection,
        joins: &[JoinClause],
        conditions: &[Condition],
    ) -> Result<ResultSet> {
        let rows = self.select(db, table, joins, conditions)?;

        let projection = match projection {
            Projection::All => Projection::All,
            Projection::Columns(columns) => {
                let catalog = self.records.catalog();
                let base = catalog.get_table(db, table)?;
                let mut joined = Vec::with_capacity(joins.len());
                for step in plan_joins(table, joins)? {
                    joined.push(catalog.get_table(db, &step.inner_table)?);
                }
                Projection::Columns(
                    columns
                        .iter()
                        .map(|column| resolve_column(&base, &joined, column))
                        .collect(),
                )
            }
        };
        project(&rows, &projection)
    }

    /// Applies `assignments` to every row matching all `conditions` and returns
    /// how many rows were updated.
    ///
    /// Rows are replaced one by one through [`RecordManager::update_row`], which
    /// re-runs the insert checks and puts the row back if they fail. Rows updated
    /// before a failing one keep their new values.
    #[instrument(skip(self, assignments, conditions))]
    pub fn update(
        &self,
        db: &str,
        table: &str,
        assignments: &[Assignment],
        conditions: &[Condition],
    ) -> Result<usize> {
        let schema = self.records.catalog().get_table(db, table)?;
        check_condition_columns(&schema, conditions)?;
        for assignment in assignments {
            require_column(&schema, &assignment.column)?;
        }

        let mut reads = self.records.insert_read_set(db, table)?;
        reads.extend(self.records.delete_read_set(db, table)?);
        let locks = self.records.locks().acquire(db, [table], reads);

        let rows: Vec<Row> = self
            .records
            .read_rows(&locks, db, table)?
            .into_iter()
            .filter(|row| matches_all(conditions, row))
            .collect();

        let mut updated = 0;
        for row in &rows {
            let mut new_row = row.clone();
            for assignment in assignments {
                new_row.insert(assignment.column.clone(), assignment.value.clone());
            }
            self.records.update_row(&locks, db, table, row, new_row)?;
            updated += 1;
        }
        info!("Updated {} row(s) in `{}.{}`", updated, db, table);
        Ok(updated)
    }
}

/// Orients every clause so its left side is already part of the result.
fn plan_joins(base: &str, joins: &[JoinClause]) -> Result<Vec<JoinStep>> {
    let mut joined = vec![base.to_string()];
    let mut steps = Vec::with_capacity(joins.len());

    for clause in joins {
        let left_joined = joined.contains(&clause.left_table);
        let right_joined = joined.contains(&clause.right_table);
        let clause = match (left_joined, right_joined) {
            (true, false) => clause.clone(),
            (false, true) => clause.reversed(),
            (true, true) => {
                return Err(QueryError::InvalidJoin(format!(
                    "`{}` joins tables that are already joined",
                    clause
                )))
            }
            (false, false) => {
                return Err(QueryError::InvalidJoin(format!(
                    "`{}` does not reference a table joined so far",
                    clause
                )))
            }
        };

        joined.push(clause.right_table.clone());
        steps.push(JoinStep {
            outer_table: clause.left_table,
            outer_column: clause.left_column,
            inner_table: clause.right_table,
            inner_column: clause.right_column,
        });
    }
    Ok(steps)
}

fn require_column(schema: &TableSchema, column: &str) -> Result<()> {
    if schema.has_column(column) {
        Ok(())
    } else {
        Err(QueryError::NotFound(format!(
            "column `{}` in `{}`",
            column,
            schema.name()
        )))
    }
}

/// Splits `conditions` per table (same order as `schemas`), with unqualified
/// column names.
fn route_conditions(schemas: &[TableSchema], conditions: &[Condition]) -> Result<Vec<Vec<Condition>>> {
    let mut routed = vec![Vec::new(); schemas.len()];

    for condition in conditions {
        match condition.qualifier() {
            Some((table, column)) => {
                let position = schemas
                    .iter()
                    .position(|schema| schema.name() == table)
                    .ok_or_else(|| QueryError::NotFound(format!("table `{}` in query", table)))?;
                require_column(&schemas[position], column)?;
                routed[position].push(Condition::new(column, condition.operator, condition.value.clone()));
            }
            None => {
                let mut applied = false;
                for (position, schema) in schemas.iter().enumerate() {
                    if schema.has_column(&condition.column) {
                        routed[position].push(condition.clone());
                        applied = true;
                    }
                }
                if !applied {
                    return Err(QueryError::NotFound(format!(
                        "column `{}` in any queried table",
                        condition.column
                    )));
                }
            }
        }
    }
    Ok(routed)
}

fn resolve_column(base: &TableSchema, joined: &[TableSchema], column: &str) -> String {
    match column.split_once('.') {
        Some((table, name)) if table == base.name() => name.to_string(),
        Some(_) => column.to_string(),
        None if base.has_column(column) => column.to_string(),
        None => joined
            .iter()
            .find(|schema| schema.has_column(column))
            .map(|schema| format!("{}.{}", schema.name(), column))
            .unwrap_or_else(|| column.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::{Catalog, Column};
    use pretty_assertions_sorted::assert_eq;
    use storage::MemoryStore;
    use ty::{row, DataTypeKind, Operator, Value};

    fn executor() -> QueryExecutor {
        let records = RecordManager::new(Arc::new(Catalog::in_memory()), Arc::new(MemoryStore::new()));
        records.create_database("d1").unwrap();
        records
            .create_table(
                "d1",
                "orgs",
                vec![
                    Column::new("id", DataTypeKind::Integer).primary_key(),
                    Column::new("region", DataTypeKind::Text),
                ],
            )
            .unwrap();
        records
            .create_table(
                "d1",
                "teams",
                vec![
                    Column::new("id", DataTypeKind::Integer).primary_key(),
                    Column::new("name", DataTypeKind::Text).unique(),
                    Column::new("org_id", DataTypeKind::Integer).references("orgs", "id"),
                ],
            )
            .unwrap();
        records
            .create_table(
                "d1",
                "users",
                vec![
                    Column::new("id", DataTypeKind::Integer).primary_key(),
                    Column::new("login", DataTypeKind::Text).unique(),
                    Column::new("team_id", DataTypeKind::Integer).references("teams", "id"),
                ],
            )
            .unwrap();

        records.insert("d1", "orgs", row! { "id" => 100, "region" => "eu" }).unwrap();
        for team in [
            row! { "id" => 1, "name" => "core", "org_id" => 100 },
            row! { "id" => 2, "name" => "infra", "org_id" => Value::Null },
        ] {
            records.insert("d1", "teams", team).unwrap();
        }
        for user in [
            row! { "id" => 10, "login" => "ann", "team_id" => 1 },
            row! { "id" => 11, "login" => "bob", "team_id" => 1 },
            row! { "id" => 12, "login" => "cyd", "team_id" => 2 },
            row! { "id" => 13, "login" => "dee", "team_id" => Value::Null },
        ] {
            records.insert("d1", "users", user).unwrap();
        }
        QueryExecutor::new(Arc::new(records))
    }

    #[test]
    fn test_scan_filters() {
        let executor = executor();

        let rows = executor
            .scan(
                "d1",
                "users",
                &[
                    Condition::new("id", Operator::GtEq, Value::Integer(11)),
                    Condition::new("login", Operator::NotEq, Value::Text("cyd".into())),
                ],
            )
            .unwrap();
        assert_eq!(
            rows,
            vec![
                row! { "id" => 11, "login" => "bob", "team_id" => 1 },
                row! { "id" => 13, "login" => "dee", "team_id" => Value::Null },
            ]
        );

        assert!(matches!(
            executor.scan("d1", "users", &[Condition::eq("age", Value::Integer(1))]),
            Err(QueryError::Record(RecordError::NotFound(_)))
        ));
    }

    #[test]
    fn test_join_keeps_every_outer_row() {
        let executor = executor();
        let joins = [JoinClause::new("users", "team_id", "teams", "id")];

        let rows = executor.select("d1", "users", &joins, &[]).unwrap();

        assert_eq!(rows.len(), 4);
        assert_eq!(
            rows[0],
            row! {
                "id" => 10, "login" => "ann", "team_id" => 1,
                "teams.id" => 1, "teams.name" => "core", "teams.org_id" => 100,
            }
        );
        assert_eq!(rows[3], row! { "id" => 13, "login" => "dee", "team_id" => Value::Null });
    }

    #[test]
    fn test_reversed_clause_and_chained_join() {
        let executor = executor();
        let joins = [
            JoinClause::new("teams", "id", "users", "team_id"),
            JoinClause::new("orgs", "id", "teams", "org_id"),
        ];

        let result = executor
            .query(
                "d1",
                "users",
                &Projection::Columns(vec!["users.login".into(), "name".into(), "region".into()]),
                &joins,
                &[Condition::eq("users.id", Value::Integer(10))],
            )
            .unwrap();

        assert_eq!(
            result.columns().to_vec(),
            vec!["login".to_string(), "teams.name".to_string(), "orgs.region".to_string()]
        );
        assert_eq!(
            result.rows().to_vec(),
            vec![vec!["ann".to_string(), "core".to_string(), "eu".to_string()]]
        );
    }

    #[test]
    fn test_unqualified_filter_applies_to_every_table_with_the_column() {
        let executor = executor();
        let joins = [JoinClause::new("users", "team_id", "teams", "id")];

        // `id = 1` holds for team 1 but for no user.
        let rows = executor
            .select("d1", "users", &joins, &[Condition::eq("id", Value::Integer(1))])
            .unwrap();
        assert!(rows.is_empty());

        // `name` only exists on teams: users are kept, non-matching teams dropped.
        let rows = executor
            .select(
                "d1",
                "users",
                &joins,
                &[Condition::eq("name", Value::Text("infra".into()))],
            )
            .unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].get("teams.name"), None);
        assert_eq!(rows[2].get("teams.name"), Some(&Value::Text("infra".into())));
    }

    #[test]
    fn test_invalid_joins_and_filters() {
        let executor = executor();

        assert!(matches!(
            executor.select(
                "d1",
                "users",
                &[JoinClause::new("teams", "id", "orgs", "id")],
                &[]
            ),
            Err(QueryError::InvalidJoin(_))
        ));
        assert!(matches!(
            executor.select(
                "d1",
                "users",
                &[JoinClause::new("users", "team_id", "ghosts", "id")],
                &[]
            ),
            Err(QueryError::Catalog(CatalogError::NotFound(_)))
        ));
        assert!(matches!(
            executor.select(
                "d1",
                "users",
                &[JoinClause::new("users", "nope", "teams", "id")],
                &[]
            ),
            Err(QueryError::NotFound(_))
        ));
        assert!(matches!(
            executor.select("d1", "users", &[], &[Condition::eq("orgs.id", Value::Integer(1))]),
            Err(QueryError::NotFound(_))
        ));
        assert!(matches!(
            executor.select("d1", "users", &[], &[Condition::eq("region", Value::Integer(1))]),
            Err(QueryError::NotFound(_))
        ));
    }

    #[test]
    fn test_update_rewrites_matching_rows() {
        let executor = executor();

        let updated = executor
            .update(
                "d1",
                "users",
                &[Assignment {
                    column: "team_id".into(),
                    value: Value::Integer(2),
                }],
                &[Condition::eq("team_id", Value::Integer(1))],
            )
            .unwrap();
        assert_eq!(updated, 2);

        let rows = executor
            .scan("d1", "users", &[Condition::eq("team_id", Value::Integer(2))])
            .unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_update_rechecks_constraints() {
        let executor = executor();

        assert!(matches!(
            executor.update(
                "d1",
                "users",
                &[Assignment {
                    column: "login".into(),
                    value: Value::Text("ann".into()),
                }],
                &[Condition::eq("id", Value::Integer(11))],
            ),
            Err(QueryError::Record(RecordError::UniqueConstraintViolation(_)))
        ));
        assert!(matches!(
            executor.update(
                "d1",
                "users",
                &[Assignment {
                    column: "team_id".into(),
                    value: Value::Integer(9),
                }],
                &[Condition::eq("id", Value::Integer(11))],
            ),
            Err(QueryError::Record(RecordError::ForeignKeyConstraintViolation(_)))
        ));

        // Renaming a referenced team leaves its key untouched.
        assert_eq!(
            executor
                .update(
                    "d1",
                    "teams",
                    &[Assignment {
                        column: "name".into(),
                        value: Value::Text("platform".into()),
                    }],
                    &[Condition::eq("id", Value::Integer(1))],
                )
                .unwrap(),
            1
        );
        assert_eq!(
            executor
                .scan("d1", "users", &[Condition::eq("id", Value::Integer(11))])
                .unwrap(),
            vec![row! { "id" => 11, "login" => "bob", "team_id" => 1 }]
        );
    }
}
