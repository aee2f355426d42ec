//! Projection and text rendering of result sets.

use crate::{QueryError, Result};
use compile::Projection;
use std::fmt;
use ty::Row;

/// Width of every rendered cell, borders excluded.
pub const CELL_WIDTH: usize = 20;

/// Projected rows, rendered as cell text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ResultSet {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Keeps the projected columns of `rows`.
///
/// `*` (or an empty column list) projects the columns of the first row, so it
/// is undefined over an empty result. A named column a row lacks renders as an
/// empty cell.
pub fn project(rows: &[Row], projection: &Projection) -> Result<ResultSet> {
    let columns: Vec<String> = match projection.columns() {
        [] => rows
            .first()
            .ok_or(QueryError::UndefinedProjection)?
            .columns()
            .map(str::to_string)
            .collect(),
        named => named.to_vec(),
    };

    let rows = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| row.get(column).map(|value| value.to_string()).unwrap_or_default())
                .collect()
        })
        .collect();

    Ok(ResultSet { columns, rows })
}

fn border(f: &mut fmt::Formatter<'_>, cells: usize) -> fmt::Result {
    write!(f, "+")?;
    for _ in 0..cells {
        write!(f, "{}+", "-".repeat(CELL_WIDTH + 2))?;
    }
    writeln!(f)
}

fn line(f: &mut fmt::Formatter<'_>, cells: &[String]) -> fmt::Result {
    write!(f, "|")?;
    for cell in cells {
        write!(f, " {:<width$.width$} |", cell, width = CELL_WIDTH)?;
    }
    writeln!(f)
}

impl fmt::Display for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        border(f, self.columns.len())?;
        line(f, &self.columns)?;
        border(f, self.columns.len())?;
        if !self.rows.is_empty() {
            for row in &self.rows {
                line(f, row)?;
            }
            border(f, self.columns.len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions_sorted::assert_eq;
    use ty::{row, Value};

    #[test]
    fn test_star_uses_first_row() {
        let rows = vec![
            row! { "id" => 1, "name" => "a" },
            row! { "id" => 2, "name" => "b", "teams.id" => 7 },
        ];

        let result = project(&rows, &Projection::All).unwrap();

        assert_eq!(result.columns().to_vec(), vec!["id".to_string(), "name".to_string()]);
        assert_eq!(
            result.rows().to_vec(),
            vec![
                vec!["1".to_string(), "a".to_string()],
                vec!["2".to_string(), "b".to_string()]
            ]
        );
    }

    #[test]
    fn test_missing_column_is_empty_text() {
        let rows = vec![row! { "id" => 1, "note" => Value::Null }];

        let result = project(
            &rows,
            &Projection::Columns(vec!["note".into(), "teams.name".into()]),
        )
        .unwrap();

        assert_eq!(result.rows().to_vec(), vec![vec!["NULL".to_string(), String::new()]]);
    }

    #[test]
    fn test_empty_rows() {
        assert!(matches!(
            project(&[], &Projection::All),
            Err(QueryError::UndefinedProjection)
        ));

        let result = project(&[], &Projection::Columns(vec!["id".into()])).unwrap();
        assert_eq!(
            result.to_string(),
            "+----------------------+\n\
             | id                   |\n\
             +----------------------+\n"
        );
    }

    #[test]
    fn test_render_pads_and_truncates() {
        let rows = vec![row! { "id" => 1, "name" => "a name well past twenty characters" }];

        let rendered = project(&rows, &Projection::All).unwrap().to_string();

        assert_eq!(
            rendered,
            "+----------------------+----------------------+\n\
             | id                   | name                 |\n\
             +----------------------+----------------------+\n\
             | 1                    | a name well past twe |\n\
             +----------------------+----------------------+\n"
        );
    }
}
