//! Indexed nested-loop join.

use rustc_hash::FxHashMap;
use ty::{Row, Value};

/// Joins `outer` with `inner` on `outer[outer_column] = inner[inner_column]`.
///
/// The inner rows are grouped by join key once, then looked up per outer row. Each
/// match yields the outer row extended with the inner row's cells, named
/// `inner_table.column`. An outer row without a match is kept as is, so the
/// result never has fewer rows than `outer`. `NULL` keys match nothing.
pub fn indexed_join(
    outer: Vec<Row>,
    inner: &[Row],
    inner_table: &str,
    outer_column: &str,
    inner_column: &str,
) -> Vec<Row> {
    let mut groups: FxHashMap<&Value, Vec<&Row>> = FxHashMap::default();
    for row in inner {
        if let Some(key) = row.get(inner_column).filter(|key| !key.is_null()) {
            groups.entry(key).or_default().push(row);
        }
    }

    let mut joined = Vec::with_capacity(outer.len());
    for row in outer {
        let matches = row
            .get(outer_column)
            .filter(|key| !key.is_null())
            .and_then(|key| groups.get(key));

        match matches {
            Some(matches) => {
                for inner_row in matches {
                    let mut merged = row.clone();
                    for (column, value) in inner_row.iter() {
                        merged.insert(format!("{}.{}", inner_table, column), value.clone());
                    }
                    joined.push(merged);
                }
            }
            None => joined.push(row),
        }
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions_sorted::assert_eq;
    use ty::row;

    #[test]
    fn test_left_outer_semantics() {
        let users = vec![
            row! { "id" => 1, "team_id" => 10 },
            row! { "id" => 2, "team_id" => 20 },
            row! { "id" => 3, "team_id" => Value::Null },
        ];
        let teams = vec![
            row! { "id" => 10, "name" => "core" },
            row! { "id" => 30, "name" => "infra" },
        ];

        let joined = indexed_join(users, &teams, "teams", "team_id", "id");

        assert_eq!(
            joined,
            vec![
                row! { "id" => 1, "team_id" => 10, "teams.id" => 10, "teams.name" => "core" },
                row! { "id" => 2, "team_id" => 20 },
                row! { "id" => 3, "team_id" => Value::Null },
            ]
        );
    }

    #[test]
    fn test_one_row_per_match() {
        let teams = vec![row! { "id" => 10 }];
        let users = vec![
            row! { "uid" => 1, "team" => 10 },
            row! { "uid" => 2, "team" => 10 },
        ];

        let joined = indexed_join(teams, &users, "users", "id", "team");

        assert_eq!(joined.len(), 2);
        assert_eq!(joined[1].get("users.uid"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_numeric_keys_match_across_kinds() {
        let outer = vec![row! { "k" => 1.0 }];
        let inner = vec![row! { "k" => 1 }];

        let joined = indexed_join(outer, &inner, "b", "k", "k");

        assert_eq!(joined, vec![row! { "k" => 1.0, "b.k" => 1 }]);
    }
}
