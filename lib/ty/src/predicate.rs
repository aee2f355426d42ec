//! Filter predicates of the form `(column, operator, value)`.
//!
//! A list of conditions is conjunctive: a row qualifies when every condition holds.

use crate::{Row, TypeError, Value};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl Operator {
    pub fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Operator::Eq => ordering == Ordering::Equal,
            Operator::NotEq => ordering != Ordering::Equal,
            Operator::Lt => ordering == Ordering::Less,
            Operator::LtEq => ordering != Ordering::Greater,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::GtEq => ordering != Ordering::Less,
        }
    }
}

impl FromStr for Operator {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "=" | "==" => Ok(Operator::Eq),
            "!=" | "<>" => Ok(Operator::NotEq),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::LtEq),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::GtEq),
            _ => Err(TypeError::UnknownOperator(s.to_string())),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Lt => "<",
            Operator::LtEq => "<=",
            Operator::Gt => ">",
            Operator::GtEq => ">=",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub column: String,
    pub operator: Operator,
    pub value: Value,
}

impl Condition {
    pub fn new(column: impl Into<String>, operator: Operator, value: Value) -> Self {
        Self {
            column: column.into(),
            operator,
            value,
        }
    }

    pub fn eq(column: impl Into<String>, value: Value) -> Self {
        Self::new(column, Operator::Eq, value)
    }

    /// Evaluates the condition against `row`. A missing column, a `NULL` on either
    /// side or incomparable kinds all evaluate to `false`.
    pub fn matches(&self, row: &Row) -> bool {
        row.get(&self.column)
            .and_then(|cell| cell.compare(&self.value))
            .map(|ordering| self.operator.holds(ordering))
            .unwrap_or(false)
    }

    /// Splits a qualified `table.column` reference into its parts.
    pub fn qualifier(&self) -> Option<(&str, &str)> {
        self.column.split_once('.')
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.column, self.operator, self.value)
    }
}

/// Returns `true` when `row` satisfies every condition.
pub fn matches_all(conditions: &[Condition], row: &Row) -> bool {
    conditions.iter().all(|condition| condition.matches(row))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;

    #[test]
    fn evaluates_each_operator() {
        let row = row! { "age" => 30 };
        let cases = [
            (Operator::Eq, 30, true),
            (Operator::NotEq, 30, false),
            (Operator::Lt, 31, true),
            (Operator::LtEq, 30, true),
            (Operator::Gt, 30, false),
            (Operator::GtEq, 29, true),
        ];

        for (operator, literal, expected) in cases {
            let condition = Condition::new("age", operator, Value::Integer(literal));
            assert_eq!(condition.matches(&row), expected, "{}", condition);
        }
    }

    #[test]
    fn missing_column_and_null_never_match() {
        let row = row! { "name" => Value::Null };
        assert!(!Condition::eq("name", Value::Null).matches(&row));
        assert!(!Condition::eq("other", Value::Integer(1)).matches(&row));
        assert!(!Condition::new("name", Operator::NotEq, "x".into()).matches(&row));
    }

    #[test]
    fn conditions_are_conjunctive() {
        let row = row! { "a" => 1, "b" => "x" };
        let conditions = vec![
            Condition::eq("a", Value::Integer(1)),
            Condition::eq("b", Value::Text("y".into())),
        ];
        assert!(!matches_all(&conditions, &row));
        assert!(matches_all(&conditions[..1], &row));
        assert!(matches_all(&[], &row));
    }

    #[test]
    fn parses_operator_symbols() {
        assert_eq!("<>".parse::<Operator>().unwrap(), Operator::NotEq);
        assert_eq!(">=".parse::<Operator>().unwrap(), Operator::GtEq);
        assert!("~".parse::<Operator>().is_err());
    }
}
