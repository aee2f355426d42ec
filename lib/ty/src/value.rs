//! # Values
//!
//! This module provides [`Value`], the scalar stored in a row cell.
//!
//! Values compare across numeric kinds (`Integer(1) == Float(1.0)`) and hash
//! consistently with that equality, so they can be used directly as join keys.
//! `NULL` never compares equal or ordered to anything in predicates, following SQL
//! semantics; structural equality (`==`) still treats two `NULL`s as equal so rows
//! can be compared in tests.

use crate::{DataTypeKind, TypeError};
use serde::{Deserialize, Serialize};
use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Null,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the [`DataTypeKind`] of the value, `None` for `NULL`.
    pub fn kind(&self) -> Option<DataTypeKind> {
        match self {
            Value::Null => None,
            Value::Integer(_) => Some(DataTypeKind::Integer),
            Value::Float(_) => Some(DataTypeKind::Float),
            Value::Boolean(_) => Some(DataTypeKind::Boolean),
            Value::Text(_) => Some(DataTypeKind::Text),
        }
    }

    fn kind_name(&self) -> String {
        self.kind()
            .map(|k| k.name().to_string())
            .unwrap_or_else(|| "NULL".to_string())
    }

    /// Parses the textual form of a value as the given type.
    pub fn parse_as(raw: &str, target: &DataTypeKind) -> Result<Self, TypeError> {
        let invalid = || TypeError::InvalidCast {
            value: raw.to_string(),
            to: target.name().to_string(),
        };

        match target {
            DataTypeKind::Integer => raw.trim().parse().map(Value::Integer).map_err(|_| invalid()),
            DataTypeKind::Float => raw.trim().parse().map(Value::Float).map_err(|_| invalid()),
            DataTypeKind::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Ok(Value::Boolean(true)),
                "false" | "f" | "0" => Ok(Value::Boolean(false)),
                _ => Err(invalid()),
            },
            DataTypeKind::Text => Ok(Value::Text(raw.to_string())),
        }
    }

    /// Coerces the value to `target`, returning a [`TypeError`] when no lossless
    /// conversion exists.
    pub fn coerce_to(&self, target: &DataTypeKind) -> Result<Self, TypeError> {
        match (self, target) {
            (Value::Null, _) => Ok(Value::Null),
            (Value::Integer(_), DataTypeKind::Integer)
            | (Value::Float(_), DataTypeKind::Float)
            | (Value::Boolean(_), DataTypeKind::Boolean)
            | (Value::Text(_), DataTypeKind::Text) => Ok(self.clone()),
            (Value::Integer(i), DataTypeKind::Float) => Ok(Value::Float(*i as f64)),
            (Value::Float(f), DataTypeKind::Integer) if f.fract() == 0.0 => {
                Ok(Value::Integer(*f as i64))
            }
            (Value::Integer(i), DataTypeKind::Boolean) if *i == 0 || *i == 1 => {
                Ok(Value::Boolean(*i == 1))
            }
            (Value::Text(s), _) => Value::parse_as(s, target),
            (_, DataTypeKind::Text) => Ok(Value::Text(self.to_string())),
            _ => Err(TypeError::IncompatibleType {
                expected: target.name().to_string(),
                found: self.kind_name(),
            }),
        }
    }

    /// SQL comparison: `None` when either side is `NULL` or the kinds are not comparable.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Float(b)) => compare_integer_to_float(*a, *b),
            (Value::Float(a), Value::Integer(b)) => {
                compare_integer_to_float(*b, *a).map(Ordering::reverse)
            }
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Float that holds an exact integer, used to keep hashing consistent with equality.
    fn as_exact_integer(f: f64) -> Option<i64> {
        if f.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&f) {
            Some(f as i64)
        } else {
            None
        }
    }
}

/// 2^63, the first float above every `i64`.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Exact ordering of an integer against a float. Casting the integer would round
/// it above 2^53 and make distinct values compare equal.
fn compare_integer_to_float(i: i64, f: f64) -> Option<Ordering> {
    if f.is_nan() {
        return None;
    }
    if f >= I64_BOUND {
        return Some(Ordering::Less);
    }
    if f < -I64_BOUND {
        return Some(Ordering::Greater);
    }
    let whole = f.trunc();
    let ordering = i.cmp(&(whole as i64)).then_with(|| {
        if f > whole {
            Ordering::Less
        } else if f < whole {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    });
    Some(ordering)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits() || a == b,
            _ => self.compare(other) == Some(Ordering::Equal),
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => 0u8.hash(state),
            Value::Integer(i) => {
                1u8.hash(state);
                i.hash(state);
            }
            Value::Float(f) => match Value::as_exact_integer(*f) {
                Some(i) => {
                    1u8.hash(state);
                    i.hash(state);
                }
                None => {
                    2u8.hash(state);
                    f.to_bits().hash(state);
                }
            },
            Value::Boolean(b) => {
                3u8.hash(state);
                b.hash(state);
            }
            Value::Text(s) => {
                4u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(value: &Value) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn numeric_kinds_compare_and_hash_alike() {
        assert_eq!(Value::Integer(3), Value::Float(3.0));
        assert_eq!(hash_of(&Value::Integer(3)), hash_of(&Value::Float(3.0)));
        assert_ne!(Value::Integer(3), Value::Float(3.5));
    }

    #[test]
    fn large_integers_compare_exactly_against_floats() {
        let big = 1_i64 << 53;

        assert_ne!(Value::Integer(big + 1), Value::Float(big as f64));
        assert_eq!(
            Value::Integer(big + 1).compare(&Value::Float(big as f64)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            Value::Float(big as f64).compare(&Value::Integer(big + 1)),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Integer(big), Value::Float(big as f64));
        assert_ne!(Value::Integer(i64::MAX), Value::Float(i64::MAX as f64));
        assert_eq!(Value::Integer(i64::MIN), Value::Float(i64::MIN as f64));
        assert_eq!(
            Value::Integer(-3).compare(&Value::Float(-2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Integer(1).compare(&Value::Float(f64::NAN)), None);
    }

    #[test]
    fn zeros_compare_and_hash_alike() {
        assert_eq!(Value::Float(-0.0), Value::Float(0.0));
        assert_eq!(Value::Float(-0.0), Value::Integer(0));
        assert_eq!(hash_of(&Value::Float(-0.0)), hash_of(&Value::Float(0.0)));
        assert_eq!(hash_of(&Value::Float(-0.0)), hash_of(&Value::Integer(0)));
    }

    #[test]
    fn null_is_not_ordered() {
        assert_eq!(Value::Null.compare(&Value::Integer(1)), None);
        assert_eq!(Value::Null.compare(&Value::Null), None);
        assert_eq!(Value::Null, Value::Null);
    }

    #[test]
    fn mixed_kinds_are_not_comparable() {
        assert_eq!(Value::Text("1".into()).compare(&Value::Integer(1)), None);
        assert_ne!(Value::Text("1".into()), Value::Integer(1));
    }

    #[test]
    fn coerces_literals_to_declared_type() {
        assert_eq!(
            Value::Integer(2).coerce_to(&DataTypeKind::Float).unwrap(),
            Value::Float(2.0)
        );
        assert_eq!(
            Value::Text("17".into()).coerce_to(&DataTypeKind::Integer).unwrap(),
            Value::Integer(17)
        );
        assert_eq!(
            Value::Integer(5).coerce_to(&DataTypeKind::Text).unwrap(),
            Value::Text("5".into())
        );
        assert_eq!(
            Value::Null.coerce_to(&DataTypeKind::Boolean).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn rejects_lossy_coercion() {
        assert!(Value::Float(2.5).coerce_to(&DataTypeKind::Integer).is_err());
        assert!(Value::Text("abc".into()).coerce_to(&DataTypeKind::Integer).is_err());
        assert!(Value::Boolean(true).coerce_to(&DataTypeKind::Integer).is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        for (value, kind) in [
            (Value::Integer(-7), DataTypeKind::Integer),
            (Value::Float(1.25), DataTypeKind::Float),
            (Value::Boolean(false), DataTypeKind::Boolean),
            (Value::Text("a#b".into()), DataTypeKind::Text),
        ] {
            assert_eq!(Value::parse_as(&value.to_string(), &kind).unwrap(), value);
        }
    }
}
