use std::cmp::Ordering;

use serde_json::Value;

use super::error::FilterError;
use super::types::{FilterCondition, FilterOp, FilterWhereInfo};
use crate::types::{parse_timestamp, Record};

/// Characters the REST filter grammar reserves inside `or=(...)` and `in.(...)`
const RESERVED: &[char] = &[',', '.', ':', '(', ')', '"', '\\'];

pub struct FilterWhere;

impl FilterWhere {
    /// Render conditions as `(column, "op.value")` query pairs; OR groups
    /// become a single `or=(a.op.v,b.op.v)` pair.
    pub fn generate(conditions: &[FilterCondition]) -> Result<Vec<(String, String)>, FilterError> {
        conditions
            .iter()
            .map(|condition| match condition {
                FilterCondition::Field(info) => Ok((
                    info.column.clone(),
                    format!("{}.{}", info.operator.keyword(), Self::encode(info, false)?),
                )),
                FilterCondition::Or(group) => {
                    let parts = group
                        .iter()
                        .map(|info| {
                            Ok(format!(
                                "{}.{}.{}",
                                info.column,
                                info.operator.keyword(),
                                Self::encode(info, true)?
                            ))
                        })
                        .collect::<Result<Vec<_>, FilterError>>()?;
                    Ok(("or".to_string(), format!("({})", parts.join(","))))
                }
            })
            .collect()
    }

    fn encode(info: &FilterWhereInfo, nested: bool) -> Result<String, FilterError> {
        match (&info.operator, &info.data) {
            (FilterOp::In, Value::Array(values)) => {
                let items = values
                    .iter()
                    .map(|v| Self::scalar_text(&info.column, v).map(|s| Self::quote_if_reserved(&s)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("({})", items.join(",")))
            }
            (_, value) => {
                let text = Self::scalar_text(&info.column, value)?;
                if nested {
                    Ok(Self::quote_if_reserved(&text))
                } else {
                    Ok(text)
                }
            }
        }
    }

    fn scalar_text(column: &str, value: &Value) -> Result<String, FilterError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Null => Ok("null".to_string()),
            _ => Err(FilterError::InvalidOperatorData(format!(
                "nested value not allowed for '{}'",
                column
            ))),
        }
    }

    fn quote_if_reserved(text: &str) -> String {
        if !text.chars().any(|c| RESERVED.contains(&c) || c.is_whitespace()) {
            return text.to_string();
        }
        let mut quoted = String::with_capacity(text.len() + 2);
        quoted.push('"');
        for c in text.chars() {
            if c == '"' || c == '\\' {
                quoted.push('\\');
            }
            quoted.push(c);
        }
        quoted.push('"');
        quoted
    }

    pub fn matches(conditions: &[FilterCondition], record: &Record) -> bool {
        conditions.iter().all(|condition| match condition {
            FilterCondition::Field(info) => Self::matches_info(info, record),
            FilterCondition::Or(group) => group.iter().any(|info| Self::matches_info(info, record)),
        })
    }

    fn matches_info(info: &FilterWhereInfo, record: &Record) -> bool {
        let value = record.get(&info.column).unwrap_or(&Value::Null);
        match info.operator {
            FilterOp::Eq => Self::values_equal(value, &info.data),
            FilterOp::Gte => matches!(
                compare_values(value, &info.data),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::Lte => matches!(
                compare_values(value, &info.data),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOp::ILike => match (value.as_str(), info.data.as_str()) {
                (Some(text), Some(pattern)) => {
                    let text: Vec<char> = text.to_lowercase().chars().collect();
                    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
                    like_match(&text, &pattern)
                }
                _ => false,
            },
            FilterOp::In => info
                .data
                .as_array()
                .map(|values| values.iter().any(|v| Self::values_equal(value, v)))
                .unwrap_or(false),
        }
    }

    fn values_equal(a: &Value, b: &Value) -> bool {
        match (a, b) {
            // The store coerces filter text to the column type
            (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
                n.to_string() == *s
            }
            _ => compare_values(a, b) == Some(Ordering::Equal),
        }
    }
}

/// SQL-style comparison: NULL compares with nothing, strings that both parse
/// as timestamps compare chronologically.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::String(x), Value::String(y)) => match (parse_timestamp(x), parse_timestamp(y)) {
            (Some(tx), Some(ty)) => Some(tx.cmp(&ty)),
            _ => Some(x.cmp(y)),
        },
        _ => None,
    }
}

/// LIKE matching: `%` any run, `_` any single char, `\` escapes the next char
fn like_match(text: &[char], pattern: &[char]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some(('%', rest)) => (0..=text.len()).any(|skip| like_match(&text[skip..], rest)),
        Some(('_', rest)) => !text.is_empty() && like_match(&text[1..], rest),
        Some(('\\', rest)) => match rest.split_first() {
            Some((literal, rest)) => text.first() == Some(literal) && like_match(&text[1..], rest),
            None => text.first() == Some(&'\\') && text.len() == 1,
        },
        Some((c, rest)) => text.first() == Some(c) && like_match(&text[1..], rest),
    }
}
