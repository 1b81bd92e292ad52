// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metadata `where` filters for collection queries
//!
//! Filters use the JSON shape common to vector stores:
//! `{"genre": "Fantasy"}`, `{"difficulty": {"$in": ["Beginner", "Advanced"]}}`,
//! `{"$or": [{"genre": "Math"}, {"id": {"$gt": 10}}]}`. Several keys at the
//! top level of one object are combined with `$and`.

use serde_json::{Map, Value};

use crate::catalog::ArchiveRecord;
use crate::errors::ArchiveError;

/// Metadata field a filter can reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Id,
    Genre,
    Title,
    Difficulty,
    Summary,
    FileHash,
    FileCid,
}

impl FilterField {
    fn parse(name: &str) -> Result<Self, ArchiveError> {
        Ok(match name {
            "id" => FilterField::Id,
            "genre" => FilterField::Genre,
            "title" => FilterField::Title,
            "difficulty" => FilterField::Difficulty,
            "summary" => FilterField::Summary,
            "file_hash" => FilterField::FileHash,
            "file_cid" => FilterField::FileCid,
            other => {
                return Err(ArchiveError::invalid_filter(format!(
                    "unknown field '{}'",
                    other
                )))
            }
        })
    }

    fn value_of(self, record: &ArchiveRecord) -> Scalar<'_> {
        match self {
            FilterField::Id => Scalar::Int(record.id),
            FilterField::Genre => Scalar::Text(&record.genre),
            FilterField::Title => Scalar::Text(&record.title),
            FilterField::Difficulty => Scalar::Text(&record.difficulty),
            FilterField::Summary => Scalar::Text(&record.summary),
            FilterField::FileHash => Scalar::Text(&record.file_hash),
            FilterField::FileCid => Scalar::Text(&record.file_cid),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Scalar<'a> {
    Int(i64),
    Text(&'a str),
}

impl Scalar<'_> {
    fn equals(&self, value: &Value) -> bool {
        match (self, value) {
            (Scalar::Int(n), Value::Number(v)) => v.as_f64() == Some(*n as f64),
            (Scalar::Text(s), Value::String(v)) => s == v,
            _ => false,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Int(n) => Some(*n as f64),
            Scalar::Text(_) => None,
        }
    }
}

/// Comparison applied to a single field
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Gt(f64),
    Gte(f64),
    Lt(f64),
    Lte(f64),
}

/// Parsed filter tree
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Field(FilterField, Condition),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    /// Parse a JSON filter
    pub fn parse(value: &Value) -> Result<Self, ArchiveError> {
        let object = value
            .as_object()
            .ok_or_else(|| ArchiveError::invalid_filter("filter must be a JSON object"))?;
        if object.is_empty() {
            return Err(ArchiveError::invalid_filter("filter must not be empty"));
        }

        let mut clauses = object
            .iter()
            .map(|(key, value)| Self::parse_clause(key, value))
            .collect::<Result<Vec<_>, _>>()?;

        if clauses.len() == 1 {
            Ok(clauses.remove(0))
        } else {
            Ok(Filter::And(clauses))
        }
    }

    fn parse_clause(key: &str, value: &Value) -> Result<Self, ArchiveError> {
        match key {
            "$and" => Ok(Filter::And(Self::parse_list(key, value)?)),
            "$or" => Ok(Filter::Or(Self::parse_list(key, value)?)),
            _ if key.starts_with('$') => Err(ArchiveError::invalid_filter(format!(
                "unknown logical operator '{}'",
                key
            ))),
            _ => {
                let field = FilterField::parse(key)?;
                match value {
                    Value::Object(ops) => Self::parse_operators(field, ops),
                    Value::String(_) | Value::Number(_) => {
                        Ok(Filter::Field(field, Condition::Eq(value.clone())))
                    }
                    _ => Err(ArchiveError::invalid_filter(format!(
                        "value for '{}' must be a string, number or operator object",
                        key
                    ))),
                }
            }
        }
    }

    fn parse_list(key: &str, value: &Value) -> Result<Vec<Filter>, ArchiveError> {
        let items = value
            .as_array()
            .filter(|items| !items.is_empty())
            .ok_or_else(|| {
                ArchiveError::invalid_filter(format!("'{}' expects a non-empty array", key))
            })?;
        items.iter().map(Self::parse).collect()
    }

    fn parse_operators(field: FilterField, ops: &Map<String, Value>) -> Result<Self, ArchiveError> {
        if ops.is_empty() {
            return Err(ArchiveError::invalid_filter("operator object must not be empty"));
        }

        let mut conditions = ops
            .iter()
            .map(|(op, operand)| {
                let condition = match op.as_str() {
                    "$eq" => Condition::Eq(scalar_operand(op, operand)?),
                    "$ne" => Condition::Ne(scalar_operand(op, operand)?),
                    "$in" => Condition::In(list_operand(op, operand)?),
                    "$nin" => Condition::NotIn(list_operand(op, operand)?),
                    "$gt" => Condition::Gt(number_operand(op, operand)?),
                    "$gte" => Condition::Gte(number_operand(op, operand)?),
                    "$lt" => Condition::Lt(number_operand(op, operand)?),
                    "$lte" => Condition::Lte(number_operand(op, operand)?),
                    other => {
                        return Err(ArchiveError::invalid_filter(format!(
                            "unknown operator '{}'",
                            other
                        )))
                    }
                };
                Ok(Filter::Field(field, condition))
            })
            .collect::<Result<Vec<_>, ArchiveError>>()?;

        if conditions.len() == 1 {
            Ok(conditions.remove(0))
        } else {
            Ok(Filter::And(conditions))
        }
    }

    /// Check whether a record satisfies the filter
    pub fn matches(&self, record: &ArchiveRecord) -> bool {
        match self {
            Filter::And(filters) => filters.iter().all(|f| f.matches(record)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(record)),
            Filter::Field(field, condition) => {
                let actual = field.value_of(record);
                match condition {
                    Condition::Eq(v) => actual.equals(v),
                    Condition::Ne(v) => !actual.equals(v),
                    Condition::In(vs) => vs.iter().any(|v| actual.equals(v)),
                    Condition::NotIn(vs) => !vs.iter().any(|v| actual.equals(v)),
                    Condition::Gt(n) => actual.as_number().is_some_and(|a| a > *n),
                    Condition::Gte(n) => actual.as_number().is_some_and(|a| a >= *n),
                    Condition::Lt(n) => actual.as_number().is_some_and(|a| a < *n),
                    Condition::Lte(n) => actual.as_number().is_some_and(|a| a <= *n),
                }
            }
        }
    }
}

fn scalar_operand(op: &str, operand: &Value) -> Result<Value, ArchiveError> {
    match operand {
        Value::String(_) | Value::Number(_) => Ok(operand.clone()),
        _ => Err(ArchiveError::invalid_filter(format!(
            "'{}' expects a string or number",
            op
        ))),
    }
}

fn list_operand(op: &str, operand: &Value) -> Result<Vec<Value>, ArchiveError> {
    let items = operand.as_array().ok_or_else(|| {
        ArchiveError::invalid_filter(format!("'{}' expects an array", op))
    })?;
    items.iter().map(|item| scalar_operand(op, item)).collect()
}

fn number_operand(op: &str, operand: &Value) -> Result<f64, ArchiveError> {
    operand
        .as_f64()
        .ok_or_else(|| ArchiveError::invalid_filter(format!("'{}' expects a number", op)))
}
