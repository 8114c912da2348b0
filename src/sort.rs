use itertools::Itertools;
use serde_json::Value;

use crate::collection::interface::{Error, Result};
use crate::data_types::NATURAL_ORDER;
use crate::document::Document;
use crate::naming::Dialect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

impl TryFrom<i64> for SortDirection {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            1 => Ok(SortDirection::Ascending),
            -1 => Ok(SortDirection::Descending),
            other => Err(Error::InvalidArgument {
                reason: format!("Illegal sort value: {other}"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

/// Ordered sort keys; earlier keys take precedence. Empty means no ordering
/// is requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSpec {
    keys: Vec<SortKey>,
}

impl SortSpec {
    pub fn natural() -> Self {
        Self {
            keys: vec![SortKey {
                field: NATURAL_ORDER.to_string(),
                direction: SortDirection::Ascending,
            }],
        }
    }

    /// Build from raw (field, direction) pairs, failing on the first
    /// direction that isn't 1 or -1.
    pub fn try_from_pairs<S: Into<String>>(
        pairs: impl IntoIterator<Item = (S, i64)>,
    ) -> Result<Self> {
        let keys = pairs
            .into_iter()
            .map(|(field, direction)| {
                Ok(SortKey {
                    field: field.into(),
                    direction: SortDirection::try_from(direction)?,
                })
            })
            .collect::<Result<_>>()?;
        Ok(Self { keys })
    }

    /// Parse a `{"field": 1, "other": -1}` document
    pub fn from_document(document: &Document) -> Result<Self> {
        let pairs = document
            .iter()
            .map(|(field, value)| match value {
                Value::Number(n) => n.as_i64().map(|d| (field.as_str(), d)).ok_or_else(
                    || Error::InvalidArgument {
                        reason: format!("Illegal sort value: {n}"),
                    },
                ),
                other => Err(Error::InvalidArgument {
                    reason: format!("Illegal sort value: {other}"),
                }),
            })
            .collect::<Result<Vec<_>>>()?;
        Self::try_from_pairs(pairs)
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Render an ORDER BY clause (or nothing, for an empty spec). Documents lacking
/// a sort field always come last, whatever the direction.
pub fn order_by_clause(dialect: Dialect, sort: &SortSpec) -> Result<String> {
    if sort.is_empty() {
        return Ok(String::new());
    }

    let keys = sort
        .keys()
        .iter()
        .map(|key| {
            let expression = if key.field == NATURAL_ORDER {
                "id".to_string()
            } else {
                dialect.data_key(&key.field)?
            };
            Ok(format!("{expression} {} NULLS LAST", key.direction.as_sql()))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(format!("ORDER BY {}", keys.iter().join(", ")))
}
