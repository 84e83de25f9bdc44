//! Range queries over one entity type.
//!
//! [`FindQuery`] describes a lookup; [`find_statement`] renders it. Ranged
//! queries order by sort key with the typed key as tie-breaker, so results
//! are deterministic even when sort keys collide. Unranged queries order by
//! typed key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;
use crate::error::StoreError;
use crate::statement::{SqlBuilder, Statement};

/// Sort direction of a ranged query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    fn sql(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Order::Asc => write!(f, "asc"),
            Order::Desc => write!(f, "desc"),
        }
    }
}

impl FromStr for Order {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Order::Asc),
            "desc" => Ok(Order::Desc),
            other => Err(StoreError::invalid_key(other, "order must be asc or desc")),
        }
    }
}

/// Inclusive sort-key bounds plus a direction. A missing bound leaves that
/// side open.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Range {
    pub order: Order,
    pub lower: Option<String>,
    pub upper: Option<String>,
}

impl Range {
    pub fn new(order: Order, lower: Option<String>, upper: Option<String>) -> Self {
        Range {
            order,
            lower,
            upper,
        }
    }

    pub fn asc(lower: Option<&str>, upper: Option<&str>) -> Self {
        Range::new(Order::Asc, lower.map(str::to_owned), upper.map(str::to_owned))
    }

    pub fn desc(lower: Option<&str>, upper: Option<&str>) -> Self {
        Range::new(Order::Desc, lower.map(str::to_owned), upper.map(str::to_owned))
    }

    /// No bounds, ordered by `order`.
    pub fn unbounded(order: Order) -> Self {
        Range::new(order, None, None)
    }
}

/// A lookup of one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindQuery {
    pub typ: String,
    /// Restricts to entities indexed under this `(relation, key)` pair.
    pub related_to: Option<(String, String)>,
    pub range: Option<Range>,
    pub limit: Option<u64>,
}

impl FindQuery {
    pub fn of_type(typ: impl Into<String>) -> Self {
        FindQuery {
            typ: typ.into(),
            related_to: None,
            range: None,
            limit: None,
        }
    }

    pub fn related_to(mut self, relation: impl Into<String>, key: impl Into<String>) -> Self {
        self.related_to = Some((relation.into(), key.into()));
        self
    }

    pub fn range(mut self, range: Range) -> Self {
        self.range = Some(range);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Largest limit every engine accepts.
const MAX_SQL_LIMIT: u64 = i64::MAX as u64;

/// Renders `query` as a `SELECT typed_key, payload, sort_key` statement.
pub(crate) fn find_statement(dialect: &dyn Dialect, query: &FindQuery) -> Statement {
    let mut b = SqlBuilder::new(
        dialect,
        "SELECT typed_key, payload, sort_key FROM entities WHERE ",
    );
    b.type_namespace(&query.typ);

    if let Some((relation, key)) = &query.related_to {
        b.push(" AND typed_key IN (SELECT typed_key FROM relations WHERE relation = ")
            .bind(relation.clone())
            .push(" AND relation_key = ")
            .bind(key.clone())
            .push(")");
    }

    match &query.range {
        Some(range) => {
            b.push(" AND sort_key IS NOT NULL");
            if let Some(lower) = &range.lower {
                b.push(" AND sort_key >= ").bind(lower.clone());
            }
            if let Some(upper) = &range.upper {
                b.push(" AND sort_key <= ").bind(upper.clone());
            }
            let dir = range.order.sql();
            b.push(&format!(" ORDER BY sort_key {dir}, typed_key {dir}"));
        }
        None => {
            b.push(" ORDER BY typed_key ASC");
        }
    }

    if let Some(limit) = query.limit {
        let limit = limit.min(MAX_SQL_LIMIT);
        b.push(&format!(" LIMIT {limit}"));
    }
    b.finish()
}
