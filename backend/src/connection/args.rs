//! Connection arguments and their validation

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{QueryError, Result};

/// Sort direction
#[derive(async_graphql::Enum, Copy, Clone, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
#[graphql(name = "SortDirection")]
pub enum SortDirection {
    #[default]
    #[graphql(name = "ASC")]
    #[serde(rename = "ASC")]
    Asc,
    #[graphql(name = "DESC")]
    #[serde(rename = "DESC")]
    Desc,
}

impl SortDirection {
    pub fn reverse(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub attribute: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn new(attribute: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            attribute: attribute.into(),
            direction,
        }
    }

    pub fn asc(attribute: impl Into<String>) -> Self {
        Self::new(attribute, SortDirection::Asc)
    }

    pub fn desc(attribute: impl Into<String>) -> Self {
        Self::new(attribute, SortDirection::Desc)
    }
}

/// Pagination, sort and filter arguments of one connection field.
///
/// `before`/`after` are the opaque cursor strings received from the client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionArgs {
    pub first: Option<i64>,
    pub last: Option<i64>,
    pub before: Option<String>,
    pub after: Option<String>,
    pub offset: Option<i64>,
    pub order_by: Vec<OrderBy>,
    pub filter: Option<Value>,
}

impl ConnectionArgs {
    pub fn first(mut self, first: i64) -> Self {
        self.first = Some(first);
        self
    }

    pub fn last(mut self, last: i64) -> Self {
        self.last = Some(last);
        self
    }

    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.after = Some(cursor.into());
        self
    }

    pub fn before(mut self, cursor: impl Into<String>) -> Self {
        self.before = Some(cursor.into());
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn order_by(mut self, attribute: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by.push(OrderBy::new(attribute, direction));
        self
    }

    pub fn filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Check argument combinations against `max_page_size`
    pub fn validate(&self, max_page_size: i64) -> Result<()> {
        if let (Some(first), Some(last)) = (self.first, self.last) {
            if first >= 0 && last >= 0 {
                return Err(QueryError::MutuallyExclusivePagination);
            }
        }

        for (argument, value) in [("first", self.first), ("last", self.last)] {
            if let Some(value) = value {
                if !(0..=max_page_size).contains(&value) {
                    return Err(QueryError::PageSizeOutOfRange {
                        argument,
                        value,
                        max: max_page_size,
                    });
                }
            }
        }

        if let Some(offset) = self.offset {
            if offset < 0 {
                return Err(QueryError::InvalidOffset { value: offset });
            }
        }

        Ok(())
    }
}
