//! Backend-independent query plan composed by the search pipeline.
//!
//! Storage adapters translate a [`ModelQuery`] into SQL or evaluate it in memory. Column
//! references without a scope resolve against the root table of the query, or against the
//! related row when they appear inside [`Condition::RelatedExists`].

use restify_domain::{FieldType, KeyType, SortDirection};
use serde_json::Value;

/// Reference to a column, optionally scoped to a join alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    /// Join alias; `None` targets the current root scope.
    pub scope: Option<String>,
    /// Column name.
    pub column: String,
}

impl ColumnRef {
    /// References a column of the root scope.
    #[must_use]
    pub fn root(column: impl Into<String>) -> Self {
        Self {
            scope: None,
            column: column.into(),
        }
    }

    /// References a column of a joined scope.
    #[must_use]
    pub fn scoped(scope: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            scope: Some(scope.into()),
            column: column.into(),
        }
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal.
    Eq,
    /// Not equal.
    Neq,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
}

impl CompareOp {
    /// Returns the SQL operator.
    #[must_use]
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Neq => "<>",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }
}

/// Logical composition mode of a condition group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalMode {
    /// Every condition must match.
    And,
    /// Any condition may match.
    Or,
}

/// Correlation between a parent scope and rows of a related table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationLink {
    /// Related table.
    pub table: String,
    /// Column on the related table.
    pub related_column: String,
    /// Column on the parent scope it must equal.
    pub parent_column: ColumnRef,
}

/// One predicate of a query plan.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Typed comparison.
    Compare {
        /// Compared column.
        column: ColumnRef,
        /// Operator.
        op: CompareOp,
        /// Expected value.
        value: Value,
        /// Storage type used to bind the value.
        field_type: FieldType,
    },
    /// Pattern match on the textual value of a column.
    Like {
        /// Matched column.
        column: ColumnRef,
        /// SQL `LIKE` pattern.
        pattern: String,
        /// Case-insensitive matching (`ILIKE`).
        case_insensitive: bool,
    },
    /// Set membership.
    In {
        /// Matched column.
        column: ColumnRef,
        /// Candidate values.
        values: Vec<Value>,
        /// Storage type used to bind values.
        field_type: FieldType,
        /// `NOT IN` when set.
        negated: bool,
    },
    /// Null check.
    Null {
        /// Checked column.
        column: ColumnRef,
        /// `IS NOT NULL` when set.
        negated: bool,
    },
    /// Inclusive range.
    Between {
        /// Matched column.
        column: ColumnRef,
        /// Lower bound.
        low: Value,
        /// Upper bound.
        high: Value,
        /// Storage type used to bind bounds.
        field_type: FieldType,
        /// `NOT BETWEEN` when set.
        negated: bool,
    },
    /// Nested group.
    Group {
        /// Composition mode.
        mode: LogicalMode,
        /// Child conditions.
        conditions: Vec<Condition>,
    },
    /// Negation of a condition.
    Not(Box<Condition>),
    /// Existence of a correlated related row, optionally matching a condition.
    RelatedExists {
        /// Correlation to the parent scope.
        link: RelationLink,
        /// Condition evaluated against the related row.
        condition: Option<Box<Condition>>,
    },
}

impl Condition {
    /// Builds an equality comparison on a root column.
    #[must_use]
    pub fn eq(column: impl Into<String>, value: Value, field_type: FieldType) -> Self {
        Self::Compare {
            column: ColumnRef::root(column),
            op: CompareOp::Eq,
            value,
            field_type,
        }
    }

    /// Builds an OR group.
    #[must_use]
    pub fn any(conditions: Vec<Condition>) -> Self {
        Self::Group {
            mode: LogicalMode::Or,
            conditions,
        }
    }
}

/// Left join of a related table, used by cross-table sorts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    /// Alias referenced by scoped columns.
    pub alias: String,
    /// Joined table.
    pub table: String,
    /// Column on the joined table.
    pub column: String,
    /// Column of the parent scope it must equal.
    pub parent_column: ColumnRef,
}

/// Ordering directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Ordered column.
    pub column: ColumnRef,
    /// Direction.
    pub direction: SortDirection,
}

/// Aggregate function evaluated over a filtered query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    /// Row count.
    Count,
    /// Column sum.
    Sum,
    /// Column average.
    Avg,
    /// Column minimum.
    Min,
    /// Column maximum.
    Max,
}

impl AggregateFunction {
    /// Returns the SQL function name.
    #[must_use]
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }
}

/// Named aggregate declared by a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    /// Key used in the response envelope.
    pub key: String,
    /// Function.
    pub function: AggregateFunction,
    /// Aggregated column; ignored by `Count`.
    pub column: Option<String>,
}

impl Aggregate {
    /// Counts matching rows.
    #[must_use]
    pub fn count(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            function: AggregateFunction::Count,
            column: None,
        }
    }

    /// Aggregates a column with the provided function.
    #[must_use]
    pub fn of(
        key: impl Into<String>,
        function: AggregateFunction,
        column: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            function,
            column: Some(column.into()),
        }
    }
}

/// Query plan over one repository table.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelQuery {
    table: String,
    key_column: String,
    conditions: Vec<Condition>,
    joins: Vec<Join>,
    orders: Vec<Order>,
    eager: Vec<String>,
    limit: Option<usize>,
    offset: usize,
}

impl ModelQuery {
    /// Creates an unconstrained query over a table.
    #[must_use]
    pub fn new(table: impl Into<String>, key_column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key_column: key_column.into(),
            conditions: Vec::new(),
            joins: Vec::new(),
            orders: Vec::new(),
            eager: Vec::new(),
            limit: None,
            offset: 0,
        }
    }

    /// Returns the root table.
    #[must_use]
    pub fn table(&self) -> &str {
        self.table.as_str()
    }

    /// Returns the key column of the root table.
    #[must_use]
    pub fn key_column(&self) -> &str {
        self.key_column.as_str()
    }

    /// Returns the AND-ed conditions.
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Returns declared joins.
    #[must_use]
    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    /// Returns ordering directives in application order.
    #[must_use]
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// Returns relation names to eager-load.
    #[must_use]
    pub fn eager(&self) -> &[String] {
        &self.eager
    }

    /// Returns the row limit.
    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Returns the row offset.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Adds a condition.
    pub fn filter(&mut self, condition: Condition) -> &mut Self {
        self.conditions.push(condition);
        self
    }

    /// Restricts the query to one key.
    pub fn where_key(&mut self, key: Value, key_type: KeyType) -> &mut Self {
        let column = self.key_column.clone();
        self.filter(Condition::eq(column, key, key_type.field_type()))
    }

    /// Restricts the query to a set of keys.
    pub fn where_keys_in(&mut self, keys: Vec<Value>, key_type: KeyType) -> &mut Self {
        let column = ColumnRef::root(self.key_column.clone());
        self.filter(Condition::In {
            column,
            values: keys,
            field_type: key_type.field_type(),
            negated: false,
        })
    }

    /// Adds a left join unless the alias is already joined.
    pub fn join(&mut self, join: Join) -> &mut Self {
        if !self.joins.iter().any(|existing| existing.alias == join.alias) {
            self.joins.push(join);
        }
        self
    }

    /// Returns whether an alias is joined.
    #[must_use]
    pub fn has_join(&self, alias: &str) -> bool {
        self.joins.iter().any(|join| join.alias == alias)
    }

    /// Appends an ordering directive.
    pub fn order_by(&mut self, column: ColumnRef, direction: SortDirection) -> &mut Self {
        self.orders.push(Order { column, direction });
        self
    }

    /// Removes ordering directives.
    pub fn clear_orders(&mut self) -> &mut Self {
        self.orders.clear();
        self
    }

    /// Requests eager loading of a relation.
    pub fn with_relation(&mut self, relation: impl Into<String>) -> &mut Self {
        let relation = relation.into();
        if !self.eager.contains(&relation) {
            self.eager.push(relation);
        }
        self
    }

    /// Limits the number of returned rows.
    pub fn set_limit(&mut self, limit: Option<usize>) -> &mut Self {
        self.limit = limit;
        self
    }

    /// Skips leading rows.
    pub fn set_offset(&mut self, offset: usize) -> &mut Self {
        self.offset = offset;
        self
    }

    /// Applies page-based pagination; pages start at 1.
    pub fn for_page(&mut self, page: usize, per_page: usize) -> &mut Self {
        let page = page.max(1);
        self.limit = Some(per_page);
        self.offset = (page - 1).saturating_mul(per_page);
        self
    }

    /// Returns a copy without ordering or pagination, as used for counts and aggregates.
    #[must_use]
    pub fn unpaginated(&self) -> Self {
        let mut query = self.clone();
        query.orders.clear();
        query.limit = None;
        query.offset = 0;
        query
    }
}

#[cfg(test)]
mod tests {
    use restify_domain::{KeyType, SortDirection};
    use serde_json::json;

    use super::{ColumnRef, Join, ModelQuery};

    #[test]
    fn pagination_offsets_start_at_page_one() {
        let mut query = ModelQuery::new("posts", "id");
        query.for_page(3, 15);
        assert_eq!(query.limit(), Some(15));
        assert_eq!(query.offset(), 30);

        query.for_page(0, 15);
        assert_eq!(query.offset(), 0);
    }

    #[test]
    fn joins_are_deduplicated_by_alias() {
        let mut query = ModelQuery::new("posts", "id");
        for _ in 0..2 {
            query.join(Join {
                alias: "owner".to_owned(),
                table: "users".to_owned(),
                column: "id".to_owned(),
                parent_column: ColumnRef::root("user_id"),
            });
        }
        assert_eq!(query.joins().len(), 1);
    }

    #[test]
    fn unpaginated_copy_drops_orders_and_limits() {
        let mut query = ModelQuery::new("posts", "id");
        query
            .where_key(json!(1), KeyType::Integer)
            .order_by(ColumnRef::root("id"), SortDirection::Desc)
            .for_page(2, 10);

        let copy = query.unpaginated();
        assert!(copy.orders().is_empty());
        assert_eq!(copy.limit(), None);
        assert_eq!(copy.conditions().len(), 1);
    }
}
