//! Filter trees: predicates combined with AND/OR groups and negation.
//!
//! Trees are immutable once built. Translation into SQL lives in
//! [`crate::translate`].

use std::fmt;

use crate::field::Field;
use crate::value::Value;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `=` (or `IS NULL` for a null value)
    Equal,
    /// `<>` (or `IS NOT NULL` for a null value)
    NotEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
    /// `LIKE`
    Like,
    /// `NOT LIKE`
    NotLike,
    /// `BETWEEN @F_Left AND @F_Right`, value is a two-element array
    Between,
    /// `NOT BETWEEN`
    NotBetween,
    /// `IN (...)`, value is a non-empty array
    In,
    /// `NOT IN (...)`
    NotIn,
    /// `IS NULL`, value ignored
    IsNull,
    /// `IS NOT NULL`, value ignored
    IsNotNull,
}

impl Operation {
    /// SQL operator text for binary comparisons.
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "<>",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::Between => "BETWEEN",
            Self::NotBetween => "NOT BETWEEN",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }

    /// Operations whose value is a list.
    pub const fn takes_list(self) -> bool {
        matches!(self, Self::Between | Self::NotBetween | Self::In | Self::NotIn)
    }

    /// Operations that take no value.
    pub const fn ignores_value(self) -> bool {
        matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Logical operator joining the children of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Conjunction {
    /// All children must match.
    #[default]
    And,
    /// At least one child must match.
    Or,
}

impl Conjunction {
    /// SQL keyword.
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// One filter predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryField {
    /// Column the predicate applies to.
    pub field: Field,
    /// Comparison.
    pub operation: Operation,
    /// Operand: scalar, array for list operations, or null.
    pub value: Value,
}

impl QueryField {
    /// Predicate on a column name.
    pub fn new(field: impl Into<String>, operation: Operation, value: impl Into<Value>) -> Self {
        Self {
            field: Field::new(field),
            operation,
            value: value.into(),
        }
    }

    /// Predicate on an already resolved field.
    pub fn on(field: Field, operation: Operation, value: impl Into<Value>) -> Self {
        Self {
            field,
            operation,
            value: value.into(),
        }
    }
}

/// A child of a [`QueryGroup`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryItem {
    /// A predicate.
    Field(QueryField),
    /// A nested group.
    Group(QueryGroup),
}

impl From<QueryField> for QueryItem {
    fn from(field: QueryField) -> Self {
        Self::Field(field)
    }
}

impl From<QueryGroup> for QueryItem {
    fn from(group: QueryGroup) -> Self {
        Self::Group(group)
    }
}

/// Predicates and nested groups joined by one conjunction, optionally negated.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryGroup {
    /// Children, rendered left to right.
    pub items: Vec<QueryItem>,
    /// Operator joining the children.
    pub conjunction: Conjunction,
    /// Render as `NOT (...)`.
    pub is_not: bool,
}

impl QueryGroup {
    /// Group of children joined by `conjunction`.
    pub fn new(items: Vec<QueryItem>, conjunction: Conjunction) -> Self {
        Self {
            items,
            conjunction,
            is_not: false,
        }
    }

    /// Negate this group.
    #[must_use]
    pub const fn negate(mut self) -> Self {
        self.is_not = !self.is_not;
        self
    }

    /// True when the group has no children.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Every predicate in left-to-right, depth-first order.
    pub fn fields(&self) -> Vec<&QueryField> {
        let mut out = Vec::new();
        collect_fields(self, &mut out);
        out
    }

    /// Copy of the tree with every predicate's field passed through `f`.
    ///
    /// Used to map property names onto column names before translation.
    #[must_use]
    pub fn map_fields(&self, f: &impl Fn(&Field) -> Field) -> Self {
        let items = self
            .items
            .iter()
            .map(|item| match item {
                QueryItem::Field(qf) => QueryItem::Field(QueryField {
                    field: f(&qf.field),
                    operation: qf.operation,
                    value: qf.value.clone(),
                }),
                QueryItem::Group(group) => QueryItem::Group(group.map_fields(f)),
            })
            .collect();
        Self {
            items,
            conjunction: self.conjunction,
            is_not: self.is_not,
        }
    }
}

impl From<QueryField> for QueryGroup {
    fn from(field: QueryField) -> Self {
        Self::new(vec![QueryItem::Field(field)], Conjunction::And)
    }
}

fn collect_fields<'a>(group: &'a QueryGroup, out: &mut Vec<&'a QueryField>) {
    for item in &group.items {
        match item {
            QueryItem::Field(field) => out.push(field),
            QueryItem::Group(inner) => collect_fields(inner, out),
        }
    }
}

/// Helper function to create a single predicate.
pub fn field(name: impl Into<String>, operation: Operation, value: impl Into<Value>) -> QueryItem {
    QueryItem::Field(QueryField::new(name, operation, value))
}

/// Helper function to create an AND group.
#[must_use]
pub fn and(items: Vec<QueryItem>) -> QueryGroup {
    QueryGroup::new(items, Conjunction::And)
}

/// Helper function to create an OR group.
#[must_use]
pub fn or(items: Vec<QueryItem>) -> QueryGroup {
    QueryGroup::new(items, Conjunction::Or)
}

/// Helper function to negate an item. Groups are negated in place, single
/// predicates are wrapped in a negated group.
#[must_use]
pub fn not(item: impl Into<QueryItem>) -> QueryGroup {
    match item.into() {
        QueryItem::Group(group) => group.negate(),
        field @ QueryItem::Field(_) => QueryGroup::new(vec![field], Conjunction::And).negate(),
    }
}
