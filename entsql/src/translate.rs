//! Filter tree to parameterized WHERE text.
//!
//! A pure recursive fold. Parameter names derive from column names; a name
//! already taken in the same statement gets the first free `_1`, `_2`, ...
//! suffix, allocated left to right, depth first.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::query::{Operation, QueryField, QueryGroup, QueryItem};
use crate::setting::DbSetting;
use crate::statement::Parameter;
use crate::value::Value;

/// Parameter names taken within one statement.
///
/// Names compare case-insensitively, matching how most providers resolve them.
#[derive(Debug, Clone, Default)]
pub struct ParameterNames {
    used: HashSet<String>,
}

impl ParameterNames {
    /// Empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `name` as taken. Returns false if it already was.
    pub fn reserve(&mut self, name: &str) -> bool {
        self.used.insert(name.to_ascii_lowercase())
    }

    /// Whether `name` is taken.
    pub fn contains(&self, name: &str) -> bool {
        self.used.contains(&name.to_ascii_lowercase())
    }

    /// Take `base`, or the first free `base_N`.
    pub fn allocate(&mut self, base: &str) -> String {
        if self.reserve(base) {
            return base.to_string();
        }
        let mut n = 1usize;
        loop {
            let candidate = format!("{base}_{n}");
            if self.reserve(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Number of names taken.
    pub fn len(&self) -> usize {
        self.used.len()
    }

    /// True when no name is taken.
    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

/// Rendered WHERE fragment (without the `WHERE` keyword).
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    /// Condition text, e.g. `([Id] = @Id)`.
    pub text: String,
    /// Parameters in placeholder order.
    pub parameters: Vec<Parameter>,
}

/// Translate a filter tree into a WHERE fragment.
///
/// Every group renders parenthesized; a negated group renders as
/// `NOT (...)`, including groups around null comparisons.
pub fn translate(
    group: &QueryGroup,
    setting: &DbSetting,
    names: &mut ParameterNames,
) -> Result<WhereClause> {
    let mut parameters = Vec::new();
    let text = render_group(group, setting, names, &mut parameters)?;
    Ok(WhereClause { text, parameters })
}

fn render_group(
    group: &QueryGroup,
    setting: &DbSetting,
    names: &mut ParameterNames,
    params: &mut Vec<Parameter>,
) -> Result<String> {
    if group.items.is_empty() {
        return Err(Error::empty("Query group"));
    }

    let mut parts = Vec::with_capacity(group.items.len());
    for item in &group.items {
        let part = match item {
            QueryItem::Field(field) => render_field(field, setting, names, params)?,
            QueryItem::Group(inner) => render_group(inner, setting, names, params)?,
        };
        parts.push(part);
    }

    let joined = parts.join(&format!(" {} ", group.conjunction.keyword()));
    if group.is_not {
        Ok(format!("NOT ({joined})"))
    } else {
        Ok(format!("({joined})"))
    }
}

fn render_field(
    qf: &QueryField,
    setting: &DbSetting,
    names: &mut ParameterNames,
    params: &mut Vec<Parameter>,
) -> Result<String> {
    let column = setting.quote(&qf.field.name);
    let base = setting.parameter_name(&qf.field.name);
    let op = qf.operation;

    let mut push = |name: String, value: Value| {
        let placeholder = setting.placeholder(&name);
        let mut param = Parameter::literal(name, value).typed(qf.field.client_type);
        param.db_type = qf.field.db_type;
        params.push(param);
        placeholder
    };

    match (op, &qf.value) {
        (Operation::IsNull | Operation::IsNotNull, _) => Ok(format!("{column} {}", op.symbol())),
        (Operation::Equal, Value::Null) => Ok(format!("{column} IS NULL")),
        (Operation::NotEqual, Value::Null) => Ok(format!("{column} IS NOT NULL")),

        (Operation::In | Operation::NotIn, Value::Array(values)) => {
            if values.is_empty() {
                return Err(Error::empty(format!("{} list for '{}'", op, qf.field.name)));
            }
            let mut placeholders = Vec::with_capacity(values.len());
            for (i, value) in values.iter().enumerate() {
                if matches!(value, Value::Array(_)) {
                    return Err(malformed(qf, "list elements must be scalar"));
                }
                let name = names.allocate(&format!("{base}_In_{i}"));
                placeholders.push(push(name, value.clone()));
            }
            Ok(format!("{column} {} ({})", op.symbol(), placeholders.join(", ")))
        },

        (Operation::Between | Operation::NotBetween, Value::Array(values)) => {
            let [left, right] = values.as_slice() else {
                return Err(malformed(
                    qf,
                    &format!("expects exactly 2 values, got {}", values.len()),
                ));
            };
            let left_name = names.allocate(&format!("{base}_Left"));
            let right_name = names.allocate(&format!("{base}_Right"));
            let left = push(left_name, left.clone());
            let right = push(right_name, right.clone());
            Ok(format!("{column} {} {left} AND {right}", op.symbol()))
        },

        (_, Value::Array(_)) if !op.takes_list() => Err(malformed(qf, "expects a scalar value")),
        (_, _) if op.takes_list() => Err(malformed(qf, "expects an array value")),
        (_, Value::Null) => Err(malformed(
            qf,
            "null operand requires Equal, NotEqual, IsNull or IsNotNull",
        )),

        (_, value) => {
            let name = names.allocate(&base);
            let placeholder = push(name, value.clone());
            Ok(format!("{column} {} {placeholder}", op.symbol()))
        },
    }
}

fn malformed(qf: &QueryField, reason: &str) -> Error {
    Error::MalformedFilter {
        field: qf.field.name.clone(),
        operation: qf.operation.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{and, field, not, or};

    fn render(group: &QueryGroup) -> Result<WhereClause> {
        translate(group, &DbSetting::SQL_SERVER, &mut ParameterNames::new())
    }

    #[test]
    fn test_single_field() {
        let clause = render(&and(vec![field("Id", Operation::Equal, 10)])).unwrap();
        assert_eq!(clause.text, "([Id] = @Id)");
        assert_eq!(clause.parameters.len(), 1);
        assert_eq!(clause.parameters[0].name, "Id");
    }

    #[test]
    fn test_collisions_get_suffixes_in_order() {
        let group = and(vec![
            field("Age", Operation::GreaterThan, 18),
            or(vec![
                field("Age", Operation::LessThan, 65),
                field("Age", Operation::Equal, 99),
            ])
            .into(),
        ]);
        let clause = render(&group).unwrap();
        assert_eq!(
            clause.text,
            "([Age] > @Age AND ([Age] < @Age_1 OR [Age] = @Age_2))"
        );
        let names: Vec<_> = clause.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Age", "Age_1", "Age_2"]);
    }

    #[test]
    fn test_negated_null_equality_keeps_not() {
        let clause = render(&not(QueryField::new("Name", Operation::Equal, Value::Null))).unwrap();
        assert_eq!(clause.text, "NOT ([Name] IS NULL)");
        assert!(clause.parameters.is_empty());
    }

    #[test]
    fn test_negated_compound_group() {
        let group = not(or(vec![
            field("A", Operation::Equal, 1),
            field("B", Operation::NotEqual, Value::Null),
        ]));
        let clause = render(&group).unwrap();
        assert_eq!(clause.text, "NOT ([A] = @A OR [B] IS NOT NULL)");
    }

    #[test]
    fn test_in_expands_placeholders() {
        let group = and(vec![field("Id", Operation::In, Value::array([1, 2, 3]))]);
        let clause = render(&group).unwrap();
        assert_eq!(clause.text, "([Id] IN (@Id_In_0, @Id_In_1, @Id_In_2))");
        assert_eq!(clause.parameters.len(), 3);
    }

    #[test]
    fn test_empty_in_fails() {
        let group = and(vec![field("Id", Operation::In, Value::Array(vec![]))]);
        assert!(matches!(render(&group), Err(Error::Empty { .. })));
    }

    #[test]
    fn test_between_requires_two_values() {
        let ok = and(vec![field("Age", Operation::Between, Value::array([1, 9]))]);
        assert_eq!(
            render(&ok).unwrap().text,
            "([Age] BETWEEN @Age_Left AND @Age_Right)"
        );

        for values in [vec![1], vec![1, 2, 3]] {
            let bad = and(vec![field("Age", Operation::Between, Value::array(values))]);
            assert!(matches!(render(&bad), Err(Error::MalformedFilter { .. })));
        }
    }

    #[test]
    fn test_is_null_ignores_value() {
        let group = and(vec![field("Name", Operation::IsNotNull, "ignored")]);
        let clause = render(&group).unwrap();
        assert_eq!(clause.text, "([Name] IS NOT NULL)");
        assert!(clause.parameters.is_empty());
    }

    #[test]
    fn test_array_on_scalar_operation_fails() {
        let group = and(vec![field("Id", Operation::Equal, Value::array([1]))]);
        assert!(matches!(render(&group), Err(Error::MalformedFilter { .. })));
    }

    #[test]
    fn test_reserved_names_are_avoided() {
        let mut names = ParameterNames::new();
        names.reserve("Name");
        let group = and(vec![field("Name", Operation::Like, "A%")]);
        let clause = translate(&group, &DbSetting::SQL_SERVER, &mut names).unwrap();
        assert_eq!(clause.text, "([Name] LIKE @Name_1)");
    }

    #[test]
    fn test_names_are_sanitized() {
        let group = and(vec![field("First Name", Operation::Equal, "x")]);
        let clause = render(&group).unwrap();
        assert_eq!(clause.text, "([First Name] = @First_Name)");
    }
}
