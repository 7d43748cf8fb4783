//! Parameter binding: composed parameter slots to provider parameters.
//!
//! Values come from the statement itself (filter literals) or from the
//! supplied rows (entity columns by batch row). Declared database types
//! coerce the value before it is handed over; dialects that ignore
//! direction or precision never see those attributes.

use tracing::trace;

use crate::convert::coerce;
use crate::error::{Error, Result};
use crate::field::{FieldBag, bag_get};
use crate::setting::DbSetting;
use crate::statement::{Direction, Parameter, ParameterSource, Statement, StatementKind};
use crate::value::{DbType, Value};

/// A parameter ready for a provider command.
#[derive(Debug, Clone, PartialEq)]
pub struct DbParameter {
    /// Name including the dialect prefix, e.g. `@Name`.
    pub name: String,
    /// Bound value. `Null` for output slots.
    pub value: Value,
    /// Database type, declared or inferred from the value.
    pub db_type: Option<DbType>,
    /// Declared size.
    pub size: Option<u32>,
    /// Declared precision, when the dialect honours it.
    pub precision: Option<u8>,
    /// Declared scale, when the dialect honours it.
    pub scale: Option<u8>,
    /// Direction, when the dialect honours it.
    pub direction: Option<Direction>,
}

/// Destination of bound parameters.
pub trait ParameterSink {
    /// Append one parameter.
    fn add_parameter(&mut self, parameter: DbParameter);
}

impl ParameterSink for Vec<DbParameter> {
    fn add_parameter(&mut self, parameter: DbParameter) {
        self.push(parameter);
    }
}

/// Command text plus bound parameters, handed to an external executor.
#[derive(Debug, Clone, PartialEq)]
pub struct DbCommand {
    /// Operation the text was composed for.
    pub kind: StatementKind,
    /// SQL text.
    pub text: String,
    /// Parameters in statement order.
    pub parameters: Vec<DbParameter>,
}

impl DbCommand {
    /// Bind `statement` against `rows`, one bag per batch row.
    pub fn from_statement(statement: &Statement, rows: &[FieldBag], setting: &DbSetting) -> Result<Self> {
        let mut command = Self {
            kind: statement.kind,
            text: statement.sql.clone(),
            parameters: Vec::with_capacity(statement.parameters.len()),
        };
        bind(&mut command, &statement.parameters, rows, setting)?;
        Ok(command)
    }

    /// Find a parameter by name, with or without prefix (case-insensitive).
    pub fn parameter(&self, name: &str) -> Option<&DbParameter> {
        self.parameters.iter().find(|p| {
            p.name.eq_ignore_ascii_case(name)
                || p.name
                    .get(1..)
                    .is_some_and(|bare| bare.eq_ignore_ascii_case(name))
        })
    }
}

impl ParameterSink for DbCommand {
    fn add_parameter(&mut self, parameter: DbParameter) {
        self.parameters.push(parameter);
    }
}

/// Append one provider parameter per slot to `sink`.
///
/// Fails with a conversion error when a value cannot be coerced to its
/// declared database type or is an unexpanded list.
pub fn bind(
    sink: &mut impl ParameterSink,
    parameters: &[Parameter],
    rows: &[FieldBag],
    setting: &DbSetting,
) -> Result<()> {
    for param in parameters {
        let name = setting.placeholder(&param.name);
        let value = source_value(param, rows)?;
        if let Value::Array(_) = value {
            return Err(Error::conversion("Array", "a scalar parameter")
                .with_context(format!("parameter {name}")));
        }

        let value = match param.db_type {
            Some(ty) => coerce(value, ty.client_type())
                .map_err(|e| e.with_context(format!("parameter {name}")))?,
            None => value,
        };
        let db_type = param
            .db_type
            .or_else(|| param.client_type.map(|ct| ct.db_type()))
            .or_else(|| DbType::of(&value));

        let (precision, scale) = if setting.is_precision_supported {
            (param.precision, param.scale)
        } else {
            (None, None)
        };
        let direction = setting.is_direction_supported.then_some(param.direction);

        sink.add_parameter(DbParameter {
            name,
            value,
            db_type,
            size: param.size,
            precision,
            scale,
            direction,
        });
    }
    trace!(parameters = parameters.len(), rows = rows.len(), "parameters bound");
    Ok(())
}

fn source_value(param: &Parameter, rows: &[FieldBag]) -> Result<Value> {
    match &param.source {
        ParameterSource::Literal(value) => Ok(value.clone()),
        ParameterSource::Output => Ok(Value::Null),
        ParameterSource::Column { column, row } => {
            let bag = rows.get(*row).ok_or_else(|| {
                Error::invalid_argument(
                    "rows",
                    format!("parameter '{}' reads row {row} but {} rows were supplied", param.name, rows.len()),
                )
            })?;
            bag_get(bag, column).cloned().ok_or_else(|| {
                Error::invalid_argument(
                    "rows",
                    format!("row {row} has no value for column '{column}'"),
                )
            })
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::Composer;
    use crate::dialect::{SqlServer, Sqlite};
    use crate::field::{DbField, Field};
    use crate::query::{Operation, QueryField, QueryGroup};
    use crate::value::ClientType;

    fn bag(pairs: &[(&str, Value)]) -> FieldBag {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_binds_literals_with_prefix() {
        let c = Composer::new(SqlServer);
        let filter = QueryGroup::from(QueryField::new("Name", Operation::Equal, "Ada"));
        let fields = Field::from_names(&["Id", "Name"]);
        let stmt = c.query("People").fields(&fields).filter(&filter).build().unwrap();

        let cmd = DbCommand::from_statement(&stmt, &[], &DbSetting::SQL_SERVER).unwrap();
        assert_eq!(cmd.parameters.len(), 1);
        assert_eq!(cmd.parameters[0].name, "@Name");
        assert_eq!(cmd.parameters[0].value, Value::String("Ada".into()));
        assert_eq!(cmd.parameters[0].db_type, Some(DbType::String));
        assert!(cmd.parameter("Name").is_some());
        assert!(cmd.parameter("@name").is_some());
    }

    #[test]
    fn test_binds_batch_rows_by_suffix() {
        let c = Composer::new(SqlServer);
        let fields = vec![
            Field::new("Id").identity().with_type(ClientType::I32),
            Field::new("Name").with_type(ClientType::String),
        ];
        let stmt = c.insert_all("People").fields(&fields).batch_size(2).build().unwrap();
        let rows = [
            bag(&[("Id", Value::Null), ("Name", "a".into())]),
            bag(&[("Id", Value::Null), ("Name", "b".into())]),
        ];

        let cmd = DbCommand::from_statement(&stmt, &rows, &DbSetting::SQL_SERVER).unwrap();
        let name_1 = cmd.parameter("Name_1").unwrap();
        assert_eq!(name_1.value, Value::String("b".into()));
        let output = cmd.parameter("@Id").unwrap();
        assert_eq!(output.direction, Some(Direction::Output));
        assert_eq!(output.db_type, Some(DbType::Int32));
    }

    #[test]
    fn test_missing_row_fails() {
        let c = Composer::new(SqlServer);
        let fields = Field::from_names(&["A"]);
        let stmt = c.insert_all("T").fields(&fields).batch_size(2).build().unwrap();
        let rows = [bag(&[("A", Value::Int(1))])];
        let err = DbCommand::from_statement(&stmt, &rows, &DbSetting::SQL_SERVER).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn test_declared_db_type_coerces() {
        let mut param = Parameter::literal("Age", Value::String("42".into()));
        param.db_type = Some(DbType::Int32);
        let mut sink = Vec::new();
        bind(&mut sink, &[param], &[], &DbSetting::SQL_SERVER).unwrap();
        assert_eq!(sink[0].value, Value::Int(42));
    }

    #[test]
    fn test_uncoercible_value_reports_parameter() {
        let mut param = Parameter::literal("Age", Value::String("forty".into()));
        param.db_type = Some(DbType::Int32);
        let err = bind(&mut Vec::new(), &[param], &[], &DbSetting::SQL_SERVER).unwrap_err();
        assert!(matches!(err, Error::Conversion { .. }));
        assert!(err.to_string().contains("parameter @Age"));
    }

    #[test]
    fn test_array_value_is_rejected() {
        let param = Parameter::literal("Ids", Value::array([1, 2]));
        let err = bind(&mut Vec::new(), &[param], &[], &DbSetting::SQL_SERVER).unwrap_err();
        assert!(matches!(err, Error::Conversion { .. }));
    }

    #[test]
    fn test_setting_gates_direction_and_precision() {
        let c = Composer::new(Sqlite);
        let fields = Field::from_names(&["Price"]);
        let db = [DbField::new("Price").with_precision(10, 2).with_size(8)];
        let stmt = c.insert("Items").fields(&fields).db_fields(&db).build().unwrap();
        let rows = [bag(&[("Price", Value::Float(9.5))])];

        let sqlite = DbCommand::from_statement(&stmt, &rows, &DbSetting::SQLITE).unwrap();
        let price = sqlite.parameter("Price").unwrap();
        assert_eq!((price.precision, price.scale, price.direction), (None, None, None));
        assert_eq!(price.size, Some(8));

        let mssql = DbCommand::from_statement(&stmt, &rows, &DbSetting::SQL_SERVER).unwrap();
        let price = mssql.parameter("Price").unwrap();
        assert_eq!((price.precision, price.scale), (Some(10), Some(2)));
        assert_eq!(price.direction, Some(Direction::Input));
    }
}
