use crate::error::DbToolsError;
use crate::kit::NativeParameter;
use crate::params::ParamType;
use crate::types::RowValues;

/// SQL Server column and variable types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlDbType {
    BigInt,
    Binary,
    Bit,
    Char,
    Date,
    DateTime,
    DateTime2,
    DateTimeOffset,
    Decimal,
    Float,
    Image,
    Int,
    Money,
    NChar,
    NText,
    NVarChar,
    Real,
    SmallDateTime,
    SmallInt,
    SmallMoney,
    Structured,
    Text,
    Time,
    Timestamp,
    TinyInt,
    UniqueIdentifier,
    VarBinary,
    VarChar,
    Variant,
    Xml,
}

impl SqlDbType {
    /// Native type used for a portable parameter type.
    #[must_use]
    pub fn from_param_type(param_type: ParamType) -> SqlDbType {
        match param_type {
            ParamType::AnsiString => SqlDbType::VarChar,
            ParamType::AnsiStringFixedLength => SqlDbType::Char,
            ParamType::Binary => SqlDbType::VarBinary,
            ParamType::Boolean => SqlDbType::Bit,
            ParamType::Byte => SqlDbType::TinyInt,
            ParamType::Currency => SqlDbType::Money,
            ParamType::Date => SqlDbType::Date,
            ParamType::DateTime => SqlDbType::DateTime,
            ParamType::DateTime2 => SqlDbType::DateTime2,
            ParamType::DateTimeOffset => SqlDbType::DateTimeOffset,
            ParamType::Decimal | ParamType::VarNumeric | ParamType::UInt64 => SqlDbType::Decimal,
            ParamType::Double => SqlDbType::Float,
            ParamType::Guid => SqlDbType::UniqueIdentifier,
            ParamType::Int16 | ParamType::SByte => SqlDbType::SmallInt,
            ParamType::Int32 | ParamType::UInt16 => SqlDbType::Int,
            ParamType::Int64 | ParamType::UInt32 => SqlDbType::BigInt,
            ParamType::Object => SqlDbType::Variant,
            ParamType::Single => SqlDbType::Real,
            ParamType::String => SqlDbType::NVarChar,
            ParamType::StringFixedLength => SqlDbType::NChar,
            ParamType::Time => SqlDbType::Time,
            ParamType::Xml => SqlDbType::Xml,
        }
    }

    /// Portable type of values read from a column of this type.
    #[must_use]
    pub fn param_type(self) -> ParamType {
        match self {
            SqlDbType::BigInt => ParamType::Int64,
            SqlDbType::Binary | SqlDbType::Image | SqlDbType::Timestamp | SqlDbType::VarBinary => {
                ParamType::Binary
            }
            SqlDbType::Bit => ParamType::Boolean,
            SqlDbType::Char => ParamType::AnsiStringFixedLength,
            SqlDbType::Date => ParamType::Date,
            SqlDbType::DateTime | SqlDbType::SmallDateTime => ParamType::DateTime,
            SqlDbType::DateTime2 => ParamType::DateTime2,
            SqlDbType::DateTimeOffset => ParamType::DateTimeOffset,
            SqlDbType::Decimal | SqlDbType::Money | SqlDbType::SmallMoney => ParamType::Decimal,
            SqlDbType::Float => ParamType::Double,
            SqlDbType::Int => ParamType::Int32,
            SqlDbType::NChar => ParamType::StringFixedLength,
            SqlDbType::NText | SqlDbType::NVarChar | SqlDbType::Text | SqlDbType::VarChar => {
                ParamType::String
            }
            SqlDbType::Real => ParamType::Single,
            SqlDbType::SmallInt => ParamType::Int16,
            SqlDbType::Structured | SqlDbType::Variant => ParamType::Object,
            SqlDbType::Time => ParamType::Time,
            SqlDbType::TinyInt => ParamType::Byte,
            SqlDbType::UniqueIdentifier => ParamType::Guid,
            SqlDbType::Xml => ParamType::Xml,
        }
    }

    /// T-SQL declaration of a variable of this type.
    #[must_use]
    pub fn declaration(self, size: i32, precision: u8, scale: u8) -> String {
        let length = |default: &str| {
            if size > 0 {
                size.to_string()
            } else {
                default.to_string()
            }
        };
        match self {
            SqlDbType::BigInt => "bigint".into(),
            SqlDbType::Binary => format!("binary({})", length("1")),
            SqlDbType::Bit => "bit".into(),
            SqlDbType::Char => format!("char({})", length("1")),
            SqlDbType::Date => "date".into(),
            SqlDbType::DateTime => "datetime".into(),
            SqlDbType::DateTime2 => "datetime2".into(),
            SqlDbType::DateTimeOffset => "datetimeoffset".into(),
            SqlDbType::Decimal => {
                let precision = if precision == 0 { 38 } else { precision };
                let scale = if precision == 38 && scale == 0 { 10 } else { scale };
                format!("decimal({precision}, {scale})")
            }
            SqlDbType::Float => "float".into(),
            SqlDbType::Image | SqlDbType::VarBinary | SqlDbType::Timestamp => {
                format!("varbinary({})", length("max"))
            }
            SqlDbType::Int => "int".into(),
            SqlDbType::Money => "money".into(),
            SqlDbType::NChar => format!("nchar({})", length("1")),
            SqlDbType::NText | SqlDbType::NVarChar => format!("nvarchar({})", length("max")),
            SqlDbType::Real => "real".into(),
            SqlDbType::SmallDateTime => "smalldatetime".into(),
            SqlDbType::SmallInt => "smallint".into(),
            SqlDbType::SmallMoney => "smallmoney".into(),
            SqlDbType::Structured => "table".into(),
            SqlDbType::Text | SqlDbType::VarChar => format!("varchar({})", length("max")),
            SqlDbType::Time => "time".into(),
            SqlDbType::TinyInt => "tinyint".into(),
            SqlDbType::UniqueIdentifier => "uniqueidentifier".into(),
            SqlDbType::Variant => "sql_variant".into(),
            SqlDbType::Xml => "xml".into(),
        }
    }
}

/// Native type for an untyped parameter, inferred from its value.
fn inferred_type(value: Option<&RowValues>) -> SqlDbType {
    match value {
        Some(RowValues::Int(_)) => SqlDbType::BigInt,
        Some(RowValues::Float(_)) => SqlDbType::Float,
        Some(RowValues::Bool(_)) => SqlDbType::Bit,
        Some(RowValues::Timestamp(_)) => SqlDbType::DateTime2,
        Some(RowValues::Blob(_)) => SqlDbType::VarBinary,
        Some(RowValues::Text(_) | RowValues::JSON(_) | RowValues::Null) | None => {
            SqlDbType::NVarChar
        }
    }
}

/// Fill in the native declaration of a parameter copied from its portable
/// form.
pub(crate) fn assign_native_type(parameter: &mut NativeParameter) {
    let sql_type = match parameter.param_type {
        ParamType::Object => inferred_type(parameter.value.as_ref()),
        other => SqlDbType::from_param_type(other),
    };
    parameter.native_type = Some(sql_type.declaration(
        parameter.size,
        parameter.precision,
        parameter.scale,
    ));
}

/// Declaration of `parameter` inside a batch.
///
/// # Errors
/// Returns [`DbToolsError::Unimplemented`] for table-valued parameters, which
/// the wire driver cannot send.
pub(crate) fn declaration(parameter: &NativeParameter) -> Result<String, DbToolsError> {
    if parameter.structured {
        return Err(DbToolsError::Unimplemented(format!(
            "table-valued parameter {} of type {}",
            parameter.name,
            parameter.type_name.as_deref().unwrap_or("table")
        )));
    }
    Ok(match &parameter.native_type {
        Some(native) => native.clone(),
        None => {
            let sql_type = match parameter.param_type {
                ParamType::Object => inferred_type(parameter.value.as_ref()),
                other => SqlDbType::from_param_type(other),
            };
            sql_type.declaration(parameter.size, parameter.precision, parameter.scale)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declarations_honour_size_and_precision() {
        assert_eq!(SqlDbType::NVarChar.declaration(0, 0, 0), "nvarchar(max)");
        assert_eq!(SqlDbType::NVarChar.declaration(128, 0, 0), "nvarchar(128)");
        assert_eq!(SqlDbType::Decimal.declaration(0, 18, 2), "decimal(18, 2)");
    }

    #[test]
    fn portable_and_native_types_map_both_ways() {
        assert_eq!(SqlDbType::from_param_type(ParamType::Int32), SqlDbType::Int);
        assert_eq!(SqlDbType::TinyInt.param_type(), ParamType::Byte);
        assert_eq!(SqlDbType::UniqueIdentifier.param_type(), ParamType::Guid);
    }
}
