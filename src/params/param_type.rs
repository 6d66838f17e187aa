use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value as JsonValue;

use crate::types::RowValues;

/// Engine independent parameter type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParamType {
    AnsiString,
    AnsiStringFixedLength,
    Binary,
    Boolean,
    Byte,
    Currency,
    Date,
    DateTime,
    DateTime2,
    DateTimeOffset,
    Decimal,
    Double,
    Guid,
    Int16,
    Int32,
    Int64,
    #[default]
    Object,
    SByte,
    Single,
    String,
    StringFixedLength,
    Time,
    UInt16,
    UInt32,
    UInt64,
    VarNumeric,
    Xml,
}

const ALL_PARAM_TYPES: [ParamType; 27] = [
    ParamType::AnsiString,
    ParamType::AnsiStringFixedLength,
    ParamType::Binary,
    ParamType::Boolean,
    ParamType::Byte,
    ParamType::Currency,
    ParamType::Date,
    ParamType::DateTime,
    ParamType::DateTime2,
    ParamType::DateTimeOffset,
    ParamType::Decimal,
    ParamType::Double,
    ParamType::Guid,
    ParamType::Int16,
    ParamType::Int32,
    ParamType::Int64,
    ParamType::Object,
    ParamType::SByte,
    ParamType::Single,
    ParamType::String,
    ParamType::StringFixedLength,
    ParamType::Time,
    ParamType::UInt16,
    ParamType::UInt32,
    ParamType::UInt64,
    ParamType::VarNumeric,
    ParamType::Xml,
];

impl ParamType {
    /// Name of the tag, as accepted by [`ParamType::from_type_name`].
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ParamType::AnsiString => "AnsiString",
            ParamType::AnsiStringFixedLength => "AnsiStringFixedLength",
            ParamType::Binary => "Binary",
            ParamType::Boolean => "Boolean",
            ParamType::Byte => "Byte",
            ParamType::Currency => "Currency",
            ParamType::Date => "Date",
            ParamType::DateTime => "DateTime",
            ParamType::DateTime2 => "DateTime2",
            ParamType::DateTimeOffset => "DateTimeOffset",
            ParamType::Decimal => "Decimal",
            ParamType::Double => "Double",
            ParamType::Guid => "Guid",
            ParamType::Int16 => "Int16",
            ParamType::Int32 => "Int32",
            ParamType::Int64 => "Int64",
            ParamType::Object => "Object",
            ParamType::SByte => "SByte",
            ParamType::Single => "Single",
            ParamType::String => "String",
            ParamType::StringFixedLength => "StringFixedLength",
            ParamType::Time => "Time",
            ParamType::UInt16 => "UInt16",
            ParamType::UInt32 => "UInt32",
            ParamType::UInt64 => "UInt64",
            ParamType::VarNumeric => "VarNumeric",
            ParamType::Xml => "Xml",
        }
    }

    /// Resolve a tag from its name, ignoring case. Unknown names map to
    /// [`ParamType::Object`].
    #[must_use]
    pub fn from_type_name(name: &str) -> ParamType {
        let name = name.trim();
        ALL_PARAM_TYPES
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(name))
            .unwrap_or(ParamType::Object)
    }

    /// Rust type that values of this tag are read back as.
    #[must_use]
    pub fn rust_type_name(self) -> &'static str {
        match self {
            ParamType::Byte => "u8",
            ParamType::SByte => "i8",
            ParamType::Int16 => "i16",
            ParamType::UInt16 => "u16",
            ParamType::Int32 => "i32",
            ParamType::UInt32 => "u32",
            ParamType::Int64 => "i64",
            ParamType::UInt64 => "u64",
            ParamType::Single => "f32",
            ParamType::Double | ParamType::Decimal | ParamType::Currency | ParamType::VarNumeric => {
                "f64"
            }
            ParamType::Boolean => "bool",
            ParamType::String
            | ParamType::AnsiString
            | ParamType::AnsiStringFixedLength
            | ParamType::Xml
            | ParamType::Guid => "String",
            ParamType::StringFixedLength => "char",
            ParamType::Date => "chrono::NaiveDate",
            ParamType::Time => "chrono::NaiveTime",
            ParamType::DateTime | ParamType::DateTime2 | ParamType::DateTimeOffset => {
                "chrono::NaiveDateTime"
            }
            ParamType::Binary => "Vec<u8>",
            ParamType::Object => "serde_json::Value",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParamType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ParamType::from_type_name(s))
    }
}

/// Rust values that can be bound as a typed parameter.
pub trait ToParamValue {
    /// Portable tag for this Rust type.
    fn param_type() -> ParamType;

    /// Portable value.
    fn to_row_value(&self) -> RowValues;

    /// Whether the value equals its type's default (used by `check_default`).
    fn is_default_value(&self) -> bool;
}

macro_rules! impl_to_param_value {
    ($ty:ty, $tag:expr, |$v:ident| $conv:expr) => {
        impl ToParamValue for $ty {
            fn param_type() -> ParamType {
                $tag
            }

            fn to_row_value(&self) -> RowValues {
                let $v = self;
                $conv
            }

            fn is_default_value(&self) -> bool {
                *self == <$ty>::default()
            }
        }
    };
}

impl_to_param_value!(u8, ParamType::Byte, |v| RowValues::Int(i64::from(*v)));
impl_to_param_value!(i8, ParamType::SByte, |v| RowValues::Int(i64::from(*v)));
impl_to_param_value!(i16, ParamType::Int16, |v| RowValues::Int(i64::from(*v)));
impl_to_param_value!(u16, ParamType::UInt16, |v| RowValues::Int(i64::from(*v)));
impl_to_param_value!(i32, ParamType::Int32, |v| RowValues::Int(i64::from(*v)));
impl_to_param_value!(u32, ParamType::UInt32, |v| RowValues::Int(i64::from(*v)));
impl_to_param_value!(i64, ParamType::Int64, |v| RowValues::Int(*v));
impl_to_param_value!(f32, ParamType::Single, |v| RowValues::Float(f64::from(*v)));
impl_to_param_value!(f64, ParamType::Double, |v| RowValues::Float(*v));
impl_to_param_value!(bool, ParamType::Boolean, |v| RowValues::Bool(*v));
impl_to_param_value!(char, ParamType::StringFixedLength, |v| RowValues::Text(v.to_string()));
impl_to_param_value!(String, ParamType::String, |v| RowValues::Text(v.clone()));
impl_to_param_value!(Vec<u8>, ParamType::Binary, |v| RowValues::Blob(v.clone()));
impl_to_param_value!(NaiveDateTime, ParamType::DateTime, |v| RowValues::Timestamp(*v));
impl_to_param_value!(NaiveDate, ParamType::Date, |v| RowValues::Text(
    v.format("%Y-%m-%d").to_string()
));
impl_to_param_value!(NaiveTime, ParamType::Time, |v| RowValues::Text(
    v.format("%H:%M:%S%.f").to_string()
));
impl_to_param_value!(JsonValue, ParamType::Object, |v| RowValues::JSON(v.clone()));

impl ToParamValue for &str {
    fn param_type() -> ParamType {
        ParamType::String
    }

    fn to_row_value(&self) -> RowValues {
        RowValues::Text((*self).to_string())
    }

    fn is_default_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T: ToParamValue> ToParamValue for Option<T> {
    fn param_type() -> ParamType {
        T::param_type()
    }

    fn to_row_value(&self) -> RowValues {
        self.as_ref().map_or(RowValues::Null, ToParamValue::to_row_value)
    }

    fn is_default_value(&self) -> bool {
        self.is_none()
    }
}

/// Rust values that can be read back from a [`RowValues`].
///
/// Returns `None` when the value has an incompatible shape; NULL handling is
/// left to the caller.
pub trait FromRowValue: Sized {
    fn from_row_value(value: &RowValues) -> Option<Self>;
}

macro_rules! impl_from_row_int {
    ($($ty:ty),*) => {
        $(
            impl FromRowValue for $ty {
                fn from_row_value(value: &RowValues) -> Option<Self> {
                    match value {
                        RowValues::Int(i) => <$ty>::try_from(*i).ok(),
                        RowValues::Bool(b) => Some(<$ty>::from(*b)),
                        RowValues::Text(s) => s.trim().parse().ok(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_from_row_int!(u8, i16, u16, i32, u32, i64);

impl FromRowValue for f64 {
    fn from_row_value(value: &RowValues) -> Option<Self> {
        value.as_float()
    }
}

impl FromRowValue for bool {
    fn from_row_value(value: &RowValues) -> Option<Self> {
        value.as_bool()
    }
}

impl FromRowValue for String {
    fn from_row_value(value: &RowValues) -> Option<Self> {
        match value {
            RowValues::Text(s) => Some(s.clone()),
            RowValues::Null | RowValues::Blob(_) => None,
            other => Some(other.to_string()),
        }
    }
}

impl FromRowValue for NaiveDateTime {
    fn from_row_value(value: &RowValues) -> Option<Self> {
        value.as_timestamp()
    }
}

impl FromRowValue for Vec<u8> {
    fn from_row_value(value: &RowValues) -> Option<Self> {
        value.as_blob().map(<[u8]>::to_vec)
    }
}

impl FromRowValue for JsonValue {
    fn from_row_value(value: &RowValues) -> Option<Self> {
        match value {
            RowValues::JSON(v) => Some(v.clone()),
            RowValues::Text(s) => serde_json::from_str(s).ok(),
            _ => None,
        }
    }
}

impl FromRowValue for RowValues {
    fn from_row_value(value: &RowValues) -> Option<Self> {
        Some(value.clone())
    }
}
