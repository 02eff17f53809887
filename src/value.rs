use std::borrow::Cow;
use std::str::FromStr;

use bigdecimal::BigDecimal;

use crate::XdbError;

/// A single cell of a fetched row.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    BlobBase64(String),
}

impl Value {
    pub fn null() -> Self {
        Self::Null
    }

    pub fn integer(value: i64) -> Self {
        Self::Integer(value)
    }

    pub fn float(value: f64) -> Self {
        Self::Float(value)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Textual form of the value, `None` for SQL `NULL`.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Null => None,
            Self::Integer(value) => Some(Cow::Owned(value.to_string())),
            Self::Float(value) => Some(Cow::Owned(value.to_string())),
            Self::Text(value) | Self::BlobBase64(value) => Some(Cow::Borrowed(value)),
        }
    }

    /// Exact decimal form of the value, `None` for SQL `NULL`.
    ///
    /// Floats go through their shortest round-trip text so `0.1` stays `0.1`.
    pub fn as_decimal(&self) -> Result<Option<BigDecimal>, XdbError> {
        match self {
            Self::Null => Ok(None),
            Self::Integer(value) => Ok(Some(BigDecimal::from(*value))),
            Self::Float(value) => parse_decimal(&value.to_string()).map(Some),
            Self::Text(value) => parse_decimal(value).map(Some),
            Self::BlobBase64(_) => Err(XdbError::Decode(
                "blob value cannot be read as a decimal".to_owned(),
            )),
        }
    }
}

pub(crate) fn parse_decimal(text: &str) -> Result<BigDecimal, XdbError> {
    BigDecimal::from_str(text.trim())
        .map_err(|err| XdbError::Decode(format!("invalid decimal value '{text}': {err}")))
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
