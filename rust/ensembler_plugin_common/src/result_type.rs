use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResultTypeError {
    #[error("unknown result type {0:?}")]
    Unknown(String),
    #[error("ARRAY result type requires an item_type")]
    MissingItemType,
    #[error("item_type {0:?} is not a primitive result type")]
    InvalidItemType(String),
    #[error("item_type is only valid for ARRAY result types")]
    UnexpectedItemType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Double,
    Float,
    Integer,
    Long,
    String,
}

impl PrimitiveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveType::Double => "DOUBLE",
            PrimitiveType::Float => "FLOAT",
            PrimitiveType::Integer => "INTEGER",
            PrimitiveType::Long => "LONG",
            PrimitiveType::String => "STRING",
        }
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, PrimitiveType::Double | PrimitiveType::Float)
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, PrimitiveType::Integer | PrimitiveType::Long)
    }
}

impl FromStr for PrimitiveType {
    type Err = ResultTypeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DOUBLE" => Ok(PrimitiveType::Double),
            "FLOAT" => Ok(PrimitiveType::Float),
            "INTEGER" => Ok(PrimitiveType::Integer),
            "LONG" => Ok(PrimitiveType::Long),
            "STRING" => Ok(PrimitiveType::String),
            _ => Err(ResultTypeError::Unknown(value.to_string())),
        }
    }
}

/// Declared type of an ensembler's output column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultType {
    Primitive(PrimitiveType),
    Array(PrimitiveType),
}

impl ResultType {
    /// Build a result type from the `type` / `item_type` pair used in job specs
    /// and artifact descriptors.
    pub fn from_parts(type_name: &str, item_type: Option<&str>) -> Result<Self, ResultTypeError> {
        if type_name.trim().eq_ignore_ascii_case("ARRAY") {
            let item = item_type.ok_or(ResultTypeError::MissingItemType)?;
            let item = item
                .parse::<PrimitiveType>()
                .map_err(|_| ResultTypeError::InvalidItemType(item.to_string()))?;
            return Ok(ResultType::Array(item));
        }
        if item_type.is_some() {
            return Err(ResultTypeError::UnexpectedItemType);
        }
        Ok(ResultType::Primitive(type_name.parse()?))
    }

    pub fn element_type(&self) -> PrimitiveType {
        match self {
            ResultType::Primitive(item) | ResultType::Array(item) => *item,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, ResultType::Array(_))
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultType::Primitive(item) => f.write_str(item.as_str()),
            ResultType::Array(item) => write!(f, "ARRAY<{}>", item.as_str()),
        }
    }
}

impl FromStr for ResultType {
    type Err = ResultTypeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let upper = trimmed.to_ascii_uppercase();
        if let Some(inner) = upper
            .strip_prefix("ARRAY<")
            .and_then(|rest| rest.strip_suffix('>'))
        {
            return ResultType::from_parts("ARRAY", Some(inner));
        }
        ResultType::from_parts(trimmed, None)
    }
}

impl Serialize for ResultType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResultType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
