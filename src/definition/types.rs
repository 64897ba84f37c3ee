// Type registry
// Maps the type tag found at the end of a column alias to a semantic value type

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Semantic type of an output column
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Int,
    Long,
    Float,
    Double,
    Boolean,
    String,
    Date,
    Time,
    Decimal,
    BigInt,
    Byte,
    Object,
}

/// Every supported tag, in registry order
const REGISTRY: [(&str, ValueType); 12] = [
    ("int", ValueType::Int),
    ("long", ValueType::Long),
    ("float", ValueType::Float),
    ("double", ValueType::Double),
    ("boolean", ValueType::Boolean),
    ("string", ValueType::String),
    ("date", ValueType::Date),
    ("time", ValueType::Time),
    ("decimal", ValueType::Decimal),
    ("bigint", ValueType::BigInt),
    ("byte", ValueType::Byte),
    ("object", ValueType::Object),
];

impl ValueType {
    /// Look up a type tag. Tags are exact, lowercase matches.
    pub fn from_tag(tag: &str) -> Result<Self> {
        REGISTRY
            .iter()
            .find(|(name, _)| *name == tag)
            .map(|(_, ty)| *ty)
            .ok_or_else(|| Error::UnsupportedType {
                tag: tag.to_string(),
            })
    }

    pub fn tag(&self) -> &'static str {
        REGISTRY
            .iter()
            .find(|(_, ty)| ty == self)
            .map(|(name, _)| *name)
            .unwrap_or("object")
    }
}

impl FromStr for ValueType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_tag(s)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_tag_round_trips() {
        for (tag, ty) in REGISTRY {
            assert_eq!(ValueType::from_tag(tag).unwrap(), ty);
            assert_eq!(ty.to_string(), tag);
        }
    }

    #[test]
    fn test_unknown_tag() {
        let err = ValueType::from_tag("uuid").unwrap_err();
        assert!(matches!(err, Error::UnsupportedType { ref tag } if tag == "uuid"));
        assert!("INT".parse::<ValueType>().is_err());
    }
}
