use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::time::Duration;

use anyhow::{Error, Result, anyhow};

/// A bencoded value. Dictionary keys are kept sorted, so re-encoding is canonical.
#[derive(PartialEq, Eq, Clone)]
pub enum Value {
    String(Vec<u8>),
    Integer(i64),
    List(Vec<Value>),
    Dictionary(BTreeMap<String, Value>),
}

impl Value {
    pub fn string(string: impl AsRef<[u8]>) -> Self {
        Self::String(string.as_ref().to_vec())
    }

    pub fn list() -> Self {
        Self::List(Vec::new())
    }

    pub fn dictionary() -> Self {
        Self::Dictionary(BTreeMap::new())
    }

    /// Appends `value` if this is a list.
    pub fn with_value(mut self, value: Value) -> Self {
        if let Self::List(values) = &mut self {
            values.push(value);
        }
        self
    }

    /// Inserts `key` if this is a dictionary.
    pub fn with_entry(mut self, key: &str, value: Value) -> Self {
        if let Self::Dictionary(entries) = &mut self {
            entries.insert(key.to_string(), value);
        }
        self
    }

    pub fn remove_entry(&mut self, key: &str) -> Result<Value> {
        self.try_remove_entry(key)?
            .ok_or_else(|| anyhow!("missing key: {}", key))
    }

    pub fn try_remove_entry(&mut self, key: &str) -> Result<Option<Value>> {
        match self {
            Self::Dictionary(entries) => Ok(entries.remove(key)),
            other => Err(anyhow!("expected a dictionary, got {:?}", other)),
        }
    }

    pub fn has_entry(&self, key: &str) -> bool {
        matches!(self, Self::Dictionary(entries) if entries.contains_key(key))
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(bytes) => match std::str::from_utf8(bytes) {
                Ok(string) => write!(f, "{:?}", string),
                Err(_) => write!(f, "<{} bytes>", bytes.len()),
            },
            Self::Integer(integer) => write!(f, "{}", integer),
            Self::List(values) => f.debug_list().entries(values).finish(),
            Self::Dictionary(entries) => f.debug_map().entries(entries).finish(),
        }
    }
}

impl TryFrom<Value> for Vec<u8> {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::String(bytes) => Ok(bytes),
            other => Err(anyhow!("expected a string, got {:?}", other)),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        let bytes: Vec<u8> = value.try_into()?;
        Ok(String::from_utf8(bytes)?)
    }
}

impl TryFrom<Value> for i64 {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Integer(integer) => Ok(integer),
            other => Err(anyhow!("expected an integer, got {:?}", other)),
        }
    }
}

impl TryFrom<Value> for usize {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        let integer: i64 = value.try_into()?;
        Ok(usize::try_from(integer)?)
    }
}

impl TryFrom<Value> for u16 {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        let integer: i64 = value.try_into()?;
        Ok(u16::try_from(integer)?)
    }
}

/// Whole seconds.
impl TryFrom<Value> for Duration {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        let secs: i64 = value.try_into()?;
        Ok(Duration::from_secs(u64::try_from(secs)?))
    }
}

impl TryFrom<Value> for Vec<Value> {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::List(values) => Ok(values),
            other => Err(anyhow!("expected a list, got {:?}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_entries() {
        let mut value = Value::dictionary()
            .with_entry("name", Value::string("foo"))
            .with_entry("length", Value::Integer(12));

        let name: String = value.remove_entry("name").unwrap().try_into().unwrap();
        let length: usize = value.remove_entry("length").unwrap().try_into().unwrap();

        assert_eq!(name, "foo");
        assert_eq!(length, 12);
        assert!(value.remove_entry("name").is_err());
        assert!(value.try_remove_entry("name").unwrap().is_none());
    }

    #[test]
    fn entries_of_non_dictionary() {
        let mut value = Value::Integer(1);

        assert!(value.try_remove_entry("foo").is_err());
        assert!(!value.has_entry("foo"));
    }

    #[test]
    fn conversion_errors() {
        assert!(i64::try_from(Value::string("1")).is_err());
        assert!(usize::try_from(Value::Integer(-1)).is_err());
        assert!(u16::try_from(Value::Integer(70000)).is_err());
        assert!(String::try_from(Value::String(vec![0xff, 0xfe])).is_err());
        assert!(Vec::<Value>::try_from(Value::dictionary()).is_err());
    }

    #[test]
    fn debug_binary_strings() {
        let value = Value::list()
            .with_value(Value::string("spam"))
            .with_value(Value::String(vec![0xff; 3]));

        assert_eq!(format!("{:?}", value), "[\"spam\", <3 bytes>]");
    }
}
