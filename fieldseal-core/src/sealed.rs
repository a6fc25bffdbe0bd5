//! Plaintext wrapper for values stored encrypted in a single column.
//!
//! A [`SealedText`] always holds plaintext in memory. [`EncryptedText`]
//! converts it at the column boundary, and serde sees the bare string, so
//! API payloads never carry ciphertext.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::container::EncryptedText;
use crate::error::SealResult;

#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct SealedText(Option<String>);

impl SealedText {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Some(value.into()))
    }

    pub fn null() -> Self {
        Self(None)
    }

    pub fn value(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn set_value(&mut self, value: Option<String>) {
        self.0 = value;
    }

    pub fn into_inner(self) -> Option<String> {
        self.0
    }
}

impl From<&str> for SealedText {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SealedText {
    fn from(s: String) -> Self {
        Self(Some(s))
    }
}

impl From<Option<String>> for SealedText {
    fn from(s: Option<String>) -> Self {
        Self(s)
    }
}

// Keeps plaintext out of debug logs.
impl fmt::Debug for SealedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("SealedText(***)"),
            None => f.write_str("SealedText(null)"),
        }
    }
}

impl Serialize for SealedText {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.0 {
            Some(value) => serializer.serialize_str(value),
            None => serializer.serialize_none(),
        }
    }
}

/// Accepts a string (trimmed) or null.
impl<'de> Deserialize<'de> for SealedText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(Self(value.map(|v| v.trim().to_string())))
    }
}

impl EncryptedText {
    /// Column value for `value`.
    pub fn seal(&self, value: &SealedText) -> SealResult<Option<String>> {
        self.to_column(value.value())
    }

    /// Wraps a column value read back from the database.
    pub fn open(&self, column: Option<&str>) -> SealResult<SealedText> {
        self.from_column(column).map(SealedText)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::container::AlgorithmContainer;
    use fieldseal_crypto::ENCRYPT_PREFIX;
    use pretty_assertions::assert_eq;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Contact {
        name: String,
        phone: SealedText,
    }

    #[test]
    fn serializes_as_the_bare_plaintext() {
        let contact = Contact {
            name: "Ada".into(),
            phone: SealedText::new("13800138000"),
        };
        let json = serde_json::to_string(&contact).unwrap();
        assert_eq!(json, r#"{"name":"Ada","phone":"13800138000"}"#);

        let nulled = Contact {
            name: "Ada".into(),
            phone: SealedText::null(),
        };
        assert_eq!(
            serde_json::to_string(&nulled).unwrap(),
            r#"{"name":"Ada","phone":null}"#
        );
    }

    #[test]
    fn deserializes_trimmed_strings_and_null() {
        let contact: Contact =
            serde_json::from_str(r#"{"name":"Ada","phone":"  13800138000 "}"#).unwrap();
        assert_eq!(contact.phone.value(), Some("13800138000"));

        let contact: Contact = serde_json::from_str(r#"{"name":"Ada","phone":null}"#).unwrap();
        assert_eq!(contact.phone, SealedText::null());

        assert!(serde_json::from_str::<Contact>(r#"{"name":"Ada","phone":7}"#).is_err());
    }

    #[test]
    fn debug_output_hides_the_value() {
        assert_eq!(format!("{:?}", SealedText::new("secret")), "SealedText(***)");
    }

    #[test]
    fn column_round_trip_through_the_codec() {
        let codec = EncryptedText::new(Arc::new(AlgorithmContainer::new()));
        let column = codec.seal(&SealedText::new("13800138000")).unwrap();
        let stored = column.as_deref().unwrap();
        assert!(stored.starts_with(ENCRYPT_PREFIX));

        let read = codec.open(Some(stored)).unwrap();
        assert_eq!(read.value(), Some("13800138000"));
        assert_eq!(codec.seal(&SealedText::null()).unwrap(), None);
        assert_eq!(codec.open(None).unwrap(), SealedText::null());
    }
}
