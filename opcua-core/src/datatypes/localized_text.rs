use crate::datatypes::string::UaString;
use serde::{Deserialize, Serialize};

/// Name qualified by a namespace index
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct QualifiedName {
    pub namespace_index: u16,
    pub name: UaString,
}

impl QualifiedName {
    pub fn new(namespace_index: u16, name: &str) -> Self {
        Self {
            namespace_index,
            name: UaString::from(name),
        }
    }

    pub fn null() -> Self {
        Self::default()
    }
}

/// Human readable text with an optional locale
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LocalizedText {
    pub locale: UaString,
    pub text: UaString,
}

impl LocalizedText {
    pub fn new(locale: &str, text: &str) -> Self {
        Self {
            locale: UaString::from(locale),
            text: UaString::from(text),
        }
    }

    pub fn text(text: &str) -> Self {
        Self {
            locale: UaString::null(),
            text: UaString::from(text),
        }
    }
}
