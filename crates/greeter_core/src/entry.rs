//! Registry entries.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// A name and the greeting registered for it.
///
/// Identity is the name. Entries are immutable; writing a new entry under
/// the same name replaces the old one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistryEntry {
    name: String,
    greeting: String,
}

impl RegistryEntry {
    /// Creates an entry.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidName`] if `name` is empty.
    pub fn new(name: impl Into<String>, greeting: impl Into<String>) -> CoreResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(CoreError::InvalidName);
        }
        Ok(Self {
            name,
            greeting: greeting.into(),
        })
    }

    /// Returns the key of this entry.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the greeting.
    #[must_use]
    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    /// Splits the entry into `(name, greeting)`.
    #[must_use]
    pub fn into_parts(self) -> (String, String) {
        (self.name, self.greeting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_name_rejected() {
        assert!(matches!(
            RegistryEntry::new("", "Hello "),
            Err(CoreError::InvalidName)
        ));
    }

    #[test]
    fn empty_greeting_allowed() {
        let entry = RegistryEntry::new("quiet", "").unwrap();
        assert_eq!(entry.greeting(), "");
    }

    #[test]
    fn equality_covers_both_fields() {
        let hello = RegistryEntry::new("Colin Dixon", "Hello Colin Dixon").unwrap();
        let hola = RegistryEntry::new("Colin Dixon", "Hola Colin Dixon").unwrap();
        assert_ne!(hello, hola);
        assert_eq!(
            hola.into_parts(),
            ("Colin Dixon".to_string(), "Hola Colin Dixon".to_string())
        );
    }
}
