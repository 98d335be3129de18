//! Core type definitions for the registry.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a transaction.
///
/// Allocated from a store-wide counter, so ids never repeat across pipelines
/// sharing one store, and recovery resumes after the highest logged id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// Sequence number of a commit.
///
/// Sequence numbers totally order the commits applied to a store. A read
/// snapshot is a sequence number: it sees every commit at or below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    /// The sequence of an empty store.
    pub const ZERO: Self = Self(0);

    /// Creates a new sequence number.
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Returns the raw sequence value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next sequence number.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq:{}", self.0)
    }
}

/// One of the two logical partitions of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum View {
    /// Operator-supplied overrides.
    Configuration,
    /// The greeting last served for each name.
    Operational,
}

impl View {
    /// Both views, in a stable order.
    pub const ALL: [View; 2] = [View::Configuration, View::Operational];

    /// Returns the lowercase name of the view.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Operational => "operational",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for View {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "configuration" | "config" => Ok(Self::Configuration),
            "operational" | "oper" => Ok(Self::Operational),
            other => Err(CoreError::invalid_operation(format!(
                "unknown view '{other}', expected 'configuration' or 'operational'"
            ))),
        }
    }
}

/// The logical writer a pipeline acts for.
///
/// Roles restrict writes only; any role may read either view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriterRole {
    /// Records served greetings into the operational view.
    Resolver,
    /// Programs overrides into the configuration view.
    Administrator,
    /// Creates the registry roots at startup.
    Bootstrap,
}

impl WriterRole {
    /// Returns true if this role may put entries into `view`.
    #[must_use]
    pub const fn may_write(self, view: View) -> bool {
        matches!(
            (self, view),
            (Self::Resolver, View::Operational) | (Self::Administrator, View::Configuration)
        )
    }

    /// Returns true if this role may create registry roots.
    #[must_use]
    pub const fn may_create_root(self) -> bool {
        matches!(self, Self::Bootstrap)
    }

    /// Returns the lowercase name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Resolver => "resolver",
            Self::Administrator => "administrator",
            Self::Bootstrap => "bootstrap",
        }
    }
}

impl fmt::Display for WriterRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_ordering() {
        let seq = SequenceNumber::ZERO;
        assert!(seq.next() > seq);
        assert_eq!(seq.next().as_u64(), 1);
    }

    #[test]
    fn display_formats() {
        assert_eq!(TransactionId::new(7).to_string(), "txn:7");
        assert_eq!(SequenceNumber::new(3).to_string(), "seq:3");
        assert_eq!(View::Operational.to_string(), "operational");
        assert_eq!(WriterRole::Bootstrap.to_string(), "bootstrap");
    }

    #[test]
    fn view_parses_from_cli_spelling() {
        assert_eq!("config".parse::<View>().unwrap(), View::Configuration);
        assert_eq!("Operational".parse::<View>().unwrap(), View::Operational);
        assert!("both".parse::<View>().is_err());
    }

    #[test]
    fn roles_write_disjoint_views() {
        assert!(WriterRole::Resolver.may_write(View::Operational));
        assert!(!WriterRole::Resolver.may_write(View::Configuration));
        assert!(WriterRole::Administrator.may_write(View::Configuration));
        assert!(!WriterRole::Administrator.may_write(View::Operational));
        for view in View::ALL {
            assert!(!WriterRole::Bootstrap.may_write(view));
        }
        assert!(WriterRole::Bootstrap.may_create_root());
        assert!(!WriterRole::Resolver.may_create_root());
    }
}
