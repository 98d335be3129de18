//! RPC value types.

use serde::{Deserialize, Serialize};

/// Input of `hello-world`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloWorldInput {
    /// Who to greet.
    pub name: String,
}

impl HelloWorldInput {
    /// Creates an input for `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Output of `hello-world`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloWorldOutput {
    /// The greeting served.
    pub greeting: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_shape() {
        let input: HelloWorldInput = serde_json::from_str(r#"{"name":"bla bla bla"}"#).unwrap();
        assert_eq!(input, HelloWorldInput::new("bla bla bla"));

        let output = HelloWorldOutput {
            greeting: "Hello bla bla bla".into(),
        };
        assert_eq!(
            serde_json::to_string(&output).unwrap(),
            r#"{"greeting":"Hello bla bla bla"}"#
        );
    }
}
