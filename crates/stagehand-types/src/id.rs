//! Identifier newtypes.
//!
//! Every identifier stagehand persists is a caller-supplied string except
//! build ids (derived from the component id and build time) and execution
//! ids (random). Wrapping them keeps the store and engine signatures honest
//! about which kind of id they expect.

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// `true` when the identifier is the empty string.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl<S: Into<String>> From<S> for $name {
            fn from(value: S) -> Self {
                Self(value.into())
            }
        }
    };
}

string_id! {
    /// Identifier of a registered component.
    ComponentId
}

string_id! {
    /// Identifier of a registered flow.
    FlowId
}

string_id! {
    /// Identifier of a build: `stagehand/<component_id>:<unix_seconds>`.
    BuildId
}

string_id! {
    /// Identifier of an execution (a canonically rendered random UUID).
    ExecutionId
}

string_id! {
    /// Name of a step within a flow. Distinct from the component it
    /// references: a flow may bind the same component to several steps.
    StepName
}
