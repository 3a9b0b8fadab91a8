use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! opaque_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::new_v4()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_string()))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

opaque_id!(AccountId, "acct");
opaque_id!(FlowId, "flow");
opaque_id!(ExecutionId, "exec");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_have_stable_prefixes() {
        assert!(AccountId::new().as_str().starts_with("acct_"));
        assert!(FlowId::new().as_str().starts_with("flow_"));
        assert!(ExecutionId::new().as_str().starts_with("exec_"));
    }

    #[test]
    fn ids_roundtrip_through_string() {
        let id = FlowId::new();
        let parsed: FlowId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
