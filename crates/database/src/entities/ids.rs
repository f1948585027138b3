//! Identifier newtypes.
//!
//! All identifiers are opaque strings compared by value. The only structural
//! check the domain performs is non-emptiness, see [`ChatId::is_blank`].

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// True when the id is empty or whitespace only.
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a chat aggregate.
    ChatId
);
string_id!(
    /// Identifier of a user aggregate.
    UserId
);
string_id!(MessageId);
string_id!(
    /// Identifier of a login session.
    SessionId
);

impl ChatId {
    pub fn generate() -> Self {
        Self(cuid2::cuid())
    }
}

impl UserId {
    pub fn generate() -> Self {
        Self(cuid2::cuid())
    }
}

impl MessageId {
    pub fn generate() -> Self {
        Self(cuid2::cuid())
    }
}

impl SessionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_compare_by_value() {
        assert_eq!(ChatId::new("c1"), ChatId::from("c1"));
        assert_ne!(ChatId::new("c1"), ChatId::new("c2"));
    }

    #[test]
    fn whitespace_only_ids_are_blank() {
        assert!(UserId::default().is_blank());
        assert!(UserId::new("  ").is_blank());
        assert!(!UserId::new("u1").is_blank());
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(ChatId::generate(), ChatId::generate());
        let session = SessionId::generate();
        assert!(uuid::Uuid::parse_str(session.as_str()).is_ok());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&MessageId::new("m1")).unwrap();
        assert_eq!(json, "\"m1\"");
    }
}
