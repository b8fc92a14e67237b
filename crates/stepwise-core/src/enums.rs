//! Enum types shared by blocks, variables and sources.
//!
//! Each enum has:
//! - Serialize as a kebab/lowercase string
//! - Deserialize from known strings (open enums also keep unknown strings)
//! - `as_str()`, `is_default()`, `Display` impl

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Macro: an enum with known string variants + a Custom(String) fallback.
// ---------------------------------------------------------------------------
macro_rules! define_enum {
    (
        $(#[$meta:meta])*
        $name:ident, default = $default:ident, custom_variant = $custom_variant:ident,
        variants: [
            $( ($variant:ident, $str:expr) ),+ $(,)?
        ]
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $variant, )+
            $custom_variant(String),
        }

        impl $name {
            /// Returns the string representation.
            pub fn as_str(&self) -> &str {
                match self {
                    $( Self::$variant => $str, )+
                    Self::$custom_variant(s) => s.as_str(),
                }
            }

            /// Returns `true` if this is the default variant.
            pub fn is_default(&self) -> bool {
                *self == Self::$default
            }

            /// Returns `true` if this is a built-in (non-custom) variant.
            pub fn is_builtin(&self) -> bool {
                !matches!(self, Self::$custom_variant(_))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Ok(Self::from(s.as_str()))
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                match s {
                    $( $str => Self::$variant, )+
                    other => Self::$custom_variant(other.to_owned()),
                }
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Macro: a closed enum; unknown strings are rejected.
// ---------------------------------------------------------------------------
macro_rules! define_closed_enum {
    (
        $(#[$meta:meta])*
        $name:ident, default = $default:ident,
        variants: [
            $( ($variant:ident, $str:expr) ),+ $(,)?
        ]
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $variant, )+
        }

        impl $name {
            /// All variants in declaration order.
            pub const ALL: &'static [$name] = &[ $( Self::$variant, )+ ];

            /// Returns the string representation.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $str, )+
                }
            }

            /// Returns `true` if this is the default variant.
            pub fn is_default(&self) -> bool {
                *self == Self::$default
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $str => Ok(Self::$variant), )+
                    other => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_owned(),
                    }),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

/// Returned when a string names no variant of a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

define_closed_enum! {
    /// Lifecycle role of a variable.
    VariableKind, default = Intermediate,
    variants: [
        (Input, "input"),
        (Intermediate, "intermediate"),
        (Table, "table"),
    ]
}

define_closed_enum! {
    /// Status reported for a block by its last execution.
    BlockStatus, default = Idle,
    variants: [
        (Idle, "idle"),
        (Running, "running"),
        (Completed, "completed"),
        (Failed, "failed"),
    ]
}

define_closed_enum! {
    /// Search backends available to search and deep-research blocks.
    SearchEngine, default = Search,
    variants: [
        (Search, "search"),
        (News, "news"),
        (Finance, "finance"),
        (Markets, "markets"),
        (Image, "image"),
    ]
}

define_closed_enum! {
    /// Approval gate for code blocks.
    CodeApproval, default = Tbd,
    variants: [
        (Approved, "approved"),
        (Tbd, "tbd"),
    ]
}

define_closed_enum! {
    /// Operation performed by a table-transform block.
    TableOperation, default = Deduplicate,
    variants: [
        (Deduplicate, "deduplicate"),
        (Filter, "filter"),
        (Summarize, "summarize"),
    ]
}

define_enum! {
    /// Kind of an uploaded or fetched source.
    SourceKind, default = Custom, custom_variant = Other,
    variants: [
        (Image, "image"),
        (Csv, "csv"),
        (Pdf, "pdf"),
        (Website, "website"),
        (Custom, "custom"),
    ]
}
