/// Movie runtime in whole minutes
///
/// Stored as a plain integer column; on the wire it is always the string
/// `"<n> mins"`. Anything else in a request body is a type error for the
/// `runtime` field.
///
/// # Example
///
/// ```
/// use greenlight_shared::models::runtime::Runtime;
///
/// let runtime: Runtime = "96 mins".parse().unwrap();
/// assert_eq!(runtime, Runtime(96));
/// assert_eq!(serde_json::to_string(&runtime).unwrap(), r#""96 mins""#);
/// assert!("96 minutes".parse::<Runtime>().is_err());
/// ```

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Runtime in minutes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, sqlx::Type)]
#[sqlx(transparent)]
pub struct Runtime(pub i32);

/// The string was not of the form `"<n> mins"`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid runtime format")]
pub struct InvalidRuntimeFormat;

impl Runtime {
    /// Minutes as a plain integer
    pub fn minutes(self) -> i32 {
        self.0
    }

    /// Zero means "not provided"
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mins", self.0)
    }
}

impl FromStr for Runtime {
    type Err = InvalidRuntimeFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (count, unit) = s.split_once(' ').ok_or(InvalidRuntimeFormat)?;
        if unit != "mins" {
            return Err(InvalidRuntimeFormat);
        }
        count.parse::<i32>().map(Runtime).map_err(|_| InvalidRuntimeFormat)
    }
}

impl Serialize for Runtime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Runtime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RuntimeVisitor;

        impl de::Visitor<'_> for RuntimeVisitor {
            type Value = Runtime;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(r#"a string of the form "<int> mins""#)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Runtime, E> {
                v.parse()
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_str(RuntimeVisitor)
    }
}
