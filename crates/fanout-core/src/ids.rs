//! Id newtypes and prefixed random ids.
//!
//! [`RoundId`] and [`RunId`] are UUID v7 (time-ordered) newtypes so a ledger
//! round is never confused with an executor run in logs and events.
//! [`prefixed_id`] builds short human-scannable ids such as `chunk_Q3xk9TzA1bLm`
//! for the chunk registry.

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Length of the random suffix appended by [`prefixed_id`].
pub const RANDOM_SUFFIX_LEN: usize = 12;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new random ID (UUID v7, time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            /// Return the inner string as a slice.
            #[must_use]
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
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

branded_id!(
    /// Identifies one orchestration round of a progress ledger.
    RoundId
);

branded_id!(
    /// Identifies one `run()` of an executor, for log correlation.
    RunId
);

/// Build `prefix` followed by [`RANDOM_SUFFIX_LEN`] random alphanumerics.
///
/// 62^12 possible suffixes; callers that need uniqueness still check for
/// collisions against their own store.
pub fn prefixed_id(prefix: &str) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("{prefix}{suffix}")
}
