//! Typed identifiers for workflows, runs and trigger events.
//!
//! Each id wraps a ULID and renders as `<prefix>_<ulid>`, so an id copied
//! out of a log line says what it names. Parsing accepts the prefixed form
//! and the bare ULID, and rejects another type's prefix.
//!
//! [`TriggerEventId`] doubles as the idempotency key of a run: the queue
//! assigns it once at enqueue time, every redelivery carries it unchanged,
//! and both the execution record and memoized step outputs are keyed on it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Error returned when a string is not a valid id of the requested type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// Name of the id type that was requested.
    pub id_type: &'static str,
    /// Why the string was rejected.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            /// Generates a fresh id.
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            #[must_use]
            pub const fn from_ulid(ulid: Ulid) -> Self {
                Self(ulid)
            }

            #[must_use]
            pub const fn as_ulid(&self) -> Ulid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "_{}"), self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ulid::from_str(raw).map(Self).map_err(|e| ParseIdError {
                    id_type: stringify!($name),
                    reason: e.to_string(),
                })
            }
        }
    };
}

define_id!(
    /// Unique identifier for the user who owns a workflow.
    UserId,
    "usr"
);

define_id!(
    /// Unique identifier for a workflow definition.
    WorkflowId,
    "wf"
);

define_id!(
    /// Identifies one run of a workflow.
    ///
    /// Minted when the first delivery of a trigger event begins its run.
    /// Later deliveries of that event find the existing record and reuse
    /// its id instead of minting a new one.
    ExecutionId,
    "exec"
);

define_id!(
    /// Idempotency key of a trigger event.
    ///
    /// Assigned once when the event is enqueued and carried unchanged by
    /// every redelivery. The execution store allows one record per key, and
    /// durable step outputs are stored under `(key, node, step)`, so a
    /// redelivered event resumes its run instead of starting another.
    TriggerEventId,
    "evt"
);

define_id!(
    /// Unique identifier for a stored credential.
    CredentialId,
    "cred"
);
