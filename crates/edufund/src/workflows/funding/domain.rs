use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identifier!(
    /// Student account reference owned by the external profile system.
    StudentId
);
identifier!(
    /// Donor account reference.
    DonorId
);
identifier!(
    /// Field officer performing verification visits.
    VerifierId
);
identifier!(
    /// Interview board member.
    PanelMemberId
);
identifier!(
    /// Administrator account reference.
    AdminId
);
identifier!(
    /// Identifier wrapper for funding applications.
    ApplicationId
);
identifier!(ReviewId);
identifier!(InterviewId);
identifier!(SponsorshipId);
identifier!(
    /// Opaque payment-intent reference issued by the processor.
    IntentId
);

/// Process-wide sequence producing `prefix-000001` style identifiers.
pub(crate) struct IdSequence {
    prefix: &'static str,
    next: AtomicU64,
}

impl IdSequence {
    pub(crate) const fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            next: AtomicU64::new(1),
        }
    }

    pub(crate) fn next(&self) -> String {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{id:06}", self.prefix)
    }
}

/// Caller identity for every mutating operation. There is no ambient session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum Actor {
    Student(StudentId),
    FieldVerifier(VerifierId),
    Board(PanelMemberId),
    Administrator(AdminId),
    Donor(DonorId),
}

impl Actor {
    pub fn role(&self) -> ActorRole {
        match self {
            Actor::Student(_) => ActorRole::Student,
            Actor::FieldVerifier(_) => ActorRole::FieldVerifier,
            Actor::Board(_) => ActorRole::Board,
            Actor::Administrator(_) => ActorRole::Administrator,
            Actor::Donor(_) => ActorRole::Donor,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Actor::Student(id) => id.as_str(),
            Actor::FieldVerifier(id) => id.as_str(),
            Actor::Board(id) => id.as_str(),
            Actor::Administrator(id) => id.as_str(),
            Actor::Donor(id) => id.as_str(),
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role().label(), self.id())
    }
}

/// Role half of an [`Actor`], used as the key of the transition permission table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Student,
    FieldVerifier,
    Board,
    Administrator,
    Donor,
}

impl ActorRole {
    pub const fn label(self) -> &'static str {
        match self {
            ActorRole::Student => "student",
            ActorRole::FieldVerifier => "field_verifier",
            ActorRole::Board => "board",
            ActorRole::Administrator => "administrator",
            ActorRole::Donor => "donor",
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
