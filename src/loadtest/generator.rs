//! Identity and work item generation.
//!
//! Every work item is independent of its siblings and immutable once built.
//! Identities combine a random token with a per-run millisecond timestamp and
//! the item index, so collisions are practically impossible both within a
//! run and across repeated runs. Uniqueness is probabilistic, not
//! cryptographic.

use chrono::Utc;
use rand::prelude::*;
use std::fmt;

use crate::loadtest::session::SessionId;

/// Length of the random token embedded in every identity.
pub const TOKEN_LEN: usize = 12;

/// Length of the username, a prefix of the token.
pub const USERNAME_LEN: usize = 10;

/// Length of the display name, a prefix of the token.
pub const DISPLAY_NAME_LEN: usize = 8;

const TOKEN_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Returns a random lowercase alphanumeric string of `len` characters.
pub fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| TOKEN_CHARSET[rng.random_range(0..TOKEN_CHARSET.len())] as char)
        .collect()
}

/// A synthesized signup identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Position of this identity within the run.
    pub index: usize,
    /// Random lowercase alphanumeric token.
    pub token: String,
    pub email: String,
    pub username: String,
    pub display_name: String,
}

/// Builds identities for one run.
///
/// The run timestamp is captured once at construction so every identity of
/// the run shares it.
#[derive(Debug, Clone)]
pub struct IdentityGenerator {
    domain: String,
    run_stamp: i64,
}

impl IdentityGenerator {
    /// Creates a generator stamped with the current time in milliseconds.
    pub fn new(domain: impl Into<String>) -> Self {
        Self::with_run_stamp(domain, Utc::now().timestamp_millis())
    }

    /// Creates a generator with an explicit run timestamp.
    pub fn with_run_stamp(domain: impl Into<String>, run_stamp: i64) -> Self {
        Self {
            domain: domain.into(),
            run_stamp,
        }
    }

    /// Returns the run timestamp shared by every identity.
    pub fn run_stamp(&self) -> i64 {
        self.run_stamp
    }

    /// Derives the identity for `index` from a fresh random token.
    pub fn identity(&self, index: usize) -> Identity {
        self.identity_from_token(index, random_token(TOKEN_LEN))
    }

    /// Derives the identity for `index` from the given token.
    pub fn identity_from_token(&self, index: usize, token: String) -> Identity {
        let email = format!(
            "loadtest+{}-{}-{}@{}",
            self.run_stamp, index, token, self.domain
        );
        let username = token.chars().take(USERNAME_LEN).collect();
        let display_name = token.chars().take(DISPLAY_NAME_LEN).collect();
        Identity {
            index,
            token,
            email,
            username,
            display_name,
        }
    }

    /// Generates `count` identities with indices `0..count`.
    pub fn generate(&self, count: usize) -> Vec<Identity> {
        (0..count).map(|i| self.identity(i)).collect()
    }
}

/// Workflow a work item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkKind {
    Signup,
    Start,
    Ping,
}

impl fmt::Display for WorkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Signup => "signup",
            Self::Start => "start",
            Self::Ping => "ping",
        };
        f.write_str(s)
    }
}

/// One independent unit of request work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    /// One signup attempt for a synthesized identity.
    Signup(Identity),
    /// One session start from a fresh client device.
    Start { index: usize, device_id: String },
    /// One ping of a previously persisted session.
    Ping { index: usize, session: SessionId },
}

impl WorkItem {
    pub fn kind(&self) -> WorkKind {
        match self {
            Self::Signup(_) => WorkKind::Signup,
            Self::Start { .. } => WorkKind::Start,
            Self::Ping { .. } => WorkKind::Ping,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::Signup(identity) => identity.index,
            Self::Start { index, .. } | Self::Ping { index, .. } => *index,
        }
    }
}

/// `count` signup items, one fresh identity each.
pub fn signup_items(generator: &IdentityGenerator, count: usize) -> Vec<WorkItem> {
    generator
        .generate(count)
        .into_iter()
        .map(WorkItem::Signup)
        .collect()
}

/// `count` start items, each with its own random device id.
pub fn start_items(count: usize) -> Vec<WorkItem> {
    (0..count)
        .map(|index| WorkItem::Start {
            index,
            device_id: uuid::Uuid::new_v4().to_string(),
        })
        .collect()
}

/// One ping item per persisted session.
pub fn ping_items(sessions: Vec<SessionId>) -> Vec<WorkItem> {
    sessions
        .into_iter()
        .enumerate()
        .map(|(index, session)| WorkItem::Ping { index, session })
        .collect()
}
