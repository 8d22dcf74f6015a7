//! Ownership policies for profiles, photo metadata and stored objects.
//!
//! Every data-layer and storage-layer operation asks [`authorize`] before it
//! touches a row or a file. The rules only look at the caller's identity and
//! the ownership field of the target; nothing else is consulted.
//!
//! | target  | read            | create        | update        | delete        |
//! |---------|-----------------|---------------|---------------|---------------|
//! | profile | owner           | owner         | owner         | denied        |
//! | photo   | owner           | owner         | denied        | owner         |
//! | object  | public / prefix | key prefix    | denied        | key prefix    |
//!
//! Objects are owned by whoever's id is the first segment of the key
//! (`{user_id}/...`). A key without a folder segment has no owner.

use std::fmt;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// The identity a request is evaluated as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    Anonymous,
    User(Uuid),
}

impl Principal {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Principal::Anonymous => None,
            Principal::User(id) => Some(*id),
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::Anonymous => write!(f, "anonymous"),
            Principal::User(id) => write!(f, "user:{}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// What an operation is aimed at, reduced to its ownership fields.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Profile { owner: Uuid },
    Photo { owner: Uuid },
    Object { key: &'a str, public: bool },
}

impl Target<'_> {
    fn kind(&self) -> &'static str {
        match self {
            Target::Profile { .. } => "profile",
            Target::Photo { .. } => "photo",
            Target::Object { .. } => "object",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{principal} may not {action} this {target}")]
pub struct AccessDenied {
    pub principal: Principal,
    pub action: Action,
    pub target: &'static str,
}

/// Evaluate the policy for one operation.
pub fn authorize(
    principal: Principal,
    action: Action,
    target: Target<'_>,
) -> Result<(), AccessDenied> {
    if is_allowed(principal, action, target) {
        debug!(%principal, %action, target = target.kind(), "access granted");
        Ok(())
    } else {
        debug!(%principal, %action, target = target.kind(), "access denied");
        Err(AccessDenied {
            principal,
            action,
            target: target.kind(),
        })
    }
}

/// Boolean form of [`authorize`], without logging.
pub fn is_allowed(principal: Principal, action: Action, target: Target<'_>) -> bool {
    match target {
        Target::Profile { owner } => match action {
            Action::Read | Action::Create | Action::Update => principal.user_id() == Some(owner),
            Action::Delete => false,
        },
        Target::Photo { owner } => match action {
            Action::Read | Action::Create | Action::Delete => principal.user_id() == Some(owner),
            Action::Update => false,
        },
        Target::Object { key, public } => match action {
            Action::Read if public => true,
            Action::Read | Action::Create | Action::Delete => owns_key(principal, key),
            Action::Update => false,
        },
    }
}

/// True when the caller's id, as a string, equals the key's first segment.
pub fn owns_key(principal: Principal, key: &str) -> bool {
    match (principal.user_id(), first_path_segment(key)) {
        (Some(id), Some(segment)) => id.to_string() == segment,
        _ => false,
    }
}

/// First folder segment of an object key, if the key has one.
///
/// `"abc/def/x.png"` yields `"abc"`; `"x.png"` and `"/x.png"` yield `None`.
pub fn first_path_segment(key: &str) -> Option<&str> {
    key.split_once('/')
        .map(|(first, _)| first)
        .filter(|first| !first.is_empty())
}
