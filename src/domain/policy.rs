//! Authorization gate: a pure allow/deny decision per actor, action and resource.
//!
//! Every protected operation calls [`authorize`] with an explicit actor; there is
//! no ambient "current user".

use crate::domain::user::User;
use crate::error::{AppError, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Index,
    Show,
    Create,
    Update,
    Destroy,
}

impl Action {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Show => "show",
            Self::Create => "create",
            Self::Update => "update",
            Self::Destroy => "destroy",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything an actor can act upon. New resource kinds implement this.
pub trait Resource {
    /// Name used in denial messages.
    const KIND: &'static str;

    fn permits(&self, actor: &User, action: Action) -> bool;
}

/// The user collection as a whole; target of `index` and `create`.
#[derive(Debug, Clone, Copy)]
pub struct Users;

impl Resource for Users {
    const KIND: &'static str = "User";

    fn permits(&self, actor: &User, _action: Action) -> bool {
        actor.is_admin()
    }
}

impl Resource for User {
    const KIND: &'static str = "User";

    fn permits(&self, actor: &User, action: Action) -> bool {
        match action {
            Action::Show | Action::Update => actor.is_admin() || actor.id == self.id,
            Action::Index | Action::Create | Action::Destroy => actor.is_admin(),
        }
    }
}

#[must_use]
pub fn allow<R: Resource>(actor: &User, action: Action, resource: &R) -> bool {
    resource.permits(actor, action)
}

/// # Errors
/// Returns `AppError::NotAuthorized` naming the denied action.
pub fn authorize<R: Resource>(actor: &User, action: Action, resource: &R) -> Result<()> {
    if allow(actor, action, resource) {
        return Ok(());
    }

    tracing::debug!(actor_id = %actor.id, action = %action, kind = R::KIND, "Authorization denied");
    Err(AppError::NotAuthorized(format!("not allowed to {action} this {}", R::KIND)))
}
