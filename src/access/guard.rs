use thiserror::Error;
use uuid::Uuid;

use super::role::Role;

/// Caller identity as established by the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    User,
    Event,
}

/// Target of an action, reduced to what the guard needs: its kind and,
/// for events, who owns it. `owner_id` is `None` when the event has no
/// recorded owner; only admins pass ownership checks against those.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub owner_id: Option<Uuid>,
}

impl ResourceRef {
    pub fn event(owner_id: Option<Uuid>) -> Self {
        Self {
            kind: ResourceKind::Event,
            owner_id,
        }
    }

    pub fn user(id: Uuid) -> Self {
        Self {
            kind: ResourceKind::User,
            owner_id: Some(id),
        }
    }
}

/// Actions the guard knows how to decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateEvent,
    UpdateEvent,
    PublishEvent,
    DeleteEvent,
    DeleteUser,
    ChangeUserRole,
}

impl Action {
    /// Weakest role allowed to attempt this action.
    fn required_role(self) -> Role {
        match self {
            Action::CreateEvent
            | Action::UpdateEvent
            | Action::PublishEvent
            | Action::DeleteEvent => Role::Organizer,
            Action::DeleteUser | Action::ChangeUserRole => Role::Admin,
        }
    }

    /// Whether the action additionally requires owning the target event.
    fn event_scoped(self) -> bool {
        matches!(
            self,
            Action::UpdateEvent | Action::PublishEvent | Action::DeleteEvent
        )
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("role does not permit this action")]
    InsufficientRole,
    #[error("caller does not own the target event")]
    NotOwner,
    #[error("invalid role: {0}")]
    InvalidRole(String),
}

/// Decides whether `principal` may perform `action` on `resource`.
///
/// Checks run in a fixed order: admin bypass, then role capability, then
/// event ownership. The first failing check wins, so an attendee poking at
/// someone else's event hears about their role, not the ownership.
pub fn authorize(
    principal: &Principal,
    action: Action,
    resource: &ResourceRef,
) -> Result<(), AccessError> {
    if principal.role == Role::Admin {
        return Ok(());
    }

    let sufficient = match action.required_role() {
        Role::Attendee => true,
        Role::Organizer => principal.role == Role::Organizer,
        Role::Admin => false,
    };
    if !sufficient {
        return Err(AccessError::InsufficientRole);
    }

    if action.event_scoped() && resource.owner_id != Some(principal.user_id) {
        return Err(AccessError::NotOwner);
    }

    Ok(())
}
