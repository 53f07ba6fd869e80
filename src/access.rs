use crate::errors::{CoreError, CoreResult};
use crate::model::{Role, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ManageUsers,
    ManageDiscipline,
    ViewDiscipline,
    OwnAccount,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ManageUsers => "manage_users",
            Self::ManageDiscipline => "manage_discipline",
            Self::ViewDiscipline => "view_discipline",
            Self::OwnAccount => "own_account",
        }
    }
}

pub fn allows(role: Role, cap: Capability) -> bool {
    match cap {
        Capability::ManageUsers => matches!(role, Role::SuperAdmin | Role::Admin),
        Capability::ManageDiscipline => {
            matches!(role, Role::SuperAdmin | Role::Admin | Role::DisciplineStaff)
        }
        Capability::ViewDiscipline => role != Role::Student,
        Capability::OwnAccount => true,
    }
}

pub fn require(user: &User, cap: Capability) -> CoreResult<()> {
    if allows(user.role, cap) {
        return Ok(());
    }
    tracing::debug!(
        username = %user.username,
        role = user.role.as_str(),
        capability = cap.as_str(),
        "request refused"
    );
    Err(CoreError::Forbidden(format!(
        "role {} may not {}",
        user.role.as_str(),
        cap.as_str().replace('_', " ")
    )))
}

/// Students may only act on their own record; everyone else needs `cap`.
pub fn require_self_or(user: &User, target: &str, cap: Capability) -> CoreResult<()> {
    if user.username == target {
        return Ok(());
    }
    require(user, cap)
}
