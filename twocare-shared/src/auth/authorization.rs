/// Family permission matrix
///
/// Pure decision functions: given the caller's role in a family, the operation
/// and (for activities) whether the caller created the entity, decide allow or
/// deny. No I/O happens here; the membership is resolved beforehand by
/// [`crate::services::access::resolve_family_context`].
///
/// # Matrix
///
/// | Operation          | PRIMARY_PARENT | CO_PARENT | CAREGIVER | VIEWER |
/// |--------------------|----------------|-----------|-----------|--------|
/// | read (any)         | ✓              | ✓         | ✓         | ✓      |
/// | create baby        | ✓              | ✓         |           |        |
/// | update baby        | ✓              | ✓         |           |        |
/// | delete baby        | ✓              |           |           |        |
/// | create activity    | ✓              | ✓         | ✓         |        |
/// | update activity    | ✓              | ✓         | creator   | creator|
/// | update family      | ✓              | ✓         |           |        |
/// | delete family      | ✓              |           |           |        |
/// | create invite      | ✓              | ✓         |           |        |
/// | update member role | ✓              | ✓         |           |        |
///
/// Role changes and invites carry extra rules on top of the matrix, see
/// [`authorize_role_change`] and [`authorize_invite_role`].
///
/// # Example
///
/// ```
/// use twocare_shared::auth::authorization::{authorize, Operation};
/// use twocare_shared::models::membership::FamilyRole;
///
/// assert!(authorize(FamilyRole::CoParent, Operation::CreateBaby, false).is_ok());
///
/// let denied = authorize(FamilyRole::Viewer, Operation::CreateBaby, false).unwrap_err();
/// assert_eq!(denied.to_string(), "Only PRIMARY_PARENT or CO_PARENT can add babies");
/// ```

use uuid::Uuid;

use crate::models::membership::FamilyRole;

/// Family-scoped operations subject to the permission matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ReadFamily,
    UpdateFamily,
    DeleteFamily,
    CreateInvite,
    UpdateMemberRole,
    ReadBaby,
    CreateBaby,
    UpdateBaby,
    DeleteBaby,
    ReadActivity,
    CreateActivity,
    UpdateActivity,
}

impl Operation {
    /// Every operation, in matrix order
    pub const ALL: [Operation; 12] = [
        Operation::ReadFamily,
        Operation::UpdateFamily,
        Operation::DeleteFamily,
        Operation::CreateInvite,
        Operation::UpdateMemberRole,
        Operation::ReadBaby,
        Operation::CreateBaby,
        Operation::UpdateBaby,
        Operation::DeleteBaby,
        Operation::ReadActivity,
        Operation::CreateActivity,
        Operation::UpdateActivity,
    ];

    /// Roles allowed regardless of ownership
    fn allowed_roles(&self) -> &'static [FamilyRole] {
        use FamilyRole::*;

        match self {
            Operation::ReadFamily | Operation::ReadBaby | Operation::ReadActivity => {
                &[PrimaryParent, CoParent, Caregiver, Viewer]
            }
            Operation::CreateActivity => &[PrimaryParent, CoParent, Caregiver],
            Operation::UpdateFamily
            | Operation::CreateInvite
            | Operation::UpdateMemberRole
            | Operation::CreateBaby
            | Operation::UpdateBaby
            | Operation::UpdateActivity => &[PrimaryParent, CoParent],
            Operation::DeleteFamily | Operation::DeleteBaby => &[PrimaryParent],
        }
    }

    /// Whether creators are allowed even without a qualifying role
    fn owner_allowed(&self) -> bool {
        matches!(self, Operation::UpdateActivity)
    }

    /// Reason reported when the operation is denied
    pub fn denial_reason(&self) -> &'static str {
        match self {
            Operation::ReadFamily | Operation::ReadBaby | Operation::ReadActivity => {
                "You are not a member of this family"
            }
            Operation::UpdateFamily => "Only PRIMARY_PARENT or CO_PARENT can update the family",
            Operation::DeleteFamily => "Only PRIMARY_PARENT can delete the family",
            Operation::CreateInvite => "Only PRIMARY_PARENT or CO_PARENT can create invites",
            Operation::UpdateMemberRole => "Only PRIMARY_PARENT or CO_PARENT can change member roles",
            Operation::CreateBaby => "Only PRIMARY_PARENT or CO_PARENT can add babies",
            Operation::UpdateBaby => "Only PRIMARY_PARENT or CO_PARENT can update babies",
            Operation::DeleteBaby => "Only PRIMARY_PARENT can delete babies",
            Operation::CreateActivity => {
                "Only PRIMARY_PARENT, CO_PARENT, or CAREGIVER can log activities"
            }
            Operation::UpdateActivity => {
                "Only the activity creator, PRIMARY_PARENT, or CO_PARENT can update activities"
            }
        }
    }
}

/// Reason for denying a role change that passes the matrix
pub const SELF_ROLE_CHANGE_REASON: &str = "PRIMARY_PARENT cannot change their own role";

/// Reason for denying a non-PRIMARY_PARENT touching the PRIMARY_PARENT role
pub const PRIMARY_ROLE_CHANGE_REASON: &str =
    "Only PRIMARY_PARENT can grant or revoke the PRIMARY_PARENT role";

/// Reason for denying a non-PRIMARY_PARENT issuing a PRIMARY_PARENT invite
pub const PRIMARY_INVITE_REASON: &str = "Only PRIMARY_PARENT can invite a PRIMARY_PARENT";

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// User is not a member of the family
    #[error("You are not a member of this family")]
    NotMember { family_id: Uuid },

    /// Role (and ownership) do not permit the operation
    #[error("{reason}")]
    Denied {
        operation: Operation,
        role: FamilyRole,
        reason: &'static str,
    },
}

/// Decides whether `role` may perform `operation`
///
/// `is_owner` is only consulted for operations with a creator exception
/// (activity updates).
pub fn authorize(role: FamilyRole, operation: Operation, is_owner: bool) -> Result<(), AuthzError> {
    if operation.allowed_roles().contains(&role) || (is_owner && operation.owner_allowed()) {
        return Ok(());
    }

    Err(AuthzError::Denied {
        operation,
        role,
        reason: operation.denial_reason(),
    })
}

/// Decides whether `actor_role` may change `target`'s role to `new_role`
///
/// Layered on top of [`Operation::UpdateMemberRole`]:
/// - a PRIMARY_PARENT may not change their own role
/// - only a PRIMARY_PARENT may move someone to or from PRIMARY_PARENT
pub fn authorize_role_change(
    actor_id: Uuid,
    actor_role: FamilyRole,
    target_id: Uuid,
    target_role: FamilyRole,
    new_role: FamilyRole,
) -> Result<(), AuthzError> {
    authorize(actor_role, Operation::UpdateMemberRole, false)?;

    let denied = |reason| AuthzError::Denied {
        operation: Operation::UpdateMemberRole,
        role: actor_role,
        reason,
    };

    if actor_id == target_id && actor_role == FamilyRole::PrimaryParent {
        return Err(denied(SELF_ROLE_CHANGE_REASON));
    }

    let touches_primary =
        target_role == FamilyRole::PrimaryParent || new_role == FamilyRole::PrimaryParent;
    if touches_primary && actor_role != FamilyRole::PrimaryParent {
        return Err(denied(PRIMARY_ROLE_CHANGE_REASON));
    }

    Ok(())
}

/// Decides whether `actor_role` may issue an invite granting `invite_role`
pub fn authorize_invite_role(actor_role: FamilyRole, invite_role: FamilyRole) -> Result<(), AuthzError> {
    authorize(actor_role, Operation::CreateInvite, false)?;

    if invite_role == FamilyRole::PrimaryParent && actor_role != FamilyRole::PrimaryParent {
        return Err(AuthzError::Denied {
            operation: Operation::CreateInvite,
            role: actor_role,
            reason: PRIMARY_INVITE_REASON,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use FamilyRole::*;

    fn expected(role: FamilyRole, operation: Operation, is_owner: bool) -> bool {
        match operation {
            Operation::ReadFamily | Operation::ReadBaby | Operation::ReadActivity => true,
            Operation::CreateActivity => role != Viewer,
            Operation::UpdateActivity => matches!(role, PrimaryParent | CoParent) || is_owner,
            Operation::DeleteFamily | Operation::DeleteBaby => role == PrimaryParent,
            _ => matches!(role, PrimaryParent | CoParent),
        }
    }

    #[test]
    fn test_matrix_is_total_and_deterministic() {
        for role in FamilyRole::ALL {
            for operation in Operation::ALL {
                for is_owner in [false, true] {
                    let first = authorize(role, operation, is_owner);
                    let second = authorize(role, operation, is_owner);
                    assert_eq!(first, second);
                    assert_eq!(
                        first.is_ok(),
                        expected(role, operation, is_owner),
                        "{role:?} {operation:?} owner={is_owner}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_viewer_cannot_add_babies() {
        let err = authorize(Viewer, Operation::CreateBaby, false).unwrap_err();
        assert_eq!(err.to_string(), "Only PRIMARY_PARENT or CO_PARENT can add babies");
    }

    #[test]
    fn test_activity_creator_exception() {
        assert!(authorize(Caregiver, Operation::UpdateActivity, true).is_ok());
        assert!(authorize(Viewer, Operation::UpdateActivity, true).is_ok());
        assert!(authorize(Caregiver, Operation::UpdateActivity, false).is_err());

        // Ownership does not widen other operations
        assert!(authorize(Viewer, Operation::CreateActivity, true).is_err());
        assert!(authorize(CoParent, Operation::DeleteBaby, true).is_err());
    }

    #[test]
    fn test_denials_name_the_rule() {
        let err = authorize(CoParent, Operation::DeleteFamily, false).unwrap_err();
        assert_eq!(err.to_string(), "Only PRIMARY_PARENT can delete the family");

        let err = authorize(Viewer, Operation::CreateActivity, false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Only PRIMARY_PARENT, CO_PARENT, or CAREGIVER can log activities"
        );
    }

    #[test]
    fn test_primary_parent_cannot_change_own_role() {
        let me = Uuid::new_v4();
        for new_role in FamilyRole::ALL {
            let err = authorize_role_change(me, PrimaryParent, me, PrimaryParent, new_role).unwrap_err();
            assert_eq!(err.to_string(), SELF_ROLE_CHANGE_REASON);
        }
    }

    #[test]
    fn test_only_primary_parent_touches_primary_role() {
        let actor = Uuid::new_v4();
        let target = Uuid::new_v4();

        // Promotion to PRIMARY_PARENT
        assert!(authorize_role_change(actor, PrimaryParent, target, Viewer, PrimaryParent).is_ok());
        let err = authorize_role_change(actor, CoParent, target, Viewer, PrimaryParent).unwrap_err();
        assert_eq!(err.to_string(), PRIMARY_ROLE_CHANGE_REASON);

        // Demotion from PRIMARY_PARENT
        assert!(authorize_role_change(actor, PrimaryParent, target, PrimaryParent, CoParent).is_ok());
        assert!(authorize_role_change(actor, CoParent, target, PrimaryParent, Viewer).is_err());

        // Ordinary changes
        assert!(authorize_role_change(actor, CoParent, target, Viewer, Caregiver).is_ok());
        assert!(authorize_role_change(actor, Caregiver, target, Viewer, Caregiver).is_err());
    }

    #[test]
    fn test_co_parent_may_change_own_role() {
        let me = Uuid::new_v4();
        assert!(authorize_role_change(me, CoParent, me, CoParent, Viewer).is_ok());
    }

    #[test]
    fn test_invite_role_rules() {
        assert!(authorize_invite_role(PrimaryParent, PrimaryParent).is_ok());
        assert!(authorize_invite_role(CoParent, Caregiver).is_ok());

        let err = authorize_invite_role(CoParent, PrimaryParent).unwrap_err();
        assert_eq!(err.to_string(), PRIMARY_INVITE_REASON);

        let err = authorize_invite_role(Viewer, Viewer).unwrap_err();
        assert_eq!(err.to_string(), "Only PRIMARY_PARENT or CO_PARENT can create invites");
    }
}
