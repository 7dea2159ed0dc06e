//! Who may see, claim, and hand off a support thread.
//!
//! Only threads opened by buyers reach the staff inbox. Admins see and act on
//! every such thread; moderators work the unassigned pool plus their own.

use thiserror::Error;

use crate::Role;

/// The staff member acting on a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SupportDenied {
    #[error("Can only message customer accounts")]
    NotACustomerThread,
    #[error("This thread is assigned to another moderator")]
    AssignedElsewhere,
    #[error("Moderators can only assign threads to themselves")]
    ModAssignsOthers,
    #[error("Thread is already assigned")]
    AlreadyAssigned,
    #[error("Can only unassign threads assigned to you")]
    NotYourThread,
    #[error("Can only assign to moderators")]
    TargetNotModerator,
    #[error("Admin or moderator access required")]
    NotStaff,
}

impl SupportDenied {
    /// Whether the refusal is about the request body rather than the actor's rights.
    #[must_use]
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            SupportDenied::AlreadyAssigned | SupportDenied::TargetNotModerator
        )
    }
}

/// Whether `actor` sees a thread in the staff inbox.
#[must_use]
pub fn is_visible_to(actor: Actor, owner_role: Option<Role>, assigned_to: Option<i64>) -> bool {
    if owner_role != Some(Role::Buyer) {
        return false;
    }
    match actor.role {
        Role::Admin => true,
        Role::Mod => assigned_to.is_none_or(|id| id == actor.id),
        Role::Buyer => false,
    }
}

/// Check that `actor` may read or reply to a thread.
///
/// # Errors
///
/// Returns [`SupportDenied`] when the thread is not a buyer thread, or a
/// moderator tries to work another moderator's thread.
pub fn check_access(
    actor: Actor,
    owner_role: Option<Role>,
    assigned_to: Option<i64>,
) -> Result<(), SupportDenied> {
    if owner_role != Some(Role::Buyer) {
        return Err(SupportDenied::NotACustomerThread);
    }
    match actor.role {
        Role::Admin => Ok(()),
        Role::Mod => match assigned_to {
            Some(id) if id != actor.id => Err(SupportDenied::AssignedElsewhere),
            _ => Ok(()),
        },
        Role::Buyer => Err(SupportDenied::NotStaff),
    }
}

/// Whether opening the thread should claim it for the actor.
#[must_use]
pub fn claims_on_open(actor: Actor, assigned_to: Option<i64>) -> bool {
    actor.role == Role::Mod && assigned_to.is_none()
}

/// Validate an assignment change.
///
/// `target_role` is the role of the requested assignee, when one was given
/// and exists.
///
/// # Errors
///
/// Returns the [`SupportDenied`] reason the change is refused.
pub fn check_assignment(
    actor: Actor,
    owner_role: Option<Role>,
    current: Option<i64>,
    requested: Option<i64>,
    target_role: Option<Role>,
) -> Result<(), SupportDenied> {
    if owner_role != Some(Role::Buyer) {
        return Err(SupportDenied::NotACustomerThread);
    }
    match actor.role {
        Role::Admin => match requested {
            Some(_) if target_role != Some(Role::Mod) => Err(SupportDenied::TargetNotModerator),
            _ => Ok(()),
        },
        Role::Mod => match requested {
            Some(target) if target != actor.id => Err(SupportDenied::ModAssignsOthers),
            Some(_) if current.is_some() => Err(SupportDenied::AlreadyAssigned),
            Some(_) => Ok(()),
            None if current != Some(actor.id) => Err(SupportDenied::NotYourThread),
            None => Ok(()),
        },
        Role::Buyer => Err(SupportDenied::NotStaff),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADMIN: Actor = Actor {
        id: 1,
        role: Role::Admin,
    };
    const MOD_A: Actor = Actor {
        id: 2,
        role: Role::Mod,
    };
    const MOD_B_ID: i64 = 3;
    const BUYER: Option<Role> = Some(Role::Buyer);

    #[test]
    fn non_buyer_threads_are_hidden_from_everyone() {
        assert!(!is_visible_to(ADMIN, Some(Role::Mod), None));
        assert!(!is_visible_to(ADMIN, None, None));
        assert_eq!(
            check_access(ADMIN, Some(Role::Admin), None),
            Err(SupportDenied::NotACustomerThread)
        );
    }

    #[test]
    fn moderator_sees_pool_and_own_threads_only() {
        assert!(is_visible_to(MOD_A, BUYER, None));
        assert!(is_visible_to(MOD_A, BUYER, Some(MOD_A.id)));
        assert!(!is_visible_to(MOD_A, BUYER, Some(MOD_B_ID)));
        assert!(is_visible_to(ADMIN, BUYER, Some(MOD_B_ID)));
    }

    #[test]
    fn moderator_cannot_open_another_moderators_thread() {
        assert_eq!(
            check_access(MOD_A, BUYER, Some(MOD_B_ID)),
            Err(SupportDenied::AssignedElsewhere)
        );
        assert_eq!(check_access(ADMIN, BUYER, Some(MOD_B_ID)), Ok(()));
    }

    #[test]
    fn only_moderators_claim_on_open() {
        assert!(claims_on_open(MOD_A, None));
        assert!(!claims_on_open(MOD_A, Some(MOD_A.id)));
        assert!(!claims_on_open(ADMIN, None));
    }

    #[test]
    fn admin_assigns_only_to_moderators() {
        assert_eq!(
            check_assignment(ADMIN, BUYER, None, Some(MOD_B_ID), Some(Role::Mod)),
            Ok(())
        );
        assert_eq!(
            check_assignment(ADMIN, BUYER, None, Some(9), Some(Role::Buyer)),
            Err(SupportDenied::TargetNotModerator)
        );
        assert_eq!(
            check_assignment(ADMIN, BUYER, None, Some(42), None),
            Err(SupportDenied::TargetNotModerator)
        );
        assert_eq!(
            check_assignment(ADMIN, BUYER, Some(MOD_B_ID), None, None),
            Ok(())
        );
    }

    #[test]
    fn moderator_self_assignment_rules() {
        assert_eq!(
            check_assignment(MOD_A, BUYER, None, Some(MOD_A.id), Some(Role::Mod)),
            Ok(())
        );
        assert_eq!(
            check_assignment(MOD_A, BUYER, None, Some(MOD_B_ID), Some(Role::Mod)),
            Err(SupportDenied::ModAssignsOthers)
        );
        assert_eq!(
            check_assignment(MOD_A, BUYER, Some(MOD_A.id), Some(MOD_A.id), Some(Role::Mod)),
            Err(SupportDenied::AlreadyAssigned)
        );
    }

    #[test]
    fn moderator_unassigns_only_own_thread() {
        assert_eq!(
            check_assignment(MOD_A, BUYER, Some(MOD_A.id), None, None),
            Ok(())
        );
        assert_eq!(
            check_assignment(MOD_A, BUYER, Some(MOD_B_ID), None, None),
            Err(SupportDenied::NotYourThread)
        );
        assert_eq!(
            check_assignment(MOD_A, BUYER, None, None, None),
            Err(SupportDenied::NotYourThread)
        );
    }

    #[test]
    fn bad_request_classification() {
        assert!(SupportDenied::AlreadyAssigned.is_bad_request());
        assert!(SupportDenied::TargetNotModerator.is_bad_request());
        assert!(!SupportDenied::AssignedElsewhere.is_bad_request());
    }
}
