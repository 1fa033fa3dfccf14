//! Ownership checks for author-gated operations.
//!
//! Every operation that requires the caller to own the touched resource goes
//! through [`ensure_owner`] so the rule lives in exactly one place.

use crate::model::{Id, user::UserMarker};
use thiserror::Error;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The requesting user does not own this resource")]
pub struct NotOwnerError;

/// A resource with a single owning author.
pub trait Authored {
    fn author_id(&self) -> Id<UserMarker>;
}

#[must_use]
pub fn is_owner<R: Authored + ?Sized>(resource: &R, principal: Id<UserMarker>) -> bool {
    resource.author_id() == principal
}

pub fn ensure_owner<R: Authored + ?Sized>(
    resource: &R,
    principal: Id<UserMarker>,
) -> Result<(), NotOwnerError> {
    if is_owner(resource, principal) {
        Ok(())
    } else {
        Err(NotOwnerError)
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{
        Id,
        guard::{Authored, NotOwnerError, ensure_owner, is_owner},
        user::UserMarker,
    };

    struct Owned(Id<UserMarker>);

    impl Authored for Owned {
        fn author_id(&self) -> Id<UserMarker> {
            self.0
        }
    }

    #[test]
    fn owner_passes_others_fail() {
        let owner = Id::from(1_u64);
        let stranger = Id::from(2_u64);
        let resource = Owned(owner);

        assert!(is_owner(&resource, owner));
        assert!(!is_owner(&resource, stranger));

        assert_eq!(ensure_owner(&resource, owner), Ok(()));
        assert_eq!(ensure_owner(&resource, stranger), Err(NotOwnerError));
    }
}
