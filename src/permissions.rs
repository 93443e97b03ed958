use uuid::Uuid;

/// Owner value marking an NPC anyone may control, and a caller that did not identify itself.
pub const NULL_OWNER: Uuid = Uuid::nil();

/// Which rule let a caller through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessGrant {
    /// The caller passed the null identity.
    CallerUnspecified,
    /// The NPC has no owner.
    Unowned,
    Owner,
}

impl AccessGrant {
    /// The two grants that do not involve an ownership match.
    pub fn is_bypass(self) -> bool {
        !matches!(self, AccessGrant::Owner)
    }
}

pub fn evaluate(owner_id: Uuid, caller_id: Uuid) -> Option<AccessGrant> {
    if caller_id == NULL_OWNER {
        Some(AccessGrant::CallerUnspecified)
    } else if owner_id == NULL_OWNER {
        Some(AccessGrant::Unowned)
    } else if owner_id == caller_id {
        Some(AccessGrant::Owner)
    } else {
        None
    }
}

pub fn check(owner_id: Uuid, caller_id: Uuid) -> bool {
    evaluate(owner_id, caller_id).is_some()
}
