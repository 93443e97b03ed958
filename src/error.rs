use thiserror::Error;
use uuid::Uuid;

/// Why an NPC operation was refused. Public operations collapse this to `bool`/`Option`.
#[derive(Debug, Error)]
pub enum NpcError {
    #[error("NPC {0} is not registered")]
    NotRegistered(Uuid),

    #[error("no scene presence for {0}")]
    PresenceUnavailable(Uuid),

    #[error("presence {0} is a child agent")]
    ChildPresence(Uuid),

    #[error("could not find scene presence for NPC {name} ({agent_id})")]
    PresenceNotMaterialized { name: String, agent_id: Uuid },

    #[error("scene rejected {operation}: {source}")]
    Scene {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("scene has no {0} module")]
    ModuleUnavailable(&'static str),

    #[error("NPC {0} was removed while the command was in flight")]
    RemovedDuringCommand(Uuid),

    #[error("caller {caller} may not control NPC {npc}")]
    PermissionDenied { npc: Uuid, caller: Uuid },

    #[error("invalid agent id '{0}'")]
    InvalidId(String),
}

impl NpcError {
    /// Ordinary refusals (unknown id, missing presence) as opposed to host inconsistencies.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            NpcError::NotRegistered(_)
                | NpcError::PresenceUnavailable(_)
                | NpcError::ChildPresence(_)
                | NpcError::RemovedDuringCommand(_)
                | NpcError::PermissionDenied { .. }
                | NpcError::InvalidId(_)
        )
    }
}

pub type NpcResult<T> = std::result::Result<T, NpcError>;
