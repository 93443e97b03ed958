mod dispatch;
mod lifecycle;

use crate::avatar::NpcAvatar;
use crate::config::{LockStrategy, NpcConfig};
use crate::error::{NpcError, NpcResult};
use crate::permissions::{self, AccessGrant};
use crate::registry::{NpcRegistry, NpcSummary};
use crate::scene::{SceneHost, ScenePresence};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Identity, ownership and command routing for puppet agents in one region.
///
/// The registry is injected so several regions can share it; the scene is the
/// host simulation that owns presences, circuits and appearance.
pub struct NpcModule {
    registry: Arc<NpcRegistry>,
    scene: Arc<dyn SceneHost>,
    config: NpcConfig,
}

impl NpcModule {
    pub const NAME: &'static str = "NPCModule";

    pub fn new(registry: Arc<NpcRegistry>, scene: Arc<dyn SceneHost>, config: NpcConfig) -> Self {
        Self { registry, scene, config }
    }

    /// Returns `None` when the `npc` section leaves the module disabled.
    pub fn initialise(config: NpcConfig, registry: Arc<NpcRegistry>, scene: Arc<dyn SceneHost>) -> Option<Self> {
        if !config.enabled {
            debug!("[npc] {} disabled for {}", Self::NAME, scene.region_name());
            return None;
        }
        debug!(
            "[npc] {} enabled for {} (locking: {})",
            Self::NAME,
            scene.region_name(),
            config.lock_strategy.label()
        );
        Some(Self::new(registry, scene, config))
    }

    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    pub fn registry(&self) -> &Arc<NpcRegistry> {
        &self.registry
    }

    pub fn scene(&self) -> &Arc<dyn SceneHost> {
        &self.scene
    }

    pub fn config(&self) -> &NpcConfig {
        &self.config
    }

    /// Owner of the NPC, or the null owner when the id is not registered.
    pub fn get_owner(&self, agent_id: Uuid) -> Uuid {
        self.registry.owner_of(agent_id)
    }

    /// Does not check permissions; callers about to change state must do so.
    pub fn get_npc(&self, agent_id: Uuid) -> Option<Arc<NpcAvatar>> {
        self.registry.get(agent_id)
    }

    pub fn list_npcs(&self) -> Vec<NpcSummary> {
        self.registry.summaries()
    }

    pub fn npc_count(&self) -> usize {
        self.registry.len()
    }

    pub fn check_permissions(&self, npc_id: Uuid, caller_id: Uuid) -> bool {
        self.permission_grant(npc_id, caller_id).is_some()
    }

    /// Like [`NpcModule::check_permissions`] but names the rule that allowed access.
    pub fn permission_grant(&self, npc_id: Uuid, caller_id: Uuid) -> Option<AccessGrant> {
        let avatar = self.registry.get(npc_id)?;
        let grant = permissions::evaluate(avatar.owner_id(), caller_id);
        if let Some(grant) = grant.filter(|grant| grant.is_bypass()) {
            debug!("[npc] {caller_id} allowed on {npc_id} via {grant:?}");
        }
        grant
    }

    /// Checks permissions and returns the refusal as an error.
    pub fn ensure_permitted(&self, npc_id: Uuid, caller_id: Uuid) -> NpcResult<()> {
        if self.check_permissions(npc_id, caller_id) {
            Ok(())
        } else {
            Err(NpcError::PermissionDenied { npc: npc_id, caller: caller_id })
        }
    }

    /// A local, non-child presence for the id, if the scene has one.
    fn resolve_presence(&self, agent_id: Uuid) -> NpcResult<Arc<dyn ScenePresence>> {
        let presence = self.scene.presence(agent_id).ok_or(NpcError::PresenceUnavailable(agent_id))?;
        if presence.is_child_agent() {
            return Err(NpcError::ChildPresence(agent_id));
        }
        Ok(presence)
    }

    /// Runs `command` against a registered NPC and its presence under the configured locking.
    fn with_npc<F>(&self, agent_id: Uuid, command: F) -> NpcResult<()>
    where
        F: FnOnce(&NpcAvatar, &dyn ScenePresence) -> NpcResult<()>,
    {
        match self.config.lock_strategy {
            LockStrategy::HoldAcrossCalls => {
                let _held = self.registry.lock();
                let avatar = self.registry.get(agent_id).ok_or(NpcError::NotRegistered(agent_id))?;
                let presence = self.resolve_presence(agent_id)?;
                command(avatar.as_ref(), presence.as_ref())
            }
            LockStrategy::CopyOutRevalidate => {
                let avatar = self.registry.get(agent_id).ok_or(NpcError::NotRegistered(agent_id))?;
                let presence = self.resolve_presence(agent_id)?;
                command(avatar.as_ref(), presence.as_ref())?;
                if self.registry.contains(agent_id) {
                    Ok(())
                } else {
                    Err(NpcError::RemovedDuringCommand(agent_id))
                }
            }
        }
    }

    fn report(&self, operation: &str, agent_id: Uuid, outcome: NpcResult<()>) -> bool {
        match outcome {
            Ok(()) => true,
            Err(err) if err.is_expected() => {
                debug!("[npc] {operation} {agent_id} refused: {err}");
                false
            }
            Err(err) => {
                warn!("[npc] {operation} {agent_id} failed in {}: {err}", self.scene.region_name());
                false
            }
        }
    }
}
