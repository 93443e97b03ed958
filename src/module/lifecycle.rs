use super::NpcModule;
use crate::appearance::AvatarAppearance;
use crate::avatar::NpcAvatar;
use crate::error::{NpcError, NpcResult};
use crate::presence::{PresenceController, PresenceType};
use crate::scene::AgentCircuitData;
use glam::Vec3;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

impl NpcModule {
    /// True only when the id has a local presence in the scene and a registry entry.
    pub fn is_npc(&self, agent_id: Uuid) -> bool {
        match self.scene.presence(agent_id) {
            Some(presence) if !presence.is_child_agent() => self.registry.contains(agent_id),
            _ => false,
        }
    }

    /// Materialises a puppet in the scene. `None` means no NPC was created.
    pub fn create_npc(
        &self,
        first_name: &str,
        last_name: &str,
        position: Vec3,
        owner_id: Uuid,
        sense_as_agent: bool,
        appearance: &AvatarAppearance,
    ) -> Option<Uuid> {
        match self.try_create_npc(first_name, last_name, position, owner_id, sense_as_agent, appearance) {
            Ok(agent_id) => Some(agent_id),
            Err(err) => {
                warn!("[npc] {err}");
                None
            }
        }
    }

    pub fn try_create_npc(
        &self,
        first_name: &str,
        last_name: &str,
        position: Vec3,
        owner_id: Uuid,
        sense_as_agent: bool,
        appearance: &AvatarAppearance,
    ) -> NpcResult<Uuid> {
        let avatar = Arc::new(NpcAvatar::new(first_name, last_name, position, owner_id, sense_as_agent, appearance));
        let agent_id = avatar.agent_id();
        let circuit_code = avatar.circuit_code();

        debug!(
            "[npc] Creating NPC {first_name} {last_name} {agent_id}, owner={owner_id}, senseAsAgent={sense_as_agent} at {position} in {}",
            self.scene.region_name()
        );

        let circuit = AgentCircuitData {
            agent_id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            circuit_code,
            appearance: appearance.copied(true),
            service_urls: BTreeMap::new(),
        };

        let avatars = self.registry.lock();
        self.scene
            .add_new_circuit(circuit_code, circuit)
            .map_err(|source| NpcError::Scene { operation: "add_new_circuit", source })?;

        let controller: Arc<dyn PresenceController> = avatar.clone();
        let added = self
            .scene
            .add_new_client(controller, PresenceType::Npc)
            .map_err(|source| NpcError::Scene { operation: "add_new_client", source });
        let presence = match added.and_then(|()| self.resolve_presence(agent_id)) {
            Ok(presence) => presence,
            Err(err) => {
                if self.config.rollback_circuit_on_create_failure {
                    debug!("[npc] Removing circuit {circuit_code} left by failed create of {agent_id}");
                    self.scene.remove_circuit(circuit_code);
                }
                return Err(match err {
                    NpcError::PresenceUnavailable(_) | NpcError::ChildPresence(_) => {
                        NpcError::PresenceNotMaterialized { name: avatar.name(), agent_id }
                    }
                    other => other,
                });
            }
        };

        presence.complete_movement(avatar.as_ref(), false);
        avatars.borrow_mut().insert(agent_id, avatar);
        debug!("[npc] Created NPC with id {agent_id}");
        Ok(agent_id)
    }

    /// Removes the presence and the registry entry together.
    pub fn delete_npc(&self, agent_id: Uuid) -> bool {
        let avatars = self.registry.lock();
        let found = avatars.borrow().get(&agent_id).cloned();
        let Some(avatar) = found else {
            debug!("[npc] Could not find {agent_id} to remove");
            return false;
        };
        debug!("[npc] Found {agent_id} {} to remove", avatar.name());
        self.scene.remove_client(agent_id, false);
        avatars.borrow_mut().remove(&agent_id);
        debug!("[npc] Removed {agent_id}");
        true
    }

    /// Replaces the NPC's appearance and re-rezzes the attachments it lists.
    pub fn set_npc_appearance(&self, agent_id: Uuid, appearance: &AvatarAppearance) -> bool {
        let outcome = self.with_npc(agent_id, |avatar, presence| {
            let factory = self.scene.avatar_factory().ok_or(NpcError::ModuleUnavailable("avatar factory"))?;
            let attachments = self.scene.attachments();
            let appearance = appearance.copied(true);

            if let Some(attachments) = attachments {
                attachments.delete_attachments_from_scene(presence, false);
            }
            factory.set_appearance(presence, appearance.clone());
            if let Some(attachments) = attachments {
                attachments.rez_attachments(presence, &appearance);
            }
            avatar.replace_appearance(appearance);
            Ok(())
        });
        self.report("set appearance for", agent_id, outcome)
    }
}
