use crate::appearance::AvatarAppearance;
use crate::presence::{PresenceController, PresenceType};
use crate::scene::{ChatFromClient, ChatType, SceneHost, ScenePresence};
use glam::Vec3;
use rand::Rng;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

pub const PUBLIC_CHAT_CHANNEL: i32 = 0;

/// The controlling record of one puppet agent.
#[derive(Debug)]
pub struct NpcAvatar {
    agent_id: Uuid,
    owner_id: Uuid,
    first_name: String,
    last_name: String,
    circuit_code: u32,
    start_position: Vec3,
    sense_as_agent: bool,
    appearance: RwLock<AvatarAppearance>,
}

impl NpcAvatar {
    pub fn new(
        first_name: &str,
        last_name: &str,
        position: Vec3,
        owner_id: Uuid,
        sense_as_agent: bool,
        appearance: &AvatarAppearance,
    ) -> Self {
        Self {
            agent_id: Uuid::new_v4(),
            owner_id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            circuit_code: random_circuit_code(),
            start_position: position,
            sense_as_agent,
            appearance: RwLock::new(appearance.copied(true)),
        }
    }

    pub fn owner_id(&self) -> Uuid {
        self.owner_id
    }

    pub fn appearance(&self) -> AvatarAppearance {
        self.appearance.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub(crate) fn replace_appearance(&self, appearance: AvatarAppearance) {
        *self.appearance.write().unwrap_or_else(PoisonError::into_inner) = appearance;
    }

    /// Builds the chat the scene should relay for this puppet.
    pub fn chat(&self, presence: &dyn ScenePresence, channel: i32, kind: ChatType, text: &str) -> ChatFromClient {
        ChatFromClient {
            sender: self.agent_id,
            from_name: self.name(),
            channel,
            kind,
            message: text.to_string(),
            position: presence.absolute_position(),
        }
    }

    pub fn say(&self, scene: &dyn SceneHost, presence: &dyn ScenePresence, text: &str) {
        scene.chat_from_client(self.chat(presence, PUBLIC_CHAT_CHANNEL, ChatType::Say, text));
    }
}

impl PresenceController for NpcAvatar {
    fn agent_id(&self) -> Uuid {
        self.agent_id
    }

    fn first_name(&self) -> &str {
        &self.first_name
    }

    fn last_name(&self) -> &str {
        &self.last_name
    }

    fn circuit_code(&self) -> u32 {
        self.circuit_code
    }

    fn start_position(&self) -> Vec3 {
        self.start_position
    }

    fn presence_type(&self) -> PresenceType {
        PresenceType::Npc
    }

    fn sense_as_agent(&self) -> bool {
        self.sense_as_agent
    }
}

fn random_circuit_code() -> u32 {
    rand::thread_rng().gen_range(0..i32::MAX as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_avatars_get_distinct_ids() {
        let appearance = AvatarAppearance::default();
        let a = NpcAvatar::new("Alice", "Puppet", Vec3::ZERO, Uuid::nil(), false, &appearance);
        let b = NpcAvatar::new("Alice", "Puppet", Vec3::ZERO, Uuid::nil(), false, &appearance);
        assert_ne!(a.agent_id(), b.agent_id());
        assert!(a.circuit_code() < i32::MAX as u32);
    }

    #[test]
    fn avatar_reports_npc_identity() {
        let owner = Uuid::new_v4();
        let avatar = NpcAvatar::new("Bob", "Marionette", Vec3::new(1.0, 2.0, 3.0), owner, true, &Default::default());
        assert_eq!(avatar.name(), "Bob Marionette");
        assert_eq!(avatar.presence_type(), PresenceType::Npc);
        assert_eq!(avatar.owner_id(), owner);
        assert!(avatar.sense_as_agent());
        assert_eq!(avatar.start_position(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn stored_appearance_is_a_copy() {
        let mut appearance = AvatarAppearance { serial: 3, ..AvatarAppearance::default() };
        let avatar = NpcAvatar::new("Carol", "Doll", Vec3::ZERO, Uuid::nil(), false, &appearance);
        appearance.serial = 99;
        assert_eq!(avatar.appearance().serial, 3);
        avatar.replace_appearance(appearance);
        assert_eq!(avatar.appearance().serial, 99);
    }
}
