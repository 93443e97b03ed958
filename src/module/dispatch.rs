use super::NpcModule;
use crate::avatar::PUBLIC_CHAT_CHANNEL;
use crate::scene::ChatType;
use glam::Vec3;
use tracing::debug;
use uuid::Uuid;

impl NpcModule {
    pub fn move_to_target(&self, agent_id: Uuid, target: Vec3, no_fly: bool, land_at_target: bool) -> bool {
        let outcome = self.with_npc(agent_id, |_, presence| {
            debug!(
                "[npc] Moving {} to {target} in {}, noFly {no_fly}, landAtTarget {land_at_target}",
                presence.name(),
                self.scene.region_name()
            );
            presence.move_to_target(target, no_fly, land_at_target);
            Ok(())
        });
        self.report("move", agent_id, outcome)
    }

    pub fn stop_move_to_target(&self, agent_id: Uuid) -> bool {
        let outcome = self.with_npc(agent_id, |_, presence| {
            presence.set_velocity(Vec3::ZERO);
            presence.reset_move_to_target();
            Ok(())
        });
        self.report("stop", agent_id, outcome)
    }

    pub fn say(&self, agent_id: Uuid, text: &str) -> bool {
        let outcome = self.with_npc(agent_id, |avatar, presence| {
            avatar.say(self.scene.as_ref(), presence, text);
            Ok(())
        });
        self.report("say", agent_id, outcome)
    }

    pub fn whisper(&self, agent_id: Uuid, text: &str) -> bool {
        self.chat(agent_id, PUBLIC_CHAT_CHANNEL, ChatType::Whisper, text)
    }

    pub fn shout(&self, agent_id: Uuid, text: &str) -> bool {
        self.chat(agent_id, PUBLIC_CHAT_CHANNEL, ChatType::Shout, text)
    }

    pub fn say_on_channel(&self, agent_id: Uuid, channel: i32, text: &str) -> bool {
        self.chat(agent_id, channel, ChatType::Say, text)
    }

    fn chat(&self, agent_id: Uuid, channel: i32, kind: ChatType, text: &str) -> bool {
        let outcome = self.with_npc(agent_id, |avatar, presence| {
            self.scene.chat_from_client(avatar.chat(presence, channel, kind, text));
            Ok(())
        });
        self.report(&format!("{kind} on channel {channel}"), agent_id, outcome)
    }

    pub fn sit(&self, agent_id: Uuid, target_part: Uuid) -> bool {
        let outcome = self.with_npc(agent_id, |avatar, presence| {
            presence.request_sit(avatar, target_part, Vec3::ZERO);
            Ok(())
        });
        self.report("sit", agent_id, outcome)
    }

    pub fn stand(&self, agent_id: Uuid) -> bool {
        let outcome = self.with_npc(agent_id, |_, presence| {
            presence.stand_up();
            Ok(())
        });
        self.report("stand", agent_id, outcome)
    }
}
