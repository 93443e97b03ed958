use crate::appearance::AvatarAppearance;
use crate::presence::{PresenceController, PresenceType};
use anyhow::Result;
use glam::Vec3;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Session credentials registered with the scene before a presence is added.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentCircuitData {
    pub agent_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub circuit_code: u32,
    pub appearance: AvatarAppearance,
    pub service_urls: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatType {
    Whisper,
    Say,
    Shout,
}

impl ChatType {
    /// Audible distance in metres.
    pub fn range(self) -> f32 {
        match self {
            ChatType::Whisper => 10.0,
            ChatType::Say => 20.0,
            ChatType::Shout => 100.0,
        }
    }
}

impl fmt::Display for ChatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatType::Whisper => write!(f, "whisper"),
            ChatType::Say => write!(f, "say"),
            ChatType::Shout => write!(f, "shout"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatFromClient {
    pub sender: Uuid,
    pub from_name: String,
    pub channel: i32,
    pub kind: ChatType,
    pub message: String,
    pub position: Vec3,
}

/// A live presence resolved from the scene.
pub trait ScenePresence: Send + Sync {
    fn agent_id(&self) -> Uuid;

    fn name(&self) -> String;

    /// Mirrored from a neighbouring region rather than simulated here.
    fn is_child_agent(&self) -> bool;

    fn absolute_position(&self) -> Vec3;

    fn complete_movement(&self, controller: &dyn PresenceController, open_child_agents: bool);

    fn move_to_target(&self, target: Vec3, no_fly: bool, land_at_target: bool);

    fn set_velocity(&self, velocity: Vec3);

    fn reset_move_to_target(&self);

    fn request_sit(&self, controller: &dyn PresenceController, target_part: Uuid, offset: Vec3);

    fn stand_up(&self);
}

pub trait AttachmentsModule: Send + Sync {
    fn delete_attachments_from_scene(&self, presence: &dyn ScenePresence, silent: bool);

    fn rez_attachments(&self, presence: &dyn ScenePresence, appearance: &AvatarAppearance);
}

pub trait AvatarFactory: Send + Sync {
    /// Applies the appearance and sends it to every observer of the presence.
    fn set_appearance(&self, presence: &dyn ScenePresence, appearance: AvatarAppearance);
}

/// The region simulation the NPC module drives. Owned by the host, never by the module.
pub trait SceneHost: Send + Sync {
    fn region_name(&self) -> String;

    fn presence(&self, agent_id: Uuid) -> Option<Arc<dyn ScenePresence>>;

    fn add_new_circuit(&self, circuit_code: u32, data: AgentCircuitData) -> Result<()>;

    fn remove_circuit(&self, circuit_code: u32);

    fn add_new_client(&self, controller: Arc<dyn PresenceController>, kind: PresenceType) -> Result<()>;

    fn remove_client(&self, agent_id: Uuid, close_child_agents: bool);

    fn chat_from_client(&self, chat: ChatFromClient);

    fn attachments(&self) -> Option<&dyn AttachmentsModule> {
        None
    }

    fn avatar_factory(&self) -> Option<&dyn AvatarFactory> {
        None
    }
}
