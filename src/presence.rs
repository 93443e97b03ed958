use glam::Vec3;
use std::fmt;
use uuid::Uuid;

/// How a presence entered the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresenceType {
    User,
    Npc,
}

impl fmt::Display for PresenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresenceType::User => write!(f, "User"),
            PresenceType::Npc => write!(f, "Npc"),
        }
    }
}

/// Whatever drives a scene presence: a network session or a puppet.
///
/// The scene only needs identity and session details from a controller; the
/// presence handle itself carries movement and seating.
pub trait PresenceController: Send + Sync {
    fn agent_id(&self) -> Uuid;

    fn first_name(&self) -> &str;

    fn last_name(&self) -> &str;

    fn circuit_code(&self) -> u32;

    fn start_position(&self) -> Vec3;

    fn presence_type(&self) -> PresenceType;

    /// Whether sensors should report this presence as a full agent.
    fn sense_as_agent(&self) -> bool {
        true
    }

    fn name(&self) -> String {
        format!("{} {}", self.first_name(), self.last_name())
    }
}
