pub mod appearance;
pub mod avatar;
pub mod config;
pub mod error;
pub mod local_scene;
pub mod module;
pub mod permissions;
pub mod presence;
pub mod registry;
pub mod scene;
#[cfg(feature = "scripting")]
pub mod scripting;

pub use appearance::AvatarAppearance;
pub use avatar::NpcAvatar;
pub use config::{LockStrategy, NpcConfig, NpcModuleConfig};
pub use error::NpcError;
pub use module::NpcModule;
pub use permissions::NULL_OWNER;
pub use registry::{NpcRegistry, NpcSummary};
pub use scene::SceneHost;
