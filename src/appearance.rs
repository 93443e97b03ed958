use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// Number of baked texture faces carried by an appearance.
pub const TEXTURE_FACE_COUNT: usize = 21;

const fn default_avatar_height() -> f32 {
    1.77
}

fn default_textures() -> Vec<Option<Uuid>> {
    vec![None; TEXTURE_FACE_COUNT]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wearable {
    pub item_id: Uuid,
    pub asset_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarAttachment {
    pub attach_point: u32,
    pub item_id: Uuid,
    #[serde(default)]
    pub asset_id: Uuid,
}

/// Full visual description of an avatar. Replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarAppearance {
    #[serde(default)]
    pub serial: u32,
    #[serde(default = "default_avatar_height")]
    pub avatar_height: f32,
    #[serde(default)]
    pub visual_params: Vec<u8>,
    #[serde(default = "default_textures")]
    pub textures: Vec<Option<Uuid>>,
    #[serde(default)]
    pub wearables: Vec<Wearable>,
    #[serde(default)]
    pub attachments: Vec<AvatarAttachment>,
}

impl Default for AvatarAppearance {
    fn default() -> Self {
        Self {
            serial: 0,
            avatar_height: default_avatar_height(),
            visual_params: Vec::new(),
            textures: default_textures(),
            wearables: Vec::new(),
            attachments: Vec::new(),
        }
    }
}

impl AvatarAppearance {
    pub fn from_json_str(source: &str) -> Result<Self> {
        let appearance: Self = serde_json::from_str(source).context("Parsing appearance document")?;
        Ok(appearance.normalized())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read appearance file {}", path.display()))?;
        Self::from_json_str(&source).with_context(|| format!("Invalid appearance in {}", path.display()))
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Serializing appearance document")
    }

    /// Copy used when handing an appearance to the scene or storing it on a record.
    /// Attachments are optional so a caller can strip worn items from a clone.
    pub fn copied(&self, with_attachments: bool) -> Self {
        let mut copy = self.clone().normalized();
        if !with_attachments {
            copy.attachments.clear();
        }
        copy
    }

    /// Attachments the scene should rez when this appearance is applied, one per attach point.
    pub fn attachments_to_rez(&self) -> Vec<AvatarAttachment> {
        let mut seen = Vec::new();
        let mut items = Vec::new();
        for attachment in &self.attachments {
            if attachment.item_id.is_nil() || seen.contains(&attachment.attach_point) {
                continue;
            }
            seen.push(attachment.attach_point);
            items.push(*attachment);
        }
        items
    }

    fn normalized(mut self) -> Self {
        self.textures.resize(TEXTURE_FACE_COUNT, None);
        self
    }
}
