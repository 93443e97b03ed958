use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// How commands treat the registry lock while calling into the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LockStrategy {
    /// Hold the registry lock for the whole command, scene calls included.
    #[default]
    HoldAcrossCalls,
    /// Copy the record out, release the lock, call the scene, then re-check registration.
    CopyOutRevalidate,
}

impl LockStrategy {
    pub fn label(self) -> &'static str {
        match self {
            LockStrategy::HoldAcrossCalls => "hold across calls",
            LockStrategy::CopyOutRevalidate => "copy out + revalidate",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NpcConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub lock_strategy: LockStrategy,
    /// Remove the session circuit again when a create fails after registering it.
    #[serde(default)]
    pub rollback_circuit_on_create_failure: bool,
}

impl Default for NpcConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            lock_strategy: LockStrategy::default(),
            rollback_circuit_on_create_failure: false,
        }
    }
}

impl NpcConfig {
    pub fn enabled() -> Self {
        Self { enabled: true, ..Self::default() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptingConfig {
    #[serde(default = "ScriptingConfig::default_enabled")]
    pub enabled: bool,
    #[serde(default = "ScriptingConfig::default_max_operations")]
    pub max_operations: u64,
}

impl ScriptingConfig {
    const fn default_enabled() -> bool {
        true
    }

    const fn default_max_operations() -> u64 {
        100_000
    }
}

impl Default for ScriptingConfig {
    fn default() -> Self {
        Self { enabled: Self::default_enabled(), max_operations: Self::default_max_operations() }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NpcModuleConfig {
    #[serde(default)]
    pub npc: NpcConfig,
    #[serde(default)]
    pub scripting: ScriptingConfig,
}

impl NpcModuleConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!("[config] {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn npc_module_is_disabled_by_default() {
        let cfg = NpcModuleConfig::default();
        assert!(!cfg.npc.enabled);
        assert_eq!(cfg.npc.lock_strategy, LockStrategy::HoldAcrossCalls);
        assert!(!cfg.npc.rollback_circuit_on_create_failure);
        assert!(cfg.scripting.enabled);
    }

    #[test]
    fn loads_sections_from_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("npc.json");
        fs::write(
            &path,
            r#"{
                "npc": { "enabled": true, "lock_strategy": "copy_out_revalidate" },
                "scripting": { "max_operations": 500 }
            }"#,
        )
        .expect("write config");
        let cfg = NpcModuleConfig::load(&path).expect("load config");
        assert!(cfg.npc.enabled);
        assert_eq!(cfg.npc.lock_strategy, LockStrategy::CopyOutRevalidate);
        assert_eq!(cfg.scripting.max_operations, 500);
        assert!(cfg.scripting.enabled);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = NpcModuleConfig::load_or_default(dir.path().join("absent.json"));
        assert!(!cfg.npc.enabled);
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ npc: ").expect("write config");
        let err = NpcModuleConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
