use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use glam::Vec3;
use rhai::{Dynamic, Engine, Scope, FLOAT};
use tracing::{debug, info};
use uuid::Uuid;

use crate::appearance::AvatarAppearance;
use crate::config::ScriptingConfig;
use crate::error::{NpcError, NpcResult};
use crate::module::NpcModule;
use crate::permissions::NULL_OWNER;

/// The `npcs` object scripts see. Every call acts on behalf of `caller`.
#[derive(Clone)]
pub struct NpcScriptApi {
    module: Arc<NpcModule>,
    caller: Uuid,
}

impl NpcScriptApi {
    pub fn new(module: Arc<NpcModule>, caller: Uuid) -> Self {
        Self { module, caller }
    }

    fn create(&mut self, first: &str, last: &str, x: FLOAT, y: FLOAT, z: FLOAT) -> String {
        self.spawn(first, last, vec3(x, y, z), self.caller, &AvatarAppearance::default())
    }

    fn create_unowned(&mut self, first: &str, last: &str, x: FLOAT, y: FLOAT, z: FLOAT) -> String {
        self.spawn(first, last, vec3(x, y, z), NULL_OWNER, &AvatarAppearance::default())
    }

    fn create_with_appearance(
        &mut self,
        first: &str,
        last: &str,
        x: FLOAT,
        y: FLOAT,
        z: FLOAT,
        appearance: &str,
    ) -> String {
        match AvatarAppearance::from_json_str(appearance) {
            Ok(appearance) => self.spawn(first, last, vec3(x, y, z), self.caller, &appearance),
            Err(err) => {
                debug!("[npc-script] create {first} {last} rejected: {err:#}");
                String::new()
            }
        }
    }

    fn spawn(&self, first: &str, last: &str, position: Vec3, owner: Uuid, appearance: &AvatarAppearance) -> String {
        self.module
            .create_npc(first, last, position, owner, false, appearance)
            .map(|id| id.to_string())
            .unwrap_or_default()
    }

    fn remove(&mut self, npc: &str) -> bool {
        self.controlled(npc).is_some_and(|id| self.module.delete_npc(id))
    }

    fn move_to(&mut self, npc: &str, x: FLOAT, y: FLOAT, z: FLOAT) -> bool {
        self.move_to_target(npc, x, y, z, false, true)
    }

    fn move_to_target(&mut self, npc: &str, x: FLOAT, y: FLOAT, z: FLOAT, no_fly: bool, land: bool) -> bool {
        self.controlled(npc).is_some_and(|id| self.module.move_to_target(id, vec3(x, y, z), no_fly, land))
    }

    fn stop(&mut self, npc: &str) -> bool {
        self.controlled(npc).is_some_and(|id| self.module.stop_move_to_target(id))
    }

    fn say(&mut self, npc: &str, text: &str) -> bool {
        self.controlled(npc).is_some_and(|id| self.module.say(id, text))
    }

    fn whisper(&mut self, npc: &str, text: &str) -> bool {
        self.controlled(npc).is_some_and(|id| self.module.whisper(id, text))
    }

    fn shout(&mut self, npc: &str, text: &str) -> bool {
        self.controlled(npc).is_some_and(|id| self.module.shout(id, text))
    }

    fn sit(&mut self, npc: &str, part: &str) -> bool {
        let Some(id) = self.controlled(npc) else {
            return false;
        };
        match parse_agent_id(part) {
            Ok(part) => self.module.sit(id, part),
            Err(err) => {
                debug!("[npc-script] sit: {err}");
                false
            }
        }
    }

    fn stand(&mut self, npc: &str) -> bool {
        self.controlled(npc).is_some_and(|id| self.module.stand(id))
    }

    fn set_appearance(&mut self, npc: &str, appearance: &str) -> bool {
        let Some(id) = self.controlled(npc) else {
            return false;
        };
        match AvatarAppearance::from_json_str(appearance) {
            Ok(appearance) => self.module.set_npc_appearance(id, &appearance),
            Err(err) => {
                debug!("[npc-script] appearance for {id} rejected: {err:#}");
                false
            }
        }
    }

    fn owner(&mut self, npc: &str) -> String {
        parse_agent_id(npc).map_or(NULL_OWNER, |id| self.module.get_owner(id)).to_string()
    }

    fn is_npc(&mut self, npc: &str) -> bool {
        parse_agent_id(npc).is_ok_and(|id| self.module.is_npc(id))
    }

    fn log(&mut self, message: &str) {
        info!("[npc-script] {message}");
    }

    /// Parses the id and checks the caller may control it.
    fn controlled(&self, npc: &str) -> Option<Uuid> {
        let outcome = parse_agent_id(npc).and_then(|id| self.module.ensure_permitted(id, self.caller).map(|()| id));
        match outcome {
            Ok(id) => Some(id),
            Err(err) => {
                debug!("[npc-script] {err}");
                None
            }
        }
    }
}

fn parse_agent_id(raw: &str) -> NpcResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| NpcError::InvalidId(raw.to_string()))
}

fn vec3(x: FLOAT, y: FLOAT, z: FLOAT) -> Vec3 {
    Vec3::new(x as f32, y as f32, z as f32)
}

/// Runs Rhai scripts against one NPC module on behalf of one caller.
pub struct NpcScriptHost {
    engine: Engine,
    api: NpcScriptApi,
}

impl NpcScriptHost {
    pub fn new(module: Arc<NpcModule>, caller: Uuid, config: &ScriptingConfig) -> Result<Self> {
        if !config.enabled {
            bail!("NPC scripting is disabled");
        }
        let mut engine = Engine::new();
        engine.set_max_operations(config.max_operations);
        register_api(&mut engine);
        Ok(Self { engine, api: NpcScriptApi::new(module, caller) })
    }

    pub fn caller(&self) -> Uuid {
        self.api.caller
    }

    pub fn run(&self, source: &str) -> Result<Dynamic> {
        let ast = self.engine.compile(source).with_context(|| "Compiling Rhai script")?;
        let mut scope = Scope::new();
        scope.push("npcs", self.api.clone());
        self.engine.eval_ast_with_scope::<Dynamic>(&mut scope, &ast).map_err(|err| anyhow!("Script error: {err}"))
    }

    pub fn run_file(&self, path: impl AsRef<Path>) -> Result<Dynamic> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
        self.run(&source).with_context(|| format!("Running {}", path.display()))
    }
}

fn register_api(engine: &mut Engine) {
    engine.register_type_with_name::<NpcScriptApi>("Npcs");
    engine.register_fn("create", NpcScriptApi::create);
    engine.register_fn("create_unowned", NpcScriptApi::create_unowned);
    engine.register_fn("create_with_appearance", NpcScriptApi::create_with_appearance);
    engine.register_fn("remove", NpcScriptApi::remove);
    engine.register_fn("move_to", NpcScriptApi::move_to);
    engine.register_fn("move_to_target", NpcScriptApi::move_to_target);
    engine.register_fn("stop", NpcScriptApi::stop);
    engine.register_fn("say", NpcScriptApi::say);
    engine.register_fn("whisper", NpcScriptApi::whisper);
    engine.register_fn("shout", NpcScriptApi::shout);
    engine.register_fn("sit", NpcScriptApi::sit);
    engine.register_fn("stand", NpcScriptApi::stand);
    engine.register_fn("set_appearance", NpcScriptApi::set_appearance);
    engine.register_fn("owner", NpcScriptApi::owner);
    engine.register_fn("is_npc", NpcScriptApi::is_npc);
    engine.register_fn("log", NpcScriptApi::log);
}
