use anyhow::{anyhow, bail, Context, Result};
use glam::Vec3;
use kestrel_npc::appearance::AvatarAppearance;
use kestrel_npc::config::ScriptingConfig;
use kestrel_npc::local_scene::LocalScene;
use kestrel_npc::{NpcModule, SceneHost, NULL_OWNER};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

pub const HELP: &str = "\
create <first> <last> <x> <y> <z> [owner]   create an NPC (owner defaults to the operator)
remove <npc>                               delete an NPC
move <npc> <x> <y> <z> [nofly] [land]      walk or fly to a position
stop <npc>                                 cancel movement
say|whisper|shout <npc> <text...>          speak on the public channel
sit <npc> <part>                           sit on an object part
stand <npc>                                stand up
owner <npc>                                print the owner id
perm <npc> <caller>                        check whether caller may control npc
appearance <npc> <file>                    apply an appearance document
list                                       list NPCs in the registry
script <file>                              run a Rhai script as the operator
help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Create { first: String, last: String, position: Vec3, owner: Option<Uuid> },
    Remove(Uuid),
    Move { npc: Uuid, target: Vec3, no_fly: bool, land_at_target: bool },
    Stop(Uuid),
    Say(Uuid, String),
    Whisper(Uuid, String),
    Shout(Uuid, String),
    Sit(Uuid, Uuid),
    Stand(Uuid),
    Owner(Uuid),
    Permission { npc: Uuid, caller: Uuid },
    Appearance(Uuid, PathBuf),
    List,
    Script(PathBuf),
    Help,
    Quit,
}

impl ConsoleCommand {
    /// `Ok(None)` for blank lines and comments.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(None);
        }
        let mut words = trimmed.split_whitespace();
        let verb = words.next().unwrap_or_default().to_ascii_lowercase();
        let args: Vec<&str> = words.collect();
        let command = match verb.as_str() {
            "create" => {
                expect_args(&verb, &args, 5)?;
                let owner = args.get(5).map(|raw| parse_id(raw)).transpose()?;
                ConsoleCommand::Create {
                    first: args[0].to_string(),
                    last: args[1].to_string(),
                    position: parse_vec3(&args[2..5])?,
                    owner,
                }
            }
            "remove" => ConsoleCommand::Remove(single_id(&verb, &args)?),
            "move" => {
                expect_args(&verb, &args, 4)?;
                let mut no_fly = false;
                let mut land_at_target = false;
                for flag in &args[4..] {
                    match flag.to_ascii_lowercase().as_str() {
                        "nofly" => no_fly = true,
                        "land" => land_at_target = true,
                        other => bail!("Unknown move flag '{other}'. Use nofly and/or land."),
                    }
                }
                ConsoleCommand::Move { npc: parse_id(args[0])?, target: parse_vec3(&args[1..4])?, no_fly, land_at_target }
            }
            "stop" => ConsoleCommand::Stop(single_id(&verb, &args)?),
            "say" | "whisper" | "shout" => {
                expect_args(&verb, &args, 2)?;
                let npc = parse_id(args[0])?;
                let text = args[1..].join(" ");
                match verb.as_str() {
                    "say" => ConsoleCommand::Say(npc, text),
                    "whisper" => ConsoleCommand::Whisper(npc, text),
                    _ => ConsoleCommand::Shout(npc, text),
                }
            }
            "sit" => {
                expect_args(&verb, &args, 2)?;
                ConsoleCommand::Sit(parse_id(args[0])?, parse_id(args[1])?)
            }
            "stand" => ConsoleCommand::Stand(single_id(&verb, &args)?),
            "owner" => ConsoleCommand::Owner(single_id(&verb, &args)?),
            "perm" => {
                expect_args(&verb, &args, 2)?;
                ConsoleCommand::Permission { npc: parse_id(args[0])?, caller: parse_id(args[1])? }
            }
            "appearance" => {
                expect_args(&verb, &args, 2)?;
                ConsoleCommand::Appearance(parse_id(args[0])?, PathBuf::from(args[1]))
            }
            "list" => ConsoleCommand::List,
            "script" => {
                expect_args(&verb, &args, 1)?;
                ConsoleCommand::Script(PathBuf::from(args[0]))
            }
            "help" => ConsoleCommand::Help,
            "quit" | "exit" => ConsoleCommand::Quit,
            other => bail!("Unknown command '{other}'. Type 'help' for a list."),
        };
        Ok(Some(command))
    }
}

fn expect_args(verb: &str, args: &[&str], min: usize) -> Result<()> {
    if args.len() < min {
        bail!("'{verb}' expects at least {min} argument(s), got {}", args.len());
    }
    Ok(())
}

fn single_id(verb: &str, args: &[&str]) -> Result<Uuid> {
    expect_args(verb, args, 1)?;
    parse_id(args[0])
}

fn parse_id(raw: &str) -> Result<Uuid> {
    if raw.eq_ignore_ascii_case("none") {
        return Ok(NULL_OWNER);
    }
    Uuid::parse_str(raw).with_context(|| format!("Invalid id '{raw}'"))
}

fn parse_vec3(raw: &[&str]) -> Result<Vec3> {
    let mut out = [0.0f32; 3];
    for (slot, value) in out.iter_mut().zip(raw) {
        *slot = value.parse::<f32>().with_context(|| format!("Invalid coordinate '{value}'"))?;
    }
    Ok(Vec3::from_array(out))
}

pub enum Outcome {
    Continue(Option<String>),
    Quit,
}

/// Executes console commands as `operator` against one region.
pub struct Console {
    module: Arc<NpcModule>,
    scene: Arc<LocalScene>,
    operator: Uuid,
    scripting: ScriptingConfig,
}

impl Console {
    pub fn new(
        module: Arc<NpcModule>,
        scene: Arc<LocalScene>,
        operator: Uuid,
        scripting: ScriptingConfig,
    ) -> Self {
        Self { module, scene, operator, scripting }
    }

    pub fn execute_line(&self, line: &str) -> Result<Outcome> {
        match ConsoleCommand::parse(line)? {
            Some(command) => self.execute(command),
            None => Ok(Outcome::Continue(None)),
        }
    }

    pub fn execute(&self, command: ConsoleCommand) -> Result<Outcome> {
        let module = &self.module;
        let text = match command {
            ConsoleCommand::Create { first, last, position, owner } => {
                let owner = owner.unwrap_or(self.operator);
                let id = module
                    .create_npc(&first, &last, position, owner, false, &AvatarAppearance::default())
                    .ok_or_else(|| anyhow!("Could not create {first} {last} in {}", self.region()))?;
                format!("Created {first} {last} as {id}")
            }
            ConsoleCommand::Remove(npc) => {
                self.authorise(npc)?;
                status(module.delete_npc(npc), "removed")
            }
            ConsoleCommand::Move { npc, target, no_fly, land_at_target } => {
                self.authorise(npc)?;
                status(module.move_to_target(npc, target, no_fly, land_at_target), "moving")
            }
            ConsoleCommand::Stop(npc) => {
                self.authorise(npc)?;
                status(module.stop_move_to_target(npc), "stopped")
            }
            ConsoleCommand::Say(npc, text) => {
                self.authorise(npc)?;
                status(module.say(npc, &text), "said")
            }
            ConsoleCommand::Whisper(npc, text) => {
                self.authorise(npc)?;
                status(module.whisper(npc, &text), "whispered")
            }
            ConsoleCommand::Shout(npc, text) => {
                self.authorise(npc)?;
                status(module.shout(npc, &text), "shouted")
            }
            ConsoleCommand::Sit(npc, part) => {
                self.authorise(npc)?;
                status(module.sit(npc, part), "sitting")
            }
            ConsoleCommand::Stand(npc) => {
                self.authorise(npc)?;
                status(module.stand(npc), "standing")
            }
            ConsoleCommand::Owner(npc) => module.get_owner(npc).to_string(),
            ConsoleCommand::Permission { npc, caller } => match module.permission_grant(npc, caller) {
                Some(grant) => format!("allowed ({grant:?})"),
                None => "denied".to_string(),
            },
            ConsoleCommand::Appearance(npc, path) => {
                self.authorise(npc)?;
                let appearance = AvatarAppearance::load(&path)?;
                status(module.set_npc_appearance(npc, &appearance), "appearance updated")
            }
            ConsoleCommand::List => self.list(),
            ConsoleCommand::Script(path) => self.run_script(path)?,
            ConsoleCommand::Help => HELP.to_string(),
            ConsoleCommand::Quit => return Ok(Outcome::Quit),
        };
        Ok(Outcome::Continue(Some(text)))
    }

    fn region(&self) -> String {
        self.scene.region_name()
    }

    fn authorise(&self, npc: Uuid) -> Result<()> {
        self.module.ensure_permitted(npc, self.operator)?;
        Ok(())
    }

    fn list(&self) -> String {
        let npcs = self.module.list_npcs();
        if npcs.is_empty() {
            return format!("No NPCs in {}", self.region());
        }
        let mut out = format!("{} NPC(s), {} presence(s) in {}:", npcs.len(), self.scene.presence_count(), self.region());
        for npc in npcs {
            out.push_str(&format!("\n  {}  {:<24} owner={}", npc.agent_id, npc.name, npc.owner_id));
        }
        out
    }

    #[cfg(feature = "scripting")]
    fn run_script(&self, path: PathBuf) -> Result<String> {
        let host = kestrel_npc::scripting::NpcScriptHost::new(Arc::clone(&self.module), self.operator, &self.scripting)?;
        let value = host.run_file(&path)?;
        Ok(format!("{} => {value}", path.display()))
    }

    #[cfg(not(feature = "scripting"))]
    fn run_script(&self, path: PathBuf) -> Result<String> {
        bail!("Cannot run {}: built without scripting", path.display())
    }
}

fn status(ok: bool, verb: &str) -> String {
    if ok {
        verb.to_string()
    } else {
        format!("failed ({verb})")
    }
}
