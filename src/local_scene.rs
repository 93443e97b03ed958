//! In-process scene host for headless tools and tests.
//!
//! Keeps a presence table and a circuit table, applies movement and seating
//! to plain state, and journals every side effect so callers can inspect
//! what the NPC module asked of the scene.

use crate::appearance::AvatarAppearance;
use crate::presence::{PresenceController, PresenceType};
use crate::scene::{AgentCircuitData, AttachmentsModule, AvatarFactory, ChatFromClient, SceneHost, ScenePresence};
use anyhow::{anyhow, bail, Result};
use glam::Vec3;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

pub type MoveHook = Arc<dyn Fn(Uuid) + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    CircuitAdded { circuit_code: u32, agent_id: Uuid },
    CircuitRemoved { circuit_code: u32 },
    ClientAdded { agent_id: Uuid, kind: PresenceType },
    ClientRemoved { agent_id: Uuid },
    MovementCompleted { agent_id: Uuid },
    MoveToTarget { agent_id: Uuid, target: Vec3 },
    VelocitySet { agent_id: Uuid, velocity: Vec3 },
    MoveTargetReset { agent_id: Uuid },
    SitRequested { agent_id: Uuid, target_part: Uuid },
    StoodUp { agent_id: Uuid },
    Chat(ChatFromClient),
    AttachmentsDeleted { agent_id: Uuid },
    AttachmentsRezzed { agent_id: Uuid, items: Vec<Uuid> },
    AppearanceSet { agent_id: Uuid, serial: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveTarget {
    pub target: Vec3,
    pub no_fly: bool,
    pub land_at_target: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PresenceState {
    pub position: Vec3,
    pub velocity: Vec3,
    pub move_target: Option<MoveTarget>,
    pub sitting_on: Option<Uuid>,
    pub movement_complete: bool,
    pub appearance_serial: Option<u32>,
    pub worn: Vec<Uuid>,
    /// Chat lines delivered to this presence, oldest first.
    pub heard: Vec<String>,
}

#[derive(Default)]
struct Journal {
    calls: AtomicUsize,
    events: Mutex<Vec<SceneEvent>>,
    move_hook: Mutex<Option<MoveHook>>,
}

impl Journal {
    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn record(&self, event: SceneEvent) {
        self.touch();
        lock(&self.events).push(event);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A network-backed participant, as opposed to a puppet.
#[derive(Debug, Clone)]
pub struct ConnectedClient {
    agent_id: Uuid,
    first_name: String,
    last_name: String,
    circuit_code: u32,
    position: Vec3,
}

impl PresenceController for ConnectedClient {
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
        self.position
    }

    fn presence_type(&self) -> PresenceType {
        PresenceType::User
    }
}

pub struct LocalPresence {
    agent_id: Uuid,
    name: String,
    kind: PresenceType,
    child: bool,
    state: Mutex<PresenceState>,
    journal: Arc<Journal>,
}

impl LocalPresence {
    pub fn kind(&self) -> PresenceType {
        self.kind
    }

    pub fn state(&self) -> PresenceState {
        lock(&self.state).clone()
    }
}

impl ScenePresence for LocalPresence {
    fn agent_id(&self) -> Uuid {
        self.agent_id
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn is_child_agent(&self) -> bool {
        self.child
    }

    fn absolute_position(&self) -> Vec3 {
        lock(&self.state).position
    }

    fn complete_movement(&self, _controller: &dyn PresenceController, _open_child_agents: bool) {
        lock(&self.state).movement_complete = true;
        self.journal.record(SceneEvent::MovementCompleted { agent_id: self.agent_id });
    }

    fn move_to_target(&self, target: Vec3, no_fly: bool, land_at_target: bool) {
        let hook = lock(&self.journal.move_hook).clone();
        if let Some(hook) = hook {
            hook(self.agent_id);
        }
        lock(&self.state).move_target = Some(MoveTarget { target, no_fly, land_at_target });
        self.journal.record(SceneEvent::MoveToTarget { agent_id: self.agent_id, target });
    }

    fn set_velocity(&self, velocity: Vec3) {
        lock(&self.state).velocity = velocity;
        self.journal.record(SceneEvent::VelocitySet { agent_id: self.agent_id, velocity });
    }

    fn reset_move_to_target(&self) {
        lock(&self.state).move_target = None;
        self.journal.record(SceneEvent::MoveTargetReset { agent_id: self.agent_id });
    }

    fn request_sit(&self, _controller: &dyn PresenceController, target_part: Uuid, _offset: Vec3) {
        lock(&self.state).sitting_on = Some(target_part);
        self.journal.record(SceneEvent::SitRequested { agent_id: self.agent_id, target_part });
    }

    fn stand_up(&self) {
        let was_sitting = lock(&self.state).sitting_on.take().is_some();
        if was_sitting {
            self.journal.record(SceneEvent::StoodUp { agent_id: self.agent_id });
        } else {
            self.journal.touch();
        }
    }
}

#[derive(Default)]
struct SceneTables {
    circuits: HashMap<u32, AgentCircuitData>,
    presences: HashMap<Uuid, Arc<LocalPresence>>,
    drop_next_client: bool,
    reject_next_client: bool,
}

pub struct LocalScene {
    region_name: String,
    tables: Mutex<SceneTables>,
    journal: Arc<Journal>,
    with_attachments: bool,
    with_avatar_factory: bool,
}

impl LocalScene {
    pub fn new(region_name: impl Into<String>) -> Self {
        Self {
            region_name: region_name.into(),
            tables: Mutex::new(SceneTables::default()),
            journal: Arc::new(Journal::default()),
            with_attachments: true,
            with_avatar_factory: true,
        }
    }

    pub fn without_attachments(mut self) -> Self {
        self.with_attachments = false;
        self
    }

    pub fn without_avatar_factory(mut self) -> Self {
        self.with_avatar_factory = false;
        self
    }

    /// Logs in a network client and gives it a root presence.
    pub fn connect_client(&self, first_name: &str, last_name: &str, position: Vec3) -> Uuid {
        let client = ConnectedClient {
            agent_id: Uuid::new_v4(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            circuit_code: rand::random::<u32>() & 0x7fff_ffff,
            position,
        };
        let agent_id = client.agent_id;
        let mut tables = lock(&self.tables);
        tables.circuits.insert(
            client.circuit_code,
            AgentCircuitData {
                agent_id,
                first_name: client.first_name.clone(),
                last_name: client.last_name.clone(),
                circuit_code: client.circuit_code,
                appearance: AvatarAppearance::default(),
                service_urls: Default::default(),
            },
        );
        tables.presences.insert(agent_id, Arc::new(self.presence_for(&client, false)));
        agent_id
    }

    /// Adds a presence mirrored from a neighbouring region.
    pub fn add_child_presence(&self, agent_id: Uuid, name: &str) {
        let presence = LocalPresence {
            agent_id,
            name: name.to_string(),
            kind: PresenceType::User,
            child: true,
            state: Mutex::new(PresenceState::default()),
            journal: Arc::clone(&self.journal),
        };
        lock(&self.tables).presences.insert(agent_id, Arc::new(presence));
    }

    /// The next `add_new_client` succeeds but produces no presence.
    pub fn drop_next_client(&self) {
        lock(&self.tables).drop_next_client = true;
    }

    /// The next `add_new_client` returns an error.
    pub fn reject_next_client(&self) {
        lock(&self.tables).reject_next_client = true;
    }

    pub fn set_move_hook(&self, hook: impl Fn(Uuid) + Send + Sync + 'static) {
        *lock(&self.journal.move_hook) = Some(Arc::new(hook));
    }

    pub fn clear_move_hook(&self) {
        *lock(&self.journal.move_hook) = None;
    }

    /// Every trait call the scene has served, lookups included.
    pub fn call_count(&self) -> usize {
        self.journal.calls.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<SceneEvent> {
        lock(&self.journal.events).clone()
    }

    pub fn chat_log(&self) -> Vec<ChatFromClient> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SceneEvent::Chat(chat) => Some(chat),
                _ => None,
            })
            .collect()
    }

    pub fn circuit_count(&self) -> usize {
        lock(&self.tables).circuits.len()
    }

    pub fn has_circuit_for(&self, agent_id: Uuid) -> bool {
        lock(&self.tables).circuits.values().any(|circuit| circuit.agent_id == agent_id)
    }

    pub fn presence_count(&self) -> usize {
        lock(&self.tables).presences.len()
    }

    pub fn presence_state(&self, agent_id: Uuid) -> Option<PresenceState> {
        lock(&self.tables).presences.get(&agent_id).map(|presence| presence.state())
    }

    pub fn presence_kind(&self, agent_id: Uuid) -> Option<PresenceType> {
        lock(&self.tables).presences.get(&agent_id).map(|presence| presence.kind())
    }

    fn presence_for(&self, controller: &dyn PresenceController, child: bool) -> LocalPresence {
        LocalPresence {
            agent_id: controller.agent_id(),
            name: controller.name(),
            kind: controller.presence_type(),
            child,
            state: Mutex::new(PresenceState { position: controller.start_position(), ..PresenceState::default() }),
            journal: Arc::clone(&self.journal),
        }
    }

    fn local_presence(&self, agent_id: Uuid) -> Option<Arc<LocalPresence>> {
        lock(&self.tables).presences.get(&agent_id).cloned()
    }
}

impl SceneHost for LocalScene {
    fn region_name(&self) -> String {
        self.region_name.clone()
    }

    fn presence(&self, agent_id: Uuid) -> Option<Arc<dyn ScenePresence>> {
        self.journal.touch();
        self.local_presence(agent_id).map(|presence| presence as Arc<dyn ScenePresence>)
    }

    fn add_new_circuit(&self, circuit_code: u32, data: AgentCircuitData) -> Result<()> {
        let agent_id = data.agent_id;
        let mut tables = lock(&self.tables);
        if tables.circuits.contains_key(&circuit_code) {
            bail!("circuit {circuit_code} already in use");
        }
        tables.circuits.insert(circuit_code, data);
        drop(tables);
        self.journal.record(SceneEvent::CircuitAdded { circuit_code, agent_id });
        Ok(())
    }

    fn remove_circuit(&self, circuit_code: u32) {
        lock(&self.tables).circuits.remove(&circuit_code);
        self.journal.record(SceneEvent::CircuitRemoved { circuit_code });
    }

    fn add_new_client(&self, controller: Arc<dyn PresenceController>, kind: PresenceType) -> Result<()> {
        let agent_id = controller.agent_id();
        let mut tables = lock(&self.tables);
        if std::mem::take(&mut tables.reject_next_client) {
            return Err(anyhow!("client {agent_id} refused by region {}", self.region_name));
        }
        let authorised = tables
            .circuits
            .get(&controller.circuit_code())
            .is_some_and(|circuit| circuit.agent_id == agent_id);
        if !authorised {
            bail!("no circuit {} registered for {agent_id}", controller.circuit_code());
        }
        if !std::mem::take(&mut tables.drop_next_client) {
            let mut presence = self.presence_for(controller.as_ref(), false);
            presence.kind = kind;
            tables.presences.insert(agent_id, Arc::new(presence));
        }
        drop(tables);
        self.journal.record(SceneEvent::ClientAdded { agent_id, kind });
        Ok(())
    }

    fn remove_client(&self, agent_id: Uuid, _close_child_agents: bool) {
        let mut tables = lock(&self.tables);
        tables.presences.remove(&agent_id);
        tables.circuits.retain(|_, circuit| circuit.agent_id != agent_id);
        drop(tables);
        self.journal.record(SceneEvent::ClientRemoved { agent_id });
    }

    fn chat_from_client(&self, chat: ChatFromClient) {
        let range = chat.kind.range();
        let listeners: Vec<Arc<LocalPresence>> = lock(&self.tables)
            .presences
            .values()
            .filter(|presence| !presence.child && presence.agent_id != chat.sender)
            .cloned()
            .collect();
        for listener in listeners {
            let mut state = lock(&listener.state);
            if state.position.distance(chat.position) <= range {
                state.heard.push(chat.message.clone());
            }
        }
        self.journal.record(SceneEvent::Chat(chat));
    }

    fn attachments(&self) -> Option<&dyn AttachmentsModule> {
        self.with_attachments.then_some(self as &dyn AttachmentsModule)
    }

    fn avatar_factory(&self) -> Option<&dyn AvatarFactory> {
        self.with_avatar_factory.then_some(self as &dyn AvatarFactory)
    }
}

impl AttachmentsModule for LocalScene {
    fn delete_attachments_from_scene(&self, presence: &dyn ScenePresence, _silent: bool) {
        let agent_id = presence.agent_id();
        if let Some(local) = self.local_presence(agent_id) {
            lock(&local.state).worn.clear();
        }
        self.journal.record(SceneEvent::AttachmentsDeleted { agent_id });
    }

    fn rez_attachments(&self, presence: &dyn ScenePresence, appearance: &AvatarAppearance) {
        let agent_id = presence.agent_id();
        let items: Vec<Uuid> = appearance.attachments_to_rez().iter().map(|attachment| attachment.item_id).collect();
        if let Some(local) = self.local_presence(agent_id) {
            lock(&local.state).worn = items.clone();
        }
        self.journal.record(SceneEvent::AttachmentsRezzed { agent_id, items });
    }
}

impl AvatarFactory for LocalScene {
    fn set_appearance(&self, presence: &dyn ScenePresence, appearance: AvatarAppearance) {
        let agent_id = presence.agent_id();
        if let Some(local) = self.local_presence(agent_id) {
            lock(&local.state).appearance_serial = Some(appearance.serial);
        }
        self.journal.record(SceneEvent::AppearanceSet { agent_id, serial: appearance.serial });
    }
}
