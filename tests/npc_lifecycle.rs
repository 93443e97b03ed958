use glam::Vec3;
use kestrel_npc::appearance::{AvatarAttachment, AvatarAppearance};
use kestrel_npc::local_scene::{LocalScene, SceneEvent};
use kestrel_npc::presence::{PresenceController, PresenceType};
use kestrel_npc::{NpcConfig, NpcModule, NpcRegistry, NULL_OWNER};
use std::sync::Arc;
use uuid::Uuid;

fn module_with(config: NpcConfig) -> (Arc<LocalScene>, NpcModule) {
    let scene = Arc::new(LocalScene::new("Lifecycle Region"));
    let module = NpcModule::new(Arc::new(NpcRegistry::new()), scene.clone(), config);
    (scene, module)
}

fn spawn(module: &NpcModule, owner: Uuid) -> Uuid {
    module
        .create_npc("Alice", "Puppet", Vec3::new(128.0, 128.0, 22.0), owner, false, &AvatarAppearance::default())
        .expect("npc created")
}

#[test]
fn never_created_ids_are_not_npcs() {
    let (_scene, module) = module_with(NpcConfig::enabled());
    let id = Uuid::new_v4();
    assert!(!module.is_npc(id));
    assert!(module.get_npc(id).is_none());
    assert_eq!(module.get_owner(id), NULL_OWNER);
    assert!(!module.check_permissions(id, NULL_OWNER));
}

#[test]
fn created_npc_is_registered_with_its_owner() {
    let (scene, module) = module_with(NpcConfig::enabled());
    let owner = Uuid::new_v4();
    let id = spawn(&module, owner);

    assert!(module.is_npc(id));
    assert_eq!(module.get_owner(id), owner);
    assert_eq!(module.npc_count(), 1);
    assert_eq!(scene.presence_kind(id), Some(PresenceType::Npc));
    assert!(scene.has_circuit_for(id));

    let state = scene.presence_state(id).expect("npc presence");
    assert!(state.movement_complete);
    assert_eq!(state.position, Vec3::new(128.0, 128.0, 22.0));

    let avatar = module.get_npc(id).expect("npc record");
    assert_eq!(avatar.name(), "Alice Puppet");
    assert_eq!(avatar.owner_id(), owner);
}

#[test]
fn create_registers_circuit_then_client_then_completes_movement() {
    let (scene, module) = module_with(NpcConfig::enabled());
    let id = spawn(&module, NULL_OWNER);
    let circuit_code = module.get_npc(id).expect("npc record").circuit_code();

    let events = scene.events();
    assert_eq!(
        events,
        vec![
            SceneEvent::CircuitAdded { circuit_code, agent_id: id },
            SceneEvent::ClientAdded { agent_id: id, kind: PresenceType::Npc },
            SceneEvent::MovementCompleted { agent_id: id },
        ]
    );
}

#[test]
fn delete_removes_presence_and_entry_once() {
    let (scene, module) = module_with(NpcConfig::enabled());
    let id = spawn(&module, NULL_OWNER);

    assert!(module.delete_npc(id));
    assert!(!module.is_npc(id));
    assert!(module.get_npc(id).is_none());
    assert!(scene.presence_state(id).is_none());
    assert!(!scene.has_circuit_for(id));

    assert!(!module.delete_npc(id));
}

#[test]
fn delete_of_unknown_id_leaves_scene_untouched() {
    let (scene, module) = module_with(NpcConfig::enabled());
    assert!(!module.delete_npc(Uuid::new_v4()));
    assert_eq!(scene.call_count(), 0);
}

#[test]
fn failed_materialisation_returns_none_and_leaves_circuit_behind() {
    let (scene, module) = module_with(NpcConfig::enabled());
    scene.drop_next_client();

    let created = module.create_npc("Ghost", "Puppet", Vec3::ZERO, NULL_OWNER, false, &AvatarAppearance::default());

    assert!(created.is_none());
    assert_eq!(module.npc_count(), 0);
    assert_eq!(scene.presence_count(), 0);
    // The circuit registered before the client was added is not rolled back.
    assert_eq!(scene.circuit_count(), 1);
}

#[test]
fn failed_materialisation_rolls_back_circuit_when_configured() {
    let config = NpcConfig { rollback_circuit_on_create_failure: true, ..NpcConfig::enabled() };
    let (scene, module) = module_with(config);
    scene.drop_next_client();

    let created = module.create_npc("Ghost", "Puppet", Vec3::ZERO, NULL_OWNER, false, &AvatarAppearance::default());

    assert!(created.is_none());
    assert_eq!(scene.circuit_count(), 0);
    assert!(matches!(scene.events().last(), Some(SceneEvent::CircuitRemoved { .. })));
}

#[test]
fn rejected_client_is_reported_as_failure() {
    let (scene, module) = module_with(NpcConfig::enabled());
    scene.reject_next_client();

    let err = module
        .try_create_npc("Refused", "Puppet", Vec3::ZERO, NULL_OWNER, false, &AvatarAppearance::default())
        .unwrap_err();

    assert!(err.to_string().contains("add_new_client"));
    assert!(!err.is_expected());
    assert_eq!(module.npc_count(), 0);
}

#[test]
fn connected_users_are_not_npcs() {
    let (scene, module) = module_with(NpcConfig::enabled());
    let user = scene.connect_client("Real", "Resident", Vec3::ZERO);
    assert!(!module.is_npc(user));
    assert!(!module.delete_npc(user));
    assert!(scene.presence_state(user).is_some());
}

#[test]
fn child_presence_of_a_registered_npc_is_not_an_npc() {
    let scene_a = Arc::new(LocalScene::new("Region A"));
    let scene_b = Arc::new(LocalScene::new("Region B"));
    let registry = Arc::new(NpcRegistry::new());
    let module_a = NpcModule::new(registry.clone(), scene_a.clone(), NpcConfig::enabled());
    let module_b = NpcModule::new(registry, scene_b.clone(), NpcConfig::enabled());

    let id = spawn(&module_a, NULL_OWNER);
    scene_b.add_child_presence(id, "Alice Puppet");

    assert!(module_a.is_npc(id));
    assert!(!module_b.is_npc(id));
    assert!(!module_b.move_to_target(id, Vec3::ONE, false, false));
    assert!(!module_b.set_npc_appearance(id, &AvatarAppearance { serial: 2, ..AvatarAppearance::default() }));
    assert!(!scene_b.events().iter().any(|event| matches!(
        event,
        SceneEvent::AttachmentsDeleted { .. } | SceneEvent::AppearanceSet { .. }
    )));
    assert_eq!(module_a.get_npc(id).expect("npc record").appearance().serial, 0);
}

#[test]
fn disabled_module_is_not_initialised() {
    let scene: Arc<LocalScene> = Arc::new(LocalScene::new("Quiet Region"));
    let registry = Arc::new(NpcRegistry::new());
    assert!(NpcModule::initialise(NpcConfig::default(), registry.clone(), scene.clone()).is_none());

    let module = NpcModule::initialise(NpcConfig::enabled(), registry, scene).expect("enabled module");
    assert_eq!(module.name(), "NPCModule");
}

#[test]
fn appearance_update_replaces_attachments_and_record() {
    let (scene, module) = module_with(NpcConfig::enabled());
    let id = spawn(&module, NULL_OWNER);
    let hat = Uuid::new_v4();
    let appearance = AvatarAppearance {
        serial: 7,
        attachments: vec![AvatarAttachment { attach_point: 2, item_id: hat, asset_id: Uuid::new_v4() }],
        ..AvatarAppearance::default()
    };

    assert!(module.set_npc_appearance(id, &appearance));

    let tail: Vec<SceneEvent> = scene.events().into_iter().rev().take(3).collect();
    assert_eq!(
        tail,
        vec![
            SceneEvent::AttachmentsRezzed { agent_id: id, items: vec![hat] },
            SceneEvent::AppearanceSet { agent_id: id, serial: 7 },
            SceneEvent::AttachmentsDeleted { agent_id: id },
        ]
    );
    let state = scene.presence_state(id).expect("npc presence");
    assert_eq!(state.appearance_serial, Some(7));
    assert_eq!(state.worn, vec![hat]);
    assert_eq!(module.get_npc(id).expect("npc record").appearance().serial, 7);
}

#[test]
fn appearance_update_needs_an_avatar_factory() {
    let scene = Arc::new(LocalScene::new("Bare Region").without_avatar_factory());
    let module = NpcModule::new(Arc::new(NpcRegistry::new()), scene.clone(), NpcConfig::enabled());
    let id = spawn(&module, NULL_OWNER);

    assert!(!module.set_npc_appearance(id, &AvatarAppearance { serial: 3, ..AvatarAppearance::default() }));
    assert_eq!(module.get_npc(id).expect("npc record").appearance().serial, 0);
}

#[test]
fn npcs_from_several_regions_share_one_registry() {
    let registry = Arc::new(NpcRegistry::new());
    let scene_a = Arc::new(LocalScene::new("Region A"));
    let scene_b = Arc::new(LocalScene::new("Region B"));
    let module_a = NpcModule::new(registry.clone(), scene_a, NpcConfig::enabled());
    let module_b = NpcModule::new(registry.clone(), scene_b, NpcConfig::enabled());

    let a = spawn(&module_a, NULL_OWNER);
    let b = spawn(&module_b, NULL_OWNER);

    assert_eq!(registry.len(), 2);
    assert!(module_a.is_npc(a));
    assert!(!module_a.is_npc(b));
    assert!(module_b.is_npc(b));
    let names: Vec<Uuid> = module_a.list_npcs().into_iter().map(|summary| summary.agent_id).collect();
    assert!(names.contains(&a) && names.contains(&b));
}

#[test]
fn appearance_update_without_attachments_module_still_applies() {
    let scene = Arc::new(LocalScene::new("Plain Region").without_attachments());
    let module = NpcModule::new(Arc::new(NpcRegistry::new()), scene.clone(), NpcConfig::enabled());
    let id = spawn(&module, NULL_OWNER);

    assert!(module.set_npc_appearance(id, &AvatarAppearance { serial: 4, ..AvatarAppearance::default() }));
    assert_eq!(scene.events().last(), Some(&SceneEvent::AppearanceSet { agent_id: id, serial: 4 }));
    assert!(!scene.events().iter().any(|event| matches!(event, SceneEvent::AttachmentsDeleted { .. })));
}
