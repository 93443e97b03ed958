use crate::avatar::NpcAvatar;
use crate::permissions::NULL_OWNER;
use crate::presence::PresenceController;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

pub(crate) type AvatarTable = HashMap<Uuid, Arc<NpcAvatar>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpcSummary {
    pub agent_id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
}

/// Every live NPC keyed by agent id, behind one re-entrant lock.
///
/// Modules for several regions may share one registry. Check-then-act
/// sequences hold [`NpcRegistry::lock`] across their scene calls; a scene
/// callback on the same thread may re-enter the registry. Borrows of the
/// table must never span a scene call.
#[derive(Debug)]
pub struct NpcRegistry {
    avatars: ReentrantMutex<RefCell<AvatarTable>>,
}

impl Default for NpcRegistry {
    fn default() -> Self {
        Self { avatars: ReentrantMutex::new(RefCell::new(AvatarTable::new())) }
    }
}

impl NpcRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> ReentrantMutexGuard<'_, RefCell<AvatarTable>> {
        self.avatars.lock()
    }

    pub fn contains(&self, agent_id: Uuid) -> bool {
        self.lock().borrow().contains_key(&agent_id)
    }

    pub fn get(&self, agent_id: Uuid) -> Option<Arc<NpcAvatar>> {
        self.lock().borrow().get(&agent_id).cloned()
    }

    pub fn owner_of(&self, agent_id: Uuid) -> Uuid {
        self.get(agent_id).map_or(NULL_OWNER, |avatar| avatar.owner_id())
    }

    pub fn len(&self) -> usize {
        self.lock().borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().borrow().is_empty()
    }

    /// Summaries sorted by name, then id.
    pub fn summaries(&self) -> Vec<NpcSummary> {
        let avatars = self.lock();
        let mut out: Vec<NpcSummary> = avatars
            .borrow()
            .values()
            .map(|avatar| NpcSummary {
                agent_id: avatar.agent_id(),
                name: avatar.name(),
                owner_id: avatar.owner_id(),
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.agent_id.cmp(&b.agent_id)));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appearance::AvatarAppearance;
    use glam::Vec3;

    fn insert(registry: &NpcRegistry, first: &str, owner: Uuid) -> Uuid {
        let avatar = Arc::new(NpcAvatar::new(first, "Puppet", Vec3::ZERO, owner, false, &AvatarAppearance::default()));
        let id = avatar.agent_id();
        registry.lock().borrow_mut().insert(id, avatar);
        id
    }

    #[test]
    fn unknown_ids_resolve_to_nothing() {
        let registry = NpcRegistry::new();
        let id = Uuid::new_v4();
        assert!(!registry.contains(id));
        assert!(registry.get(id).is_none());
        assert_eq!(registry.owner_of(id), NULL_OWNER);
        assert!(registry.is_empty());
    }

    #[test]
    fn lookups_see_inserted_records() {
        let registry = NpcRegistry::new();
        let owner = Uuid::new_v4();
        let id = insert(&registry, "Alice", owner);
        assert!(registry.contains(id));
        assert_eq!(registry.owner_of(id), owner);
        assert_eq!(registry.get(id).map(|avatar| avatar.agent_id()), Some(id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn summaries_are_sorted_by_name() {
        let registry = NpcRegistry::new();
        insert(&registry, "Zed", NULL_OWNER);
        insert(&registry, "Amy", NULL_OWNER);
        let names: Vec<String> = registry.summaries().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Amy Puppet".to_string(), "Zed Puppet".to_string()]);
    }
}
