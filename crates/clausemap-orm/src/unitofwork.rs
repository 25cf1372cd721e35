//! Pending changes within one scope.
//!
//! The [`UnitOfWork`] owns the identity map and the sets of new and deleted
//! objects. Dirty objects are found by asking tracked instances whether
//! they changed. Ordering the writes is the job of a flush, see
//! [`Session::flush`](crate::Session::flush).

use indexmap::IndexSet;

use crate::identity::{IdentityKey, IdentityMap};
use crate::instance::Instance;

/// Identity map plus new/deleted bookkeeping.
#[derive(Debug, Default)]
pub struct UnitOfWork {
    identity_map: IdentityMap,
    new: IndexSet<Instance>,
    deleted: IndexSet<Instance>,
}

impl UnitOfWork {
    /// The identity map.
    #[must_use]
    pub const fn identity_map(&self) -> &IdentityMap {
        &self.identity_map
    }

    /// The identity map, mutably.
    pub fn identity_map_mut(&mut self) -> &mut IdentityMap {
        &mut self.identity_map
    }

    /// Tracked instance for `key`.
    #[must_use]
    pub fn get(&self, key: &IdentityKey) -> Option<Instance> {
        self.identity_map.get(key)
    }

    /// Marks a transient object for INSERT.
    pub fn register_new(&mut self, instance: &Instance) {
        if !instance.is_persistent() {
            self.new.insert(instance.clone());
        }
    }

    /// Marks an object for DELETE.
    pub fn register_deleted(&mut self, instance: &Instance) {
        if self.new.shift_remove(instance) {
            return;
        }
        self.deleted.insert(instance.clone());
    }

    /// Records a persistent object after a load or flush.
    pub fn register_clean(&mut self, key: IdentityKey, instance: &Instance) {
        self.new.shift_remove(instance);
        self.identity_map.insert(key, instance.clone());
    }

    /// Forgets a deleted object after a flush.
    pub fn register_removed(&mut self, instance: &Instance) {
        self.deleted.shift_remove(instance);
        if let Some(key) = instance.identity_key() {
            self.identity_map.remove(&key);
        }
    }

    /// Stops tracking `instance` entirely.
    pub fn evict(&mut self, instance: &Instance) {
        self.new.shift_remove(instance);
        self.deleted.shift_remove(instance);
        if let Some(key) = instance.identity_key() {
            if self.identity_map.get(&key).as_ref() == Some(instance) {
                self.identity_map.remove(&key);
            }
        }
    }

    /// Whether `instance` awaits INSERT.
    #[must_use]
    pub fn is_new(&self, instance: &Instance) -> bool {
        self.new.contains(instance)
    }

    /// Whether `instance` awaits DELETE.
    #[must_use]
    pub fn is_deleted(&self, instance: &Instance) -> bool {
        self.deleted.contains(instance)
    }

    /// Objects awaiting INSERT, in registration order.
    #[must_use]
    pub fn new_instances(&self) -> Vec<Instance> {
        self.new.iter().cloned().collect()
    }

    /// Objects awaiting DELETE, in registration order.
    #[must_use]
    pub fn deleted_instances(&self) -> Vec<Instance> {
        self.deleted.iter().cloned().collect()
    }

    /// Persistent objects with unsaved changes.
    #[must_use]
    pub fn dirty(&self) -> Vec<Instance> {
        self.identity_map
            .instances()
            .filter(|instance| instance.is_modified() && !self.deleted.contains(*instance))
            .cloned()
            .collect()
    }

    /// Whether a flush would do anything.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.new.is_empty() || !self.deleted.is_empty() || !self.dirty().is_empty()
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.identity_map.clear();
        self.new.clear();
        self.deleted.clear();
    }
}

#[cfg(test)]
mod tests {
    use clausemap_core::SqlValue;

    use super::*;
    use crate::instance::ClassId;

    const USER: ClassId = ClassId::new("User");

    fn persistent(id: i64) -> (IdentityKey, Instance) {
        let key = IdentityKey::new(USER, "users", vec![SqlValue::Int(id)]);
        let user = Instance::new(USER);
        user.set_committed("user_id", SqlValue::Int(id));
        user.set_identity_key(Some(key.clone()));
        (key, user)
    }

    #[test]
    fn test_dirty_tracks_modified_instances() {
        let mut uow = UnitOfWork::default();
        let (key, user) = persistent(1);
        uow.register_clean(key, &user);
        assert!(uow.dirty().is_empty());
        user.set("user_name", "jack");
        assert_eq!(uow.dirty(), vec![user]);
    }

    #[test]
    fn test_deleting_new_object_cancels_insert() {
        let mut uow = UnitOfWork::default();
        let user = Instance::new(USER);
        uow.register_new(&user);
        assert!(uow.is_new(&user));
        uow.register_deleted(&user);
        assert!(!uow.is_new(&user));
        assert!(!uow.is_deleted(&user));
    }

    #[test]
    fn test_evict() {
        let mut uow = UnitOfWork::default();
        let (key, user) = persistent(2);
        uow.register_clean(key.clone(), &user);
        uow.register_deleted(&user);
        uow.evict(&user);
        assert!(uow.get(&key).is_none());
        assert!(!uow.has_changes());
    }
}
