//! Mapped objects.
//!
//! An [`Instance`] is a shared handle to one object's attribute state. Every
//! attribute remembers its last committed value next to its current one, so
//! the unit of work can tell what changed without snapshotting objects.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::Arc;

use clausemap_core::{ClauseNode, FromSqlValue, Params, SqlValue, ToSqlValue};
use indexmap::IndexMap;

use crate::identity::IdentityKey;
use crate::mapper::Mapper;

/// Identifies a mapped class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(&'static str);

impl ClassId {
    /// Names a class.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// The class name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// The value of a relation attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Related {
    /// A scalar relation (many-to-one).
    One(Option<Instance>),
    /// A collection.
    Many(Vec<Instance>),
}

impl Related {
    pub(crate) const fn empty(uselist: bool) -> Self {
        if uselist {
            Self::Many(Vec::new())
        } else {
            Self::One(None)
        }
    }

    /// Every related instance.
    #[must_use]
    pub fn items(&self) -> Vec<Instance> {
        match self {
            Self::One(one) => one.iter().cloned().collect(),
            Self::Many(many) => many.clone(),
        }
    }

    /// The first related instance.
    #[must_use]
    pub fn first(&self) -> Option<Instance> {
        match self {
            Self::One(one) => one.clone(),
            Self::Many(many) => many.first().cloned(),
        }
    }

    /// Consumes the value into a list.
    #[must_use]
    pub fn into_vec(self) -> Vec<Instance> {
        match self {
            Self::One(one) => one.into_iter().collect(),
            Self::Many(many) => many,
        }
    }

    /// Number of related instances.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::One(one) => usize::from(one.is_some()),
            Self::Many(many) => many.len(),
        }
    }

    /// Whether nothing is related.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `instance` is related.
    #[must_use]
    pub fn contains(&self, instance: &Instance) -> bool {
        match self {
            Self::One(one) => one.as_ref() == Some(instance),
            Self::Many(many) => many.contains(instance),
        }
    }
}

/// Changes to a relation since it was loaded or last flushed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    /// Related now, not before.
    pub added: Vec<Instance>,
    /// Related before, not now.
    pub deleted: Vec<Instance>,
    /// Related before and now.
    pub unchanged: Vec<Instance>,
}

impl History {
    fn between(committed: &Related, current: &Related) -> Self {
        let mut history = Self::default();
        for item in current.items() {
            if committed.contains(&item) {
                history.unchanged.push(item);
            } else {
                history.added.push(item);
            }
        }
        history.deleted = committed
            .items()
            .into_iter()
            .filter(|item| !current.contains(item))
            .collect();
        history
    }

    /// Whether nothing was added or removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty()
    }
}

/// A relation that loads on first access.
#[derive(Clone)]
pub(crate) struct DeferredLoad {
    pub(crate) target: Arc<Mapper>,
    pub(crate) clause: ClauseNode,
    pub(crate) params: Params,
    pub(crate) uselist: bool,
}

/// State of a relation attribute.
#[derive(Clone)]
pub(crate) enum RelatedState {
    Missing,
    Deferred(DeferredLoad),
    Loaded(Related),
}

enum Attribute {
    Scalar {
        value: SqlValue,
        committed: Option<SqlValue>,
    },
    Related {
        value: Related,
        committed: Related,
    },
    Deferred(DeferredLoad),
}

impl Attribute {
    fn is_modified(&self) -> bool {
        match self {
            Self::Scalar { value, committed } => committed.as_ref() != Some(value),
            Self::Related { value, committed } => !History::between(committed, value).is_empty(),
            Self::Deferred(_) => false,
        }
    }
}

struct InstanceState {
    class: ClassId,
    key: Option<IdentityKey>,
    attrs: IndexMap<String, Attribute>,
}

/// A shared handle to a mapped object.
///
/// Clones point at the same object; equality and hashing are by identity.
#[derive(Clone)]
pub struct Instance(Rc<RefCell<InstanceState>>);

impl Instance {
    /// A new, untracked object of `class`.
    #[must_use]
    pub fn new(class: ClassId) -> Self {
        Self(Rc::new(RefCell::new(InstanceState {
            class,
            key: None,
            attrs: IndexMap::new(),
        })))
    }

    /// The mapped class.
    #[must_use]
    pub fn class(&self) -> ClassId {
        self.0.borrow().class
    }

    /// The identity key, once the object is persistent.
    #[must_use]
    pub fn identity_key(&self) -> Option<IdentityKey> {
        self.0.borrow().key.clone()
    }

    /// Whether the object has a row in the database.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.0.borrow().key.is_some()
    }

    /// Current value of a column attribute.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<SqlValue> {
        match self.0.borrow().attrs.get(key) {
            Some(Attribute::Scalar { value, .. }) => Some(value.clone()),
            _ => None,
        }
    }

    /// Current value of a column attribute, converted.
    #[must_use]
    pub fn get_as<T: FromSqlValue>(&self, key: &str) -> Option<T> {
        self.get(key).as_ref().and_then(T::from_sql_value)
    }

    /// Sets a column attribute. The change is picked up by the next flush.
    pub fn set(&self, key: &str, value: impl ToSqlValue) {
        let value = value.to_sql_value();
        let mut state = self.0.borrow_mut();
        match state.attrs.get_mut(key) {
            Some(Attribute::Scalar { value: current, .. }) => *current = value,
            _ => {
                state.attrs.insert(
                    key.to_string(),
                    Attribute::Scalar {
                        value,
                        committed: None,
                    },
                );
            }
        }
    }

    /// Last committed value of a column attribute.
    #[must_use]
    pub fn committed(&self, key: &str) -> Option<SqlValue> {
        match self.0.borrow().attrs.get(key) {
            Some(Attribute::Scalar { committed, .. }) => committed.clone(),
            _ => None,
        }
    }

    /// Whether any attribute changed since load or the last flush.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.0.borrow().attrs.values().any(Attribute::is_modified)
    }

    /// Whether the column attribute `key` changed.
    #[must_use]
    pub fn is_attribute_modified(&self, key: &str) -> bool {
        self.0
            .borrow()
            .attrs
            .get(key)
            .is_some_and(Attribute::is_modified)
    }

    /// Changes to the relation `key`. Unloaded relations have none.
    #[must_use]
    pub fn history(&self, key: &str) -> History {
        match self.0.borrow().attrs.get(key) {
            Some(Attribute::Related { value, committed }) => History::between(committed, value),
            _ => History::default(),
        }
    }

    /// Attribute names in assignment order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().attrs.keys().cloned().collect()
    }

    pub(crate) fn set_identity_key(&self, key: Option<IdentityKey>) {
        self.0.borrow_mut().key = key;
    }

    pub(crate) fn set_committed(&self, key: &str, value: SqlValue) {
        self.0.borrow_mut().attrs.insert(
            key.to_string(),
            Attribute::Scalar {
                committed: Some(value.clone()),
                value,
            },
        );
    }

    pub(crate) fn related_state(&self, key: &str) -> RelatedState {
        match self.0.borrow().attrs.get(key) {
            Some(Attribute::Related { value, .. }) => RelatedState::Loaded(value.clone()),
            Some(Attribute::Deferred(load)) => RelatedState::Deferred(load.clone()),
            _ => RelatedState::Missing,
        }
    }

    /// Committed value of a relation; empty when unloaded.
    pub(crate) fn committed_related(&self, key: &str) -> Vec<Instance> {
        match self.0.borrow().attrs.get(key) {
            Some(Attribute::Related { committed, .. }) => committed.items(),
            _ => Vec::new(),
        }
    }

    pub(crate) fn set_related_committed(&self, key: &str, related: Related) {
        self.0.borrow_mut().attrs.insert(
            key.to_string(),
            Attribute::Related {
                committed: related.clone(),
                value: related,
            },
        );
    }

    /// Replaces the current value, keeping what was committed.
    pub(crate) fn set_related(&self, key: &str, related: Related) {
        let mut state = self.0.borrow_mut();
        let committed = match state.attrs.shift_remove(key) {
            Some(Attribute::Related { committed, .. }) => committed,
            _ => Related::empty(matches!(related, Related::Many(_))),
        };
        state.attrs.insert(
            key.to_string(),
            Attribute::Related {
                value: related,
                committed,
            },
        );
    }

    /// Adds `child` to a loaded collection as already committed.
    pub(crate) fn append_committed(&self, key: &str, child: &Self) {
        let mut state = self.0.borrow_mut();
        match state.attrs.get_mut(key) {
            Some(Attribute::Related {
                value: Related::Many(items),
                committed: Related::Many(committed),
            }) => {
                if !items.contains(child) {
                    items.push(child.clone());
                }
                if !committed.contains(child) {
                    committed.push(child.clone());
                }
            }
            Some(Attribute::Related { value, committed }) => {
                *value = Related::One(Some(child.clone()));
                *committed = Related::One(Some(child.clone()));
            }
            _ => {
                let related = Related::Many(vec![child.clone()]);
                state.attrs.insert(
                    key.to_string(),
                    Attribute::Related {
                        committed: related.clone(),
                        value: related,
                    },
                );
            }
        }
    }

    pub(crate) fn set_deferred(&self, key: &str, load: DeferredLoad) {
        self.0
            .borrow_mut()
            .attrs
            .insert(key.to_string(), Attribute::Deferred(load));
    }

    /// Marks every current value as committed.
    pub(crate) fn commit(&self) {
        for attr in self.0.borrow_mut().attrs.values_mut() {
            match attr {
                Attribute::Scalar { value, committed } => *committed = Some(value.clone()),
                Attribute::Related { value, committed } => *committed = value.clone(),
                Attribute::Deferred(_) => {}
            }
        }
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Instance {}

impl Hash for Instance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Rc::as_ptr(&self.0), state);
    }
}

// Relations are left out; they may point back at this object.
impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok(state) = self.0.try_borrow() else {
            return f.write_str("Instance(<borrowed>)");
        };
        let mut out = f.debug_struct(state.class.name());
        for (name, attr) in &state.attrs {
            if let Attribute::Scalar { value, .. } = attr {
                out.field(name, value);
            }
        }
        out.finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: ClassId = ClassId::new("User");

    #[test]
    fn test_new_attributes_are_modified() {
        let user = Instance::new(USER);
        assert!(!user.is_modified());
        user.set("user_name", "jack");
        assert!(user.is_modified());
        assert_eq!(user.get("user_name"), Some(SqlValue::Text("jack".into())));
        assert_eq!(user.committed("user_name"), None);
    }

    #[test]
    fn test_commit_clears_changes() {
        let user = Instance::new(USER);
        user.set_committed("user_name", SqlValue::Text("jack".into()));
        assert!(!user.is_modified());
        user.set("user_name", "ed");
        assert!(user.is_attribute_modified("user_name"));
        user.commit();
        assert!(!user.is_modified());
        assert_eq!(user.get_as::<String>("user_name").as_deref(), Some("ed"));
    }

    #[test]
    fn test_setting_same_value_is_not_a_change() {
        let user = Instance::new(USER);
        user.set_committed("user_id", SqlValue::Int(7));
        user.set("user_id", 7_i64);
        assert!(!user.is_modified());
    }

    #[test]
    fn test_relation_history() {
        let user = Instance::new(USER);
        let a1 = Instance::new(ClassId::new("Address"));
        let a2 = Instance::new(ClassId::new("Address"));
        user.set_related_committed("addresses", Related::Many(vec![a1.clone()]));
        user.set_related("addresses", Related::Many(vec![a2.clone()]));

        let history = user.history("addresses");
        assert_eq!(history.added, vec![a2]);
        assert_eq!(history.deleted, vec![a1]);
        assert!(history.unchanged.is_empty());
        assert!(user.is_modified());
    }

    #[test]
    fn test_identity_equality() {
        let a = Instance::new(USER);
        let b = Instance::new(USER);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
