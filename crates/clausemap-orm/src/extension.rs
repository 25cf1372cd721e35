//! Hooks into mapper loading and persistence.

use std::fmt;

use crate::instance::Instance;
use crate::loading::Row;
use crate::mapper::Mapper;

/// Callbacks run by a [`Mapper`]. Every method has a no-op default.
///
/// ```rust
/// use clausemap_orm::{Instance, Mapper, MapperExtension};
///
/// #[derive(Debug)]
/// struct Stamp;
///
/// impl MapperExtension for Stamp {
///     fn before_insert(&self, _mapper: &Mapper, instance: &Instance) {
///         instance.set("created_by", "system");
///     }
/// }
/// ```
pub trait MapperExtension: Send + Sync + fmt::Debug {
    /// Name used in mapper cache keys.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Builds the object for a new row; `None` falls back to a bare instance.
    fn create_instance(&self, mapper: &Mapper, row: &Row<'_>) -> Option<Instance> {
        let _ = (mapper, row);
        None
    }

    /// Called for each distinct object of a result. Returning `false`
    /// keeps it out of the returned list.
    fn append_result(&self, mapper: &Mapper, instance: &Instance, result: &mut Vec<Instance>) -> bool {
        let _ = (mapper, instance, result);
        true
    }

    /// Called before an object's INSERT.
    fn before_insert(&self, mapper: &Mapper, instance: &Instance) {
        let _ = (mapper, instance);
    }

    /// Called after an object's INSERT, once its key is known.
    fn after_insert(&self, mapper: &Mapper, instance: &Instance) {
        let _ = (mapper, instance);
    }

    /// Called before an object's DELETE.
    fn before_delete(&self, mapper: &Mapper, instance: &Instance) {
        let _ = (mapper, instance);
    }
}
