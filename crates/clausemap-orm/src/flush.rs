//! Writing a unit of work.
//!
//! A flush gathers the pending objects of a scope, follows relations to
//! pick up the objects they drag along, groups everything per class and
//! orders the classes so that referenced rows are written before the rows
//! pointing at them. Deletes run afterwards in the opposite order.
//!
//! Classes whose relations point back at themselves are additionally
//! ordered per object. Association tables of many-to-many relations are
//! written once both sides exist and cleared before either side goes.

use std::collections::HashSet;
use std::sync::Arc;

use clausemap_core::{
    and_, delete, insert, update, BindParam, ClauseNode, ColumnRef, Engine, Params, SqlValue, Table,
};
use indexmap::map::Entry;
use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info, warn};

use crate::error::{OrmError, Result};
use crate::instance::{ClassId, History, Instance};
use crate::mapper::Mapper;
use crate::property::{Direction, RelationState};
use crate::registry::Registry;
use crate::session::Session;

struct Task {
    mapper: Arc<Mapper>,
    saves: Vec<Instance>,
    deletes: Vec<Instance>,
}

type AssociationRow = (String, Vec<(String, SqlValue)>);

/// The writes of one flush, grouped per class in dependency order.
pub(crate) struct UowTransaction {
    tasks: Vec<Task>,
    saves: Vec<Instance>,
    deletes: Vec<Instance>,
}

impl UowTransaction {
    /// Collects the pending objects of the session's scope and everything
    /// their relations cascade to.
    pub(crate) fn new<E: Engine>(session: &mut Session<'_, E>) -> Result<Self> {
        let (new, dirty, deleted) = {
            let uow = session.scope().borrow();
            (uow.new_instances(), uow.dirty(), uow.deleted_instances())
        };
        let mut deletes: IndexSet<Instance> = deleted.into_iter().collect();
        let mut saves: IndexSet<Instance> = new
            .into_iter()
            .chain(dirty)
            .filter(|obj| !deletes.contains(obj))
            .collect();

        let (mut next_save, mut next_delete) = (0, 0);
        while next_save < saves.len() || next_delete < deletes.len() {
            while let Some(obj) = saves.get_index(next_save).cloned() {
                cascade_save(session.registry(), &obj, &mut saves, &mut deletes)?;
                next_save += 1;
            }
            while let Some(obj) = deletes.get_index(next_delete).cloned() {
                cascade_delete(session, &obj, &mut saves, &mut deletes)?;
                next_delete += 1;
            }
        }
        saves.retain(|obj| !deletes.contains(obj));

        let registry = session.registry();
        let mut by_class: IndexMap<ClassId, Task> = IndexMap::new();
        for obj in &saves {
            task_for(registry, &mut by_class, obj.class())?.saves.push(obj.clone());
        }
        for obj in deletes.iter().filter(|obj| obj.is_persistent()) {
            task_for(registry, &mut by_class, obj.class())?.deletes.push(obj.clone());
        }
        let tasks = sort_tasks(registry, by_class)?;

        Ok(Self {
            tasks,
            saves: saves.into_iter().collect(),
            deletes: deletes.into_iter().collect(),
        })
    }

    /// Runs every write in one transaction, then marks the objects clean.
    pub(crate) fn execute<E: Engine>(self, session: &mut Session<'_, E>) -> Result<()> {
        if self.saves.is_empty() && self.deletes.is_empty() {
            debug!("Nothing to flush");
            return Ok(());
        }
        info!(
            saves = self.saves.len(),
            deletes = self.deletes.len(),
            tasks = self.tasks.len(),
            "Flushing unit of work"
        );

        session.engine_mut().begin()?;
        if let Err(err) = self.write(session) {
            if let Err(rollback) = session.engine_mut().rollback() {
                warn!(error = %rollback, "Rollback after failed flush failed");
            }
            return Err(err);
        }
        session.engine_mut().commit()?;

        self.register(session)?;
        info!("Flush complete");
        Ok(())
    }

    fn write<E: Engine>(&self, session: &mut Session<'_, E>) -> Result<()> {
        let registry = session.registry();
        let mut associations = HashSet::new();

        for task in &self.tasks {
            if task.saves.is_empty() {
                continue;
            }
            debug!(class = %task.mapper.class(), objects = task.saves.len(), "Saving task");
            let mapper = &task.mapper;
            if has_self_reference(registry, mapper)? {
                for obj in object_order(registry, mapper, &task.saves, false)? {
                    sync_before(registry, mapper, &obj)?;
                    save_objects(session, mapper, std::slice::from_ref(&obj))?;
                    sync_after(registry, mapper, &obj)?;
                }
            } else {
                for obj in &task.saves {
                    sync_before(registry, mapper, obj)?;
                }
                save_objects(session, mapper, &task.saves)?;
                for obj in &task.saves {
                    sync_after(registry, mapper, obj)?;
                }
            }
        }

        for task in &self.tasks {
            for obj in &task.saves {
                write_associations(session, &task.mapper, obj, &mut associations)?;
            }
        }
        for task in &self.tasks {
            for obj in &task.deletes {
                clear_associations(session, &task.mapper, obj, &mut associations)?;
            }
        }

        for task in self.tasks.iter().rev() {
            if task.deletes.is_empty() {
                continue;
            }
            debug!(class = %task.mapper.class(), objects = task.deletes.len(), "Deleting task");
            let mapper = &task.mapper;
            let objects = if has_self_reference(registry, mapper)? {
                let mut order = object_order(registry, mapper, &task.deletes, true)?;
                order.reverse();
                order
            } else {
                task.deletes.clone()
            };
            delete_objects(session, mapper, &objects)?;
        }
        Ok(())
    }

    fn register<E: Engine>(&self, session: &Session<'_, E>) -> Result<()> {
        let registry = session.registry();
        let mut uow = session.scope().borrow_mut();
        for obj in &self.saves {
            obj.commit();
            let mapper = registry.class_mapper(obj.class())?;
            if let Some(key) = mapper.instance_key(obj) {
                obj.set_identity_key(Some(key.clone()));
                uow.register_clean(key, obj);
            }
        }
        for obj in &self.deletes {
            uow.register_removed(obj);
            obj.set_identity_key(None);
        }
        Ok(())
    }
}

fn task_for<'a>(registry: &Registry, tasks: &'a mut IndexMap<ClassId, Task>, class: ClassId) -> Result<&'a mut Task> {
    Ok(match tasks.entry(class) {
        Entry::Occupied(entry) => entry.into_mut(),
        Entry::Vacant(entry) => entry.insert(Task {
            mapper: registry.class_mapper(class)?,
            saves: Vec::new(),
            deletes: Vec::new(),
        }),
    })
}

fn cascade_save(
    registry: &Registry,
    obj: &Instance,
    saves: &mut IndexSet<Instance>,
    deletes: &mut IndexSet<Instance>,
) -> Result<()> {
    let mapper = registry.class_mapper(obj.class())?;
    for (key, relation) in mapper.relations() {
        let state = relation.state(key, &mapper, registry)?;
        let History { added, deleted, .. } = obj.history(key);
        for child in added {
            if !deletes.contains(&child) {
                saves.insert(child);
            }
        }
        for child in deleted {
            if deletes.contains(&child) {
                continue;
            }
            match state.direction {
                Direction::Right if state.private => {
                    if child.is_persistent() {
                        deletes.insert(child);
                    }
                }
                Direction::Right => {
                    detach(state, &child);
                    saves.insert(child);
                }
                Direction::Left if state.private => {
                    if child.is_persistent() {
                        deletes.insert(child);
                    }
                }
                Direction::Left | Direction::Center => {}
            }
        }
    }
    Ok(())
}

fn cascade_delete<E: Engine>(
    session: &mut Session<'_, E>,
    obj: &Instance,
    saves: &mut IndexSet<Instance>,
    deletes: &mut IndexSet<Instance>,
) -> Result<()> {
    let registry = session.registry();
    let mapper = registry.class_mapper(obj.class())?;
    for (key, relation) in mapper.relations() {
        let state = relation.state(key, &mapper, registry)?;
        match state.direction {
            Direction::Right => {
                let mut children = session.related(obj, key)?.into_vec();
                for child in obj.committed_related(key) {
                    if !children.contains(&child) {
                        children.push(child);
                    }
                }
                for child in children {
                    if deletes.contains(&child) {
                        continue;
                    }
                    if state.private {
                        if child.is_persistent() {
                            deletes.insert(child);
                        }
                    } else {
                        detach(state, &child);
                        saves.insert(child);
                    }
                }
            }
            // Loaded so the association rows can be cleared.
            Direction::Center => {
                session.related(obj, key)?;
            }
            Direction::Left if state.private => {
                for target in session.related(obj, key)?.into_vec() {
                    if target.is_persistent() {
                        deletes.insert(target);
                    }
                }
            }
            Direction::Left => {}
        }
    }
    Ok(())
}

// Nulls the foreign key of a child removed from its parent.
fn detach(state: &RelationState, child: &Instance) {
    for pair in &state.primary_sync {
        state.target.set_column_value(child, &pair.dest, SqlValue::Null);
    }
}

fn isa(mapper: &Mapper, class: ClassId) -> bool {
    mapper.class() == class || mapper.inherits().is_some_and(|parent| isa(parent, class))
}

fn sort_tasks(registry: &Registry, tasks: IndexMap<ClassId, Task>) -> Result<Vec<Task>> {
    let mut edges = Vec::new();
    for (i, task) in tasks.values().enumerate() {
        for (key, relation) in task.mapper.relations() {
            let state = relation.state(key, &task.mapper, registry)?;
            if state.secondary.is_some() {
                continue;
            }
            let target = state.target.class();
            for (j, other) in tasks.values().enumerate() {
                if i == j || !isa(&other.mapper, target) {
                    continue;
                }
                let edge = match state.direction {
                    Direction::Right => (i, j),
                    Direction::Left | Direction::Center => (j, i),
                };
                if !edges.contains(&edge) {
                    edges.push(edge);
                }
            }
        }
    }
    let order = topological(tasks.len(), &edges).ok_or_else(|| {
        let classes: Vec<&str> = tasks.keys().map(ClassId::name).collect();
        OrmError::config(format!("circular dependency between classes [{}]", classes.join(", ")))
    })?;
    let mut slots: Vec<Option<Task>> = tasks.into_values().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}

// Kahn's algorithm; ties go to the lowest index. `None` on a cycle.
fn topological(count: usize, edges: &[(usize, usize)]) -> Option<Vec<usize>> {
    let mut indegree = vec![0_usize; count];
    for &(_, to) in edges {
        indegree[to] += 1;
    }
    let mut done = vec![false; count];
    let mut order = Vec::with_capacity(count);
    while order.len() < count {
        let next = (0..count).find(|&i| !done[i] && indegree[i] == 0)?;
        done[next] = true;
        order.push(next);
        for &(from, to) in edges {
            if from == next {
                indegree[to] -= 1;
            }
        }
    }
    Some(order)
}

fn has_self_reference(registry: &Registry, mapper: &Mapper) -> Result<bool> {
    for (key, relation) in mapper.relations() {
        let state = relation.state(key, mapper, registry)?;
        if state.self_referential && state.secondary.is_none() {
            return Ok(true);
        }
    }
    Ok(false)
}

// Orders objects of one class so parents come before their children.
fn object_order(registry: &Registry, mapper: &Mapper, objects: &[Instance], committed: bool) -> Result<Vec<Instance>> {
    let mut edges = Vec::new();
    for (i, obj) in objects.iter().enumerate() {
        for (key, relation) in mapper.relations() {
            let state = relation.state(key, mapper, registry)?;
            if !state.self_referential || state.secondary.is_some() {
                continue;
            }
            let history = obj.history(key);
            let others = if committed {
                history.unchanged.into_iter().chain(history.deleted)
            } else {
                history.unchanged.into_iter().chain(history.added)
            };
            for other in others {
                let Some(j) = objects.iter().position(|o| *o == other) else {
                    continue;
                };
                if i == j {
                    continue;
                }
                let edge = match state.direction {
                    Direction::Right => (i, j),
                    Direction::Left | Direction::Center => (j, i),
                };
                if !edges.contains(&edge) {
                    edges.push(edge);
                }
            }
        }
    }
    let order = topological(objects.len(), &edges)
        .ok_or_else(|| OrmError::config(format!("circular dependency between {} objects", mapper.class())))?;
    Ok(order.into_iter().map(|i| objects[i].clone()).collect())
}

fn current_value(mapper: &Mapper, obj: &Instance, column: &ColumnRef) -> SqlValue {
    mapper.column_value(obj, column).unwrap_or(SqlValue::Null)
}

fn committed_value(mapper: &Mapper, obj: &Instance, column: &ColumnRef) -> SqlValue {
    mapper
        .committed_column_value(obj, column)
        .or_else(|| mapper.column_value(obj, column))
        .unwrap_or(SqlValue::Null)
}

fn is_unset(mapper: &Mapper, obj: &Instance, column: &ColumnRef) -> bool {
    mapper
        .column_value(obj, column)
        .filter(|value| !value.is_null())
        .is_none()
}

// Copies the keys of many-to-one targets into the object before it is written.
fn sync_before(registry: &Registry, mapper: &Mapper, obj: &Instance) -> Result<()> {
    for (key, relation) in mapper.relations() {
        let state = relation.state(key, mapper, registry)?;
        if state.direction != Direction::Left || obj.history(key).is_empty() {
            continue;
        }
        let target = obj.history(key).added.into_iter().next();
        for pair in &state.primary_sync {
            let value = target
                .as_ref()
                .map_or(SqlValue::Null, |t| current_value(&state.target, t, &pair.source));
            mapper.set_column_value(obj, &pair.dest, value);
        }
    }
    Ok(())
}

// Copies the object's keys into children added to its collections.
fn sync_after(registry: &Registry, mapper: &Mapper, obj: &Instance) -> Result<()> {
    for (key, relation) in mapper.relations() {
        let state = relation.state(key, mapper, registry)?;
        if state.direction != Direction::Right {
            continue;
        }
        for child in obj.history(key).added {
            for pair in &state.primary_sync {
                let value = current_value(mapper, obj, &pair.source);
                state.target.set_column_value(&child, &pair.dest, value);
            }
        }
    }
    Ok(())
}

fn check_rowcount<E: Engine>(session: &Session<'_, E>, table: &Table, expected: u64, actual: u64) -> Result<()> {
    if expected == actual || !session.engine().dialect().supports_sane_rowcount() {
        return Ok(());
    }
    warn!(table = %table.fullname(), expected, actual, "Row count mismatch");
    Err(OrmError::Concurrency {
        table: table.fullname(),
        expected,
        actual,
    })
}

fn pk_criteria(mapper: &Mapper, obj: &Instance, pk: &[ColumnRef], params: &mut Params) -> ClauseNode {
    and_(pk.iter().map(|column| {
        let label = column.label();
        params.insert(label.clone(), committed_value(mapper, obj, column));
        column.eq(BindParam::new(label).with_type(column.ty()))
    }))
}

fn save_objects<E: Engine>(session: &mut Session<'_, E>, mapper: &Mapper, objects: &[Instance]) -> Result<()> {
    let (inserts, updates): (Vec<&Instance>, Vec<&Instance>) = objects.iter().partition(|obj| !obj.is_persistent());
    for obj in &inserts {
        for ext in mapper.extensions() {
            ext.before_insert(mapper, obj);
        }
    }

    for table in mapper.tables() {
        let pk = mapper.table_primary_key(table).to_vec();
        let (mut expected, mut actual) = (0, 0);
        for obj in &updates {
            let mut params = Params::new();
            for column in table.columns() {
                let Some(key) = mapper.property_for_column(&column) else {
                    continue;
                };
                if obj.is_attribute_modified(key) {
                    params.insert(column.name().to_string(), obj.get(key).unwrap_or(SqlValue::Null));
                }
            }
            if params.is_empty() {
                continue;
            }
            let criteria = pk_criteria(mapper, obj, &pk, &mut params);
            let (result, _) = session.run(&update(table).where_(criteria).into(), &params)?;
            expected += 1;
            actual += result.rows_affected;
        }
        check_rowcount(session, table, expected, actual)?;

        for obj in &inserts {
            insert_row(session, mapper, table, &pk, obj)?;
        }
    }

    for obj in &inserts {
        for ext in mapper.extensions() {
            ext.after_insert(mapper, obj);
        }
    }
    Ok(())
}

fn insert_row<E: Engine>(
    session: &mut Session<'_, E>,
    mapper: &Mapper,
    table: &Table,
    pk: &[ColumnRef],
    obj: &Instance,
) -> Result<()> {
    for pair in mapper.inherit_sync() {
        if pair.dest.table() == Some(table) {
            let value = current_value(mapper, obj, &pair.source);
            mapper.set_column_value(obj, &pair.dest, value);
        }
    }
    if session.engine().dialect().supports_sequences() {
        for def in table.column_defs() {
            let (Some(sequence), Some(column)) = (&def.sequence, table.column(&def.name)) else {
                continue;
            };
            if is_unset(mapper, obj, &column) {
                if let Some(value) = session.engine_mut().next_sequence_value(sequence)? {
                    mapper.set_column_value(obj, &column, value);
                }
            }
        }
    }

    let mut params = Params::new();
    for column in table.columns() {
        if let Some(value) = mapper.column_value(obj, &column).filter(|v| !v.is_null()) {
            params.insert(column.name().to_string(), value);
        }
    }
    session.run(&insert(table).into(), &params)?;

    if pk.iter().any(|column| is_unset(mapper, obj, column)) {
        if let Some(ids) = session.engine().last_inserted_ids(table) {
            for (column, value) in pk.iter().zip(ids) {
                if is_unset(mapper, obj, column) {
                    mapper.set_column_value(obj, column, value);
                }
            }
        }
    }
    Ok(())
}

fn delete_objects<E: Engine>(session: &mut Session<'_, E>, mapper: &Mapper, objects: &[Instance]) -> Result<()> {
    for obj in objects {
        for ext in mapper.extensions() {
            ext.before_delete(mapper, obj);
        }
    }
    for table in mapper.tables().iter().rev() {
        let pk = mapper.table_primary_key(table).to_vec();
        let (mut expected, mut actual) = (0, 0);
        for obj in objects {
            let mut params = Params::new();
            let criteria = pk_criteria(mapper, obj, &pk, &mut params);
            let (result, _) = session.run(&delete(table).where_(criteria).into(), &params)?;
            expected += 1;
            actual += result.rows_affected;
        }
        check_rowcount(session, table, expected, actual)?;
    }
    Ok(())
}

// Column values of one association row, named after the secondary's columns.
fn association_row(mapper: &Mapper, state: &RelationState, obj: &Instance, child: &Instance) -> Vec<(ColumnRef, SqlValue)> {
    let parent = state
        .primary_sync
        .iter()
        .map(|pair| (pair.dest.clone(), committed_value(mapper, obj, &pair.source)));
    let target = state
        .secondary_sync
        .iter()
        .map(|pair| (pair.dest.clone(), committed_value(&state.target, child, &pair.source)));
    parent.chain(target).collect()
}

fn row_key(secondary: &Table, row: &[(ColumnRef, SqlValue)]) -> AssociationRow {
    let mut values: Vec<(String, SqlValue)> = row
        .iter()
        .map(|(column, value)| (column.name().to_string(), value.clone()))
        .collect();
    values.sort_by(|a, b| a.0.cmp(&b.0));
    (secondary.fullname(), values)
}

fn insert_association<E: Engine>(
    session: &mut Session<'_, E>,
    secondary: &Table,
    row: &[(ColumnRef, SqlValue)],
) -> Result<()> {
    let params: Params = row
        .iter()
        .map(|(column, value)| (column.name().to_string(), value.clone()))
        .collect();
    session.run(&insert(secondary).into(), &params)?;
    Ok(())
}

fn delete_association<E: Engine>(
    session: &mut Session<'_, E>,
    secondary: &Table,
    row: &[(ColumnRef, SqlValue)],
) -> Result<()> {
    let mut params = Params::new();
    let criteria = and_(row.iter().map(|(column, value)| {
        let label = column.label();
        params.insert(label.clone(), value.clone());
        column.eq(BindParam::new(label).with_type(column.ty()))
    }));
    session.run(&delete(secondary).where_(criteria).into(), &params)?;
    Ok(())
}

fn write_associations<E: Engine>(
    session: &mut Session<'_, E>,
    mapper: &Mapper,
    obj: &Instance,
    written: &mut HashSet<(bool, AssociationRow)>,
) -> Result<()> {
    let registry = session.registry();
    for (key, relation) in mapper.relations() {
        let state = relation.state(key, mapper, registry)?;
        let Some(secondary) = &state.secondary else {
            continue;
        };
        let history = obj.history(key);
        for child in &history.added {
            let row = association_row(mapper, state, obj, child);
            if written.insert((true, row_key(secondary, &row))) {
                insert_association(session, secondary, &row)?;
            }
        }
        for child in &history.deleted {
            let row = association_row(mapper, state, obj, child);
            if written.insert((false, row_key(secondary, &row))) {
                delete_association(session, secondary, &row)?;
            }
        }
    }
    Ok(())
}

fn clear_associations<E: Engine>(
    session: &mut Session<'_, E>,
    mapper: &Mapper,
    obj: &Instance,
    written: &mut HashSet<(bool, AssociationRow)>,
) -> Result<()> {
    let registry = session.registry();
    for (key, relation) in mapper.relations() {
        let state = relation.state(key, mapper, registry)?;
        let Some(secondary) = &state.secondary else {
            continue;
        };
        for child in obj.committed_related(key) {
            let row = association_row(mapper, state, obj, &child);
            if written.insert((false, row_key(secondary, &row))) {
                delete_association(session, secondary, &row)?;
            }
        }
    }
    Ok(())
}
