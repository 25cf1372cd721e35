//! Relations between mappers.
//!
//! A relation is declared with [`relation`] and resolved against its target
//! mapper the first time it is used. Resolution infers the join condition
//! from foreign keys, decides which side depends on the other, and builds
//! the WHERE clause used by lazy loads.

use std::fmt;
use std::sync::{Arc, OnceLock};

use clausemap_core::{
    and_, asc, desc, BindParam, ClauseNode, ColumnRef, Join, Operator, OrderItem, Params, Select,
    SqlValue, Table,
};

use crate::error::{OrmError, Result};
use crate::instance::{ClassId, DeferredLoad, Instance, Related};
use crate::loading::{child_path, LoadContext, RowView, SetupContext, TableAdapter};
use crate::mapper::Mapper;
use crate::registry::Registry;

/// Which side of a relation holds the foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Many-to-one: the parent row references the target row.
    Left,
    /// One-to-many: target rows reference the parent row.
    Right,
    /// Many-to-many through a secondary table.
    Center,
}

/// How a relation is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadStrategy {
    /// On first access, with its own SELECT.
    #[default]
    Lazy,
    /// Joined into the parent's SELECT.
    Eager,
    /// Never loaded; the attribute starts empty.
    NoLoad,
}

/// The mapper a relation points at.
#[derive(Clone)]
pub enum RelationTarget {
    /// The primary mapper of a class, looked up when the relation is used.
    Class(ClassId),
    /// A specific mapper.
    Mapper(Arc<Mapper>),
}

impl RelationTarget {
    /// The target class.
    #[must_use]
    pub fn class(&self) -> ClassId {
        match self {
            Self::Class(class) => *class,
            Self::Mapper(mapper) => mapper.class(),
        }
    }

    fn resolve(&self, registry: &Registry) -> Result<Arc<Mapper>> {
        match self {
            Self::Class(class) => registry.class_mapper(*class),
            Self::Mapper(mapper) => Ok(Arc::clone(mapper)),
        }
    }
}

impl fmt::Debug for RelationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelationTarget({})", self.class())
    }
}

impl From<ClassId> for RelationTarget {
    fn from(class: ClassId) -> Self {
        Self::Class(class)
    }
}

impl From<Arc<Mapper>> for RelationTarget {
    fn from(mapper: Arc<Mapper>) -> Self {
        Self::Mapper(mapper)
    }
}

impl From<&Arc<Mapper>> for RelationTarget {
    fn from(mapper: &Arc<Mapper>) -> Self {
        Self::Mapper(Arc::clone(mapper))
    }
}

/// Declaration of a relation.
#[derive(Debug, Clone)]
pub struct RelationDef {
    target: RelationTarget,
    secondary: Option<Table>,
    primaryjoin: Option<ClauseNode>,
    secondaryjoin: Option<ClauseNode>,
    foreign_keys: Vec<ColumnRef>,
    remote_side: Option<ColumnRef>,
    uselist: Option<bool>,
    private: bool,
    strategy: LoadStrategy,
}

/// Declares a relation to `target`.
///
/// ```rust
/// use clausemap_orm::{relation, ClassId, LoadStrategy};
///
/// const ADDRESS: ClassId = ClassId::new("Address");
///
/// let def = relation(ADDRESS).eager().private();
/// assert_eq!(def.load_strategy(), LoadStrategy::Eager);
/// ```
#[must_use]
pub fn relation(target: impl Into<RelationTarget>) -> RelationDef {
    RelationDef {
        target: target.into(),
        secondary: None,
        primaryjoin: None,
        secondaryjoin: None,
        foreign_keys: Vec::new(),
        remote_side: None,
        uselist: None,
        private: false,
        strategy: LoadStrategy::Lazy,
    }
}

impl RelationDef {
    /// Association table for a many-to-many relation.
    #[must_use]
    pub fn secondary(mut self, table: &Table) -> Self {
        self.secondary = Some(table.clone());
        self
    }

    /// Join from the parent to the target, or to the secondary table.
    #[must_use]
    pub fn primaryjoin(mut self, clause: impl Into<ClauseNode>) -> Self {
        self.primaryjoin = Some(clause.into());
        self
    }

    /// Join from the secondary table to the target.
    #[must_use]
    pub fn secondaryjoin(mut self, clause: impl Into<ClauseNode>) -> Self {
        self.secondaryjoin = Some(clause.into());
        self
    }

    /// Names a dependent column of the join explicitly.
    #[must_use]
    pub fn foreign_key(mut self, column: ColumnRef) -> Self {
        self.foreign_keys.push(column);
        self
    }

    /// The join column on the target side. Required when a table is
    /// related to itself.
    #[must_use]
    pub fn remote_side(mut self, column: ColumnRef) -> Self {
        self.remote_side = Some(column);
        self
    }

    /// Whether the attribute holds a list.
    #[must_use]
    pub const fn uselist(mut self, uselist: bool) -> Self {
        self.uselist = Some(uselist);
        self
    }

    /// Children are deleted with their parent and when removed from it.
    #[must_use]
    pub const fn private(mut self) -> Self {
        self.private = true;
        self
    }

    /// Loads the relation with the parent's SELECT.
    #[must_use]
    pub const fn eager(self) -> Self {
        self.strategy(LoadStrategy::Eager)
    }

    /// Loads the relation on first access.
    #[must_use]
    pub const fn lazy(self) -> Self {
        self.strategy(LoadStrategy::Lazy)
    }

    /// Never loads the relation.
    #[must_use]
    pub const fn noload(self) -> Self {
        self.strategy(LoadStrategy::NoLoad)
    }

    /// Sets the load strategy.
    #[must_use]
    pub const fn strategy(mut self, strategy: LoadStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// The target.
    #[must_use]
    pub const fn target(&self) -> &RelationTarget {
        &self.target
    }

    /// The load strategy.
    #[must_use]
    pub const fn load_strategy(&self) -> LoadStrategy {
        self.strategy
    }

    /// Whether children are owned by the parent.
    #[must_use]
    pub const fn is_private(&self) -> bool {
        self.private
    }
}

/// A relation property of a mapper.
#[derive(Debug)]
pub struct Relation {
    def: RelationDef,
    state: OnceLock<RelationState>,
}

// A copy resolves again against its new parent.
impl Clone for Relation {
    fn clone(&self) -> Self {
        Self::new(self.def.clone())
    }
}

impl Relation {
    pub(crate) fn new(def: RelationDef) -> Self {
        Self {
            def,
            state: OnceLock::new(),
        }
    }

    /// The declaration.
    #[must_use]
    pub const fn def(&self) -> &RelationDef {
        &self.def
    }

    /// The load strategy.
    #[must_use]
    pub const fn strategy(&self) -> LoadStrategy {
        self.def.strategy
    }

    pub(crate) fn with_strategy(&self, strategy: LoadStrategy) -> Self {
        Self::new(self.def.clone().strategy(strategy))
    }

    /// Resolves the relation against `parent`, once.
    pub(crate) fn state(&self, key: &str, parent: &Mapper, registry: &Registry) -> Result<&RelationState> {
        if let Some(state) = self.state.get() {
            return Ok(state);
        }
        let state = RelationState::init(key, &self.def, parent, registry)?;
        tracing::debug!(
            class = %parent.class(),
            property = key,
            target = %state.target.class(),
            direction = ?state.direction,
            "Initialized relation"
        );
        Ok(self.state.get_or_init(|| state))
    }

    /// Adds the eager join for this relation to `stmt`.
    pub(crate) fn setup(
        &self,
        key: &str,
        parent: &Mapper,
        stmt: &mut Select,
        ctx: &mut SetupContext<'_>,
        parent_adapter: &TableAdapter,
        path: &str,
    ) -> Result<()> {
        if self.def.strategy != LoadStrategy::Eager {
            return Ok(());
        }
        let registry = ctx.registry;
        let state = self.state(key, parent, registry)?;
        let target = &state.target;
        // A cycle of eager relations falls back to lazy loading.
        if ctx.ancestors.contains(&target.class()) {
            return Ok(());
        }

        let mut adapter = TableAdapter::default();
        for table in target.tables() {
            adapter.push(table.clone(), ctx.alias(table));
        }
        let target_from = adapter.adapt(target.table());

        let from = std::mem::replace(&mut ctx.from, ClauseNode::Null);
        ctx.from = match (&state.secondary, &state.secondaryjoin) {
            (Some(secondary), Some(secondaryjoin)) => {
                let mut association = TableAdapter::default();
                association.push(secondary.clone(), ctx.alias(secondary));
                let on_secondary = parent_adapter.adapt(&association.adapt(&state.primaryjoin));
                let on_target = association.adapt(&adapter.adapt(secondaryjoin));
                let secondary_from = association.adapt(&ClauseNode::Table(secondary.clone()));
                Join::new(
                    Join::new(from, secondary_from, on_secondary, true),
                    target_from.clone(),
                    on_target,
                    true,
                )
                .into()
            }
            _ => {
                let on = parent_adapter.adapt(&adapter.adapt(&state.primaryjoin));
                Join::new(from, target_from.clone(), on, true).into()
            }
        };
        stmt.append_column(target_from);

        if !stmt.order_by_items().is_empty() {
            for item in target.default_order(registry) {
                stmt.append_order_by(adapt_order(&adapter, &item));
            }
        }

        let child = child_path(path, key);
        ctx.adapters.insert(child.clone(), adapter.clone());
        ctx.ancestors.push(target.class());
        let result = target.setup_eager(stmt, ctx, &adapter, &child);
        ctx.ancestors.pop();
        result
    }

    /// Populates the relation attribute of `instance` from `row`.
    pub(crate) fn execute(
        &self,
        key: &str,
        parent: &Mapper,
        instance: &Instance,
        view: RowView<'_, '_>,
        load: &mut LoadContext<'_>,
        first: bool,
    ) -> Result<()> {
        let state = self.state(key, parent, load.registry)?;
        let child = child_path(view.path, key);
        match self.def.strategy {
            LoadStrategy::NoLoad => {
                if first {
                    instance.set_related_committed(key, Related::empty(state.uselist));
                }
            }
            LoadStrategy::Eager if load.adapters.contains_key(&child) => {
                if first {
                    instance.set_related_committed(key, Related::empty(state.uselist));
                }
                let child_adapter = load.adapter(&child);
                let child_view = RowView {
                    row: view.row,
                    adapter: &child_adapter,
                    path: &child,
                };
                if let Some((item, _)) = state.target.instance(child_view, load)? {
                    instance.append_committed(key, &item);
                }
            }
            LoadStrategy::Lazy | LoadStrategy::Eager => {
                if first {
                    let params = state
                        .lazy_binds
                        .iter()
                        .map(|(name, column)| {
                            let value = view.get(column).unwrap_or(SqlValue::Null);
                            (name.clone(), value)
                        })
                        .collect();
                    state.defer(key, instance, params);
                }
            }
        }
        Ok(())
    }
}

/// A column copied from one side of a relation to the other on flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SyncPair {
    pub(crate) source: ColumnRef,
    pub(crate) dest: ColumnRef,
}

/// A relation resolved against its parent and target mappers.
#[derive(Debug)]
pub struct RelationState {
    pub(crate) target: Arc<Mapper>,
    pub(crate) direction: Direction,
    pub(crate) secondary: Option<Table>,
    pub(crate) primaryjoin: ClauseNode,
    pub(crate) secondaryjoin: Option<ClauseNode>,
    pub(crate) foreign_keys: Vec<ColumnRef>,
    pub(crate) uselist: bool,
    pub(crate) private: bool,
    pub(crate) self_referential: bool,
    pub(crate) lazy_clause: ClauseNode,
    pub(crate) lazy_binds: Vec<(String, ColumnRef)>,
    /// Parent (or target, for [`Direction::Left`]) to dependent side.
    pub(crate) primary_sync: Vec<SyncPair>,
    /// Target to secondary table.
    pub(crate) secondary_sync: Vec<SyncPair>,
}

impl RelationState {
    /// The target mapper.
    #[must_use]
    pub fn target(&self) -> &Arc<Mapper> {
        &self.target
    }

    /// Which side holds the foreign key.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Dependent columns of the join.
    #[must_use]
    pub fn foreign_keys(&self) -> &[ColumnRef] {
        &self.foreign_keys
    }

    /// Whether the attribute holds a list.
    #[must_use]
    pub const fn uselist(&self) -> bool {
        self.uselist
    }

    /// Join from the parent to the target or the secondary table.
    #[must_use]
    pub const fn primaryjoin(&self) -> &ClauseNode {
        &self.primaryjoin
    }

    /// Join from the secondary table to the target.
    #[must_use]
    pub const fn secondaryjoin(&self) -> Option<&ClauseNode> {
        self.secondaryjoin.as_ref()
    }

    /// The association table.
    #[must_use]
    pub const fn secondary(&self) -> Option<&Table> {
        self.secondary.as_ref()
    }

    /// The WHERE clause of a lazy load, with the parent's columns as binds.
    #[must_use]
    pub const fn lazy_clause(&self) -> &ClauseNode {
        &self.lazy_clause
    }

    /// The full join condition, secondary table included.
    pub(crate) fn join_clause(&self) -> ClauseNode {
        match &self.secondaryjoin {
            Some(secondaryjoin) => and_([self.primaryjoin.clone(), secondaryjoin.clone()]),
            None => self.primaryjoin.clone(),
        }
    }

    /// Bind values for a lazy load, read from the parent's attributes.
    pub(crate) fn lazy_params(&self, parent: &Mapper, instance: &Instance) -> Params {
        self.lazy_binds
            .iter()
            .map(|(name, column)| {
                let value = parent.column_value(instance, column).unwrap_or(SqlValue::Null);
                (name.clone(), value)
            })
            .collect()
    }

    /// Attaches a lazy load to `instance`, or an empty value when the
    /// parent's join columns are all null.
    pub(crate) fn defer(&self, key: &str, instance: &Instance, params: Params) {
        if params.values().all(SqlValue::is_null) {
            instance.set_related_committed(key, Related::empty(self.uselist));
        } else {
            instance.set_deferred(
                key,
                DeferredLoad {
                    target: Arc::clone(&self.target),
                    clause: self.lazy_clause.clone(),
                    params,
                    uselist: self.uselist,
                },
            );
        }
    }

    fn init(key: &str, def: &RelationDef, parent: &Mapper, registry: &Registry) -> Result<Self> {
        let target = def.target.resolve(registry)?;
        let parent_tables = parent.tables();
        let target_tables = target.tables();
        let self_referential = parent_tables.iter().any(|t| target_tables.contains(t));
        if self_referential && def.strategy == LoadStrategy::Eager {
            return Err(OrmError::config(format!(
                "relation '{key}' on {} joins a table to itself and cannot be eager loaded",
                parent.class()
            )));
        }

        let (primaryjoin, secondaryjoin) = match &def.secondary {
            Some(secondary) => {
                let secondary_tables = std::slice::from_ref(secondary);
                let primaryjoin = match &def.primaryjoin {
                    Some(clause) => clause.clone(),
                    None => match_primaries(key, parent_tables, secondary_tables)?,
                };
                let secondaryjoin = match &def.secondaryjoin {
                    Some(clause) => clause.clone(),
                    None => match_primaries(key, target_tables, secondary_tables)?,
                };
                (primaryjoin, Some(secondaryjoin))
            }
            None => match &def.primaryjoin {
                Some(clause) => (clause.clone(), None),
                None => (match_primaries(key, parent_tables, target_tables)?, None),
            },
        };

        let mut primary_sync: Vec<SyncPair> = equalities(&primaryjoin)
            .into_iter()
            .filter_map(|(l, r)| dependent_pair(l, r, &def.foreign_keys))
            .collect();
        let secondary_sync: Vec<SyncPair> = secondaryjoin
            .as_ref()
            .map(|clause| {
                equalities(clause)
                    .into_iter()
                    .filter_map(|(l, r)| dependent_pair(l, r, &def.foreign_keys))
                    .collect()
            })
            .unwrap_or_default();

        let remote = if self_referential && def.secondary.is_none() {
            Some(def.remote_side.clone().ok_or_else(|| {
                OrmError::config(format!(
                    "relation '{key}' on {} joins a table to itself; set remote_side",
                    parent.class()
                ))
            })?)
        } else {
            None
        };

        let direction = if def.secondary.is_some() {
            Direction::Center
        } else if let Some(remote) = &remote {
            if remote.is_primary_key() {
                Direction::Left
            } else {
                Direction::Right
            }
        } else {
            let dependents: Vec<&ColumnRef> = if def.foreign_keys.is_empty() {
                primary_sync.iter().map(|pair| &pair.dest).collect()
            } else {
                def.foreign_keys.iter().collect()
            };
            if !dependents.is_empty() && dependents.iter().all(|c| owned_by(c, target_tables)) {
                Direction::Right
            } else if !dependents.is_empty() && dependents.iter().all(|c| owned_by(c, parent_tables)) {
                Direction::Left
            } else {
                return Err(OrmError::config(format!(
                    "relation '{key}' on {}: cannot tell which side holds the foreign key",
                    parent.class()
                )));
            }
        };
        if primary_sync.is_empty() {
            return Err(OrmError::config(format!(
                "relation '{key}' on {}: join condition has no column equalities",
                parent.class()
            )));
        }

        let secondary = def.secondary.clone();
        let is_parent_side = |column: &ColumnRef| match (&secondary, &remote) {
            (Some(secondary), _) => !owned_by(column, std::slice::from_ref(secondary)),
            (None, Some(remote)) => !column.same_origin(remote),
            (None, None) => owned_by(column, parent_tables),
        };

        // Sync pairs always read from the independent side.
        if direction == Direction::Left {
            for pair in &mut primary_sync {
                if !is_parent_side(&pair.dest) {
                    std::mem::swap(&mut pair.source, &mut pair.dest);
                }
            }
        }

        let mut lazy_binds: Vec<(String, ColumnRef)> = Vec::new();
        let lazy = primaryjoin.replace(&mut |node| {
            let ClauseNode::Binary(binary) = node else {
                return None;
            };
            if binary.op() != Operator::Eq {
                return None;
            }
            let (ClauseNode::Column(left), ClauseNode::Column(right)) = (binary.left(), binary.right()) else {
                return None;
            };
            let (local, other) = if is_parent_side(left) {
                (left, right)
            } else if is_parent_side(right) {
                (right, left)
            } else {
                return None;
            };
            let bind = BindParam::new(local.label())
                .with_type(local.ty())
                .with_shortname(local.name());
            if !lazy_binds.iter().any(|(name, _)| name == bind.key()) {
                lazy_binds.push((bind.key().to_string(), local.clone()));
            }
            Some(other.eq(bind))
        });
        let lazy_clause = match &secondaryjoin {
            Some(secondaryjoin) => and_([lazy, secondaryjoin.clone()]),
            None => lazy,
        };

        let foreign_keys = primary_sync
            .iter()
            .chain(&secondary_sync)
            .map(|pair| pair.dest.clone())
            .collect();

        Ok(Self {
            target,
            direction,
            secondary,
            primaryjoin,
            secondaryjoin,
            foreign_keys,
            uselist: def.uselist.unwrap_or(direction != Direction::Left),
            private: def.private,
            self_referential,
            lazy_clause,
            lazy_binds,
            primary_sync,
            secondary_sync,
        })
    }
}

fn adapt_order(adapter: &TableAdapter, item: &OrderItem) -> OrderItem {
    let expr = adapter.adapt(item.expr());
    if item.is_descending() {
        desc(expr)
    } else {
        asc(expr)
    }
}

pub(crate) fn table_matches(fullname: &str, reference: &str) -> bool {
    fullname == reference || fullname.rsplit('.').next() == Some(reference)
}

pub(crate) fn owned_by(column: &ColumnRef, tables: &[Table]) -> bool {
    tables.iter().any(|t| t.fullname() == column.origin().table)
}

// The single foreign key pair joining the two table sets, as `referenced = fk`.
fn match_primaries(key: &str, left: &[Table], right: &[Table]) -> Result<ClauseNode> {
    let mut pairs: Vec<(ColumnRef, ColumnRef)> = Vec::new();
    for (from, to) in [(left, right), (right, left)] {
        for table in from {
            for fk in table.foreign_keys() {
                for other in to.iter().filter(|t| table_matches(&t.fullname(), &fk.ref_table)) {
                    if let (Some(fk_col), Some(ref_col)) = (table.column(&fk.column), other.column(&fk.ref_column)) {
                        if !pairs.contains(&(fk_col.clone(), ref_col.clone())) {
                            pairs.push((fk_col, ref_col));
                        }
                    }
                }
            }
        }
    }
    let names = |tables: &[Table]| {
        tables
            .iter()
            .map(Table::fullname)
            .collect::<Vec<_>>()
            .join(", ")
    };
    match pairs.as_slice() {
        [(fk, referenced)] => Ok(referenced.eq(fk.clone())),
        [] => Err(OrmError::config(format!(
            "relation '{key}': no foreign key joins [{}] to [{}]",
            names(left),
            names(right)
        ))),
        _ => Err(OrmError::config(format!(
            "relation '{key}': {} foreign keys join [{}] to [{}]; specify primaryjoin",
            pairs.len(),
            names(left),
            names(right)
        ))),
    }
}

pub(crate) fn equalities(clause: &ClauseNode) -> Vec<(&ColumnRef, &ColumnRef)> {
    match clause {
        ClauseNode::Binary(binary) if binary.op() == Operator::Eq => match (binary.left(), binary.right()) {
            (ClauseNode::Column(left), ClauseNode::Column(right)) => vec![(left, right)],
            _ => Vec::new(),
        },
        ClauseNode::Compound(compound) => compound.clauses().iter().flat_map(equalities).collect(),
        _ => Vec::new(),
    }
}

fn references(column: &ColumnRef, other: &ColumnRef) -> bool {
    column.table().is_some_and(|table| {
        table.foreign_keys().iter().any(|fk| {
            fk.column == column.name()
                && fk.ref_column == other.name()
                && table_matches(&other.origin().table, &fk.ref_table)
        })
    })
}

// Orders an equality as (independent, dependent).
fn dependent_pair(left: &ColumnRef, right: &ColumnRef, explicit: &[ColumnRef]) -> Option<SyncPair> {
    let pair = |source: &ColumnRef, dest: &ColumnRef| SyncPair {
        source: source.clone(),
        dest: dest.clone(),
    };
    if explicit.iter().any(|c| c.same_origin(left)) {
        Some(pair(right, left))
    } else if explicit.iter().any(|c| c.same_origin(right)) {
        Some(pair(left, right))
    } else if references(left, right) {
        Some(pair(right, left))
    } else if references(right, left) {
        Some(pair(left, right))
    } else if left.is_primary_key() && !right.is_primary_key() {
        Some(pair(left, right))
    } else if right.is_primary_key() && !left.is_primary_key() {
        Some(pair(right, left))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use clausemap_core::{ColumnDef, GenericDialect, SqlType};

    use super::*;

    fn parent() -> Table {
        Table::new("parent", vec![ColumnDef::new("id", SqlType::Integer).primary_key()])
    }

    fn child() -> Table {
        Table::new(
            "child",
            vec![
                ColumnDef::new("id", SqlType::Integer).primary_key(),
                ColumnDef::new("parent_id", SqlType::Integer).references("parent.id"),
            ],
        )
    }

    #[test]
    fn test_match_primaries_single_foreign_key() {
        let clause = match_primaries("children", &[parent()], &[child()]).unwrap();
        let sql = clause.compile(&GenericDialect::new()).unwrap();
        assert_eq!(sql.sql(), "parent.id = child.parent_id");
    }

    #[test]
    fn test_match_primaries_ambiguous() {
        let child = Table::new(
            "child",
            vec![
                ColumnDef::new("id", SqlType::Integer).primary_key(),
                ColumnDef::new("mother_id", SqlType::Integer).references("parent.id"),
                ColumnDef::new("father_id", SqlType::Integer).references("parent.id"),
            ],
        );
        let err = match_primaries("children", &[parent()], &[child]).unwrap_err();
        assert!(matches!(err, OrmError::Configuration(msg) if msg.contains("2 foreign keys")));
    }

    #[test]
    fn test_match_primaries_none() {
        let other = Table::new("other", vec![ColumnDef::new("id", SqlType::Integer).primary_key()]);
        assert!(match_primaries("x", &[parent()], &[other]).is_err());
    }

    #[test]
    fn test_dependent_pair_follows_foreign_key() {
        let parent = parent();
        let child = child();
        let pair = dependent_pair(&parent.c("id"), &child.c("parent_id"), &[]).unwrap();
        assert_eq!(pair.source, parent.c("id"));
        assert_eq!(pair.dest, child.c("parent_id"));

        let pair = dependent_pair(&child.c("parent_id"), &parent.c("id"), &[]).unwrap();
        assert_eq!(pair.dest, child.c("parent_id"));
    }

    #[test]
    fn test_dependent_pair_explicit_column_wins() {
        let parent = parent();
        let child = child();
        let pair = dependent_pair(&parent.c("id"), &child.c("parent_id"), &[parent.c("id")]).unwrap();
        assert_eq!(pair.dest, parent.c("id"));
    }

    #[test]
    fn test_equalities_inside_and() {
        let parent = parent();
        let child = child();
        let clause = and_([parent.c("id").eq(child.c("parent_id")), child.c("id").gt(3)]);
        assert_eq!(equalities(&clause).len(), 1);
    }
}
