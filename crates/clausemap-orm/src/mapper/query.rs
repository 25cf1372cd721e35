//! Loading instances through a mapper.

use std::collections::HashMap;

use clausemap_core::{
    and_, select, text, ClauseNode, Compiled, Dialect, Engine, Join, OrderItem, Params, ResultSet,
    Select, SqlValue,
};
use tracing::debug;

use super::Mapper;
use crate::error::{OrmError, Result};
use crate::instance::Instance;
use crate::loading::{LoadContext, Row, RowView, SetupContext, TableAdapter};
use crate::registry::Registry;
use crate::session::Session;

/// Per-call settings of a mapper select.
#[derive(Debug, Clone, Default)]
pub struct SelectOptions {
    populate_existing: bool,
    order_by: Option<Vec<OrderItem>>,
    limit: Option<u64>,
    offset: Option<u64>,
    distinct: bool,
}

impl SelectOptions {
    /// Defaults: no limit, the mapper's ordering.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Refreshes instances already in the identity map from the rows.
    #[must_use]
    pub const fn populate_existing(mut self) -> Self {
        self.populate_existing = true;
        self
    }

    /// Ordering for this call; an empty list means unordered.
    #[must_use]
    pub fn order_by<I, O>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<OrderItem>,
    {
        self.order_by = Some(items.into_iter().map(Into::into).collect());
        self
    }

    /// Maximum number of instances.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Instances to skip.
    #[must_use]
    pub const fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// SELECT DISTINCT.
    #[must_use]
    pub const fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}

impl Mapper {
    /// Builds the SELECT for `criterion`, eager joins included.
    ///
    /// When eager joins meet LIMIT, OFFSET or DISTINCT, the limited primary
    /// key query is nested as the subquery `rowcount` so the limit counts
    /// instances rather than joined rows.
    pub(crate) fn build_select(
        &self,
        registry: &Registry,
        criterion: Option<ClauseNode>,
        opts: &SelectOptions,
    ) -> Result<(Select, HashMap<String, TableAdapter>)> {
        let order = opts
            .order_by
            .clone()
            .unwrap_or_else(|| self.default_order(registry));
        let nested = self.has_eager() && (opts.limit.is_some() || opts.offset.is_some() || opts.distinct);

        let mut stmt = select([self.table.clone()]).use_labels();
        let root = if nested {
            let pk = self.table_primary_key(&self.primary_table).to_vec();
            let mut inner = select(pk.clone()).from(self.table.clone());
            if let Some(criterion) = criterion {
                inner.append_whereclause(criterion);
            }
            inner.set_limit(opts.limit);
            inner.set_offset(opts.offset);
            inner.set_distinct(opts.distinct);
            for item in &order {
                inner.append_order_by(item.clone());
            }
            let rowcount = inner.alias("rowcount");
            let mut on = Vec::with_capacity(pk.len());
            for column in &pk {
                let outer = rowcount.corresponding_column(column).ok_or_else(|| {
                    OrmError::config(format!("rowcount subquery lacks {}", column.qualified_name()))
                })?;
                on.push(column.eq(outer));
            }
            ClauseNode::from(Join::new(self.table.clone(), rowcount, and_(on), false))
        } else {
            if let Some(criterion) = criterion {
                stmt.append_whereclause(criterion);
            }
            stmt.set_limit(opts.limit);
            stmt.set_offset(opts.offset);
            stmt.set_distinct(opts.distinct);
            self.table.clone()
        };
        for item in order {
            stmt.append_order_by(item);
        }

        let mut ctx = SetupContext::new(registry, root, self.class);
        self.setup_eager(&mut stmt, &mut ctx, &TableAdapter::default(), "")?;
        stmt.append_from(ctx.from);
        Ok((stmt, ctx.adapters))
    }

    /// Compiles the SELECT for `criterion` without running it.
    ///
    /// # Errors
    ///
    /// Fails when an eager relation cannot be resolved or the SELECT does
    /// not compile.
    pub fn compile(
        &self,
        registry: &Registry,
        dialect: &dyn Dialect,
        criterion: Option<ClauseNode>,
        opts: &SelectOptions,
    ) -> Result<Compiled> {
        let (stmt, _) = self.build_select(registry, criterion, opts)?;
        registry.compile(&stmt.into(), dialect, None)
    }

    /// Instances matching `criterion`.
    ///
    /// # Errors
    ///
    /// Returns compile and engine errors from running the SELECT.
    pub fn select<E: Engine>(
        &self,
        session: &mut Session<'_, E>,
        criterion: impl Into<ClauseNode>,
    ) -> Result<Vec<Instance>> {
        self.select_with(session, Some(criterion.into()), &SelectOptions::default())
    }

    /// Every instance.
    ///
    /// # Errors
    ///
    /// Returns compile and engine errors from running the SELECT.
    pub fn select_all<E: Engine>(&self, session: &mut Session<'_, E>) -> Result<Vec<Instance>> {
        self.select_with(session, None, &SelectOptions::default())
    }

    /// Instances matching `criterion`, with per-call settings.
    ///
    /// # Errors
    ///
    /// Returns compile and engine errors from running the SELECT.
    pub fn select_with<E: Engine>(
        &self,
        session: &mut Session<'_, E>,
        criterion: Option<ClauseNode>,
        opts: &SelectOptions,
    ) -> Result<Vec<Instance>> {
        self.query(session, criterion, &Params::new(), opts)
    }

    /// The first instance matching `criterion`.
    ///
    /// # Errors
    ///
    /// Returns compile and engine errors from running the SELECT.
    pub fn select_one<E: Engine>(
        &self,
        session: &mut Session<'_, E>,
        criterion: impl Into<ClauseNode>,
    ) -> Result<Option<Instance>> {
        Ok(self.select(session, criterion)?.into_iter().next())
    }

    /// Instances whose attributes equal `criteria`.
    ///
    /// Names that are not attributes of this class are looked up on the
    /// targets of its relations, joining through the relation.
    ///
    /// # Errors
    ///
    /// Fails when a name is neither an attribute nor reachable through a
    /// relation.
    pub fn select_by<E: Engine>(&self, session: &mut Session<'_, E>, criteria: &Params) -> Result<Vec<Instance>> {
        let criterion = self.criteria_clause(session.registry(), criteria)?;
        self.select_with(session, criterion, &SelectOptions::default())
    }

    /// The first instance whose attributes equal `criteria`.
    ///
    /// # Errors
    ///
    /// Fails when a name is neither an attribute nor reachable through a
    /// relation.
    pub fn get_by<E: Engine>(&self, session: &mut Session<'_, E>, criteria: &Params) -> Result<Option<Instance>> {
        Ok(self.select_by(session, criteria)?.into_iter().next())
    }

    /// The instance with primary key `ids`, from the identity map when
    /// present.
    ///
    /// # Errors
    ///
    /// Fails when `ids` does not match the primary key in length.
    pub fn get<E: Engine>(&self, session: &mut Session<'_, E>, ids: &[SqlValue]) -> Result<Option<Instance>> {
        if ids.len() != self.identity_columns.len() {
            return Err(OrmError::config(format!(
                "{} has {} primary key column(s), got {} value(s)",
                self.class,
                self.identity_columns.len(),
                ids.len()
            )));
        }
        let key = self.identity_key(ids.to_vec());
        if let Some(instance) = session.scope().borrow().get(&key) {
            return Ok(Some(instance));
        }
        let criterion = and_(
            self.identity_columns
                .iter()
                .zip(ids)
                .map(|(column, value)| column.eq(value.clone())),
        );
        Ok(self
            .select_with(session, Some(criterion), &SelectOptions::default())?
            .into_iter()
            .next())
    }

    /// Instances from a caller-built statement. Eager relations load
    /// lazily, since the statement has no joins for them.
    ///
    /// # Errors
    ///
    /// Returns compile and engine errors from running the statement.
    pub fn select_statement<E: Engine>(
        &self,
        session: &mut Session<'_, E>,
        stmt: Select,
        params: &Params,
    ) -> Result<Vec<Instance>> {
        let (result, compiled) = session.run(&stmt.into(), params)?;
        self.load_rows(session, &result, Some(&compiled), HashMap::new(), false)
    }

    /// Instances from literal SQL with `:name` parameters.
    ///
    /// # Errors
    ///
    /// Returns engine errors from running the SQL.
    pub fn select_text<E: Engine>(
        &self,
        session: &mut Session<'_, E>,
        sql: &str,
        params: &Params,
    ) -> Result<Vec<Instance>> {
        let (result, _) = session.run(&text(sql), params)?;
        self.load_rows(session, &result, None, HashMap::new(), false)
    }

    /// Instances from a result set fetched elsewhere, matched by column
    /// label or name.
    ///
    /// # Errors
    ///
    /// Fails when a relation of this mapper cannot be resolved.
    pub fn instances<E: Engine>(&self, session: &Session<'_, E>, result: &ResultSet) -> Result<Vec<Instance>> {
        self.load_rows(session, result, None, HashMap::new(), false)
    }

    pub(crate) fn query<E: Engine>(
        &self,
        session: &mut Session<'_, E>,
        criterion: Option<ClauseNode>,
        params: &Params,
        opts: &SelectOptions,
    ) -> Result<Vec<Instance>> {
        let (stmt, adapters) = self.build_select(session.registry(), criterion, opts)?;
        let (result, compiled) = session.run(&stmt.into(), params)?;
        self.load_rows(session, &result, Some(&compiled), adapters, opts.populate_existing)
    }

    fn load_rows<E: Engine>(
        &self,
        session: &Session<'_, E>,
        result: &ResultSet,
        compiled: Option<&Compiled>,
        adapters: HashMap<String, TableAdapter>,
        populate_existing: bool,
    ) -> Result<Vec<Instance>> {
        let mut load = LoadContext::new(session.registry(), session.scope().clone(), populate_existing, adapters);
        let root = TableAdapter::default();
        let dialect = session.engine().dialect();
        let mut instances = Vec::new();
        for values in &result.rows {
            let row = Row::new(&result.columns, values, compiled, dialect);
            let view = RowView {
                row: &row,
                adapter: &root,
                path: "",
            };
            if let Some((instance, true)) = self.instance(view, &mut load)? {
                if self.append_result(&instance, &mut instances) {
                    instances.push(instance);
                }
            }
        }
        debug!(
            class = %self.class,
            rows = result.rows.len(),
            instances = instances.len(),
            "Loaded instances"
        );
        Ok(instances)
    }

    fn criteria_clause(&self, registry: &Registry, criteria: &Params) -> Result<Option<ClauseNode>> {
        let mut clauses = Vec::new();
        'criteria: for (key, value) in criteria {
            let own = self
                .property(key)
                .and_then(|prop| prop.as_column())
                .and_then(|prop| prop.columns().first());
            if let Some(column) = own {
                clauses.push(column.eq(value.clone()));
                continue;
            }
            for (name, relation) in self.relations() {
                let state = relation.state(name, self, registry)?;
                if state.self_referential {
                    continue;
                }
                let remote = state
                    .target
                    .property(key)
                    .and_then(|prop| prop.as_column())
                    .and_then(|prop| prop.columns().first());
                if let Some(column) = remote {
                    clauses.push(state.join_clause());
                    clauses.push(column.eq(value.clone()));
                    continue 'criteria;
                }
            }
            return Err(OrmError::UnknownProperty {
                class: self.class.name().to_string(),
                key: key.clone(),
            });
        }
        Ok((!clauses.is_empty()).then(|| and_(clauses)))
    }
}
