//! Compiles clause trees into SQL text and bind metadata.
//!
//! Compilation is a pure function of the tree, the dialect and (for
//! INSERT/UPDATE) the names of the call-time parameters. The result lists
//! bind names in placeholder order so values can be supplied later.

use std::collections::{HashMap, HashSet};
use std::fmt;

use indexmap::IndexMap;

use crate::clause::{
    Alias, Binary, BindParam, ClauseNode, Delete, FromEntry, Insert, Join, Operator, Select,
    UnaryOp, Update,
};
use crate::dialect::{Dialect, ParamStyle};
use crate::error::{CompileError, Result};
use crate::schema::ColumnRef;
use crate::value::{Params, SqlValue};

type LabelKey = (String, String);

fn label_key(column: &ColumnRef) -> LabelKey {
    (
        column.owner_name().unwrap_or_default(),
        column.name().to_string(),
    )
}

/// A compiled statement.
#[derive(Debug, Clone)]
pub struct Compiled {
    sql: String,
    positional: Vec<String>,
    binds: IndexMap<String, BindParam>,
    criteria: HashSet<String>,
    labels: HashMap<LabelKey, String>,
    param_style: ParamStyle,
}

impl Compiled {
    /// The SQL text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Placeholder style the SQL was written with.
    #[must_use]
    pub const fn param_style(&self) -> ParamStyle {
        self.param_style
    }

    /// Bind names in the order values must be supplied.
    #[must_use]
    pub fn bind_names(&self) -> &[String] {
        &self.positional
    }

    /// Every distinct bind parameter by final name.
    pub fn binds(&self) -> impl Iterator<Item = (&str, &BindParam)> {
        self.binds.iter().map(|(name, bind)| (name.as_str(), bind))
    }

    /// Bind values in placeholder order. `overrides` beat defaults; they are
    /// looked up by final name, then original key, then short name.
    ///
    /// A short name is ignored when another bind is already called that, and
    /// for binds in the WHERE clause of an UPDATE or DELETE.
    #[must_use]
    pub fn params(&self, overrides: &Params) -> Vec<SqlValue> {
        self.positional
            .iter()
            .map(|name| self.value_for(name, overrides))
            .collect()
    }

    /// Like [`Compiled::params`], with each value coerced by the dialect.
    #[must_use]
    pub fn params_for(&self, dialect: &dyn Dialect, overrides: &Params) -> Vec<SqlValue> {
        self.positional
            .iter()
            .map(|name| {
                let value = self.value_for(name, overrides);
                match self.binds.get(name) {
                    Some(bind) => dialect.coerce_bind(value, &bind.ty()),
                    None => value,
                }
            })
            .collect()
    }

    /// The result label assigned to `column`, if it was labelled.
    #[must_use]
    pub fn label_for(&self, column: &ColumnRef) -> Option<&str> {
        self.labels.get(&label_key(column)).map(String::as_str)
    }

    fn value_for(&self, name: &str, overrides: &Params) -> SqlValue {
        if let Some(value) = overrides.get(name) {
            return value.clone();
        }
        let Some(bind) = self.binds.get(name) else {
            return SqlValue::Null;
        };
        overrides
            .get(bind.key())
            .or_else(|| {
                bind.shortname()
                    .filter(|short| self.accepts_shortname(name, short))
                    .and_then(|short| overrides.get(short))
            })
            .cloned()
            .unwrap_or_else(|| bind.value().clone())
    }

    fn accepts_shortname(&self, name: &str, short: &str) -> bool {
        !self.criteria.contains(name)
            && !self
                .binds
                .iter()
                .any(|(other, bind)| other != name && (other == short || bind.key() == short))
    }
}

impl fmt::Display for Compiled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Compiles `node` for `dialect`.
///
/// `overrides` names the call-time parameters; INSERT and UPDATE use their
/// keys to decide which columns to render.
///
/// # Errors
///
/// Fails on a comparison with NULL under an operator that has no `IS`
/// form, or on a top-level SELECT with nothing to select from.
pub fn compile(node: &ClauseNode, dialect: &dyn Dialect, overrides: Option<&Params>) -> Result<Compiled> {
    let mut compiler = Compiler {
        dialect,
        overrides,
        binds: IndexMap::new(),
        criteria: HashSet::new(),
        in_criteria: false,
        positional: Vec::new(),
        labels: HashMap::new(),
        used_labels: HashSet::new(),
        depth: 0,
    };
    let sql = compiler.render(node)?;
    tracing::trace!(sql = %sql, dialect = dialect.name(), "Compiled statement");
    Ok(Compiled {
        sql,
        positional: compiler.positional,
        binds: compiler.binds,
        criteria: compiler.criteria,
        labels: compiler.labels,
        param_style: dialect.param_style(),
    })
}

impl ClauseNode {
    /// Compiles this tree with no call-time parameters.
    ///
    /// # Errors
    ///
    /// See [`compile`].
    pub fn compile(&self, dialect: &dyn Dialect) -> Result<Compiled> {
        compile(self, dialect, None)
    }
}

impl Select {
    /// Compiles this statement.
    ///
    /// # Errors
    ///
    /// See [`compile`].
    pub fn compile(&self, dialect: &dyn Dialect) -> Result<Compiled> {
        compile(&ClauseNode::Select(Box::new(self.clone())), dialect, None)
    }
}

struct Compiler<'a> {
    dialect: &'a dyn Dialect,
    overrides: Option<&'a Params>,
    binds: IndexMap<String, BindParam>,
    // Binds rendered inside the WHERE clause of an UPDATE or DELETE.
    criteria: HashSet<String>,
    in_criteria: bool,
    positional: Vec<String>,
    labels: HashMap<LabelKey, String>,
    used_labels: HashSet<String>,
    depth: usize,
}

impl Compiler<'_> {
    fn render(&mut self, node: &ClauseNode) -> Result<String> {
        match node {
            ClauseNode::Table(t) => Ok(t.fullname()),
            ClauseNode::Column(c) => Ok(c.qualified_name()),
            ClauseNode::Alias(a) => self.render_alias(a),
            ClauseNode::Join(j) => self.render_join(j),
            ClauseNode::BindParam(b) => Ok(self.bind(b)),
            ClauseNode::Text(t) => Ok(self.render_text(t.text())),
            ClauseNode::Null => Ok(String::from("NULL")),
            ClauseNode::Unary(u) => {
                let operand = self.render_operand(u.operand())?;
                match u.op() {
                    UnaryOp::Exists => Ok(format!("EXISTS {operand}")),
                    UnaryOp::Not => match u.operand() {
                        ClauseNode::Compound(c) if c.is_parenthesized() => Ok(format!("NOT {operand}")),
                        ClauseNode::Select(_) => Ok(format!("NOT {operand}")),
                        _ => Ok(format!("NOT ({operand})")),
                    },
                }
            }
            ClauseNode::Binary(b) => self.render_binary(b),
            ClauseNode::Compound(c) => {
                let mut parts = Vec::with_capacity(c.clauses().len());
                for clause in c.clauses() {
                    let part = self.render(clause)?;
                    if !part.is_empty() {
                        parts.push(part);
                    }
                }
                let body = parts.join(c.op().separator());
                if c.is_parenthesized() && !body.is_empty() {
                    Ok(format!("({body})"))
                } else {
                    Ok(body)
                }
            }
            ClauseNode::Select(s) => {
                let nested = self.depth > 0;
                let sql = self.render_select(s)?;
                Ok(if nested { format!("({sql})") } else { sql })
            }
            ClauseNode::Insert(i) => self.render_insert(i),
            ClauseNode::Update(u) => self.render_update(u),
            ClauseNode::Delete(d) => self.render_delete(d),
        }
    }

    // Subqueries in operand position are always parenthesized.
    fn render_operand(&mut self, node: &ClauseNode) -> Result<String> {
        match node {
            ClauseNode::Select(s) => Ok(format!("({})", self.render_select(s)?)),
            other => self.render(other),
        }
    }

    fn render_binary(&mut self, b: &Binary) -> Result<String> {
        let has_null = matches!(b.left(), ClauseNode::Null) || matches!(b.right(), ClauseNode::Null);
        if has_null && !matches!(b.op(), Operator::Is | Operator::IsNot | Operator::Eq) {
            return Err(CompileError::NullComparison {
                operator: b.op().as_str().to_string(),
            });
        }
        let left = self.render_operand(b.left())?;
        let right = self.render_operand(b.right())?;
        Ok(format!("{left} {} {right}", b.op().as_str()))
    }

    fn render_select(&mut self, s: &Select) -> Result<String> {
        let nested = self.depth > 0;
        self.depth += 1;
        let result = self.render_select_body(s, nested);
        self.depth -= 1;
        result
    }

    fn render_select_body(&mut self, s: &Select, nested: bool) -> Result<String> {
        let mut columns = Vec::new();
        let mut seen: HashSet<LabelKey> = HashSet::new();
        for node in s.columns() {
            match node {
                ClauseNode::Table(_) | ClauseNode::Alias(_) | ClauseNode::Join(_) | ClauseNode::Column(_) => {
                    for column in node.columns() {
                        if !seen.insert(label_key(&column)) {
                            continue;
                        }
                        let name = column.qualified_name();
                        if s.has_labels() && column.owner_name().is_some() {
                            let label = self.assign_label(&column);
                            columns.push(format!("{name} AS {label}"));
                        } else {
                            columns.push(name);
                        }
                    }
                }
                other => columns.push(self.render(other)?),
            }
        }

        let mut sql = String::from("SELECT ");
        if s.is_distinct() {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(&columns.join(", "));

        let froms = s.visible_froms();
        if froms.is_empty() {
            if !nested && s.correlated().is_none() {
                return Err(CompileError::NoFromClause);
            }
        } else {
            let mut rendered = Vec::with_capacity(froms.len());
            for entry in froms {
                rendered.push(self.render_from_entry(entry)?);
            }
            sql.push_str(" FROM ");
            sql.push_str(&rendered.join(", "));
        }

        if let Some(clause) = s.where_clause() {
            let clause = self.render(clause)?;
            if !clause.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&clause);
            }
        }

        if !s.group_by.is_empty() {
            let mut exprs = Vec::with_capacity(s.group_by.len());
            for expr in &s.group_by {
                exprs.push(self.render(expr)?);
            }
            sql.push_str(" GROUP BY ");
            sql.push_str(&exprs.join(", "));
        }

        if let Some(having) = &s.having {
            let having = self.render(having)?;
            sql.push_str(" HAVING ");
            sql.push_str(&having);
        }

        if !s.order_by_items().is_empty() {
            let mut items = Vec::with_capacity(s.order_by_items().len());
            for item in s.order_by_items() {
                let expr = self.render(item.expr())?;
                items.push(if item.is_descending() {
                    format!("{expr} DESC")
                } else {
                    expr
                });
            }
            sql.push_str(" ORDER BY ");
            sql.push_str(&items.join(", "));
        }

        sql.push_str(&self.dialect.limit_clause(s.limit_value(), s.offset_value()));

        for (op, other) in &s.compounds {
            let other = self.render_select(other)?;
            sql.push(' ');
            sql.push_str(op.as_str());
            sql.push(' ');
            sql.push_str(&other);
        }

        Ok(sql)
    }

    fn render_from_entry(&mut self, entry: &FromEntry) -> Result<String> {
        match entry {
            FromEntry::Table(t) => Ok(t.fullname()),
            FromEntry::Alias(a) => self.render_alias(a),
            FromEntry::Join(j) => self.render_join(j),
            FromEntry::Select(s) => Ok(format!("({})", self.render_select(s)?)),
            FromEntry::Hidden => Ok(String::new()),
        }
    }

    fn render_from_node(&mut self, node: &ClauseNode) -> Result<String> {
        match node {
            ClauseNode::Select(s) => Ok(format!("({})", self.render_select(s)?)),
            other => self.render(other),
        }
    }

    fn render_alias(&mut self, alias: &Alias) -> Result<String> {
        let inner = match alias.inner() {
            ClauseNode::Table(t) => t.fullname(),
            ClauseNode::Select(s) => format!("({})", self.render_select(s)?),
            other => format!("({})", self.render_from_node(other)?),
        };
        Ok(format!("{inner} AS {}", alias.name()))
    }

    fn render_join(&mut self, join: &Join) -> Result<String> {
        let left = self.render_from_node(join.left())?;
        let right = match join.right() {
            ClauseNode::Join(_) => format!("({})", self.render_from_node(join.right())?),
            other => self.render_from_node(other)?,
        };
        let on = self.render(join.on_clause())?;
        let keyword = if join.is_outer() {
            "LEFT OUTER JOIN"
        } else {
            "JOIN"
        };
        Ok(format!("{left} {keyword} {right} ON {on}"))
    }

    fn render_insert(&mut self, insert: &Insert) -> Result<String> {
        let table = insert.table().fullname();
        let params = insert.column_params(self.overrides);
        if params.is_empty() {
            return Ok(format!("INSERT INTO {table} DEFAULT VALUES"));
        }
        self.depth += 1;
        let mut names = Vec::with_capacity(params.len());
        let mut values = Vec::with_capacity(params.len());
        for (column, value) in &params {
            names.push(column.name().to_string());
            values.push(self.render_operand(value)?);
        }
        self.depth -= 1;
        Ok(format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            names.join(", "),
            values.join(", ")
        ))
    }

    fn render_update(&mut self, update: &Update) -> Result<String> {
        let table = update.table().fullname();
        let params = update.column_params(self.overrides);
        self.depth += 1;
        let mut sets = Vec::with_capacity(params.len());
        for (column, value) in &params {
            sets.push(format!("{} = {}", column.name(), self.render_operand(value)?));
        }
        let mut sql = format!("UPDATE {table} SET {}", sets.join(", "));
        if let Some(clause) = update.where_clause() {
            let clause = self.render_criteria(clause)?;
            if !clause.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&clause);
            }
        }
        self.depth -= 1;
        Ok(sql)
    }

    fn render_delete(&mut self, delete: &Delete) -> Result<String> {
        let mut sql = format!("DELETE FROM {}", delete.table().fullname());
        self.depth += 1;
        if let Some(clause) = delete.where_clause() {
            let clause = self.render_criteria(clause)?;
            if !clause.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&clause);
            }
        }
        self.depth -= 1;
        Ok(sql)
    }

    fn render_criteria(&mut self, clause: &ClauseNode) -> Result<String> {
        self.in_criteria = true;
        let result = self.render(clause);
        self.in_criteria = false;
        result
    }

    // Rewrites `:name` tokens outside string literals as bind placeholders.
    fn render_text(&mut self, text: &str) -> String {
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len());
        let mut in_quote = false;
        let mut i = 0;
        while i < chars.len() {
            let ch = chars[i];
            if ch == '\'' {
                in_quote = !in_quote;
            } else if !in_quote
                && ch == ':'
                && (i == 0 || chars[i - 1] != ':')
                && chars
                    .get(i + 1)
                    .is_some_and(|next| next.is_ascii_alphabetic() || *next == '_')
            {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
                    end += 1;
                }
                let name: String = chars[start..end].iter().collect();
                let placeholder = self.bind(&BindParam::new(name));
                out.push_str(&placeholder);
                i = end;
                continue;
            }
            out.push(ch);
            i += 1;
        }
        out
    }

    fn bind(&mut self, bind: &BindParam) -> String {
        let name = self.bind_name(bind);
        if self.in_criteria {
            self.criteria.insert(name.clone());
        }
        match self.dialect.param_style() {
            ParamStyle::Qmark => {
                self.positional.push(name);
                String::from("?")
            }
            ParamStyle::Numbered => {
                let index = match self.positional.iter().position(|n| *n == name) {
                    Some(index) => index,
                    None => {
                        self.positional.push(name);
                        self.positional.len() - 1
                    }
                };
                format!("${}", index + 1)
            }
            ParamStyle::Named => {
                let placeholder = format!(":{name}");
                if !self.positional.contains(&name) {
                    self.positional.push(name);
                }
                placeholder
            }
        }
    }

    // Distinct parameters sharing a key are renamed `key_1`, `key_2`, ...
    fn bind_name(&mut self, bind: &BindParam) -> String {
        let mut name = bind.key().to_string();
        let mut n = 0;
        loop {
            match self.binds.get(&name) {
                None => {
                    self.binds.insert(name.clone(), bind.clone());
                    return name;
                }
                Some(existing) if existing == bind => return name,
                Some(_) => {
                    n += 1;
                    name = format!("{}_{n}", bind.key());
                }
            }
        }
    }

    fn assign_label(&mut self, column: &ColumnRef) -> String {
        let key = label_key(column);
        if let Some(label) = self.labels.get(&key) {
            return label.clone();
        }
        let base = column.label();
        let mut label = base.clone();
        let mut n = 0;
        while self.used_labels.contains(&label) {
            n += 1;
            label = format!("{base}_{n}");
        }
        self.used_labels.insert(label.clone());
        self.labels.insert(key, label.clone());
        label
    }
}
