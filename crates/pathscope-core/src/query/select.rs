//! Final queries and their SQL rendering.
//!
//! Rendering targets the SQLite/ANSI common subset: double-quoted identifiers,
//! `?` placeholders and `SELECT ... UNION/INTERSECT SELECT ...` chains.

use std::fmt;

use pathscope_proto::{Operator, Value};

use super::builder::{CombineOp, FilterAtom, JoinSpec};
use crate::catalog::EntityMetadata;

/// Rendered SQL text with its positional parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sql {
    /// Statement text.
    pub text: String,
    /// Parameters, in placeholder order.
    pub params: Vec<Value>,
}

impl fmt::Display for Sql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Columns selected from the root binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Projection {
    /// `root.*`
    #[default]
    All,
    /// Only the identity column.
    Identity,
}

/// A single-rooted select.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    /// Root entity.
    pub entity: String,
    /// Root table.
    pub table: String,
    /// Root binding alias.
    pub alias: String,
    /// Identity column of the root entity.
    pub identity: String,
    /// Selected columns.
    pub projection: Projection,
    /// Whether to emit `DISTINCT`.
    pub distinct: bool,
    /// Joins, in application order.
    pub joins: Vec<JoinSpec>,
    /// Row predicate.
    pub filter: Option<FilterAtom>,
}

impl SelectQuery {
    /// Select every row of `entity` under `alias`.
    pub fn from_entity(entity: &EntityMetadata, alias: impl Into<String>) -> Self {
        Self {
            entity: entity.name.clone(),
            table: entity.table().to_string(),
            alias: alias.into(),
            identity: entity.identity.clone(),
            projection: Projection::All,
            distinct: false,
            joins: Vec::new(),
            filter: None,
        }
    }

    /// Set the projection.
    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    /// Render to SQL.
    pub fn to_sql(&self) -> Sql {
        let mut sql = Sql::default();
        self.render(&mut sql);
        sql
    }

    fn render(&self, sql: &mut Sql) {
        sql.text.push_str("SELECT ");
        if self.distinct {
            sql.text.push_str("DISTINCT ");
        }
        match self.projection {
            Projection::All => {
                sql.text.push_str(&quote(&self.alias));
                sql.text.push_str(".*");
            }
            Projection::Identity => sql.text.push_str(&column(&self.alias, &self.identity)),
        }
        sql.text.push_str(" FROM ");
        sql.text.push_str(&quote(&self.table));
        sql.text.push_str(" AS ");
        sql.text.push_str(&quote(&self.alias));

        for join in &self.joins {
            sql.text.push_str(&format!(
                " {} {} AS {} ON {} = {}",
                join.kind.as_sql(),
                quote(&join.target_table),
                quote(&join.alias),
                column(&join.alias, &join.join_column),
                column(&join.parent_alias, &join.parent_column),
            ));
        }

        if let Some(filter) = &self.filter {
            sql.text.push_str(" WHERE ");
            render_filter(filter, sql);
        }
    }
}

/// Independently rooted selects combined with `UNION` or `INTERSECT`.
///
/// Every member projects its root identity.
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundQuery {
    /// Set operator.
    pub op: CombineOp,
    /// Members, in order.
    pub queries: Vec<SelectQuery>,
}

impl CompoundQuery {
    /// Create a compound query; members are switched to identity projection.
    pub fn new(op: CombineOp, queries: Vec<SelectQuery>) -> Self {
        let queries = queries
            .into_iter()
            .map(|q| q.with_projection(Projection::Identity))
            .collect();
        Self { op, queries }
    }

    /// Render to SQL.
    pub fn to_sql(&self) -> Sql {
        let mut sql = Sql::default();
        self.render(&mut sql);
        sql
    }

    fn render(&self, sql: &mut Sql) {
        for (i, query) in self.queries.iter().enumerate() {
            if i > 0 {
                sql.text.push(' ');
                sql.text.push_str(self.op.set_operator());
                sql.text.push(' ');
            }
            query.render(sql);
        }
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn column(alias: &str, name: &str) -> String {
    format!("{}.{}", quote(alias), quote(name))
}

fn render_filter(filter: &FilterAtom, sql: &mut Sql) {
    match filter {
        FilterAtom::EmptySet => sql.text.push_str("1 = 0"),
        FilterAtom::And(children) => render_group(children, "AND", "1 = 1", sql),
        FilterAtom::Or(children) => render_group(children, "OR", "1 = 0", sql),
        FilterAtom::Comparison {
            alias,
            column: name,
            op,
            value,
        } => render_comparison(&column(alias, name), *op, value, sql),
        FilterAtom::InSubquery {
            alias,
            column: name,
            query,
        } => {
            sql.text.push_str(&column(alias, name));
            sql.text.push_str(" IN (");
            query.render(sql);
            sql.text.push(')');
        }
    }
}

fn render_group(children: &[FilterAtom], connective: &str, empty: &str, sql: &mut Sql) {
    match children {
        [] => sql.text.push_str(empty),
        [single] => render_filter(single, sql),
        _ => {
            sql.text.push('(');
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    sql.text.push(' ');
                    sql.text.push_str(connective);
                    sql.text.push(' ');
                }
                render_filter(child, sql);
            }
            sql.text.push(')');
        }
    }
}

fn render_comparison(target: &str, op: Operator, value: &Value, sql: &mut Sql) {
    let negated = matches!(op, Operator::Neq | Operator::NotIn);

    match value {
        Value::Null => {
            sql.text.push_str(target);
            sql.text
                .push_str(if negated { " IS NOT NULL" } else { " IS NULL" });
        }
        Value::List(items) if !op.is_ordering() => {
            if items.is_empty() {
                sql.text.push_str(if negated { "1 = 1" } else { "1 = 0" });
                return;
            }
            sql.text.push_str(target);
            sql.text.push_str(if negated { " NOT IN (" } else { " IN (" });
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    sql.text.push_str(", ");
                }
                sql.text.push('?');
                sql.params.push(item.clone());
            }
            sql.text.push(')');
        }
        // Ordering against a list has no meaning.
        Value::List(_) => sql.text.push_str("1 = 0"),
        scalar => {
            let symbol = match op {
                Operator::Eq | Operator::In => "=",
                Operator::Neq | Operator::NotIn => "<>",
                Operator::Gt => ">",
                Operator::Gte => ">=",
                Operator::Lt => "<",
                Operator::Lte => "<=",
            };
            sql.text.push_str(&format!("{} {} ?", target, symbol));
            sql.params.push(scalar.clone());
        }
    }
}
