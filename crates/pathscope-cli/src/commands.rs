//! Subcommand implementations.
//!
//! Every command reads JSON documents from disk, runs one core operation and
//! returns the formatted output.

use std::collections::HashMap;
use std::path::{Path as FsPath, PathBuf};

use pathscope_core::{
    CatalogError, CompileError, EntityGraph, EvalError, Evaluator, MemoryStore, PolicySet,
    RelationCache, RuntimeParams, Schema, ScopeCompiler,
};
use pathscope_proto::{Expression, Path, Record, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::formatter::Formatter;

/// Errors surfaced to the command line.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Path(#[from] pathscope_proto::Error),

    #[error("no {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

fn read_json<T: serde::de::DeserializeOwned>(path: &FsPath) -> Result<T, CliError> {
    let content = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn load_schema(path: &FsPath) -> Result<Schema, CliError> {
    let entities = read_json(path)?;
    let schema = Schema::new(entities)?;
    debug!(entities = schema.len(), path = %path.display(), "Schema loaded");
    Ok(schema)
}

fn load_actor(path: Option<&FsPath>) -> Result<Value, CliError> {
    match path {
        Some(path) => Ok(Value::from(read_json::<serde_json::Value>(path)?)),
        None => Ok(Value::Null),
    }
}

/// Load a store fixture: `{"<entity>": [{...}, ...], ...}`.
fn load_store(path: &FsPath) -> Result<MemoryStore, CliError> {
    let tables: HashMap<String, Vec<serde_json::Value>> = read_json(path)?;
    let mut store = MemoryStore::new();
    for (entity, rows) in tables {
        for row in rows {
            if let Value::Record(record) = Value::from(row) {
                let mut typed = Record::new(entity.clone());
                typed.fields = record.fields;
                store.insert(typed);
            }
        }
    }
    Ok(store)
}

/// `paths`: resolve a field name from an entity.
pub fn paths(
    schema: &FsPath,
    entity: &str,
    field: &str,
    all: bool,
    formatter: &dyn Formatter,
) -> Result<String, CliError> {
    let schema = load_schema(schema)?;
    schema.require(entity)?;
    let graph = EntityGraph::build(&schema);

    let paths = if all {
        graph.all_paths(entity, field)
    } else {
        graph.shortest_path(entity, field).into_iter().collect()
    };
    info!(entity, field, found = paths.len(), "Paths resolved");
    Ok(formatter.format_paths(&paths))
}

/// `graph`: list the weighted edges of the entity graph.
pub fn graph(schema: &FsPath, formatter: &dyn Formatter) -> Result<String, CliError> {
    let schema = load_schema(schema)?;
    let graph = EntityGraph::build(&schema);
    Ok(formatter.format_graph(&graph))
}

/// `compile`: compile one expression into SQL.
pub fn compile(
    schema: &FsPath,
    entity: &str,
    expression: &FsPath,
    actor: Option<&FsPath>,
    formatter: &dyn Formatter,
) -> Result<String, CliError> {
    let schema = load_schema(schema)?;
    let graph = EntityGraph::build(&schema);
    let expression: Expression = read_json(expression)?;
    let mut params = RuntimeParams::new(load_actor(actor)?);

    let query = ScopeCompiler::new(&schema, &graph).scope(entity, &expression, &mut params)?;
    Ok(formatter.format_sql(&query.to_sql()))
}

/// `scope`: compile every policy for an entity and action into SQL.
pub fn scope(
    schema: &FsPath,
    policies: &FsPath,
    entity: &str,
    action: &str,
    actor: Option<&FsPath>,
    formatter: &dyn Formatter,
) -> Result<String, CliError> {
    let schema = load_schema(schema)?;
    let graph = EntityGraph::build(&schema);
    let policies: PolicySet = read_json(policies)?;
    let mut params = RuntimeParams::new(load_actor(actor)?);

    let compiler = ScopeCompiler::new(&schema, &graph);
    let query = policies.select(&compiler, entity, action, &mut params)?;
    info!(entity, action, policies = policies.policies().len(), "Scope compiled");
    Ok(formatter.format_sql(&query.to_sql()))
}

/// `eval`: evaluate a dotted path against a record of a store fixture.
pub fn eval(
    schema: &FsPath,
    store: &FsPath,
    entity: &str,
    id: &str,
    path: &str,
    formatter: &dyn Formatter,
) -> Result<String, CliError> {
    let schema = load_schema(schema)?;
    let graph = EntityGraph::build(&schema);
    let store = load_store(store)?;
    let path = Path::parse(path)?;

    let identity = match id.parse::<i64>() {
        Ok(n) => Value::Int64(n),
        Err(_) => Value::from(id),
    };
    let subject = store
        .find(entity, &identity)
        .cloned()
        .ok_or_else(|| CliError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        })?;

    let evaluator = Evaluator::new(&schema, &graph).with_loader(&store);
    let mut cache = RelationCache::new();
    let value = evaluator.evaluate(&Value::Record(subject), &path, &mut cache)?;
    info!(path = %path, loads = cache.loads(), "Path evaluated");
    Ok(formatter.format_value(&value))
}
