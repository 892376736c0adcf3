//! Pathscope Command-Line Tool
//!
//! Inspects entity graphs, resolves paths and shows the SQL a scope
//! compiles to.

mod commands;
mod formatter;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use formatter::OutputFormat;

/// Pathscope Command-Line Tool
#[derive(Parser, Debug)]
#[command(name = "pathscope")]
#[command(version, about = "Explain pathscope schemas, paths and scopes")]
pub struct Args {
    /// Output format
    #[arg(long, global = true, default_value = "table", value_enum)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve the shortest path (or every path) from an entity to a field
    Paths {
        /// Schema document (JSON array of entities)
        schema: PathBuf,
        /// Starting entity
        entity: String,
        /// Field name to reach
        field: String,
        /// List every simple path instead of the shortest
        #[arg(long)]
        all: bool,
    },

    /// Print the weighted entity graph
    Graph {
        /// Schema document
        schema: PathBuf,
    },

    /// Compile one expression into SQL
    Compile {
        /// Schema document
        schema: PathBuf,
        /// Root entity
        entity: String,
        /// Expression document
        expression: PathBuf,
        /// Actor document that value paths are resolved against
        #[arg(long)]
        actor: Option<PathBuf>,
    },

    /// Compile the policies of an entity and action into SQL
    Scope {
        /// Schema document
        schema: PathBuf,
        /// Policy document (JSON array of policies)
        policies: PathBuf,
        /// Root entity
        entity: String,
        /// Action
        action: String,
        /// Actor document
        #[arg(long)]
        actor: Option<PathBuf>,
    },

    /// Evaluate a dotted path against a record of a store fixture
    Eval {
        /// Schema document
        schema: PathBuf,
        /// Store fixture (JSON object of entity tables)
        store: PathBuf,
        /// Entity of the subject
        entity: String,
        /// Identity of the subject
        id: String,
        /// Dotted path, `**` for wildcard ascend
        path: String,
    },
}

fn main() {
    // Initialize tracing
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "pathscope=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(args: Args) -> Result<String, commands::CliError> {
    let formatter = formatter::create_formatter(args.format);
    let formatter = &*formatter;

    match args.command {
        Command::Paths {
            schema,
            entity,
            field,
            all,
        } => commands::paths(&schema, &entity, &field, all, formatter),
        Command::Graph { schema } => commands::graph(&schema, formatter),
        Command::Compile {
            schema,
            entity,
            expression,
            actor,
        } => commands::compile(&schema, &entity, &expression, actor.as_deref(), formatter),
        Command::Scope {
            schema,
            policies,
            entity,
            action,
            actor,
        } => commands::scope(
            &schema,
            &policies,
            &entity,
            &action,
            actor.as_deref(),
            formatter,
        ),
        Command::Eval {
            schema,
            store,
            entity,
            id,
            path,
        } => commands::eval(&schema, &store, &entity, &id, &path, formatter),
    }
}
