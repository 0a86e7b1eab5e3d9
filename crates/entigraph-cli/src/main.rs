//! entigraph command-line tool
//!
//! Inspects a schema, checks whether stored instances can be deleted, and
//! copies object graphs in a data directory.

mod commands;
mod formatter;

use clap::{Parser, Subcommand};
use entigraph_core::config::DEFAULT_COPY_MODE_ENV;
use entigraph_core::{Registry, SchemaFile, Settings};
use formatter::OutputFormat;
use std::path::PathBuf;

/// entigraph command-line tool
#[derive(Parser, Debug)]
#[command(name = "entigraph")]
#[command(version, about = "Schema inspection, delete checks and graph copies")]
pub struct Args {
    /// Schema file (JSON)
    #[arg(short, long, env = "ENTIGRAPH_SCHEMA", global = true)]
    pub schema: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", value_enum, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show entities, exposed keys, delete checks and copy strategies
    Schema,

    /// List the stored instances of an entity
    List {
        /// Data directory
        #[arg(short, long)]
        data: PathBuf,

        /// Entity name
        #[arg(short, long)]
        entity: String,
    },

    /// Check whether an instance can be deleted
    CheckDelete {
        /// Data directory
        #[arg(short, long)]
        data: PathBuf,

        /// Instance as `Entity:hex-id`
        #[arg(short, long)]
        object: String,
    },

    /// Copy an instance and commit the copy
    Copy {
        /// Data directory
        #[arg(short, long)]
        data: PathBuf,

        /// Instance as `Entity:hex-id`
        #[arg(short, long)]
        object: String,

        /// Mode for entities without a declared strategy (shallow or deep)
        #[arg(long, env = DEFAULT_COPY_MODE_ENV)]
        copy_mode: Option<String>,

        /// Label of the copy context
        #[arg(long)]
        context: Option<String>,
    },
}

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("entigraph=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let schema = args
        .schema
        .ok_or("no schema given: pass --schema or set ENTIGRAPH_SCHEMA")?;

    let settings = match &args.command {
        Command::Copy { copy_mode, .. } => Settings::from_value(copy_mode.as_deref())?,
        _ => Settings::new(),
    };
    let registry = Registry::open(&SchemaFile::new(&schema), settings)?;
    let formatter = formatter::create_formatter(args.format);

    let output = match &args.command {
        Command::Schema => commands::schema(&registry, &*formatter)?,
        Command::List { data, entity } => commands::list(&registry, data, entity, &*formatter)?,
        Command::CheckDelete { data, object } => {
            commands::check_delete(&registry, data, object, &*formatter)?
        }
        Command::Copy {
            data,
            object,
            context,
            ..
        } => commands::copy(&registry, data, object, context.as_deref(), &*formatter)?,
    };

    println!("{}", output);
    Ok(())
}
