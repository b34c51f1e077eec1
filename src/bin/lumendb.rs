//! LumenDB command-line client
//!
//! Runs single document-database operations against the configured object
//! store and prints the result, explain record included, as JSON.
//!
//! # Examples
//!
//! ```bash
//! # Insert a document
//! lumendb insert --db shop -c orders '{"item": "book", "qty": 2}'
//!
//! # Find with options
//! lumendb find --db shop -c orders '{"qty": {"$gt": 1}}' --options '{"sort": [["item", 1]], "limit": 5}'
//!
//! # List databases by name
//! lumendb dbs --name-only
//!
//! # Show effective settings
//! lumendb config
//! ```

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use lumendb::config::{Settings, StorageBackend};
use lumendb::document::{into_document, Document};
use lumendb::executor::{DeleteOptions, DropOptions, FindOptions, ListOptions, UpdateOptions};
use lumendb::{Collection, Instance};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// LumenDB - document database on object storage
#[derive(Parser, Debug)]
#[command(name = "lumendb")]
#[command(version = lumendb::VERSION)]
#[command(about = "LumenDB - document database on object storage", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (TOML)
    #[arg(long, global = true, env = "LUMENDB_CONFIG")]
    config: Option<PathBuf>,

    /// Storage backend, overriding the settings file
    #[arg(long, global = true, value_enum)]
    backend: Option<Backend>,

    /// Data directory of the local backend, overriding the settings file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Instance name, overriding the settings file
    #[arg(long, global = true)]
    instance: Option<String>,

    /// Log directory path
    #[arg(long, global = true, default_value = "logs", env = "LUMENDB_LOG_DIR")]
    log_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn", env = "LUMENDB_LOG_LEVEL")]
    log_level: String,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    Memory,
    Local,
}

impl From<Backend> for StorageBackend {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Memory => StorageBackend::Memory,
            Backend::Local => StorageBackend::Local,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Insert one document (JSON object) or many (JSON array)
    Insert {
        #[command(flatten)]
        target: CollectionArgs,
        /// Document or array of documents
        documents: String,
    },

    /// Find documents
    Find {
        #[command(flatten)]
        target: CollectionArgs,
        /// Filter document; omit to match everything
        filter: Option<String>,
        /// Find options, e.g. '{"sort": [["first", 1]], "skip": 1, "limit": 1}'
        #[arg(long)]
        options: Option<String>,
        /// Return the first match only
        #[arg(long)]
        one: bool,
    },

    /// Apply an update expression to matching documents
    Update {
        #[command(flatten)]
        target: CollectionArgs,
        filter: String,
        /// Update expression, e.g. '{"$set": {"last": "Goodall"}}'
        update: String,
        /// Update options, e.g. '{"upsert": true}'
        #[arg(long)]
        options: Option<String>,
        /// Update the first match only
        #[arg(long)]
        one: bool,
    },

    /// Replace the first matching document
    Replace {
        #[command(flatten)]
        target: CollectionArgs,
        filter: String,
        replacement: String,
        #[arg(long)]
        options: Option<String>,
    },

    /// Delete matching documents
    Delete {
        #[command(flatten)]
        target: CollectionArgs,
        filter: String,
        #[arg(long)]
        options: Option<String>,
        /// Delete the first match only
        #[arg(long)]
        one: bool,
    },

    /// List databases
    Dbs(ListArgs),

    /// List the collections of a database
    Collections {
        /// Database name
        #[arg(long)]
        db: String,
        #[command(flatten)]
        list: ListArgs,
    },

    /// Drop a collection
    DropCollection {
        #[command(flatten)]
        target: CollectionArgs,
        #[arg(long)]
        max_keys: Option<usize>,
    },

    /// Drop a database
    DropDb {
        /// Database name
        #[arg(long)]
        db: String,
        #[arg(long)]
        max_keys: Option<usize>,
    },

    /// Print the effective settings
    Config,

    /// Show version
    Version,
}

#[derive(Args, Debug)]
struct CollectionArgs {
    /// Database name
    #[arg(long)]
    db: String,

    /// Collection name
    #[arg(short, long)]
    collection: String,
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Filter over `{"name": ...}` documents
    filter: Option<String>,

    /// Print names only
    #[arg(long)]
    name_only: bool,

    #[arg(long)]
    max_keys: Option<usize>,

    #[arg(long)]
    continuation_token: Option<String>,
}

impl ListArgs {
    fn options(&self) -> ListOptions {
        ListOptions {
            name_only: self.name_only,
            max_keys: self.max_keys,
            continuation_token: self.continuation_token.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli)?;

    let settings = load_settings(&cli)?;
    debug!(?settings, "Loaded settings");

    match cli.command {
        Commands::Config => {
            print!("{}", settings.to_toml()?);
            Ok(())
        }
        Commands::Version => {
            println!("LumenDB {}", lumendb::VERSION);
            Ok(())
        }
        command => {
            let instance = Instance::new(settings.open_store()?, settings.instance.clone());
            run(&instance, command).await
        }
    }
}

/// Setup logging with rolling files and console output
fn setup_logging(cli: &Cli) -> anyhow::Result<()> {
    std::fs::create_dir_all(&cli.log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &cli.log_dir, "lumendb.log");

    let log_level = cli
        .log_level
        .parse::<tracing::Level>()
        .with_context(|| format!("Invalid log level: {}", cli.log_level))?;

    // Results go to stdout, so console logging stays on stderr.
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!cli.no_color)
                .compact(),
        )
        .with(fmt::layer().with_writer(file_appender).with_ansi(false))
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    Ok(())
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    if let Some(backend) = cli.backend {
        settings.storage.backend = backend.into();
    }
    if let Some(data_dir) = &cli.data_dir {
        settings.storage.root = data_dir.clone();
    }
    if let Some(instance) = &cli.instance {
        settings.instance = instance.clone();
    }
    Ok(settings)
}

async fn run(instance: &Instance, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Insert { target, documents } => {
            let collection = collection(instance, &target);
            match parse_json::<Value>(&documents, "documents")? {
                Value::Array(items) => {
                    let documents = items
                        .into_iter()
                        .map(into_document)
                        .collect::<lumendb::error::Result<Vec<_>>>()?;
                    print_json(&collection.insert_many(documents).await?)
                }
                value => print_json(&collection.insert_one(into_document(value)?).await?),
            }
        }
        Commands::Find {
            target,
            filter,
            options,
            one,
        } => {
            let collection = collection(instance, &target);
            let filter = filter.as_deref().map(parse_document).transpose()?;
            let options: FindOptions = parse_options(options.as_deref())?;
            if one {
                print_json(&collection.find_one(filter.as_ref(), &options).await?)
            } else {
                print_json(&collection.find(filter.as_ref(), &options).await?)
            }
        }
        Commands::Update {
            target,
            filter,
            update,
            options,
            one,
        } => {
            let collection = collection(instance, &target);
            let filter = parse_document(&filter)?;
            let update = parse_document(&update)?;
            let options: UpdateOptions = parse_options(options.as_deref())?;
            let result = if one {
                collection.update_one(Some(&filter), &update, &options).await?
            } else {
                collection.update_many(Some(&filter), &update, &options).await?
            };
            print_json(&result)
        }
        Commands::Replace {
            target,
            filter,
            replacement,
            options,
        } => {
            let collection = collection(instance, &target);
            let filter = parse_document(&filter)?;
            let replacement = parse_document(&replacement)?;
            let options: UpdateOptions = parse_options(options.as_deref())?;
            print_json(&collection.replace_one(Some(&filter), replacement, &options).await?)
        }
        Commands::Delete {
            target,
            filter,
            options,
            one,
        } => {
            let collection = collection(instance, &target);
            let filter = parse_document(&filter)?;
            let options: DeleteOptions = parse_options(options.as_deref())?;
            let result = if one {
                collection.delete_one(Some(&filter), &options).await?
            } else {
                collection.delete_many(Some(&filter), &options).await?
            };
            print_json(&result)
        }
        Commands::Dbs(list) => {
            let filter = list.filter.as_deref().map(parse_document).transpose()?;
            print_json(&instance.list_databases(filter.as_ref(), &list.options()).await?)
        }
        Commands::Collections { db, list } => {
            let filter = list.filter.as_deref().map(parse_document).transpose()?;
            let result = instance
                .db(db)
                .list_collections(filter.as_ref(), &list.options())
                .await?;
            print_json(&result)
        }
        Commands::DropCollection { target, max_keys } => {
            let result = collection(instance, &target)
                .drop(&DropOptions { max_keys })
                .await?;
            info!(dropped = result.dropped, "Dropped collection");
            print_json(&result)
        }
        Commands::DropDb { db, max_keys } => {
            let result = instance
                .db(db)
                .drop_database(&DropOptions { max_keys })
                .await?;
            info!(dropped = result.dropped, "Dropped database");
            print_json(&result)
        }
        Commands::Config | Commands::Version => Ok(()),
    }
}

fn collection(instance: &Instance, target: &CollectionArgs) -> Collection {
    instance.db(target.db.as_str()).collection(target.collection.as_str())
}

fn parse_json<T: DeserializeOwned>(text: &str, what: &str) -> anyhow::Result<T> {
    serde_json::from_str(text).with_context(|| format!("Invalid JSON for {}: {}", what, text))
}

fn parse_document(text: &str) -> anyhow::Result<Document> {
    Ok(into_document(parse_json(text, "document")?)?)
}

fn parse_options<T: DeserializeOwned + Default>(text: Option<&str>) -> anyhow::Result<T> {
    match text {
        Some(text) => parse_json(text, "options"),
        None => Ok(T::default()),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
