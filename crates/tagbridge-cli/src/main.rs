//! Tagbridge CLI
//!
//! Acts as a host for a tag control over a JSON fixture store:
//! - Writing a sample store (`init`)
//! - Showing and replacing a record's tags (`show`, `set`)
//! - Listing suggestions the picker would offer (`suggest`)
//! - Decoding encoded output values (`decode`)
//! - Running raw store queries in the textual filter grammar (`query`)

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tagbridge_control::{TagData, TagControl};
use tagbridge_model::query::{parse_filter, parse_order_by};
use tagbridge_model::{EntityStore, RecordQuery, Tag};
use tagbridge_store::{sample, MemoryStore};
use tracing_subscriber::EnvFilter;

mod host;

use host::{resolve_tags, HostArgs, Session};

#[derive(Parser)]
#[command(name = "tagbridge")]
#[command(author, version, about = "Tagbridge: many-to-many tag picker host")]
struct Cli {
    #[command(flatten)]
    host: HostArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the sample store (accounts tagged with colours) to `--store`
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Load the record's tags and print them with the encoded output value
    Show {
        /// Print the decoded output as JSON instead
        #[arg(long)]
        json: bool,
    },

    /// List the suggestions a picker would offer
    Suggest {
        /// Substring of the tag name
        filter: Option<String>,
    },

    /// Replace the record's tags with the given keys or names
    ///
    /// With no arguments the selection is cleared. Saved records are
    /// updated in the store; for unsaved records only the output value
    /// changes.
    Set { tags: Vec<String> },

    /// Decode a `TAGDATA:` output value
    Decode { value: String },

    /// Query an entity directly
    Query {
        entity: String,
        /// `attr eq value` or `contains(attr,'text')`
        #[arg(long)]
        filter: Option<String>,
        /// `attr [asc|desc]`
        #[arg(long)]
        order_by: Option<String>,
        /// Comma-separated attribute list
        #[arg(long, value_delimiter = ',')]
        select: Vec<String>,
        #[arg(long)]
        top: Option<usize>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => cmd_init(&cli.host, force),
        Commands::Show { json } => cmd_show(&cli.host, json).await,
        Commands::Suggest { filter } => cmd_suggest(&cli.host, filter.as_deref()).await,
        Commands::Set { tags } => cmd_set(&cli.host, &tags).await,
        Commands::Decode { value } => cmd_decode(&value),
        Commands::Query {
            entity,
            filter,
            order_by,
            select,
            top,
        } => cmd_query(&cli.host, &entity, filter.as_deref(), order_by.as_deref(), select, top).await,
    }
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_init(host: &HostArgs, force: bool) -> Result<()> {
    if host.store.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            host.store.display()
        );
    }
    sample::colours_fixture().save(&host.store)?;
    eprintln!(
        "{} {}",
        "wrote".green().bold(),
        host.store.display().to_string().bold()
    );
    eprintln!(
        "next: {}",
        format!(
            "tagbridge show --store {} --entity-id {}",
            host.store.display(),
            sample::ACCOUNT_ID
        )
        .bold()
    );
    Ok(())
}

async fn cmd_show(host: &HostArgs, json: bool) -> Result<()> {
    let session = Session::open(host).await?;
    let output = session.control.get_outputs();

    if json {
        let value = match TagData::parse(&output) {
            Ok(data) => serde_json::to_value(data)?,
            Err(_) => serde_json::Value::String(output),
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    print_header(&session.control);
    print_tags(&session.control.selected_tags());
    println!("{} {}", "output:".dimmed(), output);
    Ok(())
}

async fn cmd_suggest(host: &HostArgs, filter: Option<&str>) -> Result<()> {
    let session = Session::open(host).await?;
    let selected = session.control.selected_tags();
    let suggestions = session
        .control
        .on_resolve_suggestions(filter.unwrap_or_default(), &selected)
        .await;

    if suggestions.is_empty() {
        eprintln!("{}", "no suggestions".yellow());
        return Ok(());
    }
    for tag in &suggestions {
        let marker = if selected.contains(tag) { "*" } else { " " };
        println!("{} {:<16} {}", marker.green(), tag.name, tag.key.dimmed());
    }
    Ok(())
}

async fn cmd_set(host: &HostArgs, wanted: &[String]) -> Result<()> {
    let session = Session::open(host).await?;
    let tags = resolve_tags(&session.all_tags().await?, wanted)?;

    let report = session.control.on_change(Some(tags)).await?;
    for tag in &report.additions {
        println!("{} {}", "+".green().bold(), tag.name);
    }
    for tag in &report.removals {
        println!("{} {}", "-".red().bold(), tag.name);
    }
    for failure in &report.failures {
        eprintln!("{} {}", "failed".red().bold(), failure);
    }

    if report.remote {
        session.store.save(&host.store)?;
        eprintln!(
            "{} {} (+{} -{})",
            "ok".green().bold(),
            host.store.display(),
            report.additions.len(),
            report.removals.len()
        );
    } else {
        eprintln!(
            "{} record not saved; only the output value changed",
            "note".yellow().bold()
        );
    }
    println!("{}", session.control.get_outputs());

    if !report.is_clean() {
        bail!("{} association call(s) failed", report.failures.len());
    }
    Ok(())
}

fn cmd_decode(value: &str) -> Result<()> {
    let data = TagData::parse(value)?;
    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}

async fn cmd_query(
    host: &HostArgs,
    entity: &str,
    filter: Option<&str>,
    order_by: Option<&str>,
    select: Vec<String>,
    top: Option<usize>,
) -> Result<()> {
    let store = MemoryStore::load(&host.store, host.store_config())?;

    let mut query = RecordQuery::new().select(select);
    if let Some(text) = filter {
        query = query.filter(parse_filter(text)?);
    }
    if let Some(text) = order_by {
        query = query.order_by(parse_order_by(text)?);
    }
    query.top = top;

    tracing::debug!(entity, options = %query.to_query_options(), "running query");
    let rows = store.fetch_many(entity, &query).await?;
    println!("{}", serde_json::to_string_pretty(&rows)?);
    eprintln!("{} {} row(s)", "ok".green().bold(), rows.len());
    Ok(())
}

// ============================================================================
// Output Helpers
// ============================================================================

fn print_header(control: &TagControl) {
    let host = control.host();
    let id = host
        .persisted_id()
        .map(str::to_string)
        .unwrap_or_else(|| "(unsaved)".to_string());
    println!(
        "{} {} · {} via {}",
        host.entity_type.bold(),
        id,
        control.descriptor().related_entity_type,
        control.descriptor().relationship_name.dimmed()
    );
}

fn print_tags(tags: &[Tag]) {
    if tags.is_empty() {
        println!("  {}", "(no tags)".dimmed());
        return;
    }
    for tag in tags {
        println!("  • {:<16} {}", tag.name, tag.key.dimmed());
    }
}
