use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use topic_catalog::loader::{DEFAULT_DATA_PATH, load_with_recovery};
use topic_catalog::render::{SUMMARY_CHARS, render_document, truncate_summary};
use topic_catalog::{
    Catalog, DataSource, LinkMode, LoaderConfig, PageOptions, Provenance, RecoveryPolicy, Topic,
    TopicCollection,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "topic-catalog", about = "Render and explore a topic catalog", version)]
pub struct Cli {
    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    /// Topic document to load: a file path or an http(s) URL.
    #[arg(long, global = true, default_value = DEFAULT_DATA_PATH)]
    data: DataSource,

    /// What to show when the document cannot be loaded.
    #[arg(long, global = true, value_enum, default_value_t = FailureMode::Fallback)]
    on_failure: FailureMode,

    /// Give up loading after this many seconds; 0 waits indefinitely.
    #[arg(long, global = true, default_value_t = 10)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FailureMode {
    /// Render the built-in fallback topics.
    Fallback,
    /// Render a "could not load" notice.
    Message,
}

impl From<FailureMode> for RecoveryPolicy {
    fn from(value: FailureMode) -> Self {
        match value {
            FailureMode::Fallback => RecoveryPolicy::Fallback,
            FailureMode::Message => RecoveryPolicy::Message,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inspect the loaded topics.
    #[command(subcommand)]
    Topics(TopicsCommand),
    /// Write a static HTML snapshot of the catalog page.
    Render {
        /// Output file; stdout when omitted.
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Search query applied before rendering.
        #[arg(short, long)]
        query: Option<String>,
        /// Topic ID to render expanded; repeat for more.
        #[arg(long)]
        open: Vec<String>,
        /// Topic ID to focus; collapses every other block.
        #[arg(long)]
        focus: Option<String>,
        /// Page title.
        #[arg(long, default_value = "Topic Catalog")]
        title: String,
    },
    /// Serve the catalog page over HTTP.
    #[cfg(feature = "web")]
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: std::net::SocketAddr,
        /// Page title.
        #[arg(long, default_value = "Topic Catalog")]
        title: String,
    },
}

#[derive(Subcommand, Debug)]
enum TopicsCommand {
    /// List every topic.
    List,
    /// List topics whose name or description contains the query.
    Search {
        /// Case-insensitive substring to match.
        query: String,
    },
    /// Show one topic with its links.
    Show {
        /// Topic ID.
        id: String,
    },
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let config = loader_config(&cli);
    let catalog = Catalog::from_outcome(runtime.block_on(load_with_recovery(&config)));

    match cli.command {
        Command::Topics(TopicsCommand::List) => {
            let topics = topics_or_notice(&catalog)?.topics().iter().collect();
            handle_list(topics, None, cli.json)
        }
        Command::Topics(TopicsCommand::Search { query }) => {
            let topics = topics_or_notice(&catalog)?.search(&query);
            handle_list(topics, Some(&query), cli.json)
        }
        Command::Topics(TopicsCommand::Show { id }) => handle_show(&catalog, &id, cli.json),
        Command::Render {
            out,
            query,
            open,
            focus,
            title,
        } => {
            let mut catalog = catalog;
            apply_view(&mut catalog, query.as_deref(), &open, focus.as_deref())?;
            handle_render(&catalog, title, out)
        }
        #[cfg(feature = "web")]
        Command::Serve { addr, title } => {
            let config = topic_catalog::web::WebConfig { addr, title };
            runtime.block_on(topic_catalog::web::serve(config, catalog))?;
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn loader_config(cli: &Cli) -> LoaderConfig {
    LoaderConfig {
        source: cli.data.clone(),
        recovery: cli.on_failure.into(),
        fetch_timeout: (cli.timeout_secs > 0).then(|| Duration::from_secs(cli.timeout_secs)),
    }
}

fn topics_or_notice(catalog: &Catalog) -> Result<&TopicCollection, Box<dyn Error>> {
    match catalog.provenance() {
        Provenance::Unavailable { notice } => Err(notice.clone().into()),
        Provenance::Loaded | Provenance::Fallback => Ok(catalog.collection()),
    }
}

fn apply_view(
    catalog: &mut Catalog,
    query: Option<&str>,
    open: &[String],
    focus: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    if let Some(query) = query {
        catalog.filter(query);
    }
    for id in open {
        catalog.expand(id)?;
    }
    if let Some(id) = focus {
        catalog.focus(id)?;
    }
    Ok(())
}

fn handle_list(
    topics: Vec<&Topic>,
    query: Option<&str>,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    if as_json {
        let payload = json!({
            "query": query,
            "results": topics,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_topic_table(&topics, query);
    }
    Ok(())
}

fn handle_show(catalog: &Catalog, id: &str, as_json: bool) -> Result<(), Box<dyn Error>> {
    let topic = topics_or_notice(catalog)?
        .get(id)
        .ok_or_else(|| format!("No topic found for id {id:?}"))?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(topic)?);
    } else {
        print_topic(topic);
    }
    Ok(())
}

fn handle_render(
    catalog: &Catalog,
    title: String,
    out: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let options = PageOptions {
        title,
        link_mode: LinkMode::Anchors,
    };
    let html = render_document(catalog, &options)?;
    match out {
        Some(path) => {
            fs::write(&path, html)?;
            info!(
                path = %path.display(),
                source = catalog.provenance().label(),
                "Wrote catalog page"
            );
        }
        None => println!("{html}"),
    }
    Ok(())
}

fn print_topic_table(rows: &[&Topic], query: Option<&str>) {
    if rows.is_empty() {
        match query {
            Some(query) => println!("No topics contain \"{query}\"."),
            None => println!("No topics loaded."),
        }
        return;
    }
    let width = rows
        .iter()
        .map(|topic| topic.id.chars().count())
        .max()
        .unwrap_or(2)
        .max("ID".len());
    let name_width = rows
        .iter()
        .map(|topic| topic.name.chars().count())
        .max()
        .unwrap_or(4)
        .max("NAME".len());
    if let Some(query) = query {
        println!("Matches for \"{query}\":");
    }
    println!("{:<width$}  {:<name_width$}  {}", "ID", "NAME", "SUMMARY");
    println!("{:-<width$}  {:-<name_width$}  {}", "", "", "-------");
    for topic in rows {
        println!(
            "{:<width$}  {:<name_width$}  {}",
            topic.id,
            topic.name,
            truncate_summary(&topic.description, SUMMARY_CHARS)
        );
    }
}

fn print_topic(topic: &Topic) {
    print!("{}", format_topic(topic));
}

/// Plain-text detail view; descriptions are printed verbatim.
fn format_topic(topic: &Topic) -> String {
    let mut out = format!("Topic: {} ({})\n", topic.name, topic.id);
    let description = topic.description.trim();
    if !description.is_empty() {
        out.push_str(&format!("\nDescription:\n{description}\n"));
    }
    out.push_str("\nLinks:\n");
    if topic.links.is_empty() {
        out.push_str("- <none>\n");
    }
    for link in &topic.links {
        out.push_str(&format!("- {} <{}>\n", link.title, link.url));
    }
    out
}
