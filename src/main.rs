//! # Law Ontology Main Driver
//!
//! ## Purpose
//! Command-line entry point for the legal-document ontology pipeline:
//! document ingestion, article search and lookup, and graph inspection.
//!
//! ## Input/Output Specification
//! - **Input**: Configuration file, command line arguments, environment variables
//! - **Output**: Human-readable or JSON command results on stdout
//! - **Initialization**: Loads configuration, initializes logging, opens the graph
//!
//! ## Key Features
//! - Subcommand interface over one persisted graph file
//! - Configuration overrides from the command line and environment
//! - Structured logging to stdout or a file, optionally as JSON
//! - Machine-readable output mode for scripting
//!
//! ## Architecture Flow
//! 1. Parse command line arguments and load configuration
//! 2. Initialize logging and tracing
//! 3. Open the ontology store (and pipeline components where needed)
//! 4. Execute the requested subcommand
//! 5. Report the result and propagate failures with their category

use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use law_ontology::{
    config::Config,
    errors::{PipelineError, Result},
    ontology::OntologyStore,
    page_index::{PageCacheKey, PageIndexCache},
    parser::{extract_article_title, paginated::PdfPages},
    pipeline::DocumentPipeline,
    utils::TextUtils,
};

fn main() -> anyhow::Result<()> {
    let matches = build_cli().get_matches();

    // Load configuration
    let config_path = matches.get_one::<String>("config").unwrap();
    let mut config = Config::from_file(config_path)?;

    // Override graph location if specified
    if let Some(graph) = matches.get_one::<String>("graph") {
        config.ontology.graph_path = PathBuf::from(graph);
    }

    // Initialize logging
    init_logging(&config)?;

    info!("Starting law ontology pipeline v0.1.0");
    info!("Configuration loaded from: {}", config_path);

    let json = matches.get_flag("json");
    let outcome = match matches.subcommand() {
        Some(("ingest", sub)) => cmd_ingest(&config, sub, json),
        Some(("search", sub)) => cmd_search(&config, sub, json),
        Some(("article", sub)) => cmd_article(&config, sub, json),
        Some(("laws", _)) => cmd_laws(&config, json),
        Some(("stats", _)) => cmd_stats(&config, json),
        _ => Ok(()),
    };

    if let Err(e) = &outcome {
        error!("Command failed [{}]: {}", e.category(), e);
    }
    Ok(outcome?)
}

fn build_cli() -> Command {
    Command::new("law-ontology")
        .version("0.1.0")
        .author("Legal Ontology Team")
        .about("Legal document ingestion pipeline with an RDF-backed ontology")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml")
                .global(true),
        )
        .arg(
            Arg::new("graph")
                .long("graph")
                .value_name("FILE")
                .help("Override the persisted graph path")
                .global(true),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Machine-readable JSON output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("ingest")
                .about("Ingest a document and persist the updated graph")
                .arg(
                    Arg::new("file")
                        .value_name("FILE")
                        .help("Source document (xml, html, pdf, txt)")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("search")
                .about("Search articles by terminology or full text")
                .arg(
                    Arg::new("query")
                        .value_name("QUERY")
                        .help("Search text")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("article")
                .about("Look up one article of a law by its number")
                .arg(
                    Arg::new("number")
                        .value_name("NUMBER")
                        .help("Article number, e.g. 5 or 5.1")
                        .required(true),
                )
                .arg(
                    Arg::new("law")
                        .long("law")
                        .value_name("LAW_ID")
                        .help("Law identifier, e.g. закон_о_тишине")
                        .required(true),
                )
                .arg(
                    Arg::new("source")
                        .long("source")
                        .value_name("FILE")
                        .help("Paginated source file to locate the article's page in"),
                ),
        )
        .subcommand(Command::new("laws").about("List laws recorded in the graph"))
        .subcommand(Command::new("stats").about("Show graph statistics"))
}

/// Initialize logging and tracing
fn init_logging(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .map_err(|_| PipelineError::Config {
            message: format!("Invalid log level: {}", config.logging.level),
        })?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true);

    let layer: Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync> =
        match (&config.logging.file_path, config.logging.json_format) {
            (Some(path), true) => fmt_layer
                .json()
                .with_writer(open_log_file(path)?)
                .boxed(),
            (Some(path), false) => fmt_layer
                .with_ansi(false)
                .with_writer(open_log_file(path)?)
                .boxed(),
            (None, true) => fmt_layer.json().boxed(),
            (None, false) => fmt_layer.boxed(),
        };

    tracing_subscriber::registry().with(layer).with(filter).init();
    Ok(())
}

fn open_log_file(path: &Path) -> Result<Mutex<std::fs::File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    Ok(Mutex::new(file))
}

fn cmd_ingest(config: &Config, args: &ArgMatches, json: bool) -> Result<()> {
    let file = PathBuf::from(args.get_one::<String>("file").unwrap());
    let mut pipeline = DocumentPipeline::new(config)?;
    let summary = pipeline.ingest(&file)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Закон: {} ({})", summary.law_id, summary.law_iri);
    println!(
        "Глав: {}, статей: {}, терминов: {}",
        summary.chapters, summary.articles, summary.terms
    );
    println!(
        "Связей терминов: {}, ссылочных рёбер: {}",
        summary.term_links, summary.reference_edges
    );
    if !summary.key_terms.is_empty() {
        let preview: Vec<String> = summary
            .key_terms
            .iter()
            .take(10)
            .map(|t| format!("{} ({})", t.term, t.frequency))
            .collect();
        println!("Ключевые термины: {}", preview.join(", "));
    }
    println!("Граф сохранён: {}", summary.graph_path.display());
    Ok(())
}

fn cmd_search(config: &Config, args: &ArgMatches, json: bool) -> Result<()> {
    let query = args.get_one::<String>("query").unwrap();
    let store = OntologyStore::open(&config.ontology)?;
    let rows = store.search_articles_by_term(query)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("Ничего не найдено по запросу '{}'", query);
        return Ok(());
    }
    println!("Найдено статей: {}", rows.len());
    for row in &rows {
        let number = row["article_number"].as_deref().unwrap_or("?");
        let law = row["law_title"].as_deref().unwrap_or("без закона");
        println!("\nСтатья {} — {}", number, law);
        if let Some(text) = row["article_text"].as_deref() {
            println!("  {}", TextUtils::preview(text, 160));
        }
    }
    Ok(())
}

fn cmd_article(config: &Config, args: &ArgMatches, json: bool) -> Result<()> {
    let number = args.get_one::<String>("number").unwrap();
    let law_id = args.get_one::<String>("law").unwrap();
    let store = OntologyStore::open(&config.ontology)?;
    let law_iri = store.law_iri(law_id);
    let row = store.get_article_by_number(&law_iri, number)?;

    let located_page = match args.get_one::<String>("source") {
        Some(source) => locate_page(Path::new(source), number)?,
        None => None,
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "article": row,
                "source_page": located_page,
            }))?
        );
        return Ok(());
    }

    match row {
        None => println!("Статья {} не найдена в законе '{}'", number, law_id),
        Some(row) => {
            println!("Статья {} закона '{}'", number, law_id);
            if let Some(page) = row["article_page"].as_deref() {
                println!("Страница в графе: {}", page);
            }
            if let Some(text) = row["article_text"].as_deref() {
                if let Some(title) = extract_article_title(text) {
                    println!("Название: {}", title);
                }
                println!("{}", text);
            }
        }
    }
    if let Some(page) = located_page {
        println!("Страница в источнике: {}", page);
    }
    Ok(())
}

/// Scan a paginated source for the article's first page through the page
/// index cache
fn locate_page(source: &Path, number: &str) -> Result<Option<u32>> {
    let pages = PdfPages::open(source)?;
    let cache = PageIndexCache::new()?;
    let key = PageCacheKey::for_file(source)?;
    let page = cache.find_article_page(&key, &pages, number)?;
    if page.is_none() {
        info!("Article {} has no page header in {}", number, source.display());
    }
    Ok(page)
}

fn cmd_laws(config: &Config, json: bool) -> Result<()> {
    let store = OntologyStore::open(&config.ontology)?;
    let rows = store.laws()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("Законов в графе: {}", rows.len());
    for row in &rows {
        println!(
            "  {} — {}",
            row["law"].as_deref().unwrap_or("?"),
            row["title"].as_deref().unwrap_or("без названия")
        );
    }
    Ok(())
}

fn cmd_stats(config: &Config, json: bool) -> Result<()> {
    let store = OntologyStore::open(&config.ontology)?;
    let stats = store.stats();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Законы: {}", stats.laws);
    println!("Главы: {}", stats.chapters);
    println!("Статьи: {}", stats.articles);
    println!("Термины: {}", stats.terms);
    println!("Всего триплетов: {}", stats.triples);
    Ok(())
}
