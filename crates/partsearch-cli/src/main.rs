//! Partsearch CLI - search an electronic parts inventory

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use partsearch_core::config::Config;
use partsearch_core::search::{
    self, CompiledQuery, Filter, FormValues, ListPage, Number, SearchOutcome, SearchService,
    pipeline::spawn_lexer,
};
use partsearch_core::storage::{Database, NewPart, PartView};
use serde::Serialize;
use tracing::info;

#[derive(Parser)]
#[command(name = "partsearch")]
#[command(author, version, about = "Search an electronic parts inventory", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Catalog database (defaults to database.path from the config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the tokens of a query
    Tokens {
        /// Free-text query
        query: String,
    },

    /// Show the filter built from a query
    Filter {
        /// Free-text query
        query: String,
    },

    /// Show the SQL a query or list form compiles to
    Compile {
        /// Free-text query
        #[arg(required_unless_present = "form", conflicts_with = "form")]
        query: Option<String>,
        /// URL-encoded list form (e.g. "category=1&value=1k-2k&page=2")
        #[arg(long)]
        form: Option<String>,
    },

    /// Search the catalog
    Search {
        /// Free-text query
        query: String,
    },

    /// List parts matching form fields
    List {
        /// URL-encoded list form
        #[arg(long, default_value = "")]
        form: String,
    },

    /// Fill the catalog with demo parts
    Seed,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show all configuration values
    Show,
    /// Show the config file path
    Path,
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("partsearch=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        report_error(&err);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    let quiet = cli.quiet;

    match cli.command {
        Commands::Config { action } => cmd_config(action, format, quiet),

        Commands::Tokens { query } => cmd_tokens(&Config::load()?, &query, format).await,

        Commands::Filter { query } => cmd_filter(&Config::load()?, &query, format).await,

        Commands::Compile { query, form } => {
            cmd_compile(&Config::load()?, query.as_deref(), form.as_deref(), format).await
        }

        Commands::Search { query } => {
            let config = Config::load()?;
            let db = open_database(&config, cli.db).await?;
            cmd_search(&db, &config, &query, format, quiet).await
        }

        Commands::List { form } => {
            let config = Config::load()?;
            let db = open_database(&config, cli.db).await?;
            cmd_list(&db, &config, &form, format, quiet).await
        }

        Commands::Seed => {
            let config = Config::load()?;
            let db = open_database(&config, cli.db).await?;
            cmd_seed(&db, format, quiet).await
        }
    }
}

async fn open_database(config: &Config, db: Option<PathBuf>) -> anyhow::Result<Database> {
    let path = db.unwrap_or_else(|| config.database_path());
    Database::open(path).await
}

/// Print an error with its code and suggestion when it came from the core
fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<partsearch_core::Error>() {
        Some(e) => {
            eprintln!("Error [{}]: {}", e.code(), e);
            if let Some(suggestion) = e.suggestion() {
                eprintln!("  Suggestion: {}", suggestion);
            }
        }
        None => eprintln!("Error: {:#}", err),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_tokens(config: &Config, query: &str, format: OutputFormat) -> anyhow::Result<()> {
    let tokens = spawn_lexer(query, config.search.queue_capacity)
        .drain()
        .await;

    if format == OutputFormat::Json {
        return print_json(&tokens);
    }
    for token in &tokens {
        println!(
            "{:<6} {:>3}..{:<3} {:?}",
            token.kind.as_str(), token.span.start, token.span.end, token.text
        );
    }
    Ok(())
}

async fn cmd_filter(config: &Config, query: &str, format: OutputFormat) -> anyhow::Result<()> {
    let stream = spawn_lexer(query, config.search.queue_capacity);
    let filter = Filter::from_token_stream(stream, config.search.prefix_policy())
        .await
        .map_err(partsearch_core::Error::from)?;

    if format == OutputFormat::Json {
        return print_json(&filter);
    }
    print_filter(&filter);
    Ok(())
}

#[derive(Serialize)]
struct CompileOutput<'a> {
    filter: &'a Filter,
    sql: String,
    args: Vec<search::SqlArg>,
}

async fn cmd_compile(
    config: &Config,
    query: Option<&str>,
    form: Option<&str>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let (filter, compiled) = match form {
        Some(form) => search::compile_form(&FormValues::parse(form), &config.search),
        None => search::compile_query(query.unwrap_or_default(), &config.search).await,
    }
    .map_err(partsearch_core::Error::from)?;

    if format == OutputFormat::Json {
        return print_json(&CompileOutput {
            filter: &filter,
            sql: compiled.to_sql(),
            args: compiled.bind_args(),
        });
    }
    print_compiled(&compiled);
    Ok(())
}

async fn cmd_search(
    db: &Database,
    config: &Config,
    query: &str,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let service = SearchService::from_config(db, config)?;
    let outcome = service.search(query).await?;

    if format == OutputFormat::Json {
        return print_json(&outcome);
    }

    match &outcome {
        SearchOutcome::Exact(part) | SearchOutcome::Single(part) => {
            if !quiet {
                let how = if matches!(outcome, SearchOutcome::Exact(_)) {
                    "name match"
                } else {
                    "single match"
                };
                println!("Found part #{} ({}):", part.id, how);
            }
            print_part_details(part);
        }
        SearchOutcome::List(parts) if parts.is_empty() => {
            if !quiet {
                println!("No parts found.");
            }
        }
        SearchOutcome::List(parts) => {
            if !quiet {
                println!("{} parts:", parts.len());
            }
            print_part_table(parts);
        }
    }
    Ok(())
}

async fn cmd_list(
    db: &Database,
    config: &Config,
    form: &str,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let service = SearchService::from_config(db, config)?;
    let page: ListPage = service.list(&FormValues::parse(form)).await?;

    if format == OutputFormat::Json {
        return print_json(&page);
    }

    if page.parts.is_empty() {
        if !quiet {
            println!("No parts found.");
        }
    } else {
        print_part_table(&page.parts);
    }

    if !quiet {
        println!("\nPage {}", page.current_page);
        if let Some(prev) = &page.prev_query {
            println!("  prev: --form '{}'", prev);
        }
        if let Some(next) = &page.next_query {
            println!("  next: --form '{}'", next);
        }
    }
    Ok(())
}

async fn cmd_seed(db: &Database, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let catalog = db.catalog();

    if !catalog.categories().await?.is_empty() {
        if !quiet {
            println!("Catalog at {} already has data; nothing seeded.", db.location());
        }
        return Ok(());
    }

    let resistor = catalog
        .insert_category("Resistor", Some("Ohm"), Some("Ω"))
        .await?;
    let capacitor = catalog
        .insert_category("Capacitor", Some("Farad"), Some("F"))
        .await?;
    let inductor = catalog
        .insert_category("Inductor", Some("Henry"), Some("H"))
        .await?;
    let transistor = catalog.insert_category("Transistor", None, None).await?;

    let drawer_a = catalog.insert_place("Drawer A").await?;
    let drawer_b = catalog.insert_place("Drawer B").await?;
    let shelf = catalog.insert_place("Shelf 1").await?;

    let demo = [
        ("Carbon film resistor", "Through-hole, 1/4 W", Some("1k"), resistor, drawer_a, 120),
        ("Carbon film resistor", "Through-hole, 1/4 W", Some("4.7k"), resistor, drawer_a, 85),
        ("Metal film resistor", "1%, 0603", Some("4.7k"), resistor, drawer_b, 12),
        ("Metal film resistor", "1%, 0603", Some("100k"), resistor, drawer_b, 40),
        ("Ceramic capacitor", "X7R, 50 V", Some("100n"), capacitor, drawer_a, 200),
        ("Ceramic capacitor", "C0G, 50 V", Some("22p"), capacitor, drawer_a, 30),
        ("Electrolytic capacitor", "Radial, 25 V", Some("470μ"), capacitor, shelf, 6),
        ("Power inductor", "Shielded SMD", Some("10μ"), inductor, drawer_b, 15),
        ("BC547", "NPN general purpose", None, transistor, shelf, 50),
        ("2N7000", "N-channel MOSFET", None, transistor, shelf, 0),
    ];

    let mut inserted = 0;
    for (name, description, value, category, place, amount) in demo {
        let mut part = NewPart::new(name, category)
            .with_description(description)
            .with_place(place)
            .with_amount(amount);
        if let Some(value) = value {
            part = part.with_value(Number::parse(value)?.value());
        }
        catalog.insert_part(&part).await?;
        inserted += 1;
    }

    info!(parts = inserted, location = %db.location(), "Seeded demo catalog");

    if format == OutputFormat::Json {
        return print_json(&serde_json::json!({
            "path": db.location().to_string(),
            "categories": catalog.categories().await?,
            "places": catalog.places().await?,
            "parts": inserted,
        }));
    }
    if !quiet {
        println!("Seeded {} parts into {}", inserted, db.location());
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let config = Config::load()?;
            if format == OutputFormat::Json {
                return print_json(&config);
            }
            for (key, value) in config.list()? {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            println!("{}", config.get(&key)?);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
    }
    Ok(())
}

// ============================================================================
// Rendering
// ============================================================================

fn print_filter(filter: &Filter) {
    if filter.is_empty() {
        println!("(empty filter: matches every part)");
        return;
    }
    if !filter.keywords.is_empty() {
        println!("keywords:   {}", filter.keywords.join(", "));
    }
    if let Some(name) = &filter.name {
        println!("name:       {}", name);
    }
    if let Some(value) = &filter.value {
        let kind = if value.is_exact() { "exact" } else { "range" };
        println!("value:      {} ({})", value, kind);
    }
    if let Some(unit) = &filter.unit {
        println!("unit:       {}", unit);
    }
    if let Some(stock) = &filter.stock {
        println!("stock:      {}", stock);
    }
    if !filter.categories.is_empty() {
        println!("categories: {}", join_ids(&filter.categories));
    }
    if !filter.places.is_empty() {
        println!("places:     {}", join_ids(&filter.places));
    }
    if let Some(id) = filter.cursor.last_id {
        println!("after id:   {}", id);
    } else if let Some(id) = filter.cursor.first_id {
        println!("before id:  {}", id);
    }
    if let Some(page) = filter.page {
        println!("page:       {}", page);
    }
}

fn join_ids<'a>(ids: impl IntoIterator<Item = &'a i64>) -> String {
    ids.into_iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_compiled(compiled: &CompiledQuery) {
    println!("{}", compiled.to_sql());
    let args = compiled
        .bind_args()
        .iter()
        .map(|arg| arg.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    println!("args: [{}]", args);
}

fn print_part_table(parts: &[PartView]) {
    println!(
        "{:>5}  {:<26} {:>10} {:>7}  {}",
        "ID", "NAME", "VALUE", "STOCK", "PLACE"
    );
    for part in parts {
        println!(
            "{:>5}  {:<26} {:>10} {:>7}  {}",
            part.id,
            part.name,
            format_value(part),
            part.amount,
            part.place_name.as_deref().unwrap_or("-")
        );
    }
}

fn print_part_details(part: &PartView) {
    println!("  Name:     {}", part.name);
    if let Some(description) = &part.description {
        println!("  About:    {}", description);
    }
    println!("  Category: {}", part.category_name);
    println!("  Value:    {}", format_value(part));
    println!("  Stock:    {}", part.amount);
    println!("  Place:    {}", part.place_name.as_deref().unwrap_or("-"));
}

/// Render a value with its canonical prefix and the category's unit symbol
fn format_value(part: &PartView) -> String {
    let Some(value) = part.value else {
        return "-".to_string();
    };
    let canon = Number::new(value).canon();
    let significand = format!("{:.3}", canon.significand);
    let significand = significand.trim_end_matches('0').trim_end_matches('.');
    format!(
        "{}{}{}",
        significand,
        canon.prefix.symbol(),
        part.unit_symbol.as_deref().unwrap_or("")
    )
}
