use std::fs;
use std::sync::Arc;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use serde::Serialize;
use tracing::info;

use promptcatalog::cli::{Cli, CollectionCommand, Command};
use promptcatalog::config::Config;
use promptcatalog::{
    CatalogWatcher, CollectionRegistry, CollectionUpdate, CollectionsSnapshot, Source, StrategyCatalog,
    StrategyDocument, StrategyFilter, StrategyService,
};

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to serialize output")?);
    Ok(())
}

fn source_tag(source: Source) -> ColoredString {
    match source {
        Source::BuiltIn => source.as_str().dimmed(),
        Source::Custom => source.as_str().magenta(),
    }
}

fn print_strategy_line(doc: &StrategyDocument) {
    println!(
        "{} {} [{}] {}",
        doc.key.cyan(),
        doc.name,
        source_tag(doc.source),
        doc.description.dimmed()
    );
}

fn print_strategy(doc: &StrategyDocument) {
    println!("{} ({})", doc.name.bold(), doc.key.cyan());
    println!("  Category: {}", doc.category);
    println!("  Source: {}", source_tag(doc.source));
    println!("  Complexity: {}", doc.complexity);
    println!("  Time investment: {}", doc.time_investment);
    if !doc.description.is_empty() {
        println!("  {}", doc.description);
    }
    if let Some(best_for) = &doc.best_for {
        println!("  Best for: {}", best_for.join(", "));
    }
    if let Some(triggers) = &doc.triggers {
        println!("  Triggers: {}", triggers.join(", "));
    }
    for example in &doc.examples {
        println!("  {} {}", "-".dimmed(), example);
    }
    println!();
    println!("{}", doc.template);
}

fn open_service(config: &Config) -> Result<StrategyService> {
    let roots = config.catalog.roots();
    let catalog = StrategyCatalog::initialize_with_ttl(roots.clone(), config.cache.content_ttl())
        .context(format!("Failed to load strategies from {}", roots.builtin.display()))?;
    let registry = CollectionRegistry::open(config.collections.resolve_path());
    Ok(StrategyService::new(Arc::new(catalog), registry, &config.cache))
}

async fn watch(service: &StrategyService, config: &Config) -> Result<()> {
    if !config.watch.enabled {
        println!("{} Watching is disabled in the configuration", "!".yellow());
        return Ok(());
    }

    let watcher =
        CatalogWatcher::spawn(Arc::clone(service.catalog()), &config.watch).context("Failed to start watcher")?;
    for root in service.catalog().roots().all() {
        println!("{} Watching {}", "✓".green(), root.display());
    }
    println!("Press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    watcher.shutdown();
    service.catalog().shutdown();
    Ok(())
}

fn run_collection(service: &StrategyService, command: CollectionCommand) -> Result<()> {
    match command {
        CollectionCommand::Create { key, name, description } => {
            let name = name.unwrap_or_else(|| key.clone());
            service.create_collection(&key, &name, &description)?;
            println!("{} Created collection: {}", "✓".green(), key.cyan());
        }
        CollectionCommand::Delete { key } => {
            service.delete_collection(&key)?;
            println!("{} Deleted collection: {}", "✓".green(), key);
        }
        CollectionCommand::Add { key, strategy } => {
            if service.get_strategy(&strategy).is_none() {
                println!("{} Unknown strategy: {}", "!".yellow(), strategy);
            }
            if service.add_to_collection(&key, &strategy)? {
                println!("{} Added {} to {}", "✓".green(), strategy.cyan(), key);
            } else {
                println!("{} already in {}", strategy.cyan(), key);
            }
        }
        CollectionCommand::Remove { key, strategy } => {
            if service.remove_from_collection(&key, &strategy)? {
                println!("{} Removed {} from {}", "✓".green(), strategy.cyan(), key);
            } else {
                println!("{} not in {}", strategy.cyan(), key);
            }
        }
        CollectionCommand::Update { key, name, description } => {
            service.update_collection(&key, CollectionUpdate { name, description })?;
            println!("{} Updated collection: {}", "✓".green(), key.cyan());
        }
        CollectionCommand::List { json } => {
            let collections = service.list_collections();
            if json {
                print_json(&collections)?;
            } else if collections.is_empty() {
                println!("No collections found");
            } else {
                for (key, collection) in &collections {
                    println!(
                        "{} {} ({} strategies) {}",
                        key.cyan(),
                        collection.name,
                        collection.strategies.len(),
                        collection.description.dimmed()
                    );
                }
            }
        }
        CollectionCommand::Show { key, json } => {
            let collection = service
                .get_collection(&key)
                .ok_or_else(|| eyre::eyre!("Collection '{}' not found", key))?;
            if json {
                print_json(&collection)?;
            } else {
                println!("{} ({})", collection.name.bold(), key.cyan());
                if !collection.description.is_empty() {
                    println!("  {}", collection.description);
                }
                println!("  Updated: {}", collection.updated.to_rfc3339().dimmed());
                for strategy in &collection.strategies {
                    match service.get_strategy(strategy) {
                        Some(doc) => println!("  {} {}", strategy.cyan(), doc.name),
                        None => println!("  {} {}", strategy.red(), "(unknown)".dimmed()),
                    }
                }
            }
        }
        CollectionCommand::Validate { key, json } => {
            let result = service
                .validate_collection(&key)
                .ok_or_else(|| eyre::eyre!("Collection '{}' not found", key))?;
            if json {
                print_json(&result)?;
            } else {
                for strategy in &result.valid {
                    println!("{} {}", "✓".green(), strategy);
                }
                for strategy in &result.invalid {
                    println!("{} {}", "✗".red(), strategy);
                }
            }
        }
        CollectionCommand::Export { output } => {
            let snapshot = service.export_collections();
            let content = serde_json::to_string_pretty(&snapshot).context("Failed to serialize collections")?;
            match output {
                Some(path) => {
                    fs::write(&path, content).context(format!("Failed to write {}", path.display()))?;
                    println!("{} Exported to {}", "✓".green(), path.display());
                }
                None => println!("{}", content),
            }
        }
        CollectionCommand::Import { file } => {
            let content = fs::read_to_string(&file).context(format!("Failed to read {}", file.display()))?;
            let snapshot: CollectionsSnapshot =
                serde_json::from_str(&content).context(format!("Failed to parse {}", file.display()))?;
            let count = snapshot.collections.len();
            service.import_collections(snapshot)?;
            println!("{} Imported {} collections", "✓".green(), count);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    let service = open_service(&config)?;

    match cli.command {
        Command::List {
            source,
            collection,
            json,
        } => {
            let docs = service.list_strategies(&StrategyFilter { source, collection });
            if json {
                let summaries: Vec<_> = docs.iter().map(|d| d.summary()).collect();
                print_json(&summaries)?;
            } else if docs.is_empty() {
                println!("No strategies found");
            } else {
                for doc in &docs {
                    print_strategy_line(doc);
                }
            }
        }
        Command::Show { key, json } => {
            let doc = service
                .get_strategy(&key)
                .ok_or_else(|| eyre::eyre!("Strategy '{}' not found", key))?;
            if json {
                print_json(doc.as_ref())?;
            } else {
                print_strategy(&doc);
            }
        }
        Command::Categories { json } => {
            let categories = service.get_all_categories_metadata();
            if json {
                print_json(&categories)?;
            } else {
                for (key, meta) in &categories {
                    println!("{} {} {}", key.cyan(), meta.category.bold(), meta.description.dimmed());
                    for summary in &meta.strategies {
                        println!("  {} {}", summary.key, summary.name.dimmed());
                    }
                }
            }
        }
        Command::Health { json } => {
            let health = service.health();
            if json {
                print_json(&health)?;
            } else {
                let status = if health.healthy { "healthy".green() } else { "unhealthy".red() };
                println!("Catalog: {} ({})", status, health.catalog.state);
                println!("  Generation: {}", health.catalog.generation);
                println!(
                    "  Strategies: {} ({} built-in, {} custom)",
                    health.catalog.strategies, health.catalog.builtin, health.catalog.custom
                );
                println!("  Categories: {}", health.catalog.categories);
                println!("  Collections: {}", health.collections);
                for skipped in &health.catalog.skipped {
                    println!("  {} {}: {}", "skipped".yellow(), skipped.path.display(), skipped.reason);
                }
            }
        }
        Command::Watch => watch(&service, &config).await?,
        Command::Collection { command } => run_collection(&service, command)?,
    }

    Ok(())
}
