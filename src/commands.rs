//! CLI command runners.
//!
//! Each `run_*` function backs one `invento` subcommand and prints a
//! human-readable report to stdout. Errors propagate to `main`, which
//! prints the chain and exits non-zero.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};

use crate::bootstrap::{self, Bootstrap, SeedSet};
use crate::catalog::{Catalog, Page, MAX_STOCK_INCREMENT};
use crate::config::Config;
use crate::index::{self, SearchIndex};
use crate::models::ItemRecord;
use crate::server;

fn catalog(config: &Config) -> Result<Catalog> {
    let index = index::connect(&config.index)?;
    Ok(Catalog::new(index, config.search.clone()))
}

fn print_record(record: &ItemRecord) {
    let item = &record.item;
    println!("--- Item ---");
    println!("id:          {}", record.id);
    if let Some(version) = record.version {
        println!("version:     {}", version);
    }
    println!("name:        {}", item.name);
    println!("description: {}", item.description);
    println!("stock:       {}", item.stock);
    if let Some(ref image) = item.image {
        println!("image:       {}", image);
    }
    if let Some(created) = item.created {
        println!("created:     {}", created.to_rfc3339());
    }
    if !item.tags.is_empty() {
        let tags: Vec<&str> = item.tags.iter().map(String::as_str).collect();
        println!("tags:        {}", tags.join(", "));
    }
    if let Some(loc) = item.location {
        println!("location:    {}, {}", loc.lat, loc.lon);
    }
}

fn report_bootstrap(index: &dyn SearchIndex, outcome: Bootstrap) {
    match outcome {
        Bootstrap::Created => println!("Index '{}' created.", index.name()),
        Bootstrap::AlreadyPresent => println!("Index '{}' already present.", index.name()),
    }
}

pub async fn run_init(config: &Config) -> Result<()> {
    let index = index::connect(&config.index)?;
    let outcome = bootstrap::ensure_index(index.as_ref(), &config.index).await?;
    report_bootstrap(index.as_ref(), outcome);
    Ok(())
}

/// Prepare the index, then serve HTTP until Ctrl-C.
///
/// With `reset`, the index is dropped and reseeded with the demo catalog
/// instead of being checked.
pub async fn run_serve(config: &Config, reset: bool) -> Result<()> {
    let index = index::connect(&config.index)?;
    let info = index.info().await?;
    tracing::info!(backend = %info.backend, version = %info.version, "connected to index backend");

    if reset {
        let report = bootstrap::reset_and_seed(index.as_ref(), &config.index, &SeedSet::demo())
            .await?;
        println!(
            "Index '{}' reset with {} demo items.",
            index.name(),
            report.ids.len()
        );
    } else {
        let outcome = bootstrap::ensure_index(index.as_ref(), &config.index).await?;
        report_bootstrap(index.as_ref(), outcome);
    }

    let catalog = Catalog::new(Arc::clone(&index), config.search.clone());
    server::run_server(config, catalog).await
}

pub async fn run_seed(config: &Config, file: Option<&Path>) -> Result<()> {
    let seed = match file {
        Some(path) => SeedSet::from_file(path)?,
        None => SeedSet::demo(),
    };
    let index = index::connect(&config.index)?;
    let report = bootstrap::reset_and_seed(index.as_ref(), &config.index, &seed).await?;

    if report.dropped_existing {
        println!("Dropped existing index '{}'.", index.name());
    }
    println!("Seeded {} items into '{}':", report.ids.len(), index.name());
    for id in &report.ids {
        println!("  {}", id);
    }
    Ok(())
}

pub async fn run_drop(config: &Config) -> Result<()> {
    let index = index::connect(&config.index)?;
    if bootstrap::drop_index(index.as_ref()).await? {
        println!("Index '{}' deleted.", index.name());
    } else {
        println!("Index '{}' does not exist.", index.name());
    }
    Ok(())
}

pub async fn run_info(config: &Config) -> Result<()> {
    let index = index::connect(&config.index)?;
    let info = index.info().await?;
    println!("backend:  {}", info.backend);
    println!("version:  {}", info.version);
    println!("index:    {}", index.name());

    if !index.exists().await? {
        println!("status:   missing (run `invento init`)");
        return Ok(());
    }
    let problems = crate::schema::mapping_mismatches(&index.mapping().await?);
    if problems.is_empty() {
        println!("status:   ok");
    } else {
        println!("status:   incompatible mapping");
        for problem in problems {
            println!("  {}", problem);
        }
    }
    Ok(())
}

pub async fn run_get(config: &Config, id: &str) -> Result<()> {
    match catalog(config)?.get_item(id).await? {
        Some(record) => print_record(&record),
        None => bail!("item not found: {}", id),
    }
    Ok(())
}

pub async fn run_search(config: &Config, name: &str, page: Page) -> Result<()> {
    if name.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }
    let results = catalog(config)?.search_by_name(name, page).await?;

    if results.items.is_empty() {
        println!("No results.");
    } else {
        println!(
            "Showing {} of {} items named '{}':\n",
            results.items.len(),
            results.total,
            name.trim()
        );
        for (i, record) in results.items.iter().enumerate() {
            println!("{}. {} (stock {})", i + 1, record.item.name, record.item.stock);
            println!("    id: {}", record.id);
            if !record.item.description.is_empty() {
                println!("    {}", record.item.description);
            }
            println!();
        }
    }
    if results.skipped > 0 {
        println!("({} unreadable documents skipped)", results.skipped);
    }
    Ok(())
}

pub async fn run_create(config: &Config, name: &str, description: &str) -> Result<()> {
    let record = catalog(config)?.create_item(name, description).await?;
    println!("Created item {}.", record.id);
    print_record(&record);
    Ok(())
}

pub async fn run_rename(config: &Config, id: &str, name: &str) -> Result<()> {
    match catalog(config)?.rename_item(id, name).await? {
        Some(record) => print_record(&record),
        None => bail!("item not found: {}", id),
    }
    Ok(())
}

pub async fn run_stock(config: &Config, id: &str, by: u64) -> Result<()> {
    if !(1..=MAX_STOCK_INCREMENT).contains(&by) {
        bail!("--by must be between 1 and {}", MAX_STOCK_INCREMENT);
    }
    match catalog(config)?.increment_stock(id, by).await? {
        Some(record) => print_record(&record),
        None => bail!("item not found: {}", id),
    }
    Ok(())
}
