//! Roster demo: seed the sample teams and print a paged member search

use anyhow::{Context, Result};

use rosterql::config::Config;
use rosterql::db::{Database, MemberSearchCondition, seed_sample_data};
use rosterql::logging::init_tracing;
use rosterql::orm::{Order, PageRequest, Sort};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first so the log format is known before tracing starts
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("Failed to load configuration")?;

    init_tracing(&config)?;
    tracing::info!("Starting rosterql");

    let db = Database::from_config(&config).await?;

    let sync = db.sync_schema().await;
    if !sync.is_ok() {
        anyhow::bail!("Schema sync failed: {}", sync.errors.join("; "));
    }
    tracing::info!(
        tables_created = sync.tables_created.len(),
        columns_added = sync.columns_added.len(),
        "Schema synchronized"
    );

    if config.seed_sample_data {
        let seeded = seed_sample_data(&db).await?;
        if !seeded.is_empty() {
            tracing::info!(members = seeded.members.len(), "Sample roster ready");
        }
    }

    let condition = MemberSearchCondition {
        age_goe: Some(20),
        ..Default::default()
    };
    let request = PageRequest::of(0, config.default_page_size)?
        .with_max_size(config.max_page_size)
        .with_sort(Sort::by([Order::desc("age"), Order::asc("username").nulls_last()]));

    let members = db.members();
    let page = members.search_page(&condition, &request).await?;
    tracing::info!(
        total = page.total(),
        returned = page.content().len(),
        "Member search finished"
    );

    let rows = members.search(&condition).await?;
    println!("{}", serde_json::to_string_pretty(&rows)?);
    println!("{}", serde_json::to_string_pretty(&page)?);

    db.close().await;
    Ok(())
}
