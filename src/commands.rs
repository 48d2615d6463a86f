//! One-shot CLI commands: catalog listing, a single question, feedback for a
//! past run, and a connectivity check.

use anyhow::{bail, Result};
use uuid::Uuid;

use crate::catalog::{load_catalog, Catalog};
use crate::config::Config;
use crate::feedback::{FeedbackOutcome, FeedbackScale};
use crate::services::ChatServices;
use crate::session::ChatSession;

pub fn run_catalog(config: &Config) -> Result<()> {
    let catalog = load_catalog(&config.catalog.path)?;
    print!("{}", render_catalog(&catalog));
    Ok(())
}

fn render_catalog(catalog: &Catalog) -> String {
    if catalog.is_empty() {
        return "Catalog is empty.\n".to_string();
    }

    let mut out = String::new();
    for year in catalog.years() {
        out.push_str(year);
        out.push('\n');
        for quarter in catalog.quarters(year).into_iter().flatten() {
            out.push_str(&format!("  {}\n", quarter));
            for doc in catalog.documents(year, quarter).unwrap_or_default() {
                out.push_str(&format!("    {}\n", doc));
            }
        }
    }
    out.push_str(&format!("{} documents\n", catalog.document_count()));
    out
}

pub async fn run_ask(
    config: &Config,
    year: &str,
    quarter: &str,
    file: &str,
    question: &str,
) -> Result<()> {
    let services = ChatServices::from_config(config)?;
    let metadata = services.catalog.resolve(year, quarter, file)?;

    let mut session = ChatSession::new();
    session.select(metadata, &services.chains).await?;
    let answer = session.ask(question, &services.orchestrator).await?;

    println!("{}", answer.answer);
    println!();
    println!("run_id: {}", answer.run_id);
    Ok(())
}

pub async fn run_feedback(
    config: &Config,
    run_id: Uuid,
    scale: FeedbackScale,
    symbol: &str,
    comment: Option<&str>,
) -> Result<()> {
    let services = ChatServices::from_config(config)?;

    match services
        .recorder
        .record(run_id, scale, symbol, comment)
        .await?
    {
        FeedbackOutcome::Recorded { record, receipt } => {
            println!("feedback_id: {}", receipt.feedback_id);
            println!("feedback_type: {}", record.category);
            println!("score: {}", receipt.score);
        }
        FeedbackOutcome::Rejected { warning } => {
            eprintln!("Warning: {}", warning);
        }
    }
    Ok(())
}

pub async fn run_check(config: &Config) -> Result<()> {
    let services = ChatServices::from_config(config)?;
    println!("credentials: ok");
    println!("catalog: {} documents", services.catalog.document_count());

    match services.index.get().await {
        Ok(index) => println!("index: {} ok", index.name()),
        Err(e) => bail!("index: {}", e),
    }
    Ok(())
}
