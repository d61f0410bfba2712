//! One-shot CLI: run a natural-language query through the pipeline and
//! print the outcome as JSON.

use clap::Parser;
use mosaic_segments::config::Config;
use mosaic_segments::db;
use mosaic_segments::generator::SqlGenerator;
use mosaic_segments::llm::LlmClient;
use mosaic_segments::pipeline::QueryPipeline;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "run_query", about = "Translate a natural-language query to SQL, execute it, and segment the results")]
struct Args {
    /// Natural-language query, e.g. "show all users"
    query: String,

    /// Re-introspect the schema instead of using the cached copy
    #[arg(long)]
    refresh_schema: bool,

    /// Only preview: print the validated SQL and row count, do not fetch rows
    #[arg(long)]
    preview: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    let pool = db::init_pool(&config.database_url).await?;
    let llm = LlmClient::new(
        config.openai_api_key.clone(),
        config.openai_model.clone(),
        config.openai_base_url.clone(),
    );
    let pipeline = QueryPipeline::new(pool, SqlGenerator::new(Arc::new(llm)));

    if args.refresh_schema {
        pipeline.introspector().get_schema(true).await?;
    }

    if args.preview {
        let preview = pipeline.preview(&args.query).await?;
        println!("{}", serde_json::to_string_pretty(&preview)?);
    } else {
        let outcome = pipeline.run(&args.query).await;
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }

    Ok(())
}
