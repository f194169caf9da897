use anyhow::{Context, Result};
use sheet_translator::{
    config::Config,
    openai::OpenAiTranslator,
    sheet::{translate_grid, Grid},
    storage::JsonFileStorage,
    CacheError, TranslationCache,
};
use std::io::Read;
use tracing::info;

const USAGE: &str = "Usage: sheet-translator <text> <language> [<language>...]\n       \
                     sheet-translator --grid < grid.json";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when the variables are set directly)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sheet_translator=info".parse()?),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let first = args.next().context(USAGE)?;
    let rest: Vec<String> = args.collect();

    let config = Config::from_env()?;

    let translator = OpenAiTranslator::from_config(reqwest::Client::new(), &config);
    let storage = JsonFileStorage::new(&config.cache_file);
    let cache_path = storage.path().display().to_string();
    let cache = TranslationCache::load(translator, storage, config.translation_timeout)
        .context(format!("Failed to load cache from {}", cache_path))?;

    if first == "--grid" {
        // Grid is a JSON array of rows, each an array of strings or nulls
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("Failed to read grid from stdin")?;
        let mut grid: Grid = serde_json::from_str(&input).context("Failed to parse grid JSON")?;

        let report = translate_grid(&cache, &mut grid, config.translation_concurrency)
            .await
            .map_err(|e| describe(e, &cache_path))?;
        info!(
            "Filled {} cells, skipped {} rows",
            report.cells_translated, report.rows_skipped
        );
        println!("{}", serde_json::to_string_pretty(&grid)?);
    } else {
        if rest.is_empty() {
            anyhow::bail!(USAGE);
        }
        for language in &rest {
            let translated = cache
                .get_or_translate(&first, language)
                .await
                .map_err(|e| describe(e, &cache_path))?;
            println!("{}: {}", language.trim(), translated);
        }
    }

    info!(
        "Cache metrics: {}",
        serde_json::to_string(&cache.metrics().report())?
    );
    Ok(())
}

/// Say which side failed: the translation service, or the cache file
fn describe(error: CacheError, cache_path: &str) -> anyhow::Error {
    if error.is_external() {
        anyhow::Error::new(error).context("Translation service request failed")
    } else {
        anyhow::Error::new(error).context(format!("Could not update cache file {}", cache_path))
    }
}
