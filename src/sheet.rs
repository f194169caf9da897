//! Fills a spreadsheet grid with translations.
//!
//! Layout: row 0 holds target-language labels from column 1 onwards; column 0
//! of every later row holds an English source sentence. Each `(row, col)` cell
//! receives the translation of the row's sentence into the column's language.
//! Blank sentences and blank labels are skipped without consulting the cache.

use crate::cache::TranslationCache;
use crate::error::CacheError;
use crate::translator::Translator;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info};

/// A sheet as rows of optional cell values
pub type Grid = Vec<Vec<Option<String>>>;

/// What a call to [`translate_grid`] did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridReport {
    pub cells_translated: usize,
    pub rows_skipped: usize,
}

fn non_blank(cell: Option<&Option<String>>) -> Option<&str> {
    cell.and_then(|value| value.as_deref())
        .filter(|value| !value.trim().is_empty())
}

/// `(column, language)` for every non-blank label in the header row
fn target_languages(grid: &Grid) -> Vec<(usize, String)> {
    let Some(header) = grid.first() else {
        return Vec::new();
    };

    (1..header.len())
        .filter_map(|col| non_blank(header.get(col)).map(|language| (col, language.to_string())))
        .collect()
}

/// Translate every source sentence into every labelled language, writing the
/// results into the grid. Up to `concurrency` cells of a row are in flight at
/// once. The first failure stops processing and is returned.
pub async fn translate_grid<T: Translator>(
    cache: &TranslationCache<T>,
    grid: &mut Grid,
    concurrency: usize,
) -> Result<GridReport, CacheError> {
    let languages = target_languages(grid);
    let mut report = GridReport::default();

    if languages.is_empty() {
        info!("No target languages in header row, nothing to translate");
        return Ok(report);
    }

    for row in 1..grid.len() {
        let Some(source) = non_blank(grid[row].first()).map(str::to_string) else {
            debug!("Skipping row {} with blank source text", row);
            report.rows_skipped += 1;
            continue;
        };

        let translations: Vec<(usize, String)> = stream::iter(languages.iter())
            .map(|(col, language)| {
                let source = source.as_str();
                async move {
                    let translated = cache.get_or_translate(source, language).await?;
                    Ok::<_, CacheError>((*col, translated))
                }
            })
            .buffer_unordered(concurrency.max(1))
            .try_collect()
            .await?;

        let cells = &mut grid[row];
        for (col, translated) in translations {
            if cells.len() <= col {
                cells.resize(col + 1, None);
            }
            cells[col] = Some(translated);
            report.cells_translated += 1;
        }
    }

    info!(
        "Translated {} cells into {} languages ({} rows skipped)",
        report.cells_translated,
        languages.len(),
        report.rows_skipped
    );
    Ok(report)
}
