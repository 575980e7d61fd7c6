// src/extract/mod.rs

use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use scraper::Html;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::{
    error::{ErrorKind, ExtractionError, Stage, TableError},
    fetch::Fetch,
    normalize::{column_labels, normalize, Record},
    registry::{Registry, SourceDescriptor, StrategyVariant},
    table::{parse_generic, parse_structural, TableMatrix},
};

pub const DEFAULT_CONCURRENCY: usize = 4;

/// Records extracted for one source, plus when the page was fetched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub source_id: String,
    pub columns: Vec<String>,
    pub records: Vec<Record>,
    pub fetched_at: DateTime<Utc>,
}

/// Parse `markup` with the strategy the descriptor asks for.
///
/// Kept synchronous: `Html` is not `Send` and must never live across an await.
pub fn parse_matrix(markup: &str, source: &SourceDescriptor) -> Result<TableMatrix, TableError> {
    let doc = Html::parse_document(markup);
    match source.strategy_variant {
        StrategyVariant::Generic => parse_generic(&doc, source.table_position),
        StrategyVariant::Structural => parse_structural(&doc, source.table_position),
    }
}

/// Runs lookup → fetch → parse → normalize for registered sources.
///
/// Holds no mutable state, so one instance can serve any number of
/// concurrent extractions.
#[derive(Debug)]
pub struct Extractor<F> {
    registry: Registry,
    fetcher: F,
    concurrency: usize,
}

impl<F: Fetch> Extractor<F> {
    pub fn new(registry: Registry, fetcher: F) -> Self {
        Self {
            registry,
            fetcher,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Cap on in-flight fetches during [`Extractor::extract_batch`].
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[instrument(level = "info", skip(self))]
    pub async fn extract(&self, source_id: &str) -> Result<ExtractionResult, ExtractionError> {
        let fail = |stage: Stage, kind: ErrorKind| {
            let err = ExtractionError::new(source_id, stage, kind);
            warn!(stage = %stage, error = %err.kind, "extraction failed");
            err
        };

        let source = self
            .registry
            .get(source_id)
            .ok_or_else(|| fail(Stage::Lookup, ErrorKind::UnknownSource))?;

        debug!(stage = %Stage::Fetch, url = %source.address, "fetching");
        let doc = self
            .fetcher
            .fetch(&source.address)
            .await
            .map_err(|e| fail(Stage::Fetch, e.into()))?;

        debug!(
            stage = %Stage::Parse,
            strategy = ?source.strategy_variant,
            table = source.table_position,
            "parsing"
        );
        let matrix = parse_matrix(&doc.body, source).map_err(|e| fail(Stage::Parse, e.into()))?;

        debug!(
            stage = %Stage::Normalize,
            rows = matrix.body.len(),
            width = matrix.width(),
            "normalizing"
        );
        let columns = column_labels(&matrix);
        let records = normalize(&matrix);

        info!(records = records.len(), columns = columns.len(), "extracted");
        Ok(ExtractionResult {
            source_id: source.id.clone(),
            columns,
            records,
            fetched_at: doc.fetched_at,
        })
    }

    /// Extract several sources concurrently. Outcomes come back in request
    /// order and one source failing has no effect on the others.
    pub async fn extract_batch<I, S>(
        &self,
        source_ids: I,
    ) -> Vec<(String, Result<ExtractionResult, ExtractionError>)>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = source_ids.into_iter().map(Into::into).collect();
        info!(count = ids.len(), concurrency = self.concurrency, "batch extraction");

        // Unordered so a slow source only holds its own slot.
        let mut outcomes: Vec<_> = stream::iter(ids.into_iter().enumerate())
            .map(|(index, id)| async move {
                let outcome = self.extract(&id).await;
                (index, id, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        outcomes.sort_unstable_by_key(|(index, _, _)| *index);

        outcomes
            .into_iter()
            .map(|(_, id, outcome)| (id, outcome))
            .collect()
    }
}
