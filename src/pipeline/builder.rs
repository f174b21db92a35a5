// In: src/pipeline/builder.rs

//! Iterative tree construction over an in-memory sample.
//!
//! Each round runs the enabled detectors on the current columns, lets the
//! selector pick a conflict-free subset of candidates, appends them as one
//! level and re-derives the sample through that level so that the next round
//! sees the new columns.

use crate::config::ColshapeConfig;
use crate::error::{ColshapeError, Result};
use crate::expression::{ExpressionNode, ExpressionTree, TreeType};
use crate::patterns::{
    init_pattern_detectors, CoverageSelector, DetectionContext, PatternSelector,
};
use crate::types::Column;

use super::compress::ExpressionManager;

pub struct TreeBuilder<'a> {
    config: &'a ColshapeConfig,
    selector: Box<dyn PatternSelector>,
}

impl<'a> TreeBuilder<'a> {
    /// A builder using the default `CoverageSelector`.
    pub fn new(config: &'a ColshapeConfig) -> Self {
        Self::with_selector(
            config,
            Box::new(CoverageSelector {
                min_col_coverage: config.builder.min_col_coverage,
            }),
        )
    }

    pub fn with_selector(config: &'a ColshapeConfig, selector: Box<dyn PatternSelector>) -> Self {
        Self { config, selector }
    }

    /// Keeps the sample rows that match the schema width.
    fn checked_sample(&self, columns: &[Column], sample: &[Vec<String>]) -> Result<Vec<Vec<String>>> {
        let mut rows = Vec::with_capacity(sample.len());
        for (i, row) in sample.iter().enumerate() {
            if row.len() == columns.len() {
                rows.push(row.clone());
            } else if self.config.skip_invalid_rows {
                log::warn!("sample row {} has {} fields, skipped", i + 1, row.len());
            } else {
                return Err(ColshapeError::SchemaMismatch(format!(
                    "sample row {} has {} fields, expected {}",
                    i + 1,
                    row.len(),
                    columns.len()
                )));
            }
        }
        Ok(rows)
    }

    /// Builds a compression tree over all `columns` at once.
    pub fn build(&self, columns: &[Column], sample: &[Vec<String>]) -> Result<ExpressionTree> {
        let null_token = self.config.format.null_token.as_str();
        let mut tree = ExpressionTree::new(TreeType::Compression, columns);
        let mut level_columns = columns.to_vec();
        let mut level_rows = self.checked_sample(columns, sample)?;

        for depth in 0..self.config.builder.max_depth {
            let nodes = self.detect_level(&tree, &level_columns, &level_rows);
            if nodes.is_empty() {
                log::info!("no pattern selected at depth {}, stopping", depth);
                break;
            }
            let ids = tree.add_level(nodes)?;
            log::info!("depth {}: added {} nodes", depth, ids.len());

            let manager =
                ExpressionManager::new(&tree, tree.levels().len() - 1, &level_columns, null_token)?;
            level_rows = level_rows
                .iter()
                .map(|row| manager.apply_row(row))
                .collect::<Result<Vec<_>>>()?;
            level_columns = manager.out_columns().to_vec();
        }
        Ok(tree)
    }

    /// One detection round: observe, evaluate, select.
    fn detect_level(
        &self,
        tree: &ExpressionTree,
        columns: &[Column],
        rows: &[Vec<String>],
    ) -> Vec<ExpressionNode> {
        let ctx = DetectionContext {
            tree,
            columns,
            null_token: &self.config.format.null_token,
        };
        let mut detectors = init_pattern_detectors(self.config, &ctx);

        for row in rows {
            let values: Vec<&str> = row.iter().map(String::as_str).collect();
            for detector in detectors.iter_mut() {
                detector.observe(&values);
            }
        }

        let mut candidates = Vec::new();
        for (idx, detector) in detectors.iter().enumerate() {
            for (col_id, found) in detector.evaluate() {
                log::debug!(
                    "{} found {} candidates on column {}",
                    detector.name(),
                    found.len(),
                    col_id
                );
                candidates.extend(found.into_iter().map(|c| (idx, c)));
            }
        }

        self.selector
            .select(candidates)
            .into_iter()
            .map(|(idx, candidate)| detectors[idx].to_compression_node(&candidate).into())
            .collect()
    }

    /// Builds one tree per column, then merges them. Patterns spanning several
    /// columns (correlations) are not found this way.
    pub fn build_per_column(
        &self,
        columns: &[Column],
        sample: &[Vec<String>],
    ) -> Result<ExpressionTree> {
        let rows = self.checked_sample(columns, sample)?;
        let mut merged = ExpressionTree::new(TreeType::Compression, columns);
        for (pos, col) in columns.iter().enumerate() {
            let column_sample: Vec<Vec<String>> =
                rows.iter().map(|row| vec![row[pos].clone()]).collect();
            let tree = self.build(std::slice::from_ref(col), &column_sample)?;
            merged = ExpressionTree::merge(&merged, &tree)?;
        }
        Ok(merged)
    }
}
