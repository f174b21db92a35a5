//! Row sampling for detection: a bounded, representative subset of a large table.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{ColshapeError, Result};

pub type Row = Vec<String>;

pub trait RowSampler {
    /// Draws a sample from `rows`, a source of `nb_rows` rows read once, in order.
    fn sample(
        &mut self,
        rows: &mut dyn Iterator<Item = Result<Row>>,
        nb_rows: usize,
    ) -> Result<Vec<Row>>;
}

/// Random blocks of consecutive rows, one block per stride of the input.
///
/// Blocks keep local row correlations (sorted runs, repeated keys) that
/// uniform row sampling would break.
#[derive(Debug)]
pub struct BlockSampler {
    nb_sample_points: usize,
    nb_block_rows: usize,
    rng: StdRng,
}

impl BlockSampler {
    pub fn new(nb_sample_points: usize, nb_block_rows: usize, seed: u64) -> Self {
        Self {
            nb_sample_points: nb_sample_points.max(1),
            nb_block_rows: nb_block_rows.max(1),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Shrinks the request so that the sample is at most half of the input.
    fn effective_params(&self, nb_rows: usize) -> (usize, usize) {
        let (mut points, mut block) = (self.nb_sample_points, self.nb_block_rows);
        if points * block > nb_rows / 2 {
            points = (nb_rows / 2 / block).max(1);
            if points * block > nb_rows {
                points = 1;
                block = nb_rows;
            }
        }
        (points, block)
    }

    /// Start offsets of the blocks, ascending.
    fn block_starts(&mut self, nb_rows: usize) -> (Vec<usize>, usize) {
        let (points, block) = self.effective_params(nb_rows);
        if nb_rows == 0 || block == 0 {
            return (Vec::new(), 0);
        }
        let step = (nb_rows / points).max(block);
        let mut starts = Vec::with_capacity(points);
        let mut i = 0;
        while i + block <= nb_rows && starts.len() < points {
            let upper = (i + step - block).min(nb_rows - block);
            starts.push(self.rng.random_range(i..=upper));
            i += step;
        }
        (starts, block)
    }
}

impl RowSampler for BlockSampler {
    fn sample(
        &mut self,
        rows: &mut dyn Iterator<Item = Result<Row>>,
        nb_rows: usize,
    ) -> Result<Vec<Row>> {
        let (starts, block) = self.block_starts(nb_rows);
        log::info!(
            "sampling {} blocks of {} rows out of {}",
            starts.len(),
            block,
            nb_rows
        );

        let mut sample = Vec::with_capacity(starts.len() * block);
        let mut pos = 0;
        for start in starts {
            while pos < start {
                rows.next().ok_or_else(unexpected_end)??;
                pos += 1;
            }
            for _ in 0..block {
                sample.push(rows.next().ok_or_else(unexpected_end)??);
                pos += 1;
            }
        }
        Ok(sample)
    }
}

fn unexpected_end() -> ColshapeError {
    ColshapeError::SchemaMismatch("input ended before the announced row count".into())
}
