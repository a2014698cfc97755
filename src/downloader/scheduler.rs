//! Batch scheduler: contiguous batches fetched concurrently, with a pause between them

use std::time::Duration;

use futures::future::join_all;

use super::fetch::{FetchUnit, ItemPosition};
use super::reporter::RunReporter;
use crate::types::Item;

/// Drives the fetch unit over the whole input, one batch at a time
pub struct BatchScheduler<'a> {
    unit: &'a FetchUnit,
}

impl<'a> BatchScheduler<'a> {
    /// Create a scheduler over `unit`
    pub fn new(unit: &'a FetchUnit) -> Self {
        Self { unit }
    }

    /// Process `items` and return every item that failed permanently
    ///
    /// Items are split into contiguous batches of `batch_size` (the last one
    /// may be shorter). All items of a batch are fetched concurrently and the
    /// batch settles only when each of them has; a failing item never cancels
    /// its siblings. `inter_batch_delay` is waited between batches but not
    /// after the last one. Progress goes to `reporter` after every batch.
    pub async fn run(
        &self,
        items: &[Item],
        batch_size: usize,
        inter_batch_delay: Duration,
        reporter: &mut RunReporter,
    ) -> Vec<Item> {
        let batch_size = batch_size.max(1);
        let total = items.len();
        let batch_count = total.div_ceil(batch_size);

        tracing::info!(total, batch_size, batch_count, "Starting batched download");

        for (batch_index, batch) in items.chunks(batch_size).enumerate() {
            let offset = batch_index * batch_size;
            tracing::debug!(
                batch = batch_index + 1,
                batch_count,
                size = batch.len(),
                "Processing batch"
            );

            let outcomes = join_all(batch.iter().enumerate().map(|(i, item)| {
                self.unit.fetch_with_retry(
                    item,
                    ItemPosition {
                        index: offset + i,
                        total,
                    },
                )
            }))
            .await;

            reporter.record_batch(outcomes);

            if batch_index + 1 < batch_count && !inter_batch_delay.is_zero() {
                tokio::time::sleep(inter_batch_delay).await;
            }
        }

        reporter.state().failed.clone()
    }
}
