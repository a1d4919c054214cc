//! Bucket partitioning, consolidation and row stitching.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::{Bucket, BucketQuery, PlanError, PlanResult, RootKey};
use crate::executor::{QueryExecutor, Row};
use crate::model::{Column, FieldRef, RowKey};

/// The buckets of one report. Bucket 0 is the main bucket.
#[derive(Debug, Clone)]
pub struct BucketList {
    root: RootKey,
    buckets: Vec<Bucket>,
}

impl BucketList {
    /// A list holding only the main bucket, seeded with the primary key.
    pub fn new(root: RootKey) -> Self {
        let mut main = Bucket::new();
        main.add(root.field(), root.column());
        Self {
            root,
            buckets: vec![main],
        }
    }

    pub fn root(&self) -> &RootKey {
        &self.root
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn main(&self) -> &Bucket {
        &self.buckets[0]
    }

    pub fn other_buckets(&self) -> &[Bucket] {
        &self.buckets[1..]
    }

    /// Place every field of every column in the first compatible bucket,
    /// opening a new bucket when none fits.
    pub fn bucketize(&mut self, columns: &[Arc<Column>]) {
        for column in columns {
            for f in column.fields() {
                match self.buckets.iter_mut().find(|b| b.compatible_with(f)) {
                    Some(bucket) => {
                        bucket.add(f.clone(), Arc::clone(column));
                    }
                    None => {
                        let mut bucket = Bucket::new();
                        bucket.add(f.clone(), Arc::clone(column));
                        self.buckets.push(bucket);
                    }
                }
            }
        }
        debug!(
            root = %self.root.table,
            buckets = self.buckets.len(),
            "bucketized columns"
        );
    }

    /// Fold one extra bucket into the main bucket.
    ///
    /// The extra buckets touched by `order_columns` decide which: none
    /// folds the first extra bucket, exactly one folds that bucket, more
    /// than one cannot be ordered in a single query.
    pub fn consolidate(&mut self, order_columns: &[Arc<Column>]) -> PlanResult<()> {
        if self.buckets.len() < 2 {
            return Ok(());
        }

        let mut ordered: Vec<usize> = Vec::new();
        for column in order_columns {
            for (idx, bucket) in self.buckets.iter().enumerate().skip(1) {
                if bucket.touches(column) && !ordered.contains(&idx) {
                    ordered.push(idx);
                }
            }
        }

        let to_merge = match ordered.as_slice() {
            [] => 1,
            [idx] => *idx,
            _ => {
                return Err(PlanError::InvalidOrder {
                    columns: order_columns.iter().map(|c| c.name().to_string()).collect(),
                })
            }
        };

        let extra = self.buckets.remove(to_merge);
        self.buckets[0] = self.buckets[0].merge(&extra);
        debug!(
            merged = to_merge,
            remaining = self.buckets.len(),
            "consolidated buckets"
        );
        Ok(())
    }

    /// Build the main bucket's SELECT.
    pub fn main_query(&self) -> PlanResult<BucketQuery> {
        self.main().build(&self.root)
    }

    /// Run every extra bucket restricted to the keys of `rows` and append
    /// its cells to the matching main row.
    ///
    /// A row is only extended while its length still equals the running
    /// projection count; rows that missed an earlier bucket stay short and
    /// read NULL for the cells they lack. Returns the projections the
    /// stitched rows are laid out by.
    pub fn execute_and_join(
        &self,
        rows: &mut [Row],
        executor: &dyn QueryExecutor,
    ) -> PlanResult<Vec<FieldRef>> {
        let mut projections = self.main().projections(&self.root);
        if self.buckets.len() < 2 || rows.is_empty() {
            return Ok(projections);
        }

        let mut index: HashMap<RowKey, usize> = HashMap::with_capacity(rows.len());
        let mut keys = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let Some(cell) = row.first() else { continue };
            let Some(key) = cell.key() else { continue };
            if !index.contains_key(&key) {
                index.insert(key, i);
                keys.push(cell.to_expr());
            }
        }

        for bucket in self.other_buckets() {
            let query = bucket.build(&self.root)?.restrict_to(keys.clone());
            let extra = executor.select_rows(&query.query)?;
            let width = projections.len();
            let mut stitched = 0;
            for extra_row in extra {
                let key = extra_row.first().and_then(|c| c.key());
                let Some(&i) = key.and_then(|k| index.get(&k)) else {
                    continue;
                };
                let row = &mut rows[i];
                if row.len() == width {
                    row.extend(extra_row);
                    stitched += 1;
                }
            }
            debug!(rows = stitched, fields = query.projections.len(), "stitched bucket");
            projections.extend(query.projections);
        }
        Ok(projections)
    }
}
