//! Versioned, partitioned row storage.
//!
//! A `Table` maps `(PartitionKey, Timestamp)` to an encoded row. Partition
//! keys are sharded across segments by SipHash; each segment holds, per
//! key, a version chain ordered by timestamp.
//!
//! # Layout
//!
//! ```text
//! Table "t1"
//! ├── segment 0 ── RwLock ── { "5"  → [(ts 1, seq 0), (ts 2, seq 1)] }
//! ├── segment 1 ── RwLock ── { "55" → [(ts 1, seq 2), (ts 2, seq 3), (ts 3, seq 4)] }
//! └── ...
//! ```
//!
//! The version key is `(timestamp, seq)`, where `seq` is a table-wide
//! insertion counter. Rows with equal timestamps therefore keep their
//! insertion order under [`DuplicatePolicy::KeepVersions`].
//!
//! Rows are copied into shared `Bytes` on `put`; reads hand out cheap
//! clones of those handles and never expose interior mutability.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hasher;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;
use siphasher::sip::SipHasher13;
use windlass_common::config::{DuplicatePolicy, TableConfig};
use windlass_common::types::{PartitionKey, Timestamp};

use super::error::{StorageError, StorageResult};

const SEGMENT_SEED_A: u64 = 0x5769_6e64_6c61_7373;
const SEGMENT_SEED_B: u64 = 0x7365_676d_656e_7473;

/// Lifecycle state of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    /// Created, `init` not yet called.
    Uninitialized,
    /// Ready for reads and writes.
    Ready,
    /// `init` failed; every later operation fails.
    Failed,
}

/// A stored row and the timestamp it was written at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowEntry {
    /// Writer-supplied timestamp.
    pub ts: Timestamp,
    /// Encoded row.
    pub row: Bytes,
}

type VersionChain = BTreeMap<(Timestamp, u64), Bytes>;

#[derive(Default)]
struct Segment {
    partitions: HashMap<PartitionKey, VersionChain>,
}

/// Table metadata plus its row store.
pub struct Table {
    name: String,
    id: u32,
    pid: u32,
    schema_version: u32,
    config: TableConfig,
    state: TableState,
    segments: Vec<RwLock<Segment>>,
    next_seq: AtomicU64,
    row_count: AtomicUsize,
}

impl Table {
    /// Creates an uninitialized table with default configuration.
    pub fn new(name: impl Into<String>, id: u32, pid: u32, schema_version: u32) -> Self {
        Self::with_config(name, id, pid, schema_version, TableConfig::default())
    }

    /// Creates an uninitialized table.
    pub fn with_config(
        name: impl Into<String>,
        id: u32,
        pid: u32,
        schema_version: u32,
        config: TableConfig,
    ) -> Self {
        Self {
            name: name.into(),
            id,
            pid,
            schema_version,
            config,
            state: TableState::Uninitialized,
            segments: Vec::new(),
            next_seq: AtomicU64::new(0),
            row_count: AtomicUsize::new(0),
        }
    }

    /// Returns the table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the table id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the partition id.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Returns the schema version.
    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> TableState {
        self.state
    }

    /// Returns the table configuration.
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Returns the number of stored rows.
    pub fn row_count(&self) -> usize {
        self.row_count.load(Ordering::Acquire)
    }

    /// Returns the number of distinct partition keys.
    pub fn partition_count(&self) -> usize {
        self.segments
            .iter()
            .map(|s| s.read().partitions.len())
            .sum()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Allocates the segment index.
    ///
    /// Calling `init` on a ready table is a no-op. A failed init is
    /// permanent: the table rejects every later operation.
    pub fn init(&mut self) -> StorageResult<()> {
        match self.state {
            TableState::Ready => return Ok(()),
            TableState::Failed => return Err(StorageError::InitFailed(self.name.clone())),
            TableState::Uninitialized => {}
        }

        match self.allocate_segments() {
            Ok(segments) => {
                self.segments = segments;
                self.state = TableState::Ready;
                tracing::debug!(
                    table = %self.name,
                    segments = self.config.segment_count,
                    buckets = self.config.bucket_count,
                    "table initialized"
                );
                Ok(())
            }
            Err(reason) => {
                self.state = TableState::Failed;
                tracing::warn!(table = %self.name, %reason, "table init failed");
                Err(StorageError::InitFailed(format!("{}: {}", self.name, reason)))
            }
        }
    }

    fn allocate_segments(&self) -> Result<Vec<RwLock<Segment>>, String> {
        let count = self.config.segment_count;
        if count == 0 {
            return Err("segment_count must be at least 1".to_string());
        }

        let mut segments = Vec::new();
        segments
            .try_reserve_exact(count)
            .map_err(|e| format!("segment allocation failed: {}", e))?;
        for _ in 0..count {
            let mut segment = Segment::default();
            segment
                .partitions
                .try_reserve(self.config.bucket_count)
                .map_err(|e| format!("bucket allocation failed: {}", e))?;
            segments.push(RwLock::new(segment));
        }
        Ok(segments)
    }

    fn check_ready(&self) -> StorageResult<()> {
        match self.state {
            TableState::Ready => Ok(()),
            TableState::Uninitialized => Err(StorageError::NotInitialized(self.name.clone())),
            TableState::Failed => Err(StorageError::InitFailed(self.name.clone())),
        }
    }

    fn segment_for(&self, key: &[u8]) -> &RwLock<Segment> {
        let mut hasher = SipHasher13::new_with_keys(SEGMENT_SEED_A, SEGMENT_SEED_B);
        hasher.write(key);
        let index = (hasher.finish() % self.segments.len() as u64) as usize;
        &self.segments[index]
    }

    // =========================================================================
    // Row Operations
    // =========================================================================

    /// Stores a copy of `row` under `(key, ts)`.
    pub fn put(
        &self,
        key: impl AsRef<[u8]>,
        ts: impl Into<Timestamp>,
        row: &[u8],
    ) -> StorageResult<()> {
        self.check_ready()?;
        if row.len() > self.config.max_row_size {
            return Err(StorageError::RowTooLarge {
                table: self.name.clone(),
                size: row.len(),
                limit: self.config.max_row_size,
            });
        }

        let key = key.as_ref();
        let ts = ts.into();
        let row = Bytes::copy_from_slice(row);
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);

        let mut segment = self.segment_for(key).write();
        let chain = segment
            .partitions
            .entry(PartitionKey::from_bytes(key))
            .or_default();

        if self.config.duplicate_policy == DuplicatePolicy::Overwrite {
            let replaced: Vec<(Timestamp, u64)> = chain
                .range((ts, 0)..=(ts, u64::MAX))
                .map(|(k, _)| *k)
                .collect();
            for version in &replaced {
                chain.remove(version);
            }
            self.row_count.fetch_sub(replaced.len(), Ordering::AcqRel);
        }

        chain.insert((ts, seq), row);
        self.row_count.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Returns the rows of one partition in ascending timestamp order.
    ///
    /// An unknown key yields an empty partition.
    pub fn scan_partition(&self, key: impl AsRef<[u8]>) -> StorageResult<Vec<RowEntry>> {
        self.check_ready()?;
        let key = key.as_ref();
        let segment = self.segment_for(key).read();
        Ok(segment
            .partitions
            .get(key)
            .map(|chain| {
                chain
                    .iter()
                    .map(|(&(ts, _), row)| RowEntry {
                        ts,
                        row: row.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Returns every partition key in ascending byte order.
    pub fn partitions(&self) -> StorageResult<Vec<PartitionKey>> {
        self.check_ready()?;
        let mut keys: Vec<PartitionKey> = self
            .segments
            .iter()
            .flat_map(|s| s.read().partitions.keys().cloned().collect::<Vec<_>>())
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Iterates over partitions in natural scan order.
    ///
    /// The key list is fixed when the scan starts; each partition's rows
    /// are read when the iterator reaches it.
    pub fn scan(&self) -> StorageResult<TableScan<'_>> {
        let keys = self.partitions()?;
        Ok(TableScan {
            table: self,
            keys: keys.into_iter(),
        })
    }

    /// Returns every row in natural scan order.
    pub fn rows(&self) -> StorageResult<Vec<RowEntry>> {
        let mut rows = Vec::with_capacity(self.row_count());
        for partition in self.scan()? {
            rows.extend(partition?.1);
        }
        Ok(rows)
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("pid", &self.pid)
            .field("schema_version", &self.schema_version)
            .field("state", &self.state)
            .field("rows", &self.row_count())
            .finish()
    }
}

/// Partition-by-partition scan over a table.
pub struct TableScan<'a> {
    table: &'a Table,
    keys: std::vec::IntoIter<PartitionKey>,
}

impl<'a> Iterator for TableScan<'a> {
    type Item = StorageResult<(PartitionKey, Vec<RowEntry>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.keys.next()?;
        Some(self.table.scan_partition(&key).map(|rows| (key, rows)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.keys.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ready_table(config: TableConfig) -> Table {
        let mut table = Table::with_config("t1", 1, 1, 1, config);
        table.init().unwrap();
        table
    }

    fn timestamps(rows: &[RowEntry]) -> Vec<u64> {
        rows.iter().map(|r| r.ts.as_u64()).collect()
    }

    #[test]
    fn test_put_before_init_fails() {
        let table = Table::new("t1", 1, 1, 1);
        assert_eq!(table.state(), TableState::Uninitialized);
        let err = table.put("k1", 1u64, b"row").unwrap_err();
        assert!(matches!(err, StorageError::NotInitialized(_)));
    }

    #[test]
    fn test_failed_init_is_permanent() {
        let mut table = Table::with_config("bad", 2, 1, 1, TableConfig::default().with_segments(0));
        assert!(matches!(table.init(), Err(StorageError::InitFailed(_))));
        assert_eq!(table.state(), TableState::Failed);

        assert!(matches!(table.init(), Err(StorageError::InitFailed(_))));
        assert!(matches!(table.put("k", 1u64, b"x"), Err(StorageError::InitFailed(_))));
        assert!(matches!(table.scan_partition("k"), Err(StorageError::InitFailed(_))));
        assert!(table.scan().is_err());
    }

    #[test]
    fn test_init_is_idempotent() {
        let mut table = ready_table(TableConfig::default());
        table.put("k", 1u64, b"a").unwrap();
        table.init().unwrap();
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn test_partition_rows_sorted_by_timestamp() {
        let table = ready_table(TableConfig::default());
        for ts in [5u64, 1, 4, 2, 3] {
            table.put("55", ts, &[ts as u8]).unwrap();
        }

        let rows = table.scan_partition("55").unwrap();
        assert_eq!(timestamps(&rows), vec![1, 2, 3, 4, 5]);
        assert_eq!(rows[0].row.as_ref(), &[1u8]);
        assert!(table.scan_partition("missing").unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_keep_versions() {
        let table = ready_table(TableConfig::default());
        table.put("k1", 1u64, b"first").unwrap();
        table.put("k1", 1u64, b"second").unwrap();
        table.put("k1", 0u64, b"zero").unwrap();

        let rows = table.scan_partition("k1").unwrap();
        let payloads: Vec<&[u8]> = rows.iter().map(|r| r.row.as_ref()).collect();
        assert_eq!(payloads, vec![&b"zero"[..], &b"first"[..], &b"second"[..]]);
        assert_eq!(table.row_count(), 3);
    }

    #[test]
    fn test_duplicate_overwrite() {
        let config = TableConfig::default().with_duplicate_policy(DuplicatePolicy::Overwrite);
        let table = ready_table(config);
        table.put("k1", 1u64, b"first").unwrap();
        table.put("k1", 1u64, b"second").unwrap();
        table.put("k1", 2u64, b"third").unwrap();

        let rows = table.scan_partition("k1").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row.as_ref(), b"second");
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_scan_order_independent_of_segments() {
        for segments in [1, 3, 16] {
            let table = ready_table(TableConfig::default().with_segments(segments));
            for key in ["b", "55", "a", "5"] {
                table.put(key, 2u64, b"y").unwrap();
                table.put(key, 1u64, b"x").unwrap();
            }

            let keys: Vec<String> = table
                .scan()
                .unwrap()
                .map(|p| p.unwrap().0.to_string())
                .collect();
            assert_eq!(keys, vec!["5", "55", "a", "b"]);
            assert_eq!(table.partition_count(), 4);
            assert_eq!(timestamps(&table.rows().unwrap()), vec![1, 2, 1, 2, 1, 2, 1, 2]);
        }
    }

    #[test]
    fn test_row_too_large() {
        let table = ready_table(TableConfig::default().with_max_row_size(8));
        assert!(table.put("k", 1u64, &[0u8; 8]).is_ok());
        let err = table.put("k", 2u64, &[0u8; 9]).unwrap_err();
        assert!(matches!(err, StorageError::RowTooLarge { size: 9, limit: 8, .. }));
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn test_put_copies_buffer() {
        let table = ready_table(TableConfig::default());
        let mut buf = vec![1u8, 2, 3];
        table.put("k", 1u64, &buf).unwrap();
        buf[0] = 9;
        assert_eq!(table.scan_partition("k").unwrap()[0].row.as_ref(), &[1u8, 2, 3]);
    }

    #[test]
    fn test_concurrent_writer_and_reader() {
        let table = Arc::new(ready_table(TableConfig::default().with_segments(4)));

        std::thread::scope(|s| {
            let writer = Arc::clone(&table);
            s.spawn(move || {
                for ts in (0..500u64).rev() {
                    writer.put("hot", ts, &ts.to_le_bytes()).unwrap();
                }
            });

            let reader = Arc::clone(&table);
            s.spawn(move || {
                for _ in 0..50 {
                    let rows = reader.scan_partition("hot").unwrap();
                    assert!(rows.windows(2).all(|w| w[0].ts <= w[1].ts));
                }
            });
        });

        assert_eq!(table.row_count(), 500);
        let rows = table.scan_partition("hot").unwrap();
        assert_eq!(timestamps(&rows), (0..500).collect::<Vec<_>>());
    }
}
