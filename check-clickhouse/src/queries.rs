//! System tables queried by the check.
//!
//! Each query maps a ClickHouse metric name to the submitted metric. Names
//! listed in `ignored_columns` are known and deliberately not reported;
//! anything else is new to this check and only debug-logged.

use integrations_common::MetricType;

/// Where a ClickHouse metric ends up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Column {
    /// Metric name without the `clickhouse.` prefix.
    pub name: &'static str,
    pub metric_type: MetricType,
}

const fn gauge(name: &'static str) -> Column {
    Column {
        name,
        metric_type: MetricType::Gauge,
    }
}

const fn total(name: &'static str) -> Column {
    Column {
        name,
        metric_type: MetricType::MonotonicCount,
    }
}

/// A `SELECT metric, value` query over one system table.
#[derive(Debug, Clone, Copy)]
pub struct Query {
    pub name: &'static str,
    pub table: &'static str,
    /// Sorted by ClickHouse name.
    pub columns: &'static [(&'static str, Column)],
    /// Sorted by ClickHouse name.
    pub ignored_columns: &'static [&'static str],
}

impl Query {
    pub fn sql(&self) -> String {
        format!("SELECT metric, value FROM {}", self.table)
    }

    pub fn column(&self, metric: &str) -> Option<&Column> {
        self.columns
            .binary_search_by(|(name, _)| (*name).cmp(metric))
            .ok()
            .map(|index| &self.columns[index].1)
    }

    pub fn is_ignored(&self, metric: &str) -> bool {
        self.ignored_columns.binary_search(&metric).is_ok()
    }
}

pub const SYSTEM_METRICS: Query = Query {
    name: "SystemMetrics",
    table: "system.metrics",
    columns: &[
        ("BackgroundPoolTask", gauge("background_pool.processing.task.active")),
        ("BackgroundSchedulePoolTask", gauge("background_pool.schedule.task.active")),
        ("ContextLockWait", gauge("thread.lock.context.waiting")),
        ("DelayedInserts", gauge("query.insert.delayed")),
        ("DictCacheRequests", gauge("dictionary.request.cache")),
        ("DiskSpaceReservedForMerge", gauge("merge.disk.reserved")),
        ("DistributedFilesToInsert", gauge("table.distributed.file.insert.pending")),
        ("DistributedSend", gauge("table.distributed.connection.inserted")),
        ("GlobalThread", gauge("thread.global.total")),
        ("GlobalThreadActive", gauge("thread.global.active")),
        ("HTTPConnection", gauge("connection.http")),
        ("InterserverConnection", gauge("connection.interserver")),
        ("LocalThread", gauge("thread.local.total")),
        ("LocalThreadActive", gauge("thread.local.active")),
        ("MemoryTracking", gauge("query.memory")),
        ("Merge", gauge("merge.active")),
        ("OpenFileForRead", gauge("file.open.read")),
        ("OpenFileForWrite", gauge("file.open.write")),
        ("PartMutation", gauge("query.mutation")),
        ("Query", gauge("query.active")),
        ("QueryPreempted", gauge("query.waiting")),
        ("QueryThread", gauge("thread.query")),
        ("Read", gauge("syscall.read")),
        ("ReadonlyReplica", gauge("table.replicated.readonly")),
        ("ReplicatedChecks", gauge("table.replicated.part.check")),
        ("ReplicatedFetch", gauge("table.replicated.part.fetch")),
        ("ReplicatedSend", gauge("table.replicated.part.send")),
        ("TCPConnection", gauge("connection.tcp")),
        ("Write", gauge("syscall.write")),
        ("ZooKeeperRequest", gauge("zk.request")),
        ("ZooKeeperSession", gauge("zk.connection")),
        ("ZooKeeperWatch", gauge("zk.watch")),
    ],
    ignored_columns: &[
        "LeaderElection",
        "LeaderReplica",
        "RWLockActiveReaders",
        "RWLockActiveWriters",
        "RWLockWaitingReaders",
        "RWLockWaitingWriters",
        "Revision",
        "VersionInteger",
    ],
};

pub const SYSTEM_EVENTS: Query = Query {
    name: "SystemEvents",
    table: "system.events",
    columns: &[
        ("CompressedReadBufferBlocks", total("read.compressed.block.total")),
        ("CompressedReadBufferBytes", total("read.compressed.raw.size.total")),
        ("ContextLock", total("lock.context.acquisition.total")),
        ("DiskReadElapsedMicroseconds", total("syscall.read.wait.total")),
        ("DiskWriteElapsedMicroseconds", total("syscall.write.wait.total")),
        ("FileOpen", total("file.open.total")),
        ("InsertQuery", total("query.insert.total")),
        ("InsertedBytes", total("table.insert.size.total")),
        ("InsertedRows", total("table.insert.row.total")),
        ("Merge", total("merge.total")),
        ("MergedRows", total("merge.row.read.total")),
        ("Query", total("query.total")),
        ("ReadBufferFromFileDescriptorRead", total("file.read.total")),
        ("ReadBufferFromFileDescriptorReadBytes", total("file.read.size.total")),
        ("SelectQuery", total("query.select.total")),
        ("SlowRead", total("file.read.slow.total")),
        ("WriteBufferFromFileDescriptorWrite", total("file.write.total")),
        ("WriteBufferFromFileDescriptorWriteBytes", total("file.write.size.total")),
        ("ZooKeeperTransactions", total("zk.operation.total")),
    ],
    ignored_columns: &[
        "CannotRemoveEphemeralNode",
        "CreatedReadBufferOrdinary",
        "RegexpCreated",
    ],
};

pub const SYSTEM_ASYNCHRONOUS_METRICS: Query = Query {
    name: "SystemAsynchronousMetrics",
    table: "system.asynchronous_metrics",
    columns: &[
        ("MarkCacheBytes", gauge("cache.mark.size")),
        ("MarkCacheFiles", gauge("cache.mark.files")),
        ("MaxPartCountForPartition", gauge("part.max")),
        ("ReplicasMaxAbsoluteDelay", gauge("replica.delay.absolute")),
        ("ReplicasMaxRelativeDelay", gauge("replica.delay.relative")),
        ("UncompressedCacheBytes", gauge("cache.uncompressed.size")),
        ("Uptime", gauge("uptime")),
        ("jemalloc.allocated", gauge("jemalloc.allocated")),
        ("jemalloc.resident", gauge("jemalloc.resident")),
    ],
    ignored_columns: &["CompiledExpressionCacheCount", "NumberOfDatabases"],
};

/// Queries in collection order.
pub const QUERIES: [Query; 3] = [SYSTEM_METRICS, SYSTEM_EVENTS, SYSTEM_ASYNCHRONOUS_METRICS];
