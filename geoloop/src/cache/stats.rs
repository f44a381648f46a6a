//! Cache statistics tracking and reporting.

use std::time::Instant;

/// Tile cache statistics for monitoring and debugging.
#[derive(Debug, Clone)]
pub struct CacheStats {
    // Memory layer
    pub memory_hits: u64,
    pub memory_misses: u64,
    pub memory_size_bytes: usize,
    pub memory_entry_count: usize,
    pub memory_evictions: u64,

    // Disk store
    pub disk_hits: u64,
    pub disk_misses: u64,
    pub disk_writes: u64,
    pub disk_write_failures: u64,

    // Network
    pub downloads: u64,
    pub download_failures: u64,
    pub bytes_downloaded: u64,
    pub coalesced_requests: u64,

    // Image repair
    pub repairs: u64,
    pub repair_failures: u64,

    pub created_at: Instant,
}

impl Default for CacheStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStats {
    pub fn new() -> Self {
        Self {
            memory_hits: 0,
            memory_misses: 0,
            memory_size_bytes: 0,
            memory_entry_count: 0,
            memory_evictions: 0,
            disk_hits: 0,
            disk_misses: 0,
            disk_writes: 0,
            disk_write_failures: 0,
            downloads: 0,
            download_failures: 0,
            bytes_downloaded: 0,
            coalesced_requests: 0,
            repairs: 0,
            repair_failures: 0,
            created_at: Instant::now(),
        }
    }

    /// Share of memory lookups that found a decoded image.
    pub fn memory_hit_rate(&self) -> f64 {
        ratio(self.memory_hits, self.memory_hits + self.memory_misses)
    }

    /// Share of disk lookups that found a stored file.
    pub fn disk_hit_rate(&self) -> f64 {
        ratio(self.disk_hits, self.disk_hits + self.disk_misses)
    }

    /// Share of lookups served without the network.
    ///
    /// A disk miss is the only outcome that reaches the network.
    pub fn overall_hit_rate(&self) -> f64 {
        let local = self.memory_hits + self.disk_hits;
        ratio(local, local + self.disk_misses)
    }

    pub fn uptime(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    pub fn record_memory_hit(&mut self) {
        self.memory_hits += 1;
    }

    pub fn record_memory_miss(&mut self) {
        self.memory_misses += 1;
    }

    pub fn record_memory_eviction(&mut self, count: u64) {
        self.memory_evictions += count;
    }

    pub fn record_disk_hit(&mut self) {
        self.disk_hits += 1;
    }

    pub fn record_disk_miss(&mut self) {
        self.disk_misses += 1;
    }

    pub fn record_disk_write(&mut self) {
        self.disk_writes += 1;
    }

    pub fn record_disk_write_failure(&mut self) {
        self.disk_write_failures += 1;
    }

    pub fn record_download(&mut self, bytes: u64) {
        self.downloads += 1;
        self.bytes_downloaded += bytes;
    }

    pub fn record_download_failure(&mut self) {
        self.download_failures += 1;
    }

    pub fn record_coalesced(&mut self) {
        self.coalesced_requests += 1;
    }

    pub fn record_repair(&mut self) {
        self.repairs += 1;
    }

    pub fn record_repair_failure(&mut self) {
        self.repair_failures += 1;
    }

    pub fn update_memory_size(&mut self, size_bytes: usize, entry_count: usize) {
        self.memory_size_bytes = size_bytes;
        self.memory_entry_count = entry_count;
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// Snapshot of cache statistics for reporting.
#[derive(Debug, Clone)]
pub struct CacheStatistics {
    pub stats: CacheStats,
    pub memory_hit_rate_percent: f64,
    pub disk_hit_rate_percent: f64,
    pub overall_hit_rate_percent: f64,
    pub uptime_secs: u64,
}

impl CacheStatistics {
    pub fn from_stats(stats: &CacheStats) -> Self {
        Self {
            stats: stats.clone(),
            memory_hit_rate_percent: stats.memory_hit_rate() * 100.0,
            disk_hit_rate_percent: stats.disk_hit_rate() * 100.0,
            overall_hit_rate_percent: stats.overall_hit_rate() * 100.0,
            uptime_secs: stats.uptime().as_secs(),
        }
    }

    /// Format statistics as a human-readable report.
    pub fn format(&self, cache_dir: &str) -> String {
        let stats = &self.stats;

        format!(
            r#"Overlay Cache Statistics
Directory: {}

MEMORY
  Entries:     {}
  Size:        {:.2} MB
  Hits:        {}
  Misses:      {}
  Hit Rate:    {:.1}%
  Evictions:   {}

DISK
  Hits:        {}
  Misses:      {}
  Hit Rate:    {:.1}%
  Writes:      {}
  Failures:    {}

DOWNLOADS
  Total:       {}
  Failures:    {}
  Coalesced:   {}
  Bytes:       {:.2} MB

REPAIRS
  Total:       {}
  Failures:    {}

OVERALL
  Hit Rate:    {:.1}%
  Uptime:      {}s
"#,
            cache_dir,
            stats.memory_entry_count,
            megabytes(stats.memory_size_bytes as u64),
            stats.memory_hits,
            stats.memory_misses,
            self.memory_hit_rate_percent,
            stats.memory_evictions,
            stats.disk_hits,
            stats.disk_misses,
            self.disk_hit_rate_percent,
            stats.disk_writes,
            stats.disk_write_failures,
            stats.downloads,
            stats.download_failures,
            stats.coalesced_requests,
            megabytes(stats.bytes_downloaded),
            stats.repairs,
            stats.repair_failures,
            self.overall_hit_rate_percent,
            self.uptime_secs,
        )
    }
}
