/// Configuration for a ring's on-disk layout and the engine built on it.
///
/// Mirrors the teacher crate's const-fn-with-asserts configuration style:
/// geometry is fixed at construction and validated once, not re-checked on
/// every hot-path call.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Size of one device sector, in bytes. Typically 512 or 4096.
    pub sector_size: usize,
    /// Number of sectors reserved for the header (§3.1). Almost always 1.
    pub header_sectors: u64,
    /// Number of sectors given to the payload region. `L = payload_sectors *
    /// sector_size`.
    pub payload_sectors: u64,
    /// Enable the [`crate::metrics::Metrics`] counters. Off by default since
    /// they add an atomic increment to every push/replay.
    pub enable_metrics: bool,
}

impl Config {
    /// Creates a new configuration with custom geometry.
    ///
    /// # Panics
    ///
    /// Panics if `sector_size` is not a power of two, if `header_sectors` is
    /// 0, or if `payload_sectors` is 0.
    #[must_use]
    pub const fn new(
        sector_size: usize,
        header_sectors: u64,
        payload_sectors: u64,
        enable_metrics: bool,
    ) -> Self {
        assert!(sector_size.is_power_of_two(), "sector_size must be a power of two");
        assert!(header_sectors > 0, "header_sectors must be at least 1");
        assert!(payload_sectors > 0, "payload_sectors must be at least 1");

        Self {
            sector_size,
            header_sectors,
            payload_sectors,
            enable_metrics,
        }
    }

    /// Usable payload region size in bytes (`L` in the spec).
    #[inline]
    #[must_use]
    pub const fn payload_len(&self) -> u64 {
        self.payload_sectors * self.sector_size as u64
    }

    /// Total device footprint in sectors (header + payload).
    #[inline]
    #[must_use]
    pub const fn total_sectors(&self) -> u64 {
        self.header_sectors + self.payload_sectors
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sector_size: 512,
            header_sectors: 1,
            payload_sectors: 8, // 4096-byte payload region
            enable_metrics: false,
        }
    }
}

/// A small ring sized for tests and scenario 1 of the spec (4096-byte
/// payload region, one 512-byte header sector).
pub const SMALL_RING_CONFIG: Config = Config::new(512, 1, 8, false);

/// A larger ring (1 MiB payload region) for throughput-oriented workloads.
pub const LARGE_RING_CONFIG: Config = Config::new(4096, 1, 256, false);
