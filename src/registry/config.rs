//! Registry configuration

/// Default per-stream queue capacity (packets)
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024 * 1024;

/// Largest queue capacity a tokio channel accepts
pub const MAX_QUEUE_CAPACITY: usize = usize::MAX >> 3;

/// Default byte limit of the late-joiner GOP cache
pub const DEFAULT_GOP_CACHE_MAX_SIZE: usize = 8 * 1024 * 1024;

/// Configuration shared by every stream hub in a registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Bounded queue capacity per hub; packets beyond it are dropped
    pub queue_capacity: usize,

    /// Byte limit of the cached GOP replayed to late joiners (0 = disabled)
    pub gop_cache_max_size: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            gop_cache_max_size: DEFAULT_GOP_CACHE_MAX_SIZE,
        }
    }
}

impl RegistryConfig {
    /// Set the queue capacity, clamped to `1..=MAX_QUEUE_CAPACITY`
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.clamp(1, MAX_QUEUE_CAPACITY);
        self
    }

    /// Set the GOP cache limit in bytes
    pub fn gop_cache_max_size(mut self, size: usize) -> Self {
        self.gop_cache_max_size = size;
        self
    }

    /// Disable the GOP cache: late joiners only see packets enqueued after they attach
    pub fn disable_gop_cache(mut self) -> Self {
        self.gop_cache_max_size = 0;
        self
    }
}
