//! Cache module for storing a rendered inventory on disk
//!
//! This module provides a cache manager that keeps the last inventory JSON in a
//! single file and decides freshness from the file's modification time plus a
//! configured expiration interval.

mod manager;

pub use manager::{CacheManager, CachedData, CACHE_FILE_NAME};
