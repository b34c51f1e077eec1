//! Document id generation.
//!
//! Ids are 24-character lowercase hex strings laid out like a 12-byte ObjectId:
//!
//! ```text
//! | 4 bytes seconds since epoch | 5 bytes per-generator random | 3 bytes counter |
//! ```
//!
//! They sort roughly by creation time and stay unique across processes as long
//! as the random component differs.

use chrono::Utc;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;
use uuid::Uuid;

const COUNTER_MASK: u32 = 0x00FF_FFFF;

/// Source of ids for documents inserted without one.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Time-ordered, collision-resistant id generator.
#[derive(Debug)]
pub struct ObjectIdGenerator {
    random: [u8; 5],
    counter: AtomicU32,
}

impl ObjectIdGenerator {
    pub fn new() -> Self {
        let seed = Uuid::new_v4();
        let bytes = seed.as_bytes();
        let mut random = [0u8; 5];
        random.copy_from_slice(&bytes[..5]);
        let counter = u32::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]) & COUNTER_MASK;
        debug!(counter, "Initialized id generator");

        Self {
            random,
            counter: AtomicU32::new(counter),
        }
    }

    fn generate_at(&self, seconds: u32) -> String {
        let count = self.counter.fetch_add(1, Ordering::Relaxed) & COUNTER_MASK;

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(&self.random);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);

        bytes.iter().fold(String::with_capacity(24), |mut out, b| {
            let _ = write!(out, "{:02x}", b);
            out
        })
    }
}

impl Default for ObjectIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for ObjectIdGenerator {
    fn generate(&self) -> String {
        let seconds = u32::try_from(Utc::now().timestamp()).unwrap_or(u32::MAX);
        self.generate_at(seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generates_unique_ids() {
        let generator = ObjectIdGenerator::new();
        let ids: Vec<String> = (0..1000).map(|_| generator.generate()).collect();
        let unique: HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), 1000);
    }

    #[test]
    fn ids_are_24_hex_chars() {
        let id = ObjectIdGenerator::new().generate();
        assert_eq!(id.len(), 24);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn timestamp_prefix_orders_ids() {
        let generator = ObjectIdGenerator::new();
        let earlier = generator.generate_at(1_600_000_000);
        let later = generator.generate_at(1_700_000_000);
        assert!(earlier < later);
        assert_eq!(&earlier[..8], format!("{:08x}", 1_600_000_000u32));
    }

    #[test]
    fn counter_wraps_within_three_bytes() {
        let generator = ObjectIdGenerator {
            random: [0; 5],
            counter: AtomicU32::new(COUNTER_MASK),
        };
        let last = generator.generate_at(0);
        let wrapped = generator.generate_at(0);
        assert!(last.ends_with("ffffff"));
        assert!(wrapped.ends_with("000000"));
    }

    #[test]
    fn handles_multiple_concurrent_id_generation() {
        use std::sync::Arc;
        use std::thread;

        let generator = Arc::new(ObjectIdGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = Arc::clone(&generator);
                thread::spawn(move || (0..250).map(|_| generator.generate()).collect::<Vec<_>>())
            })
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(all.insert(id));
            }
        }
        assert_eq!(all.len(), 2000);
    }
}
