//! `random_get` (spec.md §4.2): fills a buffer with cryptographically
//! strong random bytes. Backed by `cap_rand`, matching the teacher's
//! dependency for a capability-scoped RNG rather than reaching for a
//! global/ambient one.

use crate::errno::{Errno, Result};
use cap_rand::{Rng, RngCore};
use parking_lot::Mutex;

/// A pluggable RNG source, so an embedding can substitute its own
/// cryptographic RNG (spec.md §6 "Embedding interface").
pub trait RngSource: Send + Sync {
    fn fill(&self, buf: &mut [u8]) -> Result<()>;
}

pub struct CapRng {
    inner: Mutex<cap_rand::rngs::StdRng>,
}

impl Default for CapRng {
    fn default() -> Self {
        Self {
            inner: Mutex::new(cap_rand::rngs::StdRng::from_entropy(
                cap_rand::ambient_authority(),
            )),
        }
    }
}

impl RngSource for CapRng {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        self.inner.lock().try_fill_bytes(buf).map_err(|e| {
            log::debug!("random_get failed to obtain randomness: {}", e);
            Errno::Io
        })
    }
}

pub fn random_get(source: &dyn RngSource, buf: &mut [u8]) -> Result<()> {
    source.fill(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_the_whole_buffer() {
        let rng = CapRng::default();
        let mut buf = [0u8; 32];
        random_get(&rng, &mut buf).unwrap();
        assert!(buf.iter().any(|&b| b != 0));
    }
}
