//! Striped commit locks
//!
//! Keys hash onto a fixed set of mutexes. A commit locks the stripes of its
//! overlay's keys in ascending stripe order, so two commits can only block
//! each other when their key sets share a stripe, and never deadlock.
//! Conflict detection itself is per key; sharing a stripe only serializes.

use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use crate::context::Context;
use crate::error::Result;

/// How long to wait on a stripe before re-checking the context
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Fixed array of commit mutexes
#[derive(Debug)]
pub struct KeyLocks {
    stripes: Vec<Mutex<()>>,
}

/// Held stripes; released on drop
pub struct KeyLockGuard<'a> {
    _guards: Vec<MutexGuard<'a, ()>>,
}

impl KeyLocks {
    pub fn new(stripes: usize) -> Self {
        Self {
            stripes: (0..stripes.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Stripe index for `key`
    pub fn stripe_of(&self, key: &[u8]) -> usize {
        crc32fast::hash(key) as usize % self.stripes.len()
    }

    /// Lock every stripe covering `keys`
    ///
    /// Waits as long as other commits hold the stripes, but gives up with
    /// the context's error once it is cancelled or past its deadline.
    pub fn lock_keys<'a, 'k, I>(&'a self, ctx: &Context, keys: I) -> Result<KeyLockGuard<'a>>
    where
        I: IntoIterator<Item = &'k [u8]>,
    {
        let mut indices: Vec<usize> = keys.into_iter().map(|k| self.stripe_of(k)).collect();
        indices.sort_unstable();
        indices.dedup();

        let mut guards = Vec::with_capacity(indices.len());
        for idx in indices {
            let stripe = &self.stripes[idx];
            let guard = loop {
                if let Some(guard) = stripe.try_lock_for(LOCK_POLL_INTERVAL) {
                    break guard;
                }
                ctx.checkpoint()?;
            };
            guards.push(guard);
        }

        Ok(KeyLockGuard { _guards: guards })
    }
}
