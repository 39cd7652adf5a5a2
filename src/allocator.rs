//! Game code allocation on top of the shared counter row.
//!
//! Each attempt reads the counter, computes the next code and writes it back
//! with a compare-and-set keyed on the value it read. A write that matches no
//! row means another request advanced the counter first; the attempt is
//! thrown away and the cycle starts again, so every caller gets a distinct
//! code. Store failures are not retried.

use std::sync::Arc;

use thiserror::Error;

use crate::store::{Store, StoreError};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Error)]
pub enum AllocError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("No s'ha pogut reservar un codi de partida després de {attempts} intents")]
    Contention { attempts: u32 },
    #[error("l'actualització condicional ha afectat {rows} files del comptador")]
    CounterInvariant { rows: u64 },
    #[error("el comptador ({0}) no es pot incrementar")]
    Overflow(i64),
}

#[derive(Clone)]
pub struct GameCodeAllocator {
    store: Arc<dyn Store>,
    max_attempts: u32,
}

impl GameCodeAllocator {
    /// `max_attempts` is clamped to at least one
    pub fn new(store: Arc<dyn Store>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub async fn allocate_next_code(&self) -> Result<i64, AllocError> {
        for attempt in 1..=self.max_attempts {
            let current = self.store.read_counter().await?;
            let next = current.checked_add(1).ok_or(AllocError::Overflow(current))?;

            match self.store.compare_and_set_counter(current, next).await? {
                1 => {
                    tracing::debug!(code = next, attempt, "allocated game code");
                    return Ok(next);
                }
                0 => {
                    tracing::debug!(current, attempt, "counter moved before write, retrying");
                }
                rows => return Err(AllocError::CounterInvariant { rows }),
            }
        }

        Err(AllocError::Contention {
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewPlayer, PlayerRecord, PlayerUpdate};
    use crate::store::SqliteStore;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Counter held in memory. `read_counter` yields to the scheduler so that
    /// concurrent allocations interleave between their read and their write.
    #[derive(Default)]
    struct MemoryCounter {
        value: Mutex<i64>,
        writes: AtomicU32,
        /// Number of upcoming writes that another client "wins" before us
        steal_next: AtomicU32,
        fail_reads: bool,
        rows_per_match: u64,
    }

    impl MemoryCounter {
        fn starting_at(value: i64) -> Self {
            Self {
                value: Mutex::new(value),
                rows_per_match: 1,
                ..Self::default()
            }
        }

        fn value(&self) -> i64 {
            *self.value.lock().unwrap()
        }
    }

    #[async_trait]
    impl Store for MemoryCounter {
        async fn read_counter(&self) -> Result<i64, StoreError> {
            if self.fail_reads {
                return Err(StoreError::Api {
                    status: 503,
                    message: "store unreachable".to_string(),
                });
            }
            let value = self.value();
            tokio::task::yield_now().await;
            Ok(value)
        }

        async fn compare_and_set_counter(
            &self,
            expected: i64,
            next: i64,
        ) -> Result<u64, StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            let mut value = self.value.lock().unwrap();

            let stolen = self
                .steal_next
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if stolen {
                *value += 1;
            }

            if *value == expected {
                *value = next;
                Ok(self.rows_per_match)
            } else {
                Ok(0)
            }
        }

        async fn list_players(&self) -> Result<Vec<PlayerRecord>, StoreError> {
            unimplemented!()
        }

        async fn insert_player(&self, _: &NewPlayer) -> Result<PlayerRecord, StoreError> {
            unimplemented!()
        }

        async fn update_player(&self, _: i64, _: &PlayerUpdate) -> Result<u64, StoreError> {
            unimplemented!()
        }

        async fn delete_players_before(&self, _: DateTime<Utc>) -> Result<u64, StoreError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn allocates_next_value_and_advances_row() {
        let store = Arc::new(MemoryCounter::starting_at(5));
        let allocator = GameCodeAllocator::new(store.clone(), DEFAULT_MAX_ATTEMPTS);

        assert_eq!(allocator.allocate_next_code().await.unwrap(), 6);
        assert_eq!(store.value(), 6);
    }

    #[tokio::test]
    async fn sequential_codes_are_gapless() {
        let store = Arc::new(MemoryCounter::starting_at(41));
        let allocator = GameCodeAllocator::new(store.clone(), DEFAULT_MAX_ATTEMPTS);

        let mut codes = Vec::new();
        for _ in 0..20 {
            codes.push(allocator.allocate_next_code().await.unwrap());
        }

        assert_eq!(codes, (42..62).collect::<Vec<_>>());
        assert_eq!(store.value(), 61);
    }

    #[tokio::test]
    async fn lost_race_is_retried() {
        let store = Arc::new(MemoryCounter::starting_at(5));
        store.steal_next.store(2, Ordering::SeqCst);
        let allocator = GameCodeAllocator::new(store.clone(), DEFAULT_MAX_ATTEMPTS);

        // Two other clients took 6 and 7 in between
        assert_eq!(allocator.allocate_next_code().await.unwrap(), 8);
        assert_eq!(store.value(), 8);
        assert_eq!(store.writes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_report_contention() {
        let store = Arc::new(MemoryCounter::starting_at(5));
        store.steal_next.store(10, Ordering::SeqCst);
        let allocator = GameCodeAllocator::new(store.clone(), 3);

        let err = allocator.allocate_next_code().await.unwrap_err();
        assert!(matches!(err, AllocError::Contention { attempts: 3 }));
        assert_eq!(
            err.to_string(),
            "No s'ha pogut reservar un codi de partida després de 3 intents"
        );
        assert_eq!(store.writes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn read_failure_skips_write() {
        let store = Arc::new(MemoryCounter {
            fail_reads: true,
            ..MemoryCounter::starting_at(5)
        });
        let allocator = GameCodeAllocator::new(store.clone(), DEFAULT_MAX_ATTEMPTS);

        let err = allocator.allocate_next_code().await.unwrap_err();
        assert_eq!(err.to_string(), "store unreachable");
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
        assert_eq!(store.value(), 5);
    }

    #[tokio::test]
    async fn several_matching_rows_break_invariant() {
        let store = Arc::new(MemoryCounter {
            rows_per_match: 2,
            ..MemoryCounter::starting_at(5)
        });
        let allocator = GameCodeAllocator::new(store, DEFAULT_MAX_ATTEMPTS);

        assert!(matches!(
            allocator.allocate_next_code().await,
            Err(AllocError::CounterInvariant { rows: 2 })
        ));
    }

    #[tokio::test]
    async fn overflow_is_an_error() {
        let store = Arc::new(MemoryCounter::starting_at(i64::MAX));
        let allocator = GameCodeAllocator::new(store, DEFAULT_MAX_ATTEMPTS);

        assert!(matches!(
            allocator.allocate_next_code().await,
            Err(AllocError::Overflow(i64::MAX))
        ));
    }

    #[test]
    fn zero_attempts_is_clamped() {
        let allocator = GameCodeAllocator::new(Arc::new(MemoryCounter::starting_at(0)), 0);
        assert_eq!(allocator.max_attempts(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_codes_are_unique_and_gapless() {
        const CALLERS: u32 = 12;
        let store = Arc::new(MemoryCounter::starting_at(5));
        // A caller can only lose to each of the others once
        let allocator = GameCodeAllocator::new(store.clone(), CALLERS);

        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let allocator = allocator.clone();
                tokio::spawn(async move { allocator.allocate_next_code().await })
            })
            .collect();

        let mut codes = HashSet::new();
        for handle in handles {
            assert!(codes.insert(handle.await.unwrap().unwrap()));
        }

        let expected: HashSet<i64> = (6..6 + CALLERS as i64).collect();
        assert_eq!(codes, expected);
        assert_eq!(store.value(), 5 + CALLERS as i64);
    }

    #[tokio::test]
    async fn concurrent_codes_against_sqlite() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.init_schema(100).await.unwrap();
        let store = Arc::new(store);
        let allocator = GameCodeAllocator::new(store.clone(), 8);

        let results = allocate_concurrently(&allocator, 8).await;
        let mut codes: Vec<i64> = results.into_iter().map(Result::unwrap).collect();
        codes.sort_unstable();

        assert_eq!(codes, (101..109).collect::<Vec<_>>());
        assert_eq!(store.read_counter().await.unwrap(), 108);
    }

    async fn allocate_concurrently(
        allocator: &GameCodeAllocator,
        n: usize,
    ) -> Vec<Result<i64, AllocError>> {
        let mut set = tokio::task::JoinSet::new();
        for _ in 0..n {
            let allocator = allocator.clone();
            set.spawn(async move { allocator.allocate_next_code().await });
        }

        let mut results = Vec::with_capacity(n);
        while let Some(result) = set.join_next().await {
            results.push(result.unwrap());
        }
        results
    }
}
