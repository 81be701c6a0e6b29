use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-course advisory locks for this process.
///
/// Two synchronizations of the same course id run one after the other
/// instead of interleaving their read-delete-write sequences.
#[derive(Default)]
pub struct CourseLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CourseLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for and returns the lock for `course_id`; released on drop.
    pub async fn acquire(&self, course_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().await;
            // drop entries nobody holds or waits on
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(course_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    pub async fn tracked(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_same_course_is_serialized() {
        let locks = Arc::new(CourseLocks::new());
        let guard = locks.acquire("c1").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("c1").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender should get the lock")
            .unwrap();
    }

    #[tokio::test]
    async fn test_other_courses_do_not_wait() {
        let locks = CourseLocks::new();
        let _c1 = locks.acquire("c1").await;
        let c2 = tokio::time::timeout(Duration::from_millis(100), locks.acquire("c2")).await;
        assert!(c2.is_ok());
    }

    #[tokio::test]
    async fn test_released_locks_are_pruned() {
        let locks = CourseLocks::new();
        drop(locks.acquire("c1").await);
        drop(locks.acquire("c2").await);
        assert!(locks.tracked().await <= 1);
    }
}
