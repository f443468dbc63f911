use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async lock per expression id.
///
/// Every read-modify-write of an expression tree happens while holding the
/// guard returned by [`ExpressionLocks::lock`].
#[derive(Default)]
pub struct ExpressionLocks {
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ExpressionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, expression_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(expression_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Drops the lock of an expression that reached a terminal state.
    pub async fn release(&self, expression_id: i64) {
        self.locks.lock().await.remove(&expression_id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_same_id_is_serialized() {
        let locks = Arc::new(ExpressionLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                let max_inside = max_inside.clone();
                tokio::spawn(async move {
                    let _guard = locks.lock(1).await;
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_ids_do_not_block() {
        let locks = ExpressionLocks::new();
        let _first = locks.lock(1).await;
        let second = tokio::time::timeout(Duration::from_millis(100), locks.lock(2)).await;
        assert!(second.is_ok());
        assert_eq!(locks.locks.lock().await.len(), 2);

        locks.release(1).await;
        assert_eq!(locks.locks.lock().await.len(), 1);
    }
}
