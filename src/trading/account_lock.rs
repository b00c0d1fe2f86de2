//! One async mutex per account so signals for the same account run one at a time.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

#[derive(Default, Clone)]
pub struct AccountLocks {
    locks: Arc<RwLock<HashMap<String, Arc<Mutex<()>>>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other signal holds `account`. The guard releases on drop.
    pub async fn acquire(&self, account: &str) -> OwnedMutexGuard<()> {
        let key = account.to_lowercase();

        let existing = self.locks.read().await.get(&key).cloned();
        let lock = match existing {
            Some(lock) => lock,
            None => {
                let mut locks = self.locks.write().await;
                locks.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
            }
        };

        lock.lock_owned().await
    }
}
