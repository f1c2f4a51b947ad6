use super::CheckpointStore;
use crate::error::BackendError;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// In-memory checkpoint store. Keeps only the latest snapshot per thread.
/// Suited to tests and single-process deployments; durable stores live
/// behind the same trait outside this crate.
#[derive(Default)]
pub struct MemoryCheckpoints {
    snapshots: Mutex<HashMap<String, (String, String)>>,
}

impl MemoryCheckpoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Step name of the latest snapshot for a thread.
    pub async fn last_step(&self, thread_id: &str) -> Option<String> {
        self.snapshots
            .lock()
            .await
            .get(thread_id)
            .map(|(step, _)| step.clone())
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpoints {
    async fn save(
        &self,
        thread_id: &str,
        step: &str,
        snapshot: &str,
    ) -> Result<(), BackendError> {
        self.snapshots
            .lock()
            .await
            .insert(thread_id.to_string(), (step.to_string(), snapshot.to_string()));
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<String>, BackendError> {
        Ok(self
            .snapshots
            .lock()
            .await
            .get(thread_id)
            .map(|(_, snapshot)| snapshot.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn keeps_latest_snapshot_per_thread() {
        let store = MemoryCheckpoints::new();
        store.save("t1", "plan", "{\"a\":1}").await.unwrap();
        store.save("t1", "retrieve", "{\"a\":2}").await.unwrap();
        store.save("t2", "plan", "{\"b\":1}").await.unwrap();

        assert_eq!(store.load("t1").await.unwrap().unwrap(), "{\"a\":2}");
        assert_eq!(store.last_step("t1").await.unwrap(), "retrieve");
        assert_eq!(store.load("t2").await.unwrap().unwrap(), "{\"b\":1}");
        assert!(store.load("t3").await.unwrap().is_none());
    }
}
