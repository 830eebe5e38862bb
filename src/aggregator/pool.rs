use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::errors::AggregatorError;

/// Bounded pool that fan-out consumers run their units of work on.
///
/// Owned by the consumer that created it and closed on shutdown; closing
/// makes further submissions fail with [`AggregatorError::PoolClosed`].
#[derive(Debug, Clone)]
pub struct WorkerPool {
    name: String,
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        let size = size.max(1);
        Self {
            name: name.into(),
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    pub fn close(&self) {
        self.permits.close();
    }

    /// Run every task, at most `size` at a time, and wait for all of them.
    ///
    /// Results come back in completion order. Units already started keep
    /// running when a sibling fails; the first failure is returned once all
    /// have finished.
    pub async fn invoke_all<T, F, Fut>(&self, tasks: Vec<F>) -> Result<Vec<T>, AggregatorError>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, AggregatorError>> + Send + 'static,
    {
        if self.is_closed() {
            return Err(AggregatorError::PoolClosed(self.name.clone()));
        }

        let mut set = JoinSet::new();
        for task in tasks {
            let permits = Arc::clone(&self.permits);
            let name = self.name.clone();
            set.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|_| AggregatorError::PoolClosed(name))?;
                task().await
            });
        }

        let mut results = Vec::with_capacity(set.len());
        let mut first_error = None;
        while let Some(joined) = set.join_next().await {
            let outcome = joined.map_err(|e| AggregatorError::Interrupted(e.to_string()));
            match outcome.and_then(|r| r) {
                Ok(value) => results.push(value),
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(results),
        }
    }
}
