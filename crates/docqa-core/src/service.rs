//! Deadlines for calls to external services.
use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Which external service a call targets; selects the error a timeout maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Embedding,
    Generation,
}

impl ServiceKind {
    pub fn error(self, message: impl Into<String>) -> Error {
        match self {
            ServiceKind::Embedding => Error::EmbeddingService(message.into()),
            ServiceKind::Generation => Error::GenerationService(message.into()),
        }
    }
}

/// Run `fut` under `timeout`; `None` waits indefinitely.
pub async fn with_timeout<T, F>(kind: ServiceKind, timeout: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| kind.error(format!("timed out after {:?}", limit)))?,
        None => fut.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn expired_deadline_maps_to_service_error() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, Error>(1)
        };
        let err = with_timeout(ServiceKind::Generation, Some(Duration::from_millis(20)), slow).await.expect_err("timeout");
        assert!(matches!(err, Error::GenerationService(_)));
    }

    #[tokio::test]
    async fn fast_call_passes_through() {
        let v = with_timeout(ServiceKind::Embedding, Some(Duration::from_secs(1)), async { Ok::<_, Error>(7) }).await.expect("ok");
        assert_eq!(v, 7);
    }
}
