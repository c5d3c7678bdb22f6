//! Bounded storage calls.
//!
//! Storage failures and timeouts both surface as [`DevAuthError::Internal`];
//! nothing here retries.

use std::future::Future;
use std::time::Duration;

use anyhow::anyhow;

use crate::error::DevAuthError;

/// Default bound on a single storage call.
pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Await a storage operation for at most `limit`.
pub async fn bounded<T, F>(limit: Duration, op: &'static str, fut: F) -> Result<T, DevAuthError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(DevAuthError::Internal(e.context(format!("storage call `{op}` failed")))),
        Err(_) => Err(DevAuthError::Internal(anyhow!(
            "storage call `{op}` timed out after {}ms",
            limit.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_values_through() {
        let v = bounded(Duration::from_millis(50), "get", async { Ok(7) }).await.unwrap();
        assert_eq!(v, 7);
    }

    #[tokio::test]
    async fn errors_become_internal() {
        let err = bounded::<(), _>(Duration::from_millis(50), "get", async {
            Err(anyhow!("connection reset"))
        })
        .await
        .unwrap_err();
        assert!(err.is_internal());
        assert!(format!("{err:#}").contains("connection reset"));
    }

    #[tokio::test]
    async fn timeouts_become_internal() {
        let err = bounded::<(), _>(Duration::from_millis(10), "list", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(err.is_internal());
        assert!(err.to_string().contains("timed out"));
    }
}
