use std::path::Path;

use anyhow::{Context, Result};
use devauth_security::sign_request;
use tokio::io::AsyncReadExt;

/// Sign an auth request body with a device key, for `x-devauth-signature`.
///
/// Reads the body from `file`, or stdin when absent. The body is signed
/// byte-for-byte; pipe it exactly as it will be sent.
pub async fn run(key: &Path, file: Option<&Path>) -> Result<()> {
    let pem = tokio::fs::read_to_string(key)
        .await
        .with_context(|| format!("Failed to read device key from {}", key.display()))?;
    let body = match file {
        Some(path) => tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read request body from {}", path.display()))?,
        None => {
            let mut buf = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buf)
                .await
                .context("Failed to read request body from stdin")?;
            buf
        }
    };
    println!("{}", sign_request(&body, &pem)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICE_PRIVATE: &str = include_str!("../../../testdata/device_private.pem");

    #[tokio::test]
    async fn signs_body_file() {
        let dir = std::env::temp_dir().join(format!("devauth-sign-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let key = dir.join("device.pem");
        let body = dir.join("body.json");
        std::fs::write(&key, DEVICE_PRIVATE).unwrap();
        std::fs::write(&body, br#"{"id_data":"x","pubkey":"y"}"#).unwrap();
        run(&key, Some(&body)).await.unwrap();
    }

    #[tokio::test]
    async fn missing_key_is_reported() {
        let err = run(Path::new("/nonexistent/device.pem"), None).await.unwrap_err();
        assert!(err.to_string().contains("device key"));
    }
}
