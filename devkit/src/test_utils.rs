/*!
Test harness for the inventory kernel

Bundles what most kernel tests need:
- a stub Consul catalog on a loopback port
- a scratch directory for the snapshot file
- tracing routed to the test output (filtered by RUST_LOG)
*/

use crate::catalog_stub::MockCatalog;
use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

pub struct TestHarness {
    pub catalog: MockCatalog,
    dir: TempDir,
}

impl TestHarness {
    pub async fn new() -> Self {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();

        let dir = tempfile::tempdir().expect("failed to create scratch directory");
        Self {
            catalog: MockCatalog::start().await,
            dir,
        }
    }

    /// Snapshot file inside the scratch directory, not created yet.
    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.path().join("websites.json")
    }

    /// Polls `condition` every 20ms until it holds or `timeout_ms` elapses.
    pub async fn wait_until<F>(&self, timeout_ms: u64, mut condition: F) -> Result<()>
    where
        F: FnMut() -> bool,
    {
        let start = std::time::Instant::now();
        while start.elapsed() < Duration::from_millis(timeout_ms) {
            if condition() {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tracing::warn!("condition still false after {timeout_ms}ms");
        anyhow::bail!("timed out after {timeout_ms}ms")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_snapshot_path_is_inside_scratch_dir() {
        let harness = TestHarness::new().await;
        let path = harness.snapshot_path();
        assert!(path.starts_with(harness.dir.path()));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_wait_until() {
        let harness = TestHarness::new().await;
        let mut calls = 0;
        harness
            .wait_until(1000, || {
                calls += 1;
                calls >= 3
            })
            .await
            .unwrap();
        assert!(harness.wait_until(60, || false).await.is_err());
    }
}
