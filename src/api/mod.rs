//! Fetch collaborators: where batches of board tokens come from.

pub mod dexscreener;
pub mod mock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Token;

/// Supplies complete, well-formed token records. May fail or be slow; the
/// fetch poller owns retries.
#[async_trait]
pub trait TokenSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_tokens(&self) -> Result<Vec<Token>>;
}

pub use dexscreener::DexScreenerClient;
pub use mock::MockTokenSource;
