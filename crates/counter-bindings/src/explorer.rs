//! Block explorer links (display only)

use alloy_primitives::{Address, B256};

/// Base Sepolia block explorer
pub const DEFAULT_EXPLORER_URL: &str = "https://sepolia.basescan.org";

/// Builds transaction and address links for a block explorer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explorer {
    base_url: String,
}

impl Explorer {
    /// Create an explorer for `base_url`; a trailing slash is ignored
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    /// `{base}/tx/{tx_id}`
    pub fn tx_url(&self, tx_id: &B256) -> String {
        format!("{}/tx/{tx_id:#x}", self.base_url)
    }

    /// `{base}/address/{address}`
    pub fn address_url(&self, address: &Address) -> String {
        format!("{}/address/{address}", self.base_url)
    }
}

impl Default for Explorer {
    fn default() -> Self {
        Self::new(DEFAULT_EXPLORER_URL)
    }
}
