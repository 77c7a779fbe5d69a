//! Read channel
//!
//! Queries a single `uint256` value and publishes the latest [`ReadState`]
//! on a watch channel. Overlapping refreshes are allowed; each one takes a
//! sequence number and a result is only published if no later-started
//! refresh has already been published.

use alloy_primitives::{Address, Bytes, U256};
use counter_bindings::{AbiError, AbiValue, ContractBinding, decode_uint256};
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{error::ProviderError, provider::ChainProvider};

/// Latest known result of a read query. Replaced wholesale, never patched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadState {
    /// Last successfully read value; `None` when unknown
    pub value: Option<U256>,
    /// No value yet and a query is in flight
    pub is_loading: bool,
    /// Message of the failed query
    pub error: Option<String>,
}

impl ReadState {
    /// Initial load in progress
    pub const fn loading() -> Self {
        Self { value: None, is_loading: true, error: None }
    }

    /// Successful read
    pub const fn loaded(value: U256) -> Self {
        Self { value: Some(value), is_loading: false, error: None }
    }

    /// Failed read; the value is treated as unknown
    pub fn failed(message: impl Into<String>) -> Self {
        Self { value: None, is_loading: false, error: Some(message.into()) }
    }

    /// Whether the last query failed
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// What a read channel asks the provider for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadQuery {
    /// `eth_call` returning one `uint256` word
    Call {
        /// Contract address
        to: Address,
        /// Encoded calldata
        data: Bytes,
    },
    /// Native coin balance
    NativeBalance {
        /// Account to query
        owner: Address,
    },
}

impl ReadQuery {
    /// Query `function(args)` on `binding`
    pub fn contract(
        binding: &ContractBinding,
        function: &str,
        args: &[AbiValue],
    ) -> Result<Self, AbiError> {
        Ok(Self::Call { to: binding.address, data: binding.encode_call(function, args)? })
    }

    async fn execute(&self, provider: &dyn ChainProvider) -> Result<U256, ProviderError> {
        match self {
            Self::Call { to, data } => {
                let output = provider.call(*to, data.clone()).await?;
                Ok(decode_uint256(&output)?)
            }
            Self::NativeBalance { owner } => provider.balance(*owner).await,
        }
    }
}

/// Queries one value and owns its [`ReadState`]
#[derive(Debug)]
pub struct ReadChannel {
    provider: Arc<dyn ChainProvider>,
    query: ReadQuery,
    state: watch::Sender<ReadState>,
    next_seq: AtomicU64,
    applied_seq: AtomicU64,
}

impl ReadChannel {
    /// Create a channel; no query is issued until [`Self::refresh`]
    pub fn new(provider: Arc<dyn ChainProvider>, query: ReadQuery) -> Self {
        Self {
            provider,
            query,
            state: watch::Sender::new(ReadState::default()),
            next_seq: AtomicU64::new(0),
            applied_seq: AtomicU64::new(0),
        }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> ReadState {
        self.state.borrow().clone()
    }

    /// Observe state changes
    pub fn subscribe(&self) -> watch::Receiver<ReadState> {
        self.state.subscribe()
    }

    /// Issue the query and return the state after it completes. A result is
    /// dropped if a refresh started later has already been published.
    pub async fn refresh(&self) -> ReadState {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;

        self.state.send_if_modified(|state| {
            if state.value.is_none() && !state.is_loading {
                *state = ReadState::loading();
                true
            } else {
                false
            }
        });

        let next = match self.query.execute(self.provider.as_ref()).await {
            Ok(value) => ReadState::loaded(value),
            Err(e) => {
                warn!(target: "counter::read", seq, error = %e, "Read query failed");
                ReadState::failed(e.to_string())
            }
        };

        if self.applied_seq.fetch_max(seq, Ordering::SeqCst) < seq {
            debug!(target: "counter::read", seq, value = ?next.value, "Read completed");
            self.state.send_replace(next);
        } else {
            debug!(target: "counter::read", seq, "Discarding read overtaken by a newer one");
        }

        self.state()
    }
}
