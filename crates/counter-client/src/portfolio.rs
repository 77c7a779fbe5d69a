//! Token balances of the connected account
//!
//! One independent read channel per token, refreshed concurrently and joined
//! into a map keyed by token id.

use alloy_primitives::{Address, U256};
use counter_bindings::{AbiError, BALANCE_OF_FN, TokenInfo, erc20_binding, format_units};
use std::{collections::BTreeMap, sync::Arc};
use tokio::task::JoinSet;
use tracing::warn;

use crate::{
    provider::ChainProvider,
    read::{ReadChannel, ReadQuery, ReadState},
};

/// Fraction digits shown for balances
const DISPLAY_FRACTION_DIGITS: usize = 6;

/// A token with a non-zero balance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Token metadata
    pub token: TokenInfo,
    /// Raw amount in the smallest unit
    pub amount: U256,
    /// Human readable amount
    pub formatted: String,
}

/// Balance reads for a fixed token list
#[derive(Debug)]
pub struct Portfolio {
    owner: Address,
    channels: Vec<(TokenInfo, Arc<ReadChannel>)>,
}

impl Portfolio {
    /// Build one read channel per token for `owner`
    pub fn new(
        provider: Arc<dyn ChainProvider>,
        owner: Address,
        tokens: &[TokenInfo],
    ) -> Result<Self, AbiError> {
        let channels = tokens
            .iter()
            .map(|token| {
                let query = match token.address {
                    None => ReadQuery::NativeBalance { owner },
                    Some(address) => {
                        ReadQuery::contract(&erc20_binding(address), BALANCE_OF_FN, &[owner.into()])?
                    }
                };
                Ok((*token, Arc::new(ReadChannel::new(provider.clone(), query))))
            })
            .collect::<Result<Vec<_>, AbiError>>()?;

        Ok(Self { owner, channels })
    }

    /// Account whose balances are read
    pub const fn owner(&self) -> Address {
        self.owner
    }

    /// The per-token read channels, in token-list order
    pub fn read_channels(&self) -> Vec<Arc<ReadChannel>> {
        self.channels.iter().map(|(_, channel)| channel.clone()).collect()
    }

    /// Refresh every token concurrently and return once all have settled
    pub async fn load(&self) -> BTreeMap<&'static str, ReadState> {
        let mut reads = JoinSet::new();
        for (token, channel) in &self.channels {
            let id = token.id;
            let channel = channel.clone();
            reads.spawn(async move { (id, channel.refresh().await) });
        }

        let mut balances = BTreeMap::new();
        while let Some(joined) = reads.join_next().await {
            match joined {
                Ok((id, state)) => {
                    balances.insert(id, state);
                }
                Err(e) => warn!(target: "counter::portfolio", error = %e, "Balance read task failed"),
            }
        }
        balances
    }

    /// Current state of every token, without querying
    pub fn balances(&self) -> BTreeMap<&'static str, ReadState> {
        self.channels.iter().map(|(token, channel)| (token.id, channel.state())).collect()
    }

    /// Tokens with a positive balance, in token-list order
    pub fn assets(&self) -> Vec<Asset> {
        self.channels
            .iter()
            .filter_map(|(token, channel)| {
                let amount = channel.state().value.filter(|v| !v.is_zero())?;
                Some(Asset {
                    token: *token,
                    amount,
                    formatted: format_units(amount, token.decimals, DISPLAY_FRACTION_DIGITS),
                })
            })
            .collect()
    }

    /// Whether any token is still loading
    pub fn is_loading(&self) -> bool {
        self.channels.iter().any(|(_, channel)| channel.state().is_loading)
    }
}
