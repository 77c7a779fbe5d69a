//! In-memory chain used by tests

use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use counter_bindings::{COUNTER_ADDRESS, CounterCall, counter_binding, decode_uint256};
use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
    time::Duration,
};

use crate::{
    error::ProviderError,
    provider::{ChainProvider, ReceiptStatus},
};

const NUMBER_SELECTOR: [u8; 4] = [0x83, 0x81, 0xf5, 0x8a];
const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

#[derive(Debug)]
struct PendingTx {
    data: Bytes,
    polls_remaining: u32,
    outcome: ReceiptStatus,
    applied: bool,
}

#[derive(Debug, Default)]
struct MockState {
    number: U256,
    native_balance: U256,
    token_balances: HashMap<Address, U256>,
    read_error: Option<String>,
    read_delays: VecDeque<Duration>,
    reads: usize,
    send_error: Option<String>,
    next_outcome: Option<ReceiptStatus>,
    receipt_polls: u32,
    sent: Vec<Bytes>,
    txs: HashMap<B256, PendingTx>,
    tx_counter: u8,
}

/// Counter contract plus balances, mined on receipt polling
#[derive(Debug, Default)]
pub(crate) struct MockProvider {
    state: Mutex<MockState>,
}

impl MockProvider {
    pub(crate) fn new(number: u64) -> Self {
        let provider = Self::default();
        provider.set_number(number);
        provider
    }

    pub(crate) fn set_number(&self, number: u64) {
        self.state.lock().unwrap().number = U256::from(number);
    }

    pub(crate) fn number(&self) -> U256 {
        self.state.lock().unwrap().number
    }

    pub(crate) fn set_native_balance(&self, balance: U256) {
        self.state.lock().unwrap().native_balance = balance;
    }

    pub(crate) fn set_token_balance(&self, token: Address, balance: U256) {
        self.state.lock().unwrap().token_balances.insert(token, balance);
    }

    pub(crate) fn fail_reads(&self, message: &str) {
        self.state.lock().unwrap().read_error = Some(message.to_string());
    }

    pub(crate) fn heal_reads(&self) {
        self.state.lock().unwrap().read_error = None;
    }

    pub(crate) fn push_read_delay(&self, delay: Duration) {
        self.state.lock().unwrap().read_delays.push_back(delay);
    }

    pub(crate) fn read_count(&self) -> usize {
        self.state.lock().unwrap().reads
    }

    /// Next `send_transaction` fails with `message`
    pub(crate) fn reject_next_send(&self, message: &str) {
        self.state.lock().unwrap().send_error = Some(message.to_string());
    }

    /// Next mined transaction reverts
    pub(crate) fn revert_next(&self) {
        self.state.lock().unwrap().next_outcome = Some(ReceiptStatus::Reverted);
    }

    /// Receipt polls answered with "not mined" before the receipt appears
    pub(crate) fn set_receipt_polls(&self, polls: u32) {
        self.state.lock().unwrap().receipt_polls = polls;
    }

    pub(crate) fn sent_calls(&self) -> Vec<Bytes> {
        self.state.lock().unwrap().sent.clone()
    }

    fn apply(state: &mut MockState, data: &[u8]) {
        let binding = counter_binding(COUNTER_ADDRESS);
        let one = U256::from(1u64);
        if data[..4] == CounterCall::Increment.encode(&binding).unwrap()[..] {
            state.number += one;
        } else if data[..4] == CounterCall::Decrement.encode(&binding).unwrap()[..] {
            state.number = state.number.saturating_sub(one);
        } else if let Ok(value) = decode_uint256(&data[4..]) {
            state.number = value;
        }
    }
}

#[async_trait]
impl ChainProvider for MockProvider {
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ProviderError> {
        let (response, delay) = {
            let mut state = self.state.lock().unwrap();
            state.reads += 1;
            let delay = state.read_delays.pop_front();
            let response = match &state.read_error {
                Some(message) => Err(ProviderError::Rpc { code: -32000, message: message.clone() }),
                None if data.starts_with(&NUMBER_SELECTOR) => {
                    Ok(Bytes::from(state.number.to_be_bytes::<32>().to_vec()))
                }
                None if data.starts_with(&BALANCE_OF_SELECTOR) => {
                    let balance = state.token_balances.get(&to).copied().unwrap_or_default();
                    Ok(Bytes::from(balance.to_be_bytes::<32>().to_vec()))
                }
                None => Err(ProviderError::Rpc { code: -32000, message: "execution reverted".into() }),
            };
            (response, delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        response
    }

    async fn send_transaction(&self, _to: Address, data: Bytes) -> Result<B256, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.sent.push(data.clone());
        if let Some(message) = state.send_error.take() {
            return Err(ProviderError::Rpc { code: 4001, message });
        }

        state.tx_counter += 1;
        let tx = B256::repeat_byte(state.tx_counter);
        let pending = PendingTx {
            data,
            polls_remaining: state.receipt_polls,
            outcome: state.next_outcome.take().unwrap_or(ReceiptStatus::Success),
            applied: false,
        };
        state.txs.insert(tx, pending);
        Ok(tx)
    }

    async fn receipt_status(&self, tx: B256) -> Result<Option<ReceiptStatus>, ProviderError> {
        let mut state = self.state.lock().unwrap();
        let Some(pending) = state.txs.get_mut(&tx) else {
            return Ok(None);
        };
        if pending.polls_remaining > 0 {
            pending.polls_remaining -= 1;
            return Ok(None);
        }

        let outcome = pending.outcome;
        if outcome == ReceiptStatus::Success && !pending.applied {
            pending.applied = true;
            let data = pending.data.clone();
            Self::apply(&mut state, &data);
        }
        Ok(Some(outcome))
    }

    async fn balance(&self, _owner: Address) -> Result<U256, ProviderError> {
        Ok(self.state.lock().unwrap().native_balance)
    }
}
