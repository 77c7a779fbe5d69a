//! Counter session
//!
//! Wires the binding, both channels, the reconciliation controller and the
//! optional portfolio together, and maps user intents onto them.

use anyhow::Result;
use counter_bindings::{
    AbiError, ContractBinding, CounterCall, DEFAULT_TOKENS, Explorer, NUMBER_FN, counter_binding,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::{
    config::Config,
    error::ValidationError,
    journal::WriteJournal,
    portfolio::Portfolio,
    provider::{ChainProvider, JsonRpcProvider},
    read::{ReadChannel, ReadQuery, ReadState},
    reconcile::{ReconciliationController, ReconciliationState},
    view::{CounterView, HELP, Intent, parse_new_value, render_portfolio},
    write::{WriteChannel, WriteState},
};

/// Network shown in the panel header
pub const NETWORK_NAME: &str = "Base Sepolia Testnet";

/// Result of handling one intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A write was handed to the write channel
    Submitted(CounterCall),
    /// The value was re-read
    Refreshed(ReadState),
    /// `setNumber` input was rejected; nothing was submitted
    Rejected(ValidationError),
    /// Text to show once (help, balances)
    Message(String),
    /// The user asked to exit
    Quit,
}

/// Receivers for every state the panel renders
#[derive(Debug)]
pub struct StateWatch {
    read: watch::Receiver<ReadState>,
    write: watch::Receiver<WriteState>,
    reconcile: watch::Receiver<ReconciliationState>,
}

impl StateWatch {
    /// Wait until any state changes. Returns `false` once a source is gone.
    pub async fn changed(&mut self) -> bool {
        tokio::select! {
            r = self.read.changed() => r.is_ok(),
            w = self.write.changed() => w.is_ok(),
            c = self.reconcile.changed() => c.is_ok(),
        }
    }

    /// Treat every current state as seen, so the next [`Self::changed`] only
    /// fires for later updates
    pub fn mark_seen(&mut self) {
        drop(self.read.borrow_and_update());
        drop(self.write.borrow_and_update());
        drop(self.reconcile.borrow_and_update());
    }
}

/// One interactive session against the Counter contract
#[derive(Debug)]
pub struct CounterSession {
    binding: ContractBinding,
    explorer: Explorer,
    read: Arc<ReadChannel>,
    write: WriteChannel,
    controller: ReconciliationController,
    portfolio: Option<Portfolio>,
    journal: WriteJournal,
    notice: Option<String>,
}

impl CounterSession {
    /// Build a session from `config` using the JSON-RPC provider
    pub fn connect(config: &Config) -> Result<Self> {
        let provider = Arc::new(JsonRpcProvider::new(config.rpc_url.clone(), config.account));
        let journal = WriteJournal::new(config.trace.enabled, config.trace.path.clone());
        Ok(Self::new(config, provider, journal)?)
    }

    /// Build a session on top of any provider. Must run inside a tokio runtime.
    pub fn new(
        config: &Config,
        provider: Arc<dyn ChainProvider>,
        journal: WriteJournal,
    ) -> Result<Self, AbiError> {
        let binding = counter_binding(config.counter_address);
        let read = Arc::new(ReadChannel::new(
            provider.clone(),
            ReadQuery::contract(&binding, NUMBER_FN, &[])?,
        ));
        let write = WriteChannel::new(
            provider.clone(),
            binding.clone(),
            config.timing.clone(),
            journal.clone(),
        );
        let portfolio = config
            .account
            .map(|owner| Portfolio::new(provider, owner, &DEFAULT_TOKENS))
            .transpose()?;
        let followers = portfolio.as_ref().map(Portfolio::read_channels).unwrap_or_default();
        let controller = ReconciliationController::spawn_with_followers(
            read.clone(),
            followers,
            write.clone(),
            &config.timing,
            journal.clone(),
        );

        Ok(Self {
            binding,
            explorer: Explorer::new(config.explorer_url.clone()),
            read,
            write,
            controller,
            portfolio,
            journal,
            notice: None,
        })
    }

    /// Watch every rendered state
    pub fn watch(&self) -> StateWatch {
        StateWatch {
            read: self.read.subscribe(),
            write: self.write.subscribe(),
            reconcile: self.controller.subscribe(),
        }
    }

    /// Current read state
    pub fn read_state(&self) -> ReadState {
        self.read.state()
    }

    /// Current write state
    pub fn write_state(&self) -> WriteState {
        self.write.state()
    }

    /// Current reconciliation state
    pub fn reconcile_state(&self) -> ReconciliationState {
        self.controller.state()
    }

    /// Read the value
    pub async fn refresh(&self) -> ReadState {
        self.read.refresh().await
    }

    /// Initial load: the value and, with a connected account, the balances
    pub async fn start(&self) -> ReadState {
        match &self.portfolio {
            Some(portfolio) => tokio::join!(self.read.refresh(), portfolio.load()).0,
            None => self.read.refresh().await,
        }
    }

    /// Balances as last loaded, without querying. `None` without an account.
    pub fn portfolio_text(&self) -> Option<String> {
        self.portfolio.as_ref().map(|portfolio| {
            render_portfolio(portfolio.owner(), &portfolio.assets(), portfolio.is_loading())
        })
    }

    /// Handle one user intent. Writes are submitted without waiting for
    /// confirmation.
    pub async fn dispatch(&mut self, intent: Intent) -> Outcome {
        self.notice = None;
        match intent {
            Intent::Increment => self.submit(CounterCall::Increment),
            Intent::Decrement => self.submit(CounterCall::Decrement),
            Intent::SetNumber(input) => match parse_new_value(&input) {
                Ok(value) => self.submit(CounterCall::SetNumber(value)),
                Err(e) => {
                    info!(target: "counter::session", input = %input, error = %e, "Rejected setNumber input");
                    self.notice = Some(format!("Invalid value: {e}"));
                    Outcome::Rejected(e)
                }
            },
            Intent::Refresh => Outcome::Refreshed(self.read.refresh().await),
            Intent::Balances => Outcome::Message(self.balances().await),
            Intent::Help => Outcome::Message(HELP.to_string()),
            Intent::Quit => Outcome::Quit,
        }
    }

    fn submit(&self, call: CounterCall) -> Outcome {
        // The handle is dropped on purpose: the transaction keeps running and
        // its progress is observed through the write state.
        drop(self.controller.submit(call));
        Outcome::Submitted(call)
    }

    async fn balances(&self) -> String {
        match &self.portfolio {
            Some(portfolio) => {
                portfolio.load().await;
                render_portfolio(portfolio.owner(), &portfolio.assets(), portfolio.is_loading())
            }
            None => "Connect a wallet account (ACCOUNT_ADDRESS) to see balances".to_string(),
        }
    }

    /// Render the counter panel
    pub fn render(&self) -> String {
        let read = self.read.state();
        let write = self.write.state();
        let reconcile = self.controller.state();
        CounterView {
            network: NETWORK_NAME,
            contract: self.binding.address,
            explorer: &self.explorer,
            read: &read,
            write: &write,
            reconcile: &reconcile,
            notice: self.notice.as_deref(),
        }
        .render()
    }

    /// Tear down: cancel pending refreshes and sync the journal
    pub fn shutdown(self) {
        self.controller.shutdown();
        if let Err(e) = self.journal.sync_all() {
            warn!(target: "counter::session", error = %e, "Failed to sync journal");
        }
    }
}
