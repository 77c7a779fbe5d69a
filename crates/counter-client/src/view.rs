//! Text rendering of the channel states and user intent parsing

use alloy_primitives::{Address, U256};
use counter_bindings::Explorer;
use std::fmt;

use crate::{
    error::ValidationError,
    portfolio::Asset,
    read::ReadState,
    reconcile::ReconciliationState,
    write::{WriteState, WriteStatus},
};

/// Label shown on every action while a write is pending
pub const PROCESSING_LABEL: &str = "Processing...";

/// Command summary
pub const HELP: &str = "\
Commands:
  +, inc         increment the counter
  -, dec         decrement the counter
  set <value>    set the counter to <value>
  r, refresh     re-read the current value
  b, balances    show token balances of the connected account
  h, help        show this help
  q, quit        exit";

/// Something the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Call `increment()`
    Increment,
    /// Call `decrement()`
    Decrement,
    /// Call `setNumber` with the raw input text; validated before submission
    SetNumber(String),
    /// Re-read the value
    Refresh,
    /// Load token balances
    Balances,
    /// Show help
    Help,
    /// Tear down and exit
    Quit,
}

impl Intent {
    /// Parse one input line; `None` for anything unrecognised
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        match command.to_ascii_lowercase().as_str() {
            "+" | "inc" | "increment" => Some(Self::Increment),
            "-" | "dec" | "decrement" => Some(Self::Decrement),
            "set" | "setnumber" => Some(Self::SetNumber(rest.to_string())),
            "r" | "refresh" => Some(Self::Refresh),
            "b" | "balances" => Some(Self::Balances),
            "h" | "help" | "?" => Some(Self::Help),
            "q" | "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Validate `setNumber` input: a non-empty string of decimal digits that
/// fits in `uint256`.
pub fn parse_new_value(input: &str) -> Result<U256, ValidationError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ValidationError::Empty);
    }
    if !input.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::NotNumeric(input.to_string()));
    }
    U256::from_str_radix(input, 10).map_err(|_| ValidationError::OutOfRange(input.to_string()))
}

/// Everything the counter panel shows
#[derive(Debug, Clone, Copy)]
pub struct CounterView<'a> {
    /// Network display name
    pub network: &'a str,
    /// Counter address
    pub contract: Address,
    /// Explorer used for links
    pub explorer: &'a Explorer,
    /// Read channel state
    pub read: &'a ReadState,
    /// Write channel state
    pub write: &'a WriteState,
    /// Reconciliation hints
    pub reconcile: &'a ReconciliationState,
    /// Input validation message from the last intent
    pub notice: Option<&'a str>,
}

impl CounterView<'_> {
    /// Render the panel as text
    pub fn render(&self) -> String {
        self.to_string()
    }

    fn label<'l>(&self, idle: &'l str) -> &'l str {
        if self.write.is_pending() { PROCESSING_LABEL } else { idle }
    }
}

impl fmt::Display for CounterView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Counter Contract")?;
        writeln!(f, "Network: {}", self.network)?;
        writeln!(f, "Contract Address: {}", self.contract)?;
        writeln!(f, "  {}", self.explorer.address_url(&self.contract))?;
        writeln!(f)?;

        let value = if self.read.is_loading {
            "Loading...".to_string()
        } else if self.read.is_error() {
            "Error reading contract value".to_string()
        } else {
            self.read.value.map_or_else(|| "-".to_string(), |v| v.to_string())
        };
        let marker = if self.reconcile.is_pulsing { "  (updated)" } else { "" };
        writeln!(f, "Current Value: {value}{marker}")?;

        if self.write.is_pending() {
            if let Some(prior) = self.reconcile.last_observed_prior_value {
                writeln!(f, "  changing from {prior}...")?;
            }
            writeln!(f, "Transaction in progress...")?;
            writeln!(f, "  Status: {}", self.write.status.as_str())?;
        }
        if let Some(tx) = self.write.tx_id {
            writeln!(f, "Transaction: {}", self.explorer.tx_url(&tx))?;
        }
        if self.write.status == WriteStatus::Failed {
            let message = self.write.error.as_deref().unwrap_or("unknown error");
            writeln!(f, "Transaction failed: {message}")?;
        }
        if let Some(notice) = self.notice {
            writeln!(f, "{notice}")?;
        }

        writeln!(f)?;
        write!(
            f,
            "[+] {}  [-] {}  [set <n>] {}  [r] Refresh Value",
            self.label("Increment (+1)"),
            self.label("Decrement (-1)"),
            self.label("Set Value"),
        )
    }
}

/// The portfolio panel
#[derive(Debug, Clone, Copy)]
pub struct PortfolioView<'a> {
    /// Account whose balances are shown
    pub owner: Address,
    /// Tokens with a positive balance
    pub assets: &'a [Asset],
    /// A balance read is still in flight
    pub loading: bool,
}

impl fmt::Display for PortfolioView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Portfolio Balance")?;
        writeln!(f, "Account: {}", self.owner)?;

        if self.loading {
            return write!(f, "Loading...");
        }
        if self.assets.is_empty() {
            return write!(f, "No assets found in this wallet");
        }

        let noun = if self.assets.len() == 1 { "Token" } else { "Tokens" };
        write!(f, "Your Assets: {} {noun}", self.assets.len())?;
        for asset in self.assets {
            write!(
                f,
                "\n  {} {:<10} {} {}",
                asset.token.logo, asset.token.name, asset.formatted, asset.token.symbol
            )?;
        }
        Ok(())
    }
}

/// Render the portfolio panel
pub fn render_portfolio(owner: Address, assets: &[Asset], loading: bool) -> String {
    PortfolioView { owner, assets, loading }.to_string()
}
