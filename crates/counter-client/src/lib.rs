//! Read/write reconciliation client for the Counter contract
//!
//! A read channel that caches the contract value, a write channel that tracks
//! one transaction through its lifecycle, and a controller that re-reads the
//! value after each confirmed write.

pub mod config;
pub mod error;
pub mod journal;
pub mod portfolio;
pub mod provider;
pub mod read;
pub mod reconcile;
pub mod session;
pub mod view;
pub mod write;

#[cfg(test)]
mod mock;

pub use config::{Config, Timing, TraceConfig};
pub use error::{ProviderError, ValidationError};
pub use journal::{LifecycleEvent, WriteJournal};
pub use portfolio::{Asset, Portfolio};
pub use provider::{ChainProvider, JsonRpcProvider, ReceiptStatus};
pub use read::{ReadChannel, ReadQuery, ReadState};
pub use reconcile::{ReconciliationController, ReconciliationState};
pub use session::{CounterSession, NETWORK_NAME, Outcome, StateWatch};
pub use view::{CounterView, Intent, PortfolioView, parse_new_value, render_portfolio};
pub use write::{WriteChannel, WriteState, WriteStatus};
