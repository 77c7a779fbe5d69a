//! Token list and ERC-20 balance binding

use alloy_primitives::{Address, U256, address};

use crate::abi::{AbiType, ContractBinding, FunctionSpec, Mutability, Param};

/// ERC-20 balance read
pub const BALANCE_OF_FN: &str = "balanceOf";

/// Token shown in the portfolio view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenInfo {
    /// Stable identifier, used as the portfolio key
    pub id: &'static str,
    /// Display name
    pub name: &'static str,
    /// Ticker
    pub symbol: &'static str,
    /// ERC-20 contract, `None` for the native coin
    pub address: Option<Address>,
    /// Decimal places of the smallest unit
    pub decimals: u8,
    /// Single-character logo
    pub logo: char,
}

impl TokenInfo {
    /// Whether this is the chain's native coin
    pub const fn is_native(&self) -> bool {
        self.address.is_none()
    }
}

/// Tokens checked by default
pub const DEFAULT_TOKENS: [TokenInfo; 4] = [
    TokenInfo {
        id: "ethereum",
        name: "Ethereum",
        symbol: "ETH",
        address: None,
        decimals: 18,
        logo: 'Ξ',
    },
    TokenInfo {
        id: "usdc",
        name: "USD Coin",
        symbol: "USDC",
        address: Some(address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48")),
        decimals: 6,
        logo: 'U',
    },
    TokenInfo {
        id: "usdt",
        name: "Tether",
        symbol: "USDT",
        address: Some(address!("dAC17F958D2ee523a2206206994597C13D831ec7")),
        decimals: 6,
        logo: 'T',
    },
    TokenInfo {
        id: "dai",
        name: "Dai",
        symbol: "DAI",
        address: Some(address!("6B175474E89094C44Da98b954EedeAC495271d0F")),
        decimals: 18,
        logo: 'D',
    },
];

/// `balanceOf(address) -> uint256` binding for an ERC-20 token
pub fn erc20_binding(address: Address) -> ContractBinding {
    ContractBinding::new(
        address,
        vec![FunctionSpec::new(
            BALANCE_OF_FN,
            vec![Param::new("owner", AbiType::Address)],
            vec![AbiType::Uint256],
            Mutability::Read,
        )],
    )
}

/// Format a raw token amount with `decimals`, keeping at most `max_fraction`
/// fraction digits and grouping the integer part with commas.
pub fn format_units(amount: U256, decimals: u8, max_fraction: usize) -> String {
    let unit = U256::from(10u64).pow(U256::from(decimals));
    let (integer, fraction) = amount.div_rem(unit);

    let digits = integer.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if decimals == 0 || max_fraction == 0 {
        return grouped;
    }

    let padded = format!("{:0>width$}", fraction.to_string(), width = decimals as usize);
    let kept = &padded[..max_fraction.min(padded.len())];
    let trimmed = kept.trim_end_matches('0');
    if trimmed.is_empty() { grouped } else { format!("{grouped}.{trimmed}") }
}
