//! Contract bindings
//!
//! Static description of the Counter contract and the ERC-20 tokens shown in
//! the portfolio: addresses, function schemas and call encoding.

pub mod abi;
pub mod counter;
pub mod explorer;
pub mod tokens;

pub use abi::{
    AbiError, AbiType, AbiValue, ContractBinding, FunctionSpec, Mutability, Param, decode_uint256,
};
pub use counter::{COUNTER_ABI, COUNTER_ADDRESS, CounterCall, NUMBER_FN, counter_binding};
pub use explorer::{DEFAULT_EXPLORER_URL, Explorer};
pub use tokens::{BALANCE_OF_FN, DEFAULT_TOKENS, TokenInfo, erc20_binding, format_units};
