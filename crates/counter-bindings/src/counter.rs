//! Counter contract binding

use alloy_primitives::{Address, Bytes, U256, address};

use crate::abi::{AbiError, AbiType, AbiValue, ContractBinding, FunctionSpec, Mutability, Param};

/// Counter deployment on Base Sepolia
pub const COUNTER_ADDRESS: Address = address!("f28043a5926a1bf7f90DF838D515C3dbB57da7D3");

/// Read function exposing the stored value
pub const NUMBER_FN: &str = "number";

/// JSON ABI of the Counter contract
pub const COUNTER_ABI: &str = r#"[
  {
    "inputs": [],
    "name": "number",
    "outputs": [{"internalType": "uint256", "name": "", "type": "uint256"}],
    "stateMutability": "view",
    "type": "function"
  },
  {
    "inputs": [{"internalType": "uint256", "name": "newNumber", "type": "uint256"}],
    "name": "setNumber",
    "outputs": [],
    "stateMutability": "nonpayable",
    "type": "function"
  },
  {
    "inputs": [],
    "name": "increment",
    "outputs": [],
    "stateMutability": "nonpayable",
    "type": "function"
  },
  {
    "inputs": [],
    "name": "decrement",
    "outputs": [],
    "stateMutability": "nonpayable",
    "type": "function"
  }
]"#;

/// Build the Counter binding for a deployment address
pub fn counter_binding(address: Address) -> ContractBinding {
    ContractBinding::new(
        address,
        vec![
            FunctionSpec::new(NUMBER_FN, vec![], vec![AbiType::Uint256], Mutability::Read),
            FunctionSpec::new(
                "setNumber",
                vec![Param::new("newNumber", AbiType::Uint256)],
                vec![],
                Mutability::Write,
            ),
            FunctionSpec::new("increment", vec![], vec![], Mutability::Write),
            FunctionSpec::new("decrement", vec![], vec![], Mutability::Write),
        ],
    )
}

/// A state-changing Counter call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterCall {
    /// `increment()`
    Increment,
    /// `decrement()`
    Decrement,
    /// `setNumber(uint256 newNumber)`
    SetNumber(U256),
}

impl CounterCall {
    /// ABI function name
    pub const fn function_name(&self) -> &'static str {
        match self {
            Self::Increment => "increment",
            Self::Decrement => "decrement",
            Self::SetNumber(_) => "setNumber",
        }
    }

    /// Call arguments in declaration order
    pub fn args(&self) -> Vec<AbiValue> {
        match self {
            Self::Increment | Self::Decrement => vec![],
            Self::SetNumber(value) => vec![AbiValue::Uint(*value)],
        }
    }

    /// Encode calldata against `binding`
    pub fn encode(&self, binding: &ContractBinding) -> Result<Bytes, AbiError> {
        binding.encode_call(self.function_name(), &self.args())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_abi_matches_binding() {
        let parsed = ContractBinding::from_abi_json(COUNTER_ADDRESS, COUNTER_ABI).unwrap();
        assert_eq!(parsed, counter_binding(COUNTER_ADDRESS));
    }

    #[test]
    fn test_counter_selectors() {
        let binding = counter_binding(COUNTER_ADDRESS);
        let selector = |name: &str| hex::encode(binding.function(name).unwrap().selector());
        assert_eq!(selector("number"), "8381f58a");
        assert_eq!(selector("increment"), "d09de08a");
        assert_eq!(selector("decrement"), "2baeceb7");
        assert_eq!(selector("setNumber"), "3fb5c1cb");
    }

    #[test]
    fn test_counter_call_encoding() {
        let binding = counter_binding(COUNTER_ADDRESS);
        assert_eq!(CounterCall::Increment.encode(&binding).unwrap().len(), 4);

        let data = CounterCall::SetNumber(U256::from(7u64)).encode(&binding).unwrap();
        assert_eq!(data.len(), 36);
        assert_eq!(data[35], 7);
    }

    #[test]
    fn test_counter_address_constant() {
        assert_eq!(
            COUNTER_ADDRESS.to_string().to_lowercase(),
            "0xf28043a5926a1bf7f90df838d515c3dbb57da7d3"
        );
    }
}
