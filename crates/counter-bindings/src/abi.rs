//! Minimal ABI model: function schemas, selectors and word encoding.
//!
//! Only the types the Counter and ERC-20 surfaces need are supported
//! (`uint256` and `address`), every argument is a static 32-byte word.

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tiny_keccak::{Hasher, Keccak};

/// Size of a single ABI word in bytes
pub const WORD_SIZE: usize = 32;

/// Compute keccak256 hash
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// Errors raised while building or decoding contract calls
#[derive(Debug, Error)]
pub enum AbiError {
    /// The binding has no function with this name
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    /// A parameter type outside the supported subset
    #[error("unsupported ABI type `{0}`")]
    UnsupportedType(String),
    /// A `stateMutability` value we do not recognise
    #[error("unsupported state mutability `{0}`")]
    UnsupportedMutability(String),
    /// Wrong number of arguments for the function
    #[error("`{function}` expects {expected} argument(s), got {got}")]
    ArgumentCount {
        /// Function name
        function: String,
        /// Declared input count
        expected: usize,
        /// Supplied argument count
        got: usize,
    },
    /// An argument does not match the declared input type
    #[error("`{function}` argument {index} must be {expected}")]
    ArgumentKind {
        /// Function name
        function: String,
        /// Zero-based argument position
        index: usize,
        /// Declared type
        expected: &'static str,
    },
    /// Return data shorter than one word
    #[error("return data too short: {0} bytes")]
    ShortReturnData(usize),
    /// Malformed JSON ABI document
    #[error("invalid ABI json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Supported ABI value types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbiType {
    /// `uint256`
    #[serde(rename = "uint256")]
    Uint256,
    /// `address`
    #[serde(rename = "address")]
    Address,
}

impl AbiType {
    /// Canonical type name used in signatures
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Uint256 => "uint256",
            Self::Address => "address",
        }
    }

    /// Parse a canonical type name
    pub fn parse(s: &str) -> Result<Self, AbiError> {
        match s {
            "uint256" | "uint" => Ok(Self::Uint256),
            "address" => Ok(Self::Address),
            other => Err(AbiError::UnsupportedType(other.to_string())),
        }
    }
}

/// Whether a function only reads state or submits a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mutability {
    /// `view` / `pure`
    Read,
    /// `nonpayable` / `payable`
    Write,
}

impl Mutability {
    /// Map a JSON ABI `stateMutability` value
    pub fn from_state_mutability(s: &str) -> Result<Self, AbiError> {
        match s {
            "view" | "pure" => Ok(Self::Read),
            "nonpayable" | "payable" => Ok(Self::Write),
            other => Err(AbiError::UnsupportedMutability(other.to_string())),
        }
    }
}

/// Named function input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    /// Parameter name (may be empty)
    pub name: String,
    /// Parameter type
    pub kind: AbiType,
}

impl Param {
    /// Create a new parameter
    pub fn new(name: impl Into<String>, kind: AbiType) -> Self {
        Self { name: name.into(), kind }
    }
}

/// A concrete argument value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbiValue {
    /// Unsigned 256-bit integer
    Uint(U256),
    /// 20-byte address
    Address(Address),
}

impl AbiValue {
    /// Type of this value
    pub const fn kind(&self) -> AbiType {
        match self {
            Self::Uint(_) => AbiType::Uint256,
            Self::Address(_) => AbiType::Address,
        }
    }

    /// Left-padded 32-byte encoding
    pub fn to_word(&self) -> [u8; WORD_SIZE] {
        match self {
            Self::Uint(value) => value.to_be_bytes::<WORD_SIZE>(),
            Self::Address(address) => {
                let mut word = [0u8; WORD_SIZE];
                word[12..].copy_from_slice(address.as_slice());
                word
            }
        }
    }
}

impl From<U256> for AbiValue {
    fn from(value: U256) -> Self {
        Self::Uint(value)
    }
}

impl From<Address> for AbiValue {
    fn from(value: Address) -> Self {
        Self::Address(value)
    }
}

/// Schema of one callable contract function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSpec {
    /// Function name
    pub name: String,
    /// Ordered inputs
    pub inputs: Vec<Param>,
    /// Ordered output types
    pub outputs: Vec<AbiType>,
    /// Read or write
    pub mutability: Mutability,
}

impl FunctionSpec {
    /// Create a new function schema
    pub fn new(
        name: impl Into<String>,
        inputs: Vec<Param>,
        outputs: Vec<AbiType>,
        mutability: Mutability,
    ) -> Self {
        Self { name: name.into(), inputs, outputs, mutability }
    }

    /// Canonical signature, e.g. `setNumber(uint256)`
    pub fn signature(&self) -> String {
        let types: Vec<&str> = self.inputs.iter().map(|p| p.kind.as_str()).collect();
        format!("{}({})", self.name, types.join(","))
    }

    /// First four bytes of the keccak256 of the signature
    pub fn selector(&self) -> [u8; 4] {
        let hash = keccak256(self.signature().as_bytes());
        [hash[0], hash[1], hash[2], hash[3]]
    }

    /// Encode calldata: selector followed by one word per argument
    pub fn encode_call(&self, args: &[AbiValue]) -> Result<Bytes, AbiError> {
        if args.len() != self.inputs.len() {
            return Err(AbiError::ArgumentCount {
                function: self.name.clone(),
                expected: self.inputs.len(),
                got: args.len(),
            });
        }

        let mut calldata = Vec::with_capacity(4 + WORD_SIZE * args.len());
        calldata.extend_from_slice(&self.selector());
        for (index, (arg, param)) in args.iter().zip(&self.inputs).enumerate() {
            if arg.kind() != param.kind {
                return Err(AbiError::ArgumentKind {
                    function: self.name.clone(),
                    index,
                    expected: param.kind.as_str(),
                });
            }
            calldata.extend_from_slice(&arg.to_word());
        }

        Ok(Bytes::from(calldata))
    }
}

/// Decode the first return word as `uint256`
pub fn decode_uint256(data: &[u8]) -> Result<U256, AbiError> {
    if data.len() < WORD_SIZE {
        return Err(AbiError::ShortReturnData(data.len()));
    }
    Ok(U256::from_be_slice(&data[..WORD_SIZE]))
}

/// Address plus callable-function schema of a deployed contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractBinding {
    /// Deployed contract address
    pub address: Address,
    /// Functions in declaration order
    pub functions: Vec<FunctionSpec>,
}

#[derive(Deserialize)]
struct RawParam {
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    inputs: Vec<RawParam>,
    #[serde(default)]
    outputs: Vec<RawParam>,
    #[serde(rename = "stateMutability", default)]
    state_mutability: String,
}

impl ContractBinding {
    /// Create a binding from an address and function list
    pub const fn new(address: Address, functions: Vec<FunctionSpec>) -> Self {
        Self { address, functions }
    }

    /// Parse a standard JSON ABI document. Non-function entries are skipped.
    pub fn from_abi_json(address: Address, json: &str) -> Result<Self, AbiError> {
        let entries: Vec<RawEntry> = serde_json::from_str(json)?;

        let mut functions = Vec::new();
        for entry in entries.into_iter().filter(|e| e.kind == "function") {
            let inputs = entry
                .inputs
                .into_iter()
                .map(|p| Ok(Param::new(p.name, AbiType::parse(&p.kind)?)))
                .collect::<Result<Vec<_>, AbiError>>()?;
            let outputs = entry
                .outputs
                .iter()
                .map(|p| AbiType::parse(&p.kind))
                .collect::<Result<Vec<_>, AbiError>>()?;
            let mutability = Mutability::from_state_mutability(&entry.state_mutability)?;
            functions.push(FunctionSpec::new(entry.name, inputs, outputs, mutability));
        }

        Ok(Self { address, functions })
    }

    /// Look up a function by name
    pub fn function(&self, name: &str) -> Result<&FunctionSpec, AbiError> {
        self.functions
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| AbiError::UnknownFunction(name.to_string()))
    }

    /// Encode a call to `name` with `args`
    pub fn encode_call(&self, name: &str, args: &[AbiValue]) -> Result<Bytes, AbiError> {
        self.function(name)?.encode_call(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_number() -> FunctionSpec {
        FunctionSpec::new(
            "setNumber",
            vec![Param::new("newNumber", AbiType::Uint256)],
            vec![],
            Mutability::Write,
        )
    }

    #[test]
    fn test_signature_and_selector() {
        let spec = set_number();
        assert_eq!(spec.signature(), "setNumber(uint256)");
        assert_eq!(hex::encode(spec.selector()), "3fb5c1cb");

        let increment = FunctionSpec::new("increment", vec![], vec![], Mutability::Write);
        assert_eq!(increment.signature(), "increment()");
        assert_eq!(hex::encode(increment.selector()), "d09de08a");
    }

    #[test]
    fn test_encode_call_pads_argument() {
        let data = set_number().encode_call(&[AbiValue::Uint(U256::from(42u64))]).unwrap();
        assert_eq!(data.len(), 36);
        assert_eq!(&data[..4], &[0x3f, 0xb5, 0xc1, 0xcb]);
        assert!(data[4..35].iter().all(|b| *b == 0));
        assert_eq!(data[35], 42);
    }

    #[test]
    fn test_encode_call_address_word() {
        let spec = FunctionSpec::new(
            "balanceOf",
            vec![Param::new("owner", AbiType::Address)],
            vec![AbiType::Uint256],
            Mutability::Read,
        );
        let owner = Address::repeat_byte(0xab);
        let data = spec.encode_call(&[owner.into()]).unwrap();
        assert_eq!(hex::encode(&data[..4]), "70a08231");
        assert!(data[4..16].iter().all(|b| *b == 0));
        assert_eq!(&data[16..], owner.as_slice());
    }

    #[test]
    fn test_encode_call_rejects_bad_arguments() {
        let spec = set_number();
        assert!(matches!(
            spec.encode_call(&[]),
            Err(AbiError::ArgumentCount { expected: 1, got: 0, .. })
        ));
        assert!(matches!(
            spec.encode_call(&[AbiValue::Address(Address::ZERO)]),
            Err(AbiError::ArgumentKind { index: 0, expected: "uint256", .. })
        ));
    }

    #[test]
    fn test_decode_uint256() {
        let mut word = [0u8; 32];
        word[31] = 6;
        assert_eq!(decode_uint256(&word).unwrap(), U256::from(6u64));
        assert!(matches!(decode_uint256(&word[..8]), Err(AbiError::ShortReturnData(8))));
    }

    #[test]
    fn test_from_abi_json_skips_non_functions() {
        let json = r#"[
            {"type": "event", "name": "Changed", "inputs": []},
            {"type": "function", "name": "number", "inputs": [],
             "outputs": [{"name": "", "type": "uint256"}], "stateMutability": "view"}
        ]"#;
        let binding = ContractBinding::from_abi_json(Address::ZERO, json).unwrap();
        assert_eq!(binding.functions.len(), 1);
        let number = binding.function("number").unwrap();
        assert_eq!(number.mutability, Mutability::Read);
        assert_eq!(number.outputs, vec![AbiType::Uint256]);
        assert!(matches!(binding.function("missing"), Err(AbiError::UnknownFunction(_))));
    }

    #[test]
    fn test_from_abi_json_rejects_unsupported_type() {
        let json = r#"[{"type": "function", "name": "f",
            "inputs": [{"name": "x", "type": "bytes"}], "outputs": [],
            "stateMutability": "nonpayable"}]"#;
        assert!(matches!(
            ContractBinding::from_abi_json(Address::ZERO, json),
            Err(AbiError::UnsupportedType(t)) if t == "bytes"
        ));
    }
}
