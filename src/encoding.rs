//! Burn intent typed-data encoding
//!
//! Builds the EIP-712 structured message signed by the custodial wallet and
//! submitted to the attestation authority. The type strings, field order and
//! domain (`GatewayWallet`, version `1`) are a wire contract with the
//! authority and must not change.

use crate::error::{GatewayError, GatewayResult};

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{eip712_domain, SolStruct};
use serde::{Serialize, Serializer};
use std::str::FromStr;

pub const DOMAIN_NAME: &str = "GatewayWallet";
pub const DOMAIN_VERSION: &str = "1";
pub const PRIMARY_TYPE: &str = "BurnIntent";

/// Burn intent spec version understood by the authority
pub const TRANSFER_SPEC_VERSION: u32 = 1;

mod typed {
    alloy_sol_types::sol! {
        struct TransferSpec {
            uint32 version;
            uint32 sourceDomain;
            uint32 destinationDomain;
            bytes32 sourceContract;
            bytes32 destinationContract;
            bytes32 sourceToken;
            bytes32 destinationToken;
            bytes32 sourceDepositor;
            bytes32 destinationRecipient;
            bytes32 sourceSigner;
            bytes32 destinationCaller;
            uint256 value;
            bytes32 salt;
            bytes hookData;
        }

        struct BurnIntent {
            uint256 maxBlockHeight;
            uint256 maxFee;
            TransferSpec spec;
        }
    }
}

/// One field of an EIP-712 type definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeField {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub ty: &'static str,
}

const fn field(name: &'static str, ty: &'static str) -> TypeField {
    TypeField { name, ty }
}

pub const EIP712_DOMAIN_FIELDS: &[TypeField] =
    &[field("name", "string"), field("version", "string")];

pub const TRANSFER_SPEC_FIELDS: &[TypeField] = &[
    field("version", "uint32"),
    field("sourceDomain", "uint32"),
    field("destinationDomain", "uint32"),
    field("sourceContract", "bytes32"),
    field("destinationContract", "bytes32"),
    field("sourceToken", "bytes32"),
    field("destinationToken", "bytes32"),
    field("sourceDepositor", "bytes32"),
    field("destinationRecipient", "bytes32"),
    field("sourceSigner", "bytes32"),
    field("destinationCaller", "bytes32"),
    field("value", "uint256"),
    field("salt", "bytes32"),
    field("hookData", "bytes"),
];

pub const BURN_INTENT_FIELDS: &[TypeField] = &[
    field("maxBlockHeight", "uint256"),
    field("maxFee", "uint256"),
    field("spec", "TransferSpec"),
];

/// Transfer parameters of a burn intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnIntentSpec {
    pub version: u32,
    pub source_domain: u32,
    pub destination_domain: u32,
    pub source_contract: Address,
    pub destination_contract: Address,
    pub source_token: Address,
    pub destination_token: Address,
    pub source_depositor: Address,
    pub destination_recipient: Address,
    pub source_signer: Address,
    pub destination_caller: Address,
    pub value: U256,
    pub salt: B256,
    pub hook_data: Bytes,
}

impl BurnIntentSpec {
    pub fn validate(&self) -> GatewayResult<()> {
        if self.value.is_zero() {
            return Err(GatewayError::Validation(
                "Burn intent value must be greater than 0".to_string(),
            ));
        }
        if self.source_domain == self.destination_domain {
            return Err(GatewayError::Validation(
                "Source and destination domains must be different".to_string(),
            ));
        }
        Ok(())
    }
}

/// A burn intent: spec plus protocol caps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnIntent {
    pub max_block_height: U256,
    /// Protocol-level cap, not the fee actually charged
    pub max_fee: U256,
    pub spec: BurnIntentSpec,
}

/// Wire form of the transfer spec, addresses canonicalized to bytes32
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSpecMessage {
    pub version: u32,
    pub source_domain: u32,
    pub destination_domain: u32,
    pub source_contract: B256,
    pub destination_contract: B256,
    pub source_token: B256,
    pub destination_token: B256,
    pub source_depositor: B256,
    pub destination_recipient: B256,
    pub source_signer: B256,
    pub destination_caller: B256,
    #[serde(serialize_with = "serialize_decimal")]
    pub value: U256,
    pub salt: B256,
    pub hook_data: Bytes,
}

/// Wire form of the burn intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnIntentMessage {
    #[serde(serialize_with = "serialize_decimal")]
    pub max_block_height: U256,
    #[serde(serialize_with = "serialize_decimal")]
    pub max_fee: U256,
    pub spec: TransferSpecMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypedDataTypes {
    #[serde(rename = "EIP712Domain")]
    pub eip712_domain: &'static [TypeField],
    #[serde(rename = "TransferSpec")]
    pub transfer_spec: &'static [TypeField],
    #[serde(rename = "BurnIntent")]
    pub burn_intent: &'static [TypeField],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypedDataDomain {
    pub name: &'static str,
    pub version: &'static str,
}

/// Structured signing payload for a burn intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedData {
    pub types: TypedDataTypes,
    pub domain: TypedDataDomain,
    pub primary_type: &'static str,
    pub message: BurnIntentMessage,
}

impl TypedData {
    /// Serialized JSON handed to the signing service
    pub fn to_json(&self) -> GatewayResult<String> {
        serde_json::to_string(self)
            .map_err(|e| GatewayError::Internal(format!("Failed to serialize typed data: {}", e)))
    }
}

/// Left-pad an address into a 32-byte word
pub fn address_to_bytes32(address: Address) -> B256 {
    address.into_word()
}

/// Canonicalize a hex address (20-byte or already padded 32-byte) into its
/// lower-case, left-padded 32-byte form.
pub fn canonicalize_address(address: &str) -> GatewayResult<String> {
    let digits = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .unwrap_or(address)
        .to_ascii_lowercase();

    let bytes = hex::decode(&digits)
        .map_err(|e| GatewayError::Validation(format!("Invalid address {}: {}", address, e)))?;
    if bytes.len() > 32 {
        return Err(GatewayError::Validation(format!(
            "Address {} is longer than 32 bytes",
            address
        )));
    }

    let mut word = [0u8; 32];
    word[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(format!("0x{}", hex::encode(word)))
}

/// Parse a user-supplied EVM address given either in its 20-byte form or as
/// a left-padded 32-byte word.
pub fn parse_address(address: &str) -> GatewayResult<Address> {
    let digits = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .unwrap_or(address);
    if digits.len() != 40 && digits.len() != 64 {
        return Err(GatewayError::Validation(format!(
            "Invalid address {}: expected 20 or 32 bytes of hex",
            address
        )));
    }

    let word = B256::from_str(&canonicalize_address(address)?)
        .map_err(|e| GatewayError::Validation(format!("Invalid address {}: {}", address, e)))?;
    if word[..12].iter().any(|b| *b != 0) {
        return Err(GatewayError::Validation(format!(
            "Address {} does not fit in 20 bytes",
            address
        )));
    }
    Ok(Address::from_word(word))
}

/// Build the structured message for a burn intent
pub fn encode_burn_intent(intent: &BurnIntent) -> TypedData {
    let spec = &intent.spec;
    TypedData {
        types: TypedDataTypes {
            eip712_domain: EIP712_DOMAIN_FIELDS,
            transfer_spec: TRANSFER_SPEC_FIELDS,
            burn_intent: BURN_INTENT_FIELDS,
        },
        domain: TypedDataDomain {
            name: DOMAIN_NAME,
            version: DOMAIN_VERSION,
        },
        primary_type: PRIMARY_TYPE,
        message: BurnIntentMessage {
            max_block_height: intent.max_block_height,
            max_fee: intent.max_fee,
            spec: TransferSpecMessage {
                version: spec.version,
                source_domain: spec.source_domain,
                destination_domain: spec.destination_domain,
                source_contract: address_to_bytes32(spec.source_contract),
                destination_contract: address_to_bytes32(spec.destination_contract),
                source_token: address_to_bytes32(spec.source_token),
                destination_token: address_to_bytes32(spec.destination_token),
                source_depositor: address_to_bytes32(spec.source_depositor),
                destination_recipient: address_to_bytes32(spec.destination_recipient),
                source_signer: address_to_bytes32(spec.source_signer),
                destination_caller: address_to_bytes32(spec.destination_caller),
                value: spec.value,
                salt: spec.salt,
                hook_data: spec.hook_data.clone(),
            },
        },
    }
}

/// EIP-712 digest the custodial wallet signs for this message
pub fn signing_hash(message: &BurnIntentMessage) -> B256 {
    let spec = &message.spec;
    let typed = typed::BurnIntent {
        maxBlockHeight: message.max_block_height,
        maxFee: message.max_fee,
        spec: typed::TransferSpec {
            version: spec.version,
            sourceDomain: spec.source_domain,
            destinationDomain: spec.destination_domain,
            sourceContract: spec.source_contract,
            destinationContract: spec.destination_contract,
            sourceToken: spec.source_token,
            destinationToken: spec.destination_token,
            sourceDepositor: spec.source_depositor,
            destinationRecipient: spec.destination_recipient,
            sourceSigner: spec.source_signer,
            destinationCaller: spec.destination_caller,
            value: spec.value,
            salt: spec.salt,
            hookData: spec.hook_data.clone(),
        },
    };
    let domain = eip712_domain! {
        name: DOMAIN_NAME,
        version: DOMAIN_VERSION,
    };
    typed.eip712_signing_hash(&domain)
}

fn serialize_decimal<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use alloy_primitives::{address, b256};

    pub(crate) fn sample_intent() -> BurnIntent {
        let depositor = address!("AbCdEf0123456789aBcDeF0123456789AbCdEf01");
        BurnIntent {
            max_block_height: U256::MAX,
            max_fee: U256::from(1_010_000u64),
            spec: BurnIntentSpec {
                version: TRANSFER_SPEC_VERSION,
                source_domain: 26,
                destination_domain: 6,
                source_contract: crate::chain::GATEWAY_WALLET_ADDRESS,
                destination_contract: crate::chain::GATEWAY_MINTER_ADDRESS,
                source_token: address!("3600000000000000000000000000000000000000"),
                destination_token: address!("036CbD53842c5426634e7929541eC2318f3dCF7e"),
                source_depositor: depositor,
                destination_recipient: depositor,
                source_signer: depositor,
                destination_caller: Address::ZERO,
                value: U256::from(5_000_000u64),
                salt: b256!("1111111111111111111111111111111111111111111111111111111111111111"),
                hook_data: Bytes::new(),
            },
        }
    }

    pub(crate) fn sample_message() -> BurnIntentMessage {
        encode_burn_intent(&sample_intent()).message
    }

    fn type_string(name: &str, fields: &[TypeField]) -> String {
        let body: Vec<String> = fields
            .iter()
            .map(|f| format!("{} {}", f.ty, f.name))
            .collect();
        format!("{}({})", name, body.join(","))
    }

    #[test]
    fn test_parse_address_accepts_padded_word() {
        let expected = address!("036CbD53842c5426634e7929541eC2318f3dCF7e");
        assert_eq!(
            parse_address("0x036cbd53842c5426634e7929541ec2318f3dcf7e").unwrap(),
            expected
        );
        assert_eq!(
            parse_address("0x000000000000000000000000036cbd53842c5426634e7929541ec2318f3dcf7e")
                .unwrap(),
            expected
        );

        assert!(parse_address("0x1234").unwrap_err().is_validation());
        assert!(parse_address(&format!("0x{}", "ff".repeat(32))).is_err());
        assert!(parse_address(&format!("0x{}", "zz".repeat(20))).is_err());
    }

    #[test]
    fn test_canonicalize_is_idempotent_and_case_insensitive() {
        let mixed = "0x036CbD53842c5426634e7929541eC2318f3dCF7e";
        let once = canonicalize_address(mixed).unwrap();
        assert_eq!(
            once,
            "0x000000000000000000000000036cbd53842c5426634e7929541ec2318f3dcf7e"
        );
        assert_eq!(canonicalize_address(&once).unwrap(), once);
        assert_eq!(
            canonicalize_address(&mixed.to_lowercase()).unwrap(),
            once
        );
        assert_eq!(
            canonicalize_address(&mixed.to_uppercase().replace("0X", "0x")).unwrap(),
            once
        );
    }

    #[test]
    fn test_canonicalize_rejects_garbage() {
        assert!(canonicalize_address("0xzz").is_err());
        assert!(canonicalize_address(&format!("0x{}", "ab".repeat(33))).is_err());
    }

    #[test]
    fn test_bytes32_matches_string_canonicalization() {
        let addr = address!("036CbD53842c5426634e7929541eC2318f3dCF7e");
        let word = address_to_bytes32(addr);
        assert_eq!(
            format!("{:?}", word),
            canonicalize_address(&addr.to_string()).unwrap()
        );
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let intent = sample_intent();
        let a = serde_json::to_vec(&encode_burn_intent(&intent)).unwrap();
        let b = serde_json::to_vec(&encode_burn_intent(&intent)).unwrap();
        assert_eq!(a, b);

        let typed = encode_burn_intent(&intent);
        assert_eq!(signing_hash(&typed.message), signing_hash(&typed.message));
    }

    #[test]
    fn test_only_changed_fields_differ() {
        let base = sample_intent();
        let mut other = base.clone();
        other.spec.salt =
            b256!("2222222222222222222222222222222222222222222222222222222222222222");
        other.spec.value = U256::from(7_000_000u64);

        let mut a = serde_json::to_value(encode_burn_intent(&base)).unwrap();
        let mut b = serde_json::to_value(encode_burn_intent(&other)).unwrap();

        for field in ["salt", "value"] {
            let fa = a["message"]["spec"].as_object_mut().unwrap().remove(field);
            let fb = b["message"]["spec"].as_object_mut().unwrap().remove(field);
            assert_ne!(fa, fb, "{} should differ", field);
        }
        assert_eq!(a, b);

        assert_ne!(
            signing_hash(&encode_burn_intent(&base).message),
            signing_hash(&encode_burn_intent(&other).message)
        );
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(encode_burn_intent(&sample_intent())).unwrap();

        assert_eq!(json["primaryType"], "BurnIntent");
        assert_eq!(json["domain"]["name"], "GatewayWallet");
        assert_eq!(json["domain"]["version"], "1");
        assert_eq!(json["types"]["TransferSpec"][11]["name"], "value");
        assert_eq!(json["types"]["TransferSpec"][11]["type"], "uint256");

        let message = &json["message"];
        // Wide integers cross the boundary as decimal strings without truncation
        assert_eq!(message["maxBlockHeight"], U256::MAX.to_string());
        assert_eq!(message["maxFee"], "1010000");
        assert_eq!(message["spec"]["value"], "5000000");
        assert_eq!(message["spec"]["sourceDomain"], 26);
        assert_eq!(message["spec"]["hookData"], "0x");
        assert_eq!(
            message["spec"]["sourceDepositor"],
            "0x000000000000000000000000abcdef0123456789abcdef0123456789abcdef01"
        );
        assert_eq!(
            message["spec"]["destinationCaller"],
            format!("0x{}", "0".repeat(64))
        );
    }

    #[test]
    fn test_type_tables_match_hashing_schema() {
        let expected = format!(
            "{}{}",
            type_string("BurnIntent", BURN_INTENT_FIELDS),
            type_string("TransferSpec", TRANSFER_SPEC_FIELDS)
        );
        assert_eq!(typed::BurnIntent::eip712_encode_type().as_ref(), expected.as_str());
    }

    #[test]
    fn test_spec_validation() {
        let mut intent = sample_intent();
        assert!(intent.spec.validate().is_ok());

        intent.spec.destination_domain = intent.spec.source_domain;
        assert!(intent.spec.validate().is_err());

        let mut intent = sample_intent();
        intent.spec.value = U256::ZERO;
        assert!(intent.spec.validate().is_err());
    }
}
