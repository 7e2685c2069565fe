//! EIP-712 typed structured data.
//!
//! The signing digest is `keccak(0x19 ‖ 0x01 ‖ domain_separator ‖ hash_struct(primary, message))`.
//! Messages are plain JSON values so any schema can be signed without generated bindings.

use std::collections::BTreeMap;

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::trace;

use crate::{
    constants::messages::{EIP712_DOMAIN_TYPE, EIP712_PREFIX},
    digest, PrivateKey, Result, Signature,
};

mod encoder;
pub use encoder::{encode_type, hash_struct, type_hash};

/// A single member of a struct type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypedField {
    /// Member name
    pub name: String,
    /// Solidity type, e.g. `address`, `uint256[]` or the name of another struct
    #[serde(rename = "type")]
    pub ty: String,
}

/// Struct types by name.
pub type Types = BTreeMap<String, Vec<TypedField>>;

/// The EIP-712 domain. Absent fields are left out of both the domain type and its hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip712Domain {
    /// dApp or protocol name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Signing domain version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Chain id, as a JSON number, decimal string or hex string
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_chain_id"
    )]
    pub chain_id: Option<U256>,
    /// Contract that verifies the signature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifying_contract: Option<Address>,
    /// Disambiguating salt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<B256>,
}

fn deserialize_chain_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> core::result::Result<Option<U256>, D::Error> {
    let Some(value) = Option::<Value>::deserialize(deserializer)? else { return Ok(None) };
    match encoder::parse_integer(&value) {
        Some((false, chain_id)) => Ok(Some(chain_id)),
        _ => Err(serde::de::Error::custom(format!("invalid chain id {value}"))),
    }
}

impl Eip712Domain {
    /// The `EIP712Domain` members implied by the fields that are set, in canonical order.
    pub fn fields(&self) -> Vec<TypedField> {
        let field = |name: &str, ty: &str| TypedField { name: name.into(), ty: ty.into() };
        let mut fields = Vec::with_capacity(5);
        if self.name.is_some() {
            fields.push(field("name", "string"));
        }
        if self.version.is_some() {
            fields.push(field("version", "string"));
        }
        if self.chain_id.is_some() {
            fields.push(field("chainId", "uint256"));
        }
        if self.verifying_contract.is_some() {
            fields.push(field("verifyingContract", "address"));
        }
        if self.salt.is_some() {
            fields.push(field("salt", "bytes32"));
        }
        fields
    }

    fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(name) = &self.name {
            map.insert("name".into(), name.clone().into());
        }
        if let Some(version) = &self.version {
            map.insert("version".into(), version.clone().into());
        }
        if let Some(chain_id) = self.chain_id {
            map.insert("chainId".into(), chain_id.to_string().into());
        }
        if let Some(contract) = self.verifying_contract {
            map.insert("verifyingContract".into(), format!("{contract:#x}").into());
        }
        if let Some(salt) = self.salt {
            map.insert("salt".into(), salt.to_string().into());
        }
        Value::Object(map)
    }

    /// Hash of the domain using the members implied by the fields that are set.
    pub fn separator(&self) -> Result<B256> {
        let types = Types::from([(EIP712_DOMAIN_TYPE.to_string(), self.fields())]);
        self.separator_with(&types)
    }

    fn separator_with(&self, types: &Types) -> Result<B256> {
        encoder::hash_struct_at(EIP712_DOMAIN_TYPE, &self.to_value(), types, "domain")
    }
}

/// A complete typed data payload as passed to `eth_signTypedData_v4`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedData {
    /// Struct declarations. `EIP712Domain` may be declared explicitly.
    pub types: Types,
    /// Name of the message type
    pub primary_type: String,
    /// Signing domain
    pub domain: Eip712Domain,
    /// Message, as a JSON object matching `primary_type`
    pub message: Value,
}

impl TypedData {
    /// Parses a typed data payload from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The domain separator. An explicit `EIP712Domain` declaration takes precedence over the
    /// members implied by the domain fields.
    pub fn domain_separator(&self) -> Result<B256> {
        if self.types.contains_key(EIP712_DOMAIN_TYPE) {
            self.domain.separator_with(&self.types)
        } else {
            self.domain.separator()
        }
    }

    /// `hash_struct(primary_type, message)`.
    pub fn message_hash(&self) -> Result<B256> {
        encode_type(&self.primary_type, &self.types)?;
        encoder::hash_struct_at(&self.primary_type, &self.message, &self.types, "message")
    }

    /// The digest that is signed.
    pub fn signing_digest(&self) -> Result<B256> {
        let domain_separator = self.domain_separator()?;
        let message_hash = self.message_hash()?;

        let mut buf = [0u8; 66];
        buf[..2].copy_from_slice(&EIP712_PREFIX);
        buf[2..34].copy_from_slice(domain_separator.as_slice());
        buf[34..].copy_from_slice(message_hash.as_slice());
        let hash = digest(buf);

        trace!(
            primary_type = %self.primary_type,
            %domain_separator,
            %message_hash,
            %hash,
            "Computed typed data digest"
        );
        Ok(hash)
    }
}

/// Computes the EIP-712 signing digest of `typed_data`.
pub fn signing_digest(typed_data: &TypedData) -> Result<B256> {
    typed_data.signing_digest()
}

/// Signs `typed_data`. [`Signature::as_bytes`] yields the 27/28 `v` form that Solidity
/// `ecrecover` verifiers expect.
pub fn sign_typed_data(typed_data: &TypedData, key: &PrivateKey) -> Result<Signature> {
    key.sign_digest(&typed_data.signing_digest()?)
}

/// Recovers the signer of `typed_data`.
pub fn recover_typed_data_signer(typed_data: &TypedData, signature: &Signature) -> Result<Address> {
    signature.recover_address_from_prehash(&typed_data.signing_digest()?)
}
