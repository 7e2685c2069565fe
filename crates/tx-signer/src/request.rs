use alloy_primitives::{Address, Bytes, ChainId, B256, U256};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    AccessList, PrivateKey, Result, SignedAuthorization, SignedTransaction, SignerError,
    Transaction, TxAccessList, TxBlob, TxDynamicFee, TxLegacy, TxSetCode, TxType,
};

/// JSON description of a transaction of any type, as accepted by `eth_sendTransaction` and
/// state-transition fixtures.
///
/// When `type` is absent it is inferred from the fields that are present: an authorization list
/// makes a set code transaction, blob fields a blob transaction, dynamic fee caps an EIP-1559
/// transaction and an access list an EIP-2930 transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    /// Transaction type (0=Legacy, 1=EIP-2930, 2=EIP-1559, 3=EIP-4844, 4=EIP-7702)
    #[serde(
        rename = "type",
        default,
        skip_serializing_if = "Option::is_none",
        with = "alloy_serde::quantity::opt"
    )]
    pub tx_type: Option<u8>,
    /// Chain id. Required for typed transactions, optional for legacy ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<U256>,
    /// Sender nonce
    #[serde(default, with = "alloy_serde::quantity")]
    pub nonce: u64,
    /// Gas price (legacy/EIP-2930)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    /// Maximum fee per gas (EIP-1559 and later)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<U256>,
    /// Maximum priority fee per gas (EIP-1559 and later)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<U256>,
    /// Gas limit
    #[serde(default, skip_serializing_if = "Option::is_none", with = "alloy_serde::quantity::opt")]
    pub gas: Option<u64>,
    /// Recipient address (None for contract creation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    /// Ether value to transfer
    #[serde(default)]
    pub value: U256,
    /// Transaction data/input
    #[serde(default, alias = "data")]
    pub input: Bytes,
    /// Access list (EIP-2930 and later)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_list: Option<AccessList>,
    /// Maximum fee per blob gas (EIP-4844)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_blob_gas: Option<U256>,
    /// Blob versioned hashes (EIP-4844)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_versioned_hashes: Option<Vec<B256>>,
    /// Authorization list (EIP-7702)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_list: Option<Vec<SignedAuthorization>>,
    /// Secret key to sign with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<B256>,
}

impl TransactionRequest {
    /// Parses a request from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The explicit type, or the one implied by the fields that are present.
    pub fn resolved_type(&self) -> Result<TxType> {
        if let Some(ty) = self.tx_type {
            return TxType::try_from(ty);
        }
        Ok(if self.authorization_list.is_some() {
            TxType::SetCode
        } else if self.blob_versioned_hashes.is_some() || self.max_fee_per_blob_gas.is_some() {
            TxType::Blob
        } else if self.max_fee_per_gas.is_some() || self.max_priority_fee_per_gas.is_some() {
            TxType::DynamicFee
        } else if self.access_list.is_some() {
            TxType::AccessList
        } else {
            TxType::Legacy
        })
    }

    /// Builds the unsigned transaction, failing with the name of the first missing or invalid
    /// field.
    pub fn into_transaction(self) -> Result<Transaction> {
        let ty = self.resolved_type()?;
        self.check_fee_fields(ty)?;

        let gas_limit = self.gas.ok_or(SignerError::MissingField("gas"))?;
        let tx: Transaction = match ty {
            TxType::Legacy => TxLegacy {
                chain_id: self.chain_id.map(to_chain_id).transpose()?,
                nonce: self.nonce,
                gas_price: required_u128(self.gas_price, "gasPrice")?,
                gas_limit,
                to: self.to,
                value: self.value,
                input: self.input,
            }
            .into(),
            TxType::AccessList => TxAccessList {
                chain_id: required_chain_id(self.chain_id)?,
                nonce: self.nonce,
                gas_price: required_u128(self.gas_price, "gasPrice")?,
                gas_limit,
                to: self.to,
                value: self.value,
                input: self.input,
                access_list: self.access_list.unwrap_or_default(),
            }
            .into(),
            TxType::DynamicFee => TxDynamicFee {
                chain_id: required_chain_id(self.chain_id)?,
                nonce: self.nonce,
                max_priority_fee_per_gas: required_u128(
                    self.max_priority_fee_per_gas,
                    "maxPriorityFeePerGas",
                )?,
                max_fee_per_gas: required_u128(self.max_fee_per_gas, "maxFeePerGas")?,
                gas_limit,
                to: self.to,
                value: self.value,
                input: self.input,
                access_list: self.access_list.unwrap_or_default(),
            }
            .into(),
            TxType::Blob => TxBlob {
                chain_id: required_chain_id(self.chain_id)?,
                nonce: self.nonce,
                max_priority_fee_per_gas: required_u128(
                    self.max_priority_fee_per_gas,
                    "maxPriorityFeePerGas",
                )?,
                max_fee_per_gas: required_u128(self.max_fee_per_gas, "maxFeePerGas")?,
                gas_limit,
                to: self.to.ok_or(SignerError::MissingField("to"))?,
                value: self.value,
                input: self.input,
                access_list: self.access_list.unwrap_or_default(),
                max_fee_per_blob_gas: required_u128(self.max_fee_per_blob_gas, "maxFeePerBlobGas")?,
                blob_versioned_hashes: self
                    .blob_versioned_hashes
                    .ok_or(SignerError::MissingField("blobVersionedHashes"))?,
            }
            .into(),
            TxType::SetCode => TxSetCode {
                chain_id: required_chain_id(self.chain_id)?,
                nonce: self.nonce,
                max_priority_fee_per_gas: required_u128(
                    self.max_priority_fee_per_gas,
                    "maxPriorityFeePerGas",
                )?,
                max_fee_per_gas: required_u128(self.max_fee_per_gas, "maxFeePerGas")?,
                gas_limit,
                to: self.to.ok_or(SignerError::MissingField("to"))?,
                value: self.value,
                input: self.input,
                access_list: self.access_list.unwrap_or_default(),
                authorization_list: self
                    .authorization_list
                    .ok_or(SignerError::MissingField("authorizationList"))?,
            }
            .into(),
        };

        tx.validate()?;
        trace!(
            tx_type = %ty,
            chain_id = ?tx.chain_id(),
            nonce = tx.nonce(),
            "Built transaction from request"
        );
        Ok(tx)
    }

    /// Builds the transaction and signs it with `secretKey`.
    pub fn sign(mut self) -> Result<SignedTransaction> {
        let secret_key = self.secret_key.take().ok_or(SignerError::MissingField("secretKey"))?;
        let key = PrivateKey::from_slice(secret_key.as_slice())?;
        self.into_transaction()?.sign(&key)
    }

    /// Rejects fee fields that belong to the other fee market.
    fn check_fee_fields(&self, ty: TxType) -> Result<()> {
        let dynamic = matches!(ty, TxType::DynamicFee | TxType::Blob | TxType::SetCode);
        let unexpected = if dynamic {
            self.gas_price.is_some().then_some("gasPrice")
        } else if self.max_fee_per_gas.is_some() {
            Some("maxFeePerGas")
        } else {
            self.max_priority_fee_per_gas.is_some().then_some("maxPriorityFeePerGas")
        };
        match unexpected {
            Some(field) => {
                Err(SignerError::invalid_field(field, format!("not used by {ty} transactions")))
            }
            None => Ok(()),
        }
    }
}

impl TryFrom<TransactionRequest> for Transaction {
    type Error = SignerError;

    fn try_from(request: TransactionRequest) -> Result<Self> {
        request.into_transaction()
    }
}

fn to_chain_id(chain_id: U256) -> Result<ChainId> {
    ChainId::try_from(chain_id)
        .map_err(|_| SignerError::invalid_field("chainId", "exceeds 64 bits"))
}

fn required_chain_id(chain_id: Option<U256>) -> Result<ChainId> {
    to_chain_id(chain_id.ok_or(SignerError::MissingField("chainId"))?)
}

fn required_u128(value: Option<U256>, field: &'static str) -> Result<u128> {
    let value = value.ok_or(SignerError::MissingField(field))?;
    u128::try_from(value).map_err(|_| SignerError::invalid_field(field, "exceeds 128 bits"))
}
