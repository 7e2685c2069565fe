//! Transaction variants and their canonical encodings.
//!
//! Each variant maps to a fixed, ordered RLP field list. Typed variants are prefixed with their
//! EIP-2718 type byte, legacy transactions are a bare list.

use alloy_primitives::{Address, Bytes, ChainId, B256, U256};
use alloy_rlp::{BufMut, Decodable, Encodable, Header, EMPTY_STRING_CODE};
use tracing::trace;

use crate::{constants::tx_type, digest, RecoveryEncoding, Result, Signature, SignerError};

mod access_list;
pub use access_list::*;

mod legacy;
pub use legacy::*;

mod eip2930;
pub use eip2930::*;

mod eip1559;
pub use eip1559::*;

mod eip4844;
pub use eip4844::*;

mod eip7702;
pub use eip7702::*;

mod signed;
pub use signed::*;

mod decode;
pub use decode::*;

/// Recovery-id convention of each transaction type, indexed by [`TxType`] discriminant.
pub const RECOVERY_POLICY: [RecoveryEncoding; 5] = [
    RecoveryEncoding::Legacy,
    RecoveryEncoding::YParity,
    RecoveryEncoding::YParity,
    RecoveryEncoding::YParity,
    RecoveryEncoding::YParity,
];

/// Transaction type. The discriminant is the EIP-2718 type byte (`0` for legacy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[repr(u8)]
pub enum TxType {
    /// Legacy transaction, optionally replay protected by EIP-155
    #[display("legacy")]
    Legacy = 0,
    /// EIP-2930 access list transaction
    #[display("eip2930")]
    AccessList = tx_type::ACCESS_LIST,
    /// EIP-1559 dynamic fee transaction
    #[display("eip1559")]
    DynamicFee = tx_type::DYNAMIC_FEE,
    /// EIP-4844 blob transaction
    #[display("eip4844")]
    Blob = tx_type::BLOB,
    /// EIP-7702 set code transaction
    #[display("eip7702")]
    SetCode = tx_type::SET_CODE,
}

impl TxType {
    /// How the signature parity of this type is written on the wire.
    pub const fn recovery_encoding(self) -> RecoveryEncoding {
        RECOVERY_POLICY[self as usize]
    }

    /// Whether the encoding starts with a type byte.
    pub const fn is_typed(self) -> bool {
        !matches!(self, Self::Legacy)
    }
}

impl From<TxType> for u8 {
    fn from(ty: TxType) -> Self {
        ty as Self
    }
}

impl TryFrom<u8> for TxType {
    type Error = SignerError;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::Legacy,
            tx_type::ACCESS_LIST => Self::AccessList,
            tx_type::DYNAMIC_FEE => Self::DynamicFee,
            tx_type::BLOB => Self::Blob,
            tx_type::SET_CODE => Self::SetCode,
            _ => return Err(SignerError::UnsupportedTxType(value)),
        })
    }
}

/// An unsigned transaction of any supported type.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::From)]
pub enum Transaction {
    /// Legacy transaction
    Legacy(TxLegacy),
    /// EIP-2930 transaction
    AccessList(TxAccessList),
    /// EIP-1559 transaction
    DynamicFee(TxDynamicFee),
    /// EIP-4844 transaction
    Blob(TxBlob),
    /// EIP-7702 transaction
    SetCode(TxSetCode),
}

impl Transaction {
    /// The type of this transaction.
    pub const fn tx_type(&self) -> TxType {
        match self {
            Self::Legacy(_) => TxType::Legacy,
            Self::AccessList(_) => TxType::AccessList,
            Self::DynamicFee(_) => TxType::DynamicFee,
            Self::Blob(_) => TxType::Blob,
            Self::SetCode(_) => TxType::SetCode,
        }
    }

    /// Chain id, absent only for legacy transactions without replay protection.
    pub const fn chain_id(&self) -> Option<ChainId> {
        match self {
            Self::Legacy(tx) => tx.chain_id,
            Self::AccessList(tx) => Some(tx.chain_id),
            Self::DynamicFee(tx) => Some(tx.chain_id),
            Self::Blob(tx) => Some(tx.chain_id),
            Self::SetCode(tx) => Some(tx.chain_id),
        }
    }

    /// Sender nonce.
    pub const fn nonce(&self) -> u64 {
        match self {
            Self::Legacy(tx) => tx.nonce,
            Self::AccessList(tx) => tx.nonce,
            Self::DynamicFee(tx) => tx.nonce,
            Self::Blob(tx) => tx.nonce,
            Self::SetCode(tx) => tx.nonce,
        }
    }

    /// Gas limit.
    pub const fn gas_limit(&self) -> u64 {
        match self {
            Self::Legacy(tx) => tx.gas_limit,
            Self::AccessList(tx) => tx.gas_limit,
            Self::DynamicFee(tx) => tx.gas_limit,
            Self::Blob(tx) => tx.gas_limit,
            Self::SetCode(tx) => tx.gas_limit,
        }
    }

    /// Recipient, `None` for contract creation.
    pub const fn to(&self) -> Option<Address> {
        match self {
            Self::Legacy(tx) => tx.to,
            Self::AccessList(tx) => tx.to,
            Self::DynamicFee(tx) => tx.to,
            Self::Blob(tx) => Some(tx.to),
            Self::SetCode(tx) => Some(tx.to),
        }
    }

    /// Transferred value.
    pub const fn value(&self) -> U256 {
        match self {
            Self::Legacy(tx) => tx.value,
            Self::AccessList(tx) => tx.value,
            Self::DynamicFee(tx) => tx.value,
            Self::Blob(tx) => tx.value,
            Self::SetCode(tx) => tx.value,
        }
    }

    /// Call data or init code.
    pub const fn input(&self) -> &Bytes {
        match self {
            Self::Legacy(tx) => &tx.input,
            Self::AccessList(tx) => &tx.input,
            Self::DynamicFee(tx) => &tx.input,
            Self::Blob(tx) => &tx.input,
            Self::SetCode(tx) => &tx.input,
        }
    }

    /// Checks the invariants of the variant.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Legacy(tx) => tx.validate(),
            Self::AccessList(_) => Ok(()),
            Self::DynamicFee(tx) => tx.validate(),
            Self::Blob(tx) => tx.validate(),
            Self::SetCode(tx) => tx.validate(),
        }
    }

    /// The bytes whose keccak-256 hash is signed.
    pub fn encode_for_signing(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let mut out = Vec::new();
        match self {
            Self::Legacy(tx) => tx.encode_for_signing(&mut out),
            Self::AccessList(tx) => encode_typed_for_signing(TxType::AccessList, tx, &mut out),
            Self::DynamicFee(tx) => encode_typed_for_signing(TxType::DynamicFee, tx, &mut out),
            Self::Blob(tx) => encode_typed_for_signing(TxType::Blob, tx, &mut out),
            Self::SetCode(tx) => encode_typed_for_signing(TxType::SetCode, tx, &mut out),
        }
        Ok(out)
    }

    /// The digest a sender signs.
    pub fn signature_hash(&self) -> Result<B256> {
        let hash = digest(self.encode_for_signing()?);
        trace!(
            tx_type = %self.tx_type(),
            chain_id = ?self.chain_id(),
            nonce = self.nonce(),
            %hash,
            "Computed signature hash"
        );
        Ok(hash)
    }

    /// The `v` value written for `signature`.
    pub fn signature_v(&self, signature: &Signature) -> Result<u64> {
        self.tx_type().recovery_encoding().encode_v(signature.y_parity(), self.chain_id())
    }

    /// Canonical signed encoding. For blob transactions this is the form without the sidecar
    /// whose hash identifies the transaction.
    pub fn encode_signed(&self, signature: &Signature) -> Result<Vec<u8>> {
        self.validate()?;
        signature.validate()?;
        let v = self.signature_v(signature)?;
        let mut out = Vec::new();
        match self {
            Self::Legacy(tx) => tx.encode_signed(v, signature, &mut out),
            Self::AccessList(tx) => {
                encode_typed_signed(TxType::AccessList, tx, v, signature, &mut out)
            }
            Self::DynamicFee(tx) => {
                encode_typed_signed(TxType::DynamicFee, tx, v, signature, &mut out)
            }
            Self::Blob(tx) => encode_typed_signed(TxType::Blob, tx, v, signature, &mut out),
            Self::SetCode(tx) => encode_typed_signed(TxType::SetCode, tx, v, signature, &mut out),
        }
        Ok(out)
    }
}

/// Encodes the bytes to sign for `tx`.
pub fn encode_for_signing(tx: &Transaction) -> Result<Vec<u8>> {
    tx.encode_for_signing()
}

/// Computes the signing digest of `tx`.
pub fn signature_hash(tx: &Transaction) -> Result<B256> {
    tx.signature_hash()
}

/// Encodes `tx` with `signature` attached.
pub fn encode_signed(tx: &Transaction, signature: &Signature) -> Result<Vec<u8>> {
    tx.encode_signed(signature)
}

/// Field list shared by the typed transaction bodies.
pub(crate) trait RlpFields: Sized {
    /// Payload length of the unsigned field list.
    fn fields_len(&self) -> usize;

    /// Writes the unsigned fields, without a list header.
    fn encode_fields(&self, out: &mut dyn BufMut);

    /// Reads the unsigned fields, without a list header.
    fn decode_fields(buf: &mut &[u8]) -> alloy_rlp::Result<Self>;
}

fn encode_typed_for_signing<T: RlpFields>(ty: TxType, tx: &T, out: &mut Vec<u8>) {
    out.put_u8(ty.into());
    Header { list: true, payload_length: tx.fields_len() }.encode(out);
    tx.encode_fields(out);
}

fn encode_typed_signed<T: RlpFields>(
    ty: TxType,
    tx: &T,
    v: u64,
    signature: &Signature,
    out: &mut Vec<u8>,
) {
    out.put_u8(ty.into());
    encode_signed_list(tx, v, signature, out);
}

/// Length of `[fields.., v, r, s]` including its list header.
pub(crate) fn signed_list_len<T: RlpFields>(tx: &T, v: u64, signature: &Signature) -> usize {
    let payload_length = tx.fields_len() + signature_fields_len(v, signature);
    Header { list: true, payload_length }.length_with_payload()
}

/// Writes `[fields.., v, r, s]`.
pub(crate) fn encode_signed_list<T: RlpFields>(
    tx: &T,
    v: u64,
    signature: &Signature,
    out: &mut dyn BufMut,
) {
    let payload_length = tx.fields_len() + signature_fields_len(v, signature);
    Header { list: true, payload_length }.encode(out);
    tx.encode_fields(out);
    encode_signature_fields(v, signature, out);
}

pub(crate) fn signature_fields_len(v: u64, signature: &Signature) -> usize {
    v.length() + signature.r().length() + signature.s().length()
}

pub(crate) fn encode_signature_fields(v: u64, signature: &Signature, out: &mut dyn BufMut) {
    v.encode(out);
    signature.r().encode(out);
    signature.s().encode(out);
}

/// Encoded length of an optional recipient. Contract creation is the empty string.
pub(crate) fn to_length(to: Option<Address>) -> usize {
    to.map_or(1, |to| to.length())
}

pub(crate) fn encode_to(to: Option<Address>, out: &mut dyn BufMut) {
    match to {
        Some(to) => to.encode(out),
        None => out.put_u8(EMPTY_STRING_CODE),
    }
}

pub(crate) fn decode_to(buf: &mut &[u8]) -> alloy_rlp::Result<Option<Address>> {
    match buf.first() {
        Some(&EMPTY_STRING_CODE) => {
            *buf = &buf[1..];
            Ok(None)
        }
        Some(_) => Address::decode(buf).map(Some),
        None => Err(alloy_rlp::Error::InputTooShort),
    }
}

/// Checks that the fee cap covers the tip.
pub(crate) fn validate_fee_caps(
    max_fee_per_gas: u128,
    max_priority_fee_per_gas: u128,
) -> Result<()> {
    if max_priority_fee_per_gas > max_fee_per_gas {
        return Err(SignerError::invalid_field(
            "maxPriorityFeePerGas",
            format!("{max_priority_fee_per_gas} exceeds maxFeePerGas {max_fee_per_gas}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::hex;

    #[test]
    fn test_recovery_policy_table() {
        assert_eq!(TxType::Legacy.recovery_encoding(), RecoveryEncoding::Legacy);
        for ty in [TxType::AccessList, TxType::DynamicFee, TxType::Blob, TxType::SetCode] {
            assert_eq!(ty.recovery_encoding(), RecoveryEncoding::YParity);
            assert!(ty.is_typed());
        }
    }

    #[test]
    fn test_tx_type_bytes() {
        for byte in 0u8..=4 {
            assert_eq!(u8::from(TxType::try_from(byte).unwrap()), byte);
        }
        assert!(matches!(TxType::try_from(0x7e), Err(SignerError::UnsupportedTxType(0x7e))));
        assert_eq!(u8::from(TxType::Blob), tx_type::BLOB);
        assert_eq!(TxType::try_from(tx_type::SET_CODE).unwrap(), TxType::SetCode);
        assert_eq!(TxType::Blob.to_string(), "eip4844");
    }

    #[test]
    fn test_recipient_encoding() {
        let mut out = Vec::new();
        encode_to(None, &mut out);
        assert_eq!(out, hex!("80"));
        assert_eq!(to_length(None), 1);

        let mut buf = out.as_slice();
        assert_eq!(decode_to(&mut buf).unwrap(), None);
        assert!(buf.is_empty());

        let to = Address::repeat_byte(0x35);
        let mut out = Vec::new();
        encode_to(Some(to), &mut out);
        assert_eq!(out.len(), to_length(Some(to)));
        assert_eq!(decode_to(&mut out.as_slice()).unwrap(), Some(to));
    }

    #[test]
    fn test_fee_cap_below_tip_is_rejected() {
        assert!(validate_fee_caps(10, 10).is_ok());
        let err = validate_fee_caps(9, 10).unwrap_err();
        assert!(err.to_string().contains("maxPriorityFeePerGas"));
    }
}
