use alloy_primitives::U256;
use alloy_rlp::{Decodable, Header};
use tracing::trace;

use super::{
    RlpFields, SignedTransaction, Transaction, TxAccessList, TxBlob, TxDynamicFee, TxLegacy,
    TxSetCode, TxType,
};
use crate::{BlobSidecar, Result, Signature, SignerError};

/// Decodes the canonical signed encoding of any transaction type.
///
/// Blob transactions must be in their canonical form; use [`decode_network`] for the form with a
/// sidecar.
pub fn decode_signed(bytes: &[u8]) -> Result<SignedTransaction> {
    let mut buf = bytes;
    let (tx, signature) = match peek_type(buf)? {
        TxType::Legacy => {
            let (tx, sig) = TxLegacy::decode_signed(&mut buf)?;
            (Transaction::Legacy(tx), sig)
        }
        ty => {
            buf = &buf[1..];
            decode_typed(ty, &mut buf)?
        }
    };
    ensure_consumed(buf)?;

    let signed = SignedTransaction::new(tx, signature)?;
    trace!(tx_type = %signed.tx_type(), hash = %signed.hash(), "Decoded transaction");
    Ok(signed)
}

/// Decodes a transaction as received from the network.
///
/// Blob transactions must carry their sidecar, which is checked against the versioned hashes.
/// Other types are identical to their canonical form and yield no sidecar.
pub fn decode_network(bytes: &[u8]) -> Result<(SignedTransaction, Option<BlobSidecar>)> {
    if peek_type(bytes)? != TxType::Blob {
        return decode_signed(bytes).map(|signed| (signed, None));
    }

    let rlp = |source| SignerError::decode("blob transaction network form", source);
    let mut buf = &bytes[1..];
    let header = Header::decode(&mut buf).map_err(rlp)?;
    if !header.list {
        return Err(rlp(alloy_rlp::Error::UnexpectedString));
    }
    let started = buf.len();

    let (tx, signature) = decode_signed_fields::<TxBlob>(TxType::Blob, &mut buf)?;
    let sidecar = BlobSidecar::decode_fields(&mut buf).map_err(rlp)?;

    let consumed = started - buf.len();
    if consumed != header.payload_length {
        return Err(rlp(alloy_rlp::Error::ListLengthMismatch {
            expected: header.payload_length,
            got: consumed,
        }));
    }
    ensure_consumed(buf)?;
    sidecar.validate(&tx.blob_versioned_hashes)?;

    let signed = SignedTransaction::new(Transaction::Blob(tx), signature)?;
    trace!(hash = %signed.hash(), blobs = sidecar.len(), "Decoded blob transaction with sidecar");
    Ok((signed, Some(sidecar)))
}

fn peek_type(bytes: &[u8]) -> Result<TxType> {
    match bytes.first() {
        None => Err(SignerError::decode("transaction", alloy_rlp::Error::InputTooShort)),
        Some(&byte) if byte >= alloy_rlp::EMPTY_LIST_CODE => Ok(TxType::Legacy),
        Some(&byte) => match TxType::try_from(byte)? {
            TxType::Legacy => Err(SignerError::UnsupportedTxType(byte)),
            ty => Ok(ty),
        },
    }
}

fn ensure_consumed(buf: &[u8]) -> Result<()> {
    if buf.is_empty() {
        Ok(())
    } else {
        Err(SignerError::TrailingBytes(buf.len()))
    }
}

fn decode_typed(ty: TxType, buf: &mut &[u8]) -> Result<(Transaction, Signature)> {
    Ok(match ty {
        TxType::Legacy => return Err(SignerError::UnsupportedTxType(0)),
        TxType::AccessList => {
            let (tx, sig) = decode_signed_fields::<TxAccessList>(ty, buf)?;
            (Transaction::AccessList(tx), sig)
        }
        TxType::DynamicFee => {
            let (tx, sig) = decode_signed_fields::<TxDynamicFee>(ty, buf)?;
            (Transaction::DynamicFee(tx), sig)
        }
        TxType::Blob => {
            let (tx, sig) = decode_signed_fields::<TxBlob>(ty, buf)?;
            (Transaction::Blob(tx), sig)
        }
        TxType::SetCode => {
            let (tx, sig) = decode_signed_fields::<TxSetCode>(ty, buf)?;
            (Transaction::SetCode(tx), sig)
        }
    })
}

/// Decodes `[fields.., y_parity, r, s]`.
fn decode_signed_fields<T: RlpFields>(ty: TxType, buf: &mut &[u8]) -> Result<(T, Signature)> {
    let rlp = |source| SignerError::decode(describe(ty), source);

    let header = Header::decode(buf).map_err(rlp)?;
    if !header.list {
        return Err(rlp(alloy_rlp::Error::UnexpectedString));
    }
    let started = buf.len();

    let tx = T::decode_fields(buf).map_err(rlp)?;
    let v = u64::decode(buf).map_err(rlp)?;
    let r = U256::decode(buf).map_err(rlp)?;
    let s = U256::decode(buf).map_err(rlp)?;

    let consumed = started - buf.len();
    if consumed != header.payload_length {
        return Err(rlp(alloy_rlp::Error::ListLengthMismatch {
            expected: header.payload_length,
            got: consumed,
        }));
    }

    let (y_parity, _) = ty.recovery_encoding().decode_v(v)?;
    Ok((tx, Signature::new(r, s, y_parity)))
}

const fn describe(ty: TxType) -> &'static str {
    match ty {
        TxType::Legacy => "legacy transaction",
        TxType::AccessList => "eip2930 transaction",
        TxType::DynamicFee => "eip1559 transaction",
        TxType::Blob => "eip4844 transaction",
        TxType::SetCode => "eip7702 transaction",
    }
}
