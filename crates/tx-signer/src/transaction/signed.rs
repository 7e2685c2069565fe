use alloy_primitives::{Address, Bytes, B256};
use tracing::debug;

use super::{Transaction, TxType};
use crate::{digest, BlobSidecar, PrivateKey, Result, Signature, SignerError};

/// A transaction with its signature and identifying hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    tx: Transaction,
    signature: Signature,
    encoded: Bytes,
    hash: B256,
}

impl SignedTransaction {
    /// Attaches `signature` to `tx` and computes the canonical encoding and hash.
    pub fn new(tx: Transaction, signature: Signature) -> Result<Self> {
        let encoded = Bytes::from(tx.encode_signed(&signature)?);
        let hash = digest(&encoded);
        Ok(Self { tx, signature, encoded, hash })
    }

    /// The unsigned transaction.
    pub const fn tx(&self) -> &Transaction {
        &self.tx
    }

    /// The signature.
    pub const fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Transaction type.
    pub const fn tx_type(&self) -> TxType {
        self.tx.tx_type()
    }

    /// Canonical signed encoding. Blob transactions are encoded without their sidecar.
    pub const fn encoded(&self) -> &Bytes {
        &self.encoded
    }

    /// Keccak-256 hash of [`Self::encoded`].
    pub const fn hash(&self) -> B256 {
        self.hash
    }

    /// Recovers the sender.
    pub fn recover_signer(&self) -> Result<Address> {
        recover_signer(&self.tx, &self.signature)
    }

    /// Network encoding of a blob transaction with its sidecar.
    pub fn encode_network(&self, sidecar: &BlobSidecar) -> Result<Vec<u8>> {
        match &self.tx {
            Transaction::Blob(tx) => tx.encode_network(&self.signature, sidecar),
            _ => Err(SignerError::invalid_field(
                "sidecar",
                format!("{} transactions do not carry a sidecar", self.tx_type()),
            )),
        }
    }

    /// Splits into the transaction and its signature.
    pub fn into_parts(self) -> (Transaction, Signature) {
        (self.tx, self.signature)
    }
}

impl Transaction {
    /// Signs the transaction with `key`.
    pub fn sign(self, key: &PrivateKey) -> Result<SignedTransaction> {
        let signature_hash = self.signature_hash()?;
        let signature = key.sign_digest(&signature_hash)?;
        let signed = SignedTransaction::new(self, signature)?;
        debug!(
            tx_type = %signed.tx_type(),
            chain_id = ?signed.tx().chain_id(),
            nonce = signed.tx().nonce(),
            hash = %signed.hash(),
            signer = %key.address(),
            "Signed transaction"
        );
        Ok(signed)
    }
}

/// Signs `tx` with `key`.
pub fn sign_transaction(tx: impl Into<Transaction>, key: &PrivateKey) -> Result<SignedTransaction> {
    tx.into().sign(key)
}

/// Recovers the sender of `tx` from `signature`.
pub fn recover_signer(tx: &Transaction, signature: &Signature) -> Result<Address> {
    signature.recover_address_from_prehash(&tx.signature_hash()?)
}

/// Encodes a signed blob transaction together with its sidecar for broadcast.
pub fn encode_network(signed: &SignedTransaction, sidecar: &BlobSidecar) -> Result<Vec<u8>> {
    signed.encode_network(sidecar)
}
