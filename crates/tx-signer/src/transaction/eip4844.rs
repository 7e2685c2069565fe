use alloy_primitives::{Address, Bytes, ChainId, B256, U256};
use alloy_rlp::{BufMut, Decodable, Encodable, Header};

use super::{encode_signed_list, signed_list_len, validate_fee_caps, AccessList, RlpFields, TxType};
use crate::{
    constants::eip4844::VERSIONED_HASH_VERSION_KZG, kzg::check_blob_count, BlobSidecar, Result,
    Signature, SignerError,
};

/// An EIP-4844 transaction. It commits to blobs through their versioned hashes; the blobs
/// themselves travel in a [`BlobSidecar`] that is not signed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TxBlob {
    /// Chain id
    pub chain_id: ChainId,
    /// Sender nonce
    pub nonce: u64,
    /// Tip paid to the block producer per unit of gas
    pub max_priority_fee_per_gas: u128,
    /// Upper bound on base fee plus tip per unit of gas
    pub max_fee_per_gas: u128,
    /// Gas limit
    pub gas_limit: u64,
    /// Recipient. Blob transactions cannot create contracts.
    pub to: Address,
    /// Transferred value
    pub value: U256,
    /// Call data
    pub input: Bytes,
    /// Pre-warmed accounts and slots
    pub access_list: AccessList,
    /// Upper bound on the blob base fee
    pub max_fee_per_blob_gas: u128,
    /// Versioned hash of each blob
    pub blob_versioned_hashes: Vec<B256>,
}

impl TxBlob {
    /// Checks fee caps, blob count and hash versions.
    pub fn validate(&self) -> Result<()> {
        validate_fee_caps(self.max_fee_per_gas, self.max_priority_fee_per_gas)?;
        check_blob_count(self.blob_versioned_hashes.len())?;
        for (index, hash) in self.blob_versioned_hashes.iter().enumerate() {
            if hash[0] != VERSIONED_HASH_VERSION_KZG {
                return Err(SignerError::invalid_field(
                    format!("blobVersionedHashes[{index}]"),
                    format!("unsupported version {:#04x}", hash[0]),
                ));
            }
        }
        Ok(())
    }

    /// Network encoding: `0x03 ‖ rlp([[fields.., y_parity, r, s], blobs, commitments, proofs])`.
    ///
    /// The canonical form, whose hash identifies the transaction, omits the sidecar.
    pub fn encode_network(&self, signature: &Signature, sidecar: &BlobSidecar) -> Result<Vec<u8>> {
        self.validate()?;
        signature.validate()?;
        sidecar.validate(&self.blob_versioned_hashes)?;

        let v =
            TxType::Blob.recovery_encoding().encode_v(signature.y_parity(), Some(self.chain_id))?;
        let payload_length = signed_list_len(self, v, signature) + sidecar.fields_len();

        let mut out = Vec::with_capacity(1 + payload_length + 9);
        out.put_u8(TxType::Blob.into());
        Header { list: true, payload_length }.encode(&mut out);
        encode_signed_list(self, v, signature, &mut out);
        sidecar.encode_fields(&mut out);
        Ok(out)
    }
}

impl RlpFields for TxBlob {
    fn fields_len(&self) -> usize {
        self.chain_id.length() +
            self.nonce.length() +
            self.max_priority_fee_per_gas.length() +
            self.max_fee_per_gas.length() +
            self.gas_limit.length() +
            self.to.length() +
            self.value.length() +
            self.input.length() +
            self.access_list.length() +
            self.max_fee_per_blob_gas.length() +
            self.blob_versioned_hashes.length()
    }

    fn encode_fields(&self, out: &mut dyn BufMut) {
        self.chain_id.encode(out);
        self.nonce.encode(out);
        self.max_priority_fee_per_gas.encode(out);
        self.max_fee_per_gas.encode(out);
        self.gas_limit.encode(out);
        self.to.encode(out);
        self.value.encode(out);
        self.input.encode(out);
        self.access_list.encode(out);
        self.max_fee_per_blob_gas.encode(out);
        self.blob_versioned_hashes.encode(out);
    }

    fn decode_fields(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        Ok(Self {
            chain_id: Decodable::decode(buf)?,
            nonce: Decodable::decode(buf)?,
            max_priority_fee_per_gas: Decodable::decode(buf)?,
            max_fee_per_gas: Decodable::decode(buf)?,
            gas_limit: Decodable::decode(buf)?,
            to: Decodable::decode(buf)?,
            value: Decodable::decode(buf)?,
            input: Decodable::decode(buf)?,
            access_list: Decodable::decode(buf)?,
            max_fee_per_blob_gas: Decodable::decode(buf)?,
            blob_versioned_hashes: Decodable::decode(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, Transaction};
    use alloy_primitives::{address, b256, hex};

    const EMPTY_BLOB_HASH: B256 =
        b256!("010657f37554c781402a22917dee2f75def7ab966d7b770905398eba3c444014");

    fn blob_tx() -> TxBlob {
        TxBlob {
            chain_id: 1,
            nonce: 3,
            max_priority_fee_per_gas: 5,
            max_fee_per_gas: 139,
            gas_limit: 21_000,
            to: address!("3535353535353535353535353535353535353535"),
            value: U256::ZERO,
            input: Bytes::new(),
            access_list: AccessList::default(),
            max_fee_per_blob_gas: 2_000_000,
            blob_versioned_hashes: vec![EMPTY_BLOB_HASH],
        }
    }

    #[test]
    fn test_blob_signing_payload() {
        let tx = Transaction::Blob(blob_tx());
        assert_eq!(
            tx.encode_for_signing().unwrap(),
            hex!("03f846010305818b8252089435353535353535353535353535353535353535358080c0831e8480e1a0010657f37554c781402a22917dee2f75def7ab966d7b770905398eba3c444014")
        );
        assert_eq!(
            tx.signature_hash().unwrap(),
            b256!("c6b39e97ec1ab99034afd85a0251613995e4b74365e698be3f8cdcb5f7a1de44")
        );
    }

    #[test]
    fn test_blob_hash_rules() {
        let none = TxBlob { blob_versioned_hashes: vec![], ..blob_tx() };
        assert_eq!(none.validate().unwrap_err().kind(), ErrorKind::Construction);

        let seven = TxBlob { blob_versioned_hashes: vec![EMPTY_BLOB_HASH; 7], ..blob_tx() };
        assert!(seven.validate().is_err());

        let wrong_version = TxBlob { blob_versioned_hashes: vec![B256::ZERO], ..blob_tx() };
        let err = wrong_version.validate().unwrap_err();
        assert!(err.to_string().contains("blobVersionedHashes[0]"));

        let six = TxBlob { blob_versioned_hashes: vec![EMPTY_BLOB_HASH; 6], ..blob_tx() };
        assert!(six.validate().is_ok());
    }
}
