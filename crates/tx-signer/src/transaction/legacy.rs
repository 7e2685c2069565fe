use alloy_primitives::{Address, Bytes, ChainId, U256};
use alloy_rlp::{BufMut, Decodable, Encodable, Header};

use super::{decode_to, encode_signature_fields, encode_to, signature_fields_len, to_length};
use crate::{RecoveryEncoding, Result, Signature, SignerError};

/// A legacy transaction.
///
/// With a chain id the signing payload is `[nonce, gasPrice, gas, to, value, data, chainId, 0, 0]`
/// (EIP-155); without one it is the bare six-field list and the signature can be replayed on any
/// chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TxLegacy {
    /// Chain id for EIP-155 replay protection
    pub chain_id: Option<ChainId>,
    /// Sender nonce
    pub nonce: u64,
    /// Gas price in wei
    pub gas_price: u128,
    /// Gas limit
    pub gas_limit: u64,
    /// Recipient, `None` for contract creation
    pub to: Option<Address>,
    /// Transferred value
    pub value: U256,
    /// Call data or init code
    pub input: Bytes,
}

impl TxLegacy {
    /// Checks that the chain id leaves room for the EIP-155 `v` value.
    pub fn validate(&self) -> Result<()> {
        if self.chain_id.is_some() {
            RecoveryEncoding::Legacy.encode_v(true, self.chain_id)?;
        }
        Ok(())
    }

    fn fields_len(&self) -> usize {
        self.nonce.length() +
            self.gas_price.length() +
            self.gas_limit.length() +
            to_length(self.to) +
            self.value.length() +
            self.input.length()
    }

    fn encode_fields(&self, out: &mut dyn BufMut) {
        self.nonce.encode(out);
        self.gas_price.encode(out);
        self.gas_limit.encode(out);
        encode_to(self.to, out);
        self.value.encode(out);
        self.input.encode(out);
    }

    fn eip155_fields_len(&self) -> usize {
        self.chain_id.map_or(0, |chain_id| chain_id.length() + 2)
    }

    pub(crate) fn encode_for_signing(&self, out: &mut dyn BufMut) {
        let payload_length = self.fields_len() + self.eip155_fields_len();
        Header { list: true, payload_length }.encode(out);
        self.encode_fields(out);
        if let Some(chain_id) = self.chain_id {
            chain_id.encode(out);
            0u8.encode(out);
            0u8.encode(out);
        }
    }

    pub(crate) fn encode_signed(&self, v: u64, signature: &Signature, out: &mut dyn BufMut) {
        let payload_length = self.fields_len() + signature_fields_len(v, signature);
        Header { list: true, payload_length }.encode(out);
        self.encode_fields(out);
        encode_signature_fields(v, signature, out);
    }

    /// Decodes `[nonce, gasPrice, gas, to, value, data, v, r, s]`. The chain id is taken from
    /// `v`.
    pub(crate) fn decode_signed(buf: &mut &[u8]) -> Result<(Self, Signature)> {
        let rlp = |source| SignerError::decode("legacy transaction", source);

        let header = Header::decode(buf).map_err(rlp)?;
        if !header.list {
            return Err(rlp(alloy_rlp::Error::UnexpectedString));
        }
        let started = buf.len();

        let nonce = u64::decode(buf).map_err(rlp)?;
        let gas_price = u128::decode(buf).map_err(rlp)?;
        let gas_limit = u64::decode(buf).map_err(rlp)?;
        let to = decode_to(buf).map_err(rlp)?;
        let value = U256::decode(buf).map_err(rlp)?;
        let input = Bytes::decode(buf).map_err(rlp)?;
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

        let (y_parity, chain_id) = RecoveryEncoding::Legacy.decode_v(v)?;
        let tx = Self { chain_id, nonce, gas_price, gas_limit, to, value, input };
        Ok((tx, Signature::new(r, s, y_parity)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, b256, hex, keccak256};

    fn eip155_example() -> TxLegacy {
        TxLegacy {
            chain_id: Some(1),
            nonce: 9,
            gas_price: 20_000_000_000,
            gas_limit: 21_000,
            to: Some(address!("3535353535353535353535353535353535353535")),
            value: U256::from(1_000_000_000_000_000_000u128),
            input: Bytes::new(),
        }
    }

    #[test]
    fn test_eip155_signing_payload() {
        let mut out = Vec::new();
        eip155_example().encode_for_signing(&mut out);
        assert_eq!(
            out,
            hex!("ec098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a764000080018080")
        );
        assert_eq!(
            keccak256(&out),
            b256!("daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53")
        );
    }

    #[test]
    fn test_unprotected_signing_payload_has_six_fields() {
        let tx = TxLegacy { chain_id: None, ..eip155_example() };
        let mut out = Vec::new();
        tx.encode_for_signing(&mut out);
        assert_eq!(
            keccak256(&out),
            b256!("f9e36c28c8cb35adba138005c02ab7aa7fbcd891f3139cb2eeed052a51cd2713")
        );
    }

    #[test]
    fn test_decode_keyless_deployment() {
        // Pre-EIP-155 contract creation of the CREATE2 factory.
        let raw = hex!("f8a58085174876e800830186a08080b853604580600e600039806000f350fe7fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffe03601600081602082378035828234f58015156039578182fd5b8082525050506014600cf31ba02222222222222222222222222222222222222222222222222222222222222222a02222222222222222222222222222222222222222222222222222222222222222");
        let (tx, signature) = TxLegacy::decode_signed(&mut raw.as_slice()).unwrap();

        assert_eq!(tx.chain_id, None);
        assert_eq!(tx.to, None);
        assert_eq!(tx.gas_price, 100_000_000_000);
        assert_eq!(tx.gas_limit, 100_000);
        assert!(!signature.y_parity());
    }

    #[test]
    fn test_decode_rejects_truncated_list() {
        let raw = hex!("f86c0985");
        assert!(matches!(
            TxLegacy::decode_signed(&mut raw.as_slice()),
            Err(SignerError::Decode { .. })
        ));
    }

    #[test]
    fn test_chain_id_too_large_for_v() {
        let tx = TxLegacy { chain_id: Some(u64::MAX / 2), ..eip155_example() };
        assert!(tx.validate().is_err());
        assert!(eip155_example().validate().is_ok());
    }
}
