use alloy_primitives::{Address, Bytes, ChainId, U256};
use alloy_rlp::{BufMut, Decodable, Encodable};

use super::{decode_to, encode_to, to_length, AccessList, RlpFields};

/// An EIP-2930 transaction: a legacy gas price plus an access list, always chain bound.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TxAccessList {
    /// Chain id
    pub chain_id: ChainId,
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
    /// Pre-warmed accounts and slots
    pub access_list: AccessList,
}

impl RlpFields for TxAccessList {
    fn fields_len(&self) -> usize {
        self.chain_id.length() +
            self.nonce.length() +
            self.gas_price.length() +
            self.gas_limit.length() +
            to_length(self.to) +
            self.value.length() +
            self.input.length() +
            self.access_list.length()
    }

    fn encode_fields(&self, out: &mut dyn BufMut) {
        self.chain_id.encode(out);
        self.nonce.encode(out);
        self.gas_price.encode(out);
        self.gas_limit.encode(out);
        encode_to(self.to, out);
        self.value.encode(out);
        self.input.encode(out);
        self.access_list.encode(out);
    }

    fn decode_fields(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        Ok(Self {
            chain_id: Decodable::decode(buf)?,
            nonce: Decodable::decode(buf)?,
            gas_price: Decodable::decode(buf)?,
            gas_limit: Decodable::decode(buf)?,
            to: decode_to(buf)?,
            value: Decodable::decode(buf)?,
            input: Decodable::decode(buf)?,
            access_list: Decodable::decode(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccessListItem, Transaction};
    use alloy_primitives::{address, b256, hex, B256};

    #[test]
    fn test_access_list_signing_payload() {
        let to = address!("3535353535353535353535353535353535353535");
        let tx = Transaction::AccessList(TxAccessList {
            chain_id: 1,
            nonce: 0,
            gas_price: 20_000_000_000,
            gas_limit: 30_000,
            to: Some(to),
            value: U256::ZERO,
            input: Bytes::new(),
            access_list: vec![AccessListItem {
                address: to,
                storage_keys: vec![B256::ZERO, B256::with_last_byte(1)],
            }]
            .into(),
        });

        assert_eq!(
            tx.encode_for_signing().unwrap(),
            hex!("01f87f01808504a817c8008275309435353535353535353535353535353535353535358080f85bf859943535353535353535353535353535353535353535f842a00000000000000000000000000000000000000000000000000000000000000000a00000000000000000000000000000000000000000000000000000000000000001")
        );
        assert_eq!(
            tx.signature_hash().unwrap(),
            b256!("d96615703b89fd7697a7517fad325b42bcb586797fc17a13d4cbad86aa5bb82b")
        );
    }
}
