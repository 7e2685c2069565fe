use alloy_primitives::{Address, Bytes, ChainId, U256};
use alloy_rlp::{BufMut, Decodable, Encodable};

use super::{decode_to, encode_to, to_length, validate_fee_caps, AccessList, RlpFields};
use crate::Result;

/// An EIP-1559 transaction with a priority fee and a fee cap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TxDynamicFee {
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
    /// Recipient, `None` for contract creation
    pub to: Option<Address>,
    /// Transferred value
    pub value: U256,
    /// Call data or init code
    pub input: Bytes,
    /// Pre-warmed accounts and slots
    pub access_list: AccessList,
}

impl TxDynamicFee {
    /// Checks that the fee cap covers the tip.
    pub fn validate(&self) -> Result<()> {
        validate_fee_caps(self.max_fee_per_gas, self.max_priority_fee_per_gas)
    }
}

impl RlpFields for TxDynamicFee {
    fn fields_len(&self) -> usize {
        self.chain_id.length() +
            self.nonce.length() +
            self.max_priority_fee_per_gas.length() +
            self.max_fee_per_gas.length() +
            self.gas_limit.length() +
            to_length(self.to) +
            self.value.length() +
            self.input.length() +
            self.access_list.length()
    }

    fn encode_fields(&self, out: &mut dyn BufMut) {
        self.chain_id.encode(out);
        self.nonce.encode(out);
        self.max_priority_fee_per_gas.encode(out);
        self.max_fee_per_gas.encode(out);
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
            max_priority_fee_per_gas: Decodable::decode(buf)?,
            max_fee_per_gas: Decodable::decode(buf)?,
            gas_limit: Decodable::decode(buf)?,
            to: decode_to(buf)?,
            value: Decodable::decode(buf)?,
            input: Decodable::decode(buf)?,
            access_list: Decodable::decode(buf)?,
        })
    }
}
