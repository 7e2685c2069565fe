use alloy_primitives::{Address, Bytes, ChainId, U256};
use alloy_rlp::{BufMut, Decodable, Encodable};

use super::{validate_fee_caps, AccessList, RlpFields};
use crate::{Result, SignedAuthorization, SignerError};

/// An EIP-7702 transaction that installs delegation designators for the authorizing accounts.
///
/// Authorizations are applied in list order and may repeat a delegate target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TxSetCode {
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
    /// Recipient. Set code transactions cannot create contracts.
    pub to: Address,
    /// Transferred value
    pub value: U256,
    /// Call data
    pub input: Bytes,
    /// Pre-warmed accounts and slots
    pub access_list: AccessList,
    /// Signed delegations, in order
    pub authorization_list: Vec<SignedAuthorization>,
}

impl TxSetCode {
    /// Checks fee caps and that at least one authorization is present.
    pub fn validate(&self) -> Result<()> {
        validate_fee_caps(self.max_fee_per_gas, self.max_priority_fee_per_gas)?;
        if self.authorization_list.is_empty() {
            return Err(SignerError::invalid_field("authorizationList", "must not be empty"));
        }
        Ok(())
    }
}

impl RlpFields for TxSetCode {
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
            self.authorization_list.length()
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
        self.authorization_list.encode(out);
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
            authorization_list: Decodable::decode(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{sign_authorization, Authorization, PrivateKey, Transaction};
    use alloy_primitives::{address, b256, bytes, hex};

    #[test]
    fn test_set_code_signing_payload() {
        let key_a = PrivateKey::from_slice(&[0x46; 32]).unwrap();
        let key_b = PrivateKey::from_slice(&hex!(
            "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef"
        ))
        .unwrap();
        let target = address!("4242424242424242424242424242424242424242");
        let auth = |nonce| Authorization { chain_id: U256::from(1), address: target, nonce };

        let tx = Transaction::SetCode(TxSetCode {
            chain_id: 1,
            nonce: 2,
            max_priority_fee_per_gas: 5,
            max_fee_per_gas: 139,
            gas_limit: 120_000,
            to: address!("3535353535353535353535353535353535353535"),
            value: U256::ZERO,
            input: bytes!("a9059cbb"),
            access_list: AccessList::default(),
            authorization_list: vec![
                sign_authorization(auth(0), &key_b).unwrap(),
                sign_authorization(auth(7), &key_a).unwrap(),
            ],
        });

        assert_eq!(
            tx.signature_hash().unwrap(),
            b256!("dda7fcb4aafb3218d0f371086693513a8422d400c09bd4c3f8a7580b496b7fa0")
        );
    }

    #[test]
    fn test_empty_authorization_list_is_rejected() {
        let tx = TxSetCode { max_fee_per_gas: 1, ..Default::default() };
        let err = tx.validate().unwrap_err();
        assert!(err.to_string().contains("authorizationList"));
    }
}
