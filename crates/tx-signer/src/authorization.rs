//! EIP-7702 delegation authorizations.

use alloy_primitives::{Address, B256, U256};
use alloy_rlp::{BufMut, Decodable, Encodable, Header, RlpDecodable, RlpEncodable};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    constants::eip7702::MAGIC, digest, PrivateKey, RecoveryEncoding, Result, Signature,
    SignerError,
};

/// Permission for an account's code to delegate to `address`.
///
/// A chain id of zero makes the authorization valid on every chain.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    RlpEncodable,
    RlpDecodable,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    /// Chain the authorization is valid on
    pub chain_id: U256,
    /// Delegate target
    pub address: Address,
    /// Nonce of the authorizing account
    #[serde(with = "alloy_serde::quantity")]
    pub nonce: u64,
}

impl Authorization {
    /// `keccak(0x05 ‖ rlp([chain_id, address, nonce]))`.
    pub fn signature_hash(&self) -> B256 {
        let mut buf = Vec::with_capacity(1 + self.length());
        buf.put_u8(MAGIC);
        self.encode(&mut buf);
        digest(buf)
    }

    /// Attaches a signature.
    pub fn into_signed(self, signature: Signature) -> SignedAuthorization {
        SignedAuthorization {
            inner: self,
            y_parity: signature.y_parity() as u8,
            r: signature.r(),
            s: signature.s(),
        }
    }
}

/// Computes the digest an account signs to authorize delegation to `address`.
pub fn build_authorization_digest(chain_id: U256, address: Address, nonce: u64) -> B256 {
    Authorization { chain_id, address, nonce }.signature_hash()
}

/// Signs `authorization` with `key`.
pub fn sign_authorization(
    authorization: Authorization,
    key: &PrivateKey,
) -> Result<SignedAuthorization> {
    let hash = authorization.signature_hash();
    let signature = key.sign_digest(&hash)?;
    debug!(
        chain_id = %authorization.chain_id,
        address = %authorization.address,
        nonce = authorization.nonce,
        authority = %key.address(),
        "Signed authorization"
    );
    Ok(authorization.into_signed(signature))
}

/// An authorization with its signature. Encoded as `[chain_id, address, nonce, y_parity, r, s]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedAuthorization {
    #[serde(flatten)]
    inner: Authorization,
    #[serde(with = "alloy_serde::quantity")]
    y_parity: u8,
    r: U256,
    s: U256,
}

impl SignedAuthorization {
    /// Creates a signed authorization from raw components.
    pub const fn new_unchecked(inner: Authorization, y_parity: u8, r: U256, s: U256) -> Self {
        Self { inner, y_parity, r, s }
    }

    /// The signed authorization.
    pub const fn authorization(&self) -> &Authorization {
        &self.inner
    }

    /// Raw y-parity as carried on the wire.
    pub const fn y_parity(&self) -> u8 {
        self.y_parity
    }

    /// The signature, rejecting a parity other than 0 or 1.
    pub fn signature(&self) -> Result<Signature> {
        let (y_parity, _) = RecoveryEncoding::YParity.decode_v(self.y_parity as u64)?;
        Ok(Signature::new(self.r, self.s, y_parity))
    }

    /// Recovers the account that signed this authorization.
    pub fn recover_authority(&self) -> Result<Address> {
        let authority =
            self.signature()?.recover_address_from_prehash(&self.inner.signature_hash())?;
        trace!(%authority, address = %self.inner.address, "Recovered authority");
        Ok(authority)
    }

    fn fields_len(&self) -> usize {
        self.inner.chain_id.length() +
            self.inner.address.length() +
            self.inner.nonce.length() +
            self.y_parity.length() +
            self.r.length() +
            self.s.length()
    }
}

impl Encodable for SignedAuthorization {
    fn encode(&self, out: &mut dyn BufMut) {
        Header { list: true, payload_length: self.fields_len() }.encode(out);
        self.inner.chain_id.encode(out);
        self.inner.address.encode(out);
        self.inner.nonce.encode(out);
        self.y_parity.encode(out);
        self.r.encode(out);
        self.s.encode(out);
    }

    fn length(&self) -> usize {
        Header { list: true, payload_length: self.fields_len() }.length_with_payload()
    }
}

impl Decodable for SignedAuthorization {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let header = Header::decode(buf)?;
        if !header.list {
            return Err(alloy_rlp::Error::UnexpectedString);
        }
        let started = buf.len();

        let inner = Authorization {
            chain_id: Decodable::decode(buf)?,
            address: Decodable::decode(buf)?,
            nonce: Decodable::decode(buf)?,
        };
        let y_parity = u8::decode(buf)?;
        if y_parity > 1 {
            return Err(alloy_rlp::Error::Custom("authorization y-parity must be 0 or 1"));
        }
        let r = Decodable::decode(buf)?;
        let s = Decodable::decode(buf)?;

        let consumed = started - buf.len();
        if consumed != header.payload_length {
            return Err(alloy_rlp::Error::ListLengthMismatch {
                expected: header.payload_length,
                got: consumed,
            });
        }
        Ok(Self { inner, y_parity, r, s })
    }
}

impl TryFrom<SignedAuthorization> for Signature {
    type Error = SignerError;

    fn try_from(value: SignedAuthorization) -> Result<Self> {
        value.signature()
    }
}
