//! secp256k1 signing, signer recovery and `v` value conventions.

use core::{fmt, str::FromStr};

use alloy_primitives::{hex, keccak256, Address, ChainId, B256, U256};
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use tracing::trace;

use crate::{
    constants::legacy::{EIP155_V_OFFSET, LEGACY_V_OFFSET},
    Result, SignerError,
};

/// Order of the secp256k1 group.
pub const SECP256K1N: U256 = U256::from_limbs([
    0xbfd2_5e8c_d036_4141,
    0xbaae_dce6_af48_a03b,
    0xffff_ffff_ffff_fffe,
    0xffff_ffff_ffff_ffff,
]);

/// Hashes `bytes` with keccak-256. Every digest in this crate goes through this function.
#[inline]
pub fn digest(bytes: impl AsRef<[u8]>) -> B256 {
    keccak256(bytes)
}

/// Derives the address of a public key: the last 20 bytes of the keccak-256 hash of the
/// uncompressed point without its `0x04` prefix.
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

/// An ECDSA signature over a 32-byte digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature {
    y_parity: bool,
    r: U256,
    s: U256,
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("y_parity", &self.y_parity)
            .field("r", &format_args!("{:#x}", self.r))
            .field("s", &format_args!("{:#x}", self.s))
            .finish()
    }
}

impl Signature {
    /// Creates a signature from its components. No range checks are performed.
    pub const fn new(r: U256, s: U256, y_parity: bool) -> Self {
        Self { y_parity, r, s }
    }

    /// The `r` scalar.
    pub const fn r(&self) -> U256 {
        self.r
    }

    /// The `s` scalar.
    pub const fn s(&self) -> U256 {
        self.s
    }

    /// Whether the `y` coordinate of the ephemeral point is odd.
    pub const fn y_parity(&self) -> bool {
        self.y_parity
    }

    /// Returns a copy with the given parity.
    pub const fn with_parity(self, y_parity: bool) -> Self {
        Self { y_parity, ..self }
    }

    /// Checks that `r` and `s` are non-zero and below the curve order.
    pub fn validate(&self) -> Result<()> {
        if self.r.is_zero() || self.r >= SECP256K1N {
            return Err(SignerError::SignatureOutOfRange("r"));
        }
        if self.s.is_zero() || self.s >= SECP256K1N {
            return Err(SignerError::SignatureOutOfRange("s"));
        }
        Ok(())
    }

    /// Parses a 65-byte `r ‖ s ‖ v` signature. `v` may be `0`/`1` or `27`/`28`.
    pub fn from_raw(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 65 {
            return Err(SignerError::invalid_field(
                "signature",
                format!("expected 65 bytes, got {}", bytes.len()),
            ));
        }
        let v = bytes[64] as u64;
        let y_parity = match v {
            0 | 1 => v == 1,
            _ => RecoveryEncoding::Electrum.decode_v(v)?.0,
        };
        Ok(Self::new(
            U256::from_be_slice(&bytes[..32]),
            U256::from_be_slice(&bytes[32..64]),
            y_parity,
        ))
    }

    /// Serializes as `r ‖ s ‖ v` with `v` in the 27/28 form expected by `ecrecover`.
    pub fn as_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(&self.r.to_be_bytes::<32>());
        out[32..64].copy_from_slice(&self.s.to_be_bytes::<32>());
        out[64] = (LEGACY_V_OFFSET + self.y_parity as u64) as u8;
        out
    }

    /// Recovers the address that produced this signature over `digest`.
    ///
    /// High-`s` signatures are normalized before recovery, flipping the parity accordingly.
    pub fn recover_address_from_prehash(&self, digest: &B256) -> Result<Address> {
        self.validate()?;

        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.r.to_be_bytes::<32>());
        bytes[32..].copy_from_slice(&self.s.to_be_bytes::<32>());
        let mut signature =
            EcdsaSignature::from_slice(&bytes).map_err(|e| SignerError::Recovery(e.to_string()))?;
        let mut recovery_id = RecoveryId::new(self.y_parity, false);

        if let Some(normalized) = signature.normalize_s() {
            signature = normalized;
            recovery_id = RecoveryId::new(!self.y_parity, false);
        }

        let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &signature, recovery_id)
            .map_err(|e| SignerError::Recovery(e.to_string()))?;
        Ok(address_of(&key))
    }

    /// Builds a signature from `r` and `s` alone by trying both parities and keeping the one
    /// that recovers to `expected`.
    pub fn from_rs_and_signer(r: U256, s: U256, digest: &B256, expected: Address) -> Result<Self> {
        for y_parity in [false, true] {
            let candidate = Self::new(r, s, y_parity);
            match candidate.recover_address_from_prehash(digest) {
                Ok(address) if address == expected => return Ok(candidate),
                Ok(_) | Err(SignerError::Recovery(_)) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(SignerError::SignerMismatch { expected })
    }
}

/// Signs `digest` with `key`.
pub fn sign_digest(digest: &B256, key: &PrivateKey) -> Result<Signature> {
    key.sign_digest(digest)
}

/// Recovers the signer of `digest` from `signature`.
pub fn recover_address(digest: &B256, signature: &Signature) -> Result<Address> {
    signature.recover_address_from_prehash(digest)
}

/// A secp256k1 private key. The key is only borrowed by signing operations and never cloned
/// into other values.
pub struct PrivateKey(SigningKey);

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey").field("address", &self.address()).finish_non_exhaustive()
    }
}

impl PrivateKey {
    /// Parses a 32-byte big-endian scalar.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        SigningKey::from_slice(bytes).map(Self).map_err(|_| SignerError::InvalidPrivateKey)
    }

    /// The address controlled by this key.
    pub fn address(&self) -> Address {
        address_of(self.0.verifying_key())
    }

    /// Signs a 32-byte digest with RFC 6979 deterministic nonces. The returned signature has a
    /// low `s`.
    pub fn sign_digest(&self, digest: &B256) -> Result<Signature> {
        let (signature, recovery_id) = self
            .0
            .sign_prehash_recoverable(digest.as_slice())
            .map_err(|e| SignerError::Signing(e.to_string()))?;
        let bytes = signature.to_bytes();
        let signature = Signature::new(
            U256::from_be_slice(&bytes[..32]),
            U256::from_be_slice(&bytes[32..]),
            recovery_id.is_y_odd(),
        );
        trace!(digest = %digest, y_parity = signature.y_parity, "Signed digest");
        Ok(signature)
    }
}

impl FromStr for PrivateKey {
    type Err = SignerError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim()).map_err(|_| SignerError::InvalidPrivateKey)?;
        Self::from_slice(&bytes)
    }
}

/// How the y-parity of a signature is represented in the `v` slot on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecoveryEncoding {
    /// Legacy transactions: `27 + parity`, or `35 + 2 * chain_id + parity` under EIP-155.
    Legacy,
    /// Typed transactions and authorizations: the raw parity bit.
    YParity,
    /// Off-chain messages verified with `ecrecover`: always `27 + parity`.
    Electrum,
}

impl RecoveryEncoding {
    /// Human readable name, used in errors.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::YParity => "y-parity",
            Self::Electrum => "electrum",
        }
    }

    /// Computes the `v` value for `y_parity`. `chain_id` only matters for [`Self::Legacy`].
    pub fn encode_v(self, y_parity: bool, chain_id: Option<ChainId>) -> Result<u64> {
        let parity = y_parity as u64;
        match (self, chain_id) {
            (Self::Legacy, Some(chain_id)) => chain_id
                .checked_mul(2)
                .and_then(|v| v.checked_add(EIP155_V_OFFSET + parity))
                .ok_or_else(|| {
                    SignerError::invalid_field("chainId", "too large for EIP-155 replay protection")
                }),
            (Self::Legacy, None) | (Self::Electrum, _) => Ok(LEGACY_V_OFFSET + parity),
            (Self::YParity, _) => Ok(parity),
        }
    }

    /// Splits a `v` value into the parity and, for EIP-155 legacy values, the chain id.
    pub fn decode_v(self, v: u64) -> Result<(bool, Option<ChainId>)> {
        let invalid = || SignerError::InvalidV { v, convention: self.name() };
        match self {
            Self::Legacy if v >= EIP155_V_OFFSET => {
                let chain_id = (v - EIP155_V_OFFSET) / 2;
                Ok(((v - EIP155_V_OFFSET) % 2 == 1, Some(chain_id)))
            }
            Self::Legacy | Self::Electrum => match v {
                27 | 28 => Ok((v == 28, None)),
                _ => Err(invalid()),
            },
            Self::YParity => match v {
                0 | 1 => Ok((v == 1, None)),
                _ => Err(invalid()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, b256, uint};

    const KEY: B256 = b256!("4646464646464646464646464646464646464646464646464646464646464646");

    fn key() -> PrivateKey {
        PrivateKey::from_slice(KEY.as_slice()).unwrap()
    }

    #[test]
    fn test_address_of_key() {
        assert_eq!(key().address(), address!("9d8a62f656a8d1615c1294fd71e9cfb3e4855a4f"));
    }

    #[test]
    fn test_sign_eip155_reference_digest() {
        // Signing hash of the EIP-155 example transaction.
        let digest = b256!("daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53");
        let signature = key().sign_digest(&digest).unwrap();

        assert!(!signature.y_parity());
        assert_eq!(
            signature.r(),
            uint!(0x28ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276_U256)
        );
        assert_eq!(
            signature.s(),
            uint!(0x67cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83_U256)
        );
        assert_eq!(recover_address(&digest, &signature).unwrap(), key().address());
    }

    #[test]
    fn test_high_s_is_normalized_on_recovery() {
        let digest = digest(b"high-s");
        let signature = key().sign_digest(&digest).unwrap();
        let flipped =
            Signature::new(signature.r(), SECP256K1N - signature.s(), !signature.y_parity());

        assert_eq!(flipped.recover_address_from_prehash(&digest).unwrap(), key().address());
    }

    #[test]
    fn test_out_of_range_components_are_rejected() {
        let digest = digest(b"range");
        let zero_r = Signature::new(U256::ZERO, U256::from(1), false);
        let big_s = Signature::new(U256::from(1), SECP256K1N, false);

        assert!(matches!(
            zero_r.recover_address_from_prehash(&digest),
            Err(SignerError::SignatureOutOfRange("r"))
        ));
        assert!(matches!(
            big_s.recover_address_from_prehash(&digest),
            Err(SignerError::SignatureOutOfRange("s"))
        ));
    }

    #[test]
    fn test_from_rs_and_signer_picks_matching_parity() {
        let digest = digest(b"parity");
        let signature = key().sign_digest(&digest).unwrap();

        let rebuilt =
            Signature::from_rs_and_signer(signature.r(), signature.s(), &digest, key().address())
                .unwrap();
        assert_eq!(rebuilt, signature);

        let err =
            Signature::from_rs_and_signer(signature.r(), signature.s(), &digest, Address::ZERO)
                .unwrap_err();
        assert!(matches!(err, SignerError::SignerMismatch { .. }));
    }

    #[test]
    fn test_raw_bytes_round_trip() {
        let digest = digest(b"raw");
        let signature = key().sign_digest(&digest).unwrap();
        let raw = signature.as_bytes();

        assert!(raw[64] == 27 || raw[64] == 28);
        assert_eq!(Signature::from_raw(&raw).unwrap(), signature);
        assert!(Signature::from_raw(&raw[..64]).is_err());
    }

    #[test]
    fn test_invalid_private_keys() {
        assert!(matches!(PrivateKey::from_slice(&[0u8; 32]), Err(SignerError::InvalidPrivateKey)));
        assert!(matches!(PrivateKey::from_slice(&[1u8; 31]), Err(SignerError::InvalidPrivateKey)));
        assert!(matches!(
            PrivateKey::from_slice(&SECP256K1N.to_be_bytes::<32>()),
            Err(SignerError::InvalidPrivateKey)
        ));
        assert!("0xzz".parse::<PrivateKey>().is_err());
        assert_eq!(
            format!("0x{}", "46".repeat(32)).parse::<PrivateKey>().unwrap().address(),
            key().address()
        );
    }

    #[test]
    fn test_v_conventions() {
        assert_eq!(RecoveryEncoding::Legacy.encode_v(false, None).unwrap(), 27);
        assert_eq!(RecoveryEncoding::Legacy.encode_v(true, Some(1)).unwrap(), 38);
        assert_eq!(RecoveryEncoding::Legacy.encode_v(true, Some(1337)).unwrap(), 2710);
        assert_eq!(RecoveryEncoding::YParity.encode_v(true, Some(1)).unwrap(), 1);
        assert_eq!(RecoveryEncoding::Electrum.encode_v(false, Some(1)).unwrap(), 27);
        assert!(RecoveryEncoding::Legacy.encode_v(true, Some(u64::MAX)).is_err());

        assert_eq!(RecoveryEncoding::Legacy.decode_v(37).unwrap(), (false, Some(1)));
        assert_eq!(RecoveryEncoding::Legacy.decode_v(0x0a95).unwrap(), (false, Some(1337)));
        assert_eq!(RecoveryEncoding::Legacy.decode_v(28).unwrap(), (true, None));
        assert!(RecoveryEncoding::Legacy.decode_v(29).is_err());
        assert!(RecoveryEncoding::YParity.decode_v(27).is_err());
        assert!(RecoveryEncoding::Electrum.decode_v(1).is_err());
    }
}
