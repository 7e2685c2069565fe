//! EIP-191 personal messages.

use alloy_primitives::{Address, B256};
use tracing::trace;

use crate::{constants::messages::EIP191_PREFIX, digest, PrivateKey, Result, Signature};

/// `keccak("\x19Ethereum Signed Message:\n" ‖ len(message) ‖ message)`, with the length in
/// decimal.
pub fn hash_message(message: impl AsRef<[u8]>) -> B256 {
    let message = message.as_ref();
    let length = message.len().to_string();

    let mut buf = Vec::with_capacity(EIP191_PREFIX.len() + length.len() + message.len());
    buf.extend_from_slice(EIP191_PREFIX.as_bytes());
    buf.extend_from_slice(length.as_bytes());
    buf.extend_from_slice(message);
    digest(buf)
}

/// Signs a personal message. Serialize the result with [`Signature::as_bytes`] for the 27/28
/// `v` form expected by `ecrecover`.
pub fn sign_message(message: impl AsRef<[u8]>, key: &PrivateKey) -> Result<Signature> {
    let hash = hash_message(message);
    trace!(%hash, signer = %key.address(), "Signing personal message");
    key.sign_digest(&hash)
}

/// Recovers the signer of a personal message.
pub fn recover_message_signer(message: impl AsRef<[u8]>, signature: &Signature) -> Result<Address> {
    signature.recover_address_from_prehash(&hash_message(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{b256, uint};

    #[test]
    fn test_hash_message() {
        assert_eq!(
            hash_message("Login to app.xyz"),
            b256!("9ebab044560303562376f745e565c97c0995cba432397d082cf3260c5e1d6f78")
        );
    }

    #[test]
    fn test_sign_and_recover_message() {
        let key = PrivateKey::from_slice(&[0x46; 32]).unwrap();
        let signature = sign_message("Login to app.xyz", &key).unwrap();

        assert_eq!(signature.as_bytes()[64], 28);
        assert_eq!(
            signature.r(),
            uint!(0x13ccac0998ce6946c5ce22c4f1bfcd28c11f27f7a3660948ae0c9aa697031653_U256)
        );
        assert_eq!(
            signature.s(),
            uint!(0x1697754af4ee695ff87f5f2eff48dce0579fcd6121a71e4cd24c7ff0e929126a_U256)
        );
        assert_eq!(recover_message_signer("Login to app.xyz", &signature).unwrap(), key.address());
        assert_ne!(recover_message_signer("Login to app.xyz!", &signature).unwrap(), key.address());

        let raw = signature.as_bytes();
        assert_eq!(Signature::from_raw(&raw).unwrap(), signature);
    }
}
