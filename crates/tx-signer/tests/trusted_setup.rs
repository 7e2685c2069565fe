//! The process-wide trusted setup.
//!
//! Kept in its own test binary: nothing else in this process may load the setup first.

use tx_signer::{
    blob_from, commit, versioned_hash, ErrorKind, SignerError, TrustedSetup, TrustedSetupSource,
};

#[test]
fn test_global_setup_requires_init() {
    let err = TrustedSetup::global().unwrap_err();
    assert!(matches!(err, SignerError::TrustedSetupNotLoaded));
    assert_eq!(err.kind(), ErrorKind::CryptoPrecondition);

    let loaded = TrustedSetup::init(&TrustedSetupSource::Ethereum).unwrap();
    let global = TrustedSetup::global().unwrap();

    let blob = blob_from(b"\x00batch").unwrap();
    let commitment = commit(&global, &blob).unwrap();
    assert_eq!(commitment, commit(&loaded, &blob).unwrap());
    assert_eq!(versioned_hash(&commitment)[0], 0x01);
}
