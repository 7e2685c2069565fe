//! EIP-4844 blobs, KZG commitments and proofs.

use core::fmt;

use alloy_primitives::{FixedBytes, B256};
use alloy_rlp::{BufMut, Decodable, Encodable, Header};
use c_kzg::{Bytes48, KzgCommitment, KzgProof, KzgSettings};
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::{
    constants::eip4844::{
        BYTES_PER_BLOB, BYTES_PER_COMMITMENT, BYTES_PER_PROOF, MAX_BLOBS_PER_TX,
        VERSIONED_HASH_VERSION_KZG,
    },
    Result, SignerError, TrustedSetupSource,
};

/// A KZG commitment to a blob.
pub type Commitment = FixedBytes<BYTES_PER_COMMITMENT>;

/// A KZG proof that a blob matches its commitment.
pub type Proof = FixedBytes<BYTES_PER_PROOF>;

/// The process-wide trusted setup, together with the source it was loaded from.
static TRUSTED_SETUP: OnceCell<(TrustedSetupSource, LoadedSettings)> = OnceCell::new();

enum LoadedSettings {
    Embedded(&'static KzgSettings),
    File(KzgSettings),
}

impl LoadedSettings {
    const fn get(&self) -> &KzgSettings {
        match self {
            Self::Embedded(settings) => settings,
            Self::File(settings) => settings,
        }
    }
}

/// Handle to loaded KZG trusted setup parameters.
///
/// The parameters are immutable and shared read-only, so the handle is `Copy` and can be passed
/// to any number of threads.
#[derive(Clone, Copy)]
pub struct TrustedSetup {
    settings: &'static KzgSettings,
}

impl fmt::Debug for TrustedSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustedSetup").finish_non_exhaustive()
    }
}

impl TrustedSetup {
    /// The mainnet ceremony output embedded in the binary.
    pub fn ethereum() -> Self {
        Self { settings: c_kzg::ethereum_kzg_settings() }
    }

    /// Loads the process-wide trusted setup from `source`.
    ///
    /// Exactly one load happens per process. Calling this again with the same source returns the
    /// existing handle; a different source is rejected.
    pub fn init(source: &TrustedSetupSource) -> Result<Self> {
        let (loaded_from, settings) = TRUSTED_SETUP.get_or_try_init(|| {
            let settings = match source {
                TrustedSetupSource::Ethereum => {
                    LoadedSettings::Embedded(c_kzg::ethereum_kzg_settings())
                }
                TrustedSetupSource::File { path } => {
                    debug!(path = %path.display(), "Loading KZG trusted setup");
                    LoadedSettings::File(
                        KzgSettings::load_trusted_setup_file(path)
                            .map_err(|err| SignerError::kzg("setup", err))?,
                    )
                }
            };
            Ok::<_, SignerError>((source.clone(), settings))
        })?;

        if loaded_from != source {
            return Err(SignerError::TrustedSetupAlreadyLoaded);
        }
        Ok(Self { settings: settings.get() })
    }

    /// Returns the process-wide trusted setup loaded by [`TrustedSetup::init`].
    pub fn global() -> Result<Self> {
        TRUSTED_SETUP
            .get()
            .map(|(_, settings)| Self { settings: settings.get() })
            .ok_or(SignerError::TrustedSetupNotLoaded)
    }

    const fn settings(&self) -> &KzgSettings {
        self.settings
    }
}

/// A blob of [`BYTES_PER_BLOB`] bytes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Blob(Box<[u8; BYTES_PER_BLOB]>);

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let used = self.0.iter().rposition(|byte| *byte != 0).map_or(0, |pos| pos + 1);
        f.debug_struct("Blob").field("used", &used).finish_non_exhaustive()
    }
}

impl Blob {
    /// The raw blob bytes.
    pub fn as_bytes(&self) -> &[u8; BYTES_PER_BLOB] {
        &self.0
    }

    fn from_vec(bytes: Vec<u8>) -> Result<Self> {
        let len = bytes.len();
        let boxed: Box<[u8; BYTES_PER_BLOB]> =
            bytes.into_boxed_slice().try_into().map_err(|_| {
                SignerError::invalid_field(
                    "blob",
                    format!("expected {BYTES_PER_BLOB} bytes, got {len}"),
                )
            })?;
        Ok(Self(boxed))
    }

    fn to_c_kzg(&self) -> Result<c_kzg::Blob> {
        c_kzg::Blob::from_bytes(self.0.as_slice()).map_err(|err| SignerError::kzg("blob", err))
    }
}

impl Encodable for Blob {
    fn encode(&self, out: &mut dyn BufMut) {
        self.0.as_slice().encode(out);
    }

    fn length(&self) -> usize {
        self.0.as_slice().length()
    }
}

impl Decodable for Blob {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let bytes = Header::decode_bytes(buf, false)?;
        if bytes.len() != BYTES_PER_BLOB {
            return Err(alloy_rlp::Error::UnexpectedLength);
        }
        Self::from_vec(bytes.to_vec()).map_err(|_| alloy_rlp::Error::UnexpectedLength)
    }
}

/// Copies `content` into a zero-padded blob.
pub fn blob_from(content: &[u8]) -> Result<Blob> {
    if content.len() > BYTES_PER_BLOB {
        return Err(SignerError::CapacityExceeded {
            what: "blob content",
            len: content.len(),
            capacity: BYTES_PER_BLOB,
        });
    }
    let mut bytes = vec![0u8; BYTES_PER_BLOB];
    bytes[..content.len()].copy_from_slice(content);
    trace!(len = content.len(), "Packed blob");
    Blob::from_vec(bytes)
}

/// Computes the KZG commitment of `blob`.
///
/// Fails when a 32-byte chunk of the blob is not a canonical field element.
pub fn commit(setup: &TrustedSetup, blob: &Blob) -> Result<Commitment> {
    let commitment = KzgCommitment::blob_to_kzg_commitment(&blob.to_c_kzg()?, setup.settings())
        .map_err(|err| SignerError::kzg("commit", err))?;
    Ok(Commitment::from_slice(commitment.to_bytes().as_slice()))
}

/// Computes the proof that `blob` matches `commitment`.
pub fn prove(setup: &TrustedSetup, blob: &Blob, commitment: &Commitment) -> Result<Proof> {
    let commitment = to_bytes48(commitment, "prove")?;
    let proof = KzgProof::compute_blob_kzg_proof(&blob.to_c_kzg()?, &commitment, setup.settings())
        .map_err(|err| SignerError::kzg("prove", err))?;
    Ok(Proof::from_slice(proof.to_bytes().as_slice()))
}

/// Checks `proof` against `blob` and `commitment`.
pub fn verify_blob_proof(
    setup: &TrustedSetup,
    blob: &Blob,
    commitment: &Commitment,
    proof: &Proof,
) -> Result<bool> {
    KzgProof::verify_blob_kzg_proof(
        &blob.to_c_kzg()?,
        &to_bytes48(commitment, "verify")?,
        &to_bytes48(proof, "verify")?,
        setup.settings(),
    )
    .map_err(|err| SignerError::kzg("verify", err))
}

/// `0x01 ‖ sha256(commitment)[1..]`.
pub fn versioned_hash(commitment: &Commitment) -> B256 {
    let mut hash: [u8; 32] = Sha256::digest(commitment.as_slice()).into();
    hash[0] = VERSIONED_HASH_VERSION_KZG;
    B256::from(hash)
}

fn to_bytes48(bytes: &FixedBytes<48>, stage: &'static str) -> Result<Bytes48> {
    Bytes48::from_bytes(bytes.as_slice()).map_err(|err| SignerError::kzg(stage, err))
}

/// Blobs, commitments and proofs that travel with a blob transaction but are not signed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BlobSidecar {
    /// Blobs
    pub blobs: Vec<Blob>,
    /// Commitment of each blob
    pub commitments: Vec<Commitment>,
    /// Proof of each blob
    pub proofs: Vec<Proof>,
}

impl BlobSidecar {
    /// Packs each payload into its own blob and computes commitments and proofs.
    pub fn from_contents<I, T>(setup: &TrustedSetup, contents: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut sidecar = Self::default();
        for content in contents {
            let blob = blob_from(content.as_ref())?;
            let commitment = commit(setup, &blob)?;
            let proof = prove(setup, &blob, &commitment)?;
            sidecar.blobs.push(blob);
            sidecar.commitments.push(commitment);
            sidecar.proofs.push(proof);
        }
        check_blob_count(sidecar.blobs.len())?;
        debug!(blobs = sidecar.blobs.len(), "Built blob sidecar");
        Ok(sidecar)
    }

    /// Number of blobs.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Whether the sidecar carries no blobs.
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Versioned hash of each commitment, in order.
    pub fn versioned_hashes(&self) -> Vec<B256> {
        self.commitments.iter().map(versioned_hash).collect()
    }

    /// Checks that the sidecar is complete and that `hashes[i]` derives from `commitments[i]`.
    pub fn validate(&self, hashes: &[B256]) -> Result<()> {
        let count = self.blobs.len();
        if self.commitments.len() != count || self.proofs.len() != count {
            return Err(SignerError::invalid_field(
                "sidecar",
                format!(
                    "{count} blobs, {} commitments and {} proofs",
                    self.commitments.len(),
                    self.proofs.len()
                ),
            ));
        }
        if hashes.len() != count {
            return Err(SignerError::invalid_field(
                "blobVersionedHashes",
                format!("{} hashes for {count} blobs", hashes.len()),
            ));
        }
        for (index, (hash, commitment)) in hashes.iter().zip(&self.commitments).enumerate() {
            if *hash != versioned_hash(commitment) {
                return Err(SignerError::invalid_field(
                    format!("blobVersionedHashes[{index}]"),
                    "does not match the sidecar commitment",
                ));
            }
        }
        Ok(())
    }

    /// Verifies every proof against its blob and commitment.
    pub fn verify(&self, setup: &TrustedSetup) -> Result<()> {
        for (index, ((blob, commitment), proof)) in
            self.blobs.iter().zip(&self.commitments).zip(&self.proofs).enumerate()
        {
            if !verify_blob_proof(setup, blob, commitment, proof)? {
                return Err(SignerError::Kzg {
                    stage: "verify",
                    reason: format!("proof {index} does not match its blob"),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn fields_len(&self) -> usize {
        self.blobs.length() + self.commitments.length() + self.proofs.length()
    }

    pub(crate) fn encode_fields(&self, out: &mut dyn BufMut) {
        self.blobs.encode(out);
        self.commitments.encode(out);
        self.proofs.encode(out);
    }

    pub(crate) fn decode_fields(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        Ok(Self {
            blobs: Decodable::decode(buf)?,
            commitments: Decodable::decode(buf)?,
            proofs: Decodable::decode(buf)?,
        })
    }
}

/// Checks that a transaction carries between one and [`MAX_BLOBS_PER_TX`] blobs.
pub(crate) fn check_blob_count(count: usize) -> Result<()> {
    if count == 0 || count > MAX_BLOBS_PER_TX {
        return Err(SignerError::invalid_field(
            "blobVersionedHashes",
            format!("expected 1 to {MAX_BLOBS_PER_TX} blobs, got {count}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use alloy_primitives::b256;

    #[test]
    fn test_blob_is_zero_padded() {
        let content = [0x2au8; 100];
        let blob = blob_from(&content).unwrap();

        assert_eq!(&blob.as_bytes()[..100], &content[..]);
        assert!(blob.as_bytes()[100..].iter().all(|byte| *byte == 0));
        assert_eq!(blob, blob_from(&content).unwrap());
    }

    #[test]
    fn test_full_blob_fits_and_oversize_overflows() {
        assert!(blob_from(&vec![0u8; BYTES_PER_BLOB]).is_ok());

        let err = blob_from(&vec![0u8; BYTES_PER_BLOB + 1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EncodingOverflow);
    }

    #[test]
    fn test_empty_blob_commitment_and_versioned_hash() {
        let setup = TrustedSetup::ethereum();
        let commitment = commit(&setup, &blob_from(&[]).unwrap()).unwrap();

        let mut infinity = [0u8; 48];
        infinity[0] = 0xc0;
        assert_eq!(commitment, Commitment::from(infinity));
        assert_eq!(
            versioned_hash(&commitment),
            b256!("010657f37554c781402a22917dee2f75def7ab966d7b770905398eba3c444014")
        );
    }

    #[test]
    fn test_commit_prove_verify() {
        let setup = TrustedSetup::ethereum();
        let blob = blob_from(b"\x00hello blobs").unwrap();
        let commitment = commit(&setup, &blob).unwrap();
        let proof = prove(&setup, &blob, &commitment).unwrap();

        assert_eq!(commit(&setup, &blob).unwrap(), commitment);
        assert!(verify_blob_proof(&setup, &blob, &commitment, &proof).unwrap());

        let other = blob_from(b"\x00other").unwrap();
        assert!(!verify_blob_proof(&setup, &other, &commitment, &proof).unwrap());
    }

    #[test]
    fn test_non_canonical_field_element_fails_at_commit() {
        let setup = TrustedSetup::ethereum();
        let blob = blob_from(&[0xff; 32]).unwrap();

        let err = commit(&setup, &blob).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CryptoPrecondition);
    }

    #[test]
    fn test_sidecar_from_contents() {
        let setup = TrustedSetup::ethereum();
        let sidecar = BlobSidecar::from_contents(&setup, [&b"\x00first"[..], &b"\x00second"[..]])
            .unwrap();

        assert_eq!(sidecar.len(), 2);
        let hashes = sidecar.versioned_hashes();
        assert!(sidecar.validate(&hashes).is_ok());
        assert!(sidecar.verify(&setup).is_ok());

        let swapped = [hashes[1], hashes[0]];
        assert!(sidecar.validate(&swapped).is_err());
        assert!(sidecar.validate(&hashes[..1]).is_err());
    }

    #[test]
    fn test_sidecar_blob_count_limits() {
        let setup = TrustedSetup::ethereum();
        assert!(BlobSidecar::from_contents(&setup, Vec::<Vec<u8>>::new()).is_err());
        assert!(check_blob_count(MAX_BLOBS_PER_TX).is_ok());
        assert!(check_blob_count(MAX_BLOBS_PER_TX + 1).is_err());
    }

    #[test]
    fn test_global_setup_is_loaded_once() {
        let first = TrustedSetup::init(&TrustedSetupSource::Ethereum).unwrap();
        assert!(TrustedSetup::global().is_ok());
        assert!(TrustedSetup::init(&TrustedSetupSource::Ethereum).is_ok());
        assert!(matches!(
            TrustedSetup::init(&TrustedSetupSource::File { path: "missing.txt".into() }),
            Err(SignerError::TrustedSetupAlreadyLoaded)
        ));

        let commitment = commit(&first, &blob_from(&[]).unwrap()).unwrap();
        assert_eq!(commitment[0], 0xc0);
    }
}
