//! Protocol constants used by the encoders and signers.
//!
//! Grouped by the EIP that defines them.

/// Constants for legacy transactions and replay protection.
pub mod legacy {
    /// Offset added to the y-parity for unprotected (pre-EIP-155) signatures.
    pub const LEGACY_V_OFFSET: u64 = 27;
    /// Offset added to `2 * chain_id + y_parity` for EIP-155 replay-protected signatures.
    pub const EIP155_V_OFFSET: u64 = 35;
}

/// EIP-2718 type bytes.
pub mod tx_type {
    /// EIP-2930 access list transaction.
    pub const ACCESS_LIST: u8 = 0x01;
    /// EIP-1559 dynamic fee transaction.
    pub const DYNAMIC_FEE: u8 = 0x02;
    /// EIP-4844 blob transaction.
    pub const BLOB: u8 = 0x03;
    /// EIP-7702 set code transaction.
    pub const SET_CODE: u8 = 0x04;
}

/// Constants for EIP-4844 blobs.
pub mod eip4844 {
    /// Number of field elements in a blob.
    pub const FIELD_ELEMENTS_PER_BLOB: usize = 4096;
    /// Size of a single field element.
    pub const BYTES_PER_FIELD_ELEMENT: usize = 32;
    /// Capacity of a blob in bytes.
    pub const BYTES_PER_BLOB: usize = FIELD_ELEMENTS_PER_BLOB * BYTES_PER_FIELD_ELEMENT;
    /// Size of a KZG commitment.
    pub const BYTES_PER_COMMITMENT: usize = 48;
    /// Size of a KZG proof.
    pub const BYTES_PER_PROOF: usize = 48;
    /// Version byte of versioned hashes derived from KZG commitments.
    pub const VERSIONED_HASH_VERSION_KZG: u8 = 0x01;
    /// Maximum number of blobs a single transaction may carry.
    pub const MAX_BLOBS_PER_TX: usize = 6;
}

/// Constants for EIP-7702 authorizations.
pub mod eip7702 {
    /// Magic byte prepended to the RLP of an authorization tuple before hashing.
    pub const MAGIC: u8 = 0x05;
}

/// Constants for off-chain message signing.
pub mod messages {
    /// EIP-712 prefix (`0x19 0x01`) of the typed data signing digest.
    pub const EIP712_PREFIX: [u8; 2] = [0x19, 0x01];
    /// Name of the implicit EIP-712 domain type.
    pub const EIP712_DOMAIN_TYPE: &str = "EIP712Domain";
    /// EIP-191 prefix of personal messages.
    pub const EIP191_PREFIX: &str = "\x19Ethereum Signed Message:\n";
}

/// Defaults of the fee policy.
pub mod fee {
    /// Numerator of the default base fee headroom (112%).
    pub const DEFAULT_HEADROOM_NUMERATOR: u128 = 112;
    /// Denominator of the default base fee headroom.
    pub const DEFAULT_HEADROOM_DENOMINATOR: u128 = 100;
    /// Number of recent blocks requested from the fee history.
    pub const FEE_HISTORY_BLOCKS: u64 = 5;
}
