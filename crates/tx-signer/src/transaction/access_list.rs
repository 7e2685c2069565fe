use alloy_primitives::{Address, B256};
use alloy_rlp::{RlpDecodable, RlpDecodableWrapper, RlpEncodable, RlpEncodableWrapper};
use serde::{Deserialize, Serialize};

/// A single access list entry: an address and the storage slots pre-warmed for it.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, RlpEncodable, RlpDecodable, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct AccessListItem {
    /// Account address
    pub address: Address,
    /// Storage keys, in order
    pub storage_keys: Vec<B256>,
}

/// An EIP-2930 access list. Entry order and key order are preserved on the wire.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    Hash,
    RlpEncodableWrapper,
    RlpDecodableWrapper,
    Serialize,
    Deserialize,
    derive_more::Deref,
    derive_more::From,
)]
#[serde(transparent)]
pub struct AccessList(pub Vec<AccessListItem>);

impl AccessList {
    /// Total number of storage keys across all entries.
    pub fn storage_key_count(&self) -> usize {
        self.0.iter().map(|item| item.storage_keys.len()).sum()
    }
}

impl FromIterator<AccessListItem> for AccessList {
    fn from_iter<I: IntoIterator<Item = AccessListItem>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
