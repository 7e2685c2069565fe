//! Interfaces to the outside world: keys, chain state and broadcast.
//!
//! The crate never talks to a node itself. An embedding application implements these traits
//! (typically over JSON-RPC) and the helpers here drive them to prepare, sign and send.

use core::fmt::{Debug, Display};

use alloy_primitives::{Address, Bytes, B256, U256};
use auto_impl::auto_impl;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    constants::fee::FEE_HISTORY_BLOCKS, BlobSidecar, FeePolicy, PrivateKey, Result,
    SignedTransaction, SignerError, Transaction, TransactionRequest, TxDynamicFee, TxType,
};

/// Source of signing keys.
#[auto_impl(&, Box, Arc)]
pub trait KeyProvider: Debug + Send + Sync {
    /// The error type for the provider.
    type Error: Display;

    /// Gets the key of `account`. The key is borrowed for the duration of a signing call and
    /// never retained.
    ///
    /// # Arguments
    ///
    /// * `account` - Provider specific account reference, e.g. a keystore name or an address
    fn signing_key(&self, account: &str) -> core::result::Result<&PrivateKey, Self::Error>;
}

/// Read access to the chain state a transaction is prepared against.
#[auto_impl(&, Box, Arc)]
pub trait ChainStateProvider: Debug + Send + Sync {
    /// The error type for the provider.
    type Error: Display;

    /// Gets the next nonce of `address`, including pending transactions.
    fn pending_nonce(&self, address: Address) -> core::result::Result<u64, Self::Error>;

    /// Gets the base fees of the last `blocks` blocks, oldest first.
    fn base_fee_history(&self, blocks: u64) -> core::result::Result<Vec<u128>, Self::Error>;

    /// Gets the priority fee the node suggests.
    fn suggested_tip(&self) -> core::result::Result<u128, Self::Error>;

    /// Estimates the gas `request` would use when sent from `from`.
    fn estimate_gas(
        &self,
        from: Address,
        request: &TransactionRequest,
    ) -> core::result::Result<u64, Self::Error>;
}

/// Outcome of an included transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    /// Hash of the transaction
    pub transaction_hash: B256,
    /// Block the transaction was included in
    #[serde(with = "alloy_serde::quantity")]
    pub block_number: u64,
    /// Gas used by the transaction
    #[serde(with = "alloy_serde::quantity")]
    pub gas_used: u64,
    /// 1 on success, 0 on revert
    #[serde(with = "alloy_serde::quantity")]
    pub status: u64,
}

impl TransactionReceipt {
    /// Whether execution succeeded.
    pub const fn is_success(&self) -> bool {
        self.status == 1
    }
}

/// Submits raw transactions.
#[auto_impl(&, Box, Arc)]
pub trait Broadcaster: Debug + Send + Sync {
    /// The error type for the broadcaster.
    type Error: Display;

    /// Submits the network encoding of a signed transaction and returns its hash.
    fn send(&self, raw: &Bytes) -> core::result::Result<B256, Self::Error>;

    /// Gets the receipt of `hash`, or `None` while it is pending.
    fn receipt(&self, hash: B256) -> core::result::Result<Option<TransactionReceipt>, Self::Error>;
}

/// ABI encoding of contract calls.
#[auto_impl(&, Box, Arc)]
pub trait CallEncoder: Debug + Send + Sync {
    /// The error type for the encoder.
    type Error: Display;

    /// Encodes a call to `signature` (e.g. `transfer(address,uint256)`) with JSON arguments.
    fn encode_call(
        &self,
        signature: &str,
        args: &[Value],
    ) -> core::result::Result<Bytes, Self::Error>;
}

/// Completes `request` as a dynamic fee transaction from `from`.
///
/// The nonce always comes from the provider. Fee caps and the gas limit are only queried when
/// the request leaves them out; the fee cap is derived from the latest base fee with `policy`.
pub fn prepare_dynamic_fee<P: ChainStateProvider>(
    provider: &P,
    policy: &FeePolicy,
    from: Address,
    mut request: TransactionRequest,
) -> Result<TxDynamicFee> {
    request.tx_type = Some(TxType::DynamicFee.into());
    request.nonce =
        provider.pending_nonce(from).map_err(|e| SignerError::provider("pending_nonce", e))?;

    if request.max_fee_per_gas.is_none() {
        let tip = match request.max_priority_fee_per_gas {
            Some(tip) => u128::try_from(tip).map_err(|_| {
                SignerError::invalid_field("maxPriorityFeePerGas", "exceeds 128 bits")
            })?,
            None => {
                provider.suggested_tip().map_err(|e| SignerError::provider("suggested_tip", e))?
            }
        };
        let history = provider
            .base_fee_history(FEE_HISTORY_BLOCKS)
            .map_err(|e| SignerError::provider("base_fee_history", e))?;
        let caps = policy.compute_fee_cap(&history, tip)?;
        request.max_priority_fee_per_gas = Some(U256::from(caps.max_priority_fee_per_gas));
        request.max_fee_per_gas = Some(U256::from(caps.max_fee_per_gas));
    } else if request.max_priority_fee_per_gas.is_none() {
        let tip = provider.suggested_tip().map_err(|e| SignerError::provider("suggested_tip", e))?;
        request.max_priority_fee_per_gas = Some(U256::from(tip));
    }

    if request.gas.is_none() {
        let gas = provider
            .estimate_gas(from, &request)
            .map_err(|e| SignerError::provider("estimate_gas", e))?;
        request.gas = Some(gas);
    }

    match request.into_transaction()? {
        Transaction::DynamicFee(tx) => {
            debug!(
                %from,
                nonce = tx.nonce,
                gas_limit = tx.gas_limit,
                max_fee_per_gas = tx.max_fee_per_gas,
                max_priority_fee_per_gas = tx.max_priority_fee_per_gas,
                "Prepared dynamic fee transaction"
            );
            Ok(tx)
        }
        other => Err(SignerError::invalid_field(
            "type",
            format!("expected an eip1559 transaction, got {}", other.tx_type()),
        )),
    }
}

/// Hands a signed transaction to `broadcaster`. Blob transactions need their sidecar and are
/// sent in network form.
pub fn broadcast<B: Broadcaster>(
    broadcaster: &B,
    signed: &SignedTransaction,
    sidecar: Option<&BlobSidecar>,
) -> Result<B256> {
    let raw = match (signed.tx_type(), sidecar) {
        (TxType::Blob, Some(sidecar)) => Bytes::from(signed.encode_network(sidecar)?),
        (TxType::Blob, None) => return Err(SignerError::MissingField("sidecar")),
        (_, Some(_)) => {
            return Err(SignerError::invalid_field(
                "sidecar",
                format!("{} transactions do not carry a sidecar", signed.tx_type()),
            ))
        }
        (_, None) => signed.encoded().clone(),
    };

    let hash = broadcaster.send(&raw).map_err(|e| SignerError::provider("send", e))?;
    if hash != signed.hash() {
        warn!(expected = %signed.hash(), reported = %hash, "Broadcaster reported a different hash");
    }
    debug!(%hash, tx_type = %signed.tx_type(), bytes = raw.len(), "Broadcast transaction");
    Ok(hash)
}

/// Prepares `request` for `account`, signs it and broadcasts it.
pub fn send_signed<K, P, B>(
    keys: &K,
    provider: &P,
    broadcaster: &B,
    policy: &FeePolicy,
    account: &str,
    request: TransactionRequest,
) -> Result<SignedTransaction>
where
    K: KeyProvider,
    P: ChainStateProvider,
    B: Broadcaster,
{
    let key = keys.signing_key(account).map_err(|e| SignerError::provider("signing_key", e))?;
    let tx = prepare_dynamic_fee(provider, policy, key.address(), request)?;
    let signed = Transaction::DynamicFee(tx).sign(key)?;
    broadcast(broadcaster, &signed, None)?;
    Ok(signed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, SignerConfig};
    use alloy_primitives::{address, b256, hex};
    use std::{collections::HashMap, sync::Mutex};

    #[derive(Debug)]
    struct MockKeys(HashMap<String, PrivateKey>);

    impl KeyProvider for MockKeys {
        type Error = String;

        fn signing_key(&self, account: &str) -> core::result::Result<&PrivateKey, String> {
            self.0.get(account).ok_or_else(|| format!("unknown account {account}"))
        }
    }

    #[derive(Debug, Default)]
    struct MockChain {
        estimated: Mutex<Vec<TransactionRequest>>,
    }

    impl ChainStateProvider for MockChain {
        type Error = String;

        fn pending_nonce(&self, _address: Address) -> core::result::Result<u64, String> {
            Ok(1)
        }

        fn base_fee_history(&self, blocks: u64) -> core::result::Result<Vec<u128>, String> {
            assert_eq!(blocks, FEE_HISTORY_BLOCKS);
            Ok(vec![100, 110, 120])
        }

        fn suggested_tip(&self) -> core::result::Result<u128, String> {
            Ok(5)
        }

        fn estimate_gas(
            &self,
            _from: Address,
            request: &TransactionRequest,
        ) -> core::result::Result<u64, String> {
            self.estimated.lock().unwrap().push(request.clone());
            Ok(21_000)
        }
    }

    #[derive(Debug, Default)]
    struct MockBroadcaster {
        sent: Mutex<Vec<Bytes>>,
    }

    impl Broadcaster for MockBroadcaster {
        type Error = String;

        fn send(&self, raw: &Bytes) -> core::result::Result<B256, String> {
            self.sent.lock().unwrap().push(raw.clone());
            Ok(crate::digest(raw))
        }

        fn receipt(&self, _hash: B256) -> core::result::Result<Option<TransactionReceipt>, String> {
            Ok(None)
        }
    }

    #[derive(Debug)]
    struct FailingChain;

    impl ChainStateProvider for FailingChain {
        type Error = &'static str;

        fn pending_nonce(&self, _address: Address) -> core::result::Result<u64, &'static str> {
            Err("connection refused")
        }

        fn base_fee_history(&self, _blocks: u64) -> core::result::Result<Vec<u128>, &'static str> {
            unreachable!()
        }

        fn suggested_tip(&self) -> core::result::Result<u128, &'static str> {
            unreachable!()
        }

        fn estimate_gas(
            &self,
            _from: Address,
            _request: &TransactionRequest,
        ) -> core::result::Result<u64, &'static str> {
            unreachable!()
        }
    }

    fn transfer() -> TransactionRequest {
        TransactionRequest {
            chain_id: Some(U256::from(1)),
            to: Some(address!("3535353535353535353535353535353535353535")),
            value: U256::from(1_000_000_000_000_000u64),
            ..Default::default()
        }
    }

    #[test]
    fn test_prepare_fills_nonce_fees_and_gas() {
        let chain = MockChain::default();
        let tx = prepare_dynamic_fee(&chain, &FeePolicy::default(), Address::ZERO, transfer())
            .unwrap();

        assert_eq!(tx.nonce, 1);
        assert_eq!(tx.max_priority_fee_per_gas, 5);
        assert_eq!(tx.max_fee_per_gas, 139);
        assert_eq!(tx.gas_limit, 21_000);

        let estimated = chain.estimated.lock().unwrap();
        assert_eq!(estimated.len(), 1);
        assert_eq!(estimated[0].max_fee_per_gas, Some(U256::from(139)));
    }

    #[test]
    fn test_prepare_keeps_explicit_values() {
        let chain = MockChain::default();
        let request = TransactionRequest {
            max_priority_fee_per_gas: Some(U256::from(2)),
            gas: Some(50_000),
            ..transfer()
        };
        let config = SignerConfig::from_json_str(
            r#"{"fee":{"headroomNumerator":2,"headroomDenominator":1}}"#,
        )
        .unwrap();
        let tx = prepare_dynamic_fee(&chain, &config.fee, Address::ZERO, request).unwrap();

        assert_eq!(tx.max_priority_fee_per_gas, 2);
        assert_eq!(tx.max_fee_per_gas, 242);
        assert_eq!(tx.gas_limit, 50_000);
        assert!(chain.estimated.lock().unwrap().is_empty());
    }

    #[test]
    fn test_send_signed() {
        let key = PrivateKey::from_slice(&[0x46; 32]).unwrap();
        let keys = MockKeys(HashMap::from([("alice".to_string(), key)]));
        let chain = MockChain::default();
        let broadcaster = MockBroadcaster::default();

        let signed =
            send_signed(&keys, &chain, &broadcaster, &FeePolicy::default(), "alice", transfer())
                .unwrap();

        assert_eq!(
            signed.hash(),
            b256!("9d89bd1be24ef2bc2ad50c7edef944ff5323f9966a9d92ac6d5a769fb29a4f2b")
        );
        let sent = broadcaster.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].as_ref(),
            hex!("02f86a010105818b82520894353535353535353535353535353535353535353587038d7ea4c6800080c080a0f886d98bec23fceb1df01dce508126480d821a95c051a62baa8b7d9f43397308a069d3e6fe6fab32121922564a87b059927bee1fcf8b96a181ca21ed2cb66e5915")
        );
    }

    #[test]
    fn test_provider_errors_name_the_call() {
        let err =
            prepare_dynamic_fee(&FailingChain, &FeePolicy::default(), Address::ZERO, transfer())
                .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provider);
        assert_eq!(err.to_string(), "provider call `pending_nonce` failed: connection refused");

        let keys = MockKeys(HashMap::new());
        let err = send_signed(
            &keys,
            &MockChain::default(),
            &MockBroadcaster::default(),
            &FeePolicy::default(),
            "bob",
            transfer(),
        )
        .unwrap_err();
        assert!(matches!(err, SignerError::Provider { operation: "signing_key", .. }));
    }

    #[test]
    fn test_broadcast_requires_sidecar_for_blobs_only() {
        let key = PrivateKey::from_slice(&[0x46; 32]).unwrap();
        let chain = MockChain::default();
        let tx =
            prepare_dynamic_fee(&chain, &FeePolicy::default(), key.address(), transfer()).unwrap();
        let signed = Transaction::DynamicFee(tx).sign(&key).unwrap();
        let broadcaster = MockBroadcaster::default();

        assert_eq!(broadcast(&broadcaster, &signed, None).unwrap(), signed.hash());
        let sidecar = BlobSidecar::default();
        assert!(matches!(
            broadcast(&broadcaster, &signed, Some(&sidecar)),
            Err(SignerError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_receipt_json() {
        let receipt: TransactionReceipt = serde_json::from_str(
            r#"{
                "transactionHash": "0x9d89bd1be24ef2bc2ad50c7edef944ff5323f9966a9d92ac6d5a769fb29a4f2b",
                "blockNumber": "0x10",
                "gasUsed": "0x5208",
                "status": "0x1"
            }"#,
        )
        .unwrap();
        assert!(receipt.is_success());
        assert_eq!(receipt.gas_used, 21_000);
    }
}
