//! Canonical encoding and signing of Ethereum transactions.
//!
//! The crate covers the five transaction envelopes (legacy, EIP-2930, EIP-1559, EIP-4844 and
//! EIP-7702), EIP-7702 delegation authorizations, EIP-712 typed data and EIP-191 personal
//! messages. Everything that talks to a node (nonces, fee history, broadcast) is modelled as a
//! trait in [`provider`] and implemented by the embedding application.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod constants;

mod error;
pub use error::*;

mod signature;
pub use signature::*;

mod transaction;
pub use transaction::*;

mod authorization;
pub use authorization::*;

mod fee;
pub use fee::*;

mod kzg;
pub use kzg::*;

pub mod typed_data;
pub use typed_data::{recover_typed_data_signer, sign_typed_data, signing_digest, TypedData};

mod message;
pub use message::*;

mod request;
pub use request::*;

pub mod provider;

mod config;
pub use config::*;

pub use alloy_primitives;
