//! The signing capability the engines are handed.
//!
//! Key storage is someone else's problem: all this crate needs is an address
//! and the ability to sign a 32-byte hash (EIP-712 payments) or a text message
//! (EIP-191 sign-in messages).

use alloy_primitives::{Address, B256, Signature};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use std::future::Future;
use std::sync::Arc;

/// Abstracts over owned and shared signers.
///
/// Alloy's `Signer` is not implemented for `Arc<T>`, and `PrivateKeySigner`
/// is not `Clone`-cheap, so engines are generic over this trait instead.
pub trait SignerLike: Send + Sync {
    /// The address this signer signs for.
    fn address(&self) -> Address;

    /// Signs a prehashed message (EIP-712 digests).
    fn sign_hash(
        &self,
        hash: &B256,
    ) -> impl Future<Output = Result<Signature, alloy_signer::Error>> + Send;

    /// Signs a message with the EIP-191 `personal_sign` prefix.
    fn sign_message(
        &self,
        message: &[u8],
    ) -> impl Future<Output = Result<Signature, alloy_signer::Error>> + Send;
}

impl SignerLike for PrivateKeySigner {
    fn address(&self) -> Address {
        Signer::address(self)
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Signature, alloy_signer::Error> {
        Signer::sign_hash(self, hash).await
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature, alloy_signer::Error> {
        Signer::sign_message(self, message).await
    }
}

impl<T: SignerLike> SignerLike for Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Signature, alloy_signer::Error> {
        (**self).sign_hash(hash).await
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature, alloy_signer::Error> {
        (**self).sign_message(message).await
    }
}
