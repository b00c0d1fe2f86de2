//! L1 action signing.
//!
//! An action is hashed as `keccak256(msgpack(action) || nonce || vault flag)`.
//! That hash becomes the `connectionId` of a phantom `Agent` struct which is
//! signed with EIP-712 under the fixed "Exchange" domain.

use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use anyhow::{Context, Result};

use super::types::{ExchangeAction, SignatureWire};

/// Chain id of the signing domain. Fixed regardless of network.
const SIGNING_CHAIN_ID: u64 = 1337;

/// Hash of an action, nonce and optional vault address.
pub fn action_hash(action: &ExchangeAction, nonce: u64, vault_address: Option<Address>) -> Result<B256> {
    let mut data = rmp_serde::to_vec_named(action).context("Failed to encode action")?;
    data.extend_from_slice(&nonce.to_be_bytes());

    match vault_address {
        Some(vault) => {
            data.push(1);
            data.extend_from_slice(vault.as_slice());
        }
        None => data.push(0),
    }

    Ok(keccak256(&data))
}

/// EIP-712 digest of the phantom agent for `connection_id`.
pub fn agent_digest(connection_id: B256, is_mainnet: bool) -> B256 {
    let source = if is_mainnet { "a" } else { "b" };

    let type_hash = keccak256(b"Agent(string source,bytes32 connectionId)");
    let mut encoded = Vec::with_capacity(96);
    encoded.extend_from_slice(type_hash.as_slice());
    encoded.extend_from_slice(keccak256(source.as_bytes()).as_slice());
    encoded.extend_from_slice(connection_id.as_slice());
    let struct_hash = keccak256(&encoded);

    let mut message = Vec::with_capacity(66);
    message.extend_from_slice(&[0x19, 0x01]);
    message.extend_from_slice(domain_separator().as_slice());
    message.extend_from_slice(struct_hash.as_slice());

    keccak256(&message)
}

/// Domain separator for `{name: "Exchange", version: "1", chainId: 1337, verifyingContract: 0x0}`.
fn domain_separator() -> B256 {
    let type_hash = keccak256(
        b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)",
    );

    let mut encoded = Vec::with_capacity(160);
    encoded.extend_from_slice(type_hash.as_slice());
    encoded.extend_from_slice(keccak256(b"Exchange").as_slice());
    encoded.extend_from_slice(keccak256(b"1").as_slice());
    encoded.extend_from_slice(&U256::from(SIGNING_CHAIN_ID).to_be_bytes::<32>());
    encoded.extend_from_slice(&encode_address(Address::ZERO));

    keccak256(&encoded)
}

fn encode_address(addr: Address) -> [u8; 32] {
    let mut buf = [0u8; 32];
    buf[12..].copy_from_slice(addr.as_slice());
    buf
}

/// Sign an action for submission to `/exchange`.
pub async fn sign_l1_action(
    signer: &PrivateKeySigner,
    action: &ExchangeAction,
    nonce: u64,
    is_mainnet: bool,
) -> Result<SignatureWire> {
    let connection_id = action_hash(action, nonce, None)?;
    let digest = agent_digest(connection_id, is_mainnet);

    let signature = signer
        .sign_hash(&digest)
        .await
        .context("Failed to sign action")?;

    let bytes = signature.as_bytes();
    let v = if bytes[64] < 27 { bytes[64] + 27 } else { bytes[64] };

    Ok(SignatureWire {
        r: format!("0x{}", hex::encode(&bytes[..32])),
        s: format!("0x{}", hex::encode(&bytes[32..64])),
        v,
    })
}
