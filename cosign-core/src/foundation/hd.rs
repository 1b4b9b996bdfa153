use crate::foundation::{CopayerId, CosignError, Result};
use bitcoin::bip32::{DerivationPath, Xpriv, Xpub};
use bitcoin::hashes::{sha256, sha256d, Hash};
use bitcoin::opcodes::all::OP_CHECKMULTISIG;
use bitcoin::script::Builder;
use bitcoin::ScriptBuf;
use secp256k1::ecdsa::Signature;
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey, SECP256K1};
use std::str::FromStr;

/// Process-wide signing/verification context.
pub fn secp() -> &'static Secp256k1<All> {
    SECP256K1
}

pub fn parse_xpub(value: &str) -> Result<Xpub> {
    Xpub::from_str(value.trim()).map_err(|err| CosignError::invalid_argument(format!("invalid extended public key: {}", err)))
}

pub fn parse_derivation_path(path: &str) -> Result<DerivationPath> {
    DerivationPath::from_str(path.trim()).map_err(|err| CosignError::invalid_argument(format!("invalid derivation path '{}': {}", path, err)))
}

pub fn parse_public_key(value: &str) -> Result<PublicKey> {
    let bytes = hex::decode(value.trim()).map_err(|err| CosignError::invalid_argument(format!("invalid public key: {}", err)))?;
    PublicKey::from_slice(&bytes).map_err(|err| CosignError::invalid_argument(format!("invalid public key: {}", err)))
}

/// Derives the compressed child public key of `xpub` at `path` (non-hardened steps only).
pub fn derive_child_pubkey(xpub: &Xpub, path: &str) -> Result<bitcoin::PublicKey> {
    let path = parse_derivation_path(path)?;
    let child = xpub.derive_pub(secp(), &path)?;
    Ok(bitcoin::PublicKey::new(child.public_key))
}

pub fn derive_child_pubkey_str(xpub: &str, path: &str) -> Result<bitcoin::PublicKey> {
    derive_child_pubkey(&parse_xpub(xpub)?, path)
}

pub fn derive_child_secret(xpriv: &Xpriv, path: &str) -> Result<SecretKey> {
    let path = parse_derivation_path(path)?;
    Ok(xpriv.derive_priv(secp(), &path)?.private_key)
}

/// Copayer ids are the hex SHA-256 of the extended public key string.
pub fn copayer_id_from_xpub(xpub: &str) -> CopayerId {
    CopayerId::new(hex::encode(sha256::Hash::hash(xpub.trim().as_bytes()).to_byte_array()))
}

/// Sorts keys by their serialized form (BIP67) in place.
pub fn sort_pubkeys(pubkeys: &mut [bitcoin::PublicKey]) {
    pubkeys.sort_by_key(|key| key.inner.serialize());
}

/// Builds `OP_m <pk1> .. <pkn> OP_n OP_CHECKMULTISIG` over the given (already ordered) keys.
pub fn redeem_script_from_pubkeys(pubkeys: &[bitcoin::PublicKey], required: u8) -> Result<ScriptBuf> {
    if required == 0 || usize::from(required) > pubkeys.len() || pubkeys.len() > usize::from(crate::foundation::MAX_COPAYERS) {
        return Err(CosignError::invalid_argument(format!("invalid multisig parameters m={} n={}", required, pubkeys.len())));
    }
    let mut builder = Builder::new().push_int(i64::from(required));
    for key in pubkeys {
        builder = builder.push_key(key);
    }
    Ok(builder.push_int(pubkeys.len() as i64).push_opcode(OP_CHECKMULTISIG).into_script())
}

pub fn message_digest(text: &str) -> Message {
    Message::from_digest(sha256d::Hash::hash(text.as_bytes()).to_byte_array())
}

/// Signs `text` (double SHA-256) and returns the DER signature as hex.
pub fn sign_message(text: &str, secret: &SecretKey) -> String {
    let signature = SECP256K1.sign_ecdsa(&message_digest(text), secret);
    hex::encode(signature.serialize_der().to_vec())
}

pub fn parse_der_signature(signature_hex: &str) -> Result<Signature> {
    let bytes = hex::decode(signature_hex.trim())?;
    let mut signature = Signature::from_der(&bytes)?;
    signature.normalize_s();
    Ok(signature)
}

pub fn verify_message(text: &str, signature_hex: &str, pubkey_hex: &str) -> bool {
    let Ok(signature) = parse_der_signature(signature_hex) else {
        return false;
    };
    let Ok(pubkey) = parse_public_key(pubkey_hex) else {
        return false;
    };
    SECP256K1.verify_ecdsa(&message_digest(text), &signature, &pubkey).is_ok()
}
