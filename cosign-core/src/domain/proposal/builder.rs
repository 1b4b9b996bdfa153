//! Unsigned transaction assembly, per-input sighash, signature checks and final scriptSig construction.

use crate::domain::address::AddressType;
use crate::domain::proposal::{ActionType, TxProposal};
use crate::domain::utxo::Utxo;
use crate::foundation::{
    derive_child_pubkey, derive_child_secret, parse_der_signature, parse_xpub, redeem_script_from_pubkeys, secp, sort_pubkeys,
    CosignError, Result,
};
use bitcoin::absolute::LockTime;
use bitcoin::bip32::{Xpriv, Xpub};
use bitcoin::consensus::encode::serialize_hex;
use bitcoin::hashes::Hash;
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{opcodes, Address, Amount, Network, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use secp256k1::Message;
use std::str::FromStr;

/// Parses an address and checks it belongs to `network`.
pub fn parse_address(value: &str, network: Network) -> Result<Address> {
    let unchecked = Address::from_str(value.trim()).map_err(|err| CosignError::InvalidAddress(err.to_string()))?;
    if !unchecked.is_valid_for_network(network) {
        return Err(CosignError::IncorrectAddressNetwork);
    }
    Ok(unchecked.assume_checked())
}

/// Inputs in proposal order, outputs in request order, change (if any) last.
pub fn build_unsigned_tx(txp: &TxProposal) -> Result<Transaction> {
    let mut input = Vec::with_capacity(txp.inputs.len());
    for utxo in &txp.inputs {
        let txid = Txid::from_str(&utxo.txid)
            .map_err(|err| CosignError::invalid_argument(format!("invalid input txid {}: {}", utxo.txid, err)))?;
        input.push(TxIn {
            previous_output: OutPoint::new(txid, utxo.vout),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::default(),
        });
    }

    let mut output = Vec::with_capacity(txp.outputs.len() + 1);
    for out in &txp.outputs {
        let address = parse_address(&out.to_address, txp.network)?;
        output.push(TxOut { value: Amount::from_sat(out.amount), script_pubkey: address.script_pubkey() });
    }

    let change = txp.change_amount();
    if change < 0 {
        return Err(CosignError::InsufficientFundsForFee(format!("inputs short by {} after fee", -change)));
    }
    if change > 0 {
        let change_address = txp.change_address.as_ref().ok_or(CosignError::InvalidChangeAddress)?;
        let address = parse_address(&change_address.address, txp.network)?;
        output.push(TxOut { value: Amount::from_sat(change as u64), script_pubkey: address.script_pubkey() });
    }

    Ok(Transaction { version: Version::ONE, lock_time: LockTime::ZERO, input, output })
}

/// Canonical serialization the creator signs when publishing.
pub fn raw_unsigned_hex(txp: &TxProposal) -> Result<String> {
    Ok(serialize_hex(&build_unsigned_tx(txp)?))
}

fn input_pubkeys(utxo: &Utxo) -> Result<Vec<bitcoin::PublicKey>> {
    utxo.public_keys
        .iter()
        .map(|key| {
            bitcoin::PublicKey::from_str(key)
                .map_err(|err| CosignError::invalid_argument(format!("invalid input public key {}: {}", key, err)))
        })
        .collect()
}

fn input_path(utxo: &Utxo, index: usize) -> Result<&str> {
    utxo.path.as_deref().ok_or_else(|| CosignError::invalid_argument(format!("input {} has no derivation path", index)))
}

/// Script committed to by the legacy sighash: the redeem script for P2SH, the output script for P2PKH.
pub fn input_script_code(txp: &TxProposal, utxo: &Utxo) -> Result<ScriptBuf> {
    let mut keys = input_pubkeys(utxo)?;
    match txp.address_type {
        AddressType::P2sh => {
            sort_pubkeys(&mut keys);
            redeem_script_from_pubkeys(&keys, txp.required_signatures)
        }
        AddressType::P2pkh => {
            let key = keys.first().ok_or_else(|| CosignError::invalid_argument("P2PKH input without public key"))?;
            Ok(ScriptBuf::new_p2pkh(&key.pubkey_hash()))
        }
    }
}

pub fn input_sighash(tx: &Transaction, index: usize, script_code: &ScriptBuf) -> Result<Message> {
    let cache = SighashCache::new(tx);
    let hash = cache
        .legacy_signature_hash(index, script_code, EcdsaSighashType::All.to_u32())
        .map_err(|err| CosignError::crypto("legacy sighash", err))?;
    Ok(Message::from_digest(hash.to_byte_array()))
}

/// Checks one DER signature per input against the copayer's child key at the input's path.
pub fn verify_copayer_signatures(txp: &TxProposal, xpub: &str, signatures: &[String]) -> Result<()> {
    if signatures.len() != txp.inputs.len() {
        return Err(CosignError::BadSignatures(format!(
            "number of signatures does not match number of inputs: signatures={} inputs={}",
            signatures.len(),
            txp.inputs.len()
        )));
    }
    let xpub = parse_xpub(xpub)?;
    let tx = build_unsigned_tx(txp)?;
    for (index, (utxo, signature_hex)) in txp.inputs.iter().zip(signatures).enumerate() {
        let pubkey = derive_child_pubkey(&xpub, input_path(utxo, index)?)?;
        if !utxo.public_keys.contains(&pubkey.to_string()) {
            return Err(CosignError::BadSignatures(format!("copayer key is not part of input {}", index)));
        }
        let script_code = input_script_code(txp, utxo)?;
        let message = input_sighash(&tx, index, &script_code)?;
        let signature = parse_der_signature(signature_hex)
            .map_err(|_| CosignError::BadSignatures(format!("malformed signature for input {}", index)))?;
        secp()
            .verify_ecdsa(&message, &signature, &pubkey.inner)
            .map_err(|_| CosignError::BadSignatures(format!("invalid signature for input {}", index)))?;
    }
    Ok(())
}

fn push_bytes(bytes: Vec<u8>) -> Result<PushBytesBuf> {
    PushBytesBuf::try_from(bytes).map_err(|err| CosignError::crypto("script push", err))
}

/// Assembles scriptSigs from the accept actions. Signatures are ordered by key position.
pub fn build_signed_tx(txp: &TxProposal) -> Result<Transaction> {
    let accepts = txp
        .actions
        .iter()
        .filter(|action| action.action_type == ActionType::Accept)
        .map(|action| {
            let xpub = action.xpub.as_deref().ok_or_else(|| CosignError::invalid_argument("accept action without xpub"))?;
            let signatures = action.signatures.as_deref().unwrap_or_default();
            Ok((parse_xpub(xpub)?, signatures))
        })
        .collect::<Result<Vec<(Xpub, &[String])>>>()?;

    let mut tx = build_unsigned_tx(txp)?;
    for (index, utxo) in txp.inputs.iter().enumerate() {
        let path = input_path(utxo, index)?;
        let mut keys = input_pubkeys(utxo)?;
        if txp.address_type == AddressType::P2sh {
            sort_pubkeys(&mut keys);
        }

        let mut collected = Vec::with_capacity(accepts.len());
        for (xpub, signatures) in &accepts {
            let pubkey = derive_child_pubkey(xpub, path)?;
            let position = keys
                .iter()
                .position(|key| key == &pubkey)
                .ok_or_else(|| CosignError::BadSignatures(format!("signer key is not part of input {}", index)))?;
            let signature_hex = signatures
                .get(index)
                .ok_or_else(|| CosignError::BadSignatures(format!("missing signature for input {}", index)))?;
            let mut signature = parse_der_signature(signature_hex)?.serialize_der().to_vec();
            signature.push(EcdsaSighashType::All.to_u32() as u8);
            collected.push((position, signature, pubkey));
        }
        collected.sort_by_key(|(position, _, _)| *position);
        collected.truncate(usize::from(txp.required_signatures));

        tx.input[index].script_sig = match txp.address_type {
            AddressType::P2sh => {
                let redeem = redeem_script_from_pubkeys(&keys, txp.required_signatures)?;
                let mut builder = Builder::new().push_opcode(opcodes::OP_0);
                for (_, signature, _) in collected {
                    builder = builder.push_slice(push_bytes(signature)?);
                }
                builder.push_slice(push_bytes(redeem.into_bytes())?).into_script()
            }
            AddressType::P2pkh => {
                let (_, signature, pubkey) = collected
                    .into_iter()
                    .next()
                    .ok_or_else(|| CosignError::BadSignatures(format!("no signature for input {}", index)))?;
                Builder::new().push_slice(push_bytes(signature)?).push_key(&pubkey).into_script()
            }
        };
    }
    Ok(tx)
}

/// Client-side helper producing one DER signature per input with the copayer's extended private key.
pub fn sign_proposal(txp: &TxProposal, xpriv: &Xpriv) -> Result<Vec<String>> {
    let tx = build_unsigned_tx(txp)?;
    txp.inputs
        .iter()
        .enumerate()
        .map(|(index, utxo)| {
            let secret = derive_child_secret(xpriv, input_path(utxo, index)?)?;
            let script_code = input_script_code(txp, utxo)?;
            let message = input_sighash(&tx, index, &script_code)?;
            Ok(hex::encode(secp().sign_ecdsa(&message, &secret).serialize_der().to_vec()))
        })
        .collect()
}
