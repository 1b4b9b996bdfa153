use crate::foundation::outpoint_key;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unspent output as reported by the explorer, decorated with local bookkeeping.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub txid: String,
    pub vout: u32,
    pub address: String,
    pub satoshis: u64,
    pub confirmations: u32,
    /// Reserved by a pending proposal.
    #[serde(default)]
    pub locked: bool,
    /// Consumed by a recent broadcast the explorer has not caught up with.
    #[serde(default)]
    pub spent: bool,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub public_keys: Vec<String>,
}

impl Utxo {
    pub fn new(txid: impl Into<String>, vout: u32, address: impl Into<String>, satoshis: u64, confirmations: u32) -> Self {
        Self {
            txid: txid.into(),
            vout,
            address: address.into(),
            satoshis,
            confirmations,
            locked: false,
            spent: false,
            path: None,
            public_keys: Vec::new(),
        }
    }

    pub fn key(&self) -> String {
        outpoint_key(&self.txid, self.vout)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBalance {
    pub address: String,
    pub path: Option<String>,
    pub amount: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub total_amount: u64,
    pub locked_amount: u64,
    pub available_amount: u64,
    pub total_confirmed_amount: u64,
    pub locked_confirmed_amount: u64,
    pub available_confirmed_amount: u64,
    pub by_address: Vec<AddressBalance>,
}

pub fn totalize(utxos: &[Utxo]) -> Balance {
    let sum = |pred: &dyn Fn(&Utxo) -> bool| -> u64 { utxos.iter().filter(|u| pred(u)).map(|u| u.satoshis).sum() };
    let total_amount = sum(&|_| true);
    let locked_amount = sum(&|u| u.locked);
    let total_confirmed_amount = sum(&|u| u.confirmations > 0);
    let locked_confirmed_amount = sum(&|u| u.locked && u.confirmations > 0);

    let mut by_address: BTreeMap<&str, AddressBalance> = BTreeMap::new();
    for utxo in utxos {
        let entry = by_address.entry(utxo.address.as_str()).or_insert_with(|| AddressBalance {
            address: utxo.address.clone(),
            path: utxo.path.clone(),
            amount: 0,
        });
        entry.amount += utxo.satoshis;
    }

    Balance {
        total_amount,
        locked_amount,
        available_amount: total_amount - locked_amount,
        total_confirmed_amount,
        locked_confirmed_amount,
        available_confirmed_amount: total_confirmed_amount - locked_confirmed_amount,
        by_address: by_address.into_values().collect(),
    }
}
