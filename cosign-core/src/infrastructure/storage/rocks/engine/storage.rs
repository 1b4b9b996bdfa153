use super::{AddressIndexEntry, RocksStorage};
use crate::domain::address::AddressRecord;
use crate::domain::notification::Notification;
use crate::domain::proposal::TxProposal;
use crate::domain::wallet::{CopayerLookup, Wallet};
use crate::foundation::{CopayerId, CosignError, NotificationId, ProposalId, WalletId};
use crate::infrastructure::storage::rocks::schema::*;
use crate::infrastructure::storage::traits::{apply_limit, in_query, sort_newest_first};
use crate::infrastructure::storage::{ActiveAddresses, Storage, TxHistoryCache, TxQuery};
use crate::storage_err;
use log::{debug, trace, warn};
use rocksdb::{Direction, IteratorMode, WriteBatch};
use std::collections::HashSet;

impl RocksStorage {
    fn put_wallet(&self, batch: &mut WriteBatch, wallet: &Wallet) -> Result<(), CosignError> {
        batch.put_cf(self.cf_handle(CF_WALLET)?, wallet.id.as_bytes(), Self::encode(wallet)?);
        Ok(())
    }

    fn put_addresses(&self, batch: &mut WriteBatch, addresses: &[AddressRecord]) -> Result<(), CosignError> {
        let index_cf = self.cf_handle(CF_ADDRESS_INDEX)?;
        let address_cf = self.cf_handle(CF_ADDRESS)?;
        let meta_cf = self.cf_handle(CF_METADATA)?;
        let mut seen = HashSet::new();
        let mut next_seq: Vec<(WalletId, u64)> = Vec::new();
        for address in addresses {
            let known = self.db.get_cf(index_cf, address.address.as_bytes()).map_err(|err| storage_err!("rocksdb get_cf address_index", err))?;
            if known.is_some() || !seen.insert(address.address.clone()) {
                warn!("skipping duplicate address address={} wallet_id={}", address.address, address.wallet_id);
                continue;
            }
            let slot = match next_seq.iter().position(|(wallet_id, _)| wallet_id == &address.wallet_id) {
                Some(slot) => slot,
                None => {
                    next_seq.push((address.wallet_id.clone(), self.next_address_seq(&address.wallet_id)?));
                    next_seq.len() - 1
                }
            };
            let seq = next_seq[slot].1;
            let entry = AddressIndexEntry { wallet_id: address.wallet_id.clone(), seq };
            batch.put_cf(address_cf, Self::key_address(&address.wallet_id, seq), Self::encode(address)?);
            batch.put_cf(index_cf, address.address.as_bytes(), Self::encode(&entry)?);
            next_seq[slot].1 = seq + 1;
        }
        for (wallet_id, seq) in next_seq {
            batch.put_cf(meta_cf, Self::key_address_seq(&wallet_id), seq.to_be_bytes());
        }
        Ok(())
    }

    fn write(&self, batch: WriteBatch) -> Result<(), CosignError> {
        self.db.write(batch).map_err(|err| storage_err!("rocksdb write", err))
    }
}

impl Storage for RocksStorage {
    fn store_wallet(&self, wallet: &Wallet) -> Result<(), CosignError> {
        trace!("store_wallet wallet_id={}", wallet.id);
        let cf = self.cf_handle(CF_WALLET)?;
        self.db.put_cf(cf, wallet.id.as_bytes(), Self::encode(wallet)?).map_err(|err| storage_err!("rocksdb put_cf wallet", err))
    }

    fn fetch_wallet(&self, wallet_id: &WalletId) -> Result<Option<Wallet>, CosignError> {
        self.get_decoded(CF_WALLET, wallet_id.as_bytes())
    }

    fn store_wallet_and_update_copayers_lookup(&self, wallet: &Wallet) -> Result<(), CosignError> {
        debug!("store_wallet_and_update_copayers_lookup wallet_id={} copayers={}", wallet.id, wallet.copayers.len());
        let _guard = self.lock_batches("store_wallet_and_update_copayers_lookup")?;
        let mut batch = WriteBatch::default();
        self.put_wallet(&mut batch, wallet)?;
        let lookup_cf = self.cf_handle(CF_COPAYER_LOOKUP)?;
        for lookup in wallet.copayer_lookups() {
            batch.put_cf(lookup_cf, lookup.copayer_id.as_bytes(), Self::encode(&lookup)?);
        }
        self.write(batch)
    }

    fn fetch_copayer_lookup(&self, copayer_id: &CopayerId) -> Result<Option<CopayerLookup>, CosignError> {
        self.get_decoded(CF_COPAYER_LOOKUP, copayer_id.as_bytes())
    }

    fn store_tx(&self, proposal: &TxProposal) -> Result<(), CosignError> {
        trace!("store_tx wallet_id={} proposal_id={} status={}", proposal.wallet_id, proposal.id, proposal.status.as_str());
        let _guard = self.lock_batches("store_tx")?;
        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf_handle(CF_TX)?, wallet_scoped(&proposal.wallet_id, Some(proposal.id.as_str())), Self::encode(proposal)?);
        if let Some(txid) = &proposal.txid {
            batch.put_cf(self.cf_handle(CF_TX_HASH)?, wallet_scoped(&proposal.wallet_id, Some(txid.as_str())), proposal.id.as_bytes());
        }
        self.write(batch)
    }

    fn fetch_tx(&self, wallet_id: &WalletId, proposal_id: &ProposalId) -> Result<Option<TxProposal>, CosignError> {
        self.get_decoded(CF_TX, &wallet_scoped(wallet_id, Some(proposal_id.as_str())))
    }

    fn fetch_tx_by_hash(&self, wallet_id: &WalletId, txid: &str) -> Result<Option<TxProposal>, CosignError> {
        let cf = self.cf_handle(CF_TX_HASH)?;
        let Some(bytes) = self.db.get_cf(cf, wallet_scoped(wallet_id, Some(txid))).map_err(|err| storage_err!("rocksdb get_cf tx_hash", err))? else {
            return Ok(None);
        };
        let proposal_id = String::from_utf8(bytes).map_err(|err| storage_err!("tx_hash decode", err))?;
        self.fetch_tx(wallet_id, &ProposalId::new(proposal_id))
    }

    fn remove_tx(&self, wallet_id: &WalletId, proposal_id: &ProposalId) -> Result<(), CosignError> {
        debug!("remove_tx wallet_id={} proposal_id={}", wallet_id, proposal_id);
        let _guard = self.lock_batches("remove_tx")?;
        let Some(proposal) = self.fetch_tx(wallet_id, proposal_id)? else {
            return Ok(());
        };
        let mut batch = WriteBatch::default();
        batch.delete_cf(self.cf_handle(CF_TX)?, wallet_scoped(wallet_id, Some(proposal_id.as_str())));
        if let Some(txid) = &proposal.txid {
            batch.delete_cf(self.cf_handle(CF_TX_HASH)?, wallet_scoped(wallet_id, Some(txid.as_str())));
        }
        self.write(batch)
    }

    fn fetch_txs(&self, wallet_id: &WalletId, query: &TxQuery) -> Result<Vec<TxProposal>, CosignError> {
        let mut txs: Vec<TxProposal> = self.scan_prefix(CF_TX, &wallet_scoped(wallet_id, None))?;
        txs.retain(|txp| in_query(txp, query));
        sort_newest_first(&mut txs);
        Ok(apply_limit(txs, query))
    }

    fn store_address_and_wallet(&self, wallet: &Wallet, addresses: &[AddressRecord]) -> Result<(), CosignError> {
        debug!("store_address_and_wallet wallet_id={} addresses={}", wallet.id, addresses.len());
        let _guard = self.lock_batches("store_address_and_wallet")?;
        let mut batch = WriteBatch::default();
        self.put_addresses(&mut batch, addresses)?;
        self.put_wallet(&mut batch, wallet)?;
        self.write(batch)
    }

    fn store_address(&self, address: &AddressRecord) -> Result<(), CosignError> {
        let _guard = self.lock_batches("store_address")?;
        let mut batch = WriteBatch::default();
        self.put_addresses(&mut batch, std::slice::from_ref(address))?;
        self.write(batch)
    }

    fn mark_address_activity(&self, wallet_id: &WalletId, address: &str) -> Result<(), CosignError> {
        let _guard = self.lock_batches("mark_address_activity")?;
        let Some(entry) = self.get_decoded::<AddressIndexEntry>(CF_ADDRESS_INDEX, address.as_bytes())? else {
            return Ok(());
        };
        if &entry.wallet_id != wallet_id {
            return Ok(());
        }
        let key = Self::key_address(wallet_id, entry.seq);
        let Some(mut record) = self.get_decoded::<AddressRecord>(CF_ADDRESS, &key)? else {
            return Ok(());
        };
        record.has_activity = Some(true);
        let cf = self.cf_handle(CF_ADDRESS)?;
        self.db.put_cf(cf, key, Self::encode(&record)?).map_err(|err| storage_err!("rocksdb put_cf address", err))
    }

    fn fetch_addresses(&self, wallet_id: &WalletId) -> Result<Vec<AddressRecord>, CosignError> {
        self.scan_prefix(CF_ADDRESS, &wallet_scoped(wallet_id, None))
    }

    fn fetch_address_by_wallet_id(&self, wallet_id: &WalletId, address: &str) -> Result<Option<AddressRecord>, CosignError> {
        let Some(entry) = self.get_decoded::<AddressIndexEntry>(CF_ADDRESS_INDEX, address.as_bytes())? else {
            return Ok(None);
        };
        if &entry.wallet_id != wallet_id {
            return Ok(None);
        }
        self.get_decoded(CF_ADDRESS, &Self::key_address(wallet_id, entry.seq))
    }

    fn fetch_address_wallet(&self, address: &str) -> Result<Option<WalletId>, CosignError> {
        Ok(self.get_decoded::<AddressIndexEntry>(CF_ADDRESS_INDEX, address.as_bytes())?.map(|entry| entry.wallet_id))
    }

    fn store_notification(&self, notification: &Notification) -> Result<(), CosignError> {
        trace!("store_notification wallet_id={} id={} type={:?}", notification.wallet_id, notification.id, notification.kind);
        let cf = self.cf_handle(CF_NOTIFICATION)?;
        let key = wallet_scoped(&notification.wallet_id, Some(notification.id.as_str()));
        self.db.put_cf(cf, key, Self::encode(notification)?).map_err(|err| storage_err!("rocksdb put_cf notification", err))
    }

    fn fetch_notifications(&self, wallet_id: &WalletId, from_id: Option<&NotificationId>, min_ts: u64) -> Result<Vec<Notification>, CosignError> {
        let cf = self.cf_handle(CF_NOTIFICATION)?;
        let prefix = wallet_scoped(wallet_id, None);
        let start = match from_id {
            Some(from_id) => wallet_scoped(wallet_id, Some(from_id.as_str())),
            None => prefix.clone(),
        };
        let mut notifications = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::From(&start, Direction::Forward)) {
            let (key, value) = item.map_err(|err| storage_err!("rocksdb iterator notification", err))?;
            if !key.starts_with(&prefix) {
                break;
            }
            if from_id.is_some() && key.as_ref() == start.as_slice() {
                continue;
            }
            let notification: Notification = Self::decode(&value)?;
            if notification.created_on >= min_ts {
                notifications.push(notification);
            }
        }
        Ok(notifications)
    }

    fn store_active_addresses(&self, wallet_id: &WalletId, addresses: &[String], now: u64) -> Result<(), CosignError> {
        let cf = self.cf_handle(CF_CACHE)?;
        let entry = ActiveAddresses { addresses: addresses.to_vec(), updated_on: now };
        self.db.put_cf(cf, Self::key_cache(PREFIX_ACTIVE, wallet_id), Self::encode(&entry)?).map_err(|err| storage_err!("rocksdb put_cf active", err))
    }

    fn fetch_active_addresses(&self, wallet_id: &WalletId) -> Result<Option<ActiveAddresses>, CosignError> {
        self.get_decoded(CF_CACHE, &Self::key_cache(PREFIX_ACTIVE, wallet_id))
    }

    fn store_tx_history_cache(&self, wallet_id: &WalletId, cache: &TxHistoryCache) -> Result<(), CosignError> {
        let cf = self.cf_handle(CF_CACHE)?;
        self.db.put_cf(cf, Self::key_cache(PREFIX_HISTORY, wallet_id), Self::encode(cache)?).map_err(|err| storage_err!("rocksdb put_cf history", err))
    }

    fn fetch_tx_history_cache(&self, wallet_id: &WalletId) -> Result<Option<TxHistoryCache>, CosignError> {
        self.get_decoded(CF_CACHE, &Self::key_cache(PREFIX_HISTORY, wallet_id))
    }

    fn clear_tx_history_cache(&self, wallet_id: &WalletId) -> Result<(), CosignError> {
        let cf = self.cf_handle(CF_CACHE)?;
        self.db.delete_cf(cf, Self::key_cache(PREFIX_HISTORY, wallet_id)).map_err(|err| storage_err!("rocksdb delete_cf history", err))
    }

    fn health_check(&self) -> Result<(), CosignError> {
        self.cf_handle(CF_METADATA).map(|_| ())
    }
}
