//! Notification records and their sortable ids.

use crate::foundation::constants::NOTIFICATION_VERSION;
use crate::foundation::{CopayerId, NotificationId, WalletId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationType {
    NewCopayer,
    WalletComplete,
    NewAddress,
    NewTxProposal,
    TxProposalAcceptedBy,
    TxProposalFinallyAccepted,
    TxProposalRejectedBy,
    TxProposalFinallyRejected,
    TxProposalRemoved,
    NewOutgoingTx,
    NewOutgoingTxByThirdParty,
    NewIncomingTx,
    NewBlock,
    BalanceUpdated,
}

/// Immutable event record; `id` order equals creation order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub version: String,
    pub id: NotificationId,
    pub created_on: u64,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub wallet_id: WalletId,
    #[serde(default)]
    pub creator_id: Option<CopayerId>,
    pub network_name: String,
    #[serde(default)]
    pub data: Value,
}

impl Notification {
    pub fn new(
        id: NotificationId,
        kind: NotificationType,
        wallet_id: WalletId,
        creator_id: Option<CopayerId>,
        network_name: impl Into<String>,
        data: Value,
        created_on: u64,
    ) -> Self {
        Self {
            version: NOTIFICATION_VERSION.to_string(),
            id,
            created_on,
            kind,
            wallet_id,
            creator_id,
            network_name: network_name.into(),
            data,
        }
    }
}

const SEQUENCE_LIMIT: u32 = 10_000;

/// Generates `{millis:014}{sequence:04}{tag}` ids.
///
/// The sequence restarts on every new millisecond; when it overflows, or the clock steps back,
/// the millisecond component is advanced instead so ids stay strictly increasing. The random
/// per-instance tag keeps ids from different processes apart.
pub struct NotificationIdGenerator {
    instance_tag: String,
    state: Mutex<(u64, u32)>,
}

impl NotificationIdGenerator {
    pub fn new() -> Self {
        Self::with_tag(format!("{:04x}", rand::random::<u16>()))
    }

    pub fn with_tag(instance_tag: impl Into<String>) -> Self {
        Self { instance_tag: instance_tag.into(), state: Mutex::new((0, 0)) }
    }

    pub fn instance_tag(&self) -> &str {
        &self.instance_tag
    }

    pub fn next(&self, now_millis: u64) -> NotificationId {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let (last_millis, sequence) = *state;
        let next = if now_millis > last_millis {
            (now_millis, 0)
        } else if sequence + 1 < SEQUENCE_LIMIT {
            (last_millis, sequence + 1)
        } else {
            (last_millis + 1, 0)
        };
        *state = next;
        NotificationId::new(format!("{:014}{:04}{}", next.0, next.1, self.instance_tag))
    }
}

impl Default for NotificationIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
