use crate::foundation::CosignError;
use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Temporary,
    Pending,
    Accepted,
    Rejected,
    Broadcasted,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Temporary => "temporary",
            ProposalStatus::Pending => "pending",
            ProposalStatus::Accepted => "accepted",
            ProposalStatus::Rejected => "rejected",
            ProposalStatus::Broadcasted => "broadcasted",
        }
    }
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const VALID_TRANSITIONS: &[(ProposalStatus, ProposalStatus)] = &[
    (ProposalStatus::Temporary, ProposalStatus::Pending),
    (ProposalStatus::Pending, ProposalStatus::Accepted),
    (ProposalStatus::Pending, ProposalStatus::Rejected),
    (ProposalStatus::Accepted, ProposalStatus::Broadcasted),
];

pub fn is_valid_transition(from: ProposalStatus, to: ProposalStatus) -> bool {
    VALID_TRANSITIONS.contains(&(from, to))
}

pub fn validate_transition(from: ProposalStatus, to: ProposalStatus) -> Result<(), CosignError> {
    if is_valid_transition(from, to) {
        return Ok(());
    }
    warn!("invalid proposal status transition from={} to={}", from, to);
    Err(CosignError::InvalidStateTransition { from: from.to_string(), to: to.to_string() })
}

/// Applies a validated transition and logs it.
pub fn transition(status: &mut ProposalStatus, to: ProposalStatus, proposal_id: &str) -> Result<(), CosignError> {
    validate_transition(*status, to)?;
    info!("proposal status transition proposal_id={} from={} to={}", proposal_id, status, to);
    *status = to;
    Ok(())
}

pub fn is_terminal(status: ProposalStatus) -> bool {
    matches!(status, ProposalStatus::Rejected | ProposalStatus::Broadcasted)
}
