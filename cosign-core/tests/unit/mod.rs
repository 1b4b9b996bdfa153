mod balance;
mod height_cache;
mod history;
mod notifications;
mod proposal_creation;
mod proposal_flow;
mod proposal_removal;
mod wallet_join;
