// Copyright (c) 2018-2025 The Botho Foundation

//! `ScpRunner`: the per-instance voting rule (spec.md §4.3 "the runner").
//!
//! Any `false` vote from a participating chain decides the instance
//! `Rejected` immediately; once every participating chain has voted `true`,
//! the instance decides `Accepted`. The chain that originated the request
//! (the first participating chain, in submission order) is treated as the
//! initiator and is credited with an implicit `true` vote at construction
//! time, matching spec.md §3's invariant ("`Decision=true` is only possible
//! after all participating chains have voted true") while still honoring
//! §4.3's "non-initiator" framing of the voting rule.

use sp_types::ids::ChainId;
use sp_types::ports::DecisionState;

/// Per-instance vote tally and decision rule.
pub struct ScpRunner {
    participating_chains: Vec<ChainId>,
    votes: std::collections::BTreeMap<ChainId, bool>,
    decision: Option<bool>,
}

impl ScpRunner {
    /// Start a runner for `participating_chains`, crediting the first chain
    /// (the initiator) with an implicit `true` vote.
    pub fn new(participating_chains: Vec<ChainId>) -> Self {
        let mut votes = std::collections::BTreeMap::new();
        if let Some(initiator) = participating_chains.first() {
            votes.insert(initiator.clone(), true);
        }
        let mut runner = Self {
            participating_chains,
            votes,
            decision: None,
        };
        runner.recompute();
        runner
    }

    /// Record a vote from `chain`. No-op if the instance already decided.
    pub fn vote(&mut self, chain: ChainId, vote: bool) {
        if self.decision.is_some() {
            return;
        }
        self.votes.insert(chain, vote);
        self.recompute();
    }

    /// A timer fired for this instance without full agreement: decide
    /// `Rejected` if still pending.
    pub fn timeout(&mut self) {
        if self.decision.is_none() {
            self.decision = Some(false);
        }
    }

    fn recompute(&mut self) {
        if self.decision.is_some() {
            return;
        }
        if self
            .participating_chains
            .iter()
            .any(|chain| matches!(self.votes.get(chain), Some(false)))
        {
            self.decision = Some(false);
            return;
        }
        if self
            .participating_chains
            .iter()
            .all(|chain| matches!(self.votes.get(chain), Some(true)))
        {
            self.decision = Some(true);
        }
    }

    /// Current decision state, as read by `ConsensusCoordinator::get_state`.
    pub fn decision_state(&self) -> DecisionState {
        match self.decision {
            None => DecisionState::Pending,
            Some(true) => DecisionState::Accepted,
            Some(false) => DecisionState::Rejected,
        }
    }

    pub fn decision(&self) -> Option<bool> {
        self.decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(n: u8) -> ChainId {
        ChainId::new(vec![n])
    }

    #[test]
    fn single_false_vote_decides_rejected() {
        let mut runner = ScpRunner::new(vec![chain(1), chain(2)]);
        assert_eq!(runner.decision_state(), DecisionState::Pending);
        runner.vote(chain(2), false);
        assert_eq!(runner.decision_state(), DecisionState::Rejected);
    }

    #[test]
    fn all_true_decides_accepted() {
        let mut runner = ScpRunner::new(vec![chain(1), chain(2), chain(3)]);
        runner.vote(chain(2), true);
        assert_eq!(runner.decision_state(), DecisionState::Pending);
        runner.vote(chain(3), true);
        assert_eq!(runner.decision_state(), DecisionState::Accepted);
    }

    #[test]
    fn decision_is_terminal() {
        let mut runner = ScpRunner::new(vec![chain(1), chain(2)]);
        runner.vote(chain(2), false);
        runner.vote(chain(2), true);
        assert_eq!(runner.decision(), Some(false));
    }

    #[test]
    fn timeout_rejects_pending_instance() {
        let mut runner = ScpRunner::new(vec![chain(1), chain(2)]);
        runner.timeout();
        assert_eq!(runner.decision(), Some(false));
    }

    #[test]
    fn single_chain_instance_decides_immediately_via_initiator_vote() {
        let runner = ScpRunner::new(vec![chain(1)]);
        assert_eq!(runner.decision_state(), DecisionState::Accepted);
    }
}
