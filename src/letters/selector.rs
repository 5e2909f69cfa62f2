//! Recipient selection policies.
//!
//! Given the candidate set (every profile except the sender) annotated with
//! unread-load, a policy picks the receiver to try. Eligibility (unread-load
//! strictly below inbox capacity) is shared by all policies;
//! only the choice among eligible candidates differs. One policy is wired at
//! startup and used for the whole run.

use rand::seq::SliceRandom;
use serde::Deserialize;

/// A candidate receiver with their current unread-load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateLoad {
    pub user_id: usize,
    pub unread_load: i64,
}

pub trait RecipientSelectionPolicy: Send + Sync {
    /// Picks a receiver among candidates with `unread_load < capacity`, or
    /// None when nobody is eligible.
    fn select(&self, candidates: &[CandidateLoad], capacity: i64) -> Option<usize>;

    fn name(&self) -> &'static str;
}

/// Canonical policy: the eligible candidate with the lowest unread-load,
/// ties broken by lowest user id. Keeps low-load users from being starved
/// while high-load users still pass eligibility.
pub struct LeastLoadedPolicy;

impl RecipientSelectionPolicy for LeastLoadedPolicy {
    fn select(&self, candidates: &[CandidateLoad], capacity: i64) -> Option<usize> {
        candidates
            .iter()
            .filter(|c| c.unread_load < capacity)
            .min_by_key(|c| (c.unread_load, c.user_id))
            .map(|c| c.user_id)
    }

    fn name(&self) -> &'static str {
        "least-loaded"
    }
}

/// Historical policy: shuffle the candidates and take the first eligible one.
pub struct UniformRandomPolicy;

impl RecipientSelectionPolicy for UniformRandomPolicy {
    fn select(&self, candidates: &[CandidateLoad], capacity: i64) -> Option<usize> {
        let mut shuffled = candidates.to_vec();
        shuffled.shuffle(&mut rand::rng());
        shuffled
            .into_iter()
            .find(|c| c.unread_load < capacity)
            .map(|c| c.user_id)
    }

    fn name(&self) -> &'static str {
        "uniform-random"
    }
}

/// CLI-selectable policy kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicyKind {
    LeastLoaded,
    UniformRandom,
}

impl SelectionPolicyKind {
    pub fn build(&self) -> Box<dyn RecipientSelectionPolicy> {
        match self {
            SelectionPolicyKind::LeastLoaded => Box::new(LeastLoadedPolicy),
            SelectionPolicyKind::UniformRandom => Box::new(UniformRandomPolicy),
        }
    }
}
