use crate::data::SolveStatus;

/// Why a planning call produced no schedule.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanningFailure {
    #[error("Empty instance: {ships} ships and {berths} berths supplied")]
    EmptyInstance { ships: usize, berths: usize },

    #[error("Invalid horizon: the planning horizon must be positive")]
    InvalidHorizon,

    #[error("Duplicate {kind} id {id}")]
    DuplicateRecord { kind: &'static str, id: u32 },

    #[error("No feasible assignment: {reason}")]
    Infeasible { reason: String },

    #[error("Solver stopped without a verdict: {reason}")]
    Unresolved { reason: String },

    #[error("Solver result violates the model: {0}")]
    InternalConsistencyViolation(String),
}

impl PlanningFailure {
    /// The solver's terminal status, when the failure came from a solve.
    pub fn status(&self) -> Option<SolveStatus> {
        match self {
            PlanningFailure::Infeasible { .. } => Some(SolveStatus::Infeasible),
            PlanningFailure::Unresolved { .. } => Some(SolveStatus::Unknown),
            _ => None,
        }
    }

    /// A broken solver contract, as opposed to an expected outcome.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PlanningFailure::InternalConsistencyViolation(_))
    }
}

pub type Result<T> = std::result::Result<T, PlanningFailure>;
