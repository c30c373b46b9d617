//! Berth allocation for a port terminal: assigns every ship to a compatible berth and a time
//! window inside a planning horizon by building a constraint model and solving it with HiGHS.

pub mod data;
pub mod error;
pub mod model;
pub mod planner;
pub mod server;
pub mod solver;

pub use data::{Berth, Berthing, Schedule, Ship, SolveStatus};
pub use error::PlanningFailure;
pub use model::{BerthModel, BerthUtilization};
pub use planner::{Planner, PlanningOptions, plan_schedule};
pub use server::{PlanningInput, ServerConfig, run_server};
pub use solver::{HighsBackend, SolverSettings, SolvingCapability, Verdict};
