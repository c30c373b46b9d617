use good_lp::solvers::SolutionStatus;
use good_lp::variable;
use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable, constraint,
    default_solver,
};
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::data::SolveStatus;
use crate::model::{Constraint, ConstraintModel, Valuation};

/// Tuning knobs handed to the solving capability.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SolverSettings {
    /// Wall-clock budget; `None` searches until a verdict.
    pub time_limit_seconds: Option<f64>,
    pub random_seed: i32,
    pub log_to_console: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            time_limit_seconds: None,
            random_seed: 1234,
            log_to_console: false,
        }
    }
}

/// What the solving capability reports back.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub status: SolveStatus,
    /// Present iff `status` has a solution.
    pub values: Option<Valuation>,
    pub reason: Option<String>,
}

impl Verdict {
    pub fn solved(status: SolveStatus, values: Valuation) -> Self {
        Self {
            status,
            values: Some(values),
            reason: None,
        }
    }

    pub fn unsolved(status: SolveStatus, reason: impl Into<String>) -> Self {
        Self {
            status,
            values: None,
            reason: Some(reason.into()),
        }
    }
}

/// A generic boolean + bounded-integer constraint solver.
pub trait SolvingCapability {
    fn name(&self) -> &str;

    /// Solve synchronously. The model is not modified.
    fn solve(&self, model: &ConstraintModel, settings: &SolverSettings) -> Verdict;
}

/// Solves the model as a mixed-integer program with HiGHS.
#[derive(Debug, Clone, Copy, Default)]
pub struct HighsBackend;

impl HighsBackend {
    pub fn new() -> Self {
        Self
    }
}

impl SolvingCapability for HighsBackend {
    fn name(&self) -> &str {
        "HiGHS"
    }

    fn solve(&self, model: &ConstraintModel, settings: &SolverSettings) -> Verdict {
        let start_time = Instant::now();
        let mut problem = ProblemVariables::new();

        let booleans: Vec<Variable> = model
            .bool_vars()
            .map(|(_, name)| problem.add(variable().binary().name(name)))
            .collect();
        let integers: Vec<Variable> = model
            .int_vars()
            .map(|(_, name, domain)| {
                problem.add(
                    variable()
                        .integer()
                        .min(domain.lower as f64)
                        .max(domain.upper as f64)
                        .name(name),
                )
            })
            .collect();
        trace!(
            "Declared {} binary and {} integer columns.",
            booleans.len(),
            integers.len()
        );

        // pure feasibility: constant objective
        // HiGHS sizes its task pool once per OS thread, so the thread count never varies
        let mut lp = problem
            .minimise(0.0)
            .using(default_solver)
            .set_option("threads", 1)
            .set_option("random_seed", settings.random_seed)
            .set_option("output_flag", settings.log_to_console);
        if let Some(limit) = settings.time_limit_seconds {
            lp = lp.set_option("time_limit", limit);
        }

        let mut rows = 0usize;
        for named in model.constraints() {
            match &named.constraint {
                Constraint::LinearEq { terms, rhs } => {
                    let lhs: Expression = terms
                        .iter()
                        .map(|(var, coef)| *coef as f64 * integers[var.index()])
                        .sum();
                    lp.add_constraint(constraint!(lhs == *rhs as f64));
                }
                Constraint::ExactlyOne(range) => {
                    let total: Expression = range.iter().map(|v| booleans[v.index()]).sum();
                    lp.add_constraint(constraint!(total == 1));
                }
                Constraint::AtLeastOne(range) => {
                    let total: Expression = range.iter().map(|v| booleans[v.index()]).sum();
                    lp.add_constraint(constraint!(total >= 1));
                }
                Constraint::Implies { literal, predicate } => {
                    if predicate.holds() {
                        continue;
                    }
                    // a false consequent forbids the literal
                    let x = booleans[literal.index()];
                    lp.add_constraint(constraint!(x <= 0));
                }
            }
            rows += 1;
        }
        debug!(
            "Emitted {} rows for {} model constraints.",
            rows,
            model.num_constraints()
        );

        info!("Starting HiGHS solver...");
        let solution = match lp.solve() {
            Ok(s) => s,
            Err(ResolutionError::Infeasible) => {
                info!(
                    "HiGHS proved the model infeasible in {:.2?}",
                    start_time.elapsed()
                );
                return Verdict::unsolved(
                    SolveStatus::Infeasible,
                    "no assignment satisfies all constraints",
                );
            }
            Err(e) => {
                warn!("HiGHS stopped without a verdict: {}", e);
                return Verdict::unsolved(SolveStatus::Unknown, e.to_string());
            }
        };
        let status = match solution.status() {
            SolutionStatus::Optimal => SolveStatus::Optimal,
            // stopped on a limit with an incumbent in hand
            _ => SolveStatus::Feasible,
        };
        info!("Solution ({}) found in {:.2?}", status, start_time.elapsed());

        let values = Valuation {
            booleans: booleans.iter().map(|v| solution.value(*v) > 0.5).collect(),
            integers: integers
                .iter()
                .map(|v| solution.value(*v).round() as i64)
                .collect(),
        };

        Verdict::solved(status, values)
    }
}
