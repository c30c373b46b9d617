use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::data::{Berth, Berthing, Schedule, Ship, SolveStatus, Time};
use crate::error::{PlanningFailure, Result};
use crate::model::{BerthModel, BerthUtilization, Valuation};
use crate::solver::{HighsBackend, SolverSettings, SolvingCapability, Verdict};

/// Per-call policy knobs.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlanningOptions {
    pub berth_utilization: BerthUtilization,
    pub solver: SolverSettings,
}

/// Builds a fresh model per call and turns the solver's verdict into a [`Schedule`].
#[derive(Debug, Clone, Default)]
pub struct Planner<S = HighsBackend> {
    backend: S,
    options: PlanningOptions,
}

impl Planner<HighsBackend> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: SolvingCapability> Planner<S> {
    pub fn with_backend(backend: S) -> Self {
        Self {
            backend,
            options: PlanningOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PlanningOptions) -> Self {
        self.options = options;
        self
    }

    pub fn plan(&self, ships: &[Ship], berths: &[Berth], horizon: Time) -> Result<Schedule> {
        let start_time = Instant::now();
        let model = BerthModel::build(ships, berths, horizon, self.options.berth_utilization)?;

        info!("Solving berth model with {}...", self.backend.name());
        let verdict = self
            .backend
            .solve(model.constraints(), &self.options.solver);

        let schedule = interpret(&model, verdict)?;
        info!(
            "Planned {} ships ({}) in {:.2?}",
            schedule.len(),
            schedule.status,
            start_time.elapsed()
        );
        Ok(schedule)
    }
}

/// Plans with HiGHS and default options: every berth must be used, no time budget.
pub fn plan_schedule(ships: &[Ship], berths: &[Berth], horizon: Time) -> Result<Schedule> {
    Planner::new().plan(ships, berths, horizon)
}

fn interpret(model: &BerthModel, verdict: Verdict) -> Result<Schedule> {
    let reason = verdict.reason.clone();
    let values = match (verdict.status, verdict.values) {
        (status, Some(values)) if status.has_solution() => values,
        (SolveStatus::Infeasible, _) => {
            warn!("No feasible berth assignment exists.");
            return Err(PlanningFailure::Infeasible {
                reason: reason.unwrap_or_else(|| "no feasible assignment".to_string()),
            });
        }
        (SolveStatus::Unknown, _) => {
            warn!("Solver returned no verdict.");
            return Err(PlanningFailure::Unresolved {
                reason: reason.unwrap_or_else(|| "solver budget exhausted".to_string()),
            });
        }
        (status, _) => {
            return Err(violation(format!("status {status} without variable values")));
        }
    };

    if let Some(broken) = model.constraints().first_violation(&values) {
        return Err(violation(broken));
    }

    let mut schedule = Schedule::new(verdict.status);
    for ship in 0..model.ship_count() {
        let berth = assigned_berth(model, &values, ship)?;
        let berthing = Berthing {
            berth_id: model.berth_id(berth),
            arrival: time_value(model, &values, ship, true)?,
            departure: time_value(model, &values, ship, false)?,
        };
        schedule.berthings.insert(model.ship_id(ship), berthing);
    }
    Ok(schedule)
}

fn assigned_berth(model: &BerthModel, values: &Valuation, ship: usize) -> Result<usize> {
    let chosen: Vec<usize> = (0..model.berth_count())
        .filter(|&k| values.boolean(model.assignment(ship, k)) == Some(true))
        .collect();
    match chosen.as_slice() {
        [berth] => Ok(*berth),
        other => Err(violation(format!(
            "ship {} is assigned to {} berths",
            model.ship_id(ship),
            other.len()
        ))),
    }
}

fn time_value(model: &BerthModel, values: &Valuation, ship: usize, arrival: bool) -> Result<Time> {
    let var = if arrival {
        model.arrival(ship)
    } else {
        model.departure(ship)
    };
    values
        .integer(var)
        .and_then(|v| Time::try_from(v).ok())
        .ok_or_else(|| violation(format!("no valid time for ship {}", model.ship_id(ship))))
}

fn violation(message: String) -> PlanningFailure {
    error!("Solver contract violated: {}", message);
    PlanningFailure::InternalConsistencyViolation(message)
}
