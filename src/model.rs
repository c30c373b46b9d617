//! Constraint model for berth allocation.
//!
//! [`ConstraintModel`] is a small, solver-agnostic CSP: boolean and bounded-integer variables,
//! linear equalities, cardinality constraints over literal ranges, and implications.
//! [`BerthModel::build`] fills one from ship and berth records.

use itertools::Itertools;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::data::{Berth, BerthId, Ship, ShipClass, ShipId, Time};
use crate::error::{PlanningFailure, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoolVar(usize);

impl BoolVar {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntVar(usize);

impl IntVar {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Closed interval `[lower, upper]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntDomain {
    pub lower: i64,
    pub upper: i64,
}

impl IntDomain {
    pub fn new(lower: i64, upper: i64) -> Self {
        Self { lower, upper }
    }

    pub fn contains(self, value: i64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// The boolean variables `start, start + stride, ...`, `len` of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiteralRange {
    start: usize,
    len: usize,
    stride: usize,
}

impl LiteralRange {
    pub fn contiguous(start: BoolVar, len: usize) -> Self {
        Self::strided(start, len, 1)
    }

    pub fn strided(start: BoolVar, len: usize, stride: usize) -> Self {
        Self {
            start: start.0,
            len,
            stride,
        }
    }

    pub fn iter(self) -> impl Iterator<Item = BoolVar> {
        (0..self.len).map(move |j| BoolVar(self.start + j * self.stride))
    }

    fn count_true(self, values: &Valuation) -> Option<usize> {
        self.iter()
            .map(|v| values.boolean(v))
            .try_fold(0, |acc, b| b.map(|b| acc + usize::from(b)))
    }
}

/// Right-hand side of an implication. The operands are record data, so the predicate is
/// decided when the model is built; the solver sees it as a constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    AtMost {
        quantity: &'static str,
        value: f64,
        bound: f64,
    },
    MemberOf {
        class: ShipClass,
        supported: BTreeSet<ShipClass>,
    },
}

impl Predicate {
    pub fn holds(&self) -> bool {
        match self {
            Predicate::AtMost { value, bound, .. } => value <= bound,
            Predicate::MemberOf { class, supported } => supported.contains(class),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::AtMost {
                quantity,
                value,
                bound,
            } => write!(f, "{quantity} {value} <= {bound}"),
            Predicate::MemberOf { class, supported } => {
                write!(f, "class {class} in {{{}}}", supported.iter().join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// `sum(coef * var) == rhs`
    LinearEq { terms: Vec<(IntVar, i64)>, rhs: i64 },
    ExactlyOne(LiteralRange),
    AtLeastOne(LiteralRange),
    /// `literal => predicate`; vacuous when the literal is false.
    Implies { literal: BoolVar, predicate: Predicate },
}

impl Constraint {
    /// `None` when the valuation does not cover a variable the constraint mentions.
    pub fn is_satisfied_by(&self, values: &Valuation) -> Option<bool> {
        match self {
            Constraint::LinearEq { terms, rhs } => {
                let lhs = terms
                    .iter()
                    .map(|(var, coef)| values.integer(*var).map(|v| v * coef))
                    .sum::<Option<i64>>()?;
                Some(lhs == *rhs)
            }
            Constraint::ExactlyOne(range) => range.count_true(values).map(|n| n == 1),
            Constraint::AtLeastOne(range) => range.count_true(values).map(|n| n >= 1),
            Constraint::Implies { literal, predicate } => {
                values.boolean(*literal).map(|on| !on || predicate.holds())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedConstraint {
    pub name: String,
    pub constraint: Constraint,
}

/// Values reported by a solver, indexed by variable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Valuation {
    pub booleans: Vec<bool>,
    pub integers: Vec<i64>,
}

impl Valuation {
    pub fn boolean(&self, var: BoolVar) -> Option<bool> {
        self.booleans.get(var.0).copied()
    }

    pub fn integer(&self, var: IntVar) -> Option<i64> {
        self.integers.get(var.0).copied()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConstraintModel {
    bool_vars: Vec<String>,
    int_vars: Vec<(String, IntDomain)>,
    constraints: Vec<NamedConstraint>,
}

impl ConstraintModel {
    pub fn bool_vars(&self) -> impl Iterator<Item = (BoolVar, &str)> {
        self.bool_vars
            .iter()
            .enumerate()
            .map(|(i, name)| (BoolVar(i), name.as_str()))
    }

    pub fn int_vars(&self) -> impl Iterator<Item = (IntVar, &str, IntDomain)> {
        self.int_vars
            .iter()
            .enumerate()
            .map(|(i, (name, domain))| (IntVar(i), name.as_str(), *domain))
    }

    pub fn constraints(&self) -> &[NamedConstraint] {
        &self.constraints
    }

    pub fn num_bool_vars(&self) -> usize {
        self.bool_vars.len()
    }

    pub fn num_int_vars(&self) -> usize {
        self.int_vars.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Describes the first domain or constraint the valuation breaks, if any.
    pub fn first_violation(&self, values: &Valuation) -> Option<String> {
        if values.booleans.len() != self.bool_vars.len()
            || values.integers.len() != self.int_vars.len()
        {
            return Some(format!(
                "expected {} boolean and {} integer values, got {} and {}",
                self.bool_vars.len(),
                self.int_vars.len(),
                values.booleans.len(),
                values.integers.len()
            ));
        }

        for ((name, domain), value) in self.int_vars.iter().zip(&values.integers) {
            if !domain.contains(*value) {
                return Some(format!(
                    "{name} = {value} outside [{}, {}]",
                    domain.lower, domain.upper
                ));
            }
        }

        self.constraints
            .iter()
            .find(|c| c.constraint.is_satisfied_by(values) != Some(true))
            .map(|c| format!("constraint {} is not satisfied", c.name))
    }
}

/// Accumulates variables and constraints for exactly one model.
#[derive(Debug, Default)]
pub struct ModelBuilder {
    model: ConstraintModel,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_bool_var(&mut self, name: impl Into<String>) -> BoolVar {
        self.model.bool_vars.push(name.into());
        BoolVar(self.model.bool_vars.len() - 1)
    }

    pub fn new_int_var(&mut self, name: impl Into<String>, domain: IntDomain) -> IntVar {
        self.model.int_vars.push((name.into(), domain));
        IntVar(self.model.int_vars.len() - 1)
    }

    pub fn add_constraint(&mut self, name: impl Into<String>, constraint: Constraint) {
        self.model.constraints.push(NamedConstraint {
            name: name.into(),
            constraint,
        });
    }

    pub fn build(self) -> ConstraintModel {
        self.model
    }
}

/// Whether every berth must host at least one ship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BerthUtilization {
    #[default]
    EveryBerth,
    Optional,
}

/// A constraint model together with the handles needed to read a schedule back out of it.
#[derive(Debug, Clone)]
pub struct BerthModel {
    model: ConstraintModel,
    ship_ids: Vec<ShipId>,
    berth_ids: Vec<BerthId>,
    durations: Vec<Time>,
    // row-major: ship i, berth k at i * berths + k
    assignments: Vec<BoolVar>,
    arrivals: Vec<IntVar>,
    departures: Vec<IntVar>,
    horizon: Time,
}

impl BerthModel {
    pub fn build(
        ships: &[Ship],
        berths: &[Berth],
        horizon: Time,
        utilization: BerthUtilization,
    ) -> Result<Self> {
        if ships.is_empty() || berths.is_empty() {
            return Err(PlanningFailure::EmptyInstance {
                ships: ships.len(),
                berths: berths.len(),
            });
        }
        if horizon == 0 {
            return Err(PlanningFailure::InvalidHorizon);
        }
        if let Some(id) = ships.iter().map(|s| s.id).duplicates().next() {
            return Err(PlanningFailure::DuplicateRecord { kind: "ship", id });
        }
        if let Some(id) = berths.iter().map(|b| b.id).duplicates().next() {
            return Err(PlanningFailure::DuplicateRecord { kind: "berth", id });
        }

        info!(
            "Building berth model with {} ships, {} berths and horizon {}...",
            ships.len(),
            berths.len(),
            horizon
        );
        let (n, m) = (ships.len(), berths.len());
        let mut builder = ModelBuilder::new();

        // x[i,k] = 1 if ship i is moored at berth k
        let assignments: Vec<BoolVar> = (0..n)
            .cartesian_product(0..m)
            .map(|(i, k)| builder.new_bool_var(format!("x[{i},{k}]")))
            .collect();

        let window = IntDomain::new(0, i64::from(horizon));
        let (arrivals, departures): (Vec<IntVar>, Vec<IntVar>) = (0..n)
            .map(|i| {
                (
                    builder.new_int_var(format!("a[{i}]"), window),
                    builder.new_int_var(format!("d[{i}]"), window),
                )
            })
            .unzip();

        let mut model = Self {
            model: ConstraintModel::default(),
            ship_ids: ships.iter().map(|s| s.id).collect(),
            berth_ids: berths.iter().map(|b| b.id).collect(),
            durations: ships.iter().map(|s| s.processing_duration).collect(),
            assignments,
            arrivals,
            departures,
            horizon,
        };

        // departure = arrival + processing duration, whatever the berth
        for (i, ship) in ships.iter().enumerate() {
            builder.add_constraint(
                format!("duration[ship {}]", ship.id),
                Constraint::LinearEq {
                    terms: vec![(model.departures[i], 1), (model.arrivals[i], -1)],
                    rhs: i64::from(ship.processing_duration),
                },
            );
        }

        for (i, ship) in ships.iter().enumerate() {
            builder.add_constraint(
                format!("cover[ship {}]", ship.id),
                Constraint::ExactlyOne(model.ship_row(i)),
            );
        }

        match utilization {
            BerthUtilization::EveryBerth => {
                for (k, berth) in berths.iter().enumerate() {
                    builder.add_constraint(
                        format!("use[berth {}]", berth.id),
                        Constraint::AtLeastOne(model.berth_column(k)),
                    );
                }
            }
            BerthUtilization::Optional => {
                debug!("Berth utilization is optional; skipping at-least-one constraints.");
            }
        }

        let mut incompatible = 0usize;
        for ((i, ship), (k, berth)) in ships
            .iter()
            .enumerate()
            .cartesian_product(berths.iter().enumerate())
        {
            let literal = model.assignment(i, k);
            for (tag, predicate) in compatibility(ship, berth) {
                if !predicate.holds() {
                    trace!(
                        "Ship {} cannot use berth {}: {} fails.",
                        ship.id, berth.id, predicate
                    );
                    incompatible += 1;
                }
                builder.add_constraint(
                    format!("{tag}[ship {}, berth {}]", ship.id, berth.id),
                    Constraint::Implies { literal, predicate },
                );
            }
        }

        model.model = builder.build();
        trace!(
            "Model has {} boolean variables, {} integer variables and {} constraints ({} failing compatibility checks).",
            model.model.num_bool_vars(),
            model.model.num_int_vars(),
            model.model.num_constraints(),
            incompatible
        );
        Ok(model)
    }

    pub fn constraints(&self) -> &ConstraintModel {
        &self.model
    }

    pub fn ship_count(&self) -> usize {
        self.ship_ids.len()
    }

    pub fn berth_count(&self) -> usize {
        self.berth_ids.len()
    }

    pub fn ship_id(&self, ship: usize) -> ShipId {
        self.ship_ids[ship]
    }

    pub fn berth_id(&self, berth: usize) -> BerthId {
        self.berth_ids[berth]
    }

    pub fn duration(&self, ship: usize) -> Time {
        self.durations[ship]
    }

    pub fn horizon(&self) -> Time {
        self.horizon
    }

    pub fn assignment(&self, ship: usize, berth: usize) -> BoolVar {
        self.assignments[ship * self.berth_count() + berth]
    }

    pub fn arrival(&self, ship: usize) -> IntVar {
        self.arrivals[ship]
    }

    pub fn departure(&self, ship: usize) -> IntVar {
        self.departures[ship]
    }

    /// `x[ship, *]`
    pub fn ship_row(&self, ship: usize) -> LiteralRange {
        LiteralRange::contiguous(self.assignment(ship, 0), self.berth_count())
    }

    /// `x[*, berth]`
    pub fn berth_column(&self, berth: usize) -> LiteralRange {
        LiteralRange::strided(
            self.assignment(0, berth),
            self.ship_count(),
            self.berth_count(),
        )
    }
}

fn compatibility(ship: &Ship, berth: &Berth) -> [(&'static str, Predicate); 3] {
    [
        (
            "length",
            Predicate::AtMost {
                quantity: "length",
                value: ship.length,
                bound: berth.length_capacity,
            },
        ),
        (
            "draft",
            Predicate::AtMost {
                quantity: "draft",
                value: ship.draft,
                bound: berth.draft_capacity,
            },
        ),
        (
            "class",
            Predicate::MemberOf {
                class: ship.ship_class,
                supported: berth.supported_classes.clone(),
            },
        ),
    ]
}
