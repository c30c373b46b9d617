use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// Type aliases for clarity
pub type ShipId = u32;
pub type BerthId = u32;
pub type ShipClass = u32;
pub type Time = u32;

/// A ship waiting to be berthed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ship {
    pub id: ShipId,
    pub length: f64,
    pub draft: f64,
    pub processing_duration: Time,
    pub ship_class: ShipClass,
}

/// A docking position at the terminal.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Berth {
    pub id: BerthId,
    pub length_capacity: f64,
    pub draft_capacity: f64,
    pub supported_classes: BTreeSet<ShipClass>,
}

/// Terminal verdict of the solving capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    Optimal,
    Feasible,
    Infeasible,
    Unknown,
}

impl SolveStatus {
    /// `Optimal` and `Feasible` both carry a usable assignment.
    pub fn has_solution(self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "OPTIMAL"),
            SolveStatus::Feasible => write!(f, "FEASIBLE"),
            SolveStatus::Infeasible => write!(f, "INFEASIBLE"),
            SolveStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Where and when a single ship is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Berthing {
    pub berth_id: BerthId,
    pub arrival: Time,
    pub departure: Time,
}

impl fmt::Display for Berthing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "berth {} [{}, {})",
            self.berth_id, self.arrival, self.departure
        )
    }
}

/// The solved plan: one berthing per ship id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub status: SolveStatus,
    pub berthings: BTreeMap<ShipId, Berthing>,
}

impl Schedule {
    pub fn new(status: SolveStatus) -> Self {
        Self {
            status,
            berthings: BTreeMap::new(),
        }
    }

    pub fn get(&self, ship: ShipId) -> Option<&Berthing> {
        self.berthings.get(&ship)
    }

    pub fn len(&self) -> usize {
        self.berthings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.berthings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ShipId, &Berthing)> {
        self.berthings.iter().map(|(id, b)| (*id, b))
    }

    /// Ships moored at `berth`, in ship id order.
    pub fn ships_at(&self, berth: BerthId) -> Vec<ShipId> {
        self.iter()
            .filter(|(_, b)| b.berth_id == berth)
            .map(|(id, _)| id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_in_upper_case() {
        let json = serde_json::to_string(&SolveStatus::Infeasible).unwrap();
        assert_eq!(json, "\"INFEASIBLE\"");
        assert!(SolveStatus::Feasible.has_solution());
        assert!(!SolveStatus::Unknown.has_solution());
    }

    #[test]
    fn ships_at_filters_by_berth() {
        let mut schedule = Schedule::new(SolveStatus::Optimal);
        schedule.berthings.insert(
            3,
            Berthing {
                berth_id: 1,
                arrival: 0,
                departure: 4,
            },
        );
        schedule.berthings.insert(
            2,
            Berthing {
                berth_id: 1,
                arrival: 2,
                departure: 3,
            },
        );
        schedule.berthings.insert(
            5,
            Berthing {
                berth_id: 9,
                arrival: 0,
                departure: 1,
            },
        );
        assert_eq!(schedule.ships_at(1), vec![2, 3]);
        assert_eq!(schedule.len(), 3);
        assert_eq!(schedule.get(5).map(|b| b.berth_id), Some(9));
    }
}
