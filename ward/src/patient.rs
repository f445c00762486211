//! Patient actor: walks a route of areas, one treatment at a time.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::area::BoundedArea;
use crate::cancel::CancelToken;

/// Unique identifier for a patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(uuid::Uuid);

impl PatientId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(uuid::Uuid::parse_str(s)?))
    }
}

impl Default for PatientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PatientStatus {
    Treated,
    /// Stopped while waiting for, or being treated in, `area`.
    Cancelled { area: String },
}

/// What happened to a patient by the time `run` returned.
#[derive(Debug, Clone, Serialize)]
pub struct PatientOutcome {
    pub id: PatientId,
    pub number: u32,
    /// Areas whose treatment completed, in order.
    pub visited: Vec<String>,
    pub elapsed_ms: u64,
    #[serde(flatten)]
    pub status: PatientStatus,
}

pub struct Patient {
    id: PatientId,
    number: u32,
    route: Vec<Arc<BoundedArea>>,
    cancel: CancelToken,
}

impl Patient {
    pub fn new(number: u32, route: Vec<Arc<BoundedArea>>) -> Self {
        Self {
            id: PatientId::new(),
            number,
            route,
            cancel: CancelToken::new(),
        }
    }

    pub fn id(&self) -> PatientId {
        self.id
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn route(&self) -> &[Arc<BoundedArea>] {
        &self.route
    }

    /// Token that stops this patient wherever it is blocked.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Walk the route. Blocks the calling thread.
    pub fn run(&self) -> PatientOutcome {
        let started = Instant::now();
        let mut visited = Vec::with_capacity(self.route.len());

        let status = self.walk(&mut visited);
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match &status {
            PatientStatus::Treated => {
                tracing::info!(patient = %self, elapsed_ms, "Patient treated");
            }
            PatientStatus::Cancelled { area } => {
                tracing::warn!(patient = %self, area = %area, "Patient cancelled");
            }
        }

        PatientOutcome {
            id: self.id,
            number: self.number,
            visited,
            elapsed_ms,
            status,
        }
    }

    fn walk(&self, visited: &mut Vec<String>) -> PatientStatus {
        for area in &self.route {
            let occupancy = match area.occupy(self, &self.cancel) {
                Ok(occupancy) => occupancy,
                Err(e) => {
                    return PatientStatus::Cancelled {
                        area: e.area().to_string(),
                    };
                }
            };

            tracing::debug!(patient = %self, area = %area, time = ?area.time(), "Treatment started");
            if self.cancel.sleep(area.time()).is_err() {
                // Dropping the occupancy releases the slot.
                drop(occupancy);
                return PatientStatus::Cancelled {
                    area: area.name().to_string(),
                };
            }

            occupancy.release();
            visited.push(area.name().to_string());
        }
        PatientStatus::Treated
    }
}

impl fmt::Display for Patient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Patient #{}", self.number)
    }
}

impl fmt::Debug for Patient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let route: Vec<&str> = self.route.iter().map(|a| a.name()).collect();
        f.debug_struct("Patient")
            .field("id", &self.id)
            .field("number", &self.number)
            .field("route", &route)
            .finish()
    }
}
