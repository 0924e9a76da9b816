//! Tiered report assembly and the cumulative last-known-value report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use crate::types::{Frame, Param, PollingTier};

/// Parameter values keyed by identifier, tagged with the tier that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub tier: PollingTier,
    pub completed_at: DateTime<Utc>,
    pub values: BTreeMap<Param, Frame>,
}

impl Report {
    /// Empty aggregate report
    pub fn empty() -> Self {
        Report {
            tier: PollingTier::Aggregate,
            completed_at: Utc::now(),
            values: BTreeMap::new(),
        }
    }

    /// Overwrite or insert every entry of `other`.
    ///
    /// Last merge wins per identifier, so reports must be merged in arrival order.
    pub fn merge(&mut self, other: &Report) {
        for (&param, &frame) in &other.values {
            self.values.insert(param, frame);
        }
        self.completed_at = other.completed_at;
    }

    pub fn get(&self, param: Param) -> Option<Frame> {
        self.values.get(&param).copied()
    }

    /// Decoded value for `param`
    pub fn value(&self, param: Param) -> Option<u16> {
        self.get(param).map(|frame| frame.value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Tracks one in-flight report: what is left to request and what has arrived.
///
/// Frames may arrive in any order. The key set of `received` is fixed at construction.
#[derive(Debug, Clone)]
pub struct ReportAssembler {
    tier: PollingTier,
    pending: VecDeque<Param>,
    received: BTreeMap<Param, Option<Frame>>,
    completed: bool,
}

impl ReportAssembler {
    pub fn new(tier: PollingTier) -> Self {
        Self::with_params(tier, &tier.params())
    }

    /// Assembler over an explicit target set. Repeated identifiers are requested once.
    pub fn with_params(tier: PollingTier, params: &[Param]) -> Self {
        let mut pending = VecDeque::with_capacity(params.len());
        let mut received = BTreeMap::new();
        for &param in params {
            if received.insert(param, None).is_none() {
                pending.push_back(param);
            }
        }

        ReportAssembler {
            tier,
            pending,
            received,
            completed: false,
        }
    }

    pub fn tier(&self) -> PollingTier {
        self.tier
    }

    /// Next identifier to request, in construction order. `None` once exhausted.
    pub fn next_request(&mut self) -> Option<Param> {
        self.pending.pop_front()
    }

    /// True once every target identifier has been handed out by `next_request`
    pub fn is_exhausted(&self) -> bool {
        self.pending.is_empty()
    }

    /// Target identifiers still without a frame
    pub fn missing(&self) -> Vec<Param> {
        self.received
            .iter()
            .filter(|(_, frame)| frame.is_none())
            .map(|(&param, _)| param)
            .collect()
    }

    /// Record `frame`; returns the finished report on the submission that completes it.
    ///
    /// Frames for identifiers outside the target set are ignored, as is everything
    /// submitted after completion.
    pub fn submit(&mut self, frame: Frame) -> Option<Report> {
        if self.completed {
            return None;
        }

        let param = frame.param()?;
        let slot = self.received.get_mut(&param)?;
        *slot = Some(frame);

        if self.received.values().any(Option::is_none) {
            return None;
        }

        self.completed = true;
        let values = self
            .received
            .iter()
            .filter_map(|(&param, frame)| frame.map(|frame| (param, frame)))
            .collect();

        Some(Report {
            tier: self.tier,
            completed_at: Utc::now(),
            values,
        })
    }
}
