//! Submitted job results
//!
//! One result per deal, keyed by deal id. The instruction count drives
//! the job cost; the data reference is an opaque CID resolved by the
//! parties, never by the solver.

use crate::errors::SolverError;
use crate::ids::{DealId, ResultId};
use serde::{Deserialize, Serialize};

/// A result posted by the resource provider for a deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub deal_id: DealId,
    pub result_id: ResultId,
    /// Instructions executed; `job_cost = unit_price * instruction_count`.
    pub instruction_count: u64,
    /// Opaque content address of the result artifact.
    pub data_ref: String,
    /// Unix seconds.
    pub submitted_at: i64,
}

impl JobResult {
    pub fn new(
        deal_id: DealId,
        instruction_count: u64,
        data_ref: impl Into<String>,
        submitted_at: i64,
    ) -> Self {
        let data_ref = data_ref.into();
        let result_id =
            ResultId::from_content(format!("{}:{}:{}", deal_id, instruction_count, data_ref).as_bytes());
        Self {
            deal_id,
            result_id,
            instruction_count,
            data_ref,
            submitted_at,
        }
    }

    pub fn validate(&self) -> Result<(), SolverError> {
        if self.instruction_count == 0 {
            return Err(SolverError::Validation(
                "result instruction count must be positive".into(),
            ));
        }
        if self.data_ref.is_empty() {
            return Err(SolverError::Validation("result has no data reference".into()));
        }
        Ok(())
    }
}
