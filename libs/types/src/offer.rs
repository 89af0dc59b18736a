//! Job and resource offers
//!
//! A job creator posts a `JobOffer` (work plus a price ceiling); a
//! resource provider posts a `ResourceOffer` (capacity plus a unit
//! price). Once matched, an offer carries the deal id and tracks the
//! deal's state; an offer with a deal id is never matched again.

use crate::errors::SolverError;
use crate::ids::{Address, DealId, OfferId};
use crate::numeric::TokenAmount;
use crate::state::AgreementState;
use serde::{Deserialize, Serialize};

/// Compute capacity, declared by providers and demanded by jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capacity {
    pub cpu_millis: u64,
    pub memory_mb: u64,
    pub gpu_count: u64,
}

impl Capacity {
    /// Check that this capacity satisfies `demand` on every axis.
    pub fn covers(&self, demand: &Capacity) -> bool {
        self.cpu_millis >= demand.cpu_millis
            && self.memory_mb >= demand.memory_mb
            && self.gpu_count >= demand.gpu_count
    }
}

/// Collateral a job creator commits to when posting a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCollateral {
    /// Locked on agree; pays the job cost on success.
    pub payment: TokenAmount,
    /// Locked on agree; slashed if the job creator fails to judge in time.
    pub timeout: TokenAmount,
}

/// Collateral a resource provider commits to when posting capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCollateral {
    /// Locked on result submission; slashed if mediation rejects.
    pub results: TokenAmount,
    /// Locked on agree; slashed if the provider fails to submit in time.
    pub timeout: TokenAmount,
}

/// Work posted by a job creator, waiting to be matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOffer {
    pub id: OfferId,
    pub job_creator: Address,
    /// Opaque module reference describing the work (interpreted by the RP).
    pub module: String,
    pub demand: Capacity,
    /// Highest unit price the creator will pay.
    pub max_price: TokenAmount,
    pub collateral: JobCollateral,
    /// Unix seconds.
    pub created_at: i64,
    /// Set once matched; a matched offer is never matched again.
    pub deal_id: Option<DealId>,
    pub state: AgreementState,
}

impl JobOffer {
    /// Build a new unmatched offer; the id is the hash of the offer body.
    pub fn new(
        job_creator: Address,
        module: impl Into<String>,
        demand: Capacity,
        max_price: TokenAmount,
        collateral: JobCollateral,
        created_at: i64,
    ) -> Self {
        let module = module.into();
        let id = OfferId::from_content(
            format!(
                "job:{}:{}:{}:{}:{}",
                job_creator, module, demand.cpu_millis, max_price, created_at
            )
            .as_bytes(),
        );
        Self {
            id,
            job_creator,
            module,
            demand,
            max_price,
            collateral,
            created_at,
            deal_id: None,
            state: AgreementState::DealNegotiating,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.deal_id.is_some()
    }

    /// Reject structurally invalid offers before they reach the store.
    pub fn validate(&self) -> Result<(), SolverError> {
        if self.module.is_empty() {
            return Err(SolverError::Validation("job offer has no module".into()));
        }
        if self.max_price.is_zero() {
            return Err(SolverError::Validation(
                "job offer max price must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Capacity posted by a resource provider, waiting to be matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceOffer {
    pub id: OfferId,
    pub resource_provider: Address,
    pub capacity: Capacity,
    /// Price per instruction.
    pub unit_price: TokenAmount,
    pub collateral: ResourceCollateral,
    /// Unix seconds.
    pub created_at: i64,
    pub deal_id: Option<DealId>,
    pub state: AgreementState,
}

impl ResourceOffer {
    pub fn new(
        resource_provider: Address,
        capacity: Capacity,
        unit_price: TokenAmount,
        collateral: ResourceCollateral,
        created_at: i64,
    ) -> Self {
        let id = OfferId::from_content(
            format!(
                "resource:{}:{}:{}:{}:{}",
                resource_provider,
                capacity.cpu_millis,
                capacity.memory_mb,
                unit_price,
                created_at
            )
            .as_bytes(),
        );
        Self {
            id,
            resource_provider,
            capacity,
            unit_price,
            collateral,
            created_at,
            deal_id: None,
            state: AgreementState::DealNegotiating,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.deal_id.is_some()
    }

    pub fn validate(&self) -> Result<(), SolverError> {
        if self.unit_price.is_zero() {
            return Err(SolverError::Validation(
                "resource offer unit price must be positive".into(),
            ));
        }
        Ok(())
    }
}
