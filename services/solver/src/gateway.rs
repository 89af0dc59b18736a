//! The client-facing surface of the solver
//!
//! What the outside world (role agents, the HTTP/WebSocket tail) may do:
//! post offers, make the party calls of the deal lifecycle, read the
//! store's query surface, and subscribe to the event stream. The wire
//! transport and request signing live outside the core; this in-process
//! gateway is what that transport fronts, and what tests and dev mode
//! use directly.

use crate::controller::Controller;
use crate::events::SolverEvent;
use settlement::ChainClient;
use std::sync::Arc;
use store::{DealQuery, JobOfferQuery, ResourceOfferQuery};
use tokio::sync::broadcast;
use types::deal::{Deal, LeaderboardEntry};
use types::decision::MatchDecision;
use types::errors::SolverError;
use types::ids::{DealId, OfferId, TxHash};
use types::offer::{JobOffer, ResourceOffer};
use types::result::JobResult;

/// In-process gateway over a running controller.
pub struct LocalGateway<C: ChainClient> {
    controller: Arc<Controller<C>>,
}

impl<C: ChainClient + 'static> LocalGateway<C> {
    pub fn new(controller: Arc<Controller<C>>) -> Arc<Self> {
        Arc::new(Self { controller })
    }

    // ── Writes ──────────────────────────────────────────────────────

    pub async fn post_job_offer(&self, offer: JobOffer) -> Result<JobOffer, SolverError> {
        self.controller.add_job_offer(offer).await
    }

    pub async fn post_resource_offer(
        &self,
        offer: ResourceOffer,
    ) -> Result<ResourceOffer, SolverError> {
        self.controller.add_resource_offer(offer).await
    }

    pub async fn agree_job_creator(&self, deal_id: &DealId) -> Result<TxHash, SolverError> {
        self.controller.agree_job_creator(deal_id).await
    }

    pub async fn agree_resource_provider(&self, deal_id: &DealId) -> Result<TxHash, SolverError> {
        self.controller.agree_resource_provider(deal_id).await
    }

    pub async fn post_result(
        &self,
        deal_id: &DealId,
        instruction_count: u64,
        data_ref: impl Into<String>,
    ) -> Result<TxHash, SolverError> {
        self.controller
            .post_result(deal_id, instruction_count, data_ref)
            .await
    }

    pub async fn accept_result(&self, deal_id: &DealId) -> Result<TxHash, SolverError> {
        self.controller.accept_result(deal_id).await
    }

    pub async fn challenge_result(&self, deal_id: &DealId) -> Result<TxHash, SolverError> {
        self.controller.challenge_result(deal_id).await
    }

    pub async fn mediate(&self, deal_id: &DealId, accept: bool) -> Result<TxHash, SolverError> {
        self.controller.mediate(deal_id, accept).await
    }

    // ── Reads ───────────────────────────────────────────────────────

    pub fn get_job_offer(&self, id: &OfferId) -> Option<JobOffer> {
        self.controller.store().get_job_offer(id)
    }

    pub fn get_resource_offer(&self, id: &OfferId) -> Option<ResourceOffer> {
        self.controller.store().get_resource_offer(id)
    }

    pub fn get_deal(&self, id: &DealId) -> Option<Deal> {
        self.controller.store().get_deal(id)
    }

    pub fn get_result(&self, deal_id: &DealId) -> Option<JobResult> {
        self.controller.store().get_result(deal_id)
    }

    pub fn get_match_decision(
        &self,
        resource_offer: &OfferId,
        job_offer: &OfferId,
    ) -> Option<MatchDecision> {
        self.controller
            .store()
            .get_match_decision(resource_offer, job_offer)
    }

    pub fn get_job_offers(&self, query: &JobOfferQuery) -> Vec<JobOffer> {
        self.controller.store().get_job_offers(query)
    }

    pub fn get_resource_offers(&self, query: &ResourceOfferQuery) -> Vec<ResourceOffer> {
        self.controller.store().get_resource_offers(query)
    }

    pub fn get_deals(&self, query: &DealQuery) -> Vec<Deal> {
        self.controller.store().get_deals(query)
    }

    pub fn get_leaderboard(&self) -> Vec<LeaderboardEntry> {
        self.controller.store().get_leaderboard_data()
    }

    // ── Subscription ────────────────────────────────────────────────

    pub fn subscribe(&self) -> broadcast::Receiver<SolverEvent> {
        self.controller.subscribe()
    }
}
