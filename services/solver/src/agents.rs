//! Role agents
//!
//! Thin drivers for the three counterparties, reacting to the solver's
//! event stream: the job creator agrees and judges, the resource
//! provider agrees and submits a result, the mediator rules when asked.
//! Job execution itself and the mediator's verification logic are out of
//! scope, so both are stand-ins configured up front; everything around
//! them — the calls, their ordering, the money — is real.

use crate::events::SolverEventPayload;
use crate::gateway::LocalGateway;
use settlement::ChainClient;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};
use types::deal::Deal;
use types::errors::SolverError;
use types::ids::Address;
use types::offer::{JobOffer, ResourceOffer};
use types::state::AgreementState;

/// How the job creator judges a submitted result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JudgePolicy {
    Accept,
    Challenge,
}

/// How the mediator rules once asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediatorRuling {
    Accept,
    Reject,
}

enum Received {
    Event(SolverEventPayload),
    Shutdown,
}

async fn next_event(
    events: &mut broadcast::Receiver<crate::events::SolverEvent>,
    shutdown: &mut watch::Receiver<bool>,
) -> Received {
    loop {
        tokio::select! {
            _ = shutdown.changed() => return Received::Shutdown,
            event = events.recv() => match event {
                Ok(ev) => return Received::Event(ev.payload),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "agent event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return Received::Shutdown,
            }
        }
    }
}

/// Posts one job offer, agrees when matched, judges the result.
pub struct JobCreatorAgent {
    pub offer: JobOffer,
    pub judge: JudgePolicy,
}

impl JobCreatorAgent {
    /// Drive the offer to a terminal deal state (or shutdown).
    pub async fn run<C: ChainClient + 'static>(
        self,
        gateway: Arc<LocalGateway<C>>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), SolverError> {
        let mut events = gateway.subscribe();
        let offer = gateway.post_job_offer(self.offer).await?;
        info!(offer_id = %offer.id, "job creator: offer posted");

        loop {
            let mine = |deal: &Deal| deal.job_offer == offer.id;
            match next_event(&mut events, &mut shutdown).await {
                Received::Shutdown => return Ok(()),
                Received::Event(SolverEventPayload::DealCreated(deal)) if mine(&deal) => {
                    info!(deal_id = %deal.id, "job creator: agreeing");
                    if let Err(e) = gateway.agree_job_creator(&deal.id).await {
                        warn!(deal_id = %deal.id, error = %e, "job creator: agree failed");
                    }
                }
                Received::Event(SolverEventPayload::DealUpdated(deal)) if mine(&deal) => {
                    if deal.state == AgreementState::ResultsSubmitted {
                        let outcome = match self.judge {
                            JudgePolicy::Accept => gateway.accept_result(&deal.id).await,
                            JudgePolicy::Challenge => gateway.challenge_result(&deal.id).await,
                        };
                        if let Err(e) = outcome {
                            warn!(deal_id = %deal.id, error = %e, "job creator: judging failed");
                        }
                    } else if deal.state.is_terminal() {
                        info!(deal_id = %deal.id, state = %deal.state, "job creator: done");
                        return Ok(());
                    }
                }
                Received::Event(_) => {}
            }
        }
    }
}

/// Posts one resource offer, agrees when matched, submits the result.
pub struct ResourceProviderAgent {
    pub offer: ResourceOffer,
    /// Instruction count the sandbox reports for the job.
    pub instruction_count: u64,
    /// Content address of the produced result artifact.
    pub data_ref: String,
}

impl ResourceProviderAgent {
    pub async fn run<C: ChainClient + 'static>(
        self,
        gateway: Arc<LocalGateway<C>>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), SolverError> {
        let mut events = gateway.subscribe();
        let offer = gateway.post_resource_offer(self.offer).await?;
        info!(offer_id = %offer.id, "resource provider: offer posted");

        loop {
            let mine = |deal: &Deal| deal.resource_offer == offer.id;
            match next_event(&mut events, &mut shutdown).await {
                Received::Shutdown => return Ok(()),
                Received::Event(SolverEventPayload::DealCreated(deal)) if mine(&deal) => {
                    info!(deal_id = %deal.id, "resource provider: agreeing");
                    if let Err(e) = gateway.agree_resource_provider(&deal.id).await {
                        warn!(deal_id = %deal.id, error = %e, "resource provider: agree failed");
                    }
                }
                Received::Event(SolverEventPayload::DealUpdated(deal)) if mine(&deal) => {
                    if deal.state == AgreementState::DealAgreed {
                        info!(
                            deal_id = %deal.id,
                            instruction_count = self.instruction_count,
                            "resource provider: submitting result"
                        );
                        if let Err(e) = gateway
                            .post_result(&deal.id, self.instruction_count, self.data_ref.clone())
                            .await
                        {
                            warn!(deal_id = %deal.id, error = %e, "resource provider: submit failed");
                        }
                    } else if deal.state.is_terminal() {
                        info!(deal_id = %deal.id, state = %deal.state, "resource provider: done");
                        return Ok(());
                    }
                }
                Received::Event(_) => {}
            }
        }
    }
}

/// Rules on every deal mediation it is assigned to.
pub struct MediatorAgent {
    pub address: Address,
    pub ruling: MediatorRuling,
}

impl MediatorAgent {
    /// Serve rulings until shutdown.
    pub async fn run<C: ChainClient + 'static>(
        self,
        gateway: Arc<LocalGateway<C>>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), SolverError> {
        let mut events = gateway.subscribe();
        info!(address = %self.address, "mediator: serving");

        // catch up on mediations assigned before we subscribed
        let pending = gateway.get_deals(&store::DealQuery {
            mediator: Some(self.address.clone()),
            state: Some(AgreementState::Mediating),
            ..Default::default()
        });
        for deal in pending {
            let accept = self.ruling == MediatorRuling::Accept;
            info!(deal_id = %deal.id, accept, "mediator: ruling on pending mediation");
            if let Err(e) = gateway.mediate(&deal.id, accept).await {
                warn!(deal_id = %deal.id, error = %e, "mediator: ruling failed");
            }
        }

        loop {
            match next_event(&mut events, &mut shutdown).await {
                Received::Shutdown => return Ok(()),
                Received::Event(SolverEventPayload::DealUpdated(deal))
                    if deal.state == AgreementState::Mediating
                        && deal.mediator.as_ref() == Some(&self.address) =>
                {
                    let accept = self.ruling == MediatorRuling::Accept;
                    info!(deal_id = %deal.id, accept, "mediator: ruling");
                    if let Err(e) = gateway.mediate(&deal.id, accept).await {
                        warn!(deal_id = %deal.id, error = %e, "mediator: ruling failed");
                    }
                }
                Received::Event(_) => {}
            }
        }
    }
}
