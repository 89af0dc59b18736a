//! The controller
//!
//! Orchestrates the marketplace: ingests offers, runs the matcher,
//! creates deals, submits lifecycle transitions through the settlement
//! engine, and folds confirmed chain events back into the store.
//!
//! Per deal the controller owns a serializer: every event for a deal id
//! goes through that deal's inbox and is handled by a single task, so
//! same-deal events apply in arrival order while distinct deals progress
//! in parallel. Confirmed chain events are the only thing that advances
//! a deal; a submission that never confirms changes nothing.

use crate::config::ControllerConfig;
use crate::events::{SolverEvent, SolverEventPayload};
use crate::unix_now;
use dashmap::DashMap;
use matcher::{match_offers, MatchProposal};
use settlement::{
    ChainClient, ChainEvent, DealTerms, SettlementEngine, SettlementError, Transition,
};
use std::sync::Arc;
use std::time::Duration;
use store::{DealQuery, JobOfferQuery, ResourceOfferQuery, SolverStore};
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use types::deal::{Deal, JobCreatorTxs, MediatorTxs, ResourceProviderTxs};
use types::errors::SolverError;
use types::ids::{Address, DealId, TxHash};
use types::offer::{JobOffer, ResourceOffer};
use types::result::JobResult;
use types::state::AgreementState;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// One item in a deal's serializer inbox.
enum DealEvent {
    /// A confirmed on-chain transition.
    Chain(ChainEvent),
    /// A deadline elapsed for the deal's current state.
    Timeout(Transition),
}

/// The marketplace orchestrator.
pub struct Controller<C: ChainClient> {
    store: Arc<SolverStore>,
    engine: SettlementEngine<C>,
    config: ControllerConfig,
    events_tx: broadcast::Sender<SolverEvent>,
    inboxes: DashMap<DealId, mpsc::UnboundedSender<DealEvent>>,
    /// Serializes matching passes; offers arriving concurrently queue up.
    match_lock: Mutex<()>,
}

impl<C: ChainClient + 'static> Controller<C> {
    pub fn new(
        store: Arc<SolverStore>,
        engine: SettlementEngine<C>,
        config: ControllerConfig,
    ) -> Arc<Self> {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            store,
            engine,
            config,
            events_tx,
            inboxes: DashMap::new(),
            match_lock: Mutex::new(()),
        })
    }

    pub fn store(&self) -> &Arc<SolverStore> {
        &self.store
    }

    /// Subscribe to republished state changes.
    pub fn subscribe(&self) -> broadcast::Receiver<SolverEvent> {
        self.events_tx.subscribe()
    }

    // ── Ingest ──────────────────────────────────────────────────────

    /// Ingest a job offer and run a matching pass.
    pub async fn add_job_offer(&self, offer: JobOffer) -> Result<JobOffer, SolverError> {
        offer.validate()?;
        if let Some(existing) = self.store.get_job_offer(&offer.id) {
            if existing.is_matched() {
                return Err(SolverError::Conflict(format!(
                    "job offer {} is already matched",
                    offer.id
                )));
            }
        }
        let offer = self.store.add_job_offer(offer)?;
        info!(offer_id = %offer.id, job_creator = %offer.job_creator, "job offer added");
        self.publish(SolverEventPayload::JobOfferAdded(offer.clone()));
        self.run_match_pass().await;
        Ok(offer)
    }

    /// Ingest a resource offer and run a matching pass.
    pub async fn add_resource_offer(
        &self,
        offer: ResourceOffer,
    ) -> Result<ResourceOffer, SolverError> {
        offer.validate()?;
        if let Some(existing) = self.store.get_resource_offer(&offer.id) {
            if existing.is_matched() {
                return Err(SolverError::Conflict(format!(
                    "resource offer {} is already matched",
                    offer.id
                )));
            }
        }
        let offer = self.store.add_resource_offer(offer)?;
        info!(
            offer_id = %offer.id,
            resource_provider = %offer.resource_provider,
            "resource offer added"
        );
        self.publish(SolverEventPayload::ResourceOfferAdded(offer.clone()));
        self.run_match_pass().await;
        Ok(offer)
    }

    // ── Matching ────────────────────────────────────────────────────

    /// Run one matching pass over the unmatched offers.
    pub async fn run_match_pass(&self) {
        let _guard = self.match_lock.lock().await;
        let now = unix_now();

        let jobs = self.store.get_job_offers(&JobOfferQuery {
            not_matched: true,
            ..Default::default()
        });
        let resources = self.store.get_resource_offers(&ResourceOfferQuery {
            not_matched: true,
            ..Default::default()
        });
        let outcome = match_offers(&jobs, &resources, |ro, jo| {
            self.store.get_match_decision(ro, jo).is_some()
        });

        for rejected in outcome.rejections {
            match self.store.add_match_decision(
                rejected.resource_offer,
                rejected.job_offer,
                None,
                false,
                now,
            ) {
                Ok(decision) => self.publish(SolverEventPayload::DecisionRecorded(decision)),
                Err(SolverError::Conflict(_)) => {}
                Err(e) => warn!(error = %e, "failed to record rejected decision"),
            }
        }

        for proposal in outcome.proposals {
            if let Err(e) = self.create_deal(&proposal, now).await {
                error!(
                    job_offer = %proposal.job_offer.id,
                    resource_offer = %proposal.resource_offer.id,
                    error = %e,
                    "deal creation failed"
                );
            }
        }
    }

    async fn create_deal(&self, proposal: &MatchProposal, now: i64) -> Result<(), SolverError> {
        let deal = Deal::from_offers(
            &proposal.job_offer,
            &proposal.resource_offer,
            self.config.mediation_fee,
            now,
        );

        // the write-once decision is the guard against double-matching
        match self.store.add_match_decision(
            proposal.resource_offer.id.clone(),
            proposal.job_offer.id.clone(),
            Some(deal.id.clone()),
            true,
            now,
        ) {
            Ok(decision) => self.publish(SolverEventPayload::DecisionRecorded(decision)),
            Err(SolverError::Conflict(_)) => {
                debug!(deal_id = %deal.id, "pair already decided, skipping");
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        let deal = self.store.add_deal(deal)?;
        self.store.update_job_offer_state(
            &proposal.job_offer.id,
            deal.id.clone(),
            AgreementState::DealNegotiating,
        )?;
        self.store.update_resource_offer_state(
            &proposal.resource_offer.id,
            deal.id.clone(),
            AgreementState::DealNegotiating,
        )?;

        match self.engine.register_deal(&DealTerms::from_deal(&deal)).await {
            Ok(_) => {}
            // an already-registered deal is fine (replay after restart)
            Err(SettlementError::Rejected { reason, .. }) => {
                warn!(deal_id = %deal.id, reason = %reason, "deal registration rejected");
            }
            Err(e) => return Err(chain_err(e)),
        }

        info!(
            deal_id = %deal.id,
            job_creator = %deal.job_creator,
            resource_provider = %deal.resource_provider,
            "deal created"
        );
        self.publish(SolverEventPayload::DealCreated(deal));
        Ok(())
    }

    // ── Party calls ─────────────────────────────────────────────────

    /// The job creator's agree call.
    pub async fn agree_job_creator(&self, deal_id: &DealId) -> Result<TxHash, SolverError> {
        let deal = self.deal(deal_id)?;
        if let Some(tx) = &deal.transactions.job_creator.agree {
            return Ok(tx.clone());
        }
        let party = deal.job_creator.clone();
        self.submit(&deal, Transition::AgreeJobCreator, party).await
    }

    /// The resource provider's agree call.
    pub async fn agree_resource_provider(&self, deal_id: &DealId) -> Result<TxHash, SolverError> {
        let deal = self.deal(deal_id)?;
        if let Some(tx) = &deal.transactions.resource_provider.agree {
            return Ok(tx.clone());
        }
        let party = deal.resource_provider.clone();
        self.submit(&deal, Transition::AgreeResourceProvider, party)
            .await
    }

    /// The resource provider posts a result.
    pub async fn post_result(
        &self,
        deal_id: &DealId,
        instruction_count: u64,
        data_ref: impl Into<String>,
    ) -> Result<TxHash, SolverError> {
        let data_ref = data_ref.into();
        JobResult::new(deal_id.clone(), instruction_count, data_ref.clone(), 0).validate()?;
        let deal = self.deal(deal_id)?;
        if let Some(tx) = &deal.transactions.resource_provider.add_result {
            return Ok(tx.clone());
        }
        let party = deal.resource_provider.clone();
        self.submit(
            &deal,
            Transition::AddResult {
                instruction_count,
                data_ref,
            },
            party,
        )
        .await
    }

    /// The job creator accepts the submitted result.
    pub async fn accept_result(&self, deal_id: &DealId) -> Result<TxHash, SolverError> {
        let deal = self.deal(deal_id)?;
        if let Some(tx) = &deal.transactions.job_creator.accept_result {
            return Ok(tx.clone());
        }
        let party = deal.job_creator.clone();
        self.submit(&deal, Transition::AcceptResult, party).await
    }

    /// The job creator challenges the submitted result.
    pub async fn challenge_result(&self, deal_id: &DealId) -> Result<TxHash, SolverError> {
        let deal = self.deal(deal_id)?;
        if let Some(tx) = &deal.transactions.job_creator.challenge_result {
            return Ok(tx.clone());
        }
        let party = deal.job_creator.clone();
        self.submit(&deal, Transition::ChallengeResult, party).await
    }

    /// The mediator rules on a challenged result.
    pub async fn mediate(&self, deal_id: &DealId, accept: bool) -> Result<TxHash, SolverError> {
        let deal = self.deal(deal_id)?;
        let recorded = if accept {
            &deal.transactions.mediator.mediation_accept_result
        } else {
            &deal.transactions.mediator.mediation_reject_result
        };
        if let Some(tx) = recorded {
            return Ok(tx.clone());
        }
        let party = deal
            .mediator
            .clone()
            .ok_or_else(|| SolverError::Validation(format!("deal {} has no mediator", deal_id)))?;
        let transition = if accept {
            Transition::MediationAcceptResult
        } else {
            Transition::MediationRejectResult
        };
        self.submit(&deal, transition, party).await
    }

    fn deal(&self, deal_id: &DealId) -> Result<Deal, SolverError> {
        self.store
            .get_deal(deal_id)
            .ok_or_else(|| SolverError::NotFound(format!("deal {}", deal_id)))
    }

    async fn submit(
        &self,
        deal: &Deal,
        transition: Transition,
        party: Address,
    ) -> Result<TxHash, SolverError> {
        if deal.state != transition.required_state() {
            return Err(SolverError::Conflict(format!(
                "deal {} is in state {}, {} requires {}",
                deal.id,
                deal.state,
                transition.name(),
                transition.required_state()
            )));
        }
        let terms = DealTerms::from_deal(deal);
        self.engine
            .submit(&terms, &transition, &party)
            .await
            .map_err(|e| {
                if matches!(e, SettlementError::Rejected { .. }) {
                    error!(
                        alert = true,
                        deal_id = %deal.id,
                        transition = transition.name(),
                        error = %e,
                        "chain rejected transition"
                    );
                }
                chain_err(e)
            })
    }

    // ── Background tasks ────────────────────────────────────────────

    /// Spawn the chain event pump and the timeout ticker.
    ///
    /// Both unwind promptly when the shutdown signal flips.
    pub fn start(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        let ctrl = Arc::clone(self);
        let mut shutdown_rx = shutdown.clone();
        let mut events = self.engine.events();
        handles.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    event = events.recv() => match event {
                        Ok(ev) => ctrl.dispatch(ev.deal_id.clone(), DealEvent::Chain(ev)),
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(missed, "chain event stream lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }));

        let ctrl = Arc::clone(self);
        let mut shutdown_rx = shutdown;
        handles.push(tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_millis(ctrl.config.tick_interval_ms));
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => ctrl.scan_timeouts(),
                }
            }
        }));

        handles
    }

    /// Fire timeout events for every deal whose state deadline passed.
    fn scan_timeouts(self: &Arc<Self>) {
        let now = unix_now();
        for deal in self.store.get_deals(&DealQuery::default()) {
            let Some(window) = self.config.timeouts.window_for(deal.state) else {
                continue;
            };
            if now - deal.state_entered_at < window {
                continue;
            }
            let transition = match deal.state {
                AgreementState::DealNegotiating => Transition::TimeoutAgree,
                AgreementState::DealAgreed => Transition::TimeoutSubmitResults,
                AgreementState::ResultsSubmitted => Transition::TimeoutJudgeResults,
                AgreementState::Mediating => Transition::TimeoutMediateResult,
                _ => continue,
            };
            self.dispatch(deal.id.clone(), DealEvent::Timeout(transition));
        }
    }

    // ── Per-deal serializer ─────────────────────────────────────────

    /// Route an event into the deal's inbox, creating its worker on
    /// first use.
    fn dispatch(self: &Arc<Self>, deal_id: DealId, event: DealEvent) {
        let sender = self
            .inboxes
            .entry(deal_id.clone())
            .or_insert_with(|| {
                let (tx, mut rx) = mpsc::unbounded_channel::<DealEvent>();
                let ctrl = Arc::clone(self);
                let id = deal_id.clone();
                tokio::spawn(async move {
                    while let Some(event) = rx.recv().await {
                        if let Err(e) = ctrl.handle_deal_event(&id, event).await {
                            error!(deal_id = %id, error = %e, "deal event handling failed");
                        }
                    }
                });
                tx
            })
            .clone();
        // send only fails if the worker is gone, which means the deal is
        // terminal and the event is stale
        let _ = sender.send(event);
    }

    async fn handle_deal_event(&self, deal_id: &DealId, event: DealEvent) -> Result<(), SolverError> {
        match event {
            DealEvent::Chain(ev) => self.apply_confirmed(deal_id, ev).await,
            DealEvent::Timeout(transition) => self.fire_timeout(deal_id, transition).await,
        }
    }

    /// Submit a timeout transition if the deal is still overdue.
    async fn fire_timeout(
        &self,
        deal_id: &DealId,
        transition: Transition,
    ) -> Result<(), SolverError> {
        let Some(deal) = self.store.get_deal(deal_id) else {
            return Ok(());
        };
        // the deal may have advanced since the tick enqueued this
        if deal.state != transition.required_state() {
            return Ok(());
        }
        if let Some(window) = self.config.timeouts.window_for(deal.state) {
            if unix_now() - deal.state_entered_at < window {
                return Ok(());
            }
        }

        info!(deal_id = %deal_id, transition = transition.name(), "deadline elapsed");
        let terms = DealTerms::from_deal(&deal);
        match self
            .engine
            .submit(&terms, &transition, &self.config.solver_address)
            .await
        {
            Ok(_) => {}
            Err(SettlementError::Rejected { reason, .. }) => {
                // the chain view advanced past ours; the confirmation
                // that explains it is on its way
                warn!(deal_id = %deal_id, reason = %reason, "timeout submission rejected");
            }
            Err(e) => {
                // transient budget spent; the next tick retries
                warn!(deal_id = %deal_id, error = %e, "timeout submission failed");
            }
        }
        Ok(())
    }

    /// Fold one confirmed chain event into the store.
    async fn apply_confirmed(&self, deal_id: &DealId, ev: ChainEvent) -> Result<(), SolverError> {
        let Some(deal) = self.store.get_deal(deal_id) else {
            warn!(deal_id = %deal_id, "confirmed event for unknown deal");
            return Ok(());
        };

        if transition_recorded(&deal, &ev.transition) {
            debug!(
                deal_id = %deal_id,
                transition = ev.transition.name(),
                "duplicate confirmation ignored"
            );
            return Ok(());
        }

        let now = unix_now();
        self.record_transition(deal_id, &ev, now)?;

        let deal = self.deal(deal_id)?;
        if ev.new_state != deal.state {
            if !deal.state.can_advance_to(ev.new_state) {
                error!(
                    alert = true,
                    deal_id = %deal_id,
                    from = %deal.state,
                    to = %ev.new_state,
                    "confirmed event would move state backward; ignoring"
                );
                return Ok(());
            }
            self.store.update_deal_state(deal_id, ev.new_state, now)?;
            // offers track their deal's state
            if let Err(e) = self.store.update_job_offer_state(
                &deal.job_offer,
                deal_id.clone(),
                ev.new_state,
            ) {
                warn!(deal_id = %deal_id, error = %e, "job offer state update skipped");
            }
            if let Err(e) = self.store.update_resource_offer_state(
                &deal.resource_offer,
                deal_id.clone(),
                ev.new_state,
            ) {
                warn!(deal_id = %deal_id, error = %e, "resource offer state update skipped");
            }
        }

        for payment in &ev.payments {
            self.publish(SolverEventPayload::Payment(payment.clone()));
        }
        let updated = self.deal(deal_id)?;
        info!(
            deal_id = %deal_id,
            transition = ev.transition.name(),
            state = %updated.state,
            "transition applied"
        );
        self.publish(SolverEventPayload::DealUpdated(updated));

        // a confirmed challenge gets a mediator assigned right away
        if matches!(ev.transition, Transition::ChallengeResult) {
            self.assign_mediator(deal_id).await;
        }

        if ev.new_state.is_terminal() {
            self.inboxes.remove(deal_id);
        }
        Ok(())
    }

    /// Record the confirmed call's tx hash and side data.
    fn record_transition(
        &self,
        deal_id: &DealId,
        ev: &ChainEvent,
        now: i64,
    ) -> Result<(), SolverError> {
        let tx = Some(ev.tx.clone());
        match &ev.transition {
            Transition::AgreeResourceProvider => {
                self.store.update_deal_txs_resource_provider(
                    deal_id,
                    ResourceProviderTxs {
                        agree: tx,
                        ..Default::default()
                    },
                )?;
            }
            Transition::AgreeJobCreator => {
                self.store.update_deal_txs_job_creator(
                    deal_id,
                    JobCreatorTxs {
                        agree: tx,
                        ..Default::default()
                    },
                )?;
            }
            Transition::AddResult {
                instruction_count,
                data_ref,
            } => {
                self.store.update_deal_txs_resource_provider(
                    deal_id,
                    ResourceProviderTxs {
                        add_result: tx,
                        ..Default::default()
                    },
                )?;
                self.store.update_deal_cost(deal_id, *instruction_count)?;
                self.store.add_result(JobResult::new(
                    deal_id.clone(),
                    *instruction_count,
                    data_ref.clone(),
                    now,
                ))?;
            }
            Transition::AcceptResult => {
                self.store.update_deal_txs_job_creator(
                    deal_id,
                    JobCreatorTxs {
                        accept_result: tx,
                        ..Default::default()
                    },
                )?;
            }
            Transition::ChallengeResult => {
                self.store.update_deal_txs_job_creator(
                    deal_id,
                    JobCreatorTxs {
                        challenge_result: tx,
                        ..Default::default()
                    },
                )?;
            }
            Transition::AssignMediator { mediator } => {
                self.store.update_deal_mediator(deal_id, mediator.clone())?;
            }
            Transition::MediationAcceptResult => {
                self.store.update_deal_txs_mediator(
                    deal_id,
                    MediatorTxs {
                        mediation_accept_result: tx,
                        ..Default::default()
                    },
                )?;
            }
            Transition::MediationRejectResult => {
                self.store.update_deal_txs_mediator(
                    deal_id,
                    MediatorTxs {
                        mediation_reject_result: tx,
                        ..Default::default()
                    },
                )?;
            }
            Transition::TimeoutAgree => {
                self.store.update_deal_txs_job_creator(
                    deal_id,
                    JobCreatorTxs {
                        timeout_agree: tx,
                        ..Default::default()
                    },
                )?;
            }
            Transition::TimeoutSubmitResults => {
                self.store.update_deal_txs_job_creator(
                    deal_id,
                    JobCreatorTxs {
                        timeout_submit_results: tx,
                        ..Default::default()
                    },
                )?;
            }
            Transition::TimeoutJudgeResults => {
                self.store.update_deal_txs_resource_provider(
                    deal_id,
                    ResourceProviderTxs {
                        timeout_judge_results: tx,
                        ..Default::default()
                    },
                )?;
            }
            Transition::TimeoutMediateResult => {
                self.store.update_deal_txs_job_creator(
                    deal_id,
                    JobCreatorTxs {
                        timeout_mediate_result: tx,
                        ..Default::default()
                    },
                )?;
            }
        }
        Ok(())
    }

    async fn assign_mediator(&self, deal_id: &DealId) {
        let Some(deal) = self.store.get_deal(deal_id) else {
            return;
        };
        let terms = DealTerms::from_deal(&deal);
        let transition = Transition::AssignMediator {
            mediator: self.config.mediator.clone(),
        };
        if let Err(e) = self
            .engine
            .submit(&terms, &transition, &self.config.solver_address)
            .await
        {
            error!(deal_id = %deal_id, error = %e, "mediator assignment failed");
        }
    }

    fn publish(&self, payload: SolverEventPayload) {
        let event = SolverEvent::new(payload, unix_now());
        debug!(event = event.label(), "publishing");
        let _ = self.events_tx.send(event);
    }
}

/// Whether a transition's effect is already present on the deal record.
///
/// Together with the write-once tx slots this makes confirmation
/// handling idempotent per `(deal_id, transition name)`.
fn transition_recorded(deal: &Deal, transition: &Transition) -> bool {
    let txs = &deal.transactions;
    match transition {
        Transition::AgreeResourceProvider => txs.resource_provider.agree.is_some(),
        Transition::AgreeJobCreator => txs.job_creator.agree.is_some(),
        Transition::AddResult { .. } => txs.resource_provider.add_result.is_some(),
        Transition::AcceptResult => txs.job_creator.accept_result.is_some(),
        Transition::ChallengeResult => txs.job_creator.challenge_result.is_some(),
        Transition::AssignMediator { .. } => deal.mediator.is_some(),
        Transition::MediationAcceptResult => txs.mediator.mediation_accept_result.is_some(),
        Transition::MediationRejectResult => txs.mediator.mediation_reject_result.is_some(),
        Transition::TimeoutAgree => txs.job_creator.timeout_agree.is_some(),
        Transition::TimeoutSubmitResults => txs.job_creator.timeout_submit_results.is_some(),
        Transition::TimeoutJudgeResults => txs.resource_provider.timeout_judge_results.is_some(),
        Transition::TimeoutMediateResult => txs.job_creator.timeout_mediate_result.is_some(),
    }
}

fn chain_err(e: SettlementError) -> SolverError {
    match e {
        SettlementError::Rejected { .. } => SolverError::ChainRejected(e.to_string()),
        SettlementError::Transient(_) | SettlementError::Exhausted { .. } => {
            SolverError::Transient(e.to_string())
        }
    }
}
