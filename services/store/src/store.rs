//! The solver store
//!
//! Five tables (job offers, resource offers, deals, decisions, results)
//! behind one multiple-reader / single-writer lock. Every state-changing
//! write appends the record's post-image to the table's log before the
//! call returns; point lookups return `None` for missing keys, never an
//! error. List queries evaluate their optional filters as a conjunction
//! and return results ordered by `(created_at, id)` so a replayed store
//! iterates identically to the live one.

use crate::jsonl::{replay, Durability, JsonlWriter};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;
use types::deal::{
    Deal, JobCreatorTxs, LeaderboardEntry, MediatorTxs, ResourceProviderTxs,
};
use types::decision::MatchDecision;
use types::errors::SolverError;
use types::ids::{Address, DealId, OfferId};
use types::offer::{JobOffer, ResourceOffer};
use types::result::JobResult;
use types::state::AgreementState;

/// Where the five log files live and how durable appends are.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding the `<prefix>_<kind>.jsonl` files.
    pub dir: PathBuf,
    pub prefix: String,
    pub durability: Durability,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/var/tmp"),
            prefix: "gridmatch".to_string(),
            durability: Durability::Buffered,
        }
    }
}

impl StoreConfig {
    fn file(&self, kind: &str) -> PathBuf {
        self.dir.join(format!("{}_{}.jsonl", self.prefix, kind))
    }
}

/// Filters for listing job offers. All set fields must hold.
#[derive(Debug, Clone, Default)]
pub struct JobOfferQuery {
    pub job_creator: Option<Address>,
    pub state: Option<AgreementState>,
    /// Only offers not yet paired into a deal.
    pub not_matched: bool,
}

/// Filters for listing resource offers.
#[derive(Debug, Clone, Default)]
pub struct ResourceOfferQuery {
    pub resource_provider: Option<Address>,
    pub state: Option<AgreementState>,
    pub not_matched: bool,
    /// Only offers whose deal still ties them up.
    pub active: bool,
}

/// Filters for listing deals.
#[derive(Debug, Clone, Default)]
pub struct DealQuery {
    pub job_creator: Option<Address>,
    pub resource_provider: Option<Address>,
    pub mediator: Option<Address>,
    pub state: Option<AgreementState>,
}

struct Logs {
    job_offers: JsonlWriter,
    resource_offers: JsonlWriter,
    deals: JsonlWriter,
    decisions: JsonlWriter,
    results: JsonlWriter,
}

struct Tables {
    job_offers: HashMap<OfferId, JobOffer>,
    resource_offers: HashMap<OfferId, ResourceOffer>,
    deals: HashMap<DealId, Deal>,
    decisions: HashMap<String, MatchDecision>,
    results: HashMap<DealId, JobResult>,
    logs: Logs,
}

/// The process-wide repository of marketplace state.
///
/// The store exclusively owns all entity records; callers hold transient
/// snapshots returned by queries. Log writers are owned for the process
/// lifetime and flushed on `sync`.
pub struct SolverStore {
    inner: RwLock<Tables>,
}

impl SolverStore {
    /// Open the store, replaying each table's log into memory.
    ///
    /// The last line for a given primary key wins; corrupt lines were
    /// already skipped by the replay layer.
    pub fn open(config: StoreConfig) -> Result<Self, SolverError> {
        let job_offers = fold_last_wins(
            replay::<JobOffer>(&config.file("job_offers"))?,
            |o| o.id.clone(),
        );
        let resource_offers = fold_last_wins(
            replay::<ResourceOffer>(&config.file("resource_offers"))?,
            |o| o.id.clone(),
        );
        let deals = fold_last_wins(replay::<Deal>(&config.file("deals"))?, |d| d.id.clone());
        let decisions = fold_last_wins(
            replay::<MatchDecision>(&config.file("decisions"))?,
            |d| d.key(),
        );
        let results = fold_last_wins(replay::<JobResult>(&config.file("results"))?, |r| {
            r.deal_id.clone()
        });

        info!(
            job_offers = job_offers.len(),
            resource_offers = resource_offers.len(),
            deals = deals.len(),
            decisions = decisions.len(),
            results = results.len(),
            dir = %config.dir.display(),
            "store replayed"
        );

        let logs = Logs {
            job_offers: JsonlWriter::open(config.file("job_offers"), config.durability)?,
            resource_offers: JsonlWriter::open(config.file("resource_offers"), config.durability)?,
            deals: JsonlWriter::open(config.file("deals"), config.durability)?,
            decisions: JsonlWriter::open(config.file("decisions"), config.durability)?,
            results: JsonlWriter::open(config.file("results"), config.durability)?,
        };

        Ok(Self {
            inner: RwLock::new(Tables {
                job_offers,
                resource_offers,
                deals,
                decisions,
                results,
                logs,
            }),
        })
    }

    // ── Inserts ─────────────────────────────────────────────────────

    /// Insert (or overwrite) a job offer.
    pub fn add_job_offer(&self, offer: JobOffer) -> Result<JobOffer, SolverError> {
        let mut t = self.inner.write();
        t.logs.job_offers.append(&offer)?;
        t.job_offers.insert(offer.id.clone(), offer.clone());
        Ok(offer)
    }

    /// Insert (or overwrite) a resource offer.
    pub fn add_resource_offer(&self, offer: ResourceOffer) -> Result<ResourceOffer, SolverError> {
        let mut t = self.inner.write();
        t.logs.resource_offers.append(&offer)?;
        t.resource_offers.insert(offer.id.clone(), offer.clone());
        Ok(offer)
    }

    /// Insert (or overwrite) a deal.
    pub fn add_deal(&self, deal: Deal) -> Result<Deal, SolverError> {
        let mut t = self.inner.write();
        t.logs.deals.append(&deal)?;
        t.deals.insert(deal.id.clone(), deal.clone());
        Ok(deal)
    }

    /// Insert (or overwrite) a result, keyed by deal.
    pub fn add_result(&self, result: JobResult) -> Result<JobResult, SolverError> {
        let mut t = self.inner.write();
        t.logs.results.append(&result)?;
        t.results.insert(result.deal_id.clone(), result.clone());
        Ok(result)
    }

    /// Record the matcher's verdict for a pair. Write-once per pair.
    pub fn add_match_decision(
        &self,
        resource_offer: OfferId,
        job_offer: OfferId,
        deal_id: Option<DealId>,
        accepted: bool,
        now: i64,
    ) -> Result<MatchDecision, SolverError> {
        let mut t = self.inner.write();
        let key = MatchDecision::key_for(&resource_offer, &job_offer);
        if t.decisions.contains_key(&key) {
            return Err(SolverError::Conflict(format!(
                "match decision already exists for {}",
                key
            )));
        }
        let decision = MatchDecision {
            resource_offer,
            job_offer,
            deal_id,
            accepted,
            created_at: now,
        };
        t.logs.decisions.append(&decision)?;
        t.decisions.insert(key, decision.clone());
        Ok(decision)
    }

    // ── Updates ─────────────────────────────────────────────────────

    /// Bind a job offer to its deal and advance its state.
    pub fn update_job_offer_state(
        &self,
        id: &OfferId,
        deal_id: DealId,
        state: AgreementState,
    ) -> Result<JobOffer, SolverError> {
        let mut t = self.inner.write();
        let offer = t
            .job_offers
            .get_mut(id)
            .ok_or_else(|| SolverError::NotFound(format!("job offer {}", id)))?;
        offer.deal_id = Some(deal_id);
        offer.state = state;
        let updated = offer.clone();
        t.logs.job_offers.append(&updated)?;
        Ok(updated)
    }

    /// Bind a resource offer to its deal and advance its state.
    pub fn update_resource_offer_state(
        &self,
        id: &OfferId,
        deal_id: DealId,
        state: AgreementState,
    ) -> Result<ResourceOffer, SolverError> {
        let mut t = self.inner.write();
        let offer = t
            .resource_offers
            .get_mut(id)
            .ok_or_else(|| SolverError::NotFound(format!("resource offer {}", id)))?;
        offer.deal_id = Some(deal_id);
        offer.state = state;
        let updated = offer.clone();
        t.logs.resource_offers.append(&updated)?;
        Ok(updated)
    }

    /// Advance a deal's state, stamping the state-entry time.
    pub fn update_deal_state(
        &self,
        id: &DealId,
        state: AgreementState,
        now: i64,
    ) -> Result<Deal, SolverError> {
        let mut t = self.inner.write();
        let deal = t
            .deals
            .get_mut(id)
            .ok_or_else(|| SolverError::NotFound(format!("deal {}", id)))?;
        deal.state = state;
        deal.state_entered_at = now;
        let updated = deal.clone();
        t.logs.deals.append(&updated)?;
        Ok(updated)
    }

    /// Record the job cost once the result's instruction count is known.
    pub fn update_deal_cost(
        &self,
        id: &DealId,
        instruction_count: u64,
    ) -> Result<Deal, SolverError> {
        let mut t = self.inner.write();
        let deal = t
            .deals
            .get_mut(id)
            .ok_or_else(|| SolverError::NotFound(format!("deal {}", id)))?;
        deal.instruction_count = instruction_count;
        deal.job_cost = deal.unit_price.times(instruction_count);
        let updated = deal.clone();
        t.logs.deals.append(&updated)?;
        Ok(updated)
    }

    /// Assign the mediator chosen for a challenged deal.
    pub fn update_deal_mediator(
        &self,
        id: &DealId,
        mediator: Address,
    ) -> Result<Deal, SolverError> {
        let mut t = self.inner.write();
        let deal = t
            .deals
            .get_mut(id)
            .ok_or_else(|| SolverError::NotFound(format!("deal {}", id)))?;
        deal.mediator = Some(mediator);
        let updated = deal.clone();
        t.logs.deals.append(&updated)?;
        Ok(updated)
    }

    /// Merge the resource provider's recorded tx hashes (None ≡ no change).
    pub fn update_deal_txs_resource_provider(
        &self,
        id: &DealId,
        txs: ResourceProviderTxs,
    ) -> Result<Deal, SolverError> {
        let mut t = self.inner.write();
        let deal = t
            .deals
            .get_mut(id)
            .ok_or_else(|| SolverError::NotFound(format!("deal {}", id)))?;
        deal.transactions.resource_provider.merge(txs);
        let updated = deal.clone();
        t.logs.deals.append(&updated)?;
        Ok(updated)
    }

    /// Merge the job creator's recorded tx hashes.
    pub fn update_deal_txs_job_creator(
        &self,
        id: &DealId,
        txs: JobCreatorTxs,
    ) -> Result<Deal, SolverError> {
        let mut t = self.inner.write();
        let deal = t
            .deals
            .get_mut(id)
            .ok_or_else(|| SolverError::NotFound(format!("deal {}", id)))?;
        deal.transactions.job_creator.merge(txs);
        let updated = deal.clone();
        t.logs.deals.append(&updated)?;
        Ok(updated)
    }

    /// Merge the mediator's recorded tx hashes.
    pub fn update_deal_txs_mediator(
        &self,
        id: &DealId,
        txs: MediatorTxs,
    ) -> Result<Deal, SolverError> {
        let mut t = self.inner.write();
        let deal = t
            .deals
            .get_mut(id)
            .ok_or_else(|| SolverError::NotFound(format!("deal {}", id)))?;
        deal.transactions.mediator.merge(txs);
        let updated = deal.clone();
        t.logs.deals.append(&updated)?;
        Ok(updated)
    }

    // ── Point lookups ───────────────────────────────────────────────

    pub fn get_job_offer(&self, id: &OfferId) -> Option<JobOffer> {
        self.inner.read().job_offers.get(id).cloned()
    }

    pub fn get_resource_offer(&self, id: &OfferId) -> Option<ResourceOffer> {
        self.inner.read().resource_offers.get(id).cloned()
    }

    pub fn get_deal(&self, id: &DealId) -> Option<Deal> {
        self.inner.read().deals.get(id).cloned()
    }

    pub fn get_result(&self, deal_id: &DealId) -> Option<JobResult> {
        self.inner.read().results.get(deal_id).cloned()
    }

    pub fn get_match_decision(
        &self,
        resource_offer: &OfferId,
        job_offer: &OfferId,
    ) -> Option<MatchDecision> {
        self.inner
            .read()
            .decisions
            .get(&MatchDecision::key_for(resource_offer, job_offer))
            .cloned()
    }

    // ── List queries ────────────────────────────────────────────────

    pub fn get_job_offers(&self, query: &JobOfferQuery) -> Vec<JobOffer> {
        let t = self.inner.read();
        let mut offers: Vec<JobOffer> = t
            .job_offers
            .values()
            .filter(|o| {
                if let Some(jc) = &query.job_creator {
                    if &o.job_creator != jc {
                        return false;
                    }
                }
                if let Some(state) = query.state {
                    if o.state != state {
                        return false;
                    }
                }
                if query.not_matched && o.is_matched() {
                    return false;
                }
                true
            })
            .cloned()
            .collect();
        offers.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        offers
    }

    pub fn get_resource_offers(&self, query: &ResourceOfferQuery) -> Vec<ResourceOffer> {
        let t = self.inner.read();
        let mut offers: Vec<ResourceOffer> = t
            .resource_offers
            .values()
            .filter(|o| {
                if let Some(rp) = &query.resource_provider {
                    if &o.resource_provider != rp {
                        return false;
                    }
                }
                if let Some(state) = query.state {
                    if o.state != state {
                        return false;
                    }
                }
                if query.not_matched && o.is_matched() {
                    return false;
                }
                if query.active && !o.state.is_active() {
                    return false;
                }
                true
            })
            .cloned()
            .collect();
        offers.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        offers
    }

    pub fn get_deals(&self, query: &DealQuery) -> Vec<Deal> {
        let t = self.inner.read();
        let mut deals: Vec<Deal> = t
            .deals
            .values()
            .filter(|d| {
                if let Some(jc) = &query.job_creator {
                    if &d.job_creator != jc {
                        return false;
                    }
                }
                if let Some(rp) = &query.resource_provider {
                    if &d.resource_provider != rp {
                        return false;
                    }
                }
                if let Some(m) = &query.mediator {
                    if d.mediator.as_ref() != Some(m) {
                        return false;
                    }
                }
                if let Some(state) = query.state {
                    if d.state != state {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();
        deals.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        deals
    }

    /// Count deals in a successful terminal state per resource provider.
    pub fn get_leaderboard_data(&self) -> Vec<LeaderboardEntry> {
        let t = self.inner.read();
        let mut counts: HashMap<Address, u64> = HashMap::new();
        for deal in t.deals.values() {
            if deal.state.is_successful() {
                *counts.entry(deal.resource_provider.clone()).or_insert(0) += 1;
            }
        }
        let mut entries: Vec<LeaderboardEntry> = counts
            .into_iter()
            .map(|(resource_provider, job_count)| LeaderboardEntry {
                resource_provider,
                job_count,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.job_count
                .cmp(&a.job_count)
                .then_with(|| a.resource_provider.cmp(&b.resource_provider))
        });
        entries
    }

    // ── Removal ─────────────────────────────────────────────────────

    /// Forget a job offer in memory.
    ///
    /// No tombstone is appended, so replay resurrects the record after a
    /// restart.
    pub fn remove_job_offer(&self, id: &OfferId) {
        self.inner.write().job_offers.remove(id);
    }

    /// Forget a resource offer in memory. Same tombstone caveat as
    /// `remove_job_offer`.
    pub fn remove_resource_offer(&self, id: &OfferId) {
        self.inner.write().resource_offers.remove(id);
    }

    // ── Shutdown ────────────────────────────────────────────────────

    /// Flush and fsync every log; called once on shutdown.
    pub fn sync(&self) -> Result<(), SolverError> {
        let mut t = self.inner.write();
        t.logs.job_offers.sync()?;
        t.logs.resource_offers.sync()?;
        t.logs.deals.sync()?;
        t.logs.decisions.sync()?;
        t.logs.results.sync()?;
        Ok(())
    }
}

fn fold_last_wins<K, V>(records: Vec<V>, key: impl Fn(&V) -> K) -> HashMap<K, V>
where
    K: std::hash::Hash + Eq,
{
    let mut map = HashMap::new();
    for record in records {
        map.insert(key(&record), record);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use types::numeric::TokenAmount;
    use types::offer::{Capacity, JobCollateral, ResourceCollateral};

    fn test_store(dir: &TempDir) -> SolverStore {
        SolverStore::open(StoreConfig {
            dir: dir.path().to_path_buf(),
            prefix: "test".to_string(),
            durability: Durability::Buffered,
        })
        .unwrap()
    }

    fn job_offer(creator: &str, created_at: i64) -> JobOffer {
        JobOffer::new(
            Address::new(creator),
            "wasm:fib",
            Capacity {
                cpu_millis: 1000,
                memory_mb: 512,
                gpu_count: 0,
            },
            TokenAmount::from_u64(10),
            JobCollateral {
                payment: TokenAmount::from_u64(100),
                timeout: TokenAmount::from_u64(5),
            },
            created_at,
        )
    }

    fn resource_offer(provider: &str, created_at: i64) -> ResourceOffer {
        ResourceOffer::new(
            Address::new(provider),
            Capacity {
                cpu_millis: 4000,
                memory_mb: 8192,
                gpu_count: 0,
            },
            TokenAmount::from_u64(2),
            ResourceCollateral {
                results: TokenAmount::from_u64(30),
                timeout: TokenAmount::from_u64(5),
            },
            created_at,
        )
    }

    fn deal_for(store: &SolverStore, jo: &JobOffer, ro: &ResourceOffer) -> Deal {
        let deal = Deal::from_offers(jo, ro, TokenAmount::from_u64(8), 1_700_000_010);
        store.add_deal(deal.clone()).unwrap();
        deal
    }

    #[test]
    fn test_add_and_get_job_offer() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp);
        let offer = job_offer("0xjc", 1);
        store.add_job_offer(offer.clone()).unwrap();
        assert_eq!(store.get_job_offer(&offer.id), Some(offer));
    }

    #[test]
    fn test_get_missing_returns_none() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp);
        assert!(store.get_job_offer(&OfferId::from_hex("missing")).is_none());
        assert!(store.get_deal(&DealId::from_hex("missing")).is_none());
    }

    #[test]
    fn test_duplicate_match_decision_conflicts() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp);
        let ro = OfferId::from_hex("r1");
        let jo = OfferId::from_hex("j1");
        let deal_id = DealId::derive(&ro, &jo);

        store
            .add_match_decision(ro.clone(), jo.clone(), Some(deal_id), true, 1)
            .unwrap();
        let second = store.add_match_decision(ro.clone(), jo.clone(), None, false, 2);
        assert!(matches!(second, Err(SolverError::Conflict(_))));

        // store unchanged: first decision still in place
        let decision = store.get_match_decision(&ro, &jo).unwrap();
        assert!(decision.accepted);
        assert_eq!(decision.created_at, 1);
    }

    #[test]
    fn test_update_missing_deal_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp);
        let result =
            store.update_deal_state(&DealId::from_hex("missing"), AgreementState::DealAgreed, 1);
        assert!(matches!(result, Err(SolverError::NotFound(_))));
    }

    #[test]
    fn test_update_deal_state_stamps_entry_time() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp);
        let jo = job_offer("0xjc", 1);
        let ro = resource_offer("0xrp", 2);
        let deal = deal_for(&store, &jo, &ro);

        let updated = store
            .update_deal_state(&deal.id, AgreementState::DealAgreed, 42)
            .unwrap();
        assert_eq!(updated.state, AgreementState::DealAgreed);
        assert_eq!(updated.state_entered_at, 42);
    }

    #[test]
    fn test_update_deal_cost_evaluates_once() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp);
        let jo = job_offer("0xjc", 1);
        let ro = resource_offer("0xrp", 2);
        let deal = deal_for(&store, &jo, &ro);

        let updated = store.update_deal_cost(&deal.id, 10).unwrap();
        assert_eq!(updated.instruction_count, 10);
        assert_eq!(updated.job_cost, TokenAmount::from_u64(20));
    }

    #[test]
    fn test_tx_merge_keeps_existing_hashes() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp);
        let jo = job_offer("0xjc", 1);
        let ro = resource_offer("0xrp", 2);
        let deal = deal_for(&store, &jo, &ro);

        store
            .update_deal_txs_job_creator(
                &deal.id,
                JobCreatorTxs {
                    agree: Some(types::ids::TxHash::new("0xaa")),
                    ..Default::default()
                },
            )
            .unwrap();
        let updated = store
            .update_deal_txs_job_creator(
                &deal.id,
                JobCreatorTxs {
                    accept_result: Some(types::ids::TxHash::new("0xbb")),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(
            updated.transactions.job_creator.agree,
            Some(types::ids::TxHash::new("0xaa"))
        );
        assert_eq!(
            updated.transactions.job_creator.accept_result,
            Some(types::ids::TxHash::new("0xbb"))
        );
    }

    #[test]
    fn test_query_conjunction() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp);
        store.add_job_offer(job_offer("0xalice", 1)).unwrap();
        store.add_job_offer(job_offer("0xbob", 2)).unwrap();

        let alice_only = store.get_job_offers(&JobOfferQuery {
            job_creator: Some(Address::new("0xalice")),
            ..Default::default()
        });
        assert_eq!(alice_only.len(), 1);
        assert_eq!(alice_only[0].job_creator, Address::new("0xalice"));

        let all = store.get_job_offers(&JobOfferQuery::default());
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_not_matched_filter() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp);
        let jo = job_offer("0xjc", 1);
        let ro = resource_offer("0xrp", 2);
        store.add_job_offer(jo.clone()).unwrap();
        store.add_resource_offer(ro.clone()).unwrap();
        let deal = deal_for(&store, &jo, &ro);

        store
            .update_job_offer_state(&jo.id, deal.id.clone(), AgreementState::DealNegotiating)
            .unwrap();

        let unmatched = store.get_job_offers(&JobOfferQuery {
            not_matched: true,
            ..Default::default()
        });
        assert!(unmatched.is_empty());

        let unmatched_ro = store.get_resource_offers(&ResourceOfferQuery {
            not_matched: true,
            ..Default::default()
        });
        assert_eq!(unmatched_ro.len(), 1);
    }

    #[test]
    fn test_active_filter_drops_failed_offers() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp);
        let jo = job_offer("0xjc", 1);
        let ro = resource_offer("0xrp", 2);
        store.add_resource_offer(ro.clone()).unwrap();
        let deal = deal_for(&store, &jo, &ro);
        store
            .update_resource_offer_state(&ro.id, deal.id.clone(), AgreementState::TimeoutAgree)
            .unwrap();

        let active = store.get_resource_offers(&ResourceOfferQuery {
            active: true,
            ..Default::default()
        });
        assert!(active.is_empty());
    }

    #[test]
    fn test_query_results_sorted_by_created_at() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp);
        store.add_job_offer(job_offer("0xc", 30)).unwrap();
        store.add_job_offer(job_offer("0xa", 10)).unwrap();
        store.add_job_offer(job_offer("0xb", 20)).unwrap();

        let all = store.get_job_offers(&JobOfferQuery::default());
        let times: Vec<i64> = all.iter().map(|o| o.created_at).collect();
        assert_eq!(times, vec![10, 20, 30]);
    }

    #[test]
    fn test_leaderboard_counts_successful_deals() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp);

        let jo1 = job_offer("0xjc", 1);
        let ro1 = resource_offer("0xrp1", 2);
        let d1 = deal_for(&store, &jo1, &ro1);
        store
            .update_deal_state(&d1.id, AgreementState::ResultsAccepted, 10)
            .unwrap();

        let jo2 = job_offer("0xjc2", 3);
        let ro2 = resource_offer("0xrp1", 4);
        let d2 = deal_for(&store, &jo2, &ro2);
        store
            .update_deal_state(&d2.id, AgreementState::MediationAccepted, 11)
            .unwrap();

        let jo3 = job_offer("0xjc3", 5);
        let ro3 = resource_offer("0xrp2", 6);
        let d3 = deal_for(&store, &jo3, &ro3);
        store
            .update_deal_state(&d3.id, AgreementState::MediationRejected, 12)
            .unwrap();

        let board = store.get_leaderboard_data();
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].resource_provider, Address::new("0xrp1"));
        assert_eq!(board[0].job_count, 2);
    }

    #[test]
    fn test_remove_is_memory_only_and_replay_resurrects() {
        let tmp = TempDir::new().unwrap();
        let offer = job_offer("0xjc", 1);
        {
            let store = test_store(&tmp);
            store.add_job_offer(offer.clone()).unwrap();
            store.remove_job_offer(&offer.id);
            assert!(store.get_job_offer(&offer.id).is_none());
            store.sync().unwrap();
        }
        // restart: no tombstone was appended, so the offer reappears
        let store = test_store(&tmp);
        assert_eq!(store.get_job_offer(&offer.id), Some(offer));
    }

    #[test]
    fn test_crash_replay_last_write_wins() {
        let tmp = TempDir::new().unwrap();
        let jo = job_offer("0xjc", 1);
        let ro = resource_offer("0xrp", 2);
        let deal_id;
        {
            let store = test_store(&tmp);
            store.add_job_offer(jo.clone()).unwrap();
            store.add_resource_offer(ro.clone()).unwrap();
            let deal = deal_for(&store, &jo, &ro);
            deal_id = deal.id.clone();
            store
                .update_deal_state(&deal.id, AgreementState::DealAgreed, 20)
                .unwrap();
            store
                .update_deal_state(&deal.id, AgreementState::ResultsSubmitted, 30)
                .unwrap();
            store.sync().unwrap();
        }
        let store = test_store(&tmp);
        let deal = store.get_deal(&deal_id).unwrap();
        assert_eq!(deal.state, AgreementState::ResultsSubmitted);
        assert_eq!(deal.state_entered_at, 30);
    }

    #[test]
    fn test_replay_determinism() {
        let tmp = TempDir::new().unwrap();
        {
            let store = test_store(&tmp);
            for i in 0..5 {
                store.add_job_offer(job_offer(&format!("0x{}", i), i)).unwrap();
            }
            store.sync().unwrap();
        }
        let a = test_store(&tmp);
        let b = test_store(&tmp);
        assert_eq!(
            a.get_job_offers(&JobOfferQuery::default()),
            b.get_job_offers(&JobOfferQuery::default())
        );
    }
}
