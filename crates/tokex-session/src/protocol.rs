//! The negotiation engine.
//!
//! [`Negotiation`] owns the session table and drives every state
//! transition. All checks and transitions happen under the table lock;
//! push deliveries and finalization happen outside it. A confirm parks its
//! session in the transient `Finalizing` state while the finalizer runs, so
//! a racing confirm or abort observes an illegal state instead of a torn
//! outcome.

use crate::error::{BrokeringError, Result};
use crate::state::{Session, SessionState};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokex_accounting::Finalizer;
use tokex_core::{Exchange, Party, PartyKey, Proposal, ProposalFilter, ProposalId};

/// Negotiation tuning knobs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Permitted clock error against proposal baselines and deadlines, ms.
    pub fudge_ms: i64,
    /// Upper bound on how far ahead an acceptance deadline may lie, ms.
    pub max_acceptance_window_ms: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            fudge_ms: tokex_core::DEFAULT_FUDGE_MS,
            max_acceptance_window_ms: 24 * 60 * 60 * 1_000,
        }
    }
}

/// Delivers negotiation events to parties.
///
/// Implementations push over whatever medium connects the party; delivery
/// is best effort and never affects session state.
#[async_trait]
pub trait PushSink: Send + Sync {
    /// A proposal arrived. `id` is absent for unqualified proposals, which
    /// open no session. `co_receivers` names the other receivers when the
    /// proposal's visibility discloses them.
    async fn propose(
        &self,
        to: &PartyKey,
        id: Option<ProposalId>,
        proposer: &PartyKey,
        proposal: &Proposal,
        co_receivers: &[PartyKey],
    );

    /// The receiver accepted; the proposer has until `deadline` to confirm
    /// or abort.
    async fn accept(&self, to: &PartyKey, id: ProposalId, acceptor: &PartyKey, deadline: i64);

    /// The receiver rejected.
    async fn reject(&self, to: &PartyKey, id: ProposalId, rejector: &PartyKey);

    /// The proposer confirmed; the exchange is in force.
    async fn confirm(&self, to: &PartyKey, id: ProposalId);

    /// The proposer aborted. `confirmed` names the party whose sibling
    /// session won the proposal, when visibility permits the disclosure.
    async fn abort(&self, to: &PartyKey, id: ProposalId, confirmed: Option<&PartyKey>);
}

/// The negotiation engine.
pub struct Negotiation {
    config: SessionConfig,
    finalizer: Arc<dyn Finalizer>,
    sink: Arc<dyn PushSink>,
    parties: Mutex<HashMap<PartyKey, Party>>,
    filters: Mutex<HashMap<PartyKey, ProposalFilter>>,
    sessions: Mutex<HashMap<(ProposalId, PartyKey), Session>>,
}

impl Negotiation {
    pub fn new(
        config: SessionConfig,
        finalizer: Arc<dyn Finalizer>,
        sink: Arc<dyn PushSink>,
    ) -> Self {
        Self {
            config,
            finalizer,
            sink,
            parties: Mutex::new(HashMap::new()),
            filters: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Make a party known to the engine. Registered parties can propose,
    /// receive proposals and appear in broadcast audiences.
    pub fn register_party(&self, party: Party) {
        lock(&self.parties).insert(party.key.clone(), party);
    }

    /// Forget a party. Its sessions stay as they are.
    pub fn unregister_party(&self, key: &PartyKey) -> bool {
        lock(&self.parties).remove(key).is_some()
    }

    pub fn party(&self, key: &PartyKey) -> Option<Party> {
        lock(&self.parties).get(key).cloned()
    }

    /// A party's standing proposal filter.
    pub fn filter(&self, key: &PartyKey) -> Option<ProposalFilter> {
        lock(&self.filters).get(key).cloned()
    }

    /// Install or clear a party's standing proposal filter.
    pub fn set_filter(&self, key: &PartyKey, filter: Option<ProposalFilter>) {
        let mut filters = lock(&self.filters);
        match filter {
            Some(filter) => {
                filters.insert(key.clone(), filter);
            }
            None => {
                filters.remove(key);
            }
        }
    }

    /// The state of a (proposal, receiver) session, if one exists.
    pub fn session_state(&self, id: ProposalId, receiver: &PartyKey) -> Option<SessionState> {
        lock(&self.sessions)
            .get(&(id, receiver.clone()))
            .map(|s| s.state)
    }

    /// Submit a proposal.
    ///
    /// A qualified proposal opens one OFFERO session per listed receiver
    /// and returns the freshly minted proposal id. An unqualified proposal
    /// opens no session and returns `None`; it is delivered as an invitation
    /// to counter-propose.
    pub async fn propose(
        &self,
        proposer_key: &PartyKey,
        proposal: Proposal,
        receiver_keys: Vec<PartyKey>,
        now: i64,
    ) -> Result<Option<ProposalId>> {
        self.sweep_settled(now);

        let proposer = self
            .party(proposer_key)
            .ok_or_else(|| BrokeringError::RequestNotLegal("unknown proposer".into()))?;

        if !proposal.is_satisfiable() {
            return Err(BrokeringError::ProposalNotSatisfiable);
        }
        if now >= proposal.deadline + self.config.fudge_ms {
            return Err(BrokeringError::RequestInvalid(
                "proposal deadline has already passed".into(),
            ));
        }

        // Explicit receiver keys win over the proposal's own receiver set;
        // an empty list falls back to it, and an absent set means everyone.
        let listed: Option<Vec<PartyKey>> = if receiver_keys.is_empty() {
            proposal
                .receivers
                .keys()
                .map(|keys| keys.into_iter().cloned().collect())
        } else {
            Some(receiver_keys)
        };
        let listed = listed.map(dedupe);

        if proposal.is_qualified() {
            self.propose_qualified(&proposer, proposal, listed).await
        } else {
            self.propose_unqualified(&proposer, proposal, listed).await
        }
    }

    async fn propose_qualified(
        &self,
        proposer: &Party,
        proposal: Proposal,
        listed: Option<Vec<PartyKey>>,
    ) -> Result<Option<ProposalId>> {
        let Some(listed) = listed else {
            return Err(BrokeringError::RequestNotLegal(
                "a qualified proposal must name its receivers".into(),
            ));
        };
        if listed.is_empty() {
            return Err(BrokeringError::RequestNotLegal(
                "a qualified proposal must name at least one receiver".into(),
            ));
        }
        if !proposal.visibility.discloses_receivers() && listed.len() != 1 {
            return Err(BrokeringError::RequestNotLegal(
                "a private proposal takes exactly one receiver".into(),
            ));
        }

        let mut receivers = Vec::with_capacity(listed.len());
        for key in &listed {
            let receiver = self
                .party(key)
                .ok_or(BrokeringError::ProposalReceiverNotFound)?;
            if let Some(filter) = self.filter(key) {
                if !filter.admits(&proposer.key, &proposal) {
                    return Err(BrokeringError::RequestBlocked);
                }
            }
            receivers.push(receiver);
        }

        let id = ProposalId::random();
        {
            let mut sessions = lock(&self.sessions);
            for receiver in &receivers {
                sessions.insert(
                    (id, receiver.key.clone()),
                    Session {
                        proposal: proposal.clone(),
                        proposer: proposer.clone(),
                        receiver: receiver.clone(),
                        state: SessionState::Offero,
                    },
                );
            }
        }
        tracing::info!(%id, receivers = receivers.len(), "proposal admitted");

        let disclose = proposal.visibility.discloses_receivers();
        for receiver in &receivers {
            let co_receivers: Vec<PartyKey> = if disclose {
                listed
                    .iter()
                    .filter(|k| **k != receiver.key)
                    .cloned()
                    .collect()
            } else {
                Vec::new()
            };
            self.sink
                .propose(
                    &receiver.key,
                    Some(id),
                    &proposer.key,
                    &proposal,
                    &co_receivers,
                )
                .await;
        }
        Ok(Some(id))
    }

    async fn propose_unqualified(
        &self,
        proposer: &Party,
        proposal: Proposal,
        listed: Option<Vec<PartyKey>>,
    ) -> Result<Option<ProposalId>> {
        let audience: Vec<PartyKey> = match listed {
            Some(keys) => {
                for key in &keys {
                    if self.party(key).is_none() {
                        return Err(BrokeringError::ProposalReceiverNotFound);
                    }
                }
                keys
            }
            None => lock(&self.parties)
                .keys()
                .filter(|k| **k != proposer.key)
                .cloned()
                .collect(),
        };

        for key in &audience {
            // A standing filter silently suppresses delivery; an invitation
            // to counter-propose owes nobody an error.
            if let Some(filter) = self.filter(key) {
                if !filter.admits(&proposer.key, &proposal) {
                    continue;
                }
            }
            self.sink
                .propose(key, None, &proposer.key, &proposal, &[])
                .await;
        }
        Ok(None)
    }

    /// Accept a proposal, moving the caller's session OFFERO -> CONCENTIO.
    ///
    /// `acceptance_deadline` is how long the caller gives the proposer to
    /// confirm; it must lie in the future, within the configured bound.
    pub async fn accept(
        &self,
        caller: &PartyKey,
        id: ProposalId,
        acceptance_deadline: i64,
        now: i64,
    ) -> Result<()> {
        let proposer_key = {
            let mut sessions = lock(&self.sessions);
            let session = sessions
                .get_mut(&(id, caller.clone()))
                .ok_or(BrokeringError::ProposalNotFound)?;
            if session.state != SessionState::Offero {
                return Err(BrokeringError::RequestNotLegal(format!(
                    "cannot accept in {}",
                    session.state.name()
                )));
            }
            let proposal = &session.proposal;
            if now < proposal.baseline - self.config.fudge_ms {
                return Err(BrokeringError::ProposalNotYetAcceptable);
            }
            if now >= proposal.deadline + self.config.fudge_ms {
                return Err(BrokeringError::RequestTimeout);
            }
            if acceptance_deadline <= now {
                return Err(BrokeringError::RequestInvalid(
                    "acceptance deadline is not in the future".into(),
                ));
            }
            if acceptance_deadline - now > self.config.max_acceptance_window_ms {
                return Err(BrokeringError::RequestInvalid(
                    "acceptance deadline too far ahead".into(),
                ));
            }
            session.state = SessionState::Concentio {
                acceptance_deadline,
            };
            session.proposer.key.clone()
        };
        tracing::info!(%id, "proposal accepted");
        self.sink
            .accept(&proposer_key, id, caller, acceptance_deadline)
            .await;
        Ok(())
    }

    /// Reject a proposal, ending the caller's session.
    ///
    /// Unlike acceptance, rejection has no window: a receiver may refuse a
    /// standing offer at any time, even past the proposal deadline.
    pub async fn reject(&self, caller: &PartyKey, id: ProposalId) -> Result<()> {
        let proposer_key = {
            let mut sessions = lock(&self.sessions);
            let session = sessions
                .get_mut(&(id, caller.clone()))
                .ok_or(BrokeringError::ProposalNotFound)?;
            if session.state != SessionState::Offero {
                return Err(BrokeringError::RequestNotLegal(format!(
                    "cannot reject in {}",
                    session.state.name()
                )));
            }
            session.state = SessionState::Rejected;
            session.proposer.key.clone()
        };
        tracing::info!(%id, "proposal rejected");
        self.sink.reject(&proposer_key, id, caller).await;
        Ok(())
    }

    /// Confirm an accepted proposal, finalizing the exchange.
    ///
    /// Only the proposer may confirm, naming the acceptor whose session to
    /// settle. A finalization fault aborts the session and surfaces as
    /// `RequestFailed`; the exchange is then not in force.
    pub async fn confirm(
        &self,
        caller: &PartyKey,
        id: ProposalId,
        acceptor: &PartyKey,
        now: i64,
    ) -> Result<Exchange> {
        let (proposal, proposer, receiver) =
            self.begin_settlement(caller, id, acceptor, now, "confirm")?;

        match self
            .finalizer
            .finalize(proposal, proposer, receiver, now)
            .await
        {
            Ok(exchange) => {
                self.settle(id, acceptor, SessionState::Recipio);
                tracing::info!(%id, exchange = %exchange.id, "exchange finalized");
                self.sink.confirm(acceptor, id).await;
                Ok(exchange)
            }
            Err(error) => {
                self.settle(id, acceptor, SessionState::Aborted);
                tracing::warn!(%id, %error, "finalization failed; session aborted");
                self.sink.abort(acceptor, id, None).await;
                Err(BrokeringError::RequestFailed(
                    "exchange finalization failed".into(),
                ))
            }
        }
    }

    /// Abort an accepted proposal, ending the named acceptor's session.
    pub async fn abort(
        &self,
        caller: &PartyKey,
        id: ProposalId,
        acceptor: &PartyKey,
        now: i64,
    ) -> Result<()> {
        let confirmed = {
            let mut sessions = lock(&self.sessions);
            let session = find_session(&mut sessions, id, acceptor)?;
            if session.proposer.key != *caller {
                return Err(BrokeringError::RequestNotLegal(
                    "only the proposer may abort".into(),
                ));
            }
            match session.state {
                SessionState::Concentio {
                    acceptance_deadline,
                } => {
                    if now >= acceptance_deadline + self.config.fudge_ms {
                        return Err(BrokeringError::RequestTimeout);
                    }
                }
                state => {
                    return Err(BrokeringError::RequestNotLegal(format!(
                        "cannot abort in {}",
                        state.name()
                    )));
                }
            }
            session.state = SessionState::Aborted;

            // Disclose which sibling won, when the proposal is not private.
            let disclose = session.proposal.visibility.discloses_receivers();
            if disclose {
                sessions
                    .iter()
                    .find(|((pid, rk), s)| {
                        *pid == id && rk != acceptor && s.state == SessionState::Recipio
                    })
                    .map(|((_, rk), _)| rk.clone())
            } else {
                None
            }
        };
        tracing::info!(%id, "session aborted");
        self.sink.abort(acceptor, id, confirmed.as_ref()).await;
        Ok(())
    }

    /// Move a CONCENTIO session into FINALIZING, returning what the
    /// finalizer needs. Fails without side effects on any rule violation.
    fn begin_settlement(
        &self,
        caller: &PartyKey,
        id: ProposalId,
        acceptor: &PartyKey,
        now: i64,
        verb: &str,
    ) -> Result<(Proposal, Party, Party)> {
        let mut sessions = lock(&self.sessions);
        let session = find_session(&mut sessions, id, acceptor)?;
        if session.proposer.key != *caller {
            return Err(BrokeringError::RequestNotLegal(format!(
                "only the proposer may {verb}"
            )));
        }
        match session.state {
            SessionState::Concentio {
                acceptance_deadline,
            } => {
                if now >= acceptance_deadline + self.config.fudge_ms {
                    return Err(BrokeringError::RequestTimeout);
                }
            }
            state => {
                return Err(BrokeringError::RequestNotLegal(format!(
                    "cannot {verb} in {}",
                    state.name()
                )));
            }
        }
        session.state = SessionState::Finalizing;
        Ok((
            session.proposal.clone(),
            session.proposer.clone(),
            session.receiver.clone(),
        ))
    }

    fn settle(&self, id: ProposalId, acceptor: &PartyKey, state: SessionState) {
        if let Some(session) = lock(&self.sessions).get_mut(&(id, acceptor.clone())) {
            session.state = state;
        }
    }

    /// Drop terminal sessions whose proposal is long past, so the table does
    /// not grow without bound. Swept whenever a new proposal arrives.
    ///
    /// Terminal sessions are retained until the latest moment any sibling
    /// could still be settled (deadline, the acceptance window and the fudge
    /// at both ends), so a late abort can still disclose the confirmed
    /// sibling.
    fn sweep_settled(&self, now: i64) {
        let retention = self.config.max_acceptance_window_ms + 2 * self.config.fudge_ms;
        lock(&self.sessions).retain(|_, session| {
            !(session.state.is_terminal() && now >= session.proposal.deadline + retention)
        });
    }
}

/// Look up the session of (id, acceptor), distinguishing an unknown
/// proposal from an unknown receiver of a known proposal.
fn find_session<'a>(
    sessions: &'a mut MutexGuard<'_, HashMap<(ProposalId, PartyKey), Session>>,
    id: ProposalId,
    acceptor: &PartyKey,
) -> Result<&'a mut Session> {
    if !sessions.contains_key(&(id, acceptor.clone())) {
        if sessions.keys().any(|(pid, _)| *pid == id) {
            return Err(BrokeringError::ProposalReceiverNotFound);
        }
        return Err(BrokeringError::ProposalNotFound);
    }
    Ok(sessions
        .get_mut(&(id, acceptor.clone()))
        .unwrap_or_else(|| unreachable!()))
}

fn dedupe(keys: Vec<PartyKey>) -> Vec<PartyKey> {
    let mut out: Vec<PartyKey> = Vec::with_capacity(keys.len());
    for key in keys {
        if !out.contains(&key) {
            out.push(key);
        }
    }
    out
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
