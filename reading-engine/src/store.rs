use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use meter_client::{
    domain::{Apartment, ApartmentId},
    ApiError, ReadingsBackend,
};
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Idle,
    Loading,
    Ready,
    /// The last fetch failed. Any previous snapshot is still readable.
    Error(ApiError),
}

/// What the store knows about one apartment.
#[derive(Debug, Clone)]
pub struct ApartmentSlot {
    pub state: LoadState,
    pub apartment: Option<Arc<Apartment>>,
    pub fetched_at: Option<OffsetDateTime>,
    issued: u64,
    committed: u64,
    /// Tickets whose refresh is still running.
    live: BTreeSet<u64>,
    /// State to show once no newer refresh is running.
    settled: LoadState,
}

impl Default for ApartmentSlot {
    fn default() -> Self {
        Self {
            state: LoadState::Idle,
            apartment: None,
            fetched_at: None,
            issued: 0,
            committed: 0,
            live: BTreeSet::new(),
            settled: LoadState::Idle,
        }
    }
}

impl ApartmentSlot {
    /// Live tickets older than the committed one will be dropped when they
    /// land, so only newer ones keep the slot loading.
    fn settle(&mut self) {
        let committed = self.committed;
        self.state = if self.live.iter().any(|&t| t > committed) {
            LoadState::Loading
        } else {
            self.settled.clone()
        };
    }
}

#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    slots: BTreeMap<ApartmentId, ApartmentSlot>,
}

impl StoreSnapshot {
    pub fn slot(&self, apartment_id: ApartmentId) -> Option<&ApartmentSlot> {
        self.slots.get(&apartment_id)
    }

    pub fn state(&self, apartment_id: ApartmentId) -> LoadState {
        self.slot(apartment_id)
            .map(|s| s.state.clone())
            .unwrap_or(LoadState::Idle)
    }

    /// Last server-confirmed snapshot, regardless of the current load state.
    pub fn apartment(&self, apartment_id: ApartmentId) -> Option<Arc<Apartment>> {
        self.slot(apartment_id).and_then(|s| s.apartment.clone())
    }

    pub fn apartment_ids(&self) -> impl Iterator<Item = ApartmentId> + '_ {
        self.slots.keys().copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Committed(Arc<Apartment>),
    /// A refresh issued later already resolved; this response was dropped.
    Superseded,
    Failed(ApiError),
}

/// Ticket identifying one in-flight refresh of one apartment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket(u64);

/// Retires a ticket whose refresh future was dropped before resolving
/// (aborted task, timeout, `select!`).
struct InFlight<'a> {
    state: &'a watch::Sender<StoreSnapshot>,
    apartment_id: ApartmentId,
    ticket: Ticket,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let Ticket(ticket) = self.ticket;
        let mut abandoned = false;
        self.state.send_if_modified(|snapshot| {
            let Some(slot) = snapshot.slots.get_mut(&self.apartment_id) else {
                return false;
            };
            if !slot.live.remove(&ticket) {
                return false;
            }
            abandoned = true;
            let before = slot.state.clone();
            slot.settle();
            slot.state != before
        });
        if abandoned {
            tracing::debug!(apartment_id = self.apartment_id, ticket, "refresh abandoned");
        }
    }
}

/// Last-known server state per apartment.
///
/// The only writer is refresh resolution. Readers take a snapshot or
/// subscribe to change notifications.
pub struct ReadingStore<B> {
    backend: B,
    state: watch::Sender<StoreSnapshot>,
}

impl<B> ReadingStore<B>
where
    B: ReadingsBackend,
{
    pub fn new(backend: B) -> Self {
        let (state, _) = watch::channel(StoreSnapshot::default());
        Self { backend, state }
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.state.subscribe()
    }

    /// Stream of snapshots, starting with the current one.
    pub fn updates(&self) -> WatchStream<StoreSnapshot> {
        WatchStream::new(self.subscribe())
    }

    /// Fetch the apartment's full reading history and commit it unless a
    /// refresh issued later has already been committed.
    pub async fn refresh(&self, apartment_id: ApartmentId) -> RefreshOutcome {
        let ticket = self.begin(apartment_id);
        let _in_flight = InFlight {
            state: &self.state,
            apartment_id,
            ticket,
        };
        let fetched = self.backend.apartment_readings(apartment_id).await;
        self.resolve(apartment_id, ticket, fetched)
    }

    fn begin(&self, apartment_id: ApartmentId) -> Ticket {
        let mut ticket = Ticket(0);
        self.state.send_modify(|snapshot| {
            let slot = snapshot.slots.entry(apartment_id).or_default();
            slot.issued += 1;
            slot.live.insert(slot.issued);
            slot.state = LoadState::Loading;
            ticket = Ticket(slot.issued);
        });
        tracing::debug!(apartment_id, ticket = ticket.0, "refresh started");
        ticket
    }

    fn resolve(
        &self,
        apartment_id: ApartmentId,
        ticket: Ticket,
        fetched: Result<Apartment, ApiError>,
    ) -> RefreshOutcome {
        let mut outcome = RefreshOutcome::Superseded;

        self.state.send_if_modified(|snapshot| {
            let slot = snapshot.slots.entry(apartment_id).or_default();
            slot.live.remove(&ticket.0);
            if ticket.0 < slot.committed {
                return false;
            }
            slot.committed = ticket.0;

            match fetched {
                Ok(apartment) => {
                    let apartment = Arc::new(apartment);
                    slot.apartment = Some(apartment.clone());
                    slot.fetched_at = Some(OffsetDateTime::now_utc());
                    slot.settled = LoadState::Ready;
                    outcome = RefreshOutcome::Committed(apartment);
                }
                Err(e) => {
                    slot.settled = LoadState::Error(e.clone());
                    outcome = RefreshOutcome::Failed(e);
                }
            }
            slot.settle();
            true
        });

        match &outcome {
            RefreshOutcome::Committed(apartment) => {
                metrics::counter!("store_refresh_total", "result" => "committed").increment(1);
                tracing::info!(
                    apartment_id,
                    counters = apartment.counters.len(),
                    "apartment snapshot refreshed"
                );
            }
            RefreshOutcome::Superseded => {
                metrics::counter!("store_refresh_total", "result" => "superseded").increment(1);
                tracing::debug!(apartment_id, ticket = ticket.0, "dropping stale refresh response");
            }
            RefreshOutcome::Failed(e) => {
                metrics::counter!("store_refresh_total", "result" => "failed").increment(1);
                tracing::warn!(apartment_id, error = %e, "apartment refresh failed");
            }
        }
        outcome
    }
}
