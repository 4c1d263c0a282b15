//! In-memory backend and fixtures shared by the unit tests.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{
        atomic::{AtomicI64, AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use meter_client::{
    domain::{
        Apartment, ApartmentId, Counter, CounterId, CounterStatus, MediumType, NewReading, Reading,
    },
    ApiError, ReadingsBackend,
};
use time::{Date, OffsetDateTime};
use tokio::sync::{oneshot, watch};

pub(crate) fn reading(counter_id: CounterId, value: f64, date: Date) -> Reading {
    Reading {
        id: None,
        counter_id,
        value,
        date,
        created_at: None,
        updated_at: None,
    }
}

pub(crate) fn counter(id: CounterId, medium: &str, readings: Vec<Reading>) -> Counter {
    Counter {
        id,
        apartment_id: 4,
        factory_id: None,
        medium: MediumType::new(medium),
        reading_unit: "m³".to_string(),
        setup_date: None,
        due_date: None,
        status: CounterStatus::Active,
        latest_reading: None,
        readings,
    }
}

pub(crate) fn apartment(id: ApartmentId, counters: Vec<Counter>) -> Apartment {
    Apartment {
        id,
        apartment_number: format!("{}", 100 + id),
        address_id: None,
        address: None,
        counters,
    }
}

pub(crate) type GatedFetch = oneshot::Sender<Result<Apartment, ApiError>>;

/// Backend double. Submissions are persisted into the held apartments the
/// way the real backend would, so a refresh after a batch sees them.
pub(crate) struct FakeBackend {
    apartments: Mutex<BTreeMap<ApartmentId, Apartment>>,
    failing: Mutex<BTreeMap<CounterId, ApiError>>,
    fetch_error: Mutex<Option<ApiError>>,
    gates: Mutex<VecDeque<oneshot::Receiver<Result<Apartment, ApiError>>>>,
    fetches: watch::Sender<usize>,
    submitted: Mutex<Vec<NewReading>>,
    next_id: AtomicI64,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        let (fetches, _) = watch::channel(0);
        Self {
            apartments: Mutex::new(BTreeMap::new()),
            failing: Mutex::new(BTreeMap::new()),
            fetch_error: Mutex::new(None),
            gates: Mutex::new(VecDeque::new()),
            fetches,
            submitted: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1000),
        }
    }

    pub(crate) fn with_apartment(apartment: Apartment) -> Self {
        let backend = Self::new();
        backend.put_apartment(apartment);
        backend
    }

    pub(crate) fn put_apartment(&self, apartment: Apartment) {
        self.apartments.lock().unwrap().insert(apartment.id, apartment);
    }

    pub(crate) fn fail_counter(&self, counter_id: CounterId, error: ApiError) {
        self.failing.lock().unwrap().insert(counter_id, error);
    }

    pub(crate) fn fail_fetches(&self, error: Option<ApiError>) {
        *self.fetch_error.lock().unwrap() = error;
    }

    /// The next fetch blocks until the returned sender resolves it.
    pub(crate) fn gate_next_fetch(&self) -> GatedFetch {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().push_back(rx);
        tx
    }

    pub(crate) async fn wait_for_fetches(&self, count: usize) {
        let mut rx = self.fetches.subscribe();
        let _ = rx.wait_for(|n| *n >= count).await;
    }

    pub(crate) fn fetch_count(&self) -> usize {
        *self.fetches.borrow()
    }

    pub(crate) fn submitted_counters(&self) -> Vec<CounterId> {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.counter_id)
            .collect()
    }
}

#[async_trait::async_trait]
impl ReadingsBackend for FakeBackend {
    async fn apartment_readings(&self, apartment_id: ApartmentId) -> Result<Apartment, ApiError> {
        let gate = self.gates.lock().unwrap().pop_front();
        self.fetches.send_modify(|n| *n += 1);

        if let Some(rx) = gate {
            return match rx.await {
                Ok(result) => result,
                Err(_) => Err(ApiError::Transport("gate dropped".to_string())),
            };
        }

        let failure = self.fetch_error.lock().unwrap().clone();
        if let Some(e) = failure {
            return Err(e);
        }
        let found = self.apartments.lock().unwrap().get(&apartment_id).cloned();
        found.ok_or_else(|| ApiError::ServerRejection {
            status: 404,
            message: "Apartment not found".to_string(),
        })
    }

    async fn user_apartments(&self, _user_id: &str) -> Result<Vec<Apartment>, ApiError> {
        Ok(self.apartments.lock().unwrap().values().cloned().collect())
    }

    async fn submit_reading(&self, reading: &NewReading) -> Result<Reading, ApiError> {
        tokio::task::yield_now().await;
        self.submitted.lock().unwrap().push(reading.clone());

        let failure = self.failing.lock().unwrap().get(&reading.counter_id).cloned();
        if let Some(e) = failure {
            return Err(e);
        }

        let persisted = Reading {
            id: Some(self.next_id.fetch_add(1, Ordering::SeqCst)),
            counter_id: reading.counter_id,
            value: reading.value,
            date: reading.date,
            created_at: Some(OffsetDateTime::now_utc()),
            updated_at: None,
        };

        let mut apartments = self.apartments.lock().unwrap();
        for apartment in apartments.values_mut() {
            if let Some(counter) = apartment
                .counters
                .iter_mut()
                .find(|c| c.id == reading.counter_id)
            {
                counter.readings.push(persisted.clone());
                counter.latest_reading = Some(persisted.clone());
            }
        }
        Ok(persisted)
    }
}

/// Counts increments of one counter name; everything else is a no-op.
pub(crate) struct CountingRecorder {
    name: &'static str,
    hits: Arc<CounterHits>,
}

pub(crate) struct CounterHits(AtomicU64);

impl metrics::CounterFn for CounterHits {
    fn increment(&self, value: u64) {
        self.0.fetch_add(value, Ordering::SeqCst);
    }

    fn absolute(&self, value: u64) {
        self.0.store(value, Ordering::SeqCst);
    }
}

impl CountingRecorder {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            hits: Arc::new(CounterHits(AtomicU64::new(0))),
        }
    }

    pub(crate) fn count(&self) -> u64 {
        self.hits.0.load(Ordering::SeqCst)
    }
}

impl metrics::Recorder for CountingRecorder {
    fn describe_counter(&self, _: metrics::KeyName, _: Option<metrics::Unit>, _: metrics::SharedString) {}
    fn describe_gauge(&self, _: metrics::KeyName, _: Option<metrics::Unit>, _: metrics::SharedString) {}
    fn describe_histogram(&self, _: metrics::KeyName, _: Option<metrics::Unit>, _: metrics::SharedString) {}

    fn register_counter(&self, key: &metrics::Key, _: &metrics::Metadata<'_>) -> metrics::Counter {
        if key.name() == self.name {
            metrics::Counter::from_arc(self.hits.clone())
        } else {
            metrics::Counter::noop()
        }
    }

    fn register_gauge(&self, _: &metrics::Key, _: &metrics::Metadata<'_>) -> metrics::Gauge {
        metrics::Gauge::noop()
    }

    fn register_histogram(&self, _: &metrics::Key, _: &metrics::Metadata<'_>) -> metrics::Histogram {
        metrics::Histogram::noop()
    }
}
