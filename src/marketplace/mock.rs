//! Scriptable marketplace double for tests and local development.
//!
//! Applies the same server-side filters the real API applies (skill,
//! hourly budget, rating floor) so engine tests exercise the fallback
//! search against realistic "no candidates" outcomes.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;

use super::client::{MarketplaceClient, MarketplaceError};
use super::types::{
    BookingRef, BookingRequest, BookingSnapshot, BookingStatus, SearchOutcome, SearchQuery, Worker,
};

pub struct MockMarketplaceClient {
    roster: RwLock<Vec<Worker>>,
    bookings: DashMap<String, BookingSnapshot>,
    booking_seq: AtomicU64,
    search_calls: AtomicU32,
    create_calls: AtomicU32,
    /// When set, every search returns a transport failure.
    fail_search: RwLock<bool>,
    /// When set, every booking creation fails with a 503.
    fail_create: RwLock<bool>,
}

impl MockMarketplaceClient {
    pub fn new() -> Self {
        Self {
            roster: RwLock::new(Vec::new()),
            bookings: DashMap::new(),
            booking_seq: AtomicU64::new(1),
            search_calls: AtomicU32::new(0),
            create_calls: AtomicU32::new(0),
            fail_search: RwLock::new(false),
            fail_create: RwLock::new(false),
        }
    }

    /// A client preloaded with the standard demo roster.
    pub fn with_default_roster() -> Self {
        let client = Self::new();
        client.add_worker(Self::worker("w_001", "Maria Garcia", &["cleaning", "organizing"], 25.0, 4.8, 127));
        client.add_worker(Self::worker("w_002", "John Smith", &["handyman", "repairs"], 35.0, 4.6, 89));
        client.add_worker(Self::worker("w_003", "Alex Chen", &["photography"], 50.0, 4.9, 156));
        client.add_worker(Self::worker("w_004", "Sarah Johnson", &["cleaning", "deep_cleaning"], 30.0, 4.7, 203));
        client.add_worker(Self::worker("w_005", "Mike Williams", &["handyman", "plumbing"], 45.0, 4.5, 67));
        client
    }

    pub fn worker(id: &str, name: &str, skills: &[&str], rate: f64, rating: f64, reviews: u32) -> Worker {
        Worker {
            id: id.to_string(),
            name: name.to_string(),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            location: "Las Vegas, NV".to_string(),
            rate,
            currency: "USD".to_string(),
            rating,
            reviews,
            bio: String::new(),
            photo_url: None,
        }
    }

    pub fn add_worker(&self, worker: Worker) {
        self.roster.write().push(worker);
    }

    pub fn clear_roster(&self) {
        self.roster.write().clear();
    }

    pub fn set_fail_search(&self, fail: bool) {
        *self.fail_search.write() = fail;
    }

    pub fn set_fail_create(&self, fail: bool) {
        *self.fail_create.write() = fail;
    }

    /// Overwrite the reported status of an existing booking, to script
    /// poll-path scenarios.
    pub fn set_booking_status(&self, booking_id: &str, status: BookingStatus) {
        if let Some(mut snapshot) = self.bookings.get_mut(booking_id) {
            snapshot.status = status;
        }
    }

    pub fn search_calls(&self) -> u32 {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> u32 {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn booking_count(&self) -> usize {
        self.bookings.len()
    }
}

impl Default for MockMarketplaceClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketplaceClient for MockMarketplaceClient {
    async fn search_workers(&self, query: &SearchQuery) -> SearchOutcome {
        self.search_calls.fetch_add(1, Ordering::SeqCst);

        if *self.fail_search.read() {
            return SearchOutcome::Failed("mock transport failure".to_string());
        }

        let matches: Vec<Worker> = self
            .roster
            .read()
            .iter()
            .filter(|w| match &query.skill {
                Some(skill) => w.skills.iter().any(|s| s.eq_ignore_ascii_case(skill)),
                None => true,
            })
            .filter(|w| query.hourly_budget_max.is_none_or(|max| w.rate <= max))
            .filter(|w| query.rating_min.is_none_or(|min| w.rating >= min))
            .take(query.limit as usize)
            .cloned()
            .collect();

        if matches.is_empty() {
            SearchOutcome::Empty
        } else {
            SearchOutcome::Found(matches)
        }
    }

    async fn create_booking(
        &self,
        request: &BookingRequest,
    ) -> Result<BookingRef, MarketplaceError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        if *self.fail_create.read() {
            return Err(MarketplaceError::Api {
                status: 503,
                message: "mock unavailable".to_string(),
            });
        }

        let worker_name = self
            .roster
            .read()
            .iter()
            .find(|w| w.id == request.worker_id)
            .map(|w| w.name.clone())
            .unwrap_or_else(|| "Unknown Worker".to_string());

        let id = format!("booking_{}", self.booking_seq.fetch_add(1, Ordering::SeqCst));
        self.bookings.insert(
            id.clone(),
            BookingSnapshot {
                id: id.clone(),
                status: BookingStatus::Confirmed,
                completion_photos: Vec::new(),
                worker_feedback: None,
                cancellation_reason: None,
            },
        );

        Ok(BookingRef {
            id,
            worker_id: request.worker_id.clone(),
            worker_name,
            status: BookingStatus::Confirmed,
            // 5% platform fee baked into the mock, like the sandbox API.
            total_cost: request.budget * 0.95,
        })
    }

    async fn booking_status(&self, booking_id: &str) -> Result<BookingSnapshot, MarketplaceError> {
        self.bookings
            .get(booking_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| MarketplaceError::BookingNotFound(booking_id.to_string()))
    }

    async fn cancel_booking(
        &self,
        booking_id: &str,
        reason: Option<&str>,
    ) -> Result<bool, MarketplaceError> {
        match self.bookings.get_mut(booking_id) {
            Some(mut snapshot) => {
                snapshot.status = BookingStatus::Cancelled;
                snapshot.cancellation_reason = reason.map(|r| r.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
