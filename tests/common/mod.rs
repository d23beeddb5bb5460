//! Shared harness wiring the full engine stack over in-memory
//! collaborators and the scriptable marketplace client.

// Not every test binary touches every harness member.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use uuid::Uuid;

use turnover_core::audit::AuditLog;
use turnover_core::marketplace::MockMarketplaceClient;
use turnover_core::models::{Property, Task, TaskType};
use turnover_core::orchestration::{
    AutoBookScheduler, BookingEngine, CancellationHandler, StatusReconciler, WebhookIngress,
};
use turnover_core::repository::memory::{
    InMemoryAuditLogRepository, InMemoryConfigRepository, InMemoryPaymentLedger,
    InMemoryPropertyRepository, InMemoryTaskRepository, RecordingNotificationSink,
};

pub const WEBHOOK_SECRET: &str = "integration-test-secret";

pub struct Harness {
    pub client: Arc<MockMarketplaceClient>,
    pub tasks: Arc<InMemoryTaskRepository>,
    pub properties: Arc<InMemoryPropertyRepository>,
    pub configs: Arc<InMemoryConfigRepository>,
    pub payments: Arc<InMemoryPaymentLedger>,
    pub notifications: Arc<RecordingNotificationSink>,
    pub audit_repo: Arc<InMemoryAuditLogRepository>,
    pub scheduler: AutoBookScheduler,
    pub reconciler: Arc<StatusReconciler>,
    pub ingress: WebhookIngress,
}

impl Harness {
    pub fn new(client: MockMarketplaceClient) -> Self {
        let client = Arc::new(client);
        let audit_repo = Arc::new(InMemoryAuditLogRepository::new());
        let audit = AuditLog::new(audit_repo.clone());
        let engine = Arc::new(
            BookingEngine::new(client.clone(), audit.clone())
                .with_retry_delay(Duration::from_millis(1)),
        );

        let tasks = Arc::new(InMemoryTaskRepository::new());
        let properties = Arc::new(InMemoryPropertyRepository::new());
        let configs = Arc::new(InMemoryConfigRepository::new());
        let payments = Arc::new(InMemoryPaymentLedger::new());
        let notifications = Arc::new(RecordingNotificationSink::new());

        let scheduler = AutoBookScheduler::new(
            engine.clone(),
            tasks.clone(),
            properties.clone(),
            configs.clone(),
            payments.clone(),
            notifications.clone(),
            7,
        );

        let cancellations = Arc::new(CancellationHandler::new(
            engine,
            tasks.clone(),
            properties.clone(),
            configs.clone(),
            payments.clone(),
            notifications.clone(),
            audit.clone(),
        ));

        let reconciler = Arc::new(StatusReconciler::new(
            client.clone(),
            tasks.clone(),
            payments.clone(),
            notifications.clone(),
            cancellations,
            audit,
        ));

        let ingress = WebhookIngress::new(reconciler.clone(), WEBHOOK_SECRET);

        Self {
            client,
            tasks,
            properties,
            configs,
            payments,
            notifications,
            audit_repo,
            scheduler,
            reconciler,
            ingress,
        }
    }

    pub fn with_default_roster() -> Self {
        Self::new(MockMarketplaceClient::with_default_roster())
    }

    /// Insert a property and return it.
    pub fn add_property(&self) -> Property {
        let property = Property {
            id: Uuid::new_v4(),
            host_id: Uuid::new_v4(),
            name: "Sunset Loft".to_string(),
            street: "902 Fremont St".to_string(),
            city: "Las Vegas".to_string(),
            state: "NV".to_string(),
            zip_code: "89101".to_string(),
        };
        self.properties.insert(property.clone());
        property
    }

    /// Insert a pending cleaning task scheduled `hours_out` from now.
    pub fn add_cleaning_task(&self, property: &Property, hours_out: i64, budget: f64) -> Task {
        let task = Task::new(
            TaskType::Cleaning,
            property.id,
            "Turnover clean between guests",
            budget,
            Utc::now() + ChronoDuration::hours(hours_out),
            2.0,
        );
        self.tasks.insert(task.clone());
        task
    }
}
