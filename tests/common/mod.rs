use agrosync::application::ports::{
    ApiClient, AuthSession, EntityStore, OperationStore, RelationStore, SettingsStore,
};
use agrosync::application::repositories::{ActorRepository, CalendarRepository};
use agrosync::application::services::{PendingQueue, RelationReconciler, SyncEngine, SyncHandler};
use agrosync::domain::value_objects::{SessionUser, UserId, UserRole};
use agrosync::infrastructure::database::Database;
use agrosync::infrastructure::storage::{
    SqliteEntityStore, SqliteOperationStore, SqliteRelationStore, SqliteSettingsStore,
};
use agrosync::infrastructure::tracking::SharedDeltaTracker;
use agrosync::shared::config::SyncConfig;
use agrosync::{AppError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Scripted remote API: responses are queued per `METHOD path` and every
/// call is recorded. An unscripted call fails like a network outage, which
/// doubles as the "offline" simulation.
pub struct MockApi {
    calls: Mutex<Vec<(String, String, Value)>>,
    responses: Mutex<HashMap<String, VecDeque<Value>>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            responses: Mutex::new(HashMap::new()),
        }
    }

    pub fn script(&self, method: &str, path: &str, data: Value) {
        self.responses
            .lock()
            .unwrap()
            .entry(format!("{method} {path}"))
            .or_default()
            .push_back(data);
    }

    pub fn calls(&self) -> Vec<(String, String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    fn respond(&self, method: &str, path: &str, body: Value) -> Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), path.to_string(), body));
        self.responses
            .lock()
            .unwrap()
            .get_mut(&format!("{method} {path}"))
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| AppError::Network(format!("unscripted call {method} {path}")))
    }
}

#[async_trait]
impl ApiClient for MockApi {
    async fn get(&self, path: &str) -> Result<Value> {
        self.respond("GET", path, Value::Null)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.respond("POST", path, body.clone())
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.respond("PUT", path, body.clone())
    }

    async fn patch(&self, path: &str, body: &Value) -> Result<Value> {
        self.respond("PATCH", path, body.clone())
    }

    async fn delete(&self, path: &str) -> Result<Value> {
        self.respond("DELETE", path, Value::Null)
    }
}

/// Session whose user can be swapped mid-test.
pub struct TestSession {
    user: Mutex<Option<SessionUser>>,
}

impl TestSession {
    pub fn new(user: Option<SessionUser>) -> Self {
        Self {
            user: Mutex::new(user),
        }
    }

    pub fn set_user(&self, user: Option<SessionUser>) {
        *self.user.lock().unwrap() = user;
    }
}

impl AuthSession for TestSession {
    fn current_user(&self) -> Option<SessionUser> {
        self.user.lock().unwrap().clone()
    }

    fn bearer_token(&self) -> Option<String> {
        self.user.lock().unwrap().as_ref().map(|_| "token".to_string())
    }
}

pub fn coordinator() -> SessionUser {
    SessionUser::new(UserId::new("u-1".into()).unwrap(), UserRole::Coordinator)
}

/// The full stack wired against the scripted API and an in-memory database.
pub struct Stack {
    pub actors: Arc<ActorRepository>,
    pub calendars: Arc<CalendarRepository>,
    pub engine: SyncEngine,
    pub api: Arc<MockApi>,
    pub session: Arc<TestSession>,
    pub entities: Arc<dyn EntityStore>,
    pub relations: Arc<dyn RelationStore>,
    pub operations: Arc<dyn OperationStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub deltas: Arc<SharedDeltaTracker>,
}

pub async fn stack() -> Stack {
    let pool = Database::in_memory().await.unwrap();
    let entities: Arc<dyn EntityStore> = Arc::new(SqliteEntityStore::new(pool.clone()));
    let relations: Arc<dyn RelationStore> = Arc::new(SqliteRelationStore::new(pool.clone()));
    let operations: Arc<dyn OperationStore> = Arc::new(SqliteOperationStore::new(pool.clone()));
    let settings: Arc<dyn SettingsStore> = Arc::new(SqliteSettingsStore::new(pool));
    let deltas = Arc::new(SharedDeltaTracker::new());
    let api = Arc::new(MockApi::new());
    let session = Arc::new(TestSession::new(Some(coordinator())));

    let queue = Arc::new(PendingQueue::new(
        operations.clone(),
        session.clone() as Arc<dyn AuthSession>,
    ));
    let reconciler = Arc::new(RelationReconciler::new(
        entities.clone(),
        relations.clone(),
        queue.clone(),
    ));
    let actors = Arc::new(ActorRepository::new(
        entities.clone(),
        relations.clone(),
        operations.clone(),
        queue.clone(),
        reconciler,
        api.clone() as Arc<dyn ApiClient>,
    ));
    let calendars = Arc::new(CalendarRepository::new(
        entities.clone(),
        operations.clone(),
        queue,
        api.clone() as Arc<dyn ApiClient>,
    ));
    let engine = SyncEngine::new(
        operations.clone(),
        entities.clone(),
        settings.clone(),
        deltas.clone(),
        session.clone() as Arc<dyn AuthSession>,
        vec![
            actors.clone() as Arc<dyn SyncHandler>,
            calendars.clone() as Arc<dyn SyncHandler>,
        ],
        SyncConfig::default(),
    );

    Stack {
        actors,
        calendars,
        engine,
        api,
        session,
        entities,
        relations,
        operations,
        settings,
        deltas,
    }
}
