#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use waypoint_core::{
    params::{CreatePlan, StepSpec},
    ActionRequest, CapabilityProvider, CapabilityResult, Dispatcher, EngineConfig, Executor,
    RetryDelays, SessionBuilder, SessionStore, Step, StepPlanner, TransactionGuard,
};

/// Configuration with every retry delay set to zero
pub fn instant_config() -> EngineConfig {
    EngineConfig {
        retry_delays: RetryDelays::none(),
        ..Default::default()
    }
}

/// Helper function to create a test store
pub fn create_test_store(config: EngineConfig) -> SessionStore {
    SessionBuilder::new()
        .with_config(config)
        .build()
        .expect("Failed to create store")
}

/// The three-step plan used throughout the scenarios
pub fn three_levels() -> CreatePlan {
    CreatePlan {
        goal: "Create 3 levels".to_string(),
        steps: vec![
            StepSpec::new(1, "create level A"),
            StepSpec::new(2, "create level B"),
            StepSpec::new(3, "verify").verification(),
        ],
        ..Default::default()
    }
}

/// Capability provider that answers from per-action scripts.
///
/// Each action has a queue of results; once a queue is empty the action
/// succeeds with `{"element_id": <n>}`, counting up from 100.
#[derive(Default)]
pub struct ScriptedProvider {
    scripts: Mutex<HashMap<String, VecDeque<CapabilityResult>>>,
    calls: Mutex<Vec<ActionRequest>>,
    next_id: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(&self, action: &str, error: &str) {
        self.push(action, CapabilityResult::Failure(error.to_string()));
    }

    pub fn respond(&self, action: &str, payload: Value) {
        self.push(action, CapabilityResult::Success(payload));
    }

    fn push(&self, action: &str, result: CapabilityResult) {
        self.scripts
            .lock()
            .unwrap()
            .entry(action.to_string())
            .or_default()
            .push_back(result);
    }

    pub fn calls(&self) -> Vec<ActionRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for_step(&self, step_number: u32) -> Vec<ActionRequest> {
        self.calls()
            .into_iter()
            .filter(|c| c.step_number == step_number)
            .collect()
    }
}

#[async_trait]
impl CapabilityProvider for ScriptedProvider {
    async fn execute(&self, request: &ActionRequest, _: &CancellationToken) -> CapabilityResult {
        self.calls.lock().unwrap().push(request.clone());

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&request.action)
            .and_then(VecDeque::pop_front);

        scripted.unwrap_or_else(|| {
            let id = 100 + self.next_id.fetch_add(1, Ordering::SeqCst) as i64;
            CapabilityResult::Success(json!({ "element_id": id }))
        })
    }
}

/// Transaction guard that counts rollbacks
#[derive(Default)]
pub struct RecordingTransactions {
    pub rollbacks: AtomicUsize,
}

#[async_trait]
impl TransactionGuard for RecordingTransactions {
    async fn rollback_if_active(&self) {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
    }
}

/// Planner that maps verification steps to a read-only check and every
/// other step to one mutating `create_level` call.
#[derive(Default)]
pub struct ScriptedPlanner {
    contexts: Mutex<Vec<Vec<String>>>,
}

impl ScriptedPlanner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Context seen on each call, in call order
    pub fn contexts(&self) -> Vec<Vec<String>> {
        self.contexts.lock().unwrap().clone()
    }
}

#[async_trait]
impl StepPlanner for ScriptedPlanner {
    async fn actions_for(&self, step: &Step, context: &[String]) -> Vec<ActionRequest> {
        self.contexts.lock().unwrap().push(context.to_vec());

        if step.is_verification {
            vec![ActionRequest::new(
                step.step_number,
                "list_levels",
                json!({}),
            )]
        } else {
            vec![ActionRequest::new(
                step.step_number,
                "create_level",
                json!({ "name": step.description }),
            )
            .mutating()]
        }
    }
}

/// Store, provider, planner and executor wired together
pub struct Harness {
    pub store: SessionStore,
    pub provider: Arc<ScriptedProvider>,
    pub planner: Arc<ScriptedPlanner>,
    pub transactions: Arc<RecordingTransactions>,
    pub executor: Executor,
}

pub async fn harness(config: EngineConfig) -> Harness {
    let store = create_test_store(config);
    store
        .create_plan(&three_levels())
        .await
        .expect("Failed to create plan");

    let provider = ScriptedProvider::new();
    let planner = ScriptedPlanner::new();
    let transactions = Arc::new(RecordingTransactions::default());

    let dispatcher =
        Dispatcher::new(store.clone(), provider.clone()).with_transactions(transactions.clone());
    let executor = Executor::new(dispatcher, planner.clone());

    Harness {
        store,
        provider,
        planner,
        transactions,
        executor,
    }
}
