//! Scripted ERP adapter.
//!
//! Outcomes are queued ahead of time; when the script runs dry every
//! further upsert succeeds. Each attempt is recorded with its instant so
//! rate-window assertions can replay the schedule.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;

use ops_erp::{ErpApi, UpsertError};
use ops_schemas::{ErpEnvironment, ErpUpsertPayload, ErpUpsertResponse};

#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    Succeed,
    TransportFail,
    SemanticFail(String),
    Http(u16),
}

#[derive(Debug, Clone)]
pub struct Attempt {
    pub at: Instant,
    pub item_code: String,
    pub env_override: Option<ErpEnvironment>,
    pub payload: serde_json::Value,
}

#[derive(Default)]
struct State {
    script: VecDeque<ScriptedOutcome>,
    attempts: Vec<Attempt>,
    next_internal_id: u64,
}

#[derive(Default)]
pub struct FakeErp {
    state: Mutex<State>,
}

impl FakeErp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue outcomes for the next upserts, in order.
    pub fn script(&self, outcomes: impl IntoIterator<Item = ScriptedOutcome>) {
        let mut st = self.state.lock().expect("fake erp poisoned");
        st.script.extend(outcomes);
    }

    pub fn attempts(&self) -> Vec<Attempt> {
        self.state.lock().expect("fake erp poisoned").attempts.clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.state.lock().expect("fake erp poisoned").attempts.len()
    }
}

impl ErpApi for FakeErp {
    async fn upsert(
        &self,
        payload: &ErpUpsertPayload,
        env_override: Option<ErpEnvironment>,
    ) -> Result<ErpUpsertResponse, UpsertError> {
        let mut st = self.state.lock().expect("fake erp poisoned");
        st.attempts.push(Attempt {
            at: Instant::now(),
            item_code: payload.item_id.clone(),
            env_override,
            payload: serde_json::to_value(payload).expect("payload serializes"),
        });

        match st.script.pop_front().unwrap_or(ScriptedOutcome::Succeed) {
            ScriptedOutcome::Succeed => {
                st.next_internal_id += 1;
                let id = st.next_internal_id;
                Ok(ErpUpsertResponse {
                    success: true,
                    id: Some(format!("{id}")),
                    item_id: Some(payload.item_id.clone()),
                    operation: Some("update".to_string()),
                    error: None,
                })
            }
            ScriptedOutcome::TransportFail => {
                Err(UpsertError::Transport("scripted connect failure".to_string()))
            }
            ScriptedOutcome::SemanticFail(message) => Err(UpsertError::Semantic { message }),
            ScriptedOutcome::Http(status) => Err(UpsertError::Http {
                status,
                body: "scripted".to_string(),
            }),
        }
    }
}
