//! In-memory transport and fixtures for unit tests.

use crate::client::{RawResponse, Transport};
use crate::error::Result;
use crate::types::{Entity, Relation};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;

/// A request as seen by [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub body: Option<Value>,
}

/// Replays canned responses in order and records every request.
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<RawResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<RawResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn respond(&self, request: RecordedRequest) -> Result<RawResponse> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted response left for {}", request.url)))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str) -> Result<RawResponse> {
        self.respond(RecordedRequest {
            method: "GET",
            url: url.to_string(),
            body: None,
        })
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<RawResponse> {
        self.respond(RecordedRequest {
            method: "POST",
            url: url.to_string(),
            body: Some(body.clone()),
        })
    }
}

pub fn entity(kind: &str, namespace: &str, name: &str) -> Entity {
    let mut entity = Entity {
        api_version: "backstage.io/v1alpha1".to_string(),
        kind: kind.to_string(),
        ..Default::default()
    };
    entity.metadata.namespace = namespace.to_string();
    entity.metadata.name = name.to_string();
    entity
}

pub fn with_relation(mut entity: Entity, relation_type: &str, target: &str) -> Entity {
    entity.relations.push(Relation {
        relation_type: relation_type.to_string(),
        target_ref: target.to_string(),
    });
    entity
}

/// One 200 page of the response envelope.
pub fn page(items: &[Entity], next_cursor: Option<&str>) -> RawResponse {
    let mut body = json!({ "items": items, "totalItems": items.len() });
    if let Some(cursor) = next_cursor {
        body["pageInfo"] = json!({ "nextCursor": cursor });
    }
    RawResponse {
        status: 200,
        body: body.to_string(),
    }
}

/// A by-refs answer: `None` slots are serialized as `null`.
pub fn refs_page(items: &[Option<Entity>]) -> RawResponse {
    RawResponse {
        status: 200,
        body: json!({ "items": items }).to_string(),
    }
}
