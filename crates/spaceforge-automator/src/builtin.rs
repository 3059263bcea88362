//! Built-in handlers.
//!
//! These exercise the handler contract without talking to a remote API and
//! are what plan files can use out of the box:
//!
//! | name          | result                                                   |
//! |---------------|----------------------------------------------------------|
//! | `passthrough` | its descriptor, minus `after`                            |
//! | `merge`       | the context entries named by `keys`                      |
//! | `append`      | `{list, position}` after an ordered insert into `list`   |
//! | `fail`        | always fails, carrying its descriptor                    |

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tracing::debug;

use crate::automator::Automator;
use crate::context::{AFTER_KEY, Context, Descriptor, ensure_parameters, extract_attributes};
use crate::error::{AutomatorError, Result};
use crate::queue::OrderingQueue;
use crate::registry::Handler;

pub const PASSTHROUGH: &str = "passthrough";
pub const MERGE: &str = "merge";
pub const APPEND: &str = "append";
pub const FAIL: &str = "fail";

/// Register every built-in handler on `automator`.
///
/// Returns the `append` handler so callers can inspect the lists it built.
pub fn register_builtins(automator: &Automator) -> AppendHandler {
    let append = AppendHandler::new(automator.ordering_queue().clone());
    automator.register_handler(PASSTHROUGH, passthrough);
    automator.register_handler(MERGE, merge);
    automator.register_handler(APPEND, append.clone());
    automator.register_handler(FAIL, fail);
    append
}

/// Returns the descriptor without its `after` list.
pub async fn passthrough(mut descriptor: Descriptor, _context: Context) -> Result<Value> {
    descriptor.remove(AFTER_KEY);
    Ok(Value::Object(descriptor))
}

/// Collects the context entries listed in `keys` into one object.
pub async fn merge(descriptor: Descriptor, context: Context) -> Result<Value> {
    ensure_parameters(&descriptor, &["keys"])?;
    let keys = string_list(&descriptor, "keys")?;
    let available: Descriptor = context.into_iter().collect();
    ensure_parameters(&available, &keys)?;
    Ok(Value::Object(extract_attributes(&available, &keys)))
}

/// Always fails with a handler error carrying the descriptor.
pub async fn fail(descriptor: Descriptor, _context: Context) -> Result<Value> {
    let message = descriptor
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("task failed on request")
        .to_string();
    Err(AutomatorError::handler_with_data(
        message,
        Value::Object(descriptor),
    ))
}

/// Inserts `item` at the end of the named list, one insert at a time.
///
/// The position is read and written in two separate steps, like a remote API
/// that reports the current size before accepting "insert at N". Routing both
/// steps through the [`OrderingQueue`] keeps concurrent siblings from claiming
/// the same position.
#[derive(Clone, Default)]
pub struct AppendHandler {
    queue: OrderingQueue,
    lists: Arc<Mutex<HashMap<String, Vec<Value>>>>,
}

impl AppendHandler {
    pub fn new(queue: OrderingQueue) -> Self {
        Self {
            queue,
            lists: Arc::default(),
        }
    }

    /// Current contents of the named list.
    pub fn snapshot(&self, list: &str) -> Vec<Value> {
        self.lists.lock().get(list).cloned().unwrap_or_default()
    }

    /// Names of all lists appended to so far, sorted.
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lists.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl Handler for AppendHandler {
    async fn handle(&self, descriptor: Descriptor, _context: Context) -> Result<Value> {
        ensure_parameters(&descriptor, &["list", "item"])?;
        let list = descriptor
            .get("list")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AutomatorError::handler_with_data(
                    "'list' must be a string",
                    Value::Object(descriptor.clone()),
                )
            })?
            .to_string();
        let item = descriptor.get("item").cloned().unwrap_or(Value::Null);

        let lists = Arc::clone(&self.lists);
        let name = list.clone();
        let step = self.queue.enqueue(move || async move {
            let position = current_len(&lists, &name);
            tokio::task::yield_now().await;
            insert_at(&lists, &name, position, item);
            position
        });
        let sequence = step.sequence();
        let position = step.await?;

        debug!(list = %list, position, sequence, "Appended item");
        Ok(json!({ "list": list, "position": position }))
    }
}

fn current_len(lists: &Mutex<HashMap<String, Vec<Value>>>, name: &str) -> usize {
    lists.lock().get(name).map_or(0, Vec::len)
}

fn insert_at(lists: &Mutex<HashMap<String, Vec<Value>>>, name: &str, position: usize, item: Value) {
    let mut lists = lists.lock();
    let entries = lists.entry(name.to_string()).or_default();
    let position = position.min(entries.len());
    entries.insert(position, item);
}

fn string_list(descriptor: &Descriptor, key: &str) -> Result<Vec<String>> {
    let invalid = || {
        AutomatorError::handler_with_data(
            format!("'{key}' must be an array of strings"),
            Value::Object(descriptor.clone()),
        )
    };
    descriptor
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(invalid)?
        .iter()
        .map(|value| value.as_str().map(str::to_string).ok_or_else(invalid))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn descriptor(value: Value) -> Descriptor {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_passthrough_strips_after() {
        let d = descriptor(json!({ "label": "Home", "after": [ { "x": null } ] }));
        let result = passthrough(d, Context::new()).await.unwrap();
        assert_eq!(result, json!({ "label": "Home" }));
    }

    #[tokio::test]
    async fn test_merge_collects_context_keys() {
        let d = descriptor(json!({ "keys": ["workspace", "region"] }));
        let context: Context = [
            ("workspace".to_string(), json!({ "id": 1 })),
            ("region".to_string(), json!("eu")),
            ("other".to_string(), json!(true)),
        ]
        .into();

        let result = merge(d, context).await.unwrap();
        assert_eq!(result, json!({ "workspace": { "id": 1 }, "region": "eu" }));
    }

    #[tokio::test]
    async fn test_merge_missing_context_key() {
        let d = descriptor(json!({ "keys": ["workspace"] }));
        let err = merge(d, Context::new()).await.unwrap_err();
        assert!(matches!(err, AutomatorError::KeyError { ref key, .. } if key == "workspace"));
    }

    #[tokio::test]
    async fn test_merge_requires_keys() {
        let err = merge(Descriptor::new(), Context::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::KeyError);
    }

    #[tokio::test]
    async fn test_merge_rejects_non_string_keys() {
        let d = descriptor(json!({ "keys": [1] }));
        let err = merge(d, Context::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HandlerError);
        assert!(err.to_string().contains("array of strings"));
    }

    #[tokio::test]
    async fn test_fail_uses_message_and_payload() {
        let d = descriptor(json!({ "message": "quota exceeded" }));
        let err = fail(d, Context::new()).await.unwrap_err();
        let envelope = err.envelope();
        assert_eq!(envelope.kind, ErrorKind::HandlerError);
        assert_eq!(envelope.message, "quota exceeded");
        assert_eq!(envelope.data, json!({ "message": "quota exceeded" }));
    }

    #[tokio::test]
    async fn test_fail_default_message() {
        let err = fail(Descriptor::new(), Context::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "task failed on request");
    }

    #[tokio::test]
    async fn test_append_assigns_positions() {
        let handler = AppendHandler::new(OrderingQueue::new());
        let first = handler
            .handle(descriptor(json!({ "list": "nav", "item": "Home" })), Context::new())
            .await
            .unwrap();
        let second = handler
            .handle(descriptor(json!({ "list": "nav", "item": "Files" })), Context::new())
            .await
            .unwrap();

        assert_eq!(first, json!({ "list": "nav", "position": 0 }));
        assert_eq!(second, json!({ "list": "nav", "position": 1 }));
        assert_eq!(handler.snapshot("nav"), vec![json!("Home"), json!("Files")]);
    }

    #[tokio::test]
    async fn test_concurrent_appends_get_distinct_positions() {
        let handler = AppendHandler::new(OrderingQueue::new());
        let calls = (0..8).map(|i| {
            handler.handle(descriptor(json!({ "list": "nav", "item": i })), Context::new())
        });
        let results = futures::future::join_all(calls).await;

        let mut positions: Vec<u64> = results
            .into_iter()
            .map(|r| r.unwrap()["position"].as_u64().unwrap())
            .collect();
        positions.sort();
        assert_eq!(positions, (0..8).collect::<Vec<u64>>());
        assert_eq!(handler.snapshot("nav").len(), 8);
    }

    #[tokio::test]
    async fn test_append_requires_list_and_item() {
        let handler = AppendHandler::new(OrderingQueue::new());
        let err = handler
            .handle(descriptor(json!({ "list": "nav" })), Context::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AutomatorError::KeyError { ref key, .. } if key == "item"));
    }

    #[tokio::test]
    async fn test_register_builtins() {
        let automator = Automator::new();
        register_builtins(&automator);
        assert_eq!(
            automator.registry().names(),
            vec!["append", "fail", "merge", "passthrough"]
        );
    }

    #[test]
    fn test_list_names_sorted() {
        let handler = AppendHandler::default();
        insert_at(&handler.lists, "storage", 0, json!(1));
        insert_at(&handler.lists, "nav", 0, json!(1));
        assert_eq!(handler.list_names(), vec!["nav", "storage"]);
    }
}
