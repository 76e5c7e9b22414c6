//! In-process todo list used by the `create_todo` action.
//!
//! Entries live for the lifetime of the process only. One store is created
//! per process and shared by handle; appends are serialized through a single
//! lock so identifiers stay monotonic and counts stay exact.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: u64,
    pub title: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct TodoList {
    items: Vec<Todo>,
    last_id: u64,
}

/// Append-only, volatile todo storage.
#[derive(Debug, Default)]
pub struct TodoStore {
    inner: Mutex<TodoList>,
}

impl TodoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a new open todo and returns it with the new total count.
    pub async fn append(&self, title: &str) -> (Todo, usize) {
        let mut list = self.inner.lock().await;
        list.last_id += 1;
        let todo = Todo {
            id: list.last_id,
            title: title.to_string(),
            completed: false,
            created_at: Utc::now(),
        };
        list.items.push(todo.clone());
        (todo, list.items.len())
    }

    /// A copy of every entry in insertion order.
    pub async fn snapshot(&self) -> Vec<Todo> {
        self.inner.lock().await.items.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
