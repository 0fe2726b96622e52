use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::connection::{RawRow, StoreConnection};
use crate::error::{Result, VectorStoreError};
use crate::schema::SchemaInitializer;
use crate::statement::Statement;

/// A queued answer for the next primitive call.
#[derive(Debug)]
pub enum Reply {
    Affected(u64),
    Row(Option<RawRow>),
    Rows(Vec<RawRow>),
    Error(VectorStoreError),
}

/// In-process [`StoreConnection`] that answers from a queue and records
/// every statement it receives.
#[derive(Clone, Default)]
pub struct ScriptedConnection {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    statements: Arc<Mutex<Vec<Statement>>>,
    closed: Arc<AtomicBool>,
}

impl ScriptedConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, reply: Reply) -> &Self {
        self.replies
            .try_lock()
            .expect("not concurrent during setup")
            .push_back(reply);
        self
    }

    /// Queue successful answers for every schema bootstrap statement.
    pub fn with_schema_bootstrap(self) -> Self {
        for _ in SchemaInitializer::new(1).statements() {
            self.push(Reply::Affected(0));
        }
        self
    }

    /// Everything executed so far, in order.
    pub async fn statements(&self) -> Vec<Statement> {
        self.statements.lock().await.clone()
    }

    async fn next(&self, statement: &Statement) -> Result<Reply> {
        if self.is_closed() {
            return Err(VectorStoreError::Connection(
                "connection is closed".to_string(),
            ));
        }
        self.statements.lock().await.push(statement.clone());
        match self.replies.lock().await.pop_front() {
            Some(Reply::Error(e)) => Err(e),
            Some(reply) => Ok(reply),
            None => Err(VectorStoreError::Query(
                "scripted connection exhausted replies".to_string(),
            )),
        }
    }
}

fn unexpected(expected: &str, got: Reply) -> VectorStoreError {
    VectorStoreError::Query(format!(
        "scripted connection: expected {expected} reply, got {got:?}"
    ))
}

#[async_trait]
impl StoreConnection for ScriptedConnection {
    async fn execute(&self, statement: &Statement) -> Result<u64> {
        match self.next(statement).await? {
            Reply::Affected(n) => Ok(n),
            other => Err(unexpected("affected", other)),
        }
    }

    /// One reply per statement; stops at the first error.
    async fn execute_batch(&self, statements: &[Statement]) -> Result<u64> {
        let mut affected = 0;
        for statement in statements {
            affected += self.execute(statement).await?;
        }
        Ok(affected)
    }

    async fn query_row(&self, statement: &Statement) -> Result<Option<RawRow>> {
        match self.next(statement).await? {
            Reply::Row(row) => Ok(row),
            Reply::Rows(rows) => Ok(rows.into_iter().next()),
            other => Err(unexpected("row", other)),
        }
    }

    async fn query(&self, statement: &Statement) -> Result<Vec<RawRow>> {
        match self.next(statement).await? {
            Reply::Rows(rows) => Ok(rows),
            other => Err(unexpected("rows", other)),
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
