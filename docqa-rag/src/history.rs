//! A log of asked questions and the answers given.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::Result;

/// Number of exchanges shown when no limit is given.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// One question with the answer it received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
    pub asked_at: DateTime<Utc>,
}

impl Exchange {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self { question: question.into(), answer: answer.into(), asked_at: Utc::now() }
    }
}

/// Storage for past exchanges.
#[async_trait]
pub trait HistoryLog: Send + Sync {
    /// Append an exchange.
    async fn record(&self, exchange: Exchange) -> Result<()>;

    /// The latest `limit` exchanges, oldest first.
    async fn recent(&self, limit: usize) -> Result<Vec<Exchange>>;
}

/// A [`HistoryLog`] that lives for the duration of the process.
#[derive(Debug, Default)]
pub struct InMemoryHistoryLog {
    exchanges: RwLock<Vec<Exchange>>,
}

impl InMemoryHistoryLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryLog for InMemoryHistoryLog {
    async fn record(&self, exchange: Exchange) -> Result<()> {
        self.exchanges.write().await.push(exchange);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Exchange>> {
        let exchanges = self.exchanges.read().await;
        let start = exchanges.len().saturating_sub(limit);
        Ok(exchanges[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recent_keeps_the_latest_in_order() {
        let log = InMemoryHistoryLog::new();
        for i in 0..5 {
            log.record(Exchange::new(format!("q{i}"), format!("a{i}"))).await.unwrap();
        }

        let latest = log.recent(2).await.unwrap();
        let questions: Vec<_> = latest.iter().map(|e| e.question.as_str()).collect();
        assert_eq!(questions, ["q3", "q4"]);
        assert_eq!(log.recent(50).await.unwrap().len(), 5);
        assert!(log.recent(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_log() {
        assert!(InMemoryHistoryLog::new().recent(DEFAULT_HISTORY_LIMIT).await.unwrap().is_empty());
    }
}
