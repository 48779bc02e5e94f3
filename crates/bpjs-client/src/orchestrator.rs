//! Ordered fallback across request strategies.
//!
//! Some gateway operations only work under one of several request shapes
//! (body encoding, path variant). An [`Orchestrator`] tries them in order,
//! strictly sequentially, and stops at the first acceptable result.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tracing::{error, info, warn};

use crate::error::ClientError;
use crate::normalizer::Normalizer;
use crate::result::{ApiResult, EmptyPolicy};
use crate::transport::Exchange;

pub type StrategyFuture<'a> = Pin<Box<dyn Future<Output = Result<Exchange, ClientError>> + Send + 'a>>;

/// One named way of performing an operation.
pub struct Strategy<'a> {
    pub name: &'static str,
    run: Box<dyn FnOnce() -> StrategyFuture<'a> + Send + 'a>,
}

impl<'a> Strategy<'a> {
    pub fn new<F, Fut>(name: &'static str, run: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<Exchange, ClientError>> + Send + 'a,
    {
        Self {
            name,
            run: Box::new(move || Box::pin(run())),
        }
    }
}

impl fmt::Debug for Strategy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strategy").field("name", &self.name).finish()
    }
}

/// Outcome of one strategy attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub strategy: &'static str,
    pub outcome: ApiResult,
}

/// Final result plus the trail of attempts that led to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Orchestrated {
    pub result: ApiResult,
    /// Strategy that produced an acceptable result, if any
    pub strategy: Option<&'static str>,
    pub attempts: Vec<Attempt>,
}

impl Orchestrated {
    pub fn into_result(self) -> ApiResult {
        self.result
    }
}

pub struct Orchestrator<'a> {
    operation: &'a str,
    normalizer: &'a Normalizer,
    strategies: Vec<Strategy<'a>>,
    empty: EmptyPolicy,
}

impl<'a> Orchestrator<'a> {
    pub fn new(operation: &'a str, normalizer: &'a Normalizer) -> Self {
        Self {
            operation,
            normalizer,
            strategies: Vec::new(),
            empty: EmptyPolicy::Reject,
        }
    }

    pub fn strategy(mut self, strategy: Strategy<'a>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Treat `Empty` as a terminal, acceptable outcome.
    pub fn accept_empty(self, accept: bool) -> Self {
        self.empty_policy(if accept {
            EmptyPolicy::Accept
        } else {
            EmptyPolicy::Reject
        })
    }

    pub fn empty_policy(mut self, policy: EmptyPolicy) -> Self {
        self.empty = policy;
        self
    }

    /// Runs strategies in order. Each one runs at most once.
    pub async fn run(self) -> Orchestrated {
        let Self {
            operation,
            normalizer,
            strategies,
            empty,
        } = self;

        let total = strategies.len();
        let mut attempts = Vec::with_capacity(total);

        for (index, strategy) in strategies.into_iter().enumerate() {
            let name = strategy.name;
            info!(operation, strategy = name, index = index + 1, total, "Trying strategy");

            let outcome = match (strategy.run)().await {
                Ok(exchange) => normalizer.normalize_exchange(operation, &exchange),
                Err(ClientError::Transport(err)) => normalizer.normalize(operation, Err(err)),
                Err(err) => ApiResult::TransportError {
                    message: err.to_string(),
                },
            };

            if outcome.is_acceptable(empty) {
                info!(operation, strategy = name, code = outcome.code(), "Strategy succeeded");
                attempts.push(Attempt {
                    strategy: name,
                    outcome: outcome.clone(),
                });
                return Orchestrated {
                    result: outcome,
                    strategy: Some(name),
                    attempts,
                };
            }

            warn!(operation, strategy = name, outcome = %outcome.summary(), "Strategy failed");
            attempts.push(Attempt {
                strategy: name,
                outcome,
            });
        }

        let result = exhausted(operation, &attempts);
        error!(operation, attempts = attempts.len(), message = result.message(), "All strategies failed");
        Orchestrated {
            result,
            strategy: None,
            attempts,
        }
    }
}

fn exhausted(operation: &str, attempts: &[Attempt]) -> ApiResult {
    let trail = attempts
        .iter()
        .map(|a| format!("{}: {}", a.strategy, a.outcome.summary()))
        .collect::<Vec<_>>()
        .join("; ");

    let mut message = format!("all {} strategies failed for {operation}", attempts.len());
    if !trail.is_empty() {
        message.push_str(&format!(" ({trail})"));
    }
    if let Some(last) = attempts.last() {
        message.push_str(&format!(". Last error: {}", last.outcome.message()));
    }

    ApiResult::UpstreamError {
        code: "500".to_string(),
        message,
        raw_body: None,
    }
}
