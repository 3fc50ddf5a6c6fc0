//! Repository query metrics.

use metrics::{counter, gauge, histogram};
use sqlx::PgPool;
use std::time::Instant;

/// Publishes connection pool gauges.
pub fn record_pool_metrics(pool: &PgPool) {
    let size = pool.size() as usize;
    let idle = pool.num_idle();

    gauge!("db_pool_connections", "state" => "active").set(size.saturating_sub(idle) as f64);
    gauge!("db_pool_connections", "state" => "idle").set(idle as f64);
}

/// Times one repository operation.
///
/// Call [`QueryTimer::record`] once the operation succeeded. A timer dropped
/// without being recorded counts as a failed query.
pub struct QueryTimer {
    query: &'static str,
    start: Instant,
    succeeded: bool,
}

impl QueryTimer {
    pub fn new(query: &'static str) -> Self {
        Self {
            query,
            start: Instant::now(),
            succeeded: false,
        }
    }

    pub fn record(mut self) {
        self.succeeded = true;
    }

    fn outcome(&self) -> &'static str {
        if self.succeeded {
            "ok"
        } else {
            "error"
        }
    }
}

impl Drop for QueryTimer {
    fn drop(&mut self) {
        let outcome = self.outcome();
        histogram!(
            "db_query_duration_seconds",
            "query" => self.query,
            "outcome" => outcome
        )
        .record(self.start.elapsed().as_secs_f64());

        if !self.succeeded {
            counter!("db_query_errors_total", "query" => self.query).increment(1);
        }
    }
}
