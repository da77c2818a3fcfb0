//! Queue and logging settings read from `RENDER_QUEUE_*` variables.
//!
//! A missing or malformed variable keeps its default; loading never fails.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `RENDER_QUEUE_WORKERS` | 2 | Worker threads (0 = one per CPU) |
//! | `RENDER_QUEUE_MAX_PENDING` | 0 | Queued keys before submit blocks (0 = unbounded) |
//! | `RENDER_QUEUE_SHUTDOWN_TIMEOUT` | 30 | Drain budget for `close` (secs) |
//! | `RENDER_QUEUE_STACK_SIZE` | 0 | Worker stack size in bytes (0 = default) |
//! | `RENDER_QUEUE_LOG_LEVEL` | render_queue=info | Log filter directive |
//! | `RENDER_QUEUE_LOG_FORMAT` | json | `json` or `pretty` |

use std::str::FromStr;
use std::time::Duration;

use crate::scheduler::RenderQueueConfig;
use crate::telemetry::{LogConfig, LogFormat};

/// Smallest stack we hand to a worker when one is requested explicitly.
const MIN_STACK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub queue: RenderQueueConfig,
    pub log: LogConfig,
}

/// Read `key` and parse it, falling back to `default` when the variable is
/// unset or does not parse.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Load queue configuration from environment.
fn load_queue_config() -> RenderQueueConfig {
    let defaults = RenderQueueConfig::default();
    let workers = env_or("RENDER_QUEUE_WORKERS", defaults.workers);
    let max_pending = env_or("RENDER_QUEUE_MAX_PENDING", defaults.max_pending);
    let shutdown_secs = env_or("RENDER_QUEUE_SHUTDOWN_TIMEOUT", defaults.shutdown_timeout.as_secs());
    let shutdown_secs = shutdown_secs.max(1);
    let stack_size = match env_or::<usize>("RENDER_QUEUE_STACK_SIZE", 0) {
        0 => 0,
        n => n.max(MIN_STACK_SIZE),
    };
    RenderQueueConfig {
        workers,
        max_pending,
        stack_size,
        shutdown_timeout: Duration::from_secs(shutdown_secs),
        ..defaults
    }
}

/// Load logging configuration from environment.
fn load_log_config() -> LogConfig {
    let defaults = LogConfig::default();
    let level = std::env::var("RENDER_QUEUE_LOG_LEVEL")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(defaults.level);
    let format = std::env::var("RENDER_QUEUE_LOG_FORMAT")
        .ok()
        .and_then(|v| v.parse::<LogFormat>().ok())
        .unwrap_or(defaults.format);
    LogConfig { format, level, output_path: defaults.output_path }
}

pub fn load() -> EnvConfig {
    EnvConfig {
        queue: load_queue_config(),
        log: load_log_config(),
    }
}
