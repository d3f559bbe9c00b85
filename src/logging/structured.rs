//! Structured logging utilities.
//!
//! Provides context-aware logging with the request id (and the adapter, once
//! one is matched) included in every log message.

use std::fmt;

use uuid::Uuid;

/// Logging context for one request.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub request_id: String,
    pub adapter: Option<String>,
}

impl LogContext {
    pub fn new(request_id: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            adapter: None,
        }
    }

    /// Context with a fresh `req-xxxxxxxx` id.
    pub fn for_request() -> Self {
        Self::new(&short_id("req"))
    }

    pub fn with_adapter(&self, adapter: &str) -> Self {
        Self {
            request_id: self.request_id.clone(),
            adapter: Some(adapter.to_string()),
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.adapter {
            Some(adapter) => write!(f, "[request={}] [adapter={}]", self.request_id, adapter),
            None => write!(f, "[request={}]", self.request_id),
        }
    }
}

/// `<prefix>-` followed by the first 8 hex chars of a v4 uuid.
pub fn short_id(prefix: &str) -> String {
    format!("{}-{}", prefix, &Uuid::new_v4().simple().to_string()[..8])
}

/// Log an info message with context.
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $event:expr) => {
        log::info!("{} {}", $ctx, $event)
    };
    ($ctx:expr, $event:expr, $($key:ident = $value:expr),+ $(,)?) => {
        log::info!(
            concat!("{} {}", $(" ", stringify!($key), "={}"),+),
            $ctx,
            $event,
            $($value),+
        )
    };
}

/// Log a warning message with context.
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $event:expr) => {
        log::warn!("{} {}", $ctx, $event)
    };
    ($ctx:expr, $event:expr, $($key:ident = $value:expr),+ $(,)?) => {
        log::warn!(
            concat!("{} {}", $(" ", stringify!($key), "={}"),+),
            $ctx,
            $event,
            $($value),+
        )
    };
}

/// Log an error message with context.
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $event:expr) => {
        log::error!("{} {}", $ctx, $event)
    };
    ($ctx:expr, $event:expr, $($key:ident = $value:expr),+ $(,)?) => {
        log::error!(
            concat!("{} {}", $(" ", stringify!($key), "={}"),+),
            $ctx,
            $event,
            $($value),+
        )
    };
}

/// Log a debug message with context.
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $event:expr) => {
        log::debug!("{} {}", $ctx, $event)
    };
    ($ctx:expr, $event:expr, $($key:ident = $value:expr),+ $(,)?) => {
        log::debug!(
            concat!("{} {}", $(" ", stringify!($key), "={}"),+),
            $ctx,
            $event,
            $($value),+
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_context_display() {
        let ctx = LogContext::new("req-123");
        assert_eq!(format!("{}", ctx), "[request=req-123]");

        let ctx_with_adapter = ctx.with_adapter("t/a");
        assert_eq!(
            format!("{}", ctx_with_adapter),
            "[request=req-123] [adapter=t/a]"
        );
    }

    #[test]
    fn test_short_id_shape() {
        let id = short_id("batch");
        assert_eq!(id.len(), "batch-".len() + 8);
        assert!(id["batch-".len()..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_macros_expand() {
        let ctx = LogContext::new("req-1");
        crate::log_debug!(ctx, "STEP_SKIPPED", index = 0, reason = "falsy_input");
        crate::log_info!(ctx, "REQUEST_UNMATCHED");
        crate::log_warn!(ctx, "REQUEST_FAILED", error = "boom",);
    }
}
