//! Error types used by the boot orchestrator, units, the event bus and the store.
//!
//! - [`BootError`] - terminal results of registration and [`Boot::start`](crate::Boot::start).
//! - [`UnitError`] - errors returned (or raised) by a single unit handler.
//! - [`RequireError`] - outcome of a failed [`RunContext::require`](crate::RunContext::require).
//! - [`StoreError`] - cancellation of a blocking store read.
//! - [`EventError`] - publish/subscribe failures.
//!
//! Every enum provides `as_label` (stable snake_case) for logs and metrics.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::units::Phase;

/// Boxed error accepted from event handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// # Terminal errors of the orchestrator.
///
/// Anything returned from [`Boot::start`](crate::Boot::start) other than
/// [`BootError::AlreadyStarted`] means startup failed and the host process is
/// expected to exit (see [`BootError::is_fatal`]).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BootError {
    /// A unit name was registered twice while name repeat is disabled.
    #[error("register unit name repeat: {name}")]
    DuplicateUnit {
        /// The repeated unit name.
        name: String,
    },

    /// `start()` was already called on this orchestrator.
    #[error("boot already started")]
    AlreadyStarted,

    /// A non-recoverable unit failed.
    #[error("[{name}] unit start failed in {phase} phase: {source}")]
    UnitFailed {
        /// Unit name.
        name: String,
        /// Phase the unit was registered in.
        phase: Phase,
        /// The handler failure.
        #[source]
        source: UnitError,
    },

    /// A non-recoverable unit exceeded its timeout.
    #[error("[{name}] unit start timeout after {timeout:?} in {phase} phase")]
    UnitTimeout {
        /// Unit name.
        name: String,
        /// Phase the unit was registered in.
        phase: Phase,
        /// The configured unit timeout.
        timeout: Duration,
    },

    /// The global boot watchdog fired before `start()` finished.
    #[error("boot did not finish within {timeout:?}")]
    BootTimeout {
        /// The configured watchdog duration.
        timeout: Duration,
    },

    /// A unit execution was torn down by the runtime (task abort or join failure).
    #[error("unit execution aborted: {reason}")]
    Aborted {
        /// Join error description.
        reason: String,
    },
}

impl BootError {
    /// Builds the escalation error for a failed unit attempt.
    pub(crate) fn escalate(name: &str, phase: Phase, err: UnitError) -> Self {
        match err {
            UnitError::Timeout { timeout } => BootError::UnitTimeout {
                name: name.to_string(),
                phase,
                timeout,
            },
            source => BootError::UnitFailed {
                name: name.to_string(),
                phase,
                source,
            },
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use bootvisor::BootError;
    /// use std::time::Duration;
    ///
    /// let err = BootError::BootTimeout { timeout: Duration::from_secs(60) };
    /// assert_eq!(err.as_label(), "boot_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BootError::DuplicateUnit { .. } => "boot_duplicate_unit",
            BootError::AlreadyStarted => "boot_already_started",
            BootError::UnitFailed { .. } => "boot_unit_failed",
            BootError::UnitTimeout { .. } => "boot_unit_timeout",
            BootError::BootTimeout { .. } => "boot_timeout",
            BootError::Aborted { .. } => "boot_aborted",
        }
    }

    /// Whether the host process should terminate on this error.
    ///
    /// Only [`BootError::AlreadyStarted`] is benign.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, BootError::AlreadyStarted)
    }

    /// Name of the unit that caused the failure, if any.
    pub fn unit(&self) -> Option<&str> {
        match self {
            BootError::DuplicateUnit { name }
            | BootError::UnitFailed { name, .. }
            | BootError::UnitTimeout { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// # Errors produced by a unit handler.
///
/// Handlers return these directly; panics inside a handler are converted into
/// [`UnitError::Panicked`] by the execution wrapper.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum UnitError {
    /// The unit exceeded its configured timeout.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout that was exceeded.
        timeout: Duration,
    },

    /// Handler reported a failure.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Handler panicked.
    #[error("panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
    },

    /// Handler observed cancellation of its scope and gave up.
    #[error("context cancelled")]
    Canceled,

    /// A dependency wait failed.
    #[error(transparent)]
    Require(#[from] RequireError),

    /// A store wait failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl UnitError {
    /// Shorthand for [`UnitError::Fail`] from anything printable.
    ///
    /// # Example
    /// ```
    /// use bootvisor::UnitError;
    ///
    /// let err = UnitError::fail("connection refused");
    /// assert_eq!(err.to_string(), "execution failed: connection refused");
    /// ```
    pub fn fail(error: impl fmt::Display) -> Self {
        UnitError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            UnitError::Timeout { .. } => "unit_timeout",
            UnitError::Fail { .. } => "unit_failed",
            UnitError::Panicked { .. } => "unit_panicked",
            UnitError::Canceled => "unit_canceled",
            UnitError::Require(_) => "unit_require",
            UnitError::Store(_) => "unit_store",
        }
    }
}

/// # Errors returned by [`RunContext::require`](crate::RunContext::require).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequireError {
    /// No unit with this name was ever registered.
    #[error("require {name} not found")]
    NotFound {
        /// The requested unit name.
        name: String,
    },

    /// The caller's scope ended before the dependency signal fired.
    #[error("require {name}: context cancelled")]
    Canceled {
        /// The requested unit name.
        name: String,
    },
}

impl RequireError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RequireError::NotFound { .. } => "require_not_found",
            RequireError::Canceled { .. } => "require_canceled",
        }
    }
}

/// # Errors returned by blocking store reads.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The caller's scope ended before the key became present.
    #[error("load {key}: context cancelled")]
    Canceled {
        /// The awaited key.
        key: String,
    },
}

/// A single failed event handler inside an aggregated publish error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerFailure {
    /// Handler returned an error.
    Error {
        /// Subscription key of the handler.
        key: String,
        /// Rendered error.
        message: String,
    },
    /// Handler panicked.
    Panicked {
        /// Subscription key of the handler.
        key: String,
        /// Panic payload rendered as text.
        message: String,
    },
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerFailure::Error { message, .. } => f.write_str(message),
            HandlerFailure::Panicked { message, .. } => write!(f, "recover: {message}"),
        }
    }
}

/// # Errors produced by the event bus.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum EventError {
    /// Nothing is subscribed to the topic.
    #[error("event {topic} not found")]
    TopicNotFound {
        /// The published topic.
        topic: String,
    },

    /// One or more handlers failed; every failure is kept.
    #[error("event {topic}: {}", join_failures(.failures))]
    Handlers {
        /// The published topic.
        topic: String,
        /// All handler failures of this publish.
        failures: Vec<HandlerFailure>,
    },

    /// No unique subscription key could be generated.
    #[error("failed to generate unique key, retries {retries}")]
    KeyExhausted {
        /// Number of attempts made.
        retries: usize,
    },

    /// The asynchronous queue was full and the item was dropped.
    #[error("event {topic} dropped: queue full (capacity {capacity})")]
    QueueFull {
        /// The published topic.
        topic: String,
        /// Configured queue capacity.
        capacity: usize,
    },

    /// The bus was shut down before the item could be delivered.
    #[error("event {topic} dropped: bus closed")]
    Closed {
        /// The published topic.
        topic: String,
    },
}

impl EventError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventError::TopicNotFound { .. } => "event_topic_not_found",
            EventError::Handlers { .. } => "event_handlers_failed",
            EventError::KeyExhausted { .. } => "event_key_exhausted",
            EventError::QueueFull { .. } => "event_queue_full",
            EventError::Closed { .. } => "event_bus_closed",
        }
    }

    /// Handler failures carried by this error (empty for other variants).
    pub fn failures(&self) -> &[HandlerFailure] {
        match self {
            EventError::Handlers { failures, .. } => failures,
            _ => &[],
        }
    }
}

fn join_failures(failures: &[HandlerFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Renders a panic payload caught by `catch_unwind`.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
