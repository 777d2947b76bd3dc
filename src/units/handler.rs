//! # Unit handler abstraction and function-backed implementation.
//!
//! [`Handler`] is the async body of a unit. It receives a fresh
//! [`RunContext`] per run attempt (daemon units get a new one on every
//! restart). [`UnitFn`] adapts a closure that *creates* a new future per call,
//! so no state leaks between attempts unless the closure captures an `Arc`.
//!
//! ## Example
//! ```rust
//! use bootvisor::{Handler, RunContext, UnitError, UnitFn};
//!
//! let h = UnitFn::new(|ctx: RunContext| async move {
//!     ctx.print("connected");
//!     Ok::<_, UnitError>(())
//! });
//! let _shared: std::sync::Arc<dyn Handler> = std::sync::Arc::new(h);
//! ```

use std::future::Future;

use async_trait::async_trait;

use crate::core::RunContext;
use crate::error::UnitError;

/// # Asynchronous body of a unit.
///
/// Implementations should watch [`RunContext::scope`] and stop promptly once
/// it is cancelled (timeout or end of the attempt).
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use bootvisor::{Handler, RunContext, UnitError};
///
/// struct Migrate;
///
/// #[async_trait]
/// impl Handler for Migrate {
///     async fn run(&self, ctx: RunContext) -> Result<(), UnitError> {
///         if ctx.scope().is_cancelled() {
///             return Err(UnitError::Canceled);
///         }
///         ctx.print("migrations applied");
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Executes one run attempt.
    async fn run(&self, ctx: RunContext) -> Result<(), UnitError>;
}

/// Closure-backed [`Handler`].
pub struct UnitFn<F> {
    f: F,
}

impl<F> UnitFn<F> {
    /// Wraps a closure `Fn(RunContext) -> Future`.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Handler for UnitFn<F>
where
    F: Fn(RunContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), UnitError>> + Send + 'static,
{
    async fn run(&self, ctx: RunContext) -> Result<(), UnitError> {
        (self.f)(ctx).await
    }
}
