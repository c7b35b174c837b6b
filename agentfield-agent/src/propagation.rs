//! Ambient execution context
//!
//! The context of the running invocation is held in a tokio task-local so a
//! handler's nested `call`s see it without passing it explicitly. The scope
//! is entered around exactly one dispatched invocation and exited when that
//! future completes or is dropped.
//!
//! Task-locals do not cross `tokio::spawn`. Code that spawns inside a
//! handler must capture [`current`] and re-enter it with [`scope`].

use agentfield_core::ExecutionContext;
use std::future::Future;

tokio::task_local! {
    static CURRENT_EXECUTION: ExecutionContext;
}

/// Context of the in-flight invocation, if any.
pub fn current() -> Option<ExecutionContext> {
    CURRENT_EXECUTION.try_with(Clone::clone).ok()
}

/// Run `fut` with `ctx` as the ambient execution context.
pub async fn scope<F>(ctx: ExecutionContext, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT_EXECUTION.scope(ctx, fut).await
}
