//! Component runtime — shared scaffolding for concurrently-running channels.
//!
//! A [`Component`] is an independently-runnable unit (a Telegram poller, the
//! console) that captures its shared state at construction time.
//! [`spawn_components`] runs a set of them under one [`CancellationToken`]:
//! the first component to fail cancels the token so its siblings stop too.

use std::future::Future;
use std::pin::Pin;

use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::AppError;

/// A boxed, owned future returned by [`Component::run`].
pub type ComponentFuture = Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'static>>;

/// A self-contained, concurrently-runnable unit.
pub trait Component: Send + 'static {
    /// Stable identifier used in log messages.
    fn id(&self) -> &str;

    /// Consume the component and return its run-loop.  The future should
    /// return once `shutdown` is cancelled or its own work is done.
    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture;
}

/// Handle to a running component set.  Await [`SubsystemHandle::join`] to
/// block until every component has exited.
pub struct SubsystemHandle {
    inner: JoinHandle<Result<(), AppError>>,
}

impl SubsystemHandle {
    /// Await all components and return the first error, if any.
    pub async fn join(self) -> Result<(), AppError> {
        match self.inner.await {
            Ok(r) => r,
            Err(e) => Err(AppError::Comms(format!("component manager panicked: {e}"))),
        }
    }
}

/// Spawn each component as its own task.
///
/// Any component error or panic cancels `shutdown`; the remaining components
/// are drained and the first error is returned from the handle.
pub fn spawn_components(components: Vec<Box<dyn Component>>, shutdown: CancellationToken) -> SubsystemHandle {
    let inner = tokio::spawn(async move {
        let mut set: JoinSet<Result<(), AppError>> = JoinSet::new();

        for component in components {
            debug!(component = component.id(), "spawning component");
            set.spawn(component.run(shutdown.clone()));
        }

        let mut first_err: Option<AppError> = None;
        while let Some(res) = set.join_next().await {
            let err = match res {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(e) => AppError::Comms(format!("component panicked: {e}")),
            };
            error!(error = %err, "component failed — shutting down siblings");
            shutdown.cancel();
            first_err.get_or_insert(err);
        }

        first_err.map_or(Ok(()), Err)
    });

    SubsystemHandle { inner }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UntilCancelled;

    impl Component for UntilCancelled {
        fn id(&self) -> &str {
            "waiter"
        }

        fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
            Box::pin(async move {
                shutdown.cancelled().await;
                Ok(())
            })
        }
    }

    struct Failing;

    impl Component for Failing {
        fn id(&self) -> &str {
            "failing"
        }

        fn run(self: Box<Self>, _shutdown: CancellationToken) -> ComponentFuture {
            Box::pin(async { Err(AppError::Comms("boom".into())) })
        }
    }

    #[tokio::test]
    async fn empty_set_finishes_immediately() {
        let handle = spawn_components(Vec::new(), CancellationToken::new());
        assert!(handle.join().await.is_ok());
    }

    #[tokio::test]
    async fn cancellation_stops_components() {
        let shutdown = CancellationToken::new();
        let handle = spawn_components(vec![Box::new(UntilCancelled)], shutdown.clone());
        shutdown.cancel();
        assert!(handle.join().await.is_ok());
    }

    #[tokio::test]
    async fn failure_cancels_siblings_and_is_reported() {
        let shutdown = CancellationToken::new();
        let handle = spawn_components(vec![Box::new(UntilCancelled), Box::new(Failing)], shutdown.clone());
        let err = handle.join().await.unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert!(shutdown.is_cancelled());
    }
}
