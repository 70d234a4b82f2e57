use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::CoordinatorError;

/// The I/O or compute step an operation is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Queued,
    Registering,
    Encrypting,
    StoringBlob,
    AppendingIndex,
    ReadingIndex,
    FetchingBlob,
    Decrypting,
    ResolvingGrantee,
    GeneratingGrant,
    Reencrypting,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Step::Queued => "queued",
            Step::Registering => "registering",
            Step::Encrypting => "encrypting",
            Step::StoringBlob => "storing blob",
            Step::AppendingIndex => "appending index entry",
            Step::ReadingIndex => "reading index",
            Step::FetchingBlob => "fetching blob",
            Step::Decrypting => "decrypting",
            Step::ResolvingGrantee => "resolving grantee",
            Step::GeneratingGrant => "generating grant",
            Step::Reencrypting => "re-encrypting",
        };
        f.write_str(s)
    }
}

/// Observable lifecycle of one operation
///
/// Any number of `Pending` events are followed by exactly one terminal
/// event.
#[derive(Debug, Clone)]
pub enum OperationStatus<T> {
    Pending(Step),
    Succeeded(T),
    Failed(Arc<CoordinatorError>),
}

impl<T> OperationStatus<T> {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationStatus::Pending(_))
    }
}

/// Step reporter handed to coordinator operations
#[derive(Clone, Default)]
pub struct Progress {
    report: Option<Arc<dyn Fn(Step) + Send + Sync>>,
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("observed", &self.report.is_some())
            .finish()
    }
}

impl Progress {
    /// A reporter nobody listens to
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(report: impl Fn(Step) + Send + Sync + 'static) -> Self {
        Self {
            report: Some(Arc::new(report)),
        }
    }

    pub(crate) fn step(&self, step: Step) {
        tracing::trace!("operation step: {}", step);
        if let Some(report) = &self.report {
            report(step);
        }
    }
}

/// Publishes `Failed(Cancelled)` if the operation ends without an outcome
struct Completion<T> {
    tx: Arc<watch::Sender<OperationStatus<T>>>,
    done: bool,
}

impl<T> Completion<T> {
    fn finish(mut self, result: Result<T, CoordinatorError>) {
        let status = match result {
            Ok(value) => OperationStatus::Succeeded(value),
            Err(e) => OperationStatus::Failed(Arc::new(e)),
        };
        self.tx.send_replace(status);
        self.done = true;
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        if !self.done {
            self.tx
                .send_replace(OperationStatus::Failed(Arc::new(CoordinatorError::Cancelled)));
        }
    }
}

/// Handle to an operation running on the tokio runtime
///
/// Dropping the handle detaches the operation; [`cancel`](Self::cancel)
/// aborts it at its next suspension point.
#[derive(Debug)]
pub struct OperationHandle<T> {
    status: watch::Receiver<OperationStatus<T>>,
    task: JoinHandle<()>,
}

impl<T> OperationHandle<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn spawn<F, Fut>(operation: F) -> Self
    where
        F: FnOnce(Progress) -> Fut,
        Fut: Future<Output = Result<T, CoordinatorError>> + Send + 'static,
    {
        let (tx, status) = watch::channel(OperationStatus::Pending(Step::Queued));
        let tx = Arc::new(tx);

        let reporter = tx.clone();
        let progress = Progress::new(move |step| {
            reporter.send_replace(OperationStatus::Pending(step));
        });
        let completion = Completion { tx, done: false };

        let fut = operation(progress);
        let task = tokio::spawn(async move {
            let result = fut.await;
            completion.finish(result);
        });

        Self { status, task }
    }

    /// The most recent status
    pub fn status(&self) -> OperationStatus<T> {
        self.status.borrow().clone()
    }

    /// A receiver for status events, e.g. for a presentation layer
    pub fn subscribe(&self) -> watch::Receiver<OperationStatus<T>> {
        self.status.clone()
    }

    pub fn cancel(&self) {
        self.task.abort();
    }

    /// Wait for the terminal event
    pub async fn outcome(mut self) -> Result<T, Arc<CoordinatorError>> {
        let status = match self.status.wait_for(|status| status.is_terminal()).await {
            Ok(status) => status.clone(),
            Err(_) => OperationStatus::Failed(Arc::new(CoordinatorError::Cancelled)),
        };
        match status {
            OperationStatus::Succeeded(value) => Ok(value),
            OperationStatus::Failed(e) => Err(e),
            OperationStatus::Pending(_) => Err(Arc::new(CoordinatorError::Cancelled)),
        }
    }
}
