//! Result panel state driven off the interactive thread
//!
//! Every query runs as a tokio task. Issuing a new query aborts the task in
//! flight and bumps the view's generation; a finishing task applies its
//! result only while its generation is still the current one, so an older
//! query can never overwrite a newer result.

use crate::descriptor::{DatabaseNodeDescriptorFactory, NodeDescriptorFactory};
use crate::error::{DataError, Result};
use crate::traits::DatabaseClient;
use crate::tree::{build_tree, ResultTree};
use crate::types::{Document, QueryContext, QueryOptions, SearchResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// A result and the tree built from it
#[derive(Debug, Clone)]
pub struct Displayed {
    pub result: Arc<SearchResult>,
    pub tree: Arc<ResultTree>,
}

/// What the view currently shows
#[derive(Debug, Clone, Default)]
pub struct ViewSnapshot {
    /// Generation of the query whose outcome is shown, 0 before the first one
    pub generation: u64,
    /// Last successful result
    pub displayed: Option<Displayed>,
    /// Failure of the last applied query
    pub error: Option<DataError>,
    /// A query is in flight
    pub loading: bool,
}

/// How a query ended from the view's point of view
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    /// The result is now displayed
    Applied(Arc<SearchResult>),
    /// A newer query or `close` made this one obsolete; its result was dropped
    Superseded,
}

/// Completion handle of one issued query
#[derive(Debug)]
pub struct QueryHandle {
    generation: u64,
    receiver: oneshot::Receiver<Result<QueryOutcome>>,
}

impl QueryHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Wait for the query to finish
    pub async fn wait(self) -> Result<QueryOutcome> {
        // The sender is dropped when the task is aborted
        self.receiver.await.unwrap_or(Ok(QueryOutcome::Superseded))
    }
}

/// One result panel bound to a query context
pub struct ResultView {
    id: Uuid,
    client: Arc<dyn DatabaseClient>,
    context: QueryContext,
    factory: Arc<dyn NodeDescriptorFactory>,
    generation: Arc<AtomicU64>,
    state: Arc<watch::Sender<ViewSnapshot>>,
    in_flight: Mutex<Option<JoinHandle<()>>>,
    last_options: Mutex<QueryOptions>,
}

impl ResultView {
    pub fn new(client: Arc<dyn DatabaseClient>, context: QueryContext) -> Self {
        Self::with_factory(client, context, Arc::new(DatabaseNodeDescriptorFactory))
    }

    pub fn with_factory(
        client: Arc<dyn DatabaseClient>,
        context: QueryContext,
        factory: Arc<dyn NodeDescriptorFactory>,
    ) -> Self {
        let (state, _) = watch::channel(ViewSnapshot::default());

        Self {
            id: Uuid::new_v4(),
            client,
            context,
            factory,
            generation: Arc::new(AtomicU64::new(0)),
            state: Arc::new(state),
            in_flight: Mutex::new(None),
            last_options: Mutex::new(QueryOptions::default()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn context(&self) -> &QueryContext {
        &self.context
    }

    /// Receiver notified whenever a query outcome is applied
    pub fn subscribe(&self) -> watch::Receiver<ViewSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        self.state.borrow().clone()
    }

    /// Issue a query in the background and return immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn execute_query(&self, options: QueryOptions) -> QueryHandle {
        // Held until the new task is stored so issue order matches generation order
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        *self
            .last_options
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = options.clone();

        self.state.send_modify(|snapshot| snapshot.loading = true);

        debug!(
            "View {} issuing query #{} on {}",
            self.id, generation, self.context
        );

        let (sender, receiver) = oneshot::channel();
        let client = self.client.clone();
        let context = self.context.clone();
        let factory = self.factory.clone();
        let current = self.generation.clone();
        let state = self.state.clone();
        let view_id = self.id;

        let task = tokio::spawn(async move {
            let outcome = match client.execute_query(&context, &options).await {
                Ok(result) => {
                    if result.has_errors() {
                        warn!(
                            "Query #{} on {} returned {} partial errors",
                            generation,
                            context,
                            result.errors().len()
                        );
                    }
                    let result = Arc::new(result);
                    let tree = Arc::new(build_tree(&result, factory.as_ref()));
                    let displayed = Displayed {
                        result: result.clone(),
                        tree,
                    };
                    if apply(&state, &current, generation, Ok(displayed)) {
                        Ok(QueryOutcome::Applied(result))
                    } else {
                        Ok(QueryOutcome::Superseded)
                    }
                }
                Err(e) => {
                    if apply(&state, &current, generation, Err(e.clone())) {
                        Err(e)
                    } else {
                        Ok(QueryOutcome::Superseded)
                    }
                }
            };

            if matches!(outcome, Ok(QueryOutcome::Superseded)) {
                debug!("View {} discarded stale query #{}", view_id, generation);
            }

            let _ = sender.send(outcome);
        });

        if let Some(previous) = in_flight.replace(task) {
            previous.abort();
        }
        drop(in_flight);

        QueryHandle {
            generation,
            receiver,
        }
    }

    /// Re-run the last issued query
    pub fn refresh(&self) -> QueryHandle {
        let options = self
            .last_options
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        self.execute_query(options)
    }

    /// Fetch one document of the view's context
    pub async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        self.client.find_document(&self.context, id).await
    }

    /// Write a document, then refresh the view
    pub async fn update_document(&self, document: &Document) -> Result<QueryHandle> {
        self.client.update(&self.context, document).await?;
        Ok(self.refresh())
    }

    /// Delete a document, then refresh the view
    pub async fn delete_document(&self, id: &str) -> Result<QueryHandle> {
        self.client.delete(&self.context, id).await?;
        Ok(self.refresh())
    }

    /// Abandon any query in flight and clear the view
    pub fn close(&self) {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(task) = in_flight.take() {
            task.abort();
        }
        drop(in_flight);

        self.state.send_replace(ViewSnapshot {
            generation,
            ..ViewSnapshot::default()
        });

        debug!("View {} closed", self.id);
    }
}

impl Drop for ResultView {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            if let Some(task) = in_flight.take() {
                task.abort();
            }
        }
    }
}

/// Apply a finished query if it is still current. Check and store happen
/// under the channel's lock.
fn apply(
    state: &watch::Sender<ViewSnapshot>,
    current: &AtomicU64,
    generation: u64,
    outcome: Result<Displayed>,
) -> bool {
    state.send_if_modified(|snapshot| {
        if current.load(Ordering::SeqCst) != generation || snapshot.generation >= generation {
            return false;
        }

        snapshot.generation = generation;
        snapshot.loading = false;
        match outcome {
            Ok(displayed) => {
                snapshot.displayed = Some(displayed);
                snapshot.error = None;
            }
            Err(e) => snapshot.error = Some(e),
        }
        true
    })
}
