//! Running a graph on a dedicated thread.
//!
//! A [`Graph`] is not `Send`, so the runner takes a builder closure and
//! assembles the graph on its own thread. Lifecycle events are reported over
//! a crossbeam channel; the run is cancelled through an [`Interrupter`].

use crate::pipeline::error::{GraphError, GraphResult};
use crate::pipeline::graph::{Graph, Interrupter, RunStatus};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

/// Channel capacity for run events. A run sends at most two.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Lifecycle of a background run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// The graph was built and is about to run.
    Started,
    /// The run stopped: every sink ended, or it was interrupted.
    Finished(RunStatus),
    /// Building or running the graph failed.
    Failed(String),
}

/// Handle on a graph running in the background.
pub struct GraphRunner {
    handle: Option<JoinHandle<GraphResult<RunStatus>>>,
    events: Receiver<RunEvent>,
    interrupter: Interrupter,
}

impl GraphRunner {
    /// Build a graph with `builder` on a new thread and run it to completion.
    pub fn spawn<F>(builder: F) -> Self
    where
        F: FnOnce() -> GraphResult<Graph> + Send + 'static,
    {
        let (event_tx, events) = bounded(EVENT_CHANNEL_CAPACITY);
        let interrupter = Interrupter::new();
        let thread_interrupter = interrupter.clone();
        let handle = std::thread::spawn(move || run(builder, thread_interrupter, event_tx));
        Self {
            handle: Some(handle),
            events,
            interrupter,
        }
    }

    pub fn events(&self) -> &Receiver<RunEvent> {
        &self.events
    }

    pub fn interrupter(&self) -> Interrupter {
        self.interrupter.clone()
    }

    /// Ask the graph to stop at its next scheduling round.
    pub fn interrupt(&self) {
        self.interrupter.set();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the run to end and return its outcome.
    pub fn wait(mut self) -> GraphResult<RunStatus> {
        self.join()
    }

    fn join(&mut self) -> GraphResult<RunStatus> {
        let Some(handle) = self.handle.take() else {
            return Err(GraphError::callback("graph runner was already joined"));
        };
        handle
            .join()
            .map_err(|_| GraphError::callback("graph runner thread panicked"))?
    }
}

impl Drop for GraphRunner {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.interrupter.set();
            if let Err(e) = self.join() {
                tracing::warn!("Background graph run ended with an error: {}", e);
            }
        }
    }
}

fn run<F>(builder: F, interrupter: Interrupter, events: Sender<RunEvent>) -> GraphResult<RunStatus>
where
    F: FnOnce() -> GraphResult<Graph>,
{
    let mut graph = match builder() {
        Ok(graph) => graph,
        Err(e) => {
            tracing::warn!("Failed to build graph: {}", e);
            let _ = events.send(RunEvent::Failed(e.to_string()));
            return Err(e);
        }
    };
    graph.add_interrupter(interrupter);
    let backoff = Duration::from_millis(graph.settings().again_backoff_ms);

    tracing::info!(
        "Running graph with {} component(s) in the background",
        graph.component_count()
    );
    let _ = events.send(RunEvent::Started);

    loop {
        match graph.run() {
            Ok(RunStatus::Again) | Ok(RunStatus::Ok) => {
                tracing::trace!("No sink is ready; backing off for {:?}", backoff);
                std::thread::sleep(backoff);
            }
            Ok(status) => {
                tracing::info!("Background graph run finished: {:?}", status);
                let _ = events.send(RunEvent::Finished(status));
                return Ok(status);
            }
            Err(e) => {
                tracing::warn!("Background graph run failed: {}", e);
                let _ = events.send(RunEvent::Failed(e.to_string()));
                return Err(e);
            }
        }
    }
}
