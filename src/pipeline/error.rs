//! Graph-specific error types.
//!
//! "Again" and "end" are flow control and never appear here. Every other
//! outcome of a component or iterator callback is a `GraphError`, and each
//! layer that forwards one may add a single cause with [`GraphError::with_context`].

use thiserror::Error;

/// Errors that can occur within the graph engine.
#[derive(Error, Debug)]
pub enum GraphError {
    /// A component's init callback failed; the component was rolled back.
    #[error("Failed to initialize component {component:?}: {source}")]
    Init {
        component: String,
        #[source]
        source: Box<GraphError>,
    },

    #[error("A component named {0:?} already exists in the graph")]
    DuplicateName(String),

    #[error("Cannot {0}: the graph is no longer being configured")]
    NotConfiguring(&'static str),

    #[error("Cannot create a message iterator: the graph is not configured yet")]
    NotConfigured,

    #[error("The graph is faulty")]
    Faulty,

    #[error("The graph has no sink component")]
    NoSink,

    #[error("Port {0:?} is already connected")]
    PortAlreadyConnected(String),

    #[error("Port {0:?} is not connected")]
    PortNotConnected(String),

    #[error("Invalid port name {name:?}: {reason}")]
    InvalidPortName { name: String, reason: &'static str },

    #[error("Connecting {from:?} to {to:?} would create a cycle")]
    CycleDetected { from: String, to: String },

    #[error("Component {0:?} is already creating a message iterator")]
    ComponentBusy(String),

    #[error("Message iterator cannot seek {0}")]
    CannotSeek(String),

    #[error("Message iterator is inactive: its graph no longer exists")]
    Inactive,

    #[error("Out of memory")]
    Memory,

    /// Failure reported by a user callback.
    #[error("{0}")]
    Callback(String),

    #[error("Clock class mismatch: {0}")]
    ClockClass(String),

    #[error("Message time {current} ns is less than the last returned time {last} ns")]
    NonMonotonic { last: i64, current: i64 },

    #[error("Clock snapshot value {value} cannot be expressed in nanoseconds from origin")]
    ClockOverflow { value: u64 },

    #[error("Invalid parameters: {0}")]
    Params(String),

    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<GraphError>,
    },
}

impl GraphError {
    /// Create a user callback failure.
    pub fn callback(message: impl Into<String>) -> Self {
        GraphError::Callback(message.into())
    }

    /// Add one cause to the chain. Memory errors carry no cause text.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        match self {
            GraphError::Memory => GraphError::Memory,
            other => GraphError::WithContext {
                context: context.into(),
                source: Box::new(other),
            },
        }
    }

    /// Causes from the outermost context down to the root error.
    pub fn causes(&self) -> Vec<String> {
        let mut causes = Vec::new();
        let mut current = self;
        loop {
            match current {
                GraphError::WithContext { context, source } => {
                    causes.push(context.clone());
                    current = source;
                }
                GraphError::Init { component, source } => {
                    causes.push(format!("Failed to initialize component {:?}", component));
                    current = source;
                }
                root => {
                    causes.push(root.to_string());
                    return causes;
                }
            }
        }
    }

    /// The innermost error, with every context layer stripped.
    pub fn root_cause(&self) -> &GraphError {
        match self {
            GraphError::WithContext { source, .. } | GraphError::Init { source, .. } => {
                source.root_cause()
            }
            root => root,
        }
    }

    pub fn is_memory(&self) -> bool {
        matches!(self.root_cause(), GraphError::Memory)
    }
}

pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Extension trait for adding context to graph results.
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> GraphResult<T>;

    fn with_context<F>(self, f: F) -> GraphResult<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for GraphResult<T> {
    fn context(self, context: impl Into<String>) -> GraphResult<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> GraphResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
