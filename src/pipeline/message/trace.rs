//! Trace-domain objects carried by messages.
//!
//! The engine never interprets these beyond identity and ordering: the muxer
//! compares them to break timestamp ties, and seeking tracks which streams
//! and packets are open. They are shared with `Rc` because many messages
//! refer to the same stream or event class.

use crate::pipeline::message::clock::ClockClass;
use std::rc::Rc;
use uuid::Uuid;

/// A trace: a set of streams sharing an identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trace {
    pub name: Option<String>,
    pub uuid: Option<Uuid>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }
}

/// Shape shared by the streams of one class.
#[derive(Debug, Clone, Default)]
pub struct StreamClass {
    pub id: u64,
    pub name: Option<String>,
    pub default_clock_class: Option<Rc<ClockClass>>,
    pub supports_packets: bool,
    pub supports_discarded_events: bool,
    pub supports_discarded_packets: bool,
}

impl StreamClass {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_default_clock_class(mut self, clock_class: Rc<ClockClass>) -> Self {
        self.default_clock_class = Some(clock_class);
        self
    }

    pub fn with_packets(mut self, supports_packets: bool) -> Self {
        self.supports_packets = supports_packets;
        self
    }

    pub fn with_discarded_events(mut self, supported: bool) -> Self {
        self.supports_discarded_events = supported;
        self
    }

    pub fn with_discarded_packets(mut self, supported: bool) -> Self {
        self.supports_discarded_packets = supported;
        self
    }
}

/// One stream of a trace.
#[derive(Debug, Clone)]
pub struct Stream {
    pub id: u64,
    pub name: Option<String>,
    pub class: Rc<StreamClass>,
    pub trace: Rc<Trace>,
}

impl Stream {
    pub fn new(id: u64, class: Rc<StreamClass>, trace: Rc<Trace>) -> Self {
        Self {
            id,
            name: None,
            class,
            trace,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn default_clock_class(&self) -> Option<&Rc<ClockClass>> {
        self.class.default_clock_class.as_ref()
    }
}

/// A packet within a stream.
#[derive(Debug, Clone)]
pub struct Packet {
    pub stream: Rc<Stream>,
}

impl Packet {
    pub fn new(stream: Rc<Stream>) -> Self {
        Self { stream }
    }
}

/// Severity of an event class, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Emergency,
    Alert,
    Critical,
    Error,
    Warning,
    Notice,
    Info,
    DebugSystem,
    DebugProgram,
    DebugProcess,
    DebugModule,
    DebugUnit,
    DebugFunction,
    DebugLine,
    Debug,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventClass {
    pub id: u64,
    pub name: Option<String>,
    pub log_level: Option<LogLevel>,
    pub emf_uri: Option<String>,
}

impl EventClass {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_log_level(mut self, log_level: LogLevel) -> Self {
        self.log_level = Some(log_level);
        self
    }

    pub fn with_emf_uri(mut self, emf_uri: impl Into<String>) -> Self {
        self.emf_uri = Some(emf_uri.into());
        self
    }
}

/// An event instance. Its payload is outside the engine's concern.
#[derive(Debug, Clone)]
pub struct Event {
    pub class: Rc<EventClass>,
    pub stream: Rc<Stream>,
    pub packet: Option<Rc<Packet>>,
}

impl Event {
    pub fn new(class: Rc<EventClass>, stream: Rc<Stream>) -> Self {
        Self {
            class,
            stream,
            packet: None,
        }
    }

    /// An event within `packet`; its stream is the packet's stream.
    pub fn in_packet(class: Rc<EventClass>, packet: Rc<Packet>) -> Self {
        Self {
            class,
            stream: Rc::clone(&packet.stream),
            packet: Some(packet),
        }
    }
}
