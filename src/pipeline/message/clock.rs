//! Clock classes, clock snapshots and clock-class lineage tracking.
//!
//! A clock snapshot is a raw cycle count on a clock class. The class knows
//! how to turn cycles into nanoseconds from its origin, which is either the
//! Unix epoch ("absolute") or some unknown, clock-specific instant.

use crate::pipeline::error::{GraphError, GraphResult};
use std::fmt;
use std::rc::Rc;
use uuid::Uuid;

const NS_PER_SECOND: i128 = 1_000_000_000;

/// Description of a clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockClass {
    name: Option<String>,
    description: Option<String>,
    uuid: Option<Uuid>,
    frequency: u64,
    precision: u64,
    offset_seconds: i64,
    offset_cycles: u64,
    origin_is_unix_epoch: bool,
}

impl ClockClass {
    /// A 1 GHz clock whose origin is the Unix epoch.
    pub fn new() -> Self {
        Self {
            name: None,
            description: None,
            uuid: None,
            frequency: 1_000_000_000,
            precision: 0,
            offset_seconds: 0,
            offset_cycles: 0,
            origin_is_unix_epoch: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }

    /// Set the frequency in Hz. Panics on zero.
    pub fn with_frequency(mut self, frequency: u64) -> Self {
        assert!(frequency > 0, "clock class frequency must be greater than zero");
        self.frequency = frequency;
        self
    }

    pub fn with_precision(mut self, precision: u64) -> Self {
        self.precision = precision;
        self
    }

    /// Offset of the clock from its origin. `cycles` must be less than one
    /// second worth of cycles.
    pub fn with_offset(mut self, seconds: i64, cycles: u64) -> Self {
        assert!(
            cycles < self.frequency,
            "clock class offset cycles must be less than the frequency"
        );
        self.offset_seconds = seconds;
        self.offset_cycles = cycles;
        self
    }

    pub fn with_unix_epoch_origin(mut self, is_unix_epoch: bool) -> Self {
        self.origin_is_unix_epoch = is_unix_epoch;
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn uuid(&self) -> Option<Uuid> {
        self.uuid
    }

    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    pub fn precision(&self) -> u64 {
        self.precision
    }

    pub fn offset(&self) -> (i64, u64) {
        (self.offset_seconds, self.offset_cycles)
    }

    pub fn origin_is_unix_epoch(&self) -> bool {
        self.origin_is_unix_epoch
    }

    /// Nanoseconds from origin of a raw cycle value, `None` on overflow.
    pub fn ns_from_origin(&self, value: u64) -> Option<i64> {
        let cycles = self.offset_cycles as i128 + value as i128;
        let ns = self.offset_seconds as i128 * NS_PER_SECOND
            + cycles * NS_PER_SECOND / self.frequency as i128;
        i64::try_from(ns).ok()
    }

    /// Largest raw cycle value whose time is not after `ns_from_origin`.
    ///
    /// Returns `None` when the instant precedes the clock's offset.
    pub fn cycles_at_ns_from_origin(&self, ns_from_origin: i64) -> Option<u64> {
        let since_offset = ns_from_origin as i128 - self.offset_seconds as i128 * NS_PER_SECOND;
        let total_cycles = (since_offset * self.frequency as i128).div_euclid(NS_PER_SECOND);
        let value = total_cycles - self.offset_cycles as i128;
        u64::try_from(value).ok()
    }
}

impl Default for ClockClass {
    fn default() -> Self {
        Self::new()
    }
}

/// A point in time on a specific clock.
#[derive(Debug, Clone)]
pub struct ClockSnapshot {
    class: Rc<ClockClass>,
    value: u64,
}

impl ClockSnapshot {
    pub fn new(class: Rc<ClockClass>, value: u64) -> Self {
        Self { class, value }
    }

    /// Snapshot of `class` at (or just before) `ns_from_origin`.
    pub fn at_ns_from_origin(class: &Rc<ClockClass>, ns_from_origin: i64) -> Option<Self> {
        class
            .cycles_at_ns_from_origin(ns_from_origin)
            .map(|value| Self::new(Rc::clone(class), value))
    }

    pub fn class(&self) -> &Rc<ClockClass> {
        &self.class
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn ns_from_origin(&self) -> Option<i64> {
        self.class.ns_from_origin(self.value)
    }

    /// Like [`ns_from_origin`](Self::ns_from_origin) but as a graph error.
    pub fn try_ns_from_origin(&self) -> GraphResult<i64> {
        self.ns_from_origin()
            .ok_or(GraphError::ClockOverflow { value: self.value })
    }
}

/// Clock-class lineage that every message of one sequence must share.
///
/// Locked in by the first message seen. Later messages must either have no
/// clock class (when none was seen first), an absolute one, a non-absolute
/// one with the same UUID, or the very same UUID-less clock class.
#[derive(Debug, Clone, Default)]
pub enum ClockExpectation {
    #[default]
    Any,
    None,
    Absolute,
    NonAbsoluteWithUuid(Uuid),
    NonAbsoluteNoUuid(Rc<ClockClass>),
}

impl ClockExpectation {
    pub fn reset(&mut self) {
        *self = ClockExpectation::Any;
    }

    /// Check `class` against the expectation, locking it in on first use.
    pub fn validate(&mut self, class: Option<&Rc<ClockClass>>) -> GraphResult<()> {
        match (&*self, class) {
            (ClockExpectation::Any, None) => {
                *self = ClockExpectation::None;
                Ok(())
            }
            (ClockExpectation::Any, Some(cc)) => {
                *self = if cc.origin_is_unix_epoch() {
                    ClockExpectation::Absolute
                } else if let Some(uuid) = cc.uuid() {
                    ClockExpectation::NonAbsoluteWithUuid(uuid)
                } else {
                    ClockExpectation::NonAbsoluteNoUuid(Rc::clone(cc))
                };
                Ok(())
            }
            (ClockExpectation::None, None) => Ok(()),
            (ClockExpectation::None, Some(cc)) => Err(mismatch(format!(
                "expecting no clock class, but got one ({})",
                describe(cc)
            ))),
            (_, None) => Err(mismatch(format!(
                "expecting a clock class ({}), but got none",
                self
            ))),
            (ClockExpectation::Absolute, Some(cc)) => {
                if cc.origin_is_unix_epoch() {
                    Ok(())
                } else {
                    Err(mismatch(format!(
                        "expecting an absolute clock class, but got a non-absolute one ({})",
                        describe(cc)
                    )))
                }
            }
            (ClockExpectation::NonAbsoluteWithUuid(expected), Some(cc)) => {
                if cc.origin_is_unix_epoch() {
                    return Err(mismatch(format!(
                        "expecting a non-absolute clock class with UUID {}, but got an absolute one ({})",
                        expected,
                        describe(cc)
                    )));
                }
                match cc.uuid() {
                    Some(uuid) if uuid == *expected => Ok(()),
                    Some(uuid) => Err(mismatch(format!(
                        "expecting a non-absolute clock class with UUID {}, but got one with UUID {}",
                        expected, uuid
                    ))),
                    None => Err(mismatch(format!(
                        "expecting a non-absolute clock class with UUID {}, but got one without a UUID ({})",
                        expected,
                        describe(cc)
                    ))),
                }
            }
            (ClockExpectation::NonAbsoluteNoUuid(expected), Some(cc)) => {
                if Rc::ptr_eq(expected, cc) {
                    Ok(())
                } else {
                    Err(mismatch(format!(
                        "unexpected clock class: expecting {}, but got {}",
                        describe(expected),
                        describe(cc)
                    )))
                }
            }
        }
    }
}

impl fmt::Display for ClockExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockExpectation::Any => write!(f, "any"),
            ClockExpectation::None => write!(f, "no clock class"),
            ClockExpectation::Absolute => write!(f, "absolute"),
            ClockExpectation::NonAbsoluteWithUuid(uuid) => {
                write!(f, "non-absolute with UUID {}", uuid)
            }
            ClockExpectation::NonAbsoluteNoUuid(cc) => {
                write!(f, "non-absolute without UUID: {}", describe(cc))
            }
        }
    }
}

fn mismatch(message: String) -> GraphError {
    GraphError::ClockClass(message)
}

fn describe(cc: &ClockClass) -> String {
    format!(
        "name={:?}, uuid={:?}, absolute={}",
        cc.name(),
        cc.uuid(),
        cc.origin_is_unix_epoch()
    )
}
