//! Timestamped, type-tagged packets — the unit of data crossing an edge.
//!
//! A packet pairs a shared [`Value`] with a nanosecond timestamp from a
//! monotonic epoch. Timestamp `0` means "unstamped": sources that do not
//! assign one get stamped with [`now_ns`] by the dispatcher, and method
//! results inherit their first input's timestamp.

use crate::error::Result;
use crate::types::{TypeDescriptor, Value};
use std::sync::OnceLock;
use std::time::Instant;

/// A timestamped, type-tagged, shared-ownership value container.
#[derive(Clone, Debug, Default)]
pub struct Packet {
    value: Value,
    timestamp_ns: u64,
}

impl Packet {
    /// The empty packet: no payload, timestamp 0.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wrap a concrete payload with a timestamp.
    pub fn from<T: Send + Sync + 'static>(payload: T, timestamp_ns: u64) -> Self {
        Self {
            value: Value::new(payload),
            timestamp_ns,
        }
    }

    /// Wrap an already-erased value with a timestamp.
    pub fn from_value(value: Value, timestamp_ns: u64) -> Self {
        Self {
            value,
            timestamp_ns,
        }
    }

    /// Whether a payload is present.
    pub fn has_value(&self) -> bool {
        self.value.has_value()
    }

    /// The payload's descriptor (void when empty).
    pub fn descriptor(&self) -> TypeDescriptor {
        self.value.descriptor()
    }

    /// Borrow the erased payload.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Clone the payload out as a concrete type. Exact-type only — the
    /// converter registry path lives in the method invoker, not here.
    pub fn cast<T: Clone + 'static>(&self) -> Result<T> {
        self.value.cast::<T>()
    }

    /// Nanoseconds since the monotonic epoch; `0` means unstamped.
    pub fn timestamp_ns(&self) -> u64 {
        self.timestamp_ns
    }

    pub(crate) fn set_timestamp(&mut self, timestamp_ns: u64) {
        self.timestamp_ns = timestamp_ns;
    }
}

/// A strictly positive monotonic nanosecond reading. The epoch is the
/// first call in the process; `0` stays reserved for unstamped packets.
pub fn now_ns() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = EPOCH.get_or_init(Instant::now);
    (epoch.elapsed().as_nanos() as u64).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_packet() {
        let p = Packet::empty();
        assert!(!p.has_value());
        assert_eq!(p.timestamp_ns(), 0);
        assert!(p.descriptor().is_void());
    }

    #[test]
    fn test_cast_is_exact_type() {
        let p = Packet::from(5i32, 100);
        assert_eq!(p.cast::<i32>().unwrap(), 5);
        // No implicit widening here, even though a converter exists.
        assert!(p.cast::<i64>().is_err());
    }

    #[test]
    fn test_clone_shares_payload() {
        let p = Packet::from("shared".to_string(), 1);
        let q = p.clone();
        let a: *const String = p.value().downcast_ref::<String>().unwrap();
        let b: *const String = q.value().downcast_ref::<String>().unwrap();
        assert_eq!(a, b);
        assert_eq!(q.timestamp_ns(), 1);
    }

    #[test]
    fn test_now_ns_monotonic_and_positive() {
        let a = now_ns();
        let b = now_ns();
        assert!(a >= 1);
        assert!(b >= a);
    }
}
