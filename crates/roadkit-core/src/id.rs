//! Stable identifiers for anchor points and road objects

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter shared by every id kind so ids never collide across kinds
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_raw() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Set the counter to at least the given value (for loading projects)
fn ensure_counter_above(value: u64) {
    let mut current = NEXT_ID.load(Ordering::Relaxed);
    while current <= value {
        match NEXT_ID.compare_exchange_weak(current, value + 1, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => break,
            Err(c) => current = c,
        }
    }
}

macro_rules! stable_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Create a new unique id
            pub fn new() -> Self {
                Self(next_raw())
            }

            /// Create an id from a raw value (for deserialization/testing)
            pub fn from_raw(id: u64) -> Self {
                ensure_counter_above(id);
                Self(id)
            }

            pub fn raw(&self) -> u64 {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

stable_id!(
    /// A stable anchor point handle.
    ///
    /// Survives insert/remove/split of neighbouring points, so intersection
    /// connections and edit selections can refer to a point without caring
    /// about its current position in the curve.
    PointId
);

stable_id!(
    /// A stable handle for a road object or intersection in a network
    ObjectId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_generation() {
        let id1 = PointId::new();
        let id2 = PointId::new();
        assert_ne!(id1, id2);
        assert!(id2.0 > id1.0);
    }

    #[test]
    fn test_from_raw_bumps_counter() {
        let id = ObjectId::from_raw(5_000);
        assert_eq!(id.raw(), 5_000);
        assert!(PointId::new().raw() > 5_000);
    }

    #[test]
    fn test_kinds_never_share_values() {
        let p = PointId::new();
        let o = ObjectId::new();
        assert_ne!(p.raw(), o.raw());
    }
}
