//! Synchronization primitives shared across kernel singletons.

pub mod spinlock;
