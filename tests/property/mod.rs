//! Property-based tests for reconciliation guarantees

mod reconcile;
