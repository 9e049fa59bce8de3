//! Integration tests for the framewire frame runtime

mod config_integration;
mod coordinator_ordering;
mod reconcile_behavior;
mod runtime_delegation;
mod test_utils;
