//! End-to-end tests for Waiter
//!
//! These tests drive the complete gateway router: token resolution against a
//! scripted media viewer, entry listing over real temporary media trees, path
//! authorization and byte delivery in both delivery modes.

mod gateway_workflow;
mod support;
