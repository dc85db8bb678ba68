//! Integration tests for Waiter
//!
//! These tests exercise the media viewer client over real HTTP against a local
//! stub service, covering the wire format of token lookups, tracking reports
//! and viewed marking, and retry behaviour through the token resolver.

#[path = "integration/remote_client.rs"]
mod remote_client;
