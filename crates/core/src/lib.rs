//! Routing decision engine for a mobile audio signal path
//!
//! Given the set of open playback/capture streams and the platform state
//! mirrored through criteria, this crate decides which hardware routes must
//! be enabled, which must be muted, and in what order. It owns the graph
//! model (ports, mutual-exclusion groups, backend and stream routes), the
//! applicability matching that assigns streams to routes, and the mask
//! algebra behind the five-stage commit protocol. The runtime that drives
//! it (worker thread, locking, device backends, configuration engine) lives
//! in `signalpath-infra`.

pub mod domain;
