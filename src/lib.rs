//! minidns
//!
//! A minimal authoritative DNS responder. Queries for names held in a local,
//! immutable record store are answered over UDP; nothing is ever resolved
//! recursively, cached or forwarded.
//!
//! # Features
//!
//! * Hand-written wire codec for the header, one question and answer records
//! * Exact-match lookup over the sixteen record types of RFC 1035
//! * Lookup failures reported through the response code instead of dropped
//! * Zone files in a subset of the RFC 1035 master file format
//! * TOML configuration with command-line overrides
//!
//! # Architecture
//!
//! Everything lives in the `dns` module. `dns::server::handle_datagram` is the
//! transport independent entry point turning query bytes into reply bytes.

/// DNS server implementation and protocol handling
pub mod dns;
