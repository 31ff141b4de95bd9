//! DNS Protocol Implementation
//!
//! # Module Structure
//!
//! * `bits` - sub-byte field extraction for the header flags
//! * `buffer` - Low-level packet buffer operations
//! * `name` - domain names and their label encoding
//! * `query_type` - record type and class codes
//! * `protocol` - DNS message definitions and serialization
//! * `authority` - the local record store and its lookup
//! * `zone_parser` - loading zone files into the store
//! * `context` - Server configuration and shared state
//! * `server` - reply assembly and the UDP server

/// Authoritative record store and lookup
pub mod authority;

/// Bit field helpers for packed header bytes
pub mod bits;

/// Low-level buffer operations for DNS packet handling
pub mod buffer;

/// Server configuration and context management
pub mod context;

/// Domain names
pub mod name;

/// DNS protocol structures and serialization
pub mod protocol;

/// Record type and class codes
pub mod query_type;

/// Reply assembly and UDP server
pub mod server;

/// Zone file parser
pub mod zone_parser;

#[cfg(test)]
mod authority_test;
