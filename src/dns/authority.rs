//! Contains the data store for local records
//!
//! Records are grouped by owner name, then class, then type. Each bucket keeps
//! records in insertion order, which is also the order they are answered in.
//!
//! A store is assembled with `RecordStoreBuilder` at startup and frozen by
//! `build`. The frozen `RecordStore` has no mutating methods, so it can be
//! shared between request handlers behind an `Arc` without any locking.
//!
//! ## Query Resolution
//!
//! Matching is exact: the dotted query name must equal the owner name byte
//! for byte. There is no wildcard expansion, no suffix matching and no case
//! folding. A miss at any level is an empty answer, not an error.

use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;

use derive_more::{Display, Error};

use crate::dns::name::DomainName;
use crate::dns::protocol::{DnsQuestion, ProtocolError, ResourceRecord, ResultCode};
use crate::dns::query_type::{QueryType, RecordClass};

#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum LookupError {
    #[display(fmt = "class {} is not supported", class)]
    UnsupportedClass { class: u16 },
    #[display(fmt = "record type {} is not known", code)]
    UnknownType { code: u16 },
    #[display(fmt = "wildcard queries are not supported")]
    WildcardUnsupported,
}

impl LookupError {
    /// Response code reported to the client for this failure
    pub fn result_code(&self) -> ResultCode {
        match *self {
            LookupError::UnsupportedClass { .. } => ResultCode::REFUSED,
            LookupError::UnknownType { .. } => ResultCode::NOTIMP,
            LookupError::WildcardUnsupported => ResultCode::NOTIMP,
        }
    }
}

type Result<T> = std::result::Result<T, LookupError>;

type TypeMap = BTreeMap<QueryType, Vec<ResourceRecord>>;
type ClassMap = BTreeMap<RecordClass, TypeMap>;

/// Immutable authoritative record data
#[derive(Debug, Default)]
pub struct RecordStore {
    domains: HashMap<String, ClassMap>,
    record_count: usize,
}

impl RecordStore {
    pub fn builder() -> RecordStoreBuilder {
        RecordStoreBuilder::new()
    }

    /// Finds the records answering a question
    ///
    /// Class and type are validated before the store is consulted. An empty
    /// slice means the name, class or type is simply not present.
    pub fn lookup(
        &self,
        qname: &DomainName,
        qtype: QueryType,
        qclass: RecordClass,
    ) -> Result<&[ResourceRecord]> {
        if qclass != RecordClass::In {
            return Err(LookupError::UnsupportedClass {
                class: qclass.to_num(),
            });
        }

        match qtype {
            QueryType::Unknown(code) => return Err(LookupError::UnknownType { code }),
            QueryType::All => return Err(LookupError::WildcardUnsupported),
            QueryType::A
            | QueryType::Ns
            | QueryType::Md
            | QueryType::Mf
            | QueryType::Cname
            | QueryType::Soa
            | QueryType::Mb
            | QueryType::Mg
            | QueryType::Mr
            | QueryType::Null
            | QueryType::Wks
            | QueryType::Ptr
            | QueryType::Hinfo
            | QueryType::Minfo
            | QueryType::Mx
            | QueryType::Txt => {}
        }

        let domain = qname.to_dotted();
        let records = self
            .domains
            .get(&domain)
            .and_then(|classes| classes.get(&qclass))
            .and_then(|types| types.get(&qtype))
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        log::debug!(
            "lookup {} {} {}: {} records",
            domain,
            qclass,
            qtype,
            records.len()
        );

        Ok(records)
    }

    pub fn lookup_question(&self, question: &DnsQuestion) -> Result<&[ResourceRecord]> {
        self.lookup(&question.name, question.qtype, question.qclass)
    }

    /// Total number of records held
    pub fn len(&self) -> usize {
        self.record_count
    }

    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    /// Owner names present in the store, in no particular order
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.domains.keys().map(String::as_str)
    }
}

/// Load-time assembly of a `RecordStore`
#[derive(Debug, Default)]
pub struct RecordStoreBuilder {
    store: RecordStore,
}

impl RecordStoreBuilder {
    pub fn new() -> RecordStoreBuilder {
        RecordStoreBuilder::default()
    }

    /// Appends an Internet class record to the bucket of `owner` and `rtype`
    pub fn add(
        &mut self,
        owner: &DomainName,
        rtype: QueryType,
        ttl: u32,
        rdata: Vec<u8>,
    ) -> std::result::Result<&mut Self, ProtocolError> {
        let record = ResourceRecord::new(owner, rtype, RecordClass::In, ttl, rdata)?;
        self.push(owner, record);

        Ok(self)
    }

    pub fn add_a(&mut self, owner: &DomainName, addr: Ipv4Addr, ttl: u32) -> &mut Self {
        let record = ResourceRecord::a(owner, addr, ttl);
        self.push(owner, record);

        self
    }

    fn push(&mut self, owner: &DomainName, record: ResourceRecord) {
        self.store
            .domains
            .entry(owner.to_dotted())
            .or_insert_with(ClassMap::new)
            .entry(record.rclass())
            .or_insert_with(TypeMap::new)
            .entry(record.rtype())
            .or_insert_with(Vec::new)
            .push(record);
        self.store.record_count += 1;
    }

    pub fn len(&self) -> usize {
        self.store.record_count
    }

    pub fn is_empty(&self) -> bool {
        self.store.record_count == 0
    }

    pub fn build(self) -> RecordStore {
        log::info!(
            "Record store ready with {} records for {} names",
            self.store.record_count,
            self.store.domains.len()
        );

        self.store
    }
}
