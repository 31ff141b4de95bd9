//! implements the DNS protocol in a transport agnostic fashion
//!
//! Only the subset an authoritative responder needs is covered: the header,
//! a single question, and answer records on the way out. Incoming answer,
//! authority and additional sections are never parsed.

use std::convert::TryFrom;
use std::fmt;
use std::net::Ipv4Addr;

use derive_more::{Display, Error};

use crate::dns::bits::{extract_bits, pack_bits};
use crate::dns::buffer::{BufferError, PacketBuffer, VectorPacketBuffer};
use crate::dns::name::{DomainName, NameError};
use crate::dns::query_type::{QueryType, RecordClass};

/// Size of the fixed message header
pub const HEADER_LEN: usize = 12;

/// Bytes of an answer record besides its name and rdata
const RECORD_FIXED_LEN: usize = 10;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[display(
        fmt = "message truncated: {} bytes needed at offset {}, {} available",
        needed,
        offset,
        available
    )]
    TruncatedMessage {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[display(fmt = "malformed name at offset {}: {}", offset, reason)]
    MalformedName { offset: usize, reason: NameError },
    #[display(fmt = "rdata of {} bytes does not fit a 16 bit length", len)]
    RecordTooLong { len: usize },
    #[display(fmt = "{} answer records do not fit a 16 bit count", count)]
    TooManyRecords { count: usize },
    Buffer(BufferError),
}

impl From<BufferError> for ProtocolError {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::EndOfBuffer {
                position,
                needed,
                len,
            } => ProtocolError::TruncatedMessage {
                offset: position,
                needed,
                available: len.saturating_sub(position),
            },
            other => ProtocolError::Buffer(other),
        }
    }
}

type Result<T> = std::result::Result<T, ProtocolError>;

/// The result code for a DNS query, as described in RFC 1035 4.1.1
///
/// Codes past REFUSED are carried in `Other` so that a header survives a
/// read and write unchanged.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ResultCode {
    #[default]
    NOERROR,
    FORMERR,
    SERVFAIL,
    NXDOMAIN,
    NOTIMP,
    REFUSED,
    Other(u8),
}

impl ResultCode {
    pub fn from_num(num: u8) -> ResultCode {
        match num {
            0 => ResultCode::NOERROR,
            1 => ResultCode::FORMERR,
            2 => ResultCode::SERVFAIL,
            3 => ResultCode::NXDOMAIN,
            4 => ResultCode::NOTIMP,
            5 => ResultCode::REFUSED,
            x => ResultCode::Other(x),
        }
    }

    pub fn to_num(&self) -> u8 {
        match *self {
            ResultCode::NOERROR => 0,
            ResultCode::FORMERR => 1,
            ResultCode::SERVFAIL => 2,
            ResultCode::NXDOMAIN => 3,
            ResultCode::NOTIMP => 4,
            ResultCode::REFUSED => 5,
            ResultCode::Other(x) => x,
        }
    }
}

/// Representation of a DNS header
///
/// Sub-byte fields must fit their width; writing a header with, say, an
/// opcode above 15 panics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DnsHeader {
    pub id: u16, // 16 bits

    pub response: bool,             // 1 bit
    pub opcode: u8,                 // 4 bits
    pub authoritative_answer: bool, // 1 bit
    pub truncated_message: bool,    // 1 bit
    pub recursion_desired: bool,    // 1 bit

    pub recursion_available: bool, // 1 bit
    pub z: u8,                     // 3 bits
    pub rescode: ResultCode,       // 4 bits

    pub questions: u16,             // 16 bits
    pub answers: u16,               // 16 bits
    pub authoritative_entries: u16, // 16 bits
    pub resource_entries: u16,      // 16 bits
}

impl DnsHeader {
    pub fn new() -> DnsHeader {
        DnsHeader::default()
    }

    pub fn binary_len(&self) -> usize {
        HEADER_LEN
    }

    pub fn read<T: PacketBuffer>(buffer: &mut T) -> Result<DnsHeader> {
        buffer.require(HEADER_LEN)?;

        let id = buffer.read_u16()?;
        let a = buffer.read()?;
        let b = buffer.read()?;

        Ok(DnsHeader {
            id,

            response: extract_bits(a, 0, 1) == 1,
            opcode: extract_bits(a, 1, 4),
            authoritative_answer: extract_bits(a, 5, 1) == 1,
            truncated_message: extract_bits(a, 6, 1) == 1,
            recursion_desired: extract_bits(a, 7, 1) == 1,

            recursion_available: extract_bits(b, 0, 1) == 1,
            z: extract_bits(b, 1, 3),
            rescode: ResultCode::from_num(extract_bits(b, 4, 4)),

            questions: buffer.read_u16()?,
            answers: buffer.read_u16()?,
            authoritative_entries: buffer.read_u16()?,
            resource_entries: buffer.read_u16()?,
        })
    }

    pub fn write<T: PacketBuffer>(&self, buffer: &mut T) -> Result<()> {
        buffer.write_u16(self.id)?;

        buffer.write_u8(
            pack_bits(self.response as u8, 0, 1)
                | pack_bits(self.opcode, 1, 4)
                | pack_bits(self.authoritative_answer as u8, 5, 1)
                | pack_bits(self.truncated_message as u8, 6, 1)
                | pack_bits(self.recursion_desired as u8, 7, 1),
        )?;

        buffer.write_u8(
            pack_bits(self.recursion_available as u8, 0, 1)
                | pack_bits(self.z, 1, 3)
                | pack_bits(self.rescode.to_num(), 4, 4),
        )?;

        buffer.write_u16(self.questions)?;
        buffer.write_u16(self.answers)?;
        buffer.write_u16(self.authoritative_entries)?;
        buffer.write_u16(self.resource_entries)?;

        Ok(())
    }
}

impl fmt::Display for DnsHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id={} qr={} opcode={} aa={} tc={} rd={} ra={} rcode={:?} qd={} an={} ns={} ar={}",
            self.id,
            self.response as u8,
            self.opcode,
            self.authoritative_answer as u8,
            self.truncated_message as u8,
            self.recursion_desired as u8,
            self.recursion_available as u8,
            self.rescode,
            self.questions,
            self.answers,
            self.authoritative_entries,
            self.resource_entries
        )
    }
}

/// Representation of a DNS question
///
/// Type and class keep their wire codes, so a question with an unknown type
/// is echoed back exactly as it arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuestion {
    pub name: DomainName,
    pub qtype: QueryType,
    pub qclass: RecordClass,
}

impl DnsQuestion {
    pub fn new(name: DomainName, qtype: QueryType) -> DnsQuestion {
        DnsQuestion {
            name,
            qtype,
            qclass: RecordClass::In,
        }
    }

    pub fn binary_len(&self) -> usize {
        self.name.binary_len() + 4
    }

    pub fn read<T: PacketBuffer>(buffer: &mut T) -> Result<DnsQuestion> {
        let offset = buffer.pos();
        let name = DomainName::read(buffer)
            .map_err(|reason| ProtocolError::MalformedName { offset, reason })?;

        buffer.require(4)?;
        let qtype = QueryType::from_num(buffer.read_u16()?);
        let qclass = RecordClass::from_num(buffer.read_u16()?);

        Ok(DnsQuestion {
            name,
            qtype,
            qclass,
        })
    }

    pub fn write<T: PacketBuffer>(&self, buffer: &mut T) -> Result<()> {
        self.name.write(buffer)?;
        buffer.write_u16(self.qtype.to_num())?;
        buffer.write_u16(self.qclass.to_num())?;

        Ok(())
    }
}

impl fmt::Display for DnsQuestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.qclass, self.qtype)
    }
}

/// An answer record, held in its encoded form
///
/// The owner name, type and class are stored as wire bytes and copied into
/// replies without being decoded again. `rdlength` always equals the rdata
/// length; construction rejects rdata that cannot be described by it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    name: Vec<u8>,
    rtype: [u8; 2],
    rclass: [u8; 2],
    ttl: u32,
    rdlength: u16,
    rdata: Vec<u8>,
}

impl ResourceRecord {
    pub fn new(
        name: &DomainName,
        rtype: QueryType,
        rclass: RecordClass,
        ttl: u32,
        rdata: Vec<u8>,
    ) -> Result<ResourceRecord> {
        let rdlength =
            u16::try_from(rdata.len()).map_err(|_| ProtocolError::RecordTooLong { len: rdata.len() })?;

        Ok(ResourceRecord {
            name: name.to_wire(),
            rtype: rtype.to_num().to_be_bytes(),
            rclass: rclass.to_num().to_be_bytes(),
            ttl,
            rdlength,
            rdata,
        })
    }

    /// Internet address record
    pub fn a(name: &DomainName, addr: Ipv4Addr, ttl: u32) -> ResourceRecord {
        ResourceRecord {
            name: name.to_wire(),
            rtype: QueryType::A.to_num().to_be_bytes(),
            rclass: RecordClass::In.to_num().to_be_bytes(),
            ttl,
            rdlength: 4,
            rdata: addr.octets().to_vec(),
        }
    }

    /// Owner name in wire form
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn rtype(&self) -> QueryType {
        QueryType::from_num(u16::from_be_bytes(self.rtype))
    }

    pub fn rclass(&self) -> RecordClass {
        RecordClass::from_num(u16::from_be_bytes(self.rclass))
    }

    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    pub fn rdlength(&self) -> u16 {
        self.rdlength
    }

    pub fn rdata(&self) -> &[u8] {
        &self.rdata
    }

    pub fn binary_len(&self) -> usize {
        self.name.len() + RECORD_FIXED_LEN + self.rdata.len()
    }

    pub fn write<T: PacketBuffer>(&self, buffer: &mut T) -> Result<usize> {
        let start_pos = buffer.pos();

        buffer.write_bytes(&self.name)?;
        buffer.write_bytes(&self.rtype)?;
        buffer.write_bytes(&self.rclass)?;
        buffer.write_u32(self.ttl)?;
        // always the actual rdata length
        buffer.write_u16(self.rdata.len() as u16)?;
        buffer.write_bytes(&self.rdata)?;

        Ok(buffer.pos() - start_pos)
    }
}

/// A decoded incoming query
///
/// `question` is `None` only when the header announces no question at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DnsQuery {
    pub header: DnsHeader,
    pub question: Option<DnsQuestion>,
}

impl DnsQuery {
    pub fn new(id: u16, question: DnsQuestion) -> DnsQuery {
        let mut header = DnsHeader::new();
        header.id = id;
        header.questions = 1;

        DnsQuery {
            header,
            question: Some(question),
        }
    }

    /// Decodes the header and the first question
    ///
    /// Further questions and any other section are left unread.
    pub fn from_buffer<T: PacketBuffer>(buffer: &mut T) -> Result<DnsQuery> {
        let header = DnsHeader::read(buffer)?;

        let question = if header.questions == 0 {
            None
        } else {
            Some(DnsQuestion::read(buffer)?)
        };

        Ok(DnsQuery { header, question })
    }

    pub fn binary_len(&self) -> usize {
        HEADER_LEN + self.question.as_ref().map_or(0, DnsQuestion::binary_len)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = VectorPacketBuffer::with_capacity(self.binary_len());

        let mut header = self.header.clone();
        header.questions = self.question.is_some() as u16;
        header.write(&mut buffer)?;

        if let Some(ref question) = self.question {
            question.write(&mut buffer)?;
        }

        Ok(buffer.into_inner())
    }
}

/// An outgoing reply borrowing its question and answers
///
/// Section counts in the header are taken from the actual contents when the
/// reply is written, so they can never disagree with the encoded sections.
#[derive(Clone, Debug)]
pub struct DnsResponse<'a> {
    pub header: DnsHeader,
    pub question: Option<&'a DnsQuestion>,
    pub answers: &'a [ResourceRecord],
}

impl<'a> DnsResponse<'a> {
    pub fn binary_len(&self) -> usize {
        HEADER_LEN
            + self.question.map_or(0, DnsQuestion::binary_len)
            + self
                .answers
                .iter()
                .map(ResourceRecord::binary_len)
                .sum::<usize>()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let len = self.binary_len();
        let mut buffer = VectorPacketBuffer::with_capacity(len);

        let mut header = self.header.clone();
        header.questions = self.question.is_some() as u16;
        header.answers = u16::try_from(self.answers.len()).map_err(|_| {
            ProtocolError::TooManyRecords {
                count: self.answers.len(),
            }
        })?;
        header.authoritative_entries = 0;
        header.resource_entries = 0;
        header.write(&mut buffer)?;

        if let Some(question) = self.question {
            question.write(&mut buffer)?;
        }

        for rec in self.answers {
            rec.write(&mut buffer)?;
        }

        debug_assert_eq!(buffer.len(), len);

        Ok(buffer.into_inner())
    }
}
