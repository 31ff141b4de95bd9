//! Domain names in wire and dotted form
//!
//! On the wire a name is a run of length-prefixed labels closed by a zero
//! length octet. Compression pointers are neither produced nor accepted: their
//! length octet has the two top bits set, which reads as a label longer than
//! 63 and is rejected like one.
//!
//! Labels are arbitrary bytes. The dotted form maps every byte to the char
//! with the same code point, so converting wire to dotted and back is lossless
//! as long as no label contains a `.` byte.

use std::fmt;
use std::str::FromStr;

use derive_more::{Display, Error};

use crate::dns::buffer::PacketBuffer;

pub const MAX_LABEL_LEN: usize = 63;

/// Longest encoded name, terminator included (RFC 1035 2.3.4)
pub const MAX_NAME_LEN: usize = 255;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum NameError {
    #[display(fmt = "label of {} bytes exceeds {}", len, MAX_LABEL_LEN)]
    LabelTooLong { len: usize },
    #[display(fmt = "name of {} bytes exceeds {}", len, MAX_NAME_LEN)]
    NameTooLong { len: usize },
    #[display(fmt = "name runs past the end of the message at {}", position)]
    Overrun { position: usize },
    #[display(fmt = "empty label in {:?}", name)]
    EmptyLabel { name: String },
    #[display(fmt = "{:?} is not a single octet", ch)]
    InvalidCharacter { ch: char },
}

type Result<T> = std::result::Result<T, NameError>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DomainName {
    labels: Vec<Vec<u8>>,
}

impl DomainName {
    /// The root name, encoded as a single zero octet
    pub fn root() -> DomainName {
        DomainName { labels: Vec::new() }
    }

    pub fn from_labels(labels: Vec<Vec<u8>>) -> Result<DomainName> {
        let name = DomainName { labels };

        for label in &name.labels {
            if label.is_empty() {
                return Err(NameError::EmptyLabel {
                    name: name.to_dotted(),
                });
            }
            if label.len() > MAX_LABEL_LEN {
                return Err(NameError::LabelTooLong { len: label.len() });
            }
        }
        if name.binary_len() > MAX_NAME_LEN {
            return Err(NameError::NameTooLong {
                len: name.binary_len(),
            });
        }

        Ok(name)
    }

    /// Parses `example.com` style names; a single trailing dot is accepted
    pub fn from_dotted(domain: &str) -> Result<DomainName> {
        let trimmed = domain.strip_suffix('.').unwrap_or(domain);
        if trimmed.is_empty() {
            return Ok(DomainName::root());
        }

        let mut labels = Vec::new();
        for part in trimmed.split('.') {
            let mut label = Vec::with_capacity(part.len());
            for ch in part.chars() {
                if (ch as u32) > 0xFF {
                    return Err(NameError::InvalidCharacter { ch });
                }
                label.push(ch as u8);
            }
            if label.is_empty() {
                return Err(NameError::EmptyLabel {
                    name: domain.to_string(),
                });
            }
            labels.push(label);
        }

        DomainName::from_labels(labels)
    }

    pub fn labels(&self) -> &[Vec<u8>] {
        &self.labels
    }

    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    /// Size of the encoded name, terminator included
    pub fn binary_len(&self) -> usize {
        self.labels.iter().map(|l| l.len() + 1).sum::<usize>() + 1
    }

    pub fn to_dotted(&self) -> String {
        let mut domain = String::with_capacity(self.binary_len());
        for (i, label) in self.labels.iter().enumerate() {
            if i > 0 {
                domain.push('.');
            }
            domain.extend(label.iter().map(|&b| b as char));
        }

        domain
    }

    /// Reads a name starting at the cursor and leaves the cursor after the
    /// terminating zero octet
    pub fn read<T: PacketBuffer>(buffer: &mut T) -> Result<DomainName> {
        let mut labels = Vec::new();
        let mut wire_len = 1;

        loop {
            let position = buffer.pos();
            let len = buffer
                .read()
                .map_err(|_| NameError::Overrun { position })? as usize;

            if len == 0 {
                break;
            }
            if len > MAX_LABEL_LEN {
                return Err(NameError::LabelTooLong { len });
            }

            wire_len += len + 1;
            if wire_len > MAX_NAME_LEN {
                return Err(NameError::NameTooLong { len: wire_len });
            }

            let label = buffer
                .read_bytes(len)
                .map_err(|_| NameError::Overrun { position })?;
            labels.push(label);
        }

        Ok(DomainName { labels })
    }

    pub fn write<T: PacketBuffer>(
        &self,
        buffer: &mut T,
    ) -> std::result::Result<(), crate::dns::buffer::BufferError> {
        for label in &self.labels {
            buffer.write_u8(label.len() as u8)?;
            buffer.write_bytes(label)?;
        }
        buffer.write_u8(0)
    }

    pub fn to_wire(&self) -> Vec<u8> {
        let mut wire = Vec::with_capacity(self.binary_len());
        for label in &self.labels {
            wire.push(label.len() as u8);
            wire.extend_from_slice(label);
        }
        wire.push(0);

        wire
    }
}

impl FromStr for DomainName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self> {
        DomainName::from_dotted(s)
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_dotted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::buffer::{SlicePacketBuffer, VectorPacketBuffer};

    const EXAMPLE_COM: &[u8] = b"\x07example\x03com\x00";

    #[test]
    fn test_read_name() {
        let mut data = EXAMPLE_COM.to_vec();
        data.extend_from_slice(&[0x00, 0x01]);
        let mut buffer = SlicePacketBuffer::new(&data);

        let name = DomainName::read(&mut buffer).unwrap();
        assert_eq!(name.to_dotted(), "example.com");
        assert_eq!(buffer.pos(), EXAMPLE_COM.len());
        assert_eq!(name.binary_len(), EXAMPLE_COM.len());
    }

    #[test]
    fn test_read_root() {
        let data = [0u8];
        let mut buffer = SlicePacketBuffer::new(&data);

        let name = DomainName::read(&mut buffer).unwrap();
        assert!(name.is_root());
        assert_eq!(name.to_dotted(), "");
        assert_eq!(name.to_wire(), vec![0]);
    }

    #[test]
    fn test_write_name() {
        let name = DomainName::from_dotted("example.com").unwrap();
        let mut buffer = VectorPacketBuffer::new();
        name.write(&mut buffer).unwrap();

        assert_eq!(buffer.buffer, EXAMPLE_COM);
        assert_eq!(name.to_wire(), EXAMPLE_COM);
    }

    #[test]
    fn test_label_too_long() {
        let mut data = vec![64u8];
        data.extend_from_slice(&[b'a'; 64]);
        data.push(0);
        let mut buffer = SlicePacketBuffer::new(&data);

        assert_eq!(
            DomainName::read(&mut buffer),
            Err(NameError::LabelTooLong { len: 64 })
        );
    }

    #[test]
    fn test_compression_pointer_rejected() {
        let data = [0xC0, 0x0C];
        let mut buffer = SlicePacketBuffer::new(&data);

        assert_eq!(
            DomainName::read(&mut buffer),
            Err(NameError::LabelTooLong { len: 0xC0 })
        );
    }

    #[test]
    fn test_label_past_end() {
        let data = b"\x07exam";
        let mut buffer = SlicePacketBuffer::new(data);

        assert_eq!(
            DomainName::read(&mut buffer),
            Err(NameError::Overrun { position: 0 })
        );
    }

    #[test]
    fn test_missing_terminator() {
        let data = b"\x07example\x03com";
        let mut buffer = SlicePacketBuffer::new(data);

        assert_eq!(
            DomainName::read(&mut buffer),
            Err(NameError::Overrun { position: 12 })
        );
    }

    #[test]
    fn test_name_too_long() {
        let mut data = Vec::new();
        for _ in 0..5 {
            data.push(60u8);
            data.extend_from_slice(&[b'x'; 60]);
        }
        data.push(0);
        let mut buffer = SlicePacketBuffer::new(&data);

        assert!(matches!(
            DomainName::read(&mut buffer),
            Err(NameError::NameTooLong { .. })
        ));
    }

    #[test]
    fn test_binary_labels_round_trip() {
        let data = b"\x03\xff\x00\x80\x02ab\x00";
        let mut buffer = SlicePacketBuffer::new(data);

        let name = DomainName::read(&mut buffer).unwrap();
        let dotted = name.to_dotted();
        let again = DomainName::from_dotted(&dotted).unwrap();

        assert_eq!(again, name);
        assert_eq!(again.to_wire(), data.to_vec());
    }

    #[test]
    fn test_from_dotted() {
        assert_eq!(
            DomainName::from_dotted("example.com.").unwrap(),
            DomainName::from_dotted("example.com").unwrap()
        );
        assert!(DomainName::from_dotted(".").unwrap().is_root());
        assert_eq!(
            DomainName::from_dotted("a..b"),
            Err(NameError::EmptyLabel {
                name: "a..b".to_string()
            })
        );
        assert_eq!(
            DomainName::from_dotted("caf\u{0101}.com"),
            Err(NameError::InvalidCharacter { ch: '\u{0101}' })
        );
        assert!(matches!(
            "x".repeat(64).parse::<DomainName>(),
            Err(NameError::LabelTooLong { len: 64 })
        ));
    }
}
