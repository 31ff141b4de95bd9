//! Buffers for reading and writing DNS messages
//!
//! All multi-byte integers are big endian. Every access is bounds checked
//! against the readable length, so a short or hostile datagram surfaces as a
//! `BufferError` and never as an out of range slice.

use derive_more::{Display, Error};

/// Largest message accepted or produced over plain UDP (RFC 1035 4.2.1)
pub const MAX_UDP_MESSAGE: usize = 512;

#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    #[display(
        fmt = "end of buffer: {} bytes needed at position {}, length is {}",
        needed,
        position,
        len
    )]
    EndOfBuffer {
        position: usize,
        needed: usize,
        len: usize,
    },
    #[display(fmt = "buffer is read only")]
    ReadOnly,
}

type Result<T> = std::result::Result<T, BufferError>;

/// Cursor over a DNS message
///
/// Implementors provide raw positioned access, the integer helpers are shared.
pub trait PacketBuffer {
    /// Current cursor position
    fn pos(&self) -> usize;

    /// Number of readable bytes
    fn len(&self) -> usize;

    fn get(&self, pos: usize) -> Result<u8>;

    fn get_range(&self, start: usize, len: usize) -> Result<&[u8]>;

    /// Writes one byte at the cursor and advances it
    fn write(&mut self, val: u8) -> Result<()>;

    fn seek(&mut self, pos: usize) -> Result<()>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes left between the cursor and the end of the readable data
    fn remaining(&self) -> usize {
        self.len().saturating_sub(self.pos())
    }

    /// Fails unless `needed` bytes can be read at the cursor
    fn require(&self, needed: usize) -> Result<()> {
        if self.remaining() < needed {
            return Err(BufferError::EndOfBuffer {
                position: self.pos(),
                needed,
                len: self.len(),
            });
        }

        Ok(())
    }

    fn step(&mut self, steps: usize) -> Result<()> {
        self.require(steps)?;
        self.seek(self.pos() + steps)
    }

    fn read(&mut self) -> Result<u8> {
        let res = self.get(self.pos())?;
        self.step(1)?;

        Ok(res)
    }

    fn read_u16(&mut self) -> Result<u16> {
        self.require(2)?;
        let res = ((self.read()? as u16) << 8) | (self.read()? as u16);

        Ok(res)
    }

    fn read_u32(&mut self) -> Result<u32> {
        self.require(4)?;
        let res = ((self.read()? as u32) << 24)
            | ((self.read()? as u32) << 16)
            | ((self.read()? as u32) << 8)
            | (self.read()? as u32);

        Ok(res)
    }

    /// Copies `len` bytes starting at the cursor and advances past them
    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let bytes = self.get_range(self.pos(), len)?.to_vec();
        self.step(len)?;

        Ok(bytes)
    }

    fn write_u8(&mut self, val: u8) -> Result<()> {
        self.write(val)
    }

    fn write_u16(&mut self, val: u16) -> Result<()> {
        self.write((val >> 8) as u8)?;
        self.write((val & 0xFF) as u8)?;

        Ok(())
    }

    fn write_u32(&mut self, val: u32) -> Result<()> {
        self.write(((val >> 24) & 0xFF) as u8)?;
        self.write(((val >> 16) & 0xFF) as u8)?;
        self.write(((val >> 8) & 0xFF) as u8)?;
        self.write((val & 0xFF) as u8)?;

        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        for b in bytes {
            self.write(*b)?;
        }

        Ok(())
    }
}

/// Read-only view over a received datagram
pub struct SlicePacketBuffer<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> SlicePacketBuffer<'a> {
    pub fn new(buf: &'a [u8]) -> SlicePacketBuffer<'a> {
        SlicePacketBuffer { buf, pos: 0 }
    }
}

impl<'a> PacketBuffer for SlicePacketBuffer<'a> {
    fn pos(&self) -> usize {
        self.pos
    }

    fn len(&self) -> usize {
        self.buf.len()
    }

    fn get(&self, pos: usize) -> Result<u8> {
        self.buf.get(pos).copied().ok_or(BufferError::EndOfBuffer {
            position: pos,
            needed: 1,
            len: self.buf.len(),
        })
    }

    fn get_range(&self, start: usize, len: usize) -> Result<&[u8]> {
        start
            .checked_add(len)
            .and_then(|end| self.buf.get(start..end))
            .ok_or(BufferError::EndOfBuffer {
                position: start,
                needed: len,
                len: self.buf.len(),
            })
    }

    fn write(&mut self, _: u8) -> Result<()> {
        Err(BufferError::ReadOnly)
    }

    fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.buf.len() {
            return Err(BufferError::EndOfBuffer {
                position: pos,
                needed: 0,
                len: self.buf.len(),
            });
        }
        self.pos = pos;

        Ok(())
    }
}

/// Growable buffer used to assemble outgoing messages
#[derive(Default, Debug, Clone)]
pub struct VectorPacketBuffer {
    pub buffer: Vec<u8>,
    pub pos: usize,
}

impl VectorPacketBuffer {
    pub fn new() -> VectorPacketBuffer {
        VectorPacketBuffer {
            buffer: Vec::new(),
            pos: 0,
        }
    }

    /// Preallocates room for a message whose size is known in advance
    pub fn with_capacity(capacity: usize) -> VectorPacketBuffer {
        VectorPacketBuffer {
            buffer: Vec::with_capacity(capacity),
            pos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

impl PacketBuffer for VectorPacketBuffer {
    fn pos(&self) -> usize {
        self.pos
    }

    fn len(&self) -> usize {
        self.buffer.len()
    }

    fn get(&self, pos: usize) -> Result<u8> {
        self.buffer.get(pos).copied().ok_or(BufferError::EndOfBuffer {
            position: pos,
            needed: 1,
            len: self.buffer.len(),
        })
    }

    fn get_range(&self, start: usize, len: usize) -> Result<&[u8]> {
        start
            .checked_add(len)
            .and_then(|end| self.buffer.get(start..end))
            .ok_or(BufferError::EndOfBuffer {
                position: start,
                needed: len,
                len: self.buffer.len(),
            })
    }

    fn write(&mut self, val: u8) -> Result<()> {
        if self.pos == self.buffer.len() {
            self.buffer.push(val);
        } else {
            self.buffer[self.pos] = val;
        }
        self.pos += 1;

        Ok(())
    }

    fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.buffer.len() {
            return Err(BufferError::EndOfBuffer {
                position: pos,
                needed: 0,
                len: self.buffer.len(),
            });
        }
        self.pos = pos;

        Ok(())
    }
}
