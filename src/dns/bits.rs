//! Sub-byte field access for the header flag bytes
//!
//! Offsets count from the most significant bit, so bit 0 is `0x80`. This is
//! the way the layout is drawn in RFC 1035 section 4.1.1:
//!
//! ```text
//!   0   1   2   3   4   5   6   7
//! +---+---------------+---+---+---+
//! |QR |    Opcode     |AA |TC |RD |
//! +---+---------------+---+---+---+
//! ```
//!
//! The field layout is fixed, so a bad offset or width is a bug in the caller
//! and panics instead of returning an error.

/// Width of a field plus its offset must stay inside one byte
fn check_field(bit_offset: u8, bit_length: u8) {
    assert!(
        (1..=8).contains(&bit_length),
        "bit field length {} out of range",
        bit_length
    );
    assert!(
        u16::from(bit_offset) + u16::from(bit_length) <= 8,
        "bit field {}+{} does not fit in a byte",
        bit_offset,
        bit_length
    );
}

fn mask(bit_length: u8) -> u8 {
    (0xFFu16 >> (8 - bit_length)) as u8
}

/// Returns `bit_length` bits starting at `bit_offset`, right aligned
pub fn extract_bits(byte: u8, bit_offset: u8, bit_length: u8) -> u8 {
    check_field(bit_offset, bit_length);

    let shift = 8 - (bit_offset + bit_length);
    (byte >> shift) & mask(bit_length)
}

/// Places `value` in the field at `bit_offset`
///
/// OR the results of several calls together to build a complete flag byte.
pub fn pack_bits(value: u8, bit_offset: u8, bit_length: u8) -> u8 {
    check_field(bit_offset, bit_length);
    assert!(
        value <= mask(bit_length),
        "value {} does not fit in {} bits",
        value,
        bit_length
    );

    let shift = 8 - (bit_offset + bit_length);
    value << shift
}
