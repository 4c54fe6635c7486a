//! Encoding for `<#fmt[width][+add]:NAME>` length references.
//!
//! Uses explicit `to_be_bytes`/`to_le_bytes` slicing and manual digit
//! formatting for the ASCII bases, matching the style this workspace's
//! wire-encoding code uses elsewhere, generalized to the seven format codes
//! the pattern grammar defines.

use nanofuzz_lang::{LenFormat, LenOptions};

/// Upper bound on the bytes a single encoding of `opts` can ever produce,
/// used by the linker's `max_output_size` walk.
pub fn max_encoded_len(opts: LenOptions) -> usize {
    match opts.format {
        LenFormat::RawBig | LenFormat::RawLittle => opts.width as usize,
        LenFormat::Binary => opts.width as usize,
        LenFormat::Decimal => if opts.width > 0 { opts.width as usize } else { 20 },
        LenFormat::Hex | LenFormat::HexUpper => if opts.width > 0 { opts.width as usize } else { 16 },
        LenFormat::Octal => if opts.width > 0 { opts.width as usize } else { 22 },
    }
}

/// Encode `len` (the referenced name's most recent output length) under
/// `opts`, applying the signed addend first.
///
/// Fixed-width fields wrap modulo the field's capacity on overflow, as the
/// grammar requires; unpadded ASCII fields (`width == 0`) render the full
/// wrapped 64-bit value with no truncation.
pub fn encode(len: usize, opts: LenOptions) -> Vec<u8> {
    let wrapped = (len as i64).wrapping_add(opts.add) as u64;
    match opts.format {
        LenFormat::RawBig => {
            let width = opts.width as usize;
            wrapped.to_be_bytes()[8 - width..].to_vec()
        }
        LenFormat::RawLittle => {
            let width = opts.width as usize;
            wrapped.to_le_bytes()[..width].to_vec()
        }
        LenFormat::Binary => {
            let width = opts.width as u32;
            (0..width).rev().map(|bit| if (wrapped >> bit) & 1 == 1 { b'1' } else { b'0' }).collect()
        }
        LenFormat::Decimal => format_in_base(wrapped, 10, opts.width, false),
        LenFormat::Hex => format_in_base(wrapped, 16, opts.width, false),
        LenFormat::HexUpper => format_in_base(wrapped, 16, opts.width, true),
        LenFormat::Octal => format_in_base(wrapped, 8, opts.width, false),
    }
}

fn format_in_base(value: u64, base: u64, width: u16, upper: bool) -> Vec<u8> {
    let value = if width > 0 {
        match base.checked_pow(width as u32) {
            // `checked_pow` overflowing means the field's digit capacity
            // already exceeds every representable `u64`, so no value needs
            // wrapping; `saturating_pow` here would clamp to `u64::MAX`
            // and wrongly wrap the single value equal to it down to zero.
            Some(capacity) if capacity > 0 => value % capacity,
            _ => value,
        }
    } else {
        value
    };

    let digits = b"0123456789abcdef";
    let digits_upper = b"0123456789ABCDEF";
    let table = if upper { digits_upper } else { digits };

    let mut out = Vec::new();
    let mut v = value;
    if v == 0 {
        out.push(table[0]);
    }
    while v > 0 {
        out.push(table[(v % base) as usize]);
        v /= base;
    }
    out.reverse();

    if width as usize > out.len() {
        let mut padded = vec![b'0'; width as usize - out.len()];
        padded.extend(out);
        padded
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_zero_padded() {
        let opts = LenOptions { format: LenFormat::Decimal, width: 4, add: 0 };
        assert_eq!(encode(3, opts), b"0003");
    }

    #[test]
    fn hex_lower_and_upper() {
        let lower = LenOptions { format: LenFormat::Hex, width: 2, add: 0 };
        let upper = LenOptions { format: LenFormat::HexUpper, width: 2, add: 0 };
        assert_eq!(encode(255, lower), b"ff");
        assert_eq!(encode(255, upper), b"FF");
    }

    #[test]
    fn raw_big_and_little_endian() {
        let big = LenOptions { format: LenFormat::RawBig, width: 2, add: 0 };
        let little = LenOptions { format: LenFormat::RawLittle, width: 2, add: 0 };
        assert_eq!(encode(0x0102, big), vec![0x01, 0x02]);
        assert_eq!(encode(0x0102, little), vec![0x02, 0x01]);
    }

    #[test]
    fn binary_is_fixed_width() {
        let opts = LenOptions { format: LenFormat::Binary, width: 8, add: 0 };
        assert_eq!(encode(5, opts), b"00000101");
    }

    #[test]
    fn fixed_width_wraps_on_overflow() {
        let opts = LenOptions { format: LenFormat::Decimal, width: 2, add: 0 };
        assert_eq!(encode(123, opts), b"23");
    }

    #[test]
    fn addend_applies_before_encoding() {
        let opts = LenOptions { format: LenFormat::Decimal, width: 2, add: -1 };
        assert_eq!(encode(5, opts), b"04");
    }

    #[test]
    fn unpadded_uses_full_value() {
        let opts = LenOptions { format: LenFormat::Octal, width: 0, add: 0 };
        assert_eq!(encode(8, opts), b"10");
    }

    #[test]
    fn max_width_hex_does_not_wrap_the_largest_value_to_zero() {
        // 16 hex digits span exactly u64's range (16^16 == 2^64); the
        // largest representable value must round-trip, not collapse to 0.
        let opts = LenOptions { format: LenFormat::Hex, width: 16, add: -1 };
        assert_eq!(encode(0, opts), b"ffffffffffffffff");
    }

    #[test]
    fn max_width_decimal_does_not_wrap_the_largest_value_to_zero() {
        let opts = LenOptions { format: LenFormat::Decimal, width: 20, add: -1 };
        assert_eq!(encode(0, opts), format!("{:020}", u64::MAX).into_bytes());
    }
}
