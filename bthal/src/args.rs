//! Console argument tokenizer.
//!
//! Arguments are separated by spaces. Numeric getters return a caller supplied
//! default when no digit is present at the cursor, which lets commands treat
//! every argument as optional.

use std::fmt;

/// Length limit of a single string argument.
pub const MAX_ARG_LEN: usize = 64;

/// A string argument exceeded the permitted length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputTooLong {
    /// Length of the offending token.
    pub len: usize,
    /// Maximum accepted length.
    pub max: usize,
}

impl fmt::Display for InputTooLong {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "input too long: {} characters exceed limit of {}", self.len, self.max)
    }
}

impl std::error::Error for InputTooLong {}

/// Cursor over the arguments of one console line.
#[derive(Clone, Debug)]
pub struct Args<'a> {
    line: &'a str,
    pos: usize,
}

impl<'a> Args<'a> {
    /// Creates a cursor at the start of `line`.
    pub fn new(line: &'a str) -> Self {
        Self { line, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.line.as_bytes().get(self.pos).copied()
    }

    /// Advances the cursor past space characters.
    pub fn skip_blanks(&mut self) {
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
    }

    /// Parses an unsigned decimal number.
    ///
    /// Overflow wraps around like the 32-bit arithmetic of the stack tools.
    pub fn get_int(&mut self, default: u32) -> u32 {
        self.skip_blanks();
        let mut value: u32 = 0;
        let mut found = false;
        while let Some(c @ b'0'..=b'9') = self.peek() {
            value = value.wrapping_mul(10).wrapping_add(u32::from(c - b'0'));
            found = true;
            self.pos += 1;
        }
        if found {
            value
        } else {
            default
        }
    }

    /// Parses a decimal number with an optional leading `-`.
    pub fn get_signed_int(&mut self, default: i32) -> i32 {
        self.skip_blanks();
        let negative = self.peek() == Some(b'-');
        if negative {
            self.pos += 1;
        }
        let mut value: i32 = 0;
        let mut found = false;
        while let Some(c @ b'0'..=b'9') = self.peek() {
            value = value.wrapping_mul(10).wrapping_add(i32::from(c - b'0'));
            found = true;
            self.pos += 1;
        }
        match (found, negative) {
            (false, _) => default,
            (true, false) => value,
            (true, true) => value.wrapping_neg(),
        }
    }

    /// Parses at most `nibbles` hexadecimal digits, case insensitively.
    pub fn get_hex_any(&mut self, default: u32, nibbles: usize) -> u32 {
        self.skip_blanks();
        let mut value: u32 = 0;
        let mut consumed = 0;
        while consumed < nibbles {
            let Some(digit) = self.peek().and_then(|c| char::from(c).to_digit(16)) else { break };
            value = value.wrapping_mul(16).wrapping_add(digit);
            consumed += 1;
            self.pos += 1;
        }
        if consumed > 0 {
            value
        } else {
            default
        }
    }

    /// Parses up to eight hexadecimal digits.
    pub fn get_hex(&mut self, default: u32) -> u32 {
        self.get_hex_any(default, 8)
    }

    /// Parses up to two hexadecimal digits.
    pub fn get_hex_byte(&mut self, default: u32) -> u32 {
        self.get_hex_any(default, 2)
    }

    /// Returns the next space delimited token, which may be empty at end of line.
    ///
    /// Fails without moving the cursor when the token is longer than `max_len`.
    pub fn get_str(&mut self, max_len: usize) -> Result<&'a str, InputTooLong> {
        let start_pos = self.pos;
        self.skip_blanks();
        let rest = &self.line[self.pos..];
        let len = rest.find(' ').unwrap_or(rest.len());
        if len > max_len {
            self.pos = start_pos;
            return Err(InputTooLong { len, max: max_len });
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    /// Remaining unparsed text.
    pub fn rest(&self) -> &'a str {
        &self.line[self.pos..]
    }
}

/// Converts the leading decimal number of `s`, ignoring anything after it.
///
/// Yields 0 when no number is present.
pub fn atoi(s: &str) -> i32 {
    let mut args = Args::new(s.trim_start());
    args.get_signed_int(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_stops_at_non_digit() {
        let mut args = Args::new("  42abc");
        assert_eq!(args.get_int(7), 42);
        assert_eq!(args.rest(), "abc");
    }

    #[test]
    fn int_default_without_digits() {
        let mut args = Args::new("abc");
        assert_eq!(args.get_int(7), 7);
        assert_eq!(args.rest(), "abc");

        let mut args = Args::new("");
        assert_eq!(args.get_int(u32::MAX), u32::MAX);
    }

    #[test]
    fn signed_int() {
        let mut args = Args::new(" -15 8 -");
        assert_eq!(args.get_signed_int(0), -15);
        assert_eq!(args.get_signed_int(0), 8);
        assert_eq!(args.get_signed_int(3), 3);
    }

    #[test]
    fn hex() {
        let mut args = Args::new("1F");
        assert_eq!(args.get_hex(0), 31);
        assert_eq!(args.rest(), "");

        let mut args = Args::new(" 1001 bf");
        assert_eq!(args.get_hex(0), 0x1001);
        assert_eq!(args.get_hex(0), 0xbf);
        assert_eq!(args.get_hex(5), 5);
    }

    #[test]
    fn hex_nibble_cap() {
        let mut args = Args::new("ABCDE");
        assert_eq!(args.get_hex_any(0, 2), 0xAB);
        assert_eq!(args.rest(), "CDE");
        assert_eq!(args.get_hex_byte(0), 0xCD);
    }

    #[test]
    fn str_token() {
        let mut args = Args::new("  hello world");
        assert_eq!(args.get_str(MAX_ARG_LEN), Ok("hello"));
        assert_eq!(args.rest(), " world");
        assert_eq!(args.get_str(MAX_ARG_LEN), Ok("world"));
        assert_eq!(args.get_str(MAX_ARG_LEN), Ok(""));
    }

    #[test]
    fn str_too_long_leaves_cursor() {
        let mut args = Args::new(" abcdefgh ij");
        assert_eq!(args.get_str(4), Err(InputTooLong { len: 8, max: 4 }));
        assert_eq!(args.rest(), " abcdefgh ij");
    }

    #[test]
    fn atoi_like() {
        assert_eq!(atoi("12"), 12);
        assert_eq!(atoi(" 3x"), 3);
        assert_eq!(atoi("-2"), -2);
        assert_eq!(atoi("x"), 0);
    }
}
