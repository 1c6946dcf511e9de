//! A byte-oriented cursor over the source text, plus the handful of
//! parsing primitives the statement and expression compilers share.
//!
//! There is no token stream: the compiler consults the cursor directly at
//! each decision point, which is why every primitive here is phrased as
//! "advance past X if present" rather than "produce the next token".

/// A cursor over raw source bytes. Indices are byte offsets, not char
/// offsets; Wave source is expected to be ASCII-compatible UTF-8 and no
/// primitive here looks past a single byte at a time.
pub struct Cursor<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(src: &'a str) -> Self {
        Cursor {
            src: src.as_bytes(),
            pos: 0,
        }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.src.len());
    }

    pub fn len(&self) -> usize {
        self.src.len()
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    pub fn peek(&self) -> u8 {
        self.peek_n(0)
    }

    pub fn peek_n(&self, n: usize) -> u8 {
        *self.src.get(self.pos + n).unwrap_or(&0)
    }

    pub fn advance(&mut self) -> u8 {
        let b = self.peek();
        if !self.eof() {
            self.pos += 1;
        }
        b
    }

    /// Skip whitespace and both comment forms (`// ...` and `# ...`),
    /// looping so that runs of either kind separated by blank lines
    /// collapse in one call.
    pub fn skip_whitespace(&mut self) {
        loop {
            while !self.eof() && self.peek().is_ascii_whitespace() {
                self.pos += 1;
            }
            if self.peek() == b'#' || (self.peek() == b'/' && self.peek_n(1) == b'/') {
                self.skip_line();
                continue;
            }
            break;
        }
    }

    /// Advance to just past the next newline, or to EOF.
    pub fn skip_line(&mut self) {
        while !self.eof() && self.peek() != b'\n' {
            self.pos += 1;
        }
        if !self.eof() {
            self.pos += 1;
        }
    }

    /// If the upcoming bytes spell `s` and are not followed by an
    /// identifier character (so `fn` doesn't match inside `fname`),
    /// consume them and return true.
    pub fn match_str(&mut self, s: &str) -> bool {
        let bytes = s.as_bytes();
        if self.pos + bytes.len() > self.src.len() {
            return false;
        }
        if &self.src[self.pos..self.pos + bytes.len()] != bytes {
            return false;
        }
        let next = *self.src.get(self.pos + bytes.len()).unwrap_or(&0);
        if is_ident_char(next) && bytes.last().is_some_and(|&b| is_ident_char(b)) {
            return false;
        }
        self.pos += bytes.len();
        true
    }

    /// Same as `match_str` but without the trailing identifier-boundary
    /// check, for punctuation like `->` or `==`.
    pub fn match_exact(&mut self, s: &str) -> bool {
        let bytes = s.as_bytes();
        if self.pos + bytes.len() > self.src.len() {
            return false;
        }
        if &self.src[self.pos..self.pos + bytes.len()] != bytes {
            return false;
        }
        self.pos += bytes.len();
        true
    }

    pub fn parse_ident(&mut self) -> Option<String> {
        if !is_ident_start(self.peek()) {
            return None;
        }
        let start = self.pos;
        while is_ident_char(self.peek()) {
            self.pos += 1;
        }
        Some(String::from_utf8_lossy(&self.src[start..self.pos]).into_owned())
    }

    /// Parse a double-quoted string literal, consuming both quotes.
    /// Recognized escapes: `\n \t \r \0 \"` and `\xHH`; anything else
    /// passes the backslash and following byte through unchanged.
    pub fn parse_string(&mut self) -> Option<Vec<u8>> {
        if self.peek() != b'"' {
            return None;
        }
        self.pos += 1;
        let mut out = Vec::new();
        loop {
            if self.eof() {
                break;
            }
            let c = self.advance();
            if c == b'"' {
                break;
            }
            if c == b'\\' {
                let esc = self.advance();
                match esc {
                    b'n' => out.push(b'\n'),
                    b't' => out.push(b'\t'),
                    b'r' => out.push(b'\r'),
                    b'0' => out.push(0),
                    b'"' => out.push(b'"'),
                    b'\\' => out.push(b'\\'),
                    b'x' => {
                        let hi = self.advance();
                        let lo = self.advance();
                        let v = (hex_digit(hi) << 4) | hex_digit(lo);
                        out.push(v);
                    }
                    other => out.push(other),
                }
            } else {
                out.push(c);
            }
        }
        Some(out)
    }

    /// Parse an integer, truncating any fractional part: digits after a
    /// `.` are scanned and discarded rather than contributing to the
    /// value. This matches the general numeric-literal behavior used
    /// everywhere a number appears in an expression; `parse_float` below
    /// is the one place Wave wants a properly rounded value.
    pub fn parse_number(&mut self) -> Option<i64> {
        let neg = if self.peek() == b'-' && self.peek_n(1).is_ascii_digit() {
            self.pos += 1;
            true
        } else {
            false
        };
        if !self.peek().is_ascii_digit() {
            if neg {
                self.pos -= 1;
            }
            return None;
        }
        let mut num: i64 = 0;
        while self.peek().is_ascii_digit() {
            num = num * 10 + (self.advance() - b'0') as i64;
        }
        if self.peek() == b'.' && self.peek_n(1).is_ascii_digit() {
            self.pos += 1;
            while self.peek().is_ascii_digit() {
                self.pos += 1;
            }
        }
        Some(if neg { -num } else { num })
    }

    /// Parse a real-valued numeric literal with correct fractional
    /// rounding. Used exclusively for `unified{}` block fields, which are
    /// meant to be read as the human-intended decimal, not truncated.
    pub fn parse_float(&mut self) -> Option<f64> {
        let start = self.pos;
        let neg = self.peek() == b'-';
        if neg {
            self.pos += 1;
        }
        if !self.peek().is_ascii_digit() {
            self.pos = start;
            return None;
        }
        let mut int_part: f64 = 0.0;
        while self.peek().is_ascii_digit() {
            int_part = int_part * 10.0 + (self.advance() - b'0') as f64;
        }
        let mut frac_part: f64 = 0.0;
        if self.peek() == b'.' && self.peek_n(1).is_ascii_digit() {
            self.pos += 1;
            let mut scale = 0.1;
            while self.peek().is_ascii_digit() {
                frac_part += (self.advance() - b'0') as f64 * scale;
                scale *= 0.1;
            }
        }
        let val = int_part + frac_part;
        Some(if neg { -val } else { val })
    }
}

pub fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

pub fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.'
}

fn hex_digit(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        b'A'..=b'F' => b - b'A' + 10,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_whitespace_eats_both_comment_styles() {
        let mut c = Cursor::new("  // hi\n  # also hi\n  x");
        c.skip_whitespace();
        assert_eq!(c.parse_ident().as_deref(), Some("x"));
    }

    #[test]
    fn match_str_respects_identifier_boundary() {
        let mut c = Cursor::new("fname");
        assert!(!c.match_str("fn"));
        assert_eq!(c.pos(), 0);
    }

    #[test]
    fn parse_number_truncates_fraction() {
        let mut c = Cursor::new("0.9");
        assert_eq!(c.parse_number(), Some(0));
    }

    #[test]
    fn parse_float_rounds_properly() {
        let mut c = Cursor::new("0.9");
        assert!((c.parse_float().unwrap() - 0.9).abs() < 1e-9);
    }

    #[test]
    fn parse_string_handles_escapes() {
        let mut c = Cursor::new(r#""a\nb\x41""#);
        assert_eq!(c.parse_string().unwrap(), b"a\nbA");
    }

    #[test]
    fn negative_number_parses_with_sign() {
        let mut c = Cursor::new("-42");
        assert_eq!(c.parse_number(), Some(-42));
    }
}
