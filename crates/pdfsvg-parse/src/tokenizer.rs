//! Content stream tokenizer.
//!
//! Splits decoded content stream bytes into [`Operator`]s carrying the
//! operands that preceded them. Inline images (`BI … ID … EI`) become a
//! single `BI` operator whose operands are the image dictionary and the
//! raw data.

use crate::error::BackendError;

/// A content stream operand value.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Integer(i64),
    Real(f64),
    /// Name without the leading `/`, `#XX` escapes decoded.
    Name(String),
    /// Literal or hexadecimal string as raw bytes.
    String(Vec<u8>),
    Array(Vec<Operand>),
    Boolean(bool),
    Null,
    /// Dictionary entries in stream order.
    Dictionary(Vec<(String, Operand)>),
}

impl Operand {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Operand::Integer(i) => Some(*i as f64),
            Operand::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Operand::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Operand::String(s) => Some(s),
            _ => None,
        }
    }

    /// Look a key up in a dictionary operand.
    pub fn get(&self, key: &str) -> Option<&Operand> {
        match self {
            Operand::Dictionary(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

/// An operator with its operands.
#[derive(Debug, Clone, PartialEq)]
pub struct Operator {
    pub name: String,
    pub operands: Vec<Operand>,
}

impl Operator {
    pub fn num(&self, index: usize) -> Option<f64> {
        self.operands.get(index).and_then(Operand::as_f64)
    }

    /// All operands as numbers, if every one of them is a number.
    pub fn numbers(&self) -> Option<Vec<f64>> {
        self.operands.iter().map(Operand::as_f64).collect()
    }

    pub fn name_operand(&self, index: usize) -> Option<&str> {
        self.operands.get(index).and_then(Operand::as_name)
    }
}

/// Tokenize a whole content stream.
///
/// Stray closing delimiters are skipped. Unterminated strings, arrays or
/// inline images end the stream with an error; operators read before the
/// error are not returned, so callers that want partial output should use
/// [`Lexer`] directly.
pub fn tokenize(input: &[u8]) -> Result<Vec<Operator>, BackendError> {
    Lexer::new(input).collect()
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x0C | 0x00)
}

fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn err(msg: impl Into<String>) -> BackendError {
    BackendError::Interpreter(msg.into())
}

/// A cursor over content stream bytes yielding one operator at a time.
#[derive(Debug)]
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
    stack: Vec<Operand>,
    failed: bool,
}

enum Token {
    Operand(Operand),
    Keyword(String),
    ArrayEnd,
    DictEnd,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            stack: Vec::new(),
            failed: false,
        }
    }

    /// Byte offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn skip_space(&mut self) {
        while let Some(b) = self.peek() {
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while self.peek().is_some_and(|b| b != b'\n' && b != b'\r') {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn next_operator(&mut self) -> Result<Option<Operator>, BackendError> {
        loop {
            let Some(token) = self.token()? else {
                return Ok(None);
            };
            match token {
                Token::Operand(op) => self.stack.push(op),
                Token::Keyword(k) if k == "BI" => {
                    self.stack.clear();
                    let (dict, data) = self.inline_image()?;
                    return Ok(Some(Operator {
                        name: k,
                        operands: vec![Operand::Dictionary(dict), Operand::String(data)],
                    }));
                }
                Token::Keyword(k) => {
                    return Ok(Some(Operator {
                        name: k,
                        operands: std::mem::take(&mut self.stack),
                    }));
                }
                Token::ArrayEnd | Token::DictEnd => {}
            }
        }
    }

    fn token(&mut self) -> Result<Option<Token>, BackendError> {
        loop {
            self.skip_space();
            let Some(b) = self.peek() else {
                return Ok(None);
            };
            let token = match b {
                b'(' => Token::Operand(Operand::String(self.literal_string()?)),
                b'<' if self.peek_at(1) == Some(b'<') => {
                    self.pos += 2;
                    Token::Operand(Operand::Dictionary(self.dictionary()?))
                }
                b'<' => Token::Operand(Operand::String(self.hex_string()?)),
                b'>' if self.peek_at(1) == Some(b'>') => {
                    self.pos += 2;
                    Token::DictEnd
                }
                b'[' => {
                    self.pos += 1;
                    Token::Operand(Operand::Array(self.array()?))
                }
                b']' => {
                    self.pos += 1;
                    Token::ArrayEnd
                }
                b'/' => Token::Operand(Operand::Name(self.name())),
                b'0'..=b'9' | b'+' | b'-' | b'.' => Token::Operand(self.number()),
                b if is_regular(b) => {
                    let word = self.word();
                    match word.as_str() {
                        "true" => Token::Operand(Operand::Boolean(true)),
                        "false" => Token::Operand(Operand::Boolean(false)),
                        "null" => Token::Operand(Operand::Null),
                        _ => Token::Keyword(word),
                    }
                }
                _ => {
                    // `)`, `>`, `{`, `}` on their own carry nothing.
                    self.pos += 1;
                    continue;
                }
            };
            return Ok(Some(token));
        }
    }

    fn word(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_regular) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    fn name(&mut self) -> String {
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(is_regular) {
            self.pos += 1;
        }
        let raw = &self.input[start..self.pos];
        let mut out = Vec::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            if raw[i] == b'#' && i + 2 < raw.len() {
                if let (Some(hi), Some(lo)) = (hex_value(raw[i + 1]), hex_value(raw[i + 2])) {
                    out.push((hi << 4) | lo);
                    i += 3;
                    continue;
                }
            }
            out.push(raw[i]);
            i += 1;
        }
        String::from_utf8_lossy(&out).into_owned()
    }

    /// Numbers are read leniently: `--5`, `5.` and `1.2.3` all yield
    /// something, as they do in viewers.
    fn number(&mut self) -> Operand {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.'))
        {
            self.pos += 1;
        }
        let token = &self.input[start..self.pos];
        let negative = token.iter().take_while(|b| matches!(b, b'+' | b'-')).any(|b| *b == b'-');
        let body: Vec<u8> = token
            .iter()
            .skip_while(|b| matches!(b, b'+' | b'-'))
            .copied()
            .filter(|b| *b != b'+' && *b != b'-')
            .collect();
        let sign = if negative { -1.0 } else { 1.0 };
        if !body.contains(&b'.') {
            let text = std::str::from_utf8(&body).unwrap_or("0");
            return match text.parse::<i64>() {
                Ok(v) => Operand::Integer(if negative { -v } else { v }),
                Err(_) => Operand::Real(sign * text.parse::<f64>().unwrap_or(0.0)),
            };
        }
        let mut seen_dot = false;
        let cleaned: String = body
            .iter()
            .filter(|b| {
                if **b == b'.' {
                    let keep = !seen_dot;
                    seen_dot = true;
                    keep
                } else {
                    true
                }
            })
            .map(|b| *b as char)
            .collect();
        let value = match cleaned.as_str() {
            "." => 0.0,
            s => s.parse::<f64>().unwrap_or(0.0),
        };
        Operand::Real(sign * value)
    }

    fn literal_string(&mut self) -> Result<Vec<u8>, BackendError> {
        self.pos += 1;
        let mut out = Vec::new();
        let mut depth = 1u32;
        while let Some(b) = self.peek() {
            self.pos += 1;
            match b {
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(out);
                    }
                    out.push(b);
                }
                b'\\' => {
                    let Some(e) = self.peek() else {
                        break;
                    };
                    self.pos += 1;
                    match e {
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0C),
                        b'\r' => {
                            if self.peek() == Some(b'\n') {
                                self.pos += 1;
                            }
                        }
                        b'\n' => {}
                        b'0'..=b'7' => {
                            let mut value = u32::from(e - b'0');
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        value = value * 8 + u32::from(d - b'0');
                                        self.pos += 1;
                                    }
                                    _ => break,
                                }
                            }
                            out.push((value & 0xff) as u8);
                        }
                        other => out.push(other),
                    }
                }
                _ => out.push(b),
            }
        }
        Err(err("unterminated literal string"))
    }

    fn hex_string(&mut self) -> Result<Vec<u8>, BackendError> {
        self.pos += 1;
        let mut digits = Vec::new();
        loop {
            let Some(b) = self.peek() else {
                return Err(err("unterminated hex string"));
            };
            self.pos += 1;
            if b == b'>' {
                break;
            }
            if let Some(v) = hex_value(b) {
                digits.push(v);
            } else if !is_whitespace(b) {
                return Err(err(format!("invalid hex digit {:?}", b as char)));
            }
        }
        if digits.len() % 2 == 1 {
            digits.push(0);
        }
        Ok(digits.chunks(2).map(|p| (p[0] << 4) | p[1]).collect())
    }

    fn array(&mut self) -> Result<Vec<Operand>, BackendError> {
        let mut items = Vec::new();
        loop {
            match self.token()? {
                None => return Err(err("unterminated array")),
                Some(Token::ArrayEnd) => return Ok(items),
                Some(Token::Operand(op)) => items.push(op),
                // Keywords inside arrays are malformed; keep them as names.
                Some(Token::Keyword(k)) => items.push(Operand::Name(k)),
                Some(Token::DictEnd) => {}
            }
        }
    }

    fn dictionary(&mut self) -> Result<Vec<(String, Operand)>, BackendError> {
        let mut entries = Vec::new();
        let mut key: Option<String> = None;
        loop {
            match self.token()? {
                None => return Err(err("unterminated dictionary")),
                Some(Token::DictEnd) => return Ok(entries),
                Some(Token::Operand(op)) => match key.take() {
                    Some(k) => entries.push((k, op)),
                    None => match op {
                        Operand::Name(n) => key = Some(n),
                        _ => return Err(err("dictionary key is not a name")),
                    },
                },
                Some(Token::Keyword(k)) => {
                    if let Some(key) = key.take() {
                        entries.push((key, Operand::Name(k)));
                    }
                }
                Some(Token::ArrayEnd) => {}
            }
        }
    }

    /// Read the inline image dictionary after `BI` and its data up to `EI`.
    fn inline_image(&mut self) -> Result<(Vec<(String, Operand)>, Vec<u8>), BackendError> {
        let mut dict = Vec::new();
        let mut key: Option<String> = None;
        loop {
            match self.token()? {
                None => return Err(err("inline image without ID")),
                Some(Token::Keyword(k)) if k == "ID" => break,
                Some(Token::Keyword(k)) => {
                    if let Some(key) = key.take() {
                        dict.push((key, Operand::Name(k)));
                    }
                }
                Some(Token::Operand(op)) => match key.take() {
                    Some(k) => dict.push((k, op)),
                    None => match op {
                        Operand::Name(n) => key = Some(n),
                        _ => return Err(err("inline image key is not a name")),
                    },
                },
                Some(Token::ArrayEnd) | Some(Token::DictEnd) => {}
            }
        }
        // One whitespace byte separates ID from the data.
        if self.peek().is_some_and(is_whitespace) {
            self.pos += 1;
        }
        let start = self.pos;
        let end = self
            .find_end_of_image(start)
            .ok_or_else(|| err("inline image without EI"))?;
        let mut data_end = end;
        if data_end > start && is_whitespace(self.input[data_end - 1]) {
            data_end -= 1;
        }
        let data = self.input[start..data_end].to_vec();
        self.pos = end + 2;
        Ok((dict, data))
    }

    fn find_end_of_image(&self, start: usize) -> Option<usize> {
        let input = self.input;
        let mut i = start;
        while i + 1 < input.len() {
            let at_boundary = i == start || is_whitespace(input[i - 1]);
            let followed = input.get(i + 2).is_none_or(|b| is_whitespace(*b) || is_delimiter(*b));
            if at_boundary && input[i] == b'E' && input[i + 1] == b'I' && followed {
                return Some(i);
            }
            i += 1;
        }
        None
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Operator, BackendError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_operator() {
            Ok(Some(op)) => Some(Ok(op)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
