use std::io::Read;

use serde_json::Number;

use crate::error::ExtractError;

/// One structural event from an incrementally parsed JSON document.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonEvent {
    BeginObject,
    EndObject,
    BeginArray,
    EndArray,
    Key(String),
    Str(String),
    Num(Number),
    Bool(bool),
    Null,
}

#[derive(Clone, Copy)]
enum ObjPos {
    KeyOrEnd,
    Value,
    CommaOrEnd,
}

#[derive(Clone, Copy)]
enum ArrPos {
    ValueOrEnd,
    CommaOrEnd,
}

#[derive(Clone, Copy)]
enum Frame {
    Object(ObjPos),
    Array(ArrPos),
}

/// Pull tokenizer over any byte source. Reads one byte ahead at most, so the
/// source never needs to be fully in memory — a network response body works
/// directly.
pub struct Tokenizer<R: Read> {
    reader: R,
    peeked: Option<u8>,
    stack: Vec<Frame>,
    started: bool,
}

impl<R: Read> Tokenizer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            peeked: None,
            stack: Vec::new(),
            started: false,
        }
    }

    /// Next structural event, or `None` once the root value has been fully
    /// consumed and only whitespace remains.
    pub fn next_event(&mut self) -> Result<Option<JsonEvent>, ExtractError> {
        loop {
            self.skip_whitespace()?;
            let Some(byte) = self.peek_byte()? else {
                if self.stack.is_empty() && self.started {
                    return Ok(None);
                }
                return Err(ExtractError::Syntax("unexpected end of input".into()));
            };
            match self.stack.last().copied() {
                None => {
                    if self.started {
                        return Err(ExtractError::Syntax(
                            "trailing data after document".into(),
                        ));
                    }
                    self.started = true;
                    return self.parse_value().map(Some);
                }
                Some(Frame::Object(ObjPos::KeyOrEnd)) => match byte {
                    b'}' => {
                        self.peeked = None;
                        self.stack.pop();
                        return Ok(Some(JsonEvent::EndObject));
                    }
                    b'"' => {
                        self.peeked = None;
                        let key = self.parse_string_body()?;
                        self.skip_whitespace()?;
                        self.expect_byte(b':')?;
                        self.set_top(Frame::Object(ObjPos::Value));
                        return Ok(Some(JsonEvent::Key(key)));
                    }
                    other => return Err(syntax_at("object key or `}`", other)),
                },
                Some(Frame::Object(ObjPos::Value)) => {
                    self.set_top(Frame::Object(ObjPos::CommaOrEnd));
                    return self.parse_value().map(Some);
                }
                Some(Frame::Object(ObjPos::CommaOrEnd)) => match byte {
                    b',' => {
                        self.peeked = None;
                        self.set_top(Frame::Object(ObjPos::KeyOrEnd));
                    }
                    b'}' => {
                        self.peeked = None;
                        self.stack.pop();
                        return Ok(Some(JsonEvent::EndObject));
                    }
                    other => return Err(syntax_at("`,` or `}`", other)),
                },
                Some(Frame::Array(ArrPos::ValueOrEnd)) => match byte {
                    b']' => {
                        self.peeked = None;
                        self.stack.pop();
                        return Ok(Some(JsonEvent::EndArray));
                    }
                    _ => {
                        self.set_top(Frame::Array(ArrPos::CommaOrEnd));
                        return self.parse_value().map(Some);
                    }
                },
                Some(Frame::Array(ArrPos::CommaOrEnd)) => match byte {
                    b',' => {
                        self.peeked = None;
                        self.set_top(Frame::Array(ArrPos::ValueOrEnd));
                    }
                    b']' => {
                        self.peeked = None;
                        self.stack.pop();
                        return Ok(Some(JsonEvent::EndArray));
                    }
                    other => return Err(syntax_at("`,` or `]`", other)),
                },
            }
        }
    }

    fn set_top(&mut self, frame: Frame) {
        if let Some(top) = self.stack.last_mut() {
            *top = frame;
        }
    }

    fn parse_value(&mut self) -> Result<JsonEvent, ExtractError> {
        let byte = self
            .peek_byte()?
            .ok_or_else(|| ExtractError::Syntax("unexpected end of input".into()))?;
        match byte {
            b'{' => {
                self.peeked = None;
                self.stack.push(Frame::Object(ObjPos::KeyOrEnd));
                Ok(JsonEvent::BeginObject)
            }
            b'[' => {
                self.peeked = None;
                self.stack.push(Frame::Array(ArrPos::ValueOrEnd));
                Ok(JsonEvent::BeginArray)
            }
            b'"' => {
                self.peeked = None;
                Ok(JsonEvent::Str(self.parse_string_body()?))
            }
            b't' => {
                self.expect_literal("true")?;
                Ok(JsonEvent::Bool(true))
            }
            b'f' => {
                self.expect_literal("false")?;
                Ok(JsonEvent::Bool(false))
            }
            b'n' => {
                self.expect_literal("null")?;
                Ok(JsonEvent::Null)
            }
            b'-' | b'0'..=b'9' => self.parse_number(),
            other => Err(syntax_at("a JSON value", other)),
        }
    }

    /// Opening quote already consumed.
    fn parse_string_body(&mut self) -> Result<String, ExtractError> {
        let mut buf = Vec::new();
        loop {
            let byte = self
                .read_byte()?
                .ok_or_else(|| ExtractError::Syntax("unterminated string".into()))?;
            match byte {
                b'"' => break,
                b'\\' => {
                    let escape = self
                        .read_byte()?
                        .ok_or_else(|| ExtractError::Syntax("unterminated string".into()))?;
                    match escape {
                        b'"' => buf.push(b'"'),
                        b'\\' => buf.push(b'\\'),
                        b'/' => buf.push(b'/'),
                        b'b' => buf.push(0x08),
                        b'f' => buf.push(0x0c),
                        b'n' => buf.push(b'\n'),
                        b'r' => buf.push(b'\r'),
                        b't' => buf.push(b'\t'),
                        b'u' => {
                            let ch = self.parse_unicode_escape()?;
                            let mut utf8 = [0u8; 4];
                            buf.extend_from_slice(ch.encode_utf8(&mut utf8).as_bytes());
                        }
                        other => return Err(syntax_at("a string escape", other)),
                    }
                }
                other => buf.push(other),
            }
        }
        String::from_utf8(buf).map_err(|_| ExtractError::Syntax("invalid UTF-8 in string".into()))
    }

    /// `\u` already consumed; handles surrogate pairs.
    fn parse_unicode_escape(&mut self) -> Result<char, ExtractError> {
        let high = self.parse_hex4()?;
        let codepoint = if (0xD800..0xDC00).contains(&high) {
            self.expect_byte(b'\\')?;
            self.expect_byte(b'u')?;
            let low = self.parse_hex4()?;
            if !(0xDC00..0xE000).contains(&low) {
                return Err(ExtractError::Syntax("invalid surrogate pair".into()));
            }
            0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
        } else {
            high
        };
        char::from_u32(codepoint)
            .ok_or_else(|| ExtractError::Syntax("invalid unicode escape".into()))
    }

    fn parse_hex4(&mut self) -> Result<u32, ExtractError> {
        let mut value = 0u32;
        for _ in 0..4 {
            let byte = self
                .read_byte()?
                .ok_or_else(|| ExtractError::Syntax("unterminated unicode escape".into()))?;
            let digit = (byte as char)
                .to_digit(16)
                .ok_or_else(|| syntax_at("a hex digit", byte))?;
            value = value * 16 + digit;
        }
        Ok(value)
    }

    fn parse_number(&mut self) -> Result<JsonEvent, ExtractError> {
        let mut lexeme = String::new();
        while let Some(byte) = self.peek_byte()? {
            if matches!(byte, b'-' | b'+' | b'.' | b'e' | b'E' | b'0'..=b'9') {
                lexeme.push(byte as char);
                self.peeked = None;
            } else {
                break;
            }
        }
        serde_json::from_str::<Number>(&lexeme)
            .map(JsonEvent::Num)
            .map_err(|_| ExtractError::Syntax(format!("invalid number `{lexeme}`")))
    }

    fn expect_literal(&mut self, literal: &str) -> Result<(), ExtractError> {
        for expected in literal.bytes() {
            match self.read_byte()? {
                Some(byte) if byte == expected => {}
                _ => return Err(ExtractError::Syntax(format!("expected literal `{literal}`"))),
            }
        }
        Ok(())
    }

    fn expect_byte(&mut self, expected: u8) -> Result<(), ExtractError> {
        match self.read_byte()? {
            Some(byte) if byte == expected => Ok(()),
            Some(other) => Err(syntax_at("a structural byte", other)),
            None => Err(ExtractError::Syntax("unexpected end of input".into())),
        }
    }

    fn skip_whitespace(&mut self) -> Result<(), ExtractError> {
        while let Some(byte) = self.peek_byte()? {
            if matches!(byte, b' ' | b'\t' | b'\n' | b'\r') {
                self.peeked = None;
            } else {
                break;
            }
        }
        Ok(())
    }

    fn peek_byte(&mut self) -> Result<Option<u8>, ExtractError> {
        if self.peeked.is_none() {
            self.peeked = self.next_byte()?;
        }
        Ok(self.peeked)
    }

    fn read_byte(&mut self) -> Result<Option<u8>, ExtractError> {
        if let Some(byte) = self.peeked.take() {
            return Ok(Some(byte));
        }
        self.next_byte()
    }

    fn next_byte(&mut self) -> Result<Option<u8>, ExtractError> {
        let mut buf = [0u8; 1];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn syntax_at(expected: &str, found: u8) -> ExtractError {
    ExtractError::Syntax(format!("expected {expected}, found `{}`", found as char))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn events(input: &str) -> Vec<JsonEvent> {
        let mut tokenizer = Tokenizer::new(Cursor::new(input));
        let mut out = Vec::new();
        while let Some(event) = tokenizer.next_event().unwrap() {
            out.push(event);
        }
        out
    }

    #[test]
    fn tokenizes_nested_document() {
        use JsonEvent::*;
        let got = events(r#"{"a": [1, {"b": true}], "c": null}"#);
        assert_eq!(
            got,
            vec![
                BeginObject,
                Key("a".into()),
                BeginArray,
                Num(1.into()),
                BeginObject,
                Key("b".into()),
                Bool(true),
                EndObject,
                EndArray,
                Key("c".into()),
                Null,
                EndObject,
            ]
        );
    }

    #[test]
    fn preserves_integer_and_float_numbers() {
        let got = events("[9007199254740993, -1.5, 2.0e2]");
        let JsonEvent::Num(big) = &got[1] else {
            panic!("expected number")
        };
        assert_eq!(big.as_i64(), Some(9007199254740993));
        let JsonEvent::Num(neg) = &got[2] else {
            panic!("expected number")
        };
        assert_eq!(neg.as_f64(), Some(-1.5));
    }

    #[test]
    fn decodes_escapes_and_utf8() {
        let got = events(r#""Café \"\\ \n 😀""#);
        assert_eq!(got, vec![JsonEvent::Str("Café \"\\ \n 😀".into())]);
    }

    #[test]
    fn passes_raw_utf8_through() {
        let got = events(r#"{"name": "Café"}"#);
        assert_eq!(got[1], JsonEvent::Key("name".into()));
        assert_eq!(got[2], JsonEvent::Str("Café".into()));
    }

    #[test]
    fn errors_on_truncated_input() {
        let mut tokenizer = Tokenizer::new(Cursor::new(r#"{"a": [1, 2"#));
        let end = loop {
            match tokenizer.next_event() {
                Ok(Some(_)) => continue,
                other => break other,
            }
        };
        assert!(matches!(end, Err(ExtractError::Syntax(_))));
    }

    #[test]
    fn errors_on_trailing_data() {
        let mut tokenizer = Tokenizer::new(Cursor::new("{} {}"));
        assert_eq!(tokenizer.next_event().unwrap(), Some(JsonEvent::BeginObject));
        assert_eq!(tokenizer.next_event().unwrap(), Some(JsonEvent::EndObject));
        assert!(tokenizer.next_event().is_err());
    }

    #[test]
    fn errors_on_unterminated_string() {
        let mut tokenizer = Tokenizer::new(Cursor::new(r#""never ends"#));
        assert!(matches!(
            tokenizer.next_event(),
            Err(ExtractError::Syntax(_))
        ));
    }
}
