use ips_core::{ParseError, ParseErrorKind};
use serde_json::Number;

/// A lexical JSON token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    BeginObject,
    EndObject,
    BeginArray,
    EndArray,
    Colon,
    Comma,
    String(String),
    Number(Number),
    Bool(bool),
    Null,
}

impl Token {
    pub(crate) fn describe(&self) -> &'static str {
        match self {
            Token::BeginObject => "'{'",
            Token::EndObject => "'}'",
            Token::BeginArray => "'['",
            Token::EndArray => "']'",
            Token::Colon => "':'",
            Token::Comma => "','",
            Token::String(_) => "string",
            Token::Number(_) => "number",
            Token::Bool(_) => "boolean",
            Token::Null => "null",
        }
    }
}

enum LexState {
    Idle,
    String { raw: Vec<u8>, escaped: bool },
    Number { raw: Vec<u8> },
    Literal {
        word: &'static [u8],
        matched: usize,
        token: Token,
    },
}

/// Byte-oriented JSON tokenizer that keeps its state between chunks.
///
/// Chunks may split tokens anywhere, including inside escape sequences and multi-byte UTF-8
/// characters. Only the token currently being scanned is buffered.
pub struct Tokenizer {
    state: LexState,
    offset: u64,
    token_start: u64,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            state: LexState::Idle,
            offset: 0,
            token_start: 0,
        }
    }

    /// Number of bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Scan one chunk, calling `on_token` with each token and the offset where it started.
    pub fn feed<F>(&mut self, chunk: &[u8], mut on_token: F) -> Result<(), ParseError>
    where
        F: FnMut(Token, u64) -> Result<(), ParseError>,
    {
        let mut index = 0;
        while index < chunk.len() {
            let byte = chunk[index];
            if matches!(self.state, LexState::Idle) {
                self.scan_idle(byte, &mut on_token)?;
                index += 1;
                self.offset += 1;
                continue;
            }
            match &mut self.state {
                LexState::Idle => {}
                LexState::String { raw, escaped } => {
                    if *escaped {
                        raw.push(byte);
                        *escaped = false;
                    } else if byte == b'\\' {
                        raw.push(byte);
                        *escaped = true;
                    } else if byte == b'"' {
                        let raw = std::mem::take(raw);
                        self.state = LexState::Idle;
                        let text = decode_string(raw, self.token_start)?;
                        on_token(Token::String(text), self.token_start)?;
                    } else {
                        raw.push(byte);
                    }
                }
                LexState::Number { raw } => {
                    if is_number_byte(byte) {
                        raw.push(byte);
                    } else {
                        let raw = std::mem::take(raw);
                        self.state = LexState::Idle;
                        let number = decode_number(&raw, self.token_start)?;
                        on_token(Token::Number(number), self.token_start)?;
                        // The terminating byte belongs to the next token.
                        continue;
                    }
                }
                LexState::Literal {
                    word,
                    matched,
                    token,
                } => {
                    if word.get(*matched) != Some(&byte) {
                        return Err(ParseError::new(
                            self.offset,
                            ParseErrorKind::UnexpectedByte(byte),
                        ));
                    }
                    *matched += 1;
                    if *matched == word.len() {
                        let token = token.clone();
                        self.state = LexState::Idle;
                        on_token(token, self.token_start)?;
                    }
                }
            }
            index += 1;
            self.offset += 1;
        }
        Ok(())
    }

    /// Flush a pending top-level number and reject input that stops inside a token.
    pub fn finish<F>(&mut self, mut on_token: F) -> Result<(), ParseError>
    where
        F: FnMut(Token, u64) -> Result<(), ParseError>,
    {
        match std::mem::replace(&mut self.state, LexState::Idle) {
            LexState::Idle => Ok(()),
            LexState::Number { raw } => {
                let number = decode_number(&raw, self.token_start)?;
                on_token(Token::Number(number), self.token_start)
            }
            LexState::String { .. } | LexState::Literal { .. } => Err(ParseError::new(
                self.offset,
                ParseErrorKind::UnexpectedEnd,
            )),
        }
    }

    fn scan_idle<F>(&mut self, byte: u8, on_token: &mut F) -> Result<(), ParseError>
    where
        F: FnMut(Token, u64) -> Result<(), ParseError>,
    {
        let token = match byte {
            b' ' | b'\t' | b'\n' | b'\r' => return Ok(()),
            b'{' => Token::BeginObject,
            b'}' => Token::EndObject,
            b'[' => Token::BeginArray,
            b']' => Token::EndArray,
            b':' => Token::Colon,
            b',' => Token::Comma,
            b'"' => {
                self.token_start = self.offset;
                self.state = LexState::String {
                    raw: Vec::new(),
                    escaped: false,
                };
                return Ok(());
            }
            b'-' | b'0'..=b'9' => {
                self.token_start = self.offset;
                self.state = LexState::Number { raw: vec![byte] };
                return Ok(());
            }
            b't' => {
                self.start_literal(b"true", Token::Bool(true));
                return Ok(());
            }
            b'f' => {
                self.start_literal(b"false", Token::Bool(false));
                return Ok(());
            }
            b'n' => {
                self.start_literal(b"null", Token::Null);
                return Ok(());
            }
            other => {
                return Err(ParseError::new(
                    self.offset,
                    ParseErrorKind::UnexpectedByte(other),
                ))
            }
        };
        on_token(token, self.offset)
    }

    fn start_literal(&mut self, word: &'static [u8], token: Token) {
        self.token_start = self.offset;
        self.state = LexState::Literal {
            word,
            matched: 1,
            token,
        };
    }
}

fn is_number_byte(byte: u8) -> bool {
    matches!(byte, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E')
}

fn decode_string(raw: Vec<u8>, offset: u64) -> Result<String, ParseError> {
    let invalid = |reason: String| ParseError::new(offset, ParseErrorKind::InvalidString(reason));

    if let Some(control) = raw.iter().find(|byte| **byte < 0x20) {
        return Err(invalid(format!("control character 0x{control:02x}")));
    }

    if !raw.contains(&b'\\') {
        return String::from_utf8(raw).map_err(|err| invalid(err.to_string()));
    }

    let mut quoted = Vec::with_capacity(raw.len() + 2);
    quoted.push(b'"');
    quoted.extend_from_slice(&raw);
    quoted.push(b'"');
    serde_json::from_slice::<String>(&quoted).map_err(|err| invalid(err.to_string()))
}

fn decode_number(raw: &[u8], offset: u64) -> Result<Number, ParseError> {
    serde_json::from_slice::<Number>(raw).map_err(|_| {
        ParseError::new(
            offset,
            ParseErrorKind::InvalidNumber(String::from_utf8_lossy(raw).into_owned()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize_chunks(chunks: &[&[u8]]) -> Result<Vec<Token>, ParseError> {
        let mut tokenizer = Tokenizer::new();
        let mut tokens = Vec::new();
        for chunk in chunks {
            tokenizer.feed(chunk, |token, _| {
                tokens.push(token);
                Ok(())
            })?;
        }
        tokenizer.finish(|token, _| {
            tokens.push(token);
            Ok(())
        })?;
        Ok(tokens)
    }

    #[test]
    fn scans_structural_and_scalar_tokens() {
        let tokens = tokenize_chunks(&[br#"{"a": [1, -2.5e1, true, false, null]}"#]).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::BeginObject,
                Token::String("a".into()),
                Token::Colon,
                Token::BeginArray,
                Token::Number(Number::from(1)),
                Token::Comma,
                Token::Number(Number::from_f64(-25.0).unwrap()),
                Token::Comma,
                Token::Bool(true),
                Token::Comma,
                Token::Bool(false),
                Token::Comma,
                Token::Null,
                Token::EndArray,
                Token::EndObject,
            ]
        );
    }

    #[test]
    fn escapes_and_utf8_survive_any_split() {
        let input = "\"Mart\u{ed}nez \\u00e9\\n\\\"q\\\" \\ud83d\\ude00\"".as_bytes();
        for split in 0..=input.len() {
            let (left, right) = input.split_at(split);
            let tokens = tokenize_chunks(&[left, right]).unwrap();
            assert_eq!(
                tokens,
                vec![Token::String("Martínez é\n\"q\" \u{1F600}".into())],
                "split at {split}"
            );
        }
    }

    #[test]
    fn number_split_across_chunks_and_flushed_at_end() {
        let tokens = tokenize_chunks(&[b"12", b"34", b".5"]).unwrap();
        assert_eq!(tokens, vec![Token::Number(Number::from_f64(1234.5).unwrap())]);
    }

    #[test]
    fn literal_split_across_chunks() {
        let tokens = tokenize_chunks(&[b"[tr", b"u", b"e]"]).unwrap();
        assert_eq!(
            tokens,
            vec![Token::BeginArray, Token::Bool(true), Token::EndArray]
        );
    }

    #[test]
    fn rejects_bad_literal_with_offset() {
        let err = tokenize_chunks(&[b"[nul", b"x]"]).unwrap_err();
        assert_eq!(err.offset, 4);
        assert_eq!(err.kind, ParseErrorKind::UnexpectedByte(b'x'));
    }

    #[test]
    fn rejects_malformed_number() {
        let err = tokenize_chunks(&[b"[01]"]).unwrap_err();
        assert_eq!(err.offset, 1);
        assert!(matches!(err.kind, ParseErrorKind::InvalidNumber(ref n) if n == "01"));
    }

    #[test]
    fn rejects_raw_control_character_in_string() {
        let err = tokenize_chunks(&[b"\"a\nb\""]).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::InvalidString(_)));
    }

    #[test]
    fn unterminated_string_is_unexpected_end() {
        let err = tokenize_chunks(&[b"\"abc"]).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedEnd);
        assert_eq!(err.offset, 4);
    }
}
