use ips_core::{ParseError, ParseErrorKind};
use serde_json::{Map, Value};

use crate::event::{Key, Parent, ValueEvent, ValueSink};
use crate::tokenizer::{Token, Tokenizer};

#[derive(Debug, Clone, Copy)]
enum ObjectState {
    KeyOrEnd,
    Key,
    Colon,
    Value,
    CommaOrEnd,
}

#[derive(Debug, Clone, Copy)]
enum ArrayState {
    ValueOrEnd,
    Value,
    CommaOrEnd,
}

enum Frame {
    Object {
        map: Map<String, Value>,
        pending_key: Option<String>,
        state: ObjectState,
    },
    Array {
        items: Vec<Value>,
        next_index: usize,
        state: ArrayState,
    },
}

impl Frame {
    fn object() -> Self {
        Frame::Object {
            map: Map::new(),
            pending_key: None,
            state: ObjectState::KeyOrEnd,
        }
    }

    fn array() -> Self {
        Frame::Array {
            items: Vec::new(),
            next_index: 0,
            state: ArrayState::ValueOrEnd,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Frame::Object { map, .. } => Value::Object(map),
            Frame::Array { items, .. } => Value::Array(items),
        }
    }
}

/// Grammar state over the token stream: one frame per open container.
struct Assembler {
    stack: Vec<Frame>,
    path: Vec<Key>,
    root_done: bool,
    max_depth: usize,
}

impl Assembler {
    fn push_token<S>(&mut self, token: Token, offset: u64, sink: &mut S) -> Result<(), ParseError>
    where
        S: ValueSink + ?Sized,
    {
        let Some(frame) = self.stack.last_mut() else {
            if self.root_done {
                return Err(ParseError::new(offset, ParseErrorKind::TrailingData));
            }
            return self.begin_value(Key::Root, token, offset, sink);
        };

        match frame {
            Frame::Object {
                pending_key, state, ..
            } => match (*state, token) {
                (ObjectState::KeyOrEnd | ObjectState::Key, Token::String(name)) => {
                    *pending_key = Some(name);
                    *state = ObjectState::Colon;
                    Ok(())
                }
                (ObjectState::Colon, Token::Colon) => {
                    *state = ObjectState::Value;
                    Ok(())
                }
                (ObjectState::CommaOrEnd, Token::Comma) => {
                    *state = ObjectState::Key;
                    Ok(())
                }
                (ObjectState::KeyOrEnd | ObjectState::CommaOrEnd, Token::EndObject) => {
                    self.close(sink);
                    Ok(())
                }
                (ObjectState::Value, token) => {
                    let name = pending_key.take().unwrap_or_default();
                    self.begin_value(Key::Field(name), token, offset, sink)
                }
                (_, token) => Err(unexpected(&token, offset)),
            },
            Frame::Array {
                next_index, state, ..
            } => match (*state, token) {
                (ArrayState::ValueOrEnd | ArrayState::CommaOrEnd, Token::EndArray) => {
                    self.close(sink);
                    Ok(())
                }
                (ArrayState::CommaOrEnd, Token::Comma) => {
                    *state = ArrayState::Value;
                    Ok(())
                }
                (ArrayState::ValueOrEnd | ArrayState::Value, token) => {
                    let index = *next_index;
                    *next_index += 1;
                    self.begin_value(Key::Index(index), token, offset, sink)
                }
                (_, token) => Err(unexpected(&token, offset)),
            },
        }
    }

    fn begin_value<S>(
        &mut self,
        key: Key,
        token: Token,
        offset: u64,
        sink: &mut S,
    ) -> Result<(), ParseError>
    where
        S: ValueSink + ?Sized,
    {
        let value = match token {
            Token::BeginObject => return self.open(key, Frame::object(), offset),
            Token::BeginArray => return self.open(key, Frame::array(), offset),
            Token::String(text) => Value::String(text),
            Token::Number(number) => Value::Number(number),
            Token::Bool(flag) => Value::Bool(flag),
            Token::Null => Value::Null,
            other => return Err(unexpected(&other, offset)),
        };
        self.deliver(key, value, sink);
        Ok(())
    }

    fn open(&mut self, key: Key, frame: Frame, offset: u64) -> Result<(), ParseError> {
        if self.stack.len() >= self.max_depth {
            return Err(ParseError::new(
                offset,
                ParseErrorKind::DepthLimitExceeded(self.max_depth),
            ));
        }
        if !self.stack.is_empty() {
            self.path.push(key);
        }
        self.stack.push(frame);
        Ok(())
    }

    fn close<S>(&mut self, sink: &mut S)
    where
        S: ValueSink + ?Sized,
    {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        let key = if self.stack.is_empty() {
            Key::Root
        } else {
            self.path.pop().unwrap_or(Key::Root)
        };
        self.deliver(key, frame.into_value(), sink);
    }

    fn deliver<S>(&mut self, key: Key, value: Value, sink: &mut S)
    where
        S: ValueSink + ?Sized,
    {
        match self.stack.last_mut() {
            None => {
                sink.on_value(ValueEvent {
                    path: &self.path,
                    key: &key,
                    parent: Parent::Root,
                    value,
                });
                self.root_done = true;
            }
            Some(Frame::Object { map, state, .. }) => {
                let kept = sink.on_value(ValueEvent {
                    path: &self.path,
                    key: &key,
                    parent: Parent::Object(map),
                    value,
                });
                if let (Some(value), Key::Field(name)) = (kept, key) {
                    map.insert(name, value);
                }
                *state = ObjectState::CommaOrEnd;
            }
            Some(Frame::Array { items, state, .. }) => {
                let kept = sink.on_value(ValueEvent {
                    path: &self.path,
                    key: &key,
                    parent: Parent::Array(items),
                    value,
                });
                if let Some(value) = kept {
                    items.push(value);
                }
                *state = ArrayState::CommaOrEnd;
            }
        }
    }
}

fn unexpected(token: &Token, offset: u64) -> ParseError {
    ParseError::new(offset, ParseErrorKind::UnexpectedToken(token.describe()))
}

/// Incremental JSON parser emitting one [`ValueEvent`] per completed value.
///
/// Events arrive bottom-up: a field's value is reported before the object holding it. Memory held
/// between chunks is the open container stack plus whatever the sink chose to retain.
pub struct JsonStreamParser {
    tokenizer: Tokenizer,
    assembler: Assembler,
}

impl JsonStreamParser {
    pub fn new(max_depth: usize) -> Self {
        Self {
            tokenizer: Tokenizer::new(),
            assembler: Assembler {
                stack: Vec::new(),
                path: Vec::new(),
                root_done: false,
                max_depth,
            },
        }
    }

    pub fn feed<S>(&mut self, chunk: &[u8], sink: &mut S) -> Result<(), ParseError>
    where
        S: ValueSink + ?Sized,
    {
        let assembler = &mut self.assembler;
        self.tokenizer
            .feed(chunk, |token, offset| assembler.push_token(token, offset, sink))
    }

    /// Signal end of input. Fails unless exactly one complete root value was seen.
    pub fn finish<S>(&mut self, sink: &mut S) -> Result<(), ParseError>
    where
        S: ValueSink + ?Sized,
    {
        let assembler = &mut self.assembler;
        self.tokenizer
            .finish(|token, offset| assembler.push_token(token, offset, sink))?;

        if !self.assembler.root_done || !self.assembler.stack.is_empty() {
            return Err(ParseError::new(
                self.tokenizer.offset(),
                ParseErrorKind::UnexpectedEnd,
            ));
        }
        Ok(())
    }

    pub fn bytes_consumed(&self) -> u64 {
        self.tokenizer.offset()
    }

    /// Current nesting depth of open containers.
    pub fn depth(&self) -> usize {
        self.assembler.stack.len()
    }
}
