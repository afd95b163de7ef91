use std::error::Error as StdError;
#[cfg(feature = "fs")]
use std::path::Path;

use futures::{pin_mut, Stream, StreamExt};
use ips_core::{IpsDocument, IpsError, IpsResult, LoadConfig, ParseError};
#[cfg(feature = "fs")]
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::parser::JsonStreamParser;
use crate::reconstructor::DocumentBuilder;

/// Push-style Bundle parser: feed chunks as they arrive, then call [`finish`](Self::finish).
pub struct BundleStreamParser {
    parser: JsonStreamParser,
    builder: DocumentBuilder,
    chunks: u64,
}

impl BundleStreamParser {
    pub fn new(config: &LoadConfig) -> Self {
        Self {
            parser: JsonStreamParser::new(config.max_depth),
            builder: DocumentBuilder::new(),
            chunks: 0,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) -> Result<(), ParseError> {
        self.chunks += 1;
        self.parser.feed(chunk, &mut self.builder)
    }

    /// Resources captured so far.
    pub fn resources_seen(&self) -> usize {
        self.builder.document().resources.len()
    }

    pub fn finish(mut self) -> Result<IpsDocument, ParseError> {
        self.parser.finish(&mut self.builder)?;
        let document = self.builder.into_document();
        tracing::debug!(
            chunks = self.chunks,
            bytes = self.parser.bytes_consumed(),
            resources = document.resources.len(),
            sections = document.sections.len(),
            "bundle stream complete"
        );
        Ok(document)
    }
}

/// Parse a whole in-memory Bundle.
pub fn parse_slice(bytes: &[u8], config: &LoadConfig) -> IpsResult<IpsDocument> {
    let mut parser = BundleStreamParser::new(config);
    parser.push(bytes)?;
    Ok(parser.finish()?)
}

/// Parse from a synchronous chunk source. An `Err` item aborts with [`IpsError::Transport`].
pub fn parse_chunks<I, B, E>(chunks: I, config: &LoadConfig) -> IpsResult<IpsDocument>
where
    I: IntoIterator<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<Box<dyn StdError + Send + Sync>>,
{
    let mut parser = BundleStreamParser::new(config);
    for chunk in chunks {
        let chunk = chunk.map_err(IpsError::transport)?;
        parser.push(chunk.as_ref())?;
    }
    Ok(parser.finish()?)
}

/// Parse from an async chunk stream such as an HTTP response body.
pub async fn load_stream<S, B, E>(stream: S, config: &LoadConfig) -> IpsResult<IpsDocument>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<Box<dyn StdError + Send + Sync>>,
{
    pin_mut!(stream);
    let mut parser = BundleStreamParser::new(config);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| {
            let err = IpsError::transport(err);
            tracing::warn!(%err, resources = parser.resources_seen(), "chunk source failed");
            err
        })?;
        parser.push(chunk.as_ref())?;
    }
    Ok(parser.finish()?)
}

/// Parse from any async reader, reading `config.read_chunk_size` bytes at a time.
#[cfg(feature = "fs")]
pub async fn load_reader<R>(mut reader: R, config: &LoadConfig) -> IpsResult<IpsDocument>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; config.read_chunk_size.max(1)];
    let mut parser = BundleStreamParser::new(config);
    loop {
        let read = reader.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        parser.push(&buffer[..read])?;
    }
    Ok(parser.finish()?)
}

#[cfg(feature = "fs")]
pub async fn load_file(path: impl AsRef<Path>, config: &LoadConfig) -> IpsResult<IpsDocument> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "loading bundle file");
    let file = tokio::fs::File::open(path).await?;
    load_reader(file, config).await
}
