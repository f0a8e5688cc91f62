//! Size-limited downloads with transparent gzip decoding.

use super::{CallContext, HttpRequester, RequestError};
use bytes::{Buf, Bytes};
use flate2::write::GzDecoder;
use reqwest::header::CONTENT_ENCODING;
use reqwest::{Response, StatusCode};
use std::io::Write;
use std::path::Path;
use tokio::io::AsyncWriteExt;

const LOG_TARGET: &str = "  download";

/// Compressed bytes handed to the inflater per step.
///
/// Deflate expands at most about 1032:1, so one step yields at most about 16 KiB
/// on top of the 32 KiB flate2 keeps buffered internally.
const INFLATE_STEP: usize = 16;

/// Upper bound of a single decoded block.
const MAX_BLOCK: usize = 64 * 1024;

/// Decodes a response body according to its `Content-Encoding`.
///
/// Chunks go in through [`feed`](Self::feed) and come out again in blocks of at most
/// [`MAX_BLOCK`] bytes, so the size limit is checked before a compressed chunk is
/// inflated any further.
struct BodyDecoder {
    pending: Bytes,
    gzip: Option<GzDecoder<Vec<u8>>>,
}

impl BodyDecoder {
    fn for_response(response: &Response) -> Self {
        let gzip = response
            .headers()
            .get_all(CONTENT_ENCODING)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .any(|encoding| matches!(encoding.trim().to_ascii_lowercase().as_str(), "gzip" | "x-gzip"));

        Self::new(gzip)
    }

    fn new(gzip: bool) -> Self {
        Self {
            pending: Bytes::new(),
            gzip: gzip.then(|| GzDecoder::new(Vec::with_capacity(MAX_BLOCK))),
        }
    }

    /// Queue the next body chunk; the previous one must have been drained.
    fn feed(&mut self, chunk: Bytes) {
        debug_assert!(self.pending.is_empty(), "previous chunk not drained");
        self.pending = chunk;
    }

    /// The next decoded block of the queued chunk, `None` once it is used up.
    fn next_block(&mut self) -> std::io::Result<Option<Bytes>> {
        let Some(decoder) = &mut self.gzip else {
            if self.pending.is_empty() {
                return Ok(None);
            }
            let len = self.pending.len().min(MAX_BLOCK);
            return Ok(Some(self.pending.split_to(len)));
        };

        while !self.pending.is_empty() && decoder.get_ref().len() < MAX_BLOCK / 2 {
            let step = self.pending.len().min(INFLATE_STEP);
            let consumed = decoder.write(&self.pending[..step])?;
            if consumed == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "unexpected data after the end of the gzip stream",
                ));
            }
            self.pending.advance(consumed);
        }

        Ok(take_block(decoder))
    }

    /// Whatever the inflater still holds once the body has ended.
    fn finish(&mut self) -> std::io::Result<Option<Bytes>> {
        match &mut self.gzip {
            None => Ok(None),
            Some(decoder) => {
                decoder.try_finish()?;
                Ok(take_block(decoder))
            }
        }
    }
}

fn take_block(decoder: &mut GzDecoder<Vec<u8>>) -> Option<Bytes> {
    let out = decoder.get_mut();
    if out.is_empty() {
        None
    } else {
        Some(Bytes::from(core::mem::replace(out, Vec::with_capacity(MAX_BLOCK))))
    }
}

/// Destination of a streamed body.
enum Sink<'a> {
    Memory(&'a mut Vec<u8>),
    File(&'a mut tokio::fs::File),
}

impl Sink<'_> {
    async fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
        match self {
            Self::Memory(buf) => {
                buf.extend_from_slice(data);
                Ok(())
            }
            Self::File(file) => file.write_all(data).await,
        }
    }
}

/// Downloads resources through an [`HttpRequester`].
#[derive(Debug, Clone)]
pub struct Downloader {
    requester: HttpRequester,
    ok_codes: Vec<StatusCode>,
}

impl Downloader {
    /// Create a downloader that accepts only `200 OK`.
    #[must_use]
    pub fn new(requester: HttpRequester) -> Self {
        Self {
            requester,
            ok_codes: vec![StatusCode::OK],
        }
    }

    /// Replace the list of status codes treated as success.
    #[must_use]
    pub fn with_ok_codes(mut self, ok_codes: impl IntoIterator<Item = StatusCode>) -> Self {
        self.ok_codes = ok_codes.into_iter().collect();
        self
    }

    #[must_use]
    pub fn ok_codes(&self) -> &[StatusCode] {
        &self.ok_codes
    }

    #[must_use]
    pub const fn requester(&self) -> &HttpRequester {
        &self.requester
    }

    /// Download `url` into memory.
    ///
    /// With `max_size` set, the decoded body may not exceed that many bytes.
    pub async fn download_content(&self, ctx: &CallContext, url: &str, max_size: Option<u64>) -> Result<Bytes, RequestError> {
        let response = self.open(ctx, url, max_size).await?;

        let mut buf = Vec::new();
        let _ = stream_body(ctx, response, max_size, &mut Sink::Memory(&mut buf)).await?;
        Ok(Bytes::from(buf))
    }

    /// Download `url` into the file at `path`, returning the number of bytes written.
    ///
    /// The file is removed again if anything fails after it was created.
    pub async fn download_file(&self, ctx: &CallContext, url: &str, path: &Path, max_size: Option<u64>) -> Result<u64, RequestError> {
        let response = self.open(ctx, url, max_size).await?;

        let mut file = tokio::fs::File::create(path).await?;
        let result = async {
            let written = stream_body(ctx, response, max_size, &mut Sink::File(&mut file)).await?;
            file.flush().await?;
            Ok::<_, RequestError>(written)
        }
        .await;

        if result.is_err() {
            drop(file);
            if let Err(e) = tokio::fs::remove_file(path).await {
                log::warn!(target: LOG_TARGET, "unable to remove partial download '{}': {e}", path.display());
            }
        }

        result
    }

    /// Send the request and run the checks that need no body bytes.
    async fn open(&self, ctx: &CallContext, url: &str, max_size: Option<u64>) -> Result<Response, RequestError> {
        log::debug!(target: LOG_TARGET, "downloading {url}");

        let response = self.requester.get(ctx, url).await?;

        let status = response.status();
        if !self.ok_codes.contains(&status) {
            return Err(RequestError::from_status(status));
        }

        if let (Some(limit), Some(size)) = (max_size, response.content_length())
            && size > limit
        {
            return Err(RequestError::ContentTooLarge { size: Some(size), limit });
        }

        Ok(response)
    }
}

/// Copy the decoded body into `sink`, aborting as soon as it grows beyond `max_size`.
async fn stream_body(ctx: &CallContext, mut response: Response, max_size: Option<u64>, sink: &mut Sink<'_>) -> Result<u64, RequestError> {
    let mut decoder = BodyDecoder::for_response(&response);
    let mut written: u64 = 0;

    while let Some(chunk) = ctx.run(response.chunk()).await?.map_err(RequestError::Transport)? {
        decoder.feed(chunk);
        while let Some(block) = decoder.next_block()? {
            accept(sink, &block, &mut written, max_size).await?;
        }
    }

    if let Some(tail) = decoder.finish()? {
        accept(sink, &tail, &mut written, max_size).await?;
    }

    Ok(written)
}

async fn accept(sink: &mut Sink<'_>, data: &[u8], written: &mut u64, max_size: Option<u64>) -> Result<(), RequestError> {
    *written += data.len() as u64;
    if let Some(limit) = max_size
        && *written > limit
    {
        return Err(RequestError::ContentTooLarge { size: None, limit });
    }

    sink.write(data).await?;
    Ok(())
}
