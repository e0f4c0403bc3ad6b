//! Newline-delimited JSON over a chunked byte stream.

use anyhow::{Context, Result};
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;

struct LineReader<S> {
    chunks: S,
    buf: Vec<u8>,
    done: bool,
}

fn take_line(buf: &mut Vec<u8>) -> Option<String> {
    let pos = buf.iter().position(|b| *b == b'\n')?;
    let line: Vec<u8> = buf.drain(..=pos).collect();
    Some(String::from_utf8_lossy(&line).trim().to_string())
}

/// Split a byte stream into non-empty, trimmed lines. A trailing line without
/// a newline is still yielded.
pub fn lines<S, B, E>(chunks: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = std::result::Result<B, E>> + Send + Unpin,
    B: AsRef<[u8]> + Send,
    E: Into<anyhow::Error> + Send,
{
    let reader = LineReader {
        chunks,
        buf: Vec::new(),
        done: false,
    };
    futures::stream::unfold(reader, |mut reader| async move {
        loop {
            while let Some(line) = take_line(&mut reader.buf) {
                if !line.is_empty() {
                    return Some((Ok(line), reader));
                }
            }
            if reader.done {
                if reader.buf.is_empty() {
                    return None;
                }
                let rest = std::mem::take(&mut reader.buf);
                let line = String::from_utf8_lossy(&rest).trim().to_string();
                if line.is_empty() {
                    return None;
                }
                return Some((Ok(line), reader));
            }
            match reader.chunks.next().await {
                Some(Ok(chunk)) => reader.buf.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    reader.done = true;
                    reader.buf.clear();
                    return Some((Err(e.into()), reader));
                }
                None => reader.done = true,
            }
        }
    })
}

/// Decode each line as `T`.
pub fn decode<T, S, B, E>(chunks: S) -> impl Stream<Item = Result<T>> + Send
where
    T: DeserializeOwned,
    S: Stream<Item = std::result::Result<B, E>> + Send + Unpin,
    B: AsRef<[u8]> + Send,
    E: Into<anyhow::Error> + Send,
{
    lines(chunks).map(|line| {
        let line = line?;
        serde_json::from_str(&line).with_context(|| format!("Malformed NDJSON line: {line}"))
    })
}
