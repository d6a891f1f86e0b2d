// Chunked JSON streaming utilities for the explore endpoint
use crate::application::drilldown::ExplorerEvent;
use crate::infrastructure::wire::{event_to_wire, WireEvent};
use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use axum::response::IntoResponse;
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::Stream;
use futures::StreamExt;
use async_compression::tokio::bufread::BrotliEncoder;
use tokio::io::AsyncReadExt;

/// Create a chunked streaming response of length-prefixed JSON events.
pub async fn chunked_event_stream<S>(
    stream: S,
    compress: bool,
) -> Result<Response<Body>, StatusCode>
where
    S: Stream<Item = WireEvent> + Send + 'static,
{
    let byte_stream = stream.then(move |event| async move { serialize_chunk(event, compress).await });

    let body = Body::from_stream(byte_stream);

    // No Content-Encoding header: individual chunks are compressed, not the
    // HTTP response, and clients must not decompress the stream as a whole.
    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::TRANSFER_ENCODING, "chunked");

    response
        .body(body)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Serialize a single event to a length-prefixed chunk.
async fn serialize_chunk(event: WireEvent, compress: bool) -> Result<Bytes, std::io::Error> {
    let buffer = serde_json::to_vec(&event).map_err(std::io::Error::other)?;

    let payload = if compress {
        let cursor = std::io::Cursor::new(buffer);
        let mut encoder = BrotliEncoder::new(cursor);
        let mut compressed = Vec::new();
        encoder.read_to_end(&mut compressed).await?;
        compressed
    } else {
        buffer
    };

    // 4-byte big-endian length prefix before each payload
    let length = payload.len() as u32;
    let mut chunk = BytesMut::with_capacity(4 + payload.len());
    chunk.put_u32(length);
    chunk.put_slice(&payload);

    Ok(chunk.freeze())
}

/// Bridge an explorer event receiver into a streaming response.
pub async fn stream_from_receiver(
    mut rx: tokio::sync::mpsc::Receiver<ExplorerEvent>,
    compress: bool,
) -> impl IntoResponse {
    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield event_to_wire(event);
        }
    };

    match chunked_event_stream(stream, compress).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_chunk_has_length_prefix() {
        let chunk = serialize_chunk(WireEvent::Closed, false).await.unwrap();
        let length = u32::from_be_bytes(chunk[..4].try_into().unwrap()) as usize;
        assert_eq!(length, chunk.len() - 4);
        let value: serde_json::Value = serde_json::from_slice(&chunk[4..]).unwrap();
        assert_eq!(value["type"], "closed");
    }

    #[tokio::test]
    async fn test_compressed_chunk_prefix_matches_payload() {
        let chunk = serialize_chunk(WireEvent::Closed, true).await.unwrap();
        let length = u32::from_be_bytes(chunk[..4].try_into().unwrap()) as usize;
        assert_eq!(length, chunk.len() - 4);
    }
}
