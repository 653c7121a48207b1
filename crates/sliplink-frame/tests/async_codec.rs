#![cfg(feature = "async")]

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use sliplink_frame::{FrameConfig, FrameError, SlipCodec};
use tokio::io::AsyncWriteExt;
use tokio_util::codec::{FramedRead, FramedWrite};

#[tokio::test]
async fn framed_roundtrip_over_duplex() {
    let (client, server) = tokio::io::duplex(64);
    let mut sink = FramedWrite::new(client, SlipCodec::new());
    let mut stream = FramedRead::new(server, SlipCodec::new());

    let sent = vec![
        Bytes::from_static(b"\xC0\xDB"),
        Bytes::from_static(b""),
        Bytes::from_static(b"plain"),
    ];
    for datagram in sent.clone() {
        sink.send(datagram).await.unwrap();
    }
    drop(sink);

    let mut got = Vec::new();
    while let Some(item) = stream.next().await {
        got.push(item.unwrap());
    }
    assert_eq!(
        got,
        vec![Bytes::from_static(b"\xC0\xDB"), Bytes::from_static(b"plain")]
    );
}

#[tokio::test]
async fn fragmented_writes_reassemble() {
    let (mut client, server) = tokio::io::duplex(8);
    let mut stream = FramedRead::new(server, SlipCodec::new());

    let writer = tokio::spawn(async move {
        for piece in [&b"\xC0"[..], b"A", b"B\xC0", b"\xC0C", b"\xC0"] {
            client.write_all(piece).await.unwrap();
            tokio::task::yield_now().await;
        }
    });

    assert_eq!(stream.next().await.unwrap().unwrap().as_ref(), b"AB");
    assert_eq!(stream.next().await.unwrap().unwrap().as_ref(), b"C");
    writer.await.unwrap();
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn overflow_surfaces_as_error() {
    let input: &[u8] = b"\xC0this frame never ends";
    let codec = SlipCodec::with_config(&FrameConfig::with_max_buffer_size(8));
    let mut stream = FramedRead::new(input, codec);

    let first = stream.next().await.unwrap();
    assert!(matches!(first, Err(FrameError::BufferOverflow { .. })));
}
