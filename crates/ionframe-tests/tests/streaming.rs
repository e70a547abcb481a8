//! The async driver against the synchronous reader, over a pipe that only
//! carries a few bytes at a time.

use ionframe_decoder::{BufferConfig, DecodeError, StreamingReader, TopLevelValue};
use ionframe_tests::{golden, read_whole, recording_config, render};
use tokio::io::AsyncWriteExt;

async fn stream_through_pipe(
    bytes: Vec<u8>,
    pipe_capacity: usize,
    config: BufferConfig,
) -> Vec<Result<TopLevelValue, DecodeError>> {
    let (mut writer, reader) = tokio::io::duplex(pipe_capacity);
    let feeder = tokio::spawn(async move {
        writer.write_all(&bytes).await.unwrap();
        writer.shutdown().await.unwrap();
    });

    let mut stream = StreamingReader::new(reader, config);
    let mut results = Vec::new();
    while let Some(result) = stream.next().await {
        results.push(result);
    }
    feeder.await.unwrap();
    results
}

#[tokio::test]
async fn golden_streams_match_the_sync_reader() {
    for fixture in ["padded_values", "symbol_tables", "padded_symbol_table"] {
        let bytes = golden(fixture);
        let expected = read_whole(&bytes, BufferConfig::default()).unwrap();
        let streamed: Vec<TopLevelValue> = stream_through_pipe(bytes, 5, BufferConfig::default())
            .await
            .into_iter()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(render(&streamed), render(&expected), "{fixture}");
    }
}

#[tokio::test]
async fn bounded_stream_skips_the_oversized_value() {
    let (config, recorder) = recording_config(8, 8);
    let results = stream_through_pipe(golden("oversized_value"), 3, config).await;
    assert_eq!(results.len(), 1);
    let value = results.into_iter().next().unwrap().unwrap();
    assert_eq!(value.bytes, vec![0x21, 0x01]);
    assert_eq!(recorder.events().oversized_values, 1);
}

#[tokio::test]
async fn stream_ending_inside_padding_yields_one_error() {
    let results = stream_through_pipe(golden("truncated_pad"), 4, BufferConfig::default()).await;
    assert_eq!(results.len(), 1);
    assert!(matches!(results[0], Err(DecodeError::NopPadTooShort { missing: 1 })));
}
