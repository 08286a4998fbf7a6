//! Tests d'intégration du pipeline générique (source → sink) et du
//! Broadcaster de fan-out.

use async_trait::async_trait;
use bytes::Bytes;
use radio_audio::pipeline::{AudioPipelineNode, Node, NodeLogic, StopReason};
use radio_audio::{AudioError, Broadcaster, Received};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct CountingSource {
    chunks: usize,
}

#[async_trait]
impl NodeLogic for CountingSource {
    async fn process(
        &mut self,
        _input: Option<mpsc::Receiver<Bytes>>,
        output: Vec<mpsc::Sender<Bytes>>,
        stop_token: CancellationToken,
    ) -> Result<(), AudioError> {
        for i in 0..self.chunks {
            if stop_token.is_cancelled() {
                break;
            }
            let chunk = Bytes::from(vec![i as u8; 4]);
            for tx in &output {
                let _ = tx.send(chunk.clone()).await;
            }
        }
        Ok(())
    }
}

struct CollectingSink {
    received: Arc<Mutex<Vec<Bytes>>>,
    cleanup_reason: Arc<Mutex<Option<String>>>,
}

#[async_trait]
impl NodeLogic for CollectingSink {
    async fn process(
        &mut self,
        input: Option<mpsc::Receiver<Bytes>>,
        _output: Vec<mpsc::Sender<Bytes>>,
        stop_token: CancellationToken,
    ) -> Result<(), AudioError> {
        let mut rx = input.expect("sink needs input");
        loop {
            tokio::select! {
                _ = stop_token.cancelled() => break,
                chunk = rx.recv() => match chunk {
                    Some(chunk) => self.received.lock().unwrap().push(chunk),
                    None => break,
                }
            }
        }
        Ok(())
    }

    async fn cleanup(&mut self, reason: StopReason) -> Result<(), AudioError> {
        let label = match reason {
            StopReason::Completed => "completed",
            StopReason::Cancelled => "cancelled",
            StopReason::ChildFinished => "child_finished",
            StopReason::Error(_) => "error",
        };
        *self.cleanup_reason.lock().unwrap() = Some(label.to_string());
        Ok(())
    }
}

#[tokio::test]
async fn source_to_sink_delivers_every_chunk_and_runs_cleanup() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let cleanup_reason = Arc::new(Mutex::new(None));

    let mut source = Node::new_source(CountingSource { chunks: 5 });
    let sink = Node::new_with_input(
        CollectingSink {
            received: received.clone(),
            cleanup_reason: cleanup_reason.clone(),
        },
        10,
    );

    source.register(Box::new(sink));

    Box::new(source)
        .start()
        .wait()
        .await
        .expect("pipeline should finish cleanly");

    assert_eq!(received.lock().unwrap().len(), 5);
    assert_eq!(cleanup_reason.lock().unwrap().as_deref(), Some("completed"));
}

#[tokio::test]
async fn stop_cancels_the_running_pipeline() {
    struct Forever;

    #[async_trait]
    impl NodeLogic for Forever {
        async fn process(
            &mut self,
            _input: Option<mpsc::Receiver<Bytes>>,
            _output: Vec<mpsc::Sender<Bytes>>,
            stop_token: CancellationToken,
        ) -> Result<(), AudioError> {
            stop_token.cancelled().await;
            Ok(())
        }
    }

    let source = Node::new_source(Forever);
    let handle = Box::new(source).start();

    handle.stop(None);
    handle.wait().await.expect("cancelled pipeline returns Ok");
}

#[tokio::test]
async fn broadcaster_delivers_to_all_subscribers_independently() {
    let broadcaster = Broadcaster::new(4);
    let mut sub1 = broadcaster.subscribe();
    let mut sub2 = broadcaster.subscribe();

    broadcaster.publish(Bytes::from_static(b"hello"));

    assert!(matches!(sub1.recv().await, Received::Chunk(c) if c == Bytes::from_static(b"hello")));
    assert!(matches!(sub2.recv().await, Received::Chunk(c) if c == Bytes::from_static(b"hello")));
}
