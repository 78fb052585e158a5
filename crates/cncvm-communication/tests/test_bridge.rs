use cncvm_communication::{
    bridge, Communicator, ConnectionParams, StreamConfig, StreamOutcome, Streamer,
};
use std::sync::{Arc, Mutex};

/// Blocking controller that acknowledges every complete line
struct AckingCommunicator {
    received: Arc<Mutex<Vec<u8>>>,
    pending: usize,
    connected: bool,
}

impl Communicator for AckingCommunicator {
    fn connect(&mut self, _params: &ConnectionParams) -> cncvm_core::Result<()> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> cncvm_core::Result<()> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn send(&mut self, data: &[u8]) -> cncvm_core::Result<usize> {
        self.pending += data.iter().filter(|&&b| b == b'\n').count();
        self.received.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn receive(&mut self) -> cncvm_core::Result<Vec<u8>> {
        if !self.connected {
            return Err(cncvm_core::ConnectionError::ConnectionLost {
                reason: "closed".to_string(),
            }
            .into());
        }
        let reply = "ok\n".repeat(self.pending);
        self.pending = 0;
        Ok(reply.into_bytes())
    }

    fn connection_params(&self) -> Option<&ConnectionParams> {
        None
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stream_through_bridge() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let controller = AckingCommunicator {
        received: Arc::clone(&received),
        pending: 0,
        connected: true,
    };

    let stream = bridge(controller).unwrap();
    let lines: Vec<String> = (0..40).map(|i| format!("G1 X{} Y{}", i, i * 2)).collect();

    let streamer = Streamer::new(StreamConfig { buffer_size: 64 });
    let outcome = streamer.stream(stream, &lines).await.unwrap();
    assert_eq!(outcome, StreamOutcome::Completed { acknowledged: 40 });

    let text = String::from_utf8(received.lock().unwrap().clone()).unwrap();
    let expected: String = lines.iter().map(|l| format!("{}\n", l)).collect();
    assert_eq!(text, expected);
}

#[test]
fn test_bridge_needs_runtime() {
    let controller = AckingCommunicator {
        received: Arc::new(Mutex::new(Vec::new())),
        pending: 0,
        connected: true,
    };
    assert!(bridge(controller).is_err());
}
