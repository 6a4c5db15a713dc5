//! A source and a sink paired over the loopback network.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use netcam_core::{
    Bus, DeviceError, Envelope, Header, PeerId, Role, Route, SinkConfig, SourceConfig,
    TimerSettings,
};
use netcam_sink::{Caption, Display, FrameView, Viewer};
use netcam_source::{Capture, FrameRef, Streamer};
use netcam_transport::{drive, LoopbackBus, LoopbackNetwork};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const SOURCE: PeerId = 1_001;
const SINK: PeerId = 2_002;

struct PatternCamera {
    len: usize,
    frame: Option<Vec<u8>>,
}

impl PatternCamera {
    fn new(len: usize) -> Self {
        Self { len, frame: None }
    }
}

impl Capture for PatternCamera {
    fn capture(&mut self, _quality: u8) -> Result<(), DeviceError> {
        self.frame = Some((0..self.len).map(|i| (i % 256) as u8).collect());
        Ok(())
    }

    fn frame(&self) -> Option<FrameRef<'_>> {
        self.frame.as_deref().map(|bytes| FrameRef {
            bytes,
            width: 320,
            height: 240,
        })
    }
}

#[derive(Default)]
struct Screen {
    titles: Vec<String>,
    frames: Vec<Vec<u8>>,
}

#[derive(Clone, Default)]
struct SharedScreen(Arc<Mutex<Screen>>);

impl Display for SharedScreen {
    fn reinit(&mut self, title: &str, _w: u32, _h: u32, _fps: u32) -> Result<(), DeviceError> {
        self.0.lock().unwrap().titles.push(title.to_owned());
        Ok(())
    }

    fn render(&mut self, frame: FrameView<'_>, _caption: &Caption) -> Result<Option<char>, DeviceError> {
        self.0.lock().unwrap().frames.push(frame.bytes.to_vec());
        Ok(None)
    }

    fn hide(&mut self) {}
}

fn drain(rx: &mut mpsc::Receiver<Envelope>) -> Vec<Envelope> {
    let mut out = Vec::new();
    while let Ok(envelope) = rx.try_recv() {
        out.push(envelope);
    }
    out
}

#[test]
fn heartbeat_grants_credit_and_frame_is_chunked() {
    let network = LoopbackNetwork::new();
    let (source_bus, mut source_rx) = network.attach(SOURCE, 16);
    let mut source_bus = source_bus
        .with_timer(TimerSettings::new(0, 100))
        .with_payload_capacity(1_024);
    assert_eq!(source_bus.id(), SOURCE);
    let (mut sink_bus, mut sink_rx) = network.attach(SINK, 256);

    let mut camera = PatternCamera::new(130_000);
    camera.capture(60).unwrap();
    let mut source = Streamer::new(SOURCE, SourceConfig::default(), Box::new(camera));

    // heartbeat(seq=5) asking for 10 frames
    let header = Header::for_route(Route::PairingRequest, SINK, SOURCE, 5);
    let mut heartbeat = sink_bus.create_envelope(header);
    heartbeat.put_u32(10).unwrap();
    sink_bus.send(heartbeat).unwrap();

    for envelope in drain(&mut source_rx) {
        source.on_envelope(envelope, &mut source_bus);
    }
    assert_eq!(source.peer().id, SINK);
    assert_eq!(source.peer().frames, 10);

    let ack = drain(&mut sink_rx);
    assert_eq!(ack.len(), 1);
    assert_eq!(ack[0].route(), Route::PairingAck);
    assert_eq!(ack[0].header().sequence, 5);
    assert_eq!(ack[0].get_u32(0).unwrap(), 10);

    source.on_tick(&mut source_bus).unwrap();

    let burst = drain(&mut sink_rx);
    assert_eq!(burst.len(), 128);
    assert_eq!(burst[0].route(), Route::FrameMetadata);
    assert_eq!(burst[0].get_u32(0).unwrap(), 130_000);
    assert_eq!(burst.iter().filter(|e| e.route() == Route::FrameData).count(), 127);
    let total: usize = burst[1..].iter().map(Envelope::payload_len).sum();
    assert_eq!(total, 130_000);
    assert_eq!(source.peer().frames, 9);
}

/// Both roles on one network with their buses and inboxes.
struct Pair {
    source: Streamer,
    source_bus: LoopbackBus,
    source_rx: mpsc::Receiver<Envelope>,
    sink: Viewer,
    sink_bus: LoopbackBus,
    sink_rx: mpsc::Receiver<Envelope>,
}

impl Pair {
    /// Deliver everything queued, source side first.
    fn pump(&mut self) {
        for envelope in drain(&mut self.source_rx) {
            self.source.on_envelope(envelope, &mut self.source_bus);
        }
        for envelope in drain(&mut self.sink_rx) {
            self.sink.on_envelope(envelope, &mut self.sink_bus);
        }
    }
}

#[test]
fn sink_pairs_and_reassembles_through_roles() {
    let network = LoopbackNetwork::new();
    let (source_bus, source_rx) = network.attach(SOURCE, 64);
    let (sink_bus, sink_rx) = network.attach(SINK, 64);
    let screen = SharedScreen::default();
    let mut pair = Pair {
        source: Streamer::new(SOURCE, SourceConfig::default(), Box::new(PatternCamera::new(3_000))),
        source_bus: source_bus.with_timer(TimerSettings::new(0, 100)),
        source_rx,
        sink: Viewer::new(SINK, SOURCE, SinkConfig::default(), Box::new(screen.clone())),
        sink_bus: sink_bus.with_timer(TimerSettings::new(0, 1_000)),
        sink_rx,
    };

    // first heartbeat asks for nothing but binds the frame rate
    pair.sink.on_tick(&mut pair.sink_bus).unwrap();
    pair.pump();
    assert_eq!(pair.sink.window().source(), SOURCE);
    assert_eq!(pair.sink.window().frame_rate(), 10);

    // second heartbeat: round(10 × 1000 / 825) = 12 frames
    pair.sink.on_tick(&mut pair.sink_bus).unwrap();
    pair.pump();
    assert_eq!(pair.source.peer().frames, 12);

    for _ in 0..4 {
        pair.source.on_tick(&mut pair.source_bus).unwrap();
        pair.pump();
    }

    // tick 1 only captures; ticks 2..4 send; the last frame waits for the next metadata
    let screen = screen.0.lock().unwrap();
    assert_eq!(screen.titles, vec!["Stream 1001 [320 x 240] @10 frames/s"]);
    assert_eq!(screen.frames.len(), 2);
    assert!(screen.frames.iter().all(|frame| frame.len() == 3_000));
    assert_eq!(pair.source.peer().frames, 9);
}

#[tokio::test(start_paused = true)]
async fn driven_roles_stream_until_cancelled() {
    let network = LoopbackNetwork::new();
    let (source_bus, source_rx) = network.attach(SOURCE, 64);
    let (sink_bus, sink_rx) = network.attach(SINK, 64);
    let source_bus = source_bus.with_timer(TimerSettings::new(0, 100));
    let sink_bus = sink_bus.with_timer(TimerSettings::new(0, 1_000));

    let screen = SharedScreen::default();
    let cancel = CancellationToken::new();

    let source = Streamer::new(SOURCE, SourceConfig::default(), Box::new(PatternCamera::new(2_500)));
    let sink = Viewer::new(SINK, SOURCE, SinkConfig::default(), Box::new(screen.clone()));

    let source_task = tokio::spawn(run(source, source_bus, source_rx, cancel.clone()));
    let sink_task = tokio::spawn(run(sink, sink_bus, sink_rx, cancel.clone()));

    tokio::time::sleep(Duration::from_millis(3_050)).await;
    cancel.cancel();
    let source = source_task.await.unwrap();
    let sink = sink_task.await.unwrap();

    assert_eq!(sink.window().source(), SOURCE);
    assert_eq!(source.peer().id, SINK);
    let screen = screen.0.lock().unwrap();
    assert_eq!(screen.titles.len(), 1);
    assert!(screen.frames.len() >= 10, "rendered {}", screen.frames.len());
    assert!(screen.frames.iter().all(|frame| frame.len() == 2_500));
}

async fn run<R: Role, B: Bus>(
    mut role: R,
    mut bus: B,
    mut inbound: mpsc::Receiver<Envelope>,
    cancel: CancellationToken,
) -> R {
    drive(&mut role, &mut bus, &mut inbound, &cancel).await.unwrap();
    role
}
