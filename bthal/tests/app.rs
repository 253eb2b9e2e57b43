use bthal::{app, hal::BluetoothHal, native, rfcomm, Config, ErrorKind};
use std::{
    io,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    task::{Context, Poll},
    time::Duration,
};
use tokio::{
    io::{AsyncRead, BufReader, ReadBuf},
    sync::oneshot,
};

mod common;
use common::{config, console, MockHal};

/// Console input counting read attempts.
struct TrackedInput {
    data: &'static [u8],
    reads: Arc<AtomicUsize>,
}

impl TrackedInput {
    fn new(data: &'static str) -> (BufReader<Self>, Arc<AtomicUsize>) {
        let reads = Arc::new(AtomicUsize::new(0));
        (BufReader::new(Self { data: data.as_bytes(), reads: reads.clone() }), reads)
    }
}

impl AsyncRead for TrackedInput {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Pin::new(&mut self.data).poll_read(cx, buf)
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn load_failure_exits_before_reading_input() {
    let pid_file = std::env::temp_dir().join(format!("bthal-test-{}.pid", std::process::id()));
    std::fs::write(&pid_file, "1").unwrap();
    let config = Config { library: "libbthal-missing.so".into(), pid_file: pid_file.clone(), ..config() };
    let (console, transcript) = console();
    let (input, reads) = TrackedInput::new("help\nquit\n");
    let started = AtomicBool::new(false);

    let start = |hal| {
        started.store(true, Ordering::SeqCst);
        rfcomm::start(hal, &config, console.clone())
    };
    let err = app::launch(native::load(&config), &config, &console, start, input).await.unwrap_err();

    assert!(matches!(err.kind, ErrorKind::LibraryNotFound(_)));
    assert!(!started.load(Ordering::SeqCst));
    assert_eq!(reads.load(Ordering::SeqCst), 0);
    assert!(!pid_file.exists());
    assert_eq!(transcript.count(":: Bluedroid test app starting"), 1);
    assert!(transcript.contents().contains("HAL failed to initialize, exit: failed to load Bluetooth library"));
    assert_eq!(transcript.count("loaded HAL Success"), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn quit_ends_session_and_unloads_once() {
    let hal = Arc::new(MockHal::new());
    let loaded: Arc<dyn BluetoothHal> = hal.clone();
    let config = config();
    let (console, transcript) = console();
    let (input, _reads) = TrackedInput::new("help\nquit\nrfcomm\n");

    let start = |hal| rfcomm::start(hal, &config, console.clone());
    app::launch(Ok(loaded), &config, &console, start, input).await.unwrap();

    assert_eq!(hal.unloads(), 1);
    assert_eq!(transcript.count("shutdown bdroid test app"), 1);
    assert_eq!(transcript.count("rfcomm client"), 0);
    assert!(hal.rfcomm().unwrap().calls().is_empty());

    let contents = transcript.contents();
    let lines: Vec<_> = contents.lines().map(|l| l.trim_start_matches('>')).collect();
    let tail = &lines[lines.len() - 3..];
    assert_eq!(tail, ["Unloading HAL lib", "HAL library unloaded", ":: Bluedroid test app terminating"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn end_of_input_ends_session() {
    let hal = Arc::new(MockHal::new());
    let loaded: Arc<dyn BluetoothHal> = hal.clone();
    let config = config();
    let (console, transcript) = console();
    let (input, _reads) = TrackedInput::new("rfcomm\n");

    let start = |hal| rfcomm::start(hal, &config, console.clone());
    app::launch(Ok(loaded), &config, &console, start, input).await.unwrap();

    assert_eq!(hal.rfcomm().unwrap().calls(), ["rdut_rfcomm Client"]);
    assert_eq!(hal.unloads(), 1);
    assert_eq!(transcript.count(":: Bluedroid test app terminating"), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn blank_lines_are_skipped() {
    let hal = Arc::new(MockHal::new());
    let loaded: Arc<dyn BluetoothHal> = hal.clone();
    let config = config();
    let (console, transcript) = console();
    let (input, _reads) = TrackedInput::new("\n   \r\n\nquit\n");

    let start = |hal| rfcomm::start(hal, &config, console.clone());
    app::launch(Ok(loaded), &config, &console, start, input).await.unwrap();

    assert!(!transcript.contents().contains("unknown command"));
    assert_eq!(transcript.count("shutdown bdroid test app"), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_start_still_unloads() {
    let hal = Arc::new(MockHal::new().without_vendor());
    let loaded: Arc<dyn BluetoothHal> = hal.clone();
    let config = config();
    let (console, transcript) = console();
    let (input, reads) = TrackedInput::new("help\n");

    let start = |hal| rfcomm::start(hal, &config, console.clone());
    let err = app::launch(Ok(loaded), &config, &console, start, input).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::VendorInterfaceNotFound);
    assert_eq!(reads.load(Ordering::SeqCst), 0);
    assert_eq!(hal.unloads(), 1);
    assert_eq!(transcript.count("HAL library unloaded"), 1);
    assert_eq!(transcript.count(":: Bluedroid test app terminating"), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_abandons_pending_read() {
    let hal = Arc::new(MockHal::new());
    let (console, _transcript) = console();
    let d = rfcomm::start(hal.clone(), &config(), console).await.unwrap();
    // Nothing is ever written, so reading never completes.
    let (_writer, reader) = tokio::io::duplex(64);
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let served = tokio::spawn(async move {
        app::serve_until(&d, BufReader::new(reader), async {
            let _ = stop_rx.await;
        })
        .await
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!served.is_finished());

    stop_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), served).await.unwrap().unwrap().unwrap();
    assert!(hal.rfcomm().unwrap().calls().is_empty());
}
