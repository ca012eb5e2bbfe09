//! End-to-end behavior of an S4 monitor over a mock transport.

use std::time::Duration;

use rowlib_core::{Error, MonitorEvent, StrokeEvent};
use rowlib_s4::{S4Builder, S4Monitor, Units};
use rowlib_test_harness::{MockHandle, MockTransport};

fn init_mock() -> MockTransport {
    let mut mock = MockTransport::new();
    mock.expect(b"USB\r\n", b"_WR_\r\n");
    mock.expect(b"DDME\r\n", b"");
    mock.expect(b"RESET\r\n", b"");
    mock
}

async fn connect(mock: MockTransport) -> (S4Monitor, MockHandle) {
    let handle = mock.handle();
    let monitor = S4Builder::new()
        .auto_refresh(false)
        .build_with_transport(Box::new(mock))
        .await
        .unwrap();
    (monitor, handle)
}

// ---------------------------------------------------------------------------
// Polling
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn poll_distance_padded_value() {
    let mut mock = init_mock();
    mock.expect(b"IRD055\r\n", b"IDD055000064\r\n");
    let (monitor, _handle) = connect(mock).await;

    let value = monitor
        .poll("distance", Duration::from_millis(200))
        .await
        .unwrap()
        .await
        .unwrap();
    assert_eq!(value, 100);
    assert_eq!(monitor.value("distance").unwrap(), Some(100));
}

#[tokio::test(start_paused = true)]
async fn request_speed_wire_bytes() {
    let mut mock = init_mock();
    mock.expect(b"IRD14A\r\n", b"");
    let (monitor, handle) = connect(mock).await;

    let _pending = monitor
        .poll("speed", Duration::from_millis(200))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(handle.remaining_expectations(), 0);
}

#[tokio::test(start_paused = true)]
async fn unanswered_poll_times_out_once() {
    let mut mock = init_mock();
    mock.expect(b"IRD055\r\n", b"");
    let (monitor, handle) = connect(mock).await;

    let poll = monitor
        .poll("distance", Duration::from_millis(200))
        .await
        .unwrap();
    let err = poll.await.unwrap_err();
    assert!(matches!(err, Error::PollTimeout(name) if name == "distance"));

    // A late reply updates state but has nobody left to fulfil.
    handle.push_line("IDD0550001");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(monitor.value("distance").unwrap(), Some(1));
}

#[tokio::test(start_paused = true)]
async fn poll_with_unbounded_timeout_keeps_monitor_alive() {
    let mut mock = init_mock();
    mock.expect(b"IRD055\r\n", b"");
    mock.expect(b"RESET\r\n", b"");
    let (monitor, handle) = connect(mock).await;
    let mut events = monitor.subscribe_events();

    let poll = monitor.poll("distance", Duration::MAX).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.push_line("IDD0550064");

    assert_eq!(poll.await.unwrap(), 100);
    assert!(monitor.is_open());
    assert!(events.try_recv().is_err());
    monitor.reset().await.unwrap();
    assert_eq!(handle.remaining_expectations(), 0);
}

#[tokio::test(start_paused = true)]
async fn padded_value_wider_than_slot_is_dropped() {
    let (monitor, handle) = connect(init_mock()).await;

    handle.push_line("IDS1A0FFFFFF");
    handle.push_line("IDS1A000003C");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(monitor.value("heart_rate").unwrap(), Some(0x3C));
}

#[tokio::test(start_paused = true)]
async fn one_reading_fulfils_every_poll_for_the_field() {
    let mut mock = init_mock();
    mock.expect(b"IRD14A\r\n", b"");
    mock.expect(b"IRD14A\r\n", b"");
    let (monitor, handle) = connect(mock).await;

    let first = monitor.poll("speed", Duration::from_secs(1)).await.unwrap();
    let second = monitor.poll("speed", Duration::from_secs(1)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(handle.remaining_expectations(), 0);

    handle.push_line("IDD14A00C8");
    assert_eq!(first.await.unwrap(), 200);
    assert_eq!(second.await.unwrap(), 200);
}

#[tokio::test(start_paused = true)]
async fn close_fails_outstanding_polls() {
    let mut mock = init_mock();
    mock.expect(b"IRD055\r\n", b"");
    mock.expect(b"IRD14A\r\n", b"");
    let (monitor, _handle) = connect(mock).await;

    let distance = monitor.poll("distance", Duration::from_secs(5)).await.unwrap();
    let speed = monitor.poll("speed", Duration::from_secs(5)).await.unwrap();

    monitor.close().await.unwrap();
    assert!(matches!(distance.await, Err(Error::Disconnected)));
    assert!(matches!(speed.await, Err(Error::Disconnected)));
    assert!(!monitor.is_open());
}

#[tokio::test(start_paused = true)]
async fn poll_after_close_fails() {
    let (monitor, _handle) = connect(init_mock()).await;
    monitor.close().await.unwrap();
    let err = monitor
        .poll("distance", Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotConnected));
}

// ---------------------------------------------------------------------------
// Unsolicited frames
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn unsolicited_frames_reach_their_channels() {
    let (monitor, handle) = connect(init_mock()).await;
    let mut strokes = monitor.subscribe_strokes();
    let mut pulses = monitor.subscribe_pulses();
    let mut pings = monitor.subscribe_pings();
    let mut readings = monitor.subscribe_readings();

    handle.push_line("PING");
    handle.push_line("SS");
    handle.push_line("P03");
    handle.push_line("SE");
    handle.push_line("IDS1A048");

    assert!(pings.recv().await.is_ok());
    assert_eq!(strokes.recv().await.unwrap(), StrokeEvent::Start);
    assert_eq!(pulses.recv().await.unwrap(), 3);
    assert_eq!(strokes.recv().await.unwrap(), StrokeEvent::End);
    let reading = readings.recv().await.unwrap();
    assert_eq!(reading.name, "heart_rate");
    assert_eq!(reading.value, 0x48);
}

#[tokio::test(start_paused = true)]
async fn bad_frames_leave_state_unchanged() {
    let (monitor, handle) = connect(init_mock()).await;

    handle.push_line("IDD3FF0001"); // unknown address
    handle.push_line("IDS0550A"); // width mismatch for distance
    handle.push_line("IDD05500G4"); // malformed hex
    handle.push_line("GARBAGE");
    handle.push_line("IDD14A0010");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let state = monitor.state();
    assert_eq!(state.get("distance"), None);
    assert_eq!(state.get("speed"), Some(0x10));
    assert_eq!(state.len(), monitor.registry().len());
}

#[tokio::test(start_paused = true)]
async fn transport_loss_emits_disconnected() {
    let (monitor, handle) = connect(init_mock()).await;
    let mut events = monitor.subscribe_events();

    handle.disconnect();
    assert_eq!(events.recv().await.unwrap(), MonitorEvent::Disconnected);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!monitor.is_open());
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn commands_after_init() {
    let mut mock = init_mock();
    mock.expect(b"DDMI\r\n", b"");
    mock.expect(b"WSI107D0\r\n", b"");
    mock.expect(b"WSU04B0\r\n", b"");
    let (monitor, handle) = connect(mock).await;

    monitor.set_display_units(Units::Miles).await.unwrap();
    monitor
        .define_distance_workout(2000, Units::Meters)
        .await
        .unwrap();
    monitor.define_duration_workout(1200).await.unwrap();
    assert_eq!(handle.remaining_expectations(), 0);
}

#[tokio::test(start_paused = true)]
async fn invalid_units_text_writes_nothing() {
    let (_monitor, handle) = connect(init_mock()).await;
    let err = "furlongs".parse::<Units>().unwrap_err();
    assert!(matches!(err, Error::InvalidUnits(_)));
    assert_eq!(handle.sent_lines(), vec!["USB", "DDME", "RESET"]);
}
