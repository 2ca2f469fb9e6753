use std::thread;
use std::time::{Duration, Instant};

use lcm::{
    Button, DebugLogger, DisplayLine, Function, Kind, Lcm, LcmOptions, Message, RecvError,
    RetryCause, SendError,
};
use lcm_testing::{McuBehavior, ObedientMcu, VirtualLcm, VirtualPort};
use serialport::SerialPort;

/// Spawns a virtual MCU and an engine connected to it, with a reply timeout
/// generous enough that scheduling hiccups never look like a lost frame.
fn open(behavior: impl McuBehavior + 'static) -> (VirtualLcm, Lcm) {
    let _ = env_logger::builder().is_test(true).try_init();
    let (mcu, port) = VirtualLcm::spawn(behavior);
    let lcm = LcmOptions::new()
        .logger(DebugLogger)
        .reply_timeout(Duration::from_millis(500))
        .attach(port)
        .unwrap();
    (mcu, lcm)
}

/// Polls until `predicate` holds, panicking after a second.
fn wait_until(what: &str, predicate: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(1);
    while !predicate() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn clean_send_is_acknowledged_without_retries() {
    let (mcu, mut lcm) = open(ObedientMcu);

    lcm.send(Message::display_on()).unwrap();

    assert_eq!(vec![Message::display_on()], mcu.history());
    lcm.close().unwrap();
}

#[test]
fn lost_frame_recovers_with_flush_burst() {
    let mut dropped = false;
    let behavior = move |message: &Message| {
        // Swallow the first backlight command, as the MCU does when its
        // receive buffer wedges.
        if message.function() == Function::On && !dropped {
            dropped = true;
            return vec![];
        }
        ObedientMcu.on_frame(message)
    };

    let _ = env_logger::builder().is_test(true).try_init();
    let (mcu, port) = VirtualLcm::spawn(behavior);
    let mut lcm = LcmOptions::new()
        .logger(DebugLogger)
        .reply_timeout(Duration::from_millis(20))
        .attach(port)
        .unwrap();

    lcm.send(Message::display_on()).unwrap();

    // One timed-out attempt, the two-command flush burst, then the retry.
    assert_eq!(
        vec![
            Message::display_on(),
            Message::mcu_flush(),
            Message::mcu_flush(),
            Message::display_on(),
        ],
        mcu.history()
    );
    lcm.close().unwrap();
}

#[test]
fn error_reply_retries_without_flush() {
    let mut naks = 0;
    let behavior = move |message: &Message| {
        if message.function() == Function::Text {
            naks += 1;
            if naks < 3 {
                return vec![Message::new(Kind::Reply, Function::Text, &[0x02])];
            }
        }
        ObedientMcu.on_frame(message)
    };
    let (mcu, mut lcm) = open(behavior);

    let text = Message::set_display(DisplayLine::Top, 0, "PRESS ANY KEY TO").unwrap();
    lcm.send(text.clone()).unwrap();

    // Three attempts, and no flush: the MCU answered, so its buffer is fine.
    assert_eq!(vec![text.clone(), text.clone(), text], mcu.history());
    lcm.close().unwrap();
}

#[test]
fn persistent_error_replies_exhaust_retries() {
    let behavior = |message: &Message| {
        if message.kind() == Some(Kind::Command) {
            vec![Message::new(Kind::Reply, message.function(), &[0x04])]
        } else {
            vec![]
        }
    };
    let (mcu, mut lcm) = open(behavior);

    let error = lcm.send(Message::display_status()).unwrap_err();
    match error {
        SendError::RetryExceeded { tries, last } => {
            assert_eq!(50, tries);
            assert_eq!(RetryCause::ErrorReply(0x04), last);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(50, mcu.history().len());
    lcm.close().unwrap();
}

#[test]
fn button_press_is_delivered() {
    let (mcu, mut lcm) = open(ObedientMcu);

    mcu.press_button(Button::Up);

    let message = lcm.recv().unwrap();
    assert_eq!(Some(Kind::Command), message.kind());
    assert_eq!(Function::Button, message.function());
    assert_eq!(&[Button::Up.to_byte()], message.value());

    // Protocol acks are off by default; the host must not have replied.
    thread::sleep(Duration::from_millis(50));
    assert!(mcu.history().is_empty());
    lcm.close().unwrap();
}

#[test]
fn button_press_is_acked_when_enabled() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (mcu, port) = VirtualLcm::spawn(ObedientMcu);
    let mut lcm = LcmOptions::new()
        .logger(DebugLogger)
        .protocol_ack(true)
        .attach(port)
        .unwrap();

    mcu.press_button(Button::Up);

    let message = lcm.recv().unwrap();
    assert_eq!(Function::Button, message.function());

    wait_until("button ack", || !mcu.history().is_empty());
    let ack = &mcu.history()[0];
    assert_eq!(&[0xF1, 0x01, 0x80, 0x00], ack.as_bytes());
    lcm.close().unwrap();
}

#[test]
fn version_report_is_never_acked() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (mcu, port) = VirtualLcm::spawn(ObedientMcu);
    let mut lcm = LcmOptions::new()
        .logger(DebugLogger)
        .protocol_ack(true)
        .attach(port)
        .unwrap();

    mcu.send(Message::new(
        Kind::Command,
        Function::Version,
        &[0x00, 0x02, 0x09],
    ));

    let message = lcm.recv().unwrap();
    assert_eq!(Function::Version, message.function());
    assert_eq!(&[0x00, 0x02, 0x09], message.value());

    // Even with acks enabled, version reports go unanswered; acking one
    // makes the MCU report again, forever.
    thread::sleep(Duration::from_millis(50));
    assert!(mcu.history().is_empty());
    lcm.close().unwrap();
}

#[test]
fn receive_queue_drops_oldest_on_overflow() {
    let (mcu, mut lcm) = open(ObedientMcu);

    for code in 1..=7 {
        mcu.send(Message::new(Kind::Command, Function::Other(0x70), &[code]));
    }

    // Let all seven arrive before draining; the queue holds five.
    thread::sleep(Duration::from_millis(100));
    let mut delivered = vec![];
    while let Ok(message) = lcm.try_recv() {
        delivered.push(message.value()[0]);
    }
    assert_eq!(vec![3, 4, 5, 6, 7], delivered);
    lcm.close().unwrap();
}

#[test]
fn unmatched_reply_is_forwarded() {
    let (mcu, mut lcm) = open(ObedientMcu);

    mcu.send(Message::new(Kind::Reply, Function::On, &[0x00]));

    let message = lcm.recv().unwrap();
    assert_eq!(Some(Kind::Reply), message.kind());
    assert_eq!(Function::On, message.function());
    lcm.close().unwrap();
}

#[test]
fn flush_reply_is_housekeeping_not_traffic() {
    let (mcu, mut lcm) = open(ObedientMcu);

    // A stray flush acknowledgement must never surface; the button press
    // injected after it is the first thing the application sees.
    mcu.send(Message::new(Kind::Reply, Function::Flush, &[0x00]));
    mcu.press_button(Button::Back);

    let message = lcm.recv().unwrap();
    assert_eq!(Function::Button, message.function());
    assert_eq!(&[Button::Back.to_byte()], message.value());
    lcm.close().unwrap();
}

#[test]
fn close_is_idempotent_and_operations_fail_after() {
    let (_mcu, mut lcm) = open(ObedientMcu);

    lcm.close().unwrap();
    lcm.close().unwrap();

    assert!(matches!(
        lcm.send(Message::display_on()),
        Err(SendError::Closed)
    ));
    assert!(matches!(lcm.recv(), Err(RecvError::Closed)));
}

#[test]
fn queued_messages_survive_close() {
    let (mcu, mut lcm) = open(ObedientMcu);

    mcu.press_button(Button::Enter);
    wait_until("queued button press", || lcm.try_recv().is_ok());
    mcu.press_button(Button::Down);
    thread::sleep(Duration::from_millis(50));
    lcm.close().unwrap();

    let message = lcm.recv().unwrap();
    assert_eq!(&[Button::Down.to_byte()], message.value());
    assert!(matches!(lcm.recv(), Err(RecvError::Closed)));
}

#[test]
fn attach_configures_the_port() {
    let (mut port, _peer) = VirtualPort::pair();
    lcm::serial::configure_port(&mut port, Duration::from_millis(50)).unwrap();

    assert_eq!(115_200, port.baud_rate().unwrap());
    assert_eq!(serialport::DataBits::Eight, port.data_bits().unwrap());
    assert_eq!(serialport::Parity::None, port.parity().unwrap());
    assert_eq!(serialport::StopBits::One, port.stop_bits().unwrap());
    assert_eq!(serialport::FlowControl::None, port.flow_control().unwrap());
    assert_eq!(Duration::from_millis(50), port.timeout());
}
