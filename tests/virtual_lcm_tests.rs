use std::time::Duration;

use lcm::{DisplayLine, Function, Kind, Lcm, LcmOptions, Message};
use lcm_testing::{ObedientMcu, VirtualLcm};

fn open_obedient() -> (VirtualLcm, Lcm) {
    let _ = env_logger::builder().is_test(true).try_init();
    let (mcu, port) = VirtualLcm::spawn(ObedientMcu);
    let lcm = LcmOptions::new()
        .reply_timeout(Duration::from_millis(500))
        .attach(port)
        .unwrap();
    (mcu, lcm)
}

#[test]
fn text_update_reaches_the_display() {
    let (mcu, mut lcm) = open_obedient();

    let top = Message::set_display(DisplayLine::Top, 0, "PRESS ANY KEY TO").unwrap();
    let bottom = Message::set_display(DisplayLine::Bottom, 2, "CONTINUE").unwrap();
    lcm.send(top.clone()).unwrap();
    lcm.send(bottom.clone()).unwrap();

    assert_eq!(vec![top, bottom], mcu.history());
    lcm.close().unwrap();
}

#[test]
fn version_request_yields_ack_then_report() {
    let (mcu, mut lcm) = open_obedient();

    // The ack reply completes the send; the version report arrives
    // separately as a command from the display.
    lcm.send(Message::request_version()).unwrap();
    let report = lcm.recv().unwrap();

    assert_eq!(Some(Kind::Command), report.kind());
    assert_eq!(Function::Version, report.function());
    assert_eq!(&[0x00, 0x01, 0x02], report.value());
    assert_eq!(vec![Message::request_version()], mcu.history());
    lcm.close().unwrap();
}

#[test]
fn initialization_sequence_is_acknowledged_in_order() {
    let (mcu, mut lcm) = open_obedient();

    // The vendor daemon's init routine: backlight on, probe, clear.
    let sequence = [
        Message::display_on(),
        Message::display_status(),
        Message::clear_display(),
    ];
    for message in &sequence {
        lcm.send(message.clone()).unwrap();
    }

    assert_eq!(sequence.to_vec(), mcu.history());
    lcm.close().unwrap();
}

#[test]
fn garbage_between_frames_is_skipped() {
    let (mcu, mut lcm) = open_obedient();

    // Inject line noise, then a valid button press; the engine's assembler
    // resynchronizes on the next valid start byte.
    mcu.send(Message::from_bytes(vec![0x42]));
    mcu.send(Message::new(Kind::Command, Function::Button, &[0x04]));

    let message = lcm.recv().unwrap();
    assert_eq!(Function::Button, message.function());
    assert_eq!(&[0x04], message.value());
    lcm.close().unwrap();
}
