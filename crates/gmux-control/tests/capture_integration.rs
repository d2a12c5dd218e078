//! `M28`/`M29` file capture.

mod common;

use common::{text, Rig};
use gmux_types::CodeChannel;

#[tokio::test]
async fn captured_codes_are_written_not_executed() {
    let rig = Rig::new();

    let result = rig.run_ok("M28 foo.g", CodeChannel::Telnet).await;
    assert!(text(&result).contains("Writing to file: 0:/gcodes/foo.g"));

    // Everything after M28 lands in the file and yields empty results.
    let g1 = rig.run_ok("G1 X10 Y20", CodeChannel::Telnet).await;
    assert!(g1.is_empty());
    let m117 = rig.run_ok("M117 hello world", CodeChannel::Telnet).await;
    assert!(m117.is_empty());
    assert!(rig.firmware.sent().is_empty());

    let done = rig.run_ok("M29", CodeChannel::Telnet).await;
    assert!(text(&done).contains("Done saving file."));

    let content = std::fs::read_to_string(rig.sd_path("gcodes/foo.g")).unwrap();
    assert_eq!(content, "G1 X10 Y20\nM117 hello world\n");

    // The channel executes normally again.
    rig.run_ok("G1 X1", CodeChannel::Telnet).await;
    assert_eq!(rig.firmware.sent(), vec!["G1 X1".to_string()]);
}

#[tokio::test]
async fn capture_is_per_channel() {
    let rig = Rig::new();
    rig.run_ok("M28 capture.g", CodeChannel::Usb).await;

    // Codes on other channels are unaffected.
    rig.run_ok("G1 X5", CodeChannel::Http).await;
    assert_eq!(rig.firmware.sent(), vec!["G1 X5".to_string()]);

    rig.run_ok("M29", CodeChannel::Usb).await;
    let content = std::fs::read_to_string(rig.sd_path("gcodes/capture.g")).unwrap();
    assert!(content.is_empty());
}

#[tokio::test]
async fn double_m28_is_rejected() {
    let rig = Rig::new();
    rig.run_ok("M28 one.g", CodeChannel::Usb).await;

    // While a capture is open, a second M28 is captured into the file
    // like any other code rather than opening a new writer.
    let second = rig.run_ok("M28 two.g", CodeChannel::Usb).await;
    assert!(second.is_empty());

    rig.run_ok("M29", CodeChannel::Usb).await;
    let content = std::fs::read_to_string(rig.sd_path("gcodes/one.g")).unwrap();
    assert_eq!(content, "M28 two.g\n");
    assert!(!rig.sd_path("gcodes/two.g").exists());
}

#[tokio::test]
async fn m29_without_capture_goes_to_firmware() {
    let rig = Rig::new();
    let result = rig.run_ok("M29", CodeChannel::Http).await;
    assert!(result.is_successful());
    assert_eq!(rig.firmware.sent(), vec!["M29".to_string()]);
}
