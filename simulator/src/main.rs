//! Desktop harness for the display-slave core.
//!
//! Plays a scripted host session against the full slave runtime: provisions
//! a small settings UI over the framed link, injects button events, and
//! prints every frame the slave streams to a virtual panel.
//!
//! ```bash
//! cargo run -p oledui-simulator
//! ```

mod host;
mod panel;

use oledui_common::{Button, cmd, json_flags, rc};
use oledui_slave::render;
use oledui_slave::runtime::Slave;

use crate::host::{HostLink, encode_command};
use crate::panel::VirtualPanel;

/// Demo UI: two base screens, an overlay, a settings list with an inline
/// barrel and a nested local screen holding a trigger.
const DESCRIPTORS: &[(u8, &str)] = &[
    (json_flags::HEAD, r#"{"t":"h","n":16}"#),
    (0, r#"{"t":"s"}"#),
    (0, r#"{"t":"t","p":0,"x":24,"y":0,"tx":"SETTINGS"}"#),
    (0, r#"{"t":"l","p":0,"x":8,"y":8,"r":3}"#),
    (0, r#"{"t":"t","p":2,"x":0,"tx":"Backlight","c":12}"#),
    (0, r#"{"t":"b","p":3,"x":70,"y":0,"v":1}"#),
    (0, r#"{"t":"t","p":4,"x":0,"tx":"Off"}"#),
    (0, r#"{"t":"t","p":4,"x":0,"tx":"Low"}"#),
    (0, r#"{"t":"t","p":4,"x":0,"tx":"High"}"#),
    (0, r#"{"t":"t","p":2,"x":0,"tx":"Info"}"#),
    (0, r#"{"t":"s","p":2}"#),
    (0, r#"{"t":"i","p":9,"x":8,"y":8}"#),
    (0, r#"{"t":"t","p":9,"x":8,"y":0,"tx":"Apply?"}"#),
    (0, r#"{"t":"s"}"#),
    (0, r#"{"t":"t","p":12,"x":40,"y":8,"tx":"Page 2"}"#),
    (0, r#"{"t":"s","ov":1}"#),
    (json_flags::COMMIT, r#"{"t":"t","p":14,"x":34,"y":12,"tx":"* SAVED *"}"#),
];

fn feed_frame(
    slave: &mut Slave<VirtualPanel, HostLink>,
    command: u8,
    payload: &[u8],
) {
    for byte in encode_command(command, payload) {
        slave.rx_byte(byte);
    }
}

/// Run the loop until pending work drains, at least `min_ticks` iterations.
fn run(
    slave: &mut Slave<VirtualPanel, HostLink>,
    min_ticks: u32,
) {
    let mut ticks = 0;
    loop {
        slave.tick();
        ticks += 1;
        if ticks >= min_ticks && !slave.render_busy() && !slave.state.render_requested {
            break;
        }
        assert!(ticks < 1_000_000, "runtime never went idle");
    }
}

fn check_rc(
    slave: &mut Slave<VirtualPanel, HostLink>,
    what: &str,
) {
    let response = slave.port_mut().pop_response().expect("missing response");
    if response[0] != rc::OK {
        println!("  ! {what}: rc=0x{:02X}", response[0]);
    }
}

fn show(slave: &mut Slave<VirtualPanel, HostLink>) { print!("{}", slave.bus_mut().to_ascii()); }

fn press(
    slave: &mut Slave<VirtualPanel, HostLink>,
    button: Button,
    label: &str,
) {
    println!("> press {label}");
    feed_frame(slave, cmd::INPUT_EVENT, &[button as u8, 0]);
    run(slave, 400);
    check_rc(slave, "input_event");
}

fn main() {
    let mut slave = Slave::new(64, VirtualPanel::new(64), HostLink::new()).expect("panel height");

    // Boot banner, shown before the host says anything.
    let mut banner = [0u8; render::PAGE_BUF_LEN];
    render::boot_banner(&mut banner);
    slave.bus_mut().blit_page(3, &banner);
    println!("boot:");
    show(&mut slave);

    // Ping: version and capability word.
    feed_frame(&mut slave, cmd::PING, &[]);
    run(&mut slave, 2);
    let pong = slave.port_mut().pop_response().expect("ping response");
    println!("ping -> rc={} version={} caps={}", pong[0], pong[1], u16::from_le_bytes([pong[2], pong[3]]));

    // Provision the demo UI.
    slave.bus_mut().clear();
    for &(flags, body) in DESCRIPTORS {
        let mut payload = vec![flags];
        payload.extend_from_slice(body.as_bytes());
        feed_frame(&mut slave, cmd::JSON, &payload);
        run(&mut slave, 2);
        check_rc(&mut slave, body);
    }
    run(&mut slave, 600);
    println!("provisioned ({} descriptors):", DESCRIPTORS.len());
    show(&mut slave);

    // Walk the list and open the barrel.
    press(&mut slave, Button::Down, "DOWN (focus the list)");
    press(&mut slave, Button::Down, "DOWN (cursor to Info)");
    press(&mut slave, Button::Up, "UP (back to Backlight)");
    press(&mut slave, Button::Ok, "OK (edit barrel)");
    press(&mut slave, Button::Down, "DOWN (Low -> High)");
    show(&mut slave);
    press(&mut slave, Button::Ok, "OK (commit barrel)");

    // Element state after the commit.
    feed_frame(&mut slave, cmd::GET_ELEMENT_STATE, &[4]);
    run(&mut slave, 2);
    let st = slave.port_mut().pop_response().expect("element state");
    println!("barrel 4 -> rc={} value={}", st[0], i16::from_le_bytes([st[2], st[3]]));

    // Slide to the second screen and back.
    press(&mut slave, Button::Right, "RIGHT (slide to page 2)");
    show(&mut slave);
    press(&mut slave, Button::Left, "LEFT (slide back)");

    // Overlay with masked input for 300 ms.
    feed_frame(&mut slave, cmd::SHOW_OVERLAY, &[14, 44, 1, 1]);
    run(&mut slave, 10);
    check_rc(&mut slave, "show_overlay");
    println!("overlay:");
    show(&mut slave);
    run(&mut slave, 400);
    println!("overlay cleared:");
    show(&mut slave);

    // Final status.
    feed_frame(&mut slave, cmd::GET_STATUS, &[]);
    run(&mut slave, 2);
    let status = slave.port_mut().pop_response().expect("status");
    println!(
        "status -> rc={} flags={:#04x} elements={} screens={} active={} dirty_id={:#04x}",
        status[0], status[1], status[2], status[3], status[4], status[6]
    );

    println!("panel chunks streamed: {}", slave.bus_mut().chunk_count);
    println!("diag events:");
    for entry in slave.diag.iter() {
        println!("  {:>6} ms  {:?} ({})", entry.timestamp_ms, entry.event, entry.value);
    }
}
