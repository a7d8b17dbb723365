//! Interactive console for a board running the firmware.
//!
//! Reads protocol lines from stdin, sends them to the board and prints the replies,
//! tagging the fixed status replies. A few setup commands are sent on start-up.
//!
//! Set the `MKS_SERVO42_FW_UART` environment variable (or put it in `.env`) to the serial
//! port path.

use mks_servo42_fw::Feedback;
use serial::{SerialPort, SerialPortSettings};
use std::env;
use std::io::{self, BufRead, Read, Write};
use std::thread;
use std::time::Duration;

/// Sent before handing over to the user.
const SETUP: &[&str] = &["M115", "M350 V16", "M907 R800", "M301"];

fn main() {
    dotenvy::dotenv().ok();

    let port_path =
        env::var("MKS_SERVO42_FW_UART").expect("Set MKS_SERVO42_FW_UART to your serial port path");
    println!("Connecting to: {port_path}");

    let mut port = serial::open(&port_path).expect("Failed to open serial port");
    port.reconfigure(&|settings: &mut dyn SerialPortSettings| {
        settings.set_baud_rate(serial::Baud115200)?;
        settings.set_char_size(serial::Bits8);
        settings.set_parity(serial::ParityNone);
        settings.set_stop_bits(serial::Stop1);
        settings.set_flow_control(serial::FlowNone);
        Ok(())
    })
    .expect("Failed to configure serial port");
    port.set_timeout(Duration::from_millis(100)).unwrap();

    println!("\n=== Setup ===");
    for line in SETUP {
        send(&mut port, line);
    }

    println!("\n=== Console (Ctrl-D to quit) ===");
    for line in io::stdin().lock().lines() {
        let line = line.expect("Failed to read stdin");
        if line.trim().is_empty() {
            continue;
        }
        send(&mut port, &line);
    }

    send(&mut port, "M18");
}

/// Sends one line and prints every reply line that arrives.
fn send<S: SerialPort + Read + Write>(port: &mut S, line: &str) {
    println!("TX: {line}");
    port.write_all(line.as_bytes()).expect("Write failed");
    port.write_all(b"\n").expect("Write failed");
    thread::sleep(Duration::from_millis(100));

    let mut buf = [0u8; 256];
    let mut received = Vec::new();
    while let Ok(n) = port.read(&mut buf) {
        if n == 0 {
            break;
        }
        received.extend_from_slice(&buf[..n]);
    }

    for reply in String::from_utf8_lossy(&received).lines() {
        match Feedback::try_from(reply) {
            Ok(feedback) if feedback.is_ok() => println!("RX: ok"),
            Ok(feedback) => println!("RX: {feedback:?} ({reply})"),
            Err(_) => println!("RX: {reply}"),
        }
    }
}
