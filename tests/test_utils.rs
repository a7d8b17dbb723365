//! Serial helpers for hardware-in-the-loop tests against a flashed board.

use mks_servo42_fw::Feedback;
use serial::{SerialPort, SerialPortSettings};
use std::env;
use std::io::{Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use lazy_static::lazy_static;
use std::sync::Mutex;

use dotenvy::dotenv;

/// Environment variable holding the serial port path.
pub const PORT_ENV: &str = "MKS_SERVO42_FW_UART";

pub fn init_env() {
    // Load .env file silently (ignore if not found)
    let _ = dotenv().ok();
}

// Only one test may talk to the board at a time.
lazy_static! {
    pub static ref TEST_MUTEX: Mutex<()> = Mutex::new(());
}

pub const DEFAULT_BAUD_RATE: serial::BaudRate = serial::Baud115200;

/// How long to wait for a complete reply line.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Time for a short move to finish.
pub const LONG_PAUSE: Duration = Duration::from_secs(2);

pub type TestResult<T> = Result<T, TestError>;

#[derive(Debug)]
#[allow(dead_code)]
pub enum TestError {
    Serial(String),
    Protocol(String),
    Safety(String),
}

impl From<&str> for TestError {
    fn from(err: &str) -> Self {
        Self::Safety(err.to_string())
    }
}

impl From<String> for TestError {
    fn from(err: String) -> Self {
        Self::Safety(err)
    }
}

impl From<std::io::Error> for TestError {
    fn from(err: std::io::Error) -> Self {
        Self::Serial(err.to_string())
    }
}

impl From<serial::Error> for TestError {
    fn from(err: serial::Error) -> Self {
        Self::Serial(err.to_string())
    }
}

/// Line-oriented access to the board's command port.
pub struct TestSerialPort {
    port: Box<dyn SerialPort + Send>,
}

impl std::fmt::Debug for TestSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestSerialPort").finish()
    }
}

impl TestSerialPort {
    pub fn from_env() -> TestResult<Self> {
        let port_path = env::var(PORT_ENV)
            .map_err(|_| TestError::Protocol(format!("{PORT_ENV} environment variable not set")))?;

        println!("Connecting to serial port: {port_path}");

        let mut port = serial::open(&port_path)?;
        port.reconfigure(&|settings: &mut dyn SerialPortSettings| {
            settings.set_baud_rate(DEFAULT_BAUD_RATE)?;
            settings.set_char_size(serial::Bits8);
            settings.set_parity(serial::ParityNone);
            settings.set_stop_bits(serial::Stop1);
            settings.set_flow_control(serial::FlowNone);
            Ok(())
        })?;
        port.set_timeout(Duration::from_millis(50))?;

        Ok(Self {
            port: Box::new(port),
        })
    }

    /// Discards anything the board sent unprompted.
    pub fn clear_input_buffer(&mut self) -> TestResult<()> {
        let mut buffer = [0u8; 256];
        while let Ok(n) = self.port.read(&mut buffer) {
            if n == 0 {
                break;
            }
            println!("Drained {} bytes: {:?}", n, String::from_utf8_lossy(&buffer[..n]));
        }
        Ok(())
    }

    pub fn send_line(&mut self, line: &str) -> TestResult<()> {
        self.clear_input_buffer()?;
        println!("TX: {line}");
        self.port.write_all(line.as_bytes())?;
        self.port.write_all(b"\n")?;
        Ok(())
    }

    /// Reads up to the next newline, or whatever arrived before the timeout.
    pub fn read_line(&mut self) -> TestResult<String> {
        let deadline = Instant::now() + DEFAULT_TIMEOUT;
        let mut line = Vec::new();
        let mut byte = [0u8; 1];

        while Instant::now() < deadline {
            match self.port.read(&mut byte) {
                Ok(1) if byte[0] == b'\n' => break,
                Ok(1) => line.push(byte[0]),
                Ok(_) => thread::sleep(Duration::from_millis(5)),
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e.into()),
            }
        }

        let line = String::from_utf8_lossy(&line).trim().to_owned();
        println!("RX: {line}");
        Ok(line)
    }

    /// Sends `line` and returns the reply line.
    pub fn query(&mut self, line: &str) -> TestResult<String> {
        self.send_line(line)?;
        self.read_line()
    }

    /// Sends `line` and fails unless the board acknowledges it.
    pub fn command(&mut self, line: &str) -> TestResult<()> {
        let reply = self.query(line)?;
        match Feedback::try_from(reply.as_str()) {
            Ok(Feedback::Ok) => Ok(()),
            _ => Err(TestError::Protocol(format!("{line}: {reply}"))),
        }
    }
}

/// Test context holding the board connection.
#[derive(Debug)]
pub struct TestContext {
    pub serial: TestSerialPort,
}

impl TestContext {
    pub fn new() -> TestResult<Self> {
        let serial = TestSerialPort::from_env()?;
        Ok(Self { serial })
    }
}
