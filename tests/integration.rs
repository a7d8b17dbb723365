//! Hardware-in-the-loop tests for the command protocol.
//!
//! These tests need a flashed board on the serial port named by `MKS_SERVO42_FW_UART` and are
//! ignored by default; run them with `cargo test -- --ignored`.
//!
//! SAFETY: moves are short and slow, and every move is undone before the test ends.

mod test_utils;

use mks_servo42_fw::Feedback;
use safety::{MAX_SAFE_STEP_RATE, MAX_SAFE_STEPS, should_skip_command, validate_safe_rate, validate_safe_steps};
use test_utils::{LONG_PAUSE, TEST_MUTEX, TestContext, TestResult, init_env};

#[test]
#[ignore = "needs a board"]
fn test_motor_enable_disable() -> TestResult<()> {
    init_env();
    let _guard = TEST_MUTEX.lock().unwrap();
    println!("=== Test: motor enable/disable ===");

    let mut ctx = TestContext::new()?;
    ctx.serial.command("M17")?;
    ctx.serial.command("M18")?;

    println!("Test passed!");
    Ok(())
}

#[test]
#[ignore = "needs a board"]
fn test_microstepping_round_trip() -> TestResult<()> {
    init_env();
    let _guard = TEST_MUTEX.lock().unwrap();
    println!("=== Test: microstepping round trip ===");

    let mut ctx = TestContext::new()?;
    let original = ctx.serial.query("M350")?;

    ctx.serial.command("M350 V16")?;
    assert_eq!(ctx.serial.query("M350")?, "16");

    // Invalid divisors are reported back unchanged.
    assert_eq!(ctx.serial.query("M350 V3")?, "16");

    ctx.serial.command(&format!("M350 V{original}"))?;
    println!("Test passed!");
    Ok(())
}

#[test]
#[ignore = "needs a board"]
fn test_full_step_angle_rejects_invalid() -> TestResult<()> {
    init_env();
    let _guard = TEST_MUTEX.lock().unwrap();
    println!("=== Test: full step angle ===");

    let mut ctx = TestContext::new()?;
    let original = ctx.serial.query("M93")?;
    assert_eq!(ctx.serial.query("M93 V2.0")?, original);
    assert_eq!(ctx.serial.query("M93")?, original);

    println!("Test passed!");
    Ok(())
}

#[test]
#[ignore = "needs a board"]
fn test_direct_stepping_round_trip() -> TestResult<()> {
    init_env();
    let _guard = TEST_MUTEX.lock().unwrap();
    println!("=== Test: direct stepping ===");

    validate_safe_rate(MAX_SAFE_STEP_RATE)?;
    validate_safe_steps(MAX_SAFE_STEPS)?;

    let mut ctx = TestContext::new()?;
    ctx.serial.command("M17")?;

    let forward = format!("G6 D1 R{MAX_SAFE_STEP_RATE} S{MAX_SAFE_STEPS}");
    let back = format!("G6 D0 R{MAX_SAFE_STEP_RATE} S{MAX_SAFE_STEPS}");
    ctx.serial.command(&forward)?;
    std::thread::sleep(LONG_PAUSE);
    ctx.serial.command(&back)?;
    std::thread::sleep(LONG_PAUSE);

    let reply = ctx.serial.query("G6 S0")?;
    assert_eq!(Feedback::try_from(reply.as_str()), Ok(Feedback::NoValue));

    ctx.serial.command("M18")?;
    println!("Test passed!");
    Ok(())
}

#[test]
#[ignore = "needs a board"]
fn test_pid_gains_query() -> TestResult<()> {
    init_env();
    let _guard = TEST_MUTEX.lock().unwrap();
    println!("=== Test: PID gains ===");

    let mut ctx = TestContext::new()?;
    let gains = ctx.serial.query("M301")?;
    assert!(gains.starts_with("P: "), "unexpected reply {gains}");
    assert!(gains.contains(" | W: "), "unexpected reply {gains}");

    println!("Test passed!");
    Ok(())
}

#[test]
#[ignore = "needs a board"]
fn test_unknown_commands() -> TestResult<()> {
    init_env();
    let _guard = TEST_MUTEX.lock().unwrap();
    println!("=== Test: unknown commands ===");

    let mut ctx = TestContext::new()?;
    let reply = ctx.serial.query("M999")?;
    assert_eq!(Feedback::try_from(reply.as_str()), Ok(Feedback::CmdNotAvailable));
    let reply = ctx.serial.query("hello")?;
    assert_eq!(Feedback::try_from(reply.as_str()), Ok(Feedback::NoCmdSpecified));

    println!("Test passed!");
    Ok(())
}

#[test]
fn test_dangerous_commands_are_flagged() {
    assert!(should_skip_command("M502"));
    assert!(should_skip_command("m500"));
    assert!(should_skip_command("M356 VY2"));
    assert!(!should_skip_command("M350 V16"));
}
