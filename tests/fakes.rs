//! Host stand-ins for the board peripherals.

#![allow(dead_code)]

use embedded_hal::blocking::delay::DelayMs;
use mks_servo42_fw::{
    BusId, CoilOutput, CoilState, Console, Encoder, EncoderValue, Error, Firmware, MessageBus,
    ParameterStore, PulseCounter, Reply, Services, Settings, StepJob, StepScheduler, StepperMotor,
};

#[derive(Debug, Default)]
pub struct FakeCoil {
    pub last: Option<(CoilState, u16)>,
    pub writes: usize,
}

impl CoilOutput for FakeCoil {
    fn apply(&mut self, state: CoilState, duty: u16) -> Result<(), Error> {
        self.last = Some((state, duty));
        self.writes += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FakeEncoder {
    pub angle: f32,
    pub acceleration: f32,
    pub calibrations: usize,
}

impl Encoder for FakeEncoder {
    fn read(&mut self) -> EncoderValue {
        EncoderValue::default()
    }

    fn absolute_angle(&mut self) -> f32 {
        self.angle
    }

    fn speed(&mut self) -> f32 {
        0.0
    }

    fn acceleration(&mut self) -> f32 {
        self.acceleration
    }

    fn calibrate(&mut self) {
        self.calibrations += 1;
    }
}

#[derive(Debug, Default)]
pub struct FakeCounter {
    pub raw: u16,
}

impl PulseCounter for FakeCounter {
    fn count(&self) -> u16 {
        self.raw
    }

    fn set_count(&mut self, value: u16) {
        self.raw = value;
    }
}

#[derive(Debug, Default)]
pub struct RecordingScheduler {
    pub jobs: Vec<StepJob>,
}

impl StepScheduler for RecordingScheduler {
    fn schedule(&mut self, job: StepJob) {
        self.jobs.push(job);
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    pub saved: Option<Settings>,
}

impl ParameterStore for MemoryStore {
    fn save(&mut self, settings: &Settings) -> Result<(), Error> {
        self.saved = Some(*settings);
        Ok(())
    }

    fn load(&mut self) -> Result<Settings, Error> {
        self.saved.ok_or(Error::Storage)
    }

    fn wipe(&mut self) -> ! {
        self.saved = None;
        panic!("restart");
    }
}

#[derive(Debug, Default)]
pub struct FakeBus {
    pub sent: Vec<(BusId, String)>,
}

impl MessageBus for FakeBus {
    fn send(&mut self, id: BusId, message: &str) -> Result<(), Error> {
        self.sent.push((id, message.to_owned()));
        Ok(())
    }
}

/// Reports pending input once it has been polled `input_after` times.
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    pub lines: Vec<String>,
    pub input_after: usize,
    pub polls: usize,
    pub cleared: bool,
}

impl Console for ScriptedConsole {
    fn input_pending(&mut self) -> bool {
        self.polls += 1;
        self.polls > self.input_after
    }

    fn clear_input(&mut self) {
        self.cleared = true;
    }

    fn write_line(&mut self, line: &str) {
        self.lines.push(line.to_owned());
    }
}

#[derive(Debug, Default)]
pub struct FakeDelay {
    pub total_ms: u32,
}

impl DelayMs<u32> for FakeDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.total_ms += ms;
    }
}

pub type TestFirmware = Firmware<FakeCoil, FakeCoil, FakeEncoder>;

pub fn firmware(settings: Settings) -> TestFirmware {
    let motor = StepperMotor::new(
        FakeCoil::default(),
        FakeCoil::default(),
        FakeEncoder::default(),
        settings.motor,
    );
    Firmware::new(motor, settings).unwrap()
}

/// Everything around the firmware on a board.
#[derive(Debug, Default)]
pub struct Bench {
    pub scheduler: RecordingScheduler,
    pub store: MemoryStore,
    pub bus: FakeBus,
    pub with_bus: bool,
    pub console: ScriptedConsole,
    pub delay: FakeDelay,
}

impl Bench {
    pub fn with_bus() -> Self {
        Self {
            with_bus: true,
            ..Self::default()
        }
    }

    pub fn services(&mut self) -> Services<'_> {
        let bus: Option<&mut dyn MessageBus> = if self.with_bus {
            Some(&mut self.bus)
        } else {
            None
        };
        Services {
            scheduler: &mut self.scheduler,
            store: &mut self.store,
            bus,
            console: &mut self.console,
            delay: &mut self.delay,
        }
    }

    pub fn run(&mut self, firmware: &mut TestFirmware, line: &str) -> Reply {
        firmware.execute(line, &mut self.services())
    }

    /// Plays back and clears the scheduled jobs, one `step` per pulse.
    pub fn drain_jobs(&mut self, firmware: &mut TestFirmware) {
        for job in self.scheduler.jobs.drain(..) {
            for _ in 0..job.count {
                firmware
                    .motor_mut()
                    .step(job.direction.into(), false, job.track_desired)
                    .unwrap();
            }
        }
    }
}
