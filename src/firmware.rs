//! Owning context of the drive engine and the command dispatcher.
//!
//! Every query/command pair follows the same shape: with its parameter the command sets and
//! replies `ok`, without it the command replies with the current value as text.

use core::fmt;
use core::str::FromStr;

use embedded_hal::blocking::delay::DelayMs;
use libm::roundf;

use crate::motor::{Encoder, StepperMotor};
use crate::{
    Axis, BusId, CoilOutput, Command, CurrentPolicy, Direction, DistanceMode, Error, Family,
    Feedback, MotorState, ParameterStore, Pid, Planner, Reply, Settings, StepJob, StepScheduler,
    StepSource, VERSION, angle_to_steps,
};

type Outcome = Result<Reply, Error>;

/// Pause between the `M154` notice and the first sample.
const TUNING_NOTICE_DELAY_MS: u32 = 1000;

/// CAN transport to the other boards.
pub trait MessageBus {
    /// # Errors
    /// Returns `Error::InvalidValue` if the frame cannot be queued.
    fn send(&mut self, id: BusId, message: &str) -> Result<(), Error>;
}

/// Serial port the protocol arrives on.
pub trait Console {
    /// Whether at least one input byte is waiting.
    fn input_pending(&mut self) -> bool;

    /// Discards waiting input.
    fn clear_input(&mut self);

    fn write_line(&mut self, line: &str);
}

/// External collaborators a command may need.
pub struct Services<'a> {
    pub scheduler: &'a mut dyn StepScheduler,
    pub store: &'a mut dyn ParameterStore,
    /// `None` on boards built without a bus.
    pub bus: Option<&'a mut dyn MessageBus>,
    pub console: &'a mut dyn Console,
    pub delay: &'a mut dyn DelayMs<u32>,
}

impl fmt::Debug for Services<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("bus", &self.bus.is_some())
            .finish_non_exhaustive()
    }
}

/// Parameter `letter` parsed as `T`. An absent or empty value is `None`.
fn param<T: FromStr>(command: &Command<'_>, letter: char) -> Result<Option<T>, Error> {
    match command.value(letter).map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|_| Error::InvalidValue),
    }
}

/// Flag parameter; anything but `0` or `1` reads as absent.
fn flag(command: &Command<'_>, letter: char) -> Option<bool> {
    match command.int(letter) {
        Some(0) => Some(false),
        Some(1) => Some(true),
        _ => None,
    }
}

/// Microstep divisors selected by the two dip switches, indexed by `dip1 | dip2 << 1`.
const DIP_MICROSTEPPING: [u16; 4] = [4, 8, 16, 32];

/// Divisor selected by the dip switches, after applying the board's inversion flag.
#[must_use]
pub const fn dip_microstepping(dips: [bool; 2], inverted: bool) -> u16 {
    let dip1 = (dips[0] != inverted) as usize;
    let dip2 = (dips[1] != inverted) as usize;
    DIP_MICROSTEPPING[dip1 | (dip2 << 1)]
}

fn ok() -> Outcome {
    Ok(Feedback::Ok.into())
}

/// The drive engine together with its controller and protocol state.
#[derive(Debug)]
pub struct Firmware<A, B, E> {
    motor: StepperMotor<A, B, E>,
    pid: Pid,
    planner: Planner,
    bus_id: BusId,
    dip_inverted: bool,
    axis: Axis,
    steps_per_mm: Option<f32>,
}

impl<A, B, E> Firmware<A, B, E>
where
    A: CoilOutput,
    B: CoilOutput,
    E: Encoder,
{
    /// Applies `settings` to `motor` and leaves it disabled.
    ///
    /// # Errors
    /// Returns `Error::Pin` if the coils cannot be idled.
    pub fn new(motor: StepperMotor<A, B, E>, settings: Settings) -> Result<Self, Error> {
        let mut firmware = Self {
            motor,
            pid: Pid::default(),
            planner: Planner::new(),
            bus_id: BusId::default(),
            dip_inverted: false,
            axis: Axis::A,
            steps_per_mm: None,
        };
        firmware.apply_settings(settings);
        firmware.motor.set_state(MotorState::Disabled, true)?;
        Ok(firmware)
    }

    #[must_use]
    pub const fn motor(&self) -> &StepperMotor<A, B, E> {
        &self.motor
    }

    pub const fn motor_mut(&mut self) -> &mut StepperMotor<A, B, E> {
        &mut self.motor
    }

    #[must_use]
    pub const fn pid(&self) -> &Pid {
        &self.pid
    }

    #[must_use]
    pub const fn planner(&self) -> &Planner {
        &self.planner
    }

    #[must_use]
    pub const fn bus_id(&self) -> BusId {
        self.bus_id
    }

    #[must_use]
    pub const fn axis(&self) -> Axis {
        self.axis
    }

    pub const fn set_axis(&mut self, axis: Axis) {
        self.axis = axis;
    }

    #[must_use]
    pub const fn steps_per_mm(&self) -> Option<f32> {
        self.steps_per_mm
    }

    /// Non-positive values clear the calibration.
    pub fn set_steps_per_mm(&mut self, steps_per_mm: Option<f32>) {
        self.steps_per_mm = steps_per_mm.filter(|spm| *spm > 0.0);
    }

    /// Snapshot of everything the parameter store persists.
    #[must_use]
    pub fn settings(&self) -> Settings {
        Settings {
            motor: *self.motor.config(),
            p: self.pid.p(),
            i: self.pid.i(),
            d: self.pid.d(),
            max_i: self.pid.max_i(),
            bus_id: self.bus_id,
            dip_inverted: self.dip_inverted,
            axis: self.axis,
            steps_per_mm: self.steps_per_mm,
        }
    }

    pub fn apply_settings(&mut self, settings: Settings) {
        *self.motor.config_mut() = settings.motor;
        self.pid.set_p(settings.p);
        self.pid.set_i(settings.i);
        self.pid.set_d(settings.d);
        self.pid.set_max_i(settings.max_i);
        self.bus_id = settings.bus_id;
        self.dip_inverted = settings.dip_inverted;
        self.axis = settings.axis;
        self.set_steps_per_mm(settings.steps_per_mm);
    }

    #[must_use]
    pub const fn dip_inverted(&self) -> bool {
        self.dip_inverted
    }

    /// Applies a fresh dip switch read. Ignored while the divisor is locked by `M350`.
    ///
    /// # Errors
    /// See [`crate::MotorConfig::set_microstepping`].
    pub fn dip_switches_changed(&mut self, dips: [bool; 2]) -> Result<(), Error> {
        let divisor = dip_microstepping(dips, self.dip_inverted);
        debug!("dip switches select 1/{} microstepping", divisor);
        self.motor.config_mut().set_microstepping_from_dips(divisor)
    }

    /// Runs one protocol line and returns the reply to send back.
    pub fn execute(&mut self, line: &str, services: &mut Services<'_>) -> Reply {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(feedback) => return feedback.into(),
        };

        let outcome = match command.family() {
            Family::M => self.execute_m(&command, services),
            Family::G => self.execute_g(&command, services.scheduler),
        };
        outcome.unwrap_or_else(|err| {
            warn!("command {} failed: {}", command.code(), err);
            Feedback::from(err).into()
        })
    }

    fn execute_m(&mut self, command: &Command<'_>, services: &mut Services<'_>) -> Outcome {
        match command.code() {
            17 => {
                self.motor.set_state(MotorState::ForcedEnabled, true)?;
                ok()
            }
            18 | 84 => {
                self.motor.set_state(MotorState::ForcedDisabled, true)?;
                ok()
            }
            93 => self.full_step_angle(command),
            115 => Ok(self.identify(services.bus.is_some())),
            116 => Self::forward(command, services.bus.as_deref_mut()),
            154 => self.manual_tuning(command, services),
            301 => self.pid_gains(command),
            303 => {
                self.motor.encoder_mut().calibrate();
                self.pid.reset();
                info!("encoder calibrated");
                ok()
            }
            350 => self.microstepping(command),
            352 => {
                let config = self.motor.config_mut();
                Ok(match flag(command, 'S') {
                    Some(reversed) => {
                        config.reversed = reversed;
                        Feedback::Ok.into()
                    }
                    None => Reply::text(format_args!("{}", u8::from(config.reversed))),
                })
            }
            353 => {
                let config = self.motor.config_mut();
                Ok(match flag(command, 'S') {
                    Some(inverted) => {
                        config.enable_inverted = inverted;
                        Feedback::Ok.into()
                    }
                    None => Reply::text(format_args!("{}", u8::from(config.enable_inverted))),
                })
            }
            354 => Ok(match flag(command, 'S') {
                Some(inverted) => {
                    self.dip_inverted = inverted;
                    Feedback::Ok.into()
                }
                None => Reply::text(format_args!("{}", u8::from(self.dip_inverted))),
            }),
            355 => self.microstep_multiplier(command),
            356 => self.bus_address(command, services.bus.is_some()),
            500 => {
                services.store.save(&self.settings())?;
                info!("settings saved");
                ok()
            }
            501 => {
                let settings = services.store.load()?;
                self.apply_settings(settings);
                info!("settings loaded");
                ok()
            }
            502 => {
                warn!("wiping settings");
                services.store.wipe()
            }
            907 => self.current(command),
            _ => Ok(Feedback::CmdNotAvailable.into()),
        }
    }

    fn execute_g(&mut self, command: &Command<'_>, scheduler: &mut dyn StepScheduler) -> Outcome {
        match command.code() {
            0 => self.rapid_move(command, scheduler),
            6 => self.direct_steps(command, scheduler),
            90 => {
                self.planner.set_distance_mode(DistanceMode::Absolute);
                ok()
            }
            91 => {
                self.planner.set_distance_mode(DistanceMode::Incremental);
                ok()
            }
            _ => Ok(Feedback::CmdNotAvailable.into()),
        }
    }

    fn full_step_angle(&mut self, command: &Command<'_>) -> Outcome {
        let config = self.motor.config_mut();
        if let Some(angle) = param::<f32>(command, 'V')? {
            if config.set_full_step_angle(angle).is_ok() {
                return ok();
            }
            warn!("rejected full step angle {}", angle);
        }
        Ok(Reply::text(format_args!("{}", config.full_step_angle())))
    }

    fn microstepping(&mut self, command: &Command<'_>) -> Outcome {
        let config = self.motor.config_mut();
        if let Some(divisor) = param::<u16>(command, 'V')? {
            if config.set_microstepping(divisor, true).is_ok() {
                return ok();
            }
            warn!("rejected microstep divisor {}", divisor);
        }
        Ok(Reply::text(format_args!("{}", config.microstepping())))
    }

    fn microstep_multiplier(&mut self, command: &Command<'_>) -> Outcome {
        let config = self.motor.config_mut();
        if let Some(multiplier) = param::<f32>(command, 'V')? {
            if config.set_microstep_multiplier(multiplier).is_ok() {
                return ok();
            }
            warn!("rejected microstep multiplier {}", multiplier);
        }
        Ok(Reply::text(format_args!("{}", config.microstep_multiplier())))
    }

    fn identify(&self, bus: bool) -> Reply {
        let current = if self.motor.config().current.is_dynamic() {
            "DYNAMIC"
        } else {
            "STATIC"
        };
        Reply::text(format_args!(
            "FIRMWARE_NAME:mks-servo42-fw FIRMWARE_VERSION:{VERSION} CLOSED_LOOP:1 CAN:{} CURRENT:{current}",
            u8::from(bus)
        ))
    }

    fn forward(command: &Command<'_>, bus: Option<&mut (dyn MessageBus + '_)>) -> Outcome {
        let Some(bus) = bus else {
            return Ok(Feedback::CanNotEnabled.into());
        };
        let id = command
            .value('S')
            .ok_or(Error::MissingParameter)?
            .parse::<BusId>()?;
        let message = command.string('M')?;
        bus.send(id, message)?;
        debug!("forwarded {} bytes to board {}", message.len(), id.get());
        ok()
    }

    /// Streams the filtered shaft angle every `S` milliseconds until any input arrives.
    fn manual_tuning(&mut self, command: &Command<'_>, services: &mut Services<'_>) -> Outcome {
        let interval = match param::<f32>(command, 'S')? {
            Some(interval) if interval >= 0.0 => interval,
            _ => return Ok(Feedback::NoValue.into()),
        };
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let interval_ms = roundf(interval) as u32;

        services.console.write_line(
            "Notice: The manual PID tuning is now starting. To exit, send any serial data.",
        );
        services.delay.delay_ms(TUNING_NOTICE_DELAY_MS);
        services.console.clear_input();

        while !services.console.input_pending() {
            let angle = self.motor.encoder_mut().absolute_angle_avg();
            services.console.write_line(Reply::text(format_args!("{angle}")).as_str());
            services.delay.delay_ms(interval_ms);
        }
        ok()
    }

    fn pid_gains(&mut self, command: &Command<'_>) -> Outcome {
        let p = param::<f32>(command, 'P')?;
        let i = param::<f32>(command, 'I')?;
        let d = param::<f32>(command, 'D')?;
        let max_i = param::<f32>(command, 'W')?;

        if p.is_none() && i.is_none() && d.is_none() && max_i.is_none() {
            let pid = &self.pid;
            return Ok(Reply::text(format_args!(
                "P: {} | I: {} | D: {} | W: {}",
                pid.p(),
                pid.i(),
                pid.d(),
                pid.max_i()
            )));
        }

        if let Some(p) = p {
            self.pid.set_p(p);
        }
        if let Some(i) = i {
            self.pid.set_i(i);
        }
        if let Some(d) = d {
            self.pid.set_d(d);
        }
        if let Some(max_i) = max_i {
            self.pid.set_max_i(max_i);
        }
        debug!("pid gains {} {} {}", self.pid.p(), self.pid.i(), self.pid.d());
        ok()
    }

    fn bus_address(&mut self, command: &Command<'_>, bus: bool) -> Outcome {
        if !bus {
            return Ok(Feedback::CanNotEnabled.into());
        }
        match command.value('V').map(str::trim) {
            None | Some("") => Ok(Reply::text(format_args!("{}", self.bus_id.get()))),
            Some(raw) => {
                self.bus_id = raw.parse()?;
                ok()
            }
        }
    }

    fn current(&mut self, command: &Command<'_>) -> Outcome {
        let policy = &mut self.motor.config_mut().current;

        if policy.is_dynamic() {
            let accel = param::<u16>(command, 'A')?;
            let idle = param::<u16>(command, 'I')?;
            let max = param::<u16>(command, 'M')?;
            if accel.is_none() && idle.is_none() && max.is_none() {
                if let CurrentPolicy::Dynamic { accel, idle, max } = *policy {
                    return Ok(Reply::text(format_args!("A: {accel} I: {idle} M: {max}")));
                }
            }
            policy.set_dynamic(accel, idle, max);
            return ok();
        }

        if let Some(rms) = param::<u16>(command, 'R')? {
            policy.set_rms_current(rms);
            ok()
        } else if let Some(peak) = param::<u16>(command, 'P')? {
            policy.set_peak_current(peak);
            ok()
        } else {
            Ok(Reply::text(format_args!("{}", policy.rms_current().unwrap_or_default())))
        }
    }

    /// `G0`: move the configured axis by (incremental) or to (absolute) the given distance.
    fn rapid_move(&mut self, command: &Command<'_>, scheduler: &mut dyn StepScheduler) -> Outcome {
        let Some(distance) = param::<f32>(command, self.axis.letter())? else {
            return Ok(Feedback::NoValue.into());
        };
        let feed_rate = self.planner.feed_rate(param::<f32>(command, 'F')?);
        let microstep_angle = self.motor.config().microstep_angle();

        let (target, rate_hz) = if self.axis.is_rotary() {
            (
                angle_to_steps(distance, microstep_angle),
                feed_rate / (microstep_angle * 60.0),
            )
        } else {
            let Some(steps_per_mm) = self.steps_per_mm else {
                return Ok(Feedback::StepsPerMmNotSet.into());
            };
            #[allow(clippy::cast_possible_truncation)]
            let target = roundf(distance * steps_per_mm) as i32;
            (target, feed_rate * steps_per_mm / 60.0)
        };

        let travel = self.planner.travel(target, self.motor.desired_step());
        if travel == 0 {
            return ok();
        }
        if rate_hz <= 0.0 {
            return Ok(Feedback::NoValue.into());
        }

        let job = StepJob::from_signed(travel, rate_hz, true);
        debug!("G0 {} steps at {} Hz", travel, rate_hz);
        scheduler.schedule(job);
        ok()
    }

    /// `G6`: step count, rate and direction given explicitly. `D1` turns clockwise.
    fn direct_steps(&mut self, command: &Command<'_>, scheduler: &mut dyn StepScheduler) -> Outcome {
        let count = match param::<i32>(command, 'S')? {
            Some(count) if count != 0 => count,
            _ => return Ok(Feedback::NoValue.into()),
        };
        let rate_hz = self.planner.step_rate(param::<f32>(command, 'R')?);
        if rate_hz <= 0.0 {
            return Ok(Feedback::NoValue.into());
        }

        let mut direction = if flag(command, 'D') == Some(true) {
            Direction::Negative
        } else {
            Direction::Positive
        };
        if count < 0 {
            direction = direction.reversed();
        }

        debug!("G6 {} steps at {} Hz", count, rate_hz);
        scheduler.schedule(StepJob {
            count: count.unsigned_abs(),
            rate_hz,
            direction,
            track_desired: false,
        });
        ok()
    }

    /// Runs one closed-loop iteration: steers the measured angle towards the desired one and
    /// returns the correction in microsteps. Does nothing while the motor is not enabled.
    ///
    /// # Errors
    /// Returns `Error::Pin` if the coils cannot be written.
    pub fn correct(&mut self) -> Result<f32, Error> {
        if !self.motor.state().is_enabled() {
            return Ok(0.0);
        }
        self.pid.set_setpoint(self.motor.desired_angle());
        let angle = self.motor.encoder_mut().absolute_angle();
        let output = self.pid.compute(angle);

        #[allow(clippy::cast_possible_truncation)]
        let steps = roundf(output) as i32;
        let source = StepSource::from(Direction::of(steps));
        for _ in 0..steps.unsigned_abs() {
            self.motor.step(source, false, false)?;
        }
        Ok(output)
    }
}
