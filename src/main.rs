//! Burnie vent controller: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter    LogEventSink   NvsAdapter   MonotonicClock │
//! │  (Encoder+Motor+    (EventSink)    (Config)     (Clock)        │
//! │   Indicator)                                                   │
//! │  SimulatedVent on the host                                     │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Machine · PositionTracker · LinearVentFunction        │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Console commands: close | stop | test | move | steps | duration│
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::io::BufRead;
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{info, warn};

use burnie::adapters::log_sink::LogEventSink;
use burnie::adapters::nvs::NvsAdapter;
use burnie::adapters::time::MonotonicClock;
use burnie::app::commands::AppCommand;
use burnie::app::ports::{Clock, ConfigPort, VentHardware};
use burnie::app::service::AppService;
use burnie::config::SystemConfig;

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. Platform bootstrap + logging ───────────────────────
    init_platform()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Burnie vent controller v{}       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Load config (store or file), then overrides ────────
    let (mut config, mut store) = load_config()?;
    config
        .apply_env_overrides(config_override)
        .context("invalid configuration override")?;
    config.validate().context("invalid configuration")?;
    info!(
        "calibration: open={} closed={}+{}rev, {} steps/rev, closing over {} s",
        config.calibration.open_raw_angle,
        config.calibration.closed_raw_angle_base,
        config.calibration.zero_crossing_count,
        config.motor.steps_per_revolution,
        config.closing_duration_secs
    );

    // ── 3. Hardware + application service ─────────────────────
    let period = Duration::from_millis(u64::from(config.control_loop_interval_ms));
    let (hardware, clock) = build_hardware(&config)?;
    let mut app = AppService::new(config, hardware, clock)?;
    let mut sink = LogEventSink::new();
    app.start(&mut sink)?;

    // ── 4. Control loop ───────────────────────────────────────
    let console = spawn_console();
    info!("control loop running every {:?}", period);
    loop {
        let started = Instant::now();

        while let Ok(line) = console.try_recv() {
            let line = line.trim();
            if line.eq_ignore_ascii_case("quit") {
                app.handle_command(AppCommand::Stop, &mut sink)?;
                app.force_save_if_dirty(&mut store);
                info!("bye");
                return Ok(());
            }
            match AppCommand::parse(line) {
                Some(cmd) => app.handle_command(cmd, &mut sink)?,
                None if line.is_empty() => {}
                None => warn!("unknown command: {:?}", line),
            }
        }

        app.tick(&mut sink)?;
        app.auto_save_if_needed(&mut store);

        std::thread::sleep(period.saturating_sub(started.elapsed()));
    }
}

/// Read console lines on a background thread so the control loop never
/// blocks on input.
fn spawn_console() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    let spawned = std::thread::Builder::new()
        .name("console".into())
        .stack_size(8192)
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        warn!("console unavailable: {}", e);
    }
    rx
}

// ── Host build: simulated vent ────────────────────────────────

#[cfg(not(feature = "espidf"))]
fn init_platform() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("logger init failed: {e}"))
}

/// First argument, if any, is a JSON config file laid over the defaults.
#[cfg(not(feature = "espidf"))]
fn load_config() -> Result<(SystemConfig, NvsAdapter)> {
    let store = NvsAdapter::new()?;
    let config = match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            let cfg = SystemConfig::from_json(&text).with_context(|| format!("parsing {path}"))?;
            info!("config loaded from {}", path);
            cfg
        }
        None => store.load()?,
    };
    Ok((config, store))
}

#[cfg(not(feature = "espidf"))]
fn config_override(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

#[cfg(not(feature = "espidf"))]
fn build_hardware(config: &SystemConfig) -> Result<(Box<dyn VentHardware>, Box<dyn Clock>)> {
    use burnie::adapters::sim::SimulatedVent;

    warn!("no hardware on this target, driving a simulated vent");
    let vent = SimulatedVent::new(config.calibration, config.motor.steps_per_revolution);
    Ok((Box::new(vent), Box::new(MonotonicClock::new())))
}

// ── Device build: ESP32 peripherals ───────────────────────────

#[cfg(feature = "espidf")]
fn init_platform() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    Ok(())
}

#[cfg(feature = "espidf")]
fn load_config() -> Result<(SystemConfig, NvsAdapter)> {
    let partition = esp_idf_svc::nvs::EspDefaultNvsPartition::take()?;
    let store = NvsAdapter::new(partition)?;
    let config = match store.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    };
    Ok((config, store))
}

/// Board settings baked in at build time.
#[cfg(feature = "espidf")]
fn config_override(key: &str) -> Option<String> {
    let value = match key {
        "OPEN_POSITION" => option_env!("OPEN_POSITION"),
        "CLOSED_POSITION" => option_env!("CLOSED_POSITION"),
        "NUM_ZERO_CROSSINGS" => option_env!("NUM_ZERO_CROSSINGS"),
        "MOTOR_STEPS_PER_REVOLUTION" => option_env!("MOTOR_STEPS_PER_REVOLUTION"),
        "CLOSING_DURATION_MINUTES" => option_env!("CLOSING_DURATION_MINUTES"),
        _ => None,
    };
    value.map(String::from)
}

#[cfg(feature = "espidf")]
fn build_hardware(config: &SystemConfig) -> Result<(Box<dyn VentHardware>, Box<dyn Clock>)> {
    use burnie::adapters::hardware::HardwareAdapter;
    use burnie::drivers::as5600::As5600;
    use burnie::drivers::status_led::StatusLed;
    use burnie::drivers::stepper::Stepper;
    use burnie::pins;
    use esp_idf_svc::hal::delay::Delay;
    use esp_idf_svc::hal::gpio::{AnyIOPin, AnyOutputPin, PinDriver};
    use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
    use esp_idf_svc::hal::ledc::config::TimerConfig;
    use esp_idf_svc::hal::ledc::{LedcDriver, LedcTimerDriver};
    use esp_idf_svc::hal::peripherals::Peripherals;
    use esp_idf_svc::hal::units::Hertz;

    let p = Peripherals::take()?;

    // SAFETY: every number in `pins` is a distinct, valid GPIO on this
    // board and each is claimed exactly once, here.
    let (sda, scl, step, dir, enable, red, green, blue) = unsafe {
        (
            AnyIOPin::new(pins::I2C_SDA_GPIO),
            AnyIOPin::new(pins::I2C_SCL_GPIO),
            AnyOutputPin::new(pins::STEP_GPIO),
            AnyOutputPin::new(pins::DIR_GPIO),
            AnyOutputPin::new(pins::ENABLE_GPIO),
            AnyOutputPin::new(pins::LED_R_GPIO),
            AnyOutputPin::new(pins::LED_G_GPIO),
            AnyOutputPin::new(pins::LED_B_GPIO),
        )
    };

    let i2c = I2cDriver::new(
        p.i2c0,
        sda,
        scl,
        &I2cConfig::new().baudrate(Hertz(pins::I2C_BAUDRATE_HZ)),
    )?;
    let encoder = As5600::new(i2c);

    let motor = Stepper::new(
        PinDriver::output(step)?,
        PinDriver::output(dir)?,
        PinDriver::output(enable)?,
        Delay::new_default(),
        config.motor.step_period_us,
    );

    // The LED channels outlive this function; the timer must too.
    let timer: &'static LedcTimerDriver<'static, _> = Box::leak(Box::new(LedcTimerDriver::new(
        p.ledc.timer0,
        &TimerConfig::default().frequency(Hertz(pins::LED_PWM_FREQ_HZ)),
    )?));
    let led = StatusLed::new(
        LedcDriver::new(p.ledc.channel0, timer, red)?,
        LedcDriver::new(p.ledc.channel1, timer, green)?,
        LedcDriver::new(p.ledc.channel2, timer, blue)?,
    );

    info!("hardware initialised");
    Ok((
        Box::new(HardwareAdapter::new(encoder, motor, led)),
        Box::new(MonotonicClock::new()),
    ))
}
