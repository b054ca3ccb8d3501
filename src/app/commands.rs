//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (Home Assistant,
//! serial console) that the [`AppService`](super::service::AppService)
//! interprets and acts upon.

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppCommand {
    /// Begin a closing cycle from the current position.
    StartClosing,

    /// Abandon whatever is running and release the motor.
    Stop,

    /// Move to a fractional position (0 = open, 1 = closed).
    MoveTo(f32),

    /// Move to a valve position given in motor steps open from closed.
    MoveToSteps(u32),

    /// Change the closing duration (seconds from open to closed).
    SetClosingDuration(u32),

    /// Swing the vent back and forth, logging step angle and backlash.
    SelfTest,
}

impl AppCommand {
    /// Parse a console / command-topic line.
    ///
    /// ```text
    /// close | stop | test | move <0..1> | steps <n> | duration <minutes>
    /// ```
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let verb = words.next()?;
        let arg = words.next();
        if words.next().is_some() {
            return None;
        }
        match (verb.to_ascii_lowercase().as_str(), arg) {
            ("close", None) => Some(Self::StartClosing),
            ("stop", None) => Some(Self::Stop),
            ("test", None) => Some(Self::SelfTest),
            ("move", Some(a)) => a.parse::<f32>().ok().filter(|p| p.is_finite()).map(Self::MoveTo),
            ("steps", Some(a)) => a.parse().ok().map(Self::MoveToSteps),
            ("duration", Some(a)) => a
                .parse::<u32>()
                .ok()
                .and_then(|mins| mins.checked_mul(60))
                .map(Self::SetClosingDuration),
            _ => None,
        }
    }
}
