//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements                       | Connects to                  |
//! |------------|----------------------------------|------------------------------|
//! | `hardware` | EncoderPort, MotorPort,          | AS5600 (I2C), step/dir GPIO, |
//! |            | IndicatorPort                    | RGB LED (PWM)                |
//! | `log_sink` | EventSink                        | Serial log output            |
//! | `nvs`      | ConfigPort                       | NVS / in-memory store        |
//! | `sim`      | EncoderPort, MotorPort,          | Simulated vent mechanism     |
//! |            | IndicatorPort, Clock             |                              |
//! | `time`     | Clock                            | ESP32 system timer / Instant |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod sim;
pub mod time;
