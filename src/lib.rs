#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Touch input acquisition for LCD touch panels.
//!
//! Drivers for two register-addressed touch controllers that share one
//! acquisition model: a producer runs `read_data` cycles against the bus and
//! publishes calibrated screen-space points (and touch-key states) into a
//! lock-protected store, and a consumer drains them with `get_xy` /
//! `get_button_state`. The two sides may live in different execution
//! contexts; the store's critical section covers only the handoff and is
//! never held across a bus transaction.
//!
//! - [`gt911`]: Goodix GT911 capacitive controller, up to five contacts and
//!   four touch keys, probed for its native resolution at construction and
//!   scaled into the configured screen bounds.
//! - [`xpt2046`]: XPT2046 resistive controller, a single contact gated by a
//!   dual-channel pressure measurement, with oversampled averaging and a
//!   query-time orientation transform.
//!
//! Both implement [`TouchController`], so a UI stack can poll either
//! interchangeably. The bus is abstracted as [`RegisterBus`] with adapters
//! for the GT911's I²C register map ([`I2cInterface`]) and the XPT2046's SPI
//! conversion commands ([`SpiInterface`]).
//!
//! ```no_run
//! use embedded_hal::{delay::DelayNs, digital::OutputPin, i2c::I2c};
//! use lcd_touch::{gt911, I2cInterface, TouchConfig, TouchController, TouchPoint};
//!
//! fn example<I, RST, D, E>(i2c: I, reset: RST, delay: D) -> Result<(), lcd_touch::Error<E>>
//! where
//!   I: I2c<Error = E>,
//!   RST: OutputPin,
//!   D: DelayNs,
//! {
//!   let bus = I2cInterface::new(i2c, gt911::I2C_ADDR_PRIMARY);
//!   let config = TouchConfig::new(800, 480);
//!   let mut touch = gt911::Gt911Builder::new(bus, reset, delay, config).buttons(2).build()?;
//!
//!   touch.read_data()?;
//!   let mut points = [TouchPoint::default(); 5];
//!   let count = touch.get_xy(&mut points);
//!   for point in &points[..count] {
//!     // hand off to the UI stack
//!     let _ = (point.x, point.y, point.strength);
//!   }
//!   Ok(())
//! }
//! ```

mod bus;
mod config;
mod state;

pub mod gt911;
pub mod xpt2046;

pub use bus::{I2cInterface, RegisterBus, SpiInterface};
pub use config::TouchConfig;
pub use state::{DataReady, TouchPoint, MAX_BUTTONS, MAX_POINTS};

/// Errors that can occur while interacting with a touch controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum Error<E> {
  /// Register bus transaction failed with the underlying driver error.
  Bus(E),
  /// Driving the reset or interrupt line failed.
  Pin,
  /// The device reported an unexpected product identifier during probing.
  DeviceNotFound,
  /// The device probe returned an unusable configuration (zero native
  /// resolution).
  InvalidDeviceState,
  /// A button index beyond the reported button count was queried.
  OutOfRange,
}

/// Capability surface shared by every supported controller.
///
/// The concrete operation set is fixed when a driver is constructed and
/// never changes over the handle's lifetime. Acquisition and the draining
/// queries may run in different execution contexts; the internal store makes
/// the point/button handoff atomic without holding its critical section
/// across a bus transaction.
pub trait TouchController {
  type Error;

  /// Re-run the controller's hardware reset sequence, where it has one.
  fn reset(&mut self) -> Result<(), Self::Error>;

  /// Put the controller into its low-power state.
  fn enter_sleep(&mut self) -> Result<(), Self::Error>;

  /// Bring the controller back out of its low-power state.
  fn exit_sleep(&mut self) -> Result<(), Self::Error>;

  /// Run one acquisition cycle: query the controller and publish any touch
  /// points and key states to the shared store.
  ///
  /// Absence of touch data is a normal outcome, not an error. A bus failure
  /// aborts the remainder of the cycle; anything committed earlier in the
  /// same cycle stays visible, and the store otherwise keeps its last
  /// contents.
  fn read_data(&mut self) -> Result<(), Self::Error>;

  /// Drain up to `out.len()` points published by the last acquisition
  /// cycle, returning how many were delivered.
  ///
  /// Consuming: each published cycle is delivered at most once; a second
  /// call without an intervening [`TouchController::read_data`] yields zero.
  fn get_xy(&self, out: &mut [TouchPoint]) -> usize;

  /// State of touch key `n` as published by the last acquisition cycle.
  ///
  /// Fails with an out-of-range error when `n` is at or beyond the
  /// published key count.
  fn get_button_state(&self, n: usize) -> Result<u8, Self::Error>;
}
