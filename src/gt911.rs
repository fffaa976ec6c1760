//! Goodix GT911 capacitive multi-touch controller.
//!
//! The controller digitizes up to five contacts and up to four touch keys
//! on its own and exposes them through byte registers. Each acquisition
//! cycle polls the coordinate status register; when the buffer-ready bit is
//! set, the active key states and point records are read out, the raw
//! coordinates are scaled into the configured screen space using the native
//! resolution probed from the chip, and the status register is written back
//! to zero to hand the buffer to the controller for the next cycle.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::{debug, error, warn};

use crate::bus::RegisterBus;
use crate::config::TouchConfig;
use crate::state::{TouchPoint, TouchState, MAX_BUTTONS, MAX_POINTS};
use crate::{Error, TouchController};

/// I²C address selected when INT is high during reset.
pub const I2C_ADDR_PRIMARY: u8 = 0x5D;
/// I²C address selected when INT is low during reset.
pub const I2C_ADDR_SECONDARY: u8 = 0x14;

const REG_KEYS: u16 = 0x8093;
const REG_STATUS: u16 = 0x814E;
const REG_POINTS: u16 = 0x814F;
const REG_PRODUCT_INFO: u16 = 0x8140;
const REG_CONTROL: u16 = 0x8040;

const COMMAND_SLEEP: u8 = 0x05;

// Coordinate status register bits. Bit 6 flags a large-area touch; it is
// advisory and not interpreted here.
const STATUS_BUFFER_READY: u8 = 0x80;
const STATUS_HAVE_KEY: u8 = 0x10;
const STATUS_POINT_MASK: u8 = 0x0F;

const POINT_RECORD_LEN: usize = 8;
const INFO_LEN: usize = 11;

const EXPECTED_PRODUCT_ID: [u8; 4] = *b"911\0";

/// Identity and native resolution probed from the chip during construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub struct ChipInfo {
  pub product_id: [u8; 4],
  pub fw_id: u16,
  pub x_resolution: u16,
  pub y_resolution: u16,
  pub vendor_id: u8,
}

impl ChipInfo {
  /// Decode the info block read at [`REG_PRODUCT_INFO`]. Multi-byte fields
  /// are little-endian.
  fn decode(raw: &[u8; INFO_LEN]) -> Self {
    Self {
      product_id: [raw[0], raw[1], raw[2], raw[3]],
      fw_id: u16::from_le_bytes([raw[4], raw[5]]),
      x_resolution: u16::from_le_bytes([raw[6], raw[7]]),
      y_resolution: u16::from_le_bytes([raw[8], raw[9]]),
      vendor_id: raw[10],
    }
  }
}

/// Decode one 8-byte point record: event byte, x, y and area (little
/// endian), trailing reserved byte.
fn decode_point(record: &[u8]) -> (u16, u16, u16) {
  let x = u16::from_le_bytes([record[1], record[2]]);
  let y = u16::from_le_bytes([record[3], record[4]]);
  let area = u16::from_le_bytes([record[5], record[6]]);
  (x, y, area)
}

/// Scale a raw coordinate from the chip's native resolution into the
/// configured screen bound. Exact truncating rational arithmetic.
fn scale(raw: u16, bound: u16, resolution: u16) -> u16 {
  (u32::from(raw) * u32::from(bound) / u32::from(resolution)) as u16
}

fn reset_sequence<RST: OutputPin, D: DelayNs>(reset: &mut RST, delay: &mut D) -> Result<(), RST::Error> {
  // Hold RST active for at least 100 us, then give the chip 5 ms to come
  // up before the first bus access.
  reset.set_low()?;
  delay.delay_ms(1);
  reset.set_high()?;
  delay.delay_ms(5);
  Ok(())
}

fn probe<B: RegisterBus>(bus: &mut B) -> Result<ChipInfo, Error<B::Error>> {
  let mut raw = [0u8; INFO_LEN];
  bus.read(REG_PRODUCT_INFO, &mut raw).map_err(|e| {
    error!("GT911 info read failed");
    Error::Bus(e)
  })?;

  let info = ChipInfo::decode(&raw);
  if info.product_id != EXPECTED_PRODUCT_ID {
    error!("GT911 chip not found");
    return Err(Error::DeviceNotFound);
  }
  if info.x_resolution == 0 || info.y_resolution == 0 {
    error!("GT911 reports a zero native resolution");
    return Err(Error::InvalidDeviceState);
  }

  debug!(
    "GT911 fw {:04x}, native resolution {}x{}, vendor {:02x}",
    info.fw_id, info.x_resolution, info.y_resolution, info.vendor_id
  );
  Ok(info)
}

/// Placeholder for builds without a wired interrupt line.
pub struct NoInt;

impl embedded_hal::digital::ErrorType for NoInt {
  type Error = core::convert::Infallible;
}

impl OutputPin for NoInt {
  fn set_low(&mut self) -> Result<(), Self::Error> {
    Ok(())
  }

  fn set_high(&mut self) -> Result<(), Self::Error> {
    Ok(())
  }
}

/// Builder for [`Gt911`].
///
/// Construction resets the controller and probes its identity, so the
/// builder wants the reset line and a delay provider up front; the
/// interrupt line and touch-key reporting are opt-in.
pub struct Gt911Builder<B, RST, INT, D> {
  bus: B,
  reset: RST,
  int: Option<INT>,
  delay: D,
  config: TouchConfig,
  buttons: usize,
}

impl<B, RST, D> Gt911Builder<B, RST, NoInt, D> {
  pub fn new(bus: B, reset: RST, delay: D, config: TouchConfig) -> Self {
    Self { bus, reset, int: None, delay, config, buttons: 0 }
  }
}

impl<B, RST, INT, D> Gt911Builder<B, RST, INT, D> {
  /// Report the first `count` touch keys alongside coordinate data.
  ///
  /// # Panics
  ///
  /// When `count` exceeds [`MAX_BUTTONS`].
  pub fn buttons(mut self, count: usize) -> Self {
    assert!(count <= MAX_BUTTONS, "at most {} touch keys are supported", MAX_BUTTONS);
    self.buttons = count;
    self
  }

  /// Attach the controller's interrupt line, used for the wake sequence.
  ///
  /// The pin should be configured open-drain so that releasing it lets the
  /// controller drive the line again.
  pub fn interrupt_pin<I>(self, pin: I) -> Gt911Builder<B, RST, I, D> {
    Gt911Builder {
      bus: self.bus,
      reset: self.reset,
      int: Some(pin),
      delay: self.delay,
      config: self.config,
      buttons: self.buttons,
    }
  }
}

impl<B, RST, INT, D> Gt911Builder<B, RST, INT, D>
where
  B: RegisterBus,
  RST: OutputPin,
  INT: OutputPin,
  D: DelayNs,
{
  /// Reset the controller, probe its identity and native resolution, and
  /// hand back a ready driver.
  ///
  /// Fails with [`Error::Pin`] if the reset line cannot be driven,
  /// [`Error::DeviceNotFound`] if the product identifier does not read
  /// back as "911", and [`Error::InvalidDeviceState`] if either probed
  /// resolution is zero. No driver exists on failure.
  pub fn build(mut self) -> Result<Gt911<B, RST, INT, D>, Error<B::Error>> {
    reset_sequence(&mut self.reset, &mut self.delay).map_err(|_| Error::Pin)?;
    let info = probe(&mut self.bus)?;

    Ok(Gt911 {
      bus: self.bus,
      reset: self.reset,
      int: self.int,
      delay: self.delay,
      config: self.config,
      buttons: self.buttons,
      info,
      state: TouchState::new(),
    })
  }
}

/// GT911 driver.
pub struct Gt911<B, RST, INT, D> {
  bus: B,
  reset: RST,
  int: Option<INT>,
  delay: D,
  config: TouchConfig,
  buttons: usize,
  info: ChipInfo,
  state: TouchState,
}

impl<B, RST, INT, D> Gt911<B, RST, INT, D> {
  /// Identity and native resolution probed during construction.
  pub fn info(&self) -> &ChipInfo {
    &self.info
  }

  /// Tear the driver down, handing back the bus, pins, and delay provider.
  pub fn release(self) -> (B, RST, Option<INT>, D) {
    (self.bus, self.reset, self.int, self.delay)
  }
}

impl<B, RST, INT, D> Gt911<B, RST, INT, D>
where
  B: RegisterBus,
  RST: OutputPin,
  INT: OutputPin,
  D: DelayNs,
{
  /// Re-run the hardware reset sequence.
  pub fn reset(&mut self) -> Result<(), Error<B::Error>> {
    reset_sequence(&mut self.reset, &mut self.delay).map_err(|_| Error::Pin)
  }

  /// Put the controller into its low-power sleep state.
  pub fn enter_sleep(&mut self) -> Result<(), Error<B::Error>> {
    self.bus.write(REG_CONTROL, &[COMMAND_SLEEP]).map_err(|e| {
      error!("GT911 sleep command failed");
      Error::Bus(e)
    })
  }

  /// Wake the controller by pulsing the interrupt line high for 5 ms and
  /// releasing it. Succeeds as a no-op when no interrupt line is attached.
  pub fn exit_sleep(&mut self) -> Result<(), Error<B::Error>> {
    match self.int.as_mut() {
      Some(int) => {
        int.set_high().map_err(|_| Error::Pin)?;
        self.delay.delay_ms(5);
        Ok(())
      }
      None => {
        warn!("GT911 wake skipped, no interrupt line attached");
        Ok(())
      }
    }
  }

  /// Run one acquisition cycle.
  ///
  /// A clear buffer-ready bit is a normal zero-data outcome. A bus failure
  /// aborts the remainder of the cycle, including the status clear; state
  /// committed earlier in the same cycle stays visible.
  pub fn read_data(&mut self) -> Result<(), Error<B::Error>> {
    let mut status = [0u8; 1];
    self.bus.read(REG_STATUS, &mut status).map_err(|e| {
      error!("GT911 status read failed");
      Error::Bus(e)
    })?;
    let flags = status[0];

    if flags & STATUS_BUFFER_READY != 0 {
      if flags & STATUS_HAVE_KEY != 0 && self.buttons > 0 {
        let mut keys = [0u8; MAX_BUTTONS];
        self.bus.read(REG_KEYS, &mut keys[..self.buttons]).map_err(|e| {
          error!("GT911 key state read failed");
          Error::Bus(e)
        })?;
        self.state.commit_buttons(&keys[..self.buttons]);
      }

      let count = (flags & STATUS_POINT_MASK) as usize;
      if count > 0 && count <= MAX_POINTS {
        let mut raw = [0u8; MAX_POINTS * POINT_RECORD_LEN];
        self.bus.read(REG_POINTS, &mut raw[..count * POINT_RECORD_LEN]).map_err(|e| {
          error!("GT911 point read failed");
          Error::Bus(e)
        })?;

        let mut points = [TouchPoint::default(); MAX_POINTS];
        for (slot, record) in points[..count].iter_mut().zip(raw.chunks_exact(POINT_RECORD_LEN)) {
          let (x, y, area) = decode_point(record);
          slot.x = scale(x, self.config.x_max, self.info.x_resolution);
          slot.y = scale(y, self.config.y_max, self.info.y_resolution);
          slot.strength = area;
        }
        self.state.commit_points(&points[..count]);
      }
    }

    // Hand the coordinate buffer back to the controller.
    self.bus.write(REG_STATUS, &[0]).map_err(|e| {
      error!("GT911 status clear failed");
      Error::Bus(e)
    })
  }

  /// Drain the points published by the last acquisition cycle.
  ///
  /// The output swaps x and y relative to storage order; this is the
  /// controller's canonical output convention and is preserved exactly.
  pub fn get_xy(&self, out: &mut [TouchPoint]) -> usize {
    let count = self.state.drain_points(out);
    for point in &mut out[..count] {
      core::mem::swap(&mut point.x, &mut point.y);
    }
    count
  }

  /// State of touch key `n` as published by the last acquisition cycle.
  pub fn get_button_state(&self, n: usize) -> Result<u8, Error<B::Error>> {
    self.state.button_state(n).ok_or(Error::OutOfRange)
  }
}

impl<B, RST, INT, D> TouchController for Gt911<B, RST, INT, D>
where
  B: RegisterBus,
  RST: OutputPin,
  INT: OutputPin,
  D: DelayNs,
{
  type Error = Error<B::Error>;

  fn reset(&mut self) -> Result<(), Self::Error> {
    Gt911::reset(self)
  }

  fn enter_sleep(&mut self) -> Result<(), Self::Error> {
    Gt911::enter_sleep(self)
  }

  fn exit_sleep(&mut self) -> Result<(), Self::Error> {
    Gt911::exit_sleep(self)
  }

  fn read_data(&mut self) -> Result<(), Self::Error> {
    Gt911::read_data(self)
  }

  fn get_xy(&self, out: &mut [TouchPoint]) -> usize {
    Gt911::get_xy(self, out)
  }

  fn get_button_state(&self, n: usize) -> Result<u8, Self::Error> {
    Gt911::get_button_state(self, n)
  }
}
