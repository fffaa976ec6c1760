//! XPT2046 resistive single-touch controller.
//!
//! The chip is a bare touch-screen ADC: every quantity is obtained by
//! issuing a conversion command and reading back a 16-bit response. A cycle
//! first measures contact pressure through the two Z channels; only when the
//! pressure clears the configured threshold are the X/Y channels sampled,
//! oversampled and averaged to tame the sensor noise, then scaled into the
//! configured screen space. Orientation (swap/mirror) is applied when the
//! consumer drains the point, not at acquisition time.

use log::warn;

use crate::bus::RegisterBus;
use crate::config::TouchConfig;
use crate::state::{TouchPoint, TouchState};
use crate::{Error, TouchController};

// Conversion command bytes: S=1, 12-bit mode, differential reference unless
// noted. See the XPT2046 datasheet, table 5.
const CMD_READ_Z1: u8 = 0xB1;
const CMD_READ_Z2: u8 = 0xC1;
const CMD_READ_Y: u8 = 0x91;
const CMD_READ_X: u8 = 0xD1;
// Single-ended, internal 2.5 V reference, PD1=PD2=1.
const CMD_READ_BATTERY: u8 = 0xA7;
// Z1 conversion that leaves the chip powered down afterwards.
const CMD_POWER_DOWN: u8 = 0xB0;

/// Full scale of the 12-bit ADC.
const ADC_LIMIT: u16 = 1 << 12;

/// Default pressure threshold below which the panel counts as untouched.
pub const DEFAULT_Z_THRESHOLD: u16 = 400;
/// Default number of averaged X/Y sample pairs per acquisition.
pub const DEFAULT_OVERSAMPLE: u16 = 4;

/// XPT2046 driver.
pub struct Xpt2046<B> {
  bus: B,
  config: TouchConfig,
  z_threshold: u16,
  oversample: u16,
  state: TouchState,
}

impl<B> Xpt2046<B> {
  /// Driver with the default pressure threshold and oversampling.
  ///
  /// Construction does not touch the bus; the chip needs no reset or probe
  /// sequence.
  pub fn new(bus: B, config: TouchConfig) -> Self {
    Self {
      bus,
      config,
      z_threshold: DEFAULT_Z_THRESHOLD,
      oversample: DEFAULT_OVERSAMPLE,
      state: TouchState::new(),
    }
  }

  /// Pressure value a contact must reach to register as a touch.
  pub fn with_z_threshold(mut self, threshold: u16) -> Self {
    self.z_threshold = threshold;
    self
  }

  /// Number of averaged X/Y sample pairs per acquisition.
  ///
  /// # Panics
  ///
  /// When `samples` is zero.
  pub fn with_oversample(mut self, samples: u16) -> Self {
    assert!(samples > 0, "oversample count must be nonzero");
    self.oversample = samples;
    self
  }

  /// Tear the driver down, handing back the bus.
  pub fn release(self) -> B {
    self.bus
  }

  pub fn swap_xy(&self) -> bool {
    self.config.swap_xy
  }

  pub fn set_swap_xy(&mut self, swap: bool) {
    self.config.swap_xy = swap;
  }

  pub fn mirror_x(&self) -> bool {
    self.config.mirror_x
  }

  pub fn set_mirror_x(&mut self, mirror: bool) {
    self.config.mirror_x = mirror;
  }

  pub fn mirror_y(&self) -> bool {
    self.config.mirror_y
  }

  pub fn set_mirror_y(&mut self, mirror: bool) {
    self.config.mirror_y = mirror;
  }
}

impl<B: RegisterBus> Xpt2046<B> {
  /// Issue a conversion command and assemble the two-byte big-endian
  /// response.
  fn command(&mut self, cmd: u8) -> Result<u16, Error<B::Error>> {
    let mut buf = [0u8; 2];
    self.bus.read(u16::from(cmd), &mut buf).map_err(Error::Bus)?;
    Ok(u16::from_be_bytes(buf))
  }

  /// Run one acquisition cycle.
  ///
  /// Pressure below the threshold publishes an empty point set; that is a
  /// normal outcome, not an error. A bus failure aborts the cycle and the
  /// store keeps its previous contents.
  pub fn read_data(&mut self) -> Result<(), Error<B::Error>> {
    let z1 = self.command(CMD_READ_Z1).map_err(|e| {
      warn!("XPT2046 Z1 conversion failed");
      e
    })?;
    let z2 = self.command(CMD_READ_Z2).map_err(|e| {
      warn!("XPT2046 Z2 conversion failed");
      e
    })?;

    // Fold both readings down to the 12-bit range and combine them into a
    // single pressure value.
    let z = (z1 >> 3) + (ADC_LIMIT - (z2 >> 3));

    let mut point = TouchPoint::new(0, 0, z);
    let touched = z >= self.z_threshold;
    if touched {
      // The first conversion after a channel switch is unreliable; throw
      // it away.
      self.command(CMD_READ_X).map_err(|e| {
        warn!("XPT2046 X conversion failed");
        e
      })?;

      let mut sum_x = 0u32;
      let mut sum_y = 0u32;
      for _ in 0..self.oversample {
        sum_x += u32::from(self.command(CMD_READ_X).map_err(|e| {
          warn!("XPT2046 X conversion failed");
          e
        })?);
        sum_y += u32::from(self.command(CMD_READ_Y).map_err(|e| {
          warn!("XPT2046 Y conversion failed");
          e
        })?);
      }

      point.x = average(sum_x, self.oversample, self.config.x_max);
      point.y = average(sum_y, self.oversample, self.config.y_max);
    }

    self.state.commit_points(if touched { core::slice::from_ref(&point) } else { &[] });
    Ok(())
  }

  /// Drain the point published by the last acquisition cycle, applying the
  /// configured orientation: swap the axes first, then mirror the post-swap
  /// x against `x_max` and y against `y_max`.
  pub fn get_xy(&self, out: &mut [TouchPoint]) -> usize {
    let count = self.state.drain_points(out);
    for point in &mut out[..count] {
      if self.config.swap_xy {
        core::mem::swap(&mut point.x, &mut point.y);
      }
      if self.config.mirror_x {
        point.x = self.config.x_max.saturating_sub(point.x);
      }
      if self.config.mirror_y {
        point.y = self.config.y_max.saturating_sub(point.y);
      }
    }
    count
  }

  /// Supply voltage on the VBAT input.
  ///
  /// The chip reports a quarter of the true voltage against its internal
  /// 2.5 V reference.
  pub fn battery_voltage(&mut self) -> Result<f32, Error<B::Error>> {
    let raw = self.command(CMD_READ_BATTERY).map_err(|e| {
      warn!("XPT2046 battery conversion failed");
      e
    })?;
    Ok(f32::from(raw) * 4.0 * 2.5 / f32::from(ADC_LIMIT))
  }

  /// Issue the powered-down Z1 conversion, leaving the chip in its
  /// low-power state. Bus failures are reported but change nothing else.
  pub fn enter_sleep(&mut self) -> Result<(), Error<B::Error>> {
    self.command(CMD_POWER_DOWN).map(|_| ()).map_err(|e| {
      warn!("XPT2046 power-down conversion failed");
      e
    })
  }

  /// Re-prime the chip out of power-down with a normal Z1 conversion, the
  /// response of which is discarded.
  pub fn exit_sleep(&mut self) -> Result<(), Error<B::Error>> {
    self.command(CMD_READ_Z1).map(|_| ()).map_err(|e| {
      warn!("XPT2046 Z1 conversion failed");
      e
    })
  }
}

/// Drop the accumulated readings to the 12-bit range, average, and scale
/// into screen space. Float math keeps the precision until the final
/// truncation.
fn average(sum: u32, samples: u16, bound: u16) -> u16 {
  ((sum >> 3) as f32 / f32::from(ADC_LIMIT) / f32::from(samples) * f32::from(bound)) as u16
}

impl<B: RegisterBus> TouchController for Xpt2046<B> {
  type Error = Error<B::Error>;

  /// The XPT2046 has no reset line; this is a no-op.
  fn reset(&mut self) -> Result<(), Self::Error> {
    warn!("XPT2046 has no reset line");
    Ok(())
  }

  fn enter_sleep(&mut self) -> Result<(), Self::Error> {
    Xpt2046::enter_sleep(self)
  }

  fn exit_sleep(&mut self) -> Result<(), Self::Error> {
    Xpt2046::exit_sleep(self)
  }

  fn read_data(&mut self) -> Result<(), Self::Error> {
    Xpt2046::read_data(self)
  }

  fn get_xy(&self, out: &mut [TouchPoint]) -> usize {
    Xpt2046::get_xy(self, out)
  }

  /// The XPT2046 reports no touch keys; every index is out of range.
  fn get_button_state(&self, n: usize) -> Result<u8, Self::Error> {
    self.state.button_state(n).ok_or(Error::OutOfRange)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bus::mock::{ScriptBus, Step};

  fn be(value: u16) -> [u8; 2] {
    value.to_be_bytes()
  }

  #[test]
  fn pressure_below_threshold_yields_no_points() {
    // z = (0 >> 3) + (4096 - (32760 >> 3)) = 1, well under the default 400.
    let z1 = be(0);
    let z2 = be(4095 << 3);
    let steps = [
      Step::Read(CMD_READ_Z1.into(), &z1),
      Step::Read(CMD_READ_Z2.into(), &z2),
    ];

    let mut touch = Xpt2046::new(ScriptBus::new(&steps), TouchConfig::new(240, 320));
    touch.read_data().unwrap();

    let mut out = [TouchPoint::default(); 1];
    assert_eq!(touch.get_xy(&mut out), 0);

    touch.release().finish();
  }

  #[test]
  fn pressure_at_threshold_yields_one_point() {
    // z = 400 + (4096 - 4096) = 400, exactly the default threshold.
    let z1 = be(400 << 3);
    let z2 = be(4096 << 3);
    let x = be(8000);
    let y = be(4000);
    let steps = [
      Step::Read(CMD_READ_Z1.into(), &z1),
      Step::Read(CMD_READ_Z2.into(), &z2),
      // Discarded first conversion, then one sample pair.
      Step::Read(CMD_READ_X.into(), &x),
      Step::Read(CMD_READ_X.into(), &x),
      Step::Read(CMD_READ_Y.into(), &y),
    ];

    let mut touch =
      Xpt2046::new(ScriptBus::new(&steps), TouchConfig::new(240, 320)).with_oversample(1);
    touch.read_data().unwrap();

    let mut out = [TouchPoint::default(); 1];
    assert_eq!(touch.get_xy(&mut out), 1);
    assert_eq!(out[0].strength, 400);

    touch.release().finish();
  }

  #[test]
  fn averaging_matches_reference_formula() {
    let z1 = be(3000 << 3);
    let z2 = be(4095 << 3);
    let xs = [8000u16, 8080, 8160];
    let ys = [4000u16, 4000, 4000];
    let x0 = be(xs[0]);
    let x1 = be(xs[1]);
    let x2 = be(xs[2]);
    let y0 = be(ys[0]);
    let discard = be(123);
    let steps = [
      Step::Read(CMD_READ_Z1.into(), &z1),
      Step::Read(CMD_READ_Z2.into(), &z2),
      Step::Read(CMD_READ_X.into(), &discard),
      Step::Read(CMD_READ_X.into(), &x0),
      Step::Read(CMD_READ_Y.into(), &y0),
      Step::Read(CMD_READ_X.into(), &x1),
      Step::Read(CMD_READ_Y.into(), &y0),
      Step::Read(CMD_READ_X.into(), &x2),
      Step::Read(CMD_READ_Y.into(), &y0),
    ];

    let mut touch =
      Xpt2046::new(ScriptBus::new(&steps), TouchConfig::new(240, 320)).with_oversample(3);
    touch.read_data().unwrap();

    let sum_x: u32 = xs.iter().map(|&v| u32::from(v)).sum();
    let sum_y: u32 = ys.iter().map(|&v| u32::from(v)).sum();
    let expected_x = ((sum_x >> 3) as f32 / 4096.0 / 3.0 * 240.0) as u16;
    let expected_y = ((sum_y >> 3) as f32 / 4096.0 / 3.0 * 320.0) as u16;

    let mut out = [TouchPoint::default(); 1];
    assert_eq!(touch.get_xy(&mut out), 1);
    assert_eq!(out[0].x, expected_x);
    assert_eq!(out[0].y, expected_y);

    touch.release().finish();
  }

  #[test]
  fn orientation_swaps_then_mirrors() {
    let config = TouchConfig::new(100, 240).with_swap_xy(true).with_mirror_x(true);
    let touch = Xpt2046::new(ScriptBus::new(&[]), config);

    touch.state.commit_points(&[TouchPoint::new(5, 8, 77)]);
    let mut out = [TouchPoint::default(); 1];
    assert_eq!(touch.get_xy(&mut out), 1);
    // Swap makes (8, 5); mirror_x turns x into 100 - 8 = 92.
    assert_eq!(out[0], TouchPoint::new(92, 5, 77));
  }

  #[test]
  fn orientation_setters_take_effect_on_next_query() {
    let mut touch = Xpt2046::new(ScriptBus::new(&[]), TouchConfig::new(100, 240));
    assert!(!touch.mirror_y());
    touch.set_mirror_y(true);
    assert!(touch.mirror_y());

    touch.state.commit_points(&[TouchPoint::new(5, 8, 1)]);
    let mut out = [TouchPoint::default(); 1];
    assert_eq!(touch.get_xy(&mut out), 1);
    assert_eq!(out[0], TouchPoint::new(5, 232, 1));
  }

  #[test]
  fn get_xy_is_consuming() {
    let touch = Xpt2046::new(ScriptBus::new(&[]), TouchConfig::new(240, 320));

    touch.state.commit_points(&[TouchPoint::new(5, 8, 1)]);
    let mut out = [TouchPoint::default(); 1];
    assert_eq!(touch.get_xy(&mut out), 1);
    assert_eq!(touch.get_xy(&mut out), 0);
  }

  #[test]
  fn battery_voltage_formula() {
    let raw = be(2048);
    let steps = [Step::Read(CMD_READ_BATTERY.into(), &raw)];

    let mut touch = Xpt2046::new(ScriptBus::new(&steps), TouchConfig::new(240, 320));
    assert_eq!(touch.battery_voltage().unwrap(), 5.0);

    touch.release().finish();
  }

  #[test]
  fn sleep_and_wake_issue_expected_commands() {
    let response = be(0);
    let steps = [
      Step::Read(CMD_POWER_DOWN.into(), &response),
      Step::Read(CMD_READ_Z1.into(), &response),
    ];

    let mut touch = Xpt2046::new(ScriptBus::new(&steps), TouchConfig::new(240, 320));
    touch.enter_sleep().unwrap();
    touch.exit_sleep().unwrap();

    touch.release().finish();
  }

  #[test]
  fn failed_conversion_keeps_previous_cycle() {
    let z1 = be(0);
    let steps = [
      Step::Read(CMD_READ_Z1.into(), &z1),
      Step::ReadFault(CMD_READ_Z2.into()),
    ];

    let mut touch = Xpt2046::new(ScriptBus::new(&steps), TouchConfig::new(240, 320));
    touch.state.commit_points(&[TouchPoint::new(11, 22, 33)]);

    assert!(matches!(touch.read_data(), Err(Error::Bus(_))));

    let mut out = [TouchPoint::default(); 1];
    assert_eq!(touch.get_xy(&mut out), 1);
    assert_eq!(out[0], TouchPoint::new(11, 22, 33));

    touch.release().finish();
  }

  #[test]
  fn button_queries_are_always_out_of_range() {
    let touch = Xpt2046::new(ScriptBus::new(&[]), TouchConfig::new(240, 320));
    assert_eq!(TouchController::get_button_state(&touch, 0), Err(Error::OutOfRange));
  }
}
