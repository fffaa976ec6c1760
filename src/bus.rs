//! Register-addressed transport the drivers talk through.
//!
//! The drivers only ever see [`RegisterBus`]; the adapters below translate
//! its register reads and writes onto the peripheral the controller is
//! actually wired to. The GT911 sits on I²C with 16-bit big-endian register
//! addresses, the XPT2046 on SPI where the "register" is a conversion
//! command byte answered within the same chip-select assertion.

use embedded_hal::i2c::{I2c, SevenBitAddress};
use embedded_hal::spi::{Operation, SpiDevice};

/// Largest payload accepted after the register address on a write.
const MAX_WRITE: usize = 8;

/// Register-addressed transport consumed by the drivers.
///
/// `read` issues the register (or command) and fills `buf` with the
/// response; `write` issues the register followed by `data`. Failures are
/// reported through the implementation's own error type and never retried
/// here; retry policy belongs to the caller.
pub trait RegisterBus {
  type Error;

  fn read(&mut self, reg: u16, buf: &mut [u8]) -> Result<(), Self::Error>;
  fn write(&mut self, reg: u16, data: &[u8]) -> Result<(), Self::Error>;
}

/// 16-bit big-endian register addressing over I²C.
pub struct I2cInterface<I> {
  i2c: I,
  address: u8,
}

impl<I> I2cInterface<I> {
  pub fn new(i2c: I, address: u8) -> Self {
    Self { i2c, address }
  }

  /// Give the wrapped peripheral back.
  pub fn release(self) -> I {
    self.i2c
  }
}

impl<I: I2c<SevenBitAddress>> RegisterBus for I2cInterface<I> {
  type Error = I::Error;

  fn read(&mut self, reg: u16, buf: &mut [u8]) -> Result<(), Self::Error> {
    self.i2c.write_read(self.address, &reg.to_be_bytes(), buf)
  }

  /// # Panics
  ///
  /// When `data` is longer than the internal write frame allows.
  fn write(&mut self, reg: u16, data: &[u8]) -> Result<(), Self::Error> {
    assert!(data.len() <= MAX_WRITE);
    let mut frame = [0u8; 2 + MAX_WRITE];
    frame[..2].copy_from_slice(&reg.to_be_bytes());
    frame[2..2 + data.len()].copy_from_slice(data);
    self.i2c.write(self.address, &frame[..2 + data.len()])
  }
}

/// Command-byte transport over SPI.
///
/// The register value is the command byte; it is clocked out and the
/// response clocked back in without releasing chip select in between.
pub struct SpiInterface<S> {
  spi: S,
}

impl<S> SpiInterface<S> {
  pub fn new(spi: S) -> Self {
    Self { spi }
  }

  /// Give the wrapped peripheral back.
  pub fn release(self) -> S {
    self.spi
  }
}

impl<S: SpiDevice<u8>> RegisterBus for SpiInterface<S> {
  type Error = S::Error;

  fn read(&mut self, reg: u16, buf: &mut [u8]) -> Result<(), Self::Error> {
    let cmd = [reg as u8];
    self.spi.transaction(&mut [Operation::Write(&cmd), Operation::Read(buf)])
  }

  fn write(&mut self, reg: u16, data: &[u8]) -> Result<(), Self::Error> {
    let cmd = [reg as u8];
    self.spi.transaction(&mut [Operation::Write(&cmd), Operation::Write(data)])
  }
}
