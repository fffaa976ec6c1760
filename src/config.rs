/// Screen geometry and orientation shared by both controllers.
///
/// Immutable once handed to a driver; the XPT2046 additionally exposes
/// runtime setters for the orientation flags because panels are often
/// rotated after bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub struct TouchConfig {
  /// Horizontal screen-space bound raw readings are scaled into.
  pub x_max: u16,
  /// Vertical screen-space bound raw readings are scaled into.
  pub y_max: u16,
  /// Exchange the x and y axes at query time.
  pub swap_xy: bool,
  /// Mirror the (post-swap) x axis against `x_max` at query time.
  pub mirror_x: bool,
  /// Mirror the y axis against `y_max` at query time.
  pub mirror_y: bool,
}

impl TouchConfig {
  /// Configuration for a panel of the given resolution, unrotated.
  ///
  /// # Panics
  ///
  /// When either bound is zero.
  pub fn new(x_max: u16, y_max: u16) -> Self {
    assert!(x_max > 0 && y_max > 0, "screen bounds must be nonzero");
    Self { x_max, y_max, swap_xy: false, mirror_x: false, mirror_y: false }
  }

  pub fn with_swap_xy(mut self, swap: bool) -> Self {
    self.swap_xy = swap;
    self
  }

  pub fn with_mirror_x(mut self, mirror: bool) -> Self {
    self.mirror_x = mirror;
    self
  }

  pub fn with_mirror_y(mut self, mirror: bool) -> Self {
    self.mirror_y = mirror;
    self
  }
}
