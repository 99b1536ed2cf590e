//! Uniform sampling grid and FFT-ordering helpers.

use serde::{Deserialize, Serialize};

/// Pixel counts plus per-axis pixel calibration.
///
/// Calibrations are in ångström for electron work and metres for the
/// photons pipeline. Storage is row-major: `idx = iy * nx + ix`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grid2D {
    pub nx: usize,
    pub ny: usize,
    #[serde(default = "default_calibration")]
    pub dx: f64,
    #[serde(default = "default_calibration")]
    pub dy: f64,
}

impl Grid2D {
    pub fn new(nx: usize, ny: usize, dx: f64, dy: f64) -> Self {
        Self { nx, ny, dx, dy }
    }

    /// Square pixels of size `calib` on both axes.
    pub fn square(nx: usize, ny: usize, calib: f64) -> Self {
        Self::new(nx, ny, calib, calib)
    }

    #[inline]
    pub fn idx(&self, ix: usize, iy: usize) -> usize {
        iy * self.nx + ix
    }

    pub fn len(&self) -> usize {
        self.nx * self.ny
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Field of view `[fov_y, fov_x]`.
    pub fn field_of_view(&self) -> [f64; 2] {
        [self.ny as f64 * self.dy, self.nx as f64 * self.dx]
    }

    /// Spatial frequencies along y in FFT order.
    pub fn qy(&self) -> Vec<f64> {
        fft_freq(self.ny, self.dy)
    }

    /// Spatial frequencies along x in FFT order.
    pub fn qx(&self) -> Vec<f64> {
        fft_freq(self.nx, self.dx)
    }

    /// Pixel counts agree; calibrations are not compared.
    pub fn same_shape(&self, other: &Grid2D) -> bool {
        self.nx == other.nx && self.ny == other.ny
    }
}

fn default_calibration() -> f64 {
    1.0
}

/// Sample frequencies with the zero-first ordering used by the FFT backends.
///
/// Index `i <= (n - 1) / 2` maps to `i / (n d)`, the rest wrap to negative
/// frequencies, matching `numpy.fft.fftfreq`.
pub fn fft_freq(n: usize, d: f64) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    let scale = 1.0 / (n as f64 * d);
    let positive_end = (n - 1) / 2;
    (0..n)
        .map(|i| {
            let centered = if i <= positive_end {
                i as isize
            } else {
                i as isize - n as isize
            };
            centered as f64 * scale
        })
        .collect()
}

/// Circularly roll a row-major 2D array by `(shift_y, shift_x)`.
pub fn roll<T: Copy>(data: &[T], nx: usize, ny: usize, shift_y: usize, shift_x: usize) -> Vec<T> {
    assert_eq!(data.len(), nx * ny, "data length must match grid size");
    let mut out = data.to_vec();
    for iy in 0..ny {
        let ty = (iy + shift_y) % ny;
        for ix in 0..nx {
            let tx = (ix + shift_x) % nx;
            out[ty * nx + tx] = data[iy * nx + ix];
        }
    }
    out
}

/// Move the zero-frequency sample to the centre pixel `(ny / 2, nx / 2)`.
pub fn fft_shift<T: Copy>(data: &[T], nx: usize, ny: usize) -> Vec<T> {
    roll(data, nx, ny, ny / 2, nx / 2)
}

/// Inverse of [`fft_shift`], also its adjoint.
pub fn ifft_shift<T: Copy>(data: &[T], nx: usize, ny: usize) -> Vec<T> {
    roll(data, nx, ny, ny - ny / 2, nx - nx / 2)
}
