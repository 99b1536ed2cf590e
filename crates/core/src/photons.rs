//! Scalar optical microscope model: thin lenses, apertures and Fraunhofer
//! propagation onto a camera.
//!
//! Lengths are in metres. Fields are centred: the optical axis sits on pixel
//! `(ny / 2, nx / 2)`. Positions are `(y, x)` like everywhere else in the
//! crate.

use std::f64::consts::PI;

use num_complex::Complex64;
use rayon::prelude::*;

use crate::{
    backend::SpectralBackend,
    error::{PtychoError, Result},
    field::{Field2D, RealField2D},
    grid::{fft_shift, ifft_shift, Grid2D},
};

/// Monochromatic scalar wavefront sampled on square pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct OpticalWavefront {
    pub field: Field2D,
    pub wavelength: f64,
    pub dx: f64,
    pub z_position: f64,
}

impl OpticalWavefront {
    /// The field grid is relabelled with pixel size `dx`.
    pub fn new(field: Field2D, wavelength: f64, dx: f64, z_position: f64) -> Self {
        let grid = field.grid();
        Self {
            field: field.with_grid(Grid2D::square(grid.nx, grid.ny, dx)),
            wavelength,
            dx,
            z_position,
        }
    }

    fn with_field(&self, field: Field2D) -> Self {
        Self::new(field, self.wavelength, self.dx, self.z_position)
    }
}

/// Complex transmission of a thin sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleFunction {
    pub sample: Field2D,
    pub dx: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LensParams {
    pub focal_length: f64,
    pub diameter: f64,
}

/// Intensity recorded on the camera.
#[derive(Debug, Clone, PartialEq)]
pub struct Diffractogram {
    pub image: RealField2D,
    pub wavelength: f64,
    pub dx: f64,
}

/// One diffractogram per scan position.
#[derive(Debug, Clone, PartialEq)]
pub struct MicroscopeData {
    pub image_data: Vec<RealField2D>,
    pub positions: Vec<[f64; 2]>,
    pub wavelength: f64,
    pub dx: f64,
}

/// Camera and optics settings shared by every position of a scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSetup {
    pub zoom_factor: f64,
    pub aperture_diameter: f64,
    pub travel_distance: f64,
    pub camera_pixel_size: f64,
    /// Aperture centre `(y, x)` relative to the optical axis; `None` is
    /// on-axis.
    pub aperture_center: Option<[f64; 2]>,
}

/// Physical coordinate of pixel `i` on an axis of `n` pixels.
fn centred(i: usize, n: usize, dx: f64) -> f64 {
    (i as f64 - (n / 2) as f64) * dx
}

/// Thin lens: phase `-pi (x^2 + y^2) / (lambda f)` inside the lens
/// diameter, zero transmission outside.
pub fn lens_propagation(incoming: &OpticalWavefront, lens: LensParams) -> OpticalWavefront {
    let grid = incoming.field.grid();
    let radius_sq = (lens.diameter / 2.0).powi(2);
    let screen = Field2D::from_fn(grid, |ix, iy| {
        let x = centred(ix, grid.nx, incoming.dx);
        let y = centred(iy, grid.ny, incoming.dx);
        let r_sq = x * x + y * y;
        if r_sq <= radius_sq {
            Complex64::from_polar(1.0, -PI * r_sq / (incoming.wavelength * lens.focal_length))
        } else {
            Complex64::default()
        }
    });
    let mut field = incoming.field.clone();
    field.mul_assign_elementwise(screen.as_slice());
    incoming.with_field(field)
}

/// Multiply the wavefront by the sample transmission.
pub fn linear_interaction(sample: &SampleFunction, light: &OpticalWavefront) -> OpticalWavefront {
    let mut field = light.field.clone();
    field.mul_assign_elementwise(sample.sample.as_slice());
    light.with_field(field)
}

/// Magnify the wavefront: same samples, pixel size multiplied by `zoom`.
pub fn optical_zoom(wave: &OpticalWavefront, zoom: f64) -> OpticalWavefront {
    OpticalWavefront::new(
        wave.field.clone(),
        wave.wavelength,
        wave.dx * zoom,
        wave.z_position,
    )
}

/// Block everything outside a disc of `diameter`.
pub fn circular_aperture(
    wave: &OpticalWavefront,
    diameter: f64,
    center: Option<[f64; 2]>,
) -> OpticalWavefront {
    let grid = wave.field.grid();
    let [cy, cx] = center.unwrap_or([0.0, 0.0]);
    let radius_sq = (diameter / 2.0).powi(2);
    let mut field = wave.field.clone();
    for iy in 0..grid.ny {
        let y = centred(iy, grid.ny, wave.dx) - cy;
        for ix in 0..grid.nx {
            let x = centred(ix, grid.nx, wave.dx) - cx;
            if x * x + y * y > radius_sq {
                *field.get_mut(ix, iy) = Complex64::default();
            }
        }
    }
    wave.with_field(field)
}

/// Far-field propagation over `distance`.
///
/// Centred unitary FFT; the output pixel size is `lambda z / (N dx)`.
pub fn fraunhofer_prop<B: SpectralBackend>(
    backend: &B,
    wave: &OpticalWavefront,
    distance: f64,
) -> OpticalWavefront {
    let grid = wave.field.grid();
    let mut field = Field2D::from_vec(grid, ifft_shift(wave.field.as_slice(), grid.nx, grid.ny));
    backend.forward_fft_2d(&mut field);
    let mut field = Field2D::from_vec(grid, fft_shift(field.as_slice(), grid.nx, grid.ny));
    field.scale(1.0 / (grid.len() as f64).sqrt());
    let dx = wave.wavelength * distance / (grid.nx as f64 * wave.dx);
    OpticalWavefront::new(field, wave.wavelength, dx, wave.z_position + distance)
}

/// Resample onto pixels of size `new_dx`, keeping the array shape.
///
/// Bilinear interpolation about the optical axis; samples falling outside
/// the original field are zero.
pub fn scale_pixel(wave: &OpticalWavefront, new_dx: f64) -> OpticalWavefront {
    let grid = wave.field.grid();
    let ratio = new_dx / wave.dx;
    let (cx, cy) = ((grid.nx / 2) as f64, (grid.ny / 2) as f64);
    let sample = |ix: isize, iy: isize| -> Complex64 {
        if ix < 0 || iy < 0 || ix as usize >= grid.nx || iy as usize >= grid.ny {
            Complex64::default()
        } else {
            *wave.field.get(ix as usize, iy as usize)
        }
    };
    let field = Field2D::from_fn(grid, |ix, iy| {
        let sx = (ix as f64 - cx) * ratio + cx;
        let sy = (iy as f64 - cy) * ratio + cy;
        let (x0, y0) = (sx.floor(), sy.floor());
        let (fx, fy) = (sx - x0, sy - y0);
        let (x0, y0) = (x0 as isize, y0 as isize);
        sample(x0, y0) * ((1.0 - fx) * (1.0 - fy))
            + sample(x0 + 1, y0) * (fx * (1.0 - fy))
            + sample(x0, y0 + 1) * ((1.0 - fx) * fy)
            + sample(x0 + 1, y0 + 1) * (fx * fy)
    });
    OpticalWavefront::new(field, wave.wavelength, new_dx, wave.z_position)
}

pub fn field_intensity(field: &Field2D) -> RealField2D {
    field.intensity()
}

/// Sample, zoom, aperture, far field, camera resampling, intensity.
pub fn simple_diffractogram<B: SpectralBackend>(
    backend: &B,
    sample_cut: &SampleFunction,
    lightwave: &OpticalWavefront,
    camera: CameraSetup,
) -> Diffractogram {
    let at_sample = linear_interaction(sample_cut, lightwave);
    let zoomed = optical_zoom(&at_sample, camera.zoom_factor);
    let after_aperture = circular_aperture(&zoomed, camera.aperture_diameter, camera.aperture_center);
    let at_camera = fraunhofer_prop(backend, &after_aperture, camera.travel_distance);
    let scaled = scale_pixel(&at_camera, camera.camera_pixel_size);
    Diffractogram {
        image: field_intensity(&scaled.field),
        wavelength: scaled.wavelength,
        dx: scaled.dx,
    }
}

/// Diffractogram at every scan position.
///
/// For each `(y, x)` position a window the size of the illumination is cut
/// from the sample, starting at `floor(p / dx - size / 2)` and clamped to
/// stay inside the sample. Positions run in parallel; output order matches
/// `positions`.
pub fn simple_microscope<B: SpectralBackend>(
    backend: &B,
    sample: &SampleFunction,
    positions: &[[f64; 2]],
    lightwave: &OpticalWavefront,
    camera: CameraSetup,
) -> Result<MicroscopeData> {
    let window = lightwave.field.grid();
    let full = sample.sample.grid();
    if window.nx > full.nx || window.ny > full.ny {
        return Err(PtychoError::ShapeMismatch(format!(
            "illumination {}x{} is larger than the sample {}x{}",
            window.ny, window.nx, full.ny, full.nx
        )));
    }
    let max_y = (full.ny - window.ny) as f64;
    let max_x = (full.nx - window.nx) as f64;

    let image_data = positions
        .par_iter()
        .map(|&[y, x]| {
            let start_y = (y / lightwave.dx - 0.5 * window.ny as f64).floor().clamp(0.0, max_y) as usize;
            let start_x = (x / lightwave.dx - 0.5 * window.nx as f64).floor().clamp(0.0, max_x) as usize;
            let cut = Field2D::from_fn(Grid2D::square(window.nx, window.ny, sample.dx), |ix, iy| {
                *sample.sample.get(start_x + ix, start_y + iy)
            });
            let cut = SampleFunction {
                sample: cut,
                dx: sample.dx,
            };
            simple_diffractogram(backend, &cut, lightwave, camera).image
        })
        .collect();

    Ok(MicroscopeData {
        image_data,
        positions: positions.to_vec(),
        wavelength: lightwave.wavelength,
        dx: lightwave.dx,
    })
}
