//! Job configuration files and raw array I/O.
//!
//! Jobs are described in TOML. Array data (potential slices, probes,
//! diffraction stacks, positions) lives in headerless binary files of
//! little-endian `f64` values, row-major, with complex values interleaved as
//! `re, im`. The grid comes from the job file, so a stack's depth is inferred
//! from the file size.
//!
//! # File Format
//!
//! ```toml
//! output = "out/pacbed.bin"
//! slice_thickness = 2.0
//!
//! [grid]
//! nx = 64
//! ny = 64
//! dx = 0.1
//! dy = 0.1
//!
//! [probe]
//! aperture_mrad = 20.0
//! voltage_kv = 200.0
//!
//! [probe.aberrations]
//! defocus = 50.0
//!
//! [scan.raster]
//! start = [1.6, 1.6]
//! step = [0.4, 0.4]
//! shape = [8, 8]
//! ```

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use num_complex::Complex64;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    error::{PtychoError, Result},
    field::{Field2D, RealField2D},
    grid::Grid2D,
    metrics::MetricsConfig,
    probe::ProbeParams,
    reconstruction::{Acquisition, ReconstructionOptions, DEFAULT_POS_LEARNING_RATE},
};

const F64_BYTES: usize = std::mem::size_of::<f64>();

// ============================================================================
// Scan Specification
// ============================================================================

/// Regular raster of scan positions, `y` outer and `x` inner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterScan {
    /// First position `(y, x)`.
    pub start: [f64; 2],
    /// Spacing `(dy, dx)` between neighbouring positions.
    pub step: [f64; 2],
    /// Number of positions `(rows, columns)`.
    pub shape: [usize; 2],
}

impl RasterScan {
    pub fn positions(&self) -> Vec<[f64; 2]> {
        let [rows, cols] = self.shape;
        let mut positions = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                positions.push([
                    self.start[0] + row as f64 * self.step[0],
                    self.start[1] + col as f64 * self.step[1],
                ]);
            }
        }
        positions
    }
}

/// Scan positions given inline, as a raster, or as a binary file of `(y, x)`
/// pairs. The first non-empty source wins in that order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanSpec {
    #[serde(default)]
    pub positions: Vec<[f64; 2]>,
    #[serde(default)]
    pub raster: Option<RasterScan>,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl ScanSpec {
    pub fn resolve(&self) -> Result<Vec<[f64; 2]>> {
        if !self.positions.is_empty() {
            return Ok(self.positions.clone());
        }
        if let Some(raster) = &self.raster {
            return Ok(raster.positions());
        }
        if let Some(path) = &self.file {
            return read_positions(path);
        }
        Err(PtychoError::InvalidConfig(
            "scan requires inline positions, a raster, or a positions file".into(),
        ))
    }
}

// ============================================================================
// Job Configuration
// ============================================================================

fn default_slice_thickness() -> f64 {
    1.0
}

fn default_num_slices() -> usize {
    1
}

fn default_num_modes() -> usize {
    1
}

fn default_pos_learning_rate() -> f64 {
    DEFAULT_POS_LEARNING_RATE
}

/// Forward 4D-STEM simulation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub grid: Grid2D,
    pub probe: ProbeParams,
    #[serde(default = "default_slice_thickness")]
    pub slice_thickness: f64,
    /// One binary file per potential slice. Empty means a single vacuum
    /// slice.
    #[serde(default)]
    pub potential: Vec<PathBuf>,
    #[serde(default)]
    pub scan: ScanSpec,
    /// Destination of the diffraction stack.
    pub output: PathBuf,
}

/// Which reconstruction loop to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    #[default]
    SingleSlice,
    SingleSlicePoscorrected,
    SingleSliceMultiModal,
    MultiSliceMultiModal,
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Variant::SingleSlice => write!(f, "single_slice"),
            Variant::SingleSlicePoscorrected => write!(f, "single_slice_poscorrected"),
            Variant::SingleSliceMultiModal => write!(f, "single_slice_multi_modal"),
            Variant::MultiSliceMultiModal => write!(f, "multi_slice_multi_modal"),
        }
    }
}

/// Reconstruction job: measured data plus the initial guess.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconstructionConfig {
    #[serde(default)]
    pub variant: Variant,
    pub grid: Grid2D,
    pub acquisition: Acquisition,
    /// Optics of the initial probe guess.
    pub probe: ProbeParams,
    #[serde(default = "default_num_slices")]
    pub num_slices: usize,
    #[serde(default = "default_num_modes")]
    pub num_modes: usize,
    /// Seed for the extra random probe modes.
    #[serde(default)]
    pub seed: u64,
    /// Binary diffraction stack, one pattern per scan position.
    pub data: PathBuf,
    pub scan: ScanSpec,
    #[serde(default)]
    pub options: ReconstructionOptions,
    #[serde(default = "default_pos_learning_rate")]
    pub pos_learning_rate: f64,
    /// Output directory.
    pub output: PathBuf,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl ReconstructionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_slices == 0 {
            return Err(PtychoError::InvalidConfig(
                "num_slices must be at least 1".into(),
            ));
        }
        if self.num_modes == 0 {
            return Err(PtychoError::InvalidConfig(
                "num_modes must be at least 1".into(),
            ));
        }
        let single_slice = !matches!(self.variant, Variant::MultiSliceMultiModal);
        if single_slice && self.num_slices != 1 {
            return Err(PtychoError::InvalidConfig(format!(
                "variant {} works on one slice, got num_slices = {}",
                self.variant, self.num_slices
            )));
        }
        let single_mode = matches!(
            self.variant,
            Variant::SingleSlice | Variant::SingleSlicePoscorrected
        );
        if single_mode && self.num_modes != 1 {
            return Err(PtychoError::InvalidConfig(format!(
                "variant {} uses one probe mode, got num_modes = {}",
                self.variant, self.num_modes
            )));
        }
        self.options.validate()
    }
}

/// Parse a TOML job file.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)?;
    Ok(toml::from_str(&text)?)
}

// ============================================================================
// Binary Arrays
// ============================================================================

pub fn read_f64_file(path: &Path) -> Result<Vec<f64>> {
    let mut bytes = Vec::new();
    BufReader::new(File::open(path)?).read_to_end(&mut bytes)?;
    if bytes.len() % F64_BYTES != 0 {
        return Err(PtychoError::InvalidInput(format!(
            "{}: {} bytes is not a whole number of f64 values",
            path.display(),
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(F64_BYTES)
        .map(|chunk| {
            let mut raw = [0u8; F64_BYTES];
            raw.copy_from_slice(chunk);
            f64::from_le_bytes(raw)
        })
        .collect())
}

pub fn write_f64_file(path: &Path, values: &[f64]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut writer = BufWriter::new(File::create(path)?);
    for value in values {
        writer.write_all(&value.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

fn split_stack(path: &Path, values: Vec<f64>, per_item: usize) -> Result<Vec<Vec<f64>>> {
    if per_item == 0 || values.len() % per_item != 0 {
        return Err(PtychoError::ShapeMismatch(format!(
            "{}: {} values do not divide into arrays of {per_item}",
            path.display(),
            values.len()
        )));
    }
    Ok(values.chunks_exact(per_item).map(<[f64]>::to_vec).collect())
}

/// Stack of real arrays on `grid`; depth inferred from the file size.
pub fn read_real_stack(path: &Path, grid: Grid2D) -> Result<Vec<RealField2D>> {
    let values = read_f64_file(path)?;
    Ok(split_stack(path, values, grid.len())?
        .into_iter()
        .map(|data| RealField2D::from_vec(grid, data))
        .collect())
}

pub fn write_real_stack(path: &Path, stack: &[RealField2D]) -> Result<()> {
    let values: Vec<f64> = stack
        .iter()
        .flat_map(|field| field.as_slice().iter().copied())
        .collect();
    write_f64_file(path, &values)
}

/// Stack of complex arrays on `grid`, interleaved `re, im`.
pub fn read_complex_stack(path: &Path, grid: Grid2D) -> Result<Vec<Field2D>> {
    let values = read_f64_file(path)?;
    Ok(split_stack(path, values, 2 * grid.len())?
        .into_iter()
        .map(|data| {
            let data = data
                .chunks_exact(2)
                .map(|pair| Complex64::new(pair[0], pair[1]))
                .collect();
            Field2D::from_vec(grid, data)
        })
        .collect())
}

pub fn write_complex_stack(path: &Path, stack: &[Field2D]) -> Result<()> {
    let values: Vec<f64> = stack
        .iter()
        .flat_map(|field| field.as_slice().iter().flat_map(|z| [z.re, z.im]))
        .collect();
    write_f64_file(path, &values)
}

/// `(y, x)` pairs.
pub fn read_positions(path: &Path) -> Result<Vec<[f64; 2]>> {
    let values = read_f64_file(path)?;
    Ok(split_stack(path, values, 2)?
        .into_iter()
        .map(|pair| [pair[0], pair[1]])
        .collect())
}

pub fn write_positions(path: &Path, positions: &[[f64; 2]]) -> Result<()> {
    let values: Vec<f64> = positions.iter().flatten().copied().collect();
    write_f64_file(path, &values)
}
