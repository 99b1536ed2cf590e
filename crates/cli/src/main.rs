use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use ptycho_backend_cpu::CpuBackend;
use ptycho_core::{
    calibrated::{CalibratedArray, ProbeModes},
    field::{Field2D, RealField2D},
    grid::Grid2D,
    io::{self, ReconstructionConfig, SimulationConfig, Variant},
    multislice::stem_4d,
    probe::{initialize_random_modes, make_probe, AberrationCoefficients, ProbeParams},
    reconstruction::{
        multi_slice_multi_modal_with_metrics, single_slice_multi_modal_with_metrics,
        single_slice_poscorrected_with_metrics, single_slice_ptychography_with_metrics,
        MultiModalReconstruction, MultiSliceReconstruction, SingleSliceReconstruction,
    },
    units::{interaction_sigma, wavelength_ang},
    validate,
};

/// Weight of each extra probe mode relative to the main probe.
const EXTRA_MODE_WEIGHT: f64 = 0.1;

#[derive(Parser, Debug)]
#[command(name = "ptycho", about = "Multislice 4D-STEM simulation and ptychography")]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Only log warnings and errors (stderr)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the electron wavelength and interaction constant
    Wavelength {
        /// Accelerating voltage in kV
        #[arg(long, default_value_t = 200.0)]
        voltage_kv: f64,
    },
    /// Write a probe as a binary complex array
    Probe {
        #[arg(long)]
        nx: usize,
        #[arg(long)]
        ny: usize,
        /// Pixel size in Å
        #[arg(long)]
        dx: f64,
        /// Convergence semi-angle in mrad
        #[arg(long)]
        aperture_mrad: f64,
        #[arg(long, default_value_t = 200.0)]
        voltage_kv: f64,
        /// Defocus in Å
        #[arg(long, default_value_t = 0.0)]
        defocus: f64,
        /// Spherical aberration C3 in mm
        #[arg(long, default_value_t = 0.0)]
        c3: f64,
        /// Fifth-order aberration C5 in mm
        #[arg(long, default_value_t = 0.0)]
        c5: f64,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Simulate a 4D-STEM dataset from a TOML job
    Simulate {
        #[arg(short, long)]
        config: PathBuf,
        /// Override the output path of the job file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Reconstruct potential, probe and positions from a TOML job
    Reconstruct {
        #[arg(short, long)]
        config: PathBuf,
        /// Override the output directory of the job file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let level = if cli.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Command::Wavelength { voltage_kv } => {
            validate::check_voltage(voltage_kv)?;
            println!("voltage_kv = {voltage_kv}");
            println!("wavelength_ang = {}", wavelength_ang(voltage_kv));
            println!("sigma = {}", interaction_sigma(voltage_kv));
        }
        Command::Probe {
            nx,
            ny,
            dx,
            aperture_mrad,
            voltage_kv,
            defocus,
            c3,
            c5,
            output,
        } => {
            validate::check_voltage(voltage_kv)?;
            validate::check_calibration(dx)?;
            let params = ProbeParams {
                aperture_mrad,
                voltage_kv,
                aberrations: AberrationCoefficients { defocus, c3, c5 },
            };
            let probe = make_probe(&CpuBackend::new(), Grid2D::square(nx, ny, dx), &params);
            io::write_complex_stack(&output, &[probe])?;
            log::info!("[cli] wrote {nx}x{ny} probe to {}", output.display());
        }
        Command::Simulate { config, output } => run_simulation(&config, output)?,
        Command::Reconstruct { config, output } => run_reconstruction(&config, output)?,
    }
    Ok(())
}

fn run_simulation(path: &Path, output: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("[cli] loading simulation job {}", path.display());
    let mut config: SimulationConfig = io::load_toml(path)?;
    if let Some(output) = output {
        config.output = output;
    }
    validate::check_voltage(config.probe.voltage_kv)?;
    validate::check_thickness(config.slice_thickness)?;
    validate::check_calibration(config.grid.dx)?;
    validate::check_calibration(config.grid.dy)?;

    let grid = config.grid;
    let mut slices = Vec::new();
    for file in &config.potential {
        slices.extend(io::read_real_stack(file, grid)?);
    }
    if slices.is_empty() {
        log::info!("[cli] no potential files given, simulating vacuum");
        slices.push(RealField2D::zeros(grid));
    }
    validate::check_finite("potential", &slices)?;
    let positions = config.scan.resolve()?;
    validate::check_positions(&positions)?;

    let backend = CpuBackend::new();
    let probe = make_probe(&backend, grid, &config.probe);
    log::info!(
        "[cli] simulating {} positions through {} slices on {}x{}",
        positions.len(),
        slices.len(),
        grid.nx,
        grid.ny
    );
    let patterns = stem_4d(
        &backend,
        &slices,
        std::slice::from_ref(&probe),
        &positions,
        config.slice_thickness,
        config.probe.voltage_kv,
    );
    io::write_real_stack(&config.output, &patterns)?;
    log::info!(
        "[cli] wrote {} patterns to {}",
        patterns.len(),
        config.output.display()
    );
    Ok(())
}

/// Final estimates flattened to plain arrays for writing.
struct Outputs {
    potential: Vec<RealField2D>,
    beam: Vec<Field2D>,
    weights: Vec<f64>,
    positions: Vec<[f64; 2]>,
    loss_history: Vec<f64>,
    potential_snapshots: Vec<(usize, Vec<RealField2D>)>,
}

impl From<SingleSliceReconstruction> for Outputs {
    fn from(result: SingleSliceReconstruction) -> Self {
        Self {
            potential: vec![result.potential.to_real_field()],
            beam: vec![result.beam.to_field()],
            weights: vec![1.0],
            positions: result.positions,
            loss_history: result.loss_history,
            potential_snapshots: result
                .potential_snapshots
                .iter()
                .map(|(iteration, slice)| (iteration, vec![slice.to_real_field()]))
                .collect(),
        }
    }
}

impl From<MultiModalReconstruction> for Outputs {
    fn from(result: MultiModalReconstruction) -> Self {
        Self {
            potential: vec![result.potential.to_real_field()],
            beam: result.beam.modes().to_vec(),
            weights: result.beam.weights().to_vec(),
            positions: result.positions,
            loss_history: result.loss_history,
            potential_snapshots: result
                .potential_snapshots
                .iter()
                .map(|(iteration, slice)| (iteration, vec![slice.to_real_field()]))
                .collect(),
        }
    }
}

impl From<MultiSliceReconstruction> for Outputs {
    fn from(result: MultiSliceReconstruction) -> Self {
        Self {
            potential: result
                .potential
                .iter()
                .map(CalibratedArray::to_real_field)
                .collect(),
            beam: result.beam.modes().to_vec(),
            weights: result.beam.weights().to_vec(),
            positions: result.positions,
            loss_history: result.loss_history,
            potential_snapshots: result
                .potential_snapshots
                .iter()
                .map(|(iteration, slices)| {
                    (
                        iteration,
                        slices.iter().map(CalibratedArray::to_real_field).collect(),
                    )
                })
                .collect(),
        }
    }
}

fn run_reconstruction(
    path: &Path,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("[cli] loading reconstruction job {}", path.display());
    let mut config: ReconstructionConfig = io::load_toml(path)?;
    if let Some(output) = output {
        config.output = output;
    }
    config.validate()?;
    validate::check_voltage(config.probe.voltage_kv)?;

    let grid = config.grid;
    let data = io::read_real_stack(&config.data, grid)?;
    let positions = config.scan.resolve()?;
    validate::check_data(&data, positions.len(), grid)?;

    let backend = CpuBackend::new();
    let probe = make_probe(&backend, grid, &config.probe);
    let potential = CalibratedArray::from_real_field(RealField2D::zeros(grid), true)?;
    let recorder = config.metrics.build_recorder()?;
    let metrics = recorder.as_ref();
    log::info!(
        "[cli] {} reconstruction: {} patterns, {} slices, {} modes, {} iterations",
        config.variant,
        data.len(),
        config.num_slices,
        config.num_modes,
        config.options.num_iterations
    );

    let outputs: Outputs = match config.variant {
        Variant::SingleSlice => single_slice_ptychography_with_metrics(
            &backend,
            &data,
            &potential,
            &CalibratedArray::from_field(probe, true)?,
            &positions,
            config.acquisition,
            &config.options,
            metrics,
        )?
        .into(),
        Variant::SingleSlicePoscorrected => single_slice_poscorrected_with_metrics(
            &backend,
            &data,
            &potential,
            &CalibratedArray::from_field(probe, true)?,
            &positions,
            config.acquisition,
            &config.options,
            metrics,
        )?
        .into(),
        Variant::SingleSliceMultiModal => single_slice_multi_modal_with_metrics(
            &backend,
            &data,
            &potential,
            &initial_modes(probe, &config)?,
            &positions,
            config.acquisition,
            &config.options,
            metrics,
        )?
        .into(),
        Variant::MultiSliceMultiModal => {
            let slices = vec![potential; config.num_slices];
            multi_slice_multi_modal_with_metrics(
                &backend,
                &data,
                &slices,
                &initial_modes(probe, &config)?,
                &positions,
                config.acquisition,
                &config.options,
                config.pos_learning_rate,
                metrics,
            )?
            .into()
        }
    };

    write_outputs(&config.output, &outputs)?;
    if let Some(last) = outputs.loss_history.last() {
        log::info!(
            "[cli] final loss={last}, results in {}",
            config.output.display()
        );
    }
    Ok(())
}

/// Main probe plus `num_modes - 1` seeded random modes carrying the same
/// power at a reduced weight.
fn initial_modes(
    probe: Field2D,
    config: &ReconstructionConfig,
) -> Result<ProbeModes, Box<dyn std::error::Error>> {
    let extra = config.num_modes.saturating_sub(1);
    let power = probe.power();
    let mut modes = vec![probe];
    let mut weights = vec![1.0];
    for mut mode in initialize_random_modes(config.grid, extra, config.seed) {
        mode.scale(power.sqrt());
        modes.push(mode);
        weights.push(EXTRA_MODE_WEIGHT);
    }
    Ok(ProbeModes::new(modes, weights, config.grid.dx)?)
}

fn write_outputs(dir: &Path, outputs: &Outputs) -> Result<(), Box<dyn std::error::Error>> {
    io::write_real_stack(&dir.join("potential.bin"), &outputs.potential)?;
    io::write_complex_stack(&dir.join("beam.bin"), &outputs.beam)?;
    io::write_f64_file(&dir.join("beam_weights.bin"), &outputs.weights)?;
    io::write_positions(&dir.join("positions.bin"), &outputs.positions)?;
    io::write_f64_file(&dir.join("loss.bin"), &outputs.loss_history)?;
    for (iteration, slices) in &outputs.potential_snapshots {
        let name = format!("potential_{iteration:06}.bin");
        io::write_real_stack(&dir.join("snapshots").join(name), slices)?;
    }
    Ok(())
}
