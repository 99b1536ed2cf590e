//! JSONL event stream for reconstruction runs.
//!
//! One JSON object per line, tagged by `event`, carrying the milliseconds
//! since the recorder was opened. Write failures are logged and otherwise
//! ignored so a full disk never aborts a reconstruction.

use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    time::Instant,
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{loss::LossKind, optimizer::OptimizerKind};

/// `[metrics]` table of a reconstruction job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub output: Option<PathBuf>,
    pub format: MetricsFormat,
}

impl MetricsConfig {
    /// `None` when disabled; an error when enabled without an output path.
    pub fn build_recorder(&self) -> io::Result<Option<MetricsRecorder>> {
        if !self.enabled {
            return Ok(None);
        }
        match &self.output {
            Some(path) => MetricsRecorder::create(path, self.format).map(Some),
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "metrics.output must be set when metrics are enabled",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricsFormat {
    #[default]
    JsonLines,
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MetricsEvent<'a> {
    ReconstructionStart {
        variant: &'a str,
        backend: &'a str,
        grid_nx: usize,
        grid_ny: usize,
        slices: usize,
        modes: usize,
        positions: usize,
        num_iterations: usize,
        save_every: usize,
        loss: LossKind,
        optimizer: OptimizerKind,
    },
    Snapshot {
        iteration: usize,
        loss: f64,
        /// Wall time since the previous snapshot.
        duration_ms: f64,
    },
    /// Emitted when a run continues past a NaN or infinite value.
    NonFinite {
        iteration: usize,
        quantity: &'a str,
    },
    ReconstructionDone {
        iterations: usize,
        final_loss: f64,
        duration_ms: f64,
    },
}

#[derive(Serialize)]
struct Line<'a> {
    elapsed_ms: f64,
    #[serde(flatten)]
    event: MetricsEvent<'a>,
}

pub struct MetricsRecorder {
    sink: Mutex<BufWriter<File>>,
    format: MetricsFormat,
    opened: Instant,
}

impl MetricsRecorder {
    /// Truncate or create `path`, creating parent directories as needed.
    pub fn create(path: &Path, format: MetricsFormat) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            sink: Mutex::new(BufWriter::new(File::create(path)?)),
            format,
            opened: Instant::now(),
        })
    }

    pub fn emit(&self, event: MetricsEvent<'_>) {
        let line = Line {
            elapsed_ms: self.opened.elapsed().as_secs_f64() * 1000.0,
            event,
        };
        if let Err(err) = self.write_line(&line) {
            log::warn!("[metrics] dropped event: {err}");
        }
    }

    fn write_line(&self, line: &Line<'_>) -> io::Result<()> {
        let mut sink = self.sink.lock();
        match self.format {
            MetricsFormat::JsonLines => {
                serde_json::to_writer(&mut *sink, line)?;
                sink.write_all(b"\n")?;
            }
        }
        // keep the file readable while the run is still going
        sink.flush()
    }
}
