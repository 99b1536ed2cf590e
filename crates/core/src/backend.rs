//! Backend trait for the spectral (FFT) operations used by every forward model.
//!
//! # Conventions
//!
//! - **Ordering**: zero frequency first, negative frequencies wrapped after the
//!   Nyquist index, identical to [`crate::grid::fft_freq`]. Transfer functions
//!   built on that grid multiply an FFT output elementwise without reordering.
//! - **Normalisation**: the forward transform is unnormalised, the inverse
//!   divides by `nx * ny`, so `inverse(forward(x)) == x`.
//! - **Purity**: implementations may cache plans, but results depend only on
//!   the input buffer.

use crate::field::Field2D;

pub trait SpectralBackend: Send + Sync {
    /// In-place unnormalised 2D forward DFT.
    fn forward_fft_2d(&self, field: &mut Field2D);

    /// In-place 2D inverse DFT, normalised by `1 / (nx * ny)`.
    fn inverse_fft_2d(&self, field: &mut Field2D);

    /// Batched forward FFT on multiple fields.
    ///
    /// Backends can override this to amortise plan lookup across the batch.
    fn batch_forward_fft_2d(&self, fields: &mut [Field2D]) {
        for field in fields.iter_mut() {
            self.forward_fft_2d(field);
        }
    }

    /// Batched inverse FFT on multiple fields.
    fn batch_inverse_fft_2d(&self, fields: &mut [Field2D]) {
        for field in fields.iter_mut() {
            self.inverse_fft_2d(field);
        }
    }

    /// Human-readable backend label for logs and metrics.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
