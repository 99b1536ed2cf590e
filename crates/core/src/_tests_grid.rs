#![cfg(test)]

use super::grid::{fft_freq, fft_shift, ifft_shift, roll, Grid2D};

#[test]
fn len_and_field_of_view() {
    let grid = Grid2D::new(8, 4, 0.5, 0.25);
    assert_eq!(grid.len(), 32);
    assert!(!grid.is_empty());
    assert_eq!(grid.field_of_view(), [1.0, 4.0]);
}

#[test]
fn grid_defaults_calibration_when_missing_in_toml() {
    let grid: Grid2D = toml::from_str("nx = 16\nny = 8\n").expect("grid parses");
    assert_eq!(grid.nx, 16);
    assert_eq!(grid.ny, 8);
    assert_eq!(grid.dx, 1.0);
    assert_eq!(grid.dy, 1.0);
}

#[test]
fn fft_freq_even_matches_numpy_ordering() {
    let freqs = fft_freq(4, 0.5);
    let expected = [0.0, 0.5, -1.0, -0.5];
    for (got, want) in freqs.iter().zip(expected) {
        assert!((got - want).abs() < 1e-12, "{freqs:?}");
    }
}

#[test]
fn fft_freq_odd_matches_numpy_ordering() {
    let freqs = fft_freq(5, 1.0);
    let expected = [0.0, 0.2, 0.4, -0.4, -0.2];
    for (got, want) in freqs.iter().zip(expected) {
        assert!((got - want).abs() < 1e-12, "{freqs:?}");
    }
    assert!(fft_freq(0, 1.0).is_empty());
}

#[test]
fn roll_wraps_both_axes() {
    let data: Vec<usize> = (0..6).collect();
    // 2 rows x 3 columns, shift by one row and one column.
    let rolled = roll(&data, 3, 2, 1, 1);
    assert_eq!(rolled, vec![5, 3, 4, 2, 0, 1]);
}

#[test]
fn fft_shift_centres_zero_frequency() {
    for (nx, ny) in [(4usize, 4usize), (5, 3), (6, 7)] {
        let mut data = vec![0u8; nx * ny];
        data[0] = 1;
        let shifted = fft_shift(&data, nx, ny);
        let centre = (ny / 2) * nx + nx / 2;
        assert_eq!(shifted[centre], 1, "nx={nx} ny={ny}");
    }
}

#[test]
fn ifft_shift_inverts_fft_shift_for_odd_sizes() {
    let (nx, ny) = (5usize, 7usize);
    let data: Vec<usize> = (0..nx * ny).collect();
    let back = ifft_shift(&fft_shift(&data, nx, ny), nx, ny);
    assert_eq!(back, data);
}
