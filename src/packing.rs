//! Im2col slot packing
//!
//! Rearranges a 2-D image so a convolution becomes slot-wise multiplication
//! followed by a group sum. Every window placement contributes one sample per
//! window offset, and samples are grouped **offset-major**:
//!
//! ```text
//! packed[offset_index * repeat + placement_index] = image[i + ki][j + kj]
//! ```
//!
//! with offsets `(ki, kj)` in row-major order over the window and placements
//! `(i, j)` in row-major order over the input, stepping by the stride. The
//! encoded kernels, biases and masks in [`crate::encoding::conv`] all assume
//! this ordering.

use crate::core::{HennError, Result};

/// Number of window placements along one axis, if the window tiles it exactly
pub fn window_count(len: usize, kernel: usize, stride: usize) -> Option<usize> {
    if stride == 0 || kernel == 0 || kernel > len {
        return None;
    }
    let span = len - kernel + stride;
    if span % stride != 0 {
        return None;
    }
    Some(span / stride)
}

/// Im2col with a square `kernel_size` window
///
/// # Example
///
/// ```
/// use henn::packing::pack;
///
/// let image = vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8]];
/// assert_eq!(pack(&image, 2, 2).unwrap(), vec![1, 3, 2, 4, 5, 7, 6, 8]);
/// ```
pub fn pack<T: Copy>(image: &[Vec<T>], kernel_size: usize, stride: usize) -> Result<Vec<T>> {
    pack_window(image, kernel_size, kernel_size, stride)
}

/// Im2col with a `kernel_x` × `kernel_y` window
///
/// `kernel_x` runs along rows (the first index), `kernel_y` along columns.
///
/// # Errors
///
/// - `InvalidLayer` if the image is empty or ragged
/// - `TilingMismatch` if the window and stride do not tile the image exactly
pub fn pack_window<T: Copy>(
    image: &[Vec<T>],
    kernel_x: usize,
    kernel_y: usize,
    stride: usize,
) -> Result<Vec<T>> {
    let rows = image.len();
    let cols = image.first().map_or(0, Vec::len);
    if rows == 0 || cols == 0 {
        return Err(HennError::InvalidLayer("empty image".to_string()));
    }
    if let Some((r, row)) = image.iter().enumerate().find(|(_, row)| row.len() != cols) {
        return Err(HennError::InvalidLayer(format!(
            "ragged image: row {} has {} columns, expected {}",
            r,
            row.len(),
            cols
        )));
    }

    let tiling = HennError::TilingMismatch {
        rows,
        cols,
        kernel_x,
        kernel_y,
        stride,
    };
    let windows_x = window_count(rows, kernel_x, stride).ok_or_else(|| tiling.clone())?;
    let windows_y = window_count(cols, kernel_y, stride).ok_or(tiling)?;
    let repeat = windows_x * windows_y;

    let mut packed = Vec::with_capacity(kernel_x * kernel_y * repeat);
    for ki in 0..kernel_x {
        for kj in 0..kernel_y {
            for wi in 0..windows_x {
                for wj in 0..windows_y {
                    packed.push(image[wi * stride + ki][wj * stride + kj]);
                }
            }
        }
    }

    Ok(packed)
}
