/// Two-dimensional tensor used for batched network activations and parameters.
///
/// Image-like activations are stored one sample per row, flattened
/// channel-major as `[channel][height][width]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    /// Flattened storage of tensor elements
    pub data: Vec<f32>,
    /// Shape as (rows, columns)
    pub shape: (usize, usize),
}

impl Tensor {
    /// Creates a new tensor with default shape (1, n)
    pub fn new(data: Vec<f32>) -> Self {
        let n = data.len();
        Tensor {
            data,
            shape: (1, n),
        }
    }

    /// Creates a new tensor with specified shape
    pub fn new_with_shape(data: Vec<f32>, shape: (usize, usize)) -> Self {
        debug_assert_eq!(data.len(), shape.0 * shape.1);
        Tensor { data, shape }
    }

    /// Creates a tensor filled with zeros
    pub fn zeros(shape: (usize, usize)) -> Self {
        Tensor {
            data: vec![0.0; shape.0 * shape.1],
            shape,
        }
    }

    /// Creates a zero-filled tensor with same shape as self
    pub fn zeros_like(&self) -> Self {
        Tensor {
            data: vec![0.0; self.data.len()],
            shape: self.shape,
        }
    }

    /// Stacks tensors with equal column counts on top of each other
    pub fn concat_rows(parts: Vec<Tensor>) -> Tensor {
        let cols = parts.first().map_or(0, |part| part.shape.1);
        let rows = parts.iter().map(|part| part.shape.0).sum();

        let mut data = Vec::with_capacity(rows * cols);
        for part in parts {
            debug_assert_eq!(part.shape.1, cols);
            data.extend(part.data);
        }

        Tensor::new_with_shape(data, (rows, cols))
    }

    /// Returns a single row as a slice
    pub fn row(&self, index: usize) -> &[f32] {
        let cols = self.shape.1;
        &self.data[index * cols..(index + 1) * cols]
    }

    /// Matrix multiplication using optimized implementation
    pub fn matmul(&self, other: &Tensor) -> Tensor {
        let (m, n) = self.shape;
        let (k, p) = other.shape;
        assert_eq!(n, k, "matmul dimension mismatch");

        let mut result = vec![0.0; m * p];

        // Bounds are guaranteed by the shape assertion above
        unsafe {
            for i in 0..m {
                for k in 0..n {
                    let a_val = *self.data.get_unchecked(i * n + k);
                    let row_offset = i * p;
                    let other_row_offset = k * p;

                    for j in 0..p {
                        *result.get_unchecked_mut(row_offset + j) +=
                            a_val * *other.data.get_unchecked(other_row_offset + j);
                    }
                }
            }
        }

        Tensor::new_with_shape(result, (m, p))
    }

    /// Matrix transpose operation
    pub fn transpose(&self) -> Tensor {
        let (rows, cols) = self.shape;
        let mut result = vec![0.0; self.data.len()];

        unsafe {
            for i in 0..rows {
                let row_offset = i * cols;
                for j in 0..cols {
                    *result.get_unchecked_mut(j * rows + i) =
                        *self.data.get_unchecked(row_offset + j);
                }
            }
        }

        Tensor::new_with_shape(result, (cols, rows))
    }

    /// Applies log-softmax across each row
    pub fn log_softmax(&self) -> Tensor {
        let (rows, cols) = self.shape;
        let mut data = vec![0.0; self.data.len()];

        for row in 0..rows {
            let offset = row * cols;
            let values = &self.data[offset..offset + cols];

            // Shift by the row maximum for numerical stability
            let max_val = values.iter().fold(f32::MIN, |acc, &v| acc.max(v));
            let log_sum = values
                .iter()
                .map(|&v| (v - max_val).exp())
                .sum::<f32>()
                .ln();

            for (out, &v) in data[offset..offset + cols].iter_mut().zip(values) {
                *out = v - max_val - log_sum;
            }
        }

        Tensor {
            data,
            shape: self.shape,
        }
    }

    /// Index of the largest value in each row, first index wins on ties
    pub fn argmax_rows(&self) -> Vec<usize> {
        (0..self.shape.0)
            .map(|row| {
                let mut max_idx = 0;
                let mut max_val = f32::NEG_INFINITY;
                for (j, &v) in self.row(row).iter().enumerate() {
                    if v > max_val {
                        max_val = v;
                        max_idx = j;
                    }
                }
                max_idx
            })
            .collect()
    }

    /// Unfolds every kernel-sized patch of a batch of images into a row
    ///
    /// # Arguments
    /// * `channels` - Number of image channels
    /// * `size` - Image size as (height, width)
    /// * `kernel` - Kernel size as (height, width)
    /// * `stride` - Stride as (height, width)
    ///
    /// # Returns
    /// Tensor of shape (batch * out_height * out_width, channels * kernel_h * kernel_w)
    pub fn im2row(
        &self,
        channels: usize,
        size: (usize, usize),
        kernel: (usize, usize),
        stride: (usize, usize),
    ) -> Tensor {
        let batch_size = self.shape.0;
        let (height, width) = size;
        let (kernel_h, kernel_w) = kernel;
        let (stride_h, stride_w) = stride;
        debug_assert_eq!(self.shape.1, channels * height * width);

        let out_height = (height - kernel_h) / stride_h + 1;
        let out_width = (width - kernel_w) / stride_w + 1;
        let row_len = channels * kernel_h * kernel_w;

        let mut rows = vec![0.0; batch_size * out_height * out_width * row_len];

        // Extract patches and arrange them as rows
        for b in 0..batch_size {
            for h in 0..out_height {
                for w in 0..out_width {
                    let row_offset = ((b * out_height + h) * out_width + w) * row_len;
                    for c in 0..channels {
                        for kh in 0..kernel_h {
                            let in_h = h * stride_h + kh;
                            for kw in 0..kernel_w {
                                let in_w = w * stride_w + kw;

                                let row_idx = row_offset + (c * kernel_h + kh) * kernel_w + kw;
                                let im_idx = ((b * channels + c) * height + in_h) * width + in_w;

                                rows[row_idx] = self.data[im_idx];
                            }
                        }
                    }
                }
            }
        }

        Tensor::new_with_shape(rows, (batch_size * out_height * out_width, row_len))
    }

    /// Folds patch rows back into images, summing overlapping contributions.
    /// Inverse layout of [`Tensor::im2row`].
    pub fn row2im(
        &self,
        channels: usize,
        size: (usize, usize),
        kernel: (usize, usize),
        stride: (usize, usize),
    ) -> Tensor {
        let (height, width) = size;
        let (kernel_h, kernel_w) = kernel;
        let (stride_h, stride_w) = stride;

        let out_height = (height - kernel_h) / stride_h + 1;
        let out_width = (width - kernel_w) / stride_w + 1;
        let row_len = channels * kernel_h * kernel_w;
        debug_assert_eq!(self.shape.1, row_len);

        let batch_size = self.shape.0 / (out_height * out_width);
        let mut img = vec![0.0; batch_size * channels * height * width];

        for b in 0..batch_size {
            for h in 0..out_height {
                for w in 0..out_width {
                    let row_offset = ((b * out_height + h) * out_width + w) * row_len;
                    for c in 0..channels {
                        for kh in 0..kernel_h {
                            let im_h = h * stride_h + kh;
                            for kw in 0..kernel_w {
                                let im_w = w * stride_w + kw;

                                let row_idx = row_offset + (c * kernel_h + kh) * kernel_w + kw;
                                let im_idx = ((b * channels + c) * height + im_h) * width + im_w;

                                img[im_idx] += self.data[row_idx];
                            }
                        }
                    }
                }
            }
        }

        Tensor::new_with_shape(img, (batch_size, channels * height * width))
    }
}
