//! Discrete convolution of a stress with a block response.

use ndarray::{Array, Array1, ArrayView1};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Kernels (or signals) at most this long are convolved by direct summation
const DIRECT_LIMIT: usize = 64;

/// First `signal.len()` values of the full convolution of `signal` and `kernel`.
///
/// Short inputs are summed directly, longer ones go through an FFT.
pub fn convolve(signal: ArrayView1<f64>, kernel: ArrayView1<f64>) -> Array1<f64> {
    let n = signal.len();
    if n == 0 || kernel.is_empty() {
        return Array1::zeros(n);
    }
    if kernel.len().min(n) <= DIRECT_LIMIT {
        convolve_direct(signal, kernel)
    } else {
        convolve_fft(signal, kernel)
    }
}

fn convolve_direct(signal: ArrayView1<f64>, kernel: ArrayView1<f64>) -> Array1<f64> {
    let n = signal.len();
    Array::from_iter((0..n).map(|i| {
        let kmax = kernel.len().min(i + 1);
        (0..kmax).map(|k| kernel[k] * signal[i - k]).sum::<f64>()
    }))
}

fn convolve_fft(signal: ArrayView1<f64>, kernel: ArrayView1<f64>) -> Array1<f64> {
    let n = signal.len();
    // Only the first n values are needed, so the kernel never has to be longer than the signal
    let m = kernel.len().min(n);
    let size = (n + m - 1).next_power_of_two();

    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(size);
    let inverse = planner.plan_fft_inverse(size);

    let mut a: Vec<Complex<f64>> = signal
        .iter()
        .map(|v| Complex::new(*v, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
        .take(size)
        .collect();
    let mut b: Vec<Complex<f64>> = kernel
        .iter()
        .take(m)
        .map(|v| Complex::new(*v, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
        .take(size)
        .collect();

    forward.process(&mut a);
    forward.process(&mut b);
    a.iter_mut().zip(b.iter()).for_each(|(x, y)| *x *= y);
    inverse.process(&mut a);

    let scale = 1.0 / size as f64;
    Array::from_iter(a.iter().take(n).map(|c| c.re * scale))
}
