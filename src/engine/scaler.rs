//! Per-block sample scaling

use super::control::GainFactors;

/// Scale one channel: `output[n] = factor * input[n]`.
///
/// Only the common prefix of the two slices is written.
#[inline]
pub fn scale(factor: f32, input: &[f32], output: &mut [f32]) {
    for (out, &sample) in output.iter_mut().zip(input) {
        *out = factor * sample;
    }
}

/// Scale both channels of a block with their gain factors.
#[inline]
pub fn scale_stereo(factors: GainFactors, input: [&[f32]; 2], output: [&mut [f32]; 2]) {
    let [in_left, in_right] = input;
    let [out_left, out_right] = output;
    scale(factors.left, in_left, out_left);
    scale(factors.right, in_right, out_right);
}
