//! Sample arithmetic for the mixer.
//! All buffers are interleaved stereo signed 16-bit PCM.

/// Full volume, in percent
pub const FULL_VOLUME: i32 = 100;

/// Add `src` into `dst` sample by sample, saturating at the i16 range.
/// Extra samples in either slice are left alone.
pub fn mix_into(dst: &mut [i16], src: &[i16]) {
    for (out, sample) in dst.iter_mut().zip(src) {
        *out = out.saturating_add(*sample);
    }
}

/// Multiply every sample by `numerator / denominator`, truncating toward zero
pub fn scale(samples: &mut [i16], numerator: i32, denominator: i32) {
    if numerator == denominator || denominator == 0 {
        return;
    }
    for sample in samples.iter_mut() {
        let scaled = *sample as i32 * numerator / denominator;
        *sample = scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
    }
}

/// Scale by a voice volume and a global volume, both in percent.
/// `sample * voice * global / 10000`, truncated.
pub fn apply_volume(samples: &mut [i16], voice_volume: i32, global_volume: i32) {
    scale(samples, voice_volume * global_volume, FULL_VOLUME * FULL_VOLUME);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix_is_additive() {
        let mut out = vec![0i16; 8];
        mix_into(&mut out, &[300; 8]);
        mix_into(&mut out, &[-50; 8]);
        assert!(out.iter().all(|&s| s == 250));
    }

    #[test]
    fn test_mix_saturates() {
        let mut out = vec![30_000i16, -30_000];
        mix_into(&mut out, &[10_000, -10_000]);
        assert_eq!(out, vec![i16::MAX, i16::MIN]);
    }

    #[test]
    fn test_mix_shorter_source() {
        let mut out = vec![1i16, 1, 1, 1];
        mix_into(&mut out, &[5, 5]);
        assert_eq!(out, vec![6, 6, 1, 1]);
    }

    #[test]
    fn test_half_volume() {
        let mut samples = vec![200i16, -200, 201, -201, 1];
        apply_volume(&mut samples, 50, 100);
        assert_eq!(samples, vec![100, -100, 100, -100, 0]);
    }

    #[test]
    fn test_global_volume_combines() {
        let mut samples = vec![1_000i16];
        apply_volume(&mut samples, 50, 50);
        assert_eq!(samples, vec![250]);
    }

    #[test]
    fn test_zero_volume_silences() {
        let mut samples = vec![i16::MAX, i16::MIN];
        apply_volume(&mut samples, 0, 100);
        assert_eq!(samples, vec![0, 0]);
    }
}
