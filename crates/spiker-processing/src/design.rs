//! IIR filter design
//!
//! Analog prototypes (Butterworth, Chebyshev type I) are frequency
//! transformed in zero/pole/gain form, mapped to the z-plane with the
//! bilinear transform, and factored into second-order sections.
//! Frequencies are normalized to Nyquist (`1.0 == sample_rate / 2`).

use crate::filters::{Biquad, Sos};
use num_complex::Complex64;
use std::f64::consts::PI;

/// Roots closer than this to the real axis are treated as real
const REAL_AXIS_TOLERANCE: f64 = 1e-10;

/// Response shape of a designed filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BandForm {
    Lowpass(f64),
    Highpass(f64),
    Bandpass(f64, f64),
    Bandstop(f64, f64),
}

/// Zeros, poles and gain of a transfer function
#[derive(Debug, Clone)]
pub struct Zpk {
    pub zeros: Vec<Complex64>,
    pub poles: Vec<Complex64>,
    pub gain: f64,
}

impl Zpk {
    /// Analog Butterworth low-pass prototype with unit cutoff
    pub fn butterworth_prototype(order: usize) -> Self {
        let n = order as f64;
        let poles = (0..order)
            .map(|k| {
                let m = -n + 1.0 + 2.0 * k as f64;
                -Complex64::new(0.0, PI * m / (2.0 * n)).exp()
            })
            .collect();

        Zpk { zeros: Vec::new(), poles, gain: 1.0 }
    }

    /// Analog Chebyshev type I low-pass prototype with `ripple_db` passband ripple
    pub fn chebyshev1_prototype(order: usize, ripple_db: f64) -> Self {
        let n = order as f64;
        let eps = (10f64.powf(0.1 * ripple_db) - 1.0).sqrt();
        let mu = (1.0 / eps).asinh() / n;

        let poles: Vec<Complex64> = (0..order)
            .map(|k| {
                let m = -n + 1.0 + 2.0 * k as f64;
                -Complex64::new(mu, PI * m / (2.0 * n)).sinh()
            })
            .collect();

        let mut gain = product_neg(&poles).re;
        if order % 2 == 0 {
            gain /= (1.0 + eps * eps).sqrt();
        }

        Zpk { zeros: Vec::new(), poles, gain }
    }

    fn degree(&self) -> usize {
        self.poles.len() - self.zeros.len()
    }

    fn lowpass(self, wo: f64) -> Self {
        let degree = self.degree();
        Zpk {
            zeros: self.zeros.iter().map(|&z| z * wo).collect(),
            poles: self.poles.iter().map(|&p| p * wo).collect(),
            gain: self.gain * wo.powi(degree as i32),
        }
    }

    fn highpass(self, wo: f64) -> Self {
        let degree = self.degree();
        let gain = self.gain * (product_neg(&self.zeros) / product_neg(&self.poles)).re;

        let mut zeros: Vec<Complex64> = self.zeros.iter().map(|&z| wo / z).collect();
        zeros.extend(std::iter::repeat(Complex64::new(0.0, 0.0)).take(degree));

        Zpk {
            zeros,
            poles: self.poles.iter().map(|&p| wo / p).collect(),
            gain,
        }
    }

    fn bandpass(self, wo: f64, bw: f64) -> Self {
        let degree = self.degree();
        let half = bw / 2.0;

        let mut zeros = split_around(&self.zeros, half, wo, false);
        zeros.extend(std::iter::repeat(Complex64::new(0.0, 0.0)).take(degree));

        Zpk {
            zeros,
            poles: split_around(&self.poles, half, wo, false),
            gain: self.gain * bw.powi(degree as i32),
        }
    }

    fn bandstop(self, wo: f64, bw: f64) -> Self {
        let degree = self.degree();
        let half = bw / 2.0;
        let gain = self.gain * (product_neg(&self.zeros) / product_neg(&self.poles)).re;

        let mut zeros = split_around(&self.zeros, half, wo, true);
        zeros.extend(std::iter::repeat(Complex64::new(0.0, wo)).take(degree));
        zeros.extend(std::iter::repeat(Complex64::new(0.0, -wo)).take(degree));

        Zpk {
            zeros,
            poles: split_around(&self.poles, half, wo, true),
            gain,
        }
    }

    /// Map to the z-plane; `fs` is the normalized rate (2.0 for Nyquist units)
    fn bilinear(self, fs: f64) -> Self {
        let fs2 = Complex64::new(2.0 * fs, 0.0);
        let degree = self.degree();

        let num = self.zeros.iter().fold(Complex64::new(1.0, 0.0), |acc, &z| acc * (fs2 - z));
        let den = self.poles.iter().fold(Complex64::new(1.0, 0.0), |acc, &p| acc * (fs2 - p));

        let mut zeros: Vec<Complex64> = self.zeros.iter().map(|&z| (fs2 + z) / (fs2 - z)).collect();
        zeros.extend(std::iter::repeat(Complex64::new(-1.0, 0.0)).take(degree));

        Zpk {
            zeros,
            poles: self.poles.iter().map(|&p| (fs2 + p) / (fs2 - p)).collect(),
            gain: self.gain * (num / den).re,
        }
    }

    /// Factor a digital zpk into cascaded biquads
    pub fn to_sos(&self) -> Sos {
        let zero_groups = group_conjugates(&self.zeros);
        let pole_groups = group_conjugates(&self.poles);

        let sections = pole_groups
            .iter()
            .zip(zero_groups.iter())
            .enumerate()
            .map(|(i, (poles, zeros))| {
                let [_, a1, a2] = poly_from_roots(poles);
                let [b0, b1, b2] = poly_from_roots(zeros);
                let g = if i == 0 { self.gain } else { 1.0 };
                Biquad::new(b0 * g, b1 * g, b2 * g, a1, a2)
            })
            .collect();

        Sos::new(sections)
    }
}

/// Design a digital filter from an analog prototype
pub fn design(prototype: Zpk, form: BandForm) -> Sos {
    // normalized rate of 2 puts Nyquist at 1
    let fs = 2.0;
    let warp = |wn: f64| 2.0 * fs * (PI * wn / fs).tan();

    let analog = match form {
        BandForm::Lowpass(wn) => prototype.lowpass(warp(wn)),
        BandForm::Highpass(wn) => prototype.highpass(warp(wn)),
        BandForm::Bandpass(low, high) => {
            let (w1, w2) = (warp(low), warp(high));
            prototype.bandpass((w1 * w2).sqrt(), w2 - w1)
        }
        BandForm::Bandstop(low, high) => {
            let (w1, w2) = (warp(low), warp(high));
            prototype.bandstop((w1 * w2).sqrt(), w2 - w1)
        }
    };

    analog.bilinear(fs).to_sos()
}

/// Butterworth filter of `order` for the given normalized band
pub fn butterworth(order: usize, form: BandForm) -> Sos {
    design(Zpk::butterworth_prototype(order), form)
}

/// Chebyshev type I filter of `order` with `ripple_db` passband ripple
pub fn chebyshev1(order: usize, ripple_db: f64, form: BandForm) -> Sos {
    design(Zpk::chebyshev1_prototype(order, ripple_db), form)
}

/// Second-order IIR notch at normalized frequency `w0` with quality `q`
pub fn iir_notch(w0: f64, q: f64) -> Sos {
    let bw = w0 / q * PI;
    let w0 = w0 * PI;
    let beta = (bw / 2.0).tan();
    let gain = 1.0 / (1.0 + beta);

    let section = Biquad::new(
        gain,
        -2.0 * gain * w0.cos(),
        gain,
        -2.0 * gain * w0.cos(),
        2.0 * gain - 1.0,
    );
    Sos::new(vec![section])
}

fn product_neg(roots: &[Complex64]) -> Complex64 {
    roots.iter().fold(Complex64::new(1.0, 0.0), |acc, &r| acc * -r)
}

/// Band transform of prototype roots: each `r` scaled (or inverted for
/// band-stop) by `half` then split into `r ± sqrt(r^2 - wo^2)`
fn split_around(roots: &[Complex64], half: f64, wo: f64, invert: bool) -> Vec<Complex64> {
    let scaled: Vec<Complex64> = roots
        .iter()
        .map(|&r| if invert { half / r } else { r * half })
        .collect();
    let wo2 = Complex64::new(wo * wo, 0.0);

    let upper = scaled.iter().map(|&r| r + (r * r - wo2).sqrt());
    let lower = scaled.iter().map(|&r| r - (r * r - wo2).sqrt());
    upper.chain(lower).collect()
}

/// Group roots into conjugate pairs, then real pairs, then at most one
/// lone real root
fn group_conjugates(roots: &[Complex64]) -> Vec<Vec<Complex64>> {
    let mut groups: Vec<Vec<Complex64>> = roots
        .iter()
        .filter(|r| r.im > REAL_AXIS_TOLERANCE)
        .map(|r| vec![*r, r.conj()])
        .collect();

    let mut reals: Vec<f64> = roots
        .iter()
        .filter(|r| r.im.abs() <= REAL_AXIS_TOLERANCE)
        .map(|r| r.re)
        .collect();
    reals.sort_by(f64::total_cmp);

    groups.extend(
        reals
            .chunks(2)
            .map(|chunk| chunk.iter().map(|re| Complex64::new(*re, 0.0)).collect()),
    );
    groups
}

/// Monic polynomial `[1, c1, c2]` with the given one or two roots
fn poly_from_roots(roots: &[Complex64]) -> [f64; 3] {
    match roots {
        [r] => [1.0, -r.re, 0.0],
        [r1, r2] => [1.0, -(r1 + r2).re, (r1 * r2).re],
        _ => [1.0, 0.0, 0.0],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_butterworth_lowpass_order2_matches_closed_form() {
        // 2nd order at a quarter of Nyquist: b = [0.0976, 0.1953, 0.0976]
        let sos = butterworth(2, BandForm::Lowpass(0.25));
        let s = &sos.sections()[0];

        assert_eq!(sos.sections().len(), 1);
        assert!((s.b0 - 0.097_631_072_937_8).abs() < 1e-9);
        assert!((s.b1 - 0.195_262_145_875_6).abs() < 1e-9);
        assert!((s.a1 + 0.942_809_041_582_1).abs() < 1e-9);
        assert!((s.a2 - 0.333_333_333_333_3).abs() < 1e-9);
    }

    #[test]
    fn test_unity_gain_in_passband() {
        let lp = butterworth(4, BandForm::Lowpass(0.3));
        assert!((lp.gain_at(0.0) - 1.0).abs() < 1e-9);

        let hp = butterworth(3, BandForm::Highpass(0.3));
        assert!((hp.gain_at(1.0) - 1.0).abs() < 1e-9);
        assert!(hp.gain_at(0.0) < 1e-9);

        let bp = butterworth(2, BandForm::Bandpass(0.2, 0.4));
        let centre = ((PI * 0.2 / 2.0).tan() * (PI * 0.4 / 2.0).tan()).sqrt().atan() * 2.0 / PI;
        assert!((bp.gain_at(centre) - 1.0).abs() < 1e-6);
        assert!(bp.gain_at(0.0) < 1e-9);
        assert!(bp.gain_at(1.0) < 1e-9);
    }

    #[test]
    fn test_half_power_at_cutoff() {
        let lp = butterworth(2, BandForm::Lowpass(0.2));
        assert!((lp.gain_at(0.2) - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-9);
    }

    #[test]
    fn test_bandstop_rejects_centre() {
        let bs = butterworth(2, BandForm::Bandstop(0.2, 0.4));
        assert_eq!(bs.sections().len(), 2);
        assert!((bs.gain_at(0.0) - 1.0).abs() < 1e-9);
        assert!((bs.gain_at(1.0) - 1.0).abs() < 1e-9);

        let centre = ((PI * 0.2 / 2.0).tan() * (PI * 0.4 / 2.0).tan()).sqrt().atan() * 2.0 / PI;
        assert!(bs.gain_at(centre) < 1e-6);
    }

    #[test]
    fn test_chebyshev_ripple_bound() {
        let sos = chebyshev1(8, 0.05, BandForm::Lowpass(0.4));
        assert_eq!(sos.sections().len(), 4);

        let floor = 10f64.powf(-0.05 / 20.0);
        for i in 0..40 {
            let g = sos.gain_at(0.39 * i as f64 / 40.0);
            assert!(g <= 1.0 + 1e-9 && g >= floor - 1e-9, "gain {} at bin {}", g, i);
        }
        assert!(sos.gain_at(0.8) < 1e-3);
    }

    #[test]
    fn test_notch_zero_at_centre() {
        let sos = iir_notch(0.1, 30.0);
        assert!(sos.gain_at(0.1) < 1e-9);
        assert!((sos.gain_at(0.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_odd_order_has_first_order_section() {
        let sos = butterworth(3, BandForm::Lowpass(0.5));
        assert_eq!(sos.sections().len(), 2);
        assert!(sos.sections().iter().any(|s| s.a2 == 0.0));
    }
}
