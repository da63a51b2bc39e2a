//! Spherical-harmonic preview hash: a short string approximating the
//! panorama's low-frequency color distribution, decodable by the viewer
//! without fetching a single tile.
//!
//! Coefficients are computed per color channel with Driscoll-Healy
//! equiangular quadrature, companded through a signed square root into a
//! small integer range, packed three channels to an integer, and written as
//! fixed-width base-83 digits.

use std::f64::consts::PI;

use image::RgbImage;

use super::base83;

pub const DEFAULT_LMAX: usize = 5;

/// Degree-limited real 4pi-normalized spherical-harmonic coefficients of one
/// scalar field. The constant field maps to `cos(0, 0)` equal to its value.
pub struct Coefficients {
    lmax: usize,
    cos: Vec<f64>,
    sin: Vec<f64>,
}

impl Coefficients {
    pub fn cos(&self, l: usize, m: usize) -> f64 {
        self.cos[l * (self.lmax + 1) + m]
    }

    pub fn sin(&self, l: usize, m: usize) -> f64 {
        self.sin[l * (self.lmax + 1) + m]
    }

    /// Structurally nonzero coefficients in hash order: the cosine matrix's
    /// lower triangle, then the sine matrix's lower triangle with its always
    /// zero first row and column dropped.
    fn retained(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(retained_len(self.lmax));
        for l in 0..=self.lmax {
            for m in 0..=l {
                out.push(self.cos(l, m));
            }
        }
        for l in 1..=self.lmax {
            for m in 1..=l {
                out.push(self.sin(l, m));
            }
        }
        out
    }
}

/// Number of retained coefficients per channel for a given degree limit.
pub fn retained_len(lmax: usize) -> usize {
    (lmax + 1) * (lmax + 2) / 2 + lmax * (lmax + 1) / 2
}

/// Driscoll-Healy latitude quadrature weights for an N-row equiangular grid;
/// they integrate band-limited functions against sin(theta) exactly and sum
/// to 2.
fn dh_weights(nlat: usize) -> Vec<f64> {
    let n = nlat as f64;
    (0..nlat)
        .map(|j| {
            let theta = PI * j as f64 / n;
            let mut sum = 0.0;
            for i in 0..nlat / 2 {
                let k = (2 * i + 1) as f64;
                sum += (k * theta).sin() / k;
            }
            (4.0 / n) * theta.sin() * sum
        })
        .collect()
}

/// (l-m)! / (l+m)!
fn factorial_ratio(l: usize, m: usize) -> f64 {
    let mut ratio = 1.0;
    for i in (l - m + 1)..=(l + m) {
        ratio /= i as f64;
    }
    ratio
}

/// 4pi-normalized associated Legendre functions P(l, m) at `x`, without the
/// Condon-Shortley phase, flattened as l * (lmax + 1) + m.
fn legendre_4pi(lmax: usize, x: f64) -> Vec<f64> {
    let stride = lmax + 1;
    let mut p = vec![0.0; stride * stride];
    let somx2 = ((1.0 - x) * (1.0 + x)).sqrt();

    p[0] = 1.0;
    for m in 0..=lmax {
        if m > 0 {
            p[m * stride + m] = p[(m - 1) * stride + (m - 1)] * (2 * m - 1) as f64 * somx2;
        }
        if m < lmax {
            p[(m + 1) * stride + m] = x * (2 * m + 1) as f64 * p[m * stride + m];
        }
        for l in (m + 2)..=lmax {
            p[l * stride + m] = ((2 * l - 1) as f64 * x * p[(l - 1) * stride + m]
                - (l + m - 1) as f64 * p[(l - 2) * stride + m])
                / (l - m) as f64;
        }
    }

    for l in 0..=lmax {
        for m in 0..=l {
            let delta = if m == 0 { 1.0 } else { 2.0 };
            let norm = delta * (2 * l + 1) as f64 * factorial_ratio(l, m);
            p[l * stride + m] *= norm.sqrt();
        }
    }
    p
}

/// Expand a scalar field sampled on an equiangular N x 2N grid (first row at
/// the north pole, first column at longitude zero) into coefficients up to
/// degree `lmax`.
pub fn expand(values: &[f64], nlat: usize, nlon: usize, lmax: usize) -> Coefficients {
    assert_eq!(values.len(), nlat * nlon);
    assert_eq!(nlon, 2 * nlat, "equiangular grid must be N x 2N");
    let stride = lmax + 1;

    // Per-order longitude basis, then per-row cosine/sine sums.
    let mut cos_basis = vec![0.0; stride * nlon];
    let mut sin_basis = vec![0.0; stride * nlon];
    for m in 0..stride {
        for k in 0..nlon {
            let phi = 2.0 * PI * k as f64 / nlon as f64;
            cos_basis[m * nlon + k] = (m as f64 * phi).cos();
            sin_basis[m * nlon + k] = (m as f64 * phi).sin();
        }
    }

    let weights = dh_weights(nlat);
    let mut cos_c = vec![0.0; stride * stride];
    let mut sin_c = vec![0.0; stride * stride];
    for j in 0..nlat {
        let row = &values[j * nlon..(j + 1) * nlon];
        let mut row_cos = vec![0.0; stride];
        let mut row_sin = vec![0.0; stride];
        for m in 0..stride {
            let cb = &cos_basis[m * nlon..(m + 1) * nlon];
            let sb = &sin_basis[m * nlon..(m + 1) * nlon];
            let mut cos_sum = 0.0;
            let mut sin_sum = 0.0;
            for k in 0..nlon {
                cos_sum += row[k] * cb[k];
                sin_sum += row[k] * sb[k];
            }
            row_cos[m] = cos_sum;
            row_sin[m] = sin_sum;
        }

        let theta = PI * j as f64 / nlat as f64;
        let plm = legendre_4pi(lmax, theta.cos());
        let w = weights[j];
        for l in 0..=lmax {
            for m in 0..=l {
                let idx = l * stride + m;
                cos_c[idx] += w * plm[idx] * row_cos[m];
                sin_c[idx] += w * plm[idx] * row_sin[m];
            }
        }
    }

    let scale = 1.0 / (4.0 * nlat as f64);
    for c in cos_c.iter_mut().chain(sin_c.iter_mut()) {
        *c *= scale;
    }

    Coefficients { lmax, cos: cos_c, sin: sin_c }
}

/// Signed-square-root companding of `f` into 0..=2*max_q: sign-preserving,
/// with most of the resolution spent near zero.
fn encode_float(f: f64, max_q: f64) -> u64 {
    let q = (f.signum() * f.abs().sqrt() * max_q + max_q).round();
    q.max(0.0).min(2.0 * max_q) as u64
}

/// Hash a 2:1 equirectangular preview image. The output length is fixed by
/// `lmax` alone: one degree digit, one scale digit, then two digits per
/// retained coefficient.
pub fn hash(img: &RgbImage, lmax: usize) -> String {
    let (width, height) = img.dimensions();
    assert_eq!(width, 2 * height, "preview must be a 2:1 equirectangular");
    let npix = (width * height) as usize;

    let mut channels = [
        Vec::with_capacity(npix),
        Vec::with_capacity(npix),
        Vec::with_capacity(npix),
    ];
    for p in img.pixels() {
        channels[0].push(p.0[0] as f64);
        channels[1].push(p.0[1] as f64);
        channels[2].push(p.0[2] as f64);
    }

    let retained: Vec<Vec<f64>> = channels
        .iter()
        .map(|c| expand(c, height as usize, width as usize, lmax).retained())
        .collect();

    let max_val = retained
        .iter()
        .flatten()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);

    let mut out = String::with_capacity(2 + 2 * retained_len(lmax));
    base83::encode_into(lmax as u64, 1, &mut out);
    base83::encode_into(encode_float(2.0 * max_val / 255.0 - 1.0, 41.0), 1, &mut out);
    for i in 0..retained_len(lmax) {
        let qr = encode_float(retained[0][i] / max_val, 9.0);
        let qg = encode_float(retained[1][i] / max_val, 9.0);
        let qb = encode_float(retained[2][i] / max_val, 9.0);
        base83::encode_into(qr * 19 * 19 + qg * 19 + qb, 2, &mut out);
    }
    out
}
