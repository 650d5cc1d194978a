//! Random draws used by mortality and dispersal.
//!
//! All draws take the process-wide generator as `&mut dyn RngCore` so that the
//! invocation order alone determines reproducibility.
use rand::RngCore;

/// Uniform draw in [0, 1) with 53 bits of precision.
#[inline]
pub fn rand01(rng: &mut dyn RngCore) -> f64 {
    (rng.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
}

/// Bernoulli trial with success probability `p`.
#[inline]
pub fn chance(rng: &mut dyn RngCore, p: f64) -> bool {
    rand01(rng) < p
}

/// Standard normal draw (Box–Muller, one value per call).
///
/// Box, G. E. P. & Muller, M. E. (1958). A note on the generation of random
/// normal deviates. Ann. Math. Statist. 29(2), 610-611.
pub fn standard_normal(rng: &mut dyn RngCore) -> f64 {
    let u1 = (1.0 - rand01(rng)).clamp(f64::MIN_POSITIVE, 1.0);
    let u2 = rand01(rng);
    let r = (-2.0 * u1.ln()).sqrt();
    r * (2.0 * core::f64::consts::PI * u2).cos()
}

pub fn normal(rng: &mut dyn RngCore, mean: f64, std_dev: f64) -> f64 {
    mean + std_dev * standard_normal(rng)
}

/// Lognormal draw whose expected value is `mean`; `sigma` is the standard
/// deviation of the underlying normal.
pub fn lognormal(rng: &mut dyn RngCore, mean: f64, sigma: f64) -> f64 {
    if mean <= 0.0 {
        return 0.0;
    }
    let mu = mean.ln() - 0.5 * sigma * sigma;
    (mu + sigma * standard_normal(rng)).exp()
}

/// Poisson draw. Knuth's product method for small means, Hörmann's PTRS above.
///
/// - Knuth, D. E. (1997). The Art of Computer Programming, Vol. 2, 3rd ed.,
///   section 3.4.1.
/// - Hörmann, W. (1993). The transformed rejection method for generating
///   Poisson random variables. Insurance: Mathematics and Economics 12(1), 39-45.
pub fn poisson(rng: &mut dyn RngCore, lambda: f64) -> u64 {
    if !lambda.is_finite() || lambda <= 0.0 {
        return 0;
    }
    if lambda < 10.0 {
        poisson_knuth(rng, lambda)
    } else {
        poisson_ptrs(rng, lambda)
    }
}

fn poisson_knuth(rng: &mut dyn RngCore, lambda: f64) -> u64 {
    let l = (-lambda).exp();
    let mut k: u64 = 0;
    let mut p = 1.0;
    loop {
        p *= rand01(rng);
        if p <= l {
            return k;
        }
        k += 1;
    }
}

fn poisson_ptrs(rng: &mut dyn RngCore, lambda: f64) -> u64 {
    let slam = lambda.sqrt();
    let loglam = lambda.ln();
    let b = 0.931 + 2.53 * slam;
    let a = -0.059 + 0.02483 * b;
    let inv_alpha = 1.1239 + 1.1328 / (b - 3.4);
    let vr = 0.9277 - 3.6224 / (b - 2.0);

    loop {
        let u = rand01(rng) - 0.5;
        let v = rand01(rng);
        let us = 0.5 - u.abs();
        let k = ((2.0 * a / us + b) * u + lambda + 0.43).floor();

        if us >= 0.07 && v <= vr {
            return k as u64;
        }
        if k < 0.0 || (us < 0.013 && v > us) {
            continue;
        }
        let lhs = v.ln() + inv_alpha.ln() - (a / (us * us) + b).ln();
        let rhs = -lambda + k * loglam - ln_gamma(k + 1.0);
        if lhs <= rhs {
            return k as u64;
        }
    }
}

/// Gamma draw with the given shape and scale.
///
/// Marsaglia, G. & Tsang, W. W. (2000). A simple method for generating gamma
/// variables. ACM Trans. Math. Softw. 26(3), 363-372. Shapes below 1 use the
/// `U^(1/shape)` boost from the same paper.
pub fn gamma(rng: &mut dyn RngCore, shape: f64, scale: f64) -> f64 {
    if shape <= 0.0 || scale <= 0.0 {
        return 0.0;
    }
    if shape < 1.0 {
        let u = rand01(rng).max(f64::MIN_POSITIVE);
        return gamma(rng, shape + 1.0, scale) * u.powf(1.0 / shape);
    }

    let d = shape - 1.0 / 3.0;
    let c = 1.0 / (9.0 * d).sqrt();
    loop {
        let x = standard_normal(rng);
        let v = 1.0 + c * x;
        if v <= 0.0 {
            continue;
        }
        let v = v * v * v;
        let u = rand01(rng).max(f64::MIN_POSITIVE);
        if u < 1.0 - 0.0331 * x * x * x * x || u.ln() < 0.5 * x * x + d * (1.0 - v + v.ln()) {
            return d * v * scale;
        }
    }
}

/// Negative binomial draw parameterized by mean and clumping parameter `k`
/// (variance `mean + mean²/k`), drawn as a gamma–Poisson mixture.
pub fn negative_binomial(rng: &mut dyn RngCore, mean: f64, clumping: f64) -> u64 {
    if mean <= 0.0 {
        return 0;
    }
    if clumping <= 0.0 || !clumping.is_finite() {
        return poisson(rng, mean);
    }
    let lambda = gamma(rng, clumping, mean / clumping);
    poisson(rng, lambda)
}

/// Rounds `value` down or up at random so that the expectation equals `value`.
pub fn random_round(rng: &mut dyn RngCore, value: f64) -> u64 {
    if value <= 0.0 {
        return 0;
    }
    let floor = value.floor();
    let frac = value - floor;
    floor as u64 + u64::from(chance(rng, frac))
}

/// Natural log of the gamma function (Lanczos approximation, g = 7, n = 9).
///
/// Lanczos, C. (1964). A precision approximation of the gamma function.
/// SIAM J. Numer. Anal. Ser. B 1, 86-96.
pub fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        let pi = core::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let mut a = COEFFS[0];
    let t = x + 7.5;
    for (i, c) in COEFFS.iter().enumerate().skip(1) {
        a += c / (x + i as f64);
    }
    0.5 * (2.0 * core::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
}
