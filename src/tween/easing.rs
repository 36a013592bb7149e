//! Scalar easing functions.
//!
//! A closed set of `t -> t'` curves over `[0, 1]`, looked up by name at
//! runtime (action frames and templates carry the easing name as a
//! string). Unknown names fall back to `linear` with a warning — callers
//! never see a missing-easing error.

use std::f64::consts::PI;

pub type EasingFn = fn(f64) -> f64;

pub fn linear(t: f64) -> f64 {
    t
}

pub fn in_sine(t: f64) -> f64 {
    (1.5707963 * t).sin()
}

pub fn out_sine(t: f64) -> f64 {
    1.0 + (1.5707963 * (t - 1.0)).sin()
}

pub fn in_out_sine(t: f64) -> f64 {
    0.5 * (1.0 + (PI * (t - 0.5)).sin())
}

pub fn in_quad(t: f64) -> f64 {
    t * t
}

pub fn out_quad(t: f64) -> f64 {
    t * (2.0 - t)
}

pub fn in_out_quad(t: f64) -> f64 {
    if t < 0.5 {
        2.0 * t * t
    } else {
        t * (4.0 - 2.0 * t) - 1.0
    }
}

pub fn in_cubic(t: f64) -> f64 {
    t * t * t
}

pub fn out_cubic(t: f64) -> f64 {
    let t = t - 1.0;
    1.0 + t * t * t
}

pub fn in_out_cubic(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        let t = t - 1.0;
        1.0 + t * (2.0 * t) * (2.0 * t)
    }
}

pub fn in_quart(t: f64) -> f64 {
    let t2 = t * t;
    t2 * t2
}

pub fn out_quart(t: f64) -> f64 {
    let t = (t - 1.0) * t;
    1.0 - t * t
}

pub fn in_out_quart(t: f64) -> f64 {
    if t < 0.5 {
        let t2 = t * t;
        8.0 * t2 * t2
    } else {
        let t = (t - 1.0) * t;
        1.0 - 8.0 * t * t
    }
}

pub fn in_quint(t: f64) -> f64 {
    let t2 = t * t;
    t * t2 * t2
}

pub fn out_quint(t: f64) -> f64 {
    let t = t - 1.0;
    let t2 = t * t;
    1.0 + t * t2 * t2
}

pub fn in_out_quint(t: f64) -> f64 {
    if t < 0.5 {
        let t2 = t * t;
        16.0 * t * t2 * t2
    } else {
        let t = t - 1.0;
        let t2 = t * t;
        1.0 + 16.0 * t * t2 * t2
    }
}

pub fn in_expo(t: f64) -> f64 {
    (2f64.powf(8.0 * t) - 1.0) / 255.0
}

pub fn out_expo(t: f64) -> f64 {
    1.0 - 2f64.powf(-8.0 * t)
}

pub fn in_out_expo(t: f64) -> f64 {
    if t < 0.5 {
        (2f64.powf(16.0 * t) - 1.0) / 510.0
    } else {
        1.0 - 0.5 * 2f64.powf(-16.0 * (t - 0.5))
    }
}

pub fn in_circ(t: f64) -> f64 {
    1.0 - (1.0 - t).sqrt()
}

pub fn out_circ(t: f64) -> f64 {
    t.sqrt()
}

pub fn in_out_circ(t: f64) -> f64 {
    if t < 0.5 {
        (1.0 - (1.0 - 2.0 * t).sqrt()) * 0.5
    } else {
        (1.0 + (2.0 * t - 1.0).sqrt()) * 0.5
    }
}

pub fn in_back(t: f64) -> f64 {
    t * t * (2.70158 * t - 1.70158)
}

pub fn out_back(t: f64) -> f64 {
    let t = t - 1.0;
    1.0 + t * t * (2.70158 * t + 1.70158)
}

pub fn in_out_back(t: f64) -> f64 {
    if t < 0.5 {
        t * t * (7.0 * t - 2.5) * 2.0
    } else {
        let t = t - 1.0;
        1.0 + t * t * 2.0 * (7.0 * t + 2.5)
    }
}

pub fn in_elastic(t: f64) -> f64 {
    let t2 = t * t;
    t2 * t2 * (t * PI * 4.5).sin()
}

pub fn out_elastic(t: f64) -> f64 {
    let t2 = (t - 1.0) * (t - 1.0);
    1.0 - t2 * t2 * (t * PI * 4.5).cos()
}

pub fn in_out_elastic(t: f64) -> f64 {
    if t < 0.45 {
        let t2 = t * t;
        8.0 * t2 * t2 * (t * PI * 9.0).sin()
    } else if t < 0.55 {
        0.5 + 0.75 * (t * PI * 4.0).sin()
    } else {
        let t2 = (t - 1.0) * (t - 1.0);
        1.0 - 8.0 * t2 * t2 * (t * PI * 9.0).sin()
    }
}

pub fn in_bounce(t: f64) -> f64 {
    2f64.powf(6.0 * (t - 1.0)) * (t * PI * 3.5).sin().abs()
}

pub fn out_bounce(t: f64) -> f64 {
    1.0 - 2f64.powf(-6.0 * t) * (t * PI * 3.5).cos().abs()
}

pub fn in_out_bounce(t: f64) -> f64 {
    if t < 0.5 {
        8.0 * 2f64.powf(8.0 * (t - 1.0)) * (t * PI * 7.0).sin().abs()
    } else {
        1.0 - 8.0 * 2f64.powf(-8.0 * t) * (t * PI * 7.0).sin().abs()
    }
}

/// Look up an easing function by name. Unknown names warn and fall back
/// to `linear` — this is a deliberate forgiving boundary, since easing
/// names arrive over the wire from user-submitted action batches and
/// templates.
pub fn by_name(name: &str) -> EasingFn {
    match name {
        "linear" => linear,
        "in_sine" => in_sine,
        "out_sine" => out_sine,
        "in_out_sine" => in_out_sine,
        "in_quad" => in_quad,
        "out_quad" => out_quad,
        "in_out_quad" => in_out_quad,
        "in_cubic" => in_cubic,
        "out_cubic" => out_cubic,
        "in_out_cubic" => in_out_cubic,
        "in_quart" => in_quart,
        "out_quart" => out_quart,
        "in_out_quart" => in_out_quart,
        "in_quint" => in_quint,
        "out_quint" => out_quint,
        "in_out_quint" => in_out_quint,
        "in_expo" => in_expo,
        "out_expo" => out_expo,
        "in_out_expo" => in_out_expo,
        "in_circ" => in_circ,
        "out_circ" => out_circ,
        "in_out_circ" => in_out_circ,
        "in_back" => in_back,
        "out_back" => out_back,
        "in_out_back" => in_out_back,
        "in_elastic" => in_elastic,
        "out_elastic" => out_elastic,
        "in_out_elastic" => in_out_elastic,
        "in_bounce" => in_bounce,
        "out_bounce" => out_bounce,
        "in_out_bounce" => in_out_bounce,
        other => {
            tracing::warn!(easing = other, "unknown easing function, falling back to linear");
            linear
        }
    }
}

/// Pick an easing function weighted toward gentle curves, used by idle
/// controllers (body sway, mouth expression) that want natural-looking
/// randomized motion rather than a single fixed curve.
pub fn weighted_random() -> EasingFn {
    use rand::seq::SliceRandom;
    let choices: [(EasingFn, f64); 3] = [(in_out_sine, 0.75), (in_out_quad, 0.15), (in_out_back, 0.10)];
    let mut rng = rand::thread_rng();
    choices
        .choose_weighted(&mut rng, |item| item.1)
        .map(|item| item.0)
        .unwrap_or(in_out_sine)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_is_identity() {
        assert_eq!(linear(0.0), 0.0);
        assert_eq!(linear(1.0), 1.0);
        assert_eq!(linear(0.5), 0.5);
    }

    #[test]
    fn boundary_conditions_hold_at_zero_and_one() {
        for f in [
            in_sine, out_sine, in_out_sine, in_quad, out_quad, in_out_quad, in_cubic, out_cubic,
            in_out_cubic, in_circ, out_circ, in_out_circ,
        ] {
            assert!((f(0.0)).abs() < 1e-6, "f(0) should be ~0");
            assert!((f(1.0) - 1.0).abs() < 1e-6, "f(1) should be ~1");
        }
    }

    #[test]
    fn unknown_name_falls_back_to_linear() {
        let f = by_name("not_a_real_easing");
        assert_eq!(f(0.25), 0.25);
    }
}
