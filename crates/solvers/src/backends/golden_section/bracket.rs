/// The golden ratio: φ = (1 + √5) / 2
const PHI: f64 = 1.618_033_988_749_895;

/// The inverse golden ratio: 1/φ = φ - 1
const INV_PHI: f64 = PHI - 1.0;

/// An evaluated point of the search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct Probe {
    pub(super) x: f64,
    pub(super) f: f64,
}

/// Which end of the bracket the next step discards, and where it probes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum Step {
    /// Keep `[left, inner_right]`; probe a new inner left point.
    DropRight(f64),

    /// Keep `[inner_left, right]`; probe a new inner right point.
    DropLeft(f64),
}

impl Step {
    pub(super) fn x(self) -> f64 {
        match self {
            Self::DropRight(x) | Self::DropLeft(x) => x,
        }
    }
}

/// Outer interval with two evaluated interior probes at golden-ratio positions.
#[derive(Debug, Clone, Copy)]
pub(super) struct Bracket {
    left: f64,
    right: f64,
    inner: [Probe; 2],
}

impl Bracket {
    /// Interior positions of `[left, right]`, left one first.
    pub(super) fn interior(left: f64, right: f64) -> [f64; 2] {
        let width = right - left;
        [left + (1.0 - INV_PHI) * width, left + INV_PHI * width]
    }

    pub(super) fn new(left: f64, right: f64, inner: [Probe; 2]) -> Self {
        Self { left, right, inner }
    }

    pub(super) fn width(&self) -> f64 {
        self.right - self.left
    }

    /// Ties keep the left part of the bracket.
    pub(super) fn next(&self) -> Step {
        let [inner_left, inner_right] = self.inner;
        if inner_left.f <= inner_right.f {
            let width = inner_right.x - self.left;
            Step::DropRight(self.left + (1.0 - INV_PHI) * width)
        } else {
            let width = self.right - inner_left.x;
            Step::DropLeft(inner_left.x + INV_PHI * width)
        }
    }

    /// Shrinks the bracket by `step`, reusing the surviving interior probe.
    pub(super) fn apply(&mut self, step: Step, probe: Probe) {
        let [inner_left, inner_right] = self.inner;
        match step {
            Step::DropRight(_) => {
                self.right = inner_right.x;
                self.inner = [probe, inner_left];
            }
            Step::DropLeft(_) => {
                self.left = inner_left.x;
                self.inner = [inner_right, probe];
            }
        }
    }

    /// The lower of the two interior probes.
    pub(super) fn best(&self) -> Probe {
        let [inner_left, inner_right] = self.inner;
        if inner_left.f <= inner_right.f { inner_left } else { inner_right }
    }

    /// Whether the bracket is narrower than `abs_tol + rel_tol · |midpoint|`.
    pub(super) fn is_converged(&self, abs_tol: f64, rel_tol: f64) -> bool {
        let mid = 0.5 * (self.left + self.right);
        self.width() <= abs_tol + rel_tol * mid.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn probe(x: f64) -> Probe {
        Probe { x, f: (x - 0.9).powi(2) }
    }

    fn unit() -> Bracket {
        let [a, b] = Bracket::interior(0.0, 1.0);
        Bracket::new(0.0, 1.0, [probe(a), probe(b)])
    }

    #[test]
    fn interior_points_divide_the_interval_by_the_golden_ratio() {
        let [a, b] = Bracket::interior(0.0, 1.0);

        assert_relative_eq!(a, 1.0 - INV_PHI);
        assert_relative_eq!(b, INV_PHI);
        assert_relative_eq!(a / (1.0 - a), INV_PHI);
    }

    #[test]
    fn dropping_left_reuses_the_inner_right_probe() {
        let mut bracket = unit();
        let kept = bracket.inner[1];

        let step = bracket.next();
        assert!(matches!(step, Step::DropLeft(_)));
        bracket.apply(step, probe(step.x()));

        assert_relative_eq!(bracket.left, 1.0 - INV_PHI);
        assert_eq!(bracket.inner[0], kept);
        assert_relative_eq!(bracket.inner[1].x, bracket.left + INV_PHI * bracket.width());
    }

    #[test]
    fn dropping_right_reuses_the_inner_left_probe() {
        let [a, b] = Bracket::interior(0.0, 1.0);
        let low = |x: f64| Probe { x, f: x * x };
        let mut bracket = Bracket::new(0.0, 1.0, [low(a), low(b)]);
        let kept = bracket.inner[0];

        let step = bracket.next();
        assert!(matches!(step, Step::DropRight(_)));
        bracket.apply(step, low(step.x()));

        assert_relative_eq!(bracket.right, INV_PHI);
        assert_eq!(bracket.inner[1], kept);
        assert_relative_eq!(
            bracket.inner[0].x,
            bracket.left + (1.0 - INV_PHI) * bracket.width()
        );
    }

    #[test]
    fn convergence_scales_with_the_midpoint() {
        let bracket = Bracket::new(
            1000.0,
            1000.5,
            [Probe { x: 1000.2, f: 0.0 }, Probe { x: 1000.3, f: 0.0 }],
        );

        assert!(!bracket.is_converged(0.1, 0.0));
        assert!(bracket.is_converged(0.0, 1e-3));
    }
}
