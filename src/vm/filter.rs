//! Per-call-site state for the stateful `fir` and `biquad` functions.
//!
//! Each filter call in a patch gets its own slot, numbered by the compiler.
//! Coefficients come off the operand stack on every tick, so they can be
//! modulated; only the delay lines persist. Slots are built when a program
//! is loaded and start from silence.

/// Longest FIR kernel a patch may pass.
pub const MAX_FIR_TAPS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// `fir(x, h0, h1, ...)`: `y = Σ h[k]·x[n-k]`.
    Fir,
    /// `biquad(x, b0, b1, b2, a1, a2)`, direct form I.
    Biquad,
}

impl FilterKind {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            FilterKind::Fir => "FIR",
            FilterKind::Biquad => "BIQUAD",
        }
    }
}

#[derive(Debug, Clone)]
struct FilterSlot {
    /// `history[k]` is the input `k` samples ago.
    history: [f32; MAX_FIR_TAPS],
    y1: f32,
    y2: f32,
}

impl Default for FilterSlot {
    fn default() -> Self {
        Self {
            history: [0.0; MAX_FIR_TAPS],
            y1: 0.0,
            y2: 0.0,
        }
    }
}

impl FilterSlot {
    fn fir(&mut self, x: f32, taps: &[f32]) -> f32 {
        self.history.copy_within(0..MAX_FIR_TAPS - 1, 1);
        self.history[0] = x;
        taps.iter()
            .zip(self.history.iter())
            .map(|(h, x)| h * x)
            .sum()
    }

    fn biquad(&mut self, x: f32, c: &[f32]) -> f32 {
        let (b0, b1, b2, a1, a2) = (c[0], c[1], c[2], c[3], c[4]);
        let (x1, x2) = (self.history[0], self.history[1]);
        let y = b0 * x + b1 * x1 + b2 * x2 - a1 * self.y1 - a2 * self.y2;
        self.history[1] = x1;
        self.history[0] = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterBank {
    slots: Vec<FilterSlot>,
}

impl FilterBank {
    pub fn new(sites: usize) -> Self {
        Self {
            slots: vec![FilterSlot::default(); sites],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Run one sample through the filter at `site`. `args` holds the call's
    /// arguments in source order, input sample first.
    ///
    /// Returns `None` when the site or argument count doesn't fit.
    #[inline]
    pub fn process(&mut self, site: usize, kind: FilterKind, args: &[f32]) -> Option<f32> {
        let slot = self.slots.get_mut(site)?;
        let (&x, coefficients) = args.split_first()?;
        match kind {
            FilterKind::Fir if coefficients.len() <= MAX_FIR_TAPS => {
                Some(slot.fir(x, coefficients))
            }
            FilterKind::Biquad if coefficients.len() == 5 => Some(slot.biquad(x, coefficients)),
            _ => None,
        }
    }
}
