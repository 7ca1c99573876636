//! Boolean patterns for idle insertion and backpressure.
//!
//! A pattern is a lazy sequence of [`Run`]s: `on` asserted cycles followed by
//! `off` de-asserted cycles. The driver consumes whole runs, the backpressure
//! controller consumes one bit per cycle through [`Pattern::next`].

use log::trace;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::error::PatternError;
use crate::numeric::SineWave;

/// Consecutive runs a pattern may produce without the cycles asked for
/// before it is considered stuck.
pub const MAX_EMPTY_RUNS: u32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    pub on: u32,
    pub off: u32,
}

impl Run {
    pub fn new(on: u32, off: u32) -> Self {
        Self { on, off }
    }
}

pub trait RunSource {
    /// The next run, or `None` once a finite source is used up.
    fn next_run(&mut self) -> Option<Run>;

    /// Restarts the sequence from the beginning.
    fn reset(&mut self);
}

/// Always asserted.
pub struct Constant;

impl RunSource for Constant {
    fn next_run(&mut self) -> Option<Run> {
        Some(Run::new(1, 0))
    }
    fn reset(&mut self) {}
}

/// Run lengths follow two sine waves.
pub struct Wave {
    on: SineWave,
    off: SineWave,
}

impl Wave {
    pub fn new(on_ampl: f64, on_freq: f64, off_ampl: f64, off_freq: f64) -> Self {
        Self {
            on: SineWave::new(on_ampl, on_freq, 0.0),
            off: SineWave::new(off_ampl, off_freq, 0.0),
        }
    }
}

impl Default for Wave {
    fn default() -> Self {
        Wave::new(30.0, 200.0, 10.0, 100.0)
    }
}

impl RunSource for Wave {
    fn next_run(&mut self) -> Option<Run> {
        let on = self.on.next()?;
        let off = self.off.next()?;
        Some(Run::new(on.abs() as u32, off.abs() as u32))
    }
    fn reset(&mut self) {
        self.on.reset();
        self.off.reset();
    }
}

/// Mostly asserted, with single de-asserted cycles. The on-runs are drawn
/// from a normal distribution around `mean`, `sigma` defaults to `mean / 4`.
pub struct IntermittentSingleCycles {
    normal: Normal<f64>,
    seed: u64,
    rng: StdRng,
}

impl IntermittentSingleCycles {
    pub fn new(mean: f64, sigma: Option<f64>, seed: u64) -> Result<Self, PatternError> {
        let sigma = sigma.unwrap_or((mean / 4.0).abs());
        if !mean.is_finite() {
            return Err(PatternError::Invalid(format!("mean {}", mean)));
        }
        let normal = Normal::new(mean, sigma)
            .map_err(|e| PatternError::Invalid(format!("sigma {}: {}", sigma, e)))?;
        Ok(Self {
            normal,
            seed,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

impl RunSource for IntermittentSingleCycles {
    fn next_run(&mut self) -> Option<Run> {
        let x = self.normal.sample(&mut self.rng);
        // truncates towards zero, saturating at u32::MAX
        Some(Run::new(x.abs() as u32, 1))
    }
    fn reset(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
    }
}

/// Each cycle is asserted with a probability of one half.
pub struct Random50Percent {
    seed: u64,
    rng: StdRng,
    // first bit of the next run, drawn while finishing the previous one
    carry: Option<bool>,
}

impl Random50Percent {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
            carry: None,
        }
    }
}

impl RunSource for Random50Percent {
    fn next_run(&mut self) -> Option<Run> {
        let mut bit = match self.carry.take() {
            Some(bit) => bit,
            None => self.rng.gen_bool(0.5),
        };
        let mut run = Run::new(0, 0);
        while bit {
            run.on += 1;
            bit = self.rng.gen_bool(0.5);
        }
        while !bit {
            run.off += 1;
            bit = self.rng.gen_bool(0.5);
        }
        self.carry = Some(bit);
        Some(run)
    }
    fn reset(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
        self.carry = None;
    }
}

/// A fixed list of runs.
pub struct Finite {
    runs: Vec<Run>,
    pos: usize,
}

impl Finite {
    pub fn new(runs: Vec<Run>) -> Self {
        Self { runs, pos: 0 }
    }

    /// Compresses a per-cycle bit list into runs.
    pub fn from_bits(bits: &[bool]) -> Self {
        let mut runs: Vec<Run> = Vec::new();
        for &bit in bits {
            match (runs.last_mut(), bit) {
                (Some(run), true) if run.off == 0 => run.on += 1,
                (Some(run), false) => run.off += 1,
                (_, true) => runs.push(Run::new(1, 0)),
                (None, false) => runs.push(Run::new(0, 1)),
            }
        }
        Self::new(runs)
    }
}

impl RunSource for Finite {
    fn next_run(&mut self) -> Option<Run> {
        let run = self.runs.get(self.pos).copied();
        if run.is_some() {
            self.pos += 1;
        }
        run
    }
    fn reset(&mut self) {
        self.pos = 0;
    }
}

/// Restarts its source whenever it runs out.
pub struct Cyclic(Box<dyn RunSource>);

impl RunSource for Cyclic {
    fn next_run(&mut self) -> Option<Run> {
        match self.0.next_run() {
            Some(run) => Some(run),
            None => {
                self.0.reset();
                // an empty source stays empty
                self.0.next_run()
            }
        }
    }
    fn reset(&mut self) {
        self.0.reset();
    }
}

/// Runs of the first source, then of the second.
pub struct Chain {
    first: Box<dyn RunSource>,
    second: Box<dyn RunSource>,
    first_done: bool,
}

impl RunSource for Chain {
    fn next_run(&mut self) -> Option<Run> {
        if !self.first_done {
            match self.first.next_run() {
                Some(run) => return Some(run),
                None => self.first_done = true,
            }
        }
        self.second.next_run()
    }
    fn reset(&mut self) {
        self.first.reset();
        self.second.reset();
        self.first_done = false;
    }
}

pub struct Pattern {
    source: Box<dyn RunSource>,
    on_left: u32,
    off_left: u32,
}

impl Pattern {
    pub fn new(source: impl RunSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            on_left: 0,
            off_left: 0,
        }
    }

    pub fn constant() -> Self {
        Pattern::new(Constant)
    }

    pub fn wave() -> Self {
        Pattern::new(Wave::default())
    }

    pub fn intermittent_single_cycles(mean: f64, sigma: Option<f64>) -> Result<Self, PatternError> {
        let source = IntermittentSingleCycles::new(mean, sigma, rand::random())?;
        Ok(Pattern::new(source))
    }

    pub fn random_50_percent() -> Self {
        Pattern::new(Random50Percent::new(rand::random()))
    }

    pub fn from_bits(bits: &[bool]) -> Self {
        Pattern::new(Finite::from_bits(bits))
    }

    pub fn from_runs(runs: Vec<Run>) -> Self {
        Pattern::new(Finite::new(runs))
    }

    /// Repeats this pattern forever.
    pub fn cycle(self) -> Self {
        Pattern::new(Cyclic(self.source))
    }

    /// Continues with `next` once this pattern is used up.
    pub fn then(self, next: Pattern) -> Self {
        Pattern::new(Chain {
            first: self.source,
            second: next.source,
            first_done: false,
        })
    }

    pub fn next_run(&mut self) -> Result<Run, PatternError> {
        self.source.next_run().ok_or(PatternError::Exhausted)
    }

    /// The next run with at least one asserted cycle. Runs without one are
    /// skipped along with their de-asserted cycles.
    pub fn next_asserted_run(&mut self) -> Result<Run, PatternError> {
        for _ in 0..MAX_EMPTY_RUNS {
            let run = self.next_run()?;
            if run.on > 0 {
                return Ok(run);
            }
        }
        Err(PatternError::Stuck {
            runs: MAX_EMPTY_RUNS,
        })
    }

    /// Whether the signal is asserted in the next cycle.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<bool, PatternError> {
        for _ in 0..=MAX_EMPTY_RUNS {
            if self.on_left > 0 {
                self.on_left -= 1;
                return Ok(true);
            }
            if self.off_left > 0 {
                self.off_left -= 1;
                return Ok(false);
            }
            let run = self.next_run()?;
            trace!("pattern run: on={} off={}", run.on, run.off);
            self.on_left = run.on;
            self.off_left = run.off;
        }
        Err(PatternError::Stuck {
            runs: MAX_EMPTY_RUNS,
        })
    }

    pub fn reset(&mut self) {
        self.source.reset();
        self.on_left = 0;
        self.off_left = 0;
    }
}
