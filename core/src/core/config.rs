/// Stepper selection and tolerances for the [`crate::TimeIntegrator`].
///
/// Generalises the teacher's `RuntimeConfig` chained-method builder
/// (`core/runtime.rs`) from "which kernel-application strategy" to "which
/// ODE stepper and with what tolerances" — same idiom, different axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegratorConfig {
    pub stiff_solver: bool,
    pub dt_initial: f64,
    pub dt_min: f64,
    pub dt_max: f64,
    pub rel_tol: f64,
    pub abs_tol: f64,
    pub steps_max: usize,
}

impl IntegratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stiff_solver(mut self) -> Self {
        self.stiff_solver = true;
        self
    }

    pub fn with_dt_initial(mut self, dt: f64) -> Self {
        self.dt_initial = dt;
        self
    }

    pub fn with_dt_bounds(mut self, min: f64, max: f64) -> Self {
        self.dt_min = min;
        self.dt_max = max;
        self
    }

    pub fn with_tolerances(mut self, rel: f64, abs: f64) -> Self {
        self.rel_tol = rel;
        self.abs_tol = abs;
        self
    }

    pub fn with_steps_max(mut self, n: usize) -> Self {
        self.steps_max = n;
        self
    }
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        IntegratorConfig {
            stiff_solver: false,
            dt_initial: 1e-3,
            dt_min: 1e-8,
            dt_max: 1.0,
            rel_tol: 1e-6,
            abs_tol: 1e-9,
            steps_max: 1_000_000,
        }
    }
}

/// GMRES parameters for the [`crate::SteadyStateSolver`]. Defaults mirror
/// the hard-coded values in `original_source`'s `solver.c`: restart 100,
/// relative tolerance `1e-11`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig {
    pub gmres_restart: usize,
    pub rel_tol: f64,
    pub max_iterations: usize,
}

impl SolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_restart(mut self, restart: usize) -> Self {
        self.gmres_restart = restart;
        self
    }

    pub fn with_rel_tol(mut self, tol: f64) -> Self {
        self.rel_tol = tol;
        self
    }

    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            gmres_restart: 100,
            rel_tol: 1e-11,
            max_iterations: 10_000,
        }
    }
}
