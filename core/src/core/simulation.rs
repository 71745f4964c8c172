use crate::{
    parse_hamiltonian_document, AssembledMatrices, ChannelRef, Complex, Gate, GateScheduler,
    HamiltonianBuilder, IntegratorConfig, Monitor, OperatorRegistry, PulseChannelController,
    SimError, SiteOp, SolverConfig, SteadyStateSolver, TimeIntegrator,
};
use std::collections::HashMap;

/// The external-collaborator seam for the Circuit API's
/// `initialize_and_read_qasm` (Section 6): QASM/QUIL file parsing is an
/// explicit Non-goal, so a host that wants to feed in a gate file
/// implements this trait over whatever reads it and hands gates to
/// [`Simulation::load_gates_from`] one at a time.
pub trait GateSource {
    fn next_gate(&mut self) -> Option<Gate>;
}

/// The process-wide singletons of `original_source` (`_hamiltonian`,
/// `_time_dep_list`, `_num_quantum_gates`, `stab_added`,
/// `matrix_assembled`) re-architected as a single owned value (Section
/// 9). `initialize`/`finalize`/`clear` become, respectively,
/// [`Simulation::new`], an ordinary `Drop`, and replacing `self` with a
/// fresh value for the same `num_qubits` ([`Simulation::clear`]).
///
/// Lifecycle: `new` fixes `num_qubits`; [`Simulation::create_qubits`]
/// allocates the [`OperatorRegistry`] (once); Hamiltonian terms, pulses,
/// and gates accumulate; [`Simulation::assemble`] freezes the
/// Hamiltonian Builder's pending terms into the Assembled Matrix Set;
/// [`Simulation::time_step`] and [`Simulation::steady_state`] drive the
/// evolution. A `TimeIntegrator` borrows `registry`/`assembled`, both of
/// which live on `self`, so it cannot itself be stored as a field
/// (self-referential); `time_step` instead persists `(t, dt)` directly
/// and rebuilds a short-lived `TimeIntegrator` each call via
/// [`TimeIntegrator::resume`].
pub struct Simulation {
    num_qubits: usize,
    registry: Option<OperatorRegistry>,
    hamiltonian: HamiltonianBuilder,
    pulses: Option<PulseChannelController>,
    gates: GateScheduler,
    assembled: Option<AssembledMatrices>,
    integrator_config: IntegratorConfig,
    solver: SteadyStateSolver,
    t: f64,
    dt: f64,
}

impl Simulation {
    /// Section 9 Open Question decision (DESIGN.md): `num_qubits == 0`
    /// is rejected; there is no way to pass a negative value since the
    /// field is `usize`, unlike the source's signed-long `|l` field.
    pub fn new(num_qubits: usize) -> Result<Self, SimError> {
        if num_qubits == 0 {
            return Err(SimError::ContractViolation(
                "num_qubits must be positive".into(),
            ));
        }
        Ok(Simulation {
            num_qubits,
            registry: None,
            hamiltonian: HamiltonianBuilder::new(),
            pulses: None,
            gates: GateScheduler::new(),
            assembled: None,
            integrator_config: IntegratorConfig::default(),
            solver: SteadyStateSolver::new(SolverConfig::default()),
            t: 0.0,
            dt: IntegratorConfig::default().dt_initial,
        })
    }

    pub fn with_integrator_config(mut self, config: IntegratorConfig) -> Self {
        self.dt = config.dt_initial;
        self.integrator_config = config;
        self
    }

    pub fn with_solver_config(mut self, config: SolverConfig) -> Self {
        self.solver = SteadyStateSolver::new(config);
        self
    }

    /// Allocates the per-site operators; may be called only once per
    /// instance (Section 6).
    pub fn create_qubits(&mut self, num_levels: usize) -> Result<(), SimError> {
        if self.registry.is_some() {
            return Err(SimError::InvalidState(
                "create_qubits called twice on the same Simulation".into(),
            ));
        }
        self.registry = Some(OperatorRegistry::new(self.num_qubits, num_levels)?);
        Ok(())
    }

    fn registry(&self) -> Result<&OperatorRegistry, SimError> {
        self.registry
            .as_ref()
            .ok_or_else(|| SimError::NotInitialized("create_qubits was never called".into()))
    }

    /// Schrödinger-space dimension `D`; `None` before `create_qubits`.
    pub fn dim(&self) -> Option<usize> {
        self.registry.as_ref().map(|r| r.dim())
    }

    pub fn add_const_term_1(&mut self, op: SiteOp, site: usize, c: Complex<f64>) -> Result<(), SimError> {
        self.registry()?;
        self.hamiltonian.add_const_term_1(op, site, c);
        Ok(())
    }

    pub fn add_const_term_2(
        &mut self,
        op1: SiteOp,
        site1: usize,
        op2: SiteOp,
        site2: usize,
        c: Complex<f64>,
    ) -> Result<(), SimError> {
        self.registry()?;
        self.hamiltonian.add_const_term_2(op1, site1, op2, site2, c);
        Ok(())
    }

    pub fn add_time_dep_term_1(
        &mut self,
        op: SiteOp,
        site: usize,
        c: Complex<f64>,
        channel: ChannelRef,
    ) -> Result<(), SimError> {
        self.registry()?;
        self.hamiltonian.add_time_dep_term_1(op, site, c, channel);
        Ok(())
    }

    pub fn add_time_dep_term_2(
        &mut self,
        op1: SiteOp,
        site1: usize,
        op2: SiteOp,
        site2: usize,
        c: Complex<f64>,
        channel: ChannelRef,
    ) -> Result<(), SimError> {
        self.registry()?;
        self.hamiltonian
            .add_time_dep_term_2(op1, site1, op2, site2, c, channel);
        Ok(())
    }

    /// `L = SM_site`, rate `kappa`; switches the integrator to Liouville
    /// mode at the next `assemble` (4.2).
    pub fn add_qubit_decay(&mut self, site: usize, kappa: f64) -> Result<(), SimError> {
        self.registry()?;
        self.hamiltonian.add_qubit_decay(site, kappa)
    }

    /// Configures the pulse backend: sample period `dt` and one LO
    /// frequency per channel (Section 6: Backend config).
    pub fn configure_pulses(&mut self, dt: f64, lo_freqs: Vec<f64>) {
        self.pulses = Some(PulseChannelController::new(dt, lo_freqs));
    }

    pub fn pulses_mut(&mut self) -> Result<&mut PulseChannelController, SimError> {
        self.pulses
            .as_mut()
            .ok_or_else(|| SimError::NotInitialized("configure_pulses was never called".into()))
    }

    /// Circuit API (Section 6): `add_gate(gate, qubit1, qubit2, angle,
    /// time)` collapses here into constructing a [`Gate`] and handing it
    /// to the scheduler.
    pub fn add_gate(&mut self, gate: Gate) {
        self.gates.add_gate(gate);
    }

    /// Pulls every gate out of an external `GateSource` (the seam
    /// standing in for `initialize_and_read_qasm`'s file parsing, which
    /// stays outside this crate) and schedules them.
    pub fn load_gates_from(&mut self, source: &mut dyn GateSource) {
        while let Some(g) = source.next_gate() {
            self.add_gate(g);
        }
    }

    /// The `user text -> HP -> HB` data flow of Section 2: parses each
    /// `h_str` entry against `vars` and hands every resulting
    /// [`crate::ParsedTerm`] to [`HamiltonianBuilder::apply_parsed_term`].
    /// A parse failure aborts before any term from this call is applied,
    /// so `self.hamiltonian` is left exactly as it was if `h_str` is
    /// rejected outright.
    pub fn load_hamiltonian_text(
        &mut self,
        h_str: &[String],
        vars: &HashMap<String, f64>,
    ) -> Result<(), SimError> {
        self.registry()?;
        let terms = parse_hamiltonian_document(h_str, vars)?;
        for term in &terms {
            self.hamiltonian.apply_parsed_term(term);
        }
        Ok(())
    }

    /// Freezes the Hamiltonian Builder's pending terms into the
    /// Assembled Matrix Set and resets the integrator clock. Must be
    /// called once after all `add_const_term_*`/`add_time_dep_term_*`/
    /// `add_qubit_decay` calls and before the first `time_step`.
    pub fn assemble(&mut self) -> Result<(), SimError> {
        let registry = self.registry()?;
        let assembled = self.hamiltonian.assemble(registry, &self.integrator_config)?;
        self.assembled = Some(assembled);
        self.t = 0.0;
        self.dt = self.integrator_config.dt_initial;
        Ok(())
    }

    fn assembled(&self) -> Result<&AssembledMatrices, SimError> {
        self.assembled
            .as_ref()
            .ok_or_else(|| SimError::NotInitialized("assemble was never called".into()))
    }

    /// `D` (Schrödinger) or `D^2` (Liouville) state-vector dimension the
    /// next `time_step`/`steady_state` call expects.
    pub fn solve_dim(&self) -> Result<usize, SimError> {
        Ok(self.assembled()?.solve_dim())
    }

    pub fn is_liouville(&self) -> Result<bool, SimError> {
        Ok(self.assembled()?.liouville)
    }

    pub fn current_time(&self) -> f64 {
        self.t
    }

    /// Advances `x` up to `t_max`, firing the normalization and
    /// gate-application events each accepted step (4.5). Rejects the
    /// call outright if a `steady_state` solve left the stabilization
    /// row in place (7: InvalidState) — the Hamiltonian must already be
    /// assembled.
    pub fn time_step(&mut self, x: &mut Vec<Complex<f64>>, t_max: f64, monitor: &mut Monitor) -> Result<usize, SimError> {
        if self.solver.is_stabilized() {
            return Err(SimError::InvalidState(
                "time_step called while the steady-state stabilization row is still present".into(),
            ));
        }
        let registry = self.registry()?;
        let assembled = self
            .assembled
            .as_ref()
            .ok_or_else(|| SimError::NotInitialized("assemble was never called".into()))?;
        let pulses_empty = PulseChannelController::new(1.0, vec![]);
        let pulses = self.pulses.as_ref().unwrap_or(&pulses_empty);

        let mut integrator = TimeIntegrator::resume(registry, assembled, self.integrator_config, self.t, self.dt);
        let steps = integrator.time_step(x, t_max, pulses, &mut self.gates, monitor)?;
        self.t = integrator.current_time();
        self.dt = integrator.current_dt();
        Ok(steps)
    }

    /// Solves `L x = b` with the stabilization row added, pinning `tr
    /// rho = 1` (4.6). Requires Liouville mode (i.e. at least one
    /// Lindblad term was registered before `assemble`).
    pub fn steady_state(&mut self) -> Result<Vec<Complex<f64>>, SimError> {
        let dim = self
            .registry
            .as_ref()
            .ok_or_else(|| SimError::NotInitialized("create_qubits was never called".into()))?
            .dim();
        let assembled = self
            .assembled
            .as_mut()
            .ok_or_else(|| SimError::NotInitialized("assemble was never called".into()))?;
        let full_a = assembled.full_a.as_mut().ok_or_else(|| {
            SimError::InvalidState("steady_state requires at least one Lindblad term".into())
        })?;
        self.solver.solve(full_a, dim)
    }

    /// Resets internal state without tearing down anything process-wide
    /// (there is nothing process-wide left to tear down — Section 6).
    pub fn clear(&mut self) -> Result<(), SimError> {
        *self = Simulation::new(self.num_qubits)?
            .with_integrator_config(self.integrator_config);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complex;
    use approx::assert_abs_diff_eq;

    #[test]
    fn rejects_zero_qubits() {
        assert!(Simulation::new(0).is_err());
    }

    #[test]
    fn create_qubits_is_single_shot() {
        let mut sim = Simulation::new(1).unwrap();
        sim.create_qubits(2).unwrap();
        assert!(sim.create_qubits(2).is_err());
    }

    #[test]
    fn full_static_run_conserves_norm() {
        let mut sim = Simulation::new(1).unwrap();
        sim.create_qubits(2).unwrap();
        sim.add_const_term_1(SiteOp::Z, 0, complex!(-1.0, 0.0)).unwrap();
        sim.assemble().unwrap();
        let mut x = vec![complex!(1.0, 0.0), complex!(0.0, 0.0)];
        let mut monitor = |_t: f64, _x: &[Complex<f64>]| {};
        let steps = sim.time_step(&mut x, 1.0, &mut monitor).unwrap();
        assert!(steps > 0);
        let norm2: f64 = x.iter().map(|c| c.norm2()).sum();
        assert_abs_diff_eq!(norm2, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn decay_run_reaches_steady_state() {
        let mut sim = Simulation::new(1).unwrap();
        sim.create_qubits(2).unwrap();
        sim.add_qubit_decay(0, 0.1).unwrap();
        sim.assemble().unwrap();
        assert!(sim.is_liouville().unwrap());
        let x = sim.steady_state().unwrap();
        // Decay alone drives everything to |0><0|: rho_00 = 1, else 0.
        assert_abs_diff_eq!(x[0].real, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn load_hamiltonian_text_threads_coefficient_into_time_dep_rhs() {
        let mut sim = Simulation::new(1).unwrap();
        sim.create_qubits(2).unwrap();
        let h_str = vec!["0.5*X0||D1".to_string()];
        sim.load_hamiltonian_text(&h_str, &HashMap::new()).unwrap();
        sim.assemble().unwrap();
        let assembled = sim.assembled.as_ref().unwrap();
        assert!(assembled.has_time_dependence());
        let mut scratch = assembled.base_matrix();
        assembled.rebuild_rhs(&mut scratch, |_, _| complex!(1.0, 0.0), 0.0);
        assert_abs_diff_eq!(scratch.get(0, 1).imaginary, -0.5, epsilon = 1e-12);
    }

    #[test]
    fn load_hamiltonian_text_rejects_unknown_operator_without_mutating_builder() {
        let mut sim = Simulation::new(1).unwrap();
        sim.create_qubits(2).unwrap();
        let h_str = vec!["1.0*Q0".to_string()];
        assert!(sim.load_hamiltonian_text(&h_str, &HashMap::new()).is_err());
        sim.assemble().unwrap();
        let assembled = sim.assembled.as_ref().unwrap();
        assert!(!assembled.has_time_dependence());
    }
}
