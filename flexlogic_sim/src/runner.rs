//! Scenario runner - builds each circuit on a fresh engine and checks it.

use crate::circuits::{check_consistency, CircuitGen};
use crate::config::SimConfig;
use crate::error::SimError;
use crate::exporter::StepFrame;
use crate::scenarios::ScenarioId;

use flexlogic_core::{
    wire, CyclePolicy, EngineConfig, EngineSnapshot, LogicEngine, LogicError, RestoreReport,
    SolverId, StepReport, WireState, WIDTH,
};
use flexlogic_env::{MemoryHost, NetId, RecordingSink};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Event budget for scenarios that build cycles when the run is configured
/// unbounded.
const CYCLE_FALLBACK_LIMIT: usize = 1024;

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Nets registered when the scenario ended
    pub final_net_count: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,

    /// Every step taken
    pub frames: Vec<StepFrame>,

    /// Final lane states
    pub final_snapshot: EngineSnapshot,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioMetrics {
    /// `step_from` calls
    pub steps: u64,

    /// Solver invocations across completed steps
    pub events: u64,

    /// Net state changes reported by completed steps
    pub changed_nets: u64,

    /// Steps abandoned at the event limit
    pub limit_hits: u64,

    /// Topology rebuilds
    pub restores: u64,

    pub edges_added: u64,
    pub edges_removed: u64,

    /// Out-of-range lanes forced to Unknown
    pub corrected_lanes: u64,

    /// Notifications delivered to the change sink
    pub notifications: u64,

    /// Consistency checks that passed
    pub checks: u64,
}

/// An engine over an in-memory host, with bookkeeping for one scenario.
struct Bench {
    engine: LogicEngine<MemoryHost>,
    sink: Arc<RecordingSink>,
    metrics: ScenarioMetrics,
    frames: Vec<StepFrame>,
}

impl Bench {
    fn new(config: EngineConfig) -> Self {
        let sink = Arc::new(RecordingSink::new());
        let engine = LogicEngine::with_config(MemoryHost::new(), config).with_sink(sink.clone());
        Self {
            engine,
            sink,
            metrics: ScenarioMetrics::default(),
            frames: Vec::new(),
        }
    }

    fn host(&mut self) -> &mut MemoryHost {
        self.engine.host_mut()
    }

    /// Creates a net in the host and registers it with the engine.
    fn add(&mut self, path: &str, initial: Option<&[i32]>) -> Result<NetId, SimError> {
        self.add_with_solver(path, SolverId::WIRE, initial)
    }

    fn add_with_solver(
        &mut self,
        path: &str,
        solver: SolverId,
        initial: Option<&[i32]>,
    ) -> Result<NetId, SimError> {
        let id = self.host().insert(path)?;
        self.host().set_solver(id, solver.0)?;
        let corrected = self.engine.add_net(id, initial)?;
        self.metrics.corrected_lanes += corrected.len() as u64;
        Ok(id)
    }

    fn connect(&mut self, from: NetId, to: NetId) -> Result<(), SimError> {
        self.host().connect(from, to)?;
        Ok(())
    }

    fn restore(&mut self) -> RestoreReport {
        let report = self.engine.restore_connections();
        self.count_restore(&report);
        report
    }

    fn count_restore(&mut self, report: &RestoreReport) {
        self.metrics.restores += 1;
        self.metrics.edges_added += report.added.len() as u64;
        self.metrics.edges_removed += report.removed.len() as u64;
    }

    fn remove(&mut self, id: &NetId) -> Result<(), SimError> {
        let report = self.engine.remove_net(id)?;
        self.count_restore(&report);
        Ok(())
    }

    fn set_state(&mut self, id: &NetId, lanes: &[i32]) -> Result<(), SimError> {
        let corrected = self.engine.set_state(id, lanes)?;
        self.metrics.corrected_lanes += corrected.len() as u64;
        Ok(())
    }

    fn step(&mut self, id: &NetId) -> Result<StepReport, LogicError> {
        let index = self.frames.len();
        let result = self.engine.step_from(id);
        self.metrics.steps += 1;

        let frame = match &result {
            Ok(report) => {
                self.metrics.events += report.events as u64;
                self.metrics.changed_nets += report.changed.len() as u64;
                StepFrame::completed(index, report)
            }
            Err(err) => {
                if matches!(err, LogicError::PropagationLimit { .. }) {
                    self.metrics.limit_hits += 1;
                }
                StepFrame::failed(index, *id, err)
            }
        };
        self.frames.push(frame);
        result
    }

    fn check(&mut self) -> Result<(), SimError> {
        check_consistency(&self.engine)?;
        self.metrics.checks += 1;
        Ok(())
    }

    fn expect_uniform(&self, id: &NetId, state: WireState, what: &str) -> Result<(), SimError> {
        let actual = self.engine.get_state(id)?;
        if actual != wire::uniform(state) {
            return Err(SimError::check(format!(
                "{}: expected {} on every lane, got {}",
                what,
                state,
                wire::format_lanes(&actual)
            )));
        }
        Ok(())
    }

    fn expect_mask(
        &self,
        id: &NetId,
        which: WireState,
        expected: u32,
        what: &str,
    ) -> Result<(), SimError> {
        let actual = self.engine.mask(id, which)?;
        if actual != expected {
            return Err(SimError::check(format!(
                "{}: {} mask {:#010x}, expected {:#010x}",
                what, which, actual, expected
            )));
        }
        Ok(())
    }

    fn finish(self) -> (ScenarioMetrics, Vec<StepFrame>, EngineSnapshot, usize) {
        let mut metrics = self.metrics;
        metrics.notifications = self.sink.events().len() as u64;
        let snapshot = self.engine.snapshot();
        let nets = self.engine.net_count();
        (metrics, self.frames, snapshot, nets)
    }
}

fn lanes(state: WireState) -> Vec<i32> {
    vec![i32::from(state.ordinal()); WIDTH]
}

fn ensure(cond: bool, msg: impl FnOnce() -> String) -> Result<(), SimError> {
    if cond {
        Ok(())
    } else {
        Err(SimError::Check(msg()))
    }
}

/// Runs scenarios against fresh engines.
pub struct ScenarioRunner {
    config: SimConfig,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64, num_nets: usize) -> Self {
        Self::from_config(SimConfig {
            seed,
            num_nets,
            ..Default::default()
        })
    }

    pub fn from_config(config: SimConfig) -> Self {
        Self { config }
    }

    /// Sets the number of churn operations.
    pub fn with_steps(mut self, steps: usize) -> Self {
        self.config.steps = steps;
        self
    }

    /// Sets the maximum loads per driver in generated trees.
    pub fn with_fanout_degree(mut self, degree: usize) -> Self {
        self.config.fanout_degree = degree;
        self
    }

    pub fn with_engine_config(mut self, engine: EngineConfig) -> Self {
        self.config.engine = engine;
        self
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.config.seed);

        let mut bench = Bench::new(self.engine_config_for(scenario));
        let outcome = match scenario {
            ScenarioId::Buffer => self.run_buffer(&mut bench),
            ScenarioId::BusConflict => self.run_bus_conflict(&mut bench),
            ScenarioId::Removal => self.run_removal(&mut bench),
            ScenarioId::FanoutTree => self.run_fanout_tree(&mut bench),
            ScenarioId::Gates => self.run_gates(&mut bench),
            ScenarioId::FeedbackLoop => self.run_feedback_loop(&mut bench),
            ScenarioId::Churn => self.run_churn(&mut bench),
        };

        let (metrics, frames, final_snapshot, final_net_count) = bench.finish();
        if let Err(err) = &outcome {
            warn!(scenario = scenario.name(), error = %err, "Scenario failed");
        }
        debug!(
            scenario = scenario.name(),
            steps = metrics.steps,
            events = metrics.events,
            notifications = metrics.notifications,
            "Scenario finished"
        );

        ScenarioResult {
            scenario,
            seed: self.config.seed,
            passed: outcome.is_ok(),
            final_net_count,
            failure_reason: outcome.err().map(|e| e.to_string()),
            metrics,
            frames,
            final_snapshot,
        }
    }

    /// The run's engine settings, adjusted where a scenario needs it.
    fn engine_config_for(&self, scenario: ScenarioId) -> EngineConfig {
        let mut config = self.config.engine.clone();
        match scenario {
            ScenarioId::Gates => config.builtin_gates = true,
            ScenarioId::FeedbackLoop | ScenarioId::Churn
                if config.cycle_policy.limit().is_none() =>
            {
                config.cycle_policy = CyclePolicy::EventLimit {
                    max_events: CYCLE_FALLBACK_LIMIT,
                };
            }
            _ => {}
        }
        config
    }

    /// X (DrivenHigh) drives Y (Floating). One step from X leaves Y
    /// DrivenHigh and reports only Y as changed.
    fn run_buffer(&self, bench: &mut Bench) -> Result<(), SimError> {
        let x = bench.add("x", Some(&lanes(WireState::DrivenHigh)))?;
        let y = bench.add("y", Some(&lanes(WireState::Floating)))?;
        bench.connect(x, y)?;
        bench.restore();
        bench.check()?;

        let report = bench.step(&x)?;

        bench.expect_uniform(&y, WireState::DrivenHigh, "y after step")?;
        bench.expect_uniform(&x, WireState::DrivenHigh, "x after step")?;
        ensure(report.changed == vec![y], || {
            format!("expected only y to change, got {:?}", report.changed)
        })?;
        ensure(report.events == 2, || {
            format!("expected 2 events, got {}", report.events)
        })
    }

    /// X (DrivenHigh) and Z (DrivenLow) both drive Y. Once both have
    /// stepped, Y holds Conflict and X stepping again does not clear it.
    fn run_bus_conflict(&self, bench: &mut Bench) -> Result<(), SimError> {
        let x = bench.add("x", Some(&lanes(WireState::DrivenHigh)))?;
        let y = bench.add("y", Some(&lanes(WireState::Floating)))?;
        let z = bench.add("z", Some(&lanes(WireState::DrivenLow)))?;
        bench.connect(x, y)?;
        bench.connect(z, y)?;
        bench.restore();
        bench.check()?;

        bench.step(&x)?;
        bench.expect_uniform(&y, WireState::DrivenHigh, "y after x")?;

        bench.step(&z)?;
        bench.expect_uniform(&y, WireState::Conflict, "y after z")?;

        let report = bench.step(&x)?;
        bench.expect_uniform(&y, WireState::Conflict, "y after x again")?;
        ensure(report.changed.is_empty(), || {
            format!("conflict should be stable, changed {:?}", report.changed)
        })
    }

    /// A drives B and C; C drives A. Removing B leaves [A, C] in order
    /// with both edges between them intact.
    fn run_removal(&self, bench: &mut Bench) -> Result<(), SimError> {
        let a = bench.add("a", Some(&lanes(WireState::DrivenLow)))?;
        let b = bench.add("b", Some(&lanes(WireState::Floating)))?;
        let c = bench.add("c", Some(&lanes(WireState::Floating)))?;
        bench.connect(a, b)?;
        bench.connect(a, c)?;
        bench.connect(c, a)?;
        bench.restore();

        bench.remove(&b)?;
        bench.check()?;

        let nets = bench.engine.get_nets();
        ensure(nets == vec![a, c], || format!("expected [a, c], got {:?}", nets))?;
        let fanout = bench.engine.fanout_of(&a)?;
        ensure(fanout == vec![c], || format!("a should drive only c, got {:?}", fanout))?;
        let fanout = bench.engine.fanout_of(&c)?;
        ensure(fanout == vec![a], || format!("c should drive only a, got {:?}", fanout))?;

        bench.step(&a)?;
        bench.expect_uniform(&c, WireState::DrivenLow, "c after a")?;

        match bench.engine.step_from(&b) {
            Err(LogicError::UnknownNet(id)) if id == b => Ok(()),
            other => Err(SimError::check(format!(
                "stepping a removed net should fail, got {:?}",
                other
            ))),
        }
    }

    /// A random tree rooted at a driven net. One step reaches every net
    /// exactly once and leaves it holding the root's value.
    fn run_fanout_tree(&self, bench: &mut Bench) -> Result<(), SimError> {
        let mut gen = CircuitGen::new(self.config.derived_seed(1));
        let tree = gen.random_tree(
            bench.host(),
            self.config.num_nets.max(2),
            self.config.fanout_degree,
        )?;

        for id in &tree.nets {
            let corrected = bench.engine.add_net(*id, Some(&lanes(WireState::Floating)))?;
            bench.metrics.corrected_lanes += corrected.len() as u64;
        }
        let value = gen.random_value();
        bench.engine.set_value(&tree.root, value)?;
        bench.restore();
        bench.check()?;

        let report = bench.step(&tree.root)?;
        ensure(report.events == tree.nets.len(), || {
            format!("expected {} events, got {}", tree.nets.len(), report.events)
        })?;

        let expected = wire::from_value_bits(value);
        for leaf in &tree.leaves {
            let state = bench.engine.get_state(leaf)?;
            ensure(state == expected, || {
                format!(
                    "leaf {} holds {}, root drove {}",
                    leaf,
                    wire::format_lanes(&state),
                    wire::format_lanes(&expected)
                )
            })?;
        }
        debug!(nets = tree.nets.len(), leaves = tree.leaves.len(), value, "Tree settled");
        Ok(())
    }

    /// Each built-in gate over inputs A = 1100 and B = 1010 in lanes 0-3,
    /// low elsewhere. A floating input then turns AND's undecided lanes
    /// Unknown.
    fn run_gates(&self, bench: &mut Bench) -> Result<(), SimError> {
        const A: u32 = 0b1100;
        const B: u32 = 0b1010;

        let cases = [
            ("and", SolverId::AND, A & B),
            ("or", SolverId::OR, A | B),
            ("xor", SolverId::XOR, A ^ B),
            ("not", SolverId::NOT, !A),
        ];

        for (name, solver, expected) in cases {
            let a = bench.add(&format!("{}/a", name), None)?;
            let b = bench.add(&format!("{}/b", name), None)?;
            let out = bench.add_with_solver(&format!("{}/out", name), solver, None)?;
            bench.engine.set_value(&a, A)?;
            bench.engine.set_value(&b, B)?;
            bench.connect(a, out)?;
            if solver != SolverId::NOT {
                bench.connect(b, out)?;
            }
            bench.restore();

            bench.step(&a)?;
            bench.expect_mask(&out, WireState::DrivenHigh, expected, name)?;
            bench.expect_mask(&out, WireState::DrivenLow, !expected, name)?;

            if solver == SolverId::AND {
                bench.set_state(&b, &lanes(WireState::Floating))?;
                bench.step(&b)?;
                bench.expect_mask(&out, WireState::Unknown, A, "and with floating input")?;
                bench.expect_mask(&out, WireState::DrivenLow, !A, "and with floating input")?;
            }
        }
        bench.check()
    }

    /// P and Q drive each other. The step must stop at the event limit
    /// with Q in Conflict; breaking the loop makes stepping succeed again.
    fn run_feedback_loop(&self, bench: &mut Bench) -> Result<(), SimError> {
        let p = bench.add("p", Some(&lanes(WireState::DrivenHigh)))?;
        let q = bench.add("q", Some(&lanes(WireState::DrivenLow)))?;
        bench.connect(p, q)?;
        bench.connect(q, p)?;
        bench.restore();

        match bench.step(&p) {
            Err(LogicError::PropagationLimit { start, limit }) if start == p => {
                debug!(limit, "Feedback loop stopped at event limit");
            }
            other => {
                return Err(SimError::check(format!(
                    "expected the event limit, got {:?}",
                    other
                )))
            }
        }
        bench.expect_uniform(&q, WireState::Conflict, "q after loop")?;

        bench.host().disconnect(q, p)?;
        bench.restore();
        bench.check()?;

        let report = bench.step(&p)?;
        ensure(report.events == 2, || {
            format!("open loop should settle in 2 events, got {}", report.events)
        })
    }

    /// Random edits to host and engine, checking consistency after each.
    /// Cycles are possible, so steps may end at the event limit.
    fn run_churn(&self, bench: &mut Bench) -> Result<(), SimError> {
        let mut gen = CircuitGen::new(self.config.derived_seed(2));
        let capacity = self.config.num_nets.max(2);
        let invalid_ratio = if self.config.engine.strict_lanes { 0.0 } else { 0.05 };
        let mut live: Vec<NetId> = Vec::new();
        let mut created = 0usize;

        for op in 0..self.config.steps {
            let choice = if live.len() < 2 {
                0
            } else {
                gen.rng().gen_range(0..7)
            };

            match choice {
                0 if live.len() < capacity => {
                    let solver = gen.rng().gen_range(0..bench.engine.solver_count()) as u16;
                    let initial = gen.random_lanes(invalid_ratio);
                    let id = bench.add_with_solver(
                        &format!("churn/{}", created),
                        SolverId(solver),
                        Some(&initial),
                    )?;
                    created += 1;
                    live.push(id);
                    bench.restore();
                }
                0 | 1 => {
                    let Some(victim) = gen.pick(&live) else { continue };
                    bench.remove(&victim)?;
                    if gen.rng().gen_bool(0.5) {
                        bench.host().remove(&victim)?;
                    }
                    live.retain(|id| *id != victim);
                }
                2 | 3 => {
                    let (Some(from), Some(to)) = (gen.pick(&live), gen.pick(&live)) else {
                        continue;
                    };
                    if choice == 2 {
                        bench.host().connect(from, to)?;
                    } else {
                        bench.host().disconnect(from, to)?;
                    }
                    bench.restore();
                }
                4 => {
                    let Some(id) = gen.pick(&live) else { continue };
                    let raw = gen.random_lanes(invalid_ratio);
                    bench.set_state(&id, &raw)?;
                }
                5 => {
                    let Some(id) = gen.pick(&live) else { continue };
                    match bench.step(&id) {
                        Ok(_) | Err(LogicError::PropagationLimit { .. }) => {}
                        Err(err) => return Err(err.into()),
                    }
                }
                _ => {
                    let Some(id) = gen.pick(&live) else { continue };
                    let ready = gen.rng().gen_bool(0.8);
                    bench.host().set_ready(id, ready)?;
                    bench.restore();
                }
            }

            if let Err(err) = bench.check() {
                warn!(op, "Consistency check failed");
                return Err(err);
            }
            ensure(bench.engine.get_nets() == live, || {
                format!("after op {}: engine nets diverged from the live set", op)
            })?;
        }

        let snapshot = bench.engine.snapshot();
        let restored = EngineSnapshot::from_json(&snapshot.to_json()?)?;
        bench.engine.apply_snapshot(&restored)?;
        ensure(bench.engine.snapshot() == snapshot, || {
            "snapshot did not survive a JSON round trip".to_string()
        })?;

        info!(
            ops = self.config.steps,
            nets = live.len(),
            created,
            "Churn complete"
        );
        Ok(())
    }
}
