use pmsys::prelude::*;
use russell_lab::{approx_eq, Matrix, Vector};

// PROBLEM
//
// A chain of 4 points connected by 3 nonlinear springs with force
//
// f = k (ε + β ε³)    where ε = u[e+1] - u[e]
//
// The first point is fixed. The chain is either loaded at the last point with
// F(t) = k (t + β t³) or the last point is displaced by u(t) = 3 t.
//
// SOLUTION
//
// In both cases, every spring has the elongation ε = t; thus u[i] = i t
//
// PROPERTIES
//
// * the Newton-Raphson iterations converge within each step of the time loop
// * the stresses are committed at the end of each accepted step

const K: f64 = 3.0;
const BETA: f64 = 0.5;

struct SpringChain {
    loaded: bool,
}

impl DeformationEquations for SpringChain {
    fn residual(
        &mut self,
        rr: &mut Vector,
        uu: &Vector,
        secondary: &SecondaryValues,
        t: f64,
        _context: &SimContext,
    ) -> Result<(), StrError> {
        let n = uu.dim();
        rr.fill(0.0);
        for e in 0..(n - 1) {
            rr[e] -= secondary.stress[e];
            rr[e + 1] += secondary.stress[e];
        }
        if self.loaded {
            rr[n - 1] -= K * (t + BETA * t * t * t);
        }
        Ok(())
    }

    fn tangent(
        &mut self,
        kk: &mut BlockMatrix,
        uu: &Vector,
        _secondary: &SecondaryValues,
        _context: &SimContext,
    ) -> Result<(), StrError> {
        for e in 0..(uu.dim() - 1) {
            let eps = uu[e + 1] - uu[e];
            let d = K * (1.0 + 3.0 * BETA * eps * eps);
            kk.assemble(&[e, e + 1], &Matrix::from(&[[d, -d], [-d, d]]))?;
        }
        Ok(())
    }

    fn update_secondary(
        &mut self,
        trial: &mut SecondaryValues,
        committed: &SecondaryValues,
        uu: &Vector,
        _duu: &Vector,
    ) -> Result<(), StrError> {
        for e in 0..(uu.dim() - 1) {
            let eps = uu[e + 1] - uu[e];
            trial.stress[e] = K * (eps + BETA * eps * eps * eps);
            trial.internal_values[e] = f64::max(committed.internal_values[e], eps);
        }
        Ok(())
    }
}

fn chain_topology() -> Result<SparseTopology, StrError> {
    let mut conn = Connectivity::new(4)?;
    conn.connect_all(&[0, 1])?.connect_all(&[1, 2])?.connect_all(&[2, 3])?;
    SparseTopology::new(&conn, Storage::Crs, true)
}

fn run(loaded: bool, essential: &Essential) -> Result<(), SimError> {
    let mut config = Config::new();
    config.dt = |_| 0.25;
    config.lin_sol = LinSolParams::new();
    let topology = chain_topology()?;
    let mut param = ParamNonlinear::new();
    param.tolerances = vec![1e-12];
    let equations = SpringChain { loaded };
    let secondary = SecondaryValues::new(3, 3);
    let process = DeformationProcess::new("u", &topology, 1, &config, param, essential, equations, secondary)?;
    let mut sim = Simulation::new(&config)?;
    sim.add_process(Box::new(process))?;
    let mut n_steps = 0;
    while !sim.finished() {
        let report = sim.step()?;
        n_steps += 1;
        assert_eq!(report.n_rejections, 0);
        assert!(report.n_iterations >= 1 && report.n_iterations < 15);
        let uu = sim.context().field("u")?;
        for i in 0..4 {
            approx_eq(uu[i], (i as f64) * report.t, 1e-10);
        }
    }
    assert_eq!(n_steps, 4);
    approx_eq(sim.t(), 1.0, 1e-15);
    let state = sim.process("u").unwrap().state();
    assert_eq!(state.steps_accepted, 4);
    assert_eq!(state.stage, ControllerStage::StepAccepted);
    Ok(())
}

#[test]
fn test_deformation_spring_chain_loaded() -> Result<(), SimError> {
    let mut essential = Essential::new();
    essential.at(&[0], |_| 0.0);
    run(true, &essential)
}

#[test]
fn test_deformation_spring_chain_displaced() -> Result<(), SimError> {
    let mut essential = Essential::new();
    essential.at(&[0], |_| 0.0).at(&[3], |t| 3.0 * t);
    run(false, &essential)
}
