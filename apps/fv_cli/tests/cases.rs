// apps/fv_cli/tests/cases.rs

//! 内置算例端到端测试

use fv_cli::run_case;
use fv_config::{CaseConfig, CaseKind};

#[test]
fn diffusion_demo_matches_linear_profile() {
    let report = run_case(&CaseConfig::demo(CaseKind::Diffusion1d)).unwrap();
    assert!(report.all_converged());
    assert!(report.summary["max_error"] < 1e-6);
    assert!((report.summary["T_mean"] - 50.0).abs() < 1e-6);
    assert_eq!(report.fields["T"].len(), report.n_cells);
}

#[test]
fn decomposed_diffusion_matches_serial() {
    let serial = run_case(&CaseConfig::demo(CaseKind::Diffusion1d)).unwrap();
    let mut case = CaseConfig::demo(CaseKind::Diffusion1d);
    case.n_ranks = 2;
    let parallel = run_case(&case).unwrap();

    for (a, b) in serial.fields["T"].iter().zip(&parallel.fields["T"]) {
        assert!((a - b).abs() < 1e-6, "{} vs {}", a, b);
    }
    assert!(parallel.summary["max_error"] < 1e-6);
}

#[test]
fn decomposed_poisson_matches_serial() {
    let serial = run_case(&CaseConfig::demo(CaseKind::PoissonNeumann)).unwrap();
    let mut case = CaseConfig::demo(CaseKind::PoissonNeumann);
    case.n_ranks = 2;
    let parallel = run_case(&case).unwrap();

    let range = serial.summary["p_max"] - serial.summary["p_min"];
    assert!(range > 0.0);
    let max_diff = serial.fields["p"]
        .iter()
        .zip(&parallel.fields["p"])
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max);
    assert!(max_diff < 1e-4 * range, "max_diff = {}", max_diff);
}

#[test]
fn convection_demo_stays_bounded() {
    let report = run_case(&CaseConfig::demo(CaseKind::Convection2d)).unwrap();
    assert_eq!(report.steps, 20);
    assert!(report.summary["courant_max"] < 1.0);
    assert!(report.summary["overshoot"] < 2e-2);
}

#[test]
fn short_cavity_run_is_divergence_free() {
    let mut case = CaseConfig::demo(CaseKind::Cavity);
    case.time.end_time = 4.0 * case.time.delta_t;
    let report = run_case(&case).unwrap();

    assert_eq!(report.steps, 4);
    assert!(report.summary["U_max"].is_finite());
    assert!(report.summary["U_max"] <= 1.1 * case.physics.lid_velocity);
    assert!(report.summary["continuity_error"] < 1e-3);
    assert!(report.fields["p"].iter().all(|p| p.is_finite()));
}
