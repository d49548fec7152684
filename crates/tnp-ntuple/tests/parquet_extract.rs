use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use approx::assert_relative_eq;
use tnp_ntuple::{
    Binning, CmpOp, Cut, ExtractRequest, FlowPolicy, ParquetSource, Weight, extract_histogram,
    write_tree_parquet,
};

fn tmp_file(name: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    std::env::temp_dir().join(format!("tnp_ntuple_it_{}_{}_{}", std::process::id(), nanos, name))
}

#[test]
fn weighted_selection_from_parquet_file() {
    let path = tmp_file("probes.parquet");
    let mass = [5.0, 15.0, 15.0, 25.0, 35.0, -1.0];
    let pt = [50.0, 50.0, 150.0, 50.0, 50.0, 50.0];
    let score = [0.9, 0.7, 0.9, 0.2, 0.8, 0.9];
    let gen_weight = [1.0, 2.0, 1.0, 1.0, 3.0, 1.0];
    write_tree_parquet(
        &path,
        "Events",
        &[("mass", &mass[..]), ("pt", &pt[..]), ("score", &score[..]), ("genWeight", &gen_weight[..])],
    )
    .unwrap();

    let selection = Cut::all([
        Cut::Range { var: "pt".into(), lo: 0.0, hi: 100.0 },
        Cut::Threshold { var: "score".into(), op: CmpOp::Ge, value: 0.5 },
    ]);
    let weight = Weight::constant(2.0).times("genWeight");
    let binning = Binning::new(3, 0.0, 30.0).unwrap();
    let h = extract_histogram(
        &ParquetSource::new(),
        &ExtractRequest {
            path: &path,
            tree: "Events",
            variable: "mass",
            selection: &selection,
            weight: &weight,
            name: "probe_pass".into(),
            binning,
            flow_policy: FlowPolicy::Drop,
        },
    )
    .unwrap();

    assert_eq!(h.name, "probe_pass");
    assert_eq!(h.content, vec![2.0, 4.0, 0.0]);
    assert_eq!(h.sumw2, vec![4.0, 16.0, 0.0]);
    // mass = 35 (w = 6) and mass = -1 (w = 2) fall outside the axis
    assert_relative_eq!(h.overflow, 6.0);
    assert_relative_eq!(h.underflow, 2.0);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn missing_branch_names_the_branch() {
    let path = tmp_file("short.parquet");
    write_tree_parquet(&path, "Events", &[("mass", &[1.0, 2.0][..])]).unwrap();
    let err = extract_histogram(
        &ParquetSource::new(),
        &ExtractRequest {
            path: &path,
            tree: "Events",
            variable: "mass",
            selection: &Cut::expr("pt > 10"),
            weight: &Weight::unit(),
            name: "h".into(),
            binning: Binning::new(2, 0.0, 2.0).unwrap(),
            flow_policy: FlowPolicy::Drop,
        },
    )
    .unwrap_err();
    assert!(err.to_string().contains("'pt'"), "{err}");

    let _ = std::fs::remove_file(&path);
}
