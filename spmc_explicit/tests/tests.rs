use spmc_core::*;
use spmc_explicit::{ExplicitFiles, load};
use std::path::Path;

fn check(model: &Model, property: &str) -> f64 {
    let property = parse_properties(property).unwrap().pop().unwrap();
    let result = model_checking(model, &property, &CheckOptions::default()).unwrap();
    match result.initial_values().as_slice() {
        [Value::Number(value)] => *value,
        values => panic!("unexpected values {values:?}"),
    }
}

#[test]
fn grid_world() {
    let model = load(
        Path::new("./tests/grid_world.tra"),
        Path::new("./tests/grid_world.lab"),
    )
    .unwrap();
    assert_eq!(model.model_type(), ModelType::Mdp);
    assert_eq!(model.states(), 101);
    assert_eq!(model.choices(), 404);
    assert_eq!(model.transitions().entries(), 1540);
    assert_eq!(model.initial_states(), &[0]);
    assert_eq!(
        model.labeling().labels().collect::<Vec<_>>(),
        vec!["bad", "good", "init"]
    );
    assert_eq!(model.choice_label(0, 0), Some("up"));
    assert_eq!(model.choice_label(0, 3), Some("right"));
    assert!(model.is_absorbing(100));
    assert_eq!(model.reward_models().count(), 0);
}

#[test]
fn die() {
    let model = ExplicitFiles::new("./tests/die.tra", "./tests/die.lab")
        .state_rewards("./tests/die.rew")
        .load()
        .unwrap();
    assert_eq!(model.model_type(), ModelType::Dtmc);
    assert_eq!(model.states(), 13);
    assert!(model.reward_model("die").is_some());
    for face in ["one", "two", "three", "four", "five", "six"] {
        let probability = check(&model, &format!("P=? [F \"{face}\"]"));
        assert!((probability - 1.0 / 6.0).abs() < 1e-6, "{face}: {probability}");
    }
    let flips = check(&model, "R=? [F \"done\"]");
    assert!((flips - 11.0 / 3.0).abs() < 1e-4, "{flips}");
    let flips = check(&model, "R{\"die\"}=? [F \"done\"]");
    assert!((flips - 11.0 / 3.0).abs() < 1e-4, "{flips}");
    assert_eq!(check(&model, "P=? [F<=3 \"done\"]"), 0.75);
}

#[test]
fn deadlocks() {
    // State 2 has no outgoing transitions.
    let files = ExplicitFiles::new("./tests/deadlock.tra", "./tests/deadlock.lab");
    let err = files.load().unwrap_err();
    assert!(format!("{err:#}").contains("deadlock"), "{err:#}");

    let model = files.fix_deadlocks(true).load().unwrap();
    assert_eq!(model.states(), 3);
    assert!(model.is_absorbing(2));
    assert_eq!(
        model.labeling().states_with(DEADLOCK_LABEL),
        Some([false, false, true].as_slice())
    );
    assert_eq!(check(&model, "P=? [F \"deadlock\"]"), 0.5);
}

#[test]
fn missing_files() {
    let err = load(Path::new("./tests/missing.tra"), Path::new("./tests/die.lab")).unwrap_err();
    assert!(err.to_string().contains("missing.tra"));
    // A label file is not a transition file.
    let err = load(Path::new("./tests/die.lab"), Path::new("./tests/die.lab")).unwrap_err();
    assert!(err.to_string().contains("failed to parse transition file"));
}
