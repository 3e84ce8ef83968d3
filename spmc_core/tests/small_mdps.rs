use spmc_core::*;

// Builds an MDP from the rows of each state, with the given labels.
fn mdp(states: &[&[&[(usize, f64)]]], labels: &[(&str, &[usize])]) -> Model {
    let mut builder = SparseMatrixBuilder::new();
    for rows in states {
        builder.new_group();
        for row in *rows {
            builder.new_row().unwrap();
            for &(column, value) in *row {
                builder.add_entry(column, value).unwrap();
            }
        }
    }
    let mut labeling = Labeling::new(states.len());
    for (label, states) in labels {
        labeling.add_label(label).unwrap();
        for &state in *states {
            labeling.add_label_to_state(label, state).unwrap();
        }
    }
    Model::new(ModelType::Mdp, builder.build().unwrap(), labeling).unwrap()
}

// 0 init: a -> goal 0.5 / sink 0.5, b -> 1
// 1: -> goal
// 2 goal, 3 sink: absorbing
fn detour() -> Model {
    mdp(
        &[
            &[&[(2, 0.5), (3, 0.5)], &[(1, 1.0)]],
            &[&[(2, 1.0)]],
            &[&[(2, 1.0)]],
            &[&[(3, 1.0)]],
        ],
        &[("init", &[0]), ("goal", &[2]), ("sink", &[3])],
    )
    .with_reward_model("time", RewardModel::with_state_rewards(vec![1.0, 1.0, 0.0, 0.0]))
    .unwrap()
}

fn check(model: &Model, property: &str, extract_scheduler: bool) -> CheckResult {
    let property = parse_properties(property).unwrap().pop().unwrap();
    let options = CheckOptions {
        extract_scheduler,
        ..Default::default()
    };
    model_checking(model, &property, &options).unwrap()
}

fn number(result: &CheckResult) -> f64 {
    match result.initial_values().as_slice() {
        [Value::Number(number)] => *number,
        values => panic!("unexpected values {values:?}"),
    }
}

#[test]
fn reachability() {
    let model = detour();
    assert_eq!(number(&check(&model, "Pmax=? [F \"goal\"]", false)), 1.0);
    assert_eq!(number(&check(&model, "Pmin=? [F \"goal\"]", false)), 0.5);
    assert_eq!(number(&check(&model, "Pmax=? [!\"sink\" U \"goal\"]", false)), 1.0);
    let result = check(&model, "Pmax=? [F \"goal\"]", true);
    assert_eq!(result.scheduler(), Some(&Scheduler::Memoryless(vec![1, 0, 0, 0])));
}

#[test]
fn bounded_reachability() {
    let model = detour();
    assert_eq!(number(&check(&model, "Pmax=? [F<=1 \"goal\"]", false)), 0.5);
    let result = check(&model, "Pmax=? [F<=2 \"goal\"]", true);
    assert_eq!(number(&result), 1.0);
    let scheduler = result.scheduler().unwrap();
    assert!(!scheduler.is_memoryless());
    assert_eq!(scheduler.choice(0, 0), 1);
    // With one step left, only the risky choice reaches the goal.
    let result = check(&model, "Pmax=? [true U<2 \"goal\"]", true);
    assert_eq!(result.scheduler().unwrap().choice(0, 0), 0);
}

#[test]
fn next() {
    let model = detour();
    assert_eq!(number(&check(&model, "Pmax=? [X \"goal\"]", false)), 0.5);
    let result = check(&model, "Pmin=? [X \"goal\"]", true);
    assert_eq!(number(&result), 0.0);
    assert_eq!(result.scheduler().unwrap().choice(0, 0), 1);
}

#[test]
fn globally() {
    let model = detour();
    let result = check(&model, "Pmax=? [G !\"sink\"]", true);
    assert_eq!(number(&result), 1.0);
    assert_eq!(result.scheduler().unwrap().choice(0, 0), 1);
    assert_eq!(number(&check(&model, "Pmin=? [G !\"sink\"]", false)), 0.5);
    assert_eq!(number(&check(&model, "Pmin=? [G<=1 !\"sink\"]", false)), 0.5);
}

#[test]
fn bounds_and_nesting() {
    let model = detour();
    let result = check(&model, "Pmax>=0.9 [F \"goal\"]", false);
    assert_eq!(result.initial_values(), vec![Value::Truth(true)]);
    // Without direction, a lower bound must hold for the minimum.
    let result = check(&model, "P>=0.9 [F \"goal\"]", false);
    assert_eq!(result.initial_values(), vec![Value::Truth(false)]);
    let result = check(&model, "Pmax=? [F Pmax>=1 [X \"goal\"]]", false);
    assert_eq!(number(&result), 1.0);
    let result = check(&model, "!\"sink\" & Pmin<=0.5 [F \"goal\"]", false);
    assert_eq!(result.initial_values(), vec![Value::Truth(true)]);
}

#[test]
fn reachability_rewards() {
    let model = detour();
    let result = check(&model, "Rmin=? [F \"goal\"]", true);
    assert_eq!(number(&result), 2.0);
    assert_eq!(result.scheduler().unwrap().choice(0, 0), 1);
    // The risky choice may never reach the goal.
    assert_eq!(number(&check(&model, "R{\"time\"}max=? [F \"goal\"]", false)), f64::INFINITY);
}

#[test]
fn infinite_reward_scheduler() {
    // 0 init: a reaches the goal for 1, b loops
    let model = mdp(
        &[&[&[(1, 1.0)], &[(0, 1.0)]], &[&[(1, 1.0)]]],
        &[("init", &[0]), ("goal", &[1])],
    )
    .with_reward_model("time", RewardModel::with_state_rewards(vec![1.0, 0.0]))
    .unwrap();
    let result = check(&model, "Rmax=? [F \"goal\"]", true);
    assert_eq!(number(&result), f64::INFINITY);
    assert_eq!(result.scheduler().unwrap().choice(0, 0), 1);

    // 0 init: a -> 1 -> goal, b -> goal 0.5 / sink 0.5
    let model = mdp(
        &[
            &[&[(1, 1.0)], &[(2, 0.5), (3, 0.5)]],
            &[&[(2, 1.0)]],
            &[&[(2, 1.0)]],
            &[&[(3, 1.0)]],
        ],
        &[("init", &[0]), ("goal", &[2]), ("sink", &[3])],
    )
    .with_reward_model("time", RewardModel::with_state_rewards(vec![1.0, 1.0, 0.0, 0.0]))
    .unwrap();
    let result = check(&model, "Rmax=? [F \"goal\"]", true);
    assert_eq!(number(&result), f64::INFINITY);
    // Only the risky choice can miss the goal.
    assert_eq!(result.scheduler().unwrap().choice(0, 0), 1);
    assert_eq!(number(&check(&model, "Rmin=? [F \"goal\"]", false)), 2.0);
}

#[test]
fn cumulative_rewards() {
    let model = detour();
    let result = check(&model, "Rmax=? [C<=2]", true);
    assert_eq!(number(&result), 2.0);
    assert_eq!(result.scheduler().unwrap().choice(0, 0), 1);
    assert_eq!(number(&check(&model, "Rmin=? [C<=2]", false)), 1.0);
    assert_eq!(number(&check(&model, "Rmin=? [C<=0]", false)), 0.0);
}

#[test]
fn zero_reward_end_component() {
    // 0 init: a loops for free, b reaches the goal for 5
    let model = mdp(
        &[&[&[(0, 1.0)], &[(1, 1.0)]], &[&[(1, 1.0)]]],
        &[("init", &[0]), ("goal", &[1])],
    )
    .with_reward_model(
        "cost",
        RewardModel {
            state_rewards: None,
            choice_rewards: Some(vec![0.0, 5.0, 0.0]),
        },
    )
    .unwrap();
    let result = check(&model, "Rmin=? [F \"goal\"]", true);
    assert_eq!(number(&result), 5.0);
    assert_eq!(result.scheduler().unwrap().choice(0, 0), 1);
    assert_eq!(number(&check(&model, "Rmax=? [F \"goal\"]", false)), f64::INFINITY);
    // Reaching the goal surely needs leaving the loop.
    let result = check(&model, "Pmax=? [F \"goal\"]", true);
    assert_eq!(result.scheduler().unwrap().choice(0, 0), 1);
}

#[test]
fn value_iteration() {
    // 0 init: a -> 0 (0.5) / goal (0.25) / sink (0.25), b -> goal (0.4) / sink (0.6)
    let model = mdp(
        &[
            &[&[(0, 0.5), (1, 0.25), (2, 0.25)], &[(1, 0.4), (2, 0.6)]],
            &[&[(1, 1.0)]],
            &[&[(2, 1.0)]],
        ],
        &[("init", &[0]), ("goal", &[1])],
    );
    let result = check(&model, "Pmax=? [F \"goal\"]", true);
    assert!((number(&result) - 0.5).abs() < 1e-5);
    assert_eq!(result.scheduler().unwrap().choice(0, 0), 0);
    let result = check(&model, "Pmin=? [F \"goal\"]", true);
    assert!((number(&result) - 0.4).abs() < 1e-5);
    assert_eq!(result.scheduler().unwrap().choice(0, 0), 1);
}

#[test]
fn reward_model_selection() {
    let model = detour()
        .with_reward_model("other", RewardModel::with_state_rewards(vec![0.0; 4]))
        .unwrap();
    let property = parse_properties("Rmin=? [F \"goal\"]").unwrap().pop().unwrap();
    assert_eq!(
        model_checking(&model, &property, &CheckOptions::default()),
        Err(CheckError::AmbiguousRewardModel)
    );
    let property = parse_properties("R{\"cost\"}min=? [F \"goal\"]").unwrap().pop().unwrap();
    assert_eq!(
        model_checking(&model, &property, &CheckOptions::default()),
        Err(CheckError::UnknownRewardModel("cost".to_owned()))
    );
    assert_eq!(number(&check(&model, "R{\"other\"}min=? [F \"goal\"]", false)), 0.0);
}
