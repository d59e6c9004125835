//! Fits a small network to a sampled sine wave.
//!
//! ```text
//! ferrite-train [STRATEGY.json]
//! ```
//!
//! The optional argument is a training strategy file, e.g.
//! `{"algorithm": "ConjugateGradient", "training_direction_method": "FletcherReeves"}`.
//! Without it the network is trained with Levenberg-Marquardt.

use std::{env, error::Error, io::stderr};

use ferrite_train::network::LayerSpec;
use ferrite_train::{
    ActivationFunction, DataSet, NetworkSpec, PerformanceTermType, ScalingSpec, TrainingAlgorithm, TrainingStrategy,
};
use tracing::{info, instrument, Level};
use tracing_subscriber::fmt::{format::FmtSpan, layer};
use tracing_subscriber::{filter::Targets, prelude::*, registry, util::SubscriberInitExt};

const INSTANCES: usize = 40;

fn sine_data_set() -> Result<DataSet, Box<dyn Error>> {
    let inputs: Vec<Vec<f64>> = (0..INSTANCES)
        .map(|i| vec![2.0 * std::f64::consts::PI * i as f64 / (INSTANCES - 1) as f64])
        .collect();
    let targets: Vec<Vec<f64>> = inputs.iter().map(|x| vec![x[0].sin()]).collect();
    let mut data_set = DataSet::from_inputs_targets(&inputs, &targets)?;
    data_set.split_instances_random(0.75, 0.25, 0.0, &mut rand::thread_rng())?;
    Ok(data_set)
}

fn sine_network(data_set: &DataSet) -> NetworkSpec {
    NetworkSpec {
        name: "sine".into(),
        inputs_number: 1,
        layers: vec![
            LayerSpec { neurons: 6, activation: ActivationFunction::HyperbolicTangent },
            LayerSpec { neurons: 1, activation: ActivationFunction::Linear },
        ],
        scaling: Some(ScalingSpec::MinimumMaximum { statistics: data_set.calculate_inputs_statistics() }),
        unscaling: None,
        probabilistic: None,
        bounds: None,
        input_names: vec!["x".into()],
        output_names: vec!["sin(x)".into()],
        performance_term: PerformanceTermType::NormalizedSquaredError,
    }
}

#[instrument(err)]
fn main() -> Result<(), Box<dyn Error>> {
    let filter = Targets::new()
        .with_target("ferrite_train", Level::INFO)
        .with_default(Level::WARN);
    let writer = layer().with_span_events(FmtSpan::CLOSE).with_writer(stderr);
    registry().with(filter).with(writer).init();

    let strategy = match env::args().nth(1) {
        Some(path) => TrainingStrategy::load_json(&path)?,
        None => TrainingStrategy::default(),
    };

    let data_set = sine_data_set()?;
    let spec = sine_network(&data_set);
    let mut network = spec.build()?;
    let results = strategy.perform_training(&mut network, &data_set, spec.performance_term.term())?;

    info!(
        algorithm = strategy.algorithm().name(),
        iterations = results.iterations_number,
        performance = results.final_performance,
        generalization_performance = results.final_generalization_performance,
        "finished"
    );
    for x in [0.5, 1.5, 3.0, 4.5] {
        let output = network.calculate_outputs(&[x])?;
        println!("sin({x:.2}) = {:+.4}  network: {:+.4}", x.sin(), output[0]);
    }
    Ok(())
}
