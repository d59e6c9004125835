use ferrite_train::layers::{
    BoundingLayer, ConditionsLayer, ProbabilisticLayer, ProbabilisticMethod, ScalingLayer, ScalingMethod,
    UnscalingLayer, UnscalingMethod,
};
use ferrite_train::math::vector;
use ferrite_train::{
    DataSet, MeanSquaredError, NetworkLayer, NeuralNetwork, NormalizedSquaredError, NumericalDifferentiation,
    PerformanceTerm, PerformanceTermType, RootMeanSquaredError, Statistics, SumSquaredError,
};
use proptest::collection::vec;
use proptest::prelude::ProptestConfig;
use rand::{rngs::StdRng, Rng, SeedableRng};
use test_strategy::{proptest, Arbitrary};

const INSTANCES: usize = 5;

/// Optional layers around the perceptron stack.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Arbitrary)]
struct Chain {
    scaled: bool,
    conditioned: bool,
    softmax: bool,
    bounded: bool,
}

impl Chain {
    fn scaled(scaled: bool) -> Self {
        Chain { scaled, ..Chain::default() }
    }
}

/// Even outputs get bounds the network never reaches, odd outputs get bounds
/// above every output, so no sample sits on a kink.
fn bounds(outputs_number: usize) -> (Vec<f64>, Vec<f64>) {
    (0..outputs_number).map(|k| if k % 2 == 0 { (-100.0, 100.0) } else { (50.0, 60.0) }).unzip()
}

/// A randomly initialized network over `architecture` wrapped in the layers
/// `chain` selects, with random training data.
fn problem(architecture: &[usize], chain: Chain, seed: u64) -> (NeuralNetwork, DataSet) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut network = NeuralNetwork::new(architecture).unwrap();
    let inputs_number = architecture[0];
    let outputs_number = architecture[architecture.len() - 1];

    if chain.scaled {
        let statistics = vec![Statistics::new(-2.0, 2.0, 0.1, 1.3); inputs_number];
        network
            .insert_layer(NetworkLayer::Scaling(ScalingLayer::from_statistics(
                statistics,
                ScalingMethod::MeanStandardDeviation,
            )))
            .unwrap();
        let statistics = vec![Statistics::new(-3.0, 1.0, -1.0, 0.5); outputs_number];
        network
            .insert_layer(NetworkLayer::Unscaling(UnscalingLayer::from_statistics(
                statistics,
                UnscalingMethod::MinimumMaximum,
            )))
            .unwrap();
    }
    if chain.conditioned {
        let y_a: Vec<f64> = (0..outputs_number).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let y_b: Vec<f64> = (0..outputs_number).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let conditions = ConditionsLayer::two_conditions(inputs_number, 0, (-0.5, y_a), (0.5, y_b)).unwrap();
        network.insert_layer(NetworkLayer::Conditions(conditions)).unwrap();
    }
    if chain.softmax {
        network
            .insert_layer(NetworkLayer::Probabilistic(ProbabilisticLayer::new(
                outputs_number,
                ProbabilisticMethod::Softmax,
            )))
            .unwrap();
    }
    if chain.bounded {
        let (lower, upper) = bounds(outputs_number);
        network
            .insert_layer(NetworkLayer::Bounding(BoundingLayer::from_bounds(lower, upper).unwrap()))
            .unwrap();
    }
    network.initialize_random_uniform_with(-1.0, 1.0, &mut rng).unwrap();

    let mut sample = |n: usize| -> Vec<Vec<f64>> {
        (0..INSTANCES).map(|_| (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()).collect()
    };
    let inputs = sample(inputs_number);
    let targets = sample(outputs_number);
    (network, DataSet::from_inputs_targets(&inputs, &targets).unwrap())
}

fn numerical_gradient(term: &dyn PerformanceTerm, network: &NeuralNetwork, data_set: &DataSet) -> Vec<f64> {
    NumericalDifferentiation::default().calculate_gradient(
        |parameters| term.calculate_performance_at(network, data_set, parameters).unwrap(),
        &network.arrange_parameters(),
    )
}

#[proptest(ProptestConfig { cases: 32, ..ProptestConfig::default() })]
fn gradient_matches_central_differences(
    #[strategy(vec(1usize..=6, 2..=5))] architecture: Vec<usize>,
    chain: Chain,
    #[strategy(0u64..10_000)] seed: u64,
) {
    let (network, data_set) = problem(&architecture, chain, seed);
    let terms: [&dyn PerformanceTerm; 4] =
        [&SumSquaredError, &MeanSquaredError, &NormalizedSquaredError, &RootMeanSquaredError];

    for term in terms {
        let analytic = term.calculate_gradient(&network, &data_set).unwrap();
        let numeric = numerical_gradient(term, &network, &data_set);
        assert_eq!(analytic.len(), network.count_parameters_number());
        for (a, n) in analytic.iter().zip(&numeric) {
            assert!((a - n).abs() < 1e-3, "{} {chain:?}: {a} vs {n}", term.name());
        }
    }
}

#[proptest(ProptestConfig { cases: 32, ..ProptestConfig::default() })]
fn terms_jacobian_rebuilds_the_gradient(
    #[strategy(vec(1usize..=6, 2..=5))] architecture: Vec<usize>,
    chain: Chain,
    #[strategy(0u64..10_000)] seed: u64,
) {
    let (network, data_set) = problem(&architecture, chain, seed);
    let terms: [&dyn PerformanceTerm; 3] = [&SumSquaredError, &MeanSquaredError, &NormalizedSquaredError];

    for term in terms {
        let residuals = term.calculate_terms(&network, &data_set).unwrap();
        let jacobian = term.calculate_terms_jacobian(&network, &data_set).unwrap();
        let gradient = term.calculate_gradient(&network, &data_set).unwrap();

        let squared: f64 = residuals.iter().map(|t| t * t).sum();
        let performance = term.calculate_performance(&network, &data_set).unwrap();
        assert!((squared - performance).abs() < 1e-9 * (1.0 + performance), "{}", term.name());

        let rebuilt = vector::scale(&jacobian.transpose_dot_vector(&residuals), 2.0);
        for (a, b) in rebuilt.iter().zip(&gradient) {
            assert!((a - b).abs() < 1e-6, "{} {chain:?}: {a} vs {b}", term.name());
        }
    }
}

#[proptest(ProptestConfig { cases: 16, ..ProptestConfig::default() })]
fn hessian_matches_differences_of_the_gradient(
    #[strategy(vec(1usize..=4, 2..=4))] architecture: Vec<usize>,
    scaled: bool,
    #[strategy(0u64..10_000)] seed: u64,
) {
    let (network, data_set) = problem(&architecture, Chain::scaled(scaled), seed);
    let hessian = SumSquaredError.calculate_hessian(&network, &data_set).unwrap();
    let numeric = NumericalDifferentiation::default().calculate_jacobian(
        |parameters| {
            let mut shifted = network.clone();
            shifted.set_parameters(parameters).unwrap();
            SumSquaredError.calculate_gradient(&shifted, &data_set).unwrap()
        },
        &network.arrange_parameters(),
    );

    for i in 0..hessian.rows {
        for j in 0..hessian.cols {
            let (a, n) = (hessian[(i, j)], numeric[(i, j)]);
            assert!((a - n).abs() < 1e-3 * (1.0 + a.abs()), "({i}, {j}): {a} vs {n}");
        }
    }
}

#[proptest(ProptestConfig { cases: 16, ..ProptestConfig::default() })]
fn zero_network_on_zero_targets_has_zero_gradient(#[strategy(vec(1usize..=6, 2..=5))] architecture: Vec<usize>) {
    let mut network = NeuralNetwork::new(&architecture).unwrap();
    network.initialize_parameters(0.0).unwrap();
    let inputs: Vec<Vec<f64>> = (0..INSTANCES).map(|i| vec![i as f64 - 2.0; architecture[0]]).collect();
    let targets = vec![vec![0.0; architecture[architecture.len() - 1]]; INSTANCES];
    let data_set = DataSet::from_inputs_targets(&inputs, &targets).unwrap();

    for term in [PerformanceTermType::SumSquaredError, PerformanceTermType::MeanSquaredError] {
        let gradient = term.term().calculate_gradient(&network, &data_set).unwrap();
        assert!(gradient.iter().all(|&g| g == 0.0), "{term:?}: {gradient:?}");
    }
}

#[test]
fn identity_network_scores_zero_normalized_error() {
    let mut network = NeuralNetwork::new(&[1, 1]).unwrap();
    network.set_parameters(&[0.0, 1.0]).unwrap();
    let data_set = DataSet::from_inputs_targets(&[vec![-1.0], vec![1.0]], &[vec![-1.0], vec![1.0]]).unwrap();
    assert_eq!(NormalizedSquaredError.calculate_performance(&network, &data_set).unwrap(), 0.0);
}
