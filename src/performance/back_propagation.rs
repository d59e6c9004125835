//! Squared-error machinery shared by the squared-error family of terms.
//!
//! Everything here works on a list of `(inputs, targets)` instances and on
//! unnormalized sums; each term applies its own normalization.

use crate::error::{ensure_size, Error, Result};
use crate::layers::multilayer_perceptron::{calculate_layers_delta, calculate_point_gradient};
use crate::layers::MultilayerPerceptron;
use crate::math::{vector, Matrix};
use crate::network::{LayerKind, NeuralNetwork};

pub(crate) type Instance = (Vec<f64>, Vec<f64>);

fn perceptron<'a>(context: &'static str, network: &'a NeuralNetwork) -> Result<&'a MultilayerPerceptron> {
    network
        .multilayer_perceptron()
        .ok_or_else(|| Error::missing(context, "multilayer perceptron"))
}

/// Index of the perceptron stack's first parameter in the network's vector.
fn perceptron_parameters_offset(network: &NeuralNetwork) -> usize {
    network
        .layers()
        .iter()
        .take_while(|l| l.kind() != LayerKind::MultilayerPerceptron)
        .map(|l| l.count_parameters_number())
        .sum()
}

/// Output errors of one instance.
fn calculate_errors(network: &NeuralNetwork, inputs: &[f64], targets: &[f64]) -> Result<Vec<f64>> {
    let outputs = network.calculate_outputs(inputs)?;
    ensure_size("back_propagation::calculate_errors", outputs.len(), targets.len())?;
    Ok(vector::subtract(&outputs, targets))
}

pub(crate) fn sum_squared_error(network: &NeuralNetwork, instances: &[Instance]) -> Result<f64> {
    instances.iter().try_fold(0.0, |sum, (inputs, targets)| {
        Ok(sum + vector::sum_squared(&calculate_errors(network, inputs, targets)?))
    })
}

/// Output errors and the gradient of `‖outputs - targets‖²` for one instance.
///
/// The error seed `2·(outputs - targets)` is pulled back through the layers
/// after the perceptron stack, including a conditions layer's homogeneous
/// solution, before back-propagating through the perceptrons.
pub(crate) fn calculate_instance_gradient(
    network: &NeuralNetwork,
    inputs: &[f64],
    targets: &[f64],
) -> Result<(Vec<f64>, Vec<f64>)> {
    const CONTEXT: &str = "back_propagation::calculate_instance_gradient";
    let mlp = perceptron(CONTEXT, network)?;

    let propagation = network.first_order_forward_propagation(inputs)?;
    ensure_size(CONTEXT, propagation.outputs.len(), targets.len())?;
    let errors = vector::subtract(&propagation.outputs, targets);

    let seed = vector::scale(&errors, 2.0);
    let output_gradient = propagation.outputs_jacobian.transpose_dot_vector(&seed);
    let layers_delta = calculate_layers_delta(mlp, &propagation.perceptron, &output_gradient);
    let perceptron_gradient =
        calculate_point_gradient(mlp, &propagation.perceptron_inputs, &propagation.perceptron, &layers_delta);

    let mut gradient = vec![0.0; network.count_parameters_number()];
    let offset = perceptron_parameters_offset(network);
    gradient[offset..offset + perceptron_gradient.len()].copy_from_slice(&perceptron_gradient);

    Ok((errors, gradient))
}

pub(crate) fn sum_squared_error_gradient(network: &NeuralNetwork, instances: &[Instance]) -> Result<Vec<f64>> {
    let mut gradient = vec![0.0; network.count_parameters_number()];
    for (inputs, targets) in instances {
        let (_, instance_gradient) = calculate_instance_gradient(network, inputs, targets)?;
        vector::axpy(&mut gradient, &instance_gradient, 1.0);
    }
    Ok(gradient)
}

/// `‖outputs - targets‖` per instance.
pub(crate) fn squared_error_terms(network: &NeuralNetwork, instances: &[Instance]) -> Result<Vec<f64>> {
    instances
        .iter()
        .map(|(inputs, targets)| Ok(vector::norm(&calculate_errors(network, inputs, targets)?)))
        .collect()
}

/// Jacobian of [`squared_error_terms`]. Rows of instances with zero error
/// are zero, the limit taken by the subgradient.
pub(crate) fn squared_error_terms_jacobian(network: &NeuralNetwork, instances: &[Instance]) -> Result<Matrix> {
    let mut jacobian = Matrix::zeros(instances.len(), network.count_parameters_number());
    for (i, (inputs, targets)) in instances.iter().enumerate() {
        let (errors, gradient) = calculate_instance_gradient(network, inputs, targets)?;
        let term = vector::norm(&errors);
        if term > 0.0 {
            jacobian.set_row(i, &vector::scale(&gradient, 0.5 / term));
        }
    }
    Ok(jacobian)
}

/// Exact Hessian of the sum squared error w.r.t. the parameters.
///
/// With `H[m]` the Hessian w.r.t. the combinations of perceptron layer `m`
/// and `G[m][l] = ∂c[m]/∂c[l]`, the block of a parameter in layer `l` against
/// one in layer `m ≥ l` is
/// `z[m]·z[l]·(H[m]·G[m][l]) + δ[m]·f'[m-1]·G[m-1][l]·z[l]`,
/// where `z` is the input the parameter multiplies and the second part only
/// exists for synaptic weights with `m > l`.
///
/// The layers after the perceptron stack must act element-wise; probabilistic
/// and conditions layers only qualify while they are the identity.
pub(crate) fn sum_squared_error_hessian(network: &NeuralNetwork, instances: &[Instance]) -> Result<Matrix> {
    const CONTEXT: &str = "SumSquaredError::calculate_hessian";
    let mlp = perceptron(CONTEXT, network)?;

    let parameters_number = network.count_parameters_number();
    let offset = perceptron_parameters_offset(network);
    let layers_offsets = mlp.layers_parameters_offsets();
    let last = mlp.layers_number() - 1;

    let mut hessian = Matrix::zeros(parameters_number, parameters_number);

    for (inputs, targets) in instances {
        let propagation = network.first_order_forward_propagation(inputs)?;
        ensure_size(CONTEXT, propagation.outputs.len(), targets.len())?;
        let x = &propagation.perceptron_inputs;
        let second_order = mlp.second_order_forward_propagation(x)?;
        let first_order = &second_order.first_order;
        let (u1, u2) = network.calculate_output_layers_derivatives(first_order.outputs())?;
        let errors = vector::subtract(&propagation.outputs, targets);

        let output_gradient: Vec<f64> = errors.iter().zip(&u1).map(|(e, d)| 2.0 * e * d).collect();
        let layers_delta = calculate_layers_delta(mlp, first_order, &output_gradient);

        let mut layers_hessian = vec![Matrix::default(); last + 1];
        let f1 = &first_order.layers_activation_derivative[last];
        let f2 = &second_order.layers_activation_second_derivative[last];
        let output_curvature: Vec<f64> = (0..errors.len())
            .map(|k| {
                let g1 = u1[k] * f1[k];
                let g2 = u2[k] * f1[k] * f1[k] + u1[k] * f2[k];
                2.0 * (g1 * g1 + errors[k] * g2)
            })
            .collect();
        layers_hessian[last] = Matrix::diagonal(&output_curvature);

        for m in (0..last).rev() {
            let weights = &mlp.layers[m + 1].synaptic_weights;
            let derivative = &first_order.layers_activation_derivative[m];
            let second_derivative = &second_order.layers_activation_second_derivative[m];

            let mut h = &(&weights.transpose() * &layers_hessian[m + 1]) * weights;
            for i in 0..h.rows {
                for j in 0..h.cols {
                    h[(i, j)] *= derivative[i] * derivative[j];
                }
            }
            let back = weights.transpose_dot_vector(&layers_delta[m + 1]);
            for i in 0..h.rows {
                h[(i, i)] += second_derivative[i] * back[i];
            }
            layers_hessian[m] = h;
        }

        let interlayers = mlp.calculate_interlayers_combination_combination_jacobian(first_order);

        for l in 0..=last {
            let inputs_l = first_order.layer_inputs(x, l);
            let stride_l = inputs_l.len() + 1;

            for m in l..=last {
                let inputs_m = first_order.layer_inputs(x, m);
                let stride_m = inputs_m.len() + 1;
                let hg = &layers_hessian[m] * &interlayers[m][l];

                for i in 0..mlp.layers[l].perceptrons_number() {
                    for alpha in 0..stride_l {
                        let z_a = if alpha == 0 { 1.0 } else { inputs_l[alpha - 1] };
                        let a = offset + layers_offsets[l] + i * stride_l + alpha;

                        for j in 0..mlp.layers[m].perceptrons_number() {
                            for beta in 0..stride_m {
                                let b = offset + layers_offsets[m] + j * stride_m + beta;
                                if b < a {
                                    continue;
                                }
                                let z_b = if beta == 0 { 1.0 } else { inputs_m[beta - 1] };

                                let mut value = z_a * z_b * hg[(j, i)];
                                if beta > 0 && m > l {
                                    let d = first_order.layers_activation_derivative[m - 1][beta - 1];
                                    value += layers_delta[m][j] * d * interlayers[m - 1][l][(beta - 1, i)] * z_a;
                                }

                                hessian[(a, b)] += value;
                                if a != b {
                                    hessian[(b, a)] += value;
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    Ok(hessian)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationFunction;
    use crate::layers::{
        ConditionsLayer, ProbabilisticLayer, ProbabilisticMethod, UnscalingLayer, UnscalingMethod,
    };
    use crate::math::Statistics;
    use crate::network::NetworkLayer;
    use crate::numerical_differentiation::NumericalDifferentiation;
    use rand::{rngs::StdRng, SeedableRng};

    fn instances() -> Vec<Instance> {
        vec![
            (vec![0.3, -0.2], vec![0.5]),
            (vec![-0.7, 0.1], vec![-0.4]),
            (vec![0.9, 0.8], vec![0.2]),
        ]
    }

    fn network(seed: u64) -> NeuralNetwork {
        let mut network = NeuralNetwork::new(&[2, 3, 1]).unwrap();
        network
            .multilayer_perceptron_mut()
            .unwrap()
            .set_layers_activation_function(&[ActivationFunction::Logistic, ActivationFunction::HyperbolicTangent])
            .unwrap();
        network
            .insert_layer(NetworkLayer::Unscaling(UnscalingLayer::from_statistics(
                vec![Statistics::new(-2.0, 3.0, 0.5, 1.5)],
                UnscalingMethod::MinimumMaximum,
            )))
            .unwrap();
        network.initialize_random_uniform_with(-1.0, 1.0, &mut StdRng::seed_from_u64(seed)).unwrap();
        network
    }

    fn numerical_gradient(network: &NeuralNetwork, instances: &[Instance]) -> Vec<f64> {
        NumericalDifferentiation::default().calculate_gradient(
            |parameters| {
                let mut shifted = network.clone();
                shifted.set_parameters(parameters).unwrap();
                sum_squared_error(&shifted, instances).unwrap()
            },
            &network.arrange_parameters(),
        )
    }

    #[test]
    fn gradient_matches_central_differences() {
        let network = network(1);
        let analytic = sum_squared_error_gradient(&network, &instances()).unwrap();
        let numeric = numerical_gradient(&network, &instances());
        for (a, n) in analytic.iter().zip(&numeric) {
            assert!((a - n).abs() < 1e-5, "{a} vs {n}");
        }
    }

    #[test]
    fn gradient_through_conditions_layer_matches_central_differences() {
        let mut network = NeuralNetwork::new(&[1, 2, 1]).unwrap();
        network
            .insert_layer(NetworkLayer::Conditions(
                ConditionsLayer::two_conditions(1, 0, (0.0, vec![1.0]), (1.0, vec![-1.0])).unwrap(),
            ))
            .unwrap();
        network.initialize_random_uniform_with(-1.0, 1.0, &mut StdRng::seed_from_u64(9)).unwrap();
        let instances = vec![(vec![0.25], vec![0.3]), (vec![0.6], vec![-0.5]), (vec![1.4], vec![0.0])];

        let analytic = sum_squared_error_gradient(&network, &instances).unwrap();
        let numeric = numerical_gradient(&network, &instances);
        for (a, n) in analytic.iter().zip(&numeric) {
            assert!((a - n).abs() < 1e-5, "{a} vs {n}");
        }
    }

    #[test]
    fn hessian_matches_differences_of_the_gradient() {
        let network = network(4);
        let instances = instances();
        let hessian = sum_squared_error_hessian(&network, &instances).unwrap();
        assert!(hessian.is_symmetric(1e-12));

        let numeric = NumericalDifferentiation::default().calculate_jacobian(
            |parameters| {
                let mut shifted = network.clone();
                shifted.set_parameters(parameters).unwrap();
                sum_squared_error_gradient(&shifted, &instances).unwrap()
            },
            &network.arrange_parameters(),
        );
        for i in 0..hessian.rows {
            for j in 0..hessian.cols {
                assert!(
                    (hessian[(i, j)] - numeric[(i, j)]).abs() < 1e-4,
                    "({i}, {j}): {} vs {}",
                    hessian[(i, j)],
                    numeric[(i, j)]
                );
            }
        }
    }

    #[test]
    fn terms_jacobian_reproduces_the_gradient() {
        let network = network(2);
        let instances = instances();
        let terms = squared_error_terms(&network, &instances).unwrap();
        let jacobian = squared_error_terms_jacobian(&network, &instances).unwrap();
        let gradient = sum_squared_error_gradient(&network, &instances).unwrap();
        let rebuilt = vector::scale(&jacobian.transpose_dot_vector(&terms), 2.0);
        for (a, b) in rebuilt.iter().zip(&gradient) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn identity_output_layers_keep_the_hessian() {
        let plain = network(4);
        let mut network = plain.clone();
        network
            .insert_layer(NetworkLayer::Probabilistic(ProbabilisticLayer::new(1, ProbabilisticMethod::NoProbabilistic)))
            .unwrap();
        network.insert_layer(NetworkLayer::Conditions(ConditionsLayer::new(2, 1))).unwrap();
        let instances = instances();
        assert_eq!(
            sum_squared_error_hessian(&network, &instances).unwrap(),
            sum_squared_error_hessian(&plain, &instances).unwrap()
        );

        network
            .insert_layer(NetworkLayer::Probabilistic(ProbabilisticLayer::new(1, ProbabilisticMethod::Softmax)))
            .unwrap();
        assert!(matches!(sum_squared_error_hessian(&network, &instances), Err(Error::Unsupported { .. })));
    }

    #[test]
    fn hessian_rejects_non_element_wise_output_layers() {
        let mut network = NeuralNetwork::new(&[1, 1]).unwrap();
        network
            .insert_layer(NetworkLayer::Conditions(ConditionsLayer::one_condition(1, 0, 0.0, vec![0.0]).unwrap()))
            .unwrap();
        let instances = vec![(vec![1.0], vec![1.0])];
        assert!(matches!(sum_squared_error_hessian(&network, &instances), Err(Error::Unsupported { .. })));
    }
}
