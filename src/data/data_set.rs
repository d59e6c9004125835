use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::error::{ensure_size, Error, Result};
use crate::math::{Matrix, Statistics};
use crate::network::Variables;

/// Role of a column of the data matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableUse {
    Input,
    Target,
    Unused,
}

/// Subset a row of the data matrix belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceUse {
    Training,
    Generalization,
    Testing,
    Unused,
}

/// Instance-major table of samples: one row per instance, one column per
/// variable. Columns are tagged as inputs or targets and rows are assigned to
/// the training, generalization or testing subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSet {
    pub data: Matrix,
    variables_use: Vec<VariableUse>,
    instances_use: Vec<InstanceUse>,
    #[serde(default)]
    pub variables: Variables,
}

impl DataSet {
    /// Wraps `data`; the first `inputs_number` columns are inputs, the rest
    /// are targets, and every instance is used for training.
    pub fn new(data: Matrix, inputs_number: usize) -> Result<DataSet> {
        if inputs_number > data.cols {
            return Err(Error::InvalidConfig(format!(
                "{inputs_number} inputs requested from a data set of {} variables",
                data.cols
            )));
        }
        let variables_use = (0..data.cols)
            .map(|j| if j < inputs_number { VariableUse::Input } else { VariableUse::Target })
            .collect();
        Ok(DataSet {
            instances_use: vec![InstanceUse::Training; data.rows],
            variables: Variables::new(data.cols),
            data,
            variables_use,
        })
    }

    /// Builds a data set from paired input and target rows.
    pub fn from_inputs_targets(inputs: &[Vec<f64>], targets: &[Vec<f64>]) -> Result<DataSet> {
        ensure_size("DataSet::from_inputs_targets", inputs.len(), targets.len())?;
        let inputs_number = inputs.first().map_or(0, |row| row.len());
        let targets_number = targets.first().map_or(0, |row| row.len());

        let mut rows = Vec::with_capacity(inputs.len());
        for (input, target) in inputs.iter().zip(targets) {
            ensure_size("DataSet::from_inputs_targets", inputs_number, input.len())?;
            ensure_size("DataSet::from_inputs_targets", targets_number, target.len())?;
            rows.push(input.iter().chain(target).copied().collect());
        }
        let data = if rows.is_empty() { Matrix::zeros(0, inputs_number + targets_number) } else { Matrix::from_data(rows) };
        DataSet::new(data, inputs_number)
    }

    pub fn instances_number(&self) -> usize {
        self.data.rows
    }

    pub fn variables_use(&self) -> &[VariableUse] {
        &self.variables_use
    }

    pub fn set_variables_use(&mut self, variables_use: Vec<VariableUse>) -> Result<()> {
        ensure_size("DataSet::set_variables_use", self.data.cols, variables_use.len())?;
        self.variables_use = variables_use;
        Ok(())
    }

    pub fn instances_use(&self) -> &[InstanceUse] {
        &self.instances_use
    }

    pub fn set_instances_use(&mut self, instances_use: Vec<InstanceUse>) -> Result<()> {
        ensure_size("DataSet::set_instances_use", self.data.rows, instances_use.len())?;
        self.instances_use = instances_use;
        Ok(())
    }

    fn indices_of_variables(&self, use_: VariableUse) -> Vec<usize> {
        (0..self.variables_use.len()).filter(|&j| self.variables_use[j] == use_).collect()
    }

    fn indices_of_instances(&self, use_: InstanceUse) -> Vec<usize> {
        (0..self.instances_use.len()).filter(|&i| self.instances_use[i] == use_).collect()
    }

    pub fn inputs_indices(&self) -> Vec<usize> {
        self.indices_of_variables(VariableUse::Input)
    }

    pub fn targets_indices(&self) -> Vec<usize> {
        self.indices_of_variables(VariableUse::Target)
    }

    pub fn count_inputs_number(&self) -> usize {
        self.variables_use.iter().filter(|&&u| u == VariableUse::Input).count()
    }

    pub fn count_targets_number(&self) -> usize {
        self.variables_use.iter().filter(|&&u| u == VariableUse::Target).count()
    }

    pub fn training_indices(&self) -> Vec<usize> {
        self.indices_of_instances(InstanceUse::Training)
    }

    pub fn generalization_indices(&self) -> Vec<usize> {
        self.indices_of_instances(InstanceUse::Generalization)
    }

    pub fn testing_indices(&self) -> Vec<usize> {
        self.indices_of_instances(InstanceUse::Testing)
    }

    pub fn count_training_instances_number(&self) -> usize {
        self.instances_use.iter().filter(|&&u| u == InstanceUse::Training).count()
    }

    pub fn count_generalization_instances_number(&self) -> usize {
        self.instances_use.iter().filter(|&&u| u == InstanceUse::Generalization).count()
    }

    pub fn count_testing_instances_number(&self) -> usize {
        self.instances_use.iter().filter(|&&u| u == InstanceUse::Testing).count()
    }

    fn select(&self, context: &'static str, use_: InstanceUse, i: usize, columns: &[usize]) -> Result<Vec<f64>> {
        let row = self
            .instances_use
            .iter()
            .enumerate()
            .filter(|&(_, &u)| u == use_)
            .nth(i)
            .map(|(row, _)| row)
            .ok_or_else(|| Error::SizeMismatch {
                context,
                expected: self.instances_use.iter().filter(|&&u| u == use_).count(),
                actual: i + 1,
            })?;
        Ok(columns.iter().map(|&j| self.data[(row, j)]).collect())
    }

    /// Input vector of the `i`-th training instance.
    pub fn get_training_input_instance(&self, i: usize) -> Result<Vec<f64>> {
        self.select("DataSet::get_training_input_instance", InstanceUse::Training, i, &self.inputs_indices())
    }

    pub fn get_training_target_instance(&self, i: usize) -> Result<Vec<f64>> {
        self.select("DataSet::get_training_target_instance", InstanceUse::Training, i, &self.targets_indices())
    }

    pub fn get_generalization_input_instance(&self, i: usize) -> Result<Vec<f64>> {
        self.select("DataSet::get_generalization_input_instance", InstanceUse::Generalization, i, &self.inputs_indices())
    }

    pub fn get_generalization_target_instance(&self, i: usize) -> Result<Vec<f64>> {
        self.select(
            "DataSet::get_generalization_target_instance",
            InstanceUse::Generalization,
            i,
            &self.targets_indices(),
        )
    }

    pub fn get_testing_input_instance(&self, i: usize) -> Result<Vec<f64>> {
        self.select("DataSet::get_testing_input_instance", InstanceUse::Testing, i, &self.inputs_indices())
    }

    pub fn get_testing_target_instance(&self, i: usize) -> Result<Vec<f64>> {
        self.select("DataSet::get_testing_target_instance", InstanceUse::Testing, i, &self.targets_indices())
    }

    /// (inputs, targets) of every instance in `use_`, in row order.
    pub fn instances(&self, use_: InstanceUse) -> Vec<(Vec<f64>, Vec<f64>)> {
        let inputs = self.inputs_indices();
        let targets = self.targets_indices();
        self.indices_of_instances(use_)
            .into_iter()
            .map(|row| {
                (
                    inputs.iter().map(|&j| self.data[(row, j)]).collect(),
                    targets.iter().map(|&j| self.data[(row, j)]).collect(),
                )
            })
            .collect()
    }

    fn split_counts(&self, training_ratio: f64, generalization_ratio: f64, testing_ratio: f64) -> Result<(usize, usize)> {
        let total = training_ratio + generalization_ratio + testing_ratio;
        if [training_ratio, generalization_ratio, testing_ratio].iter().any(|r| *r < 0.0) || total <= 0.0 {
            return Err(Error::InvalidConfig("instance split ratios must be non-negative with a positive sum".into()));
        }
        let n = self.instances_number() as f64;
        let generalization = (n * generalization_ratio / total).round() as usize;
        let testing = (n * testing_ratio / total).round() as usize;
        let generalization = generalization.min(self.instances_number());
        let testing = testing.min(self.instances_number() - generalization);
        Ok((generalization, testing))
    }

    fn assign(&mut self, order: &[usize], generalization: usize, testing: usize) {
        let training = order.len() - generalization - testing;
        for (position, &row) in order.iter().enumerate() {
            self.instances_use[row] = if position < training {
                InstanceUse::Training
            } else if position < training + generalization {
                InstanceUse::Generalization
            } else {
                InstanceUse::Testing
            };
        }
    }

    /// Assigns the first rows to training, the next to generalization and the
    /// last to testing, in proportion to the ratios.
    pub fn split_instances_sequential(&mut self, training_ratio: f64, generalization_ratio: f64, testing_ratio: f64) -> Result<()> {
        let (generalization, testing) = self.split_counts(training_ratio, generalization_ratio, testing_ratio)?;
        let order: Vec<usize> = (0..self.instances_number()).collect();
        self.assign(&order, generalization, testing);
        Ok(())
    }

    /// Same as [`split_instances_sequential`](Self::split_instances_sequential)
    /// over a random permutation of the rows.
    pub fn split_instances_random<R: Rng + ?Sized>(
        &mut self,
        training_ratio: f64,
        generalization_ratio: f64,
        testing_ratio: f64,
        rng: &mut R,
    ) -> Result<()> {
        let (generalization, testing) = self.split_counts(training_ratio, generalization_ratio, testing_ratio)?;
        let mut order: Vec<usize> = (0..self.instances_number()).collect();
        order.shuffle(rng);
        self.assign(&order, generalization, testing);
        Ok(())
    }

    fn column_statistics(&self, columns: &[usize]) -> Vec<Statistics> {
        let rows: Vec<usize> = (0..self.instances_number()).filter(|&i| self.instances_use[i] != InstanceUse::Unused).collect();
        columns
            .iter()
            .map(|&j| Statistics::from_values(&rows.iter().map(|&i| self.data[(i, j)]).collect::<Vec<_>>()))
            .collect()
    }

    /// Per-input statistics over every used instance, for configuring a
    /// scaling layer.
    pub fn calculate_inputs_statistics(&self) -> Vec<Statistics> {
        self.column_statistics(&self.inputs_indices())
    }

    pub fn calculate_targets_statistics(&self) -> Vec<Statistics> {
        self.column_statistics(&self.targets_indices())
    }

    /// Mean of every target over the training instances.
    pub fn calculate_training_target_mean(&self) -> Vec<f64> {
        let training = self.instances(InstanceUse::Training);
        let mut mean = vec![0.0; self.count_targets_number()];
        if training.is_empty() {
            return mean;
        }
        for (_, target) in &training {
            for (m, t) in mean.iter_mut().zip(target) {
                *m += t;
            }
        }
        mean.iter_mut().for_each(|m| *m /= training.len() as f64);
        mean
    }

    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load_json(path: &str) -> Result<DataSet> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let data_set: DataSet = serde_json::from_reader(reader)?;
        ensure_size("DataSet::load_json", data_set.data.cols, data_set.variables_use.len())?;
        ensure_size("DataSet::load_json", data_set.data.rows, data_set.instances_use.len())?;
        Ok(data_set)
    }
}
