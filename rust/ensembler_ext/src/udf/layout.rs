use ensembler_plugin_common::{EnsembleInput, Row, Value};

/// Maps joined prediction columns back to `(model, column)`.
///
/// Everything not claimed by a prediction column is a feature.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RowLayout {
    models: Vec<ModelColumns>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ModelColumns {
    model: String,
    /// `(column, alias)` pairs in declared order.
    columns: Vec<(String, String)>,
}

impl RowLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_prediction(&mut self, model: &str, column: &str, alias: &str) {
        let entry = match self.models.iter().position(|m| m.model == model) {
            Some(index) => &mut self.models[index],
            None => {
                self.models.push(ModelColumns {
                    model: model.to_string(),
                    columns: Vec::new(),
                });
                let last = self.models.len() - 1;
                &mut self.models[last]
            }
        };
        entry.columns.push((column.to_string(), alias.to_string()));
    }

    pub fn is_prediction_column(&self, name: &str) -> bool {
        self.aliases().any(|alias| alias == name)
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.models
            .iter()
            .flat_map(|m| m.columns.iter().map(|(_, alias)| alias.as_str()))
    }

    /// Split a joined row into features and per-model predictions.
    pub fn split(&self, mut row: Row) -> EnsembleInput {
        let mut predictions = Row::with_capacity(self.models.len());
        for model in &self.models {
            let mut group = Row::with_capacity(model.columns.len());
            for (column, alias) in &model.columns {
                group.insert(column.as_str(), row.remove(alias).unwrap_or(Value::Null));
            }
            predictions.insert(model.model.as_str(), group);
        }
        EnsembleInput::new(row, predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_strips_prefixed_columns() {
        let mut layout = RowLayout::new();
        layout.add_prediction("model_a", "score", "__predictions__model_a_score");
        layout.add_prediction("model_b", "score", "__predictions__model_b_score");

        let row: Row = vec![
            ("customer_id", Value::Int(1)),
            ("__predictions__model_a_score", Value::Float(0.2)),
            ("age", Value::Int(40)),
        ]
        .into_iter()
        .collect();
        let input = layout.split(row);

        let features: Vec<&str> = input.features.keys().collect();
        assert_eq!(features, vec!["customer_id", "age"]);
        assert_eq!(input.predictions["model_a"]["score"], Value::Float(0.2));
        assert!(input.predictions["model_b"]["score"].is_null());
        assert!(input.treatment_config.is_none());
    }
}
