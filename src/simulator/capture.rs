use crate::expr::Env;
use crate::model::ModelDefinition;

/// Evaluates a model's captures at report times.
///
/// Captures read the locals of the accepted evaluation at `(t, x)` and never
/// change the state. Each value is stored back into the locals buffer so later
/// captures can refer to earlier ones.
pub struct CapturePipeline<'a> {
    model: &'a ModelDefinition,
    params: &'a [f64],
    covariates: &'a [f64],
}

impl<'a> CapturePipeline<'a> {
    pub fn new(model: &'a ModelDefinition, params: &'a [f64], covariates: &'a [f64]) -> Self {
        Self {
            model,
            params,
            covariates,
        }
    }

    pub fn len(&self) -> usize {
        self.model.captures().len()
    }

    pub fn is_empty(&self) -> bool {
        self.model.captures().is_empty()
    }

    pub fn evaluate(&self, t: f64, x: &[f64], locals: &mut [f64]) -> Vec<f64> {
        let offset = self.model.main().len() + self.model.ode_locals().len();
        for (k, capture) in self.model.captures().iter().enumerate() {
            let value = capture.expr.eval(&Env {
                t,
                x,
                p: self.params,
                cov: self.covariates,
                locals,
            });
            locals[offset + k] = value;
        }
        locals[offset..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_chain_in_order() {
        let model = ModelDefinition::from_json(
            r#"{
                "name": "chain",
                "compartments": [ { "name": "A" } ],
                "parameters": [ { "name": "V", "value": 2.0 } ],
                "ode": { "derivatives": [ { "name": "A", "expr": "0" } ] },
                "captures": [
                    { "name": "V" },
                    { "name": "conc", "expr": "A / V" },
                    { "name": "twice", "expr": "2 * conc" },
                    { "name": "at", "expr": "TIME" }
                ]
            }"#,
        )
        .unwrap();
        let pipeline = CapturePipeline::new(&model, &[2.0], &[]);
        let mut locals = vec![0.0; 4];
        let values = pipeline.evaluate(3.0, &[10.0], &mut locals);
        assert_eq!(values, vec![2.0, 5.0, 10.0, 3.0]);
        assert_eq!(pipeline.len(), 4);
    }
}
