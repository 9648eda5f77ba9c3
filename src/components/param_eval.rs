//! Parameter evaluator: a stampless pseudo-device that evaluates an
//! expression once per sample and writes the result into a registry slot.

use crate::circuit::ComponentId;
use crate::expr::{EvalContext, Expression};
use crate::registry::{ParamHandle, ParameterRegistry};

#[derive(Debug, Clone)]
pub struct ParamEvaluator {
    pub id: ComponentId,
    pub name: String,
    pub target: String,
    expr: Expression,
}

impl ParamEvaluator {
    pub fn new(id: ComponentId, name: String, target: String, expr: Expression) -> Self {
        Self {
            id,
            name,
            target,
            expr,
        }
    }

    /// Evaluate against empty node context (no node voltages participate)
    /// and write the result into the registry.
    pub fn evaluate(&self, registry: &mut ParameterRegistry, dt: f64, t: f64) {
        let ctx = EvalContext {
            v: &[],
            v_prev: &[],
            registry: &*registry,
            dt,
            t,
            self_prev: 0.0,
        };
        let value = self.expr.eval(&ctx);
        registry.set(&self.target, value);
    }

    pub fn handle(&self, registry: &mut ParameterRegistry) -> ParamHandle {
        registry.handle(&self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_expression_result_into_registry() {
        let expr = Expression::compile("2 * 3 + 1").unwrap();
        let ev = ParamEvaluator::new(ComponentId(0), "A1".to_string(), "gain".to_string(), expr);
        let mut registry = ParameterRegistry::new();
        ev.evaluate(&mut registry, 1.0 / 48000.0, 0.0);
        assert_eq!(registry.get("gain"), Some(7.0));
    }

    #[test]
    fn can_reference_time() {
        let expr = Expression::compile("t * 2").unwrap();
        let ev = ParamEvaluator::new(ComponentId(0), "A1".to_string(), "sweep".to_string(), expr);
        let mut registry = ParameterRegistry::new();
        ev.evaluate(&mut registry, 1.0 / 48000.0, 0.5);
        assert_eq!(registry.get("sweep"), Some(1.0));
    }
}
