use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::data::ParameterSet;
use crate::error::ParameterError;

/// Parameter sets for a virtual population.
pub struct Population;

impl Population {
    /// Draw `n` parameter sets with log-normal between-subject variability.
    ///
    /// Each parameter named in `omegas` becomes `p * exp(eta)` with
    /// `eta ~ N(0, omega^2)`; all other parameters keep their base value. Draws
    /// come from a seeded generator, so the same seed yields the same sets.
    pub fn lognormal(
        base: &ParameterSet,
        omegas: &[(&str, f64)],
        n: usize,
        seed: u64,
    ) -> Result<Vec<ParameterSet>, ParameterError> {
        let mut varied = Vec::with_capacity(omegas.len());
        for &(name, omega) in omegas {
            if !base.contains(name) {
                return Err(ParameterError::Unknown {
                    name: name.to_string(),
                });
            }
            let value = base.get(name).ok_or_else(|| ParameterError::Missing {
                name: name.to_string(),
            })?;
            let normal = Normal::new(0.0, omega).map_err(|e| ParameterError::OutOfDomain {
                name: format!("omega of '{}'", name),
                value: omega,
                reason: e.to_string(),
            })?;
            varied.push((name, value, normal));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut sets = Vec::with_capacity(n);
        for _ in 0..n {
            let mut set = base.clone();
            for (name, value, normal) in &varied {
                let eta: f64 = normal.sample(&mut rng);
                set.set(name, value * eta.exp())?;
            }
            sets.push(set);
        }
        Ok(sets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ParameterSet {
        [("CL", 2.0), ("V", 10.0)].into_iter().collect()
    }

    #[test]
    fn same_seed_same_population() {
        let a = Population::lognormal(&base(), &[("CL", 0.3)], 20, 42).unwrap();
        let b = Population::lognormal(&base(), &[("CL", 0.3)], 20, 42).unwrap();
        assert_eq!(a, b);
        assert!(a.iter().all(|p| p.get("V") == Some(10.0)));
        assert!(a.iter().all(|p| p.get("CL").unwrap() > 0.0));
        assert!(a.iter().any(|p| p.get("CL") != Some(2.0)));
    }

    #[test]
    fn zero_omega_keeps_base_values() {
        let sets = Population::lognormal(&base(), &[("V", 0.0)], 3, 1).unwrap();
        assert!(sets.iter().all(|p| p.get("V") == Some(10.0)));
    }

    #[test]
    fn rejects_unknown_parameters_and_bad_omegas() {
        assert!(matches!(
            Population::lognormal(&base(), &[("Q", 0.1)], 3, 1),
            Err(ParameterError::Unknown { .. })
        ));
        assert!(matches!(
            Population::lognormal(&base(), &[("CL", -1.0)], 3, 1),
            Err(ParameterError::OutOfDomain { .. })
        ));
    }
}
