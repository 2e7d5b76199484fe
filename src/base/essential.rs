use crate::{FnTime, StrError};
use std::collections::BTreeMap;
use std::fmt;

/// Holds essential boundary conditions (prescribed values of global equations)
///
/// Equation numbers follow the DOF-block layout of the global system, i.e.,
/// the equation of `(dof, row)` is `dof * nrow + row`.
pub struct Essential {
    /// Maps equation numbers to prescribed value functions of time
    pub all: BTreeMap<usize, FnTime>,
}

impl Essential {
    /// Allocates a new instance
    pub fn new() -> Self {
        Essential { all: BTreeMap::new() }
    }

    /// Sets the prescribed value function of equations
    pub fn at(&mut self, equations: &[usize], f: FnTime) -> &mut Self {
        for eq in equations {
            self.all.insert(*eq, f);
        }
        self
    }

    /// Sets the prescribed value function of a DOF at graph rows (points)
    ///
    /// # Panics
    ///
    /// A panic will occur if `dof * nrow + row` overflows
    pub fn points(&mut self, rows: &[usize], dof: usize, nrow: usize, f: FnTime) -> &mut Self {
        for row in rows {
            self.all.insert(dof * nrow + *row, f);
        }
        self
    }

    /// Returns the number of prescribed equations
    pub fn len(&self) -> usize {
        self.all.len()
    }

    /// Returns true if there are no prescribed equations
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Checks that all equations are smaller than the system dimension
    pub fn validate(&self, dim: usize) -> Result<(), StrError> {
        match self.all.keys().next_back() {
            Some(eq) if *eq >= dim => Err("prescribed equation is out of range"),
            _ => Ok(()),
        }
    }

    /// Evaluates the prescribed values at time t (sorted by equation)
    pub fn values(&self, t: f64) -> Vec<(usize, f64)> {
        self.all.iter().map(|(eq, f)| (*eq, f(t))).collect()
    }
}

impl fmt::Display for Essential {
    /// Prints a formatted summary of the prescribed equations
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Prescribed equations\n")?;
        write!(f, "====================\n")?;
        for (eq, func) in &self.all {
            write!(f, "{} : f(0) = {:?}, f(1) = {:?}\n", eq, func(0.0), func(1.0))?;
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::Essential;

    #[test]
    fn essential_works() {
        let mut essential = Essential::new();
        assert!(essential.is_empty());
        essential.at(&[7, 0], |_| 0.0).points(&[1, 2], 1, 5, |t| t);
        assert_eq!(essential.len(), 3);
        assert_eq!(essential.values(2.0), &[(0, 0.0), (6, 2.0), (7, 2.0)]);
        assert_eq!(essential.validate(8), Ok(()));
        assert_eq!(essential.validate(7).err(), Some("prescribed equation is out of range"));
        assert_eq!(
            format!("{}", essential),
            "Prescribed equations\n\
             ====================\n\
             0 : f(0) = 0.0, f(1) = 0.0\n\
             6 : f(0) = 0.0, f(1) = 1.0\n\
             7 : f(0) = 0.0, f(1) = 1.0\n"
        );
    }
}
