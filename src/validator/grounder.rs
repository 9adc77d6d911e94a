use crate::model::expression::{Expr, TypedVariable};
use crate::model::problem::Problem;

/// Every assignment of objects to a quantifier's variables, each substituted
/// into a fresh copy of the quantified body.
///
/// Assignments are produced odometer style: the last variable changes fastest
/// and each variable walks its domain in object declaration order. A variable
/// with an empty domain yields no groundings at all; an empty variable list
/// yields the body once.
pub struct Groundings<'a> {
    body: &'a Expr,
    domains: Vec<(&'a str, Vec<&'a str>)>,
    index: Vec<usize>,
    done: bool,
}

impl<'a> Groundings<'a> {
    pub fn new(problem: &'a Problem, variables: &'a [TypedVariable], body: &'a Expr, include_subtypes: bool) -> Self {
        let domains: Vec<(&str, Vec<&str>)> = variables.iter()
            .map(|v| (v.name.as_str(), problem.objects_of_type(&v.kind, include_subtypes)))
            .collect();
        let done = domains.iter().any(|(_, objects)| objects.is_empty());
        Self { body, index: vec![0; domains.len()], domains, done }
    }

    /// Number of groundings a fresh enumeration produces.
    pub fn combinations(&self) -> usize {
        self.domains.iter().map(|(_, objects)| objects.len()).product()
    }

    /// Moves to the next assignment, carrying into earlier positions.
    /// Returns false once the last assignment has been passed.
    fn advance(&mut self) -> bool {
        let mut i = self.index.len();
        while i > 0 {
            i -= 1;
            self.index[i] += 1;
            if self.index[i] < self.domains[i].1.len() {
                return true;
            }
            self.index[i] = 0;
        }
        false
    }

    fn values(&self) -> Vec<(&'a str, &'a str)> {
        self.domains.iter().zip(self.index.iter()).map(|((name, objects), idx)| (*name, objects[*idx])).collect()
    }
}

impl<'a> Iterator for Groundings<'a> {
    type Item = Expr;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let grounded = self.body.bind_variables(&self.values());
        self.done = !self.advance();
        Some(grounded)
    }
}
