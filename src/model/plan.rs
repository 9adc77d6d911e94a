use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

use super::Error;

/// An action name with its parameters already bound to objects.
/// Two instances are the same action when name and parameters match.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionInstance {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<String>,
}

impl ActionInstance {
    pub fn new(name: &str, parameters: &[&str]) -> Self {
        Self { name: name.to_owned(), parameters: parameters.iter().map(|p| (*p).to_owned()).collect() }
    }
}

impl fmt::Display for ActionInstance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}", self.name)?;
        self.parameters.iter().try_for_each(|p| write!(f, " {}", p))?;
        write!(f, ")")
    }
}

/// Plan steps plus "must finish before" edges between them, by step index.
/// Steps with no path between them are simultaneous.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialOrderPlan {
    #[serde(default)]
    actions: Vec<ActionInstance>,
    #[serde(default)]
    orderings: Vec<(usize, usize)>,
}

impl PartialOrderPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a plan from an adjacency list keyed by action identity.
    pub fn from_adjacency<I>(adjacency: I) -> Self where I: IntoIterator<Item = (ActionInstance, Vec<ActionInstance>)> {
        let mut plan = Self::new();
        for (action, successors) in adjacency {
            let before = plan.index_or_insert(action);
            for successor in successors {
                let after = plan.index_or_insert(successor);
                plan.add_ordering(before, after);
            }
        }
        plan
    }

    pub fn from_file(filepath: &str) -> Result<PartialOrderPlan, Error> {
        let code = fs::read_to_string(filepath).map_err(|e| Error::Io(filepath.to_owned(), e))?;
        Ok(serde_json::from_str(&code)?)
    }

    /// Appends a step and returns its index.
    pub fn add_action(&mut self, action: ActionInstance) -> usize {
        self.actions.push(action);
        self.actions.len() - 1
    }

    pub fn add_ordering(&mut self, before: usize, after: usize) {
        if !self.orderings.contains(&(before, after)) {
            self.orderings.push((before, after));
        }
    }

    pub fn index_of(&self, action: &ActionInstance) -> Option<usize> {
        self.actions.iter().position(|a| a == action)
    }

    fn index_or_insert(&mut self, action: ActionInstance) -> usize {
        match self.index_of(&action) {
            Some(idx) => idx,
            None => self.add_action(action),
        }
    }

    pub fn actions(&self) -> &[ActionInstance] {
        &self.actions
    }

    pub fn orderings(&self) -> &[(usize, usize)] {
        &self.orderings
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Reads the planning engine's textual plan: `|0:move r a b|1:move r b c|0->1|`.
/// Step ids are local to the string and need not be contiguous.
impl FromStr for PartialOrderPlan {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        if !text.starts_with('|') {
            return Err(Error::PlanParse { entry: 0, message: String::from("No plan found.") });
        }
        let mut plan = Self::new();
        let mut ids = HashMap::<usize, usize>::new();
        let mut edges = Vec::new();
        let parse_id = |entry: usize, s: &str| s.trim().parse::<usize>()
            .map_err(|_| Error::PlanParse { entry, message: format!("Expected step id, got '{}'.", s) });
        for (entry, line) in text.trim_matches('|').split('|').enumerate().filter(|(_, l)| !l.trim().is_empty()) {
            if let Some((id, action)) = line.split_once(':') {
                let mut words = action.split_whitespace();
                let name = words.next().ok_or_else(|| Error::PlanParse { entry, message: String::from("Expected action name.") })?;
                let parameters = words.map(String::from).collect();
                let step = plan.add_action(ActionInstance { name: name.to_owned(), parameters });
                if ids.insert(parse_id(entry, id)?, step).is_some() {
                    return Err(Error::PlanParse { entry, message: format!("Duplicate step id {}.", id.trim()) });
                }
            } else if let Some((from, to)) = line.split_once("->") {
                edges.push((entry, parse_id(entry, from)?, parse_id(entry, to)?));
            } else {
                return Err(Error::PlanParse { entry, message: format!("Expected 'id:action' or 'id->id', got '{}'.", line) });
            }
        }
        for (entry, from, to) in edges {
            match (ids.get(&from), ids.get(&to)) {
                (Some(before), Some(after)) => plan.add_ordering(*before, *after),
                _ => return Err(Error::PlanParse { entry, message: format!("Unknown step in ordering {}->{}.", from, to) }),
            }
        }
        Ok(plan)
    }
}

impl fmt::Display for PartialOrderPlan {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "|")?;
        for (idx, action) in self.actions.iter().enumerate() {
            write!(f, "{}:{}", idx, action.name)?;
            action.parameters.iter().try_for_each(|p| write!(f, " {}", p))?;
            write!(f, "|")?;
        }
        self.orderings.iter().try_for_each(|(before, after)| write!(f, "{}->{}|", before, after))
    }
}
