use std::{collections::HashMap, fmt};

use petgraph::{
    dot::Dot,
    graph::{DiGraph, NodeIndex},
};
use serde::Serialize;

use crate::{BirthApproach, CompartmentalModel, Flow, StratificationRecord, naming};

/// Node standing for everything outside the population.
const OUTSIDE: &str = "outside";

/// An edge of the flowchart: one flow and the parameter setting its rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowEdge {
    pub kind: &'static str,
    pub parameter: String,
}

impl fmt::Display for FlowEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.parameter, self.kind)
    }
}

/// A directed graph of compartments connected by flows.
///
/// Deaths flow to, and births flow from, a single `outside` node.
#[derive(Debug)]
pub struct Flowchart {
    graph: DiGraph<String, FlowEdge>,
    nodes: HashMap<String, NodeIndex>,
}

/// A serialisable description of a model's structure for external renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructureExport<'a> {
    pub compartments: Vec<&'a str>,
    pub flows: &'a [Flow],
    pub birth_approach: &'a BirthApproach,
    pub history: &'a [StratificationRecord],
}

impl Flowchart {
    /// Builds the flowchart of `model`.
    #[must_use]
    pub fn new(model: &CompartmentalModel) -> Self {
        let mut chart = Self {
            graph: DiGraph::new(),
            nodes: HashMap::new(),
        };
        for name in model.compartment_names() {
            chart.node(name);
        }

        for flow in model.flows() {
            let kind = match flow {
                Flow::Standard(_) => "transition",
                Flow::InfectionFrequency(_) => "infection_frequency",
                Flow::InfectionDensity(_) => "infection_density",
                Flow::CompartmentDeath(_) => "death",
            };
            chart.connect(
                flow.origin(),
                flow.destination().unwrap_or(OUTSIDE),
                kind,
                flow.parameter(),
            );
        }

        let births = match model.birth_approach() {
            BirthApproach::NoBirths => None,
            BirthApproach::ReplaceDeaths => Some("replace_deaths"),
            BirthApproach::CrudeBirthRate { parameter } => Some(parameter.as_str()),
        };
        if let Some(parameter) = births {
            let entries: Vec<&str> = model
                .compartment_names()
                .filter(|name| naming::base_name(name) == model.entry_compartment())
                .collect();
            for entry in entries {
                chart.connect(OUTSIDE, entry, "birth", parameter);
            }
        }

        chart
    }

    #[must_use]
    pub fn graph(&self) -> &DiGraph<String, FlowEdge> {
        &self.graph
    }

    /// Renders the flowchart in Graphviz DOT.
    #[must_use]
    pub fn to_dot(&self) -> String {
        Dot::new(&self.graph).to_string()
    }

    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(&index) = self.nodes.get(name) {
            return index;
        }
        let index = self.graph.add_node(name.to_owned());
        self.nodes.insert(name.to_owned(), index);
        index
    }

    fn connect(&mut self, from: &str, to: &str, kind: &'static str, parameter: &str) {
        let from = self.node(from);
        let to = self.node(to);
        self.graph.add_edge(
            from,
            to,
            FlowEdge {
                kind,
                parameter: parameter.to_owned(),
            },
        );
    }
}

impl CompartmentalModel {
    /// The flowchart of this model.
    #[must_use]
    pub fn flowchart(&self) -> Flowchart {
        Flowchart::new(self)
    }

    /// Compartments, flows and stratification history for external renderers.
    #[must_use]
    pub fn structure(&self) -> StructureExport<'_> {
        StructureExport {
            compartments: self.compartment_names().collect(),
            flows: self.flows(),
            birth_approach: self.birth_approach(),
            history: self.history(),
        }
    }
}
