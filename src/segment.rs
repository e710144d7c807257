use crate::error::RunError;
use crate::scenario::{AgentRoute, Point, WaypointScenarioEntry};
use log::*;
use serde::Serialize;

/// The `index`-th hop of every agent, solved as one joint instance.
/// `pairs[a]` belongs to agent `a`, and there is always one pair per agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub index: usize,
    pub pairs: Vec<(Point, Point)>,
}

impl Segment {
    pub fn num_agents(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_stationary(&self, agent: usize) -> bool {
        let (from, to) = self.pairs[agent];
        from == to
    }
}

/// Selects `num_agents` entries starting at `start_index`.
pub fn select_agents(
    entries: &[WaypointScenarioEntry],
    start_index: usize,
    num_agents: usize,
) -> Result<&[WaypointScenarioEntry], RunError> {
    assert!(num_agents > 0, "a scenario run needs at least one agent");
    if entries.is_empty() {
        return Err(RunError::EmptyScenario);
    }
    let available = entries.len().saturating_sub(start_index);
    if available < num_agents {
        return Err(RunError::InsufficientAgents {
            requested: num_agents,
            start: start_index,
            available,
        });
    }
    Ok(&entries[start_index..start_index + num_agents])
}

/// Splits the selected agents' routes into joint segments. Agents that have
/// already reached their goal are held there with a stationary pair so that
/// every segment has the same agents, in the same order.
pub fn decompose(
    entries: &[WaypointScenarioEntry],
    start_index: usize,
    num_agents: usize,
) -> Result<Vec<Segment>, RunError> {
    let agents = select_agents(entries, start_index, num_agents)?;

    let first = &agents[0];
    for (a, agent) in agents.iter().enumerate().skip(1) {
        if agent.map_name != first.map_name
            || (agent.width, agent.height) != (first.width, first.height)
        {
            debug!(
                "Agent {} is declared on {} {}x{}, using {} {}x{} from agent 0",
                a, agent.map_name, agent.width, agent.height, first.map_name, first.width, first.height
            );
        }
    }

    let routes = agents.iter().map(|e| e.route()).collect::<Vec<AgentRoute>>();
    let num_segments = routes.iter().map(|r| r.len() - 1).max().unwrap_or(0);

    let segments = (0..num_segments)
        .map(|index| Segment {
            index,
            pairs: routes
                .iter()
                .map(|route| {
                    if index + 1 < route.len() {
                        (route[index], route[index + 1])
                    } else {
                        let goal = route[route.len() - 1];
                        (goal, goal)
                    }
                })
                .collect(),
        })
        .collect::<Vec<_>>();

    debug!(
        "Decomposed {} agents into {} segments",
        num_agents,
        segments.len()
    );
    Ok(segments)
}
