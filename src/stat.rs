use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub costs: f64,
    pub time_us: usize,
    pub low_level_expand_nodes: usize,
    pub high_level_expand_nodes: usize,
    pub aco_iterations: usize,
    pub aco_successful_ants: usize,
}

impl Stats {
    pub fn print(&self) {
        info!(
            "Cost {:.3} Time(microseconds) {:?} High level expand nodes number: {:?} Low level expand nodes number {:?} ACO iterations {:?} ACO ants reaching goal {:?}",
            self.costs,
            self.time_us,
            self.high_level_expand_nodes,
            self.low_level_expand_nodes,
            self.aco_iterations,
            self.aco_successful_ants
        );
    }
}
