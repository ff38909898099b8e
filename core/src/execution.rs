/// Selects whether an engine call fans work out across the rayon pool.
///
/// Results never depend on the policy; only the schedule does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionPolicy {
    #[default]
    Sequential,
    Parallel,
}

impl ExecutionPolicy {
    pub fn is_parallel(self) -> bool {
        matches!(self, Self::Parallel)
    }
}
