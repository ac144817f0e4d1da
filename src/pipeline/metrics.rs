#[derive(Debug, Clone)]
pub struct StepMetrics {
    pub name: String,
    pub duration_ms: u128,
}

#[derive(Debug, Clone)]
pub struct RunMetrics {
    pub total_duration_ms: u128,
    pub steps: Vec<StepMetrics>,
}

impl RunMetrics {
    pub fn step_duration_ms(&self, name: &str) -> Option<u128> {
        self.steps
            .iter()
            .find(|step| step.name == name)
            .map(|step| step.duration_ms)
    }
}
