use crate::cli::OutputFormat;

pub(crate) mod human;
pub(crate) mod json;

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, plan: &stampede_core::RunPlan);
    fn print_summary(&self, summary: &stampede_core::RunSummary) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Human => Box::new(human::HumanOutput),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
