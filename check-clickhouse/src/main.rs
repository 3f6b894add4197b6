use check_clickhouse::ClickhouseCheck;
use integrations_base::{AgentCheck, CheckConfigFile, min_collection_interval, run_check_main};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    run_check_main("clickhouse", "clickhouse.yaml", |config: &CheckConfigFile| {
        let built = build_checks(config);
        async move { built }
    })
    .await
}

fn build_checks(
    config: &CheckConfigFile,
) -> anyhow::Result<Vec<(Box<dyn AgentCheck>, std::time::Duration)>> {
    let mut checks: Vec<(Box<dyn AgentCheck>, std::time::Duration)> = Vec::new();
    for (position, instance) in config.instances.iter().enumerate() {
        match ClickhouseCheck::from_instance(instance) {
            Ok(check) => {
                tracing::info!(instance = %check.instance_name(), "Configured ClickHouse instance");
                checks.push((Box::new(check), min_collection_interval(instance)));
            }
            Err(e) => {
                tracing::error!(instance = position, error = %e, "Skipping invalid instance");
            }
        }
    }

    if checks.is_empty() {
        anyhow::bail!("No valid ClickHouse instance configured");
    }

    Ok(checks)
}
