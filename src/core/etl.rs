use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use std::time::Instant;

/// Drives a pipeline through extract, transform and load.
pub struct AnalysisEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> AnalysisEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<String> {
        let started = Instant::now();
        tracing::info!("🚀 Starting engagement analysis");
        self.monitor.log_stats("start");

        // Extract
        let phase = Instant::now();
        let packages = self.pipeline.extract().await?;
        tracing::info!(
            "📦 Extracted {} packages in {:.1}s",
            packages.len(),
            phase.elapsed().as_secs_f64()
        );
        self.monitor.log_stats("extract");

        // Transform
        let phase = Instant::now();
        let results = self.pipeline.transform(packages).await?;
        tracing::info!(
            "🔍 Analyzed {} packages in {:.1}s",
            results.len(),
            phase.elapsed().as_secs_f64()
        );
        self.monitor.log_stats("transform");

        // Load
        let phase = Instant::now();
        let output_path = self.pipeline.load(results).await?;
        tracing::info!(
            "💾 Report written in {:.1}s",
            phase.elapsed().as_secs_f64()
        );

        tracing::info!(
            "✅ Analysis finished in {:.1}s",
            started.elapsed().as_secs_f64()
        );
        self.monitor.log_final_stats();

        Ok(output_path)
    }
}
