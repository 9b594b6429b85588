use core::future::Future;
use std::path::PathBuf;

use chrono::NaiveDate;
use config::MonitorConfig;
use model_structs::ModelRecord;
use tracing::{debug, error, info, warn};

use super::{
    BaselineStore, DataResolution, Mailer, ModelRegistry, MonitorError, Report, StateTracker,
    TestOutcome, TestQueue, Verdict, is_due, score,
};

/// Counters describing one monitoring pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassSummary {
    pub models: usize,
    pub not_due: usize,
    pub passed: usize,
    pub failed: usize,
    pub no_data: usize,
    pub schema_mismatch: usize,
    pub faults: usize,
    pub delivery_failures: usize,
    pub state_update_failures: usize,
}

impl PassSummary {
    /// Whether anything went wrong on the operator's side during the pass.
    ///
    /// Failed tests are reported to owners and do not count here.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.faults + self.delivery_failures + self.state_update_failures > 0
    }
}

/// Runs monitoring passes over every registered model.
pub struct Monitor<R, B, S, M> {
    registry: R,
    baselines: B,
    state: S,
    mailer: M,
    queue: TestQueue,
    config: MonitorConfig,
}

impl<R, B, S, M> Monitor<R, B, S, M>
where
    R: ModelRegistry,
    B: BaselineStore,
    S: StateTracker,
    M: Mailer,
{
    pub fn new(
        registry: R,
        baselines: B,
        state: S,
        mailer: M,
        queue: TestQueue,
        config: MonitorConfig,
    ) -> Self {
        Self {
            registry,
            baselines,
            state,
            mailer,
            queue,
            config,
        }
    }

    /// Tests every model that is due on `today` and reports to its owner.
    ///
    /// A model's own problems never stop the pass; they are logged, counted in
    /// the summary and, if configured, reported to the owner.
    ///
    /// # Errors
    ///
    /// Returns an error only if the list of models cannot be loaded.
    pub async fn run_pass(&self, today: NaiveDate) -> Result<PassSummary, MonitorError> {
        let records = self
            .timed("loading model records", self.state.load_all())
            .await?;

        info!(models = records.len(), %today, "Starting monitoring pass");

        let mut summary = PassSummary {
            models: records.len(),
            ..PassSummary::default()
        };

        for record in &records {
            self.run_cycle(record, today, &mut summary).await;
        }

        info!(?summary, "Monitoring pass finished");
        Ok(summary)
    }

    async fn run_cycle(&self, record: &ModelRecord, today: NaiveDate, summary: &mut PassSummary) {
        let name = record.name.as_str();

        if !is_due(record.last_tested_date, record.test_frequency_days, today) {
            debug!(
                model = name,
                last_tested = %record.last_tested_date,
                frequency_days = record.test_frequency_days,
                "Model is not due"
            );
            summary.not_due += 1;
            return;
        }

        debug!(model = name, "Testing model");

        let (outcome, consumed) = match self.test_model(name).await {
            Ok(result) => result,
            Err(e) => {
                error!(model = name, error = %e, "Model could not be tested");
                summary.faults += 1;
                (TestOutcome::Fault { reason: e.to_string() }, None)
            }
        };

        match &outcome {
            TestOutcome::NoData { .. } => summary.no_data += 1,
            TestOutcome::SchemaMismatch { .. } => summary.schema_mismatch += 1,
            TestOutcome::Scored {
                verdict: Verdict::Pass,
                ..
            } => summary.passed += 1,
            TestOutcome::Scored {
                verdict: Verdict::Fail,
                ..
            } => summary.failed += 1,
            TestOutcome::Fault { .. } => {}
        }

        let notify = !matches!(outcome, TestOutcome::Fault { .. }) || self.config.notify_on_fault;
        if notify {
            let report = Report::render(name, &outcome);
            info!(model = name, subject = %report.subject, "Sending report to model owner");

            if let Err(e) = self
                .timed("mail delivery", self.mailer.send(&record.owner_email, &report))
                .await
            {
                warn!(model = name, error = %e, "Report could not be delivered");
                summary.delivery_failures += 1;
            }
        }

        if let Some(file) = consumed
            && let Err(e) = self.queue.consume(&file)
        {
            error!(model = name, file = %file.display(), error = %e, "Scored test file could not be removed");
            summary.faults += 1;
        }

        if let Err(e) = self
            .timed("state update", self.state.update_last_tested(name, today))
            .await
        {
            error!(model = name, error = %e, "Last tested date could not be updated");
            summary.state_update_failures += 1;
        }
    }

    /// Resolves, loads and scores one model. Returns the file to consume once
    /// the outcome has been reported.
    async fn test_model(
        &self,
        name: &str,
    ) -> Result<(TestOutcome, Option<PathBuf>), MonitorError> {
        let handle = self
            .timed("registry lookup", self.registry.latest(name))
            .await?;

        let data = match self.queue.resolve(name, &handle.schema)? {
            DataResolution::NoData => {
                info!(model = name, "No pending test data");
                let outcome = TestOutcome::NoData {
                    inbox: self.queue.inbox(name)?,
                    schema: handle.schema,
                };
                return Ok((outcome, None));
            }
            DataResolution::SchemaMismatch(mismatch) => {
                let outcome = TestOutcome::SchemaMismatch {
                    inbox: self.queue.inbox(name)?,
                    schema: handle.schema,
                    mismatch,
                };
                return Ok((outcome, None));
            }
            DataResolution::Ready(data) => data,
        };

        let predictor = self
            .timed("predictor load", self.registry.load_predictor(&handle))
            .await?;
        let mae = score(predictor.as_ref(), &data.features, &data.targets)?;

        let baseline = self
            .timed("baseline lookup", self.baselines.baseline(name))
            .await?;
        let verdict = Verdict::from_metrics(mae, baseline);

        info!(
            model = name,
            version = handle.version,
            mae,
            baseline,
            %verdict,
            "Model scored"
        );

        Ok((
            TestOutcome::Scored {
                mae,
                baseline,
                verdict,
            },
            Some(data.file),
        ))
    }

    async fn timed<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, MonitorError>>,
    ) -> Result<T, MonitorError> {
        let after = self.config.call_timeout;
        tokio::time::timeout(after, call)
            .await
            .map_err(|_| MonitorError::Timeout { operation, after })?
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;
    use std::collections::HashMap;
    use std::fs::File;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use std::time::SystemTime;

    use async_trait::async_trait;
    use model_structs::ModelSchema;
    use predictor::{Predictor, SymbolicModel, SymbolicModelArtifact};
    use tempfile::TempDir;

    use super::super::ModelHandle;
    use super::*;

    const OWNER: &str = "owner@example.com";

    #[derive(Clone, Default)]
    struct FakeRegistry {
        equations: HashMap<String, String>,
        delay: Option<Duration>,
    }

    impl FakeRegistry {
        fn with(mut self, name: &str, equation: &str) -> Self {
            self.equations.insert(name.to_string(), equation.to_string());
            self
        }
    }

    fn schema() -> ModelSchema {
        ModelSchema {
            features: "Temperature".parse().unwrap(),
            targets: "Sales".parse().unwrap(),
        }
    }

    #[async_trait]
    impl ModelRegistry for FakeRegistry {
        async fn latest(&self, name: &str) -> Result<ModelHandle, MonitorError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if !self.equations.contains_key(name) {
                return Err(MonitorError::ModelNotFound(name.to_string()));
            }
            Ok(ModelHandle {
                name: name.to_string(),
                version: 1,
                schema: schema(),
                artifact_path: format!("{name}/1/model.json"),
            })
        }

        async fn load_predictor(
            &self,
            handle: &ModelHandle,
        ) -> Result<Box<dyn Predictor>, MonitorError> {
            let artifact = SymbolicModelArtifact {
                equations: vec![self.equations[&handle.name].clone()],
            };
            Ok(Box::new(SymbolicModel::from_artifact(
                &artifact,
                handle.schema.clone(),
            )?))
        }
    }

    #[derive(Clone, Default)]
    struct FakeBaselines(HashMap<String, f64>);

    #[async_trait]
    impl BaselineStore for FakeBaselines {
        async fn baseline(&self, model_name: &str) -> Result<f64, MonitorError> {
            self.0
                .get(model_name)
                .copied()
                .ok_or_else(|| MonitorError::BaselineNotFound(model_name.to_string()))
        }
    }

    #[derive(Clone, Default)]
    struct FakeState {
        records: Arc<Mutex<Vec<ModelRecord>>>,
        unavailable: bool,
    }

    impl FakeState {
        fn last_tested(&self, name: &str) -> NaiveDate {
            self.records
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.name == name)
                .unwrap()
                .last_tested_date
        }
    }

    #[async_trait]
    impl StateTracker for FakeState {
        async fn load_all(&self) -> Result<Vec<ModelRecord>, MonitorError> {
            if self.unavailable {
                return Err(MonitorError::Database(sqlx::Error::PoolClosed));
            }
            Ok(self.records.lock().unwrap().clone())
        }

        async fn update_last_tested(
            &self,
            model_name: &str,
            date: NaiveDate,
        ) -> Result<(), MonitorError> {
            let mut records = self.records.lock().unwrap();
            let record = records
                .iter_mut()
                .find(|r| r.name == model_name)
                .ok_or_else(|| MonitorError::RecordNotFound(model_name.to_string()))?;
            record.last_tested_date = record.last_tested_date.max(date);
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct FakeMailer {
        sent: Arc<Mutex<Vec<(String, Report)>>>,
        broken: bool,
    }

    impl FakeMailer {
        fn sent(&self) -> Vec<(String, Report)> {
            self.sent.lock().unwrap().clone()
        }

        fn subjects(&self) -> Vec<String> {
            self.sent().into_iter().map(|(_, r)| r.subject).collect()
        }
    }

    #[async_trait]
    impl Mailer for FakeMailer {
        async fn send(&self, to: &str, report: &Report) -> Result<(), MonitorError> {
            if self.broken {
                return Err(MonitorError::Mail("connection refused".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), report.clone()));
            Ok(())
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
    }

    fn record(name: &str, days_ago: i64) -> ModelRecord {
        ModelRecord {
            name: name.to_string(),
            owner_email: OWNER.to_string(),
            test_frequency_days: 7,
            last_tested_date: today() - chrono::Duration::days(days_ago),
        }
    }

    fn state(records: Vec<ModelRecord>) -> FakeState {
        FakeState {
            records: Arc::new(Mutex::new(records)),
            unavailable: false,
        }
    }

    fn baselines(entries: &[(&str, f64)]) -> FakeBaselines {
        FakeBaselines(
            entries
                .iter()
                .map(|(name, value)| ((*name).to_string(), *value))
                .collect(),
        )
    }

    /// Writes a test file whose `Sales` column sits 4 above `Temperature`.
    fn write_test_file(root: &Path, model: &str, file: &str, mtime_secs: u64) -> PathBuf {
        let inbox = root.join(model);
        std::fs::create_dir_all(&inbox).unwrap();
        let path = inbox.join(file);
        std::fs::write(&path, "Temperature,Sales\n10,14\n20,24\n30,34\n").unwrap();
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(mtime_secs))
            .unwrap();
        path
    }

    fn monitor(
        dir: &TempDir,
        registry: FakeRegistry,
        baselines: FakeBaselines,
        state: FakeState,
        mailer: FakeMailer,
    ) -> Monitor<FakeRegistry, FakeBaselines, FakeState, FakeMailer> {
        Monitor::new(
            registry,
            baselines,
            state,
            mailer,
            TestQueue::new(dir.path()),
            MonitorConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_due_model_passes_and_consumes_file() {
        let dir = TempDir::new().unwrap();
        let file = write_test_file(dir.path(), "sales_model", "week1.csv", 1_000);
        let state = state(vec![record("sales_model", 8)]);
        let mailer = FakeMailer::default();

        let summary = monitor(
            &dir,
            FakeRegistry::default().with("sales_model", "x0"),
            baselines(&[("sales_model", 5.0)]),
            state.clone(),
            mailer.clone(),
        )
        .run_pass(today())
        .await
        .unwrap();

        assert_eq!(summary.passed, 1);
        assert!(!summary.has_errors());

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, OWNER);
        assert_eq!(sent[0].1.subject, "Your model passed the test");
        assert!(sent[0].1.body.contains("Original mean absolute error (MAE): 5"));
        assert!(sent[0].1.body.contains("MAE with the latest test: 4"));

        assert_eq!(state.last_tested("sales_model"), today());
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn test_failing_model_is_reported() {
        let dir = TempDir::new().unwrap();
        write_test_file(dir.path(), "sales_model", "week1.csv", 1_000);
        let mailer = FakeMailer::default();

        let summary = monitor(
            &dir,
            FakeRegistry::default().with("sales_model", "x0"),
            baselines(&[("sales_model", 3.0)]),
            state(vec![record("sales_model", 8)]),
            mailer.clone(),
        )
        .run_pass(today())
        .await
        .unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(mailer.subjects(), vec!["Your model failed the test"]);
    }

    #[tokio::test]
    async fn test_empty_inbox_reports_no_data_and_advances_date() {
        let dir = TempDir::new().unwrap();
        let state = state(vec![record("sales_model", 8)]);
        let mailer = FakeMailer::default();

        let summary = monitor(
            &dir,
            FakeRegistry::default().with("sales_model", "x0"),
            baselines(&[("sales_model", 5.0)]),
            state.clone(),
            mailer.clone(),
        )
        .run_pass(today())
        .await
        .unwrap();

        assert_eq!(summary.no_data, 1);
        assert_eq!(
            mailer.subjects(),
            vec!["Mathfinder did not find your test data"]
        );
        assert_eq!(state.last_tested("sales_model"), today());
    }

    #[tokio::test]
    async fn test_schema_mismatch_keeps_file() {
        let dir = TempDir::new().unwrap();
        let inbox = dir.path().join("sales_model");
        std::fs::create_dir_all(&inbox).unwrap();
        let file = inbox.join("week1.csv");
        std::fs::write(&file, "Temperature,Revenue\n10,14\n").unwrap();

        let state = state(vec![record("sales_model", 8)]);
        let mailer = FakeMailer::default();

        let summary = monitor(
            &dir,
            FakeRegistry::default().with("sales_model", "x0"),
            baselines(&[("sales_model", 5.0)]),
            state.clone(),
            mailer.clone(),
        )
        .run_pass(today())
        .await
        .unwrap();

        assert_eq!(summary.schema_mismatch, 1);
        assert_eq!(
            mailer.subjects(),
            vec!["Mathfinder could not use your test data"]
        );
        assert!(file.exists());
        assert_eq!(state.last_tested("sales_model"), today());
    }

    #[tokio::test]
    async fn test_model_not_due_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let file = write_test_file(dir.path(), "sales_model", "week1.csv", 1_000);
        let state = state(vec![record("sales_model", 7)]);
        let mailer = FakeMailer::default();

        let summary = monitor(
            &dir,
            FakeRegistry::default().with("sales_model", "x0"),
            baselines(&[("sales_model", 5.0)]),
            state.clone(),
            mailer.clone(),
        )
        .run_pass(today())
        .await
        .unwrap();

        assert_eq!(summary.not_due, 1);
        assert!(mailer.sent().is_empty());
        assert!(file.exists());
        assert_eq!(state.last_tested("sales_model"), today() - chrono::Duration::days(7));
    }

    #[tokio::test]
    async fn test_fault_in_one_model_does_not_stop_others() {
        let dir = TempDir::new().unwrap();
        let first = write_test_file(dir.path(), "first", "a.csv", 1_000);
        let third = write_test_file(dir.path(), "third", "a.csv", 1_000);
        let second = write_test_file(dir.path(), "second", "a.csv", 1_000);

        let state = state(vec![
            record("first", 8),
            record("second", 8),
            record("third", 8),
        ]);
        let mailer = FakeMailer::default();

        let summary = monitor(
            &dir,
            FakeRegistry::default()
                .with("first", "x0")
                .with("third", "x0 + 4"),
            baselines(&[("first", 5.0), ("third", 5.0)]),
            state.clone(),
            mailer.clone(),
        )
        .run_pass(today())
        .await
        .unwrap();

        assert_eq!(summary.passed, 2);
        assert_eq!(summary.faults, 1);
        assert!(summary.has_errors());

        assert_eq!(
            mailer.subjects(),
            vec![
                "Your model passed the test",
                "Mathfinder could not test your model",
                "Your model passed the test",
            ]
        );
        assert!(!first.exists());
        assert!(second.exists());
        assert!(!third.exists());
        for name in ["first", "second", "third"] {
            assert_eq!(state.last_tested(name), today());
        }
    }

    #[tokio::test]
    async fn test_fault_mail_can_be_disabled() {
        let dir = TempDir::new().unwrap();
        let mailer = FakeMailer::default();

        let monitor = Monitor::new(
            FakeRegistry::default(),
            FakeBaselines::default(),
            state(vec![record("missing", 8)]),
            mailer.clone(),
            TestQueue::new(dir.path()),
            MonitorConfig {
                notify_on_fault: false,
                ..MonitorConfig::default()
            },
        );

        let summary = monitor.run_pass(today()).await.unwrap();

        assert_eq!(summary.faults, 1);
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_missing_baseline_keeps_file() {
        let dir = TempDir::new().unwrap();
        let file = write_test_file(dir.path(), "sales_model", "week1.csv", 1_000);
        let mailer = FakeMailer::default();

        let summary = monitor(
            &dir,
            FakeRegistry::default().with("sales_model", "x0"),
            FakeBaselines::default(),
            state(vec![record("sales_model", 8)]),
            mailer.clone(),
        )
        .run_pass(today())
        .await
        .unwrap();

        assert_eq!(summary.faults, 1);
        assert!(file.exists());
        assert!(mailer.sent()[0].1.body.contains("no baseline metric"));
    }

    #[tokio::test]
    async fn test_non_finite_predictions_are_a_fault() {
        let dir = TempDir::new().unwrap();
        let file = write_test_file(dir.path(), "sales_model", "week1.csv", 1_000);
        let state = state(vec![record("sales_model", 8)]);
        let mailer = FakeMailer::default();

        let summary = monitor(
            &dir,
            FakeRegistry::default().with("sales_model", "log(x0 - 100)"),
            baselines(&[("sales_model", 5.0)]),
            state.clone(),
            mailer.clone(),
        )
        .run_pass(today())
        .await
        .unwrap();

        assert_eq!(summary.faults, 1);
        assert_eq!(summary.failed, 0);
        assert!(file.exists());
        assert_eq!(mailer.subjects(), vec!["Mathfinder could not test your model"]);
        assert!(mailer.sent()[0].1.body.contains("non-finite"));
        assert_eq!(state.last_tested("sales_model"), today());
    }

    #[tokio::test]
    async fn test_delivery_failure_still_completes_cycle() {
        let dir = TempDir::new().unwrap();
        let file = write_test_file(dir.path(), "sales_model", "week1.csv", 1_000);
        let state = state(vec![record("sales_model", 8)]);

        let summary = monitor(
            &dir,
            FakeRegistry::default().with("sales_model", "x0"),
            baselines(&[("sales_model", 5.0)]),
            state.clone(),
            FakeMailer {
                broken: true,
                ..FakeMailer::default()
            },
        )
        .run_pass(today())
        .await
        .unwrap();

        assert_eq!(summary.passed, 1);
        assert_eq!(summary.delivery_failures, 1);
        assert!(summary.has_errors());
        assert!(!file.exists());
        assert_eq!(state.last_tested("sales_model"), today());
    }

    #[tokio::test]
    async fn test_oldest_file_is_consumed_first() {
        let dir = TempDir::new().unwrap();
        let newer = write_test_file(dir.path(), "sales_model", "a_newer.csv", 2_000);
        let older = write_test_file(dir.path(), "sales_model", "z_older.csv", 1_000);

        monitor(
            &dir,
            FakeRegistry::default().with("sales_model", "x0"),
            baselines(&[("sales_model", 5.0)]),
            state(vec![record("sales_model", 8)]),
            FakeMailer::default(),
        )
        .run_pass(today())
        .await
        .unwrap();

        assert!(!older.exists());
        assert!(newer.exists());
    }

    #[tokio::test]
    async fn test_slow_registry_times_out() {
        let dir = TempDir::new().unwrap();
        let mailer = FakeMailer::default();

        let monitor = Monitor::new(
            FakeRegistry {
                delay: Some(Duration::from_secs(5)),
                ..FakeRegistry::default().with("sales_model", "x0")
            },
            baselines(&[("sales_model", 5.0)]),
            state(vec![record("sales_model", 8)]),
            mailer.clone(),
            TestQueue::new(dir.path()),
            MonitorConfig {
                call_timeout: Duration::from_millis(20),
                notify_on_fault: true,
            },
        );

        let summary = monitor.run_pass(today()).await.unwrap();

        assert_eq!(summary.faults, 1);
        assert!(mailer.sent()[0].1.body.contains("timed out"));
    }

    #[tokio::test]
    async fn test_unavailable_state_store_aborts_pass() {
        let dir = TempDir::new().unwrap();

        let result = monitor(
            &dir,
            FakeRegistry::default(),
            FakeBaselines::default(),
            FakeState {
                unavailable: true,
                ..FakeState::default()
            },
            FakeMailer::default(),
        )
        .run_pass(today())
        .await;

        assert!(matches!(result, Err(MonitorError::Database(_))));
    }
}
