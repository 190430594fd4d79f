//! Sequencer - パイプラインの状態機械
//!
//! # 状態遷移
//! - Idle -> Rendered -> Applied -> TopologyCaptured -> InventoryReady -> Configured
//! - どのステージが失敗しても Failed に遷移し、後続ステージは実行しない
//! - 順序外の呼び出しは Precondition エラー（Failed に遷移）
//!
//! 各ステージは必ず 1 つの StageResult を記録する。

use tracing::{Instrument, debug, info, info_span, warn};

use crate::domain::{
    PipelineReport, PipelineState, ProvisionError, ProvisioningParameters, RunId, SshCredentials,
    Stage, StageResult, Topology,
};

use super::builder::PipelineContext;
use super::stages;

pub struct Sequencer {
    ctx: PipelineContext,
    run_id: RunId,
    state: PipelineState,
    results: Vec<StageResult>,
    expected_replicas: Option<usize>,
    topology: Option<Topology>,
}

impl Sequencer {
    pub fn new(ctx: PipelineContext, run_id: RunId) -> Self {
        Self {
            ctx,
            run_id,
            state: PipelineState::Idle,
            results: Vec::new(),
            expected_replicas: None,
            topology: None,
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn results(&self) -> &[StageResult] {
        &self.results
    }

    pub fn topology(&self) -> Option<&Topology> {
        self.topology.as_ref()
    }

    /// Idle -> Rendered
    pub async fn render(&mut self, params: &ProvisioningParameters) -> Result<(), ProvisionError> {
        self.begin(Stage::Rendered)?;
        let result = stages::render(&self.ctx, params).await;
        let record =
            StageResult::from_result(Stage::Rendered, &result, |r| stages::render_result(&self.ctx, r));
        self.record(record);
        result?;
        self.expected_replicas = usize::try_from(params.replica_count).ok();
        Ok(())
    }

    /// Rendered -> Applied
    pub async fn apply_infrastructure(&mut self) -> Result<(), ProvisionError> {
        self.begin(Stage::Applied)?;
        let result = stages::apply(&self.ctx).await;
        let record =
            StageResult::from_result(Stage::Applied, &result, |r| stages::apply_result(&self.ctx, r));
        self.record(record);
        result.map(|_| ())
    }

    /// Applied -> TopologyCaptured
    ///
    /// The captured replica count must match what was rendered.
    pub async fn capture_topology(&mut self) -> Result<(), ProvisionError> {
        self.begin(Stage::TopologyCaptured)?;
        let expected = self.expected_replicas;
        let result = stages::capture_topology(&self.ctx)
            .await
            .and_then(|topology| match expected {
                Some(n) => topology.ensure_replica_count(n).map(|()| topology),
                None => Ok(topology),
            });
        self.record(StageResult::from_result(
            Stage::TopologyCaptured,
            &result,
            stages::topology_result,
        ));
        self.topology = Some(result?);
        Ok(())
    }

    /// TopologyCaptured -> InventoryReady
    pub async fn build_inventory(&mut self, credentials: &SshCredentials) -> Result<(), ProvisionError> {
        self.begin(Stage::InventoryReady)?;
        let result = match &self.topology {
            Some(topology) => stages::write_inventory(&self.ctx, topology, credentials).await,
            None => Err(ProvisionError::precondition("no topology captured")),
        };
        let record = StageResult::from_result(Stage::InventoryReady, &result, |r| {
            stages::inventory_result(&self.ctx, r)
        });
        self.record(record);
        result.map(|_| ())
    }

    /// InventoryReady -> Configured
    pub async fn configure(&mut self) -> Result<(), ProvisionError> {
        self.begin(Stage::Configured)?;
        let result = stages::configure(&self.ctx).await;
        self.record(StageResult::from_result(
            Stage::Configured,
            &result,
            stages::configure_result,
        ));
        result.map(|_| ())
    }

    /// Run every stage in order, stopping at the first failure.
    pub async fn run(
        mut self,
        params: &ProvisioningParameters,
        credentials: &SshCredentials,
    ) -> PipelineReport {
        let span = info_span!("pipeline", run_id = %self.run_id);
        async {
            info!(namespace = self.ctx.store.namespace(), "pipeline starting");
            if let Err(err) = self.drive(params, credentials).await {
                debug!(error = %err, "pipeline halted");
            }
            info!(state = %self.state, "pipeline finished");
        }
        .instrument(span)
        .await;
        self.into_report()
    }

    async fn drive(
        &mut self,
        params: &ProvisioningParameters,
        credentials: &SshCredentials,
    ) -> Result<(), ProvisionError> {
        self.render(params).await?;
        self.apply_infrastructure().await?;
        self.capture_topology().await?;
        self.build_inventory(credentials).await?;
        self.configure().await
    }

    pub fn into_report(self) -> PipelineReport {
        PipelineReport {
            run_id: self.run_id,
            namespace: self.ctx.store.namespace().to_string(),
            final_state: self.state,
            stages: self.results,
        }
    }

    fn begin(&mut self, stage: Stage) -> Result<(), ProvisionError> {
        let required = stage.requires();
        if self.state == required {
            debug!(%stage, "stage starting");
            return Ok(());
        }
        let err = ProvisionError::precondition(format!(
            "stage {stage} requires state {required}, pipeline is {}",
            self.state
        ));
        // 終端状態（Configured / Failed）は上書きしない
        if self.state.is_terminal() {
            self.results.push(StageResult::failure(stage, &err));
            warn!(%stage, state = %self.state, "stage rejected");
        } else {
            self.record(StageResult::failure(stage, &err));
        }
        Err(err)
    }

    fn record(&mut self, result: StageResult) {
        match &result {
            StageResult::Success { stage, .. } => {
                info!(%stage, "stage succeeded");
                self.state = stage.reaches();
            }
            StageResult::Failure {
                stage, kind, cause, ..
            } => {
                warn!(%stage, %kind, %cause, "stage failed");
                self.state = PipelineState::Failed {
                    at_state: *stage,
                    kind: *kind,
                    cause: cause.clone(),
                };
            }
        }
        self.results.push(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::builder::PipelineBuilder;
    use crate::app::config::PipelineConfig;
    use crate::domain::{Artifact, ArtifactName, ErrorKind};
    use crate::impls::scripted::{Reply, ScriptedRunner};
    use std::sync::Arc;

    const OUTPUTS: &str = r#"{
      "primary_postgresql_ip": { "sensitive": false, "type": "string", "value": "10.0.0.5" },
      "replica_postgresql_ips": { "sensitive": false, "type": ["tuple", ["string"]], "value": ["10.0.0.6"] }
    }"#;

    struct Harness {
        dir: tempfile::TempDir,
        runner: Arc<ScriptedRunner>,
    }

    impl Harness {
        fn new(runner: ScriptedRunner) -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
                runner: Arc::new(runner),
            }
        }

        async fn sequencer(&self) -> Sequencer {
            let config = PipelineConfig {
                work_root: self.dir.path().to_path_buf(),
                ..PipelineConfig::default()
            };
            let run_id = RunId::from_ulid(ulid::Ulid::new());
            let ctx = PipelineBuilder::new(config)
                .runner(self.runner.clone())
                .open_run(run_id)
                .await
                .unwrap();
            Sequencer::new(ctx, run_id)
        }
    }

    fn params() -> ProvisioningParameters {
        ProvisioningParameters::new("t3.micro", 1)
    }

    fn credentials() -> SshCredentials {
        SshCredentials::new("/keys/id_rsa", "ubuntu")
    }

    #[tokio::test]
    async fn full_run_reaches_configured() {
        let h = Harness::new(ScriptedRunner::new().on("output", Reply::ok(OUTPUTS)));
        let seq = h.sequencer().await;
        let namespace_dir = seq.ctx.work_dir().to_path_buf();

        let report = seq.run(&params(), &credentials()).await;

        assert!(report.succeeded(), "{report:?}");
        assert_eq!(report.final_state, PipelineState::Configured);
        let stages: Vec<Stage> = report.stages.iter().map(StageResult::stage).collect();
        assert_eq!(stages, Stage::ALL.to_vec());
        assert!(report.stages.iter().all(StageResult::is_success));
        assert_eq!(
            h.runner.call_names(),
            vec![
                "terraform init",
                "terraform plan",
                "terraform apply",
                "terraform output",
                "ansible-playbook -i",
            ]
        );

        let inventory = std::fs::read_to_string(namespace_dir.join("hosts.ini")).unwrap();
        assert_eq!(
            inventory,
            "\n[primary]\n10.0.0.5 ansible_ssh_user=ubuntu ansible_ssh_private_key_file=/keys/id_rsa\n\
             [replica]\n10.0.0.6 ansible_ssh_user=ubuntu ansible_ssh_private_key_file=/keys/id_rsa\n"
        );
        assert!(namespace_dir.join("terraform.tf").is_file());
        assert!(namespace_dir.join("postgresql_playbook.yml").is_file());
    }

    #[tokio::test]
    async fn failing_plan_halts_at_applied() {
        let h = Harness::new(
            ScriptedRunner::new()
                .on("plan", Reply::fail(1, "Error: No valid credential sources found"))
                .on("output", Reply::ok(OUTPUTS)),
        );

        let report = h.sequencer().await.run(&params(), &credentials()).await;

        assert!(matches!(
            &report.final_state,
            PipelineState::Failed {
                at_state: Stage::Applied,
                kind: ErrorKind::Provisioning,
                ..
            }
        ));
        assert_eq!(report.stages.len(), 2);
        match &report.stages[1] {
            StageResult::Failure {
                exit_code,
                stderr_excerpt,
                ..
            } => {
                assert_eq!(*exit_code, Some(1));
                assert!(stderr_excerpt.contains("No valid credential sources"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        // output / ansible は起動されない
        assert_eq!(h.runner.call_names(), vec!["terraform init", "terraform plan"]);
    }

    #[tokio::test]
    async fn invalid_parameters_fail_at_rendered_without_tools() {
        let h = Harness::new(ScriptedRunner::new());
        let report = h
            .sequencer()
            .await
            .run(&ProvisioningParameters::new("", 1), &credentials())
            .await;

        assert!(matches!(
            report.final_state,
            PipelineState::Failed {
                at_state: Stage::Rendered,
                kind: ErrorKind::Validation,
                ..
            }
        ));
        assert_eq!(report.stages.len(), 1);
        assert!(h.runner.calls().is_empty());
    }

    #[tokio::test]
    async fn replica_count_mismatch_fails_topology_capture() {
        let h = Harness::new(ScriptedRunner::new().on("output", Reply::ok(OUTPUTS)));
        let report = h
            .sequencer()
            .await
            .run(&ProvisioningParameters::new("t3.micro", 2), &credentials())
            .await;

        assert!(matches!(
            report.final_state,
            PipelineState::Failed {
                at_state: Stage::TopologyCaptured,
                kind: ErrorKind::Parse,
                ..
            }
        ));
        assert!(!h.runner.call_names().iter().any(|c| c.starts_with("ansible")));
    }

    #[tokio::test]
    async fn out_of_order_stage_is_precondition_failure() {
        let h = Harness::new(ScriptedRunner::new());
        let mut seq = h.sequencer().await;

        let err = seq.configure().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert!(matches!(
            seq.state(),
            PipelineState::Failed {
                at_state: Stage::Configured,
                kind: ErrorKind::Precondition,
                ..
            }
        ));
        assert_eq!(seq.results().len(), 1);
        assert!(h.runner.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_pipeline_rejects_further_stages_and_keeps_failure() {
        let h = Harness::new(ScriptedRunner::new().on("init", Reply::fail(1, "boom")));
        let mut seq = h.sequencer().await;

        seq.render(&params()).await.unwrap();
        seq.apply_infrastructure().await.unwrap_err();
        let before = seq.state().clone();

        let err = seq.capture_topology().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert_eq!(seq.state(), &before);
        assert_eq!(seq.results().len(), 3);
        assert_eq!(h.runner.call_names(), vec!["terraform init"]);
    }

    #[tokio::test]
    async fn stages_report_their_artifacts() {
        let h = Harness::new(ScriptedRunner::new().on("output", Reply::ok(OUTPUTS)));
        let mut seq = h.sequencer().await;

        seq.render(&params()).await.unwrap();
        seq.apply_infrastructure().await.unwrap();
        seq.capture_topology().await.unwrap();

        assert_eq!(seq.topology().unwrap().primary_address, "10.0.0.5");
        match &seq.results()[2] {
            StageResult::Success { artifacts, .. } => {
                assert!(matches!(&artifacts[0], Artifact::Json(v) if v["replica_addresses"][0] == "10.0.0.6"));
            }
            other => panic!("expected success, got {other:?}"),
        }
        match &seq.results()[0] {
            StageResult::Success { artifacts, .. } => {
                let tf = seq.ctx.store.path_of(ArtifactName::Infrastructure);
                assert_eq!(
                    artifacts[0],
                    Artifact::FilePath(tf.to_string_lossy().into_owned())
                );
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_key_file_fails_inventory_when_required() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new().on("output", Reply::ok(OUTPUTS)));
        let config = PipelineConfig {
            work_root: dir.path().to_path_buf(),
            require_key_file: true,
            ..PipelineConfig::default()
        };
        let run_id = RunId::from_ulid(ulid::Ulid::new());
        let ctx = PipelineBuilder::new(config)
            .runner(runner.clone())
            .open_run(run_id)
            .await
            .unwrap();

        let report = Sequencer::new(ctx, run_id)
            .run(
                &params(),
                &SshCredentials::new(dir.path().join("no-such-key"), "ubuntu"),
            )
            .await;

        assert!(matches!(
            report.final_state,
            PipelineState::Failed {
                at_state: Stage::InventoryReady,
                kind: ErrorKind::Validation,
                ..
            }
        ));
        assert!(!dir.path().join(run_id.to_string()).join("hosts.ini").exists());
    }
}
