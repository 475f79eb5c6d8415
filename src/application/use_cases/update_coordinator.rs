use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::common::error::MgrError;
use crate::common::result::MgrResult;
use crate::domain::entities::{PipelineConfig, PipelineRun, RestartFencing, Stage, StageOutcome};
use crate::domain::value_objects::{DirectorySelection, Messages};
use crate::infrastructure::filesystem::FsDirectoryMirror;
use crate::infrastructure::git::GitRepositorySyncer;
use crate::infrastructure::process::ScriptAssetFetcher;
use crate::infrastructure::rcon::RconRestartAnnouncer;
use crate::infrastructure::stage_interface::{
    AssetFetcher, DirectoryMirror, RepositorySyncer, RestartAnnouncer, RestartError, RestartPlan,
};

/// コーディネーターに注入するステージ実装一式
#[derive(Clone)]
pub struct UpdateStages {
    pub syncer: Arc<dyn RepositorySyncer>,
    pub fetcher: Arc<dyn AssetFetcher>,
    pub mirror: Arc<dyn DirectoryMirror>,
    pub announcer: Arc<dyn RestartAnnouncer>,
}

impl UpdateStages {
    /// 本番用の実装（git2・bash・ファイルシステム・RCON）
    pub fn production() -> Self {
        Self {
            syncer: Arc::new(GitRepositorySyncer::new()),
            fetcher: Arc::new(ScriptAssetFetcher::new()),
            mirror: Arc::new(FsDirectoryMirror::new()),
            announcer: Arc::new(RconRestartAnnouncer::new()),
        }
    }
}

/// 更新トリガーのリクエスト
#[derive(Debug, Clone, Default)]
pub struct TriggerRequest {
    /// リクエストに付与された共有シークレット
    pub credential: Option<String>,

    /// ログ用の送信元（IPアドレスなど）
    pub origin: Option<String>,
}

impl TriggerRequest {
    pub fn new(credential: Option<String>) -> Self {
        Self {
            credential,
            origin: None,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

/// 受理されたトリガーの結果
///
/// 同期ステージはすべて成功しており、再起動は起動済みだが完了はしていない。
#[derive(Debug)]
pub struct TriggerAccepted {
    pub run: PipelineRun,
    pub restart: RestartHandle,
}

/// 切り離して実行される再起動タスクのハンドル
///
/// ドロップしてもタスクは継続する。
#[derive(Debug)]
pub struct RestartHandle {
    handle: JoinHandle<Result<(), RestartError>>,
}

impl RestartHandle {
    /// 再起動シーケンスの完了を待つ
    pub async fn wait(self) -> MgrResult<()> {
        match self.handle.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(MgrError::restart_error(e)),
            Err(e) => Err(e.into()),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// ハンドルを手放す（タスクはそのまま実行される）
    pub fn detach(self) {}
}

/// 実行中の再起動タスク数を数えるガード
struct InFlightRestart(Arc<AtomicUsize>);

impl InFlightRestart {
    fn enter(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlightRestart {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 更新パイプラインのコーディネーター
///
/// 認可チェック → 同期ロック取得 → リポジトリ同期 → アセット取得（有効時のみ）
/// → ディレクトリのミラーリング → 再起動（切り離し）の順に実行する。
/// 同期ステージが1つでも失敗した時点で中断し、再起動は起動しない。
pub struct UpdateCoordinator {
    config: Arc<PipelineConfig>,
    selection: DirectorySelection,
    messages: Messages,
    stages: UpdateStages,
    sync_lock: Arc<Mutex<()>>,
    restarts_in_flight: Arc<AtomicUsize>,
    next_run_id: AtomicU64,
}

impl UpdateCoordinator {
    /// 新しいコーディネーターを作成
    ///
    /// ディレクトリ選択とメッセージはここで1度だけ解決する。
    pub fn new(config: PipelineConfig, stages: UpdateStages) -> Self {
        let selection = DirectorySelection::resolve(&config.copy_dirs, &config.skip_dirs);
        let messages = Messages::select(&config.locale);

        Self {
            config: Arc::new(config),
            selection,
            messages,
            stages,
            sync_lock: Arc::new(Mutex::new(())),
            restarts_in_flight: Arc::new(AtomicUsize::new(0)),
            next_run_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn selection(&self) -> &DirectorySelection {
        &self.selection
    }

    pub fn messages(&self) -> Messages {
        self.messages
    }

    /// 実行中の再起動タスク数
    pub fn restarts_in_flight(&self) -> usize {
        self.restarts_in_flight.load(Ordering::SeqCst)
    }

    /// 共有シークレットの照合（未設定なら常に許可）
    pub fn is_authorized(&self, credential: Option<&str>) -> bool {
        match self.config.secret_token.as_deref() {
            None => true,
            Some(expected) => credential
                .map(|given| tokens_match(given.as_bytes(), expected.as_bytes()))
                .unwrap_or(false),
        }
    }

    /// 更新パイプラインを実行
    ///
    /// 認可に失敗した場合はロックもステージも一切触らずに`Unauthorized`を返す。
    /// 同時に来たトリガーはロックの解放まで待機する。
    pub async fn trigger(&self, request: TriggerRequest) -> MgrResult<TriggerAccepted> {
        let origin = request.origin.as_deref().unwrap_or("unknown");

        if !self.is_authorized(request.credential.as_deref()) {
            warn!(origin, "unauthorized update request");
            return Err(MgrError::Unauthorized);
        }

        let run_id = self.next_run_id.fetch_add(1, Ordering::Relaxed);
        self.run_pipeline(run_id, origin)
            .instrument(info_span!("update", run_id))
            .await
    }

    async fn run_pipeline(&self, run_id: u64, origin: &str) -> MgrResult<TriggerAccepted> {
        let guard = Arc::clone(&self.sync_lock).lock_owned().await;
        info!(origin, "received update request");

        let in_flight = self.restarts_in_flight();
        if in_flight > 0 {
            info!(restarts_in_flight = in_flight, "previous restart countdown still running");
        }

        let mut run = PipelineRun::new(run_id);
        self.run_sync_stages(&mut run).await?;

        let restart = self.launch_restart(run_id, guard);
        run.mark_restart_launched();
        info!("update applied; restart scheduled");

        Ok(TriggerAccepted { run, restart })
    }

    async fn run_sync_stages(&self, run: &mut PipelineRun) -> MgrResult<()> {
        let config = &self.config;

        run_stage(
            run,
            Stage::RepositorySync,
            self.stages
                .syncer
                .sync(&config.repo_path, &config.repo_url, &config.repo_branch),
        )
        .await?;

        if config.plugins_download {
            run_stage(
                run,
                Stage::AssetFetch,
                self.stages.fetcher.fetch(&config.repo_path),
            )
            .await?;
        } else {
            debug!(stage = Stage::AssetFetch.as_str(), outcome = "skipped", "asset fetch disabled");
            run.record(Stage::AssetFetch, StageOutcome::Skipped, Duration::ZERO);
        }

        run_stage(
            run,
            Stage::DirectoryMirror,
            self.stages.mirror.mirror(
                &config.repo_path,
                &config.data_dir,
                &self.selection,
                config.owner_id,
            ),
        )
        .await?;

        Ok(())
    }

    /// 再起動タスクを切り離して起動する
    ///
    /// `Overlap`では起動直後にロックを解放し、`Exclusive`ではタスク完了まで保持する。
    fn launch_restart(&self, run_id: u64, guard: OwnedMutexGuard<()>) -> RestartHandle {
        let plan = RestartPlan {
            address: self.config.console_address(),
            password: self.config.rcon_password.clone(),
            messages: self.messages,
            restart_command: self.config.restart_command.clone(),
            countdown_wait: self.config.countdown_wait,
            countdown_tick: self.config.countdown_tick,
        };

        let (held, released) = match self.config.restart_fencing {
            RestartFencing::Exclusive => (Some(guard), None),
            RestartFencing::Overlap => (None, Some(guard)),
        };

        let announcer = Arc::clone(&self.stages.announcer);
        let in_flight = InFlightRestart::enter(Arc::clone(&self.restarts_in_flight));
        let span = info_span!("restart", run_id, stage = Stage::Restart.as_str());

        let handle = tokio::spawn(
            async move {
                let _in_flight = in_flight;
                let _sync_guard = held;

                let started = Instant::now();
                let result = announcer.announce(&plan).await;
                match &result {
                    Ok(()) => info!(
                        outcome = "succeeded",
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "restart sequence finished"
                    ),
                    Err(e) => error!(outcome = "failed", error = %e, "restart failed"),
                }
                result
            }
            .instrument(span),
        );

        drop(released);
        RestartHandle { handle }
    }
}

/// 1ステージを実行し、結果を記録してエラーをステージ付きで返す
async fn run_stage<T, E, F>(run: &mut PipelineRun, stage: Stage, work: F) -> MgrResult<T>
where
    F: Future<Output = Result<T, E>>,
    T: Display,
    E: std::error::Error + Send + Sync + 'static,
{
    let span = info_span!("stage", stage = stage.as_str());
    let started = Instant::now();
    let result = work.instrument(span.clone()).await;
    let elapsed = started.elapsed();

    match result {
        Ok(value) => {
            span.in_scope(|| {
                info!(
                    outcome = "succeeded",
                    elapsed_ms = elapsed.as_millis() as u64,
                    "{}",
                    value
                )
            });
            run.record(stage, StageOutcome::Succeeded(value.to_string()), elapsed);
            Ok(value)
        }
        Err(e) => {
            span.in_scope(|| error!(outcome = "failed", error = %e, "{} failed", stage));
            run.record(stage, StageOutcome::Failed(e.to_string()), elapsed);
            Err(MgrError::stage_error(stage, e))
        }
    }
}

/// 長さ以外の情報を比較時間から漏らさないトークン比較
fn tokens_match(given: &[u8], expected: &[u8]) -> bool {
    if given.len() != expected.len() {
        return false;
    }
    given
        .iter()
        .zip(expected)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
