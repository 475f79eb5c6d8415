use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// パイプラインのステージ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// リポジトリ同期
    RepositorySync,
    /// アセット取得スクリプト
    AssetFetch,
    /// ディレクトリのミラーリング
    DirectoryMirror,
    /// 再起動アナウンス（非同期）
    Restart,
}

impl Stage {
    /// 呼び出し元に返すエラーメッセージで使うラベル
    pub fn label(&self) -> &'static str {
        match self {
            Self::RepositorySync => "repo sync",
            Self::AssetFetch => "plugin download",
            Self::DirectoryMirror => "data sync",
            Self::Restart => "restart",
        }
    }

    /// ログの`stage`フィールドに使う名前
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RepositorySync => "repository_sync",
            Self::AssetFetch => "asset_fetch",
            Self::DirectoryMirror => "directory_mirror",
            Self::Restart => "restart",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// ステージの結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum StageOutcome {
    /// 成功（詳細付き）
    Succeeded(String),
    /// 設定により実行しなかった
    Skipped,
    /// 失敗（エラー内容）
    Failed(String),
}

impl StageOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// 1ステージ分の記録
#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub outcome: StageOutcome,
    pub elapsed: Duration,
}

/// 1回のトリガーに対応する実行記録
///
/// 同期部分が終わった時点で呼び出し元に返される。再起動ステージはこの記録より長く生存しうる。
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    run_id: u64,
    started_at: DateTime<Utc>,
    stages: Vec<StageRecord>,
    reached_restart: bool,
}

impl PipelineRun {
    /// 新しい実行記録を作成
    pub fn new(run_id: u64) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            stages: Vec::new(),
            reached_restart: false,
        }
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn stages(&self) -> &[StageRecord] {
        &self.stages
    }

    pub fn reached_restart(&self) -> bool {
        self.reached_restart
    }

    /// ステージの結果を追加
    pub fn record(&mut self, stage: Stage, outcome: StageOutcome, elapsed: Duration) {
        self.stages.push(StageRecord {
            stage,
            outcome,
            elapsed,
        });
    }

    /// 再起動ステージが起動されたことを記録
    pub fn mark_restart_launched(&mut self) {
        self.reached_restart = true;
    }

    /// 実行されたステージを順に返す
    pub fn stage_sequence(&self) -> Vec<Stage> {
        self.stages.iter().map(|record| record.stage).collect()
    }

    /// 最初に失敗したステージ
    pub fn failed_stage(&self) -> Option<Stage> {
        self.stages
            .iter()
            .find(|record| record.outcome.is_failure())
            .map(|record| record.stage)
    }
}
