use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use validator::Validate;

use crate::common::error::MgrError;
use crate::common::result::MgrResult;

/// デフォルトのブランチ名
pub const DEFAULT_BRANCH: &str = "main";
/// デフォルトのローカルリポジトリパス
pub const DEFAULT_REPO_PATH: &str = "/tmp/plugin-repo";
/// デフォルトのデータディレクトリ
pub const DEFAULT_DATA_DIR: &str = "./data";
/// デフォルトの再起動コマンド
pub const DEFAULT_RESTART_COMMAND: &str = "restart";
/// カウントダウン開始までの待機秒数
pub const DEFAULT_COUNTDOWN_WAIT_SECS: u64 = 50;
/// デフォルトのコピー対象ディレクトリ
pub const DEFAULT_COPY_DIRS: &str = "plugins";
/// デフォルトのロケール
pub const DEFAULT_LOCALE: &str = "en";

/// 再起動中の同期を許可するかどうか
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RestartFencing {
    /// 再起動タスクの起動時点でロックを解放する（カウントダウン中の新規同期を許可）
    #[default]
    Overlap,
    /// 再起動タスクの完了までロックを保持する
    Exclusive,
}

impl fmt::Display for RestartFencing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overlap => write!(f, "overlap"),
            Self::Exclusive => write!(f, "exclusive"),
        }
    }
}

impl FromStr for RestartFencing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overlap" => Ok(Self::Overlap),
            "exclusive" => Ok(Self::Exclusive),
            other => Err(format!(
                "invalid restart fencing '{}', expected 'overlap' or 'exclusive'",
                other
            )),
        }
    }
}

/// 更新パイプラインの設定（1回の実行中は不変）
#[derive(Debug, Clone, Serialize, Validate)]
pub struct PipelineConfig {
    /// 同期元リポジトリのURL
    #[validate(length(min = 1, message = "REPO_URL is required"))]
    pub repo_url: String,

    /// 同期するブランチ
    #[validate(length(min = 1, message = "REPO_BRANCH must not be empty"))]
    pub repo_branch: String,

    /// ローカル作業コピーのパス
    pub repo_path: PathBuf,

    /// サーバーのライブデータディレクトリ
    pub data_dir: PathBuf,

    /// コピー対象ディレクトリ（カンマ区切り）
    pub copy_dirs: String,

    /// 除外ディレクトリ（カンマ区切り）
    pub skip_dirs: String,

    /// アセット取得スクリプトを実行するか
    pub plugins_download: bool,

    /// コピー後に設定する所有者ID（ユーザー・グループ共通）
    pub owner_id: Option<u32>,

    /// RCONホスト
    #[validate(length(min = 1, message = "RCON_HOST is required"))]
    pub rcon_host: String,

    /// RCONポート
    #[validate(range(min = 1, message = "RCON_PORT is required"))]
    pub rcon_port: u16,

    /// RCONパスワード
    #[serde(serialize_with = "redact")]
    #[validate(length(min = 1, message = "RCON_PASSWORD is required"))]
    pub rcon_password: String,

    /// 再起動コマンド
    #[validate(length(min = 1, message = "RCON_RESTART_COMMAND must not be empty"))]
    pub restart_command: String,

    /// カウントダウン開始までの待機時間
    #[serde(serialize_with = "as_secs")]
    pub countdown_wait: Duration,

    /// カウントダウン1ステップの間隔
    #[serde(serialize_with = "as_secs")]
    pub countdown_tick: Duration,

    /// メッセージのロケール
    pub locale: String,

    /// 更新リクエストの共有シークレット
    #[serde(serialize_with = "redact_option")]
    pub secret_token: Option<String>,

    /// 同期ドメインと再起動ドメインの境界
    pub restart_fencing: RestartFencing,
}

impl PipelineConfig {
    /// 必須項目を指定して設定を作成（その他はデフォルト値）
    pub fn new(
        repo_url: impl Into<String>,
        rcon_host: impl Into<String>,
        rcon_port: u16,
        rcon_password: impl Into<String>,
    ) -> Self {
        Self {
            repo_url: repo_url.into(),
            repo_branch: DEFAULT_BRANCH.to_string(),
            repo_path: PathBuf::from(DEFAULT_REPO_PATH),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            copy_dirs: DEFAULT_COPY_DIRS.to_string(),
            skip_dirs: String::new(),
            plugins_download: false,
            owner_id: None,
            rcon_host: rcon_host.into(),
            rcon_port,
            rcon_password: rcon_password.into(),
            restart_command: DEFAULT_RESTART_COMMAND.to_string(),
            countdown_wait: Duration::from_secs(DEFAULT_COUNTDOWN_WAIT_SECS),
            countdown_tick: Duration::from_secs(1),
            locale: DEFAULT_LOCALE.to_string(),
            secret_token: None,
            restart_fencing: RestartFencing::default(),
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.repo_branch = branch.into();
        self
    }

    pub fn with_repo_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.repo_path = path.into();
        self
    }

    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    pub fn with_dirs(mut self, copy_dirs: impl Into<String>, skip_dirs: impl Into<String>) -> Self {
        self.copy_dirs = copy_dirs.into();
        self.skip_dirs = skip_dirs.into();
        self
    }

    pub fn with_plugins_download(mut self, enabled: bool) -> Self {
        self.plugins_download = enabled;
        self
    }

    pub fn with_owner_id(mut self, owner_id: Option<u32>) -> Self {
        self.owner_id = owner_id;
        self
    }

    pub fn with_restart_command(mut self, command: impl Into<String>) -> Self {
        self.restart_command = command.into();
        self
    }

    pub fn with_countdown(mut self, wait: Duration, tick: Duration) -> Self {
        self.countdown_wait = wait;
        self.countdown_tick = tick;
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn with_secret_token(mut self, token: Option<String>) -> Self {
        self.secret_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_restart_fencing(mut self, fencing: RestartFencing) -> Self {
        self.restart_fencing = fencing;
        self
    }

    /// RCONエンドポイント（`host:port`）
    pub fn console_address(&self) -> String {
        format!("{}:{}", self.rcon_host, self.rcon_port)
    }

    /// 必須項目を検証し、不足があれば設定エラーを返す
    pub fn validated(self) -> MgrResult<Self> {
        if let Err(errors) = self.validate() {
            let mut messages: Vec<String> = errors
                .field_errors()
                .into_iter()
                .flat_map(|(field, errs)| {
                    errs.iter()
                        .map(|e| match &e.message {
                            Some(message) => message.to_string(),
                            None => format!("{}: {}", field, e.code),
                        })
                        .collect::<Vec<_>>()
                })
                .collect();
            messages.sort();
            return Err(MgrError::config_error_with_source(messages.join("; "), errors));
        }
        Ok(self)
    }
}

fn redact<S: Serializer>(value: &str, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_empty() {
        serializer.serialize_str("")
    } else {
        serializer.serialize_str("***")
    }
}

fn redact_option<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(_) => serializer.serialize_some("***"),
        None => serializer.serialize_none(),
    }
}

fn as_secs<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> PipelineConfig {
        PipelineConfig::new("https://example.com/repo.git", "localhost", 25575, "secret")
    }

    #[test]
    fn test_defaults() {
        let config = valid_config();
        assert_eq!(config.repo_branch, "main");
        assert_eq!(config.repo_path, PathBuf::from("/tmp/plugin-repo"));
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.restart_command, "restart");
        assert_eq!(config.countdown_wait, Duration::from_secs(50));
        assert_eq!(config.locale, "en");
        assert_eq!(config.restart_fencing, RestartFencing::Overlap);
        assert!(config.secret_token.is_none());
        assert_eq!(config.console_address(), "localhost:25575");
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validated().is_ok());
    }

    #[test]
    fn test_missing_required_fields() {
        let config = PipelineConfig::new("", "", 0, "");
        let error = config.validated().unwrap_err();
        let message = error.to_string();
        assert!(matches!(error, MgrError::ConfigError { .. }));
        assert!(message.contains("REPO_URL is required"));
        assert!(message.contains("RCON_HOST is required"));
        assert!(message.contains("RCON_PORT is required"));
        assert!(message.contains("RCON_PASSWORD is required"));
    }

    #[test]
    fn test_empty_secret_token_is_unset() {
        let config = valid_config().with_secret_token(Some(String::new()));
        assert!(config.secret_token.is_none());
    }

    #[test]
    fn test_serialization_redacts_secrets() {
        let config = valid_config().with_secret_token(Some("token".to_string()));
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["rcon_password"], "***");
        assert_eq!(json["secret_token"], "***");
        assert_eq!(json["countdown_wait"], 50.0);
        assert_eq!(json["restart_fencing"], "overlap");
    }

    #[test]
    fn test_restart_fencing_parse() {
        assert_eq!("overlap".parse::<RestartFencing>(), Ok(RestartFencing::Overlap));
        assert_eq!(" Exclusive ".parse::<RestartFencing>(), Ok(RestartFencing::Exclusive));
        assert!("sometimes".parse::<RestartFencing>().is_err());
    }
}
