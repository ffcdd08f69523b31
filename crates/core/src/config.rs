//! 설정 관리: netwatch.toml 파싱 및 런타임 설정
//!
//! [`NetwatchConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`NETWATCH_STORE_DB_PATH=/data/net.db` 형식)
//! 3. 설정 파일 (`netwatch.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), netwatch_core::error::NetwatchError> {
//! use netwatch_core::config::NetwatchConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = NetwatchConfig::load("netwatch.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = NetwatchConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, NetwatchError};

/// netwatch 통합 설정
///
/// `netwatch.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetwatchConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 로그 파이프라인 설정
    #[serde(default)]
    pub log_pipeline: LogPipelineConfig,
    /// 장치 저장소 설정
    #[serde(default)]
    pub store: StoreConfig,
    /// 운영자 HTTP API 설정
    #[serde(default)]
    pub http: HttpConfig,
    /// 다이제스트 내보내기 설정
    #[serde(default)]
    pub digest: DigestConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl NetwatchConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, NetwatchError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다.
    ///
    /// 환경변수 오버라이드와 검증은 하지 않습니다. CLI 오버라이드를 적용한 뒤
    /// 호출자가 [`validate`](Self::validate)를 호출해야 합니다.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, NetwatchError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                NetwatchError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                NetwatchError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, NetwatchError> {
        toml::from_str(toml_str).map_err(|e| {
            NetwatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `NETWATCH_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "NETWATCH_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "NETWATCH_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.pid_file, "NETWATCH_GENERAL_PID_FILE");

        // Log Pipeline
        override_bool(
            &mut self.log_pipeline.enabled,
            "NETWATCH_LOG_PIPELINE_ENABLED",
        );
        override_string(
            &mut self.log_pipeline.log_path,
            "NETWATCH_LOG_PIPELINE_LOG_PATH",
        );
        override_u64(
            &mut self.log_pipeline.poll_interval_ms,
            "NETWATCH_LOG_PIPELINE_POLL_INTERVAL_MS",
        );
        override_usize(
            &mut self.log_pipeline.max_line_length,
            "NETWATCH_LOG_PIPELINE_MAX_LINE_LENGTH",
        );
        override_usize(
            &mut self.log_pipeline.channel_capacity,
            "NETWATCH_LOG_PIPELINE_CHANNEL_CAPACITY",
        );

        // Store
        override_string(&mut self.store.db_path, "NETWATCH_STORE_DB_PATH");

        // HTTP
        override_bool(&mut self.http.enabled, "NETWATCH_HTTP_ENABLED");
        override_string(&mut self.http.bind, "NETWATCH_HTTP_BIND");
        override_string(&mut self.http.public_url, "NETWATCH_HTTP_PUBLIC_URL");

        // Digest
        override_u64(
            &mut self.digest.interval_mins,
            "NETWATCH_DIGEST_INTERVAL_MINS",
        );
        override_string(&mut self.digest.output_dir, "NETWATCH_DIGEST_OUTPUT_DIR");
        override_bool(&mut self.digest.reset, "NETWATCH_DIGEST_RESET");

        // Metrics
        override_bool(&mut self.metrics.enabled, "NETWATCH_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "NETWATCH_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "NETWATCH_METRICS_PORT");
        override_string(&mut self.metrics.endpoint, "NETWATCH_METRICS_ENDPOINT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), NetwatchError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.log_pipeline.enabled {
            if self.log_pipeline.log_path.is_empty() {
                return Err(invalid(
                    "log_pipeline.log_path",
                    "log path must not be empty when the pipeline is enabled".to_owned(),
                ));
            }
            if self.log_pipeline.poll_interval_ms == 0 {
                return Err(invalid(
                    "log_pipeline.poll_interval_ms",
                    "must be greater than 0".to_owned(),
                ));
            }
            if self.log_pipeline.max_line_length == 0 {
                return Err(invalid(
                    "log_pipeline.max_line_length",
                    "must be greater than 0".to_owned(),
                ));
            }
            if self.log_pipeline.channel_capacity == 0 {
                return Err(invalid(
                    "log_pipeline.channel_capacity",
                    "must be greater than 0".to_owned(),
                ));
            }
        }

        if self.store.db_path.is_empty() {
            return Err(invalid(
                "store.db_path",
                "database path must not be empty".to_owned(),
            ));
        }

        if self.http.enabled && self.http.bind.is_empty() {
            return Err(invalid(
                "http.bind",
                "bind address must not be empty when http is enabled".to_owned(),
            ));
        }

        if self.digest.interval_mins > 0 && self.digest.output_dir.is_empty() {
            return Err(invalid(
                "digest.output_dir",
                "output directory must not be empty when digest export is enabled".to_owned(),
            ));
        }

        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(invalid(
                    "metrics.port",
                    "must be greater than 0".to_owned(),
                ));
            }
            if !self.metrics.endpoint.starts_with('/') {
                return Err(invalid(
                    "metrics.endpoint",
                    "must start with '/'".to_owned(),
                ));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> NetwatchError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// PID 파일 경로 (빈 문자열이면 생성하지 않음)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            pid_file: String::new(),
        }
    }
}

/// 로그 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogPipelineConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 추적할 dnsmasq 로그 파일
    pub log_path: String,
    /// 파일 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 한 라인의 최대 길이 (바이트), 초과하면 버림
    pub max_line_length: usize,
    /// 라우터로 가는 이벤트 채널 용량
    pub channel_capacity: usize,
}

impl Default for LogPipelineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_path: "/var/log/syslog".to_owned(),
            poll_interval_ms: 250,
            max_line_length: 64 * 1024,
            channel_capacity: 1024,
        }
    }
}

/// 장치 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// 데이터베이스 파일 경로
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: "/var/lib/netwatch/network-log.db".to_owned(),
        }
    }
}

/// 운영자 HTTP API 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub bind: String,
    /// 외부에서 접근하는 URL (다이제스트와 `/latest`에 포함)
    pub public_url: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "0.0.0.0:8080".to_owned(),
            public_url: "http://localhost:8080".to_owned(),
        }
    }
}

/// 다이제스트 내보내기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    /// 내보내기 주기 (분), 0이면 비활성화
    pub interval_mins: u64,
    /// 다이제스트 파일 출력 디렉토리
    pub output_dir: String,
    /// 내보낸 뒤 방문 기록을 비울지 여부
    pub reset: bool,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            interval_mins: 0,
            output_dir: "/var/lib/netwatch/digests".to_owned(),
            reset: true,
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 리스닝 주소
    pub listen_addr: String,
    /// 리스닝 포트
    pub port: u16,
    /// 엔드포인트 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = NetwatchConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert!(config.log_pipeline.enabled);
        assert_eq!(config.http.public_url, "http://localhost:8080");
        assert_eq!(config.digest.interval_mins, 0);
        assert!(config.digest.reset);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn default_config_passes_validation() {
        NetwatchConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let config = NetwatchConfig::parse("").unwrap();
        assert_eq!(config.log_pipeline.log_path, "/var/log/syslog");
        assert_eq!(config.store.db_path, "/var/lib/netwatch/network-log.db");
    }

    #[test]
    fn parse_partial_toml_merges_with_defaults() {
        let toml = r#"
[log_pipeline]
log_path = "/var/log/dnsmasq.log"

[digest]
interval_mins = 60
"#;
        let config = NetwatchConfig::parse(toml).unwrap();
        assert_eq!(config.log_pipeline.log_path, "/var/log/dnsmasq.log");
        assert_eq!(config.log_pipeline.poll_interval_ms, 250);
        assert_eq!(config.digest.interval_mins, 60);
        assert!(config.digest.reset);
    }

    #[test]
    fn general_section_serializes_only_used_keys() {
        // Given: the default config rendered back to TOML
        let rendered = toml::to_string(&NetwatchConfig::default()).unwrap();

        // Then: [general] carries exactly the keys the daemon reads
        let table: toml::Table = toml::from_str(&rendered).unwrap();
        let general = table["general"].as_table().unwrap();
        let mut keys: Vec<&str> = general.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["log_format", "log_level", "pid_file"]);
    }

    #[test]
    fn parse_invalid_toml_returns_error() {
        let err = NetwatchConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            NetwatchError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = NetwatchConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_empty_log_path_only_when_enabled() {
        let mut config = NetwatchConfig::default();
        config.log_pipeline.log_path = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_path"));

        config.log_pipeline.enabled = false;
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_zero_channel_capacity() {
        let mut config = NetwatchConfig::default();
        config.log_pipeline.channel_capacity = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("channel_capacity"));
    }

    #[test]
    fn validate_rejects_empty_db_path() {
        let mut config = NetwatchConfig::default();
        config.store.db_path = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("store.db_path"));
    }

    #[test]
    fn validate_rejects_digest_without_output_dir() {
        let mut config = NetwatchConfig::default();
        config.digest.output_dir = String::new();
        // 비활성화 상태에서는 검증하지 않음
        config.validate().unwrap();

        config.digest.interval_mins = 5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("digest.output_dir"));
    }

    #[test]
    fn validate_rejects_metrics_endpoint_without_slash() {
        let mut config = NetwatchConfig::default();
        config.metrics.enabled = true;
        config.metrics.endpoint = "metrics".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("metrics.endpoint"));
    }

    #[test]
    #[serial]
    fn env_overrides_apply_to_sections() {
        let mut config = NetwatchConfig::default();
        // SAFETY: serial 테스트로 환경변수 접근이 직렬화됩니다.
        unsafe {
            std::env::set_var("NETWATCH_STORE_DB_PATH", "/tmp/override.db");
            std::env::set_var("NETWATCH_DIGEST_INTERVAL_MINS", "15");
            std::env::set_var("NETWATCH_HTTP_ENABLED", "false");
        }
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("NETWATCH_STORE_DB_PATH");
            std::env::remove_var("NETWATCH_DIGEST_INTERVAL_MINS");
            std::env::remove_var("NETWATCH_HTTP_ENABLED");
        }

        assert_eq!(config.store.db_path, "/tmp/override.db");
        assert_eq!(config.digest.interval_mins, 15);
        assert!(!config.http.enabled);
    }

    #[test]
    #[serial]
    fn env_override_invalid_number_keeps_original() {
        let mut val = 250u64;
        // SAFETY: serial 테스트로 환경변수 접근이 직렬화됩니다.
        unsafe { std::env::set_var("TEST_NETWATCH_U64_BAD", "soon") };
        override_u64(&mut val, "TEST_NETWATCH_U64_BAD");
        assert_eq!(val, 250);
        unsafe { std::env::remove_var("TEST_NETWATCH_U64_BAD") };
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = "original".to_owned();
        override_string(&mut val, "TEST_NETWATCH_NONEXISTENT_12345");
        assert_eq!(val, "original");
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = NetwatchConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = NetwatchConfig::parse(&toml_str).unwrap();
        assert_eq!(config.store.db_path, parsed.store.db_path);
        assert_eq!(config.metrics.port, parsed.metrics.port);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = NetwatchConfig::from_file("/nonexistent/path/netwatch.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NetwatchError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
