use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_cors_origins, parse_duplicate_policy,
    parse_environment, parse_u16, parse_u32, parse_u64,
};
use super::secret::load_or_create_dev_secret;
use super::types::{
    ApiSettings, ConfigError, CorsSettings, DatabaseSettings, EvaluationSettings, RuntimeSettings,
    SecuritySettings, ServerHost, ServerPort, ServerSettings, Settings, TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("REVIEW_HOST", "0.0.0.0");
        let port = env_or_default("REVIEW_PORT", "8000");

        let environment =
            parse_environment(env_optional("REVIEW_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("REVIEW_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Applicant Review API");
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let configured_secret = env_optional("AUTH_JWT_SECRET");
        if strict_config && configured_secret.is_none() {
            return Err(ConfigError::MissingSecret("AUTH_JWT_SECRET"));
        }
        let jwt_secret = configured_secret.unwrap_or_else(load_or_create_dev_secret);
        let algorithm = env_or_default("AUTH_JWT_ALGORITHM", "HS256");
        let audience = env_optional("AUTH_JWT_AUDIENCE");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "review");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "applicant_review");
        let database_url = env_optional("DATABASE_URL");
        let max_connections =
            parse_u32("DB_MAX_CONNECTIONS", env_or_default("DB_MAX_CONNECTIONS", "10"))?;

        let duplicate_policy = parse_duplicate_policy(env_optional("EVALUATION_DUPLICATE_POLICY"))?;
        let reconcile_interval_seconds = parse_u64(
            "RECONCILE_INTERVAL_SECONDS",
            env_or_default("RECONCILE_INTERVAL_SECONDS", "300"),
        )?;
        let orphan_grace_seconds =
            parse_u64("ORPHAN_GRACE_SECONDS", env_or_default("ORPHAN_GRACE_SECONDS", "300"))?;
        let orphan_purge_enabled =
            env_optional("ORPHAN_PURGE_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let log_level = env_or_default("REVIEW_LOG_LEVEL", "info");
        let json = env_optional("REVIEW_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, api_v1_str },
            security: SecuritySettings { jwt_secret, algorithm, audience },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
                max_connections,
            },
            evaluation: EvaluationSettings {
                duplicate_policy,
                reconcile_interval_seconds,
                orphan_grace_seconds,
                orphan_purge_enabled,
            },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn evaluation(&self) -> &EvaluationSettings {
        &self.evaluation
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.api.api_v1_str.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "API_V1_STR",
                value: self.api.api_v1_str.clone(),
            });
        }

        if self.security.algorithm != "HS256" {
            return Err(ConfigError::InvalidValue {
                field: "AUTH_JWT_ALGORITHM",
                value: self.security.algorithm.clone(),
            });
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "DB_MAX_CONNECTIONS",
                value: "0".to_string(),
            });
        }

        if self.evaluation.reconcile_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "RECONCILE_INTERVAL_SECONDS",
                value: "0".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }

        Ok(())
    }
}
