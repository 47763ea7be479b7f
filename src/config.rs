use config as config_crate;
use serde::Deserialize;

/// Configuração operacional do serviço, carregada uma única vez do ambiente.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// URL de conexão com o banco PostgreSQL (obrigatória).
    pub database_url: String,
    /// Endereço de escuta do servidor HTTP.
    pub app_host: String,
    /// Porta de escuta do servidor HTTP.
    pub app_port: u16,
    /// Limite global de probes simultâneos.
    pub concurrency: usize,
    /// Janela de retenção de checks, em dias.
    pub retention_days: i64,
    /// Timezone exibido pelo frontend (não afeta o bucket diário, que é UTC).
    pub app_timezone: String,
    /// Liga/desliga a autenticação da API.
    pub auth_enabled: bool,
    /// Usuário único configurado.
    pub auth_username: String,
    /// Senha do usuário único.
    pub auth_password: String,
    /// Segredo usado para assinar o cookie de sessão.
    pub session_secret_key: String,
    /// Validade do cookie de sessão, em segundos.
    pub session_max_age: i64,
}

impl Settings {
    /// Carrega as variáveis de ambiente (DATABASE_URL, APP_PORT, ...) com os
    /// defaults do serviço. Falha se DATABASE_URL estiver ausente.
    pub fn load() -> anyhow::Result<Self> {
        let settings = config_crate::Config::builder()
            .set_default("app_host", "0.0.0.0")?
            .set_default("app_port", 8000)?
            .set_default("concurrency", 20)?
            .set_default("retention_days", 35)?
            .set_default("app_timezone", "Europe/Amsterdam")?
            .set_default("auth_enabled", true)?
            .set_default("auth_username", "admin")?
            .set_default("auth_password", "change-me")?
            .set_default("session_secret_key", "change-me-session-secret")?
            .set_default("session_max_age", 86400)?
            .add_source(config_crate::Environment::default().try_parsing(true))
            .build()?;
        let settings: Settings = settings.try_deserialize()?;
        Ok(settings)
    }

    /// Validação customizada dos limites operacionais.
    pub fn validate(&self) -> Result<(), String> {
        if self.database_url.is_empty() {
            return Err("database_url não pode ser vazia".into());
        }
        if self.concurrency == 0 {
            return Err("concurrency deve ser maior que zero".into());
        }
        if self.retention_days <= 0 {
            return Err("retention_days deve ser maior que zero".into());
        }
        if self.session_max_age <= 0 {
            return Err("session_max_age deve ser maior que zero".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_settings() -> Settings {
        Settings {
            database_url: "postgresql://u:p@localhost:5432/uptime".to_string(),
            app_host: "0.0.0.0".to_string(),
            app_port: 8000,
            concurrency: 20,
            retention_days: 35,
            app_timezone: "Europe/Amsterdam".to_string(),
            auth_enabled: true,
            auth_username: "admin".to_string(),
            auth_password: "change-me".to_string(),
            session_secret_key: "change-me-session-secret".to_string(),
            session_max_age: 86400,
        }
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(base_settings().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut settings = base_settings();
        settings.concurrency = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn validate_rejects_nonpositive_retention() {
        let mut settings = base_settings();
        settings.retention_days = 0;
        assert!(settings.validate().is_err());
    }
}
