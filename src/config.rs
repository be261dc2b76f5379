use serde::Deserialize;
use url::Url;

/// Immutable startup configuration, resolved once from the environment and
/// passed into components by value.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Schema holding the applications table.
    pub db_schema: String,
    /// Name of the applications table inside the schema.
    pub table_name: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DB_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            db_schema: require_identifier(
                "DB_SCHEMA",
                std::env::var("DB_SCHEMA").unwrap_or_else(|_| "public".to_string()),
            )?,
            table_name: require_identifier(
                "APPLICATIONS_TABLE",
                std::env::var("APPLICATIONS_TABLE")
                    .unwrap_or_else(|_| "credit_applications".to_string()),
            )?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Database target: {}", config.redacted_database_url());
        tracing::debug!(
            "Applications table: {}.{}",
            config.db_schema,
            config.table_name
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    /// Schema-qualified table identifier. Safe to interpolate into statement
    /// text: both parts passed `require_identifier` at startup.
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", self.db_schema, self.table_name)
    }

    /// The database target with userinfo stripped, for logs and the info
    /// endpoint. Credentials never leave the process.
    pub fn redacted_database_url(&self) -> String {
        match Url::parse(&self.database_url) {
            Ok(mut url) => {
                let _ = url.set_username("");
                let _ = url.set_password(None);
                url.to_string()
            }
            Err(_) => "<unparseable database url>".to_string(),
        }
    }
}

/// SQL identifiers sourced from the environment are restricted to plain
/// names; anything else would need quoting and is refused outright.
fn require_identifier(name: &str, value: String) -> anyhow::Result<String> {
    let value = value.trim().to_string();
    if value.is_empty()
        || !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        anyhow::bail!("{name} must be a plain SQL identifier (letters, digits, underscore)");
    }
    Ok(value)
}
